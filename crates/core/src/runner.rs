//! 学期の確認から通知までの一連の処理。

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::meeting::{MeetingSchedule, ScheduleError, last_meeting};
use crate::notify::{Notifier, WebhookError, build_message, choose_header};
use crate::report::ReportSource;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("No current term found")]
    NoCurrentTerm,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("No motivational headers configured")]
    EmptyHeaderPool,
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// 1 回の実行結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub meeting: DateTime<Utc>,
    pub written: usize,
    pub unwritten: usize,
}

/// 前回の会議以降のレポート提出状況を集計して通知する。
///
/// いずれかの段階で失敗した時点で中断し、それ以降の処理（通知を含む）は行わない。
/// 冪等ではないため、同じ入力で 2 回呼ぶと 2 回通知される。
pub async fn run<S, N, Z, R>(
    source: &S,
    notifier: &N,
    schedule: MeetingSchedule,
    now: &DateTime<Z>,
    headers: &[String],
    rng: &mut R,
) -> Result<RunSummary, RunError>
where
    S: ReportSource,
    N: Notifier,
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
    R: Rng + ?Sized,
{
    let term = source
        .current_term()
        .await?
        .ok_or(RunError::NoCurrentTerm)?;
    info!(
        term_start = %term.start_date,
        term_week = term.week_of(now.date_naive()),
        "Current term found"
    );

    let meeting = last_meeting(now, schedule)?;
    info!(meeting = %meeting, "Calculated last meeting");

    let meeting = meeting.with_timezone(&Utc);
    let rows = source.report_status(meeting).await?;

    let header = choose_header(headers, rng).ok_or(RunError::EmptyHeaderPool)?;
    let message = build_message(&rows, header);

    let written = rows.iter().filter(|row| row.written).count();
    let summary = RunSummary {
        meeting,
        written,
        unwritten: rows.len() - written,
    };
    info!(
        written = summary.written,
        unwritten = summary.unwritten,
        "Sending report status"
    );

    notifier.notify(&message).await?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{NaiveDate, Weekday};
    use chrono_tz::Europe::London;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::notify::WebhookMessage;
    use crate::report::{ReportStatus, Term};

    struct FakeSource {
        term: Option<Term>,
        rows: Vec<ReportStatus>,
        queried_since: RefCell<Vec<DateTime<Utc>>>,
    }

    impl FakeSource {
        fn in_term(rows: Vec<ReportStatus>) -> Self {
            Self {
                term: Some(Term {
                    start_date: NaiveDate::from_ymd_opt(2023, 12, 18).unwrap(),
                }),
                rows,
                queried_since: RefCell::new(Vec::new()),
            }
        }
    }

    impl ReportSource for FakeSource {
        async fn current_term(&self) -> Result<Option<Term>, sqlx::Error> {
            Ok(self.term)
        }

        async fn report_status(
            &self,
            since: DateTime<Utc>,
        ) -> Result<Vec<ReportStatus>, sqlx::Error> {
            self.queried_since.borrow_mut().push(since);
            Ok(self.rows.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<WebhookMessage>>,
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &WebhookMessage) -> Result<(), WebhookError> {
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    struct RejectingNotifier;

    impl Notifier for RejectingNotifier {
        async fn notify(&self, _message: &WebhookMessage) -> Result<(), WebhookError> {
            Err(WebhookError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR))
        }
    }

    fn schedule() -> MeetingSchedule {
        MeetingSchedule::new(Weekday::Tue, 19).unwrap()
    }

    fn headers() -> Vec<String> {
        vec!["Tell us what you've been up to this week!".to_string()]
    }

    fn rows() -> Vec<ReportStatus> {
        vec![
            ReportStatus::new("Alice", "Smith", true),
            ReportStatus::new("Bob", "Jones", false),
            ReportStatus::new("Carol", "White", false),
        ]
    }

    #[tokio::test]
    async fn sends_report_status_since_last_meeting() {
        let source = FakeSource::in_term(rows());
        let notifier = RecordingNotifier::default();
        let now = London.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let summary = run(&source, &notifier, schedule(), &now, &headers(), &mut rng)
            .await
            .unwrap();

        let meeting = Utc.with_ymd_and_hms(2024, 1, 2, 19, 0, 0).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                meeting,
                written: 1,
                unwritten: 2,
            }
        );
        assert_eq!(*source.queried_since.borrow(), vec![meeting]);

        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, headers()[0]);
        assert_eq!(sent[0].attachments[0].text, "✅ Alice Smith\n");
        assert_eq!(sent[0].attachments[1].text, "❓ Bob Jones\n❓ Carol White\n");
    }

    #[tokio::test]
    async fn missing_term_aborts_before_notifying() {
        let source = FakeSource {
            term: None,
            ..FakeSource::in_term(rows())
        };
        let notifier = RecordingNotifier::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = run(&source, &notifier, schedule(), &now, &headers(), &mut rng).await;

        assert!(matches!(result, Err(RunError::NoCurrentTerm)));
        assert!(source.queried_since.borrow().is_empty());
        assert!(notifier.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn empty_header_pool_aborts_before_notifying() {
        let source = FakeSource::in_term(rows());
        let notifier = RecordingNotifier::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = run(&source, &notifier, schedule(), &now, &[], &mut rng).await;

        assert!(matches!(result, Err(RunError::EmptyHeaderPool)));
        assert!(notifier.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn webhook_failure_is_returned() {
        let source = FakeSource::in_term(rows());
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = run(&source, &RejectingNotifier, schedule(), &now, &headers(), &mut rng).await;

        assert!(matches!(
            result,
            Err(RunError::Webhook(WebhookError::Status(status)))
                if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn running_twice_sends_twice() {
        let source = FakeSource::in_term(rows());
        let notifier = RecordingNotifier::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..2 {
            run(&source, &notifier, schedule(), &now, &headers(), &mut rng)
                .await
                .unwrap();
        }

        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }
}
