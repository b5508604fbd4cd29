//! 役員レポートの提出状況を集計し、チャットの Webhook に通知する。
//!
//! 直近の定例会議の日時を求め、それ以降にレポートを書いた役員と
//! まだ書いていない役員を一覧にして送信する。

pub mod meeting;
pub mod notify;
pub mod report;
pub mod runner;

pub use meeting::{MeetingSchedule, ScheduleError, last_meeting};
pub use notify::{Attachment, Notifier, WebhookClient, WebhookError, WebhookMessage};
pub use report::{PgReportStore, ReportSource, ReportStatus, Term};
pub use runner::{RunError, RunSummary};
