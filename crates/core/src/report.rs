//! 役員レポートの提出状況をデータベースから取得する。
//!
//! スキーマは外部で管理されており、ここでは読み取りのみを行う。

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};

/// 学期の長さ（週）。
pub const TERM_WEEKS: i32 = 10;

const CURRENT_TERM_QUERY: &str = "\
    SELECT start_date::date AS start_date \
    FROM term_dates \
    WHERE start_date < NOW() \
      AND (start_date + make_interval(weeks => $1)) > NOW() \
    LIMIT 1";

// 現役の役職ごとに 1 行。レポートは $1 より後に作成され、本文があるものだけ数える
const REPORT_STATUS_QUERY: &str = "\
    SELECT \
        COALESCE(members.first_name, '') AS first_name, \
        COALESCE(members.last_name, '') AS last_name, \
        EXISTS ( \
            SELECT 1 FROM officer_reports \
            WHERE officer_reports.member_officership_id = member_officerships.id \
              AND officer_reports.created_date > $1 \
              AND officer_reports.contents IS NOT NULL \
        ) AS written \
    FROM member_officerships \
    LEFT JOIN members ON member_officerships.member_id = members.id \
    WHERE member_officerships.start_date < NOW() \
      AND (member_officerships.end_date IS NULL OR member_officerships.end_date > NOW())";

/// 現在の学期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Term {
    pub start_date: NaiveDate,
}

impl Term {
    /// `today` が学期の何週目か（1 始まり）。
    pub fn week_of(&self, today: NaiveDate) -> i64 {
        (today - self.start_date).num_days().div_euclid(7) + 1
    }
}

/// 役職 1 件分のレポート提出状況。
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ReportStatus {
    pub first_name: String,
    pub last_name: String,
    pub written: bool,
}

impl ReportStatus {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, written: bool) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            written,
        }
    }
}

/// 学期とレポート提出状況の取得元。
pub trait ReportSource {
    /// 現在の学期を取得する。学期外なら `None`。
    fn current_term(&self) -> impl Future<Output = Result<Option<Term>, sqlx::Error>>;

    /// 現役の役職ごとに、`since` より後にレポートが書かれたかを取得する。
    ///
    /// 行の順序は保証しない。
    fn report_status(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ReportStatus>, sqlx::Error>>;
}

/// PostgreSQL を使った [`ReportSource`] の実装。
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// データベースに接続する。
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReportSource for PgReportStore {
    async fn current_term(&self) -> Result<Option<Term>, sqlx::Error> {
        sqlx::query_as::<_, Term>(CURRENT_TERM_QUERY)
            .bind(TERM_WEEKS)
            .fetch_optional(&self.pool)
            .await
    }

    async fn report_status(&self, since: DateTime<Utc>) -> Result<Vec<ReportStatus>, sqlx::Error> {
        sqlx::query_as::<_, ReportStatus>(REPORT_STATUS_QUERY)
            .bind(since)
            .fetch_all(&self.pool)
            .await
    }
}
