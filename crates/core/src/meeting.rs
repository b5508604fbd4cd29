//! 定例会議の日時計算。

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Weekday};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Meeting hour must be between 0 and 23, got {0}")]
    InvalidHour(u32),
    #[error("Meeting time {date} {hour:02}:00 does not exist in the local time zone")]
    NonexistentLocalTime { date: NaiveDate, hour: u32 },
    #[error("Meeting date is out of range")]
    OutOfRange,
}

/// 毎週の定例会議の曜日と開始時刻。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingSchedule {
    weekday: Weekday,
    hour: u32,
}

impl MeetingSchedule {
    pub fn new(weekday: Weekday, hour: u32) -> Result<Self, ScheduleError> {
        if hour > 23 {
            return Err(ScheduleError::InvalidHour(hour));
        }
        Ok(Self { weekday, hour })
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }
}

/// `reference` 以前で最も新しい会議の開始日時を返す。
///
/// 会議当日で開始時刻を過ぎている（ちょうど開始時刻を含む）場合は当日、
/// それ以外は直近の該当曜日まで遡る。会議当日の開始前なら 7 日前になる。
/// 結果は `reference` と同じタイムゾーンの `hour:00:00` になる。
///
/// 夏時間の切り替えで時刻が重複する場合は早い方を採用し、
/// 存在しない時刻の場合はエラーを返す。
pub fn last_meeting<Z: TimeZone>(
    reference: &DateTime<Z>,
    schedule: MeetingSchedule,
) -> Result<DateTime<Z>, ScheduleError> {
    let today = reference.date_naive();

    let meeting_already_today =
        reference.weekday() == schedule.weekday && reference.hour() >= schedule.hour;

    let days_back = if meeting_already_today {
        0
    } else {
        // 同じ曜日でも開始前なら 1 週間遡る
        match days_since(reference.weekday(), schedule.weekday) {
            0 => 7,
            n => n,
        }
    };

    let day = today
        .checked_sub_days(Days::new(days_back))
        .ok_or(ScheduleError::OutOfRange)?;

    let nonexistent = || ScheduleError::NonexistentLocalTime {
        date: day,
        hour: schedule.hour,
    };

    let naive = day.and_hms_opt(schedule.hour, 0, 0).ok_or_else(nonexistent)?;

    reference
        .timezone()
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(nonexistent)
}

/// `from` から遡って `to` に着くまでの日数 (0..=6)。
fn days_since(from: Weekday, to: Weekday) -> u64 {
    u64::from((from.num_days_from_monday() + 7 - to.num_days_from_monday()) % 7)
}
