use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

/// Stored event status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Open,
    Closed,
    Completed,
    Deleted,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Open => "open",
            EventStatus::Closed => "closed",
            EventStatus::Completed => "completed",
            EventStatus::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EventStatus::Draft),
            "open" => Ok(EventStatus::Open),
            "closed" => Ok(EventStatus::Closed),
            "completed" => Ok(EventStatus::Completed),
            "deleted" => Ok(EventStatus::Deleted),
            _ => Err(format!("unknown event status: {s}")),
        }
    }
}

/// Status derived from the clock at read time. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedStatus {
    Draft,
    DeletedByAdmin,
    Upcoming,
    Ongoing,
    Completed,
}

/// Date and time fields of an event, as stored (interpreted as UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub event_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl Schedule {
    pub fn start(&self) -> DateTime<Utc> {
        let time = self.start_time.unwrap_or(NaiveTime::MIN);
        NaiveDateTime::new(self.event_date, time).and_utc()
    }

    pub fn end(&self) -> DateTime<Utc> {
        let date = self.end_date.unwrap_or(self.event_date);
        let time = self.end_time.unwrap_or_else(end_of_day);
        NaiveDateTime::new(date, time).and_utc()
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

pub fn compute_status(status: EventStatus, schedule: &Schedule, now: DateTime<Utc>) -> ComputedStatus {
    match status {
        EventStatus::Draft => ComputedStatus::Draft,
        EventStatus::Deleted => ComputedStatus::DeletedByAdmin,
        _ if now < schedule.start() => ComputedStatus::Upcoming,
        _ if now <= schedule.end() => ComputedStatus::Ongoing,
        _ => ComputedStatus::Completed,
    }
}

/// Ratings open once the event has ended or was closed out as completed.
pub fn is_rating_eligible(status: EventStatus, schedule: &Schedule, now: DateTime<Utc>) -> bool {
    match status {
        EventStatus::Draft | EventStatus::Deleted => false,
        EventStatus::Completed => true,
        _ => now >= schedule.end(),
    }
}

impl Event {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            event_date: self.event_date,
            end_date: self.end_date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Unknown stored values are treated as closed so nothing new can attach to them.
    pub fn lifecycle_status(&self) -> EventStatus {
        self.status.parse().unwrap_or_else(|_| {
            tracing::warn!(event_id = %self.id, status = %self.status, "unknown event status");
            EventStatus::Closed
        })
    }

    pub fn computed_status(&self, now: DateTime<Utc>) -> ComputedStatus {
        compute_status(self.lifecycle_status(), &self.schedule(), now)
    }

    pub fn is_rating_eligible(&self, now: DateTime<Utc>) -> bool {
        is_rating_eligible(self.lifecycle_status(), &self.schedule(), now)
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle_status() == EventStatus::Deleted
    }

    pub fn is_paid(&self) -> bool {
        self.event_type == "paid"
    }
}
