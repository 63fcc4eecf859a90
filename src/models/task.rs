use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Requested,
    InProgress,
    Completed,
    Rejected,
    Vanished,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Requested,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Rejected,
        TaskStatus::Vanished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Requested => "requested",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Vanished => "vanished",
        }
    }

    /// Fixed transition table. Completed, rejected and vanished are terminal.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Requested, TaskStatus::InProgress)
                | (TaskStatus::Requested, TaskStatus::Rejected)
                | (TaskStatus::Requested, TaskStatus::Vanished)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }

    pub fn transition(self, next: TaskStatus) -> MarketResult<TaskStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MarketError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MarketError::Internal(format!("unknown task status: {s}")))
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Builds a forward window; `start >= end` is rejected.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> MarketResult<Self> {
        if start >= end {
            return Err(MarketError::InvalidTimeWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub task_id: i32,
    pub customer_id: i32,
    pub worker_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: TaskStatus,
    pub dispatch_id: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub hourly_rate: Option<f64>,
    pub total_cost: Option<f64>,
    pub created_time: NaiveDateTime,
}

impl Task {
    /// Stored windows are not re-validated, so this skips the forward check.
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// What a customer submits before any worker is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl TaskDraft {
    pub fn validated_window(&self) -> MarketResult<TimeWindow> {
        if self.title.trim().is_empty() {
            return Err(MarketError::InvalidDraft("title must not be blank".into()));
        }
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// A row the store is asked to insert; always starts out `requested`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub customer_id: i32,
    pub worker_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub window: TimeWindow,
    pub dispatch_id: Option<String>,
}

impl NewTask {
    pub fn dispatched(
        draft: &TaskDraft,
        window: TimeWindow,
        customer_id: i32,
        worker_id: i32,
        dispatch_id: &str,
    ) -> Self {
        Self {
            customer_id,
            worker_id: Some(worker_id),
            title: draft.title.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            window,
            dispatch_id: Some(dispatch_id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 4, 23)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        let b = TimeWindow::new(at(10, 30), at(11, 30)).unwrap();
        let c = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // touching endpoints do not conflict
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn positive_window_overlaps_itself() {
        let a = TimeWindow::new(at(9, 0), at(9, 1)).unwrap();
        assert!(a.overlaps(&a));
    }

    #[test]
    fn backwards_or_empty_window_is_rejected() {
        assert!(matches!(
            TimeWindow::new(at(11, 0), at(10, 0)),
            Err(MarketError::InvalidTimeWindow { .. })
        ));
        assert!(matches!(
            TimeWindow::new(at(10, 0), at(10, 0)),
            Err(MarketError::InvalidTimeWindow { .. })
        ));
    }

    #[test]
    fn window_hours() {
        let a = TimeWindow::new(at(10, 0), at(11, 30)).unwrap();
        assert_eq!(a.hours(), 1.5);
    }

    #[test]
    fn transition_table() {
        use TaskStatus::*;

        assert!(Requested.can_transition_to(InProgress));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Requested.can_transition_to(Vanished));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!InProgress.can_transition_to(Rejected));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Vanished.can_transition_to(InProgress));
        assert!(!Rejected.can_transition_to(Requested));

        assert!(matches!(
            Completed.transition(Requested),
            Err(MarketError::InvalidTransition { from: Completed, to: Requested })
        ));
    }

    #[test]
    fn status_parses_its_own_text() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn blank_title_is_rejected() {
        let draft = TaskDraft {
            title: "   ".into(),
            description: String::new(),
            location: String::new(),
            start_time: at(10, 0),
            end_time: at(11, 0),
        };
        assert!(matches!(
            draft.validated_window(),
            Err(MarketError::InvalidDraft(_))
        ));
    }
}
