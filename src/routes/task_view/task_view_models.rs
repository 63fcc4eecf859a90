use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::models::task::{Task, TaskDraft, TaskStatus};

// Accepted timestamp layouts: the datetime-local form value, then the
// plain SQL layout.
const TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

pub fn parse_time(field: &str, value: &str) -> MarketResult<NaiveDateTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
        .ok_or_else(|| MarketError::InvalidDraft(format!("{field} is not a valid time: {value}")))
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start_time: String,
    pub end_time: String,
}

impl CreateTaskRequest {
    pub fn to_draft(&self) -> MarketResult<TaskDraft> {
        Ok(TaskDraft {
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_time: parse_time("start_time", &self.start_time)?,
            end_time: parse_time("end_time", &self.end_time)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub success: bool,
    pub message: String,
    pub dispatched_count: usize,
    pub worker_ids: Vec<i32>,
}

#[derive(Deserialize)]
pub struct TaskActionRequest {
    pub task_id: i32,
}

#[derive(Serialize, Deserialize)]
pub struct TaskActionResponse {
    pub success: bool,
    pub message: String,
    pub task: TaskSummary,
}

#[derive(Deserialize)]
pub struct RateTaskRequest {
    pub task_id: i32,
    pub rating: i32,
    pub review: Option<String>,
}

// Structs used within the responses
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: i32,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub worker_id: Option<i32>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub total_cost: Option<f64>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            title: task.title.clone(),
            description: task.description.clone(),
            location: task.location.clone(),
            start_time: task.start_time.to_string(),
            end_time: task.end_time.to_string(),
            status: task.status.to_string(),
            worker_id: task.worker_id,
            rating: task.rating,
            review: task.review.clone(),
            total_cost: task.total_cost,
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct TaskListResponse {
    pub requested_tasks: Vec<TaskSummary>,
    pub in_progress_tasks: Vec<TaskSummary>,
    pub completed_tasks: Vec<TaskSummary>,
    pub rejected_tasks: Vec<TaskSummary>,
}

impl TaskListResponse {
    /// Groups tasks by status, keeping input order. Vanished tasks are dropped.
    pub fn grouped(tasks: &[Task]) -> Self {
        let mut response = Self::default();
        for task in tasks {
            let bucket = match task.status {
                TaskStatus::Requested => &mut response.requested_tasks,
                TaskStatus::InProgress => &mut response.in_progress_tasks,
                TaskStatus::Completed => &mut response.completed_tasks,
                TaskStatus::Rejected => &mut response.rejected_tasks,
                TaskStatus::Vanished => continue,
            };
            bucket.push(TaskSummary::from(task));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_and_sql_layouts() {
        let form = parse_time("start_time", "2023-04-23T10:30").unwrap();
        let sql = parse_time("start_time", "2023-04-23 10:30:00").unwrap();
        assert_eq!(form, sql);
        assert!(matches!(
            parse_time("end_time", "tomorrow"),
            Err(MarketError::InvalidDraft(_))
        ));
    }
}
