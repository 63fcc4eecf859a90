use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{debug, warn};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::{MarketStore, TaskFilter};
use crate::error::{MarketError, MarketResult};
use crate::models::task::{NewTask, Task, TaskStatus};
use crate::models::user::Caller;
use crate::models::worker::{Worker, WorkerStats};

const TASK_COLUMNS: &str = "task_id, customer_id, worker_id, title, description, location, \
     start_time, end_time, status, dispatch_id, rating, review, hourly_rate, total_cost, created_time";

#[derive(sqlx::FromRow)]
struct TaskRow {
    task_id: i32,
    customer_id: i32,
    worker_id: Option<i32>,
    title: String,
    description: String,
    location: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    status: String,
    dispatch_id: Option<String>,
    rating: Option<i32>,
    review: Option<String>,
    hourly_rate: Option<f64>,
    total_cost: Option<f64>,
    created_time: NaiveDateTime,
}

impl TryFrom<TaskRow> for Task {
    type Error = MarketError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            task_id: row.task_id,
            customer_id: row.customer_id,
            worker_id: row.worker_id,
            title: row.title,
            description: row.description,
            location: row.location,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status.parse()?,
            dispatch_id: row.dispatch_id,
            rating: row.rating,
            review: row.review,
            hourly_rate: row.hourly_rate,
            total_cost: row.total_cost,
            created_time: row.created_time,
        })
    }
}

const SIBLING_LOCK_SQL: &str =
    "SELECT status FROM Tasks_ WHERE dispatch_id = ? ORDER BY task_id FOR UPDATE";

// InnoDB error numbers for a deadlock victim and a lock wait timeout.
const ER_LOCK_DEADLOCK: u16 = 1213;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

fn is_lock_conflict_number(number: u16) -> bool {
    matches!(number, ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT)
}

/// A transaction that lost a row-lock race. The other acceptance won.
fn is_lock_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|mysql| is_lock_conflict_number(mysql.number())),
        _ => false,
    }
}

fn into_tasks(rows: Vec<TaskRow>) -> MarketResult<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

/// `Tasks_`, `Workers_`, `Customers_`, `Users_` and `Sessions_` on MySQL.
/// Table layout lives in `schema/mysql.sql`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn filtered_tasks_query(filter: &TaskFilter) -> QueryBuilder<'_, MySql> {
        let mut query = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM Tasks_ WHERE 1 = 1"));
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(worker_ids) = &filter.worker_in {
            if worker_ids.is_empty() {
                query.push(" AND 1 = 0");
            } else {
                query.push(" AND worker_id IN (");
                let mut ids = query.separated(", ");
                for worker_id in worker_ids {
                    ids.push_bind(*worker_id);
                }
                ids.push_unseparated(")");
            }
        }
        if let Some(window) = &filter.time_overlaps {
            query
                .push(" AND start_time < ")
                .push_bind(window.end)
                .push(" AND end_time > ")
                .push_bind(window.start);
        }
        if let Some(customer_id) = filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(dispatch_id) = &filter.dispatch_id {
            query.push(" AND dispatch_id = ").push_bind(dispatch_id.as_str());
        }
        if filter.rated_only {
            query.push(" AND rating IS NOT NULL");
        }
        query.push(" ORDER BY task_id");
        query
    }

    /// Moves a requested task to in-progress and vanishes its requested
    /// siblings in one transaction. Siblings are locked in `task_id` order
    /// so concurrent acceptances of one dispatch queue behind each other.
    async fn claim_dispatched(
        &self,
        task_id: i32,
        worker_id: i32,
        hourly_rate: f64,
        total_cost: f64,
    ) -> sqlx::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let dispatch_id: Option<Option<String>> =
            sqlx::query_scalar("SELECT dispatch_id FROM Tasks_ WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(dispatch_id) = dispatch_id else {
            return Ok(false);
        };

        if let Some(dispatch_id) = &dispatch_id {
            let statuses: Vec<String> = sqlx::query_scalar(SIBLING_LOCK_SQL)
                .bind(dispatch_id.as_str())
                .fetch_all(&mut *tx)
                .await?;
            let already_taken = statuses.iter().any(|status| {
                status == TaskStatus::InProgress.as_str() || status == TaskStatus::Completed.as_str()
            });
            if already_taken {
                debug!("Dispatch {} already has an accepted task", dispatch_id);
                return Ok(false);
            }
        }

        let claimed = sqlx::query(
            "UPDATE Tasks_ SET status = ?, hourly_rate = ?, total_cost = ?
             WHERE task_id = ? AND worker_id = ? AND status = ?",
        )
        .bind(TaskStatus::InProgress.as_str())
        .bind(hourly_rate)
        .bind(total_cost)
        .bind(task_id)
        .bind(worker_id)
        .bind(TaskStatus::Requested.as_str())
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() != 1 {
            return Ok(false);
        }

        if let Some(dispatch_id) = &dispatch_id {
            let vanished = sqlx::query(
                "UPDATE Tasks_ SET status = ? WHERE dispatch_id = ? AND task_id <> ? AND status = ?",
            )
            .bind(TaskStatus::Vanished.as_str())
            .bind(dispatch_id.as_str())
            .bind(task_id)
            .bind(TaskStatus::Requested.as_str())
            .execute(&mut *tx)
            .await?;
            debug!(
                "Vanished {} sibling(s) of task {} in dispatch {}",
                vanished.rows_affected(),
                task_id,
                dispatch_id
            );
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl MarketStore for MySqlStore {
    async fn query_workers(&self, available: Option<bool>) -> MarketResult<Vec<Worker>> {
        let workers = match available {
            Some(flag) => {
                sqlx::query_as::<_, Worker>(
                    "SELECT worker_id, user_id, is_available, skills, hourly_rate
                     FROM Workers_ WHERE is_available = ? ORDER BY worker_id",
                )
                .bind(flag)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Worker>(
                    "SELECT worker_id, user_id, is_available, skills, hourly_rate
                     FROM Workers_ ORDER BY worker_id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(workers)
    }

    async fn find_worker(&self, worker_id: i32) -> MarketResult<Option<Worker>> {
        let worker = sqlx::query_as::<_, Worker>(
            "SELECT worker_id, user_id, is_available, skills, hourly_rate
             FROM Workers_ WHERE worker_id = ?",
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(worker)
    }

    async fn query_tasks(&self, filter: &TaskFilter) -> MarketResult<Vec<Task>> {
        let rows = Self::filtered_tasks_query(filter)
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await?;
        into_tasks(rows)
    }

    async fn find_task(&self, task_id: i32) -> MarketResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM Tasks_ WHERE task_id = ?"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Task::try_from).transpose()
    }

    async fn create_tasks(&self, tasks: &[NewTask]) -> MarketResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            let result = sqlx::query(
                "INSERT INTO Tasks_
                 (customer_id, worker_id, title, description, location, start_time, end_time, status, dispatch_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(new_task.customer_id)
            .bind(new_task.worker_id)
            .bind(new_task.title.as_str())
            .bind(new_task.description.as_str())
            .bind(new_task.location.as_str())
            .bind(new_task.window.start)
            .bind(new_task.window.end)
            .bind(TaskStatus::Requested.as_str())
            .bind(new_task.dispatch_id.as_deref())
            .execute(&mut *tx)
            .await?;

            let task_id = i32::try_from(result.last_insert_id())
                .map_err(|_| MarketError::Internal("task id out of range".into()))?;
            let row = sqlx::query_as::<_, TaskRow>(&format!(
                "SELECT {TASK_COLUMNS} FROM Tasks_ WHERE task_id = ?"
            ))
            .bind(task_id)
            .fetch_one(&mut *tx)
            .await?;
            created.push(Task::try_from(row)?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn atomic_update_if_status(
        &self,
        task_id: i32,
        expected: TaskStatus,
        new: TaskStatus,
    ) -> MarketResult<bool> {
        let result = sqlx::query("UPDATE Tasks_ SET status = ? WHERE task_id = ? AND status = ?")
            .bind(new.as_str())
            .bind(task_id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn accept_dispatched(
        &self,
        task_id: i32,
        worker_id: i32,
        hourly_rate: f64,
        total_cost: f64,
    ) -> MarketResult<bool> {
        match self
            .claim_dispatched(task_id, worker_id, hourly_rate, total_cost)
            .await
        {
            Ok(claimed) => Ok(claimed),
            Err(err) if is_lock_conflict(&err) => {
                warn!("Acceptance of task {} lost a lock race: {}", task_id, err);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn set_rating_once(
        &self,
        task_id: i32,
        customer_id: i32,
        rating: i32,
        review: Option<String>,
    ) -> MarketResult<bool> {
        let result = sqlx::query(
            "UPDATE Tasks_ SET rating = ?, review = ?
             WHERE task_id = ? AND customer_id = ? AND status = ? AND rating IS NULL",
        )
        .bind(rating)
        .bind(review)
        .bind(task_id)
        .bind(customer_id)
        .bind(TaskStatus::Completed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn aggregate_worker_stats(&self, worker_id: i32) -> MarketResult<WorkerStats> {
        let ratings: Vec<Option<i32>> =
            sqlx::query_scalar("SELECT rating FROM Tasks_ WHERE worker_id = ? AND status = ?")
                .bind(worker_id)
                .bind(TaskStatus::Completed.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(WorkerStats::from_completed(ratings))
    }

    async fn find_session_caller(&self, session_id: &str) -> MarketResult<Option<Caller>> {
        let caller = sqlx::query_as::<_, Caller>(
            "SELECT u.user_id, u.user_name, c.customer_id, w.worker_id
             FROM Sessions_ s
             JOIN Users_ u ON s.user_id = u.user_id
             LEFT JOIN Customers_ c ON c.user_id = u.user_id
             LEFT JOIN Workers_ w ON w.user_id = u.user_id
             WHERE s.session_id = ? AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        if caller.is_none() {
            warn!("Invalid or expired session ID: {}", session_id);
        }
        Ok(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TimeWindow;
    use chrono::NaiveDate;
    use sqlx::Execute;

    #[test]
    fn empty_filter_selects_everything() {
        let filter = TaskFilter::default();
        let mut query = MySqlStore::filtered_tasks_query(&filter);
        let sql = query.build().sql().to_string();
        assert!(sql.ends_with("FROM Tasks_ WHERE 1 = 1 ORDER BY task_id"));
    }

    #[test]
    fn conflict_filter_renders_half_open_overlap() {
        let day = NaiveDate::from_ymd_opt(2023, 4, 23).unwrap();
        let window = TimeWindow::new(
            day.and_hms_opt(10, 30, 0).unwrap(),
            day.and_hms_opt(11, 30, 0).unwrap(),
        )
        .unwrap();
        let filter = TaskFilter::default()
            .with_status(TaskStatus::InProgress)
            .with_workers(vec![1, 2])
            .overlapping(window);
        let mut query = MySqlStore::filtered_tasks_query(&filter);
        let sql = query.build().sql().to_string();
        assert!(sql.contains("status = ?"));
        assert!(sql.contains("worker_id IN (?, ?)"));
        assert!(sql.contains("start_time < ? AND end_time > ?"));
    }

    #[test]
    fn siblings_are_locked_in_task_order() {
        assert!(SIBLING_LOCK_SQL.ends_with("ORDER BY task_id FOR UPDATE"));
    }

    #[test]
    fn lock_races_count_as_lost_acceptances() {
        assert!(is_lock_conflict_number(1213));
        assert!(is_lock_conflict_number(1205));
        assert!(!is_lock_conflict_number(1062));
        assert!(!is_lock_conflict(&sqlx::Error::RowNotFound));
        assert!(!is_lock_conflict(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn empty_worker_set_matches_nothing() {
        let filter = TaskFilter::default().with_workers(Vec::new());
        let mut query = MySqlStore::filtered_tasks_query(&filter);
        let sql = query.build().sql().to_string();
        assert!(sql.contains("AND 1 = 0"));
    }
}
