use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// tracing target that carries action-log write failures to monitoring
pub const FAILURE_TARGET: &str = "action_log";

/// Best-effort record of user actions.
///
/// Writes run on a spawned task so the request never waits on them and never fails
/// because of them. Failures are reported on the [`FAILURE_TARGET`] tracing target.
#[derive(Clone)]
pub struct ActionLog {
    pool: PgPool,
}

impl ActionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn record(&self, user_id: Option<Uuid>, action: &'static str, detail: Value) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query("INSERT INTO user_action_logs (user_id, action, detail) VALUES ($1, $2, $3)")
                .bind(user_id)
                .bind(action)
                .bind(&detail)
                .execute(&pool)
                .await;

            if let Err(err) = result {
                tracing::error!(
                    target: FAILURE_TARGET,
                    action,
                    user_id = ?user_id,
                    error = %err,
                    "failed to write action log"
                );
            }
        })
    }
}
