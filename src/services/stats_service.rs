// Read-only aggregates scoped to an organization (optionally its whole subtree)

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::services::organization_service::OrgScope;

/// Restricts `issue_cases c` to cases assigned inside the scope; binds $1 (org id) and $2 (include children)
const SCOPED_CASE: &str = r#"
    EXISTS (
        SELECT 1 FROM case_organizations co
        JOIN organization_closure oc ON oc.descendant_id = co.organization_id
        WHERE co.case_id = c.id AND oc.ancestor_id = $1 AND ($2 OR oc.depth = 0)
    )
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsInterval {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl StatsInterval {
    pub fn days(&self) -> i32 {
        match self {
            StatsInterval::Week => 7,
            StatsInterval::Month => 30,
            StatsInterval::Quarter => 90,
            StatsInterval::Year => 365,
        }
    }
}

impl FromStr for StatsInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" | "week" => Ok(StatsInterval::Week),
            "30d" | "month" => Ok(StatsInterval::Month),
            "90d" | "quarter" => Ok(StatsInterval::Quarter),
            "365d" | "year" => Ok(StatsInterval::Year),
            other => Err(format!("unsupported interval '{}', expected 7d, 30d, 90d or 365d", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TypeCount {
    pub issue_type_id: i32,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: Vec<TypeCount>,
    pub average_resolution_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub created: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Satisfaction {
    pub average_score: f64,
    pub total_ratings: i64,
    pub distribution: BTreeMap<String, i64>,
}

pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Status counts, type counts and mean resolution time, fetched concurrently
    pub async fn overview(&self, scope: OrgScope) -> Result<Overview, DatabaseError> {
        self.ensure_scope(scope).await?;

        let status_sql = format!(
            "SELECT c.status, COUNT(*) FROM issue_cases c WHERE {} GROUP BY c.status",
            SCOPED_CASE
        );
        let type_sql = format!(
            r#"
            SELECT t.id AS issue_type_id, t.name, COUNT(c.id) AS count
            FROM issue_cases c
            JOIN issue_types t ON t.id = c.issue_type_id
            WHERE {}
            GROUP BY t.id, t.name
            ORDER BY count DESC, t.id
            "#,
            SCOPED_CASE
        );
        let resolution_sql = format!(
            r#"
            SELECT (AVG(EXTRACT(EPOCH FROM (c.resolved_at - c.created_at))) / 3600.0)::float8
            FROM issue_cases c
            WHERE c.resolved_at IS NOT NULL AND {}
            "#,
            SCOPED_CASE
        );

        let by_status_query = sqlx::query_as::<_, (String, i64)>(&status_sql)
            .bind(scope.organization_id)
            .bind(scope.include_children)
            .fetch_all(&self.pool);
        let by_type_query = sqlx::query_as::<_, TypeCount>(&type_sql)
            .bind(scope.organization_id)
            .bind(scope.include_children)
            .fetch_all(&self.pool);
        let resolution_query = sqlx::query_as::<_, (Option<f64>,)>(&resolution_sql)
            .bind(scope.organization_id)
            .bind(scope.include_children)
            .fetch_one(&self.pool);

        let (status_rows, by_type, (average_resolution_hours,)) =
            tokio::try_join!(by_status_query, by_type_query, resolution_query)?;

        let total = status_rows.iter().map(|(_, n)| n).sum();
        Ok(Overview {
            total,
            by_status: status_rows.into_iter().collect(),
            by_type,
            average_resolution_hours: average_resolution_hours.map(round2),
        })
    }

    /// One bucket per day for the last `interval` days, zero-filled
    pub async fn timeseries(&self, scope: OrgScope, interval: StatsInterval) -> Result<Vec<DailyBucket>, DatabaseError> {
        self.ensure_scope(scope).await?;

        let sql = format!(
            r#"
            WITH days AS (
                SELECT generate_series(
                    (now() AT TIME ZONE 'UTC')::date - ($3::int - 1),
                    (now() AT TIME ZONE 'UTC')::date,
                    interval '1 day'
                )::date AS day
            ),
            scoped AS (
                SELECT (c.created_at AT TIME ZONE 'UTC')::date AS created_day,
                       (c.resolved_at AT TIME ZONE 'UTC')::date AS resolved_day
                FROM issue_cases c
                WHERE {}
            )
            SELECT d.day AS date,
                   (SELECT COUNT(*) FROM scoped s WHERE s.created_day = d.day) AS created,
                   (SELECT COUNT(*) FROM scoped s WHERE s.resolved_day = d.day) AS completed
            FROM days d
            ORDER BY d.day
            "#,
            SCOPED_CASE
        );

        let rows = sqlx::query_as::<_, DailyBucket>(&sql)
            .bind(scope.organization_id)
            .bind(scope.include_children)
            .bind(interval.days())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn satisfaction(&self, scope: OrgScope) -> Result<Satisfaction, DatabaseError> {
        self.ensure_scope(scope).await?;

        let sql = format!(
            r#"
            SELECT r.score, COUNT(*)
            FROM case_ratings r
            JOIN issue_cases c ON c.id = r.case_id
            WHERE {}
            GROUP BY r.score
            "#,
            SCOPED_CASE
        );
        let rows = sqlx::query_as::<_, (i16, i64)>(&sql)
            .bind(scope.organization_id)
            .bind(scope.include_children)
            .fetch_all(&self.pool)
            .await?;

        Ok(summarize_distribution(&rows))
    }

    async fn ensure_scope(&self, scope: OrgScope) -> Result<(), DatabaseError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE id = $1")
            .bind(scope.organization_id)
            .fetch_optional(&self.pool)
            .await?;
        found.map(|_| ()).ok_or_else(|| DatabaseError::not_found("Organization"))
    }
}

/// Fold `(score, count)` rows into a 1..=5 distribution with a weighted average
pub fn summarize_distribution(rows: &[(i16, i64)]) -> Satisfaction {
    let mut distribution: BTreeMap<String, i64> = (1..=5).map(|s| (s.to_string(), 0)).collect();
    let mut total = 0i64;
    let mut weighted = 0i64;

    for &(score, count) in rows {
        if let Some(slot) = distribution.get_mut(&score.to_string()) {
            *slot += count;
            total += count;
            weighted += i64::from(score) * count;
        }
    }

    let average_score = if total == 0 {
        0.0
    } else {
        round2(weighted as f64 / total as f64)
    };

    Satisfaction {
        average_score,
        total_ratings: total,
        distribution,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
