use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::manager::{is_foreign_key_violation, is_unique_violation, DatabaseError};
use crate::database::models::{
    ActivityKind, ActivityLog, CaseStatus, IssueCase, IssueType, NewActivity, RatingSummary,
};
use crate::middleware::AuthUser;
use crate::services::activity::{self, ChangeSubject};
use crate::services::organization_service::OrgScope;
use crate::services::{case_code, rating_service};

const CASE_CODE_CONSTRAINT: &str = "issue_cases_case_code_key";
const ISSUE_TYPE_FK: &str = "issue_cases_issue_type_id_fkey";
const CASE_ORGANIZATION_FK: &str = "case_organizations_organization_id_fkey";
const CASE_ORGANIZATION_PK: &str = "case_organizations_pkey";

/// Validated input for a new case
#[derive(Debug, Clone)]
pub struct NewCase {
    pub title: String,
    pub description: Option<String>,
    pub issue_type_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
    pub organization_ids: Vec<Uuid>,
}

/// How a single case is addressed
#[derive(Debug, Clone)]
pub enum CaseLookup {
    Id(Uuid),
    Code(String),
}

/// Optional sections of a case detail response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailInclude {
    pub timeline: bool,
    pub organizations: bool,
    pub rating: bool,
}

impl DetailInclude {
    /// Parse a comma list such as `timeline,organizations`; unknown entries are ignored
    pub fn parse(raw: Option<&str>) -> Self {
        let mut include = Self::default();
        for part in raw.unwrap_or_default().split(',').map(str::trim) {
            match part {
                "timeline" => include.timeline = true,
                "organizations" => include.organizations = true,
                "rating" => include.rating = true,
                "all" => {
                    include = Self {
                        timeline: true,
                        organizations: true,
                        rating: true,
                    }
                }
                _ => {}
            }
        }
        include
    }
}

/// Organization a case is assigned to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseAssignment {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub is_viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub case: IssueCase,
    pub issue_type: Option<IssueType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<CaseAssignment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<ActivityLog>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingSummary>,
}

#[derive(Debug, Clone)]
pub struct CaseFilter {
    pub scope: Option<OrgScope>,
    pub status: Option<CaseStatus>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CasePage {
    pub items: Vec<IssueCase>,
    pub total: i64,
}

/// Result of a status or category mutation
#[derive(Debug, Clone, Serialize)]
pub struct CaseChange {
    pub case: IssueCase,
    pub activity_id: Uuid,
    pub old_value: String,
    pub new_value: String,
}

/// Result of opening an assignment
#[derive(Debug, Clone, Serialize)]
pub struct ViewOutcome {
    pub status_changed: bool,
    pub status: String,
    pub activity_id: Uuid,
}

/// Source of candidate case codes
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub struct CaseService {
    pool: PgPool,
    code_max_attempts: u32,
    generate_code: CodeGenerator,
}

impl CaseService {
    pub fn new(pool: PgPool, code_max_attempts: u32) -> Self {
        Self {
            pool,
            code_max_attempts: code_max_attempts.max(1),
            generate_code: Arc::new(case_code::generate),
        }
    }

    /// Replace the random case-code source
    pub fn with_code_generator(mut self, generate: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generate_code = Arc::new(generate);
        self
    }

    /// Create a case with a fresh case code, its assignments and the initial activity row.
    ///
    /// Each insert attempt runs in a savepoint so a case-code collision can be retried
    /// without aborting the surrounding transaction.
    pub async fn create(&self, input: NewCase, reporter: Option<&AuthUser>) -> Result<IssueCase, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut attempt = 0;
        let case = loop {
            attempt += 1;
            let code = (self.generate_code)();

            let mut savepoint = tx.begin().await?;
            match insert_case(&mut savepoint, &code, &input, reporter.map(|u| u.id)).await {
                Ok(case) => {
                    savepoint.commit().await?;
                    break case;
                }
                Err(err) if is_unique_violation(&err, CASE_CODE_CONSTRAINT) => {
                    savepoint.rollback().await?;
                    tracing::warn!("Case code {} collided (attempt {}/{})", code, attempt, self.code_max_attempts);
                    if attempt >= self.code_max_attempts {
                        return Err(DatabaseError::conflict(format!(
                            "Could not allocate a unique case code after {} attempts",
                            attempt
                        )));
                    }
                }
                Err(err) if is_foreign_key_violation(&err, ISSUE_TYPE_FK) => {
                    return Err(DatabaseError::validation(format!(
                        "Unknown issue_type_id {}",
                        input.issue_type_id
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        };

        if !input.organization_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO case_organizations (case_id, organization_id)
                SELECT $1, org_id FROM UNNEST($2::uuid[]) AS org_id
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(case.id)
            .bind(&input.organization_ids)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err, CASE_ORGANIZATION_FK) {
                    DatabaseError::validation("Unknown organization in organization_ids")
                } else {
                    err.into()
                }
            })?;
        }

        let actor = reporter.map(|u| u.display_name.as_str());
        activity::append(
            &mut tx,
            NewActivity {
                case_id: case.id,
                changed_by: reporter.map(|u| u.id),
                kind: ActivityKind::Created,
                old_value: None,
                new_value: Some(case.status.clone()),
                comment: Some(activity::compose_note_comment(
                    actor,
                    &format!("แจ้งเรื่อง {}", case.case_code),
                    case.cover_image_url.is_some(),
                )),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Created case {} ({}) after {} attempt(s)", case.case_code, case.id, attempt);
        Ok(case)
    }

    /// Single read path behind both the id and case-code lookups
    pub async fn detail(&self, lookup: CaseLookup, include: DetailInclude) -> Result<CaseDetail, DatabaseError> {
        let case = match &lookup {
            CaseLookup::Id(id) => {
                sqlx::query_as::<_, IssueCase>("SELECT * FROM issue_cases WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            CaseLookup::Code(code) => {
                sqlx::query_as::<_, IssueCase>("SELECT * FROM issue_cases WHERE case_code = $1")
                    .bind(code.trim().to_ascii_uppercase())
                    .fetch_optional(&self.pool)
                    .await?
            }
        }
        .ok_or_else(|| DatabaseError::not_found("Case"))?;

        let issue_type = sqlx::query_as::<_, IssueType>("SELECT id, name, icon FROM issue_types WHERE id = $1")
            .bind(case.issue_type_id)
            .fetch_optional(&self.pool)
            .await?;

        let organizations = if include.organizations {
            Some(self.assignments(case.id).await?)
        } else {
            None
        };

        let timeline = if include.timeline {
            Some(activity::timeline(&self.pool, case.id).await?)
        } else {
            None
        };

        let rating = if include.rating {
            Some(rating_service::summarize(&self.pool, case.id).await?)
        } else {
            None
        };

        Ok(CaseDetail {
            case,
            issue_type,
            organizations,
            timeline,
            rating,
        })
    }

    pub async fn assignments(&self, case_id: Uuid) -> Result<Vec<CaseAssignment>, DatabaseError> {
        let rows = sqlx::query_as::<_, CaseAssignment>(
            r#"
            SELECT co.organization_id, o.name AS organization_name, co.is_viewed, co.viewed_at,
                   co.created_at AS assigned_at
            FROM case_organizations co
            JOIN organizations o ON o.id = co.organization_id
            WHERE co.case_id = $1
            ORDER BY co.created_at
            "#,
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Timeline for a case that must exist
    pub async fn activities(&self, case_id: Uuid) -> Result<Vec<ActivityLog>, DatabaseError> {
        self.ensure_exists(case_id).await?;
        activity::timeline(&self.pool, case_id).await
    }

    pub async fn list(&self, filter: CaseFilter) -> Result<CasePage, DatabaseError> {
        let (org_id, include_children) = match filter.scope {
            Some(scope) => (Some(scope.organization_id), scope.include_children),
            None => (None, false),
        };
        let status = filter.status.map(|s| s.as_str());

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM case_organizations co
                    JOIN organization_closure oc ON oc.descendant_id = co.organization_id
                    WHERE co.case_id = c.id AND oc.ancestor_id = $1 AND ($2 OR oc.depth = 0)))
              AND ($3::text IS NULL OR c.status = $3)
        "#;

        let items = sqlx::query_as::<_, IssueCase>(&format!(
            "SELECT c.* FROM issue_cases c {} ORDER BY c.created_at DESC, c.id LIMIT $4 OFFSET $5",
            WHERE
        ))
        .bind(org_id)
        .bind(include_children)
        .bind(status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM issue_cases c {}", WHERE))
            .bind(org_id)
            .bind(include_children)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(CasePage { items, total })
    }

    /// Set a new status; the old value is re-read under a row lock, never taken from the client
    pub async fn update_status(
        &self,
        case_id: Uuid,
        new_status: CaseStatus,
        actor: &AuthUser,
        note: Option<&str>,
        has_image: bool,
    ) -> Result<CaseChange, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let old_status = lock_case_status(&mut tx, case_id).await?;

        let case = sqlx::query_as::<_, IssueCase>(
            r#"
            UPDATE issue_cases
            SET status = $2,
                updated_at = now(),
                resolved_at = CASE WHEN $3 THEN COALESCE(resolved_at, now()) ELSE NULL END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(new_status.as_str())
        .bind(new_status == CaseStatus::Completed)
        .fetch_one(&mut *tx)
        .await?;

        let comment = activity::compose_change_comment(
            Some(&actor.display_name),
            ChangeSubject::Status,
            &old_status,
            new_status.as_str(),
            note,
            has_image,
        );

        let activity_id = activity::append(
            &mut tx,
            NewActivity {
                case_id,
                changed_by: Some(actor.id),
                kind: ActivityKind::StatusChange,
                old_value: Some(old_status.clone()),
                new_value: Some(new_status.as_str().to_string()),
                comment: Some(comment),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Case {} status {} -> {} by {}", case_id, old_status, new_status, actor.id);
        Ok(CaseChange {
            case,
            activity_id,
            old_value: old_status,
            new_value: new_status.as_str().to_string(),
        })
    }

    /// Move a case to another issue type; old and new values are stored as type ids
    pub async fn update_category(
        &self,
        case_id: Uuid,
        new_type_id: i32,
        actor: &AuthUser,
        note: Option<&str>,
        has_image: bool,
    ) -> Result<CaseChange, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(i32, String)> = sqlx::query_as(
            r#"
            SELECT c.issue_type_id, t.name
            FROM issue_cases c
            JOIN issue_types t ON t.id = c.issue_type_id
            WHERE c.id = $1
            FOR UPDATE OF c
            "#,
        )
        .bind(case_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (old_type_id, old_type_name) = current.ok_or_else(|| DatabaseError::not_found("Case"))?;

        let new_type_name: Option<(String,)> = sqlx::query_as("SELECT name FROM issue_types WHERE id = $1")
            .bind(new_type_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (new_type_name,) =
            new_type_name.ok_or_else(|| DatabaseError::validation(format!("Unknown issue_type_id {}", new_type_id)))?;

        let case = sqlx::query_as::<_, IssueCase>(
            "UPDATE issue_cases SET issue_type_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(case_id)
        .bind(new_type_id)
        .fetch_one(&mut *tx)
        .await?;

        let comment = activity::compose_change_comment(
            Some(&actor.display_name),
            ChangeSubject::Category,
            &old_type_name,
            &new_type_name,
            note,
            has_image,
        );

        let activity_id = activity::append(
            &mut tx,
            NewActivity {
                case_id,
                changed_by: Some(actor.id),
                kind: ActivityKind::TypeChange,
                old_value: Some(old_type_id.to_string()),
                new_value: Some(new_type_id.to_string()),
                comment: Some(comment),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Case {} type {} -> {} by {}", case_id, old_type_id, new_type_id, actor.id);
        Ok(CaseChange {
            case,
            activity_id,
            old_value: old_type_id.to_string(),
            new_value: new_type_id.to_string(),
        })
    }

    /// Append a comment-only activity row
    pub async fn add_comment(
        &self,
        case_id: Uuid,
        actor: &AuthUser,
        note: &str,
        has_image: bool,
    ) -> Result<Uuid, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        lock_case_status(&mut tx, case_id).await?;

        let entry = NewActivity {
            case_id,
            changed_by: Some(actor.id),
            kind: ActivityKind::Comment,
            old_value: None,
            new_value: None,
            comment: Some(activity::compose_note_comment(Some(&actor.display_name), note, has_image)),
        };

        let activity_id = activity::append(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(activity_id)
    }

    /// Link a case to an organization and record the hand-off
    pub async fn assign_organization(
        &self,
        case_id: Uuid,
        organization_id: Uuid,
        actor: &AuthUser,
    ) -> Result<CaseAssignment, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        lock_case_status(&mut tx, case_id).await?;

        let org: Option<(String,)> = sqlx::query_as("SELECT name FROM organizations WHERE id = $1")
            .bind(organization_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (org_name,) = org.ok_or_else(|| DatabaseError::not_found("Organization"))?;

        let assignment = sqlx::query_as::<_, CaseAssignment>(
            r#"
            INSERT INTO case_organizations (case_id, organization_id)
            VALUES ($1, $2)
            RETURNING organization_id, $3::text AS organization_name, is_viewed, viewed_at,
                      created_at AS assigned_at
            "#,
        )
        .bind(case_id)
        .bind(organization_id)
        .bind(&org_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, CASE_ORGANIZATION_PK) {
                DatabaseError::conflict("Case is already assigned to this organization")
            } else {
                err.into()
            }
        })?;

        activity::append(
            &mut tx,
            NewActivity {
                case_id,
                changed_by: Some(actor.id),
                kind: ActivityKind::Assignment,
                old_value: None,
                new_value: Some(organization_id.to_string()),
                comment: Some(activity::compose_assignment_comment(Some(&actor.display_name), &org_name)),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Case {} assigned to organization {}", case_id, organization_id);
        Ok(assignment)
    }

    /// Mark an organization's assignment as viewed.
    ///
    /// The first view of a pending case moves it to coordinating and logs a status change;
    /// every other view logs a comment row. Exactly one activity row per call; any failure
    /// rolls the whole sequence back.
    pub async fn mark_viewed(
        &self,
        case_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<ViewOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current_status = lock_case_status(&mut tx, case_id).await?;

        let actor: Option<(String,)> = sqlx::query_as("SELECT display_name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (actor_name,) = actor.ok_or_else(|| DatabaseError::not_found("User"))?;

        let assignment: Option<(bool, String)> = sqlx::query_as(
            r#"
            SELECT co.is_viewed, o.name
            FROM case_organizations co
            JOIN organizations o ON o.id = co.organization_id
            WHERE co.case_id = $1 AND co.organization_id = $2
            FOR UPDATE OF co
            "#,
        )
        .bind(case_id)
        .bind(organization_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (already_viewed, org_name) = assignment.ok_or_else(|| DatabaseError::not_found("Assignment"))?;

        if !already_viewed {
            sqlx::query(
                "UPDATE case_organizations SET is_viewed = true, viewed_at = now() WHERE case_id = $1 AND organization_id = $2",
            )
            .bind(case_id)
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;
        }

        let transition = view_transition(already_viewed, &current_status);

        let (status, entry) = match transition {
            Some(next) => {
                sqlx::query("UPDATE issue_cases SET status = $2, updated_at = now() WHERE id = $1")
                    .bind(case_id)
                    .bind(next.as_str())
                    .execute(&mut *tx)
                    .await?;

                let comment = activity::compose_change_comment(
                    Some(&actor_name),
                    ChangeSubject::Status,
                    &current_status,
                    next.as_str(),
                    Some(&org_name),
                    false,
                );
                let entry = NewActivity {
                    case_id,
                    changed_by: Some(user_id),
                    kind: ActivityKind::StatusChange,
                    old_value: Some(current_status.clone()),
                    new_value: Some(next.as_str().to_string()),
                    comment: Some(comment),
                };
                (next.as_str().to_string(), entry)
            }
            None => {
                let entry = NewActivity {
                    case_id,
                    changed_by: Some(user_id),
                    kind: ActivityKind::Comment,
                    old_value: None,
                    new_value: None,
                    comment: Some(activity::compose_view_comment(Some(&actor_name), &org_name)),
                };
                (current_status.clone(), entry)
            }
        };

        let activity_id = activity::append(&mut tx, entry).await?;

        tx.commit().await?;

        tracing::info!(
            "Case {} viewed by {} for organization {} (status changed: {})",
            case_id,
            user_id,
            organization_id,
            transition.is_some()
        );
        Ok(ViewOutcome {
            status_changed: transition.is_some(),
            status,
            activity_id,
        })
    }

    pub async fn issue_types(&self) -> Result<Vec<IssueType>, DatabaseError> {
        let rows = sqlx::query_as::<_, IssueType>("SELECT id, name, icon FROM issue_types ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn ensure_exists(&self, case_id: Uuid) -> Result<(), DatabaseError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM issue_cases WHERE id = $1")
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await?;
        found.map(|_| ()).ok_or_else(|| DatabaseError::not_found("Case"))
    }
}

/// Status a case moves to when an assignment is opened, if any.
///
/// Only the first view of a pending case transitions it.
pub fn view_transition(already_viewed: bool, current_status: &str) -> Option<CaseStatus> {
    match current_status.parse::<CaseStatus>() {
        Ok(CaseStatus::Pending) if !already_viewed => Some(CaseStatus::Coordinating),
        _ => None,
    }
}

async fn insert_case(
    conn: &mut PgConnection,
    code: &str,
    input: &NewCase,
    reporter_id: Option<Uuid>,
) -> Result<IssueCase, sqlx::Error> {
    sqlx::query_as::<_, IssueCase>(
        r#"
        INSERT INTO issue_cases
            (case_code, title, description, status, issue_type_id, latitude, longitude,
             cover_image_url, tags, reporter_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(&input.title)
    .bind(&input.description)
    .bind(CaseStatus::default().as_str())
    .bind(input.issue_type_id)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(&input.cover_image_url)
    .bind(&input.tags)
    .bind(reporter_id)
    .fetch_one(conn)
    .await
}

/// Lock the case row and return its current status
async fn lock_case_status(conn: &mut PgConnection, case_id: Uuid) -> Result<String, DatabaseError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM issue_cases WHERE id = $1 FOR UPDATE")
        .bind(case_id)
        .fetch_optional(conn)
        .await?;
    row.map(|(status,)| status).ok_or_else(|| DatabaseError::not_found("Case"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_view_of_pending_case_coordinates() {
        assert_eq!(
            view_transition(false, CaseStatus::Pending.as_str()),
            Some(CaseStatus::Coordinating)
        );
    }

    #[test]
    fn repeat_views_do_not_transition() {
        assert_eq!(view_transition(true, CaseStatus::Pending.as_str()), None);
        assert_eq!(view_transition(false, CaseStatus::InProgress.as_str()), None);
        assert_eq!(view_transition(false, "legacy-status"), None);
    }

    #[test]
    fn include_parsing() {
        assert_eq!(DetailInclude::parse(None), DetailInclude::default());
        let include = DetailInclude::parse(Some("timeline, rating,bogus"));
        assert!(include.timeline && include.rating && !include.organizations);
        let all = DetailInclude::parse(Some("all"));
        assert!(all.timeline && all.rating && all.organizations);
    }
}
