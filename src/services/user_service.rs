use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{is_unique_violation, DatabaseError};
use crate::database::models::{Membership, MembershipRole, User};

const MEMBERSHIP_PK: &str = "users_organizations_pkey";

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub memberships: Vec<Membership>,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, display_name, email, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User"))?;

        let memberships = self.memberships(user_id).await?;
        Ok(UserProfile { user, memberships })
    }

    pub async fn memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT uo.user_id, u.display_name, uo.organization_id, o.name AS organization_name,
                   uo.role, uo.joined_at
            FROM users_organizations uo
            JOIN users u ON u.id = uo.user_id
            JOIN organizations o ON o.id = uo.organization_id
            WHERE uo.user_id = $1
            ORDER BY uo.joined_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Join the organization whose admin code or public code matches `code`.
    ///
    /// An admin-code match grants `admin`, a public-code match grants `member`.
    pub async fn join_by_code(&self, user_id: Uuid, code: &str) -> Result<Membership, DatabaseError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DatabaseError::validation("code is required"));
        }

        let matched: Option<(Uuid, bool)> = sqlx::query_as(
            r#"
            SELECT id, admin_code IS NOT NULL AND admin_code = $1 AS is_admin
            FROM organizations
            WHERE org_code = $1 OR admin_code = $1
            ORDER BY is_admin DESC
            LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        let (organization_id, is_admin) = matched.ok_or_else(|| DatabaseError::not_found("Organization"))?;
        let role = role_for_match(is_admin);

        sqlx::query("INSERT INTO users_organizations (user_id, organization_id, role) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(organization_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err, MEMBERSHIP_PK) {
                    DatabaseError::conflict("Already a member of this organization")
                } else {
                    err.into()
                }
            })?;

        tracing::info!("User {} joined organization {} as {}", user_id, organization_id, role.as_str());

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT uo.user_id, u.display_name, uo.organization_id, o.name AS organization_name,
                   uo.role, uo.joined_at
            FROM users_organizations uo
            JOIN users u ON u.id = uo.user_id
            JOIN organizations o ON o.id = uo.organization_id
            WHERE uo.user_id = $1 AND uo.organization_id = $2
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(membership)
    }
}

pub fn role_for_match(is_admin_code: bool) -> MembershipRole {
    if is_admin_code {
        MembershipRole::Admin
    } else {
        MembershipRole::Member
    }
}
