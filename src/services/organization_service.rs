// Organizations and their closure-table hierarchy
//
// Every organization is its own ancestor at depth 0, and depth is always the
// graph distance between ancestor and descendant.

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::manager::{is_unique_violation, DatabaseError};
use crate::database::models::{Membership, Organization, OrganizationNode};

const ORG_CODE_CONSTRAINT: &str = "organizations_org_code_key";
const ADMIN_CODE_CONSTRAINT: &str = "organizations_admin_code_key";

/// `pg_advisory_xact_lock` key serializing hierarchy moves
const HIERARCHY_LOCK_KEY: i64 = 0x0c1c_0a5e_0000_0001;

/// Organization subtree a query is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrgScope {
    pub organization_id: Uuid,
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub org_code: String,
    pub admin_code: Option<String>,
    pub name: String,
    pub org_type: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// Partial update. `parent_id: Some(None)` detaches the organization to a root.
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub org_type: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
}

pub struct OrganizationService {
    pool: PgPool,
}

impl OrganizationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the organization, its self row and the ancestor path copied from its parent
    pub async fn create(&self, input: NewOrganization) -> Result<Organization, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = input.parent_id {
            ensure_organization(&mut tx, parent_id, "Parent organization").await?;
        }

        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations
                (org_code, admin_code, name, org_type, province, district, sub_district, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&input.org_code)
        .bind(&input.admin_code)
        .bind(&input.name)
        .bind(&input.org_type)
        .bind(&input.province)
        .bind(&input.district)
        .bind(&input.sub_district)
        .bind(input.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, ORG_CODE_CONSTRAINT) {
                DatabaseError::conflict(format!("Organization code '{}' is already in use", input.org_code))
            } else if is_unique_violation(&err, ADMIN_CODE_CONSTRAINT) {
                DatabaseError::conflict("Admin code is already in use")
            } else {
                err.into()
            }
        })?;

        sqlx::query("INSERT INTO organization_closure (ancestor_id, descendant_id, depth) VALUES ($1, $1, 0)")
            .bind(org.id)
            .execute(&mut *tx)
            .await?;

        if let Some(parent_id) = input.parent_id {
            sqlx::query(
                r#"
                INSERT INTO organization_closure (ancestor_id, descendant_id, depth)
                SELECT ancestor_id, $1, depth + 1
                FROM organization_closure
                WHERE descendant_id = $2
                "#,
            )
            .bind(org.id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!("Created organization {} ({}) under {:?}", org.org_code, org.id, org.parent_id);
        Ok(org)
    }

    /// Update descriptive fields and, when requested, move the organization with its subtree
    pub async fn update(&self, id: Uuid, patch: OrganizationUpdate) -> Result<Organization, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Re-parents run one at a time; the waiter sees the committed closure before its cycle check
        if patch.parent_id.is_some() {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(HIERARCHY_LOCK_KEY)
                .execute(&mut *tx)
                .await?;
        }

        let current = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Organization"))?;

        if let Some(new_parent) = patch.parent_id {
            if new_parent != current.parent_id {
                reparent(&mut tx, id, new_parent).await?;
            }
        }

        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                org_type = COALESCE($3, org_type),
                province = COALESCE($4, province),
                district = COALESCE($5, district),
                sub_district = COALESCE($6, sub_district),
                parent_id = CASE WHEN $7 THEN $8 ELSE parent_id END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.org_type)
        .bind(&patch.province)
        .bind(&patch.district)
        .bind(&patch.sub_district)
        .bind(patch.parent_id.is_some())
        .bind(patch.parent_id.flatten())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Updated organization {} (parent {:?})", org.id, org.parent_id);
        Ok(org)
    }

    pub async fn get(&self, id: Uuid) -> Result<Organization, DatabaseError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Organization"))
    }

    /// Every organization below `id`, nearest first
    pub async fn descendants(&self, id: Uuid) -> Result<Vec<OrganizationNode>, DatabaseError> {
        self.get(id).await?;
        let rows = sqlx::query_as::<_, OrganizationNode>(
            r#"
            SELECT o.id, o.org_code, o.name, o.org_type, o.parent_id, oc.depth
            FROM organization_closure oc
            JOIN organizations o ON o.id = oc.descendant_id
            WHERE oc.ancestor_id = $1 AND oc.depth > 0
            ORDER BY oc.depth, o.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Every organization above `id`, parent first
    pub async fn ancestors(&self, id: Uuid) -> Result<Vec<OrganizationNode>, DatabaseError> {
        self.get(id).await?;
        let rows = sqlx::query_as::<_, OrganizationNode>(
            r#"
            SELECT o.id, o.org_code, o.name, o.org_type, o.parent_id, oc.depth
            FROM organization_closure oc
            JOIN organizations o ON o.id = oc.ancestor_id
            WHERE oc.descendant_id = $1 AND oc.depth > 0
            ORDER BY oc.depth
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn members(&self, id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        self.get(id).await?;
        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT uo.user_id, u.display_name, uo.organization_id, o.name AS organization_name,
                   uo.role, uo.joined_at
            FROM users_organizations uo
            JOIN users u ON u.id = uo.user_id
            JOIN organizations o ON o.id = uo.organization_id
            WHERE uo.organization_id = $1
            ORDER BY uo.role, u.display_name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn ensure_organization(conn: &mut PgConnection, id: Uuid, label: &str) -> Result<(), DatabaseError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    found.map(|_| ()).ok_or_else(|| DatabaseError::not_found(label))
}

/// Rewrite the closure rows that connect `id`'s subtree to the rest of the tree.
///
/// Rows inside the subtree are untouched; rows linking it to old ancestors are removed,
/// and the new parent's ancestor path is joined onto every subtree member.
async fn reparent(conn: &mut PgConnection, id: Uuid, new_parent: Option<Uuid>) -> Result<(), DatabaseError> {
    if let Some(parent_id) = new_parent {
        if parent_id == id {
            return Err(DatabaseError::validation("An organization cannot be its own parent"));
        }
        ensure_organization(&mut *conn, parent_id, "Parent organization").await?;

        let (inside_subtree,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM organization_closure WHERE ancestor_id = $1 AND descendant_id = $2)",
        )
        .bind(id)
        .bind(parent_id)
        .fetch_one(&mut *conn)
        .await?;
        if inside_subtree {
            return Err(DatabaseError::validation(
                "An organization cannot be moved under one of its own descendants",
            ));
        }
    }

    let removed = sqlx::query(
        r#"
        DELETE FROM organization_closure
        WHERE descendant_id IN (SELECT descendant_id FROM organization_closure WHERE ancestor_id = $1)
          AND ancestor_id NOT IN (SELECT descendant_id FROM organization_closure WHERE ancestor_id = $1)
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let mut added = 0;
    if let Some(parent_id) = new_parent {
        added = sqlx::query(
            r#"
            INSERT INTO organization_closure (ancestor_id, descendant_id, depth)
            SELECT above.ancestor_id, below.descendant_id, above.depth + below.depth + 1
            FROM organization_closure above
            CROSS JOIN organization_closure below
            WHERE above.descendant_id = $2
              AND below.ancestor_id = $1
            "#,
        )
        .bind(id)
        .bind(parent_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }

    tracing::debug!(
        "Re-parented organization {} to {:?}: {} closure rows removed, {} added",
        id,
        new_parent,
        removed,
        added
    );
    Ok(())
}
