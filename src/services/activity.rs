// Case activity log: append-only audit trail and human-readable comment composition

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{ActivityLog, NewActivity};

/// Actor label used when a change has no authenticated user
pub const SYSTEM_ACTOR: &str = "ระบบ";

const IMAGE_MARKER: &str = "[แนบรูปภาพ]";

/// Which attribute a change touched, for comment wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSubject {
    Status,
    Category,
}

/// Compose the timeline comment for a status or category change.
///
/// `"<actor> เปลี่ยนสถานะจาก <old> เป็น <new>"`, then `" : <note>"` for a non-blank note,
/// then the image marker when an image was attached.
pub fn compose_change_comment(
    actor: Option<&str>,
    subject: ChangeSubject,
    old_value: &str,
    new_value: &str,
    note: Option<&str>,
    has_image: bool,
) -> String {
    let verb = match subject {
        ChangeSubject::Status => "เปลี่ยนสถานะจาก",
        ChangeSubject::Category => "เปลี่ยนประเภทจาก",
    };
    let head = format!("{} {} {} เป็น {}", actor_label(actor), verb, old_value, new_value);
    append_extras(head, note, has_image)
}

/// Compose a free-standing comment entry: `"<actor>: <note>"` plus image marker
pub fn compose_note_comment(actor: Option<&str>, note: &str, has_image: bool) -> String {
    let head = format!("{}: {}", actor_label(actor), note.trim());
    append_extras(head, None, has_image)
}

/// Comment for an assignment row that was opened without changing status
pub fn compose_view_comment(actor: Option<&str>, organization: &str) -> String {
    format!("{} เปิดดูเรื่อง ({})", actor_label(actor), organization)
}

pub fn compose_assignment_comment(actor: Option<&str>, organization: &str) -> String {
    format!("{} ส่งเรื่องให้ {}", actor_label(actor), organization)
}

fn actor_label(actor: Option<&str>) -> &str {
    match actor.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => SYSTEM_ACTOR,
    }
}

fn append_extras(mut text: String, note: Option<&str>, has_image: bool) -> String {
    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        text.push_str(" : ");
        text.push_str(note);
    }
    if has_image {
        text.push(' ');
        text.push_str(IMAGE_MARKER);
    }
    text
}

/// Append one activity row on the caller's connection (usually an open transaction)
pub async fn append(conn: &mut PgConnection, entry: NewActivity) -> Result<Uuid, DatabaseError> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO case_activity_logs (case_id, changed_by, activity_type, old_value, new_value, comment)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(entry.case_id)
    .bind(entry.changed_by)
    .bind(entry.kind.as_str())
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .bind(&entry.comment)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Appended {} activity {} to case {}", entry.kind.as_str(), id, entry.case_id);
    Ok(id)
}

/// Timeline for a case, newest first
pub async fn timeline(pool: &PgPool, case_id: Uuid) -> Result<Vec<ActivityLog>, DatabaseError> {
    let rows = sqlx::query_as::<_, ActivityLog>(
        r#"
        SELECT l.id, l.case_id, l.changed_by, u.display_name AS changed_by_name,
               l.activity_type, l.old_value, l.new_value, l.comment, l.created_at
        FROM case_activity_logs l
        LEFT JOIN users u ON u.id = l.changed_by
        WHERE l.case_id = $1
        ORDER BY l.created_at DESC, l.id DESC
        "#,
    )
    .bind(case_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
