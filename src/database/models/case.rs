use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row in `issue_cases`.
///
/// `status` stays a plain string on read so rows written with values outside
/// [`CaseStatus`] still load; writes go through [`CaseStatus`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IssueCase {
    pub id: Uuid,
    pub case_code: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_type_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
    pub reporter_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Known case statuses and their stored (Thai) values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CaseStatus {
    #[default]
    Pending,
    Coordinating,
    InProgress,
    Forwarded,
    Invited,
    Rejected,
    Completed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 7] = [
        CaseStatus::Pending,
        CaseStatus::Coordinating,
        CaseStatus::InProgress,
        CaseStatus::Forwarded,
        CaseStatus::Invited,
        CaseStatus::Rejected,
        CaseStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "รอรับเรื่อง",
            CaseStatus::Coordinating => "กำลังประสานงาน",
            CaseStatus::InProgress => "กำลังดำเนินการ",
            CaseStatus::Forwarded => "ส่งต่อ",
            CaseStatus::Invited => "เชิญร่วม",
            CaseStatus::Rejected => "ปฏิเสธ",
            CaseStatus::Completed => "เสร็จสิ้น",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown case status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for CaseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        CaseStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| UnknownStatus(trimmed.to_string()))
    }
}

impl TryFrom<String> for CaseStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CaseStatus> for String {
    fn from(status: CaseStatus) -> Self {
        status.as_str().to_string()
    }
}
