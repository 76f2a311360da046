use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    InternalReview,
    Approval,
    Approved,
    Active,
    Completed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::InternalReview => "internal_review",
            Self::Approval => "approval",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "internal_review" => Ok(Self::InternalReview),
            "approval" => Ok(Self::Approval),
            "approved" => Ok(Self::Approved),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// Outcome recorded for a review or approval gate on a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for GateStatus {
    type Err = GateStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(GateStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`GateStatus`] string.
#[derive(Debug, Clone)]
pub struct GateStatusParseError(pub String);

impl fmt::Display for GateStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid gate status: {:?}", self.0)
    }
}

impl std::error::Error for GateStatusParseError {}

// ---------------------------------------------------------------------------

/// Execution status of a plan activity or subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl FromStr for ActivityStatus {
    type Err = ActivityStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(ActivityStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ActivityStatus`] string.
#[derive(Debug, Clone)]
pub struct ActivityStatusParseError(pub String);

impl fmt::Display for ActivityStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid activity status: {:?}", self.0)
    }
}

impl std::error::Error for ActivityStatusParseError {}

// ---------------------------------------------------------------------------

/// Category tag for a marketing activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    BlogPost,
    LandingPage,
    EmailCampaign,
    SocialPost,
    Webinar,
    AdCampaign,
    Other,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BlogPost => "blog_post",
            Self::LandingPage => "landing_page",
            Self::EmailCampaign => "email_campaign",
            Self::SocialPost => "social_post",
            Self::Webinar => "webinar",
            Self::AdCampaign => "ad_campaign",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for ActivityKind {
    type Err = ActivityKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog_post" => Ok(Self::BlogPost),
            "landing_page" => Ok(Self::LandingPage),
            "email_campaign" => Ok(Self::EmailCampaign),
            "social_post" => Ok(Self::SocialPost),
            "webinar" => Ok(Self::Webinar),
            "ad_campaign" => Ok(Self::AdCampaign),
            "other" => Ok(Self::Other),
            other => Err(ActivityKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ActivityKind`] string.
#[derive(Debug, Clone)]
pub struct ActivityKindParseError(pub String);

impl fmt::Display for ActivityKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid activity kind: {:?}", self.0)
    }
}

impl std::error::Error for ActivityKindParseError {}

// ---------------------------------------------------------------------------

/// Status of a standalone to-do task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A reusable plan blueprint: an ordered set of activities, optionally
/// company-scoped or public.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub strategy: String,
    /// Owning company. `None` means a public/global template.
    pub company_id: Option<Uuid>,
    pub is_public: bool,
    /// Template-level switch: whether this template carries fixed activities.
    pub fixed_activities: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An activity belonging to a template (blueprint form, no execution state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateActivity {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub description: String,
    pub kind: ActivityKind,
    pub duration_days: i32,
    /// Position within the template's ordered activity list. Unique per
    /// template; contiguous 0..n-1 after any reorder.
    pub order_index: i32,
    /// Ids of same-template activities that must complete first.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// When true, the activity's content is immutable once copied into a
    /// live plan.
    pub fixed: bool,
    pub has_form: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A marketing plan -- the runtime instance, distinct from templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub company_id: Option<Uuid>,
    pub status: PlanStatus,
    pub reviewer_id: Option<Uuid>,
    pub review_status: GateStatus,
    pub review_progress: i32,
    pub review_comments: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approver_id: Option<Uuid>,
    pub approval_status: GateStatus,
    pub approval_progress: i32,
    pub approval_comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub team_members: Vec<Uuid>,
    #[serde(default)]
    pub activities: Vec<PlanActivity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// A plan-scoped activity: the template-activity shape plus execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanActivity {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub title: String,
    pub description: String,
    pub kind: ActivityKind,
    pub duration_days: i32,
    pub order_index: i32,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    pub fixed: bool,
    pub has_form: bool,
    pub status: ActivityStatus,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub publish_on: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subtask within a plan activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub title: String,
    pub status: ActivityStatus,
    pub duration_days: i32,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    /// Ids of sibling subtasks that must complete first.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
}

/// A standalone to-do item, optionally linked to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub status: TaskStatus,
    pub due_on: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collaborative document, optionally linked to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_status_display_roundtrip() {
        let variants = [
            PlanStatus::Draft,
            PlanStatus::InternalReview,
            PlanStatus::Approval,
            PlanStatus::Approved,
            PlanStatus::Active,
            PlanStatus::Completed,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: PlanStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn plan_status_invalid() {
        let result = "bogus".parse::<PlanStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn gate_status_display_roundtrip() {
        let variants = [GateStatus::Pending, GateStatus::Approved, GateStatus::Rejected];
        for v in &variants {
            let s = v.to_string();
            let parsed: GateStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn gate_status_invalid() {
        let result = "maybe".parse::<GateStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn activity_status_display_roundtrip() {
        let variants = [
            ActivityStatus::NotStarted,
            ActivityStatus::InProgress,
            ActivityStatus::Completed,
            ActivityStatus::Blocked,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: ActivityStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn activity_status_invalid() {
        let result = "paused".parse::<ActivityStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn activity_kind_display_roundtrip() {
        let variants = [
            ActivityKind::BlogPost,
            ActivityKind::LandingPage,
            ActivityKind::EmailCampaign,
            ActivityKind::SocialPost,
            ActivityKind::Webinar,
            ActivityKind::AdCampaign,
            ActivityKind::Other,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: ActivityKind = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn activity_kind_invalid() {
        let result = "podcast_e".parse::<ActivityKind>();
        assert!(result.is_err());
    }

    #[test]
    fn task_status_display_roundtrip() {
        let variants = [TaskStatus::Open, TaskStatus::InProgress, TaskStatus::Done];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_invalid() {
        let result = "finished".parse::<TaskStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn plan_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&PlanStatus::InternalReview).unwrap();
        assert_eq!(json, "\"internal_review\"");
    }

    #[test]
    fn template_activity_defaults_empty_dependencies() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "template_id": Uuid::new_v4(),
            "title": "Launch post",
            "description": "",
            "kind": "blog_post",
            "duration_days": 3,
            "order_index": 0,
            "fixed": false,
            "has_form": false,
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });
        let activity: TemplateActivity = serde_json::from_value(json).unwrap();
        assert!(activity.dependencies.is_empty());
    }
}
