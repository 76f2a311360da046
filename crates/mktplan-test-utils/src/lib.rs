//! Shared fixtures for mktplan integration tests.
//!
//! The backend is fully in-process, so fixtures are plain builders: fresh
//! model values with sensible defaults, plus a pre-seeded backend for tests
//! that start from existing data.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use mktplan_data::backend::{Backend, Relation, Row};
use mktplan_data::memory::MemoryBackend;
use mktplan_data::models::{
    ActivityKind, GateStatus, Plan, PlanStatus, Template, TemplateActivity,
};

/// A template with defaults suitable for most tests.
pub fn template(fixed_activities: bool) -> Template {
    let now = Utc::now();
    Template {
        id: Uuid::new_v4(),
        title: "Product launch".to_owned(),
        description: "Standard launch playbook".to_owned(),
        strategy: "Awareness first, conversion second".to_owned(),
        company_id: None,
        is_public: true,
        fixed_activities,
        created_at: now,
        updated_at: now,
    }
}

/// An activity belonging to `template_id` at the given position.
pub fn template_activity(template_id: Uuid, order_index: i32) -> TemplateActivity {
    let now = Utc::now();
    TemplateActivity {
        id: Uuid::new_v4(),
        template_id,
        title: format!("Activity {order_index}"),
        description: String::new(),
        kind: ActivityKind::BlogPost,
        duration_days: 3,
        order_index,
        dependencies: vec![],
        fixed: false,
        has_form: false,
        created_at: now,
        updated_at: now,
    }
}

/// A draft plan owned by a fresh user.
pub fn draft_plan() -> Plan {
    let now = Utc::now();
    Plan {
        id: Uuid::new_v4(),
        title: "Q3 campaign".to_owned(),
        description: String::new(),
        owner_id: Uuid::new_v4(),
        company_id: None,
        status: PlanStatus::Draft,
        reviewer_id: None,
        review_status: GateStatus::Pending,
        review_progress: 0,
        review_comments: None,
        reviewed_at: None,
        approver_id: None,
        approval_status: GateStatus::Pending,
        approval_progress: 0,
        approval_comments: None,
        approved_at: None,
        team_members: vec![],
        activities: vec![],
        created_at: now,
        updated_at: now,
        last_activity_at: now,
    }
}

fn to_row<T: serde::Serialize>(value: &T) -> Row {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        other => panic!("fixture did not serialize to an object: {other:?}"),
    }
}

/// A backend seeded with one template (three ordered activities) and one
/// draft plan. Returns the backend with the seeded template and plan.
pub async fn seeded_backend(fixed_activities: bool) -> (Arc<MemoryBackend>, Template, Vec<TemplateActivity>, Plan) {
    let backend = Arc::new(MemoryBackend::new());

    let template = template(fixed_activities);
    let activities: Vec<TemplateActivity> = (0..3)
        .map(|i| template_activity(template.id, i))
        .collect();
    let plan = draft_plan();

    backend
        .insert(Relation::Templates, vec![to_row(&template)])
        .await
        .expect("seed template");
    backend
        .insert(
            Relation::TemplateActivities,
            activities.iter().map(to_row).collect(),
        )
        .await
        .expect("seed activities");
    backend
        .insert(Relation::Plans, vec![to_row(&plan)])
        .await
        .expect("seed plan");

    (backend, template, activities, plan)
}
