//! Dependency predicates: pure, synchronous reads over in-memory siblings.
//!
//! An item is unblocked when its dependency set is empty or every referenced
//! sibling that actually exists has completed. A dependency id that does not
//! resolve to a sibling does not block -- a permissive default, not a
//! validation failure.

use mktplan_data::models::{ActivityStatus, PlanActivity, Subtask};

/// Whether a plan activity is unblocked among its sibling activities.
pub fn activity_unblocked(activity: &PlanActivity, siblings: &[PlanActivity]) -> bool {
    activity.dependencies.iter().all(|dep_id| {
        siblings
            .iter()
            .find(|s| s.id == *dep_id)
            .is_none_or(|s| s.status == ActivityStatus::Completed)
    })
}

/// Whether a subtask is unblocked among its sibling subtasks.
pub fn subtask_unblocked(subtask: &Subtask, siblings: &[Subtask]) -> bool {
    subtask.dependencies.iter().all(|dep_id| {
        siblings
            .iter()
            .find(|s| s.id == *dep_id)
            .is_none_or(|s| s.status == ActivityStatus::Completed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mktplan_data::models::ActivityKind;
    use uuid::Uuid;

    fn plan_activity(status: ActivityStatus, dependencies: Vec<Uuid>) -> PlanActivity {
        PlanActivity {
            id: Uuid::new_v4(),
            plan_id: Uuid::nil(),
            title: "a".to_owned(),
            description: String::new(),
            kind: ActivityKind::Other,
            duration_days: 1,
            order_index: 0,
            dependencies,
            fixed: false,
            has_form: false,
            status,
            starts_on: None,
            ends_on: None,
            publish_on: None,
            assignee_id: None,
            subtasks: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn subtask(status: ActivityStatus, dependencies: Vec<Uuid>) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            title: "s".to_owned(),
            status,
            duration_days: 1,
            starts_on: None,
            ends_on: None,
            dependencies,
        }
    }

    #[test]
    fn empty_dependencies_is_unblocked() {
        let a = plan_activity(ActivityStatus::NotStarted, vec![]);
        assert!(activity_unblocked(&a, &[]));
    }

    #[test]
    fn missing_dependency_does_not_block() {
        let a = plan_activity(ActivityStatus::NotStarted, vec![Uuid::new_v4()]);
        assert!(activity_unblocked(&a, std::slice::from_ref(&a)));
    }

    #[test]
    fn incomplete_dependency_blocks() {
        let dep = plan_activity(ActivityStatus::InProgress, vec![]);
        let a = plan_activity(ActivityStatus::NotStarted, vec![dep.id]);
        let siblings = vec![dep.clone(), a.clone()];
        assert!(!activity_unblocked(&a, &siblings));
    }

    #[test]
    fn completed_dependency_unblocks() {
        let dep = plan_activity(ActivityStatus::Completed, vec![]);
        let a = plan_activity(ActivityStatus::NotStarted, vec![dep.id]);
        let siblings = vec![dep.clone(), a.clone()];
        assert!(activity_unblocked(&a, &siblings));
    }

    #[test]
    fn all_dependencies_must_complete() {
        let done = plan_activity(ActivityStatus::Completed, vec![]);
        let pending = plan_activity(ActivityStatus::NotStarted, vec![]);
        let a = plan_activity(ActivityStatus::NotStarted, vec![done.id, pending.id]);
        let siblings = vec![done, pending, a.clone()];
        assert!(!activity_unblocked(&a, &siblings));
    }

    #[test]
    fn subtask_predicate_mirrors_activity_rules() {
        let dep = subtask(ActivityStatus::InProgress, vec![]);
        let s = subtask(ActivityStatus::NotStarted, vec![dep.id]);
        let siblings = vec![dep.clone(), s.clone()];
        assert!(!subtask_unblocked(&s, &siblings));

        let mut completed = siblings.clone();
        completed[0].status = ActivityStatus::Completed;
        assert!(subtask_unblocked(&s, &completed));

        // Unresolvable reference is permissive.
        let dangling = subtask(ActivityStatus::NotStarted, vec![Uuid::new_v4()]);
        assert!(subtask_unblocked(&dangling, &completed));
    }
}
