//! Plan lifecycle transitions as pure functions over a [`Plan`].
//!
//! `draft -> internal_review -> approval -> approved -> active -> completed`,
//! with review/approval sub-statuses gating the forward edges. The store
//! persists the mutated plan first and only then swaps its cache, so these
//! functions never touch I/O.
//!
//! `activate` and `complete` are deliberately unconditional: this layer does
//! no precondition checks, callers invoke them at the right stage.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mktplan_data::models::{GateStatus, Plan, PlanStatus};

/// A reviewer's or approver's decision on a plan.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub status: GateStatus,
    pub comments: Option<String>,
}

impl GateDecision {
    pub fn approved(comments: impl Into<Option<String>>) -> Self {
        Self {
            status: GateStatus::Approved,
            comments: comments.into(),
        }
    }

    pub fn rejected(comments: impl Into<Option<String>>) -> Self {
        Self {
            status: GateStatus::Rejected,
            comments: comments.into(),
        }
    }
}

fn touch(plan: &mut Plan, now: DateTime<Utc>) {
    plan.updated_at = now;
    plan.last_activity_at = now;
}

/// Send a draft plan to internal review.
pub fn send_to_review(plan: &mut Plan, reviewer_id: Uuid, now: DateTime<Utc>) {
    plan.status = PlanStatus::InternalReview;
    plan.reviewer_id = Some(reviewer_id);
    plan.review_status = GateStatus::Pending;
    plan.review_progress = 0;
    touch(plan, now);
}

/// Record a review decision.
///
/// Approval keeps the plan in `internal_review` with progress 100 (the
/// review-complete marker ahead of approval submission); any other outcome
/// reverts the plan to `draft` with progress 0. Comments and the review
/// timestamp are recorded regardless of outcome.
pub fn apply_review(plan: &mut Plan, decision: &GateDecision, now: DateTime<Utc>) {
    plan.review_status = decision.status;
    plan.review_comments = decision.comments.clone();
    plan.reviewed_at = Some(now);
    if decision.status == GateStatus::Approved {
        plan.status = PlanStatus::InternalReview;
        plan.review_progress = 100;
    } else {
        plan.status = PlanStatus::Draft;
        plan.review_progress = 0;
    }
    touch(plan, now);
}

/// Send a reviewed plan to approval.
pub fn send_to_approval(plan: &mut Plan, approver_id: Uuid, now: DateTime<Utc>) {
    plan.status = PlanStatus::Approval;
    plan.approver_id = Some(approver_id);
    plan.approval_status = GateStatus::Pending;
    plan.approval_progress = 0;
    touch(plan, now);
}

/// Record an approval decision.
///
/// Approval moves the plan to `approved` with progress 100; any other
/// outcome sends it back to `internal_review` with progress 0.
pub fn apply_approval(plan: &mut Plan, decision: &GateDecision, now: DateTime<Utc>) {
    plan.approval_status = decision.status;
    plan.approval_comments = decision.comments.clone();
    plan.approved_at = Some(now);
    if decision.status == GateStatus::Approved {
        plan.status = PlanStatus::Approved;
        plan.approval_progress = 100;
    } else {
        plan.status = PlanStatus::InternalReview;
        plan.approval_progress = 0;
    }
    touch(plan, now);
}

/// Activate a plan. Unconditional.
pub fn activate(plan: &mut Plan, now: DateTime<Utc>) {
    plan.status = PlanStatus::Active;
    touch(plan, now);
}

/// Complete a plan. Unconditional.
pub fn complete(plan: &mut Plan, now: DateTime<Utc>) {
    plan.status = PlanStatus::Completed;
    touch(plan, now);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_plan() -> Plan {
        let now = Utc::now();
        Plan {
            id: Uuid::new_v4(),
            title: "Q3 launch".to_owned(),
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

    #[test]
    fn send_to_review_resets_review_fields() {
        let mut plan = draft_plan();
        plan.review_progress = 100;
        let reviewer = Uuid::new_v4();

        send_to_review(&mut plan, reviewer, Utc::now());

        assert_eq!(plan.status, PlanStatus::InternalReview);
        assert_eq!(plan.reviewer_id, Some(reviewer));
        assert_eq!(plan.review_status, GateStatus::Pending);
        assert_eq!(plan.review_progress, 0);
    }

    #[test]
    fn approved_review_marks_progress_without_advancing() {
        let mut plan = draft_plan();
        send_to_review(&mut plan, Uuid::new_v4(), Utc::now());

        apply_review(&mut plan, &GateDecision::approved("ok".to_owned()), Utc::now());

        assert_eq!(plan.status, PlanStatus::InternalReview);
        assert_eq!(plan.review_progress, 100);
        assert_eq!(plan.review_status, GateStatus::Approved);
        assert_eq!(plan.review_comments.as_deref(), Some("ok"));
        assert!(plan.reviewed_at.is_some());
    }

    #[test]
    fn rejected_review_reverts_to_draft() {
        let mut plan = draft_plan();
        send_to_review(&mut plan, Uuid::new_v4(), Utc::now());

        apply_review(&mut plan, &GateDecision::rejected(None), Utc::now());

        assert_eq!(plan.status, PlanStatus::Draft);
        assert_eq!(plan.review_progress, 0);
        assert_eq!(plan.review_status, GateStatus::Rejected);
        assert!(plan.reviewed_at.is_some(), "timestamp recorded on rejection too");
    }

    #[test]
    fn approved_approval_advances_to_approved() {
        let mut plan = draft_plan();
        send_to_approval(&mut plan, Uuid::new_v4(), Utc::now());

        apply_approval(&mut plan, &GateDecision::approved(None), Utc::now());

        assert_eq!(plan.status, PlanStatus::Approved);
        assert_eq!(plan.approval_progress, 100);
    }

    #[test]
    fn rejected_approval_reverts_to_internal_review() {
        let mut plan = draft_plan();
        send_to_approval(&mut plan, Uuid::new_v4(), Utc::now());

        apply_approval(&mut plan, &GateDecision::rejected("redo".to_owned()), Utc::now());

        assert_eq!(plan.status, PlanStatus::InternalReview);
        assert_eq!(plan.approval_progress, 0);
        assert_eq!(plan.approval_comments.as_deref(), Some("redo"));
    }

    #[test]
    fn activate_and_complete_are_unconditional() {
        let mut plan = draft_plan();

        activate(&mut plan, Utc::now());
        assert_eq!(plan.status, PlanStatus::Active);

        complete(&mut plan, Utc::now());
        assert_eq!(plan.status, PlanStatus::Completed);
    }

    #[test]
    fn transitions_bump_last_activity_at() {
        let mut plan = draft_plan();
        let before = plan.last_activity_at;
        let later = before + chrono::Duration::seconds(60);

        activate(&mut plan, later);

        assert_eq!(plan.last_activity_at, later);
    }
}
