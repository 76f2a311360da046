//! Template activity ordering and the fixed-activity toggle rule.
//!
//! Both functions here are pure: [`TemplateStore`](crate::stores::TemplateStore)
//! computes the outcome first, then persists and swaps its cache.

use uuid::Uuid;

use mktplan_data::models::TemplateActivity;

/// Plan a reorder: given the current activities and the caller's desired
/// id order, return `(activity_id, new_order_index)` pairs in final order.
///
/// Ids in `desired` that do not belong to the template are silently dropped;
/// ids omitted from `desired` are likewise dropped from the result. A repeated
/// id counts only at its first position. Surviving activities get contiguous
/// indices `0..n-1` in the desired order.
///
/// No dependency-cycle validation happens here: an activity may end up
/// ordered before one of its dependencies. Ordering is a display and
/// scheduling hint, not an execution order.
pub fn plan_reorder(current: &[TemplateActivity], desired: &[Uuid]) -> Vec<(Uuid, i32)> {
    let mut seen = Vec::with_capacity(desired.len());
    desired
        .iter()
        .filter(|id| current.iter().any(|a| a.id == **id))
        .filter(|id| {
            if seen.contains(*id) {
                false
            } else {
                seen.push(**id);
                true
            }
        })
        .enumerate()
        .map(|(position, id)| (*id, position as i32))
        .collect()
}

/// Outcome of toggling an activity's `fixed` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedToggle {
    /// The activity's flag after the flip.
    pub activity_fixed: bool,
    /// The template's `fixed_activities` flag after propagation.
    pub template_fixed: bool,
}

/// Apply the one-directional fixed-flag propagation rule.
///
/// Flipping an activity to fixed turns the template flag on if it was off.
/// Flipping an activity to unfixed never turns the template flag off, even
/// if it was the last fixed activity. The asymmetry matches the product
/// behavior; see DESIGN.md for the open question around the missing
/// reverse cascade.
pub fn apply_fixed_toggle(template_fixed: bool, activity_fixed: bool) -> FixedToggle {
    let new_activity_fixed = !activity_fixed;
    FixedToggle {
        activity_fixed: new_activity_fixed,
        template_fixed: template_fixed || new_activity_fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mktplan_data::models::ActivityKind;

    fn activity(order_index: i32) -> TemplateActivity {
        TemplateActivity {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            title: format!("activity {order_index}"),
            description: String::new(),
            kind: ActivityKind::Other,
            duration_days: 1,
            order_index,
            dependencies: vec![],
            fixed: false,
            has_form: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reorder_assigns_positions_in_desired_order() {
        let activities = vec![activity(0), activity(1), activity(2)];
        let desired = vec![activities[2].id, activities[0].id, activities[1].id];

        let planned = plan_reorder(&activities, &desired);

        assert_eq!(
            planned,
            vec![
                (activities[2].id, 0),
                (activities[0].id, 1),
                (activities[1].id, 2),
            ]
        );
    }

    #[test]
    fn reorder_drops_unknown_ids_and_stays_contiguous() {
        let activities = vec![activity(0), activity(1)];
        let desired = vec![activities[1].id, Uuid::new_v4(), activities[0].id];

        let planned = plan_reorder(&activities, &desired);

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0], (activities[1].id, 0));
        assert_eq!(planned[1], (activities[0].id, 1));
    }

    #[test]
    fn reorder_keeps_only_the_first_occurrence_of_a_repeated_id() {
        let activities = vec![activity(0), activity(1), activity(2)];
        let desired = vec![
            activities[1].id,
            activities[1].id,
            activities[0].id,
            activities[2].id,
            activities[0].id,
        ];

        let planned = plan_reorder(&activities, &desired);

        assert_eq!(
            planned,
            vec![
                (activities[1].id, 0),
                (activities[0].id, 1),
                (activities[2].id, 2),
            ]
        );
    }

    #[test]
    fn reorder_of_empty_list_is_empty() {
        assert!(plan_reorder(&[], &[Uuid::new_v4()]).is_empty());
    }

    #[test]
    fn toggle_on_turns_template_flag_on() {
        let toggle = apply_fixed_toggle(false, false);
        assert!(toggle.activity_fixed);
        assert!(toggle.template_fixed);
    }

    #[test]
    fn toggle_off_leaves_template_flag_alone() {
        let toggle = apply_fixed_toggle(true, true);
        assert!(!toggle.activity_fixed);
        assert!(toggle.template_fixed, "template flag must not be demoted");
    }

    #[test]
    fn toggle_on_with_flag_already_set_keeps_it() {
        let toggle = apply_fixed_toggle(true, false);
        assert!(toggle.activity_fixed);
        assert!(toggle.template_fixed);
    }
}
