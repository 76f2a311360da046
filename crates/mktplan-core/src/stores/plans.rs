//! PlanStore: marketing plans with their activities, plus standalone tasks
//! and documents.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use mktplan_data::backend::{Backend, Filter, Order, Relation, from_rows, to_row};
use mktplan_data::models::{
    ActivityKind, ActivityStatus, Document, GateStatus, Plan, PlanActivity, PlanStatus, Subtask,
    Task, TaskStatus, Template, TemplateActivity,
};

use crate::deps::{activity_unblocked, subtask_unblocked};
use crate::lifecycle::{self, GateDecision};

use super::StoreStatus;

/// Fields for creating a plan.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub company_id: Option<Uuid>,
    pub team_members: Vec<Uuid>,
}

/// Fields for adding an activity to a plan.
#[derive(Debug, Clone)]
pub struct NewPlanActivity {
    pub title: String,
    pub description: String,
    pub kind: ActivityKind,
    pub duration_days: i32,
    pub order_index: i32,
    pub assignee_id: Option<Uuid>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub publish_on: Option<NaiveDate>,
}

/// Fields for creating a standalone task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub due_on: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
}

/// Fields for creating a document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

/// Deep-copy template activities into plan activities.
///
/// Fresh ids are assigned and intra-template dependency references are
/// remapped to the fresh ids (references that do not resolve are kept
/// as-is -- the dependency predicates treat them permissively). Execution
/// state starts at `not_started`, and the `fixed` flag is always stripped:
/// plan-level activities are editable at copy time regardless of the
/// template's setting.
pub fn copy_template_activities(
    plan_id: Uuid,
    activities: &[TemplateActivity],
) -> Vec<PlanActivity> {
    let now = Utc::now();
    let id_map: std::collections::HashMap<Uuid, Uuid> = activities
        .iter()
        .map(|a| (a.id, Uuid::new_v4()))
        .collect();

    activities
        .iter()
        .map(|a| PlanActivity {
            id: id_map[&a.id],
            plan_id,
            title: a.title.clone(),
            description: a.description.clone(),
            kind: a.kind,
            duration_days: a.duration_days,
            order_index: a.order_index,
            dependencies: a
                .dependencies
                .iter()
                .map(|dep| id_map.get(dep).copied().unwrap_or(*dep))
                .collect(),
            fixed: false,
            has_form: a.has_form,
            status: ActivityStatus::NotStarted,
            starts_on: None,
            ends_on: None,
            publish_on: None,
            assignee_id: None,
            subtasks: vec![],
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[derive(Default)]
struct PlanState {
    plans: Vec<Plan>,
    tasks: Vec<Task>,
    documents: Vec<Document>,
    status: StoreStatus,
}

/// Store for plans, tasks, and documents.
pub struct PlanStore {
    backend: Arc<dyn Backend>,
    state: Mutex<PlanState>,
}

impl PlanStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(PlanState::default()),
        }
    }

    // -- cache reads --------------------------------------------------------

    pub fn plans(&self) -> Vec<Plan> {
        self.lock().plans.clone()
    }

    pub fn plan(&self, id: Uuid) -> Option<Plan> {
        self.lock().plans.iter().find(|p| p.id == id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.lock().documents.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().status.error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().status.loading
    }

    // -- dependency predicates (pure reads over the cache) ------------------

    /// Whether the given plan activity is unblocked. Missing plans,
    /// activities, or dependency references all resolve permissively to
    /// `true`.
    pub fn check_activity_dependencies(&self, plan_id: Uuid, activity_id: Uuid) -> bool {
        let state = self.lock();
        let Some(plan) = state.plans.iter().find(|p| p.id == plan_id) else {
            return true;
        };
        let Some(activity) = plan.activities.iter().find(|a| a.id == activity_id) else {
            return true;
        };
        activity_unblocked(activity, &plan.activities)
    }

    /// Whether the given subtask is unblocked among its sibling subtasks.
    pub fn check_subtask_dependencies(
        &self,
        plan_id: Uuid,
        activity_id: Uuid,
        subtask_id: Uuid,
    ) -> bool {
        let state = self.lock();
        let Some(plan) = state.plans.iter().find(|p| p.id == plan_id) else {
            return true;
        };
        let Some(activity) = plan.activities.iter().find(|a| a.id == activity_id) else {
            return true;
        };
        let Some(subtask) = activity.subtasks.iter().find(|s| s.id == subtask_id) else {
            return true;
        };
        subtask_unblocked(subtask, &activity.subtasks)
    }

    // -- plan CRUD ----------------------------------------------------------

    /// Reload plans from the backend.
    pub async fn fetch_plans(&self) {
        self.begin();
        match self.try_fetch_plans().await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn create_plan(&self, fields: NewPlan) -> Option<Plan> {
        self.begin();
        match self.try_insert_plan(Uuid::new_v4(), fields, vec![]).await {
            Ok(plan) => {
                self.finish();
                Some(plan)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    /// Create a plan seeded from a template's activities.
    ///
    /// The copied activities never carry `fixed = true`, regardless of the
    /// template's flag at copy time.
    pub async fn create_plan_from_template(
        &self,
        fields: NewPlan,
        template: &Template,
        activities: &[TemplateActivity],
    ) -> Option<Plan> {
        self.begin();
        let plan_id = Uuid::new_v4();
        let copied = copy_template_activities(plan_id, activities);
        match self.try_insert_plan(plan_id, fields, copied).await {
            Ok(plan) => {
                info!(
                    plan_id = %plan.id,
                    template_id = %template.id,
                    activities = plan.activities.len(),
                    "created plan from template"
                );
                self.finish();
                Some(plan)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    /// Replace a plan's fields with the given value.
    pub async fn update_plan(&self, mut updated: Plan) {
        self.begin();
        updated.updated_at = Utc::now();
        match self.try_replace_plan(updated).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn delete_plan(&self, plan_id: Uuid) {
        self.begin();
        match self.try_delete_plan(plan_id).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    pub async fn send_to_review(&self, plan_id: Uuid, reviewer_id: Uuid) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| {
            lifecycle::send_to_review(plan, reviewer_id, Utc::now());
        })
        .await
    }

    pub async fn review_plan(&self, plan_id: Uuid, decision: GateDecision) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| {
            lifecycle::apply_review(plan, &decision, Utc::now());
        })
        .await
    }

    pub async fn send_to_approval(&self, plan_id: Uuid, approver_id: Uuid) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| {
            lifecycle::send_to_approval(plan, approver_id, Utc::now());
        })
        .await
    }

    pub async fn approve_plan(&self, plan_id: Uuid, decision: GateDecision) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| {
            lifecycle::apply_approval(plan, &decision, Utc::now());
        })
        .await
    }

    pub async fn activate_plan(&self, plan_id: Uuid) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| lifecycle::activate(plan, Utc::now()))
            .await
    }

    pub async fn complete_plan(&self, plan_id: Uuid) -> Option<Plan> {
        self.mutate_plan(plan_id, |plan| lifecycle::complete(plan, Utc::now()))
            .await
    }

    // -- plan activities ----------------------------------------------------

    /// Add an activity to a plan. Re-throws on failure so form submission
    /// paths can keep their modal open.
    pub async fn add_activity(
        &self,
        plan_id: Uuid,
        fields: NewPlanActivity,
    ) -> Result<PlanActivity> {
        self.begin();
        match self.try_add_activity(plan_id, fields).await {
            Ok(activity) => {
                self.finish();
                Ok(activity)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Replace a plan activity. Re-throws on failure.
    pub async fn update_activity(&self, plan_id: Uuid, updated: PlanActivity) -> Result<PlanActivity> {
        self.begin();
        match self.try_update_activity(plan_id, updated).await {
            Ok(activity) => {
                self.finish();
                Ok(activity)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Replace a subtask within a plan activity.
    pub async fn update_subtask(&self, plan_id: Uuid, activity_id: Uuid, updated: Subtask) {
        self.begin();
        match self.try_update_subtask(plan_id, activity_id, updated).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    // -- tasks --------------------------------------------------------------

    pub async fn fetch_tasks(&self) {
        self.begin();
        match self.try_fetch_tasks().await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn create_task(&self, fields: NewTask) -> Option<Task> {
        self.begin();
        match self.try_create_task(fields).await {
            Ok(task) => {
                self.finish();
                Some(task)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    pub async fn update_task(&self, updated: Task) {
        self.begin();
        match self.try_update_task(updated).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn delete_task(&self, task_id: Uuid) {
        self.begin();
        match self
            .try_delete_row(Relation::Tasks, task_id, "failed to delete task")
            .await
        {
            Ok(()) => {
                self.lock().tasks.retain(|t| t.id != task_id);
                self.finish();
            }
            Err(e) => self.fail(&e),
        }
    }

    // -- documents ----------------------------------------------------------

    pub async fn fetch_documents(&self) {
        self.begin();
        match self.try_fetch_documents().await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn create_document(&self, fields: NewDocument) -> Option<Document> {
        self.begin();
        match self.try_create_document(fields).await {
            Ok(document) => {
                self.finish();
                Some(document)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    pub async fn update_document(&self, updated: Document) {
        self.begin();
        match self.try_update_document(updated).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn delete_document(&self, document_id: Uuid) {
        self.begin();
        match self
            .try_delete_row(Relation::Documents, document_id, "failed to delete document")
            .await
        {
            Ok(()) => {
                self.lock().documents.retain(|d| d.id != document_id);
                self.finish();
            }
            Err(e) => self.fail(&e),
        }
    }

    // -- fallible bodies ----------------------------------------------------

    async fn try_fetch_plans(&self) -> Result<()> {
        let rows = self
            .backend
            .select(
                Relation::Plans,
                &Filter::new(),
                Some(&Order::asc("created_at")),
            )
            .await
            .context("failed to fetch plans")?;
        let plans: Vec<Plan> = from_rows(rows)?;

        self.lock().plans = plans;
        Ok(())
    }

    async fn try_insert_plan(
        &self,
        plan_id: Uuid,
        fields: NewPlan,
        activities: Vec<PlanActivity>,
    ) -> Result<Plan> {
        let now = Utc::now();
        let plan = Plan {
            id: plan_id,
            title: fields.title,
            description: fields.description,
            owner_id: fields.owner_id,
            company_id: fields.company_id,
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
            team_members: fields.team_members,
            activities,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        };

        self.backend
            .insert(Relation::Plans, vec![to_row(&plan)?])
            .await
            .context("failed to create plan")?;

        info!(plan_id = %plan.id, title = %plan.title, "created plan");

        self.lock().plans.push(plan.clone());
        Ok(plan)
    }

    /// Persist the full plan row, then replace the cached entry by mapping
    /// over the plan list.
    async fn try_replace_plan(&self, updated: Plan) -> Result<()> {
        self.backend
            .update(
                Relation::Plans,
                &Filter::new().eq("id", updated.id),
                to_row(&updated)?,
            )
            .await
            .context("failed to update plan")?;

        let mut state = self.lock();
        state.plans = state
            .plans
            .iter()
            .map(|p| if p.id == updated.id { updated.clone() } else { p.clone() })
            .collect();
        Ok(())
    }

    async fn try_delete_plan(&self, plan_id: Uuid) -> Result<()> {
        self.backend
            .delete(Relation::Plans, &Filter::new().eq("id", plan_id))
            .await
            .context("failed to delete plan")?;

        info!(plan_id = %plan_id, "deleted plan");

        self.lock().plans.retain(|p| p.id != plan_id);
        Ok(())
    }

    /// Shared lifecycle driver: clone the cached plan, apply the pure
    /// transition, persist, then swap. Absorbs failures into the error slot.
    async fn mutate_plan<F>(&self, plan_id: Uuid, mutate: F) -> Option<Plan>
    where
        F: FnOnce(&mut Plan),
    {
        self.begin();
        let Some(mut plan) = self.plan(plan_id) else {
            self.fail(&anyhow::anyhow!("plan {plan_id} not found"));
            return None;
        };
        mutate(&mut plan);

        match self.try_replace_plan(plan.clone()).await {
            Ok(()) => {
                info!(plan_id = %plan_id, status = %plan.status, "plan transitioned");
                self.finish();
                Some(plan)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    async fn try_add_activity(
        &self,
        plan_id: Uuid,
        fields: NewPlanActivity,
    ) -> Result<PlanActivity> {
        let mut plan = self
            .plan(plan_id)
            .with_context(|| format!("plan {plan_id} not found"))?;

        let now = Utc::now();
        let activity = PlanActivity {
            id: Uuid::new_v4(),
            plan_id,
            title: fields.title,
            description: fields.description,
            kind: fields.kind,
            duration_days: fields.duration_days,
            order_index: fields.order_index,
            dependencies: vec![],
            fixed: false,
            has_form: false,
            status: ActivityStatus::NotStarted,
            starts_on: fields.starts_on,
            ends_on: fields.ends_on,
            publish_on: fields.publish_on,
            assignee_id: fields.assignee_id,
            subtasks: vec![],
            created_at: now,
            updated_at: now,
        };

        plan.activities.push(activity.clone());
        plan.updated_at = now;
        plan.last_activity_at = now;

        self.try_replace_plan(plan).await?;
        Ok(activity)
    }

    async fn try_update_activity(
        &self,
        plan_id: Uuid,
        mut updated: PlanActivity,
    ) -> Result<PlanActivity> {
        let mut plan = self
            .plan(plan_id)
            .with_context(|| format!("plan {plan_id} not found"))?;

        let now = Utc::now();
        updated.updated_at = now;

        let slot = plan
            .activities
            .iter_mut()
            .find(|a| a.id == updated.id)
            .with_context(|| format!("activity {} not found in plan {plan_id}", updated.id))?;
        *slot = updated.clone();
        plan.updated_at = now;
        plan.last_activity_at = now;

        self.try_replace_plan(plan).await?;
        Ok(updated)
    }

    async fn try_update_subtask(
        &self,
        plan_id: Uuid,
        activity_id: Uuid,
        updated: Subtask,
    ) -> Result<()> {
        let mut plan = self
            .plan(plan_id)
            .with_context(|| format!("plan {plan_id} not found"))?;

        let activity = plan
            .activities
            .iter_mut()
            .find(|a| a.id == activity_id)
            .with_context(|| format!("activity {activity_id} not found in plan {plan_id}"))?;
        let slot = activity
            .subtasks
            .iter_mut()
            .find(|s| s.id == updated.id)
            .with_context(|| format!("subtask {} not found", updated.id))?;
        *slot = updated;

        let now = Utc::now();
        plan.updated_at = now;
        plan.last_activity_at = now;

        self.try_replace_plan(plan).await
    }

    async fn try_fetch_tasks(&self) -> Result<()> {
        let rows = self
            .backend
            .select(
                Relation::Tasks,
                &Filter::new(),
                Some(&Order::asc("created_at")),
            )
            .await
            .context("failed to fetch tasks")?;
        self.lock().tasks = from_rows(rows)?;
        Ok(())
    }

    async fn try_create_task(&self, fields: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            plan_id: fields.plan_id,
            title: fields.title,
            status: TaskStatus::Open,
            due_on: fields.due_on,
            assignee_id: fields.assignee_id,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .insert(Relation::Tasks, vec![to_row(&task)?])
            .await
            .context("failed to create task")?;

        self.lock().tasks.push(task.clone());
        Ok(task)
    }

    async fn try_update_task(&self, mut updated: Task) -> Result<()> {
        updated.updated_at = Utc::now();
        self.backend
            .update(
                Relation::Tasks,
                &Filter::new().eq("id", updated.id),
                to_row(&updated)?,
            )
            .await
            .context("failed to update task")?;

        let mut state = self.lock();
        if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == updated.id) {
            *slot = updated;
        }
        Ok(())
    }

    async fn try_fetch_documents(&self) -> Result<()> {
        let rows = self
            .backend
            .select(
                Relation::Documents,
                &Filter::new(),
                Some(&Order::asc("created_at")),
            )
            .await
            .context("failed to fetch documents")?;
        self.lock().documents = from_rows(rows)?;
        Ok(())
    }

    async fn try_create_document(&self, fields: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            plan_id: fields.plan_id,
            title: fields.title,
            body: fields.body,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .insert(Relation::Documents, vec![to_row(&document)?])
            .await
            .context("failed to create document")?;

        self.lock().documents.push(document.clone());
        Ok(document)
    }

    async fn try_update_document(&self, mut updated: Document) -> Result<()> {
        updated.updated_at = Utc::now();
        self.backend
            .update(
                Relation::Documents,
                &Filter::new().eq("id", updated.id),
                to_row(&updated)?,
            )
            .await
            .context("failed to update document")?;

        let mut state = self.lock();
        if let Some(slot) = state.documents.iter_mut().find(|d| d.id == updated.id) {
            *slot = updated;
        }
        Ok(())
    }

    async fn try_delete_row(&self, relation: Relation, id: Uuid, context: &str) -> Result<()> {
        self.backend
            .delete(relation, &Filter::new().eq("id", id))
            .await
            .context(context.to_owned())
    }

    // -- status slots -------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, PlanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.status.loading = true;
        state.status.error = None;
    }

    fn finish(&self) {
        self.lock().status.loading = false;
    }

    fn fail(&self, err: &anyhow::Error) {
        warn!(error = %format!("{err:#}"), "plan store operation failed");
        let mut state = self.lock();
        state.status.loading = false;
        state.status.error = Some(format!("{err:#}"));
    }
}
