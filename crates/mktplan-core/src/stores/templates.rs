//! TemplateStore: canonical ordered activity lists per template and the
//! fixed/modifiable classification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use mktplan_data::backend::{Backend, Filter, Order, Relation, from_rows, to_row};
use mktplan_data::models::{ActivityKind, Template, TemplateActivity};

use crate::ordering::{apply_fixed_toggle, plan_reorder};

use super::StoreStatus;

/// Fields for creating a template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub title: String,
    pub description: String,
    pub strategy: String,
    pub company_id: Option<Uuid>,
    pub is_public: bool,
    pub fixed_activities: bool,
}

/// Fields for adding an activity to a template.
///
/// `fixed` is absent on purpose: the new activity inherits the template's
/// `fixed_activities` value at insertion time (a snapshot, not a live
/// binding). `order_index` is whatever the caller supplies -- no trailing
/// index is assigned automatically; callers follow up with a reorder.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub kind: ActivityKind,
    pub duration_days: i32,
    pub order_index: i32,
    pub dependencies: Vec<Uuid>,
    pub has_form: bool,
}

#[derive(Default)]
struct TemplateState {
    templates: Vec<Template>,
    /// Ordered activity list per template id.
    activities: HashMap<Uuid, Vec<TemplateActivity>>,
    status: StoreStatus,
}

/// Store for templates and their ordered activities.
pub struct TemplateStore {
    backend: Arc<dyn Backend>,
    state: Mutex<TemplateState>,
}

impl TemplateStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(TemplateState::default()),
        }
    }

    // -- cache reads --------------------------------------------------------

    pub fn templates(&self) -> Vec<Template> {
        self.lock().templates.clone()
    }

    pub fn template(&self, id: Uuid) -> Option<Template> {
        self.lock().templates.iter().find(|t| t.id == id).cloned()
    }

    /// The cached activities of a template, in order.
    pub fn activities(&self, template_id: Uuid) -> Vec<TemplateActivity> {
        self.lock()
            .activities
            .get(&template_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().status.error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().status.loading
    }

    // -- operations ---------------------------------------------------------

    /// Reload templates and their activities from the backend.
    pub async fn fetch_templates(&self) {
        self.begin();
        match self.try_fetch_templates().await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    pub async fn create_template(&self, fields: NewTemplate) -> Option<Template> {
        self.begin();
        match self.try_create_template(fields).await {
            Ok(template) => {
                self.finish();
                Some(template)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    /// Replace a template's fields with the given value.
    pub async fn update_template(&self, updated: Template) {
        self.begin();
        match self.try_update_template(updated).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    /// Delete a template and all its activities.
    pub async fn delete_template(&self, template_id: Uuid) {
        self.begin();
        match self.try_delete_template(template_id).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    /// Add an activity to a template.
    ///
    /// Re-throws on failure (the error slot is set as well) so form
    /// submission paths can keep their modal open.
    pub async fn add_activity(
        &self,
        template_id: Uuid,
        fields: NewActivity,
    ) -> Result<TemplateActivity> {
        self.begin();
        match self.try_add_activity(template_id, fields).await {
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

    /// Replace an activity's fields. Re-throws on failure.
    pub async fn update_activity(&self, updated: TemplateActivity) -> Result<TemplateActivity> {
        self.begin();
        match self.try_update_activity(updated).await {
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

    pub async fn delete_activity(&self, template_id: Uuid, activity_id: Uuid) {
        self.begin();
        match self.try_delete_activity(template_id, activity_id).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    /// Reorder a template's activities to match `ordered_ids`.
    ///
    /// `ordered_ids` should be the complete id list in the desired final
    /// order; unknown ids are silently dropped. After the call the
    /// activities carry contiguous `order_index` values `0..n-1`. The cache
    /// swap happens under one lock acquisition, so callers observe either
    /// the whole new order or the old one, never an interleaving.
    pub async fn reorder_activities(&self, template_id: Uuid, ordered_ids: Vec<Uuid>) {
        self.begin();
        match self.try_reorder_activities(template_id, ordered_ids).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    /// Flip an activity's `fixed` flag, propagating to the template flag in
    /// the forward direction only.
    pub async fn toggle_activity_fixed(&self, template_id: Uuid, activity_id: Uuid) {
        self.begin();
        match self.try_toggle_activity_fixed(template_id, activity_id).await {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    /// Set the template-level flag directly. No cascade in either direction.
    pub async fn set_template_fixed_activities(&self, template_id: Uuid, fixed: bool) {
        self.begin();
        match self
            .try_set_template_fixed_activities(template_id, fixed)
            .await
        {
            Ok(()) => self.finish(),
            Err(e) => self.fail(&e),
        }
    }

    // -- fallible bodies ----------------------------------------------------

    async fn try_fetch_templates(&self) -> Result<()> {
        let template_rows = self
            .backend
            .select(
                Relation::Templates,
                &Filter::new(),
                Some(&Order::asc("created_at")),
            )
            .await
            .context("failed to fetch templates")?;
        let templates: Vec<Template> = from_rows(template_rows)?;

        let activity_rows = self
            .backend
            .select(
                Relation::TemplateActivities,
                &Filter::new(),
                Some(&Order::asc("order_index")),
            )
            .await
            .context("failed to fetch template activities")?;
        let all_activities: Vec<TemplateActivity> = from_rows(activity_rows)?;

        let mut activities: HashMap<Uuid, Vec<TemplateActivity>> = templates
            .iter()
            .map(|t| (t.id, Vec::new()))
            .collect();
        for activity in all_activities {
            activities
                .entry(activity.template_id)
                .or_default()
                .push(activity);
        }

        let mut state = self.lock();
        state.templates = templates;
        state.activities = activities;
        Ok(())
    }

    async fn try_create_template(&self, fields: NewTemplate) -> Result<Template> {
        let now = Utc::now();
        let template = Template {
            id: Uuid::new_v4(),
            title: fields.title,
            description: fields.description,
            strategy: fields.strategy,
            company_id: fields.company_id,
            is_public: fields.is_public,
            fixed_activities: fields.fixed_activities,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .insert(Relation::Templates, vec![to_row(&template)?])
            .await
            .context("failed to create template")?;

        info!(template_id = %template.id, title = %template.title, "created template");

        let mut state = self.lock();
        state.templates.push(template.clone());
        state.activities.insert(template.id, Vec::new());
        Ok(template)
    }

    async fn try_update_template(&self, mut updated: Template) -> Result<()> {
        updated.updated_at = Utc::now();

        self.backend
            .update(
                Relation::Templates,
                &Filter::new().eq("id", updated.id),
                to_row(&updated)?,
            )
            .await
            .context("failed to update template")?;

        let mut state = self.lock();
        if let Some(slot) = state.templates.iter_mut().find(|t| t.id == updated.id) {
            *slot = updated;
        }
        Ok(())
    }

    async fn try_delete_template(&self, template_id: Uuid) -> Result<()> {
        // Activities first, then the template row. If the second call fails
        // the first is not rolled back.
        self.backend
            .delete(
                Relation::TemplateActivities,
                &Filter::new().eq("template_id", template_id),
            )
            .await
            .context("failed to delete template activities")?;
        self.backend
            .delete(Relation::Templates, &Filter::new().eq("id", template_id))
            .await
            .context("failed to delete template")?;

        info!(template_id = %template_id, "deleted template");

        let mut state = self.lock();
        state.templates.retain(|t| t.id != template_id);
        state.activities.remove(&template_id);
        Ok(())
    }

    async fn try_add_activity(
        &self,
        template_id: Uuid,
        fields: NewActivity,
    ) -> Result<TemplateActivity> {
        let template = self
            .template(template_id)
            .with_context(|| format!("template {template_id} not found"))?;

        let now = Utc::now();
        let activity = TemplateActivity {
            id: Uuid::new_v4(),
            template_id,
            title: fields.title,
            description: fields.description,
            kind: fields.kind,
            duration_days: fields.duration_days,
            order_index: fields.order_index,
            dependencies: fields.dependencies,
            // Snapshot of the template flag at insertion time.
            fixed: template.fixed_activities,
            has_form: fields.has_form,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .insert(Relation::TemplateActivities, vec![to_row(&activity)?])
            .await
            .context("failed to add activity")?;

        self.lock()
            .activities
            .entry(template_id)
            .or_default()
            .push(activity.clone());
        Ok(activity)
    }

    async fn try_update_activity(&self, mut updated: TemplateActivity) -> Result<TemplateActivity> {
        updated.updated_at = Utc::now();

        self.backend
            .update(
                Relation::TemplateActivities,
                &Filter::new().eq("id", updated.id),
                to_row(&updated)?,
            )
            .await
            .context("failed to update activity")?;

        let mut state = self.lock();
        if let Some(list) = state.activities.get_mut(&updated.template_id) {
            if let Some(slot) = list.iter_mut().find(|a| a.id == updated.id) {
                *slot = updated.clone();
            }
        }
        Ok(updated)
    }

    async fn try_delete_activity(&self, template_id: Uuid, activity_id: Uuid) -> Result<()> {
        self.backend
            .delete(
                Relation::TemplateActivities,
                &Filter::new().eq("id", activity_id),
            )
            .await
            .context("failed to delete activity")?;

        if let Some(list) = self.lock().activities.get_mut(&template_id) {
            list.retain(|a| a.id != activity_id);
        }
        Ok(())
    }

    async fn try_reorder_activities(
        &self,
        template_id: Uuid,
        ordered_ids: Vec<Uuid>,
    ) -> Result<()> {
        let current = {
            let state = self.lock();
            match state.activities.get(&template_id) {
                Some(list) => list.clone(),
                None => bail!("template {template_id} not found"),
            }
        };

        let assignments = plan_reorder(&current, &ordered_ids);
        let now = Utc::now();

        let mut reordered = Vec::with_capacity(assignments.len());
        for (id, order_index) in &assignments {
            // plan_reorder only yields ids present in `current`.
            if let Some(activity) = current.iter().find(|a| a.id == *id) {
                let mut activity = activity.clone();
                activity.order_index = *order_index;
                activity.updated_at = now;
                reordered.push(activity);
            }
        }

        let rows = reordered
            .iter()
            .map(to_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.backend
            .upsert(Relation::TemplateActivities, rows)
            .await
            .context("failed to persist reorder")?;

        info!(
            template_id = %template_id,
            count = reordered.len(),
            "reordered template activities"
        );

        // Single lock acquisition: the whole new order becomes visible at once.
        self.lock().activities.insert(template_id, reordered);
        Ok(())
    }

    async fn try_toggle_activity_fixed(
        &self,
        template_id: Uuid,
        activity_id: Uuid,
    ) -> Result<()> {
        let template = self
            .template(template_id)
            .with_context(|| format!("template {template_id} not found"))?;
        let activity = self
            .activities(template_id)
            .into_iter()
            .find(|a| a.id == activity_id)
            .with_context(|| format!("activity {activity_id} not found"))?;

        let toggle = apply_fixed_toggle(template.fixed_activities, activity.fixed);
        let now = Utc::now();

        let mut updated_activity = activity;
        updated_activity.fixed = toggle.activity_fixed;
        updated_activity.updated_at = now;

        self.backend
            .update(
                Relation::TemplateActivities,
                &Filter::new().eq("id", activity_id),
                to_row(&updated_activity)?,
            )
            .await
            .context("failed to persist activity fixed flag")?;

        {
            let mut state = self.lock();
            if let Some(list) = state.activities.get_mut(&template_id) {
                if let Some(slot) = list.iter_mut().find(|a| a.id == activity_id) {
                    *slot = updated_activity;
                }
            }
        }

        // Forward propagation only: a second, separate persistence call. If
        // it fails the activity update above stays applied.
        if toggle.template_fixed != template.fixed_activities {
            let mut updated_template = template;
            updated_template.fixed_activities = toggle.template_fixed;
            updated_template.updated_at = now;

            self.backend
                .update(
                    Relation::Templates,
                    &Filter::new().eq("id", template_id),
                    to_row(&updated_template)?,
                )
                .await
                .context("failed to propagate template fixed flag")?;

            let mut state = self.lock();
            if let Some(slot) = state.templates.iter_mut().find(|t| t.id == template_id) {
                *slot = updated_template;
            }
        }
        Ok(())
    }

    async fn try_set_template_fixed_activities(
        &self,
        template_id: Uuid,
        fixed: bool,
    ) -> Result<()> {
        let mut template = self
            .template(template_id)
            .with_context(|| format!("template {template_id} not found"))?;
        template.fixed_activities = fixed;
        template.updated_at = Utc::now();

        self.backend
            .update(
                Relation::Templates,
                &Filter::new().eq("id", template_id),
                to_row(&template)?,
            )
            .await
            .context("failed to set template fixed flag")?;

        let mut state = self.lock();
        if let Some(slot) = state.templates.iter_mut().find(|t| t.id == template_id) {
            *slot = template;
        }
        Ok(())
    }

    // -- status slots -------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, TemplateState> {
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
        warn!(error = %format!("{err:#}"), "template store operation failed");
        let mut state = self.lock();
        state.status.loading = false;
        state.status.error = Some(format!("{err:#}"));
    }
}
