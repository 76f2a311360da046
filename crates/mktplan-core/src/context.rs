//! The application context: one owned store per domain, sharing a backend.
//!
//! There is no ambient/global state; whoever needs the stores receives this
//! context by reference (the HTTP layer holds it as `Arc<AppContext>`).

use std::sync::Arc;

use mktplan_data::backend::Backend;

use crate::stores::{PlanStore, TemplateStore};

/// Owns both domain stores.
pub struct AppContext {
    pub templates: TemplateStore,
    pub plans: PlanStore,
}

impl AppContext {
    /// Build a context whose stores share the given backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            templates: TemplateStore::new(Arc::clone(&backend)),
            plans: PlanStore::new(backend),
        }
    }

    /// Populate every store cache from the backend.
    pub async fn load_all(&self) {
        self.templates.fetch_templates().await;
        self.plans.fetch_plans().await;
        self.plans.fetch_tasks().await;
        self.plans.fetch_documents().await;
    }
}
