//! The two domain stores.
//!
//! Each store owns a flat in-memory cache synchronized with the persistence
//! backend using an optimistic-update discipline: persist first, then swap
//! the cached entry under a short-lived lock. The lock is never held across
//! an await, so overlapping mutations resolve last-writer-wins with no
//! transactional guarantee beyond replace-on-write.

pub mod plans;
pub mod templates;

pub use plans::PlanStore;
pub use templates::TemplateStore;

/// The loading/error slots every store surfaces to its consumers.
///
/// Failures are classified uniformly: the cause's message lands in `error`,
/// `loading` is cleared, and -- except for the activity-save paths, which
/// re-throw -- the failure is absorbed rather than propagated.
#[derive(Debug, Clone, Default)]
pub struct StoreStatus {
    pub loading: bool,
    pub error: Option<String>,
}
