//! Domain layer for the marketing-plan collaboration app: the template and
//! plan stores, the activity ordering and fixed-flag model, the plan
//! lifecycle, and the dependency predicates.

pub mod context;
pub mod deps;
pub mod lifecycle;
pub mod ordering;
pub mod stores;
