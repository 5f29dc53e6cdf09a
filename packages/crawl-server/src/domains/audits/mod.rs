//! Audit checks - named filter groups configured per SKU

pub mod models;

pub use models::{AuditCheck, NewAuditCheck, PROBLEMATIC_CATEGORY};
