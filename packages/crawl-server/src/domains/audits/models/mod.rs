pub mod audit_check;

pub use audit_check::{AuditCheck, NewAuditCheck, PROBLEMATIC_CATEGORY};
