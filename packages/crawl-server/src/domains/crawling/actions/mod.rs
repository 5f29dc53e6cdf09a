//! Crawling session actions - business logic functions
//!
//! Each action takes the stores through `CoreDeps` and a cancellation token.

pub mod claims;
pub mod lifecycle;
pub mod progress;

pub use claims::{claim_pending_sessions, claim_stalled_sessions};
pub use lifecycle::{create_session, get_session, prevent_in_progress};
pub use progress::{mark_session_done, update_progress, update_site_info};
