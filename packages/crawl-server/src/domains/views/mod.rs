//! Views - saved page filters of a SKU

pub mod actions;
pub mod models;

pub use actions::view_page_count;
pub use models::{NewView, View};
