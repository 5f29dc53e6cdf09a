//! Page read actions - listing, per-check samples and link details

pub mod checks_with_pages;
pub mod list_pages;
pub mod page_details;

pub use checks_with_pages::{checks_with_pages, CheckWithPages, DEFAULT_PAGES_PER_CHECK};
pub use list_pages::{list_pages, PageList, PageListRequest};
pub use page_details::{page_details, PageDetails, DEFAULT_DETAILS_LIMIT};
