pub mod page_count;

pub use page_count::view_page_count;
