pub mod page;
pub mod page_selection;

pub use page::{Page, PageImage, PageWindow, SortDirection};
pub use page_selection::PageSelection;
