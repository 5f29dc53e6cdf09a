pub mod cancellation;
pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod pagination;

pub use cancellation::cancellable;
pub use entity_ids::*;
pub use errors::{CoreError, ErrorKind};
pub use pagination::{PaginationArgs, ValidatedPagination, DEFAULT_PAGE_LIMIT};
