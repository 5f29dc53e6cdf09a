pub mod view;

pub use view::{NewView, View};
