//! Domain types and pure view-model logic shared by the admin service.

pub mod catalog;
pub mod queue;
pub mod records;
pub mod stats;
pub mod tags;
pub mod view;

pub use catalog::*;
pub use queue::*;
pub use records::*;
pub use stats::*;
pub use tags::TagList;
pub use view::*;
