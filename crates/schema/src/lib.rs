//! Column framework: column contracts, dependency assertions and ordering,
//! registries, table layouts and the schema guard.

pub mod column;
pub mod dependencies;
pub mod guard;
pub mod layout;
pub mod ordering;
pub mod registry;
pub mod sorter;

#[cfg(test)]
mod testing;

pub use column::*;
pub use dependencies::*;
pub use guard::Guard;
pub use layout::*;
pub use ordering::InterfaceOrdering;
pub use registry::*;
pub use sorter::sort_all_columns;
