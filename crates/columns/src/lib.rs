//! Column catalog: canonical interfaces, generic column builders, the
//! URL parameter blacklist, device detection and the default column set.

pub mod blacklist;
pub mod cast;
pub mod catalog;
pub mod device;
pub mod event;
pub mod generic;
pub mod interfaces;
pub mod session;
pub mod sse;

pub use blacklist::UrlParamsBlacklist;
pub use catalog::{default_columns, default_ordering, ColumnDeps};
pub use device::{ClientHints, DeviceDetector};
pub use generic::{SimpleEventColumn, SimpleSessionColumn, SimpleSessionScopedEventColumn};
pub use interfaces::{core, ext, CoreInterfaces, ExtendedInterfaces};
