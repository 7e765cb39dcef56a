//! Core types for the session engine.

pub mod error;
pub mod hit;
pub mod metadata;
pub mod schema;
pub mod session;
pub mod value;

pub use error::{Error, Result};
pub use hit::*;
pub use metadata::*;
pub use schema::*;
pub use session::*;
pub use value::*;
