//! Shared support for the end-to-end tests: mocks, fixtures and a wired
//! pipeline backed by the in-memory warehouse.

pub mod fixtures;
pub mod mocks;
pub mod setup;
