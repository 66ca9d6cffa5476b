//! Kernel report ingest library.
//!
//! Import, normalization, reference-resolution, reconciliation, archival and
//! legacy-schema migration for heterogeneous kernel CI JSON reports: jobs,
//! builds (defconfigs), boot reports and test suites/sets/cases.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
