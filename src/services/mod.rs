//! Import pipeline services.

pub mod archive;
pub mod batch;
pub mod importer;
pub mod migrate;
pub mod parser;
pub mod reconciler;
pub mod resolver;
