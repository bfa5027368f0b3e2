//! Resource reconcilers and data sources for the zcloud
//! declarative-configuration provider.
//!
//! The host drives CRUD callbacks through [`ResourceHandler`] and
//! [`DataSource`] implementations looked up in the [`Provider`] registry;
//! every implementation talks to the vendor through the `zcloud-sdk`
//! client and the retry/wait primitives in `zcloud-core`.

pub mod context;
pub mod datasource;
pub mod error;
pub mod provider;
pub mod resources;
pub mod schema;

#[cfg(test)]
mod testutil;

pub use context::Context;
pub use error::{ProviderError, Result};
pub use provider::Provider;
pub use schema::{DataSource, ResourceData, ResourceHandler};
