//! Controller primitives shared by every zcloud reconciler.
//!
//! This crate carries no knowledge of individual resource types. It provides
//! the building blocks the reconcilers in `zcloud-provider` are assembled
//! from:
//!
//! - [`retry`]: bounded retry with jittered backoff and a vendor error-code
//!   retry table
//! - [`waiter`]: state-transition polling against pending/target/failure
//!   status sets
//! - [`pager`]: order-preserving concurrent fetch of paginated list results
//! - [`classify`]: mapping of vendor error codes onto a small taxonomy
//! - [`config`]: environment-derived operation timeouts
//! - [`ids`]: composite and content-addressed identifiers
//! - [`validate`]: field validators used by resource schemas

pub mod classify;
pub mod config;
pub mod ids;
pub mod pager;
pub mod retry;
pub mod validate;
pub mod waiter;

pub use classify::{classify, ErrorClass, VendorFault};
pub use config::Timeouts;
pub use ids::{composite_id, datasource_id, decode_rule_id, rule_id, split_composite};
pub use pager::{fetch_all_pages, Page, MAX_IN_FLIGHT_PAGES};
pub use retry::{retry, RetryError, RetryPolicy};
pub use waiter::{StateWaiter, WaitError};
