//! Typed client for the zcloud HTTP API.
//!
//! Endpoints are grouped by service: bare-metal compute ([`bmc`]), virtual
//! machines ([`vm`]), block storage ([`disk`]), images ([`image`]), SSH key
//! pairs ([`keypair`]), VPC/subnet ([`vpc`]), elastic IPs ([`eip`]),
//! DDoS-protected IPs ([`ddos`]), security groups ([`sg`]), and the global
//! accelerator ([`zga`]).
//!
//! The HTTP layer sits behind the [`client::Transport`] trait; reconciler
//! tests swap in [`client::testing::MockTransport`].

pub mod bmc;
pub mod client;
pub mod ddos;
pub mod disk;
pub mod eip;
pub mod error;
pub mod image;
pub mod keypair;
pub mod sg;
pub mod vm;
pub mod vpc;
pub mod zga;

pub use client::{Client, ClientConfig, Transport};
pub use error::{Result, SdkError};
