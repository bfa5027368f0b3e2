//! Shared fixtures for reconciler and data-source tests.

use crate::context::Context;
use std::sync::Arc;
use zcloud_core::Timeouts;
use zcloud_sdk::client::testing::MockTransport;
use zcloud_sdk::Client;

pub fn mock_client(mock: &Arc<MockTransport>) -> Client {
    Client::with_transport(mock.clone())
}

pub fn context_with(client: Client) -> Context {
    Context::new(client, Timeouts::default())
}
