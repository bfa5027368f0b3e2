//! Transport and client plumbing.
//!
//! Every endpoint is `POST {endpoint}/api/v2/{service}` with the action in
//! the `X-Zc-Action` header and a JSON body. Responses come back in an
//! envelope:
//!
//! ```json
//! {"Response": {"RequestId": "...", ...}}
//! {"Response": {"RequestId": "...", "Error": {"Code": "...", "Message": "..."}}}
//! ```

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://console.zcloud.example.com";
const API_VERSION: &str = "2023-01-01";

/// How a request reaches the API. Reconciler tests substitute a
/// [`MockTransport`] here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one action against one service and return the decoded
    /// `Response` payload.
    async fn call(&self, service: &str, action: &str, payload: Value) -> Result<Value>;
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub access_key_id: String,
    pub access_key_password: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(access_key_id: impl Into<String>, access_key_password: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_password: access_key_password.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiFault {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

fn unwrap_envelope(action: &str, body: Value) -> Result<Value> {
    let envelope: Envelope = serde_json::from_value(body)?;
    let response = envelope
        .response
        .ok_or_else(|| SdkError::MissingResponse(action.to_string()))?;
    let request_id = response
        .get("RequestId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(fault) = response.get("Error") {
        let fault: ApiFault = serde_json::from_value(fault.clone())?;
        return Err(SdkError::Api {
            code: fault.code,
            message: fault.message,
            request_id,
        });
    }
    Ok(response)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, service: &str, action: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/api/v2/{}", self.config.endpoint, service);
        tracing::debug!(service, action, "calling api");
        let body: Value = self
            .http
            .post(&url)
            .header("X-Zc-Action", action)
            .header("X-Zc-Version", API_VERSION)
            .header("X-Zc-Access-Key-Id", &self.config.access_key_id)
            .header("X-Zc-Access-Key-Password", &self.config.access_key_password)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        unwrap_envelope(action, body)
    }
}

/// Handle shared by every reconciler. Cloning is cheap; the transport is
/// reference-counted and thread-safe.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(config)?),
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(crate) async fn request<Req, Resp>(
        &self,
        service: &str,
        action: &str,
        req: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(req)?;
        let response = self.transport.call(service, action, payload).await?;
        Ok(serde_json::from_value(response)?)
    }
}

pub mod testing {
    //! In-memory transport for reconciler tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One recorded call.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub service: String,
        pub action: String,
        pub payload: Value,
    }

    enum Primed {
        Ok { action: String, response: Value },
        Err { action: String, error_code: String },
    }

    /// Transport that answers from a primed queue and records every call.
    #[derive(Default)]
    pub struct MockTransport {
        queue: Mutex<VecDeque<Primed>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful `Response` payload for the given action.
        pub fn push_ok(&self, action: &str, response: Value) {
            self.queue.lock().expect("mock poisoned").push_back(Primed::Ok {
                action: action.to_string(),
                response,
            });
        }

        /// Queue an API fault for the given action.
        pub fn push_err(&self, action: &str, code: &str) {
            self.queue.lock().expect("mock poisoned").push_back(Primed::Err {
                action: action.to_string(),
                error_code: code.to_string(),
            });
        }

        /// Everything the client has called so far.
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().expect("mock poisoned").clone()
        }

        /// Actions called, in order.
        pub fn actions(&self) -> Vec<String> {
            self.calls().into_iter().map(|c| c.action).collect()
        }

        /// True when every primed response has been consumed.
        pub fn exhausted(&self) -> bool {
            self.queue.lock().expect("mock poisoned").is_empty()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn call(&self, service: &str, action: &str, payload: Value) -> Result<Value> {
            self.calls.lock().expect("mock poisoned").push(RecordedCall {
                service: service.to_string(),
                action: action.to_string(),
                payload,
            });
            let primed = self
                .queue
                .lock()
                .expect("mock poisoned")
                .pop_front()
                .ok_or_else(|| SdkError::UnexpectedCall(action.to_string()))?;
            match primed {
                Primed::Ok {
                    action: expected,
                    response,
                } => {
                    if expected != action {
                        return Err(SdkError::UnexpectedCall(format!(
                            "{action} (expected {expected})"
                        )));
                    }
                    Ok(response)
                }
                Primed::Err {
                    action: expected,
                    error_code,
                } => {
                    if expected != action {
                        return Err(SdkError::UnexpectedCall(format!(
                            "{action} (expected {expected})"
                        )));
                    }
                    Err(SdkError::Api {
                        code: error_code,
                        message: "mock fault".to_string(),
                        request_id: "mock".to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_unwraps_payload() {
        let body = json!({"Response": {"RequestId": "r-1", "InstanceId": "i-1"}});
        let payload = unwrap_envelope("DescribeInstances", body).unwrap();
        assert_eq!(payload["InstanceId"], "i-1");
    }

    #[test]
    fn envelope_surfaces_api_fault() {
        let body = json!({"Response": {
            "RequestId": "r-2",
            "Error": {"Code": "INVALID_EIP_NOT_FOUND", "Message": "gone"}
        }});
        let err = unwrap_envelope("DescribeEipAddresses", body).unwrap_err();
        match err {
            SdkError::Api { code, request_id, .. } => {
                assert_eq!(code, "INVALID_EIP_NOT_FOUND");
                assert_eq!(request_id, "r-2");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn missing_response_is_an_error() {
        let err = unwrap_envelope("X", json!({})).unwrap_err();
        assert!(matches!(err, SdkError::MissingResponse(_)));
    }
}
