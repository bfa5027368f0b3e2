//! Host-facing descriptor and handler traits.
//!
//! The host hands every CRUD callback a [`ResourceData`]: the desired state
//! as a typed attribute map plus the opaque vendor ID it tracked from the
//! previous apply. Reconcilers read attributes out, drive the API, then
//! write the observed state back into the same descriptor. Clearing the ID
//! tells the host the resource no longer exists.

use crate::context::Context;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Desired/observed state of a single resource instance.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: Option<String>,
    attrs: Map<String, Value>,
    timeout: Option<Duration>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a descriptor from a JSON object of attributes.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(attrs) => Ok(Self {
                id: None,
                attrs,
                timeout: None,
            }),
            _ => Err(ProviderError::invalid("config", "expected a JSON object")),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Host-supplied timeout for the running operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or(ProviderError::MissingArgument("id"))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Drop the ID: the host will treat the resource as gone and re-plan.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Operation timeout, falling back to `default` when the host sent none.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.attrs
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn require_string(&self, key: &'static str) -> Result<String> {
        self.get_string(key)
            .ok_or(ProviderError::MissingArgument(key))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(Value::as_i64)
    }

    pub fn require_i64(&self, key: &'static str) -> Result<i64> {
        self.get_i64(key).ok_or(ProviderError::MissingArgument(key))
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(Value::as_bool)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.attrs
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode a structured attribute (blocks, nested lists).
    pub fn get_block<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attrs
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Write an observed attribute back.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        self.attrs
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// True when the attribute differs between this and `other`.
    pub fn changed(&self, other: &ResourceData, key: &str) -> bool {
        self.attrs.get(key) != other.attrs.get(key)
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }
}

/// One resource type's reconciler.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name, e.g. `zcloud_bmc_instance`.
    fn type_name(&self) -> &'static str;

    /// Cross-field validation, run against the desired state before any API
    /// call. Failures short-circuit the plan.
    fn validate(&self, _data: &ResourceData) -> Result<()> {
        Ok(())
    }

    /// Attribute changes that cannot be applied in place. The host destroys
    /// and re-creates when this returns a non-empty list.
    fn requires_replacement(
        &self,
        _prior: &ResourceData,
        _planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        Ok(Vec::new())
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    async fn update(
        &self,
        ctx: &Context,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()>;

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Import an existing object by vendor ID. The default reuses the read
    /// path; attachment resources override this to parse composite IDs.
    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let mut data = ResourceData::new().with_id(id);
        self.read(ctx, &mut data).await?;
        if data.id().is_none() {
            return Err(ProviderError::invalid("id", format!("{id} does not exist")));
        }
        Ok(data)
    }
}

/// One data source's reader.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name, e.g. `zcloud_bmc_instances`.
    fn type_name(&self) -> &'static str;

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_getters() {
        let data = ResourceData::from_value(json!({
            "name": "web-1",
            "size": 40,
            "ratio": 1.5,
            "force": true,
            "keys": ["a", "b"],
            "absent": null,
        }))
        .unwrap();
        assert_eq!(data.get_string("name").as_deref(), Some("web-1"));
        assert_eq!(data.get_i64("size"), Some(40));
        assert_eq!(data.get_f64("ratio"), Some(1.5));
        assert_eq!(data.get_bool("force"), Some(true));
        assert_eq!(data.get_string_list("keys"), vec!["a", "b"]);
        assert!(!data.contains("absent"));
        assert!(!data.contains("missing"));
    }

    #[test]
    fn require_reports_missing_argument() {
        let data = ResourceData::new();
        match data.require_string("zone_id") {
            Err(ProviderError::MissingArgument(name)) => assert_eq!(name, "zone_id"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn id_lifecycle() {
        let mut data = ResourceData::new().with_id("i-1");
        assert_eq!(data.id(), Some("i-1"));
        data.clear_id();
        assert!(data.id().is_none());
        assert!(data.require_id().is_err());
    }

    #[test]
    fn changed_compares_attribute_values() {
        let a = ResourceData::from_value(json!({"bandwidth": 10})).unwrap();
        let b = ResourceData::from_value(json!({"bandwidth": 20})).unwrap();
        assert!(a.changed(&b, "bandwidth"));
        assert!(!a.changed(&a.clone(), "bandwidth"));
    }
}
