//! SSH key pair reconciler. The key material is immutable; renames and
//! public-key changes force a new import.

use crate::context::Context;
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::validate::validate_string_len;
use zcloud_sdk::keypair::{ImportKeyPairRequest, KeyPairInfo, ModifyKeyPairAttributeRequest};

pub struct KeyPair;

impl KeyPair {
    fn flatten(data: &mut ResourceData, info: &KeyPairInfo) -> Result<()> {
        data.set("key_name", &info.key_name)?;
        data.set("public_key", &info.public_key)?;
        data.set("key_description", &info.key_description)?;
        data.set("create_time", &info.create_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for KeyPair {
    fn type_name(&self) -> &'static str {
        "zcloud_key_pair"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        let name = data.require_string("key_name")?;
        validate_string_len(&name, 1, 64)?;
        data.require_string("public_key")?;
        Ok(())
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["key_name", "public_key"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let req = ImportKeyPairRequest {
            key_name: data.require_string("key_name")?,
            public_key: data.require_string("public_key")?,
            key_description: data.get_string("key_description"),
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.import_key_pair(&req).await
        })
        .await?;
        data.set_id(&resp.key_id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_key_pair(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info) => Self::flatten(data, &info),
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()> {
        let id = data.require_id()?.to_string();
        if prior.changed(data, "key_description") {
            let req = ModifyKeyPairAttributeRequest {
                key_id: id,
                key_description: data.get_string("key_description").unwrap_or_default(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_key_pair_attribute(&req).await
            })
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_key_pairs(&[id.clone()]).await
        })
        .await;
        match deleted {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                if !inner.is_not_found() {
                    return Err(inner);
                }
            }
        }
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, mock_client};
    use serde_json::json;
    use std::sync::Arc;
    use zcloud_sdk::client::testing::MockTransport;

    #[test]
    fn public_key_change_forces_replacement() {
        let prior = ResourceData::from_value(json!({
            "key_name": "ops",
            "public_key": "ssh-ed25519 AAAA old",
        }))
        .unwrap();
        let planned = ResourceData::from_value(json!({
            "key_name": "ops",
            "public_key": "ssh-ed25519 AAAA new",
        }))
        .unwrap();
        assert_eq!(
            KeyPair.requires_replacement(&prior, &planned).unwrap(),
            vec!["public_key"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn import_then_read_back() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("ImportKeyPair", json!({"KeyId": "key-1"}));
        mock.push_ok(
            "DescribeKeyPairs",
            json!({"TotalCount": 1, "DataSet": [{
                "KeyId": "key-1", "KeyName": "ops",
                "PublicKey": "ssh-ed25519 AAAA",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "key_name": "ops",
            "public_key": "ssh-ed25519 AAAA",
        }))
        .unwrap();
        KeyPair.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("key-1"));
        assert!(mock.exhausted());
    }
}
