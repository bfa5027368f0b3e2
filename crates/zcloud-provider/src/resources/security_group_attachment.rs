//! Security group / instance attachment: `<group>:<instance>` composite ID.
//! The association has no state machine of its own; membership is read from
//! the group's instance list.

use crate::context::Context;
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::ids::{composite_id, split_composite};
use zcloud_core::retry::retry;
use zcloud_sdk::sg::AssociateSecurityGroupInstanceRequest;

pub struct SecurityGroupAttachment;

#[async_trait]
impl ResourceHandler for SecurityGroupAttachment {
    fn type_name(&self) -> &'static str {
        "zcloud_security_group_attachment"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["security_group_id", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let group_id = data.require_string("security_group_id")?;
        let instance_id = data.require_string("instance_id")?;

        let group = retry(&ctx.read_retry(), || async {
            ctx.client.describe_security_group(&group_id).await
        })
        .await?
        .ok_or(ProviderError::invalid(
            "security_group_id",
            format!("{group_id} does not exist"),
        ))?;

        if !group.instance_ids.iter().any(|i| i == &instance_id) {
            let req = AssociateSecurityGroupInstanceRequest {
                security_group_id: group_id.clone(),
                instance_id: instance_id.clone(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.associate_security_group_instance(&req).await
            })
            .await?;
        }
        data.set_id(composite_id(&group_id, &instance_id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (group_id, instance_id) = split_composite(&id)?;
        let group_id = group_id.to_string();
        let instance_id = instance_id.to_string();

        let group = retry(&ctx.read_retry(), || async {
            ctx.client.describe_security_group(&group_id).await
        })
        .await?;
        match group {
            Some(group) if group.instance_ids.iter().any(|i| i == &instance_id) => {
                data.set("security_group_id", &group_id)?;
                data.set("instance_id", &instance_id)?;
                Ok(())
            }
            _ => {
                data.clear_id();
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()> {
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (group_id, instance_id) = split_composite(&id)?;
        let req = AssociateSecurityGroupInstanceRequest {
            security_group_id: group_id.to_string(),
            instance_id: instance_id.to_string(),
        };
        let unbound = retry(&ctx.write_retry(), || async {
            ctx.client.unassociate_security_group_instance(&req).await
        })
        .await;
        match unbound {
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

    #[tokio::test(start_paused = true)]
    async fn create_is_idempotent_for_existing_member() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "InstanceIds": ["i-1"],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "security_group_id": "sg-1",
            "instance_id": "i-1",
        }))
        .unwrap();
        SecurityGroupAttachment.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("sg-1:i-1"));
        // no Associate call was queued; exhausted proves none was needed
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn read_clears_id_when_membership_dropped() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "InstanceIds": [],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("sg-1:i-1");
        SecurityGroupAttachment.read(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
