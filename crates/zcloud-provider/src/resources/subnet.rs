//! Subnet reconciler. Subnets carry instances, so deletion is refused while
//! any instance is still bound.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::validate::validate_private_cidr;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::vpc::{
    self, CreateSubnetRequest, ModifySubnetsAttributesRequest, SubnetInfo,
};

const RESOURCE: &str = "subnet";

const CREATE_PENDING: &[&str] = &[vpc::SUBNET_STATUS_PENDING, vpc::SUBNET_STATUS_CREATING];

pub struct Subnet;

impl Subnet {
    fn flatten(data: &mut ResourceData, info: &SubnetInfo) -> Result<()> {
        data.set("subnet_name", &info.subnet_name)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("cidr_block", &info.cidr_block)?;
        if !info.vpc_id.is_empty() {
            data.set("vpc_id", &info.vpc_id)?;
        }
        data.set("instance_ids", &info.instance_ids)?;
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("subnet_status", &info.subnet_status)?;
        data.set("create_time", &info.create_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for Subnet {
    fn type_name(&self) -> &'static str {
        "zcloud_subnet"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        data.require_string("subnet_name")?;
        let cidr = data.require_string("cidr_block")?;
        validate_private_cidr(&cidr)?;
        Ok(())
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["zone_id", "cidr_block", "vpc_id"];
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
        let req = CreateSubnetRequest {
            zone_id: data.require_string("zone_id")?,
            subnet_name: data.require_string("subnet_name")?,
            cidr_block: data.require_string("cidr_block")?,
            vpc_id: data.get_string("vpc_id"),
            resource_group_id: data.get_string("resource_group_id"),
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_subnet(&req).await
        })
        .await?;
        data.set_id(&resp.subnet_id);
        let id = resp.subnet_id;

        let waiter = StateWaiter::new(
            CREATE_PENDING,
            &[vpc::SUBNET_STATUS_AVAILABLE],
            data.timeout_or(ctx.timeouts.write_retry),
        )
        .with_failure(&[vpc::SUBNET_STATUS_CREATE_FAILED]);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_subnet(&id).await?;
                Ok(info.map(|i| {
                    let status = i.subnet_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        let info = info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "subnet disappeared while waiting for AVAILABLE".to_string(),
        })?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_subnet(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info) if info.subnet_status == vpc::SUBNET_STATUS_CREATE_FAILED => {
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
        if prior.changed(data, "subnet_name") {
            let req = ModifySubnetsAttributesRequest {
                subnet_ids: vec![id],
                subnet_name: data.require_string("subnet_name")?,
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_subnets_attributes(&req).await
            })
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();

        if let Some(info) = ctx.client.describe_subnet(&id).await? {
            if !info.instance_ids.is_empty() {
                return Err(ProviderError::InUse {
                    resource: RESOURCE,
                    id,
                    reason: format!("{} instance(s) still bound", info.instance_ids.len()),
                });
            }
        }

        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_subnet(&id).await
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

        let waiter = StateWaiter::new(
            &[vpc::SUBNET_STATUS_AVAILABLE, vpc::SUBNET_STATUS_DELETING],
            &[],
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_subnet(&id).await?;
                Ok(info.map(|i| {
                    let status = i.subnet_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

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

    fn desired() -> ResourceData {
        ResourceData::from_value(json!({
            "zone_id": "asia-east-1a",
            "subnet_name": "workers",
            "cidr_block": "172.16.8.0/24",
        }))
        .unwrap()
    }

    #[test]
    fn public_cidr_is_rejected() {
        let mut data = desired();
        data.set("cidr_block", "8.8.8.0/24").unwrap();
        assert!(Subnet.validate(&data).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refuses_subnet_with_instances() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSubnets",
            json!({"TotalCount": 1, "DataSet": [{
                "SubnetId": "sub-1", "SubnetStatus": "AVAILABLE",
                "InstanceIds": ["i-1"],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("sub-1");
        let err = Subnet.delete(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::InUse { .. }));
    }
}
