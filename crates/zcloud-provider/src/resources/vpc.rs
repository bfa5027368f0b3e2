//! VPC reconciler.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::validate::validate_cidr_network;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::vpc::{
    self, CreateVpcRequest, ModifyVpcsAttributesRequest, VpcInfo,
};

const RESOURCE: &str = "vpc";

pub struct Vpc;

impl Vpc {
    fn flatten(data: &mut ResourceData, info: &VpcInfo) -> Result<()> {
        data.set("vpc_name", &info.vpc_name)?;
        data.set("vpc_region_id", &info.vpc_region_id)?;
        data.set("cidr_block", &info.cidr_block)?;
        data.set("subnet_ids", &info.subnet_ids)?;
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("vpc_status", &info.vpc_status)?;
        data.set("create_time", &info.create_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for Vpc {
    fn type_name(&self) -> &'static str {
        "zcloud_vpc"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        data.require_string("vpc_name")?;
        let cidr = data.require_string("cidr_block")?;
        validate_cidr_network(&cidr)?;
        Ok(())
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["cidr_block", "vpc_region_id"];
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
        let req = CreateVpcRequest {
            vpc_name: data.require_string("vpc_name")?,
            cidr_block: data.require_string("cidr_block")?,
            vpc_region_id: data.get_string("vpc_region_id"),
            resource_group_id: data.get_string("resource_group_id"),
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_vpc(&req).await
        })
        .await?;
        data.set_id(&resp.vpc_id);
        let id = resp.vpc_id;

        let waiter = StateWaiter::new(
            &[vpc::VPC_STATUS_CREATING],
            &[vpc::VPC_STATUS_AVAILABLE],
            data.timeout_or(ctx.timeouts.write_retry),
        )
        .with_failure(&[vpc::VPC_STATUS_CREATE_FAILED]);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_vpc(&id).await?;
                Ok(info.map(|i| {
                    let status = i.vpc_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        let info = info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "vpc disappeared while waiting for AVAILABLE".to_string(),
        })?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_vpc(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info) if info.vpc_status == vpc::VPC_STATUS_CREATE_FAILED => {
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
        if prior.changed(data, "vpc_name") {
            let req = ModifyVpcsAttributesRequest {
                vpc_ids: vec![id],
                vpc_name: data.require_string("vpc_name")?,
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_vpcs_attributes(&req).await
            })
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();

        // refuse to delete a VPC that still carries subnets
        if let Some(info) = ctx.client.describe_vpc(&id).await? {
            if !info.subnet_ids.is_empty() {
                return Err(ProviderError::InUse {
                    resource: RESOURCE,
                    id,
                    reason: format!("{} subnet(s) still attached", info.subnet_ids.len()),
                });
            }
        }

        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_vpc(&id).await
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
            &[vpc::VPC_STATUS_AVAILABLE, vpc::VPC_STATUS_DELETING],
            &[],
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_vpc(&id).await?;
                Ok(info.map(|i| {
                    let status = i.vpc_status.clone();
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
            "vpc_name": "core",
            "cidr_block": "10.0.0.0/16",
        }))
        .unwrap()
    }

    #[test]
    fn host_bits_in_cidr_are_rejected() {
        let mut data = desired();
        data.set("cidr_block", "10.0.0.1/16").unwrap();
        assert!(Vpc.validate(&data).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refuses_vpc_with_subnets() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeVpcs",
            json!({"TotalCount": 1, "DataSet": [{
                "VpcId": "vpc-1", "VpcStatus": "AVAILABLE",
                "SubnetIds": ["sub-1", "sub-2"],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("vpc-1");
        let err = Vpc.delete(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::InUse { .. }));
        assert_eq!(data.id(), Some("vpc-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_disappearance() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeVpcs",
            json!({"TotalCount": 1, "DataSet": [{
                "VpcId": "vpc-1", "VpcStatus": "AVAILABLE",
            }]}),
        );
        mock.push_ok("DeleteVpc", json!({}));
        mock.push_ok(
            "DescribeVpcs",
            json!({"TotalCount": 1, "DataSet": [{
                "VpcId": "vpc-1", "VpcStatus": "DELETING",
            }]}),
        );
        for _ in 0..4 {
            mock.push_ok("DescribeVpcs", json!({"TotalCount": 0, "DataSet": []}));
        }
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("vpc-1");
        Vpc.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
        assert!(mock.exhausted());
    }
}
