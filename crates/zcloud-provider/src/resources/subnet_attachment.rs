//! Subnet / bare-metal instance attachment: `<subnet>:<instance>` composite
//! ID. Binding state is read from the instance's `SubnetStatus` field.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::ids::{composite_id, split_composite};
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::bmc::{self, AssociateSubnetInstanceRequest};

const RESOURCE: &str = "subnet attachment";

pub struct SubnetAttachment;

impl SubnetAttachment {
    async fn wait_subnet_status(
        ctx: &Context,
        instance_id: &str,
        target: &str,
        data: &ResourceData,
    ) -> Result<()> {
        let all: &[&str] = &[
            bmc::SUBNET_STATUS_BINDING,
            bmc::SUBNET_STATUS_UNBINDING,
            bmc::SUBNET_STATUS_BOUND,
            bmc::SUBNET_STATUS_NOT_BIND,
        ];
        let pending: Vec<&str> = all.iter().copied().filter(|s| *s != target).collect();
        let target_set = [target];
        let waiter = StateWaiter::new(
            &pending,
            &target_set,
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.bmc_describe_instance(instance_id).await?;
                Ok(info.map(|i| {
                    let status = i.subnet_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for SubnetAttachment {
    fn type_name(&self) -> &'static str {
        "zcloud_subnet_attachment"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["subnet_id", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let subnet_id = data.require_string("subnet_id")?;
        let instance_id = data.require_string("instance_id")?;

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.bmc_describe_instance(&instance_id).await
        })
        .await?
        .ok_or(ProviderError::invalid(
            "instance_id",
            format!("{instance_id} does not exist"),
        ))?;

        if info.subnet_status == bmc::SUBNET_STATUS_BOUND && info.subnet_id == subnet_id {
            data.set_id(composite_id(&subnet_id, &instance_id));
            return Ok(());
        }
        if info.subnet_status == bmc::SUBNET_STATUS_BOUND {
            return Err(ProviderError::InUse {
                resource: RESOURCE,
                id: instance_id,
                reason: format!("already bound to subnet {}", info.subnet_id),
            });
        }

        let req = AssociateSubnetInstanceRequest {
            subnet_id: subnet_id.clone(),
            instance_id: instance_id.clone(),
        };
        retry(&ctx.write_retry(), || async {
            ctx.client.bmc_associate_subnet_instance(&req).await
        })
        .await?;
        Self::wait_subnet_status(ctx, &instance_id, bmc::SUBNET_STATUS_BOUND, data).await?;
        data.set_id(composite_id(&subnet_id, &instance_id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (subnet_id, instance_id) = split_composite(&id)?;
        let subnet_id = subnet_id.to_string();
        let instance_id = instance_id.to_string();

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.bmc_describe_instance(&instance_id).await
        })
        .await?;
        match info {
            Some(info)
                if info.subnet_status == bmc::SUBNET_STATUS_BOUND
                    && info.subnet_id == subnet_id =>
            {
                data.set("subnet_id", &subnet_id)?;
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
        let (subnet_id, instance_id) = split_composite(&id)?;
        let req = AssociateSubnetInstanceRequest {
            subnet_id: subnet_id.to_string(),
            instance_id: instance_id.to_string(),
        };
        let instance_id = instance_id.to_string();

        let unbound = retry(&ctx.write_retry(), || async {
            ctx.client.bmc_unassociate_subnet_instance(&req).await
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

        Self::wait_subnet_status(ctx, &instance_id, bmc::SUBNET_STATUS_NOT_BIND, data).await?;
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
    async fn create_refuses_instance_bound_elsewhere() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-1", "InstanceStatus": "RUNNING",
                "SubnetStatus": "Bound", "SubnetId": "sub-other",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "subnet_id": "sub-1",
            "instance_id": "i-1",
        }))
        .unwrap();
        let err = SubnetAttachment.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::InUse { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn create_binds_and_waits_for_bound() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-1", "InstanceStatus": "RUNNING",
                "SubnetStatus": "NotBind",
            }]}),
        );
        mock.push_ok("AssociateSubnetInstance", json!({}));
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-1", "SubnetStatus": "Binding",
            }]}),
        );
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-1", "SubnetStatus": "Bound", "SubnetId": "sub-1",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "subnet_id": "sub-1",
            "instance_id": "i-1",
        }))
        .unwrap();
        SubnetAttachment.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("sub-1:i-1"));
        assert!(mock.exhausted());
    }
}
