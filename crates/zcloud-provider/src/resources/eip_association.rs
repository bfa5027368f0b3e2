//! Elastic IP association reconciler. Holds a composite `<eip>:<instance>`
//! ID; the underlying address and instance are separate resources.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::ids::{composite_id, split_composite};
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::eip::{self, AssociateEipAddressRequest, EipInfo};

const RESOURCE: &str = "eip";

pub struct EipAssociation;

impl EipAssociation {
    async fn wait_status(
        ctx: &Context,
        eip_id: &str,
        pending: &[&str],
        target: &str,
        data: &ResourceData,
    ) -> Result<Option<EipInfo>> {
        let target_set = [target];
        let waiter = StateWaiter::new(
            pending,
            &target_set,
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_eip_address(eip_id).await?;
                Ok(info.map(|i| {
                    let status = i.eip_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))
    }
}

#[async_trait]
impl ResourceHandler for EipAssociation {
    fn type_name(&self) -> &'static str {
        "zcloud_eip_association"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["eip_id", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let eip_id = data.require_string("eip_id")?;
        let instance_id = data.require_string("instance_id")?;

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_eip_address(&eip_id).await
        })
        .await?
        .ok_or(ProviderError::invalid("eip_id", format!("{eip_id} does not exist")))?;

        // already bound to the requested instance: adopt it
        if info.eip_status == eip::STATUS_ASSOCIATED && info.instance_id == instance_id {
            data.set_id(composite_id(&eip_id, &instance_id));
            return Ok(());
        }
        if info.eip_status != eip::STATUS_AVAILABLE {
            return Err(ProviderError::IllegalStatus {
                resource: RESOURCE,
                status: info.eip_status,
            });
        }

        let req = AssociateEipAddressRequest {
            eip_id: eip_id.clone(),
            instance_id: instance_id.clone(),
        };
        retry(&ctx.write_retry(), || async {
            ctx.client.associate_eip_address(&req).await
        })
        .await?;
        let bound = Self::wait_status(
            ctx,
            &eip_id,
            &[eip::STATUS_AVAILABLE, eip::STATUS_ASSOCIATING],
            eip::STATUS_ASSOCIATED,
            data,
        )
        .await?;
        if bound.is_none() {
            return Err(ProviderError::Wait {
                resource: RESOURCE,
                reason: "address disappeared while associating".to_string(),
            });
        }
        data.set_id(composite_id(&eip_id, &instance_id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (eip_id, instance_id) = split_composite(&id)?;
        let eip_id = eip_id.to_string();
        let instance_id = instance_id.to_string();

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_eip_address(&eip_id).await
        })
        .await?;
        match info {
            Some(info)
                if info.eip_status == eip::STATUS_ASSOCIATED
                    && info.instance_id == instance_id =>
            {
                data.set("eip_id", &eip_id)?;
                data.set("instance_id", &instance_id)?;
                data.set("ip_address", &info.ip_address)?;
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
        // both halves force replacement
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (eip_id, _) = split_composite(&id)?;
        let eip_id = eip_id.to_string();

        let unassociated = retry(&ctx.write_retry(), || async {
            ctx.client.unassociate_eip_address(&eip_id).await
        })
        .await;
        match unassociated {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                if !inner.is_not_found() {
                    return Err(inner);
                }
            }
        }

        // gone entirely is as good as unbound
        Self::wait_status(
            ctx,
            &eip_id,
            &[eip::STATUS_ASSOCIATED, eip::STATUS_UNASSOCIATING],
            eip::STATUS_AVAILABLE,
            data,
        )
        .await?;

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
            "eip_id": "eip-1",
            "instance_id": "i-1",
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn create_refuses_recycled_address() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "RECYCLE",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        let err = EipAssociation.create(&ctx, &mut data).await.unwrap_err();
        assert_eq!(err.to_string(), "eip status is illegal RECYCLE");
    }

    #[tokio::test(start_paused = true)]
    async fn create_adopts_existing_binding() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "ASSOCIATED", "InstanceId": "i-1",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        EipAssociation.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("eip-1:i-1"));
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn create_associates_and_waits() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "AVAILABLE",
            }]}),
        );
        mock.push_ok("AssociateEipAddress", json!({}));
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "ASSOCIATING",
            }]}),
        );
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "ASSOCIATED", "InstanceId": "i-1",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        EipAssociation.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("eip-1:i-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn read_clears_id_when_rebound_elsewhere() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "ASSOCIATED", "InstanceId": "i-other",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("eip-1:i-1");
        EipAssociation.read(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
