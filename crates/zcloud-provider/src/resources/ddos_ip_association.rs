//! DDoS-protected IP association reconciler. Mirrors the elastic IP
//! association with a `<ddos_ip>:<instance>` composite ID.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::ids::{composite_id, split_composite};
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::ddos::{AssociateDdosIpRequest, DdosIpInfo};
use zcloud_sdk::eip;

const RESOURCE: &str = "ddos";

pub struct DdosIpAssociation;

impl DdosIpAssociation {
    async fn wait_status(
        ctx: &Context,
        ddos_ip_id: &str,
        pending: &[&str],
        target: &str,
        data: &ResourceData,
    ) -> Result<Option<DdosIpInfo>> {
        let target_set = [target];
        let waiter = StateWaiter::new(
            pending,
            &target_set,
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_ddos_ip(ddos_ip_id).await?;
                Ok(info.map(|i| {
                    let status = i.ddos_ip_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))
    }
}

#[async_trait]
impl ResourceHandler for DdosIpAssociation {
    fn type_name(&self) -> &'static str {
        "zcloud_ddos_ip_association"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["ddos_ip_id", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let ddos_ip_id = data.require_string("ddos_ip_id")?;
        let instance_id = data.require_string("instance_id")?;

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_ddos_ip(&ddos_ip_id).await
        })
        .await?
        .ok_or(ProviderError::invalid(
            "ddos_ip_id",
            format!("{ddos_ip_id} does not exist"),
        ))?;

        if info.ddos_ip_status == eip::STATUS_ASSOCIATED && info.instance_id == instance_id {
            data.set_id(composite_id(&ddos_ip_id, &instance_id));
            return Ok(());
        }
        if info.ddos_ip_status != eip::STATUS_AVAILABLE {
            return Err(ProviderError::IllegalStatus {
                resource: RESOURCE,
                status: info.ddos_ip_status,
            });
        }

        let req = AssociateDdosIpRequest {
            ddos_ip_id: ddos_ip_id.clone(),
            instance_id: instance_id.clone(),
        };
        retry(&ctx.write_retry(), || async {
            ctx.client.associate_ddos_ip(&req).await
        })
        .await?;
        let bound = Self::wait_status(
            ctx,
            &ddos_ip_id,
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
        data.set_id(composite_id(&ddos_ip_id, &instance_id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (ddos_ip_id, instance_id) = split_composite(&id)?;
        let ddos_ip_id = ddos_ip_id.to_string();
        let instance_id = instance_id.to_string();

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_ddos_ip(&ddos_ip_id).await
        })
        .await?;
        match info {
            Some(info)
                if info.ddos_ip_status == eip::STATUS_ASSOCIATED
                    && info.instance_id == instance_id =>
            {
                data.set("ddos_ip_id", &ddos_ip_id)?;
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
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (ddos_ip_id, _) = split_composite(&id)?;
        let ddos_ip_id = ddos_ip_id.to_string();

        let unassociated = retry(&ctx.write_retry(), || async {
            ctx.client.unassociate_ddos_ip(&ddos_ip_id).await
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

        Self::wait_status(
            ctx,
            &ddos_ip_id,
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

    #[tokio::test(start_paused = true)]
    async fn create_refuses_recycled_address() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeDdosIps",
            json!({"TotalCount": 1, "DataSet": [{
                "DdosIpId": "dip-1", "DdosIpStatus": "RECYCLE",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "ddos_ip_id": "dip-1",
            "instance_id": "i-1",
        }))
        .unwrap();
        let err = DdosIpAssociation.create(&ctx, &mut data).await.unwrap_err();
        assert_eq!(err.to_string(), "ddos status is illegal RECYCLE");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_tolerates_address_already_gone() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err("UnassociateDdosIp", "INVALID_DDOS_IP_NOT_FOUND");
        for _ in 0..4 {
            mock.push_err("DescribeDdosIps", "INVALID_DDOS_IP_NOT_FOUND");
        }
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("dip-1:i-1");
        DdosIpAssociation.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
