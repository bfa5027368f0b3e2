//! Elastic IP reconciler.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::bmc::{CHARGE_TYPE_POSTPAID, CHARGE_TYPE_PREPAID};
use zcloud_sdk::eip::{self, CreateEipAddressesRequest, EipInfo};

const RESOURCE: &str = "eip";

const DELETE_PENDING: &[&str] = &[
    eip::STATUS_AVAILABLE,
    eip::STATUS_RELEASING,
    eip::STATUS_RECYCLING,
];

pub struct Eip;

impl Eip {
    fn flatten(data: &mut ResourceData, info: &EipInfo) -> Result<()> {
        data.set("ip_address", &info.ip_address)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("eip_charge_type", &info.eip_charge_type)?;
        if info.eip_charge_type == CHARGE_TYPE_PREPAID {
            data.set("eip_charge_prepaid_period", info.period)?;
        }
        if !info.instance_id.is_empty() {
            data.set("instance_id", &info.instance_id)?;
            data.set("instance_name", &info.instance_name)?;
        }
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("eip_status", &info.eip_status)?;
        data.set("create_time", &info.create_time)?;
        data.set("expired_time", &info.expired_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for Eip {
    fn type_name(&self) -> &'static str {
        "zcloud_eip"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        let charge_type = data.require_string("eip_charge_type")?;
        let period = data.get_i64("eip_charge_prepaid_period");
        match charge_type.as_str() {
            CHARGE_TYPE_PREPAID => {
                if period.is_none() {
                    return Err(ProviderError::MissingArgument("eip_charge_prepaid_period"));
                }
            }
            CHARGE_TYPE_POSTPAID => {
                if period.is_some() {
                    return Err(ProviderError::invalid(
                        "eip_charge_prepaid_period",
                        "only valid for PREPAID addresses",
                    ));
                }
            }
            other => {
                return Err(ProviderError::invalid(
                    "eip_charge_type",
                    format!("unknown charge type {other:?}"),
                ));
            }
        }
        Ok(())
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["zone_id", "eip_charge_type"];
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
        let req = CreateEipAddressesRequest {
            zone_id: data.require_string("zone_id")?,
            eip_charge_type: data.require_string("eip_charge_type")?,
            eip_charge_prepaid_period: data.get_i64("eip_charge_prepaid_period"),
            resource_group_id: data.get_string("resource_group_id"),
            amount: 1,
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_eip_addresses(&req).await
        })
        .await?;
        let id = resp
            .eip_ids
            .first()
            .ok_or(ProviderError::invalid("eip", "create returned no id"))?
            .clone();
        data.set_id(&id);

        let waiter = StateWaiter::new(
            &[eip::STATUS_CREATING],
            &[eip::STATUS_AVAILABLE],
            data.timeout_or(ctx.timeouts.write_retry),
        )
        .with_failure(&[eip::STATUS_CREATE_FAILED]);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_eip_address(&id).await?;
                Ok(info.map(|i| {
                    let status = i.eip_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        let info = info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "eip disappeared while waiting for AVAILABLE".to_string(),
        })?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_eip_address(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info)
                if info.eip_status == eip::STATUS_CREATE_FAILED
                    || info.eip_status == eip::STATUS_RECYCLE =>
            {
                data.clear_id();
                Ok(())
            }
            Some(info) => Self::flatten(data, &info),
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()> {
        // nothing mutable in place; association is its own resource
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let force_delete = data.get_bool("force_delete").unwrap_or(false);

        let terminated = retry(&ctx.write_retry(), || async {
            ctx.client.terminate_eip_address(&id).await
        })
        .await;
        match terminated {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                match &inner {
                    ProviderError::Api(api) if api.is_recycled() || api.is_not_found() => {}
                    _ => return Err(inner),
                }
            }
        }

        let waiter = StateWaiter::new(
            DELETE_PENDING,
            &[eip::STATUS_RECYCLE],
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_eip_address(&id).await?;
                Ok(info.map(|i| {
                    let status = i.eip_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

        if force_delete {
            let released = retry(&ctx.write_retry(), || async {
                ctx.client.release_eip_addresses(&[id.clone()]).await
            })
            .await;
            match released {
                Ok(_) => {}
                Err(e) => {
                    let inner = ProviderError::from(e);
                    if !inner.is_not_found() {
                        return Err(inner);
                    }
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

    fn desired() -> ResourceData {
        ResourceData::from_value(json!({
            "zone_id": "asia-east-1a",
            "eip_charge_type": "POSTPAID",
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_available() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateEipAddresses", json!({"EipIds": ["eip-1"]}));
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "CREATING",
            }]}),
        );
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "AVAILABLE",
                "IpAddress": "203.0.113.4", "EipChargeType": "POSTPAID",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        Eip.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("eip-1"));
        assert_eq!(data.get_string("ip_address").as_deref(), Some("203.0.113.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_runs_two_phase_with_force() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("TerminateEipAddress", json!({}));
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "RECYCLING",
            }]}),
        );
        mock.push_ok(
            "DescribeEipAddresses",
            json!({"TotalCount": 1, "DataSet": [{
                "EipId": "eip-1", "EipStatus": "RECYCLE",
            }]}),
        );
        mock.push_ok("ReleaseEipAddresses", json!({}));
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("eip-1");
        data.set("force_delete", true).unwrap();
        Eip.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
        assert!(mock.exhausted());
    }
}
