//! DDoS-protected IP reconciler. Shares the elastic IP state machine.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::bmc::{CHARGE_TYPE_POSTPAID, CHARGE_TYPE_PREPAID};
use zcloud_sdk::ddos::{CreateDdosIpsRequest, DdosIpInfo};
use zcloud_sdk::eip;

const RESOURCE: &str = "ddos ip";

const DELETE_PENDING: &[&str] = &[
    eip::STATUS_AVAILABLE,
    eip::STATUS_RELEASING,
    eip::STATUS_RECYCLING,
];

pub struct DdosIp;

impl DdosIp {
    fn flatten(data: &mut ResourceData, info: &DdosIpInfo) -> Result<()> {
        data.set("ip_address", &info.ip_address)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("ddos_ip_charge_type", &info.ddos_ip_charge_type)?;
        if info.ddos_ip_charge_type == CHARGE_TYPE_PREPAID {
            data.set("ddos_ip_charge_prepaid_period", info.period)?;
        }
        if !info.instance_id.is_empty() {
            data.set("instance_id", &info.instance_id)?;
            data.set("instance_name", &info.instance_name)?;
        }
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("ddos_ip_status", &info.ddos_ip_status)?;
        data.set("create_time", &info.create_time)?;
        data.set("expired_time", &info.expired_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for DdosIp {
    fn type_name(&self) -> &'static str {
        "zcloud_ddos_ip"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        let charge_type = data.require_string("ddos_ip_charge_type")?;
        let period = data.get_i64("ddos_ip_charge_prepaid_period");
        match charge_type.as_str() {
            CHARGE_TYPE_PREPAID => {
                if period.is_none() {
                    return Err(ProviderError::MissingArgument(
                        "ddos_ip_charge_prepaid_period",
                    ));
                }
            }
            CHARGE_TYPE_POSTPAID => {
                if period.is_some() {
                    return Err(ProviderError::invalid(
                        "ddos_ip_charge_prepaid_period",
                        "only valid for PREPAID addresses",
                    ));
                }
            }
            other => {
                return Err(ProviderError::invalid(
                    "ddos_ip_charge_type",
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
        const FORCE_NEW: &[&str] = &["zone_id", "ddos_ip_charge_type"];
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
        let req = CreateDdosIpsRequest {
            zone_id: data.require_string("zone_id")?,
            ddos_ip_charge_type: data.require_string("ddos_ip_charge_type")?,
            ddos_ip_charge_prepaid_period: data.get_i64("ddos_ip_charge_prepaid_period"),
            resource_group_id: data.get_string("resource_group_id"),
            amount: 1,
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_ddos_ips(&req).await
        })
        .await?;
        let id = resp
            .ddos_ip_ids
            .first()
            .ok_or(ProviderError::invalid("ddos_ip", "create returned no id"))?
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
                let info = ctx.client.describe_ddos_ip(&id).await?;
                Ok(info.map(|i| {
                    let status = i.ddos_ip_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        let info = info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "address disappeared while waiting for AVAILABLE".to_string(),
        })?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_ddos_ip(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info)
                if info.ddos_ip_status == eip::STATUS_CREATE_FAILED
                    || info.ddos_ip_status == eip::STATUS_RECYCLE =>
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
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let force_delete = data.get_bool("force_delete").unwrap_or(false);

        let terminated = retry(&ctx.write_retry(), || async {
            ctx.client.terminate_ddos_ip(&id).await
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
                let info = ctx.client.describe_ddos_ip(&id).await?;
                Ok(info.map(|i| {
                    let status = i.ddos_ip_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

        if force_delete {
            let released = retry(&ctx.write_retry(), || async {
                ctx.client.release_ddos_ips(&[id.clone()]).await
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
    use serde_json::json;

    #[test]
    fn prepaid_requires_period() {
        let data = ResourceData::from_value(json!({
            "zone_id": "asia-east-1a",
            "ddos_ip_charge_type": "PREPAID",
        }))
        .unwrap();
        assert!(matches!(
            DdosIp.validate(&data),
            Err(ProviderError::MissingArgument("ddos_ip_charge_prepaid_period"))
        ));
    }
}
