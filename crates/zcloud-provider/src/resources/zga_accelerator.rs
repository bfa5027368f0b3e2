//! Global accelerator reconciler.
//!
//! Create sends one composite request and then applies access control as a
//! separate step, since the vendor keeps those endpoints apart. Update
//! patches each changed sub-object with its own modify call, in a fixed
//! order, and every mutation is followed by a wait for the accelerator to
//! leave `Deploying`.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::resources::zga_config::AcceleratorConfig;
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::zga::{
    self, AcceleratorInfo, ModifyAcceleratorAccessControlRulesRequest,
    ModifyAcceleratorCertificateRequest, ModifyAcceleratorDomainRequest,
    ModifyAcceleratorHealthCheckRequest, ModifyAcceleratorListenersRequest,
    ModifyAcceleratorNameRequest, ModifyAcceleratorOriginRequest,
    ModifyAcceleratorProtocolOptsRequest,
};

const RESOURCE: &str = "accelerator";

pub struct ZgaAccelerator;

impl ZgaAccelerator {
    /// Block until the accelerator has redeployed after a mutation.
    async fn settle(ctx: &Context, id: &str, timeout: Duration) -> Result<AcceleratorInfo> {
        let waiter = StateWaiter::new(
            &[zga::STATUS_DEPLOYING],
            &[zga::STATUS_ACCELERATING],
            timeout,
        )
        .with_failure(&[zga::STATUS_ACCELERATE_FAILURE]);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_accelerator(id).await?;
                Ok(info.map(|i| {
                    let status = i.accelerator_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "accelerator disappeared while deploying".to_string(),
        })
    }

    fn flatten(data: &mut ResourceData, info: &AcceleratorInfo) -> Result<()> {
        data.set("accelerator_name", &info.accelerator_name)?;
        data.set("charge_type", &info.charge_type)?;
        data.set("cname", &info.cname)?;
        data.set("accelerator_status", &info.accelerator_status)?;
        if !info.certificate_id.is_empty() {
            data.set("certificate_id", &info.certificate_id)?;
        }
        match &info.domain {
            Some(d) => data.set(
                "domain",
                json!({"domain": d.domain, "relate_domains": d.relate_domains}),
            )?,
            None => data.set("domain", Value::Null)?,
        }
        data.set(
            "origin",
            json!({
                "origin_region_id": info.origin.origin_region_id,
                "origin": info.origin.origin,
                "backup_origin": info.origin.backup_origin,
            }),
        )?;
        let regions: Vec<Value> = info
            .accelerate_regions
            .iter()
            .map(|r| {
                json!({
                    "accelerate_region_id": r.accelerate_region_id,
                    "bandwidth": r.bandwidth,
                    "vip": r.vip,
                })
            })
            .collect();
        data.set("accelerate_regions", regions)?;
        let l4: Vec<Value> = info
            .l4_listeners
            .iter()
            .map(|l| {
                json!({
                    "protocol": l.protocol,
                    "port": l.port,
                    "port_range": l.port_range,
                    "back_port": l.back_port,
                    "back_port_range": l.back_port_range,
                })
            })
            .collect();
        data.set("l4_listeners", l4)?;
        let l7: Vec<Value> = info
            .l7_listeners
            .iter()
            .map(|l| {
                json!({
                    "protocol": l.protocol,
                    "port": l.port,
                    "port_range": l.port_range,
                    "back_protocol": l.back_protocol,
                    "back_port": l.back_port,
                    "back_port_range": l.back_port_range,
                    "host": l.host,
                })
            })
            .collect();
        data.set("l7_listeners", l7)?;
        if let Some(o) = &info.protocol_opts {
            data.set(
                "protocol_opts",
                json!({
                    "toa": o.toa,
                    "toa_value": o.toa_value,
                    "websocket": o.websocket,
                    "proxy_protocol": o.proxy_protocol,
                    "gzip": o.gzip,
                }),
            )?;
        }
        if let Some(h) = &info.health_check {
            data.set("health_check", json!({"enable": h.enable, "port": h.port}))?;
        }
        if let Some(ac) = &info.access_control {
            let rules: Vec<Value> = ac
                .rules
                .iter()
                .map(|r| {
                    json!({
                        "listener": r.listener,
                        "directory": r.directory,
                        "policy": r.policy,
                        "cidr_ip": r.cidr_ip,
                        "note": r.note,
                    })
                })
                .collect();
            data.set("access_control", json!({"enable": ac.enable, "rules": rules}))?;
        }
        Ok(())
    }

    /// Replace the rule list and flip the enable toggle to the desired
    /// position, settling after each call.
    async fn apply_access_control(
        ctx: &Context,
        id: &str,
        cfg: &AcceleratorConfig,
        timeout: Duration,
    ) -> Result<()> {
        let rules = cfg.access_rules();
        if !rules.is_empty() {
            let req = ModifyAcceleratorAccessControlRulesRequest {
                accelerator_id: id.to_string(),
                rules,
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_accelerator_access_control_rules(&req).await
            })
            .await?;
            Self::settle(ctx, id, timeout).await?;
        }
        if cfg.access_enabled() {
            retry(&ctx.write_retry(), || async {
                ctx.client.open_accelerator_access_control(id).await
            })
            .await?;
        } else {
            retry(&ctx.write_retry(), || async {
                ctx.client.close_accelerator_access_control(id).await
            })
            .await?;
        }
        Self::settle(ctx, id, timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for ZgaAccelerator {
    fn type_name(&self) -> &'static str {
        "zcloud_zga_accelerator"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        AcceleratorConfig::from_data(data)?.validate()
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["charge_type", "resource_group_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let cfg = AcceleratorConfig::from_data(data)?;
        cfg.validate()?;
        let timeout = data.timeout_or(ctx.timeouts.zga_create);

        let req = cfg.create_request();
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_accelerator(&req).await
        })
        .await?;
        let id = resp.accelerator_id;
        data.set_id(&id);
        Self::settle(ctx, &id, timeout).await?;

        // access control is not part of the create payload
        if cfg.access_control.is_some() {
            Self::apply_access_control(ctx, &id, &cfg, timeout).await?;
        }
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_accelerator(&id).await
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
        let cfg = AcceleratorConfig::from_data(data)?;
        cfg.validate()?;
        let timeout = data.timeout_or(ctx.timeouts.zga_update);

        if prior.changed(data, "accelerator_name") {
            if let Some(name) = cfg.accelerator_name.clone() {
                let req = ModifyAcceleratorNameRequest {
                    accelerator_id: id.clone(),
                    accelerator_name: name,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.modify_accelerator_name(&req).await
                })
                .await?;
                Self::settle(ctx, &id, timeout).await?;
            }
        }
        if prior.changed(data, "domain") {
            if let Some(domain) = cfg.domain() {
                let req = ModifyAcceleratorDomainRequest {
                    accelerator_id: id.clone(),
                    domain,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.modify_accelerator_domain(&req).await
                })
                .await?;
                Self::settle(ctx, &id, timeout).await?;
            }
        }
        if prior.changed(data, "certificate_id") {
            let req = ModifyAcceleratorCertificateRequest {
                accelerator_id: id.clone(),
                certificate_id: cfg.certificate_id.clone(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_accelerator_certificate(&req).await
            })
            .await?;
            Self::settle(ctx, &id, timeout).await?;
        }
        if prior.changed(data, "origin") {
            let req = ModifyAcceleratorOriginRequest {
                accelerator_id: id.clone(),
                origin: cfg.origin(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_accelerator_origin(&req).await
            })
            .await?;
            Self::settle(ctx, &id, timeout).await?;
        }
        if prior.changed(data, "accelerate_regions") {
            let req = zga::ModifyAcceleratorRegionsRequest {
                accelerator_id: id.clone(),
                accelerate_regions: cfg.regions(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_accelerator_regions(&req).await
            })
            .await?;
            Self::settle(ctx, &id, timeout).await?;
        }
        if prior.changed(data, "l4_listeners") || prior.changed(data, "l7_listeners") {
            let req = ModifyAcceleratorListenersRequest {
                accelerator_id: id.clone(),
                l4_listeners: cfg.l4(),
                l7_listeners: cfg.l7(),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_accelerator_listeners(&req).await
            })
            .await?;
            Self::settle(ctx, &id, timeout).await?;
        }
        if prior.changed(data, "protocol_opts") {
            if let Some(protocol_opts) = cfg.protocol_opts() {
                let req = ModifyAcceleratorProtocolOptsRequest {
                    accelerator_id: id.clone(),
                    protocol_opts,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.modify_accelerator_protocol_opts(&req).await
                })
                .await?;
                Self::settle(ctx, &id, timeout).await?;
            }
        }
        if prior.changed(data, "health_check") {
            if let Some(health_check) = cfg.health_check() {
                let req = ModifyAcceleratorHealthCheckRequest {
                    accelerator_id: id.clone(),
                    health_check,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.modify_accelerator_health_check(&req).await
                })
                .await?;
                Self::settle(ctx, &id, timeout).await?;
            }
        }
        if prior.changed(data, "access_control") {
            Self::apply_access_control(ctx, &id, &cfg, timeout).await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_accelerator(&id).await
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

        // concluded by the not-found tolerance once describes come back empty
        let waiter = StateWaiter::new(
            &[
                zga::STATUS_ACCELERATING,
                zga::STATUS_DEPLOYING,
                zga::STATUS_ACCELERATE_FAILURE,
            ],
            &[],
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_accelerator(&id).await?;
                Ok(info.map(|i| {
                    let status = i.accelerator_status.clone();
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
            "charge_type": "ByBandwidth95",
            "domain": {"domain": "example.com"},
            "origin": {"origin_region_id": "asia-east-1", "origin": ["10.0.0.8"]},
            "accelerate_regions": [{"accelerate_region_id": "europe-west-1"}],
            "l7_listeners": [{"protocol": "http", "port": 80}],
        }))
        .unwrap()
    }

    fn accelerating(id: &str) -> serde_json::Value {
        json!({"TotalCount": 1, "DataSet": [{
            "AcceleratorId": id,
            "AcceleratorStatus": "Accelerating",
            "Cname": "ga-1.example-cdn.net",
            "ChargeType": "ByBandwidth95",
            "Origin": {"OriginRegionId": "asia-east-1", "Origin": ["10.0.0.8"]},
        }]})
    }

    #[tokio::test(start_paused = true)]
    async fn port_conflict_is_rejected_before_any_call() {
        let mock = Arc::new(MockTransport::new());
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        data.set(
            "l4_listeners",
            json!([{"protocol": "tcp", "port": 80}]),
        )
        .unwrap();
        let err = ZgaAccelerator.create(&ctx, &mut data).await.unwrap_err();
        assert_eq!(err.to_string(), "tcp port conflict in 80");
        assert!(mock.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_applies_access_control_after_deploy() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateAccelerator", json!({"AcceleratorId": "ga-1"}));
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        mock.push_ok("ModifyAcceleratorAccessControlRules", json!({}));
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        mock.push_ok("OpenAcceleratorAccessControl", json!({}));
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        // final read
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        data.set(
            "access_control",
            json!({"enable": true, "rules": [
                {"listener": "http:80", "directory": "/",
                 "policy": "drop", "cidr_ip": "203.0.113.0/24"},
            ]}),
        )
        .unwrap();
        ZgaAccelerator.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("ga-1"));
        assert_eq!(
            mock.actions(),
            vec![
                "CreateAccelerator",
                "DescribeAccelerators",
                "ModifyAcceleratorAccessControlRules",
                "DescribeAccelerators",
                "OpenAcceleratorAccessControl",
                "DescribeAccelerators",
                "DescribeAccelerators",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_through_deploying() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateAccelerator", json!({"AcceleratorId": "ga-1"}));
        mock.push_ok(
            "DescribeAccelerators",
            json!({"TotalCount": 1, "DataSet": [{
                "AcceleratorId": "ga-1", "AcceleratorStatus": "Deploying",
            }]}),
        );
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        // final read
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        ZgaAccelerator.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.get_string("cname").as_deref(), Some("ga-1.example-cdn.net"));
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_on_accelerate_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateAccelerator", json!({"AcceleratorId": "ga-1"}));
        mock.push_ok(
            "DescribeAccelerators",
            json!({"TotalCount": 1, "DataSet": [{
                "AcceleratorId": "ga-1", "AcceleratorStatus": "AccelerateFailure",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        let err = ZgaAccelerator.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::Wait { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn update_patches_changed_fields_in_order() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("ModifyAcceleratorName", json!({}));
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        mock.push_ok("ModifyAcceleratorOrigin", json!({}));
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        // final read
        mock.push_ok("DescribeAccelerators", accelerating("ga-1"));
        let ctx = context_with(mock_client(&mock));

        let prior = desired();
        let mut data = desired().with_id("ga-1");
        data.set("accelerator_name", "edge-ga").unwrap();
        data.set(
            "origin",
            json!({"origin_region_id": "asia-east-1", "origin": ["10.0.0.9"]}),
        )
        .unwrap();
        ZgaAccelerator.update(&ctx, &prior, &mut data).await.unwrap();
        assert_eq!(
            mock.actions(),
            vec![
                "ModifyAcceleratorName",
                "DescribeAccelerators",
                "ModifyAcceleratorOrigin",
                "DescribeAccelerators",
                "DescribeAccelerators",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_disappearance() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("DeleteAccelerator", json!({}));
        for _ in 0..4 {
            mock.push_ok("DescribeAccelerators", json!({"TotalCount": 0, "DataSet": []}));
        }
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("ga-1");
        ZgaAccelerator.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
        assert!(mock.exhausted());
    }
}
