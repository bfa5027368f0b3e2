//! Bare-metal instance reconciler.
//!
//! The richest lifecycle in the provider: creation runs through an install
//! pipeline that can take over an hour, several attribute changes require a
//! reinstall, and bandwidth / traffic-package changes only converge when the
//! internet-status side channel confirms them.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use serde_json::json;
use zcloud_core::retry::retry;
use zcloud_core::validate::validate_positive;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::bmc::{
    self, AssociateSubnetInstanceRequest, CreateInstancesRequest, InstanceInfo,
    ModifyInstanceBandwidthRequest, ModifyInstanceTrafficPackageRequest,
    ModifyInstancesAttributeRequest, NicConfig, Partition, RaidConfig, ReinstallInstanceRequest,
};

const RESOURCE: &str = "bmc instance";

const CREATE_PENDING: &[&str] = &[bmc::STATUS_PENDING, bmc::STATUS_CREATING, bmc::STATUS_INSTALLING];
const CREATE_TARGET: &[&str] = &[bmc::STATUS_RUNNING];
const CREATE_FAILURE: &[&str] = &[bmc::STATUS_CREATE_FAILED, bmc::STATUS_INSTALL_FAILED];

const DELETE_PENDING: &[&str] = &[
    bmc::STATUS_PENDING,
    bmc::STATUS_CREATING,
    bmc::STATUS_INSTALLING,
    bmc::STATUS_RUNNING,
    bmc::STATUS_DELETING,
];

/// Attribute changes that require a full reinstall.
const REINSTALL_FIELDS: &[&str] = &[
    "hostname",
    "password",
    "ssh_keys",
    "image_id",
    "partitions",
    "raid_type",
    "custom_raids",
    "nic_wan_name",
    "nic_lan_name",
];

pub struct BmcInstance;

/// Charge-type preconditions shared with the VM reconciler.
pub(crate) fn validate_charge_type(data: &ResourceData) -> Result<()> {
    let charge_type = data.require_string("instance_charge_type")?;
    let period = data.get_i64("instance_charge_prepaid_period");
    match charge_type.as_str() {
        bmc::CHARGE_TYPE_PREPAID => match period {
            None => {
                return Err(ProviderError::MissingArgument(
                    "instance_charge_prepaid_period",
                ));
            }
            Some(p) => validate_positive(p)?,
        },
        bmc::CHARGE_TYPE_POSTPAID => {
            if period.is_some() {
                return Err(ProviderError::invalid(
                    "instance_charge_prepaid_period",
                    "only valid for PREPAID instances",
                ));
            }
        }
        other => {
            return Err(ProviderError::invalid(
                "instance_charge_type",
                format!("unknown charge type {other:?}"),
            ));
        }
    }
    Ok(())
}

fn raid_config_from(data: &ResourceData) -> Option<RaidConfig> {
    let raid_type = data.get_string("raid_type");
    let custom_raids: Vec<_> = data.get_block("custom_raids").unwrap_or_default();
    if raid_type.is_none() && custom_raids.is_empty() {
        return None;
    }
    Some(RaidConfig {
        raid_type,
        custom_raids,
    })
}

fn nic_config_from(data: &ResourceData) -> Option<NicConfig> {
    let wan_name = data.get_string("nic_wan_name");
    let lan_name = data.get_string("nic_lan_name");
    if wan_name.is_none() && lan_name.is_none() {
        return None;
    }
    Some(NicConfig { wan_name, lan_name })
}

impl BmcInstance {
    fn build_create_request(data: &ResourceData) -> Result<CreateInstancesRequest> {
        Ok(CreateInstancesRequest {
            zone_id: data.require_string("zone_id")?,
            instance_type_id: data.require_string("instance_type_id")?,
            image_id: data.require_string("image_id")?,
            instance_charge_type: data.require_string("instance_charge_type")?,
            instance_charge_prepaid_period: data.get_i64("instance_charge_prepaid_period"),
            instance_name: data.get_string("instance_name"),
            hostname: data.get_string("hostname"),
            internet_charge_type: data.get_string("internet_charge_type"),
            internet_max_bandwidth_out: data.get_i64("internet_max_bandwidth_out"),
            traffic_package_size: data.get_f64("traffic_package_size"),
            subnet_id: data.get_string("subnet_id"),
            resource_group_id: data.get_string("resource_group_id"),
            password: data.get_string("password"),
            ssh_keys: data.get_string_list("ssh_keys"),
            partitions: data.get_block("partitions").unwrap_or_default(),
            raid_config: raid_config_from(data),
            nic_config: nic_config_from(data),
            instance_count: 1,
        })
    }

    async fn wait_running(ctx: &Context, id: &str, timeout: std::time::Duration) -> Result<InstanceInfo> {
        let waiter = StateWaiter::new(CREATE_PENDING, CREATE_TARGET, timeout)
            .with_failure(CREATE_FAILURE);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.bmc_describe_instance(id).await?;
                Ok(info.map(|i| {
                    let status = i.instance_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "instance disappeared while waiting for RUNNING".to_string(),
        })
    }

    /// Dual-signal convergence for bandwidth: the modify call returns
    /// immediately; the change is live only when the side channel reports
    /// `Enable` and the applied value matches.
    async fn wait_bandwidth_applied(ctx: &Context, id: &str, want: i64, data: &ResourceData) -> Result<()> {
        let waiter = StateWaiter::new(
            &["Waiting"],
            &["Done"],
            data.timeout_or(ctx.timeouts.bmc_update),
        )
        .with_initial_delay(std::time::Duration::from_secs(5));
        waiter
            .wait_for(|| async {
                let status = ctx.client.bmc_describe_instance_internet_status(id).await?;
                let done = status.modified_bandwidth_status == bmc::MODIFY_STATUS_ENABLE
                    && status.internet_max_bandwidth_out == want;
                Ok(Some(((), if done { "Done" } else { "Waiting" }.to_string())))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        Ok(())
    }

    async fn wait_traffic_package_applied(
        ctx: &Context,
        id: &str,
        want: f64,
        data: &ResourceData,
    ) -> Result<()> {
        let waiter = StateWaiter::new(
            &["Waiting"],
            &["Done"],
            data.timeout_or(ctx.timeouts.bmc_update),
        )
        .with_initial_delay(std::time::Duration::from_secs(5));
        waiter
            .wait_for(|| async {
                let status = ctx.client.bmc_describe_instance_internet_status(id).await?;
                let done = status.modified_traffic_package_status == bmc::MODIFY_STATUS_ENABLE
                    && (status.traffic_package_size - want).abs() < f64::EPSILON;
                Ok(Some(((), if done { "Done" } else { "Waiting" }.to_string())))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        Ok(())
    }

    async fn wait_subnet_status(ctx: &Context, id: &str, target: &str, data: &ResourceData) -> Result<()> {
        let pending: &[&str] = &[
            bmc::SUBNET_STATUS_BINDING,
            bmc::SUBNET_STATUS_UNBINDING,
            bmc::SUBNET_STATUS_BOUND,
            bmc::SUBNET_STATUS_NOT_BIND,
        ];
        // the current status is itself pending until the target shows up
        let pending: Vec<&str> = pending.iter().copied().filter(|s| *s != target).collect();
        let target_set = [target];
        let waiter = StateWaiter::new(&pending, &target_set, data.timeout_or(ctx.timeouts.bmc_update));
        waiter
            .wait_for(|| async {
                let info = ctx.client.bmc_describe_instance(id).await?;
                Ok(info.map(|i| {
                    let status = i.subnet_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        Ok(())
    }

    fn flatten(data: &mut ResourceData, info: &InstanceInfo) -> Result<()> {
        data.set("instance_name", &info.instance_name)?;
        data.set("hostname", &info.hostname)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("instance_type_id", &info.instance_type_id)?;
        data.set("image_id", &info.image_id)?;
        data.set("image_name", &info.image_name)?;
        data.set("instance_charge_type", &info.instance_charge_type)?;
        if info.instance_charge_type == bmc::CHARGE_TYPE_PREPAID {
            data.set("instance_charge_prepaid_period", info.period)?;
        }
        data.set("internet_charge_type", &info.internet_charge_type)?;
        data.set("internet_max_bandwidth_out", info.internet_max_bandwidth_out)?;
        if info.internet_charge_type == bmc::INTERNET_CHARGE_BY_TRAFFIC_PACKAGE {
            data.set("traffic_package_size", info.traffic_package_size)?;
        }
        data.set("subnet_id", &info.subnet_id)?;
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("resource_group_name", &info.resource_group_name)?;
        data.set("public_ip_addresses", &info.public_ip_addresses)?;
        data.set("private_ip_addresses", &info.private_ip_addresses)?;
        data.set("ipv6_addresses", &info.ipv6_addresses)?;
        data.set("ssh_keys", &info.ssh_keys)?;
        data.set(
            "partitions",
            info.partitions
                .iter()
                .map(|p| json!({"fs_type": p.fs_type, "fs_path": p.fs_path, "size": p.size}))
                .collect::<Vec<_>>(),
        )?;
        if let Some(raid) = &info.raid_config {
            if let Some(raid_type) = &raid.raid_type {
                data.set("raid_type", raid_type)?;
            }
            data.set(
                "custom_raids",
                raid.custom_raids
                    .iter()
                    .map(|r| json!({"raid_type": r.raid_type, "disk_sequence": r.disk_sequence}))
                    .collect::<Vec<_>>(),
            )?;
        }
        if let Some(nic) = &info.nic_config {
            data.set("nic_wan_name", &nic.wan_name)?;
            data.set("nic_lan_name", &nic.lan_name)?;
        }
        data.set("instance_status", &info.instance_status)?;
        data.set("create_time", &info.create_time)?;
        data.set("expired_time", &info.expired_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for BmcInstance {
    fn type_name(&self) -> &'static str {
        "zcloud_bmc_instance"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        validate_charge_type(data)?;
        let charge_type = data.require_string("instance_charge_type")?;
        let internet_charge = data.get_string("internet_charge_type");
        let has_package = data.contains("traffic_package_size");
        let by_package =
            internet_charge.as_deref() == Some(bmc::INTERNET_CHARGE_BY_TRAFFIC_PACKAGE);
        let prepaid = charge_type == bmc::CHARGE_TYPE_PREPAID;
        if by_package && prepaid && !has_package {
            return Err(ProviderError::MissingArgument("traffic_package_size"));
        }
        if has_package && !(by_package && prepaid) {
            return Err(ProviderError::invalid(
                "traffic_package_size",
                "only valid for PREPAID instances charged ByTrafficPackage",
            ));
        }
        if data.contains("password") && !data.get_string_list("ssh_keys").is_empty() {
            return Err(ProviderError::invalid(
                "password",
                "conflicts with ssh_keys",
            ));
        }
        Ok(())
    }

    /// Prepaid bandwidth and traffic-package downgrades are destructive;
    /// upgrades apply in place. Vendor contract, not a client choice.
    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["zone_id", "instance_type_id", "instance_charge_type"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        let prepaid = prior.get_string("instance_charge_type").as_deref()
            == Some(bmc::CHARGE_TYPE_PREPAID);
        if prepaid {
            if let (Some(old), Some(new)) = (
                prior.get_i64("internet_max_bandwidth_out"),
                planned.get_i64("internet_max_bandwidth_out"),
            ) {
                if new < old {
                    forced.push("internet_max_bandwidth_out");
                }
            }
            if let (Some(old), Some(new)) = (
                prior.get_f64("traffic_package_size"),
                planned.get_f64("traffic_package_size"),
            ) {
                if new < old {
                    forced.push("traffic_package_size");
                }
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let req = Self::build_create_request(data)?;
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.bmc_create_instances(&req).await
        })
        .await?;
        let id = resp
            .instance_id_set
            .first()
            .ok_or(ProviderError::invalid("instance", "create returned no id"))?
            .clone();
        data.set_id(&id);
        tracing::debug!(id, "bmc instance created, waiting for RUNNING");
        let info = Self::wait_running(ctx, &id, data.timeout_or(ctx.timeouts.bmc_create)).await?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.bmc_describe_instance(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info)
                if info.instance_status == bmc::STATUS_CREATE_FAILED
                    || info.instance_status == bmc::STATUS_RECYCLE =>
            {
                tracing::debug!(id, status = %info.instance_status, "treating instance as gone");
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

        if prior.changed(data, "instance_name") {
            let req = ModifyInstancesAttributeRequest {
                instance_ids: vec![id.clone()],
                instance_name: data.get_string("instance_name"),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.bmc_modify_instances_attribute(&req).await
            })
            .await?;
        }

        // resource_group_id omitted from the plan leaves the group unchanged

        // Re-bind the subnet before any reinstall so the new network is in
        // place when the instance comes back.
        if prior.changed(data, "subnet_id") {
            if let Some(old) = prior.get_string("subnet_id").filter(|s| !s.is_empty()) {
                let req = AssociateSubnetInstanceRequest {
                    subnet_id: old,
                    instance_id: id.clone(),
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.bmc_unassociate_subnet_instance(&req).await
                })
                .await?;
                Self::wait_subnet_status(ctx, &id, bmc::SUBNET_STATUS_NOT_BIND, data).await?;
            }
            if let Some(new) = data.get_string("subnet_id").filter(|s| !s.is_empty()) {
                let req = AssociateSubnetInstanceRequest {
                    subnet_id: new,
                    instance_id: id.clone(),
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.bmc_associate_subnet_instance(&req).await
                })
                .await?;
                Self::wait_subnet_status(ctx, &id, bmc::SUBNET_STATUS_BOUND, data).await?;
            }
        }

        if REINSTALL_FIELDS.iter().any(|f| prior.changed(data, f)) {
            let req = ReinstallInstanceRequest {
                instance_id: id.clone(),
                image_id: data.get_string("image_id"),
                hostname: data.get_string("hostname"),
                password: data.get_string("password"),
                ssh_keys: data.get_string_list("ssh_keys"),
                partitions: data.get_block::<Vec<Partition>>("partitions").unwrap_or_default(),
                raid_config: raid_config_from(data),
                nic_config: nic_config_from(data),
            };
            tracing::debug!(id, "reinstalling bmc instance");
            retry(&ctx.write_retry(), || async {
                ctx.client.bmc_reinstall_instance(&req).await
            })
            .await?;
            Self::wait_running(ctx, &id, data.timeout_or(ctx.timeouts.bmc_update)).await?;
        }

        if prior.changed(data, "internet_max_bandwidth_out") {
            if let Some(want) = data.get_i64("internet_max_bandwidth_out") {
                let req = ModifyInstanceBandwidthRequest {
                    instance_id: id.clone(),
                    internet_max_bandwidth_out: want,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.bmc_modify_instance_bandwidth(&req).await
                })
                .await?;
                Self::wait_bandwidth_applied(ctx, &id, want, data).await?;
            }
        }

        if prior.changed(data, "traffic_package_size") {
            if let Some(want) = data.get_f64("traffic_package_size") {
                let req = ModifyInstanceTrafficPackageRequest {
                    instance_id: id.clone(),
                    traffic_package_size: want,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.bmc_modify_instance_traffic_package(&req).await
                })
                .await?;
                Self::wait_traffic_package_applied(ctx, &id, want, data).await?;
            }
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let force_delete = data.get_bool("force_delete").unwrap_or(false);

        let terminated = retry(&ctx.write_retry(), || async {
            ctx.client.bmc_terminate_instance(&id).await
        })
        .await;
        match terminated {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                match &inner {
                    // already recycled or already gone: both fine
                    ProviderError::Api(api) if api.is_recycled() || api.is_not_found() => {}
                    _ => return Err(inner),
                }
            }
        }

        let waiter = StateWaiter::new(
            DELETE_PENDING,
            &[bmc::STATUS_RECYCLE],
            data.timeout_or(ctx.timeouts.bmc_update),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.bmc_describe_instance(&id).await?;
                Ok(info.map(|i| {
                    let status = i.instance_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

        if force_delete {
            let released = retry(&ctx.write_retry(), || async {
                ctx.client.bmc_release_instances(&[id.clone()]).await
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

    fn desired_prepaid(extra: serde_json::Value) -> ResourceData {
        let mut base = json!({
            "zone_id": "asia-east-1a",
            "instance_type_id": "M6C",
            "image_id": "img-centos",
            "instance_charge_type": "PREPAID",
            "instance_charge_prepaid_period": 1,
        });
        if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        ResourceData::from_value(base).unwrap()
    }

    #[test]
    fn prepaid_without_period_is_rejected_before_any_call() {
        let data = ResourceData::from_value(json!({
            "zone_id": "asia-east-1a",
            "instance_type_id": "M6C",
            "image_id": "img-centos",
            "instance_charge_type": "PREPAID",
        }))
        .unwrap();
        match BmcInstance.validate(&data) {
            Err(ProviderError::MissingArgument(name)) => {
                assert_eq!(name, "instance_charge_prepaid_period")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn prepaid_period_must_be_positive() {
        let data = desired_prepaid(json!({"instance_charge_prepaid_period": 0}));
        assert!(matches!(
            BmcInstance.validate(&data),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn postpaid_with_period_is_rejected() {
        let data = desired_prepaid(json!({
            "instance_charge_type": "POSTPAID",
        }));
        assert!(matches!(
            BmcInstance.validate(&data),
            Err(ProviderError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn traffic_package_requires_prepaid_by_package() {
        // missing size on a ByTrafficPackage prepaid instance
        let data = desired_prepaid(json!({"internet_charge_type": "ByTrafficPackage"}));
        assert!(matches!(
            BmcInstance.validate(&data),
            Err(ProviderError::MissingArgument("traffic_package_size"))
        ));
        // size present on a ByBandwidth instance
        let data = desired_prepaid(json!({
            "internet_charge_type": "ByBandwidth",
            "traffic_package_size": 1.5,
        }));
        assert!(BmcInstance.validate(&data).is_err());
        // valid combination
        let data = desired_prepaid(json!({
            "internet_charge_type": "ByTrafficPackage",
            "traffic_package_size": 1.5,
        }));
        assert!(BmcInstance.validate(&data).is_ok());
    }

    #[test]
    fn bandwidth_downgrade_forces_replacement_upgrade_does_not() {
        let prior = desired_prepaid(json!({"internet_max_bandwidth_out": 20}));
        let upgraded = desired_prepaid(json!({"internet_max_bandwidth_out": 30}));
        let downgraded = desired_prepaid(json!({"internet_max_bandwidth_out": 10}));
        assert!(BmcInstance
            .requires_replacement(&prior, &upgraded)
            .unwrap()
            .is_empty());
        assert_eq!(
            BmcInstance.requires_replacement(&prior, &downgraded).unwrap(),
            vec!["internet_max_bandwidth_out"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bandwidth_update_waits_for_dual_signal() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("ModifyInstanceBandwidth", json!({}));
        // first poll: mutation accepted but not yet live
        mock.push_ok(
            "DescribeInstanceInternetStatus",
            json!({"ModifiedBandwidthStatus": "Processing", "InternetMaxBandwidthOut": 10}),
        );
        // second poll: status enabled but stale value
        mock.push_ok(
            "DescribeInstanceInternetStatus",
            json!({"ModifiedBandwidthStatus": "Enable", "InternetMaxBandwidthOut": 10}),
        );
        // third poll: converged
        mock.push_ok(
            "DescribeInstanceInternetStatus",
            json!({"ModifiedBandwidthStatus": "Enable", "InternetMaxBandwidthOut": 20}),
        );
        // final re-read
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-1", "InstanceStatus": "RUNNING",
                "InstanceChargeType": "PREPAID", "Period": 1,
                "InternetMaxBandwidthOut": 20,
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let prior = desired_prepaid(json!({"internet_max_bandwidth_out": 10}));
        let mut data = desired_prepaid(json!({"internet_max_bandwidth_out": 20})).with_id("i-1");
        BmcInstance.update(&ctx, &prior, &mut data).await.unwrap();

        assert!(mock.exhausted());
        assert_eq!(data.get_i64("internet_max_bandwidth_out"), Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_tolerates_not_found_as_success() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err("TerminateInstance", "INVALID_INSTANCE_NOT_FOUND");
        // waiter refreshes see the instance already gone
        mock.push_err("DescribeInstances", "INVALID_INSTANCE_NOT_FOUND");
        mock.push_err("DescribeInstances", "INVALID_INSTANCE_NOT_FOUND");
        mock.push_err("DescribeInstances", "INVALID_INSTANCE_NOT_FOUND");
        mock.push_err("DescribeInstances", "INVALID_INSTANCE_NOT_FOUND");
        let ctx = context_with(mock_client(&mock));

        let mut data = desired_prepaid(json!({})).with_id("i-gone");
        BmcInstance.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_through_install_pipeline() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateInstances", json!({"InstanceIdSet": ["i-new"]}));
        for status in ["PENDING", "CREATING", "INSTALLING", "RUNNING"] {
            mock.push_ok(
                "DescribeInstances",
                json!({"TotalCount": 1, "DataSet": [{
                    "InstanceId": "i-new", "InstanceStatus": status,
                    "InstanceChargeType": "PREPAID", "Period": 1,
                }]}),
            );
        }
        let ctx = context_with(mock_client(&mock));

        let mut data = desired_prepaid(json!({}));
        BmcInstance.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("i-new"));
        assert_eq!(data.get_string("instance_status").as_deref(), Some("RUNNING"));
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_on_install_failure_status() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateInstances", json!({"InstanceIdSet": ["i-bad"]}));
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "i-bad", "InstanceStatus": "INSTALL_FAILED",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired_prepaid(json!({}));
        let err = BmcInstance.create(&ctx, &mut data).await.unwrap_err();
        assert!(err.to_string().contains("INSTALL_FAILED"), "{err}");
    }
}
