//! Virtual machine reconciler.
//!
//! Same lifecycle shape as the bare-metal instance, minus the install
//! pipeline: VMs go straight from CREATING to RUNNING, password changes are
//! an in-place reset instead of a reinstall, and bandwidth changes apply
//! without a side-channel confirmation.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::resources::bmc_instance::validate_charge_type;
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::vm::{
    self, CreateInstancesRequest, InstanceInfo, ModifyInstanceBandwidthRequest,
    ModifyInstancesAttributeRequest, ResetInstancePasswordRequest, SystemDisk,
};

const RESOURCE: &str = "vm instance";

const CREATE_PENDING: &[&str] = &[vm::STATUS_PENDING, vm::STATUS_CREATING];
const CREATE_TARGET: &[&str] = &[vm::STATUS_RUNNING];
const CREATE_FAILURE: &[&str] = &[vm::STATUS_CREATE_FAILED];

const DELETE_PENDING: &[&str] = &[
    vm::STATUS_PENDING,
    vm::STATUS_CREATING,
    vm::STATUS_RUNNING,
    vm::STATUS_STOPPED,
    vm::STATUS_DELETING,
];

pub struct VmInstance;

fn system_disk_from(data: &ResourceData) -> Option<SystemDisk> {
    let size = data.get_i64("system_disk_size")?;
    Some(SystemDisk {
        disk_size: size,
        disk_category: data.get_string("system_disk_category"),
    })
}

impl VmInstance {
    fn build_create_request(data: &ResourceData) -> Result<CreateInstancesRequest> {
        Ok(CreateInstancesRequest {
            zone_id: data.require_string("zone_id")?,
            instance_type_id: data.require_string("instance_type_id")?,
            image_id: data.require_string("image_id")?,
            instance_charge_type: data.require_string("instance_charge_type")?,
            instance_charge_prepaid_period: data.get_i64("instance_charge_prepaid_period"),
            instance_name: data.get_string("instance_name"),
            internet_charge_type: data.get_string("internet_charge_type"),
            internet_max_bandwidth_out: data.get_i64("internet_max_bandwidth_out"),
            subnet_id: data.get_string("subnet_id"),
            resource_group_id: data.get_string("resource_group_id"),
            password: data.get_string("password"),
            key_id: data.get_string("key_id"),
            system_disk: system_disk_from(data),
            security_group_ids: data.get_string_list("security_group_ids"),
            instance_count: 1,
        })
    }

    async fn wait_running(ctx: &Context, id: &str, timeout: std::time::Duration) -> Result<InstanceInfo> {
        let waiter = StateWaiter::new(CREATE_PENDING, CREATE_TARGET, timeout)
            .with_failure(CREATE_FAILURE);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.vm_describe_instance(id).await?;
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

    fn flatten(data: &mut ResourceData, info: &InstanceInfo) -> Result<()> {
        data.set("instance_name", &info.instance_name)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("instance_type_id", &info.instance_type_id)?;
        data.set("image_id", &info.image_id)?;
        data.set("image_name", &info.image_name)?;
        data.set("instance_charge_type", &info.instance_charge_type)?;
        if info.instance_charge_type == zcloud_sdk::bmc::CHARGE_TYPE_PREPAID {
            data.set("instance_charge_prepaid_period", info.period)?;
        }
        data.set("internet_charge_type", &info.internet_charge_type)?;
        data.set("internet_max_bandwidth_out", info.internet_max_bandwidth_out)?;
        data.set("subnet_id", &info.subnet_id)?;
        data.set("resource_group_id", &info.resource_group_id)?;
        data.set("resource_group_name", &info.resource_group_name)?;
        if !info.key_id.is_empty() {
            data.set("key_id", &info.key_id)?;
        }
        if let Some(disk) = &info.system_disk {
            data.set("system_disk_size", disk.disk_size)?;
            data.set("system_disk_category", &disk.disk_category)?;
        }
        data.set("security_group_ids", &info.security_group_ids)?;
        data.set("public_ip_addresses", &info.public_ip_addresses)?;
        data.set("private_ip_addresses", &info.private_ip_addresses)?;
        data.set("ipv6_addresses", &info.ipv6_addresses)?;
        data.set("instance_status", &info.instance_status)?;
        data.set("create_time", &info.create_time)?;
        data.set("expired_time", &info.expired_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for VmInstance {
    fn type_name(&self) -> &'static str {
        "zcloud_vm_instance"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        validate_charge_type(data)?;
        if data.contains("password") && data.contains("key_id") {
            return Err(ProviderError::invalid("password", "conflicts with key_id"));
        }
        Ok(())
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &[
            "zone_id",
            "instance_type_id",
            "image_id",
            "instance_charge_type",
            "subnet_id",
            "system_disk_size",
        ];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        let prepaid = prior.get_string("instance_charge_type").as_deref()
            == Some(zcloud_sdk::bmc::CHARGE_TYPE_PREPAID);
        if prepaid {
            if let (Some(old), Some(new)) = (
                prior.get_i64("internet_max_bandwidth_out"),
                planned.get_i64("internet_max_bandwidth_out"),
            ) {
                if new < old {
                    forced.push("internet_max_bandwidth_out");
                }
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let req = Self::build_create_request(data)?;
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.vm_create_instances(&req).await
        })
        .await?;
        let id = resp
            .instance_id_set
            .first()
            .ok_or(ProviderError::invalid("instance", "create returned no id"))?
            .clone();
        data.set_id(&id);
        tracing::debug!(id, "vm instance created, waiting for RUNNING");
        let info = Self::wait_running(ctx, &id, data.timeout_or(ctx.timeouts.vm_create)).await?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.vm_describe_instance(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info)
                if info.instance_status == vm::STATUS_CREATE_FAILED
                    || info.instance_status == vm::STATUS_RECYCLE =>
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
                ctx.client.vm_modify_instances_attribute(&req).await
            })
            .await?;
        }

        if prior.changed(data, "password") {
            if let Some(password) = data.get_string("password") {
                let req = ResetInstancePasswordRequest {
                    instance_id: id.clone(),
                    password,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.vm_reset_instance_password(&req).await
                })
                .await?;
                Self::wait_running(ctx, &id, data.timeout_or(ctx.timeouts.vm_update)).await?;
            }
        }

        if prior.changed(data, "internet_max_bandwidth_out") {
            if let Some(want) = data.get_i64("internet_max_bandwidth_out") {
                let req = ModifyInstanceBandwidthRequest {
                    instance_id: id.clone(),
                    internet_max_bandwidth_out: want,
                };
                retry(&ctx.write_retry(), || async {
                    ctx.client.vm_modify_instance_bandwidth(&req).await
                })
                .await?;
                Self::wait_running(ctx, &id, data.timeout_or(ctx.timeouts.vm_update)).await?;
            }
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let force_delete = data.get_bool("force_delete").unwrap_or(false);

        let terminated = retry(&ctx.write_retry(), || async {
            ctx.client.vm_terminate_instance(&id).await
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
            &[vm::STATUS_RECYCLE],
            data.timeout_or(ctx.timeouts.vm_update),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.vm_describe_instance(&id).await?;
                Ok(info.map(|i| {
                    let status = i.instance_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

        if force_delete {
            let released = retry(&ctx.write_retry(), || async {
                ctx.client.vm_release_instances(&[id.clone()]).await
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
            "instance_type_id": "z2.cpu.2",
            "image_id": "img-debian",
            "instance_charge_type": "POSTPAID",
        }))
        .unwrap()
    }

    #[test]
    fn password_conflicts_with_key_id() {
        let mut data = desired();
        data.set("password", "secret").unwrap();
        data.set("key_id", "key-1").unwrap();
        assert!(VmInstance.validate(&data).is_err());
    }

    #[test]
    fn image_change_forces_replacement() {
        let prior = desired();
        let mut planned = desired();
        planned.set("image_id", "img-ubuntu").unwrap();
        assert_eq!(
            VmInstance.requires_replacement(&prior, &planned).unwrap(),
            vec!["image_id"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_sets_id_and_flattens_state() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateInstances", json!({"InstanceIdSet": ["vm-1"]}));
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "vm-1", "InstanceStatus": "CREATING",
            }]}),
        );
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "vm-1", "InstanceStatus": "RUNNING",
                "PublicIpAddresses": ["203.0.113.9"],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        VmInstance.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("vm-1"));
        assert_eq!(
            data.get_string_list("public_ip_addresses"),
            vec!["203.0.113.9"]
        );
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn read_clears_id_for_recycled_instance() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 1, "DataSet": [{
                "InstanceId": "vm-1", "InstanceStatus": "RECYCLE",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired().with_id("vm-1");
        VmInstance.read(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
