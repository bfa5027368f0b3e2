//! Data disk reconciler.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::bmc::{CHARGE_TYPE_POSTPAID, CHARGE_TYPE_PREPAID};
use zcloud_sdk::disk::{
    self, CreateDisksRequest, DiskInfo, ModifyDisksAttributesRequest, ResizeDiskRequest,
    MIN_DISK_SIZE_GB,
};

const RESOURCE: &str = "disk";

const CREATE_PENDING: &[&str] = &[disk::STATUS_CREATING, disk::STATUS_ATTACHING];
// a disk created with an inline instance attachment lands in IN_USE
const CREATE_TARGET: &[&str] = &[disk::STATUS_AVAILABLE, disk::STATUS_IN_USE];

const DELETE_PENDING: &[&str] = &[
    disk::STATUS_CREATING,
    disk::STATUS_AVAILABLE,
    disk::STATUS_DETACHING,
    disk::STATUS_DELETING,
];

pub struct Disk;

impl Disk {
    async fn wait_usable(ctx: &Context, id: &str, timeout: std::time::Duration) -> Result<DiskInfo> {
        let waiter = StateWaiter::new(CREATE_PENDING, CREATE_TARGET, timeout);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_disk(id).await?;
                Ok(info.map(|i| {
                    let status = i.disk_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "disk disappeared while waiting for AVAILABLE".to_string(),
        })
    }

    async fn wait_resized(ctx: &Context, id: &str, want: i64, data: &ResourceData) -> Result<()> {
        let waiter = StateWaiter::new(
            &["Waiting"],
            &["Done"],
            data.timeout_or(ctx.timeouts.write_retry),
        )
        .with_initial_delay(std::time::Duration::from_secs(5));
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_disk(id).await?;
                Ok(info.map(|i| {
                    let done = i.disk_size == want
                        && (i.disk_status == disk::STATUS_AVAILABLE
                            || i.disk_status == disk::STATUS_IN_USE);
                    ((), if done { "Done" } else { "Waiting" }.to_string())
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        Ok(())
    }

    fn flatten(data: &mut ResourceData, info: &DiskInfo) -> Result<()> {
        data.set("disk_name", &info.disk_name)?;
        data.set("zone_id", &info.zone_id)?;
        data.set("disk_size", info.disk_size)?;
        data.set("disk_type", &info.disk_type)?;
        data.set("disk_category", &info.disk_category)?;
        data.set("disk_charge_type", &info.disk_charge_type)?;
        if info.disk_charge_type == CHARGE_TYPE_PREPAID {
            data.set("disk_charge_prepaid_period", info.period)?;
        }
        data.set("portable", info.portable)?;
        if !info.instance_id.is_empty() {
            data.set("instance_id", &info.instance_id)?;
            data.set("instance_name", &info.instance_name)?;
        }
        data.set("disk_status", &info.disk_status)?;
        data.set("create_time", &info.create_time)?;
        data.set("expired_time", &info.expired_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for Disk {
    fn type_name(&self) -> &'static str {
        "zcloud_disk"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        let size = data.require_i64("disk_size")?;
        if size < MIN_DISK_SIZE_GB {
            return Err(ProviderError::invalid(
                "disk_size",
                format!("must be at least {MIN_DISK_SIZE_GB} GB"),
            ));
        }
        let charge_type = data.require_string("disk_charge_type")?;
        let period = data.get_i64("disk_charge_prepaid_period");
        match charge_type.as_str() {
            CHARGE_TYPE_PREPAID => {
                if period.is_none() {
                    return Err(ProviderError::MissingArgument("disk_charge_prepaid_period"));
                }
            }
            CHARGE_TYPE_POSTPAID => {
                if period.is_some() {
                    return Err(ProviderError::invalid(
                        "disk_charge_prepaid_period",
                        "only valid for PREPAID disks",
                    ));
                }
            }
            other => {
                return Err(ProviderError::invalid(
                    "disk_charge_type",
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
        const FORCE_NEW: &[&str] = &["zone_id", "disk_category", "disk_charge_type", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        // disks only grow
        if let (Some(old), Some(new)) = (prior.get_i64("disk_size"), planned.get_i64("disk_size")) {
            if new < old {
                forced.push("disk_size");
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let req = CreateDisksRequest {
            zone_id: data.require_string("zone_id")?,
            disk_size: data.require_i64("disk_size")?,
            disk_name: data.get_string("disk_name"),
            disk_category: data.get_string("disk_category"),
            disk_charge_type: data.require_string("disk_charge_type")?,
            disk_charge_prepaid_period: data.get_i64("disk_charge_prepaid_period"),
            instance_id: data.get_string("instance_id"),
            resource_group_id: data.get_string("resource_group_id"),
            disk_count: 1,
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_disks(&req).await
        })
        .await?;
        let id = resp
            .disk_ids
            .first()
            .ok_or(ProviderError::invalid("disk", "create returned no id"))?
            .clone();
        data.set_id(&id);
        let info = Self::wait_usable(ctx, &id, data.timeout_or(ctx.timeouts.write_retry)).await?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_disk(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info) if info.disk_status == disk::STATUS_RECYCLED => {
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

        if prior.changed(data, "disk_name") {
            let req = ModifyDisksAttributesRequest {
                disk_ids: vec![id.clone()],
                disk_name: data.require_string("disk_name")?,
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_disks_attributes(&req).await
            })
            .await?;
        }

        if prior.changed(data, "disk_size") {
            let want = data.require_i64("disk_size")?;
            let req = ResizeDiskRequest {
                disk_id: id.clone(),
                disk_size: want,
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.resize_disk(&req).await
            })
            .await?;
            Self::wait_resized(ctx, &id, want, data).await?;
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let force_delete = data.get_bool("force_delete").unwrap_or(false);

        let terminated = retry(&ctx.write_retry(), || async {
            ctx.client.terminate_disk(&id).await
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
            &[disk::STATUS_RECYCLED],
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_disk(&id).await?;
                Ok(info.map(|i| {
                    let status = i.disk_status.clone();
                    ((), status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;

        if force_delete {
            let released = retry(&ctx.write_retry(), || async {
                ctx.client.release_disk(&id).await
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

    fn desired(size: i64) -> ResourceData {
        ResourceData::from_value(json!({
            "zone_id": "asia-east-1a",
            "disk_size": size,
            "disk_charge_type": "POSTPAID",
        }))
        .unwrap()
    }

    #[test]
    fn rejects_undersized_disk() {
        assert!(Disk.validate(&desired(10)).is_err());
        assert!(Disk.validate(&desired(20)).is_ok());
    }

    #[test]
    fn shrink_forces_replacement() {
        assert_eq!(
            Disk.requires_replacement(&desired(100), &desired(40)).unwrap(),
            vec!["disk_size"]
        );
        assert!(Disk
            .requires_replacement(&desired(40), &desired(100))
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resize_waits_until_new_size_is_visible() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("ResizeDisk", json!({}));
        mock.push_ok(
            "DescribeDisks",
            json!({"TotalCount": 1, "DataSet": [{
                "DiskId": "d-1", "DiskStatus": "AVAILABLE", "DiskSize": 40,
                "DiskChargeType": "POSTPAID",
            }]}),
        );
        mock.push_ok(
            "DescribeDisks",
            json!({"TotalCount": 1, "DataSet": [{
                "DiskId": "d-1", "DiskStatus": "AVAILABLE", "DiskSize": 100,
                "DiskChargeType": "POSTPAID",
            }]}),
        );
        mock.push_ok(
            "DescribeDisks",
            json!({"TotalCount": 1, "DataSet": [{
                "DiskId": "d-1", "DiskStatus": "AVAILABLE", "DiskSize": 100,
                "DiskChargeType": "POSTPAID",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let prior = desired(40);
        let mut data = desired(100).with_id("d-1");
        Disk.update(&ctx, &prior, &mut data).await.unwrap();
        assert_eq!(data.get_i64("disk_size"), Some(100));
        assert!(mock.exhausted());
    }
}
