//! Disk attachment reconciler: `<disk>:<instance>` composite ID.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::classify::CODE_DISK_NO_ATTACH;
use zcloud_core::ids::{composite_id, split_composite};
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::disk::{self, AttachDisksRequest, DiskInfo};

const RESOURCE: &str = "disk";

pub struct DiskAttachment;

impl DiskAttachment {
    async fn wait_status(
        ctx: &Context,
        disk_id: &str,
        pending: &[&str],
        target: &str,
        data: &ResourceData,
    ) -> Result<Option<DiskInfo>> {
        let target_set = [target];
        let waiter = StateWaiter::new(
            pending,
            &target_set,
            data.timeout_or(ctx.timeouts.write_retry),
        );
        waiter
            .wait_for(|| async {
                let info = ctx.client.describe_disk(disk_id).await?;
                Ok(info.map(|i| {
                    let status = i.disk_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))
    }
}

#[async_trait]
impl ResourceHandler for DiskAttachment {
    fn type_name(&self) -> &'static str {
        "zcloud_disk_attachment"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FORCE_NEW: &[&str] = &["disk_id", "instance_id"];
        let mut forced = Vec::new();
        for field in FORCE_NEW {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let disk_id = data.require_string("disk_id")?;
        let instance_id = data.require_string("instance_id")?;

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_disk(&disk_id).await
        })
        .await?
        .ok_or(ProviderError::invalid(
            "disk_id",
            format!("{disk_id} does not exist"),
        ))?;

        if info.disk_status == disk::STATUS_IN_USE && info.instance_id == instance_id {
            data.set_id(composite_id(&disk_id, &instance_id));
            return Ok(());
        }
        if info.disk_status != disk::STATUS_AVAILABLE {
            return Err(ProviderError::IllegalStatus {
                resource: RESOURCE,
                status: info.disk_status,
            });
        }

        let req = AttachDisksRequest {
            disk_ids: vec![disk_id.clone()],
            instance_id: instance_id.clone(),
        };
        retry(&ctx.write_retry(), || async {
            ctx.client.attach_disks(&req).await
        })
        .await?;
        let attached = Self::wait_status(
            ctx,
            &disk_id,
            &[disk::STATUS_AVAILABLE, disk::STATUS_ATTACHING],
            disk::STATUS_IN_USE,
            data,
        )
        .await?;
        if attached.is_none() {
            return Err(ProviderError::Wait {
                resource: RESOURCE,
                reason: "disk disappeared while attaching".to_string(),
            });
        }
        data.set_id(composite_id(&disk_id, &instance_id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let (disk_id, instance_id) = split_composite(&id)?;
        let disk_id = disk_id.to_string();
        let instance_id = instance_id.to_string();

        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_disk(&disk_id).await
        })
        .await?;
        match info {
            Some(info)
                if info.disk_status == disk::STATUS_IN_USE
                    && info.instance_id == instance_id =>
            {
                data.set("disk_id", &disk_id)?;
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
        let (disk_id, _) = split_composite(&id)?;
        let disk_id = disk_id.to_string();

        let detached = retry(&ctx.write_retry(), || async {
            ctx.client.detach_disks(&[disk_id.clone()]).await
        })
        .await;
        match detached {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                match &inner {
                    ProviderError::Api(api)
                        if api.is_not_found() || api.is_code(CODE_DISK_NO_ATTACH) => {}
                    _ => return Err(inner),
                }
            }
        }

        Self::wait_status(
            ctx,
            &disk_id,
            &[disk::STATUS_IN_USE, disk::STATUS_DETACHING],
            disk::STATUS_AVAILABLE,
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
    async fn detach_tolerates_disk_with_no_attachment() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err("DetachDisks", "UNSUPPORTED_OPERATION_DISK_NO_ATTACH");
        mock.push_ok(
            "DescribeDisks",
            json!({"TotalCount": 1, "DataSet": [{
                "DiskId": "d-1", "DiskStatus": "AVAILABLE",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("d-1:i-1");
        DiskAttachment.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
        assert!(mock.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn attach_requires_available_disk() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeDisks",
            json!({"TotalCount": 1, "DataSet": [{
                "DiskId": "d-1", "DiskStatus": "RECYCLED",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "disk_id": "d-1",
            "instance_id": "i-1",
        }))
        .unwrap();
        let err = DiskAttachment.create(&ctx, &mut data).await.unwrap_err();
        assert_eq!(err.to_string(), "disk status is illegal RECYCLED");
    }
}
