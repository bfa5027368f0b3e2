//! Custom image reconciler. Images are snapshotted from a running instance
//! and become usable once the build finishes.

use crate::context::Context;
use crate::error::{wait_error, ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use zcloud_core::retry::retry;
use zcloud_core::waiter::StateWaiter;
use zcloud_sdk::image::{
    self, CreateImageRequest, ImageInfo, ModifyImagesAttributesRequest,
};

const RESOURCE: &str = "image";

pub struct Image;

impl Image {
    fn flatten(data: &mut ResourceData, info: &ImageInfo) -> Result<()> {
        data.set("image_name", &info.image_name)?;
        data.set("image_type", &info.image_type)?;
        data.set("image_description", &info.image_description)?;
        data.set("image_size", info.image_size)?;
        data.set("category", &info.category)?;
        data.set("os_type", &info.os_type)?;
        data.set("instance_id", &info.instance_id)?;
        data.set("image_status", &info.image_status)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for Image {
    fn type_name(&self) -> &'static str {
        "zcloud_image"
    }

    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        let mut forced = Vec::new();
        if prior.contains("instance_id") && prior.changed(planned, "instance_id") {
            forced.push("instance_id");
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let req = CreateImageRequest {
            image_name: data.require_string("image_name")?,
            instance_id: data.require_string("instance_id")?,
            image_description: data.get_string("image_description"),
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_image(&req).await
        })
        .await?;
        data.set_id(&resp.image_id);
        let id = resp.image_id;

        let waiter = StateWaiter::new(
            &[image::STATUS_CREATING],
            &[image::STATUS_AVAILABLE],
            data.timeout_or(ctx.timeouts.write_retry),
        )
        .with_failure(&[image::STATUS_UNAVAILABLE]);
        let info = waiter
            .wait_for(|| async {
                let info = ctx.client.describe_image(&id).await?;
                Ok(info.map(|i| {
                    let status = i.image_status.clone();
                    (i, status)
                }))
            })
            .await
            .map_err(|e| wait_error(RESOURCE, e))?;
        let info = info.ok_or(ProviderError::Wait {
            resource: RESOURCE,
            reason: "image disappeared while building".to_string(),
        })?;
        Self::flatten(data, &info)
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_image(&id).await
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
        if prior.changed(data, "image_name") || prior.changed(data, "image_description") {
            let req = ModifyImagesAttributesRequest {
                image_ids: vec![id],
                image_name: data.get_string("image_name"),
                image_description: data.get_string("image_description"),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_images_attributes(&req).await
            })
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_images(&[id.clone()]).await
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
    async fn create_waits_for_image_build() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateImage", json!({"ImageId": "img-9"}));
        mock.push_ok(
            "DescribeImages",
            json!({"TotalCount": 1, "DataSet": [{
                "ImageId": "img-9", "ImageStatus": "CREATING",
            }]}),
        );
        mock.push_ok(
            "DescribeImages",
            json!({"TotalCount": 1, "DataSet": [{
                "ImageId": "img-9", "ImageStatus": "AVAILABLE",
                "ImageName": "golden", "ImageType": "CUSTOM_IMAGE",
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({
            "image_name": "golden",
            "instance_id": "i-1",
        }))
        .unwrap();
        Image.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("img-9"));
        assert_eq!(data.get_string("image_type").as_deref(), Some("CUSTOM_IMAGE"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_tolerates_missing_image() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err("DeleteImages", "OPERATION_FAILED_RESOURCE_NOT_FOUND");
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("img-gone");
        Image.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
