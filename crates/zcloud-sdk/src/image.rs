//! Image service. Public images are vendor-owned; custom images are built
//! from an existing instance.

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_AVAILABLE: &str = "AVAILABLE";
pub const STATUS_UNAVAILABLE: &str = "UNAVAILABLE";

pub const IMAGE_TYPE_PUBLIC: &str = "PUBLIC_IMAGE";
pub const IMAGE_TYPE_CUSTOM: &str = "CUSTOM_IMAGE";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateImageRequest {
    pub image_name: String,
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateImageResponse {
    pub image_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeImagesRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageInfo {
    pub image_id: String,
    pub image_name: String,
    pub image_type: String,
    pub image_description: String,
    pub image_size: i64,
    pub category: String,
    pub os_type: String,
    pub instance_id: String,
    pub image_status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeImagesResponse {
    pub total_count: u64,
    pub data_set: Vec<ImageInfo>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyImagesAttributesRequest {
    pub image_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageIdsRequest {
    image_ids: Vec<String>,
}

impl Client {
    pub async fn create_image(&self, req: &CreateImageRequest) -> Result<CreateImageResponse> {
        self.request(SERVICE, "CreateImage", req).await
    }

    pub async fn describe_images(
        &self,
        req: &DescribeImagesRequest,
    ) -> Result<DescribeImagesResponse> {
        self.request(SERVICE, "DescribeImages", req).await
    }

    /// Describe one image; `Ok(None)` when it does not exist.
    pub async fn describe_image(&self, image_id: &str) -> Result<Option<ImageInfo>> {
        let req = DescribeImagesRequest {
            image_ids: vec![image_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_images(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_images_attributes(
        &self,
        req: &ModifyImagesAttributesRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyImagesAttributes", req).await
    }

    pub async fn delete_images(&self, image_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteImages",
            &ImageIdsRequest {
                image_ids: image_ids.to_vec(),
            },
        )
        .await
    }
}
