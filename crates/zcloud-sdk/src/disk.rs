//! Block storage service.

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_AVAILABLE: &str = "AVAILABLE";
pub const STATUS_ATTACHING: &str = "ATTACHING";
pub const STATUS_IN_USE: &str = "IN_USE";
pub const STATUS_DETACHING: &str = "DETACHING";
pub const STATUS_DELETING: &str = "DELETING";
pub const STATUS_RECYCLED: &str = "RECYCLED";

pub const DISK_TYPE_SYSTEM: &str = "SYSTEM";
pub const DISK_TYPE_DATA: &str = "DATA";

/// Minimum size the vendor accepts for a data disk, in GB.
pub const MIN_DISK_SIZE_GB: i64 = 20;

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDisksRequest {
    pub zone_id: String,
    pub disk_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_category: Option<String>,
    pub disk_charge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_charge_prepaid_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub disk_count: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateDisksResponse {
    pub disk_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeDisksRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disk_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DiskInfo {
    pub disk_id: String,
    pub disk_name: String,
    pub zone_id: String,
    pub disk_size: i64,
    pub disk_type: String,
    pub disk_category: String,
    pub disk_charge_type: String,
    pub period: i64,
    pub portable: bool,
    pub instance_id: String,
    pub instance_name: String,
    pub disk_status: String,
    pub create_time: String,
    pub expired_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeDisksResponse {
    pub total_count: u64,
    pub data_set: Vec<DiskInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyDisksAttributesRequest {
    pub disk_ids: Vec<String>,
    pub disk_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResizeDiskRequest {
    pub disk_id: String,
    pub disk_size: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachDisksRequest {
    pub disk_ids: Vec<String>,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DiskIdRequest {
    disk_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DiskIdsRequest {
    disk_ids: Vec<String>,
}

impl Client {
    pub async fn create_disks(&self, req: &CreateDisksRequest) -> Result<CreateDisksResponse> {
        self.request(SERVICE, "CreateDisks", req).await
    }

    pub async fn describe_disks(&self, req: &DescribeDisksRequest) -> Result<DescribeDisksResponse> {
        self.request(SERVICE, "DescribeDisks", req).await
    }

    /// Describe one disk; `Ok(None)` when it does not exist.
    pub async fn describe_disk(&self, disk_id: &str) -> Result<Option<DiskInfo>> {
        let req = DescribeDisksRequest {
            disk_ids: vec![disk_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_disks(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_disks_attributes(
        &self,
        req: &ModifyDisksAttributesRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyDisksAttributes", req).await
    }

    pub async fn resize_disk(&self, req: &ResizeDiskRequest) -> Result<EmptyResponse> {
        self.request(SERVICE, "ResizeDisk", req).await
    }

    pub async fn attach_disks(&self, req: &AttachDisksRequest) -> Result<EmptyResponse> {
        self.request(SERVICE, "AttachDisks", req).await
    }

    pub async fn detach_disks(&self, disk_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DetachDisks",
            &DiskIdsRequest {
                disk_ids: disk_ids.to_vec(),
            },
        )
        .await
    }

    /// Move the disk into the recycle bin.
    pub async fn terminate_disk(&self, disk_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "TerminateDisk",
            &DiskIdRequest {
                disk_id: disk_id.to_string(),
            },
        )
        .await
    }

    /// Permanently release a recycled disk.
    pub async fn release_disk(&self, disk_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "ReleaseDisk",
            &DiskIdRequest {
                disk_id: disk_id.to_string(),
            },
        )
        .await
    }
}
