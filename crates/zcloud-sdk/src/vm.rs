//! Virtual machine compute service.
//!
//! The VM API mirrors the bare-metal one but provisions much faster and
//! carries a system disk instead of partitions/RAID.

use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_STOPPED: &str = "STOPPED";
pub const STATUS_CREATE_FAILED: &str = "CREATE_FAILED";
pub const STATUS_RECYCLE: &str = "RECYCLE";
pub const STATUS_DELETING: &str = "DELETING";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemDisk {
    pub disk_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInstancesRequest {
    pub zone_id: String,
    pub instance_type_id: String,
    pub image_id: String,
    pub instance_charge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_charge_prepaid_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_charge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_max_bandwidth_out: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_disk: Option<SystemDisk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    pub instance_count: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateInstancesResponse {
    pub instance_id_set: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instance_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub instance_name: String,
    pub zone_id: String,
    pub instance_type_id: String,
    pub image_id: String,
    pub image_name: String,
    pub instance_charge_type: String,
    pub period: i64,
    pub internet_charge_type: String,
    pub internet_max_bandwidth_out: i64,
    pub subnet_id: String,
    pub resource_group_id: String,
    pub resource_group_name: String,
    pub key_id: String,
    pub system_disk: Option<SystemDisk>,
    pub security_group_ids: Vec<String>,
    pub public_ip_addresses: Vec<String>,
    pub private_ip_addresses: Vec<String>,
    pub ipv6_addresses: Vec<String>,
    pub instance_status: String,
    pub create_time: String,
    pub expired_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeInstancesResponse {
    pub total_count: u64,
    pub data_set: Vec<InstanceInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstancesAttributeRequest {
    pub instance_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstanceBandwidthRequest {
    pub instance_id: String,
    pub internet_max_bandwidth_out: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResetInstancePasswordRequest {
    pub instance_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceIdRequest {
    instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceIdsRequest {
    instance_ids: Vec<String>,
}

pub use crate::bmc::EmptyResponse;

impl Client {
    pub async fn vm_create_instances(
        &self,
        req: &CreateInstancesRequest,
    ) -> Result<CreateInstancesResponse> {
        self.request(SERVICE, "CreateInstances", req).await
    }

    pub async fn vm_describe_instances(
        &self,
        req: &DescribeInstancesRequest,
    ) -> Result<DescribeInstancesResponse> {
        self.request(SERVICE, "DescribeInstances", req).await
    }

    /// Describe one instance; `Ok(None)` when it does not exist.
    pub async fn vm_describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>> {
        let req = DescribeInstancesRequest {
            instance_ids: vec![instance_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.vm_describe_instances(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn vm_modify_instances_attribute(
        &self,
        req: &ModifyInstancesAttributeRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyInstancesAttribute", req).await
    }

    pub async fn vm_modify_instance_bandwidth(
        &self,
        req: &ModifyInstanceBandwidthRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyInstanceBandwidth", req).await
    }

    pub async fn vm_reset_instance_password(
        &self,
        req: &ResetInstancePasswordRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ResetInstancePassword", req).await
    }

    pub async fn vm_terminate_instance(&self, instance_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "TerminateInstance",
            &InstanceIdRequest {
                instance_id: instance_id.to_string(),
            },
        )
        .await
    }

    pub async fn vm_release_instances(&self, instance_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "ReleaseInstances",
            &InstanceIdsRequest {
                instance_ids: instance_ids.to_vec(),
            },
        )
        .await
    }
}
