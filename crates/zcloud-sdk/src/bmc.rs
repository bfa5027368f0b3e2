//! Bare-metal compute service.
//!
//! Covers instance provisioning, reinstall, bandwidth and traffic-package
//! modification, and the internet-status side channel that reports when a
//! bandwidth or traffic-package change has actually taken effect.

use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "bmc";

// Instance status machine.
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_INSTALLING: &str = "INSTALLING";
pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_CREATE_FAILED: &str = "CREATE_FAILED";
pub const STATUS_INSTALL_FAILED: &str = "INSTALL_FAILED";
pub const STATUS_RECYCLE: &str = "RECYCLE";
pub const STATUS_DELETING: &str = "DELETING";

// Subnet binding status, surfaced on the instance.
pub const SUBNET_STATUS_BOUND: &str = "Bound";
pub const SUBNET_STATUS_NOT_BIND: &str = "NotBind";
pub const SUBNET_STATUS_BINDING: &str = "Binding";
pub const SUBNET_STATUS_UNBINDING: &str = "Unbinding";

// Charge types.
pub const CHARGE_TYPE_PREPAID: &str = "PREPAID";
pub const CHARGE_TYPE_POSTPAID: &str = "POSTPAID";

// Internet charge types.
pub const INTERNET_CHARGE_BY_BANDWIDTH: &str = "ByBandwidth";
pub const INTERNET_CHARGE_BY_TRAFFIC_PACKAGE: &str = "ByTrafficPackage";
pub const INTERNET_CHARGE_BY_INSTANCE_95: &str = "ByInstanceBandwidth95";
pub const INTERNET_CHARGE_BY_CLUSTER_95: &str = "ByClusterBandwidth95";

/// Side-channel modification status: the change is live once the status is
/// `Enable` and the reported value equals the requested one.
pub const MODIFY_STATUS_ENABLE: &str = "Enable";
pub const MODIFY_STATUS_PROCESSING: &str = "Processing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Partition {
    pub fs_type: String,
    pub fs_path: String,
    pub size: i64,
}

/// RAID layout: either a named simple level or per-disk custom groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct RaidConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_raids: Vec<CustomRaid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CustomRaid {
    pub raid_type: String,
    pub disk_sequence: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct NicConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lan_name: Option<String>,
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
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_charge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_max_bandwidth_out: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_package_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_config: Option<RaidConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_config: Option<NicConfig>,
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
    pub hostname: Option<String>,
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
    pub hostname: String,
    pub zone_id: String,
    pub instance_type_id: String,
    pub image_id: String,
    pub image_name: String,
    pub instance_charge_type: String,
    pub period: i64,
    pub internet_charge_type: String,
    pub internet_max_bandwidth_out: i64,
    pub traffic_package_size: f64,
    pub subnet_id: String,
    pub subnet_status: String,
    pub resource_group_id: String,
    pub resource_group_name: String,
    pub public_ip_addresses: Vec<String>,
    pub private_ip_addresses: Vec<String>,
    pub ipv6_addresses: Vec<String>,
    pub ssh_keys: Vec<String>,
    pub partitions: Vec<Partition>,
    pub raid_config: Option<RaidConfig>,
    pub nic_config: Option<NicConfig>,
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

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ReinstallInstanceRequest {
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_config: Option<RaidConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_config: Option<NicConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstanceBandwidthRequest {
    pub instance_id: String,
    pub internet_max_bandwidth_out: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstanceTrafficPackageRequest {
    pub instance_id: String,
    pub traffic_package_size: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceIdRequest {
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceIdsRequest {
    pub instance_ids: Vec<String>,
}

/// Internet-status side channel. `modified_bandwidth_status` /
/// `modified_traffic_package_status` report `Enable` once the last
/// modification is live; the value fields carry what is currently applied.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceInternetStatus {
    pub instance_id: String,
    pub internet_charge_type: String,
    pub internet_max_bandwidth_out: i64,
    pub modified_bandwidth_status: String,
    pub traffic_package_size: f64,
    pub modified_traffic_package_status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociateSubnetInstanceRequest {
    pub subnet_id: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct EmptyResponse {}

impl Client {
    pub async fn bmc_create_instances(
        &self,
        req: &CreateInstancesRequest,
    ) -> Result<CreateInstancesResponse> {
        self.request(SERVICE, "CreateInstances", req).await
    }

    pub async fn bmc_describe_instances(
        &self,
        req: &DescribeInstancesRequest,
    ) -> Result<DescribeInstancesResponse> {
        self.request(SERVICE, "DescribeInstances", req).await
    }

    /// Describe one instance; `Ok(None)` when it does not exist.
    pub async fn bmc_describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>> {
        let req = DescribeInstancesRequest {
            instance_ids: vec![instance_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.bmc_describe_instances(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn bmc_modify_instances_attribute(
        &self,
        req: &ModifyInstancesAttributeRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyInstancesAttribute", req).await
    }

    pub async fn bmc_reinstall_instance(
        &self,
        req: &ReinstallInstanceRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ReinstallInstance", req).await
    }

    pub async fn bmc_modify_instance_bandwidth(
        &self,
        req: &ModifyInstanceBandwidthRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyInstanceBandwidth", req).await
    }

    pub async fn bmc_modify_instance_traffic_package(
        &self,
        req: &ModifyInstanceTrafficPackageRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyInstanceTrafficPackage", req)
            .await
    }

    pub async fn bmc_describe_instance_internet_status(
        &self,
        instance_id: &str,
    ) -> Result<InstanceInternetStatus> {
        self.request(
            SERVICE,
            "DescribeInstanceInternetStatus",
            &InstanceIdRequest {
                instance_id: instance_id.to_string(),
            },
        )
        .await
    }

    /// Move the instance into the recycle bin.
    pub async fn bmc_terminate_instance(&self, instance_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "TerminateInstance",
            &InstanceIdRequest {
                instance_id: instance_id.to_string(),
            },
        )
        .await
    }

    /// Permanently release recycled instances.
    pub async fn bmc_release_instances(&self, instance_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "ReleaseInstances",
            &InstanceIdsRequest {
                instance_ids: instance_ids.to_vec(),
            },
        )
        .await
    }

    pub async fn bmc_associate_subnet_instance(
        &self,
        req: &AssociateSubnetInstanceRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "AssociateSubnetInstance", req).await
    }

    pub async fn bmc_unassociate_subnet_instance(
        &self,
        req: &AssociateSubnetInstanceRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "UnassociateSubnetInstance", req)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_omits_unset_fields() {
        let req = CreateInstancesRequest {
            zone_id: "asia-east-1a".into(),
            instance_type_id: "M6C".into(),
            image_id: "img-1".into(),
            instance_charge_type: CHARGE_TYPE_POSTPAID.into(),
            instance_count: 1,
            ..Default::default()
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["ZoneId"], "asia-east-1a");
        assert!(v.get("Password").is_none());
        assert!(v.get("SshKeys").is_none());
        assert!(v.get("TrafficPackageSize").is_none());
    }

    #[test]
    fn instance_info_tolerates_missing_fields() {
        let info: InstanceInfo = serde_json::from_value(serde_json::json!({
            "InstanceId": "i-1",
            "InstanceStatus": "RUNNING",
        }))
        .unwrap();
        assert_eq!(info.instance_id, "i-1");
        assert_eq!(info.instance_status, "RUNNING");
        assert!(info.public_ip_addresses.is_empty());
    }
}
