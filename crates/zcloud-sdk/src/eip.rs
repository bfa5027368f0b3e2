//! Elastic IP service. DDoS-protected IPs share the same state machine and
//! live in [`crate::ddos`].

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "bmc";

pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_AVAILABLE: &str = "AVAILABLE";
pub const STATUS_ASSOCIATING: &str = "ASSOCIATING";
pub const STATUS_ASSOCIATED: &str = "ASSOCIATED";
pub const STATUS_UNASSOCIATING: &str = "UNASSOCIATING";
pub const STATUS_CREATE_FAILED: &str = "CREATE_FAILED";
pub const STATUS_RELEASING: &str = "RELEASING";
pub const STATUS_RECYCLE: &str = "RECYCLE";
pub const STATUS_RECYCLING: &str = "RECYCLING";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEipAddressesRequest {
    pub zone_id: String,
    pub eip_charge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eip_charge_prepaid_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateEipAddressesResponse {
    pub eip_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeEipAddressesRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eip_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct EipInfo {
    pub eip_id: String,
    pub ip_address: String,
    pub zone_id: String,
    pub eip_charge_type: String,
    pub period: i64,
    pub instance_id: String,
    pub instance_name: String,
    pub resource_group_id: String,
    pub eip_status: String,
    pub create_time: String,
    pub expired_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeEipAddressesResponse {
    pub total_count: u64,
    pub data_set: Vec<EipInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociateEipAddressRequest {
    pub eip_id: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EipIdRequest {
    eip_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EipIdsRequest {
    eip_ids: Vec<String>,
}

impl Client {
    pub async fn create_eip_addresses(
        &self,
        req: &CreateEipAddressesRequest,
    ) -> Result<CreateEipAddressesResponse> {
        self.request(SERVICE, "CreateEipAddresses", req).await
    }

    pub async fn describe_eip_addresses(
        &self,
        req: &DescribeEipAddressesRequest,
    ) -> Result<DescribeEipAddressesResponse> {
        self.request(SERVICE, "DescribeEipAddresses", req).await
    }

    /// Describe one EIP; `Ok(None)` when it does not exist.
    pub async fn describe_eip_address(&self, eip_id: &str) -> Result<Option<EipInfo>> {
        let req = DescribeEipAddressesRequest {
            eip_ids: vec![eip_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_eip_addresses(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn associate_eip_address(
        &self,
        req: &AssociateEipAddressRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "AssociateEipAddress", req).await
    }

    pub async fn unassociate_eip_address(&self, eip_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "UnassociateEipAddress",
            &EipIdRequest {
                eip_id: eip_id.to_string(),
            },
        )
        .await
    }

    /// Move the address into the recycle bin.
    pub async fn terminate_eip_address(&self, eip_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "TerminateEipAddress",
            &EipIdRequest {
                eip_id: eip_id.to_string(),
            },
        )
        .await
    }

    /// Permanently release recycled addresses.
    pub async fn release_eip_addresses(&self, eip_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "ReleaseEipAddresses",
            &EipIdsRequest {
                eip_ids: eip_ids.to_vec(),
            },
        )
        .await
    }
}
