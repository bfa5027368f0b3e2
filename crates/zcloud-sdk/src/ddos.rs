//! DDoS-protected IP service. Same state machine as elastic IPs; status
//! constants are shared from [`crate::eip`].

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "bmc";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDdosIpsRequest {
    pub zone_id: String,
    pub ddos_ip_charge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddos_ip_charge_prepaid_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateDdosIpsResponse {
    pub ddos_ip_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeDdosIpsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ddos_ip_ids: Vec<String>,
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
pub struct DdosIpInfo {
    pub ddos_ip_id: String,
    pub ip_address: String,
    pub zone_id: String,
    pub ddos_ip_charge_type: String,
    pub period: i64,
    pub instance_id: String,
    pub instance_name: String,
    pub resource_group_id: String,
    pub ddos_ip_status: String,
    pub create_time: String,
    pub expired_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeDdosIpsResponse {
    pub total_count: u64,
    pub data_set: Vec<DdosIpInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociateDdosIpRequest {
    pub ddos_ip_id: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DdosIpIdRequest {
    ddos_ip_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DdosIpIdsRequest {
    ddos_ip_ids: Vec<String>,
}

impl Client {
    pub async fn create_ddos_ips(&self, req: &CreateDdosIpsRequest) -> Result<CreateDdosIpsResponse> {
        self.request(SERVICE, "CreateDdosIps", req).await
    }

    pub async fn describe_ddos_ips(
        &self,
        req: &DescribeDdosIpsRequest,
    ) -> Result<DescribeDdosIpsResponse> {
        self.request(SERVICE, "DescribeDdosIps", req).await
    }

    /// Describe one protected IP; `Ok(None)` when it does not exist.
    pub async fn describe_ddos_ip(&self, ddos_ip_id: &str) -> Result<Option<DdosIpInfo>> {
        let req = DescribeDdosIpsRequest {
            ddos_ip_ids: vec![ddos_ip_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_ddos_ips(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn associate_ddos_ip(&self, req: &AssociateDdosIpRequest) -> Result<EmptyResponse> {
        self.request(SERVICE, "AssociateDdosIp", req).await
    }

    pub async fn unassociate_ddos_ip(&self, ddos_ip_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "UnassociateDdosIp",
            &DdosIpIdRequest {
                ddos_ip_id: ddos_ip_id.to_string(),
            },
        )
        .await
    }

    /// Move the address into the recycle bin.
    pub async fn terminate_ddos_ip(&self, ddos_ip_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "TerminateDdosIp",
            &DdosIpIdRequest {
                ddos_ip_id: ddos_ip_id.to_string(),
            },
        )
        .await
    }

    /// Permanently release recycled addresses.
    pub async fn release_ddos_ips(&self, ddos_ip_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "ReleaseDdosIps",
            &DdosIpIdsRequest {
                ddos_ip_ids: ddos_ip_ids.to_vec(),
            },
        )
        .await
    }
}
