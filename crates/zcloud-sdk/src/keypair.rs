//! SSH key pair service. The public key is immutable once imported; only
//! the description can change.

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ImportKeyPairRequest {
    pub key_name: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImportKeyPairResponse {
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeKeyPairsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct KeyPairInfo {
    pub key_id: String,
    pub key_name: String,
    pub public_key: String,
    pub key_description: String,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeKeyPairsResponse {
    pub total_count: u64,
    pub data_set: Vec<KeyPairInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyKeyPairAttributeRequest {
    pub key_id: String,
    pub key_description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyIdsRequest {
    key_ids: Vec<String>,
}

impl Client {
    pub async fn import_key_pair(&self, req: &ImportKeyPairRequest) -> Result<ImportKeyPairResponse> {
        self.request(SERVICE, "ImportKeyPair", req).await
    }

    pub async fn describe_key_pairs(
        &self,
        req: &DescribeKeyPairsRequest,
    ) -> Result<DescribeKeyPairsResponse> {
        self.request(SERVICE, "DescribeKeyPairs", req).await
    }

    /// Describe one key pair; `Ok(None)` when it does not exist.
    pub async fn describe_key_pair(&self, key_id: &str) -> Result<Option<KeyPairInfo>> {
        let req = DescribeKeyPairsRequest {
            key_ids: vec![key_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_key_pairs(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_key_pair_attribute(
        &self,
        req: &ModifyKeyPairAttributeRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyKeyPairAttribute", req).await
    }

    pub async fn delete_key_pairs(&self, key_ids: &[String]) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteKeyPairs",
            &KeyIdsRequest {
                key_ids: key_ids.to_vec(),
            },
        )
        .await
    }
}
