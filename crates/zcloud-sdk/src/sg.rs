//! Security group service. The server assigns no IDs to individual rules;
//! rules are addressed by their full tuple.

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

pub const DIRECTION_INGRESS: &str = "ingress";
pub const DIRECTION_EGRESS: &str = "egress";
pub const POLICY_ACCEPT: &str = "accept";
pub const POLICY_DROP: &str = "drop";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupRequest {
    pub security_group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateSecurityGroupResponse {
    pub security_group_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

/// One rule as the server reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleInfo {
    pub direction: String,
    pub policy: String,
    pub ip_protocol: String,
    pub port_range: String,
    pub cidr_ip: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroupInfo {
    pub security_group_id: String,
    pub security_group_name: String,
    pub description: String,
    pub is_default: bool,
    pub instance_ids: Vec<String>,
    pub rule_infos: Vec<RuleInfo>,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeSecurityGroupsResponse {
    pub total_count: u64,
    pub data_set: Vec<SecurityGroupInfo>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifySecurityGroupsAttributeRequest {
    pub security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Authorize and revoke share this request shape.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupRuleRequest {
    pub security_group_id: String,
    pub direction: String,
    pub policy: String,
    pub ip_protocol: String,
    pub port_range: String,
    pub cidr_ip: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroupIdRequest {
    security_group_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociateSecurityGroupInstanceRequest {
    pub security_group_id: String,
    pub instance_id: String,
}

impl Client {
    pub async fn create_security_group(
        &self,
        req: &CreateSecurityGroupRequest,
    ) -> Result<CreateSecurityGroupResponse> {
        self.request(SERVICE, "CreateSecurityGroup", req).await
    }

    pub async fn describe_security_groups(
        &self,
        req: &DescribeSecurityGroupsRequest,
    ) -> Result<DescribeSecurityGroupsResponse> {
        self.request(SERVICE, "DescribeSecurityGroups", req).await
    }

    /// Describe one group; `Ok(None)` when it does not exist.
    pub async fn describe_security_group(
        &self,
        security_group_id: &str,
    ) -> Result<Option<SecurityGroupInfo>> {
        let req = DescribeSecurityGroupsRequest {
            security_group_ids: vec![security_group_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_security_groups(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_security_groups_attribute(
        &self,
        req: &ModifySecurityGroupsAttributeRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifySecurityGroupsAttribute", req)
            .await
    }

    pub async fn authorize_security_group_rule(
        &self,
        req: &SecurityGroupRuleRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "AuthorizeSecurityGroupRule", req)
            .await
    }

    pub async fn revoke_security_group_rule(
        &self,
        req: &SecurityGroupRuleRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "RevokeSecurityGroupRule", req).await
    }

    pub async fn delete_security_group(&self, security_group_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteSecurityGroup",
            &SecurityGroupIdRequest {
                security_group_id: security_group_id.to_string(),
            },
        )
        .await
    }

    pub async fn associate_security_group_instance(
        &self,
        req: &AssociateSecurityGroupInstanceRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "AssociateSecurityGroupInstance", req)
            .await
    }

    pub async fn unassociate_security_group_instance(
        &self,
        req: &AssociateSecurityGroupInstanceRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "UnAssociateSecurityGroupInstance", req)
            .await
    }
}
