//! VPC and subnet service.

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "vm";

pub const VPC_STATUS_CREATING: &str = "CREATING";
pub const VPC_STATUS_AVAILABLE: &str = "AVAILABLE";
pub const VPC_STATUS_DELETING: &str = "DELETING";
pub const VPC_STATUS_CREATE_FAILED: &str = "CREATE_FAILED";

pub const SUBNET_STATUS_PENDING: &str = "PENDING";
pub const SUBNET_STATUS_CREATING: &str = "CREATING";
pub const SUBNET_STATUS_AVAILABLE: &str = "AVAILABLE";
pub const SUBNET_STATUS_CREATE_FAILED: &str = "CREATE_FAILED";
pub const SUBNET_STATUS_DELETING: &str = "DELETING";
pub const SUBNET_STATUS_ASSOCIATING: &str = "ASSOCIATING";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcRequest {
    pub vpc_name: String,
    pub cidr_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_region_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateVpcResponse {
    pub vpc_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVpcsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vpc_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct VpcInfo {
    pub vpc_id: String,
    pub vpc_name: String,
    pub vpc_region_id: String,
    pub cidr_block: String,
    pub subnet_ids: Vec<String>,
    pub resource_group_id: String,
    pub vpc_status: String,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeVpcsResponse {
    pub total_count: u64,
    pub data_set: Vec<VpcInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyVpcsAttributesRequest {
    pub vpc_ids: Vec<String>,
    pub vpc_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct VpcIdRequest {
    vpc_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSubnetRequest {
    pub zone_id: String,
    pub subnet_name: String,
    pub cidr_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateSubnetResponse {
    pub subnet_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSubnetsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubnetInfo {
    pub subnet_id: String,
    pub subnet_name: String,
    pub zone_id: String,
    pub cidr_block: String,
    pub vpc_id: String,
    pub instance_ids: Vec<String>,
    pub resource_group_id: String,
    pub subnet_status: String,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeSubnetsResponse {
    pub total_count: u64,
    pub data_set: Vec<SubnetInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifySubnetsAttributesRequest {
    pub subnet_ids: Vec<String>,
    pub subnet_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubnetIdRequest {
    subnet_id: String,
}

impl Client {
    pub async fn create_vpc(&self, req: &CreateVpcRequest) -> Result<CreateVpcResponse> {
        self.request(SERVICE, "CreateVpc", req).await
    }

    pub async fn describe_vpcs(&self, req: &DescribeVpcsRequest) -> Result<DescribeVpcsResponse> {
        self.request(SERVICE, "DescribeVpcs", req).await
    }

    /// Describe one VPC; `Ok(None)` when it does not exist.
    pub async fn describe_vpc(&self, vpc_id: &str) -> Result<Option<VpcInfo>> {
        let req = DescribeVpcsRequest {
            vpc_ids: vec![vpc_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_vpcs(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_vpcs_attributes(
        &self,
        req: &ModifyVpcsAttributesRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyVpcsAttributes", req).await
    }

    pub async fn delete_vpc(&self, vpc_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteVpc",
            &VpcIdRequest {
                vpc_id: vpc_id.to_string(),
            },
        )
        .await
    }

    pub async fn create_subnet(&self, req: &CreateSubnetRequest) -> Result<CreateSubnetResponse> {
        self.request(SERVICE, "CreateSubnet", req).await
    }

    pub async fn describe_subnets(
        &self,
        req: &DescribeSubnetsRequest,
    ) -> Result<DescribeSubnetsResponse> {
        self.request(SERVICE, "DescribeSubnets", req).await
    }

    /// Describe one subnet; `Ok(None)` when it does not exist.
    pub async fn describe_subnet(&self, subnet_id: &str) -> Result<Option<SubnetInfo>> {
        let req = DescribeSubnetsRequest {
            subnet_ids: vec![subnet_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_subnets(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_subnets_attributes(
        &self,
        req: &ModifySubnetsAttributesRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifySubnetsAttributes", req).await
    }

    pub async fn delete_subnet(&self, subnet_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteSubnet",
            &SubnetIdRequest {
                subnet_id: subnet_id.to_string(),
            },
        )
        .await
    }
}
