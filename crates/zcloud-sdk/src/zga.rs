//! Global accelerator (ZGA) service: accelerators and certificates.
//!
//! An accelerator is a composite object. Create accepts everything except
//! access control, which has its own pair of endpoints (rule replacement
//! and an enable/disable toggle).

use crate::bmc::EmptyResponse;
use crate::client::Client;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "zga";

pub const STATUS_ACCELERATING: &str = "Accelerating";
pub const STATUS_DEPLOYING: &str = "Deploying";
pub const STATUS_ACCELERATE_FAILURE: &str = "AccelerateFailure";

pub const PROTOCOL_TCP: &str = "tcp";
pub const PROTOCOL_UDP: &str = "udp";
pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_HTTPS: &str = "https";

/// Listener key accepted by every access-control rule.
pub const LISTENER_ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Domain {
    pub domain: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relate_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Origin {
    pub origin_region_id: String,
    pub origin: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backup_origin: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccelerateRegion {
    pub accelerate_region_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct L4Listener {
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_port_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct L7Listener {
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_port_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProtocolOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toa_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websocket: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_protocol: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gzip: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthCheck {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

/// One ordered access-control rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccessControlRule {
    /// `all`, or a declared listener key `protocol:port` /
    /// `protocol:portRange`.
    pub listener: String,
    pub directory: String,
    pub policy: String,
    pub cidr_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccessControl {
    pub enable: bool,
    pub rules: Vec<AccessControlRule>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAcceleratorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_name: Option<String>,
    pub charge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    pub origin: Origin,
    pub accelerate_regions: Vec<AccelerateRegion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub l4_listeners: Vec<L4Listener>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub l7_listeners: Vec<L7Listener>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_opts: Option<ProtocolOpts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateAcceleratorResponse {
    pub accelerator_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAcceleratorsRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accelerator_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerate_region_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AcceleratorInfo {
    pub accelerator_id: String,
    pub accelerator_name: String,
    pub charge_type: String,
    pub domain: Option<Domain>,
    pub certificate_id: String,
    pub cname: String,
    pub origin: Origin,
    pub accelerate_regions: Vec<AccelerateRegion>,
    pub l4_listeners: Vec<L4Listener>,
    pub l7_listeners: Vec<L7Listener>,
    pub protocol_opts: Option<ProtocolOpts>,
    pub health_check: Option<HealthCheck>,
    pub access_control: Option<AccessControl>,
    pub resource_group_id: String,
    pub accelerator_status: String,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeAcceleratorsResponse {
    pub total_count: u64,
    pub data_set: Vec<AcceleratorInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorNameRequest {
    pub accelerator_id: String,
    pub accelerator_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorDomainRequest {
    pub accelerator_id: String,
    pub domain: Domain,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorCertificateRequest {
    pub accelerator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorOriginRequest {
    pub accelerator_id: String,
    pub origin: Origin,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorRegionsRequest {
    pub accelerator_id: String,
    pub accelerate_regions: Vec<AccelerateRegion>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorListenersRequest {
    pub accelerator_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub l4_listeners: Vec<L4Listener>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub l7_listeners: Vec<L7Listener>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorProtocolOptsRequest {
    pub accelerator_id: String,
    pub protocol_opts: ProtocolOpts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorHealthCheckRequest {
    pub accelerator_id: String,
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAcceleratorAccessControlRulesRequest {
    pub accelerator_id: String,
    pub rules: Vec<AccessControlRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AcceleratorIdRequest {
    accelerator_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCertificateRequest {
    pub certificate_content: String,
    pub certificate_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateCertificateResponse {
    pub certificate_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCertificatesRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificate_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    pub page_num: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct CertificateInfo {
    pub certificate_id: String,
    pub certificate_label: String,
    pub common_name: String,
    pub san: Vec<String>,
    pub issuer: String,
    pub fingerprint: String,
    pub start_time: String,
    pub end_time: String,
    pub expired: bool,
    pub create_time: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeCertificatesResponse {
    pub total_count: u64,
    pub data_set: Vec<CertificateInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CertificateIdRequest {
    certificate_id: String,
}

impl Client {
    pub async fn create_accelerator(
        &self,
        req: &CreateAcceleratorRequest,
    ) -> Result<CreateAcceleratorResponse> {
        self.request(SERVICE, "CreateAccelerator", req).await
    }

    pub async fn describe_accelerators(
        &self,
        req: &DescribeAcceleratorsRequest,
    ) -> Result<DescribeAcceleratorsResponse> {
        self.request(SERVICE, "DescribeAccelerators", req).await
    }

    /// Describe one accelerator; `Ok(None)` when it does not exist.
    pub async fn describe_accelerator(
        &self,
        accelerator_id: &str,
    ) -> Result<Option<AcceleratorInfo>> {
        let req = DescribeAcceleratorsRequest {
            accelerator_ids: vec![accelerator_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_accelerators(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_accelerator_name(
        &self,
        req: &ModifyAcceleratorNameRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorName", req).await
    }

    pub async fn modify_accelerator_domain(
        &self,
        req: &ModifyAcceleratorDomainRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorDomain", req).await
    }

    pub async fn modify_accelerator_certificate(
        &self,
        req: &ModifyAcceleratorCertificateRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorCertificate", req)
            .await
    }

    pub async fn modify_accelerator_origin(
        &self,
        req: &ModifyAcceleratorOriginRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorOrigin", req).await
    }

    pub async fn modify_accelerator_regions(
        &self,
        req: &ModifyAcceleratorRegionsRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorRegions", req).await
    }

    pub async fn modify_accelerator_listeners(
        &self,
        req: &ModifyAcceleratorListenersRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorListeners", req)
            .await
    }

    pub async fn modify_accelerator_protocol_opts(
        &self,
        req: &ModifyAcceleratorProtocolOptsRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorProtocolOpts", req)
            .await
    }

    pub async fn modify_accelerator_health_check(
        &self,
        req: &ModifyAcceleratorHealthCheckRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorHealthCheck", req)
            .await
    }

    /// Replace the ordered access-control rule list.
    pub async fn modify_accelerator_access_control_rules(
        &self,
        req: &ModifyAcceleratorAccessControlRulesRequest,
    ) -> Result<EmptyResponse> {
        self.request(SERVICE, "ModifyAcceleratorAccessControlRules", req)
            .await
    }

    pub async fn open_accelerator_access_control(
        &self,
        accelerator_id: &str,
    ) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "OpenAcceleratorAccessControl",
            &AcceleratorIdRequest {
                accelerator_id: accelerator_id.to_string(),
            },
        )
        .await
    }

    pub async fn close_accelerator_access_control(
        &self,
        accelerator_id: &str,
    ) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "CloseAcceleratorAccessControl",
            &AcceleratorIdRequest {
                accelerator_id: accelerator_id.to_string(),
            },
        )
        .await
    }

    pub async fn delete_accelerator(&self, accelerator_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteAccelerator",
            &AcceleratorIdRequest {
                accelerator_id: accelerator_id.to_string(),
            },
        )
        .await
    }

    pub async fn create_certificate(
        &self,
        req: &CreateCertificateRequest,
    ) -> Result<CreateCertificateResponse> {
        self.request(SERVICE, "CreateCertificate", req).await
    }

    pub async fn describe_certificates(
        &self,
        req: &DescribeCertificatesRequest,
    ) -> Result<DescribeCertificatesResponse> {
        self.request(SERVICE, "DescribeCertificates", req).await
    }

    /// Describe one certificate; `Ok(None)` when it does not exist.
    pub async fn describe_certificate(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateInfo>> {
        let req = DescribeCertificatesRequest {
            certificate_ids: vec![certificate_id.to_string()],
            page_num: 1,
            page_size: 1,
            ..Default::default()
        };
        match self.describe_certificates(&req).await {
            Ok(resp) => Ok(resp.data_set.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fails with `CERTIFICATE_IS_USING` while any accelerator references
    /// the certificate.
    pub async fn delete_certificate(&self, certificate_id: &str) -> Result<EmptyResponse> {
        self.request(
            SERVICE,
            "DeleteCertificate",
            &CertificateIdRequest {
                certificate_id: certificate_id.to_string(),
            },
        )
        .await
    }
}
