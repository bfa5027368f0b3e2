//! Accelerator desired-state model.
//!
//! The accelerator is the one composite resource in the provider: a create
//! carries domain, origin, regions, listeners, protocol options and health
//! check in a single request, and most invalid combinations are rejected by
//! the vendor only after deployment has started. Everything here runs
//! before the first API call so a bad plan fails in planning.

use crate::error::{ProviderError, Result};
use crate::schema::ResourceData;
use serde::Deserialize;
use zcloud_core::validate::{
    parse_port_range, validate_cidr_network, validate_in, validate_ip, validate_port,
    ValidationError,
};
use zcloud_sdk::zga::{
    AccelerateRegion, AccessControlRule, CreateAcceleratorRequest, Domain, HealthCheck,
    L4Listener, L7Listener, Origin, ProtocolOpts, LISTENER_ALL, PROTOCOL_HTTP, PROTOCOL_HTTPS,
    PROTOCOL_TCP, PROTOCOL_UDP,
};

pub const POLICY_ACCEPT: &str = "accept";
pub const POLICY_DROP: &str = "drop";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainConfig {
    pub domain: String,
    #[serde(default)]
    pub relate_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OriginConfig {
    pub origin_region_id: String,
    #[serde(default)]
    pub origin: Vec<String>,
    #[serde(default)]
    pub backup_origin: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionConfig {
    pub accelerate_region_id: String,
    pub bandwidth: Option<i64>,
    pub vip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct L4ListenerConfig {
    pub protocol: String,
    pub port: Option<i64>,
    pub port_range: Option<String>,
    pub back_port: Option<i64>,
    pub back_port_range: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct L7ListenerConfig {
    pub protocol: String,
    pub port: Option<i64>,
    pub port_range: Option<String>,
    pub back_protocol: Option<String>,
    pub back_port: Option<i64>,
    pub back_port_range: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProtocolOptsConfig {
    pub toa: Option<bool>,
    pub toa_value: Option<i64>,
    pub websocket: Option<bool>,
    pub proxy_protocol: Option<bool>,
    pub gzip: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default)]
    pub enable: bool,
    pub port: Option<i64>,
}

fn root_directory() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessRuleConfig {
    /// `all`, or a declared listener key `protocol:port` /
    /// `protocol:portRange`.
    pub listener: String,
    #[serde(default = "root_directory")]
    pub directory: String,
    pub policy: String,
    pub cidr_ip: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessControlConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub rules: Vec<AccessRuleConfig>,
}

/// Desired accelerator state, parsed once per operation.
#[derive(Debug, Clone, Default)]
pub struct AcceleratorConfig {
    pub accelerator_name: Option<String>,
    pub charge_type: String,
    pub domain: Option<DomainConfig>,
    pub certificate_id: Option<String>,
    pub origin: OriginConfig,
    pub accelerate_regions: Vec<RegionConfig>,
    pub l4_listeners: Vec<L4ListenerConfig>,
    pub l7_listeners: Vec<L7ListenerConfig>,
    pub protocol_opts: Option<ProtocolOptsConfig>,
    pub health_check: Option<HealthCheckConfig>,
    pub access_control: Option<AccessControlConfig>,
    pub resource_group_id: Option<String>,
}

fn conflict(family: &str, port: u16) -> ProviderError {
    ProviderError::Validation(ValidationError(format!(
        "{family} port conflict in {port}"
    )))
}

/// One listener carries either `port` or `port_range`, never both.
fn listener_span(port: Option<i64>, range: Option<&str>) -> Result<(u16, u16)> {
    match (port, range) {
        (Some(p), None) => {
            validate_port(p)?;
            Ok((p as u16, p as u16))
        }
        (None, Some(r)) => Ok(parse_port_range(r)?),
        (Some(_), Some(_)) => Err(ProviderError::invalid(
            "port",
            "port conflicts with port_range; set exactly one",
        )),
        (None, None) => Err(ProviderError::invalid(
            "port",
            "either port or port_range is required",
        )),
    }
}

fn listener_key(protocol: &str, port: Option<i64>, range: Option<&str>) -> String {
    match (port, range) {
        (Some(p), _) => format!("{protocol}:{p}"),
        (_, Some(r)) => format!("{protocol}:{r}"),
        _ => protocol.to_string(),
    }
}

/// Reject any two listeners whose port spans overlap within the same
/// transport family. UDP listeners never collide with TCP ones; HTTP and
/// HTTPS listeners ride TCP and share its family.
fn check_port_family(family: &str, mut spans: Vec<(u16, u16)>) -> Result<()> {
    spans.sort_unstable();
    for pair in spans.windows(2) {
        if pair[1].0 <= pair[0].1 {
            return Err(conflict(family, pair[1].0));
        }
    }
    Ok(())
}

fn check_rule_cidr(cidr_ip: &str) -> Result<()> {
    if cidr_ip.contains('/') {
        validate_cidr_network(cidr_ip)?;
    } else {
        validate_ip(cidr_ip)?;
    }
    Ok(())
}

impl AcceleratorConfig {
    pub fn from_data(data: &ResourceData) -> Result<Self> {
        Ok(Self {
            accelerator_name: data.get_string("accelerator_name"),
            charge_type: data.require_string("charge_type")?,
            domain: data.get_block("domain"),
            certificate_id: data.get_string("certificate_id"),
            origin: data
                .get_block("origin")
                .ok_or(ProviderError::MissingArgument("origin"))?,
            accelerate_regions: data.get_block("accelerate_regions").unwrap_or_default(),
            l4_listeners: data.get_block("l4_listeners").unwrap_or_default(),
            l7_listeners: data.get_block("l7_listeners").unwrap_or_default(),
            protocol_opts: data.get_block("protocol_opts"),
            health_check: data.get_block("health_check"),
            access_control: data.get_block("access_control"),
            resource_group_id: data.get_string("resource_group_id"),
        })
    }

    /// Cross-field validation, run in planning before any API call.
    pub fn validate(&self) -> Result<()> {
        if self.origin.origin.is_empty() {
            return Err(ProviderError::invalid(
                "origin",
                "at least one origin address is required",
            ));
        }
        if self.accelerate_regions.is_empty() {
            return Err(ProviderError::invalid(
                "accelerate_regions",
                "at least one accelerate region is required",
            ));
        }
        if self.l4_listeners.is_empty() && self.l7_listeners.is_empty() {
            return Err(ProviderError::invalid(
                "l4_listeners",
                "at least one listener is required",
            ));
        }

        if let Some(domain) = &self.domain {
            if domain.domain.is_empty() {
                return Err(ProviderError::invalid("domain", "domain must not be empty"));
            }
            if domain.relate_domains.iter().any(|d| d == &domain.domain) {
                return Err(ProviderError::invalid(
                    "relate_domains",
                    format!("{:?} duplicates the main domain", domain.domain),
                ));
            }
        } else {
            // IP accelerators carry no hostname, so nothing layer-7 applies.
            if self.certificate_id.is_some() {
                return Err(ProviderError::invalid(
                    "certificate_id",
                    "certificates require a domain accelerator",
                ));
            }
            if !self.l7_listeners.is_empty() {
                return Err(ProviderError::invalid(
                    "l7_listeners",
                    "l7 listeners require a domain accelerator",
                ));
            }
            if let Some(opts) = &self.protocol_opts {
                if opts.websocket == Some(true) {
                    return Err(ProviderError::invalid(
                        "protocol_opts",
                        "websocket requires a domain accelerator",
                    ));
                }
                if opts.gzip == Some(true) {
                    return Err(ProviderError::invalid(
                        "protocol_opts",
                        "gzip requires a domain accelerator",
                    ));
                }
            }
        }

        if let Some(opts) = &self.protocol_opts {
            if opts.toa == Some(true) && opts.proxy_protocol == Some(true) {
                return Err(ProviderError::invalid(
                    "protocol_opts",
                    "toa and proxy_protocol are mutually exclusive",
                ));
            }
        }

        self.check_listeners()?;
        self.check_health_check()?;
        self.check_access_control()?;
        Ok(())
    }

    fn check_listeners(&self) -> Result<()> {
        let mut tcp = Vec::new();
        let mut udp = Vec::new();
        for l in &self.l4_listeners {
            validate_in(&l.protocol, &[PROTOCOL_TCP, PROTOCOL_UDP])?;
            let span = listener_span(l.port, l.port_range.as_deref())?;
            if l.protocol == PROTOCOL_UDP {
                udp.push(span);
            } else {
                tcp.push(span);
            }
        }
        for l in &self.l7_listeners {
            validate_in(&l.protocol, &[PROTOCOL_HTTP, PROTOCOL_HTTPS])?;
            tcp.push(listener_span(l.port, l.port_range.as_deref())?);
        }
        check_port_family(PROTOCOL_TCP, tcp)?;
        check_port_family(PROTOCOL_UDP, udp)?;
        Ok(())
    }

    /// A non-zero health-check port must name a single-port TCP listener.
    fn check_health_check(&self) -> Result<()> {
        let Some(hc) = &self.health_check else {
            return Ok(());
        };
        let Some(port) = hc.port.filter(|p| *p != 0) else {
            return Ok(());
        };
        let l4_match = self
            .l4_listeners
            .iter()
            .any(|l| l.protocol == PROTOCOL_TCP && l.port == Some(port));
        let l7_match = self.l7_listeners.iter().any(|l| l.port == Some(port));
        if !(l4_match || l7_match) {
            return Err(ProviderError::invalid(
                "health_check",
                format!("port {port} does not match a single-port tcp listener"),
            ));
        }
        Ok(())
    }

    fn check_access_control(&self) -> Result<()> {
        let Some(ac) = &self.access_control else {
            return Ok(());
        };
        let mut keys: Vec<String> = vec![LISTENER_ALL.to_string()];
        for l in &self.l4_listeners {
            keys.push(listener_key(&l.protocol, l.port, l.port_range.as_deref()));
        }
        for l in &self.l7_listeners {
            keys.push(listener_key(&l.protocol, l.port, l.port_range.as_deref()));
        }
        for rule in &ac.rules {
            validate_in(&rule.policy, &[POLICY_ACCEPT, POLICY_DROP])?;
            check_rule_cidr(&rule.cidr_ip)?;
            if !keys.iter().any(|k| k == &rule.listener) {
                return Err(ProviderError::invalid(
                    "access_control",
                    format!("rule listener {:?} does not match a declared listener", rule.listener),
                ));
            }
            let layer4 = rule.listener == LISTENER_ALL
                || rule.listener.starts_with("tcp:")
                || rule.listener.starts_with("udp:");
            if layer4 && rule.directory != "/" {
                return Err(ProviderError::invalid(
                    "access_control",
                    format!(
                        "rule for listener {:?} must use directory \"/\"",
                        rule.listener
                    ),
                ));
            }
            if rule.directory.is_empty() {
                return Err(ProviderError::invalid(
                    "access_control",
                    "rule directory must not be empty",
                ));
            }
        }
        Ok(())
    }

    pub fn domain(&self) -> Option<Domain> {
        self.domain.as_ref().map(|d| Domain {
            domain: d.domain.clone(),
            relate_domains: d.relate_domains.clone(),
        })
    }

    pub fn origin(&self) -> Origin {
        Origin {
            origin_region_id: self.origin.origin_region_id.clone(),
            origin: self.origin.origin.clone(),
            backup_origin: self.origin.backup_origin.clone(),
        }
    }

    pub fn regions(&self) -> Vec<AccelerateRegion> {
        self.accelerate_regions
            .iter()
            .map(|r| AccelerateRegion {
                accelerate_region_id: r.accelerate_region_id.clone(),
                bandwidth: r.bandwidth,
                vip: r.vip.clone(),
            })
            .collect()
    }

    pub fn l4(&self) -> Vec<L4Listener> {
        self.l4_listeners
            .iter()
            .map(|l| L4Listener {
                protocol: l.protocol.clone(),
                port: l.port,
                port_range: l.port_range.clone(),
                back_port: l.back_port,
                back_port_range: l.back_port_range.clone(),
            })
            .collect()
    }

    pub fn l7(&self) -> Vec<L7Listener> {
        self.l7_listeners
            .iter()
            .map(|l| L7Listener {
                protocol: l.protocol.clone(),
                port: l.port,
                port_range: l.port_range.clone(),
                back_protocol: l.back_protocol.clone(),
                back_port: l.back_port,
                back_port_range: l.back_port_range.clone(),
                host: l.host.clone(),
            })
            .collect()
    }

    pub fn protocol_opts(&self) -> Option<ProtocolOpts> {
        self.protocol_opts.as_ref().map(|o| ProtocolOpts {
            toa: o.toa,
            toa_value: o.toa_value,
            websocket: o.websocket,
            proxy_protocol: o.proxy_protocol,
            gzip: o.gzip,
        })
    }

    pub fn health_check(&self) -> Option<HealthCheck> {
        self.health_check.as_ref().map(|h| HealthCheck {
            enable: h.enable,
            port: h.port,
        })
    }

    pub fn access_rules(&self) -> Vec<AccessControlRule> {
        self.access_control
            .as_ref()
            .map(|ac| {
                ac.rules
                    .iter()
                    .map(|r| AccessControlRule {
                        listener: r.listener.clone(),
                        directory: r.directory.clone(),
                        policy: r.policy.clone(),
                        cidr_ip: r.cidr_ip.clone(),
                        note: r.note.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn access_enabled(&self) -> bool {
        self.access_control.as_ref().is_some_and(|ac| ac.enable)
    }

    pub fn create_request(&self) -> CreateAcceleratorRequest {
        CreateAcceleratorRequest {
            accelerator_name: self.accelerator_name.clone(),
            charge_type: self.charge_type.clone(),
            domain: self.domain(),
            certificate_id: self.certificate_id.clone(),
            origin: self.origin(),
            accelerate_regions: self.regions(),
            l4_listeners: self.l4(),
            l7_listeners: self.l7(),
            protocol_opts: self.protocol_opts(),
            health_check: self.health_check(),
            resource_group_id: self.resource_group_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn config(value: Value) -> AcceleratorConfig {
        let data = ResourceData::from_value(value).unwrap();
        AcceleratorConfig::from_data(&data).unwrap()
    }

    fn base() -> Value {
        json!({
            "charge_type": "ByBandwidth95",
            "domain": {"domain": "example.com"},
            "origin": {"origin_region_id": "asia-east-1", "origin": ["10.0.0.8"]},
            "accelerate_regions": [{"accelerate_region_id": "europe-west-1"}],
            "l7_listeners": [{"protocol": "http", "port": 80}],
        })
    }

    #[test]
    fn tcp_port_conflict_spans_l4_and_l7() {
        let mut v = base();
        v["l4_listeners"] = json!([{"protocol": "tcp", "port": 80}]);
        let err = config(v).validate().unwrap_err();
        assert_eq!(err.to_string(), "tcp port conflict in 80");
    }

    #[test]
    fn udp_ports_do_not_collide_with_tcp() {
        let mut v = base();
        v["l4_listeners"] = json!([
            {"protocol": "tcp", "port": 53},
            {"protocol": "udp", "port": 53},
        ]);
        v["l7_listeners"] = json!([]);
        config(v).validate().unwrap();
    }

    #[test]
    fn overlapping_ranges_report_the_overlap_start() {
        let mut v = base();
        v["l7_listeners"] = json!([
            {"protocol": "http", "port_range": "8000/8080"},
            {"protocol": "https", "port_range": "8050/8100"},
        ]);
        let err = config(v).validate().unwrap_err();
        assert_eq!(err.to_string(), "tcp port conflict in 8050");
    }

    #[test]
    fn ip_accelerator_rejects_layer7_features() {
        let mut v = base();
        v.as_object_mut().unwrap().remove("domain");
        let err = config(v).validate().unwrap_err();
        assert!(err.to_string().contains("l7 listeners require a domain"));

        let v = json!({
            "charge_type": "ByBandwidth95",
            "origin": {"origin_region_id": "asia-east-1", "origin": ["10.0.0.8"]},
            "accelerate_regions": [{"accelerate_region_id": "europe-west-1"}],
            "l4_listeners": [{"protocol": "tcp", "port": 22}],
            "protocol_opts": {"gzip": true},
        });
        let err = config(v).validate().unwrap_err();
        assert!(err.to_string().contains("gzip requires a domain"));
    }

    #[test]
    fn relate_domains_must_not_repeat_the_main_domain() {
        let mut v = base();
        v["domain"] = json!({
            "domain": "example.com",
            "relate_domains": ["example.com"],
        });
        assert!(config(v).validate().is_err());
    }

    #[test]
    fn access_rule_listener_must_be_declared() {
        let mut v = base();
        v["access_control"] = json!({"enable": true, "rules": [
            {"listener": "tcp:81", "policy": "accept", "cidr_ip": "10.0.0.0/8"},
        ]});
        let err = config(v).validate().unwrap_err();
        assert!(err.to_string().contains("does not match a declared listener"));
    }

    #[test]
    fn layer4_rules_require_root_directory() {
        let mut v = base();
        v["l4_listeners"] = json!([{"protocol": "tcp", "port": 22}]);
        v["access_control"] = json!({"enable": true, "rules": [
            {"listener": "tcp:22", "directory": "/admin",
             "policy": "drop", "cidr_ip": "10.0.0.0/8"},
        ]});
        let err = config(v).validate().unwrap_err();
        assert!(err.to_string().contains("must use directory"));
    }

    #[test]
    fn http_rule_may_scope_a_directory() {
        let mut v = base();
        v["access_control"] = json!({"enable": true, "rules": [
            {"listener": "http:80", "directory": "/admin",
             "policy": "drop", "cidr_ip": "203.0.113.7"},
        ]});
        config(v).validate().unwrap();
    }

    #[test]
    fn health_check_port_must_match_a_single_port_tcp_listener() {
        let mut v = base();
        v["health_check"] = json!({"enable": true, "port": 8080});
        let err = config(v).validate().unwrap_err();
        assert!(err.to_string().contains("does not match a single-port"));

        let mut v = base();
        v["health_check"] = json!({"enable": true, "port": 80});
        config(v).validate().unwrap();
    }

    #[test]
    fn toa_and_proxy_protocol_are_mutually_exclusive() {
        let mut v = base();
        v["protocol_opts"] = json!({"toa": true, "proxy_protocol": true});
        assert!(config(v).validate().is_err());
    }

    #[test]
    fn at_least_one_listener_is_required() {
        let mut v = base();
        v["l7_listeners"] = json!([]);
        assert!(config(v).validate().is_err());
    }
}
