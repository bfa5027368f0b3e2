//! Security group rule reconciler.
//!
//! The server assigns no IDs to rules, so the resource is content-addressed:
//! the ID is the base64-encoded JSON of the full rule tuple. Reads decode
//! the ID and look for a matching rule in the parent group's rule list,
//! tolerating the server's habit of echoing a single port `p` back as `p/p`.

use crate::context::Context;
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zcloud_core::ids::{decode_rule_id, rule_id};
use zcloud_core::retry::retry;
use zcloud_core::validate::{parse_port_range, validate_cidr_network, validate_port_range};
use zcloud_sdk::sg::{self, RuleInfo, SecurityGroupRuleRequest};

const PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "all"];

/// The full rule tuple. Field order is the ID encoding order and must not
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTuple {
    pub security_group_id: String,
    pub policy: String,
    pub cidr_ip: String,
    pub ip_protocol: String,
    pub port_range: String,
    pub direction: String,
}

impl RuleTuple {
    fn from_data(data: &ResourceData) -> Result<Self> {
        Ok(Self {
            security_group_id: data.require_string("security_group_id")?,
            policy: data.require_string("policy")?,
            cidr_ip: data.require_string("cidr_ip")?,
            ip_protocol: data.require_string("ip_protocol")?,
            port_range: data.require_string("port_range")?,
            direction: data.require_string("direction")?,
        })
    }

    fn request(&self) -> SecurityGroupRuleRequest {
        SecurityGroupRuleRequest {
            security_group_id: self.security_group_id.clone(),
            direction: self.direction.clone(),
            policy: self.policy.clone(),
            ip_protocol: self.ip_protocol.clone(),
            port_range: self.port_range.clone(),
            cidr_ip: self.cidr_ip.clone(),
        }
    }

    fn matches(&self, rule: &RuleInfo) -> bool {
        self.direction == rule.direction
            && self.policy == rule.policy
            && self.ip_protocol.eq_ignore_ascii_case(&rule.ip_protocol)
            && self.cidr_ip == rule.cidr_ip
            && port_ranges_equal(&self.port_range, &rule.port_range)
    }
}

/// `22` and `22/22` describe the same range.
fn port_ranges_equal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (parse_port_range(a), parse_port_range(b)) {
        (Ok(ra), Ok(rb)) => ra == rb,
        _ => false,
    }
}

pub struct SecurityGroupRule;

#[async_trait]
impl ResourceHandler for SecurityGroupRule {
    fn type_name(&self) -> &'static str {
        "zcloud_security_group_rule"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        let direction = data.require_string("direction")?;
        if direction != sg::DIRECTION_INGRESS && direction != sg::DIRECTION_EGRESS {
            return Err(ProviderError::invalid(
                "direction",
                format!("must be ingress or egress, got {direction:?}"),
            ));
        }
        let policy = data.require_string("policy")?;
        if policy != sg::POLICY_ACCEPT && policy != sg::POLICY_DROP {
            return Err(ProviderError::invalid(
                "policy",
                format!("must be accept or drop, got {policy:?}"),
            ));
        }
        let protocol = data.require_string("ip_protocol")?;
        if !PROTOCOLS.contains(&protocol.to_ascii_lowercase().as_str()) {
            return Err(ProviderError::invalid(
                "ip_protocol",
                format!("unsupported protocol {protocol:?}"),
            ));
        }
        let port_range = data.require_string("port_range")?;
        if protocol.eq_ignore_ascii_case("tcp") || protocol.eq_ignore_ascii_case("udp") {
            validate_port_range(&port_range)?;
        }
        let cidr = data.require_string("cidr_ip")?;
        validate_cidr_network(&cidr)?;
        Ok(())
    }

    /// Every field participates in the rule's identity.
    fn requires_replacement(
        &self,
        prior: &ResourceData,
        planned: &ResourceData,
    ) -> Result<Vec<&'static str>> {
        const FIELDS: &[&str] = &[
            "security_group_id",
            "direction",
            "policy",
            "ip_protocol",
            "port_range",
            "cidr_ip",
        ];
        let mut forced = Vec::new();
        for field in FIELDS {
            if prior.contains(field) && prior.changed(planned, field) {
                forced.push(*field);
            }
        }
        Ok(forced)
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let tuple = RuleTuple::from_data(data)?;
        let req = tuple.request();
        retry(&ctx.write_retry(), || async {
            ctx.client.authorize_security_group_rule(&req).await
        })
        .await?;
        data.set_id(rule_id(&tuple)?);
        Ok(())
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let tuple: RuleTuple = decode_rule_id(&id)?;
        let group = retry(&ctx.read_retry(), || async {
            ctx.client
                .describe_security_group(&tuple.security_group_id)
                .await
        })
        .await?;
        let Some(group) = group else {
            data.clear_id();
            return Ok(());
        };
        match group.rule_infos.iter().find(|r| tuple.matches(r)) {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(rule) => {
                data.set("security_group_id", &tuple.security_group_id)?;
                data.set("direction", &rule.direction)?;
                data.set("policy", &rule.policy)?;
                data.set("ip_protocol", &rule.ip_protocol)?;
                // keep the configured spelling when it describes the same range
                if !port_ranges_equal(
                    &data.get_string("port_range").unwrap_or_default(),
                    &rule.port_range,
                ) {
                    data.set("port_range", &rule.port_range)?;
                }
                data.set("cidr_ip", &rule.cidr_ip)?;
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()> {
        // all fields force replacement; nothing to change in place
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let tuple: RuleTuple = decode_rule_id(&id)?;
        let req = tuple.request();
        let revoked = retry(&ctx.write_retry(), || async {
            ctx.client.revoke_security_group_rule(&req).await
        })
        .await;
        match revoked {
            Ok(_) => {}
            Err(e) => {
                let inner = ProviderError::from(e);
                if !inner.is_not_found() {
                    return Err(inner);
                }
            }
        }
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, mock_client};
    use serde_json::json;
    use std::sync::Arc;
    use zcloud_sdk::client::testing::MockTransport;

    fn desired() -> ResourceData {
        ResourceData::from_value(json!({
            "security_group_id": "sg-1",
            "direction": "ingress",
            "policy": "accept",
            "ip_protocol": "tcp",
            "port_range": "22",
            "cidr_ip": "0.0.0.0/0",
        }))
        .unwrap()
    }

    #[test]
    fn id_round_trips_through_base64_json() {
        let tuple = RuleTuple::from_data(&desired()).unwrap();
        let id = rule_id(&tuple).unwrap();
        let back: RuleTuple = decode_rule_id(&id).unwrap();
        assert_eq!(back, tuple);
    }

    #[test]
    fn rejects_bad_direction_and_policy() {
        let mut data = desired();
        data.set("direction", "inbound").unwrap();
        assert!(SecurityGroupRule.validate(&data).is_err());

        let mut data = desired();
        data.set("policy", "deny").unwrap();
        assert!(SecurityGroupRule.validate(&data).is_err());
    }

    #[test]
    fn single_port_matches_server_echo() {
        let tuple = RuleTuple::from_data(&desired()).unwrap();
        let echoed = RuleInfo {
            direction: "ingress".into(),
            policy: "accept".into(),
            ip_protocol: "tcp".into(),
            port_range: "22/22".into(),
            cidr_ip: "0.0.0.0/0".into(),
        };
        assert!(tuple.matches(&echoed));
    }

    #[tokio::test(start_paused = true)]
    async fn read_keeps_configured_port_spelling() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "RuleInfos": [{
                    "Direction": "ingress", "Policy": "accept",
                    "IpProtocol": "tcp", "PortRange": "22/22",
                    "CidrIp": "0.0.0.0/0",
                }],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        let tuple = RuleTuple::from_data(&data).unwrap();
        data.set_id(rule_id(&tuple).unwrap());
        SecurityGroupRule.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.get_string("port_range").as_deref(), Some("22"));
        assert!(data.id().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn read_clears_id_when_rule_was_revoked_out_of_band() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "RuleInfos": [],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        let tuple = RuleTuple::from_data(&data).unwrap();
        data.set_id(rule_id(&tuple).unwrap());
        SecurityGroupRule.read(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_tolerates_missing_rule() {
        let mock = Arc::new(MockTransport::new());
        mock.push_err("RevokeSecurityGroupRule", "OPERATION_FAILED_RESOURCE_NOT_FOUND");
        let ctx = context_with(mock_client(&mock));

        let mut data = desired();
        let tuple = RuleTuple::from_data(&data).unwrap();
        data.set_id(rule_id(&tuple).unwrap());
        SecurityGroupRule.delete(&ctx, &mut data).await.unwrap();
        assert!(data.id().is_none());
    }
}
