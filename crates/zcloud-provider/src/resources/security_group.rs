//! Security group reconciler.

use crate::context::Context;
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, ResourceHandler};
use async_trait::async_trait;
use serde_json::json;
use zcloud_core::retry::retry;
use zcloud_sdk::sg::{
    CreateSecurityGroupRequest, ModifySecurityGroupsAttributeRequest, SecurityGroupInfo,
};

const RESOURCE: &str = "security group";

pub struct SecurityGroup;

impl SecurityGroup {
    fn flatten(data: &mut ResourceData, info: &SecurityGroupInfo) -> Result<()> {
        data.set("security_group_name", &info.security_group_name)?;
        data.set("description", &info.description)?;
        data.set("is_default", info.is_default)?;
        data.set("instance_ids", &info.instance_ids)?;
        data.set(
            "rule_infos",
            info.rule_infos
                .iter()
                .map(|r| {
                    json!({
                        "direction": r.direction,
                        "policy": r.policy,
                        "ip_protocol": r.ip_protocol,
                        "port_range": r.port_range,
                        "cidr_ip": r.cidr_ip,
                    })
                })
                .collect::<Vec<_>>(),
        )?;
        data.set("create_time", &info.create_time)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for SecurityGroup {
    fn type_name(&self) -> &'static str {
        "zcloud_security_group"
    }

    fn validate(&self, data: &ResourceData) -> Result<()> {
        data.require_string("security_group_name")?;
        Ok(())
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        let req = CreateSecurityGroupRequest {
            security_group_name: data.require_string("security_group_name")?,
            description: data.get_string("description"),
        };
        let resp = retry(&ctx.write_retry(), || async {
            ctx.client.create_security_group(&req).await
        })
        .await?;
        data.set_id(&resp.security_group_id);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let info = retry(&ctx.read_retry(), || async {
            ctx.client.describe_security_group(&id).await
        })
        .await?;
        match info {
            None => {
                data.clear_id();
                Ok(())
            }
            Some(info) => Self::flatten(data, &info),
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<()> {
        let id = data.require_id()?.to_string();
        if prior.changed(data, "security_group_name") || prior.changed(data, "description") {
            let req = ModifySecurityGroupsAttributeRequest {
                security_group_ids: vec![id],
                security_group_name: data.get_string("security_group_name"),
                description: data.get_string("description"),
            };
            retry(&ctx.write_retry(), || async {
                ctx.client.modify_security_groups_attribute(&req).await
            })
            .await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();

        // refuse to delete a group that still fronts instances
        if let Some(info) = ctx.client.describe_security_group(&id).await? {
            if !info.instance_ids.is_empty() {
                return Err(ProviderError::InUse {
                    resource: RESOURCE,
                    id,
                    reason: format!("{} instance(s) still associated", info.instance_ids.len()),
                });
            }
        }

        let deleted = retry(&ctx.write_retry(), || async {
            ctx.client.delete_security_group(&id).await
        })
        .await;
        match deleted {
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

    #[tokio::test(start_paused = true)]
    async fn create_reads_back_rules() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("CreateSecurityGroup", json!({"SecurityGroupId": "sg-1"}));
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "SecurityGroupName": "web",
                "RuleInfos": [{
                    "Direction": "ingress", "Policy": "accept",
                    "IpProtocol": "tcp", "PortRange": "22/22",
                    "CidrIp": "0.0.0.0/0",
                }],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data =
            ResourceData::from_value(json!({"security_group_name": "web"})).unwrap();
        SecurityGroup.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("sg-1"));
        let rules = data.attrs().get("rule_infos").unwrap().as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["port_range"], "22/22");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refuses_group_in_use() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeSecurityGroups",
            json!({"TotalCount": 1, "DataSet": [{
                "SecurityGroupId": "sg-1",
                "InstanceIds": ["i-1", "i-2"],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new().with_id("sg-1");
        let err = SecurityGroup.delete(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::InUse { .. }));
    }
}
