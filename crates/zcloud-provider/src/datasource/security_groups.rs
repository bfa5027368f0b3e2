//! Security group listing, rules included.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::sg::DescribeSecurityGroupsRequest;

pub struct SecurityGroups;

#[async_trait]
impl DataSource for SecurityGroups {
    fn type_name(&self) -> &'static str {
        "zcloud_security_groups"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let security_group_ids = data.get_string_list("ids");
        let instance_id = data.get_string("instance_id");

        let groups = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeSecurityGroupsRequest {
                security_group_ids: security_group_ids.clone(),
                instance_id: instance_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_security_groups(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for g in groups {
            if !matches(&filter, &g.security_group_name) {
                continue;
            }
            ids.push(g.security_group_id.clone());
            let rules: Vec<Value> = g
                .rule_infos
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
                .collect();
            items.push(json!({
                "security_group_id": g.security_group_id,
                "security_group_name": g.security_group_name,
                "description": g.description,
                "is_default": g.is_default,
                "instance_ids": g.instance_ids,
                "rule_infos": rules,
                "create_time": g.create_time,
            }));
        }
        finish(data, "security_groups", &ids, items).await
    }
}
