//! Subnet listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::vpc::DescribeSubnetsRequest;

pub struct Subnets;

#[async_trait]
impl DataSource for Subnets {
    fn type_name(&self) -> &'static str {
        "zcloud_subnets"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let subnet_ids = data.get_string_list("ids");
        let zone_id = data.get_string("zone_id");
        let vpc_id = data.get_string("vpc_id");

        let subnets = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeSubnetsRequest {
                subnet_ids: subnet_ids.clone(),
                zone_id: zone_id.clone(),
                vpc_id: vpc_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_subnets(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for s in subnets {
            if !matches(&filter, &s.subnet_name) {
                continue;
            }
            ids.push(s.subnet_id.clone());
            items.push(json!({
                "subnet_id": s.subnet_id,
                "subnet_name": s.subnet_name,
                "zone_id": s.zone_id,
                "cidr_block": s.cidr_block,
                "vpc_id": s.vpc_id,
                "instance_ids": s.instance_ids,
                "resource_group_id": s.resource_group_id,
                "subnet_status": s.subnet_status,
                "create_time": s.create_time,
            }));
        }
        finish(data, "subnets", &ids, items).await
    }
}
