//! VPC listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::vpc::DescribeVpcsRequest;

pub struct Vpcs;

#[async_trait]
impl DataSource for Vpcs {
    fn type_name(&self) -> &'static str {
        "zcloud_vpcs"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let vpc_ids = data.get_string_list("ids");
        let cidr_block = data.get_string("cidr_block");

        let vpcs = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeVpcsRequest {
                vpc_ids: vpc_ids.clone(),
                cidr_block: cidr_block.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_vpcs(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for v in vpcs {
            if !matches(&filter, &v.vpc_name) {
                continue;
            }
            ids.push(v.vpc_id.clone());
            items.push(json!({
                "vpc_id": v.vpc_id,
                "vpc_name": v.vpc_name,
                "vpc_region_id": v.vpc_region_id,
                "cidr_block": v.cidr_block,
                "subnet_ids": v.subnet_ids,
                "resource_group_id": v.resource_group_id,
                "vpc_status": v.vpc_status,
                "create_time": v.create_time,
            }));
        }
        finish(data, "vpcs", &ids, items).await
    }
}
