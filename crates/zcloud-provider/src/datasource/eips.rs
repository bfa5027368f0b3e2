//! Elastic IP listing. Addresses carry no name, so there is no regex
//! filter here.

use crate::context::Context;
use crate::datasource::util::{finish, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::eip::DescribeEipAddressesRequest;

pub struct Eips;

#[async_trait]
impl DataSource for Eips {
    fn type_name(&self) -> &'static str {
        "zcloud_eips"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let eip_ids = data.get_string_list("ids");
        let zone_id = data.get_string("zone_id");
        let instance_id = data.get_string("instance_id");
        let ip_address = data.get_string("ip_address");

        let addresses = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeEipAddressesRequest {
                eip_ids: eip_ids.clone(),
                zone_id: zone_id.clone(),
                instance_id: instance_id.clone(),
                ip_address: ip_address.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
            };
            async move {
                let resp = ctx.client.describe_eip_addresses(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for e in addresses {
            ids.push(e.eip_id.clone());
            items.push(json!({
                "eip_id": e.eip_id,
                "ip_address": e.ip_address,
                "zone_id": e.zone_id,
                "eip_charge_type": e.eip_charge_type,
                "period": e.period,
                "instance_id": e.instance_id,
                "instance_name": e.instance_name,
                "resource_group_id": e.resource_group_id,
                "eip_status": e.eip_status,
                "create_time": e.create_time,
                "expired_time": e.expired_time,
            }));
        }
        finish(data, "eips", &ids, items).await
    }
}
