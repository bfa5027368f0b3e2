//! DDoS-protected IP listing.

use crate::context::Context;
use crate::datasource::util::{finish, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::ddos::DescribeDdosIpsRequest;

pub struct DdosIps;

#[async_trait]
impl DataSource for DdosIps {
    fn type_name(&self) -> &'static str {
        "zcloud_ddos_ips"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let ddos_ip_ids = data.get_string_list("ids");
        let zone_id = data.get_string("zone_id");
        let instance_id = data.get_string("instance_id");
        let ip_address = data.get_string("ip_address");

        let addresses = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeDdosIpsRequest {
                ddos_ip_ids: ddos_ip_ids.clone(),
                zone_id: zone_id.clone(),
                instance_id: instance_id.clone(),
                ip_address: ip_address.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
            };
            async move {
                let resp = ctx.client.describe_ddos_ips(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for d in addresses {
            ids.push(d.ddos_ip_id.clone());
            items.push(json!({
                "ddos_ip_id": d.ddos_ip_id,
                "ip_address": d.ip_address,
                "zone_id": d.zone_id,
                "ddos_ip_charge_type": d.ddos_ip_charge_type,
                "period": d.period,
                "instance_id": d.instance_id,
                "instance_name": d.instance_name,
                "resource_group_id": d.resource_group_id,
                "ddos_ip_status": d.ddos_ip_status,
                "create_time": d.create_time,
                "expired_time": d.expired_time,
            }));
        }
        finish(data, "ddos_ips", &ids, items).await
    }
}
