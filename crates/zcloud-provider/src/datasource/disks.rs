//! Cloud disk listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::disk::DescribeDisksRequest;

pub struct Disks;

#[async_trait]
impl DataSource for Disks {
    fn type_name(&self) -> &'static str {
        "zcloud_disks"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let disk_ids = data.get_string_list("ids");
        let zone_id = data.get_string("zone_id");
        let disk_type = data.get_string("disk_type");
        let instance_id = data.get_string("instance_id");

        let disks = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeDisksRequest {
                disk_ids: disk_ids.clone(),
                zone_id: zone_id.clone(),
                disk_type: disk_type.clone(),
                instance_id: instance_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_disks(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for d in disks {
            if !matches(&filter, &d.disk_name) {
                continue;
            }
            ids.push(d.disk_id.clone());
            items.push(json!({
                "disk_id": d.disk_id,
                "disk_name": d.disk_name,
                "zone_id": d.zone_id,
                "disk_size": d.disk_size,
                "disk_type": d.disk_type,
                "disk_category": d.disk_category,
                "disk_charge_type": d.disk_charge_type,
                "period": d.period,
                "portable": d.portable,
                "instance_id": d.instance_id,
                "instance_name": d.instance_name,
                "disk_status": d.disk_status,
                "create_time": d.create_time,
                "expired_time": d.expired_time,
            }));
        }
        finish(data, "disks", &ids, items).await
    }
}
