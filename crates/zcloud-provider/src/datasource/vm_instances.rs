//! Virtual machine instance listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::vm::DescribeInstancesRequest;

pub struct VmInstances;

#[async_trait]
impl DataSource for VmInstances {
    fn type_name(&self) -> &'static str {
        "zcloud_vm_instances"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let instance_ids = data.get_string_list("ids");
        let zone_id = data.get_string("zone_id");
        let instance_type_id = data.get_string("instance_type_id");
        let image_id = data.get_string("image_id");
        let subnet_id = data.get_string("subnet_id");
        let resource_group_id = data.get_string("resource_group_id");

        let instances = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeInstancesRequest {
                instance_ids: instance_ids.clone(),
                zone_id: zone_id.clone(),
                instance_type_id: instance_type_id.clone(),
                image_id: image_id.clone(),
                subnet_id: subnet_id.clone(),
                resource_group_id: resource_group_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.vm_describe_instances(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for i in instances {
            if !matches(&filter, &i.instance_name) {
                continue;
            }
            ids.push(i.instance_id.clone());
            let system_disk = i.system_disk.as_ref().map(|d| {
                json!({"disk_size": d.disk_size, "disk_category": d.disk_category})
            });
            items.push(json!({
                "instance_id": i.instance_id,
                "instance_name": i.instance_name,
                "zone_id": i.zone_id,
                "instance_type_id": i.instance_type_id,
                "image_id": i.image_id,
                "image_name": i.image_name,
                "instance_charge_type": i.instance_charge_type,
                "period": i.period,
                "internet_charge_type": i.internet_charge_type,
                "internet_max_bandwidth_out": i.internet_max_bandwidth_out,
                "subnet_id": i.subnet_id,
                "resource_group_id": i.resource_group_id,
                "key_id": i.key_id,
                "system_disk": system_disk,
                "security_group_ids": i.security_group_ids,
                "public_ip_addresses": i.public_ip_addresses,
                "private_ip_addresses": i.private_ip_addresses,
                "ipv6_addresses": i.ipv6_addresses,
                "instance_status": i.instance_status,
                "create_time": i.create_time,
                "expired_time": i.expired_time,
            }));
        }
        finish(data, "instances", &ids, items).await
    }
}
