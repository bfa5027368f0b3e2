//! Bare-metal instance listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::bmc::DescribeInstancesRequest;

pub struct BmcInstances;

#[async_trait]
impl DataSource for BmcInstances {
    fn type_name(&self) -> &'static str {
        "zcloud_bmc_instances"
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
                let resp = ctx.client.bmc_describe_instances(&req).await?;
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
            items.push(json!({
                "instance_id": i.instance_id,
                "instance_name": i.instance_name,
                "hostname": i.hostname,
                "zone_id": i.zone_id,
                "instance_type_id": i.instance_type_id,
                "image_id": i.image_id,
                "image_name": i.image_name,
                "instance_charge_type": i.instance_charge_type,
                "period": i.period,
                "internet_charge_type": i.internet_charge_type,
                "internet_max_bandwidth_out": i.internet_max_bandwidth_out,
                "traffic_package_size": i.traffic_package_size,
                "subnet_id": i.subnet_id,
                "resource_group_id": i.resource_group_id,
                "public_ip_addresses": i.public_ip_addresses,
                "private_ip_addresses": i.private_ip_addresses,
                "ipv6_addresses": i.ipv6_addresses,
                "ssh_keys": i.ssh_keys,
                "instance_status": i.instance_status,
                "create_time": i.create_time,
                "expired_time": i.expired_time,
            }));
        }
        finish(data, "instances", &ids, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, mock_client};
    use serde_json::json;
    use std::sync::Arc;
    use zcloud_core::ids::datasource_id;
    use zcloud_sdk::client::testing::MockTransport;

    #[tokio::test(start_paused = true)]
    async fn name_regex_narrows_the_result() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeInstances",
            json!({"TotalCount": 3, "DataSet": [
                {"InstanceId": "i-1", "InstanceName": "web-1"},
                {"InstanceId": "i-2", "InstanceName": "db-1"},
                {"InstanceId": "i-3", "InstanceName": "web-2"},
            ]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::from_value(json!({"name_regex": "^web-"})).unwrap();
        BmcInstances.read(&ctx, &mut data).await.unwrap();

        let items: Vec<serde_json::Value> = data.get_block("instances").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            data.id().unwrap(),
            datasource_id(&["i-1", "i-3"]).to_string()
        );
    }
}
