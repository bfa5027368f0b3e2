//! Global accelerator listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::zga::DescribeAcceleratorsRequest;

pub struct ZgaAccelerators;

#[async_trait]
impl DataSource for ZgaAccelerators {
    fn type_name(&self) -> &'static str {
        "zcloud_zga_accelerators"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let accelerator_ids = data.get_string_list("ids");
        let domain = data.get_string("domain");
        let origin = data.get_string("origin");
        let accelerate_region_id = data.get_string("accelerate_region_id");
        let vip = data.get_string("vip");
        let certificate_id = data.get_string("certificate_id");

        let accelerators = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeAcceleratorsRequest {
                accelerator_ids: accelerator_ids.clone(),
                domain: domain.clone(),
                origin: origin.clone(),
                accelerate_region_id: accelerate_region_id.clone(),
                vip: vip.clone(),
                certificate_id: certificate_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_accelerators(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for a in accelerators {
            if !matches(&filter, &a.accelerator_name) {
                continue;
            }
            ids.push(a.accelerator_id.clone());
            let domain = a.domain.as_ref().map(|d| {
                json!({"domain": d.domain, "relate_domains": d.relate_domains})
            });
            let regions: Vec<Value> = a
                .accelerate_regions
                .iter()
                .map(|r| {
                    json!({
                        "accelerate_region_id": r.accelerate_region_id,
                        "bandwidth": r.bandwidth,
                        "vip": r.vip,
                    })
                })
                .collect();
            items.push(json!({
                "accelerator_id": a.accelerator_id,
                "accelerator_name": a.accelerator_name,
                "charge_type": a.charge_type,
                "domain": domain,
                "certificate_id": a.certificate_id,
                "cname": a.cname,
                "origin": {
                    "origin_region_id": a.origin.origin_region_id,
                    "origin": a.origin.origin,
                    "backup_origin": a.origin.backup_origin,
                },
                "accelerate_regions": regions,
                "resource_group_id": a.resource_group_id,
                "accelerator_status": a.accelerator_status,
                "create_time": a.create_time,
            }));
        }
        finish(data, "accelerators", &ids, items).await
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
    async fn lists_and_flattens_nested_blocks() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok(
            "DescribeAccelerators",
            json!({"TotalCount": 1, "DataSet": [{
                "AcceleratorId": "ga-1",
                "AcceleratorName": "edge",
                "AcceleratorStatus": "Accelerating",
                "Domain": {"Domain": "example.com"},
                "Origin": {"OriginRegionId": "asia-east-1", "Origin": ["10.0.0.8"]},
                "AccelerateRegions": [{"AccelerateRegionId": "europe-west-1", "Vip": "198.51.100.9"}],
            }]}),
        );
        let ctx = context_with(mock_client(&mock));

        let mut data = ResourceData::new();
        ZgaAccelerators.read(&ctx, &mut data).await.unwrap();
        let items: Vec<serde_json::Value> = data.get_block("accelerators").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["domain"]["domain"], "example.com");
        assert_eq!(items[0]["accelerate_regions"][0]["vip"], "198.51.100.9");
    }
}
