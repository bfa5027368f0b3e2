//! Accelerator certificate listing. The regex filter applies to the
//! certificate label.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::zga::DescribeCertificatesRequest;

pub struct ZgaCertificates;

#[async_trait]
impl DataSource for ZgaCertificates {
    fn type_name(&self) -> &'static str {
        "zcloud_zga_certificates"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let certificate_ids = data.get_string_list("ids");
        let certificate_label = data.get_string("certificate_label");
        let san = data.get_string("san");
        let expired = data.get_bool("expired");

        let certificates = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeCertificatesRequest {
                certificate_ids: certificate_ids.clone(),
                certificate_label: certificate_label.clone(),
                san: san.clone(),
                expired,
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
            };
            async move {
                let resp = ctx.client.describe_certificates(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for c in certificates {
            if !matches(&filter, &c.certificate_label) {
                continue;
            }
            ids.push(c.certificate_id.clone());
            items.push(json!({
                "certificate_id": c.certificate_id,
                "certificate_label": c.certificate_label,
                "common_name": c.common_name,
                "san": c.san,
                "issuer": c.issuer,
                "fingerprint": c.fingerprint,
                "start_time": c.start_time,
                "end_time": c.end_time,
                "expired": c.expired,
                "create_time": c.create_time,
            }));
        }
        finish(data, "certificates", &ids, items).await
    }
}
