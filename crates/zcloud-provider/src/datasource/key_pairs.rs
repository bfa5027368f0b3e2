//! SSH key pair listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::keypair::DescribeKeyPairsRequest;

pub struct KeyPairs;

#[async_trait]
impl DataSource for KeyPairs {
    fn type_name(&self) -> &'static str {
        "zcloud_key_pairs"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let key_ids = data.get_string_list("ids");
        let key_name = data.get_string("key_name");

        let keys = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeKeyPairsRequest {
                key_ids: key_ids.clone(),
                key_name: key_name.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
            };
            async move {
                let resp = ctx.client.describe_key_pairs(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for k in keys {
            if !matches(&filter, &k.key_name) {
                continue;
            }
            ids.push(k.key_id.clone());
            items.push(json!({
                "key_id": k.key_id,
                "key_name": k.key_name,
                "public_key": k.public_key,
                "key_description": k.key_description,
                "create_time": k.create_time,
            }));
        }
        finish(data, "key_pairs", &ids, items).await
    }
}
