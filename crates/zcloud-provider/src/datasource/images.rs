//! Image catalog listing.

use crate::context::Context;
use crate::datasource::util::{finish, matches, name_filter, PAGE_SIZE};
use crate::error::Result;
use crate::schema::{DataSource, ResourceData};
use async_trait::async_trait;
use serde_json::{json, Value};
use zcloud_core::pager::{fetch_all_pages, Page};
use zcloud_sdk::image::DescribeImagesRequest;

pub struct Images;

#[async_trait]
impl DataSource for Images {
    fn type_name(&self) -> &'static str {
        "zcloud_images"
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = name_filter(data)?;
        let image_ids = data.get_string_list("ids");
        let image_type = data.get_string("image_type");
        let category = data.get_string("category");
        let os_type = data.get_string("os_type");
        let zone_id = data.get_string("zone_id");

        let images = fetch_all_pages(PAGE_SIZE, |page| {
            let req = DescribeImagesRequest {
                image_ids: image_ids.clone(),
                image_type: image_type.clone(),
                category: category.clone(),
                os_type: os_type.clone(),
                zone_id: zone_id.clone(),
                page_num: page as i64,
                page_size: PAGE_SIZE as i64,
                ..Default::default()
            };
            async move {
                let resp = ctx.client.describe_images(&req).await?;
                Ok::<_, zcloud_sdk::SdkError>(Page {
                    total_count: resp.total_count,
                    items: resp.data_set,
                })
            }
        })
        .await?;

        let mut ids = Vec::new();
        let mut items: Vec<Value> = Vec::new();
        for i in images {
            if !matches(&filter, &i.image_name) {
                continue;
            }
            ids.push(i.image_id.clone());
            items.push(json!({
                "image_id": i.image_id,
                "image_name": i.image_name,
                "image_type": i.image_type,
                "image_description": i.image_description,
                "image_size": i.image_size,
                "category": i.category,
                "os_type": i.os_type,
                "instance_id": i.instance_id,
                "image_status": i.image_status,
            }));
        }
        finish(data, "images", &ids, items).await
    }
}
