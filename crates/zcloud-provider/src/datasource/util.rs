//! Shared data-source plumbing: the name-regex filter, the stable identity
//! hash and the optional JSON output file.

use crate::error::{ProviderError, Result};
use crate::schema::ResourceData;
use regex::Regex;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zcloud_core::ids::datasource_id;

/// Page size used by every lister.
pub const PAGE_SIZE: u64 = 100;

/// Compile the optional `name_regex` filter. A bad pattern is a plan-time
/// error, not a server round trip.
pub fn name_filter(data: &ResourceData) -> Result<Option<Regex>> {
    match data.get_string("name_regex") {
        None => Ok(None),
        Some(pattern) => Regex::new(&pattern)
            .map(Some)
            .map_err(|e| ProviderError::invalid("name_regex", e.to_string())),
    }
}

pub fn matches(filter: &Option<Regex>, name: &str) -> bool {
    filter.as_ref().map_or(true, |re| re.is_match(name))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn output_error(path: &Path, source: std::io::Error) -> ProviderError {
    ProviderError::OutputFile {
        path: path.display().to_string(),
        source,
    }
}

/// Write the result list to `output_file` when configured. Any prior file
/// is removed first; the new file is indented JSON with mode 0422.
pub async fn write_output_file(data: &ResourceData, items: &[Value]) -> Result<()> {
    let Some(raw) = data.get_string("output_file") else {
        return Ok(());
    };
    let path = expand_home(&raw);
    let encoded = serde_json::to_vec_pretty(items)?;

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(output_error(&path, e)),
    }
    tokio::fs::write(&path, &encoded)
        .await
        .map_err(|e| output_error(&path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o422))
            .await
            .map_err(|e| output_error(&path, e))?;
    }
    Ok(())
}

/// Store the result list under `key` with the CRC32 identity as the
/// data-source ID, writing the output file first.
pub async fn finish(
    data: &mut ResourceData,
    key: &str,
    ids: &[String],
    items: Vec<Value>,
) -> Result<()> {
    data.set_id(datasource_id(ids).to_string());
    write_output_file(data, &items).await?;
    data.set(key, items)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_pattern_is_a_plan_error() {
        let data = ResourceData::from_value(json!({"name_regex": "["})).unwrap();
        assert!(name_filter(&data).is_err());
    }

    #[test]
    fn absent_pattern_matches_everything() {
        let data = ResourceData::new();
        let filter = name_filter(&data).unwrap();
        assert!(matches(&filter, "anything"));
    }

    #[tokio::test]
    async fn output_file_replaces_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "stale").unwrap();

        let data = ResourceData::from_value(json!({
            "output_file": path.to_str().unwrap(),
        }))
        .unwrap();
        let items = vec![json!({"instance_id": "i-1"})];
        write_output_file(&data, &items).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o422);
            // make the file readable again to check the content
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, items);
        assert!(content.contains('\n'));
    }

    #[tokio::test]
    async fn finish_sets_the_identity_hash() {
        let mut data = ResourceData::new();
        let ids = vec!["i-1".to_string(), "i-2".to_string()];
        finish(&mut data, "instances", &ids, vec![json!({}), json!({})])
            .await
            .unwrap();
        let id: i32 = data.id().unwrap().parse().unwrap();
        assert!(id >= 0);
        assert_eq!(
            id,
            zcloud_core::ids::datasource_id(&["i-1", "i-2"])
        );
    }
}
