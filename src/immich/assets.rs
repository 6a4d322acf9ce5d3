//! Asset records as the photo server reports them, and the response-shape
//! normalization shared by every query mode.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Image,
    Video,
    /// AUDIO, OTHER, or anything newer than this client.
    #[default]
    #[serde(other)]
    Other,
}

/// One remote photo/video entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub local_date_time: Option<String>,
    #[serde(default)]
    pub file_created_at: Option<String>,
}

impl AssetRecord {
    pub fn is_image(&self) -> bool {
        self.asset_type == AssetType::Image
    }

    /// Capture time: local time when known, else the server's creation time.
    pub fn taken_at(&self) -> Option<&str> {
        self.local_date_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.file_created_at.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: String,
    pub album_name: String,
    #[serde(default)]
    pub asset_count: Option<u64>,
}

/// Unwrap whichever shape the server answered with into a flat record list.
///
/// Accepted shapes:
/// - a bare array of assets
/// - a paginated envelope `{"assets": {"items": [...]}}`
/// - an album object `{"assets": [...]}`
///
/// Anything else yields an empty list. Entries that cannot be read or carry
/// no id are dropped.
pub fn normalize(body: Value) -> Vec<AssetRecord> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("assets") {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut page)) => match page.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AssetRecord>(item) {
            Ok(record) if !record.id.is_empty() => Some(record),
            Ok(_) => {
                debug!("dropping asset record with empty id");
                None
            }
            Err(err) => {
                debug!(error = %err, "dropping unreadable asset record");
                None
            }
        })
        .collect()
}
