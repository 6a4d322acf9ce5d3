//! Turns a configured [`QueryMode`] into the matching server call.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::error;

use crate::config::QueryMode;
use crate::error::{ConfigurationError, QueryError, RemoteError};
use crate::immich::assets::{AssetRecord, normalize};
use crate::immich::client::ImmichClient;

const FAVORITE_FILTER: &str = "isFavorite";

/// Issue the request for `mode` and return the normalized records.
///
/// `default_count` applies when the mode carries no `count` of its own. No
/// retries happen here; the next scheduled refresh is the retry.
pub async fn fetch(
    client: &ImmichClient,
    mode: &QueryMode,
    default_count: u32,
) -> Result<Vec<AssetRecord>, QueryError> {
    let kind = mode.kind();
    let count = mode.count().unwrap_or(default_count);

    let body = match mode {
        QueryMode::Random { .. } => {
            let query = [("count".to_string(), count.to_string())];
            client.get_json(&["api", "assets", "random"], &query).await
        }
        QueryMode::Recent { params, .. } => {
            client
                .get_json(&["api", "assets"], &page_query(count, params, false))
                .await
        }
        QueryMode::Favorites { params, .. } => {
            client
                .get_json(&["api", "assets"], &page_query(count, params, true))
                .await
        }
        QueryMode::Album { album_id } => {
            let Some(album_id) = album_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
            else {
                error!("album mode selected but no album-id configured");
                return Err(ConfigurationError::MissingAlbumId.into());
            };
            client.get_json(&["api", "albums", album_id], &[]).await
        }
        QueryMode::MetadataSearch { filters, .. } => {
            client
                .post_json(&["api", "search", "metadata"], &search_body(count, filters))
                .await
        }
    }
    .map_err(|source| RemoteError { mode: kind, source })?;

    Ok(normalize(body))
}

/// Query string for a first-page listing. Pass-through params override the
/// paging defaults; blank values are skipped.
pub fn page_query(
    count: u32,
    params: &BTreeMap<String, Value>,
    favorites_only: bool,
) -> Vec<(String, String)> {
    let mut query = BTreeMap::new();
    query.insert("page".to_string(), "1".to_string());
    query.insert("size".to_string(), count.to_string());
    for (key, value) in params {
        if let Some(value) = query_value(value) {
            query.insert(key.clone(), value);
        }
    }
    if favorites_only {
        query.insert(FAVORITE_FILTER.to_string(), "true".to_string());
    }
    query.into_iter().collect()
}

/// Body for the metadata search: `size` plus every non-blank filter.
pub fn search_body(count: u32, filters: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("size".to_string(), Value::from(count));
    for (key, value) in filters {
        if !is_blank(value) {
            body.insert(key.clone(), value.clone());
        }
    }
    Value::Object(body)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        v if is_blank(v) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
