use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::QueryKind;
use crate::error::QueryError;
use crate::immich::assets::AssetRecord;

/// Snapshot published by the refresh task. Replaced whole on every cycle.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// Displayable assets in server order. Only IMAGE records.
    pub assets: Arc<Vec<AssetRecord>>,
    /// Why the most recent cycle did not produce a fresh list, if it didn't.
    pub last_error: Option<Arc<QueryError>>,
    /// When a list was last published. `None` until the first publish.
    pub last_updated: Option<DateTime<Utc>>,
}

impl RefreshState {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Cursor owned by the rotation task.
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    pub current_index: usize,
    /// Asset the cursor resolved to the last time it moved.
    pub current_asset_id: Option<String>,
    /// Last preview that downloaded successfully.
    pub current_image: Option<Bytes>,
}

/// Descriptive attributes for the slide on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideAttributes {
    pub asset_id: String,
    pub filename: Option<String>,
    pub captured_at: Option<String>,
    pub total_count: usize,
    /// One-based position within the published list.
    pub position: usize,
    pub configured_mode: QueryKind,
}

impl SlideAttributes {
    /// Resolve `index` against `assets`, clamping to the last entry.
    pub fn describe(assets: &[AssetRecord], index: usize, mode: QueryKind) -> Option<Self> {
        let last = assets.len().checked_sub(1)?;
        let idx = index.min(last);
        let asset = &assets[idx];
        Some(Self {
            asset_id: asset.id.clone(),
            filename: asset.original_file_name.clone(),
            captured_at: asset.taken_at().map(str::to_owned),
            total_count: assets.len(),
            position: idx + 1,
            configured_mode: mode,
        })
    }
}
