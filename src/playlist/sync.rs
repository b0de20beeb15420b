//! Merge of a fresh enumeration into a persisted video list.

use std::collections::{HashMap, HashSet};

use super::model::VideoRecord;

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The new authoritative list, in fresh order.
    pub videos: Vec<VideoRecord>,
    /// Ids known before but absent from the fresh enumeration, in their
    /// previous order. These are not part of `videos`.
    pub dropped_ids: Vec<String>,
}

/// Merges `fresh` into `previous`.
///
/// Matched videos take title, url, thumbnail and availability from `fresh`
/// and keep download state and `added_at` from `previous`. A duration the
/// fresh record lacks is kept from `previous`. Unmatched fresh
/// videos are taken as-is. Previous videos missing from `fresh` are dropped
/// and reported in [`MergeOutcome::dropped_ids`].
#[must_use]
pub fn merge(previous: &[VideoRecord], fresh: Vec<VideoRecord>) -> MergeOutcome {
    let mut index: HashMap<&str, &VideoRecord> = previous
        .iter()
        .map(|video| (video.id.as_str(), video))
        .collect();
    let mut emitted: HashSet<String> = HashSet::with_capacity(fresh.len());
    let mut videos = Vec::with_capacity(fresh.len());

    for incoming in fresh {
        if !emitted.insert(incoming.id.clone()) {
            continue;
        }
        match index.remove(incoming.id.as_str()) {
            Some(known) => videos.push(VideoRecord {
                duration_seconds: incoming.duration_seconds.or(known.duration_seconds),
                downloaded: known.downloaded,
                download_path: known.download_path.clone(),
                download_status: known.download_status,
                added_at: known.added_at,
                ..incoming
            }),
            None => videos.push(incoming),
        }
    }

    let dropped_ids = previous
        .iter()
        .filter(|video| index.contains_key(video.id.as_str()))
        .map(|video| video.id.clone())
        .collect();

    MergeOutcome {
        videos,
        dropped_ids,
    }
}
