use crate::error::Result;
use crate::scanner::AttachmentCandidate;
use crate::storage::models::{Asset, Attachment};
use crate::storage::CatalogStore;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use tracing::debug;

const TEMP_SUFFIX_LENGTH: usize = 10;

/// A lesson found on disk, hashed and ready to be merged into the catalog,
/// together with the attachments that belong to its slot.
#[derive(Debug, Clone)]
pub struct DesiredAsset {
    pub asset: Asset,
    pub attachments: Vec<AttachmentCandidate>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub assets_added: usize,
    pub assets_updated: usize,
    pub assets_deleted: usize,
    pub attachments_added: usize,
    pub attachments_deleted: usize,
}

/// Merge the desired state of a course into the catalog.
///
/// Expected to run inside `CatalogStore::transaction`. On return every entry
/// of `desired` carries the id of its catalog row.
pub fn reconcile<S: CatalogStore>(
    store: &S,
    course_id: i64,
    desired: &mut [DesiredAsset],
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    reconcile_assets(store, course_id, desired, &mut stats)?;
    reconcile_attachments(store, course_id, desired, &mut stats)?;
    debug!(
        course_id,
        assets_added = stats.assets_added,
        assets_updated = stats.assets_updated,
        assets_deleted = stats.assets_deleted,
        attachments_added = stats.attachments_added,
        attachments_deleted = stats.attachments_deleted,
        "Reconciled course"
    );
    Ok(stats)
}

fn temp_suffix() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LENGTH)
        .map(char::from)
        .collect()
}

/// Pair each desired asset with at most one existing row of the same content
/// hash, preferring a row that already has the same path. Returns the match
/// per desired index and the rows left over.
fn match_by_hash(existing: Vec<Asset>, desired: &[DesiredAsset]) -> (Vec<Option<Asset>>, Vec<Asset>) {
    let mut by_hash: HashMap<String, Vec<Asset>> = HashMap::new();
    for asset in existing {
        by_hash.entry(asset.hash.clone()).or_default().push(asset);
    }

    let mut matches: Vec<Option<Asset>> = vec![None; desired.len()];

    for (i, d) in desired.iter().enumerate() {
        if let Some(rows) = by_hash.get_mut(&d.asset.hash) {
            if let Some(pos) = rows.iter().position(|row| row.path == d.asset.path) {
                matches[i] = Some(rows.remove(pos));
            }
        }
    }

    for (i, d) in desired.iter().enumerate() {
        if matches[i].is_some() {
            continue;
        }
        if let Some(rows) = by_hash.get_mut(&d.asset.hash) {
            if !rows.is_empty() {
                matches[i] = Some(rows.remove(0));
            }
        }
    }

    let leftover = by_hash.into_values().flatten().collect();
    (matches, leftover)
}

fn reconcile_assets<S: CatalogStore>(
    store: &S,
    course_id: i64,
    desired: &mut [DesiredAsset],
    stats: &mut ReconcileStats,
) -> Result<()> {
    let existing = store.list_assets(course_id)?;
    let (matches, to_delete) = match_by_hash(existing, desired);

    for asset in &to_delete {
        store.delete_asset(asset.id)?;
        stats.assets_deleted += 1;
    }

    // Rows whose metadata changed are first written under `path + suffix` so two
    // rows trading paths in the same scan never collide on the unique index.
    // The suffix is stripped once every staged row and every new row is written.
    let suffix = temp_suffix();
    let mut staged: Vec<usize> = Vec::new();
    let mut to_add: Vec<usize> = Vec::new();

    for (i, matched) in matches.iter().enumerate() {
        let existing = match matched {
            Some(existing) => existing,
            None => {
                to_add.push(i);
                continue;
            }
        };

        desired[i].asset.id = existing.id;
        if desired[i].asset == *existing {
            continue;
        }

        let mut interim = desired[i].asset.clone();
        interim.path.push_str(&suffix);
        store.update_asset(&interim)?;
        staged.push(i);
    }

    for i in to_add {
        store.create_asset(&mut desired[i].asset)?;
        stats.assets_added += 1;
    }

    for i in staged {
        store.update_asset(&desired[i].asset)?;
        stats.assets_updated += 1;
    }

    Ok(())
}

fn same_attachment(a: &Attachment, b: &Attachment) -> bool {
    a.course_id == b.course_id && a.asset_id == b.asset_id && a.title == b.title
}

/// Attachments are keyed by path and have no in-place update: any change,
/// including a new owning asset, is a delete followed by an add.
fn reconcile_attachments<S: CatalogStore>(
    store: &S,
    course_id: i64,
    desired: &[DesiredAsset],
    stats: &mut ReconcileStats,
) -> Result<()> {
    let wanted: Vec<Attachment> = desired
        .iter()
        .flat_map(|d| {
            d.attachments.iter().map(move |candidate| Attachment {
                id: 0,
                course_id,
                asset_id: d.asset.id,
                title: candidate.title.clone(),
                path: candidate.path.clone(),
            })
        })
        .collect();

    let asset_ids: Vec<i64> = desired.iter().map(|d| d.asset.id).collect();
    let existing = store.list_attachments(&asset_ids)?;

    let wanted_by_path: HashMap<&str, &Attachment> =
        wanted.iter().map(|a| (a.path.as_str(), a)).collect();
    let existing_by_path: HashMap<&str, &Attachment> =
        existing.iter().map(|a| (a.path.as_str(), a)).collect();

    for attachment in &existing {
        let keep = wanted_by_path
            .get(attachment.path.as_str())
            .is_some_and(|w| same_attachment(w, attachment));
        if !keep {
            store.delete_attachment(attachment.id)?;
            stats.attachments_deleted += 1;
        }
    }

    for mut attachment in wanted {
        let present = existing_by_path
            .get(attachment.path.as_str())
            .is_some_and(|e| same_attachment(e, &attachment));
        if !present {
            store.create_attachment(&mut attachment)?;
            stats.attachments_added += 1;
        }
    }

    Ok(())
}
