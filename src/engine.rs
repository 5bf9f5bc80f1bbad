use crate::config::AppConfig;
use crate::error::Result;
use crate::hasher::partial_hash;
use crate::queue::ScanQueue;
use crate::reconcile::{reconcile, DesiredAsset};
use crate::scanner::{build_layout, compile_ignore_patterns, list_files, Slot};
use crate::storage::models::{Asset, Course, Scan, ScanStatus};
use crate::storage::CatalogStore;
use glob::Pattern;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Crawl and hashing settings used by `process_scan`.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub scan_depth: usize,
    pub hash_window_bytes: usize,
    pub ignore_patterns: Vec<Pattern>,
}

impl ScanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            scan_depth: config.scan_depth,
            hash_window_bytes: config.hash_window_bytes,
            ignore_patterns: compile_ignore_patterns(&config.ignore_patterns),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Bring the catalog entry of the scanned course in line with its directory.
///
/// A course that no longer exists is not an error. A course whose directory is
/// gone is marked unavailable and its catalog rows are left alone. Otherwise
/// the directory is crawled, lessons are resolved and hashed, and the result
/// is written in a single transaction together with the course card.
///
/// The store lock is only taken around database work so new scans can be
/// queued while a course is being crawled and hashed.
pub fn process_scan<S: CatalogStore>(queue: &ScanQueue<S>, scan: &mut Scan) -> Result<()> {
    let course = {
        let store = queue.store();
        if scan.status != ScanStatus::Processing {
            scan.status = ScanStatus::Processing;
            store.update_scan(scan)?;
        }
        store.get_course(scan.course_id)?
    };

    let mut course = match course {
        Some(course) => course,
        None => {
            debug!(course_id = scan.course_id, "Course no longer exists. Skipping scan");
            return Ok(());
        }
    };

    let root = Path::new(&course.path).to_path_buf();
    match fs::metadata(&root) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(course_id = course.id, path = %course.path, "Course path does not exist");
            if course.available {
                course.available = false;
                queue.store().update_course(&course)?;
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    if !course.available {
        debug!(course_id = course.id, path = %course.path, "Course is available again");
        course.available = true;
        queue.store().update_course(&course)?;
    }

    let start = Instant::now();
    let settings = queue.settings();

    let files = list_files(&root, settings.scan_depth, &settings.ignore_patterns)?;
    let layout = build_layout(&root, &files);
    course.card_path = layout.card_path.clone();

    let mut desired = hash_slots(&course, layout.into_resolved_slots(), settings.hash_window_bytes)?;

    let stats = queue.store().transaction(|store| {
        let stats = reconcile(store, course.id, &mut desired)?;
        store.update_course(&course)?;
        Ok(stats)
    })?;

    info!(
        course_id = course.id,
        path = %course.path,
        files = files.len(),
        assets = desired.len(),
        added = stats.assets_added,
        updated = stats.assets_updated,
        deleted = stats.assets_deleted,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Scanned course"
    );

    Ok(())
}

/// Hash the winning file of every slot in parallel.
fn hash_slots(course: &Course, slots: Vec<Slot>, window: usize) -> Result<Vec<DesiredAsset>> {
    slots
        .into_par_iter()
        .filter_map(|slot| {
            let Slot {
                chapter,
                prefix,
                asset,
                attachments,
            } = slot;
            asset.map(|candidate| (chapter, prefix, candidate, attachments))
        })
        .map(|(chapter, prefix, candidate, attachments)| -> Result<DesiredAsset> {
            let hash = partial_hash(Path::new(&candidate.path), window)?;
            Ok(DesiredAsset {
                asset: Asset {
                    id: 0,
                    course_id: course.id,
                    title: candidate.title,
                    prefix,
                    chapter,
                    asset_type: candidate.asset_type,
                    path: candidate.path,
                    hash,
                },
                attachments,
            })
        })
        .collect()
}
