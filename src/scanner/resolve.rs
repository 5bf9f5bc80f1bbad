use super::classify::{is_card, parse_filename};
use super::walk::chapter_of;
use crate::storage::models::AssetType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The file chosen as the lesson for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    pub title: String,
    pub asset_type: AssetType,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub title: String,
    pub path: String,
}

/// Everything found on disk for one (chapter, prefix) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    pub chapter: String,
    pub prefix: i64,
    pub asset: Option<AssetCandidate>,
    /// In discovery order, demoted assets included.
    pub attachments: Vec<AttachmentCandidate>,
}

/// Desired layout of a course, before content hashing.
#[derive(Debug, Default)]
pub struct CourseLayout {
    pub card_path: Option<String>,
    slots: BTreeMap<(String, i64), Slot>,
}

impl CourseLayout {
    /// Slots that ended up with a lesson, ordered by chapter then prefix.
    /// Attachments of slots without a lesson are dropped here.
    pub fn into_resolved_slots(self) -> Vec<Slot> {
        self.slots
            .into_values()
            .filter(|slot| slot.asset.is_some())
            .collect()
    }

    pub fn slot(&self, chapter: &str, prefix: i64) -> Option<&Slot> {
        self.slots.get(&(chapter.to_string(), prefix))
    }
}

/// Whether `new` takes over a slot currently held by `cur`. Video beats
/// anything that is not video, and HTML beats PDF. Ties keep the current one.
pub fn outranks(new: AssetType, cur: AssetType) -> bool {
    (new == AssetType::Video && cur != AssetType::Video)
        || (new == AssetType::Html && cur == AssetType::Pdf)
}

fn with_extension(title: &str, path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{}.{}", title, ext.to_string_lossy()),
        None => title.to_string(),
    }
}

/// Classify crawled files and settle slot collisions.
///
/// Order matters: the first cover image in the root wins, and among equally
/// ranked lessons for a slot the first one seen is kept.
pub fn build_layout(root: &Path, files: &[PathBuf]) -> CourseLayout {
    let mut layout = CourseLayout::default();

    for file in files {
        // Paths are stored as text, so a name that is not UTF-8 could never be
        // reopened from the catalog
        let path_str = match file.to_str() {
            Some(path) => path.to_string(),
            None => {
                debug!(file = %file.display(), "Path is not valid UTF-8. Ignoring");
                continue;
            }
        };
        let filename = match file.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let chapter = chapter_of(root, file);

        if file.parent() == Some(root) && is_card(&filename) {
            if layout.card_path.is_some() {
                debug!(file = %path_str, "Found another course card. Ignoring");
            } else {
                layout.card_path = Some(path_str);
            }
            continue;
        }

        let parsed = match parse_filename(&filename) {
            Some(parsed) => parsed,
            None => {
                debug!(file = %path_str, "Incompatible file name. Ignoring");
                continue;
            }
        };

        let slot = layout
            .slots
            .entry((chapter.clone(), parsed.prefix))
            .or_insert_with(|| Slot {
                chapter,
                prefix: parsed.prefix,
                ..Default::default()
            });

        let new_type = match parsed.asset_type {
            Some(asset_type) => asset_type,
            None => {
                slot.attachments.push(AttachmentCandidate {
                    title: parsed.title,
                    path: path_str,
                });
                continue;
            }
        };

        let candidate = AssetCandidate {
            title: parsed.title,
            asset_type: new_type,
            path: path_str,
        };

        match slot.asset.take() {
            None => slot.asset = Some(candidate),
            Some(current) if outranks(new_type, current.asset_type) => {
                debug!(
                    file = %candidate.path,
                    replaced = %current.path,
                    "Found a higher priority asset. Replacing"
                );
                slot.attachments.push(AttachmentCandidate {
                    title: with_extension(&current.title, Path::new(&current.path)),
                    path: current.path,
                });
                slot.asset = Some(candidate);
            }
            Some(current) => {
                slot.attachments.push(AttachmentCandidate {
                    title: with_extension(&candidate.title, Path::new(&candidate.path)),
                    path: candidate.path,
                });
                slot.asset = Some(current);
            }
        }
    }

    layout
}
