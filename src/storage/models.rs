use std::fmt;
use std::str::FromStr;

/// A course: a directory on disk holding lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub path: String,
    pub card_path: Option<String>,
    pub available: bool,
}

/// The kind of lesson an asset represents. Collisions between kinds are settled
/// in `scanner::resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Video,
    Html,
    Pdf,
}

impl AssetType {
    /// Map a file extension (case-insensitive, without the dot) to an asset type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "avi" | "mkv" | "flac" | "mp4" | "m4a" | "mp3" | "ogv" | "ogm" | "ogg" | "oga"
            | "opus" | "webm" | "wav" => Some(AssetType::Video),
            "htm" | "html" => Some(AssetType::Html),
            "pdf" => Some(AssetType::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Video => "video",
            AssetType::Html => "html",
            AssetType::Pdf => "pdf",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(AssetType::Video),
            "html" => Ok(AssetType::Html),
            "pdf" => Ok(AssetType::Pdf),
            other => Err(format!("invalid asset type '{}'", other)),
        }
    }
}

/// A catalogued lesson file at a unique (chapter, prefix) slot of a course.
///
/// Equality covers every persisted column except timestamps, which is what the
/// reconciler uses to decide whether a matched row needs rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub prefix: i64,
    pub chapter: String,
    pub asset_type: AssetType,
    pub path: String,
    pub hash: String,
}

/// A non-primary file owned by exactly one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub course_id: i64,
    pub asset_id: i64,
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Waiting,
    Processing,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Waiting => "waiting",
            ScanStatus::Processing => "processing",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ScanStatus::Waiting),
            "processing" => Ok(ScanStatus::Processing),
            other => Err(format!("invalid scan status '{}'", other)),
        }
    }
}

/// A durable queue entry. Completion is represented by deleting the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub id: i64,
    pub course_id: i64,
    pub status: ScanStatus,
    pub created_at: String,
    /// Joined from the course row, for logging.
    pub course_path: String,
}
