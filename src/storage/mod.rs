pub mod models;
mod queries;
mod sqlite;

pub use sqlite::Database;

use crate::error::Result;
use models::{Asset, Attachment, Course, Scan};

/// Typed catalog operations the scan pipeline relies on.
///
/// The queue, processor and reconciler are generic over this trait; `Database`
/// is the SQLite-backed implementation.
pub trait CatalogStore: Send {
    // ── Courses ──────────────────────────────────────────────────
    fn get_course(&self, course_id: i64) -> Result<Option<Course>>;
    fn list_courses(&self) -> Result<Vec<Course>>;
    fn create_course(&self, title: &str, path: &str) -> Result<Course>;
    fn update_course(&self, course: &Course) -> Result<()>;

    // ── Assets ───────────────────────────────────────────────────
    fn list_assets(&self, course_id: i64) -> Result<Vec<Asset>>;
    /// Insert the asset and write the new row id back into it.
    fn create_asset(&self, asset: &mut Asset) -> Result<()>;
    fn update_asset(&self, asset: &Asset) -> Result<()>;
    fn delete_asset(&self, asset_id: i64) -> Result<()>;

    // ── Attachments ──────────────────────────────────────────────
    fn list_attachments(&self, asset_ids: &[i64]) -> Result<Vec<Attachment>>;
    fn create_attachment(&self, attachment: &mut Attachment) -> Result<()>;
    fn delete_attachment(&self, attachment_id: i64) -> Result<()>;

    // ── Scans ────────────────────────────────────────────────────
    fn get_scan_for_course(&self, course_id: i64) -> Result<Option<Scan>>;
    /// Insert a scan in the waiting state.
    fn create_scan(&self, course_id: i64) -> Result<Scan>;
    fn update_scan(&self, scan: &Scan) -> Result<()>;
    fn delete_scan(&self, scan_id: i64) -> Result<()>;
    /// Oldest waiting scan by creation time.
    fn next_waiting_scan(&self) -> Result<Option<Scan>>;
    /// Put scans left in `processing` by an interrupted run back into `waiting`.
    fn reset_processing_scans(&self) -> Result<usize>;

    /// Run `f` in a transaction. Commits when `f` returns `Ok`; an `Err` or a
    /// panic unwinding out of `f` rolls everything back.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
        Self: Sized;
}
