use super::models::*;
use super::sqlite::Database;
use super::CatalogStore;
use crate::error::{Error, Result};
use chrono::SecondsFormat;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::str::FromStr;
use tracing::debug;

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

fn course_from_row(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        path: row.get(2)?,
        card_path: row.get(3)?,
        available: row.get(4)?,
    })
}

fn asset_from_row(row: &Row) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        prefix: row.get(3)?,
        chapter: row.get(4)?,
        asset_type: parse_column(row, 5)?,
        path: row.get(6)?,
        hash: row.get(7)?,
    })
}

fn attachment_from_row(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        course_id: row.get(1)?,
        asset_id: row.get(2)?,
        title: row.get(3)?,
        path: row.get(4)?,
    })
}

fn scan_from_row(row: &Row) -> rusqlite::Result<Scan> {
    Ok(Scan {
        id: row.get(0)?,
        course_id: row.get(1)?,
        status: parse_column(row, 2)?,
        created_at: row.get(3)?,
        course_path: row.get(4)?,
    })
}

const COURSE_COLUMNS: &str = "id, title, path, card_path, available";
const ASSET_COLUMNS: &str = "id, course_id, title, prefix, chapter, asset_type, path, hash";
const ATTACHMENT_COLUMNS: &str = "id, course_id, asset_id, title, path";
const SCAN_SELECT: &str = "SELECT s.id, s.course_id, s.status, s.created_at, c.path \
                           FROM scan s JOIN course c ON c.id = s.course_id";

fn expect_one_row(changed: usize, what: &str, id: i64) -> Result<()> {
    if changed == 0 {
        return Err(Error::NotFound(format!("{} {}", what, id)));
    }
    Ok(())
}

impl CatalogStore for Database {
    // ── Courses ──────────────────────────────────────────────────

    fn get_course(&self, course_id: i64) -> Result<Option<Course>> {
        let course = self
            .connection()
            .query_row(
                &format!("SELECT {} FROM course WHERE id = ?1", COURSE_COLUMNS),
                params![course_id],
                course_from_row,
            )
            .optional()?;
        Ok(course)
    }

    fn list_courses(&self) -> Result<Vec<Course>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("SELECT {} FROM course ORDER BY id", COURSE_COLUMNS))?;
        let courses = stmt
            .query_map([], course_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(courses)
    }

    fn create_course(&self, title: &str, path: &str) -> Result<Course> {
        let now = now();
        self.connection().execute(
            "INSERT INTO course (title, path, available, created_at, updated_at) \
             VALUES (?1, ?2, 0, ?3, ?3)",
            params![title, path, now],
        )?;
        let id = self.connection().last_insert_rowid();
        debug!("Created course {} at {}", id, path);
        Ok(Course {
            id,
            title: title.to_string(),
            path: path.to_string(),
            card_path: None,
            available: false,
        })
    }

    fn update_course(&self, course: &Course) -> Result<()> {
        let changed = self.connection().execute(
            "UPDATE course SET title = ?1, path = ?2, card_path = ?3, available = ?4, \
             updated_at = ?5 WHERE id = ?6",
            params![
                course.title,
                course.path,
                course.card_path,
                course.available,
                now(),
                course.id
            ],
        )?;
        expect_one_row(changed, "course", course.id)
    }

    // ── Assets ───────────────────────────────────────────────────

    fn list_assets(&self, course_id: i64) -> Result<Vec<Asset>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM asset WHERE course_id = ?1 ORDER BY chapter, prefix",
            ASSET_COLUMNS
        ))?;
        let assets = stmt
            .query_map(params![course_id], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    fn create_asset(&self, asset: &mut Asset) -> Result<()> {
        let now = now();
        self.connection().execute(
            "INSERT INTO asset \
             (course_id, title, prefix, chapter, asset_type, path, hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                asset.course_id,
                asset.title,
                asset.prefix,
                asset.chapter,
                asset.asset_type.as_str(),
                asset.path,
                asset.hash,
                now
            ],
        )?;
        asset.id = self.connection().last_insert_rowid();
        Ok(())
    }

    fn update_asset(&self, asset: &Asset) -> Result<()> {
        let changed = self.connection().execute(
            "UPDATE asset SET course_id = ?1, title = ?2, prefix = ?3, chapter = ?4, \
             asset_type = ?5, path = ?6, hash = ?7, updated_at = ?8 WHERE id = ?9",
            params![
                asset.course_id,
                asset.title,
                asset.prefix,
                asset.chapter,
                asset.asset_type.as_str(),
                asset.path,
                asset.hash,
                now(),
                asset.id
            ],
        )?;
        expect_one_row(changed, "asset", asset.id)
    }

    fn delete_asset(&self, asset_id: i64) -> Result<()> {
        self.connection()
            .execute("DELETE FROM asset WHERE id = ?1", params![asset_id])?;
        Ok(())
    }

    // ── Attachments ──────────────────────────────────────────────

    fn list_attachments(&self, asset_ids: &[i64]) -> Result<Vec<Attachment>> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; asset_ids.len()].join(", ");
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM attachment WHERE asset_id IN ({}) ORDER BY id",
            ATTACHMENT_COLUMNS, placeholders
        ))?;
        let attachments = stmt
            .query_map(params_from_iter(asset_ids.iter()), attachment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    fn create_attachment(&self, attachment: &mut Attachment) -> Result<()> {
        let now = now();
        self.connection().execute(
            "INSERT INTO attachment (course_id, asset_id, title, path, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                attachment.course_id,
                attachment.asset_id,
                attachment.title,
                attachment.path,
                now
            ],
        )?;
        attachment.id = self.connection().last_insert_rowid();
        Ok(())
    }

    fn delete_attachment(&self, attachment_id: i64) -> Result<()> {
        self.connection()
            .execute("DELETE FROM attachment WHERE id = ?1", params![attachment_id])?;
        Ok(())
    }

    // ── Scans ────────────────────────────────────────────────────

    fn get_scan_for_course(&self, course_id: i64) -> Result<Option<Scan>> {
        let scan = self
            .connection()
            .query_row(
                &format!("{} WHERE s.course_id = ?1", SCAN_SELECT),
                params![course_id],
                scan_from_row,
            )
            .optional()?;
        Ok(scan)
    }

    fn create_scan(&self, course_id: i64) -> Result<Scan> {
        let now = now();
        self.connection().execute(
            "INSERT INTO scan (course_id, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![course_id, ScanStatus::Waiting.as_str(), now],
        )?;
        let id = self.connection().last_insert_rowid();
        let scan = self
            .connection()
            .query_row(
                &format!("{} WHERE s.id = ?1", SCAN_SELECT),
                params![id],
                scan_from_row,
            )?;
        Ok(scan)
    }

    fn update_scan(&self, scan: &Scan) -> Result<()> {
        let changed = self.connection().execute(
            "UPDATE scan SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![scan.status.as_str(), now(), scan.id],
        )?;
        expect_one_row(changed, "scan", scan.id)
    }

    fn delete_scan(&self, scan_id: i64) -> Result<()> {
        self.connection()
            .execute("DELETE FROM scan WHERE id = ?1", params![scan_id])?;
        Ok(())
    }

    fn next_waiting_scan(&self) -> Result<Option<Scan>> {
        let scan = self
            .connection()
            .query_row(
                &format!(
                    "{} WHERE s.status = ?1 ORDER BY s.created_at ASC, s.id ASC LIMIT 1",
                    SCAN_SELECT
                ),
                params![ScanStatus::Waiting.as_str()],
                scan_from_row,
            )
            .optional()?;
        Ok(scan)
    }

    fn reset_processing_scans(&self) -> Result<usize> {
        let changed = self.connection().execute(
            "UPDATE scan SET status = ?1, updated_at = ?2 WHERE status = ?3",
            params![
                ScanStatus::Waiting.as_str(),
                now(),
                ScanStatus::Processing.as_str()
            ],
        )?;
        Ok(changed)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // Dropping `tx` without committing (early return or unwind) rolls back
        let tx = self.connection().unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }
}
