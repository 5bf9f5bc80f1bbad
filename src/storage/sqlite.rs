use rusqlite::{Connection, Result};
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        // journal_mode reports the resulting mode as a row ("memory" for in-memory databases)
        let mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (journal_mode={}, foreign keys on)", mode);
        Ok(())
    }

    /// Create the catalog tables when missing. Older layouts are dropped since
    /// the catalog can always be rebuilt by rescanning.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version != 0 && version < SCHEMA_VERSION {
            debug!(
                "Schema version {} < {}, dropping all tables and recreating",
                version, SCHEMA_VERSION
            );
            self.conn.execute_batch(
                "DROP TABLE IF EXISTS scan;
                 DROP TABLE IF EXISTS attachment;
                 DROP TABLE IF EXISTS asset;
                 DROP TABLE IF EXISTS course;",
            )?;
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM scan;
             DELETE FROM attachment;
             DELETE FROM asset;
             DELETE FROM course;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}
