use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_DATABASE_PATH: &str = "course_scan.db";
pub const DEFAULT_SCAN_DEPTH: usize = 2;
pub const DEFAULT_HASH_WINDOW_BYTES: usize = 1024 * 1024; // 1MiB

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_path: String,
    pub scan_depth: usize,
    pub hash_window_bytes: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            scan_depth: DEFAULT_SCAN_DEPTH,
            hash_window_bytes: DEFAULT_HASH_WINDOW_BYTES,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Load `Config.toml` (if present) layered under `COURSE_SCAN_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_from(ConfigFile::with_name("Config").required(false))
}

fn load_from<S>(source: S) -> Result<AppConfig, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = Config::builder()
        .set_default("database_path", DEFAULT_DATABASE_PATH)?
        .set_default("scan_depth", DEFAULT_SCAN_DEPTH as i64)?
        .set_default("hash_window_bytes", DEFAULT_HASH_WINDOW_BYTES as i64)?
        .set_default("ignore_patterns", Vec::<String>::new())?
        .add_source(source)
        .add_source(
            Environment::with_prefix("COURSE_SCAN")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_when_no_file() {
        let config = load_from(ConfigFile::from_str("", FileFormat::Toml)).unwrap();
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.scan_depth, 2);
        assert_eq!(config.hash_window_bytes, 1024 * 1024);
        assert!(config.ignore_patterns.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let toml = r#"
            database_path = "/tmp/library.db"
            scan_depth = 3
            ignore_patterns = ["**/.DS_Store"]
        "#;
        let config = load_from(ConfigFile::from_str(toml, FileFormat::Toml)).unwrap();
        assert_eq!(config.database_path, "/tmp/library.db");
        assert_eq!(config.scan_depth, 3);
        assert_eq!(config.hash_window_bytes, DEFAULT_HASH_WINDOW_BYTES);
        assert_eq!(config.ignore_patterns, vec!["**/.DS_Store".to_string()]);
    }
}
