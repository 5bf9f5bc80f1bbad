use crate::storage::models::AssetType;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    /// `<prefix>(separator<title>)?(.<ext>)?`
    ///
    /// The prefix is a required number. The separator is whitespace, dashes,
    /// or dashes surrounded by whitespace. The title cannot start with a dot and
    /// runs up to the first dot, which begins the extension.
    static ref FILENAME_PATTERN: Regex = Regex::new(
        r"^\s*(?P<prefix>[0-9]+)((?:\s+-+\s+|\s+-+|\s+|-+\s*)(?P<title>[^.][^.]*)?)?(?:\.(?P<ext>\w+))?$"
    )
    .expect("valid filename pattern");
}

const CARD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff"];

/// Result of classifying a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub prefix: i64,
    pub title: String,
    /// `Some` for lesson files, `None` for attachments.
    pub asset_type: Option<AssetType>,
}

impl ParsedFilename {
    pub fn is_asset(&self) -> bool {
        self.asset_type.is_some()
    }
}

/// Parse a file name into prefix, title and kind.
///
/// Returns `None` when the name does not follow the lesson grammar, meaning the
/// file is ignored entirely. Otherwise:
/// - no title: attachment titled with the whole file name
/// - title, no extension: attachment titled with the title
/// - title and a lesson extension: asset
/// - title and any other extension: attachment titled `title.ext`
pub fn parse_filename(filename: &str) -> Option<ParsedFilename> {
    let caps = FILENAME_PATTERN.captures(filename)?;
    let prefix = caps.name("prefix")?.as_str().parse::<i64>().ok()?;

    let title = caps.name("title").map(|m| m.as_str()).unwrap_or_default();
    if title.is_empty() {
        return Some(ParsedFilename {
            prefix,
            title: filename.to_string(),
            asset_type: None,
        });
    }

    let ext = match caps.name("ext") {
        Some(ext) => ext.as_str(),
        None => {
            return Some(ParsedFilename {
                prefix,
                title: title.to_string(),
                asset_type: None,
            })
        }
    };

    match AssetType::from_extension(ext) {
        Some(asset_type) => Some(ParsedFilename {
            prefix,
            title: title.to_string(),
            asset_type: Some(asset_type),
        }),
        None => Some(ParsedFilename {
            prefix,
            title: format!("{}.{}", title, ext),
            asset_type: None,
        }),
    }
}

/// Whether a file name is a course cover image: `card.<image ext>`.
pub fn is_card(filename: &str) -> bool {
    let path = Path::new(filename);
    let (stem, ext) = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => (stem.to_string_lossy(), ext.to_string_lossy()),
        _ => return false,
    };

    stem == "card"
        && CARD_EXTENSIONS
            .iter()
            .any(|supported| ext.eq_ignore_ascii_case(supported))
}
