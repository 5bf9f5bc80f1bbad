pub mod classify;
pub mod resolve;
pub mod walk;

pub use classify::{is_card, parse_filename, ParsedFilename};
pub use resolve::{build_layout, AssetCandidate, AttachmentCandidate, CourseLayout, Slot};
pub use walk::{chapter_of, compile_ignore_patterns, list_files};
