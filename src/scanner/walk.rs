use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

/// Compile glob ignore patterns, logging and dropping any that are invalid.
pub fn compile_ignore_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// List the files under `root` down to `max_depth` levels (normalized to at
/// least 1). Files directly in `root` are depth 1, files in its immediate
/// subdirectories depth 2, and so on.
///
/// Entries are visited in file-name order so the result is the same on every
/// platform. Directories are descended into but never returned. Entries
/// matching an ignore pattern are skipped, along with everything below them,
/// and so are entries that cannot be stat'ed (dangling symlinks and the like).
/// Only a failure on `root` itself is returned as an error.
pub fn list_files(
    root: &Path,
    max_depth: usize,
    ignore_patterns: &[Pattern],
) -> Result<Vec<PathBuf>, walkdir::Error> {
    let max_depth = max_depth.max(1);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Only the root is fatal; unreadable entries below it are skipped
            Err(err) if err.depth() > 0 => {
                debug!(
                    path = %err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %err,
                    "Unreadable entry. Ignoring"
                );
                continue;
            }
            Err(err) => return Err(err),
        };
        if entry.file_type().is_dir() {
            continue;
        }
        files.push(entry.into_path());
    }

    debug!("Found {} files under {}", files.len(), root.display());
    Ok(files)
}

/// The chapter a file belongs to: the name of its parent directory, or an
/// empty string when the file sits directly in the course root.
pub fn chapter_of(root: &Path, file: &Path) -> String {
    match file.parent() {
        Some(parent) if parent != root => parent
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_list_files_respects_depth() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("01 intro.mp4"));
        touch(&root.join("chapter 1/01 lesson.mp4"));
        touch(&root.join("chapter 1/nested/01 deep.mp4"));

        let depth_one = list_files(root, 1, &[]).unwrap();
        assert_eq!(relative(root, &depth_one), vec!["01 intro.mp4"]);

        let depth_two = list_files(root, 2, &[]).unwrap();
        assert_eq!(
            relative(root, &depth_two),
            vec!["01 intro.mp4", "chapter 1/01 lesson.mp4"]
        );

        let depth_three = list_files(root, 3, &[]).unwrap();
        assert_eq!(depth_three.len(), 3);
    }

    #[test]
    fn test_list_files_zero_depth_is_one() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("01 intro.mp4"));
        touch(&root.join("chapter/01 lesson.mp4"));

        let files = list_files(root, 0, &[]).unwrap();
        assert_eq!(relative(root, &files), vec!["01 intro.mp4"]);
    }

    #[test]
    fn test_list_files_skips_ignored() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("01 intro.mp4"));
        touch(&root.join(".DS_Store"));
        touch(&root.join("drafts/01 draft.mp4"));

        let patterns = compile_ignore_patterns(&[
            "**/.DS_Store".to_string(),
            "**/drafts".to_string(),
            "[invalid".to_string(),
        ]);
        assert_eq!(patterns.len(), 2);

        let files = list_files(root, 2, &patterns).unwrap();
        assert_eq!(relative(root, &files), vec!["01 intro.mp4"]);
    }

    #[test]
    fn test_list_files_missing_root() {
        let tmp = tempdir().unwrap();
        let err = list_files(&tmp.path().join("missing"), 2, &[]).unwrap_err();
        assert_eq!(
            err.io_error().map(|e| e.kind()),
            Some(std::io::ErrorKind::NotFound)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_skips_dangling_symlinks() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("01 intro.mp4"));
        touch(&root.join("chapter/01 lesson.mp4"));
        std::os::unix::fs::symlink(root.join("gone.mp4"), root.join(".stale-link")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.mp4"), root.join("chapter/02 broken.mp4"))
            .unwrap();

        let files = list_files(root, 2, &[]).unwrap();
        assert_eq!(
            relative(root, &files),
            vec!["01 intro.mp4", "chapter/01 lesson.mp4"]
        );
    }

    #[test]
    fn test_chapter_of() {
        let root = Path::new("/courses/rust");
        assert_eq!(chapter_of(root, &root.join("01 intro.mp4")), "");
        assert_eq!(
            chapter_of(root, &root.join("02 Basics").join("01 vars.mp4")),
            "02 Basics"
        );
    }
}
