use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use course_scan::scanner::compile_ignore_patterns;
use course_scan::storage::models::*;
use course_scan::{process_scan, CatalogStore, Database, ScanQueue, ScanSettings};

const WAIT: Duration = Duration::from_secs(10);

/// A course directory wired to a queue running the real processor.
struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    course_id: i64,
    queue: Arc<ScanQueue<Database>>,
    done: flume::Receiver<()>,
    worker: Option<JoinHandle<()>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(ScanSettings::default())
    }

    fn with_settings(settings: ScanSettings) -> Self {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("course");
        fs::create_dir_all(&root).unwrap();

        let db = Database::open_in_memory().unwrap();
        let course = db
            .create_course("Course", &root.to_string_lossy())
            .unwrap();

        let queue = Arc::new(ScanQueue::new(db, settings));
        let (done_tx, done) = flume::unbounded();
        let worker = queue.start_worker(process_scan, Some(done_tx)).unwrap();

        Self {
            _tmp: tmp,
            root,
            course_id: course.id,
            queue,
            done,
            worker: Some(worker),
        }
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn path(&self, name: &str) -> String {
        self.root.join(name).to_string_lossy().into_owned()
    }

    fn scan(&self) {
        self.queue.add(self.course_id).unwrap();
        self.done.recv_timeout(WAIT).unwrap();
    }

    fn course(&self) -> Course {
        self.queue.store().get_course(self.course_id).unwrap().unwrap()
    }

    fn assets(&self) -> Vec<Asset> {
        self.queue.store().list_assets(self.course_id).unwrap()
    }

    fn attachments(&self) -> Vec<Attachment> {
        let ids: Vec<i64> = self.assets().iter().map(|a| a.id).collect();
        self.queue.store().list_attachments(&ids).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn rename(from: &Path, to: &Path) {
    fs::create_dir_all(to.parent().unwrap()).unwrap();
    fs::rename(from, to).unwrap();
}

#[test]
fn test_video_with_text_attachment() {
    let h = Harness::new();
    h.write("01 intro.mp4", "intro video");
    h.write("01 intro.txt", "transcript");
    h.scan();

    let assets = h.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].prefix, 1);
    assert_eq!(assets[0].title, "intro");
    assert_eq!(assets[0].asset_type, AssetType::Video);
    assert_eq!(assets[0].chapter, "");

    let attachments = h.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].title, "intro.txt");
    assert_eq!(attachments[0].asset_id, assets[0].id);
    assert_eq!(attachments[0].path, h.path("01 intro.txt"));

    assert!(h.course().available);
}

#[test]
fn test_higher_priority_lessons_take_over_across_scans() {
    let h = Harness::new();
    h.write("01 doc.pdf", "pdf");
    h.scan();
    assert_eq!(h.assets()[0].asset_type, AssetType::Pdf);

    h.write("01 index.html", "html");
    h.scan();
    let assets = h.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].asset_type, AssetType::Html);

    h.write("01 video.mp4", "video");
    h.scan();

    let assets = h.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].asset_type, AssetType::Video);
    assert_eq!(assets[0].title, "video");

    let titles: Vec<_> = h.attachments().into_iter().map(|a| a.title).collect();
    assert_eq!(titles, vec!["doc.pdf", "index.html"]);
}

#[test]
fn test_identity_survives_rename_and_move() {
    let h = Harness::new();
    h.write("01 intro.mp4", "same bytes");
    h.write("01 intro.txt", "notes");
    h.scan();
    let before = h.assets()[0].clone();

    rename(
        &h.root.join("01 intro.mp4"),
        &h.root.join("02 Basics").join("03 welcome.mp4"),
    );
    h.scan();

    let assets = h.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, before.id);
    assert_eq!(assets[0].hash, before.hash);
    assert_eq!(assets[0].title, "welcome");
    assert_eq!(assets[0].prefix, 3);
    assert_eq!(assets[0].chapter, "02 Basics");
    assert_eq!(assets[0].path, h.path("02 Basics/03 welcome.mp4"));

    // The notes file no longer has a lesson in its slot
    assert!(h.attachments().is_empty());
}

#[test]
fn test_swapped_files_keep_their_rows() {
    let h = Harness::new();
    h.write("01 first.mp4", "content one");
    h.write("02 second.mp4", "content two");
    h.scan();
    let before = h.assets();

    let tmp = h.root.join("swap.tmp");
    rename(&h.root.join("01 first.mp4"), &tmp);
    rename(&h.root.join("02 second.mp4"), &h.root.join("01 first.mp4"));
    rename(&tmp, &h.root.join("02 second.mp4"));
    h.scan();

    let after = h.assets();
    assert_eq!(after.len(), 2);
    // Rows follow their content to the other path
    assert_eq!(after[0].id, before[1].id);
    assert_eq!(after[0].path, h.path("01 first.mp4"));
    assert_eq!(after[1].id, before[0].id);
    assert_eq!(after[1].path, h.path("02 second.mp4"));
}

#[test]
fn test_availability_follows_course_root() {
    let h = Harness::new();
    h.write("01 intro.mp4", "video");
    h.write("01 intro.txt", "notes");
    h.scan();
    assert!(h.course().available);

    let moved = h.root.with_file_name("course-moved");
    fs::rename(&h.root, &moved).unwrap();
    h.scan();

    let course = h.course();
    assert!(!course.available);
    assert_eq!(h.assets().len(), 1);
    assert_eq!(h.attachments().len(), 1);

    fs::rename(&moved, &h.root).unwrap();
    h.scan();
    assert!(h.course().available);
    assert_eq!(h.assets().len(), 1);
}

#[test]
fn test_card_detection() {
    let h = Harness::new();
    h.write("card.jpg", "image");
    h.write("card.PNG", "other image");
    h.write("01 intro.mp4", "video");
    h.write("01 Chapter/card.webp", "nested image");
    h.scan();

    assert_eq!(h.course().card_path, Some(h.path("card.PNG")));
    assert_eq!(h.assets().len(), 1);

    fs::remove_file(h.root.join("card.PNG")).unwrap();
    h.scan();
    assert_eq!(h.course().card_path, Some(h.path("card.jpg")));

    fs::remove_file(h.root.join("card.jpg")).unwrap();
    h.scan();
    assert_eq!(h.course().card_path, None);
}

#[test]
fn test_emptied_course_loses_all_lessons() {
    let h = Harness::new();
    h.write("01 intro.mp4", "video");
    h.write("01 intro.txt", "notes");
    h.write("02 Extras/01 bonus.pdf", "pdf");
    h.scan();
    assert_eq!(h.assets().len(), 2);

    fs::remove_file(h.root.join("01 intro.mp4")).unwrap();
    fs::remove_file(h.root.join("01 intro.txt")).unwrap();
    fs::remove_dir_all(h.root.join("02 Extras")).unwrap();
    h.scan();

    assert!(h.assets().is_empty());
    assert!(h.attachments().is_empty());
    assert!(h.course().available);
}

#[test]
fn test_depth_and_ignore_patterns() {
    let settings = ScanSettings {
        scan_depth: 2,
        hash_window_bytes: 64,
        ignore_patterns: compile_ignore_patterns(&["*.mkv".to_string(), "*/drafts".to_string()]),
    };
    let h = Harness::with_settings(settings);
    h.write("01 intro.mp4", "video");
    h.write("02 raw.mkv", "raw footage");
    h.write("01 Basics/01 lesson.mp4", "lesson");
    h.write("01 Basics/deep/01 nested.mp4", "too deep");
    h.write("drafts/01 draft.mp4", "draft");
    h.scan();

    let paths: Vec<_> = h.assets().into_iter().map(|a| a.path).collect();
    assert_eq!(
        paths,
        vec![h.path("01 intro.mp4"), h.path("01 Basics/01 lesson.mp4")]
    );
}

#[test]
fn test_missing_course_is_skipped() {
    let h = Harness::new();
    let mut scan = Scan {
        id: 0,
        course_id: 9999,
        status: ScanStatus::Processing,
        created_at: String::new(),
        course_path: "/nowhere".to_string(),
    };
    process_scan(&h.queue, &mut scan).unwrap();
}

#[cfg(unix)]
#[test]
fn test_dangling_symlinks_are_skipped() {
    let h = Harness::new();
    h.write("01 intro.mp4", "video");
    std::os::unix::fs::symlink(h.root.join("missing.mp4"), h.root.join("02 broken.mp4")).unwrap();
    std::os::unix::fs::symlink(h.root.join("missing"), h.root.join(".stale-link")).unwrap();
    h.write("03 more.mp4", "more");
    h.scan();

    let paths: Vec<_> = h.assets().into_iter().map(|a| a.path).collect();
    assert_eq!(paths, vec![h.path("01 intro.mp4"), h.path("03 more.mp4")]);
    assert!(h.queue.store().get_scan_for_course(h.course_id).unwrap().is_none());
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_do_not_block_the_course() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let h = Harness::new();
    h.write("01 intro.mp4", "video");
    fs::write(h.root.join(OsStr::from_bytes(b"02 caf\xe9.mp4")), "cafe").unwrap();
    fs::write(h.root.join(OsStr::from_bytes(b"01 notes \xff.txt")), "notes").unwrap();
    h.scan();

    let assets = h.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].path, h.path("01 intro.mp4"));
    assert!(h.attachments().is_empty());
}
