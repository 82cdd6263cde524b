/// Integration tests for dataflux
///
/// These tests simulate real-world usage scenarios, testing the complete
/// end-to-end functionality from scanning a media folder to applying rules.
///
/// Test categories:
/// 1. Scanning and classification
/// 2. Rule application with the default rules
/// 3. Dry-run mode verification
/// 4. Custom rule documents and priorities
/// 5. Configuration and filtering
/// 6. Flatten and sort-by-type
/// 7. CLI workflows
use dataflux::cancel::CancelToken;
use dataflux::cli::{Command, RulesCommand, run_cli};
use dataflux::config::Config;
use dataflux::engine::{FileRecord, Report, ReportEntry, RuleEngine};
use dataflux::media_category::MediaCategory;
use dataflux::processor::FileProcessor;
use dataflux::rules::{ConditionSpec, OperationKind, ProcessingRule, RuleAction, RuleSet};
use dataflux::scanner::DirectoryScanner;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const MB: u64 = 1024 * 1024;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture with a source tree and a separate target directory.
struct TestFixture {
    source: TempDir,
    target: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            source: TempDir::new().expect("Failed to create source directory"),
            target: TempDir::new().expect("Failed to create target directory"),
        }
    }

    fn path(&self) -> &Path {
        self.source.path()
    }

    fn target(&self) -> &Path {
        self.target.path()
    }

    /// Create a file with text content, creating parent directories.
    fn create_text_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Create a sparse file of `size` bytes without writing its content.
    fn create_sized_file(&self, rel: &str, size: u64) -> PathBuf {
        let path = self.create_text_file(rel, "");
        File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_len(size))
            .expect("Failed to size file");
        path
    }

    /// Push a file's modification time `days` into the past.
    fn age_file(&self, rel: &str, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * 86_400);
        File::options()
            .write(true)
            .open(self.path().join(rel))
            .and_then(|f| f.set_modified(when))
            .expect("Failed to set modification time");
    }

    fn assert_target_exists(&self, rel: &str) {
        let path = self.target().join(rel);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_source_exists(&self, rel: &str) {
        let path = self.path().join(rel);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_source_not_exists(&self, rel: &str) {
        let path = self.path().join(rel);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// All files below `root`, sorted.
    fn list_files_recursive(root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).expect("Failed to read directory").flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        files
    }

    /// Scan the source tree and apply `rules` under the target directory.
    fn apply(&self, rules: RuleSet, dry_run: bool) -> Report {
        let scan = DirectoryScanner::new().scan_directory(self.path(), None, None);
        let records = scan.file_records();
        RuleEngine::with_rules(rules).apply_rules(&records, self.target(), dry_run, None, None)
    }
}

fn targets(report: &Report) -> Vec<(PathBuf, PathBuf)> {
    let mut pairs: Vec<_> = report
        .applied()
        .map(|op| (op.source.clone(), op.target.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn rule(id: &str, condition: ConditionSpec, operation: OperationKind, target: &str, priority: i32) -> ProcessingRule {
    ProcessingRule::new(
        id,
        id,
        "",
        condition,
        RuleAction {
            operation,
            target_dir: target.to_string(),
        },
        priority,
    )
}

// ============================================================================
// Test Suite 1: Scanning
// ============================================================================

#[test]
fn test_scan_empty_directory() {
    let fixture = TestFixture::new();
    let result = DirectoryScanner::new().scan_directory(fixture.path(), None, None);
    assert!(result.is_empty());
    assert_eq!(result.total_files(), 0);
}

#[test]
fn test_scan_mixed_media_folder() {
    let fixture = TestFixture::new();
    fixture.create_text_file("holiday/beach.JPG", "jpg");
    fixture.create_text_file("holiday/clip.mp4", "mp4");
    fixture.create_text_file("music/track.flac", "flac");
    fixture.create_text_file("docs/report.pdf", "pdf");
    fixture.create_text_file("models/part.stl", "stl");
    fixture.create_text_file("notes", "none");
    fixture.create_text_file(".hidden/secret.jpg", "x");
    fixture.create_text_file(".DS_Store", "x");

    let result = DirectoryScanner::new().scan_directory(fixture.path(), None, None);

    assert_eq!(result.total_files(), 6);
    let images = result.get(MediaCategory::Image).expect("image stats");
    assert_eq!(images.count, 1);
    assert_eq!(images.extension_histogram.get(".jpg"), Some(&1));
    assert_eq!(result.get(MediaCategory::ThreeD).map(|s| s.count), Some(1));
    let other = result.get(MediaCategory::Other).expect("other stats");
    assert_eq!(other.extension_histogram.get(""), Some(&1));

    for (_, stats) in result.iter() {
        assert_eq!(stats.count, stats.file_paths.len());
        assert_eq!(stats.count, stats.extension_histogram.values().sum::<usize>());
    }
}

#[test]
fn test_scan_multiple_roots_progress_is_continuous() {
    let first = TestFixture::new();
    let second = TestFixture::new();
    first.create_text_file("a.mp3", "a");
    first.create_text_file("b.mp3", "b");
    second.create_text_file("c.png", "c");

    let mut calls: Vec<(usize, usize)> = Vec::new();
    let mut on_progress = |done: usize, total: usize, _: &Path| calls.push((done, total));
    let result = DirectoryScanner::new().scan_multiple_directories(
        &[first.path(), second.path()],
        Some(&mut on_progress),
        None,
    );

    assert_eq!(result.total_files(), 3);
    assert!(calls.iter().all(|(_, total)| *total == 3));
    assert_eq!(calls.last(), Some(&(3, 3)));
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_scan_cancelled_before_start_returns_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.mp4", "a");
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = DirectoryScanner::new().scan_directory(fixture.path(), None, Some(&cancel));
    assert!(result.is_empty());
}

// ============================================================================
// Test Suite 2: Default Rules
// ============================================================================

#[test]
fn test_large_video_is_isolated_with_collision_suffix() {
    let fixture = TestFixture::new();
    fixture.create_sized_file("a/clip.mp4", 150 * MB);
    fixture.create_sized_file("b/clip.mp4", 150 * MB);

    let report = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 0);
    fixture.assert_target_exists("large_videos/clip.mp4");
    fixture.assert_target_exists("large_videos/clip_01.mp4");
    fixture.assert_source_not_exists("a/clip.mp4");
    fixture.assert_source_not_exists("b/clip.mp4");
    assert_eq!(report.by_rule.get("large_video_isolation"), Some(&2));
}

#[test]
fn test_raw_audio_is_copied() {
    let fixture = TestFixture::new();
    fixture.create_text_file("session/notes.wav", "pcm data");

    let report = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(report.processed, 1);
    fixture.assert_source_exists("session/notes.wav");
    fixture.assert_target_exists("raw_audio/notes.wav");
    let op = report.applied().next().expect("one operation");
    assert_eq!(op.operation, OperationKind::Copy);
    assert_eq!(op.rule_id, "raw_audio_separation");
}

#[test]
fn test_document_goes_to_extension_folder() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/Invoice.PDF", "%PDF-1.4");

    let report = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(report.processed, 1);
    fixture.assert_target_exists("documents/pdf/Invoice.PDF");
    fixture.assert_source_not_exists("inbox/Invoice.PDF");
}

#[test]
fn test_unmatched_file_is_skipped_and_untouched() {
    let fixture = TestFixture::new();
    fixture.create_text_file("misc/data.bin", "bytes");
    fixture.create_sized_file("clips/short.mp4", 10 * MB);

    let report = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 2);
    fixture.assert_source_exists("misc/data.bin");
    fixture.assert_source_exists("clips/short.mp4");
    assert!(TestFixture::list_files_recursive(fixture.target()).is_empty());
}

#[test]
fn test_old_file_is_archived_by_year() {
    let fixture = TestFixture::new();
    fixture.create_text_file("old/data.bin", "bytes");
    fixture.age_file("old/data.bin", 400);

    let report = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(report.processed, 1);
    let op = report.applied().next().expect("one operation");
    assert_eq!(op.rule_id, "old_file_archiving");
    let year_dir = op
        .target
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .expect("year directory");
    assert_eq!(year_dir.len(), 4);
    assert!(op.target.starts_with(fixture.target().join("archive")));
    assert!(op.target.is_file());
}

#[test]
fn test_small_image_beats_archive_by_priority() {
    let fixture = TestFixture::new();
    fixture.create_text_file("pics/old.png", "png");
    fixture.age_file("pics/old.png", 800);

    let report = fixture.apply(RuleSet::with_defaults(), false);

    let op = report.applied().next().expect("one operation");
    assert_eq!(op.rule_id, "small_image_collection");
    fixture.assert_target_exists("small_images/old.png");
    fixture.assert_source_exists("pics/old.png");
}

// ============================================================================
// Test Suite 3: Dry Run
// ============================================================================

#[test]
fn test_dry_run_matches_live_run_without_touching_disk() {
    let build = |fixture: &TestFixture| {
        fixture.create_sized_file("a/clip.mp4", 120 * MB);
        fixture.create_sized_file("b/clip.mp4", 120 * MB);
        fixture.create_text_file("c/notes.wav", "pcm");
        fixture.create_text_file("d/letter.docx", "doc");
        fixture.create_text_file("e/unknown.xyz", "?");
    };

    let fixture = TestFixture::new();
    build(&fixture);
    let before = TestFixture::list_files_recursive(fixture.path());

    let dry = fixture.apply(RuleSet::with_defaults(), true);

    assert!(dry.dry_run);
    assert_eq!(TestFixture::list_files_recursive(fixture.path()), before);
    assert!(TestFixture::list_files_recursive(fixture.target()).is_empty());

    let live = fixture.apply(RuleSet::with_defaults(), false);

    assert_eq!(targets(&dry), targets(&live));
    assert_eq!(dry.processed, live.processed);
    assert_eq!(dry.skipped, live.skipped);
    for (_, target) in targets(&live) {
        assert!(target.is_file(), "missing {}", target.display());
    }
}

#[test]
fn test_dry_run_twice_is_stable() {
    let fixture = TestFixture::new();
    fixture.create_text_file("x/report.pdf", "pdf");
    fs::create_dir_all(fixture.target().join("documents/pdf")).expect("mkdir");
    fs::write(fixture.target().join("documents/pdf/report.pdf"), "existing").expect("write");

    let first = fixture.apply(RuleSet::with_defaults(), true);
    let second = fixture.apply(RuleSet::with_defaults(), true);

    assert_eq!(targets(&first), targets(&second));
    assert_eq!(
        targets(&first)[0].1,
        fixture.target().join("documents/pdf/report_01.pdf")
    );
}

// ============================================================================
// Test Suite 4: Custom Rules
// ============================================================================

#[test]
fn test_rule_document_round_trip_through_file() {
    let fixture = TestFixture::new();
    let doc = fixture.target().join("rules.json");

    RuleSet::with_defaults().save(&doc).expect("save rules");
    let loaded = RuleSet::load(&doc).expect("load rules");

    assert_eq!(loaded, RuleSet::with_defaults());
    let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "large_video_isolation",
            "raw_audio_separation",
            "small_image_collection",
            "document_organization",
            "old_file_archiving"
        ]
    );
}

#[test]
fn test_rule_document_from_json_with_templates() {
    let fixture = TestFixture::new();
    fixture.create_text_file("shots/a.jpeg", "a");
    fixture.create_text_file("shots/b.png", "b");

    let rules = RuleSet::from_json(
        r#"[
            {
                "id": "by_type",
                "name": "By type",
                "description": "",
                "condition": { "media_type": "image" },
                "action": { "operation": "copy", "target_dir": "{media_type}/{extension}" }
            }
        ]"#,
    )
    .expect("valid document");

    let report = fixture.apply(rules, false);

    assert_eq!(report.processed, 2);
    fixture.assert_target_exists("image/jpeg/a.jpeg");
    fixture.assert_target_exists("image/png/b.png");
}

#[test]
fn test_lower_priority_number_wins() {
    let fixture = TestFixture::new();
    fixture.create_text_file("song.mp3", "mp3");

    let audio = ConditionSpec {
        media_type: Some(MediaCategory::Audio),
        ..Default::default()
    };
    let rules = RuleSet::from_rules(vec![
        rule("late", audio.clone(), OperationKind::Copy, "late", 20),
        rule("early", audio, OperationKind::Copy, "early", 10),
    ])
    .expect("valid rules");

    let report = fixture.apply(rules, false);

    let op = report.applied().next().expect("one operation");
    assert_eq!(op.rule_id, "early");
    fixture.assert_target_exists("early/song.mp3");
    assert!(!fixture.target().join("late").exists());
}

#[test]
fn test_disabled_rule_is_ignored() {
    let fixture = TestFixture::new();
    fixture.create_text_file("song.mp3", "mp3");

    let mut disabled = rule(
        "all_audio",
        ConditionSpec {
            media_type: Some(MediaCategory::Audio),
            ..Default::default()
        },
        OperationKind::Move,
        "audio",
        1,
    );
    disabled.enabled = false;
    let rules = RuleSet::from_rules(vec![disabled]).expect("valid rules");

    let report = fixture.apply(rules, false);

    assert_eq!(report.skipped, 1);
    fixture.assert_source_exists("song.mp3");
}

#[test]
fn test_escaping_template_is_reported_not_executed() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "a");

    let rules = RuleSet::from_rules(vec![rule(
        "escape",
        ConditionSpec::default(),
        OperationKind::Move,
        "../outside",
        1,
    )])
    .expect("valid rules");

    let report = fixture.apply(rules, false);

    assert_eq!(report.errors, 1);
    assert!(matches!(report.operations[0], ReportEntry::Failed(_)));
    fixture.assert_source_exists("a.txt");
}

#[test]
fn test_missing_source_is_error_entry() {
    let fixture = TestFixture::new();
    let ghost = FileRecord::new(fixture.path().join("ghost.pdf"), 1, MediaCategory::Document);

    let report = RuleEngine::new().apply_rules(&[ghost], fixture.target(), false, None, None);

    assert_eq!(report.errors, 1);
    assert_eq!(report.processed, 0);
}

// ============================================================================
// Test Suite 5: Configuration and Filtering
// ============================================================================

#[test]
fn test_config_filters_exclude_from_scan() {
    let fixture = TestFixture::new();
    fixture.create_text_file("keep.jpg", "a");
    fixture.create_text_file("Thumbs.db", "b");
    fixture.create_text_file("cache/tmp.log", "c");
    fixture.create_text_file("draft.tmp", "d");

    let config = Config::from_toml_str(
        r#"
        [scan.exclude]
        filenames = ["Thumbs.db"]
        patterns = ["*/cache/*"]
        extensions = ["tmp"]
        "#,
    )
    .expect("valid config");
    let scanner = DirectoryScanner::with_filters(config.compile_filters().expect("filters"));

    let result = scanner.scan_directory(fixture.path(), None, None);

    assert_eq!(result.total_files(), 1);
    assert_eq!(result.get(MediaCategory::Image).map(|s| s.count), Some(1));
}

#[test]
fn test_config_file_is_loaded_with_rules_path() {
    let fixture = TestFixture::new();
    let config_path = fixture.target().join("dataflux.toml");
    fs::write(
        &config_path,
        "[rules]\nfile = \"/tmp/rules.json\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .expect("write config");

    let config = Config::load(Some(&config_path)).expect("load config");

    assert_eq!(config.rules.file, Some(PathBuf::from("/tmp/rules.json")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_explicit_missing_config_is_error() {
    let fixture = TestFixture::new();
    assert!(Config::load(Some(&fixture.path().join("absent.toml"))).is_err());
}

// ============================================================================
// Test Suite 6: Flatten and Sort
// ============================================================================

#[test]
fn test_sort_then_scan_target() {
    let fixture = TestFixture::new();
    fixture.create_text_file("2019/trip/img1.jpg", "1");
    fixture.create_text_file("2020/img1.jpg", "2");
    fixture.create_text_file("2020/talk.m4a", "3");

    let report = FileProcessor::new(false).sort_by_type(fixture.path(), fixture.target(), None, None);

    assert_eq!(report.processed, 3);
    fixture.assert_target_exists("image/img1.jpg");
    fixture.assert_target_exists("image/img1_01.jpg");
    fixture.assert_target_exists("audio/talk.m4a");

    let rescan = DirectoryScanner::new().scan_directory(fixture.target(), None, None);
    assert_eq!(rescan.get(MediaCategory::Image).map(|s| s.count), Some(2));
}

#[test]
fn test_flatten_cancelled_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a/b/c.txt", "c");
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = FileProcessor::new(false).flatten_directory(
        fixture.path(),
        fixture.target(),
        None,
        None,
        Some(&cancel),
    );

    assert!(report.cancelled);
    assert_eq!(report.processed, 0);
    fixture.assert_source_exists("a/b/c.txt");
}

// ============================================================================
// Test Suite 7: CLI Workflows
// ============================================================================

#[test]
fn test_cli_apply_writes_report() {
    let fixture = TestFixture::new();
    fixture.create_text_file("letters/cover.odt", "odt");
    let report_path = fixture.target().join("report.json");

    run_cli(
        Command::Apply {
            dirs: vec![fixture.path().to_path_buf()],
            target: fixture.target().join("out"),
            rules: None,
            dry_run: false,
            report: Some(report_path.clone()),
        },
        &Config::default(),
        &CancelToken::new(),
    )
    .expect("apply succeeds");

    fixture.assert_target_exists("out/documents/odt/cover.odt");
    let written: Report =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("read report"))
            .expect("report is JSON");
    assert_eq!(written.processed, 1);
    assert!(!written.dry_run);
}

#[test]
fn test_cli_rules_export_then_apply_with_exported_rules() {
    let fixture = TestFixture::new();
    let doc = fixture.target().join("exported.json");
    fixture.create_text_file("take.aiff", "aiff");

    run_cli(
        Command::Rules {
            action: RulesCommand::Export {
                file: doc.clone(),
                rules: None,
            },
        },
        &Config::default(),
        &CancelToken::new(),
    )
    .expect("export succeeds");
    assert!(doc.is_file());

    run_cli(
        Command::Apply {
            dirs: vec![fixture.path().to_path_buf()],
            target: fixture.target().join("out"),
            rules: Some(doc),
            dry_run: true,
            report: None,
        },
        &Config::default(),
        &CancelToken::new(),
    )
    .expect("dry run succeeds");

    fixture.assert_source_exists("take.aiff");
    assert!(!fixture.target().join("out").exists());
}

#[test]
fn test_cli_apply_with_missing_rules_file_fails_without_moving() {
    let fixture = TestFixture::new();
    fixture.create_text_file("notes.pdf", "%PDF-1.4");

    let result = run_cli(
        Command::Apply {
            dirs: vec![fixture.path().to_path_buf()],
            target: fixture.target().to_path_buf(),
            rules: Some(fixture.path().join("typo_rules.json")),
            dry_run: false,
            report: None,
        },
        &Config::default(),
        &CancelToken::new(),
    );

    assert!(result.is_err());
    fixture.assert_source_exists("notes.pdf");
    assert!(TestFixture::list_files_recursive(fixture.target()).is_empty());
}

#[test]
fn test_cli_flatten_rejects_missing_source() {
    let fixture = TestFixture::new();
    let result = run_cli(
        Command::Flatten {
            source: fixture.path().join("nope"),
            target: fixture.target().to_path_buf(),
            extensions: Vec::new(),
            dry_run: false,
        },
        &Config::default(),
        &CancelToken::new(),
    );
    assert!(result.is_err());
}
