//! File sink rotation and retention against a real directory.

use std::sync::Arc;

use relay_core::{LogLevel, LogMessage};
use relay_format::{OutputFormat, TemplateEngine};
use relay_sinks::archive::ArchiveNaming;
use relay_sinks::{FileSink, FileSinkConfig, Sink};

fn engine() -> Arc<TemplateEngine> {
    Arc::new(TemplateEngine::with_default_template("{level} {category} {message}"))
}

#[test]
fn archives_follow_naming_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.txt");
    let config = FileSinkConfig::new(&path).max_file_size_bytes(0).retention_count(0);
    let sink = FileSink::new(config, engine()).unwrap();

    for i in 0..4 {
        sink.write(&LogMessage::new(LogLevel::Info, "Net", format!("packet {i}"))).unwrap();
    }

    let naming = ArchiveNaming::for_path(&path);
    let archives = sink.archives().unwrap();
    assert_eq!(archives.len(), 4);
    for archive in &archives {
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("session_"), "{name}");
        assert!(name.ends_with(".txt"), "{name}");
        assert!(naming.parse(&name).is_some(), "{name}");
    }

    // Newest first: the last write is in the first archive
    assert_eq!(
        std::fs::read_to_string(&archives[0]).unwrap(),
        "Info Net packet 3\n"
    );
}

#[test]
fn json_lines_stay_valid_across_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let config = FileSinkConfig::new(&path)
        .format(OutputFormat::Json)
        .max_file_size_bytes(400)
        .retention_count(0);
    let sink = FileSink::new(config, engine()).unwrap();

    let nasty = "quote \" backslash \\ newline \n tab \t cr \r bell \u{7} nul \u{0}";
    for i in 0..20 {
        let msg = LogMessage::builder(LogLevel::Error, "Json", format!("{i}: {nasty}"))
            .context("path", "C:\\temp\\x")
            .build();
        sink.write(&msg).unwrap();
    }
    sink.flush().unwrap();

    let mut files = sink.archives().unwrap();
    files.push(path.clone());
    let mut messages = Vec::new();
    for file in files {
        for line in std::fs::read_to_string(file).unwrap().lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["context"]["path"], "C:\\temp\\x");
            messages.push(value["message"].as_str().unwrap().to_string());
        }
    }
    assert_eq!(messages.len(), 20);
    assert!(messages.contains(&format!("7: {nasty}")));
}

#[test]
fn retention_leaves_other_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.log");
    let other = dir.path().join("other_20240101-000000-000.log");
    std::fs::write(&other, "not ours").unwrap();

    let config = FileSinkConfig::new(&path).max_file_size_bytes(0).retention_count(1);
    let sink = FileSink::new(config, engine()).unwrap();
    for _ in 0..3 {
        sink.write(&LogMessage::new(LogLevel::Warn, "Game", "tick")).unwrap();
    }

    assert_eq!(sink.archives().unwrap().len(), 1);
    assert!(other.exists());
}

#[test]
fn drop_flushes_buffered_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drop.log");
    {
        let sink = FileSink::new(FileSinkConfig::new(&path), engine()).unwrap();
        sink.write(&LogMessage::new(LogLevel::Info, "Core", "bye")).unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Info Core bye\n");
}
