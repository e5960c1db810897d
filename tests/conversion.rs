//! Subtitle stream conversion tests.
//!
//! A shell script stands in for the Java runtime, answering the version
//! query and writing an event list where the converter would.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sub2srt::{FormatConverter, JobItem, Sub2SrtError, Tool, Toolchain};

/// Serialises script creation with process spawning in this binary.
static TOOLS: Mutex<()> = Mutex::new(());

const FAKE_JAVA: &str = r#"#!/bin/sh
[ "$1" = "-jar" ] || exit 64
if [ "$3" = "--version" ]; then
    echo "BDSup2Sub 5.1.2"
    exit 0
fi
[ "$3" = "-o" ] || exit 65
out="$4"
case "$5" in
    *broken*) echo "Unsupported stream" >&2; exit 3 ;;
    *silent*) exit 0 ;;
esac
echo "Decoding frame 1/1"
printf '<BDN/>' > "$out"
"#;

struct Fixture {
    root: tempfile::TempDir,
    toolchain: Toolchain,
}

fn fixture() -> Option<Fixture> {
    if !Path::new("/bin/sh").exists() {
        return None;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let java = root.path().join("java");
    fs::write(&java, FAKE_JAVA).expect("Failed to write fake java");
    let mut permissions = fs::metadata(&java).expect("Script should exist").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&java, permissions).expect("Failed to mark script executable");

    let jar = root.path().join("BDSup2Sub.jar");
    fs::write(&jar, b"PK").expect("Failed to write jar");

    let toolchain = Toolchain::default()
        .with_tool(Tool::Java, java)
        .with_bdsup2sub_jar(jar);
    Some(Fixture { root, toolchain })
}

fn stream(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"PG").expect("Failed to write stream");
    path
}

#[test]
fn converts_into_a_fresh_job_directory() {
    let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(fixture) = fixture() else {
        return;
    };
    let subtitles_dir = fixture.root.path().join("subtitles");
    let input = stream(fixture.root.path(), "movie.2.eng.sup");

    let converter = FormatConverter::new(&fixture.toolchain, None).expect("Converter should build");
    let first = converter
        .convert(&JobItem::new(&input, "/videos"), &subtitles_dir)
        .expect("Conversion should succeed");
    let second = converter
        .convert(&JobItem::new(&input, "/videos"), &subtitles_dir)
        .expect("Conversion should succeed");

    assert_eq!(first.output_dir(), Path::new("/videos"));
    assert!(first.input_path().is_file());
    assert!(first.input_path().ends_with("movie.2.eng.xml"));
    assert!(first.input_path().starts_with(&subtitles_dir));
    assert_ne!(first.input_path().parent(), second.input_path().parent());
}

#[test]
fn header_collects_banner_credits_and_files() {
    let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(fixture) = fixture() else {
        return;
    };
    let subtitles_dir = fixture.root.path().join("subtitles");
    let converter = FormatConverter::new(&fixture.toolchain, None).expect("Converter should build");

    let header = converter.header();
    assert_eq!(header.len(), 3);
    assert_eq!(header[0], "BDSup2Sub 5.1.2");
    assert!(header[1].contains("github.com"));

    for name in ["movie.2.eng.sup", "movie.3.ger.sup"] {
        let input = stream(fixture.root.path(), name);
        converter
            .convert(&JobItem::new(input, "/videos"), &subtitles_dir)
            .expect("Conversion should succeed");
    }
    let header = converter.header();
    assert_eq!(header.len(), 5);
    assert_eq!(header[3], " - Converting SUP File: 'movie.2.eng.sup'");
    assert_eq!(header[4], " - Converting SUP File: 'movie.3.ger.sup'");
}

#[test]
fn converter_failure_is_a_conversion_error() {
    let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(fixture) = fixture() else {
        return;
    };
    let input = stream(fixture.root.path(), "broken.sup");
    let converter = FormatConverter::new(&fixture.toolchain, None).expect("Converter should build");

    match converter.convert(&JobItem::new(&input, "/videos"), fixture.root.path()) {
        Err(Sub2SrtError::Conversion { input: failed, reason }) => {
            assert_eq!(failed, input);
            assert!(reason.contains("Unsupported stream"), "Unexpected reason: {reason}");
        }
        other => panic!("Expected a conversion error, got {other:?}"),
    }
}

#[test]
fn missing_event_list_is_a_conversion_error() {
    let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(fixture) = fixture() else {
        return;
    };
    let input = stream(fixture.root.path(), "silent.sup");
    let converter = FormatConverter::new(&fixture.toolchain, None).expect("Converter should build");

    let result = converter.convert(&JobItem::new(&input, "/videos"), fixture.root.path());
    assert!(matches!(result, Err(Sub2SrtError::Conversion { .. })));
}
