//! Track export tests.
//!
//! Unix-only tests stand in for `mkvinfo` and `mkvextract` with small shell
//! scripts, so the exporter's command lines and dump handling are exercised
//! without MKVToolNix installed.

use std::fs;
use std::path::Path;

use sub2srt::{ExportOptions, Sub2SrtError, Toolchain, TrackExporter, resolve_container};

#[test]
fn directory_with_one_container_resolves_to_it() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("movie.mkv"), b"").expect("Failed to write container");
    fs::write(dir.path().join("notes.txt"), b"").expect("Failed to write note");

    let container = resolve_container(dir.path()).expect("Container should resolve");
    assert_eq!(container, dir.path().join("movie.mkv"));
}

#[test]
fn directory_with_several_containers_is_ambiguous() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("b.mkv"), b"").expect("Failed to write container");
    fs::write(dir.path().join("a.MKS"), b"").expect("Failed to write container");

    match resolve_container(dir.path()) {
        Err(Sub2SrtError::AmbiguousInput { candidates, .. }) => {
            assert_eq!(
                candidates,
                [dir.path().join("a.MKS"), dir.path().join("b.mkv")]
            );
        }
        other => panic!("Expected AmbiguousInput, got {other:?}"),
    }
}

#[test]
fn empty_directory_or_missing_path_is_not_found() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    assert!(matches!(
        resolve_container(dir.path()),
        Err(Sub2SrtError::NotFound { .. })
    ));
    assert!(matches!(
        resolve_container(&dir.path().join("missing.mkv")),
        Err(Sub2SrtError::NotFound { .. })
    ));
}

#[test]
fn exporter_requires_mkvtoolnix() {
    let result = TrackExporter::new(&Toolchain::default(), ExportOptions::new());
    assert!(matches!(result, Err(Sub2SrtError::MissingDependency { .. })));
}

#[test]
fn container_extension_is_case_insensitive() {
    assert!(sub2srt::export::is_container(Path::new("/videos/Movie.MKV")));
    assert!(sub2srt::export::is_container(Path::new("movie.mk3d")));
    assert!(!sub2srt::export::is_container(Path::new("movie.mp4")));
    assert!(!sub2srt::export::is_container(Path::new("mkv")));
}

#[cfg(unix)]
mod scripted {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use sub2srt::{
        ExportOptions, JobItem, SelectionMode, Sub2SrtError, Tool, Toolchain, TrackExporter,
        TrackFilter, language_allow_list,
    };

    /// Scripts must not be written while another test is forking, or the
    /// exec can fail with "text file busy".
    static TOOLS: Mutex<()> = Mutex::new(());

    const DUMP: &str = "\
+ EBML head
+ Segment: size 4242
|+ Tracks
| + Track
|  + Track number: 1 (track ID for mkvmerge & mkvextract: 0)
|  + Track type: subtitles
|  + Codec ID: S_HDMV/PGS
|  + Language: eng
| + Track
|  + Track number: 2 (track ID for mkvmerge & mkvextract: 1)
|  + Track type: subtitles
|  + \"Default track\" flag: 1
|  + Codec ID: S_HDMV/PGS
|  + Language: fre
| + Track
|  + Track number: 3 (track ID for mkvmerge & mkvextract: 2)
|  + Track type: subtitles
|  + Codec ID: S_HDMV/PGS
|  + Language: eng
|+ Cluster
";

    struct FakeTools {
        root: tempfile::TempDir,
        toolchain: Toolchain,
    }

    impl FakeTools {
        fn new(extract_exit: i32) -> Self {
            let root = tempfile::tempdir().expect("Failed to create temp dir");
            let dump = root.path().join("dump.txt");
            fs::write(&dump, DUMP).expect("Failed to write dump");
            let calls = root.path().join("calls.log");

            let mkvinfo = write_script(
                root.path(),
                "mkvinfo",
                &format!("cat '{}'\n", dump.display()),
            );
            let mkvextract = write_script(
                root.path(),
                "mkvextract",
                &format!(
                    "echo \"$@\" >> '{calls}'\n\
                     [ \"$2\" = tracks ] || exit 9\n\
                     out=\"${{3#*:}}\"\n\
                     echo 'Progress: 100%'\n\
                     printf 'PG' > \"$out\"\n\
                     exit {extract_exit}\n",
                    calls = calls.display()
                ),
            );

            let toolchain = Toolchain::default()
                .with_tool(Tool::MkvInfo, mkvinfo)
                .with_tool(Tool::MkvExtract, mkvextract);
            Self { root, toolchain }
        }

        fn container(&self) -> PathBuf {
            let container = self.root.path().join("movie.mkv");
            fs::write(&container, b"").expect("Failed to write container");
            container
        }

        fn calls(&self) -> Vec<String> {
            fs::read_to_string(self.root.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("Failed to write script");
        let mut permissions = fs::metadata(&path)
            .expect("Script should exist")
            .permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).expect("Failed to mark script executable");
        path
    }

    fn shell_available() -> bool {
        Path::new("/bin/sh").exists()
    }

    #[test]
    fn exports_every_matching_track_in_dump_order() {
        if !shell_available() {
            return;
        }
        let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tools = FakeTools::new(0);
        let container = tools.container();
        let tracks_dir = tools.root.path().join("tracks");

        let exporter = TrackExporter::new(
            &tools.toolchain,
            ExportOptions::new().with_selection(SelectionMode::All),
        )
        .expect("Fake tools should satisfy the exporter");
        let listed = exporter
            .list_tracks(&container, &TrackFilter::unrestricted())
            .expect("Listing should succeed");
        let exported = exporter
            .export(&JobItem::new(&container, "/videos"), &tracks_dir)
            .expect("Export should succeed");

        assert_eq!(exported.len(), listed.len());
        let names: Vec<String> = exported
            .iter()
            .map(|job| {
                job.input_path()
                    .file_name()
                    .expect("Exported file has a name")
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(
            names,
            ["movie.0.eng.sup", "movie.1.fre.default.sup", "movie.2.eng.sup"]
        );
        assert!(exported.iter().all(|job| job.input_path().is_file()));
        assert!(exported.iter().all(|job| job.output_dir() == Path::new("/videos")));

        let calls = tools.calls();
        assert_eq!(calls.len(), 3);
        let expected = tracks_dir.join("movie.1.fre.default.sup");
        assert!(calls[1].ends_with(&format!("tracks 1:{}", expected.display())));
    }

    #[test]
    fn language_and_default_selection_narrow_the_export() {
        if !shell_available() {
            return;
        }
        let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tools = FakeTools::new(0);
        let container = tools.container();
        let tracks_dir = tools.root.path().join("tracks");

        let english = ExportOptions::new()
            .with_selection(SelectionMode::All)
            .with_languages(language_allow_list(&["en"]).expect("English resolves"));
        let exported = TrackExporter::new(&tools.toolchain, english)
            .expect("Fake tools should satisfy the exporter")
            .export(&JobItem::new(&container, "/videos"), &tracks_dir)
            .expect("Export should succeed");
        assert_eq!(exported.len(), 2);

        let preferred = ExportOptions::new().with_selection(SelectionMode::PreferDefault);
        let exported = TrackExporter::new(&tools.toolchain, preferred)
            .expect("Fake tools should satisfy the exporter")
            .export(&JobItem::new(&container, "/videos"), &tracks_dir)
            .expect("Export should succeed");
        assert_eq!(exported.len(), 1);
        assert!(exported[0].input_path().ends_with("movie.1.fre.default.sup"));
    }

    #[test]
    fn no_matching_track_is_not_found() {
        if !shell_available() {
            return;
        }
        let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tools = FakeTools::new(0);
        let container = tools.container();

        let options = ExportOptions::new()
            .with_languages(language_allow_list(&["ja"]).expect("Japanese resolves"));
        let result = TrackExporter::new(&tools.toolchain, options)
            .expect("Fake tools should satisfy the exporter")
            .export(
                &JobItem::new(&container, "/videos"),
                &tools.root.path().join("tracks"),
            );

        assert!(matches!(result, Err(Sub2SrtError::NotFound { .. })));
        assert!(tools.calls().is_empty());
    }

    #[test]
    fn failed_extraction_is_an_export_error() {
        if !shell_available() {
            return;
        }
        let _guard = TOOLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tools = FakeTools::new(2);
        let container = tools.container();

        let result = TrackExporter::new(&tools.toolchain, ExportOptions::new())
            .expect("Fake tools should satisfy the exporter")
            .export(
                &JobItem::new(&container, "/videos"),
                &tools.root.path().join("tracks"),
            );

        match result {
            Err(Sub2SrtError::Export { container: failed, source }) => {
                assert_eq!(failed, container);
                assert_eq!(source.exit_code, Some(2));
            }
            other => panic!("Expected an export error, got {other:?}"),
        }
    }
}
