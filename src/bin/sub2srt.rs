use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use sub2srt::{
    CancellationToken, DEFAULT_CODEC, ExportOptions, OcrSettings, OperationType, Pipeline,
    PipelineOptions, ProgressCallback, ProgressInfo, RecognizeOptions, SelectionMode, Toolchain,
    TrackExporter, language_allow_list, resolve_container,
};

const CLI_AFTER_HELP: &str = "Examples:\n  sub2srt convert movie.mkv --out subs --language en --progress\n  sub2srt convert movie.2.eng.sup --force\n  sub2srt tracks movie.mkv --json\n  sub2srt doctor\n  sub2srt completions zsh > _sub2srt";

/// Window height used when `--window-height` is given without a value, and
/// when stderr is a terminal.
const DEFAULT_WINDOW_HEIGHT: &str = "10";

#[derive(Debug, Parser)]
#[command(
    name = "sub2srt",
    version,
    about = "Convert image-based subtitle tracks into SRT caption files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline on a container, directory, .sup stream, or .xml event list.
    #[command(
        about = "Convert subtitles to SRT",
        after_help = "Examples:\n  sub2srt convert movie.mkv --out subs --all-tracks\n  sub2srt convert subtitles.xml --limit 20 --force"
    )]
    Convert {
        /// Input path: .mkv container, directory holding one, .sup stream, or .xml event list.
        input: PathBuf,
        /// Directory for the caption files (defaults to the input's directory).
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Parent directory for the per-run working directory.
        #[arg(long, short)]
        tmpdir: Option<PathBuf>,
        /// Only recognise this many cues per event list.
        #[arg(long, short)]
        limit: Option<usize>,
        /// Overwrite existing caption files.
        #[arg(long, short)]
        force: bool,
        /// Show a progress bar during recognition.
        #[arg(long, short)]
        progress: bool,
        /// Only export tracks in this language (two- or three-letter code, repeatable).
        #[arg(long = "language", value_name = "CODE")]
        languages: Vec<String>,
        /// Export every matching track instead of the first.
        #[arg(long, conflicts_with = "prefer_default")]
        all_tracks: bool,
        /// Prefer the track flagged as default over dump order.
        #[arg(long)]
        prefer_default: bool,
        /// Accept this codec ID (repeatable; defaults to S_HDMV/PGS).
        #[arg(long = "codec", value_name = "ID")]
        codecs: Vec<String>,
        /// Path to the BDSup2Sub jar (defaults to $BDSUP2SUB_JAR).
        #[arg(long)]
        jar: Option<PathBuf>,
        /// Stream tool output into a scrolling window of this many lines
        /// (on by default when stderr is a terminal).
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_WINDOW_HEIGHT)]
        window_height: Option<usize>,
        /// Capture tool output instead of streaming it.
        #[arg(long, conflicts_with = "window_height")]
        no_window: bool,
        /// Tesseract language model, e.g. eng.
        #[arg(long)]
        model: Option<String>,
    },

    /// List a container's subtitle tracks.
    #[command(
        about = "List subtitle tracks",
        after_help = "Examples:\n  sub2srt tracks movie.mkv\n  sub2srt tracks movie.mkv --json --all-codecs"
    )]
    Tracks {
        /// Container or directory holding one.
        input: PathBuf,
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Only list tracks in this language (repeatable).
        #[arg(long = "language", value_name = "CODE")]
        languages: Vec<String>,
        /// List subtitle tracks of every codec.
        #[arg(long)]
        all_codecs: bool,
    },

    /// Report which external tools were found.
    Doctor,

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Drives an indicatif bar from recognition progress.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match info.operation {
            OperationType::Recognition => {
                if let Some(total) = info.total {
                    self.bar.set_length(total);
                }
                self.bar.set_position(info.current);
                self.bar.set_message("recognising");
            }
            OperationType::TrackExport => self
                .bar
                .set_message(format!("{} container(s) exported", info.current)),
            OperationType::Conversion => self
                .bar
                .set_message(format!("{} stream(s) converted", info.current)),
            _ => {}
        }
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn selection_mode(all_tracks: bool, prefer_default: bool) -> SelectionMode {
    if all_tracks {
        SelectionMode::All
    } else if prefer_default {
        SelectionMode::PreferDefault
    } else {
        SelectionMode::First
    }
}

/// Captions land next to the input unless `--out` says otherwise.
fn default_output_dir(input: &Path) -> PathBuf {
    if input.is_dir() {
        return input.to_path_buf();
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn export_options(
    languages: &[String],
    codecs: Vec<String>,
) -> Result<ExportOptions, Box<dyn std::error::Error>> {
    let mut options = ExportOptions::new().with_languages(language_allow_list(languages)?);
    if !codecs.is_empty() {
        options = options.with_codecs(codecs);
    }
    Ok(options)
}

/// An explicit height wins; otherwise stream only to an interactive stderr.
fn live_window_height(
    requested: Option<usize>,
    disabled: bool,
    interactive: bool,
) -> Option<usize> {
    if disabled {
        return None;
    }
    requested.or_else(|| {
        interactive
            .then(|| DEFAULT_WINDOW_HEIGHT.parse().ok())
            .flatten()
    })
}

/// Returns `Ok(false)` when the command ran but something in it failed.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Convert {
            input,
            out,
            tmpdir,
            limit,
            force,
            progress,
            languages,
            all_tracks,
            prefer_default,
            codecs,
            jar,
            window_height,
            no_window,
            model,
        } => {
            let mut toolchain = Toolchain::discover();
            if let Some(jar) = jar {
                toolchain = toolchain.with_bdsup2sub_jar(jar);
            }

            let export = export_options(&languages, codecs)?
                .with_selection(selection_mode(all_tracks, prefer_default))
                .with_live_window(live_window_height(
                    window_height,
                    no_window,
                    std::io::stderr().is_terminal(),
                ));

            let progress_bar = if progress {
                Some(Arc::new(BarProgress::new()?))
            } else {
                None
            };
            let mut recognize = RecognizeOptions::new()
                .with_limit(limit)
                .with_overwrite(force)
                .with_ocr(OcrSettings {
                    model,
                    ..OcrSettings::default()
                });
            if let Some(bar) = &progress_bar {
                recognize = recognize.with_progress(Arc::clone(bar) as Arc<dyn ProgressCallback>);
            }

            let token = CancellationToken::new();
            let handler_token = token.clone();
            ctrlc::set_handler(move || {
                eprintln!("{}", "interrupted, stopping...".yellow());
                handler_token.cancel();
            })?;

            let out = out.unwrap_or_else(|| default_output_dir(&input));
            let mut options = PipelineOptions::new(out)
                .with_export(export)
                .with_recognize(recognize)
                .with_cancellation(token);
            if let Some(tmpdir) = tmpdir {
                options = options.with_working_root(tmpdir);
            }

            let report = Pipeline::new(toolchain, options).run(&input)?;
            if let Some(bar) = progress_bar {
                bar.bar.finish_with_message("done");
            }

            for path in &report.written {
                println!("{} {}", "success:".green().bold(), path.display());
            }
            for path in &report.skipped {
                println!(
                    "{} {}",
                    "skipped:".yellow().bold(),
                    format!("{} exists (use --force to replace)", path.display()).yellow()
                );
            }
            for failure in &report.failures {
                println!(
                    "{} {}",
                    "failed:".red().bold(),
                    format!("{} ({}): {}", failure.input.display(), failure.stage, failure.error)
                        .red()
                );
            }
            Ok(report.is_success())
        }
        Commands::Tracks {
            input,
            json,
            languages,
            all_codecs,
        } => {
            let codecs = if all_codecs {
                Vec::new()
            } else {
                vec![DEFAULT_CODEC.to_string()]
            };
            let options = export_options(&languages, Vec::new())?.with_codecs(codecs);
            let exporter = TrackExporter::new(&Toolchain::discover(), options)?;
            let container = resolve_container(&input)?;
            let tracks = exporter.list_tracks(&container, &exporter.filter())?;

            let stem = container
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            if json {
                let payload: Vec<_> = tracks
                    .iter()
                    .map(|track| {
                        json!({
                            "id": track.id,
                            "type": track.track_type,
                            "codec": track.codec,
                            "language": track.language,
                            "default": track.is_default,
                            "forced": track.is_forced,
                            "name": track.name,
                            "filename": track.derived_filename(&stem),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if tracks.is_empty() {
                println!("No matching subtitle tracks in {}", container.display());
            } else {
                for track in &tracks {
                    let mut flags = Vec::new();
                    if track.is_default {
                        flags.push("default");
                    }
                    if track.is_forced {
                        flags.push("forced");
                    }
                    println!(
                        "{:>3}  {:<14} {:<4} {:<16} {}",
                        track.id,
                        track.codec,
                        track.language,
                        flags.join(","),
                        track.name.as_deref().unwrap_or("")
                    );
                }
            }
            Ok(true)
        }
        Commands::Doctor => {
            let toolchain = Toolchain::discover();
            let mut complete = true;
            for (tool, location) in toolchain.report() {
                match location {
                    Some(path) => println!(
                        "{} {:<12} {}",
                        "ok".green().bold(),
                        tool.to_string(),
                        path.display()
                    ),
                    None => {
                        complete = false;
                        println!(
                            "{} {:<12} {}",
                            "missing".red().bold(),
                            tool.to_string(),
                            tool.install_hint().red()
                        );
                    }
                }
            }
            Ok(complete)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "sub2srt", &mut std::io::stdout());
            Ok(true)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_arguments_parse() {
        let cli = Cli::try_parse_from([
            "sub2srt",
            "convert",
            "movie.mkv",
            "--language",
            "en",
            "--language",
            "de",
            "--all-tracks",
            "--limit",
            "5",
            "--window-height",
        ])
        .unwrap();
        match cli.command {
            Commands::Convert {
                languages,
                all_tracks,
                limit,
                window_height,
                ..
            } => {
                assert_eq!(languages, ["en", "de"]);
                assert!(all_tracks);
                assert_eq!(limit, Some(5));
                assert_eq!(window_height, Some(10));
            }
            other => panic!("Expected Convert, got: {other:?}"),
        }
    }

    #[test]
    fn all_tracks_conflicts_with_prefer_default() {
        assert!(
            Cli::try_parse_from(["sub2srt", "convert", "x.mkv", "--all-tracks", "--prefer-default"])
                .is_err()
        );
    }

    #[test]
    fn live_window_defaults_to_terminal_output() {
        assert_eq!(live_window_height(None, false, true), Some(10));
        assert_eq!(live_window_height(None, false, false), None);
        assert_eq!(live_window_height(Some(4), false, false), Some(4));
        assert_eq!(live_window_height(None, true, true), None);
        assert!(
            Cli::try_parse_from(["sub2srt", "convert", "x.mkv", "--no-window", "--window-height"])
                .is_err()
        );
    }

    #[test]
    fn selection_flags_map_to_modes() {
        assert_eq!(selection_mode(false, false), SelectionMode::First);
        assert_eq!(selection_mode(false, true), SelectionMode::PreferDefault);
        assert_eq!(selection_mode(true, false), SelectionMode::All);
    }

    #[test]
    fn output_defaults_to_input_directory() {
        assert_eq!(
            default_output_dir(Path::new("/videos/movie.mkv")),
            PathBuf::from("/videos")
        );
        assert_eq!(default_output_dir(Path::new("movie.mkv")), PathBuf::from("."));
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(export_options(&["xx".to_string()], Vec::new()).is_err());
    }
}
