//! CLI binary for bookmill.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and prints results.

use anyhow::{Context, Result};
use bookmill::{
    export, export::write_atomic, ExportConfig, ExportOutput, ExportProgressCallback,
    ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per chapter.
/// Chapters may finish out of order when rendered concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_export_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning chapters…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chapters  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        let started = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index));
        started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_chapters: usize) {
        self.activate_bar(total_chapters);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_chapters} chapters…"))
        ));
    }

    fn on_chapter_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_chapter_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
        let elapsed = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<24}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{html_len:>7} bytes")),
            dim(&format!("{elapsed:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chapter_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let elapsed = self.elapsed_secs(index);

        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<24}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{elapsed:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_export_complete(&self, total_chapters: usize, footnotes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chapters rendered, {} footnotes",
            green("✔"),
            bold(&total_chapters.to_string()),
            footnotes
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Book in the current directory, HTML on stdout
  bookmill

  # Write to a file
  bookmill my-book -o build/book.html

  # Render every snippet as plain text, skip the changelog
  bookmill my-book --plain-syntax --no-changelog -o book.html

  # Structured output (HTML plus per-chapter stats)
  bookmill my-book --json > book.json

BOOK LAYOUT:
  <root>/text/      chapters: files or directories, sorted by name
                    (.md .mkdn .markdown .textile .html); names starting
                    with '.' or '_' are skipped
  <root>/text/CHANGELOG.*   appended last, rendered without syntax colouring
  <root>/code/      files referenced by @@@ snippets

ANNOTATIONS:
  @@@ ruby app.rb            whole file
  @@@ ruby app.rb:2,5        lines 2 to 5
  @@@ ruby app.rb#setup      lines between @begin: setup and @end: setup
  @@@ ruby                   inline code up to the closing @@@
  &&& warning                callout <div class="warning"> up to &&&

ENVIRONMENT VARIABLES:
  RUST_LOG                  Override the log filter (e.g. bookmill=debug)
"#;

/// Pre-process annotated chapter sources into one HTML book.
#[derive(Parser, Debug)]
#[command(
    name = "bookmill",
    version,
    about = "Pre-process annotated chapter sources into one HTML book",
    long_about = "Render every chapter under <root>/text (markdown, textile or HTML) with \
@@@ code snippets and &&& callouts expanded, renumber footnotes across the whole book, \
and emit a single HTML document.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Book root directory (contains text/ and code/).
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long, env = "BOOKMILL_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of chapters rendered concurrently.
    #[arg(short, long, env = "BOOKMILL_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,

    /// Render every snippet with the plain `text` language.
    #[arg(long, env = "BOOKMILL_PLAIN_SYNTAX")]
    plain_syntax: bool,

    /// Do not append text/CHANGELOG.*.
    #[arg(long, env = "BOOKMILL_NO_CHANGELOG")]
    no_changelog: bool,

    /// Output structured JSON (ExportOutput) instead of HTML.
    #[arg(long, env = "BOOKMILL_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BOOKMILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BOOKMILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BOOKMILL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run export ───────────────────────────────────────────────────────
    let output = export(&config).await.context("Export failed")?;
    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        output.html.clone()
    };

    if let Some(ref output_path) = cli.output {
        write_atomic(output_path, &rendered)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        if !cli.quiet {
            print_summary(&output, Some(output_path));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        if !cli.quiet && !show_progress && !cli.json {
            print_summary(&output, None);
        }
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .root_dir(&cli.root)
        .concurrency(cli.concurrency as usize)
        .plain_syntax(cli.plain_syntax)
        .include_changelog(!cli.no_changelog);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &ExportOutput, path: Option<&PathBuf>) {
    let stats = &output.stats;
    let target = path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {} chapters  {} files  {}ms{}",
        if stats.dangling_footnote_links == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.total_chapters,
        stats.total_files,
        stats.total_duration_ms,
        target,
    );
    eprintln!(
        "   {} footnotes  /  {} dangling links",
        dim(&stats.footnotes.to_string()),
        dim(&stats.dangling_footnote_links.to_string()),
    );
}
