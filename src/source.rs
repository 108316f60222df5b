//! Chapter sources: reading files and discovering chapters under `text/`.
//!
//! Ordering rules:
//!
//! * top-level entries of the text directory are sorted by file name;
//! * names starting with `.` or `_` are skipped;
//! * a directory is one chapter made of every recognised file below it,
//!   sorted by path;
//! * a top-level file with a recognised extension is a one-file chapter;
//! * `CHANGELOG.*` and `TOC.*` are never chapters.

use crate::error::BookError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions recognised as chapter files.
pub const EXTENSIONS: &[&str] = &["md", "mkdn", "markdown", "textile", "html"];

static RE_IGNORED_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(CHANGELOG|TOC)\..*$").unwrap());

/// Reads source files (chapters and referenced code files).
pub trait SourceReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads from the local file system, normalising `\r\n` to `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let text = std::fs::read_to_string(path)?;
        Ok(if text.contains('\r') {
            text.replace("\r\n", "\n")
        } else {
            text
        })
    }
}

/// One chapter: an ordered list of files rendered back to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// Entry name under the text directory (file or directory name).
    pub name: String,
    pub files: Vec<PathBuf>,
}

impl Chapter {
    pub fn new(name: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }
}

/// List the chapters under `text_dir` in document order.
pub fn discover_chapters(text_dir: &Path) -> Result<Vec<Chapter>, BookError> {
    if !text_dir.is_dir() {
        return Err(BookError::SourceDirNotFound {
            path: text_dir.to_path_buf(),
        });
    }

    let mut entries: Vec<(String, PathBuf)> = std::fs::read_dir(text_dir)
        .map_err(|e| BookError::ReadFailed {
            path: text_dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut chapters = Vec::new();
    for (name, path) in entries {
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let files = if path.is_dir() {
            chapter_files(&path)
        } else if is_chapter_file(&path) {
            vec![path]
        } else {
            continue;
        };

        if files.is_empty() {
            debug!("Skipping '{}': no markup files", name);
            continue;
        }
        chapters.push(Chapter::new(name, files));
    }
    Ok(chapters)
}

/// `text/CHANGELOG.*`, if present.
pub fn find_changelog(text_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(text_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("CHANGELOG."))
                    .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn chapter_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_chapter_extension(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

fn has_chapter_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_chapter_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    path.is_file() && has_chapter_extension(path) && !RE_IGNORED_FILE.is_match(name)
}
