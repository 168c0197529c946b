// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Workspace traversal and per-language aggregation.
//!
//! [`LocCounter`] owns the traversal policy: which entries are skipped, how
//! ambiguous filenames are resolved and how per-file results are summed. The
//! counting primitives themselves come from a [`LanguageClassifier`].

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError}
};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::{
    classifier::{FileCounts, LanguageClassifier, TokeiClassifier},
    error::Error,
    snapshot::{AggregateResult, LanguageBreakdown}
};

/// Directory holding version-control metadata; never descended into.
const VCS_DIR: &str = ".git";

/// Bytes of content handed to the disambiguator.
pub const DISAMBIGUATION_SAMPLE_LEN: usize = 20_000;

/// Extension overrides consulted before content-based disambiguation.
/// An override applies only when its language is among the candidates.
pub const EXTENSION_OVERRIDES: &[(&str, &str)] = &[("h", "C Header"), ("m", "Objective-C")];

/// Why a file did not contribute to the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read.
    Unreadable,
    /// No language matched the filename, or the backend rejected it.
    Unclassified,
    /// The content looked binary.
    Binary
}

/// Result of visiting one regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was attributed to `language`.
    Counted {
        /// Resolved language.
        language: String,
        /// Counts reported by the classifier.
        counts:   FileCounts
    },
    /// The file was seen but contributes nothing.
    Skipped(SkipReason)
}

/// Counts lines of code in a workspace, one walk at a time.
///
/// The internal mutex is held for the entire walk. Concurrent callers sharing
/// a counter queue up instead of counting in parallel; the service shares a
/// single counter, so at most one workspace is counted per process.
pub struct LocCounter {
    classifier: Arc<dyn LanguageClassifier>,
    walk_lock:  Mutex<()>
}

impl Default for LocCounter {
    fn default() -> Self {
        Self::new(Arc::new(TokeiClassifier::new()))
    }
}

impl LocCounter {
    /// Creates a counter using `classifier` for language detection.
    pub fn new(classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self {
            classifier,
            walk_lock: Mutex::new(())
        }
    }

    /// Walks `root` and aggregates line counts per language.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Walk`] when the directory tree cannot be traversed.
    /// Problems with individual files never fail the walk.
    pub fn count(&self, root: &Path) -> Result<AggregateResult, Error> {
        let _guard = self
            .walk_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut totals: HashMap<String, LanguageBreakdown> = HashMap::new();
        let mut skipped = 0usize;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == VCS_DIR));

        for entry in walker {
            let entry = entry.map_err(|source| walk_error(root, &source))?;
            if !entry.file_type().is_file() {
                continue;
            }

            match self.visit_file(entry.path()) {
                FileOutcome::Counted {
                    language,
                    counts
                } => {
                    let stats = totals
                        .entry(language)
                        .or_insert_with_key(|name| LanguageBreakdown::new(name.as_str()));
                    stats.lines += counts.lines;
                    stats.code += counts.code;
                    stats.comments += counts.comments;
                    stats.blanks += counts.blanks;
                    stats.files += 1;
                }
                FileOutcome::Skipped(reason) => {
                    trace!(path = %entry.path().display(), ?reason, "skipping file");
                    skipped += 1;
                }
            }
        }

        let result = AggregateResult::from_languages(totals.into_values().collect());
        debug!(
            root = %root.display(),
            languages = result.languages.len(),
            files = result.total_files,
            code = result.total_code,
            skipped,
            "counted workspace"
        );
        Ok(result)
    }

    /// Classifies and counts a single file.
    pub fn visit_file(&self, path: &Path) -> FileOutcome {
        let Ok(content) = fs::read(path) else {
            return FileOutcome::Skipped(SkipReason::Unreadable);
        };

        let candidates = self.classifier.classify_filename(path);
        let language = match candidates.as_slice() {
            [] => return FileOutcome::Skipped(SkipReason::Unclassified),
            [only] => only.clone(),
            _ => self.resolve_ambiguous(path, &candidates, &content)
        };

        match self.classifier.count_file(&language, &content) {
            None => FileOutcome::Skipped(SkipReason::Unclassified),
            Some(counts) if counts.is_binary => FileOutcome::Skipped(SkipReason::Binary),
            Some(counts) => FileOutcome::Counted {
                language,
                counts
            }
        }
    }

    fn resolve_ambiguous(&self, path: &Path, candidates: &[String], content: &[u8]) -> String {
        if let Some(language) = override_for(path, candidates) {
            return language.to_owned();
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        let sample = &content[..content.len().min(DISAMBIGUATION_SAMPLE_LEN)];
        self.classifier.disambiguate(&file_name, candidates, sample)
    }
}

/// Looks up the fixed language for `path`'s extension, if that language is
/// one of the candidates.
pub fn override_for(path: &Path, candidates: &[String]) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_OVERRIDES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, language)| *language)
        .filter(|language| candidates.iter().any(|candidate| candidate == language))
}

fn walk_error(root: &Path, source: &walkdir::Error) -> Error {
    let path = source
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(root));
    Error::Walk {
        path,
        message: source.to_string()
    }
}
