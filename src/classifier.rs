// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Language classification and per-file line counting.
//!
//! [`LanguageClassifier`] is the seam between the aggregator's traversal
//! policy and the line-counting primitives. [`TokeiClassifier`] implements it
//! on top of the `tokei` language database.

use std::path::Path;

use tokei::{Config, LanguageType};

/// Number of leading bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8000;

/// Extensions `tokei` maps to a single language although several languages
/// legitimately use them.
const AMBIGUOUS_EXTENSIONS: &[(&str, &[&str])] = &[
    ("h", &["C Header", "C++ Header", "Objective-C"]),
    ("pl", &["Perl", "Prolog"]),
    ("v", &["Verilog", "Coq"])
];

/// Content markers used to pick between ambiguous candidates.
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    ("C++ Header", &["namespace ", "template<", "template <", "class ", "std::", "public:"]),
    ("C Header", &["typedef struct", "#ifndef", "extern \"C\"", "struct "]),
    ("Objective-C", &["@interface", "@implementation", "@property", "#import", "@end"]),
    ("Perl", &["use strict", "my $", "sub ", "=~"]),
    ("Prolog", &[":-", "?-"]),
    ("Verilog", &["module ", "endmodule", "always @", "assign "]),
    ("Coq", &["Theorem ", "Proof.", "Qed.", "Definition ", "Lemma "])
];

/// Line counts reported for a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    /// Total lines in the file.
    pub lines:     u64,
    /// Lines containing code.
    pub code:      u64,
    /// Comment-only lines.
    pub comments:  u64,
    /// Blank lines.
    pub blanks:    u64,
    /// Set when the content looks binary; counts are zero in that case.
    pub is_binary: bool
}

/// Maps files to languages and counts their lines.
pub trait LanguageClassifier: Send + Sync {
    /// Returns every language the file may be written in, most likely first.
    fn classify_filename(&self, path: &Path) -> Vec<String>;

    /// Picks one of `candidates` using a sample of the file content.
    fn disambiguate(&self, file_name: &str, candidates: &[String], sample: &[u8]) -> String;

    /// Counts `content` as `language`. Returns `None` when the language is
    /// unknown to the counting backend.
    fn count_file(&self, language: &str, content: &[u8]) -> Option<FileCounts>;
}

/// [`LanguageClassifier`] backed by `tokei`.
#[derive(Debug, Default)]
pub struct TokeiClassifier {
    config: Config
}

impl TokeiClassifier {
    /// Creates a classifier with `tokei`'s default configuration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LanguageClassifier for TokeiClassifier {
    fn classify_filename(&self, path: &Path) -> Vec<String> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        if let Some(extension) = extension.as_deref()
            && let Some((_, candidates)) = AMBIGUOUS_EXTENSIONS
                .iter()
                .find(|(ambiguous, _)| *ambiguous == extension)
        {
            return candidates.iter().map(|name| (*name).to_owned()).collect();
        }

        LanguageType::from_path(path, &self.config)
            .map(|language| vec![language.name().to_owned()])
            .unwrap_or_default()
    }

    fn disambiguate(&self, _file_name: &str, candidates: &[String], sample: &[u8]) -> String {
        let text = String::from_utf8_lossy(sample);
        let mut best: Option<(&String, usize)> = None;

        for candidate in candidates {
            let score = LANGUAGE_MARKERS
                .iter()
                .find(|(language, _)| *language == candidate.as_str())
                .map(|(_, markers)| markers.iter().filter(|m| text.contains(*m)).count())
                .unwrap_or(0);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        best.map(|(candidate, _)| candidate.clone())
            .unwrap_or_default()
    }

    fn count_file(&self, language: &str, content: &[u8]) -> Option<FileCounts> {
        let language: LanguageType = language.parse().ok()?;

        if looks_binary(content) {
            return Some(FileCounts {
                is_binary: true,
                ..FileCounts::default()
            });
        }

        let stats = language.parse_from_slice(content, &self.config);
        Some(FileCounts {
            lines:     stats.lines() as u64,
            code:      stats.code as u64,
            comments:  stats.comments as u64,
            blanks:    stats.blanks as u64,
            is_binary: false
        })
    }
}

/// NUL bytes near the start of a file mark it as binary, as git does.
pub(crate) fn looks_binary(content: &[u8]) -> bool {
    content
        .iter()
        .take(BINARY_SNIFF_LEN)
        .any(|byte| *byte == 0)
}
