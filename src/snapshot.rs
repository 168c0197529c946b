// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Measurement types shared by the aggregator, the store and the renderers.
//!
//! An [`AggregateResult`] is the transient outcome of a single counting pass.
//! It becomes a [`Snapshot`] once the push metadata is attached, and a
//! snapshot is immutable after the store has assigned its identifier.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Per-language line counts within one measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageBreakdown {
    /// Language name as reported by the classifier.
    pub language: String,
    /// Total lines, including code, comments and blanks.
    pub lines:    u64,
    /// Lines containing code.
    pub code:     u64,
    /// Comment-only lines.
    pub comments: u64,
    /// Blank lines.
    pub blanks:   u64,
    /// Number of non-binary files attributed to the language.
    pub files:    u64
}

impl LanguageBreakdown {
    /// Creates an empty breakdown for `language`.
    pub fn new<L>(language: L) -> Self
    where
        L: Into<String>
    {
        Self {
            language: language.into(),
            lines:    0,
            code:     0,
            comments: 0,
            blanks:   0,
            files:    0
        }
    }
}

/// Output of one counting pass before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    /// Sum of `lines` across languages.
    pub total_lines:    u64,
    /// Sum of `code` across languages.
    pub total_code:     u64,
    /// Sum of `comments` across languages.
    pub total_comments: u64,
    /// Sum of `blanks` across languages.
    pub total_blanks:   u64,
    /// Sum of `files` across languages.
    pub total_files:    u64,
    /// Breakdown ordered by code lines, descending.
    pub languages:      Vec<LanguageBreakdown>
}

impl AggregateResult {
    /// Builds an aggregate from per-language sums, computing grand totals and
    /// ordering languages by code descending (name ascending on ties).
    pub fn from_languages(mut languages: Vec<LanguageBreakdown>) -> Self {
        sort_by_code(&mut languages);

        let mut result = Self::default();
        for language in &languages {
            result.total_lines += language.lines;
            result.total_code += language.code;
            result.total_comments += language.comments;
            result.total_blanks += language.blanks;
            result.total_files += language.files;
        }
        result.languages = languages;
        result
    }

    /// Attaches push metadata, producing an unsaved [`Snapshot`].
    pub fn into_snapshot(
        self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
        created_at: DateTime<Utc>
    ) -> Snapshot {
        Snapshot {
            id:          None,
            owner:       owner.to_owned(),
            repo:        repo.to_owned(),
            commit_sha:  commit_sha.to_owned(),
            total_loc:   self.total_code,
            total_files: self.total_files,
            languages:   self.languages,
            created_at:  created_at.trunc_subsecs(6)
        }
    }
}

/// One durable LOC measurement of a repository at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Surrogate identifier assigned by the store; `None` until saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:          Option<i64>,
    /// Repository owner login.
    pub owner:       String,
    /// Repository name.
    pub repo:        String,
    /// Commit that produced the measurement.
    pub commit_sha:  String,
    /// Code lines across all languages.
    pub total_loc:   u64,
    /// Counted files across all languages.
    pub total_files: u64,
    /// Breakdown ordered by code lines, descending.
    pub languages:   Vec<LanguageBreakdown>,
    /// Processing time in UTC, microsecond precision.
    pub created_at:  DateTime<Utc>
}

/// Current UTC time truncated to the precision the store keeps.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn sort_by_code(languages: &mut [LanguageBreakdown]) {
    languages.sort_by(|a, b| {
        b.code
            .cmp(&a.code)
            .then_with(|| a.language.cmp(&b.language))
    });
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn breakdown(language: &str, code: u64, files: u64) -> LanguageBreakdown {
        LanguageBreakdown {
            language: language.to_owned(),
            lines: code + 2,
            code,
            comments: 1,
            blanks: 1,
            files
        }
    }

    #[test]
    fn from_languages_sums_totals_and_orders_by_code() {
        let result = AggregateResult::from_languages(vec![
            breakdown("Go", 10, 2),
            breakdown("Rust", 40, 3),
            breakdown("C", 10, 1),
        ]);

        assert_eq!(result.total_code, 60);
        assert_eq!(result.total_files, 6);
        assert_eq!(result.total_lines, 66);
        assert_eq!(result.total_comments, 3);
        assert_eq!(result.total_blanks, 3);
        let names: Vec<&str> = result.languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(names, ["Rust", "C", "Go"]);
    }

    #[test]
    fn into_snapshot_preserves_invariants() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let snapshot = AggregateResult::from_languages(vec![breakdown("Rust", 5, 1)])
            .into_snapshot("octocat", "hello", "abc123", created);

        assert_eq!(snapshot.id, None);
        assert_eq!(snapshot.total_loc, snapshot.languages.iter().map(|l| l.code).sum::<u64>());
        assert_eq!(snapshot.total_files, snapshot.languages.iter().map(|l| l.files).sum::<u64>());
        assert_eq!(snapshot.created_at, created);
        assert_eq!(snapshot.commit_sha, "abc123");
    }

    #[test]
    fn into_snapshot_truncates_to_microseconds() {
        let created = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let snapshot = AggregateResult::default().into_snapshot("o", "r", "sha", created);
        assert_eq!(snapshot.created_at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn snapshot_serializes_without_missing_id() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = AggregateResult::default().into_snapshot("o", "r", "sha", created);
        let json = serde_json::to_string(&snapshot).expect("serialization failed");
        assert!(!json.contains("\"id\""));
        assert!(json.contains("\"total_loc\":0"));
    }
}
