// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! JSON history files used by the offline `count` command.

use std::{fs, io::ErrorKind, path::Path};

use crate::{
    error::{Error, io_error},
    snapshot::Snapshot
};

/// Reads the snapshot list stored at `path`.
///
/// A missing file is an empty history.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file exists but cannot be read and
/// [`Error::Serialize`] when its contents are not a snapshot list.
pub fn load_history(path: &Path) -> Result<Vec<Snapshot>, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(io_error(path, error))
    };
    Ok(serde_json::from_str(&contents)?)
}

/// Writes `snapshots` to `path` as pretty-printed JSON, creating parent
/// directories as needed.
pub fn save_history(path: &Path, snapshots: &[Snapshot]) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }

    let mut json = serde_json::to_string_pretty(snapshots)?;
    json.push('\n');
    fs::write(path, json).map_err(|source| io_error(path, source))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::snapshot::{AggregateResult, LanguageBreakdown};

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempdir().expect("failed to create tempdir");
        let history = load_history(&dir.path().join("absent.json")).expect("load failed");
        assert!(history.is_empty());
    }

    #[test]
    fn save_then_load_preserves_snapshots() {
        let dir = tempdir().expect("failed to create tempdir");
        let path = dir.path().join("nested/dir/history.json");
        let mut rust = LanguageBreakdown::new("Rust");
        rust.code = 12;
        rust.lines = 15;
        rust.files = 2;
        let snapshot = AggregateResult::from_languages(vec![rust]).into_snapshot(
            "local",
            "ghloc",
            "",
            Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap()
        );

        save_history(&path, std::slice::from_ref(&snapshot)).expect("save failed");
        let raw = fs::read_to_string(&path).expect("failed to read history");
        assert!(raw.contains("\n  {"));

        let loaded = load_history(&path).expect("load failed");
        assert_eq!(loaded, vec![snapshot]);
    }

    #[test]
    fn malformed_file_is_a_serialize_error() {
        let dir = tempdir().expect("failed to create tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").expect("failed to write");
        let error = load_history(&path).expect_err("expected parse failure");
        assert!(matches!(error, Error::Serialize { .. }));
    }
}
