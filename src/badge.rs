// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Badge rendering and shields.io endpoint documents.
//!
//! Two badge forms are produced from the same data: a flat two-segment SVG
//! that can be committed or served directly, and the JSON document consumed by
//! the shields.io endpoint badge. Both carry the constant label
//! [`BADGE_LABEL`].

use std::{borrow::Cow, fmt::Write as _};

use serde::Serialize;

use crate::snapshot::Snapshot;

/// Label shown on the left segment of every badge.
pub const BADGE_LABEL: &str = "lines of code";

/// Message used when a repository has no snapshot yet.
pub const NO_DATA_MESSAGE: &str = "no data";

const BADGE_HEIGHT: usize = 20;
const CHAR_ADVANCE: usize = 7;
const SEGMENT_PADDING: usize = 10;
const LABEL_FILL: &str = "#555";

/// Colors available for the message segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    /// Default for measured repositories.
    Blue,
    /// Positive state.
    Green,
    /// Neutral state, used when no data exists.
    LightGrey,
    /// Failure state.
    Red
}

impl BadgeColor {
    /// Color name understood by shields.io.
    pub fn shields_name(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::LightGrey => "lightgrey",
            Self::Red => "red"
        }
    }

    /// Fill used in rendered SVG badges.
    pub fn hex(self) -> &'static str {
        match self {
            Self::Blue => "#007ec6",
            Self::Green => "#97ca00",
            Self::LightGrey => "#9f9f9f",
            Self::Red => "#e05d44"
        }
    }
}

/// Formats a line count for display.
///
/// Counts below one thousand are printed exactly. Larger counts get one
/// decimal and a `k` or `M` suffix, rounded half away from zero.
///
/// ```
/// use ghloc::format_loc;
///
/// assert_eq!(format_loc(999), "999");
/// assert_eq!(format_loc(12_345), "12.3k");
/// assert_eq!(format_loc(999_999), "1000.0k");
/// assert_eq!(format_loc(1_500_000), "1.5M");
/// ```
pub fn format_loc(loc: u64) -> String {
    match loc {
        0..1_000 => loc.to_string(),
        1_000..1_000_000 => with_suffix(round_div(loc, 100), 'k'),
        _ => with_suffix(round_div(loc, 100_000), 'M')
    }
}

/// `value / divisor` rounded half away from zero, without overflow.
fn round_div(value: u64, divisor: u64) -> u64 {
    let quotient = value / divisor;
    if value % divisor >= divisor.div_ceil(2) {
        quotient + 1
    } else {
        quotient
    }
}

fn with_suffix(tenths: u64, suffix: char) -> String {
    format!("{}.{}{suffix}", tenths / 10, tenths % 10)
}

/// Renders a flat two-segment SVG badge.
///
/// The message is XML-escaped; segment widths derive from a fixed advance per
/// character so output is deterministic.
pub fn render_badge(message: &str, color: BadgeColor) -> Vec<u8> {
    let label_width = segment_width(BADGE_LABEL);
    let message_width = segment_width(message);
    let total_width = label_width + message_width;
    let label = escape_xml(BADGE_LABEL);
    let escaped = escape_xml(message);
    let label_center = label_width as f64 / 2.0;
    let message_center = label_width as f64 + message_width as f64 / 2.0;
    let fill = color.hex();

    let mut svg = String::with_capacity(1024);
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{total_width}\" height=\"{BADGE_HEIGHT}\" role=\"img\" aria-label=\"{label}: {escaped}\">"
    );
    svg.push_str(
        "<linearGradient id=\"smooth\" x2=\"0\" y2=\"100%\"><stop offset=\"0\" stop-color=\"#bbb\" stop-opacity=\".1\"/><stop offset=\"1\" stop-opacity=\".1\"/></linearGradient>"
    );
    let _ = write!(
        svg,
        "<mask id=\"round\"><rect width=\"{total_width}\" height=\"{BADGE_HEIGHT}\" rx=\"3\" fill=\"#fff\"/></mask>"
    );
    let _ = write!(
        svg,
        "<g mask=\"url(#round)\"><rect width=\"{label_width}\" height=\"{BADGE_HEIGHT}\" fill=\"{LABEL_FILL}\"/><rect x=\"{label_width}\" width=\"{message_width}\" height=\"{BADGE_HEIGHT}\" fill=\"{fill}\"/><rect width=\"{total_width}\" height=\"{BADGE_HEIGHT}\" fill=\"url(#smooth)\"/></g>"
    );
    svg.push_str(
        "<g fill=\"#fff\" text-anchor=\"middle\" font-family=\"DejaVu Sans,Verdana,Geneva,sans-serif\" font-size=\"11\">"
    );
    for (center, text) in [(label_center, &label), (message_center, &escaped)] {
        let _ = write!(
            svg,
            "<text x=\"{center}\" y=\"15\" fill=\"#010101\" fill-opacity=\".3\">{text}</text><text x=\"{center}\" y=\"14\">{text}</text>"
        );
    }
    svg.push_str("</g></svg>\n");
    svg.into_bytes()
}

fn segment_width(text: &str) -> usize {
    text.chars().count() * CHAR_ADVANCE + SEGMENT_PADDING
}

/// shields.io endpoint badge document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeEndpoint {
    /// Always `1`.
    #[serde(rename = "schemaVersion")]
    pub schema_version: u8,
    /// Always [`BADGE_LABEL`].
    pub label:          &'static str,
    /// Formatted total, or [`NO_DATA_MESSAGE`].
    pub message:        String,
    /// shields.io color name.
    pub color:          &'static str
}

impl BadgeEndpoint {
    /// Builds the document for the latest snapshot of a repository.
    pub fn from_snapshot(snapshot: Option<&Snapshot>) -> Self {
        let (message, color) = match snapshot {
            Some(snapshot) => (format_loc(snapshot.total_loc), BadgeColor::Blue),
            None => (NO_DATA_MESSAGE.to_owned(), BadgeColor::LightGrey)
        };
        Self {
            schema_version: 1,
            label: BADGE_LABEL,
            message,
            color: color.shields_name()
        }
    }
}

pub(crate) fn escape_xml(value: &str) -> Cow<'_, str> {
    if value
        .chars()
        .any(|character| matches!(character, '&' | '<' | '>' | '\"' | '\''))
    {
        let mut escaped = String::with_capacity(value.len());
        for character in value.chars() {
            match character {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '\"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&apos;"),
                other => escaped.push(other)
            }
        }
        Cow::Owned(escaped)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::snapshot::AggregateResult;

    #[test]
    fn format_loc_examples() {
        assert_eq!(format_loc(0), "0");
        assert_eq!(format_loc(500), "500");
        assert_eq!(format_loc(999), "999");
        assert_eq!(format_loc(1_000), "1.0k");
        assert_eq!(format_loc(1_050), "1.1k");
        assert_eq!(format_loc(12_345), "12.3k");
        assert_eq!(format_loc(999_999), "1000.0k");
        assert_eq!(format_loc(1_000_000), "1.0M");
        assert_eq!(format_loc(1_500_000), "1.5M");
        assert_eq!(format_loc(123_456_789), "123.5M");
    }

    #[test]
    fn format_loc_handles_extreme_values() {
        assert_eq!(format_loc(u64::MAX), "18446744073709.6M");
    }

    proptest! {
        #[test]
        fn small_counts_are_exact(n in 0u64..1_000) {
            prop_assert_eq!(format_loc(n), n.to_string());
        }

        #[test]
        fn thousands_use_k_suffix_with_one_decimal(n in 1_000u64..1_000_000) {
            let text = format_loc(n);
            prop_assert!(text.ends_with('k'));
            let number = &text[..text.len() - 1];
            let (_, decimals) = number.split_once('.').expect("decimal point");
            prop_assert_eq!(decimals.len(), 1);
            let value: f64 = number.parse().expect("numeric prefix");
            prop_assert!((value * 1_000.0 - n as f64).abs() <= 50.0);
        }

        #[test]
        fn millions_use_m_suffix(n in 1_000_000u64..u64::MAX / 2) {
            let text = format_loc(n);
            prop_assert!(text.ends_with('M'));
            prop_assert_eq!(text.matches('.').count(), 1);
        }
    }

    #[test]
    fn render_badge_contains_label_message_and_fill() {
        let svg = String::from_utf8(render_badge("12.3k", BadgeColor::Blue)).expect("utf-8 svg");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(">lines of code</text>"));
        assert!(svg.contains(">12.3k</text>"));
        assert!(svg.contains("#007ec6"));
    }

    #[test]
    fn render_badge_width_grows_with_message() {
        let short = String::from_utf8(render_badge("1", BadgeColor::Green)).expect("utf-8");
        let long = String::from_utf8(render_badge("1000.0k", BadgeColor::Green)).expect("utf-8");
        let width = |svg: &str| {
            let start = svg.find("width=\"").expect("width attribute") + 7;
            svg[start..]
                .split('"')
                .next()
                .and_then(|value| value.parse::<usize>().ok())
                .expect("numeric width")
        };
        assert_eq!(width(&long) - width(&short), 6 * CHAR_ADVANCE);
    }

    #[test]
    fn render_badge_escapes_message() {
        let svg = String::from_utf8(render_badge("a<b & c", BadgeColor::Red)).expect("utf-8");
        assert!(svg.contains("a&lt;b &amp; c"));
        assert!(!svg.contains("a<b"));
    }

    #[test]
    fn endpoint_without_snapshot_reports_no_data() {
        let endpoint = BadgeEndpoint::from_snapshot(None);
        assert_eq!(endpoint.message, "no data");
        assert_eq!(endpoint.color, "lightgrey");

        let json = serde_json::to_value(&endpoint).expect("serialization failed");
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["label"], "lines of code");
    }

    #[test]
    fn endpoint_with_snapshot_formats_total() {
        let mut snapshot = AggregateResult::default().into_snapshot("o", "r", "sha", Utc::now());
        snapshot.total_loc = 12_345;
        let endpoint = BadgeEndpoint::from_snapshot(Some(&snapshot));
        assert_eq!(endpoint.message, "12.3k");
        assert_eq!(endpoint.color, "blue");
    }

    #[test]
    fn escape_xml_handles_all_special_characters() {
        let input = "&<>\"'normal";
        let result = escape_xml(input);
        assert_eq!(result, "&amp;&lt;&gt;&quot;&apos;normal");
    }

    #[test]
    fn escape_xml_returns_borrowed_when_no_escaping_needed() {
        let input = "no special characters";
        match escape_xml(input) {
            Cow::Borrowed(s) => assert_eq!(s, input),
            Cow::Owned(_) => panic!("expected borrowed variant")
        }
    }

    #[test]
    fn color_names_match_shields() {
        assert_eq!(BadgeColor::LightGrey.shields_name(), "lightgrey");
        assert_eq!(
            serde_json::to_value(BadgeColor::LightGrey).expect("serialization failed"),
            "lightgrey"
        );
    }
}
