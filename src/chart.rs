// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Time-series chart of total lines of code.
//!
//! The chart is a fixed-size SVG: a gradient area under a single line, one
//! marker per snapshot, horizontal gridlines at "nice" values and evenly
//! spaced month labels along the time axis. Rendering is pure and
//! deterministic for a given snapshot list.

use std::fmt::Write as _;

use chrono::{DateTime, TimeDelta, Utc};

use crate::snapshot::Snapshot;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN_TOP: u32 = 40;
const MARGIN_RIGHT: u32 = 40;
const MARGIN_BOTTOM: u32 = 60;
const MARGIN_LEFT: u32 = 80;
const PLOT_WIDTH: f64 = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) as f64;
const PLOT_HEIGHT: f64 = (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) as f64;

const Y_TICK_COUNT: usize = 5;
const X_TICK_COUNT: i32 = 6;
const MIN_TIME_SPAN_SECS: f64 = 86_400.0;

const ACCENT: &str = "#4A90D9";
const FONT: &str = "system-ui, sans-serif";

/// Renders the LOC history of one repository as an SVG document.
///
/// `snapshots` must be in chronological order, as returned by
/// [`SnapshotStore::history`](crate::SnapshotStore::history). An empty slice
/// yields a "No data yet" placeholder of the same size.
pub fn render_history_chart(snapshots: &[Snapshot]) -> Vec<u8> {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return empty_chart().into_bytes();
    };

    let (y_min, y_max) = value_domain(snapshots);
    let t_min = first.created_at;
    let t_span = match seconds_between(t_min, last.created_at) {
        span if span > 0.0 => span,
        _ => MIN_TIME_SPAN_SECS
    };

    let x_of = |at: DateTime<Utc>| {
        f64::from(MARGIN_LEFT) + seconds_between(t_min, at) / t_span * PLOT_WIDTH
    };
    let y_of = |value: f64| {
        f64::from(MARGIN_TOP) + PLOT_HEIGHT - (value - y_min) / (y_max - y_min) * PLOT_HEIGHT
    };
    let points: Vec<(f64, f64)> = snapshots
        .iter()
        .map(|snapshot| (x_of(snapshot.created_at), y_of(snapshot.total_loc as f64)))
        .collect();
    let baseline = f64::from(MARGIN_TOP) + PLOT_HEIGHT;

    let mut svg = String::with_capacity(4096 + points.len() * 128);
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" width=\"{WIDTH}\" height=\"{HEIGHT}\">"
    );
    let _ = writeln!(svg, "<rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"white\"/>");
    let _ = writeln!(
        svg,
        "<defs><linearGradient id=\"areaGrad\" x1=\"0\" y1=\"0\" x2=\"0\" y2=\"1\"><stop offset=\"0%\" stop-color=\"{ACCENT}\" stop-opacity=\"0.3\"/><stop offset=\"100%\" stop-color=\"{ACCENT}\" stop-opacity=\"0.05\"/></linearGradient></defs>"
    );

    for tick in nice_axis_ticks(y_min, y_max, Y_TICK_COUNT) {
        let y = y_of(tick);
        let _ = writeln!(
            svg,
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{y:.1}\" x2=\"{}\" y2=\"{y:.1}\" stroke=\"#E5E5E5\" stroke-width=\"1\"/>",
            WIDTH - MARGIN_RIGHT
        );
        let _ = writeln!(
            svg,
            "<text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-family=\"{FONT}\" font-size=\"12\" fill=\"#666\">{}</text>",
            MARGIN_LEFT - 8,
            y + 4.0,
            format_axis_value(tick)
        );
    }

    for tick in date_axis_ticks(t_min, last.created_at) {
        let _ = writeln!(
            svg,
            "<text x=\"{:.1}\" y=\"{}\" text-anchor=\"middle\" font-family=\"{FONT}\" font-size=\"12\" fill=\"#666\">{}</text>",
            x_of(tick),
            HEIGHT - MARGIN_BOTTOM + 20,
            tick.format("%b %Y")
        );
    }

    if points.len() > 1 {
        let mut area = String::with_capacity(points.len() * 16);
        let _ = write!(area, "M{:.1},{baseline:.1}", points[0].0);
        for (x, y) in &points {
            let _ = write!(area, " L{x:.1},{y:.1}");
        }
        let _ = write!(area, " L{:.1},{baseline:.1}Z", points[points.len() - 1].0);
        let _ = writeln!(svg, "<path class=\"loc-area\" d=\"{area}\" fill=\"url(#areaGrad)\"/>");
    }

    let mut line = String::with_capacity(points.len() * 16);
    for (index, (x, y)) in points.iter().enumerate() {
        let command = if index == 0 { "M" } else { " L" };
        let _ = write!(line, "{command}{x:.1},{y:.1}");
    }
    let _ = writeln!(
        svg,
        "<path class=\"loc-line\" d=\"{line}\" fill=\"none\" stroke=\"{ACCENT}\" stroke-width=\"2.5\" stroke-linejoin=\"round\" stroke-linecap=\"round\"/>"
    );

    for (x, y) in &points {
        let _ = writeln!(
            svg,
            "<circle class=\"loc-point\" cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"3.5\" fill=\"white\" stroke=\"{ACCENT}\" stroke-width=\"2\"/>"
        );
    }

    let _ = writeln!(
        svg,
        "<text x=\"{MARGIN_LEFT}\" y=\"24\" font-family=\"{FONT}\" font-size=\"16\" font-weight=\"600\" fill=\"#333\">Lines of Code</text>"
    );
    let _ = writeln!(
        svg,
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{MARGIN_TOP}\" x2=\"{MARGIN_LEFT}\" y2=\"{baseline}\" stroke=\"#CCC\" stroke-width=\"1\"/>"
    );
    let _ = writeln!(
        svg,
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{baseline}\" x2=\"{}\" y2=\"{baseline}\" stroke=\"#CCC\" stroke-width=\"1\"/>",
        WIDTH - MARGIN_RIGHT
    );
    svg.push_str("</svg>\n");
    svg.into_bytes()
}

/// Y domain padded by a tenth of the value range on each side, clamped at 0.
fn value_domain(snapshots: &[Snapshot]) -> (f64, f64) {
    let (min, max) = snapshots
        .iter()
        .map(|snapshot| snapshot.total_loc as f64)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
            (lo.min(value), hi.max(value))
        });

    let mut range = max - min;
    if range == 0.0 {
        range = max * 0.1;
    }
    if range == 0.0 {
        range = 100.0;
    }
    ((min - range * 0.1).max(0.0), max + range * 0.1)
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64
    }
}

/// Evenly spaced instants from `start` to `end` inclusive.
fn date_axis_ticks(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let span = end - start;
    if span <= TimeDelta::zero() {
        return vec![start];
    }
    let step = span / X_TICK_COUNT;
    (0..=X_TICK_COUNT).map(|index| start + step * index).collect()
}

/// Chooses gridline values between `min` and `max`.
///
/// The step is `(max - min) / count` snapped to 1, 2, 5 or 10 times a power of
/// ten. Ticks are the multiples of that step from the first one at or above
/// `min` up to `max`. Non-finite bounds, an empty range or a zero count give
/// no ticks.
///
/// ```
/// use ghloc::nice_axis_ticks;
///
/// assert_eq!(nice_axis_ticks(0.0, 100.0, 5), vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]);
/// assert!(nice_axis_ticks(5.0, 5.0, 5).is_empty());
/// ```
pub fn nice_axis_ticks(min: f64, max: f64, count: usize) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() || max <= min || count == 0 {
        return Vec::new();
    }

    let raw_step = (max - min) / count as f64;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let normalized = raw_step / magnitude;
    let factor = if normalized <= 1.5 {
        1.0
    } else if normalized <= 3.0 {
        2.0
    } else if normalized <= 7.0 {
        5.0
    } else {
        10.0
    };
    let step = factor * magnitude;
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }

    let tolerance = step * 1e-9;
    let first_index = (min / step).ceil();
    let first = first_index * step;
    if first > max + tolerance {
        return Vec::new();
    }

    // Bounded by roughly 1.5 * count since step >= raw_step / 1.5.
    let steps = ((max + tolerance - first) / step).floor() as usize;
    let mut ticks: Vec<f64> = Vec::with_capacity(steps.saturating_add(1));
    for offset in 0..=steps {
        let value = (first_index + offset as f64) * step;
        if value > max + tolerance {
            break;
        }
        // Past 2^53 neighbouring indices collapse onto the same float.
        if ticks.last().is_some_and(|last| value <= *last) {
            continue;
        }
        ticks.push(value);
    }
    ticks
}

/// Short label for a gridline value: `1.5M`, `50k` or `500`.
pub fn format_axis_value(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else {
        format!("{value:.0}")
    }
}

fn empty_chart() -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" width=\"{WIDTH}\" height=\"{HEIGHT}\">\n<rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"white\"/>\n<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-family=\"{FONT}\" font-size=\"16\" fill=\"#999\">No data yet</text>\n</svg>\n",
        WIDTH / 2,
        HEIGHT / 2
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::snapshot::AggregateResult;

    fn daily_snapshots(values: &[u64]) -> Vec<Snapshot> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(day, loc)| {
                let mut snapshot = AggregateResult::default().into_snapshot(
                    "octocat",
                    "hello",
                    "sha",
                    start + Duration::days(day as i64)
                );
                snapshot.total_loc = *loc;
                snapshot
            })
            .collect()
    }

    fn render(snapshots: &[Snapshot]) -> String {
        String::from_utf8(render_history_chart(snapshots)).expect("chart must be utf-8")
    }

    #[test]
    fn empty_history_renders_placeholder() {
        let svg = render(&[]);
        assert!(svg.contains("No data yet"));
        assert!(svg.contains("width=\"800\""));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn five_daily_snapshots_render_one_line_and_five_markers() {
        let svg = render(&daily_snapshots(&[100, 200, 300, 400, 500]));
        assert_eq!(svg.matches("class=\"loc-line\"").count(), 1);
        assert_eq!(svg.matches("class=\"loc-point\"").count(), 5);
        assert_eq!(svg.matches("class=\"loc-area\"").count(), 1);
        assert!(svg.contains("Lines of Code"));
        assert!(svg.contains("Jan 2024"));
        assert!(svg.contains("url(#areaGrad)"));
    }

    #[test]
    fn single_snapshot_has_marker_but_no_area() {
        let svg = render(&daily_snapshots(&[1_234]));
        assert_eq!(svg.matches("class=\"loc-point\"").count(), 1);
        assert_eq!(svg.matches("class=\"loc-line\"").count(), 1);
        assert!(!svg.contains("class=\"loc-area\""));
    }

    #[test]
    fn first_and_last_points_span_the_plot() {
        let svg = render(&daily_snapshots(&[10, 20]));
        assert!(svg.contains("cx=\"80.0\""));
        assert!(svg.contains("cx=\"760.0\""));
    }

    #[test]
    fn value_domain_pads_and_clamps() {
        let (min, max) = value_domain(&daily_snapshots(&[100, 500]));
        assert_eq!(min, 60.0);
        assert_eq!(max, 540.0);

        let (min, max) = value_domain(&daily_snapshots(&[1_000]));
        assert_eq!(min, 990.0);
        assert_eq!(max, 1_010.0);

        let (min, max) = value_domain(&daily_snapshots(&[0, 0]));
        assert_eq!(min, 0.0);
        assert_eq!(max, 10.0);
    }

    #[test]
    fn date_ticks_cover_span_inclusively() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(60);
        let ticks = date_axis_ticks(start, end);
        assert_eq!(ticks.len(), 7);
        assert_eq!(ticks[0], start);
        assert_eq!(ticks[6], end);
        assert_eq!(date_axis_ticks(start, start), vec![start]);
    }

    #[test]
    fn nice_axis_ticks_examples() {
        assert_eq!(nice_axis_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_axis_ticks(60.0, 540.0, 5), vec![100.0, 200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn nice_axis_ticks_degenerate_inputs_are_empty() {
        assert!(nice_axis_ticks(1.0, 1.0, 5).is_empty());
        assert!(nice_axis_ticks(2.0, 1.0, 5).is_empty());
        assert!(nice_axis_ticks(0.0, 1.0, 0).is_empty());
        assert!(nice_axis_ticks(f64::NAN, 1.0, 5).is_empty());
        assert!(nice_axis_ticks(0.0, f64::INFINITY, 5).is_empty());
    }

    #[test]
    fn nice_axis_ticks_terminate_beyond_f64_integer_precision() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let ticks = nice_axis_ticks(1.8e19, 1.8e19 + 4096.0, 5);
            let _ = tx.send(ticks);
        });
        let ticks = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("tick computation did not finish");

        assert!(!ticks.is_empty());
        assert!(ticks.len() <= 6);
        assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ticks.iter().all(|tick| (1.8e19..=1.8e19 + 4096.0).contains(tick)));
    }

    #[test]
    fn chart_of_near_maximum_totals_renders() {
        let svg = render(&daily_snapshots(&[
            9_200_000_000_000_000_000,
            9_200_000_000_000_004_096,
            i64::MAX as u64
        ]));
        assert_eq!(svg.matches("class=\"loc-point\"").count(), 3);
    }

    #[test]
    fn format_axis_value_examples() {
        assert_eq!(format_axis_value(500.0), "500");
        assert_eq!(format_axis_value(1_500.0), "2k");
        assert_eq!(format_axis_value(50_000.0), "50k");
        assert_eq!(format_axis_value(1_500_000.0), "1.5M");
    }

    proptest! {
        #[test]
        fn ticks_are_ascending_nice_multiples(min in 0.0f64..1.0e6, span in 1.0f64..1.0e7, count in 2usize..12) {
            let max = min + span;
            let ticks = nice_axis_ticks(min, max, count);
            prop_assert!(!ticks.is_empty());
            prop_assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));

            if ticks.len() >= 2 {
                let step = ticks[1] - ticks[0];
                let magnitude = 10f64.powf(step.log10().floor());
                let normalized = step / magnitude;
                prop_assert!(
                    [1.0, 2.0, 5.0, 10.0].iter().any(|nice| (normalized - nice).abs() < 1e-6),
                    "step {} is not a nice multiple", step
                );
            }
            for tick in &ticks {
                prop_assert!(*tick >= min - 1e-9 * span.max(1.0));
                prop_assert!(*tick <= max + 1e-6 * span.max(1.0));
            }
        }
    }
}
