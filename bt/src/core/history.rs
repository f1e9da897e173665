//! History entry naming and rendering.
//!
//! One Markdown file per iteration: `<%Y%m%dT%H%M%SZ>-loop-iter-<NNN>.md`.
//! The body records which run wrote it so a resumed run can recognise its own
//! entries.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::core::progress::GateSummary;

const NAME_TS_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const RUN_MARKER: &str = "- Run started: ";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8}T\d{6}Z)-loop-iter-(\d{3,})\.md$").unwrap());

pub fn history_file_name(at: DateTime<Utc>, index: u32) -> String {
    format!("{}-loop-iter-{index:03}.md", at.format(NAME_TS_FORMAT))
}

/// Parse a history file name into its timestamp and iteration index.
pub fn parse_history_file_name(name: &str) -> Option<(DateTime<Utc>, u32)> {
    let caps = NAME_RE.captures(name)?;
    let ts = NaiveDateTime::parse_from_str(&caps[1], NAME_TS_FORMAT)
        .ok()?
        .and_utc();
    let index = caps[2].parse().ok()?;
    Some((ts, index))
}

/// What a history entry captures.
#[derive(Debug, Clone)]
pub struct HistoryRecord<'a> {
    pub feature: &'a str,
    pub index: u32,
    pub max_iterations: u32,
    pub run_started_at: &'a str,
    pub recorded_at: &'a str,
    pub verdict: &'a str,
    pub gates: &'a [GateSummary],
    pub review: Option<&'a str>,
}

pub fn render_history(record: &HistoryRecord<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# {} loop iteration {:03}/{:03}\n\n",
        record.feature, record.index, record.max_iterations
    ));
    out.push_str(&format!("{RUN_MARKER}{}\n", record.run_started_at));
    out.push_str(&format!("- Recorded: {}\n", record.recorded_at));
    let verdict = if record.verdict.is_empty() {
        "(none)"
    } else {
        record.verdict
    };
    out.push_str(&format!("- Verdict: {verdict}\n"));

    if !record.gates.is_empty() {
        out.push_str("\n## Gates\n\n");
        for gate in record.gates {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                gate.name,
                gate.stage,
                gate.status.as_str()
            ));
        }
    }

    out.push_str("\n## Review\n\n");
    match record.review {
        Some(review) if !review.trim().is_empty() => {
            out.push_str(review.trim_end());
            out.push('\n');
        }
        _ => out.push_str("_The review stage did not write a document._\n"),
    }
    out
}

/// The run start recorded in a history body, if any.
pub fn run_started_of(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(RUN_MARKER))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_is_zero_padded_and_parses_back() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let name = history_file_name(at, 2);
        assert_eq!(name, "20260304T050607Z-loop-iter-002.md");
        assert_eq!(parse_history_file_name(&name), Some((at, 2)));
    }

    #[test]
    fn unrelated_names_do_not_parse() {
        assert_eq!(parse_history_file_name("notes.md"), None);
        assert_eq!(parse_history_file_name("20260304T050607Z-loop-iter-2.md"), None);
    }

    #[test]
    fn rendered_body_carries_run_marker_and_review() {
        let body = render_history(&HistoryRecord {
            feature: "f",
            index: 1,
            max_iterations: 3,
            run_started_at: "2026-01-01T00:00:00.000000Z",
            recorded_at: "2026-01-01T00:01:00.000000Z",
            verdict: "NEEDS_CHANGES",
            gates: &[],
            review: Some("Verdict: NEEDS_CHANGES\n"),
        });
        assert!(body.starts_with("# f loop iteration 001/003"));
        assert_eq!(run_started_of(&body), Some("2026-01-01T00:00:00.000000Z"));
        assert!(body.contains("- Verdict: NEEDS_CHANGES"));
        assert!(body.contains("## Review\n\nVerdict: NEEDS_CHANGES\n"));
    }
}
