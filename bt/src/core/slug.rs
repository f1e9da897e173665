//! Feature slugs and issue references.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::UsageError;

/// A validated, path-safe feature name.
///
/// Only `[A-Za-z0-9._-]` is allowed; the slug may not start with `.` and may
/// not contain `..`, so it can always be joined under the specs directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature(String);

impl Feature {
    pub fn parse(raw: &str) -> Result<Self, UsageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UsageError("feature name must not be empty".to_string()));
        }
        if raw.contains("..") || raw.starts_with('.') {
            return Err(UsageError(format!(
                "invalid feature name '{raw}': path traversal is not allowed"
            )));
        }
        if let Some(bad) = raw.chars().find(|c| !is_slug_char(*c)) {
            return Err(UsageError(format!(
                "invalid feature name '{raw}': character '{bad}' is not allowed (use A-Z a-z 0-9 . _ -)"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Feature {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Replace every character outside the slug alphabet with `_`.
///
/// The result still has to pass [`Feature::parse`].
pub fn sanitize_slug(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if is_slug_char(c) { c } else { '_' })
        .collect()
}

/// Reference to a GitHub issue given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    /// `owner/repo`, when given as a URL.
    pub repo: Option<String>,
    pub number: u64,
}

impl IssueRef {
    pub fn feature_slug(&self) -> String {
        format!("issue-{}", self.number)
    }
}

static ISSUE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+/[^/]+)/issues/([0-9]+)/?$").unwrap()
});
static ISSUE_SHORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#([0-9]+)$").unwrap());

/// Parse `https://github.com/<owner>/<repo>/issues/<n>` or `#<n>`.
pub fn parse_issue_ref(raw: &str) -> Option<IssueRef> {
    let raw = raw.trim();
    if let Some(caps) = ISSUE_URL_RE.captures(raw) {
        let number = caps[2].parse().ok()?;
        return Some(IssueRef {
            repo: Some(caps[1].to_string()),
            number,
        });
    }
    let caps = ISSUE_SHORT_RE.captures(raw)?;
    Some(IssueRef {
        repo: None,
        number: caps[1].parse().ok()?,
    })
}
