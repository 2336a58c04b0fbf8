//! Pending tag storage and SQL comment formatting.

use chrono::{DateTime, Utc};

/// Source of the timestamp written into each comment.
pub type Clock = fn() -> DateTime<Utc>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Conversion of tag input into comment lines.
///
/// Implemented for single strings and for ordered sequences of strings.
pub trait IntoCommentLines {
    fn into_comment_lines(self) -> Vec<String>;
}

impl IntoCommentLines for &str {
    fn into_comment_lines(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoCommentLines for String {
    fn into_comment_lines(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoCommentLines for &String {
    fn into_comment_lines(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<S: AsRef<str>> IntoCommentLines for Vec<S> {
    fn into_comment_lines(self) -> Vec<String> {
        self.iter().map(|line| line.as_ref().to_owned()).collect()
    }
}

impl<S: AsRef<str>> IntoCommentLines for &[S] {
    fn into_comment_lines(self) -> Vec<String> {
        self.iter().map(|line| line.as_ref().to_owned()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> IntoCommentLines for [S; N] {
    fn into_comment_lines(self) -> Vec<String> {
        self.iter().map(|line| line.as_ref().to_owned()).collect()
    }
}

/// Holds at most one pending tag for a single taggable object.
///
/// A pending tag is a non-empty list of trimmed, non-blank lines. It is read
/// exactly once by [`TagState::format_comment`], which also clears it.
///
/// Cloning keeps the clock but not the pending tag, so a tag never reaches
/// more than one statement.
#[derive(Debug)]
pub struct TagState {
    lines: Option<Vec<String>>,
    clock: Clock,
}

impl Clone for TagState {
    fn clone(&self) -> Self {
        Self::with_clock(self.clock)
    }
}

impl Default for TagState {
    fn default() -> Self {
        Self::with_clock(Utc::now)
    }
}

impl TagState {
    /// Create an empty tag state using the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tag state that timestamps comments with `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self { lines: None, clock }
    }

    /// Replace the pending tag.
    ///
    /// Lines are trimmed and blank lines dropped. If nothing remains the
    /// current pending tag, if any, is kept as is.
    pub fn set(&mut self, comment: impl IntoCommentLines) {
        let lines: Vec<String> = comment
            .into_comment_lines()
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        if !lines.is_empty() {
            self.lines = Some(lines);
        }
    }

    /// Replace the clock, keeping any pending tag.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Whether a tag is waiting for the next statement.
    pub fn is_pending(&self) -> bool {
        self.lines.is_some()
    }

    /// The pending tag lines, if any.
    pub fn lines(&self) -> Option<&[String]> {
        self.lines.as_deref()
    }

    /// Move the pending tag into `other`, leaving this state empty.
    ///
    /// Does nothing when no tag is pending.
    pub fn transfer_to(&mut self, other: &mut TagState) {
        if let Some(lines) = self.lines.take() {
            other.lines = Some(lines);
        }
    }

    /// Render the pending tag as a SQL comment and clear it.
    ///
    /// Returns an empty string when no tag is pending. The timestamp is
    /// taken now, not when the tag was set.
    pub fn format_comment(&mut self) -> String {
        match self.lines.take() {
            Some(lines) => render_comment(&lines, (self.clock)()),
            None => String::new(),
        }
    }
}

/// Lay out `lines` as a comment block stamped with `at`.
///
/// A single line gives `/* <ts>: <line> */`, more lines give a block with a
/// `Date:` header. The result always ends with a newline, and is empty when
/// `lines` is.
pub fn render_comment<S: AsRef<str>>(lines: &[S], at: DateTime<Utc>) -> String {
    let timestamp = at.format(TIMESTAMP_FORMAT);

    match lines {
        [] => String::new(),
        [line] => format!("/* {}: {} */\n", timestamp, line.as_ref()),
        lines => {
            let mut comment = format!("/*\nDate: {}\n", timestamp);
            for line in lines {
                comment.push_str(line.as_ref());
                comment.push('\n');
            }
            comment.push_str("*/\n");
            comment
        }
    }
}

/// Tag lines describing a call site.
///
/// ```rust
/// use sea_orm_tagging::caller_tag;
///
/// let tag = caller_tag("src/report.rs", 42, Some("monthly_report"));
/// assert_eq!(tag, ["File: src/report.rs", "Line: 42", "Function: monthly_report"]);
/// ```
pub fn caller_tag(file: &str, line: u32, function: Option<&str>) -> Vec<String> {
    let mut tag = vec![format!("File: {}", file), format!("Line: {}", line)];

    if let Some(function) = function {
        tag.push(format!("Function: {}", function));
    }

    tag
}
