//! Template rendering: delimiters, the substitution mapping, and the renderer.
//!
//! ## Placeholder syntax
//!
//! ```text
//! start-tag + KEY + end-tag        e.g.  %{{PROJECT_NAME}}%
//! ```
//!
//! Delimiters are literal strings, never patterns. Each start tag is closed by
//! the *nearest* end tag after it, so adjacent placeholders never merge.
//! Keys missing from the mapping are left exactly as written; descriptors may
//! carry placeholders meant for some other tool.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};

use crate::domain::{entities::package::Package, error::DomainError};

pub const DEFAULT_START_TAG: &str = "%{{";
pub const DEFAULT_END_TAG: &str = "}}%";

/// Start and end tag pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    start: String,
    end: String,
}

impl Delimiters {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, DomainError> {
        let start = start.into();
        let end = end.into();

        if start.is_empty() || end.is_empty() {
            return Err(DomainError::InvalidDelimiters {
                reason: "start and end tags must be non-empty".into(),
            });
        }
        if start == end {
            return Err(DomainError::InvalidDelimiters {
                reason: format!("start and end tags must differ (both are '{start}')"),
            });
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    /// Wrap a key in the delimiters.
    pub fn placeholder(&self, key: &str) -> String {
        format!("{}{}{}", self.start, key, self.end)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_TAG.to_string(),
            end: DEFAULT_END_TAG.to_string(),
        }
    }
}

/// Substitution mapping for one project.
///
/// ## Built-in Variables
///
/// | Variable | Example |
/// |----------|---------|
/// | `PROJECT_NAME` | "My Awesome App" |
/// | `PROJECT_NAME_SNAKE` | "my_awesome_app" |
/// | `PROJECT_NAME_KEBAB` | "my-awesome-app" |
/// | `PROJECT_NAME_PASCAL` | "MyAwesomeApp" |
/// | `PROJECT_PATH` | "/home/me/code/my-awesome-app" |
/// | `PACKAGE_LABEL` | "py" |
/// | `PACKAGE_NAME` | "Python" |
/// | `DATE` | "2026-10-19" |
/// | `YEAR` | "2026" |
///
/// User variables added later win over built-ins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    // BTreeMap keeps the plugin payload and debug output stably ordered.
    variables: BTreeMap<String, String>,
}

impl RenderContext {
    /// Empty mapping; every placeholder renders verbatim.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in variables for `project_name` created from `package` at
    /// `project_path`, dated today.
    pub fn for_project(project_name: &str, project_path: &Path, package: &Package) -> Self {
        Self::for_project_on(project_name, project_path, package, Local::now().date_naive())
    }

    /// Same as [`Self::for_project`] with an explicit date.
    pub fn for_project_on(
        project_name: &str,
        project_path: &Path,
        package: &Package,
        date: NaiveDate,
    ) -> Self {
        Self::empty()
            .with_variable("PROJECT_NAME", project_name)
            .with_variable("PROJECT_NAME_SNAKE", to_snake_case(project_name))
            .with_variable("PROJECT_NAME_KEBAB", to_kebab_case(project_name))
            .with_variable("PROJECT_NAME_PASCAL", to_pascal_case(project_name))
            .with_variable("PROJECT_PATH", project_path.display().to_string())
            .with_variable("PACKAGE_LABEL", package.label.as_str())
            .with_variable("PACKAGE_NAME", package.name.as_str())
            .with_variable("DATE", date.format("%Y-%m-%d").to_string())
            .with_variable("YEAR", date.year().to_string())
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.variables.insert(k.into(), v.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Pure placeholder substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateRenderer {
    delimiters: Delimiters,
}

impl TemplateRenderer {
    pub fn new(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Render text content.
    ///
    /// # Edge Cases
    ///
    /// - `%{{UNKNOWN}}%` → remains as literal `%{{UNKNOWN}}%`
    /// - `%{{A}}%%{{B}}%` → both replaced independently
    /// - `%{{ %{{A}}%` → the outer tag is text, the inner placeholder renders
    /// - a start tag with no end tag after it → rest of input copied as-is
    pub fn render(&self, content: &str, ctx: &RenderContext) -> String {
        let start = self.delimiters.start.as_str();
        let end = self.delimiters.end.as_str();

        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(open) = rest.find(start) {
            out.push_str(&rest[..open]);
            let body = &rest[open + start.len()..];

            let Some(close) = body.find(end) else {
                out.push_str(&rest[open..]);
                return out;
            };

            let key = &body[..close];

            // Another start tag opened before this one closed: everything up
            // to the innermost one is plain text.
            if let Some(inner) = key.rfind(start) {
                let text_end = open + start.len() + inner;
                out.push_str(&rest[open..text_end]);
                rest = &rest[text_end..];
                continue;
            }

            match ctx.get(key) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + start.len() + close + end.len()]),
            }
            rest = &body[close + end.len()..];
        }

        out.push_str(rest);
        out
    }

    /// Render raw file content. Fails only when it is not UTF-8 text.
    pub fn render_bytes(&self, content: &[u8], ctx: &RenderContext) -> Result<String, DomainError> {
        let text = std::str::from_utf8(content).map_err(|e| DomainError::NotText {
            offset: e.valid_up_to(),
        })?;
        Ok(self.render(text, ctx))
    }
}

// ============================================================================
// String Case Conversion Helpers
// ============================================================================

/// | Input | Output |
/// |-------|--------|
/// | "MyApp" | "my_app" |
/// | "my-app" | "my_app" |
/// | "HTTPRequest" | "http_request" |
pub fn to_snake_case(s: &str) -> String {
    split_words(s).join("_")
}

pub fn to_kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

/// | Input | Output |
/// |-------|--------|
/// | "my-app" | "MyApp" |
/// | "HTTPRequest" | "HttpRequest" |
pub fn to_pascal_case(s: &str) -> String {
    split_words(s)
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = String::new();
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                    out
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Split on `_`, `-`, `.`, whitespace, camelCase transitions and acronym
/// boundaries (`HTTPServer` → `http`, `server`).
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}
