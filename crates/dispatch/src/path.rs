//! Path pattern compilation and matching.
//!
//! A route path such as `/users/{id}/posts/{post}` is compiled into a [`PathPattern`]:
//! the literal segments between placeholders, the ordered variable names, and an anchored,
//! case-insensitive regex in which every `{name}` became a capture group that matches one or
//! more characters other than `#`, `/` and `?`.
//!
//! Both patterns and request paths are slash-normalized before use, see [`normalize_path`].

use crate::error::PatternError;
use crate::request::PathVariables;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}/]+)\}").unwrap());

const VARIABLE_CAPTURE: &str = "([^#/?]+)";

/// Normalizes a path for matching: an empty path becomes `/` and a single trailing slash is
/// removed from every path except the root.
///
/// ```
/// use micro_dispatch::path::normalize_path;
///
/// assert_eq!(normalize_path(""), "/");
/// assert_eq!(normalize_path("/"), "/");
/// assert_eq!(normalize_path("/test/"), "/test");
/// assert_eq!(normalize_path("/test"), "/test");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if path.is_empty() {
        return Cow::Borrowed("/");
    }

    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => Cow::Borrowed(stripped),
        _ => Cow::Borrowed(path),
    }
}

/// A compiled route path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    normalized: String,
    literals: Vec<String>,
    variables: Vec<String>,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a declared route path.
    ///
    /// Fails only when the (normalized) pattern does not start with `/`.
    ///
    /// ```
    /// use micro_dispatch::path::PathPattern;
    ///
    /// let pattern = PathPattern::compile("/a/{x}/b/{y}").unwrap();
    /// let vars = pattern.match_path("/a/1/b/2").unwrap();
    /// assert_eq!(vars.get("x"), Some("1"));
    /// assert_eq!(vars.get("y"), Some("2"));
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let normalized = normalize_path(pattern).into_owned();
        if !normalized.starts_with('/') {
            return Err(PatternError::missing_leading_slash(pattern));
        }

        let mut literals = Vec::new();
        let mut variables = Vec::new();
        let mut regex_str = String::from("(?i)^");
        let mut last = 0;

        for captures in PLACEHOLDER.captures_iter(&normalized) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            let literal = &normalized[last..whole.start()];
            regex_str.push_str(&regex::escape(literal));
            regex_str.push_str(VARIABLE_CAPTURE);
            literals.push(literal.to_string());
            variables.push(name.as_str().to_string());
            last = whole.end();
        }

        let tail = &normalized[last..];
        regex_str.push_str(&regex::escape(tail));
        regex_str.push('$');
        if !tail.is_empty() {
            literals.push(tail.to_string());
        }

        let regex = Regex::new(&regex_str).map_err(|e| PatternError::invalid(pattern, e))?;

        Ok(Self { pattern: pattern.to_string(), normalized, literals, variables, regex })
    }

    /// The pattern as it was declared.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The slash-normalized pattern.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Literal text between placeholders, in declaration order.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    /// Variable names, in declaration order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Returns true if the whole normalized `path` matches.
    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(&normalize_path(path))
    }

    /// Matches the whole normalized `path` and binds the captured values to the variable
    /// names, positionally.
    pub fn match_path(&self, path: &str) -> Option<PathVariables> {
        let path = normalize_path(path);
        let captures = self.regex.captures(&path)?;

        let values = captures.iter().skip(1).map(|m| m.map_or("", |m| m.as_str()));
        Some(self.variables.iter().cloned().zip(values.map(str::to_string)).collect())
    }
}
