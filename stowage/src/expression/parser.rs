//! Template parsing
//!
//! A template is literal text interspersed with placeholders:
//!
//! ```text
//! { variable [ ( arg1, arg2, ... ) ] [ | transform ]* }
//! ```
//!
//! `\{`, `\}` and `\\` produce literal characters. A `}` outside of a
//! placeholder is kept as text.

use crate::error::{StowageError, StowageResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.:\-\[\]]+").expect("Invalid regex"));

/// A string transform applied after value resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// ASCII-folded, lowercase, hyphen separated (`slug` or `slugify`)
    Slug,
    /// Lowercase
    Lower,
    /// Uppercase
    Upper,
}

impl FromStr for Transform {
    type Err = StowageError;

    fn from_str(s: &str) -> StowageResult<Self> {
        match s {
            "slug" | "slugify" => Ok(Self::Slug),
            "lower" => Ok(Self::Lower),
            "upper" => Ok(Self::Upper),
            _ => Err(StowageError::resolution(
                format!("|{s}"),
                "unknown transform, expected slug, slugify, lower or upper",
            )),
        }
    }
}

/// One `{...}` reference inside a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Source text including braces, for error messages
    pub raw: String,
    /// Variable name, e.g. `this.title` or `checksum:sha256:8`
    pub variable: String,
    /// Parenthesized arguments, `None` when no parentheses were given
    pub args: Option<Vec<String>>,
    /// Transforms, applied left to right
    pub transforms: Vec<Transform>,
}

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// Reference resolved at evaluation time
    Placeholder(Placeholder),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Resolution`] naming the offending token for
    /// unterminated placeholders, malformed variables, unbalanced argument
    /// lists and unknown transforms.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stowage::expression::Template;
    ///
    /// let template = Template::parse("avatars/{this.id}-{name|upper}{ext}")?;
    /// assert_eq!(template.placeholders().count(), 3);
    /// # Ok::<(), stowage::StowageError>(())
    /// ```
    pub fn parse(source: &str) -> StowageResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                '\\' => match chars.peek() {
                    Some(&(_, next @ ('{' | '}' | '\\'))) => {
                        literal.push(next);
                        chars.next();
                    }
                    _ => literal.push('\\'),
                },
                '{' => {
                    let end = find_closing_brace(source, start)?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let raw = &source[start..=end];
                    segments.push(Segment::Placeholder(parse_placeholder(raw)?));
                    while chars.peek().is_some_and(|&(i, _)| i <= end) {
                        chars.next();
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// All segments in order
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholders in order
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(placeholder) => Some(placeholder),
            Segment::Literal(_) => None,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    for c in text.chars() {
                        if matches!(c, '{' | '}' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                }
                Segment::Placeholder(placeholder) => f.write_str(&placeholder.raw)?,
            }
        }
        Ok(())
    }
}

/// Byte index of the `}` closing the placeholder opened at `open`
fn find_closing_brace(source: &str, open: usize) -> StowageResult<usize> {
    let mut depth = 0usize;
    for (i, c) in source[open + 1..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '}' if depth == 0 => return Ok(open + 1 + i),
            '{' if depth == 0 => break,
            _ => {}
        }
    }
    Err(StowageError::resolution(
        &source[open..],
        "unterminated placeholder, missing \"}\"",
    ))
}

fn parse_placeholder(raw: &str) -> StowageResult<Placeholder> {
    let body = raw[1..raw.len() - 1].trim();

    let variable = VARIABLE
        .find(body)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| StowageError::resolution(raw, "malformed variable reference"))?;

    let mut rest = body[variable.len()..].trim_start();

    let args = if rest.starts_with('(') {
        let close = find_closing_paren(rest)
            .ok_or_else(|| StowageError::resolution(raw, "unbalanced argument list"))?;
        let args = split_arguments(&rest[1..close]);
        rest = rest[close + 1..].trim_start();
        Some(args)
    } else {
        None
    };

    let mut transforms = Vec::new();
    while !rest.is_empty() {
        let Some(after_pipe) = rest.strip_prefix('|') else {
            return Err(StowageError::resolution(
                raw,
                format!("unexpected \"{rest}\" after variable"),
            ));
        };
        let after_pipe = after_pipe.trim_start();
        let name_len = after_pipe
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after_pipe.len());
        if name_len == 0 {
            return Err(StowageError::resolution(raw, "empty transform"));
        }
        transforms.push(after_pipe[..name_len].parse()?);
        rest = after_pipe[name_len..].trim_start();
    }

    Ok(Placeholder {
        raw: raw.to_string(),
        variable,
        args,
        transforms,
    })
}

/// Index of the `)` matching the `(` at index 0
fn find_closing_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on top-level commas and trims each argument
fn split_arguments(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_placeholder(source: &str) -> Placeholder {
        let template = Template::parse(source).unwrap();
        let placeholder = template.placeholders().next().cloned().unwrap();
        placeholder
    }

    #[test]
    fn test_literal_only() {
        let template = Template::parse("plain/path.txt").unwrap();
        assert_eq!(
            template.segments(),
            &[Segment::Literal("plain/path.txt".into())]
        );
    }

    #[test]
    fn test_mixed_segments() {
        let template = Template::parse("foo/{checksum}-{name}{ext}").unwrap();
        let variables: Vec<&str> = template.placeholders().map(|p| p.variable.as_str()).collect();
        assert_eq!(variables, vec!["checksum", "name", "ext"]);
        assert_eq!(template.segments().len(), 5);
    }

    #[test]
    fn test_arguments_and_transform() {
        let placeholder = only_placeholder("{rand(10)|upper}");
        assert_eq!(placeholder.variable, "rand");
        assert_eq!(placeholder.args, Some(vec!["10".to_string()]));
        assert_eq!(placeholder.transforms, vec![Transform::Upper]);
    }

    #[test]
    fn test_nested_argument_lists() {
        let placeholder = only_placeholder("{this.path( a , (b, c), d )}");
        assert_eq!(
            placeholder.args,
            Some(vec!["a".to_string(), "(b, c)".to_string(), "d".to_string()])
        );
    }

    #[test]
    fn test_empty_argument_list() {
        assert_eq!(only_placeholder("{this.slug()}").args, Some(vec![]));
        assert_eq!(only_placeholder("{this.slug}").args, None);
    }

    #[test]
    fn test_namespaced_and_bracket_variables() {
        assert_eq!(only_placeholder("{checksum:sha256:8}").variable, "checksum:sha256:8");
        assert_eq!(only_placeholder("{items[0].name}").variable, "items[0].name");
    }

    #[test]
    fn test_chained_transforms_and_whitespace() {
        let placeholder = only_placeholder("{ this.title | slugify | upper }");
        assert_eq!(placeholder.variable, "this.title");
        assert_eq!(placeholder.transforms, vec![Transform::Slug, Transform::Upper]);
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse(r"\{literal\}/{name}\\x").unwrap();
        assert_eq!(
            template.segments()[0],
            Segment::Literal("{literal}/".into())
        );
        assert_eq!(template.segments()[2], Segment::Literal("\\x".into()));
    }

    #[test]
    fn test_display_round_trips() {
        let source = r"\{a\}/{name|slug}-{rand(4)}";
        assert_eq!(Template::parse(source).unwrap().to_string(), source);
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = Template::parse("foo/{name").unwrap_err();
        assert!(matches!(err, StowageError::Resolution { ref token, .. } if token == "{name"));
    }

    #[test]
    fn test_malformed_variable() {
        let err = Template::parse("{na me}").unwrap_err();
        assert!(matches!(err, StowageError::Resolution { ref token, .. } if token == "{na me}"));
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{|slug}").is_err());
    }

    #[test]
    fn test_unknown_transform() {
        let err = Template::parse("{name|reverse}").unwrap_err();
        assert!(matches!(err, StowageError::Resolution { ref token, .. } if token == "|reverse"));
    }

    #[test]
    fn test_unbalanced_arguments() {
        assert!(Template::parse("{rand(10}").is_err());
    }

    #[test]
    fn test_stray_closing_brace_is_literal() {
        let template = Template::parse("a}b").unwrap();
        assert_eq!(template.segments(), &[Segment::Literal("a}b".into())]);
    }
}
