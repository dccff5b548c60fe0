//! Slug generation for the `name` built-in and the `|slug` transform

use unicode_normalization::UnicodeNormalization;

/// Turns arbitrary text into a path-safe slug
#[cfg_attr(test, mockall::automock)]
pub trait Slugger: Send + Sync {
    /// Slug of `input`
    fn slug(&self, input: &str) -> String;
}

/// ASCII-folding slugger
///
/// Decomposes to NFKD and drops everything outside ASCII, so `é` becomes
/// `e`. Runs of non-alphanumeric characters collapse into one separator and
/// the result is lowercase with no leading or trailing separator.
///
/// # Examples
///
/// ```rust
/// use stowage::expression::{AsciiSlugger, Slugger};
///
/// let slugger = AsciiSlugger::default();
/// assert_eq!(slugger.slug("Crème Brûlée -- Recipe!"), "creme-brulee-recipe");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AsciiSlugger {
    separator: char,
}

impl AsciiSlugger {
    /// Slugger joining words with `separator`
    #[must_use]
    pub const fn with_separator(separator: char) -> Self {
        Self { separator }
    }
}

impl Default for AsciiSlugger {
    fn default() -> Self {
        Self::with_separator('-')
    }
}

impl Slugger for AsciiSlugger {
    fn slug(&self, input: &str) -> String {
        let mut slug = String::with_capacity(input.len());
        let mut pending_separator = false;

        for c in input.nfkd().filter(char::is_ascii) {
            if c.is_ascii_alphanumeric() {
                if pending_separator && !slug.is_empty() {
                    slug.push(self.separator);
                }
                pending_separator = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_separator = true;
            }
        }
        slug
    }
}

/// Lowercases and replaces spaces with hyphens, nothing more
///
/// Used when no other slugger is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSlugger;

impl Slugger for FallbackSlugger {
    fn slug(&self, input: &str) -> String {
        input.to_lowercase().replace(' ', "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_slugger() {
        let slugger = AsciiSlugger::default();
        assert_eq!(slugger.slug("some CRazy file"), "some-crazy-file");
        assert_eq!(slugger.slug("  Ünïcödé  tëxt "), "unicode-text");
        assert_eq!(slugger.slug("a__b..c"), "a-b-c");
        assert_eq!(slugger.slug("!!!"), "");
    }

    #[test]
    fn test_ascii_slugger_custom_separator() {
        assert_eq!(AsciiSlugger::with_separator('_').slug("Hello World"), "hello_world");
    }

    #[test]
    fn test_fallback_slugger() {
        let slugger = FallbackSlugger;
        assert_eq!(slugger.slug("some CRazy file"), "some-crazy-file");
        assert_eq!(slugger.slug("Crème"), "crème");
    }
}
