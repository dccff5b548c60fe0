//! Path expression engine
//!
//! Evaluates templates such as `"avatars/{this.id}/{name}-{rand}{ext}"`
//! against a node and a [`Context`].
//!
//! # Built-in variables
//!
//! | variable | value |
//! |----------|-------|
//! | `name` | slug of the base name without extension |
//! | `ext` | lowercase extension with leading dot, or empty |
//! | `checksum` | checksum of the file with the default algorithm |
//! | `checksum:<alg>[:<len>]` | checksum with `alg`, truncated to `len` characters |
//! | `rand`, `rand(n)` | random string of the default length, or of `n` characters |
//!
//! Anything else is looked up in the context, first as an exact key and
//! then as a dotted path through maps, lists and [`Accessible`] objects.
//!
//! [`Accessible`]: crate::value::Accessible

mod parser;
mod slug;

pub use parser::{Placeholder, Segment, Template, Transform};
#[cfg(test)]
pub use slug::MockSlugger;
pub use slug::{AsciiSlugger, FallbackSlugger, Slugger};

use crate::config::{NamingConfig, SluggerKind};
use crate::error::{StowageError, StowageResult};
use crate::node::{ChecksumAlgorithm, Node};
use crate::value::{get_property, Context, Value};
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Template used when none is supplied
pub const DEFAULT_EXPRESSION: &str = "{name}-{rand}{ext}";

/// Default length of `{rand}`
pub const DEFAULT_RAND_LENGTH: usize = 6;

/// Characters drawn by `{rand}`; `i`, `l`, `o`, `0` and `1` are left out
pub const RAND_ALPHABET: &str = "abcdefghjkmnpqrstuvwxyz23456789";

/// Random string of `length` characters from [`RAND_ALPHABET`]
#[must_use]
pub fn random_string(length: usize) -> String {
    let alphabet = RAND_ALPHABET.as_bytes();
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

/// Evaluates path expressions
///
/// Cheap to clone and safe to share between threads. Evaluation has no
/// side effects besides reading file bytes for checksums.
///
/// # Examples
///
/// ```rust
/// use stowage::context;
/// use stowage::expression::ExpressionEngine;
/// use stowage::node::PendingFile;
///
/// # fn example() -> stowage::StowageResult<()> {
/// let engine = ExpressionEngine::new();
/// let upload = PendingFile::from_bytes("Team Photo.JPG", b"...")?;
///
/// let path = engine.evaluate(
///     Some("users/{userId}/{name}{ext}"),
///     &upload,
///     &context! { "userId" => 42 },
/// )?;
/// assert_eq!(path, "users/42/team-photo.jpg");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ExpressionEngine {
    slugger: Arc<dyn Slugger>,
    default_expression: String,
    rand_length: usize,
    checksum_algorithm: ChecksumAlgorithm,
}

impl ExpressionEngine {
    /// Engine with built-in defaults and the [`FallbackSlugger`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            slugger: Arc::new(FallbackSlugger),
            default_expression: DEFAULT_EXPRESSION.to_string(),
            rand_length: DEFAULT_RAND_LENGTH,
            checksum_algorithm: ChecksumAlgorithm::default(),
        }
    }

    /// Engine configured from the `[naming]` section
    #[must_use]
    pub fn from_config(config: &NamingConfig) -> Self {
        let slugger: Arc<dyn Slugger> = match config.slugger {
            SluggerKind::Ascii => Arc::new(AsciiSlugger::default()),
            SluggerKind::Fallback => Arc::new(FallbackSlugger),
        };
        Self {
            slugger,
            default_expression: config.default_expression.clone(),
            rand_length: config.rand_length,
            checksum_algorithm: config.checksum_algorithm,
        }
    }

    /// Replaces the slugger
    #[must_use]
    pub fn with_slugger(mut self, slugger: impl Slugger + 'static) -> Self {
        self.slugger = Arc::new(slugger);
        self
    }

    /// Replaces the template used when none is supplied
    #[must_use]
    pub fn with_default_expression(mut self, expression: impl Into<String>) -> Self {
        self.default_expression = expression.into();
        self
    }

    /// Replaces the default `{rand}` length
    #[must_use]
    pub const fn with_rand_length(mut self, length: usize) -> Self {
        self.rand_length = length;
        self
    }

    /// Replaces the algorithm used by `{checksum}`
    #[must_use]
    pub const fn with_checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = algorithm;
        self
    }

    /// The slugger used by `{name}` and `|slug`
    #[must_use]
    pub fn slugger(&self) -> &dyn Slugger {
        self.slugger.as_ref()
    }

    /// Evaluates `template`, or the default expression when `None`
    ///
    /// # Errors
    ///
    /// - [`StowageError::Resolution`] for malformed templates and
    ///   unresolvable variables
    /// - [`StowageError::TypeMismatch`] when a checksum is requested for a
    ///   node that is not a file
    /// - any error raised while reading the node
    pub fn evaluate(
        &self,
        template: Option<&str>,
        node: &dyn Node,
        context: &Context,
    ) -> StowageResult<String> {
        let source = template.unwrap_or(&self.default_expression);
        let parsed = Template::parse(source)?;

        let mut output = String::with_capacity(source.len());
        for segment in parsed.segments() {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(placeholder) => {
                    output.push_str(&self.substitute(placeholder, node, context)?);
                }
            }
        }

        tracing::trace!(template = source, path = %output, "Evaluated path expression");
        Ok(output)
    }

    fn substitute(
        &self,
        placeholder: &Placeholder,
        node: &dyn Node,
        context: &Context,
    ) -> StowageResult<String> {
        let value = self.resolve(placeholder, node, context)?;
        let rendered = value.render().ok_or_else(|| {
            StowageError::resolution(
                &placeholder.raw,
                format!("a {} value cannot be converted to a string", value.type_name()),
            )
        })?;

        Ok(placeholder
            .transforms
            .iter()
            .fold(rendered, |text, transform| match transform {
                Transform::Slug => self.slugger.slug(&text),
                Transform::Lower => text.to_lowercase(),
                Transform::Upper => text.to_uppercase(),
            }))
    }

    fn resolve(
        &self,
        placeholder: &Placeholder,
        node: &dyn Node,
        context: &Context,
    ) -> StowageResult<Value> {
        let args = placeholder.args.as_deref().unwrap_or_default();

        match placeholder.variable.as_str() {
            "name" => Ok(Value::String(self.slugger.slug(&base_name(node)?))),
            "ext" => Ok(Value::String(extension_with_dot(node)?)),
            "checksum" => Ok(Value::String(
                node.ensure_file()?.checksum(Some(self.checksum_algorithm))?,
            )),
            "rand" => {
                let length = match args.first() {
                    Some(arg) => parse_length(arg, &placeholder.raw)?,
                    None => self.rand_length,
                };
                Ok(Value::String(random_string(length)))
            }
            variable => match variable.strip_prefix("checksum:") {
                Some(options) => self.truncated_checksum(options, node, &placeholder.raw),
                None => lookup(variable, args, context),
            },
        }
    }

    /// `checksum:<alg>`, `checksum:<len>`, `checksum:<alg>:<len>` or
    /// `checksum:<len>:<alg>`
    ///
    /// A token made only of ASCII digits is a length, anything else an
    /// algorithm name.
    fn truncated_checksum(
        &self,
        options: &str,
        node: &dyn Node,
        raw: &str,
    ) -> StowageResult<Value> {
        let mut algorithm = None;
        let mut length = None;

        for token in options.split(':') {
            if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                if length.replace(parse_length(token, raw)?).is_some() {
                    return Err(StowageError::resolution(raw, "checksum length given twice"));
                }
            } else if algorithm.replace(token.parse::<ChecksumAlgorithm>()?).is_some() {
                return Err(StowageError::resolution(raw, "checksum algorithm given twice"));
            }
        }

        let mut digest = node
            .ensure_file()?
            .checksum(Some(algorithm.unwrap_or(self.checksum_algorithm)))?;
        if let Some(length) = length {
            digest.truncate(length);
        }
        Ok(Value::String(digest))
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("default_expression", &self.default_expression)
            .field("rand_length", &self.rand_length)
            .field("checksum_algorithm", &self.checksum_algorithm)
            .finish_non_exhaustive()
    }
}

fn parse_length(arg: &str, raw: &str) -> StowageResult<usize> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            StowageError::resolution(raw, format!("\"{arg}\" is not a positive length"))
        })
}

/// Original name for pending files, stored name otherwise
fn base_name(node: &dyn Node) -> StowageResult<String> {
    if let Some(pending) = node.as_pending() {
        return Ok(pending.original_name_without_extension().to_string());
    }
    Ok(node.path()?.name_without_extension().to_string())
}

fn extension_with_dot(node: &dyn Node) -> StowageResult<String> {
    if let Some(pending) = node.as_pending() {
        return Ok(pending.original_extension_with_dot().to_lowercase());
    }
    Ok(node
        .path()?
        .extension()
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default())
}

/// Exact context key, then dotted traversal
fn lookup(variable: &str, args: &[String], context: &Context) -> StowageResult<Value> {
    if let Some(value) = context.get(variable) {
        return Ok(value.clone());
    }

    let segments = split_segments(variable)?;
    let Some((first, rest)) = segments.split_first() else {
        return Err(StowageError::resolution(variable, "empty variable"));
    };

    let mut current = context.get(*first).cloned().ok_or_else(|| {
        StowageError::resolution(variable, format!("unknown variable \"{first}\""))
    })?;

    for (i, segment) in rest.iter().enumerate() {
        let call_args = if i + 1 == rest.len() { args } else { &[] };
        current = descend(&current, segment, call_args).ok_or_else(|| {
            StowageError::resolution(
                variable,
                format!("no \"{segment}\" on {}", current.type_name()),
            )
        })??;
    }
    Ok(current)
}

fn descend(value: &Value, segment: &str, args: &[String]) -> Option<StowageResult<Value>> {
    match value {
        Value::Map(map) => map.get(segment).cloned().map(Ok),
        Value::List(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .cloned()
            .map(Ok),
        Value::Object(object) => get_property(object.as_ref(), segment, args),
        _ => None,
    }
}

/// `a.b[0].c` becomes `["a", "b", "0", "c"]`
fn split_segments(variable: &str) -> StowageResult<Vec<&str>> {
    let mut segments = Vec::new();
    for part in variable.split('.') {
        let (head, mut brackets) = part.find('[').map_or((part, ""), |i| part.split_at(i));
        if head.contains(']') {
            return Err(StowageError::resolution(variable, "unbalanced \"]\""));
        }
        if !head.is_empty() {
            segments.push(head);
        }
        while !brackets.is_empty() {
            let inner = brackets
                .strip_prefix('[')
                .and_then(|b| b.find(']').map(|end| (&b[..end], &b[end + 1..])));
            let Some((index, remainder)) = inner else {
                return Err(StowageError::resolution(variable, "unbalanced \"[\""));
            };
            if index.is_empty() || index.contains('[') {
                return Err(StowageError::resolution(variable, "malformed index"));
            }
            segments.push(index);
            brackets = remainder;
        }
        if head.is_empty() && part.is_empty() {
            return Err(StowageError::resolution(variable, "empty segment"));
        }
    }
    Ok(segments)
}
