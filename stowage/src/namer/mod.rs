//! Namers: immutable descriptions of how to derive a storage path
//!
//! A [`Namer`] is an `(id, context)` pair. The id either selects a built-in
//! engine with a `scheme:` prefix and carries the engine's input after the
//! colon, or names a custom generator registered under that exact id:
//!
//! | id | meaning |
//! |----|---------|
//! | `expression:avatars/{this.id}{ext}` | path expression |
//! | `handlebars:{{category}}/{{node.name}}` | handlebars template |
//! | `app::namers::Avatar` | custom generator |
//!
//! Nothing is validated at construction; an unknown id fails when the
//! [`PathGeneratorRegistry`](crate::generator::PathGeneratorRegistry)
//! dispatches it.

use crate::node::ChecksumAlgorithm;
use crate::value::{Context, Value};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scheme of namers evaluated by the expression engine
pub const EXPRESSION_SCHEME: &str = "expression";

/// An engine id plus the context it is evaluated with
///
/// Namers never change after construction: [`with`](Self::with) returns a
/// new namer. Equal namers produce equal paths for equal nodes, except
/// where the expression itself is random (`{rand}`).
///
/// # Examples
///
/// ```rust
/// use stowage::context;
/// use stowage::namer::Namer;
///
/// let base = Namer::expression("posts/{postId}/{name}{ext}");
/// let namer = base.with(context! { "postId" => 7 });
///
/// assert!(base.context().is_empty());
/// assert_eq!(namer.scheme(), Some(("expression", "posts/{postId}/{name}{ext}")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namer {
    id: String,
    #[serde(default, deserialize_with = "deserialize_context")]
    context: Context,
}

impl Namer {
    /// Namer with an empty context
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_context(id, Context::new())
    }

    /// Namer with an initial context
    #[must_use]
    pub fn with_context(id: impl Into<String>, context: Context) -> Self {
        Self {
            id: id.into(),
            context,
        }
    }

    /// `expression:<expression>`
    #[must_use]
    pub fn expression(expression: &str) -> Self {
        Self::new(format!("{EXPRESSION_SCHEME}:{expression}"))
    }

    /// `<engine>:<body>` for a registered template engine
    #[must_use]
    pub fn template(engine: &str, body: &str) -> Self {
        Self::new(format!("{engine}:{body}"))
    }

    /// Content-addressed names: the checksum followed by the extension
    ///
    /// Uses the engine's default algorithm when `algorithm` is `None` and the
    /// full digest when `length` is `None`.
    #[must_use]
    pub fn checksum(algorithm: Option<ChecksumAlgorithm>, length: Option<usize>) -> Self {
        let mut variable = String::from("checksum");
        if let Some(algorithm) = algorithm {
            variable.push(':');
            variable.push_str(algorithm.as_str());
        }
        if let Some(length) = length {
            variable.push_str(&format!(":{length}"));
        }
        Self::expression(&format!("{{{variable}}}{{ext}}"))
    }

    /// Slug of the original name followed by the extension
    #[must_use]
    pub fn slugify() -> Self {
        Self::expression("{name}{ext}")
    }

    /// The engine id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The namer's own context
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Splits the id on its first colon into `(scheme, body)`
    ///
    /// Whether the scheme is recognized is up to the registry.
    #[must_use]
    pub fn scheme(&self) -> Option<(&str, &str)> {
        self.id.split_once(':')
    }

    /// Copy with `context` merged in; keys in `context` win
    #[must_use]
    pub fn with(&self, context: Context) -> Self {
        let mut merged = self.context.clone();
        merged.extend(context);
        Self {
            id: self.id.clone(),
            context: merged,
        }
    }

    /// Copy with a single context entry set
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut namer = self.clone();
        namer.context.insert(key.into(), value.into());
        namer
    }
}

impl fmt::Display for Namer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

fn deserialize_context<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Context, D::Error> {
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}
