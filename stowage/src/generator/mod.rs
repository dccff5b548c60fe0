//! Path generators and the registry that dispatches namers to them
//!
//! The registry is built once at startup. It holds a table of schemes
//! (`expression`, template engine names) and a table of custom generators
//! keyed by their full id. [`PathGeneratorRegistry::generate`] picks the
//! generator for a [`Namer`] and hands it the merged context.

mod callback;
mod expression;
mod template;

pub use callback::CallbackPathGenerator;
pub use expression::ExpressionPathGenerator;
pub use template::TemplatePathGenerator;

use crate::config::StowageConfig;
use crate::error::{StowageError, StowageResult};
use crate::expression::ExpressionEngine;
use crate::namer::{Namer, EXPRESSION_SCHEME};
use crate::node::Node;
use crate::value::{Context, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Context key carrying the expression of an `expression:` namer
pub const EXPRESSION_KEY: &str = "expression";

/// Context key carrying the template of a template engine namer
pub const TEMPLATE_KEY: &str = "template";

/// Scheme registered for the built-in handlebars generator
pub const HANDLEBARS_SCHEME: &str = "handlebars";

/// Turns a node and a context into a path
///
/// Implement this for generators referenced by a namer id.
pub trait PathGenerator: Send + Sync {
    /// Generates the path for `node`
    ///
    /// # Errors
    ///
    /// Implementations fail rather than return a partial path.
    fn generate_path(&self, node: &dyn Node, context: &Context) -> StowageResult<String>;
}

/// How a scheme's body reaches its generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKey {
    Expression,
    Template,
}

impl BodyKey {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Expression => EXPRESSION_KEY,
            Self::Template => TEMPLATE_KEY,
        }
    }
}

#[derive(Clone)]
struct Scheme {
    generator: Arc<dyn PathGenerator>,
    body_key: BodyKey,
}

/// Builder for [`PathGeneratorRegistry`]
///
/// # Examples
///
/// ```rust
/// use stowage::expression::ExpressionEngine;
/// use stowage::generator::{CallbackPathGenerator, PathGeneratorRegistry, TemplatePathGenerator};
///
/// let registry = PathGeneratorRegistry::builder()
///     .expression_engine(ExpressionEngine::new())
///     .template_engine("handlebars", TemplatePathGenerator::new())
///     .generator(
///         "app::InvoiceNamer",
///         CallbackPathGenerator::new(|_node, _ctx| Ok("invoices/latest.pdf".to_string())),
///     )
///     .build();
/// assert!(registry.has_generator("app::InvoiceNamer"));
/// ```
#[derive(Default)]
pub struct PathGeneratorRegistryBuilder {
    schemes: HashMap<String, Scheme>,
    custom: HashMap<String, Arc<dyn PathGenerator>>,
}

impl PathGeneratorRegistryBuilder {
    /// Handles `expression:` namers with `engine`
    #[must_use]
    pub fn expression_engine(mut self, engine: ExpressionEngine) -> Self {
        self.schemes.insert(
            EXPRESSION_SCHEME.to_string(),
            Scheme {
                generator: Arc::new(ExpressionPathGenerator::new(engine)),
                body_key: BodyKey::Expression,
            },
        );
        self
    }

    /// Handles `<scheme>:` namers with a template generator
    ///
    /// The body after the colon is passed under the `template` key.
    #[must_use]
    pub fn template_engine(
        mut self,
        scheme: impl Into<String>,
        generator: impl PathGenerator + 'static,
    ) -> Self {
        self.schemes.insert(
            scheme.into(),
            Scheme {
                generator: Arc::new(generator),
                body_key: BodyKey::Template,
            },
        );
        self
    }

    /// Registers a custom generator under its full id
    #[must_use]
    pub fn generator(mut self, id: impl Into<String>, generator: impl PathGenerator + 'static) -> Self {
        self.custom.insert(id.into(), Arc::new(generator));
        self
    }

    /// Registers a shared custom generator under its full id
    #[must_use]
    pub fn shared_generator(mut self, id: impl Into<String>, generator: Arc<dyn PathGenerator>) -> Self {
        self.custom.insert(id.into(), generator);
        self
    }

    /// Registers a closure as a custom generator
    #[must_use]
    pub fn callback<F>(self, id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&dyn Node, &Context) -> StowageResult<String> + Send + Sync + 'static,
    {
        self.generator(id, CallbackPathGenerator::new(callback))
    }

    /// Finishes the registry
    #[must_use]
    pub fn build(self) -> PathGeneratorRegistry {
        tracing::debug!(
            schemes = self.schemes.len(),
            generators = self.custom.len(),
            "Built path generator registry"
        );
        PathGeneratorRegistry {
            schemes: self.schemes,
            custom: self.custom,
        }
    }
}

/// Dispatches namers to path generators
///
/// Immutable once built and safe to share between threads.
#[derive(Clone)]
pub struct PathGeneratorRegistry {
    schemes: HashMap<String, Scheme>,
    custom: HashMap<String, Arc<dyn PathGenerator>>,
}

impl PathGeneratorRegistry {
    /// Registry with the default expression engine and handlebars
    #[must_use]
    pub fn new() -> Self {
        Self::builder()
            .expression_engine(ExpressionEngine::new())
            .template_engine(HANDLEBARS_SCHEME, TemplatePathGenerator::new())
            .build()
    }

    /// Empty builder
    #[must_use]
    pub fn builder() -> PathGeneratorRegistryBuilder {
        PathGeneratorRegistryBuilder::default()
    }

    /// Builder preloaded with the built-in schemes, configured from `config`
    #[must_use]
    pub fn builder_from_config(config: &StowageConfig) -> PathGeneratorRegistryBuilder {
        Self::builder()
            .expression_engine(ExpressionEngine::from_config(&config.naming))
            .template_engine(HANDLEBARS_SCHEME, TemplatePathGenerator::new())
    }

    /// Whether `scheme` is handled by a built-in generator
    #[must_use]
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes.contains_key(scheme)
    }

    /// Whether a custom generator is registered under `id`
    #[must_use]
    pub fn has_generator(&self, id: &str) -> bool {
        self.custom.contains_key(id)
    }

    /// Generates the path for `node` as described by `namer`
    ///
    /// The namer's context is merged with `context`; keys in `context` win.
    /// A recognized `scheme:` prefix dispatches to that scheme's generator
    /// with the body under its `expression` or `template` key. Otherwise the
    /// whole id must name a custom generator.
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Config`] naming the id when no generator
    /// matches, and whatever the generator fails with.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stowage::context;
    /// use stowage::generator::PathGeneratorRegistry;
    /// use stowage::namer::Namer;
    /// use stowage::node::PendingFile;
    ///
    /// # fn example() -> stowage::StowageResult<()> {
    /// let registry = PathGeneratorRegistry::new();
    /// let upload = PendingFile::from_bytes("Cover Art.PNG", b"...")?;
    ///
    /// let namer = Namer::expression("albums/{albumId}/{name}{ext}");
    /// let path = registry.generate(&namer, &upload, &context! { "albumId" => 12 })?;
    /// assert_eq!(path, "albums/12/cover-art.png");
    /// # Ok(())
    /// # }
    /// ```
    pub fn generate(
        &self,
        namer: &Namer,
        node: &dyn Node,
        context: &Context,
    ) -> StowageResult<String> {
        let mut merged = namer.context().clone();
        merged.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));

        let scheme = namer
            .scheme()
            .and_then(|(scheme, body)| self.schemes.get(scheme).map(|entry| (scheme, entry, body)));

        if let Some((scheme, entry, body)) = scheme {
            tracing::debug!(namer = namer.id(), scheme, "Dispatching to scheme generator");
            merged.insert(entry.body_key.as_str().to_string(), Value::from(body));
            return entry.generator.generate_path(node, &merged);
        }

        let generator = self.custom.get(namer.id()).ok_or_else(|| {
            StowageError::Config(format!(
                "No path generator registered for namer \"{}\"",
                namer.id()
            ))
        })?;
        tracing::debug!(namer = namer.id(), "Dispatching to custom generator");
        generator.generate_path(node, &merged)
    }
}

impl Default for PathGeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PathGeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<&String> = self.schemes.keys().collect();
        schemes.sort();
        let mut generators: Vec<&String> = self.custom.keys().collect();
        generators.sort();
        f.debug_struct("PathGeneratorRegistry")
            .field("schemes", &schemes)
            .field("generators", &generators)
            .finish()
    }
}
