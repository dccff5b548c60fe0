//! Handlebars templates as path generators

use super::{PathGenerator, TEMPLATE_KEY};
use crate::error::{StowageError, StowageResult};
use crate::node::Node;
use crate::value::{Context, Value};
use handlebars::Handlebars;
use serde_json::json;
use std::fmt;

/// Renders the template found under the `template` context key
///
/// The template sees every context entry plus a `node` object with the
/// node's `path`, `name`, `name_without_extension` and `extension`.
/// Escaping is disabled and strict mode is on, so a missing variable is an
/// error instead of an empty segment.
pub struct TemplatePathGenerator {
    handlebars: Handlebars<'static>,
}

impl TemplatePathGenerator {
    /// Generator with a fresh handlebars registry
    #[must_use]
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        Self { handlebars }
    }

    /// Generator using a preconfigured registry (helpers, partials)
    ///
    /// Escaping is still disabled; paths are not HTML.
    #[must_use]
    pub fn with_registry(mut handlebars: Handlebars<'static>) -> Self {
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    fn template_data(node: &dyn Node, context: &Context) -> StowageResult<serde_json::Value> {
        let path = node.path()?;
        let (name_without_extension, extension) = match node.as_file() {
            Some(file) => (file.name_without_extension()?, file.extension()?),
            None => (
                path.name_without_extension().to_string(),
                path.extension().map(str::to_string),
            ),
        };

        let mut data = serde_json::Map::new();
        for (key, value) in context {
            if key == TEMPLATE_KEY {
                continue;
            }
            let value = serde_json::to_value(value)
                .map_err(|e| StowageError::Template(e.to_string()))?;
            data.insert(key.clone(), value);
        }
        data.insert(
            "node".to_string(),
            json!({
                "path": path.as_str(),
                "name": path.name(),
                "name_without_extension": name_without_extension,
                "extension": extension.unwrap_or_default(),
            }),
        );
        Ok(serde_json::Value::Object(data))
    }
}

impl Default for TemplatePathGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathGenerator for TemplatePathGenerator {
    fn generate_path(&self, node: &dyn Node, context: &Context) -> StowageResult<String> {
        let Some(Value::String(template)) = context.get(TEMPLATE_KEY) else {
            return Err(StowageError::Config(format!(
                "Template generator requires a string \"{TEMPLATE_KEY}\" context entry"
            )));
        };

        let data = Self::template_data(node, context)?;
        let rendered = self
            .handlebars
            .render_template(template, &data)
            .map_err(|e| StowageError::Template(e.to_string()))?;

        tracing::trace!(template = %template, path = %rendered, "Rendered path template");
        Ok(rendered)
    }
}

impl fmt::Debug for TemplatePathGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplatePathGenerator").finish_non_exhaustive()
    }
}
