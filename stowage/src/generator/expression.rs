//! Generator backed by the path expression engine

use super::{PathGenerator, EXPRESSION_KEY};
use crate::error::{StowageError, StowageResult};
use crate::expression::ExpressionEngine;
use crate::node::Node;
use crate::value::{Context, Value};

/// Evaluates the expression found under the `expression` context key
///
/// A missing or null expression falls back to the engine's default.
#[derive(Debug, Default)]
pub struct ExpressionPathGenerator {
    engine: ExpressionEngine,
}

impl ExpressionPathGenerator {
    /// Wraps `engine`
    #[must_use]
    pub const fn new(engine: ExpressionEngine) -> Self {
        Self { engine }
    }

    /// The wrapped engine
    #[must_use]
    pub const fn engine(&self) -> &ExpressionEngine {
        &self.engine
    }
}

impl PathGenerator for ExpressionPathGenerator {
    fn generate_path(&self, node: &dyn Node, context: &Context) -> StowageResult<String> {
        let expression = match context.get(EXPRESSION_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(expression)) => Some(expression.as_str()),
            Some(other) => {
                return Err(StowageError::Config(format!(
                    "The \"{EXPRESSION_KEY}\" context entry must be a string, found {}",
                    other.type_name()
                )))
            }
        };
        self.engine.evaluate(expression, node, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::expression::MockSlugger;
    use crate::node::PendingFile;

    #[test]
    fn test_reads_expression_from_context() {
        let generator = ExpressionPathGenerator::default();
        let upload = PendingFile::from_bytes("Report.PDF", b"%PDF").unwrap();
        let path = generator
            .generate_path(&upload, &context! { "expression" => "docs/{name}{ext}" })
            .unwrap();
        assert_eq!(path, "docs/report.pdf");
    }

    #[test]
    fn test_null_expression_uses_default() {
        let mut slugger = MockSlugger::new();
        slugger.expect_slug().returning(|input: &str| input.to_uppercase());
        let generator = ExpressionPathGenerator::new(
            ExpressionEngine::new()
                .with_slugger(slugger)
                .with_default_expression("{name}{ext}"),
        );
        let upload = PendingFile::from_bytes("notes.txt", b"").unwrap();

        assert_eq!(generator.generate_path(&upload, &Context::new()).unwrap(), "NOTES.txt");
        assert_eq!(
            generator
                .generate_path(&upload, &context! { "expression" => Value::Null })
                .unwrap(),
            "NOTES.txt"
        );
    }

    #[test]
    fn test_non_string_expression_is_config_error() {
        let generator = ExpressionPathGenerator::default();
        let upload = PendingFile::from_bytes("a.txt", b"").unwrap();
        assert!(matches!(
            generator.generate_path(&upload, &context! { "expression" => 3 }),
            Err(StowageError::Config(_))
        ));
    }
}
