//! Closures as path generators

use super::PathGenerator;
use crate::error::StowageResult;
use crate::node::Node;
use crate::value::Context;
use std::fmt;

type Callback = dyn Fn(&dyn Node, &Context) -> StowageResult<String> + Send + Sync;

/// Wraps a closure so it can be registered under a namer id
pub struct CallbackPathGenerator {
    callback: Box<Callback>,
}

impl CallbackPathGenerator {
    /// Wraps `callback`
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&dyn Node, &Context) -> StowageResult<String> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl PathGenerator for CallbackPathGenerator {
    fn generate_path(&self, node: &dyn Node, context: &Context) -> StowageResult<String> {
        (self.callback)(node, context)
    }
}

impl fmt::Debug for CallbackPathGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackPathGenerator").finish_non_exhaustive()
    }
}
