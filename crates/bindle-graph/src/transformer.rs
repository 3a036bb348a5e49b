//! The transformer collaborator: the only reader of module content.

use std::path::Path;

use async_trait::async_trait;

/// Per-traversal context handed to the transformer with every call.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Platform the bundle targets; also selects platform-qualified file
    /// variants during resolution.
    pub platform: Option<String>,
    /// Development-mode transform.
    pub dev: bool,
}

/// Opaque failure from the transformer collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransformError(pub String);

/// Extracts the declared dependency-reference strings of a module.
///
/// Treated as a pure, possibly slow, re-invokable function: the graph may
/// call it any number of times for the same path and caches nothing on its
/// behalf.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn shallow_references(
        &self,
        path: &Path,
        options: &TransformOptions,
    ) -> std::result::Result<Vec<String>, TransformError>;
}
