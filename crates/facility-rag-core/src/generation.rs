//! Generation backend trait.

use async_trait::async_trait;

use crate::error::RagError;

/// An external text-generation capability.
///
/// Output is not assumed deterministic. Implementations enforce their own
/// timeout and report failures as backend variants of [`RagError`].
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3.2:3b"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}
