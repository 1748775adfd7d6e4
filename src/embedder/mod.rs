//! Embedding seam between the pipeline and concrete model backends.

mod openai;

pub use openai::OpenAiEmbedder;

use anyhow::Result;

/// Maps page texts to fixed-length numeric vectors.
///
/// Implementations must return one vector per input, positionally aligned,
/// with a constant dimension across one call, and must be deterministic for a
/// fixed model identifier.
pub trait TextEmbedder {
    /// Embeds every text in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the loaded model, for logging and reproducibility.
    fn model_id(&self) -> &str;
}
