//! The two-stage thumbnail generation pipeline and its batch orchestrator.

pub mod enhancer;
pub mod gemini;
pub mod orchestrator;
pub mod thumbnail;
pub mod types;

pub use enhancer::PromptEnhancer;
pub use gemini::{GeminiClient, GeminiError};
pub use orchestrator::{BatchSummary, GenerationOrchestrator, OrchestratorError};
pub use thumbnail::{GenerationError, ThumbnailGenerator, VariantGenerator};
pub use types::{
    AspectRatio, CreativeBrief, GenerationProgress, ThumbnailVariant, UserChoices, VariantStatus,
};
