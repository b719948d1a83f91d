//! AI-assisted YouTube thumbnail generation.
//!
//! Takes a creator photo plus a short questionnaire, enhances the request
//! into a creative brief with a text model, drives an image model to
//! produce a batch of six thumbnails in both YouTube aspect ratios, and
//! offers the results as a normalized ZIP download or a single composited
//! album page.

pub mod album;
pub mod config;
pub mod export;
pub mod generation;
pub mod session;

pub use album::AlbumCompositor;
pub use config::AppConfig;
pub use export::ExportPackager;
pub use generation::{
    AspectRatio, GeminiClient, GenerationOrchestrator, PromptEnhancer, ThumbnailGenerator,
    ThumbnailVariant, UserChoices, VariantStatus,
};
pub use session::Session;
