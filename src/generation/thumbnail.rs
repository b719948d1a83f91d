//! Image-generation stage: photo + choices + aspect ratio in, thumbnail out.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::enhancer::PromptEnhancer;
use super::gemini::{
    Content, DEFAULT_IMAGE_MODEL, GeminiClient, GeminiError, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part,
};
use super::types::{AspectRatio, CreativeBrief, UserChoices};

/// Matches a data URI embedded in model prose, e.g.
/// `data:image/jpeg;base64,/9j/4AAQ...`.
static EMBEDDED_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data:image/[^;]+;base64,[^\s"]+"#).expect("valid regex"));

/// Error from a single variant generation. Always names the aspect ratio so
/// a batch with mixed outcomes stays attributable per variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("the model failed to generate a {aspect_ratio} thumbnail: {cause}")]
pub struct GenerationError {
    pub aspect_ratio: AspectRatio,
    pub cause: String,
}

/// Anything that can settle one thumbnail variant. The orchestrator only
/// talks to this trait, which keeps batch behavior testable without a
/// network.
#[async_trait]
pub trait VariantGenerator: Send + Sync {
    async fn generate(
        &self,
        photo_data_uri: &str,
        choices: &UserChoices,
        aspect_ratio: AspectRatio,
    ) -> Result<String, GenerationError>;
}

/// The production generator: enhances the prompt, then drives the image
/// model with the instruction and the source photo as multimodal input.
pub struct ThumbnailGenerator {
    enhancer: PromptEnhancer,
    client: GeminiClient,
    model: String,
}

impl ThumbnailGenerator {
    pub fn new(enhancer: PromptEnhancer, image_client: GeminiClient) -> Self {
        Self::with_model(enhancer, image_client, DEFAULT_IMAGE_MODEL)
    }

    pub fn with_model(
        enhancer: PromptEnhancer,
        image_client: GeminiClient,
        model: impl Into<String>,
    ) -> Self {
        Self {
            enhancer,
            client: image_client,
            model: model.into(),
        }
    }

    async fn generate_inner(
        &self,
        photo_data_uri: &str,
        choices: &UserChoices,
        aspect_ratio: AspectRatio,
    ) -> Result<String, GeminiError> {
        // Stage one never fails; a degraded brief is still a brief.
        let brief = self.enhancer.enhance(choices).await;
        let instruction = build_instruction(&brief, choices, aspect_ratio);
        debug!(
            ratio = aspect_ratio.as_str(),
            "dispatching image generation"
        );

        let photo = strip_data_uri_prefix(photo_data_uri);
        let request = GenerateContentRequest {
            model: self.model.clone(),
            contents: vec![Content {
                parts: vec![
                    Part::text(instruction),
                    Part::inline_data("image/jpeg", photo),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.8,
                max_output_tokens: 1000,
                top_p: None,
                top_k: None,
            },
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        extract_image(&response)
    }
}

#[async_trait]
impl VariantGenerator for ThumbnailGenerator {
    async fn generate(
        &self,
        photo_data_uri: &str,
        choices: &UserChoices,
        aspect_ratio: AspectRatio,
    ) -> Result<String, GenerationError> {
        self.generate_inner(photo_data_uri, choices, aspect_ratio)
            .await
            .map_err(|err| GenerationError {
                aspect_ratio,
                cause: err.to_string(),
            })
    }
}

fn strip_data_uri_prefix(uri: &str) -> &str {
    uri.split_once(',').map(|(_, payload)| payload).unwrap_or(uri)
}

/// Compose the full instruction: scene, design guidelines from the brief,
/// and the twelve hard layout/fidelity requirements.
fn build_instruction(
    brief: &CreativeBrief,
    choices: &UserChoices,
    aspect_ratio: AspectRatio,
) -> String {
    format!(
        "Generate a YouTube thumbnail using the creative direction below.\n\
         \n\
         Scene\n\
         {scene}\n\
         \n\
         Design guidelines\n\
         - Style guide: {style_guide}\n\
         - Color palette: {color_palette}\n\
         - Composition notes: {composition_notes}\n\
         - Image placement: {image_placement}\n\
         - Visual balance: {visual_balance}\n\
         \n\
         Hard requirements\n\
         1. Exact aspect ratio: {ratio}.\n\
         2. Subject placement: place the user's face on the {placement} side, occupying about 40-50% of the frame.\n\
         3. Face quality: photorealistic, highly detailed skin texture, sharp eyes, and a clear, expressive emotion (surprise, excitement, shock, etc.) that reads even at small sizes.\n\
         4. Head framing: center the face vertically. Scale the subject slightly smaller if needed so the full head and hairline are visible. Do not crop half the face or cut the hairline.\n\
         5. No alterations: preserve the user's face exactly as provided. Do not distort, retouch, or alter facial features or alignment.\n\
         6. Text: add short bold text (3-5 words) on the opposite side of the subject. Use a large sans-serif, high-contrast colors, and an outline or shadow for readability. Text must never cover the face.\n\
         7. Background: supportive and non-distracting - blurred, simplified, or themed to contrast with subject and text.\n\
         8. Lighting: cinematic. Strong key light on the face, background slightly darker to increase contrast.\n\
         9. Color and tone: highly saturated, vibrant colors optimized for visibility on YouTube's dark UI.\n\
         10. Composition stability: keep the subject consistent in position (no drift left or right) and maintain ratio-specific alignment.\n\
         11. Readability: place text away from the subject and any busy background elements.\n\
         12. Download output: final images must maintain the requested aspect ratio exactly and be suitable for direct upload to YouTube.\n\
         \n\
         Goal\n\
         Produce a realistic, clickable YouTube thumbnail where the user's face is the focal point, supported by bold readable text and a clean, high-contrast layout optimized for CTR.",
        scene = brief.detailed_prompt,
        style_guide = brief.style_guide,
        color_palette = brief.color_palette,
        composition_notes = brief.composition_notes,
        image_placement = brief.image_placement,
        visual_balance = brief.visual_balance,
        ratio = aspect_ratio.as_str(),
        placement = choices.photo_placement,
    )
}

/// Pull the generated image out of a model response.
///
/// Preference order: an inline binary part (returned as a data URI with its
/// declared mime type, `image/jpeg` when unspecified), then a data URI
/// embedded in any text part.
pub(crate) fn extract_image(response: &GenerateContentResponse) -> Result<String, GeminiError> {
    let parts = response
        .candidates
        .first()
        .map(|candidate| &candidate.content.parts)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| GeminiError::InvalidResponse("no content parts in response".into()))?;

    if let Some(inline) = parts
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .find(|inline| !inline.data.is_empty())
    {
        let mime_type = if inline.mime_type.is_empty() {
            "image/jpeg"
        } else {
            &inline.mime_type
        };
        return Ok(format!("data:{mime_type};base64,{}", inline.data));
    }

    for text in parts.iter().filter_map(|part| part.text.as_deref()) {
        if let Some(found) = EMBEDDED_IMAGE.find(text) {
            return Ok(found.as_str().to_string());
        }
    }

    Err(GeminiError::InvalidResponse(
        "the model did not return a valid image".into(),
    ))
}
