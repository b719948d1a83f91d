//! Prompt-enhancement stage: questionnaire answers in, creative brief out.
//!
//! The enhancer is the first stage of the two-stage generation chain. It is
//! contractually infallible: if the text model is unreachable or replies
//! with something unparsable, a deterministic template brief is returned
//! instead, so callers never need an error path here.

use tracing::warn;

use super::gemini::{
    Content, DEFAULT_TEXT_MODEL, GeminiClient, GeminiError, GenerateContentRequest,
    GenerationConfig, Part,
};
use super::types::{CreativeBrief, UserChoices};

const SYSTEM_PROMPT: &str = r#"You are a senior creative director who specializes in designing high-performing YouTube thumbnails.
Your goal is to transform simple user inputs into detailed, production-ready thumbnail prompts for an AI image generator.
Every response must be valid JSON following the schema below.
User face should be same as in the photo.

Schema:
{
  "detailedPrompt": "Rich description of the thumbnail scene, subject, background, and atmosphere. Be concrete and visual - specify subject's pose, expression, clothing, and environment.",
  "styleGuide": "Precise art direction (photorealistic, cinematic, flat vector, cartoon, painterly, etc.) with references if useful.",
  "colorPalette": "Exact scheme - include 3-5 core colors and describe their emotional effect (e.g., 'vibrant red + yellow for urgency, dark background for contrast').",
  "compositionNotes": "Guidance on framing (close-up vs wide shot), focal points, spacing, and use of negative space.",
  "textGuidance": "Instructions for text overlay - size, font style (bold/clean/futuristic/handwritten), placement (top-left, bottom-right, center), and contrast requirements.",
  "imagePlacement": "Where to position the user's photo or main subject (left/right/center/foreground/background). Be explicit.",
  "visualBalance": "Rules to balance subject, text, and background - e.g., 'subject on left, bold text on right with high contrast; background blurred to emphasize subject'."
}

Rules:
- Always produce specific, actionable design directions - avoid vague terms like "make it look nice".
- Assume the goal is maximum CTR: high-contrast, bold, emotional, legible on small screens.
- Consider common YouTube design psychology: big expressive faces, emotional storytelling, strong diagonals, clear subject separation.
- If user input is too vague, make creative assumptions but explain them in the JSON fields.
- NEVER include logos, watermarks, or extra borders.
- Make sure the response is strictly valid JSON (no extra commentary)."#;

/// Turns [`UserChoices`] into a [`CreativeBrief`], falling back to
/// deterministic templates whenever the model stage fails.
pub struct PromptEnhancer {
    client: GeminiClient,
    model: String,
}

impl PromptEnhancer {
    pub fn new(client: GeminiClient) -> Self {
        Self::with_model(client, DEFAULT_TEXT_MODEL)
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Produce a brief. Never fails: every error path collapses into the
    /// deterministic fallback built from the choices alone.
    pub async fn enhance(&self, choices: &UserChoices) -> CreativeBrief {
        match self.enhance_with_model(choices).await {
            Ok(brief) => brief,
            Err(err) => {
                warn!("prompt enhancement failed, using template fallback: {err}");
                fallback_brief(choices)
            }
        }
    }

    async fn enhance_with_model(&self, choices: &UserChoices) -> Result<CreativeBrief, GeminiError> {
        let request = GenerateContentRequest {
            model: self.model.clone(),
            contents: vec![Content {
                parts: vec![Part::text(format!(
                    "{SYSTEM_PROMPT}\n\n{}",
                    user_prompt(choices)
                ))],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 800,
                top_p: Some(0.8),
                top_k: Some(40),
            },
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        let content = response
            .first_text()
            .ok_or_else(|| GeminiError::InvalidResponse("no text content in response".into()))?;

        // A reply that is not JSON is still usable as the scene description;
        // only the structured fields get templated in that case.
        Ok(parse_brief(content).unwrap_or_else(|| brief_from_plain_text(content, choices)))
    }
}

fn user_prompt(choices: &UserChoices) -> String {
    format!(
        "Generate a thumbnail design plan for:\n\
         - Video Type: {}\n\
         - Style/Mood: {}\n\
         - Photo Placement: {}\n\
         - Creative Direction: {}",
        choices.video_type, choices.style_mood, choices.photo_placement, choices.prompt
    )
}

/// Parse a model reply into a brief, tolerating code fences and prose
/// around the JSON object. Absent fields default to empty strings.
pub(crate) fn parse_brief(content: &str) -> Option<CreativeBrief> {
    let cleaned = strip_code_fences(content.trim());
    let json = extract_json_block(&cleaned)?;
    serde_json::from_str(json).ok()
}

fn strip_code_fences(content: &str) -> String {
    content
        .replace("```json", "")
        .trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// First balanced `{...}` block, if any.
fn extract_json_block(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Mid-tier fallback: the model answered, but not in JSON. Keep its text
/// as the scene description and template the rest.
fn brief_from_plain_text(content: &str, choices: &UserChoices) -> CreativeBrief {
    CreativeBrief {
        detailed_prompt: content.to_string(),
        style_guide: format!("Style: {}", choices.style_mood),
        color_palette: "Vibrant, high-contrast colors".into(),
        composition_notes: format!("Place subject on {} side", choices.photo_placement),
        text_guidance: "Large, bold text in upper-left area with dark outlines for readability"
            .into(),
        image_placement: format!(
            "Position user photo on {} side, occupying roughly half the frame",
            choices.photo_placement
        ),
        visual_balance: "Ensure text and image don't overlap, maintain clear visual hierarchy"
            .into(),
    }
}

fn style_enhancement(style_mood: &str) -> &'static str {
    match style_mood {
        "Bold" => "high-contrast, dramatic lighting, strong shadows",
        "Minimalist" => "clean lines, simple backgrounds, subtle gradients",
        "Dramatic" => "dark shadows, intense lighting, moody atmosphere",
        "Fun" => "bright colors, playful elements, energetic composition",
        "Vintage" => "warm tones, retro styling, film grain effect",
        _ => "professional styling",
    }
}

fn video_type_enhancement(video_type: &str) -> &'static str {
    match video_type {
        "Tutorial" => "educational, professional, clear visual hierarchy",
        "Vlog" => "personal, authentic, relatable atmosphere",
        "Gaming" => "dynamic, high-energy, neon accents",
        "Review" => "professional, trustworthy, balanced composition",
        "Unboxing" => "excitement, anticipation, clean presentation",
        _ => "engaging content",
    }
}

fn text_placement_guidance(placement: &str) -> &'static str {
    match placement {
        "Left" => "Large, bold text in upper-left area, avoid overlapping with user photo",
        "Center" => "Text positioned above or below the centered user photo",
        "Right" => "Large, bold text in upper-left area, user photo on right side",
        _ => "Large, bold text with dark outlines for readability",
    }
}

fn image_placement_guidance(placement: &str) -> Option<&'static str> {
    match placement {
        "Left" => Some("User photo positioned on left side, occupying roughly 40-50% of frame width"),
        "Center" => Some("User photo centered, with text positioned above or below"),
        "Right" => Some("User photo positioned on right side, occupying roughly 40-50% of frame width"),
        _ => None,
    }
}

/// Fully deterministic brief built from lookup tables alone. No network,
/// no randomness; the same choices always yield the same brief.
pub fn fallback_brief(choices: &UserChoices) -> CreativeBrief {
    let detailed_prompt = format!(
        "Create a compelling {} thumbnail with a {} style. {}. The main subject should be \
         positioned on the {} side with {}. The overall mood should reflect {}.",
        choices.video_type.to_lowercase(),
        choices.style_mood.to_lowercase(),
        choices.prompt,
        choices.photo_placement.to_lowercase(),
        style_enhancement(&choices.style_mood),
        video_type_enhancement(&choices.video_type),
    );

    CreativeBrief {
        detailed_prompt,
        style_guide: format!("Style: {}", choices.style_mood),
        color_palette: "Vibrant, attention-grabbing colors".into(),
        composition_notes: format!("Subject placement: {}", choices.photo_placement),
        text_guidance: text_placement_guidance(&choices.photo_placement).into(),
        image_placement: image_placement_guidance(&choices.photo_placement)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("Position user photo on {} side", choices.photo_placement)
            }),
        visual_balance:
            "Ensure text and image don't overlap, maintain clear visual hierarchy with proper spacing"
                .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> UserChoices {
        UserChoices {
            video_type: "Gaming".into(),
            style_mood: "Bold".into(),
            photo_placement: "Left".into(),
            prompt: "epic boss fight reaction".into(),
        }
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = fallback_brief(&choices());
        let b = fallback_brief(&choices());
        assert_eq!(a, b);
        assert!(a.detailed_prompt.contains("gaming thumbnail"));
        assert!(a.detailed_prompt.contains("high-contrast, dramatic lighting"));
        assert!(a.detailed_prompt.contains("dynamic, high-energy, neon accents"));
    }

    #[test]
    fn fallback_handles_unknown_options() {
        let odd = UserChoices {
            video_type: "Documentary".into(),
            style_mood: "Baroque".into(),
            photo_placement: "Bottom".into(),
            prompt: "a volcano".into(),
        };
        let brief = fallback_brief(&odd);
        assert!(brief.detailed_prompt.contains("professional styling"));
        assert!(brief.detailed_prompt.contains("engaging content"));
        assert_eq!(brief.image_placement, "Position user photo on Bottom side");
    }

    #[test]
    fn parse_strips_fences_and_surrounding_prose() {
        let raw = "Here is your plan:\n```json\n{\"detailedPrompt\": \"a scene\"}\n```\nEnjoy!";
        // Trailing prose after the fence: the balanced-block scan still finds
        // the object.
        let brief = parse_brief(raw).unwrap();
        assert_eq!(brief.detailed_prompt, "a scene");
        assert_eq!(brief.style_guide, "");
    }

    #[test]
    fn parse_extracts_first_balanced_block() {
        let raw = r#"noise {"detailedPrompt": "one", "styleGuide": "nested {braces} ok"} {"detailedPrompt": "two"}"#;
        let brief = parse_brief(raw).unwrap();
        assert_eq!(brief.detailed_prompt, "one");
        assert_eq!(brief.style_guide, "nested {braces} ok");
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_brief("just a poetic description").is_none());
        assert!(parse_brief("{unbalanced").is_none());
    }

    #[test]
    fn plain_text_reply_becomes_scene_description() {
        let brief = brief_from_plain_text("a moody night scene", &choices());
        assert_eq!(brief.detailed_prompt, "a moody night scene");
        assert_eq!(brief.style_guide, "Style: Bold");
        assert!(!brief.visual_balance.is_empty());
    }

    #[tokio::test]
    async fn enhance_never_fails_when_endpoint_is_unreachable() {
        // Nothing listens here; the network error must collapse into the
        // deterministic fallback with all seven fields populated.
        let client = GeminiClient::with_base_url("test-key", "http://127.0.0.1:9");
        let enhancer = PromptEnhancer::new(client);
        let brief = enhancer.enhance(&choices()).await;

        assert_eq!(brief, fallback_brief(&choices()));
        assert!(!brief.detailed_prompt.is_empty());
        assert!(!brief.style_guide.is_empty());
        assert!(!brief.color_palette.is_empty());
        assert!(!brief.composition_notes.is_empty());
        assert!(!brief.text_guidance.is_empty());
        assert!(!brief.image_placement.is_empty());
        assert!(!brief.visual_balance.is_empty());
    }
}
