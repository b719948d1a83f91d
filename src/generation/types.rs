// Core types for the thumbnail generation pipeline

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Number of variants dispatched per batch: three landscape, three portrait.
pub const BATCH_SIZE: u32 = 6;

pub const VIDEO_TYPE_OPTIONS: &[&str] = &["Tutorial", "Vlog", "Gaming", "Review", "Unboxing"];
pub const STYLE_MOOD_OPTIONS: &[&str] = &["Bold", "Minimalist", "Dramatic", "Fun", "Vintage"];
pub const PLACEMENT_OPTIONS: &[&str] = &["Left", "Center", "Right"];

/// Questionnaire answers driving a generation batch.
///
/// Immutable once a batch starts; every variant request and any later
/// regeneration sees the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChoices {
    pub video_type: String,
    pub style_mood: String,
    pub photo_placement: String,
    pub prompt: String,
}

/// Structured creative direction produced by the prompt-enhancement stage.
///
/// Never partially valid: a failed parse replaces the whole value with a
/// deterministic fallback, not a mix of real and fallback fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeBrief {
    #[serde(default)]
    pub detailed_prompt: String,
    #[serde(default)]
    pub style_guide: String,
    #[serde(default)]
    pub color_palette: String,
    #[serde(default)]
    pub composition_notes: String,
    #[serde(default)]
    pub text_guidance: String,
    #[serde(default)]
    pub image_placement: String,
    #[serde(default)]
    pub visual_balance: String,
}

/// Target aspect ratio for a thumbnail variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9, the standard YouTube player thumbnail.
    Landscape,
    /// 9:16, for Shorts.
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    /// Fixed pixel resolution every export is normalized to.
    pub fn export_dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1280, 720),
            AspectRatio::Portrait => (720, 1280),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement state of a single variant.
///
/// A settled variant carries exactly one of a result image or an error
/// message, never both. Regeneration re-enters `Pending` from either
/// settled state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantStatus {
    Pending,
    Done { url: String },
    Failed { error: String },
}

/// One of the six thumbnail generation attempts in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailVariant {
    pub id: u32,
    pub title: String,
    pub aspect_ratio: AspectRatio,
    pub status: VariantStatus,
}

impl ThumbnailVariant {
    pub fn pending(id: u32, aspect_ratio: AspectRatio) -> Self {
        Self {
            id,
            title: aspect_ratio.as_str().to_string(),
            aspect_ratio,
            status: VariantStatus::Pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.status, VariantStatus::Pending)
    }

    pub fn url(&self) -> Option<&str> {
        match &self.status {
            VariantStatus::Done { url } => Some(url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            VariantStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Batch progress counter. `current` only ever moves forward; both
/// successes and failures count as settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationProgress {
    pub current: u32,
    pub total: u32,
}

impl GenerationProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current == self.total
    }
}

/// Build a shareable link summarizing the choices behind a result set.
pub fn share_link(base_url: &str, choices: &UserChoices, thumbnail_count: usize) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("videoType", &choices.video_type)
        .append_pair("styleMood", &choices.style_mood)
        .append_pair("photoPlacement", &choices.photo_placement)
        .append_pair("prompt", &choices.prompt)
        .append_pair("thumbnailCount", &thumbnail_count.to_string())
        .finish();

    format!("{base_url}?{query}")
}

/// Decode the base64 payload of a `data:<mime>;base64,...` URI.
///
/// Accepts a bare base64 string as well, since model responses sometimes
/// omit the prefix.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = uri.split_once(',').map(|(_, p)| p).unwrap_or(uri);
    BASE64.decode(payload.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_labels_and_dimensions() {
        assert_eq!(AspectRatio::Landscape.as_str(), "16:9");
        assert_eq!(AspectRatio::Portrait.as_str(), "9:16");
        assert_eq!(AspectRatio::Landscape.export_dimensions(), (1280, 720));
        assert_eq!(AspectRatio::Portrait.export_dimensions(), (720, 1280));
    }

    #[test]
    fn settled_variant_carries_exactly_one_payload() {
        let done = ThumbnailVariant {
            status: VariantStatus::Done {
                url: "data:image/jpeg;base64,abc".into(),
            },
            ..ThumbnailVariant::pending(1, AspectRatio::Landscape)
        };
        assert!(done.url().is_some());
        assert!(done.error().is_none());

        let failed = ThumbnailVariant {
            status: VariantStatus::Failed {
                error: "boom".into(),
            },
            ..ThumbnailVariant::pending(2, AspectRatio::Portrait)
        };
        assert!(failed.url().is_none());
        assert!(failed.error().is_some());
    }

    #[test]
    fn brief_parses_with_missing_fields_defaulting_to_empty() {
        let brief: CreativeBrief =
            serde_json::from_str(r#"{"detailedPrompt":"a scene","colorPalette":"red"}"#).unwrap();
        assert_eq!(brief.detailed_prompt, "a scene");
        assert_eq!(brief.color_palette, "red");
        assert_eq!(brief.style_guide, "");
        assert_eq!(brief.visual_balance, "");
    }

    #[test]
    fn share_link_encodes_choices() {
        let choices = UserChoices {
            video_type: "Gaming".into(),
            style_mood: "Bold".into(),
            photo_placement: "Left".into(),
            prompt: "neon lights & rain".into(),
        };
        let link = share_link("https://example.com", &choices, 6);
        assert!(link.starts_with("https://example.com?"));
        assert!(link.contains("videoType=Gaming"));
        assert!(link.contains("thumbnailCount=6"));
        assert!(link.contains("neon+lights+%26+rain"));
    }

    #[test]
    fn data_uri_decode_handles_prefix_and_bare_payload() {
        let encoded = BASE64.encode(b"hello");
        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_data_uri(&uri).unwrap(), b"hello");
        assert_eq!(decode_data_uri(&encoded).unwrap(), b"hello");
    }
}
