// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Script generation request and result shapes.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Number of variations every generated script must contain.
pub const VARIATION_COUNT: usize = 3;

/// Maximum accepted topic length (characters).
pub const MAX_TOPIC_CHARS: usize = 500;

/// Voice of the generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Tone {
    Aggressive,
    Stoic,
    Calm,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Aggressive => "Aggressive",
            Tone::Stoic => "Stoic",
            Tone::Calm => "Calm",
        }
    }
}

/// Spoken word-count band for a target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBand {
    pub min: u32,
    pub max: u32,
}

impl WordBand {
    /// Band for a target duration; unknown durations get the 30s band.
    pub fn for_duration(seconds: u32) -> Self {
        match seconds {
            15 => Self { min: 40, max: 70 },
            60 => Self { min: 180, max: 260 },
            _ => Self { min: 90, max: 130 },
        }
    }
}

/// Incoming generation request (not persisted).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub topic: String,
    pub tone: Tone,
    #[serde(alias = "duration")]
    pub target_duration_seconds: u32,
}

impl GenerationRequest {
    /// Trimmed topic, or a description of why it is unacceptable.
    pub fn validated_topic(&self) -> Result<&str, String> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err("topic must not be empty".to_string());
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(format!("topic must be at most {} characters", MAX_TOPIC_CHARS));
        }
        Ok(topic)
    }
}

/// One script variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ScriptVariation {
    pub hook: String,
    pub struggle: String,
    pub realization: String,
    pub declaration: String,
    pub cta: String,
    /// Estimated spoken duration in seconds
    pub estimated_duration: u32,
}

impl ScriptVariation {
    /// Name of the first empty required text field, if any.
    fn first_empty_field(&self) -> Option<&'static str> {
        [
            ("hook", &self.hook),
            ("struggle", &self.struggle),
            ("realization", &self.realization),
            ("declaration", &self.declaration),
            ("cta", &self.cta),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Decoded generator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedScript {
    pub variations: Vec<ScriptVariation>,
    pub visual_suggestions: Vec<String>,
    pub caption: String,
    pub hashtags: Vec<String>,
}

impl GeneratedScript {
    /// Decode raw generator JSON and check the shape.
    pub fn decode(raw: &str) -> Result<Self, String> {
        let script: GeneratedScript =
            serde_json::from_str(raw).map_err(|e| format!("invalid script JSON: {}", e))?;
        script.check_shape()?;
        Ok(script)
    }

    fn check_shape(&self) -> Result<(), String> {
        if self.variations.len() != VARIATION_COUNT {
            return Err(format!(
                "expected {} variations, got {}",
                VARIATION_COUNT,
                self.variations.len()
            ));
        }
        for (idx, variation) in self.variations.iter().enumerate() {
            if let Some(field) = variation.first_empty_field() {
                return Err(format!("variation {} has empty '{}'", idx, field));
            }
        }
        Ok(())
    }
}
