// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External script generator.
//!
//! The orchestrator builds a [`ScriptPrompt`] and hands it to a
//! [`ScriptGenerator`]; the generator returns the model's raw JSON text.
//! Decoding and shape checks stay on our side of the seam.
//!
//! [`GeminiGenerator`] talks to the Gemini `generateContent` REST API.

use crate::models::script::VARIATION_COUNT;
use crate::models::{Tone, WordBand};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Sampling temperature for script generation.
const TEMPERATURE: f64 = 0.9;

/// Errors from the generator transport.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Transport(String),

    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generator returned no content")]
    EmptyResponse,
}

/// Fully rendered request for the external generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptPrompt {
    pub system_instruction: String,
    pub prompt: String,
    /// Schema constraining the reply to the script shape
    pub response_schema: serde_json::Value,
}

impl ScriptPrompt {
    /// Render the prompt for a topic, tone and target duration.
    pub fn build(topic: &str, tone: Tone, duration_seconds: u32) -> Self {
        let band = WordBand::for_duration(duration_seconds);

        let system_instruction = format!(
            "You are ForgeScript, a cold, psychologically sharp reel engine.\n\
             \n\
             Generate EXACTLY {count} variations.\n\
             \n\
             STRICT STYLE RULES:\n\
             - No metaphors, no poetic language, no motivational cliches.\n\
             - No coaching language and no step-by-step advice.\n\
             - Grounded modern scenarios only, with at least 2 specific physical actions per variation.\n\
             - Short, punchy lines that escalate tension across sections.\n\
             \n\
             STRUCTURE:\n\
             Hook: directly confront \"you\" and expose behavior immediately.\n\
             Struggle: observable actions, minimum 2 sentences, increasing pressure.\n\
             Realization: expose the contradiction between what you say and what you do.\n\
             Declaration: a short personal behavioral truth.\n\
             CTA: 2-5 words, binary identity contrast.\n\
             \n\
             Each variation must be {min}-{max} words.\n\
             \n\
             Tone setting: {tone}\n\
             Target Duration: {duration} seconds\n",
            count = VARIATION_COUNT,
            min = band.min,
            max = band.max,
            tone = tone.as_str(),
            duration = duration_seconds,
        );

        let prompt = format!(
            "Forge {count} grounded, psychologically sharp scripts about:\n\"{topic}\"\n\n\
             Tone: {tone}\nTarget duration: {duration} seconds.\n",
            count = VARIATION_COUNT,
            topic = topic,
            tone = tone.as_str(),
            duration = duration_seconds,
        );

        Self {
            system_instruction,
            prompt,
            response_schema: script_schema(),
        }
    }
}

/// Response schema for the generated script.
fn script_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "variations": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "hook": { "type": "STRING" },
                        "struggle": { "type": "STRING" },
                        "realization": { "type": "STRING" },
                        "declaration": { "type": "STRING" },
                        "cta": { "type": "STRING" },
                        "estimatedDuration": { "type": "INTEGER" }
                    },
                    "required": [
                        "hook", "struggle", "realization",
                        "declaration", "cta", "estimatedDuration"
                    ]
                }
            },
            "visualSuggestions": { "type": "ARRAY", "items": { "type": "STRING" } },
            "caption": { "type": "STRING" },
            "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["variations", "visualSuggestions", "caption", "hashtags"]
    })
}

/// External structured-text generator.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Run one generation and return the raw JSON text of the reply.
    async fn generate(&self, prompt: &ScriptPrompt) -> Result<String, GeneratorError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    /// Create a new Gemini client.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
            model,
        }
    }

    fn request_body(prompt: &ScriptPrompt) -> serde_json::Value {
        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.prompt }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "responseMimeType": "application/json",
                "responseSchema": prompt.response_schema,
            }
        })
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl ScriptGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &ScriptPrompt) -> Result<String, GeneratorError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| GeneratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!("Gemini rate limit hit (429)");
            }
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Transport(format!("invalid response body: {}", e)))?;

        parsed.into_text().ok_or(GeneratorError::EmptyResponse)
    }
}
