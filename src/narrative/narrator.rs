//! Async client for the external narrator service
//!
//! The narrator turns a finished encounter's log into flavor text. It
//! is strictly optional: any failure degrades to a deterministic
//! fallback string and must never block the combat state transition.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::encounter::settlement::EncounterOutcome;

/// HTTP client for the narrator LLM endpoint
pub struct NarratorClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl NarratorClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
        }
    }

    /// Create a client from environment variables
    ///
    /// Required: NARRATOR_API_KEY
    /// Optional: NARRATOR_API_URL, NARRATOR_MODEL
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("NARRATOR_API_KEY")
            .map_err(|_| EngineError::NarratorError("NARRATOR_API_KEY not set".into()))?;
        let api_url = std::env::var("NARRATOR_API_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".into());
        let model =
            std::env::var("NARRATOR_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".into());
        Ok(Self::new(api_key, api_url, model))
    }

    /// Ask the narrator to summarize a finished encounter
    pub async fn summarize_combat(&self, outcome: &EncounterOutcome) -> Result<String> {
        let log_excerpt = outcome
            .logs
            .iter()
            .rev()
            .take(40)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "The battle is over ({}, {} rounds). Summarize it in two or three vivid sentences.\n\nCombat log:\n{}",
            if outcome.victory { "victory" } else { "defeat" },
            outcome.rounds,
            log_excerpt
        );

        let request = NarratorRequest {
            model: self.model.clone(),
            max_tokens: 512,
            system: SYSTEM_PROMPT.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::NarratorError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::NarratorError(format!(
                "API error: {error_text}"
            )));
        }

        let completion: NarratorResponse = response
            .json()
            .await
            .map_err(|e| EngineError::NarratorError(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| EngineError::NarratorError("Empty response".into()))
    }
}

const SYSTEM_PROMPT: &str = "You narrate the aftermath of tactical fantasy battles. \
Write in past tense, second person for the party. Never invent events \
that are not in the log.";

/// Deterministic summary used whenever the narrator is unavailable
pub fn fallback_summary(outcome: &EncounterOutcome) -> String {
    if outcome.victory {
        format!(
            "The battle is won after {} rounds. The party claims {} XP.",
            outcome.rounds, outcome.xp_awarded
        )
    } else {
        format!("The party falls after {} rounds of fighting.", outcome.rounds)
    }
}

/// Summarize via the narrator when one is available, degrading to the
/// fallback on any failure
pub async fn summarize_or_fallback(
    client: Option<&NarratorClient>,
    outcome: &EncounterOutcome,
) -> String {
    match client {
        Some(client) => match client.summarize_combat(outcome).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(%error, "narrator unavailable, using fallback summary");
                fallback_summary(outcome)
            }
        },
        None => fallback_summary(outcome),
    }
}

#[derive(Serialize)]
struct NarratorRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct NarratorResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}
