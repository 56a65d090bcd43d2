use std::time::Duration;

use serde::Deserialize;
use shared::Category;
use tracing::{debug, instrument, warn};

use crate::api::{truncate_chars, RepoDetails};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const PROMPT_README_CHARS: usize = 2000;

#[async_trait::async_trait]
pub trait Tagger: Send + Sync {
    /// Category labels from the closed vocabulary; empty on any failure.
    async fn tags(&self, details: &RepoDetails) -> Vec<String>;
}

#[derive(Debug, thiserror::Error)]
enum TaggingError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini API error: {status} - {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("empty response")]
    Empty,
    #[error("malformed tags: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct GeminiTagger {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl GeminiTagger {
    pub fn new(api_key: Option<String>, model: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, api_key: &str, prompt: String) -> Result<Vec<String>, TaggingError> {
        let body = serde_json::json!({
            "contents": [
                {"parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "responseMimeType": "application/json"
            },
        });

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.endpoint, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TaggingError::Api { status, body });
        }

        let response: GenerateContentResponse = response.json().await?;
        let text = response.text().ok_or(TaggingError::Empty)?;
        parse_tags(&text)
    }
}

#[async_trait::async_trait]
impl Tagger for GeminiTagger {
    #[instrument(skip(self, details), fields(repo = %details.id))]
    async fn tags(&self, details: &RepoDetails) -> Vec<String> {
        let Some(api_key) = &self.api_key else {
            warn!("GEMINI_API_KEY not set, skipping tagging");
            return Vec::new();
        };

        match self.generate(api_key, build_prompt(details)).await {
            Ok(tags) => {
                debug!("Tagged with {tags:?}");
                tags
            }
            Err(e) => {
                warn!("Failed to generate tags for {}: {e}", details.id);
                Vec::new()
            }
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    tags: Vec<String>,
}

/// Parses `{"tags": [...]}`, keeping only labels of the known vocabulary.
fn parse_tags(text: &str) -> Result<Vec<String>, TaggingError> {
    let reply: TagsReply = serde_json::from_str(text.trim())?;
    Ok(Category::normalize_labels(reply.tags))
}

pub fn build_prompt(details: &RepoDetails) -> String {
    let readme = truncate_chars(&details.readme, PROMPT_README_CHARS);
    format!(
        "Analyze the following GitHub repository and assign relevant categories to it.\n\n\
         Repo: {}\n\
         Description: {}\n\
         Readme Snippet: {}\n\n\
         The available categories are:\n{}\n\n\
         Return a JSON object with a single key \"tags\" containing a list of strings.\n\
         Example: {{\"tags\": [\"Agent Framework\", \"RAG\"]}}\n\
         Only return the JSON.",
        details.full_name,
        details.description.as_deref().unwrap_or_default(),
        readme,
        Category::vocabulary_listing(),
    )
}
