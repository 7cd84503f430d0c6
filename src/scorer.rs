// Toxicity scorer trait — a provider-neutral view of the API.
//
// Callers that only want "how toxic is this text" use ToxicityScorer
// instead of building AnalyzeRequests. PerspectiveScorer implements it
// over the rate-limited Client, requesting the six stable attributes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::client::Client;
use crate::models::{AnalysisResponse, AnalyzeRequest, AttributeName};

/// The result of scoring a single piece of text for toxicity.
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityResult {
    /// Overall toxicity score from 0.0 (benign) to 1.0 (very toxic)
    pub toxicity: f64,
    /// Breakdown of specific attributes (if the provider supports them)
    pub attributes: ToxicityAttributes,
}

/// Detailed toxicity attribute scores (all 0.0 to 1.0).
/// Not all providers will populate every field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToxicityAttributes {
    pub severe_toxicity: Option<f64>,
    pub identity_attack: Option<f64>,
    pub insult: Option<f64>,
    pub profanity: Option<f64>,
    pub threat: Option<f64>,
}

impl From<&AnalysisResponse> for ToxicityResult {
    fn from(response: &AnalysisResponse) -> Self {
        Self {
            toxicity: response.score(AttributeName::Toxicity).unwrap_or(0.0),
            attributes: ToxicityAttributes {
                severe_toxicity: response.score(AttributeName::SevereToxicity),
                identity_attack: response.score(AttributeName::IdentityAttack),
                insult: response.score(AttributeName::Insult),
                profanity: response.score(AttributeName::Profanity),
                threat: response.score(AttributeName::Threat),
            },
        }
    }
}

/// Trait for scoring text toxicity. Implementations must be async because
/// most providers require HTTP API calls.
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Score a single text for toxicity.
    async fn score_text(&self, text: &str) -> Result<ToxicityResult>;

    /// Score multiple texts, returning results in the same order.
    /// Default implementation calls score_text sequentially — providers
    /// can override for batching if they support it.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<ToxicityResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.score_text(text).await?);
        }
        Ok(results)
    }
}

/// Perspective API toxicity scorer.
pub struct PerspectiveScorer {
    client: Client,
    languages: Vec<String>,
}

impl PerspectiveScorer {
    /// Score English text with the given client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            languages: vec!["en".to_string()],
        }
    }

    /// Replace the languages sent with each request. An empty list lets
    /// the API detect the language.
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    fn request(&self, text: &str) -> AnalyzeRequest {
        let mut request = AnalyzeRequest::new(text).attributes(AttributeName::STABLE);
        request.languages = self.languages.clone();
        request
    }
}

#[async_trait]
impl ToxicityScorer for PerspectiveScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        let response = self
            .client
            .analyze(&self.request(text))
            .await
            .context("Failed to score text with Perspective API")?;

        let result = ToxicityResult::from(&response);

        debug!(
            toxicity = result.toxicity,
            severe_toxicity = ?result.attributes.severe_toxicity,
            identity_attack = ?result.attributes.identity_attack,
            text_preview = preview(text),
            "Scored text"
        );

        Ok(result)
    }

    /// All requests are queued at once; the client's admission gate paces
    /// them and releases them in order.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<ToxicityResult>> {
        try_join_all(texts.iter().map(|text| self.score_text(text))).await
    }
}

/// First 50 characters of `text`, cut on a char boundary.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(50) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
