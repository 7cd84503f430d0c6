// Perspective API request and response types.
//
// The wire format is camelCase JSON. Requests go out as `AnalyzeRequest`
// (built by the caller) wrapped in a private payload struct that adds the
// client-level `doNotStore` flag. Responses are decoded into a raw mirror
// of the JSON and then reshaped into `AnalysisResponse`, which orders the
// attribute scores and splits summary and span scores apart.
//
// API docs: https://developers.perspectiveapi.com/s/about-the-api-methods

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An attribute Perspective can score a comment for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeName {
    // Stable
    Toxicity,
    SevereToxicity,
    IdentityAttack,
    Insult,
    Profanity,
    Threat,
    // Experimental
    ToxicityExperimental,
    SevereToxicityExperimental,
    IdentityAttackExperimental,
    InsultExperimental,
    ProfanityExperimental,
    ThreatExperimental,
    SexuallyExplicit,
    Flirtation,
    // New York Times models, English only
    AttackOnAuthor,
    AttackOnCommenter,
    Incoherent,
    Inflammatory,
    LikelyToReject,
    Obscene,
    Spam,
    Unsubstantial,
}

impl AttributeName {
    pub const ALL: [AttributeName; 22] = [
        Self::Toxicity,
        Self::SevereToxicity,
        Self::IdentityAttack,
        Self::Insult,
        Self::Profanity,
        Self::Threat,
        Self::ToxicityExperimental,
        Self::SevereToxicityExperimental,
        Self::IdentityAttackExperimental,
        Self::InsultExperimental,
        Self::ProfanityExperimental,
        Self::ThreatExperimental,
        Self::SexuallyExplicit,
        Self::Flirtation,
        Self::AttackOnAuthor,
        Self::AttackOnCommenter,
        Self::Incoherent,
        Self::Inflammatory,
        Self::LikelyToReject,
        Self::Obscene,
        Self::Spam,
        Self::Unsubstantial,
    ];

    /// The six production attributes.
    pub const STABLE: [AttributeName; 6] = [
        Self::Toxicity,
        Self::SevereToxicity,
        Self::IdentityAttack,
        Self::Insult,
        Self::Profanity,
        Self::Threat,
    ];

    /// The name as it appears on the wire, e.g. `SEVERE_TOXICITY`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toxicity => "TOXICITY",
            Self::SevereToxicity => "SEVERE_TOXICITY",
            Self::IdentityAttack => "IDENTITY_ATTACK",
            Self::Insult => "INSULT",
            Self::Profanity => "PROFANITY",
            Self::Threat => "THREAT",
            Self::ToxicityExperimental => "TOXICITY_EXPERIMENTAL",
            Self::SevereToxicityExperimental => "SEVERE_TOXICITY_EXPERIMENTAL",
            Self::IdentityAttackExperimental => "IDENTITY_ATTACK_EXPERIMENTAL",
            Self::InsultExperimental => "INSULT_EXPERIMENTAL",
            Self::ProfanityExperimental => "PROFANITY_EXPERIMENTAL",
            Self::ThreatExperimental => "THREAT_EXPERIMENTAL",
            Self::SexuallyExplicit => "SEXUALLY_EXPLICIT",
            Self::Flirtation => "FLIRTATION",
            Self::AttackOnAuthor => "ATTACK_ON_AUTHOR",
            Self::AttackOnCommenter => "ATTACK_ON_COMMENTER",
            Self::Incoherent => "INCOHERENT",
            Self::Inflammatory => "INFLAMMATORY",
            Self::LikelyToReject => "LIKELY_TO_REJECT",
            Self::Obscene => "OBSCENE",
            Self::Spam => "SPAM",
            Self::Unsubstantial => "UNSUBSTANTIAL",
        }
    }

    /// Whether the attribute only supports English text.
    pub fn english_only(self) -> bool {
        matches!(
            self,
            Self::AttackOnAuthor
                | Self::AttackOnCommenter
                | Self::Incoherent
                | Self::Inflammatory
                | Self::LikelyToReject
                | Self::Obscene
                | Self::Spam
                | Self::Unsubstantial
        )
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown attribute name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown Perspective attribute: {0}")]
pub struct UnknownAttribute(pub String);

impl FromStr for AttributeName {
    type Err = UnknownAttribute;

    /// Case-insensitive; accepts `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| UnknownAttribute(s.to_string()))
    }
}

/// An attribute to request, with optional scoring options.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: AttributeName,
    /// Only `PROBABILITY` is currently supported by the API.
    pub score_type: String,
    /// Scores below this are left out of the response.
    pub score_threshold: Option<f32>,
}

impl Attribute {
    pub fn new(name: AttributeName) -> Self {
        Self {
            name,
            score_type: "PROBABILITY".to_string(),
            score_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

impl From<AttributeName> for Attribute {
    fn from(name: AttributeName) -> Self {
        Self::new(name)
    }
}

/// A comment to analyze and the attributes to score it for.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub text: String,
    pub attributes: Vec<Attribute>,
    /// ISO 631-1 codes. Left empty, the API detects the language itself.
    pub languages: Vec<String>,
    pub session_id: Option<String>,
    /// Echoed back in the response.
    pub client_token: Option<String>,
}

impl AnalyzeRequest {
    /// A request for `text` with no attributes yet.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: Vec::new(),
            languages: Vec::new(),
            session_id: None,
            client_token: None,
        }
    }

    pub fn attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn attributes<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn client_token(mut self, client_token: impl Into<String>) -> Self {
        self.client_token = Some(client_token.into());
        self
    }

    /// Build the JSON body sent to `comments:analyze`.
    pub(crate) fn to_payload(&self, do_not_store: bool) -> AnalyzePayload<'_> {
        let requested_attributes = self
            .attributes
            .iter()
            .map(|attr| {
                (
                    attr.name,
                    AttributeConfig {
                        score_type: &attr.score_type,
                        score_threshold: attr.score_threshold,
                    },
                )
            })
            .collect();

        AnalyzePayload {
            comment: Comment {
                text: &self.text,
                kind: "PLAIN_TEXT",
            },
            requested_attributes,
            languages: (!self.languages.is_empty()).then_some(self.languages.as_slice()),
            do_not_store,
            session_id: self.session_id.as_deref(),
            client_token: self.client_token.as_deref(),
        }
    }
}

// --- wire format: request ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyzePayload<'a> {
    comment: Comment<'a>,
    requested_attributes: BTreeMap<AttributeName, AttributeConfig<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    languages: Option<&'a [String]>,
    do_not_store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Comment<'a> {
    text: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributeConfig<'a> {
    score_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
}

// --- scores ---

/// Which part of a comment a score covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreType {
    /// A contiguous part of the text.
    Span,
    /// The whole comment.
    Summary,
}

/// Common view over summary and span scores.
pub trait Score {
    /// Score value, 0.0 to 1.0 for `PROBABILITY` scores.
    fn value(&self) -> f64;
    /// The score type reported by the API, e.g. `PROBABILITY`.
    fn kind(&self) -> &str;
    fn score_type(&self) -> ScoreType;
}

/// Score for the whole comment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SummaryScore {
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Score for SummaryScore {
    fn value(&self) -> f64 {
        self.value
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn score_type(&self) -> ScoreType {
        ScoreType::Summary
    }
}

/// Score for a span of the comment, as character offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanScore {
    pub value: f64,
    pub kind: String,
    pub begin: Option<u32>,
    pub end: Option<u32>,
}

impl Score for SpanScore {
    fn value(&self) -> f64 {
        self.value
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn score_type(&self) -> ScoreType {
        ScoreType::Span
    }
}

/// All scores returned for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeScore {
    pub name: AttributeName,
    pub summary: SummaryScore,
    pub spans: Vec<SpanScore>,
}

/// Parsed result of a `comments:analyze` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    /// Languages the comment was scored in.
    pub languages: Vec<String>,
    pub detected_languages: Vec<String>,
    pub client_token: Option<String>,
    /// One entry per requested attribute that came back, ordered by name.
    pub attribute_scores: Vec<AttributeScore>,
}

impl AnalysisResponse {
    /// Decode a response body.
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawAnalysisResponse>(body).map(Self::from_raw)
    }

    /// Summary score for `name`, if it was returned.
    pub fn score(&self, name: AttributeName) -> Option<f64> {
        self.attribute(name).map(|score| score.summary.value)
    }

    pub fn attribute(&self, name: AttributeName) -> Option<&AttributeScore> {
        self.attribute_scores.iter().find(|score| score.name == name)
    }
}

// --- wire format: response ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysisResponse {
    #[serde(default)]
    attribute_scores: HashMap<AttributeName, RawAttributeScore>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default, alias = "detected_languages")]
    detected_languages: Vec<String>,
    client_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttributeScore {
    summary_score: SummaryScore,
    #[serde(default)]
    span_scores: Vec<RawSpanScore>,
}

#[derive(Debug, Deserialize)]
struct RawSpanScore {
    begin: Option<u32>,
    end: Option<u32>,
    score: SummaryScore,
}

impl AnalysisResponse {
    fn from_raw(raw: RawAnalysisResponse) -> Self {
        let mut attribute_scores: Vec<AttributeScore> = raw
            .attribute_scores
            .into_iter()
            .map(|(name, score)| AttributeScore {
                name,
                summary: score.summary_score,
                spans: score
                    .span_scores
                    .into_iter()
                    .map(|span| SpanScore {
                        value: span.score.value,
                        kind: span.score.kind,
                        begin: span.begin,
                        end: span.end,
                    })
                    .collect(),
            })
            .collect();
        attribute_scores.sort_by_key(|score| score.name);

        Self {
            languages: raw.languages,
            detected_languages: raw.detected_languages,
            client_token: raw.client_token,
            attribute_scores,
        }
    }
}
