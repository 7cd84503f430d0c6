// HTTP client for the Perspective comment analysis API.
//
// Every request waits on the client's admission gate before it is sent.
// The gate is sized from the project's QPS the same way Google enforces
// it: a per-minute quota of 60 * qps requests. If the API still answers
// 429, the configured QPS is higher than the real quota, so the gate is
// forced shut for a full minute and the caller gets QuotaExceeded.

use reqwest::StatusCode;
use tokio::time::Duration;
use tracing::{debug, error};

use crate::error::PerspectiveError;
use crate::models::{AnalysisResponse, AnalyzeRequest};
use crate::ratelimit::AdmissionGate;

/// Public Perspective API endpoint.
pub const DEFAULT_API_URL: &str = "https://commentanalyzer.googleapis.com";

const ANALYZE_PATH: &str = "/v1alpha1/comments:analyze";

/// Length of the quota window Perspective enforces.
pub const QUOTA_PERIOD: Duration = Duration::from_secs(60);

const USER_AGENT: &str = "perspective-rs/0.1";

/// Rate-limited Perspective API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the quota.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    do_not_store: bool,
    gate: Option<AdmissionGate>,
}

impl Client {
    /// Create a client with the default quota of 1 QPS.
    pub fn new(api_key: impl Into<String>) -> Result<Self, PerspectiveError> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            api_key: api_key.into(),
            qps: 1,
            quota: None,
            gate: None,
            rate_limited: true,
            do_not_store: false,
            base_url: DEFAULT_API_URL.to_string(),
            http: None,
        }
    }

    /// The admission gate requests wait on, unless rate limiting is off.
    pub fn gate(&self) -> Option<&AdmissionGate> {
        self.gate.as_ref()
    }

    pub fn do_not_store(&self) -> bool {
        self.do_not_store
    }

    /// Score a comment.
    ///
    /// Waits for the rate limiter first, so this can take up to a full
    /// quota window when many requests are queued.
    pub async fn analyze(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisResponse, PerspectiveError> {
        if request.attributes.is_empty() {
            return Err(PerspectiveError::NoAttributes);
        }

        if let Some(gate) = &self.gate {
            gate.acquire().await;
        }

        let url = format!("{}{}", self.base_url, ANALYZE_PATH);
        debug!(
            attributes = request.attributes.len(),
            text_len = request.text.len(),
            "Perspective analyze request"
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request.to_payload(self.do_not_store))
            .send()
            .await?;

        let status = response.status();

        // Shut the gate before touching the body: a 429 must block further
        // requests even if its body never arrives intact.
        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(gate) = &self.gate {
                gate.force_exhaust();
            }
            error!(
                period_secs = QUOTA_PERIOD.as_secs(),
                "Perspective quota exceeded, pausing requests for {}s. \
                 Check that the configured QPS matches the project quota",
                QUOTA_PERIOD.as_secs()
            );
            let body = response.text().await.unwrap_or_default();
            return Err(PerspectiveError::QuotaExceeded { body });
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(PerspectiveError::Api {
                status: status.as_u16(),
                body,
            });
        }

        AnalysisResponse::from_json(&body).map_err(|source| PerspectiveError::Decode { source, body })
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    api_key: String,
    qps: u32,
    quota: Option<(u32, Duration)>,
    gate: Option<AdmissionGate>,
    rate_limited: bool,
    do_not_store: bool,
    base_url: String,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Queries per second allowed for the project (default 1).
    pub fn qps(mut self, qps: u32) -> Self {
        self.qps = qps;
        self
    }

    /// Use an explicit quota instead of one derived from `qps`.
    pub fn quota(mut self, limit: u32, period: Duration) -> Self {
        self.quota = Some((limit, period));
        self
    }

    /// Share an existing gate, e.g. between clients using the same key.
    pub fn gate(mut self, gate: AdmissionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Turn client-side rate limiting off entirely.
    pub fn rate_limited(mut self, enabled: bool) -> Self {
        self.rate_limited = enabled;
        self
    }

    pub fn do_not_store(mut self, do_not_store: bool) -> Self {
        self.do_not_store = do_not_store;
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<Client, PerspectiveError> {
        let gate = match (self.rate_limited, self.gate) {
            (false, _) => None,
            (true, Some(gate)) => Some(gate),
            (true, None) => {
                let (limit, period) = self
                    .quota
                    .unwrap_or((self.qps.saturating_mul(60), QUOTA_PERIOD));
                Some(AdmissionGate::new(limit, period)?)
            }
        };

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().user_agent(USER_AGENT).build()?,
        };

        Ok(Client {
            http,
            api_key: self.api_key,
            base_url: self.base_url,
            do_not_store: self.do_not_store,
            gate,
        })
    }
}
