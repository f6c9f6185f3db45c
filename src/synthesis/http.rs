//! Client for the Kokoro speech synthesis service.
//!
//! `POST /generate` takes `{text, voice, speed}` and answers with WAV bytes,
//! plus `X-Generation-Time` and `X-Audio-Duration` headers in seconds.
//! `GET /health` and `GET /voices` are used by `podgen check` and `podgen voices`.

use crate::config::SynthesisConfig;
use crate::error::{PodgenError, Result};
use crate::synthesis::synthesizer::{SpeechSynthesizer, SynthesisRequest, SynthesizedSpeech};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("podgen/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Service health as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_load_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// HTTP speech synthesizer.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSynthesizer {
    /// Create a client for `endpoint` with a per-request `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| PodgenError::SynthesisUnavailable {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        Self::new(&config.endpoint, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Query `GET /health`.
    pub async fn health(&self) -> Result<ServiceHealth> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e, PROBE_TIMEOUT))?;
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| PodgenError::SynthesisUnavailable {
                message: format!("malformed health response: {e}"),
            })
    }

    /// Query `GET /voices`, returning voice id to description.
    pub async fn voices(&self) -> Result<BTreeMap<String, String>> {
        let response = self
            .client
            .get(self.url("/voices"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e, PROBE_TIMEOUT))?;
        let response = self.check_status(response).await?;
        let body: VoicesResponse =
            response
                .json()
                .await
                .map_err(|e| PodgenError::SynthesisUnavailable {
                    message: format!("malformed voices response: {e}"),
                })?;
        Ok(body.voices)
    }

    fn transport_error(&self, error: reqwest::Error, timeout: Duration) -> PodgenError {
        if error.is_timeout() {
            PodgenError::SynthesisTimeout {
                timeout_secs: timeout.as_secs(),
            }
        } else if error.is_connect() {
            PodgenError::SynthesisUnavailable {
                message: format!("cannot reach {}: {error}", self.endpoint),
            }
        } else {
            PodgenError::SynthesisUnavailable {
                message: error.to_string(),
            }
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or(body);
        Err(classify_status(status, &detail, self.timeout))
    }
}

/// Map a non-success status to a synthesis error.
fn classify_status(status: StatusCode, detail: &str, timeout: Duration) -> PodgenError {
    let message = if detail.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", detail.trim())
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => PodgenError::SynthesisTimeout {
            timeout_secs: timeout.as_secs(),
        },
        StatusCode::TOO_MANY_REQUESTS => PodgenError::SynthesisUnavailable { message },
        s if s.is_client_error() => PodgenError::SynthesisRejected { message },
        _ => PodgenError::SynthesisUnavailable { message },
    }
}

fn header_secs(headers: &HeaderMap, name: &str) -> Option<Duration> {
    let secs: f64 = headers.get(name)?.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedSpeech> {
        let response = self
            .client
            .post(self.url("/generate"))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e, self.timeout))?;
        let response = self.check_status(response).await?;

        let generation_time = header_secs(response.headers(), "x-generation-time");
        let reported_duration = header_secs(response.headers(), "x-audio-duration");

        let audio = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, self.timeout))?
            .to_vec();

        debug!(
            bytes = audio.len(),
            generation_time = ?generation_time,
            audio_duration = ?reported_duration,
            "Synthesis response received"
        );

        Ok(SynthesizedSpeech {
            audio,
            reported_duration,
            generation_time,
        })
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
