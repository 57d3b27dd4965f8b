//! Synthesizer backed by a remote TTS HTTP service.
//!
//! The service takes `{"text", "voice_prompt_base64"}` as JSON and answers
//! with a WAV file body.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Synthesizer, VoiceReference};
use crate::audio::RawAudio;
use crate::audio::wav::decode_wav;
use crate::error::SynthesisError;

/// Default time allowed for one generation request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct HttpSynthesizer {
    endpoint: Url,
    health_endpoint: Url,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_prompt_base64: Option<String>,
}

/// Response of the service health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: String,
}

impl HttpSynthesizer {
    /// Create a synthesizer posting to `endpoint`.
    ///
    /// The health endpoint defaults to `health` next to the generate path.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SynthesisError> {
        let endpoint = parse_url(endpoint)?;
        let health_endpoint = endpoint
            .join("health")
            .map_err(|e| SynthesisError::Backend(format!("Invalid endpoint URL: {}", e)))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            health_endpoint,
            client,
        })
    }

    /// Use a different URL for health checks.
    pub fn with_health_endpoint(mut self, url: &str) -> Result<Self, SynthesisError> {
        self.health_endpoint = parse_url(url)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn health_endpoint(&self) -> &str {
        self.health_endpoint.as_str()
    }

    /// Ask the service whether it is up and has its model loaded.
    pub async fn health(&self) -> Result<HealthStatus, SynthesisError> {
        let response = self
            .client
            .get(self.health_endpoint.clone())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Api {
                message: format!("health check returned {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        Ok(response.json::<HealthStatus>().await?)
    }
}

fn parse_url(url: &str) -> Result<Url, SynthesisError> {
    Url::parse(url).map_err(|e| SynthesisError::Backend(format!("Invalid endpoint URL {:?}: {}", url, e)))
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceReference>,
    ) -> Result<RawAudio, SynthesisError> {
        let voice_prompt_base64 = match voice {
            Some(voice) => Some(STANDARD.encode(voice.load_bytes().await?)),
            None => None,
        };

        let request = GenerateRequest {
            text,
            voice_prompt_base64,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(error_response) => error_response.detail,
                Err(_) => error_text,
            };
            return Err(SynthesisError::Api {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let body = response.bytes().await?;
        log::debug!("Received {} bytes of audio from {}", body.len(), self.endpoint);
        decode_wav(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
