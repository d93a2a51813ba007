//! Backend API client
//!
//! Read-only HTTP consumer of the analysis backend: fetches job results
//! (tracks + mix instructions) and resolves per-track audio URLs. Audio
//! fetches authenticate with the session cookie when one is configured.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::decode::decode_bytes;
use crate::error::LoadError;
use crate::loader::ClipSource;
use crate::media::Clip;
use crate::model::AnalysisJob;
use crate::model::Track;

/// Errors from backend requests
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Blocking HTTP client for the analysis backend
#[derive(Clone)]
pub struct BackendClient {
    agent: ureq::Agent,
    base_url: String,
    session_cookie: Option<String>,
}

impl BackendClient {
    /// Create a client for the given API base URL (e.g.
    /// `http://localhost:8000/api/v1`)
    pub fn new(base_url: &str, session_cookie: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> ureq::Request {
        let mut request = self.agent.get(&format!("{}{}", self.base_url, path));
        if let Some(cookie) = &self.session_cookie {
            request = request.set("Cookie", cookie);
        }
        request
    }

    /// `GET /jobs/{id}/results`
    pub fn job_results(&self, job_id: &str) -> Result<AnalysisJob, ApiError> {
        self.get(&format!("/jobs/{}/results", job_id))
            .call()
            .map_err(|e| ApiError::Http(e.to_string()))?
            .into_json()
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// `GET /tracks/{id}/audio/url`
    pub fn audio_url(&self, track_id: &str) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct AudioUrl {
            url: String,
        }

        let response: AudioUrl = self
            .get(&format!("/tracks/{}/audio/url", track_id))
            .call()
            .map_err(|e| ApiError::Http(e.to_string()))?
            .into_json()
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(response.url)
    }

    /// Resolve and download the audio resource for a track
    pub fn fetch_audio(&self, track_id: &str) -> Result<Vec<u8>, LoadError> {
        let url = self
            .audio_url(track_id)
            .map_err(|e| LoadError::Network(e.to_string()))?;

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| LoadError::Network(format!("fetch failed for {}: {}", url, e)))?;

        let content_length: Option<usize> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut bytes = Vec::with_capacity(content_length.unwrap_or(0));
        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|e| LoadError::Network(format!("read error: {}", e)))?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&buffer[..read]);
        }

        log::info!("fetched {} bytes of audio for track {}", bytes.len(), track_id);
        Ok(bytes)
    }
}

impl ClipSource for BackendClient {
    fn load_clip(&self, track: &Track, target_sample_rate: u32) -> Result<Clip, LoadError> {
        let bytes = self.fetch_audio(&track.id)?;
        decode_bytes(bytes, target_sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = BackendClient::new("http://localhost:8000/api/v1/", None);
        assert_eq!(client.base_url(), "http://localhost:8000/api/v1");

        let client = BackendClient::new("http://localhost:8000/api/v1", None);
        assert_eq!(client.base_url(), "http://localhost:8000/api/v1");
    }
}
