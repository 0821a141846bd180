use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use roadmap_core::model::{CompletionMap, RoadmapId};
use roadmap_core::session::AuthToken;
use serde::{Deserialize, Serialize};

use crate::repository::{ProgressRepository, RoadmapOverview, StorageError};

/// Connection settings for the progress API.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Reads `ROADMAP_API_URL`; returns `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("ROADMAP_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }
}

/// Progress store backed by the remote HTTP API.
#[derive(Clone)]
pub struct HttpProgressRepository {
    client: Client,
    base_url: String,
}

impl HttpProgressRepository {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn progress_url(&self, roadmap: &RoadmapId) -> String {
        format!("{}/progress/{}", self.base_url, roadmap)
    }

    fn overview_url(&self) -> String {
        format!("{}/progress/all", self.base_url)
    }
}

fn check_status(status: StatusCode) -> Result<(), StorageError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StorageError::Unauthorized);
    }
    if !status.is_success() {
        return Err(StorageError::Status(status.as_u16()));
    }
    Ok(())
}

fn map_transport(err: reqwest::Error) -> StorageError {
    if err.is_decode() {
        StorageError::Serialization(err.to_string())
    } else {
        StorageError::Connection(err.to_string())
    }
}

#[async_trait]
impl ProgressRepository for HttpProgressRepository {
    async fn fetch_progress(
        &self,
        roadmap: &RoadmapId,
        token: &AuthToken,
    ) -> Result<CompletionMap, StorageError> {
        let response = self
            .client
            .get(self.progress_url(roadmap))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(map_transport)?;

        check_status(response.status())?;
        let envelope: FetchEnvelope = response.json().await.map_err(map_transport)?;
        if !envelope.success {
            return Err(StorageError::Rejected);
        }

        // A user with no saved progress gets a success envelope without data.
        Ok(envelope
            .data
            .map(|payload| payload.completed_items)
            .unwrap_or_default())
    }

    async fn save_progress(
        &self,
        roadmap: &RoadmapId,
        token: &AuthToken,
        snapshot: &CompletionMap,
    ) -> Result<(), StorageError> {
        let payload = SavePayload {
            completed_items: snapshot,
        };
        let response = self
            .client
            .post(self.progress_url(roadmap))
            .bearer_auth(token.expose())
            .json(&payload)
            .send()
            .await
            .map_err(map_transport)?;

        check_status(response.status())?;
        let envelope: AckEnvelope = response.json().await.map_err(map_transport)?;
        if !envelope.success {
            return Err(StorageError::Rejected);
        }
        Ok(())
    }

    async fn fetch_overview(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<RoadmapOverview>, StorageError> {
        let response = self
            .client
            .get(self.overview_url())
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(map_transport)?;

        check_status(response.status())?;
        let envelope: OverviewEnvelope = response.json().await.map_err(map_transport)?;
        if !envelope.success {
            return Err(StorageError::Rejected);
        }
        Ok(envelope.data)
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct FetchEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<FetchPayload>,
}

#[derive(Debug, Deserialize)]
struct FetchPayload {
    #[serde(rename = "completedItems")]
    completed_items: CompletionMap,
}

#[derive(Debug, Serialize)]
struct SavePayload<'a> {
    #[serde(rename = "completedItems")]
    completed_items: &'a CompletionMap,
}

#[derive(Debug, Deserialize)]
struct AckEnvelope {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct OverviewEnvelope {
    success: bool,
    #[serde(default)]
    data: Vec<RoadmapOverview>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_payload_uses_api_field_name() {
        let mut snapshot = CompletionMap::new();
        snapshot.toggle_item("Beginner", "HTML", "Basics", "tag");
        let payload = SavePayload {
            completed_items: &snapshot,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["completedItems"]["Beginner"]["HTML"]["Basics"]["tag"], true);
    }

    #[test]
    fn fetch_envelope_parses_saved_progress() {
        let json = r#"{
            "success": true,
            "data": {
                "completedItems": {
                    "Beginner": { "HTML": { "Basics": { "tag": true } } }
                }
            }
        }"#;
        let envelope: FetchEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.success);
        let map = envelope.data.unwrap().completed_items;
        assert!(map.is_completed("Beginner", "HTML", "Basics", "tag"));
    }

    #[test]
    fn fetch_envelope_tolerates_missing_data() {
        let envelope: FetchEnvelope = serde_json::from_str(r#"{ "success": true }"#).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn progress_urls_strip_trailing_slash() {
        let repo = HttpProgressRepository::new(ApiConfig::new("https://api.example.com/"));
        assert_eq!(
            repo.progress_url(&RoadmapId::new("frontend")),
            "https://api.example.com/progress/frontend"
        );
        assert_eq!(repo.overview_url(), "https://api.example.com/progress/all");
    }
}
