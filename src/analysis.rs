//! Client for the server-side vitals analysis endpoint.
//!
//! The endpoint takes a vitals snapshot plus a user profile and answers with
//! a narrative analysis, a risk level and recommendations. Its internals are
//! opaque; this module only speaks the request/response shape.

use std::time::Duration;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::types::VitalsReading;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analysis endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub vitals: VitalsReading,
    pub profile: UserProfile,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub analysis: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError>;
}

/// Posts `AnalysisRequest` JSON to a fixed endpoint.
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<AnalysisResponse>().await?)
    }
}
