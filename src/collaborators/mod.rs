//! Interfaces para os sistemas externos: fonte de vagas, adaptador de
//! documentos e envio de candidaturas.
//!
//! O motor só conversa com eles pelos traits assíncronos abaixo, então testes
//! e a demo podem trocar por implementações em processo.

pub mod http;
pub mod proxy;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::SearchCriteria;

pub use http::{HttpApplicationSubmitter, HttpDocumentTailor, HttpEndpoint, HttpJobSource};
pub use proxy::ProxyPool;

/// One externally sourced job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary: Option<String>,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A document tailored for one posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentArtifact {
    /// Identifier of this tailored revision, recorded as the record's `resume_version`.
    pub version: String,
    #[serde(default)]
    pub content: String,
}

/// What the submitter reports back for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub success: bool,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("remote throttled the call, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollaboratorError::Malformed(err.to_string())
        } else {
            CollaboratorError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait JobSource: Send + Sync {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, CollaboratorError>;
}

#[async_trait]
pub trait DocumentTailor: Send + Sync {
    async fn tailor(
        &self,
        description: &str,
        base_document_id: &str,
    ) -> Result<DocumentArtifact, CollaboratorError>;
}

#[async_trait]
pub trait ApplicationSubmitter: Send + Sync {
    async fn submit(
        &self,
        url: &str,
        document: &DocumentArtifact,
    ) -> Result<SubmissionReceipt, CollaboratorError>;
}
