//! Colaboradores HTTP que falam JSON com os serviços externos.
//!
//! Cada colaborador envolve um [`HttpEndpoint`], que cuida de autenticação,
//! timeouts, rotação de proxies e do mapeamento de status HTTP para
//! [`CollaboratorError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::proxy::ProxyPool;
use super::{
    ApplicationSubmitter, CollaboratorError, DocumentArtifact, DocumentTailor, JobPosting,
    JobSource, SubmissionReceipt,
};
use crate::params::SearchCriteria;

// Espera padrão quando um 429 chega sem cabeçalho `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Um endpoint JSON remoto com token bearer opcional.
pub struct HttpEndpoint {
    url: String,
    api_token: String,
    timeout: Duration,
    client: Client,
    proxies: Option<Arc<ProxyPool>>,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, api_token: impl Into<String>) -> Result<Self, CollaboratorError> {
        Self::with_timeout(url, api_token, Duration::from_secs(120))
    }

    /// Cria um endpoint com timeout de requisição customizado.
    pub fn with_timeout(
        url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        Ok(Self {
            url: url.into(),
            api_token: api_token.into(),
            timeout,
            client: build_client(None, timeout)?,
            proxies: None,
        })
    }

    /// Roteia cada chamada por um proxy sorteado do pool.
    pub fn with_proxies(mut self, pool: Arc<ProxyPool>) -> Self {
        self.proxies = Some(pool);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn client(&self) -> Result<Client, CollaboratorError> {
        let Some(pool) = &self.proxies else {
            return Ok(self.client.clone());
        };
        match pool.pick().await {
            Some(proxy) => build_client(Some(&proxy), self.timeout),
            None => Ok(self.client.clone()),
        }
    }

    /// Envia `body` como JSON via POST e decodifica a resposta.
    pub async fn post_json<B, R>(&self, body: &B) -> Result<R, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let client = self.client().await?;
        let mut request = client.post(&self.url).json(body);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }
        let response = request.send().await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(CollaboratorError::Throttled { retry_after_secs });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CollaboratorError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<R>().await?;
        Ok(body)
    }
}

fn build_client(proxy: Option<&str>, timeout: Duration) -> Result<Client, CollaboratorError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout);
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

/// Busca de vagas: `POST` com os critérios, resposta é um array de vagas.
pub struct HttpJobSource(pub HttpEndpoint);

#[async_trait]
impl JobSource for HttpJobSource {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, CollaboratorError> {
        self.0.post_json(criteria).await
    }
}

#[derive(Serialize)]
struct TailorRequest<'a> {
    description: &'a str,
    base_document_id: &'a str,
}

/// Adaptação de documentos: `POST {description, base_document_id}`.
pub struct HttpDocumentTailor(pub HttpEndpoint);

#[async_trait]
impl DocumentTailor for HttpDocumentTailor {
    async fn tailor(
        &self,
        description: &str,
        base_document_id: &str,
    ) -> Result<DocumentArtifact, CollaboratorError> {
        self.0
            .post_json(&TailorRequest {
                description,
                base_document_id,
            })
            .await
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
    document: &'a DocumentArtifact,
}

/// Envio de candidaturas: `POST {url, document}`, resposta é um recibo.
pub struct HttpApplicationSubmitter(pub HttpEndpoint);

#[async_trait]
impl ApplicationSubmitter for HttpApplicationSubmitter {
    async fn submit(
        &self,
        url: &str,
        document: &DocumentArtifact,
    ) -> Result<SubmissionReceipt, CollaboratorError> {
        self.0.post_json(&SubmitRequest { url, document }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tailor_request_shape() {
        let body = serde_json::to_value(TailorRequest {
            description: "Rust role",
            base_document_id: "cv-2",
        })
        .unwrap();
        assert_eq!(body["description"], "Rust role");
        assert_eq!(body["base_document_id"], "cv-2");
    }

    #[test]
    fn submit_request_embeds_document() {
        let document = DocumentArtifact {
            version: "cv-2@job-9".into(),
            content: "tailored".into(),
        };
        let body = serde_json::to_value(SubmitRequest {
            url: "https://jobs.test/9",
            document: &document,
        })
        .unwrap();
        assert_eq!(body["url"], "https://jobs.test/9");
        assert_eq!(body["document"]["version"], "cv-2@job-9");
    }

    #[test]
    fn endpoint_rejects_invalid_proxy_url() {
        assert!(build_client(Some("::not a proxy::"), Duration::from_secs(1)).is_err());
    }
}
