//! Colaboradores em processo usados por `bulkapply demo`.
//!
//! As vagas geradas cobrem os caminhos interessantes: salários abaixo e acima
//! dos pisos comuns, menção a patrocínio de visto, salário ilegível e vagas
//! recusadas pelo envio.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{
    ApplicationSubmitter, CollaboratorError, DocumentArtifact, DocumentTailor, JobPosting,
    JobSource, SubmissionReceipt,
};
use crate::params::SearchCriteria;

const COMPANIES: &[&str] = &["Acme", "Globex", "Initech", "Umbrella", "Hooli", "Vandelay"];

const SALARIES: &[&str] = &[
    "$120,000/year",
    "$90k - $110k",
    "€130k",
    "Competitive",
    "$65/hr",
    "$150,000 - $180,000",
];

pub struct SimulatedJobSource {
    pub postings: usize,
}

#[async_trait]
impl JobSource for SimulatedJobSource {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let location = criteria.location.clone().unwrap_or_else(|| "Remote".into());
        let postings = (0..self.postings)
            .map(|i| {
                let company = COMPANIES[i % COMPANIES.len()];
                let description = if i % 3 == 0 {
                    format!("{} role at {company}. Visa sponsorship available.", criteria.keywords)
                } else {
                    format!("{} role at {company}.", criteria.keywords)
                };
                // Every seventh listing is closed and will be refused on submit.
                let url = if i % 7 == 6 {
                    format!("https://jobs.example/{i}/closed")
                } else {
                    format!("https://jobs.example/{i}")
                };
                JobPosting {
                    id: format!("demo-{i:03}"),
                    title: format!("{} #{i}", criteria.keywords),
                    company: company.to_string(),
                    location: location.clone(),
                    salary: Some(SALARIES[i % SALARIES.len()].to_string()),
                    url,
                    description,
                }
            })
            .collect();
        Ok(postings)
    }
}

pub struct SimulatedTailor;

#[async_trait]
impl DocumentTailor for SimulatedTailor {
    async fn tailor(
        &self,
        description: &str,
        base_document_id: &str,
    ) -> Result<DocumentArtifact, CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(80)).await;
        let digest = description.len();
        Ok(DocumentArtifact {
            version: format!("{base_document_id}@{digest:x}"),
            content: format!("{base_document_id} tailored for: {description}"),
        })
    }
}

pub struct SimulatedSubmitter;

#[async_trait]
impl ApplicationSubmitter for SimulatedSubmitter {
    async fn submit(
        &self,
        url: &str,
        document: &DocumentArtifact,
    ) -> Result<SubmissionReceipt, CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(120)).await;
        if url.ends_with("/closed") {
            return Ok(SubmissionReceipt {
                success: false,
                payload: None,
                message: Some("posting is no longer accepting applications".into()),
            });
        }
        Ok(SubmissionReceipt {
            success: true,
            payload: Some(json!({ "confirmation": format!("{url}#{}", document.version) })),
            message: None,
        })
    }
}
