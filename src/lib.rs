//! Orquestração de candidaturas de emprego em massa.
//!
//! Uma execução busca vagas num [`collaborators::JobSource`], filtra e limita
//! a lista e, para cada vaga, adapta um documento e envia a candidatura, em
//! lotes de tamanho fixo com concorrência limitada. Toda chamada externa passa
//! por um [`rate_limit::RateLimiter`] e toda tentativa vira um
//! [`state_machine::ApplicationRecord`] num [`store::ApplicationStore`].

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod params;
pub mod rate_limit;
pub mod state_machine;
pub mod store;
pub mod telemetry;
pub mod ui;

pub use error::RunError;
pub use orchestrator::{BatchOrchestrator, BatchResult, Collaborators, OrchestratorSettings, StatusReport};
pub use params::{ApplicationParameters, SearchCriteria};
