//! Interface de linha de comando do bulkapply baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, abandon, demo)
//! e flags globais (--config, --verbose).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::BulkApplyConfig;
use crate::params::{ApplicationParameters, SearchCriteria};

/// bulkapply: orquestrador de candidaturas em massa.
#[derive(Debug, Parser)]
#[command(name = "bulkapply", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./bulkapply.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Busca vagas, filtra e envia candidaturas em lotes.
    Run(RunArgs),

    /// Mostra contagens e registros de todas as candidaturas.
    Status {
        /// Emite o relatório em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Marca como falhas (abandonadas) as candidaturas que ficaram pendentes
    /// após uma execução interrompida, liberando as vagas para a próxima execução.
    Abandon {
        /// Restringe a estas vagas; sem a flag, todas as pendentes.
        #[arg(long = "job")]
        jobs: Vec<String>,
    },

    /// Executa o motor completo contra colaboradores simulados.
    Demo {
        /// Quantidade de vagas geradas pela busca simulada.
        #[arg(long, default_value_t = 12)]
        postings: usize,

        /// Tamanho de lote da demonstração.
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

/// Parâmetros de uma execução. Flags sobrescrevem os valores de `--file`.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Caminho para um arquivo JSON ou TOML com os parâmetros da execução.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Palavras-chave da busca.
    #[arg(long)]
    pub keywords: Option<String>,

    /// Localização desejada.
    #[arg(long)]
    pub location: Option<String>,

    /// Salário anual mínimo.
    #[arg(long)]
    pub min_salary: Option<u64>,

    /// Exige menção a patrocínio de visto na descrição.
    #[arg(long, default_value_t = false)]
    pub sponsorship: bool,

    /// Máximo de candidaturas nesta execução.
    #[arg(long)]
    pub max_applications: Option<u32>,

    /// Candidaturas simultâneas por lote.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Documento base a ser adaptado para cada vaga.
    #[arg(long)]
    pub base_document: Option<String>,

    /// Permite nova tentativa para vagas cuja última tentativa falhou.
    #[arg(long, default_value_t = false)]
    pub resubmit_failed: bool,
}

impl RunArgs {
    /// Monta os parâmetros da execução: arquivo (se houver), depois flags.
    /// Sem arquivo, `max_applications` vem da configuração.
    pub fn into_parameters(self, config: &BulkApplyConfig) -> Result<ApplicationParameters> {
        let mut params = match &self.file {
            Some(path) => load_parameters(path)?,
            None => {
                let mut params = ApplicationParameters::new(SearchCriteria::default(), "");
                params.max_applications = config.max_applications;
                params
            }
        };

        if let Some(keywords) = self.keywords {
            params.criteria.keywords = keywords;
        }
        if let Some(location) = self.location {
            params.criteria.location = Some(location);
        }
        if let Some(min_salary) = self.min_salary {
            params.min_salary = Some(min_salary);
        }
        if self.sponsorship {
            params.requires_sponsorship = true;
        }
        if let Some(max) = self.max_applications {
            params.max_applications = max;
        }
        if let Some(batch_size) = self.batch_size {
            params.batch_size = Some(batch_size);
        }
        if let Some(base_document) = self.base_document {
            params.base_document_id = base_document;
        }
        if self.resubmit_failed {
            params.resubmit_failed = true;
        }
        Ok(params)
    }
}

// Lê parâmetros de um arquivo `.toml` ou, caso contrário, JSON.
fn load_parameters(path: &Path) -> Result<ApplicationParameters> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameters from {}", path.display()))?;
    let params = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };
    Ok(params)
}
