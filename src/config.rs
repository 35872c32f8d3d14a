//! Configuração do bulkapply carregada a partir de `bulkapply.toml`.
//!
//! A struct [`BulkApplyConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `BULKAPPLY_API_TOKEN` tem precedência sobre o arquivo.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::orchestrator::OrchestratorSettings;
use crate::rate_limit::RatePolicy;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "bulkapply.toml";

/// Configuração de nível superior carregada de `bulkapply.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkApplyConfig {
    /// Token bearer enviado aos colaboradores HTTP.
    #[serde(default)]
    pub api_token: String,

    /// Tamanho de lote padrão quando a execução não o sobrescreve.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Máximo de candidaturas por execução quando não informado.
    #[serde(default = "default_max_applications")]
    pub max_applications: u32,

    /// Timeout em milissegundos de cada chamada externa.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Caminho do arquivo JSON com registros e contadores.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Filtro de log usado quando `RUST_LOG` não está definido.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Cotas por recurso; recursos ausentes usam [`RatePolicy::defaults`].
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RatePolicy>,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// URLs dos colaboradores HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    pub search_url: Option<String>,
    pub tailor_url: Option<String>,
    pub submit_url: Option<String>,
}

/// Pool de proxies: lista estática e/ou provedor remoto.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub list_url: Option<String>,
    #[serde(default = "default_proxy_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            list_url: None,
            refresh_secs: default_proxy_refresh_secs(),
            proxies: Vec::new(),
        }
    }
}

// Valor padrão para o tamanho de lote: 5.
fn default_batch_size() -> usize {
    5
}

// Valor padrão para candidaturas por execução: 20.
fn default_max_applications() -> u32 {
    20
}

// Valor padrão para o timeout por chamada: 30s.
fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".bulkapply/state.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

// Valor padrão para o intervalo de atualização dos proxies: 10 minutos.
fn default_proxy_refresh_secs() -> u64 {
    600
}

impl Default for BulkApplyConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            batch_size: default_batch_size(),
            max_applications: default_max_applications(),
            call_timeout_ms: default_call_timeout_ms(),
            state_path: default_state_path(),
            log_level: default_log_level(),
            rate_limits: BTreeMap::new(),
            endpoints: EndpointsConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl BulkApplyConfig {
    /// Carrega a configuração de `bulkapply.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<BulkApplyConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o token.
        if let Ok(token) = std::env::var("BULKAPPLY_API_TOKEN")
            && !token.is_empty()
        {
            config.api_token = token;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita valores que quebrariam o orquestrador ou o limitador.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.call_timeout_ms == 0 {
            bail!("call_timeout_ms must be greater than zero");
        }
        for (resource, policy) in &self.rate_limits {
            if policy.calls == 0 || policy.period_secs == 0 {
                bail!("rate limit for '{resource}' needs non-zero calls and period_secs");
            }
        }
        Ok(())
    }

    /// Políticas efetivas: os defaults sobrescritos pelo arquivo.
    pub fn rate_policies(&self) -> HashMap<String, RatePolicy> {
        let mut policies = RatePolicy::defaults();
        policies.extend(self.rate_limits.iter().map(|(k, v)| (k.clone(), *v)));
        policies
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_batch_size: self.batch_size,
            call_timeout: self.call_timeout(),
        }
    }
}
