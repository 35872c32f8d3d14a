//! Pool de proxies com rotação para os colaboradores HTTP.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct PoolState {
    proxies: Vec<String>,
    refreshed_at: Option<Instant>,
}

/// A list of proxy URLs, optionally refreshed from a provider on an interval.
pub struct ProxyPool {
    list_url: Option<String>,
    refresh_every: Duration,
    client: Client,
    state: RwLock<PoolState>,
}

impl ProxyPool {
    /// A pool that never refreshes.
    pub fn fixed(proxies: Vec<String>) -> Self {
        Self {
            list_url: None,
            refresh_every: Duration::MAX,
            client: Client::new(),
            state: RwLock::new(PoolState {
                proxies,
                refreshed_at: None,
            }),
        }
    }

    /// A pool refreshed from `list_url`, which must answer with a JSON array of proxy URLs.
    /// `seed` is used until the first successful refresh.
    pub fn remote(list_url: impl Into<String>, refresh_every: Duration, seed: Vec<String>) -> Self {
        Self {
            list_url: Some(list_url.into()),
            refresh_every,
            client: Client::new(),
            state: RwLock::new(PoolState {
                proxies: seed,
                refreshed_at: None,
            }),
        }
    }

    /// Picks a proxy uniformly at random, refreshing the list first when it is stale.
    pub async fn pick(&self) -> Option<String> {
        if self.is_stale().await {
            self.refresh().await;
        }
        let state = self.state.read().await;
        state.proxies.choose(&mut rand::thread_rng()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.proxies.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn is_stale(&self) -> bool {
        if self.list_url.is_none() {
            return false;
        }
        match self.state.read().await.refreshed_at {
            Some(at) => at.elapsed() >= self.refresh_every,
            None => true,
        }
    }

    /// Replaces the list from the provider. On failure the previous list is kept
    /// and the next pick retries after the refresh interval.
    pub async fn refresh(&self) {
        let Some(url) = &self.list_url else {
            return;
        };
        let fetched = async {
            self.client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<String>>()
                .await
        }
        .await;

        let mut state = self.state.write().await;
        state.refreshed_at = Some(Instant::now());
        match fetched {
            Ok(proxies) => {
                debug!(count = proxies.len(), "proxy list refreshed");
                state.proxies = proxies;
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh proxy list, keeping previous entries");
            }
        }
    }
}
