use std::path::PathBuf;
use std::time::Duration;

use am_compiler::{install, RefreshOutcome};
use am_core::filter::SharedFilterSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("filter compilation did not finish: {0}")]
    Compile(#[from] tokio::task::JoinError),
}

/// Where subscription text comes from.
#[derive(Debug, Clone)]
pub enum SubscriptionSource {
    Http { client: reqwest::Client, url: String },
    File(PathBuf),
}

impl SubscriptionSource {
    /// `http://` and `https://` locations are fetched, anything else is read
    /// from disk.
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Http {
                client: reqwest::Client::new(),
                url: location.to_string(),
            }
        } else {
            Self::File(PathBuf::from(location))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Http { url, .. } => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }

    pub async fn fetch(&self) -> Result<String, FetchError> {
        match self {
            Self::Http { client, url } => {
                let http_err = |source| FetchError::Http {
                    url: url.clone(),
                    source,
                };
                let response = client.get(url).send().await.map_err(http_err)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                response.text().await.map_err(http_err)
            }
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FetchError::File {
                    path: path.display().to_string(),
                    source,
                }),
        }
    }
}

/// Compile and swap on the blocking pool so the event loop keeps running
/// while a large list builds.
pub async fn compile_and_install(shared: SharedFilterSet, text: String) -> Result<RefreshOutcome, FetchError> {
    let outcome = tokio::task::spawn_blocking(move || install(&shared, &text)).await?;
    Ok(outcome)
}

/// Fetch once and install. Fetch failures leave the current set in place.
pub async fn refresh_once(source: &SubscriptionSource, shared: &SharedFilterSet) -> Result<RefreshOutcome, FetchError> {
    let text = source.fetch().await?;
    compile_and_install(shared.clone(), text).await
}

/// Refresh on a fixed interval until the task is dropped. The first refresh
/// happens immediately.
pub async fn refresh_loop(source: SubscriptionSource, shared: SharedFilterSet, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(err) = refresh_once(&source, &shared).await {
            log::warn!(
                "filter refresh from {} failed, keeping {} current rules: {err}",
                source.describe(),
                shared.load().len()
            );
        }
    }
}
