use crate::config::HttpConfig;
use crate::error::{GalleryError, Result};
use reqwest::{Client, Response};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a page body whatever the status code. Missing galleries are
    /// served as error pages that the parser still needs to see.
    pub async fn get_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!("GET {} returned {}", url, status);
        }

        let text = response.text().await?;
        Ok(text)
    }

    pub async fn get_raw(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        Ok(response.error_for_status()?)
    }
}

/// Run one HTTP round trip on a background task, bound to `token`.
///
/// Returns `GalleryError::Cancelled` as soon as the token fires, but only
/// after the background task has finished, so no request outlives the call.
pub async fn http_do<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let background = token.clone();
    let mut handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = background.cancelled() => Err(GalleryError::Cancelled),
            result = fut => result,
        }
    });

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            let _ = (&mut handle).await;
            Err(GalleryError::Cancelled)
        }
        joined = &mut handle => joined?,
    }
}
