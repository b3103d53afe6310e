use crate::error::Result;
use crate::models::{PageContent, Picture};
use crate::traits::PictureParser;
use crate::utils::{http_do, HttpClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-run tally of what the page scanner saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages_fetched: usize,
    pub pages_not_found: usize,
    pub pages_failed: usize,
    pub pictures_found: usize,
}

/// Fetches gallery pages one at a time and forwards their pictures.
#[derive(Clone)]
pub struct PageScanner {
    http_client: HttpClient,
    parser: Arc<dyn PictureParser>,
}

enum PageOutcome {
    Pictures(Vec<Picture>),
    NotFound,
    Failed,
    Cancelled,
}

impl PageScanner {
    pub fn new(http_client: HttpClient, parser: Arc<dyn PictureParser>) -> Self {
        Self { http_client, parser }
    }

    /// Spawn the scanning task. Pictures come out of the returned receiver,
    /// which closes when the URL stream is exhausted or the token fires.
    pub fn scan(
        self,
        token: CancellationToken,
        mut urls: mpsc::Receiver<String>,
        capacity: usize,
    ) -> (async_channel::Receiver<Picture>, JoinHandle<ScanStats>) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut stats = ScanStats::default();

            loop {
                let url = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = urls.recv() => match next {
                        Some(url) => url,
                        None => break,
                    },
                };

                match self.scan_page(&token, &url).await {
                    PageOutcome::Pictures(pictures) => {
                        stats.pages_fetched += 1;
                        stats.pictures_found += pictures.len();
                        info!("Found {} pictures on {}", pictures.len(), url);

                        for picture in pictures {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => return stats,
                                sent = tx.send(picture) => {
                                    if sent.is_err() {
                                        debug!("All download workers are gone, stopping scan");
                                        return stats;
                                    }
                                }
                            }
                        }
                    }
                    PageOutcome::NotFound => {
                        stats.pages_fetched += 1;
                        stats.pages_not_found += 1;
                        debug!("No gallery at {}", url);
                    }
                    PageOutcome::Failed => stats.pages_failed += 1,
                    PageOutcome::Cancelled => break,
                }
            }

            debug!("Page scanning finished: {:?}", stats);
            stats
        });

        (rx, handle)
    }

    async fn scan_page(&self, token: &CancellationToken, url: &str) -> PageOutcome {
        let html = match self.fetch(token, url).await {
            Ok(html) => html,
            Err(e) if e.is_cancelled() => return PageOutcome::Cancelled,
            Err(e) => {
                error!("Error downloading gallery html: {} on {}", e, url);
                return PageOutcome::Failed;
            }
        };

        match self.parser.parse(&html) {
            Ok(PageContent::NotFound) => PageOutcome::NotFound,
            Ok(PageContent::Pictures(pictures)) => PageOutcome::Pictures(pictures),
            Err(e) => {
                error!("Error parsing gallery html: {} on {}", e, url);
                PageOutcome::Failed
            }
        }
    }

    async fn fetch(&self, token: &CancellationToken, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url)?;
        let client = self.http_client.clone();

        http_do(token, async move { client.get_page(parsed.as_str()).await }).await
    }
}

impl std::fmt::Debug for PageScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageScanner").finish_non_exhaustive()
    }
}
