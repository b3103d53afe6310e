use crate::chapters::generate_gallery_urls;
use crate::config::Config;
use crate::downloader::DownloadPool;
use crate::error::Result;
use crate::parser::GrillParser;
use crate::scanner::{PageScanner, ScanStats};
use crate::storage::StorageManager;
use crate::traits::PictureParser;
use crate::utils::HttpClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Outcome of one run, for the final log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub scan: ScanStats,
    pub downloaded: usize,
    pub cancelled: bool,
}

/// URL generation -> page scanning -> picture downloads, wired together.
pub struct Pipeline {
    config: Config,
    http_client: HttpClient,
    parser: Arc<dyn PictureParser>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let parser = GrillParser::new(config.data_path()?)?;
        Self::with_parser(config, Arc::new(parser))
    }

    pub fn with_parser(config: Config, parser: Arc<dyn PictureParser>) -> Result<Self> {
        config.validate()?;
        let http_client = HttpClient::new(&config.http)?;

        Ok(Self {
            config,
            http_client,
            parser,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run all three stages to completion, or until `token` is cancelled,
    /// and join every task before returning.
    pub async fn run(&self, token: CancellationToken) -> Result<RunSummary> {
        let pipeline = &self.config.pipeline;
        let range = self.config.chapter_range();

        info!(
            "Scanning chapters {}..={} with {} templates, {} download workers",
            range.start,
            range.end,
            self.config.gallery.templates.len(),
            pipeline.worker_count
        );

        let urls = generate_gallery_urls(
            token.clone(),
            range,
            self.config.gallery.templates.clone(),
            pipeline.url_buffer,
        );

        let scanner = PageScanner::new(self.http_client.clone(), self.parser.clone());
        let (pictures, scan_handle) = scanner.scan(token.clone(), urls, pipeline.picture_buffer);

        let storage = StorageManager::new(&pipeline.output_dir, pipeline.caption_max_len);
        let pool = DownloadPool::new(self.http_client.clone(), storage, pipeline.worker_count);
        let downloaded = pool.run(token.clone(), pictures).await;

        let scan = scan_handle.await?;
        let summary = RunSummary {
            scan,
            downloaded,
            cancelled: token.is_cancelled(),
        };

        if summary.cancelled {
            info!("Run cancelled: {} pictures downloaded", downloaded);
        } else {
            info!(
                "Run finished: {} pages fetched ({} without gallery, {} failed), {} of {} pictures downloaded",
                scan.pages_fetched,
                scan.pages_not_found,
                scan.pages_failed,
                downloaded,
                scan.pictures_found
            );
        }

        Ok(summary)
    }
}
