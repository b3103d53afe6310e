//! Concurrent gallery scraper: chapter URLs are generated, each gallery page
//! is fetched and parsed for pictures, and a worker pool saves the pictures
//! to disk. All stages observe one cancellation token.

pub mod chapters;
pub mod config;
pub mod downloader;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod scanner;
pub mod shutdown;
pub mod storage;
pub mod traits;
pub mod utils;

pub use config::Config;
pub use error::{GalleryError, Result};
pub use models::{PageContent, Picture};
pub use pipeline::{Pipeline, RunSummary};
pub use traits::PictureParser;
