use crate::error::Result;
use crate::models::Picture;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PICTURE_EXTENSION: &str = "jpeg";

/// Upper bound for the id portion of a filename, in bytes.
pub const ID_MAX_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct StorageManager {
    output_dir: PathBuf,
    caption_max_len: usize,
}

impl StorageManager {
    pub fn new(output_dir: impl Into<PathBuf>, caption_max_len: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            caption_max_len,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory. An existing directory counts as success,
    /// so every worker may call this.
    pub async fn ensure_output_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        debug!("Output directory ready: {:?}", self.output_dir);
        Ok(())
    }

    /// `<output_dir>/<caption>_<id>.jpeg`
    pub fn picture_path(&self, picture: &Picture) -> PathBuf {
        let filename = format!(
            "{}_{}.{}",
            self.truncate_caption(&picture.caption),
            truncate_bytes(&sanitize_filename(&picture.id), ID_MAX_LEN),
            PICTURE_EXTENSION
        );
        self.output_dir.join(filename)
    }

    /// Sanitized caption cut to at most `caption_max_len` bytes, backing off
    /// to the previous char boundary. Not word-aware.
    pub fn truncate_caption(&self, caption: &str) -> String {
        truncate_bytes(&sanitize_filename(caption), self.caption_max_len).to_string()
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Replace characters that cannot appear in a filename, one for one.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
