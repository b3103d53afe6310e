use crate::chapters::ChapterRange;
use crate::error::{GalleryError, Result};
use crate::parser::DataPath;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the chapter number in gallery URL templates.
pub const CHAPTER_PLACEHOLDER: &str = "{chapter}";

/// Environment variables with this prefix override file settings,
/// e.g. `GALLOADER__PIPELINE__WORKER_COUNT=8`.
pub const ENV_PREFIX: &str = "GALLOADER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub gallery: GalleryConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub worker_count: usize,
    pub output_dir: PathBuf,
    /// Capacity of the URL buffer between the generator and the page scanner.
    pub url_buffer: usize,
    /// Capacity of the picture buffer between the page scanner and the workers.
    pub picture_buffer: usize,
    pub caption_max_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Gallery page URL templates, each containing `{chapter}`.
    pub templates: Vec<String>,
    /// Dotted path from the decoded page payload to the image list.
    pub data_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Config {
    /// Load configuration: built-in defaults, then the TOML file at `path` if
    /// it exists, then `GALLOADER__*` environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("gallery.templates"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GalleryError::invalid_config(format!("cannot render config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;

        if pipeline.start_chapter > pipeline.end_chapter {
            return Err(GalleryError::invalid_config(format!(
                "start_chapter ({}) is after end_chapter ({})",
                pipeline.start_chapter, pipeline.end_chapter
            )));
        }
        if pipeline.worker_count == 0 {
            return Err(GalleryError::invalid_config("worker_count must be at least 1"));
        }
        if pipeline.caption_max_len == 0 {
            return Err(GalleryError::invalid_config("caption_max_len must be at least 1"));
        }
        if self.gallery.templates.is_empty() {
            return Err(GalleryError::invalid_config("no gallery URL templates configured"));
        }
        if let Some(template) = self
            .gallery
            .templates
            .iter()
            .find(|t| !t.contains(CHAPTER_PLACEHOLDER))
        {
            return Err(GalleryError::invalid_config(format!(
                "template '{}' has no {} placeholder",
                template, CHAPTER_PLACEHOLDER
            )));
        }
        self.data_path()?;

        Ok(())
    }

    pub fn chapter_range(&self) -> ChapterRange {
        ChapterRange::new(self.pipeline.start_chapter, self.pipeline.end_chapter)
    }

    pub fn data_path(&self) -> Result<DataPath> {
        self.gallery.data_path.parse()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_chapter: 1,
            end_chapter: 16,
            worker_count: 5,
            output_dir: PathBuf::from("download"),
            url_buffer: 3,
            picture_buffer: 10,
            caption_max_len: 64,
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            templates: vec![
                "https://www.starwars.com/series/the-mandalorian/chapter-{chapter}-concept-art-gallery"
                    .to_string(),
                "https://www.starwars.com/chapter-{chapter}-concept-art-gallery".to_string(),
            ],
            data_path: "stack.2.data.0.images".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "GalLoader/0.1 (gallery downloader)".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_run() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.pipeline.start_chapter, 1);
        assert_eq!(config.pipeline.end_chapter, 16);
        assert_eq!(config.pipeline.worker_count, 5);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("download"));
        assert_eq!(config.gallery.templates.len(), 2);
        assert_eq!(config.chapter_range().len(), 16);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            [pipeline]
            start_chapter = 3
            end_chapter = 4
            worker_count = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.start_chapter, 3);
        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.pipeline.caption_max_len, 64);
        assert_eq!(config.gallery.data_path, "stack.2.data.0.images");
    }

    #[test]
    fn rejects_inverted_chapter_range() {
        let err = Config::from_toml_str("[pipeline]\nstart_chapter = 5\nend_chapter = 2\n").unwrap_err();
        assert!(matches!(err, GalleryError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = Config::from_toml_str("[pipeline]\nworker_count = 0\n").unwrap_err();
        assert!(matches!(err, GalleryError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_caption_length() {
        let err = Config::from_toml_str("[pipeline]\ncaption_max_len = 0\n").unwrap_err();
        assert!(matches!(err, GalleryError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let err = Config::from_toml_str(
            "[gallery]\ntemplates = [\"https://example.com/gallery\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("{chapter}"));
    }

    #[test]
    fn rejects_empty_template_list() {
        let err = Config::from_toml_str("[gallery]\ntemplates = []\n").unwrap_err();
        assert!(matches!(err, GalleryError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_data_path() {
        let err = Config::from_toml_str("[gallery]\ndata_path = \"stack..images\"\n").unwrap_err();
        assert!(matches!(err, GalleryError::InvalidConfig(_)));
    }

    // Process environment is shared by every test thread, so all
    // `Config::load` checks live in this one test.
    #[test]
    fn load_layers_defaults_file_and_environment() {
        let workers = format!("{}__PIPELINE__WORKER_COUNT", ENV_PREFIX);
        let templates = format!("{}__GALLERY__TEMPLATES", ENV_PREFIX);
        std::env::remove_var(&workers);
        std::env::remove_var(&templates);

        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.worker_count, 5);

        let file = dir.path().join("galloader.toml");
        std::fs::write(&file, "[pipeline]\nworker_count = 2\nend_chapter = 3\n").unwrap();
        let config = Config::load(&file).unwrap();
        assert_eq!(config.pipeline.worker_count, 2);

        std::env::set_var(&workers, "8");
        std::env::set_var(
            &templates,
            "https://a.example/{chapter},https://b.example/c-{chapter}",
        );
        let loaded = Config::load(&file);
        std::env::remove_var(&workers);
        std::env::remove_var(&templates);

        let config = loaded.unwrap();
        assert_eq!(config.pipeline.worker_count, 8);
        assert_eq!(config.pipeline.end_chapter, 3);
        assert_eq!(
            config.gallery.templates,
            vec![
                "https://a.example/{chapter}".to_string(),
                "https://b.example/c-{chapter}".to_string(),
            ]
        );
    }

    #[test]
    fn rendered_toml_loads_back() {
        let mut config = Config::default();
        config.pipeline.end_chapter = 2;

        let rendered = config.to_toml().unwrap();
        let loaded = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(loaded.pipeline.end_chapter, 2);
        assert_eq!(loaded.gallery.templates, config.gallery.templates);
    }
}
