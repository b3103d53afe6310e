use crate::error::{GalleryError, Result};
use crate::models::{PageContent, Picture};
use crate::traits::PictureParser;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const SCRIPT_SELECTOR: &str = "div#main > script";
const NOT_FOUND_SELECTOR: &str = "div#main > article#error_page";
const PAYLOAD_PATTERN: &str = r"this\.Grill\?Grill\.burger=(.*):\(function\(\)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Dotted path into a decoded JSON document, e.g. `stack.2.data.0.images`.
/// Purely numeric segments index into arrays, everything else is an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

impl DataPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walk `root` one checked step at a time.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value> {
        let mut node = root;
        let mut walked = String::from("$");

        for segment in &self.segments {
            node = match segment {
                PathSegment::Key(key) => {
                    let object = node.as_object().ok_or_else(|| {
                        GalleryError::data_shape(format!(
                            "expected an object at {} to look up '{}', found {}",
                            walked,
                            key,
                            kind_of(node)
                        ))
                    })?;
                    object.get(key).ok_or_else(|| {
                        GalleryError::data_shape(format!("missing key '{}' at {}", key, walked))
                    })?
                }
                PathSegment::Index(index) => {
                    let array = node.as_array().ok_or_else(|| {
                        GalleryError::data_shape(format!(
                            "expected an array at {} to take index {}, found {}",
                            walked,
                            index,
                            kind_of(node)
                        ))
                    })?;
                    array.get(*index).ok_or_else(|| {
                        GalleryError::data_shape(format!(
                            "index {} out of range at {} (length {})",
                            index,
                            walked,
                            array.len()
                        ))
                    })?
                }
            };

            match segment {
                PathSegment::Key(key) => {
                    walked.push('.');
                    walked.push_str(key);
                }
                PathSegment::Index(index) => walked.push_str(&format!("[{}]", index)),
            }
        }

        Ok(node)
    }
}

impl FromStr for DataPath {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self> {
        let mut segments = Vec::new();

        for raw in s.trim().split('.') {
            if raw.is_empty() {
                return Err(GalleryError::invalid_config(format!(
                    "data path '{}' has an empty segment",
                    s
                )));
            }
            let segment = match raw.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(raw.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                PathSegment::Key(key) => write!(f, "{}", key)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageEntry {
    image: String,
    caption: String,
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(text)) => text,
        Some(RawId::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

/// Parser for gallery pages that embed their content as a JSON blob
/// assigned to `Grill.burger` inside the main script node.
pub struct GrillParser {
    data_path: DataPath,
    script_selector: Selector,
    not_found_selector: Selector,
    payload_pattern: Regex,
}

impl GrillParser {
    pub fn new(data_path: DataPath) -> Result<Self> {
        let script_selector = Selector::parse(SCRIPT_SELECTOR)
            .map_err(|e| GalleryError::scraping(format!("Invalid script selector: {}", e)))?;
        let not_found_selector = Selector::parse(NOT_FOUND_SELECTOR)
            .map_err(|e| GalleryError::scraping(format!("Invalid not-found selector: {}", e)))?;
        let payload_pattern = Regex::new(PAYLOAD_PATTERN)
            .map_err(|e| GalleryError::scraping(format!("Invalid payload pattern: {}", e)))?;

        Ok(Self {
            data_path,
            script_selector,
            not_found_selector,
            payload_pattern,
        })
    }

    pub fn data_path(&self) -> &DataPath {
        &self.data_path
    }

    fn pictures_from_payload(&self, payload: &str) -> Result<Vec<Picture>> {
        let root: Value = serde_json::from_str(payload)?;
        let images = self.data_path.resolve(&root)?;

        let entries = images.as_array().ok_or_else(|| {
            GalleryError::data_shape(format!(
                "expected an image list at {}, found {}",
                self.data_path,
                kind_of(images)
            ))
        })?;

        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let entry = ImageEntry::deserialize(entry).map_err(|e| {
                    GalleryError::data_shape(format!("{}[{}]: {}", self.data_path, i, e))
                })?;
                Ok(Picture::new(entry.image, entry.caption, entry.id))
            })
            .collect()
    }
}

impl PictureParser for GrillParser {
    fn parse(&self, html: &str) -> Result<PageContent> {
        let document = Html::parse_document(html);

        let script = document
            .select(&self.script_selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .filter(|text| !text.is_empty());

        let Some(script) = script else {
            if document.select(&self.not_found_selector).next().is_some() {
                return Ok(PageContent::NotFound);
            }
            return Err(GalleryError::scraping("cannot find html node for pictures"));
        };

        let payload = self
            .payload_pattern
            .captures(&script)
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| GalleryError::scraping("unable to find gallery payload in script"))?;

        let pictures = self.pictures_from_payload(payload.as_str())?;
        debug!("Parsed {} pictures from page", pictures.len());

        Ok(PageContent::Pictures(pictures))
    }
}
