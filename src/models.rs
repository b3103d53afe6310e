use serde::{Deserialize, Serialize};

/// A single gallery picture, as found on a chapter page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    /// Location of the full-resolution image.
    pub url: String,
    pub caption: String,
    /// Stable identifier, used to keep filenames apart when captions repeat.
    pub id: String,
}

/// What a parser found on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    /// The page explicitly reports that its gallery does not exist.
    NotFound,
    Pictures(Vec<Picture>),
}

impl Picture {
    pub fn new(url: impl Into<String>, caption: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: caption.into(),
            id: id.into(),
        }
    }
}

impl PageContent {
    pub fn len(&self) -> usize {
        match self {
            PageContent::NotFound => 0,
            PageContent::Pictures(pictures) => pictures.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_pictures(self) -> Vec<Picture> {
        match self {
            PageContent::NotFound => Vec::new(),
            PageContent::Pictures(pictures) => pictures,
        }
    }
}

impl std::fmt::Display for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.caption, self.id)
    }
}
