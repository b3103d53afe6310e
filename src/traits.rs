use crate::error::Result;
use crate::models::PageContent;

/// Trait for parsers that pull gallery pictures out of a page's markup
pub trait PictureParser: Send + Sync {
    /// Parse one page.
    ///
    /// `Ok(PageContent::NotFound)` means the page deliberately has no gallery.
    /// Any structural surprise must come back as an `Err`, never a panic.
    fn parse(&self, html: &str) -> Result<PageContent>;
}
