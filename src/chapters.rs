use crate::config::CHAPTER_PLACEHOLDER;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Inclusive range of chapter numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRange {
    pub start: u32,
    pub end: u32,
}

impl ChapterRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

pub fn gallery_url(template: &str, chapter: u32) -> String {
    template.replace(CHAPTER_PLACEHOLDER, &chapter.to_string())
}

/// Spawn a producer that emits one URL per (chapter, template) pair,
/// chapter-major, into a buffer of `capacity` slots.
///
/// The returned receiver is closed once every URL has been sent or the token
/// is cancelled. A pending send on a full buffer gives up as soon as the
/// token fires.
pub fn generate_gallery_urls(
    token: CancellationToken,
    range: ChapterRange,
    templates: Vec<String>,
    capacity: usize,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        for chapter in range.iter() {
            if token.is_cancelled() {
                debug!("URL generation cancelled before chapter {}", chapter);
                return;
            }

            for template in &templates {
                let url = gallery_url(template, chapter);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("URL generation cancelled at chapter {}", chapter);
                        return;
                    }
                    sent = tx.send(url) => {
                        if sent.is_err() {
                            debug!("URL consumer went away, stopping generation");
                            return;
                        }
                    }
                }
            }
        }
        debug!("Generated gallery URLs for chapters {}..={}", range.start, range.end);
    });

    rx
}
