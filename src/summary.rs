use crate::models::Article;

/// Upper bound on digest length, in characters.
const MAX_DIGEST_CHARS: usize = 600;
const DIGEST_WIDTH: usize = 80;

/// Derives the short plain-text digest shown in the detail screen's summary
/// pane. This runs as a spawned task so a future remote backend can slot in
/// behind the same channel without touching the screen logic.
pub struct Summarizer {
    max_chars: usize,
}

impl Summarizer {
    pub fn new() -> Self {
        Self {
            max_chars: MAX_DIGEST_CHARS,
        }
    }

    pub fn digest(&self, article: &Article) -> String {
        let source = article.summary.trim();
        if source.is_empty() {
            return "No summary available.".to_string();
        }

        let text = html2text::from_read(source.as_bytes(), DIGEST_WIDTH)
            .unwrap_or_else(|_| source.to_string());
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.is_empty() {
            return "No summary available.".to_string();
        }

        let clipped = clip_to_sentence(&flat, self.max_chars);
        textwrap::fill(&clipped, DIGEST_WIDTH)
    }
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cuts at the last sentence boundary under `max` characters, or hard-cuts
/// with an ellipsis when the text is one long run.
fn clip_to_sentence(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let head: String = text.chars().take(max).collect();
    match head.rfind(['.', '!', '?']) {
        Some(idx) if idx + 1 >= head.len() / 2 => head[..=idx].to_string(),
        _ => format!("{}...", head.trim_end()),
    }
}
