//! The list of source pages posts can be filtered by.
//!
//! Defaults to the four campus confession pages. A JSON array of names can
//! replace it:
//! ```json
//! ["UTC2 Confessions", "UTC2 Zone"]
//! ```

use anyhow::{Context, Result, bail};
use reqwest::Url;

pub const DEFAULT_PAGES: [&str; 4] = [
    "UTC2 Confessions",
    "UTC2 Zone",
    "UTC2 Chia Sẻ Cảm Xúc",
    "Diễn Đàn Nghe SV nói",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCatalog {
    pages: Vec<String>,
}

impl Default for PageCatalog {
    fn default() -> Self {
        Self {
            pages: DEFAULT_PAGES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PageCatalog {
    /// Loads the catalog from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading page catalog '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("parsing page catalog '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let pages: Vec<String> = serde_json::from_str(content)?;
        let pages: Vec<String> = pages
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if pages.is_empty() {
            bail!("page catalog is empty");
        }
        Ok(Self { pages })
    }

    pub fn names(&self) -> &[String] {
        &self.pages
    }

    pub fn into_names(self) -> Vec<String> {
        self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(String::as_str)
    }

    /// Index of the page whose name matches `needle` case-insensitively.
    pub fn position(&self, needle: &str) -> Option<usize> {
        let needle = needle.trim().to_lowercase();
        self.pages.iter().position(|p| p.to_lowercase() == needle)
    }
}

/// Extracts the page name from a pasted link such as
/// `facebook.com/utc2confessions?ref=x` → `utc2confessions`.
///
/// Input without a scheme is treated as `https://`. When the input does not
/// parse as a URL, the segment after `facebook.com/` or, failing that, the
/// last path segment is used.
pub fn extract_page_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    if let Ok(url) = Url::parse(&with_scheme) {
        return url
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .map(str::to_string);
    }

    let lower = raw.to_ascii_lowercase();
    if let Some(idx) = lower.find("facebook.com/") {
        let rest = &raw[idx + "facebook.com/".len()..];
        let name: String = rest
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#'))
            .collect();
        if !name.is_empty() {
            return Some(name);
        }
    }

    raw.split('/')
        .filter(|s| !s.is_empty())
        .next_back()
        .map(str::to_string)
}
