//! Condensed page index for list navigation.

use serde::Serialize;
use std::fmt;

/// Pages shown on each side of the current page.
const WINDOW_DELTA: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageToken {
    /// 1-based page number.
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageToken::Page(n) => write!(f, "{n}"),
            PageToken::Ellipsis => f.write_str("..."),
        }
    }
}

/// Builds the display sequence for `current_page` out of `total_pages`.
///
/// The first and last pages are always present, together with a window of
/// one page either side of the current one. Gaps between the window and the
/// ends collapse into a single [`PageToken::Ellipsis`], so the result never
/// holds more than seven tokens. `total_pages <= 1` yields `[1]`.
pub fn index_tokens(current_page: u32, total_pages: u32) -> Vec<PageToken> {
    if total_pages <= 1 {
        return vec![PageToken::Page(1)];
    }

    let total = i64::from(total_pages);
    let current = i64::from(current_page).clamp(1, total);
    let left = (current - WINDOW_DELTA).max(2);
    let right = (current + WINDOW_DELTA).min(total - 1);

    let mut tokens = Vec::with_capacity(7);
    tokens.push(PageToken::Page(1));

    if left > 2 {
        tokens.push(PageToken::Ellipsis);
    }

    tokens.extend((left..=right).map(|p| PageToken::Page(p as u32)));

    if right < total - 1 {
        tokens.push(PageToken::Ellipsis);
    }

    tokens.push(PageToken::Page(total_pages));
    tokens
}

/// Number of pages needed for `total_items` at `per_page` items each.
pub fn total_pages_for(total_items: usize, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total_items.div_ceil(per_page as usize) as u32
}

pub fn has_prev(current_page: u32, total_pages: u32) -> bool {
    total_pages > 1 && current_page > 1
}

pub fn has_next(current_page: u32, total_pages: u32) -> bool {
    total_pages > 1 && current_page < total_pages
}
