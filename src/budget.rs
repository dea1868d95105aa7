//! Character-budgeted assembly of page-tagged text.
//!
//! Pages are rendered as `--- Page N ---` blocks in order. When the next
//! block does not fit, the current page is cut short with a `...` marker
//! and assembly stops, so the result is always a prefix of the document.
//! Lengths are counted in characters, not bytes.

use crate::config::MAX_TEXT_CHARS;
use crate::document::Page;
use std::fmt;

/// Appended to a page cut at the budget boundary.
pub const TRUNCATION_MARKER: &str = "...";

/// Slack kept free below the budget when truncating mid-page.
const TRUNCATION_RESERVE: usize = 20;

/// Page-tagged text that fits within a character budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetedText {
    text: String,
    char_len: usize,
    pages_included: usize,
    truncated_at: Option<usize>,
}

impl BudgetedText {
    /// The assembled text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of page blocks present, including a truncated one.
    pub fn pages_included(&self) -> usize {
        self.pages_included
    }

    /// Page number whose text was cut, if the budget was hit mid-page.
    pub fn truncated_at(&self) -> Option<usize> {
        self.truncated_at
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for BudgetedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Concatenates pages under a character budget.
#[derive(Debug, Clone, Copy)]
pub struct TextBudgeter {
    max_chars: usize,
}

impl Default for TextBudgeter {
    fn default() -> Self {
        Self::new(MAX_TEXT_CHARS)
    }
}

impl TextBudgeter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assemble the budgeted text from pages in order.
    pub fn assemble<'a, I>(&self, pages: I) -> BudgetedText
    where
        I: IntoIterator<Item = &'a Page>,
    {
        let mut out = BudgetedText::default();

        for page in pages {
            let header = page_header(page.number);
            let header_len = header.chars().count();
            let text_len = page.text.chars().count();
            // header + text + "\n"
            let block_len = header_len + text_len + 1;

            if out.char_len + block_len > self.max_chars {
                // Room for the header, the empty-page newlines and the reserve.
                let overhead = header_len + 1 + TRUNCATION_RESERVE;
                let remain = self.max_chars.saturating_sub(out.char_len + overhead);
                if remain > 0 {
                    let head: String = page.text.chars().take(remain).collect();
                    let kept = head.chars().count();
                    out.text.push_str(&header);
                    out.text.push_str(&head);
                    out.text.push_str(TRUNCATION_MARKER);
                    out.text.push('\n');
                    out.char_len += header_len + kept + TRUNCATION_MARKER.len() + 1;
                    out.pages_included += 1;
                    out.truncated_at = Some(page.number);
                }
                break;
            }

            out.text.push_str(&header);
            out.text.push_str(&page.text);
            out.text.push('\n');
            out.char_len += block_len;
            out.pages_included += 1;
        }

        out
    }
}

fn page_header(number: usize) -> String {
    format!("--- Page {} ---\n", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i + 1, *t))
            .collect()
    }

    #[test]
    fn test_fits_entirely() {
        let pages = pages(&["Intro text", "Method text"]);
        let out = TextBudgeter::default().assemble(&pages);

        assert_eq!(
            out.as_str(),
            "--- Page 1 ---\nIntro text\n--- Page 2 ---\nMethod text\n"
        );
        assert_eq!(out.pages_included(), 2);
        assert_eq!(out.truncated_at(), None);
        assert_eq!(out.char_len(), out.as_str().chars().count());
    }

    #[test]
    fn test_empty_input() {
        let out = TextBudgeter::default().assemble(&[]);
        assert!(out.is_empty());
        assert_eq!(out.pages_included(), 0);
    }

    #[test]
    fn test_truncates_mid_page_and_stops() {
        let long = "x".repeat(500);
        let pages = pages(&["short", &long, "never seen"]);
        let out = TextBudgeter::new(200).assemble(&pages);

        assert!(out.char_len() <= 200);
        assert_eq!(out.truncated_at(), Some(2));
        assert!(out.as_str().starts_with("--- Page 1 ---\nshort\n--- Page 2 ---\nxxx"));
        assert!(out.as_str().ends_with("...\n"));
        assert!(!out.as_str().contains("Page 3"));
        assert!(!out.as_str().contains("never seen"));
    }

    #[test]
    fn test_no_room_for_partial_page() {
        let pages = pages(&["a".repeat(40).as_str(), "b".repeat(40).as_str()]);
        // First block is 56 chars; 70 leaves no room for a truncated second page.
        let out = TextBudgeter::new(70).assemble(&pages);
        assert_eq!(out.pages_included(), 1);
        assert_eq!(out.truncated_at(), None);
        assert!(!out.as_str().contains("Page 2"));
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        let text = "é".repeat(300);
        let pages = pages(&[&text]);
        let out = TextBudgeter::new(100).assemble(&pages);
        assert!(out.char_len() <= 100);
        assert_eq!(out.char_len(), out.as_str().chars().count());
    }

    #[test]
    fn test_pages_are_a_gapless_prefix() {
        let texts: Vec<String> = (1..=30).map(|i| format!("body of page {i} ").repeat(20)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let pages = pages(&refs);

        for budget in [0, 50, 400, 1_000, 5_000, 100_000] {
            let out = TextBudgeter::new(budget).assemble(&pages);
            assert!(out.char_len() <= budget, "budget {budget} exceeded");

            let numbers: Vec<usize> = out
                .as_str()
                .lines()
                .filter_map(|l| l.strip_prefix("--- Page "))
                .filter_map(|l| l.strip_suffix(" ---"))
                .filter_map(|n| n.parse().ok())
                .collect();
            let expected: Vec<usize> = (1..=numbers.len()).collect();
            assert_eq!(numbers, expected, "budget {budget}");
        }
    }
}
