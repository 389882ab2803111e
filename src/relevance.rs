// src/relevance.rs
//! Relevance filter: reduces raw page markup to a bounded text excerpt likely to mention AUM.
//!
//! Order:
//! 1) strip script/style/nav/header/footer, extract visible text, one candidate per line (>10 chars)
//! 2) keep candidates with an AUM keyword or an amount (see `units`)
//! 3) concatenate in document order until the char budget would overflow
//! 4) nothing relevant → first 5 candidates under the same budget

use scraper::{ElementRef, Html, Node};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::units::contains_amount;

/// 1200 token-equivalents × 4 chars/token.
pub const DEFAULT_MAX_CHARS: usize = 1200 * 4;

/// Candidates shorter than this (in chars) are ignored.
const MIN_PARAGRAPH_CHARS: usize = 10;
const FALLBACK_PARAGRAPHS: usize = 5;
const SEPARATOR: &str = "\n\n";

const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "noscript", "template",
];

// Elements that end a visual line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th", "section",
    "article", "main", "aside", "blockquote", "dd", "dt", "pre", "table", "ul", "ol",
];

/// Lowercased keywords (PT + EN) denoting assets, funds or capital.
pub const AUM_KEYWORDS: &[&str] = &[
    "aum",
    "assets under management",
    "patrimônio sob gestão",
    "patrimonio sob gestao",
    "gestão de ativos",
    "gestao de ativos",
    "fundo",
    "fundos",
    "fund",
    "investimento",
    "investimentos",
    "investment",
    "capital",
    "ativo",
    "ativos",
    "assets",
    "portfólio",
    "portfolio",
    "bilhões",
    "bilhoes",
    "milhões",
    "milhoes",
    "trilhões",
    "trilhoes",
    "billion",
    "million",
];

/// True if the paragraph mentions an AUM keyword or contains an amount.
pub fn is_relevant(paragraph: &str) -> bool {
    let lower = paragraph.to_lowercase();
    AUM_KEYWORDS.iter().any(|k| lower.contains(k)) || contains_amount(paragraph)
}

/// Filter `html` down to at most `max_chars` characters of relevant text.
/// Never fails: if extraction panics, the raw input truncated to `max_chars` is returned.
pub fn filter(html: &str, max_chars: usize) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    match catch_unwind(AssertUnwindSafe(|| select_excerpt(html, max_chars))) {
        Ok(excerpt) => excerpt,
        Err(_) => {
            warn!(target: "relevance", len = html.len(), "filter failed, using raw prefix");
            truncate_chars(html, max_chars)
        }
    }
}

/// [`filter`] with [`DEFAULT_MAX_CHARS`].
pub fn filter_default(html: &str) -> String {
    filter(html, DEFAULT_MAX_CHARS)
}

fn select_excerpt(html: &str, max_chars: usize) -> String {
    let paragraphs = candidate_paragraphs(html);

    let relevant: Vec<&str> = paragraphs
        .iter()
        .map(String::as_str)
        .filter(|p| is_relevant(p))
        .collect();

    let picked = if relevant.is_empty() {
        let fallback: Vec<&str> = paragraphs
            .iter()
            .take(FALLBACK_PARAGRAPHS)
            .map(String::as_str)
            .collect();
        take_within_budget(&fallback, max_chars)
    } else {
        take_within_budget(&relevant, max_chars)
    };

    debug!(
        target: "relevance",
        candidates = paragraphs.len(),
        relevant = relevant.len(),
        picked = picked.len(),
        "excerpt selected"
    );
    picked.join(SEPARATOR)
}

/// Visible text split into trimmed lines longer than [`MIN_PARAGRAPH_CHARS`].
pub fn candidate_paragraphs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_visible_text(document.root_element(), &mut text);

    text.lines()
        .map(str::trim)
        .filter(|l| l.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(str::to_string)
        .collect()
}

fn collect_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if STRIPPED_TAGS.contains(&name) {
                continue;
            }
            collect_visible_text(child_el, out);
            if BLOCK_TAGS.contains(&name) {
                out.push('\n');
            }
        } else if let Node::Text(t) = child.value() {
            out.push_str(t);
        }
    }
}

// Stops at the first paragraph that would overflow; later shorter ones are not considered.
fn take_within_budget<'a>(paragraphs: &[&'a str], max_chars: usize) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut total = 0usize;
    for p in paragraphs {
        let len = p.chars().count();
        if total + len > max_chars {
            break;
        }
        out.push(*p);
        total += len;
    }
    out
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
