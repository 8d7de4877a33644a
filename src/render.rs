//! Display formatting for filtered rows.
//!
//! Produces the HTML fragment shown for each post (author, hyperlinked URLs,
//! line breaks), the full browser page served by `favf serve`, and the plain
//! text listing printed by `favf list`.

use anyhow::{Context, Result};
use askama::Template;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::filter::FilterState;
use crate::models::Document;
use crate::session::View;

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("static url pattern"))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape `text`, wrap every URL in an anchor, and turn newlines into `<br>`.
pub fn linkify(text: &str) -> String {
    let escaped = escape_html(text);
    let linked = url_regex().replace_all(&escaped, r#"<a href="$0">$0</a>"#);
    linked.replace('\n', "<br>")
}

/// HTML fragment for one document: `<strong><em>@author</em></strong> - body`.
pub fn display_html(doc: &Document) -> String {
    format!(
        "<strong><em>@{}</em></strong> - {}",
        escape_html(&doc.author),
        linkify(&doc.body)
    )
}

/// Plain-text listing, one block per row.
pub fn text_listing(view: &View) -> String {
    let mut out = String::new();
    for (i, row) in view.rows.iter().enumerate() {
        let _ = writeln!(out, "{}. @{}", i + 1, row.author);
        for line in row.body.lines() {
            let _ = writeln!(out, "    {}", line);
        }
        if let Some(ref url) = row.url {
            let _ = writeln!(out, "    url: {}", url);
        }
        if let Some(ref tags) = row.tags {
            if !tags.is_empty() {
                let _ = writeln!(out, "    tags: {}", tags);
            }
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{} of {} favorites", view.rows.len(), view.total);
    out
}

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    query: &'a str,
    keywords: Vec<KeywordOption<'a>>,
    rows: Vec<PageRow<'a>>,
    shown: usize,
    total: usize,
}

struct KeywordOption<'a> {
    value: &'a str,
    selected: bool,
}

struct PageRow<'a> {
    /// Already escaped by [`display_html`].
    html: &'a str,
    tags: &'a str,
}

/// Full browser page: search box, keyword selection, regenerate button, and
/// the result table.
pub fn page(view: &View, filter: &FilterState) -> Result<String> {
    let selected = filter.active_tags();

    let template = PageTemplate {
        query: filter.query.as_deref().unwrap_or(""),
        keywords: view
            .top_keywords
            .iter()
            .map(|k| KeywordOption {
                value: k,
                selected: selected.contains(&k.as_str()),
            })
            .collect(),
        rows: view
            .rows
            .iter()
            .map(|row| PageRow {
                html: &row.html,
                tags: row.tags.as_deref().unwrap_or(""),
            })
            .collect(),
        shown: view.rows.len(),
        total: view.total,
    };

    template.render().context("Failed to render page")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ViewRow;
    use chrono::Utc;

    #[test]
    fn test_linkify_wraps_urls() {
        let html = linkify("hello world https://x.co/a");
        assert_eq!(
            html,
            r#"hello world <a href="https://x.co/a">https://x.co/a</a>"#
        );
    }

    #[test]
    fn test_linkify_newlines_and_escaping() {
        let html = linkify("line <one>\nline two");
        assert_eq!(html, "line &lt;one&gt;<br>line two");
    }

    #[test]
    fn test_linkify_multiple_urls() {
        let html = linkify("a http://a.io/x and https://b.io/y?q=1&r=2");
        assert!(html.contains(r#"<a href="http://a.io/x">http://a.io/x</a>"#));
        assert!(html.contains(r#"<a href="https://b.io/y?q=1&amp;r=2">"#));
    }

    fn view(keywords: &[&str]) -> View {
        let doc = Document {
            id: "1".into(),
            author: "ada".into(),
            body: "see https://x.co/a <b>".into(),
            url: None,
            created_at: Utc::now(),
        };
        View {
            rows: vec![ViewRow {
                id: doc.id.clone(),
                author: doc.author.clone(),
                body: doc.body.clone(),
                url: None,
                created_at: doc.created_at,
                html: display_html(&doc),
                tags: Some("rust & tokio".into()),
            }],
            total: 4,
            top_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            last_fetch_time: None,
        }
    }

    #[test]
    fn test_page_escapes_input_but_not_row_html() {
        let filter = FilterState {
            query: Some("<script>".into()),
            selected_tags: vec!["tokio".into()],
        };
        let html = page(&view(&["rust", "tokio"]), &filter).unwrap();

        assert!(html.contains(r#"<a href="https://x.co/a">https://x.co/a</a> &lt;b&gt;"#));
        assert!(!html.contains("<script>"));
        assert!(html.contains("rust &amp; tokio"));
        assert!(html.contains(r#"<option value="tokio" selected>tokio</option>"#));
        assert!(html.contains(r#"<option value="rust">rust</option>"#));
        assert!(html.contains("1 of 4 favorites"));
    }

    #[test]
    fn test_page_without_keywords_shows_hint() {
        let html = page(&view(&[]), &FilterState::default()).unwrap();
        assert!(html.contains("No keyword tags yet"));
        assert!(!html.contains("<select"));
    }

    #[test]
    fn test_display_html_has_author() {
        let doc = Document {
            id: "1".into(),
            author: "Ada <L>".into(),
            body: "hi".into(),
            url: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            display_html(&doc),
            "<strong><em>@Ada &lt;L&gt;</em></strong> - hi"
        );
    }
}
