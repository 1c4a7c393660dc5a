//! Markdown body to HTML using pulldown-cmark.
//!
//! Headings get stable anchor ids (explicit `{#id}` wins, otherwise a slug of
//! the heading text, de-duplicated with `-1`, `-2`, ...) and are collected
//! into an outline for the table of contents.

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

use crate::cache::{CompiledDocument, Heading};

/// Options for markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
}

impl MarkdownOptions {
    /// Create options with all extensions enabled
    pub fn all() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
        }
    }

    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        opts.set(Options::ENABLE_TABLES, self.tables);
        opts.set(Options::ENABLE_FOOTNOTES, self.footnotes);
        opts.set(Options::ENABLE_STRIKETHROUGH, self.strikethrough);
        opts.set(Options::ENABLE_TASKLISTS, self.task_lists);
        opts.set(Options::ENABLE_HEADING_ATTRIBUTES, self.heading_attributes);
        opts
    }
}

/// Render a markdown body.
pub fn render(markdown: &str, options: &MarkdownOptions) -> CompiledDocument {
    let mut events: Vec<Event> =
        Parser::new_ext(markdown, options.to_pulldown_options()).collect();
    let headings = assign_heading_ids(&mut events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());

    CompiledDocument {
        html: out,
        headings,
    }
}

/// Give every heading an id and return the outline.
fn assign_heading_ids(events: &mut [Event<'_>]) -> Vec<Heading> {
    let mut headings = Vec::new();
    // explicit ids are taken up front, wherever they appear
    let mut used: FxHashMap<String, usize> = events
        .iter()
        .filter_map(heading_start)
        .filter_map(|(_, explicit)| Some((explicit?, 0)))
        .collect();

    let mut i = 0;
    while i < events.len() {
        let Some((level, explicit)) = heading_start(&events[i]) else {
            i += 1;
            continue;
        };

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
            if let Event::Text(t) | Event::Code(t) = &events[end] {
                text.push_str(t);
            }
            end += 1;
        }

        let id = explicit.unwrap_or_else(|| unique_id(slugify(&text), &mut used));
        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
            *slot = Some(CowStr::from(id.clone()));
        }

        headings.push(Heading {
            level: level_number(level),
            id,
            text: text.trim().to_string(),
        });
        i = end + 1;
    }

    headings
}

fn heading_start(event: &Event<'_>) -> Option<(HeadingLevel, Option<String>)> {
    match event {
        Event::Start(Tag::Heading { level, id, .. }) => {
            Some((*level, id.as_ref().map(|id| id.to_string())))
        }
        _ => None,
    }
}

const fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed to single `-`.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

/// First of `base`, `base-1`, `base-2`, ... not yet taken.
///
/// `used` maps every taken id to the last suffix tried for it as a base.
fn unique_id(base: String, used: &mut FxHashMap<String, usize>) -> String {
    let mut suffix = used.get(&base).copied().unwrap_or(0);
    let mut id = base.clone();
    while used.contains_key(&id) {
        suffix += 1;
        id = format!("{base}-{suffix}");
    }
    used.insert(id.clone(), 0);
    used.insert(base, suffix);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(markdown: &str) -> CompiledDocument {
        render(markdown, &MarkdownOptions::all())
    }

    #[test]
    fn test_heading_ids_and_outline() {
        let doc = render_all("# Hello World\n\ntext\n\n## Second `part`\n");

        assert!(doc.html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(doc.html.contains(r#"<h2 id="second-part">"#));
        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[0].level, 1);
        assert_eq!(doc.headings[1].text, "Second part");
    }

    #[test]
    fn test_duplicate_headings_get_suffix() {
        let doc = render_all("## Setup\n\n## Setup\n\n## Setup\n");
        let ids: Vec<_> = doc.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["setup", "setup-1", "setup-2"]);
    }

    #[test]
    fn test_explicit_heading_id() {
        let doc = render_all("# Intro {#start}\n");
        assert_eq!(doc.headings[0].id, "start");
        assert!(doc.html.contains(r#"id="start""#));
    }

    #[test]
    fn test_generated_ids_avoid_explicit_ones() {
        let doc = render_all("## Setup\n\n# A {#setup}\n\n## Setup\n\n## Setup 1\n");
        let ids: Vec<_> = doc.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["setup-1", "setup", "setup-2", "setup-1-1"]);
    }

    #[test]
    fn test_gfm_extensions() {
        let doc = render_all("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n\n- [x] done\n");
        assert!(doc.html.contains("<table>"));
        assert!(doc.html.contains("<del>old</del>"));
        assert!(doc.html.contains("checkbox"));
    }

    #[test]
    fn test_jsx_passes_through() {
        let doc = render_all("<Callout type=\"info\">\n\nNote\n\n</Callout>\n");
        assert!(doc.html.contains("<Callout type=\"info\">"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  --  "), "section");
        assert_eq!(slugify("Über Rust"), "über-rust");
    }
}
