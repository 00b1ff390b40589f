use pulldown_cmark::{html, Event, Options, Parser};

/// Entity-escapes text bound for HTML bodies or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders markdown to HTML with single newlines kept as line breaks.
pub fn render_markdown(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(input, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub struct HtmlSanitizer {
    cleaner: ammonia::Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut cleaner = ammonia::Builder::default();
        cleaner
            .strip_comments(true)
            .link_rel(Some("noopener noreferrer"))
            .add_tags(&["input"])
            .add_tag_attributes("input", &["type", "checked", "disabled"])
            .add_generic_attributes(&["style", "class"])
            .add_clean_content_tags(&["iframe", "object", "embed", "link", "meta"]);
        Self { cleaner }
    }

    /// Drops active content: script-like elements with their contents, `on*`
    /// handlers and `javascript:` URLs.
    pub fn clean(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }

    pub fn render(&self, markdown: &str) -> String {
        self.clean(&render_markdown(markdown))
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
