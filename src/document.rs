//! Thin query layer over `scraper`.
//!
//! Extraction code only ever touches [`Document`] and [`Node`]: select one or many
//! elements, read their text or attributes, and resolve links against the page url.
//! Selectors are written as `&'static str` in the extraction code; a selector that
//! fails to parse is logged and treated as matching nothing.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

pub struct Document {
    html: Html,
    base: Url,
}

impl Document {
    pub fn parse(raw: &str, base: &Url) -> Self {
        Self {
            html: Html::parse_document(raw),
            base: base.clone(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn select(&self, query: &str) -> Vec<Node<'_>> {
        match parse_selector(query) {
            Some(selector) => self.html.select(&selector).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn select_first(&self, query: &str) -> Option<Node<'_>> {
        let selector = parse_selector(query)?;
        self.html.select(&selector).next().map(Node)
    }

    /// Result of the first query in `queries` that matches anything
    pub fn select_any(&self, queries: &[&str]) -> Vec<Node<'_>> {
        queries
            .iter()
            .map(|query| self.select(query))
            .find(|nodes| !nodes.is_empty())
            .unwrap_or_default()
    }

    /// Trimmed text of the first match, `None` when missing or blank
    pub fn text_of(&self, query: &str) -> Option<String> {
        self.select_first(query)
            .map(|node| node.text())
            .filter(|text| !text.is_empty())
    }

    pub fn resolve_url(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base.join(href).ok()
    }
}

#[derive(Clone, Copy)]
pub struct Node<'a>(ElementRef<'a>);

impl<'a> Node<'a> {
    pub fn select(&self, query: &str) -> Vec<Node<'a>> {
        match parse_selector(query) {
            Some(selector) => self.0.select(&selector).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn select_first(&self, query: &str) -> Option<Node<'a>> {
        let selector = parse_selector(query)?;
        self.0.select(&selector).next().map(Node)
    }

    /// Text content with runs of whitespace collapsed to single spaces
    pub fn text(&self) -> String {
        self.0
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// First attribute in `names` that is present and non-empty
    pub fn first_attr(&self, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| self.attr(name))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.value().classes().any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Image source, preferring lazy-load attributes over `src`
    pub fn image_src(&self) -> Option<&'a str> {
        self.first_attr(&["data-src", "data-lazy-src", "src"])
    }
}

fn parse_selector(query: &str) -> Option<Selector> {
    match Selector::parse(query) {
        Ok(selector) => Some(selector),
        Err(e) => {
            log::error!("Invalid selector '{}': {:?}", query, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        let base = Url::parse("https://readm.org").unwrap();
        Document::parse(html, &base)
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let d = doc("<h1 class='t'>  One \n\t Piece  </h1>");
        assert_eq!(d.text_of("h1.t").as_deref(), Some("One Piece"));
        assert_eq!(d.text_of("h2"), None);
    }

    #[test]
    fn test_select_any_uses_first_matching_query() {
        let d = doc("<div><p class='a'>1</p><p class='b'>2</p><p class='b'>3</p></div>");
        let nodes = d.select_any(&["span", "p.b", "p.a"]);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text(), "2");
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let d = doc("<p>x</p>");
        assert!(d.select("p[").is_empty());
        assert!(d.select_first("::").is_none());
    }

    #[test]
    fn test_attr_and_image_src() {
        let d = doc(r#"<img class="cover" src="/a.jpg" data-src=" /b.jpg " alt="">"#);
        let img = d.select_first("img").unwrap();
        assert_eq!(img.image_src(), Some("/b.jpg"));
        assert_eq!(img.attr("alt"), None);
        assert!(img.has_class("COVER"));
    }

    #[test]
    fn test_resolve_url() {
        let d = doc("");
        assert_eq!(
            d.resolve_url("/manga/one-piece").unwrap().as_str(),
            "https://readm.org/manga/one-piece"
        );
        assert_eq!(
            d.resolve_url("https://cdn.example.com/x.png").unwrap().as_str(),
            "https://cdn.example.com/x.png"
        );
        assert!(d.resolve_url("   ").is_none());
    }
}
