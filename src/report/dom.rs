//! Small query facade over a parsed HTML document
//!
//! Strategies only use `find_first`, `find_all`, `collect_siblings_until`
//! and the node accessors below, never `scraper` selectors directly, so a
//! template's anchors read as plain predicates.

use scraper::{ElementRef, Html};

/// Elements that start a new text line when flattening markup
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hr", "li", "ol", "p", "section", "table", "tbody", "td", "th", "thead",
    "tr", "ul",
];

const IGNORED_TAGS: &[&str] = &["script", "style", "head", "title"];

pub struct HtmlDocument {
    html: Html,
}

/// Element handle borrowed from an [`HtmlDocument`]
#[derive(Clone, Copy)]
pub struct Node<'a> {
    el: ElementRef<'a>,
}

/// One sibling of an anchor: either an element or a non-blank text run
#[derive(Clone)]
pub enum Sibling<'a> {
    Element(Node<'a>),
    Text(String),
}

impl<'a> Sibling<'a> {
    pub fn as_element(&self) -> Option<Node<'a>> {
        match self {
            Sibling::Element(node) => Some(*node),
            Sibling::Text(_) => None,
        }
    }
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn root(&self) -> Node<'_> {
        Node { el: self.html.root_element() }
    }

    /// First element in document order satisfying `pred`
    pub fn find_first<'a>(&'a self, pred: impl Fn(&Node<'a>) -> bool) -> Option<Node<'a>> {
        self.root().find_first(pred)
    }

    /// All elements satisfying `pred`, in document order
    pub fn find_all<'a>(&'a self, pred: impl Fn(&Node<'a>) -> bool) -> Vec<Node<'a>> {
        self.root().find_all(pred)
    }

    /// Siblings following `node` up to (not including) the first one matching `stop`
    pub fn collect_siblings_until<'a>(
        &'a self,
        node: Node<'a>,
        stop: impl Fn(&Sibling<'a>) -> bool,
    ) -> Vec<Sibling<'a>> {
        let mut collected = Vec::new();

        for sibling in node.el.next_siblings() {
            let item = match sibling.value() {
                scraper::Node::Text(text) => {
                    let text = collapse_whitespace(text);
                    if text.is_empty() {
                        continue;
                    }
                    Sibling::Text(text)
                }
                scraper::Node::Element(_) => match ElementRef::wrap(sibling) {
                    Some(el) => Sibling::Element(Node { el }),
                    None => continue,
                },
                _ => continue,
            };

            if stop(&item) {
                break;
            }
            collected.push(item);
        }

        collected
    }

    /// Innermost rendered element whose text contains `needle`; the first such one in document order
    pub fn find_innermost_containing<'a>(&'a self, needle: &str) -> Option<Node<'a>> {
        self.find_first(|node| {
            node.is_rendered()
                && node.text().contains(needle)
                && !node.child_elements().iter().any(|child| child.text().contains(needle))
        })
    }
}

impl<'a> Node<'a> {
    pub fn tag(&self) -> &'a str {
        self.el.value().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    /// Inline style with whitespace removed and lowercased, e.g. `font-weight:bold`
    pub fn style(&self) -> String {
        self.attr("style")
            .map(|s| s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase())
            .unwrap_or_default()
    }

    pub fn has_style(&self, fragment: &str) -> bool {
        self.style().contains(&fragment.to_lowercase())
    }

    /// Pixel font size from the inline style, if declared
    pub fn font_size_px(&self) -> Option<u32> {
        let style = self.style();
        let start = style.find("font-size:")? + "font-size:".len();
        let digits: String = style[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// Text content with whitespace collapsed
    pub fn text(&self) -> String {
        let mut raw = String::new();
        push_text(self.el, &mut raw);
        collapse_whitespace(&raw)
    }

    /// Text content split into lines at `<br>` and block element boundaries
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        push_lines(self.el, &mut lines, &mut current);
        flush_line(&mut lines, &mut current);
        lines
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.el.parent().and_then(ElementRef::wrap).map(|el| Node { el })
    }

    pub fn prev_element_sibling(&self) -> Option<Node<'a>> {
        self.el.prev_siblings().find_map(ElementRef::wrap).map(|el| Node { el })
    }

    pub fn child_elements(&self) -> Vec<Node<'a>> {
        self.el.children().filter_map(ElementRef::wrap).map(|el| Node { el }).collect()
    }

    /// False for `<head>`, `<title>`, `<script>` or `<style>` content
    pub fn is_rendered(&self) -> bool {
        !IGNORED_TAGS.contains(&self.tag())
            && !self
                .el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| IGNORED_TAGS.contains(&el.value().name()))
    }

    /// First descendant (or self) satisfying `pred`
    pub fn find_first(&self, pred: impl Fn(&Node<'a>) -> bool) -> Option<Node<'a>> {
        self.el
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| Node { el })
            .find(|node| pred(node))
    }

    /// All descendants (and self) satisfying `pred`
    pub fn find_all(&self, pred: impl Fn(&Node<'a>) -> bool) -> Vec<Node<'a>> {
        self.el
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| Node { el })
            .filter(|node| pred(node))
            .collect()
    }
}

/// Flatten collected siblings into text lines.
///
/// Text runs and inline elements join the current line; `<br>` ends it and
/// block elements contribute their own lines.
pub fn siblings_to_lines(siblings: &[Sibling<'_>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for sibling in siblings {
        match sibling {
            Sibling::Text(text) => {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(text);
            }
            Sibling::Element(node) if node.tag() == "br" => flush_line(&mut lines, &mut current),
            Sibling::Element(node) if is_block(node.tag()) => {
                flush_line(&mut lines, &mut current);
                lines.extend(node.lines());
            }
            Sibling::Element(node) => {
                let text = node.text();
                if !text.is_empty() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&text);
                }
            }
        }
    }

    flush_line(&mut lines, &mut current);
    lines
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => out.push_str(text),
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let name = child_el.value().name();
                    if IGNORED_TAGS.contains(&name) {
                        continue;
                    }
                    // keep words in adjacent cells and lines apart
                    if name == "br" || is_block(name) {
                        out.push(' ');
                    }
                    push_text(child_el, out);
                    if is_block(name) {
                        out.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_lines(el: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => current.push_str(text),
            scraper::Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child_el.value().name();
                if IGNORED_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    flush_line(lines, current);
                    continue;
                }

                let block = is_block(name);
                if block {
                    flush_line(lines, current);
                }
                push_lines(child_el, lines, current);
                if block {
                    flush_line(lines, current);
                }
            }
            _ => {}
        }
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
          <div id="wrap">
            <p style="font-size: 24px">Emma</p>
            <p>DAILY REPORT - March 4, 2025</p>
            <span style="Font-Weight: Bold">Naps</span><br>
            Slept for 1 hour<br>
            <b>second</b> line
            <span style="font-weight:bold">Meals</span>
            Lunch
          </div>
        </body></html>
    "#;

    #[test]
    fn test_innermost_marker_element() {
        let doc = HtmlDocument::parse(SAMPLE);
        let marker = doc.find_innermost_containing("DAILY REPORT -").unwrap();
        assert_eq!(marker.tag(), "p");
        assert_eq!(marker.prev_element_sibling().unwrap().text(), "Emma");
        assert_eq!(marker.prev_element_sibling().unwrap().font_size_px(), Some(24));
    }

    #[test]
    fn test_marker_in_title_is_skipped() {
        let html = SAMPLE.replace("<html>", "<html><head><meta charset=\"utf-8\"><title>DAILY REPORT - March 4, 2025</title></head>");
        let doc = HtmlDocument::parse(&html);
        let marker = doc.find_innermost_containing("DAILY REPORT -").unwrap();
        assert_eq!(marker.tag(), "p");
        assert!(marker.is_rendered());
        assert!(!doc.find_first(|n| n.tag() == "title").unwrap().is_rendered());
    }

    #[test]
    fn test_collect_siblings_until_next_heading() {
        let doc = HtmlDocument::parse(SAMPLE);
        let heading = doc
            .find_first(|n| n.tag() == "span" && n.text() == "Naps")
            .unwrap();
        assert!(heading.has_style("font-weight:bold"));

        let siblings = doc.collect_siblings_until(heading, |s| {
            s.as_element().map(|n| n.tag() == "span").unwrap_or(false)
        });
        assert_eq!(siblings_to_lines(&siblings), vec!["Slept for 1 hour", "second line"]);
    }

    #[test]
    fn test_lines_split_on_breaks_and_blocks() {
        let doc = HtmlDocument::parse("<div>a<br>b<p>c</p>d</div>");
        let div = doc.find_first(|n| n.tag() == "div").unwrap();
        assert_eq!(div.lines(), vec!["a", "b", "c", "d"]);
        assert_eq!(div.text(), "a b c d");
    }
}
