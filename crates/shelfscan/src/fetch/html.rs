//! HTML → text via `scraper`.

use scraper::{Html, Node};

/// Elements whose text never reaches the reader.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Reduce an HTML document to its text content.
///
/// Text nodes are concatenated in document order with no separators added,
/// and the contents of [`SKIP_TAGS`] are dropped. Line breaks inside text
/// nodes are preserved; see [`strip_line_breaks`].
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut buf = String::with_capacity(html.len() / 2);

    // Explicit stack: page nesting depth must not bound our call depth.
    let mut stack: Vec<_> = doc.root_element().children().rev().collect();
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => buf.push_str(text),
            Node::Element(el) if !SKIP_TAGS.contains(&el.name()) => {
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }
    buf
}

/// Remove every `\n` and `\r` so the text is a single stream.
pub fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}
