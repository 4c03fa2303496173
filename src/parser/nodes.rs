use std::borrow::Cow;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ScrapeError;

/// One element found inside a table region, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `<th>` with the concatenation of every text node beneath it.
    Header(String),
    /// `<a>` and its `title` attribute, if any.
    Link { title: Option<String> },
    Other(String),
}

/// Flatten every element under any `<table>` (the table itself included)
/// into a depth-first node sequence. Elements outside tables are skipped.
pub fn flatten_tables(markup: &str) -> Result<Vec<Node>, ScrapeError> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.expand_empty_elements = true;

    let mut nodes = Vec::new();
    let mut table_depth = 0usize;
    // Indices of `th` nodes still open; nested text belongs to all of them.
    let mut open_headers: Vec<usize> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                if name == "table" {
                    table_depth += 1;
                }
                if table_depth == 0 {
                    continue;
                }
                // A new row or cell ends any header whose `</th>` was omitted.
                if matches!(name.as_str(), "tr" | "th" | "td") {
                    open_headers.clear();
                }
                match name.as_str() {
                    "th" => {
                        open_headers.push(nodes.len());
                        nodes.push(Node::Header(String::new()));
                    }
                    "a" => nodes.push(Node::Link { title: title_of(&e) }),
                    _ => nodes.push(Node::Other(name)),
                }
            }
            Ok(Event::End(e)) => {
                if table_depth == 0 {
                    continue;
                }
                let name = lowercase(e.local_name().as_ref());
                match name.as_str() {
                    "th" => {
                        open_headers.pop();
                    }
                    "tr" => open_headers.clear(),
                    "table" => {
                        table_depth -= 1;
                        open_headers.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if !open_headers.is_empty() => {
                let text = e
                    .unescape_with(html_entity)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                append_text(&mut nodes, &open_headers, &text);
            }
            Ok(Event::CData(e)) if !open_headers.is_empty() => {
                append_text(&mut nodes, &open_headers, &String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScrapeError::MalformedDocument(format!(
                    "at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(nodes)
}

fn append_text(nodes: &mut [Node], open: &[usize], text: &str) {
    for &idx in open {
        if let Some(Node::Header(buf)) = nodes.get_mut(idx) {
            buf.push_str(text);
        }
    }
}

fn element_name(e: &BytesStart) -> String {
    lowercase(e.local_name().as_ref())
}

fn lowercase(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn title_of(e: &BytesStart) -> Option<String> {
    e.html_attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref().eq_ignore_ascii_case(b"title"))
        .map(|a| match a.unescape_value_with(html_entity) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// The XML five plus the named entities that show up in wiki markup.
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        _ => resolve_predefined_entity(name),
    }
}
