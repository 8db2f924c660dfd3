// src/ingest/syndication.rs
//! Schema-free reader for RSS 2.0, RSS 1.0 (RDF) and Atom documents.
//!
//! Items are flattened into named elements so field mapping can be driven by config instead
//! of fixed serde structs. Direct children of an `<item>`/`<entry>` are stored under their
//! qualified name (`title`, `dc:creator`, `content:encoded`); grandchildren are also stored
//! as `parent/child` (`author/name`). Text is entity-decoded; markup is left for callers.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const FEED_ROOTS: &[&str] = &["rss", "feed", "rdf:RDF", "RDF"];
const ITEM_TAGS: &[&str] = &["item", "entry"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub elements: Vec<Element>,
}

impl FeedItem {
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.iter().filter(move |e| e.name == name)
    }

    /// First non-empty text for `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty())
    }

    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.elements
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub root: String,
    pub items: Vec<FeedItem>,
    /// Set when the document broke part-way; `items` holds what was recovered.
    pub warning: Option<String>,
}

struct Open {
    name: String,
    text: String,
    attrs: Vec<(String, String)>,
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attrs_of(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = html_escape::decode_html_entities(&String::from_utf8_lossy(&a.value))
                .into_owned();
            (key, value)
        })
        .collect()
}

fn push_text(stack: &mut [Open], chunk: &str) {
    let chunk = chunk.trim();
    if chunk.is_empty() {
        return;
    }
    for open in stack.iter_mut() {
        if !open.text.is_empty() {
            open.text.push(' ');
        }
        open.text.push_str(chunk);
    }
}

fn close(item: &mut FeedItem, stack: &[Open], el: Open) {
    let Open { name, text, attrs } = el;
    match stack {
        [] => item.elements.push(Element { name, text, attrs }),
        [parent] => item.elements.push(Element {
            name: format!("{}/{}", parent.name, name),
            text,
            attrs,
        }),
        _ => {}
    }
}

/// Parse a feed document. `Err` means no feed could be recognized at all.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, String> {
    let mut reader = Reader::from_str(xml);
    let mut root: Option<String> = None;
    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut stack: Vec<Open> = Vec::new();
    let mut warning = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = qname(&e);
                if root.is_none() {
                    root = Some(name.clone());
                }
                if current.is_some() {
                    stack.push(Open {
                        name,
                        text: String::new(),
                        attrs: attrs_of(&e),
                    });
                } else if ITEM_TAGS.contains(&name.as_str()) {
                    current = Some(FeedItem::default());
                    stack.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                let name = qname(&e);
                if root.is_none() {
                    root = Some(name.clone());
                }
                if let Some(item) = current.as_mut() {
                    let el = Open {
                        name,
                        text: String::new(),
                        attrs: attrs_of(&e),
                    };
                    close(item, &stack, el);
                }
            }
            Ok(Event::Text(t)) => {
                if current.is_some() {
                    let raw = String::from_utf8_lossy(&t);
                    push_text(&mut stack, &html_escape::decode_html_entities(&raw));
                }
            }
            Ok(Event::CData(c)) => {
                if current.is_some() {
                    push_text(&mut stack, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(item) = current.as_mut() {
                    match stack.pop() {
                        Some(el) => close(item, &stack, el),
                        None => items.extend(current.take()),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warning = Some(format!(
                    "xml error at byte {}: {e}",
                    reader.buffer_position()
                ));
                break;
            }
            _ => {}
        }
    }

    let root = root.ok_or_else(|| {
        warning
            .clone()
            .unwrap_or_else(|| "empty document".to_string())
    })?;
    if !FEED_ROOTS.contains(&root.as_str()) && items.is_empty() {
        return Err(format!("unrecognised document root <{root}>"));
    }

    Ok(ParsedFeed {
        root,
        items,
        warning,
    })
}
