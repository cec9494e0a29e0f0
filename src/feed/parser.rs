use feed_rs::model::{Entry, Link};
use feed_rs::parser as feed_parser;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{BodyKind, CodecError, ParsedAuthor, ParsedEntry, ParsedFeed};

/// PortableContacts fields feed-rs does not surface.
#[derive(Debug, Default)]
struct Poco {
    display_name: Option<String>,
    preferred_username: Option<String>,
}

/// What the raw `quick-xml` pass sees that feed-rs hides.
#[derive(Debug, Default)]
struct Extras {
    poco: Poco,
    /// One flag per Atom `<entry>`, in document order: did it carry a
    /// non-empty `<id>`? feed-rs invents ids for entries without one.
    entry_has_id: Vec<bool>,
}

/// Parses an Atom (or RSS) document into a [`ParsedFeed`].
///
/// # Errors
///
/// - [`CodecError::Malformed`] if the bytes are not a feed
/// - [`CodecError::MissingAuthor`] if the feed has no feed-level author
pub fn parse(document: &[u8]) -> Result<ParsedFeed, CodecError> {
    let feed = feed_parser::parse(document).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let person = feed.authors.first().ok_or(CodecError::MissingAuthor)?;
    let Extras { poco, entry_has_id } = scan(document);

    let username = match person.name.trim() {
        "" => poco.preferred_username.unwrap_or_default(),
        name => name.to_string(),
    };
    let author = ParsedAuthor {
        display_name: poco
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| username.clone()),
        username,
        email: person.email.clone(),
        uri: person.uri.clone(),
        avatar_url: feed
            .icon
            .as_ref()
            .map(|i| i.uri.clone())
            .or_else(|| feed.logo.as_ref().map(|l| l.uri.clone())),
    };

    let hubs: Vec<String> = feed
        .links
        .iter()
        .filter(|l| l.rel.as_deref() == Some("hub"))
        .map(|l| l.href.clone())
        .collect();

    let total = feed.entries.len();
    let entries: Vec<ParsedEntry> = feed
        .entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| convert_entry(entry, entry_has_id.get(i).copied().unwrap_or(true)))
        .collect();
    let skipped = total - entries.len();

    Ok(ParsedFeed {
        author,
        entries,
        hubs,
        skipped,
    })
}

fn convert_entry(entry: Entry, has_id: bool) -> Option<ParsedEntry> {
    let link = alternate_link(&entry.links).map(|l| l.href.clone());

    let id = entry.id.trim();
    let url = if !has_id || id.is_empty() {
        link.clone()?
    } else {
        id.to_string()
    };

    let (body, body_kind) = match (entry.content, entry.summary) {
        (Some(content), _) if content.body.is_some() => {
            let kind = body_kind(&content.content_type.essence().to_string());
            (content.body.unwrap_or_default(), kind)
        }
        (_, Some(summary)) => {
            let kind = body_kind(&summary.content_type.essence().to_string());
            (summary.content, kind)
        }
        _ => (String::new(), BodyKind::PlainText),
    };

    Some(ParsedEntry {
        url,
        link,
        title: entry.title.map(|t| t.content),
        body,
        body_kind,
        published: entry.published,
        updated: entry.updated,
    })
}

fn body_kind(mime: &str) -> BodyKind {
    if mime == "text/plain" {
        BodyKind::PlainText
    } else {
        BodyKind::Markup
    }
}

/// `rel="alternate"` wins; a link without `rel` is alternate by definition.
fn alternate_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.iter().find(|l| l.rel.is_none()))
}

/// Reads `poco:displayName` / `poco:preferredUsername` from the first
/// feed-level author and records which entries carry an `<id>`.
///
/// Best effort: the document already parsed as a feed, so a failure here only
/// means the extra information is unavailable.
fn scan(document: &[u8]) -> Extras {
    // SEC-002: quick-xml 0.37 does not expand custom entities.
    let mut reader = Reader::from_reader(document);
    reader.config_mut().trim_text(true);

    let mut extras = Extras::default();
    let mut authors_seen = 0usize;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if path.len() == 1 && path[0] == b"feed" && name == b"entry" {
                    extras.entry_has_id.push(false);
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.len() == 1 && path[0] == b"feed" && e.local_name().as_ref() == b"entry" {
                    extras.entry_has_id.push(false);
                }
            }
            Ok(Event::End(_)) => {
                let left = path.pop();
                if path.len() == 1 && left.as_deref() == Some(b"author".as_slice()) {
                    authors_seen += 1;
                }
            }
            Ok(Event::Text(t)) => {
                let in_first_author = authors_seen == 0 && is_feed_child_field(&path, b"author");
                let in_entry_id = is_feed_child_field(&path, b"entry")
                    && path.last().map(Vec::as_slice) == Some(b"id".as_slice());
                if in_first_author || in_entry_id {
                    match t.unescape() {
                        Ok(text) => {
                            let text = text.trim();
                            if in_entry_id {
                                if let Some(flag) = extras.entry_has_id.last_mut() {
                                    *flag = !text.is_empty();
                                }
                            } else {
                                match path.last().map(Vec::as_slice) {
                                    Some(b"displayName") => {
                                        extras.poco.display_name = Some(text.to_string())
                                    }
                                    Some(b"preferredUsername") => {
                                        extras.poco.preferred_username = Some(text.to_string())
                                    }
                                    _ => {}
                                }
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping undecodable text during feed scan");
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Feed scan stopped early");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    extras
}

/// `feed > {parent} > field`
fn is_feed_child_field(path: &[Vec<u8>], parent: &[u8]) -> bool {
    path.len() == 3 && path[0] == b"feed" && path[1] == parent
}
