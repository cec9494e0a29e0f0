use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::{CodecError, FeedDocument};
use crate::storage::{with_trailing_slash, Update};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const POCO_NS: &str = "http://portablecontacts.net/spec/1.0";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serializes a feed document to Atom.
///
/// - Entries are ordered newest `created_at` first; equal timestamps keep
///   insertion order (stable sort).
/// - Each entry links to `{base_uri}updates/{id}`; its `<id>` is the
///   canonical URL so the document parses back to the same entry set.
/// - Every hub is advertised as `rel="hub"` in order, so `hubs[0]` is the
///   primary endpoint. An empty hub list simply omits the links.
///
/// Output is deterministic for a given document and base URI: no clock
/// reads, no map iteration.
pub fn serialize(doc: &FeedDocument, base_uri: &str) -> Result<Vec<u8>, CodecError> {
    let base = with_trailing_slash(base_uri);
    let feed_url = doc.feed.absolute_url(&base);
    let author = &doc.author;

    let mut updates: Vec<&Update> = doc.updates.iter().collect();
    updates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    root.push_attribute(("xmlns:poco", POCO_NS));
    write(&mut writer, Event::Start(root))?;

    text_element(&mut writer, "id", &feed_url)?;
    text_element(&mut writer, "title", &format!("{}'s Updates", author.username))?;
    if let Some(latest) = updates.iter().map(|u| u.updated_at).max() {
        text_element(&mut writer, "updated", &timestamp(latest))?;
    }

    link(&mut writer, "self", &feed_url)?;
    for hub in &doc.feed.hubs {
        link(&mut writer, "hub", hub)?;
    }

    if let Some(image) = &author.image_url {
        text_element(&mut writer, "icon", image)?;
    }

    write(&mut writer, Event::Start(BytesStart::new("author")))?;
    text_element(&mut writer, "name", &author.username)?;
    if let Some(email) = &author.email {
        text_element(&mut writer, "email", email)?;
    }
    if let Some(uri) = &author.remote_url {
        text_element(&mut writer, "uri", uri)?;
    }
    text_element(&mut writer, "poco:preferredUsername", &author.username)?;
    text_element(&mut writer, "poco:displayName", &author.name)?;
    write(&mut writer, Event::End(BytesEnd::new("author")))?;

    for update in updates {
        write(&mut writer, Event::Start(BytesStart::new("entry")))?;
        text_element(&mut writer, "id", &update.url)?;
        text_element(&mut writer, "title", &update.text)?;

        let mut content = BytesStart::new("content");
        content.push_attribute(("type", "text"));
        write(&mut writer, Event::Start(content))?;
        write(&mut writer, Event::Text(BytesText::new(&update.text)))?;
        write(&mut writer, Event::End(BytesEnd::new("content")))?;

        text_element(&mut writer, "published", &timestamp(update.created_at))?;
        text_element(&mut writer, "updated", &timestamp(update.updated_at))?;
        link(
            &mut writer,
            "alternate",
            &format!("{}updates/{}", base, update.id),
        )?;
        write(&mut writer, Event::End(BytesEnd::new("entry")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("feed")))?;

    Ok(writer.into_inner().into_inner())
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), CodecError> {
    writer
        .write_event(event)
        .map_err(|e| CodecError::Write(e.to_string()))
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), CodecError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn link(writer: &mut XmlWriter, rel: &str, href: &str) -> Result<(), CodecError> {
    let mut el = BytesStart::new("link");
    el.push_attribute(("rel", rel));
    el.push_attribute(("href", href));
    write(writer, Event::Empty(el))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse;
    use crate::storage::{Author, Feed};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    const BASE: &str = "https://social.example.com/";

    fn author() -> Author {
        Author {
            id: 1,
            name: "Jane Doe".into(),
            username: "jane".into(),
            email: Some("jane@social.example.com".into()),
            remote_url: Some("https://social.example.com/users/jane".into()),
            image_url: Some("https://social.example.com/avatars/jane.png".into()),
        }
    }

    fn feed(hubs: &[&str]) -> Feed {
        Feed {
            id: 5,
            remote_url: None,
            verify_token: "v".into(),
            secret: SecretString::from("s"),
            hubs: hubs.iter().map(|h| h.to_string()).collect(),
            author_id: Some(1),
        }
    }

    fn update(id: i64, created: i64, text: &str) -> Update {
        Update {
            id,
            feed_id: 5,
            author_id: 1,
            url: format!("urn:uuid:00000000-0000-0000-0000-{id:012}"),
            text: text.into(),
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            updated_at: Utc.timestamp_opt(created + 30, 0).unwrap(),
        }
    }

    fn document(hubs: &[&str], updates: Vec<Update>) -> FeedDocument {
        FeedDocument {
            feed: feed(hubs),
            author: author(),
            updates,
        }
    }

    #[test]
    fn test_entries_newest_first() {
        let doc = document(
            &[],
            vec![
                update(1, 1_000, "t1"),
                update(2, 2_000, "t2"),
                update(3, 3_000, "t3"),
            ],
        );
        let parsed = parse(&serialize(&doc, BASE).unwrap()).unwrap();
        let texts: Vec<_> = parsed.entries.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(texts, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let doc = document(
            &[],
            vec![
                update(1, 1_000, "first"),
                update(2, 1_000, "second"),
                update(3, 500, "older"),
            ],
        );
        let parsed = parse(&serialize(&doc, BASE).unwrap()).unwrap();
        let texts: Vec<_> = parsed.entries.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "older"]);
    }

    #[test]
    fn test_entry_links_joined_to_base() {
        let doc = document(&[], vec![update(42, 1_000, "hi")]);
        // Missing trailing slash is tolerated.
        let parsed = parse(&serialize(&doc, "https://social.example.com").unwrap()).unwrap();
        assert_eq!(
            parsed.entries[0].link.as_deref(),
            Some("https://social.example.com/updates/42")
        );
    }

    #[test]
    fn test_round_trip_entries_and_hubs() {
        let updates = vec![update(1, 1_700_000_000, "a"), update(2, 1_700_000_100, "b")];
        let doc = document(
            &["https://hub-a.example.com/", "https://hub-b.example.com/"],
            updates.clone(),
        );
        let parsed = parse(&serialize(&doc, BASE).unwrap()).unwrap();

        assert_eq!(
            parsed.hubs,
            vec!["https://hub-a.example.com/", "https://hub-b.example.com/"]
        );
        let mut got: Vec<_> = parsed
            .entries
            .iter()
            .map(|e| (e.url.clone(), e.published, e.updated))
            .collect();
        got.sort();
        let mut want: Vec<_> = updates
            .iter()
            .map(|u| (u.url.clone(), Some(u.created_at), Some(u.updated_at)))
            .collect();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn test_round_trip_author() {
        let parsed = parse(&serialize(&document(&[], vec![]), BASE).unwrap()).unwrap();
        assert_eq!(parsed.author.username, "jane");
        assert_eq!(parsed.author.display_name, "Jane Doe");
        assert_eq!(parsed.author.email.as_deref(), Some("jane@social.example.com"));
        assert_eq!(
            parsed.author.avatar_url.as_deref(),
            Some("https://social.example.com/avatars/jane.png")
        );
    }

    #[test]
    fn test_empty_hubs_omit_hub_link() {
        let xml = String::from_utf8(serialize(&document(&[], vec![]), BASE).unwrap()).unwrap();
        assert!(!xml.contains("rel=\"hub\""));
        assert!(xml.contains("<id>https://social.example.com/feeds/5.atom</id>"));
    }

    #[test]
    fn test_primary_hub_first() {
        let xml = String::from_utf8(
            serialize(
                &document(&["https://primary.example/", "https://backup.example/"], vec![]),
                BASE,
            )
            .unwrap(),
        )
        .unwrap();
        let primary = xml.find("https://primary.example/").unwrap();
        let backup = xml.find("https://backup.example/").unwrap();
        assert!(primary < backup);
    }

    #[test]
    fn test_output_is_deterministic() {
        let doc = document(
            &["https://hub.example/"],
            vec![update(1, 10, "x"), update(2, 20, "y")],
        );
        assert_eq!(serialize(&doc, BASE).unwrap(), serialize(&doc, BASE).unwrap());
    }

    #[test]
    fn test_text_is_escaped() {
        let doc = document(&[], vec![update(1, 10, "a < b & <script>")]);
        let bytes = serialize(&doc, BASE).unwrap();
        let xml = String::from_utf8(bytes.clone()).unwrap();
        assert!(!xml.contains("<script>"));
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.entries[0].body, "a < b & <script>");
    }
}
