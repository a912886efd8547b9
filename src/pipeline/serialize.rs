// src/pipeline/serialize.rs

//! Document serializer: [`FeedDocument`] to RSS 2.0 XML text.
//!
//! Output is pretty-printed with a two-space indent, one node per line, and is
//! a pure function of the document, so an unchanged document always yields
//! identical bytes. Text and markup content is written as is, including any
//! blank lines it carries.

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::models::{Channel, Content, FeedDocument, RssItem};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Render the document.
pub fn serialize(doc: &FeedDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_channel(&mut writer, &doc.channel)?;
    for item in &doc.items {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    xml.push('\n');
    Ok(xml)
}

type XmlWriter = Writer<Vec<u8>>;

fn write_channel(writer: &mut XmlWriter, channel: &Channel) -> Result<()> {
    write_text(writer, "title", &channel.title)?;
    write_text(writer, "link", &channel.link)?;
    write_text(writer, "description", &channel.description)?;
    write_text(writer, "language", &channel.language)?;

    let mut atom = BytesStart::new("atom:link");
    atom.push_attribute(("href", channel.self_link.as_str()));
    atom.push_attribute(("rel", "self"));
    atom.push_attribute(("type", "application/rss+xml"));
    writer.write_event(Event::Empty(atom))?;

    write_text(writer, "lastBuildDate", &channel.last_build_date)
}

fn write_item(writer: &mut XmlWriter, item: &RssItem) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    write_content(writer, "title", &item.title)?;
    write_text(writer, "link", &item.link)?;

    if let Some(guid) = &item.guid {
        let mut start = BytesStart::new("guid");
        start.push_attribute((
            "isPermaLink",
            if guid.is_permalink { "true" } else { "false" },
        ));
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&guid.value)))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;
    }
    if let Some(description) = &item.description {
        write_content(writer, "description", description)?;
    }
    if let Some(pub_date) = &item.pub_date {
        write_text(writer, "pubDate", pub_date)?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_content(writer: &mut XmlWriter, name: &str, content: &Content) -> Result<()> {
    match content {
        Content::Plain(text) => write_text(writer, name, text),
        Content::Markup(markup) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            for section in cdata_sections(markup) {
                writer.write_event(Event::CData(BytesCData::new(section)))?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
    }
}

/// Split markup so no section contains the `]]>` terminator.
fn cdata_sections(markup: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = markup;
    while let Some(pos) = rest.find("]]>") {
        // Keep "]]" in this section and start the next one at ">".
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Guid;

    fn document() -> FeedDocument {
        FeedDocument {
            channel: Channel {
                title: "Kinobox Trendy".to_string(),
                link: "https://www.kinobox.cz/filmy/trendy".to_string(),
                description: "Trendy filmy".to_string(),
                language: "cs-cz".to_string(),
                self_link: "https://example.com/feed.xml".to_string(),
                last_build_date: "Mon, 01 Jul 2024 12:30:00 +0200".to_string(),
            },
            items: vec![RssItem {
                title: Content::Plain("Tom & Jerry <3".to_string()),
                link: "https://www.kinobox.cz/film/42".to_string(),
                guid: Some(Guid {
                    value: "https://www.kinobox.cz/film/42".to_string(),
                    is_permalink: true,
                }),
                description: Some(Content::Markup(
                    r#"<img src="https://img.example/p.jpg" alt="Example plakát"/><p>Hodnocení: 87%</p>"#
                        .to_string(),
                )),
                pub_date: Some("Fri, 15 Mar 2024 00:00:00 +0000".to_string()),
            }],
        }
    }

    #[test]
    fn test_document_layout() {
        let xml = serialize(&document()).unwrap();
        let expected = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Kinobox Trendy</title>
    <link>https://www.kinobox.cz/filmy/trendy</link>
    <description>Trendy filmy</description>
    <language>cs-cz</language>
    <atom:link href="https://example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <lastBuildDate>Mon, 01 Jul 2024 12:30:00 +0200</lastBuildDate>
    <item>
      <title>Tom &amp; Jerry &lt;3</title>
      <link>https://www.kinobox.cz/film/42</link>
      <guid isPermaLink="true">https://www.kinobox.cz/film/42</guid>
      <description><![CDATA[<img src="https://img.example/p.jpg" alt="Example plakát"/><p>Hodnocení: 87%</p>]]></description>
      <pubDate>Fri, 15 Mar 2024 00:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_deterministic() {
        let doc = document();
        assert_eq!(serialize(&doc).unwrap(), serialize(&doc).unwrap());
    }

    #[test]
    fn test_markup_is_verbatim_and_title_escaped() {
        let xml = serialize(&document()).unwrap();
        assert!(xml.contains(r#"<img src="https://img.example/p.jpg""#));
        assert!(!xml.contains("&lt;img"));
        assert!(xml.contains("&lt;3"));
        assert!(xml.contains("&amp;"));
    }

    #[test]
    fn test_cdata_terminator_split() {
        assert_eq!(cdata_sections("a]]>b"), vec!["a]]", ">b"]);
        assert_eq!(cdata_sections("plain"), vec!["plain"]);

        let mut doc = document();
        doc.items[0].description = Some(Content::Markup("<p>x]]>y</p>".to_string()));
        let xml = serialize(&doc).unwrap();
        assert!(xml.contains("<![CDATA[<p>x]]]]><![CDATA[>y</p>]]>"));
    }

    #[test]
    fn test_empty_channel() {
        let mut doc = document();
        doc.items.clear();
        let xml = serialize(&doc).unwrap();
        assert!(!xml.contains("<item>"));
        assert!(xml.ends_with("</rss>\n"));
        assert!(!xml.lines().any(|l| l.trim().is_empty()));
    }

    #[test]
    fn test_markup_blank_lines_survive() {
        let mut doc = document();
        doc.items[0].description = Some(Content::Markup("<p>one\n\ntwo</p>".to_string()));
        let xml = serialize(&doc).unwrap();
        assert!(xml.contains("<![CDATA[<p>one\n\ntwo</p>]]>"));
    }
}
