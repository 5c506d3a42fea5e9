use htmlescape::decode_html;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::{Error, Result};

/// Longest entity name (between `&` and `;`) worth handing to the decoder
const MAX_ENTITY_LEN: usize = 32;

/// Named references that HTML accepts without the closing `;`
const LEGACY_ENTITIES: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren",
    "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34",
    "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr", "micro",
    "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm", "oslash",
    "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy", "sup1",
    "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

/// Normalized RSS document, as handed from the fetcher to the ingestor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// One `<item>` of a channel, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text; parsed by the ingestor
    pub pub_date: String,
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: MixedText,
    // Vec so that `<atom:link rel="self"/>` siblings do not clash with `<link>`
    #[serde(rename = "link", default)]
    links: Vec<RssText>,
    #[serde(default)]
    description: MixedText,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: MixedText,
    #[serde(rename = "link", default)]
    links: Vec<RssText>,
    #[serde(default)]
    description: MixedText,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
}

#[derive(Debug, Deserialize)]
struct RssText {
    #[serde(rename = "$text", default)]
    text: String,
}

/// Element body that may interleave text with unescaped markup such as
/// `Hello <b>world</b>`. Only the direct text is kept.
#[derive(Debug, Default, Deserialize)]
struct MixedText {
    #[serde(rename = "$value", default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
enum TextPart {
    #[serde(rename = "$text")]
    Text(String),
    #[serde(other)]
    Element,
}

impl MixedText {
    fn into_text(self) -> String {
        self.parts
            .into_iter()
            .filter_map(|part| match part {
                TextPart::Text(text) => Some(text),
                TextPart::Element => None,
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn first_link(links: Vec<RssText>) -> String {
    links
        .into_iter()
        .map(|l| l.text.trim().to_string())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
}

/// Parse an RSS 2.0 document and unescape HTML entities in the text fields
pub fn parse_feed(content: &str) -> Result<FeedDocument> {
    match root_element(content)? {
        Some(name) if name == "rss" => {}
        Some(name) => {
            return Err(Error::FeedParse(format!(
                "Expected an <rss> document, found <{}>",
                name
            )))
        }
        None => return Err(Error::FeedParse("Document has no root element".to_string())),
    }

    let rss: RssDocument = quick_xml::de::from_str(content)
        .map_err(|e| Error::FeedParse(e.to_string()))?;

    let channel = rss.channel;

    let items = channel
        .items
        .into_iter()
        .map(|item| FeedItem {
            title: unescape_html(&item.title.into_text()),
            link: first_link(item.links),
            description: unescape_html(&item.description.into_text()),
            pub_date: item.pub_date,
        })
        .collect();

    Ok(FeedDocument {
        title: unescape_html(&channel.title.into_text()),
        link: first_link(channel.links),
        description: unescape_html(&channel.description.into_text()),
        items,
    })
}

/// Local name of the first element in the document
fn root_element(content: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(content);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                return Ok(Some(name));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(Error::FeedParse(e.to_string())),
        }
    }
}

/// Decode HTML character references such as `&amp;`, `&#39;` or `&#x2019;`.
///
/// Feeds frequently double-encode entities, so the XML layer leaves
/// `&amp;amp;` as `&amp;`. Legacy references without `;` (`&amp B`, `&copy2024`,
/// `&#39s`) are decoded as HTML does. Anything else is kept verbatim.
pub fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        match decode_reference(candidate) {
            Some((text, len)) => {
                out.push_str(&text);
                rest = &candidate[len..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decoded text and consumed byte length of the reference at the start of `s`
fn decode_reference(s: &str) -> Option<(String, usize)> {
    if let Some(len) = entity_len(s) {
        if let Ok(text) = decode_html(&s[..len]) {
            return Some((text, len));
        }
    }
    decode_unterminated(s)
}

/// Numeric references without `;`, or the longest legacy name at the start of `s`
fn decode_unterminated(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix('&')?;

    if let Some(num) = body.strip_prefix('#') {
        let (marker, digits) = match num.strip_prefix(['x', 'X']) {
            Some(hex) => ("#x", leading(hex, |c| c.is_ascii_hexdigit())),
            None => ("#", leading(num, |c| c.is_ascii_digit())),
        };
        if digits.is_empty() || digits.len() > MAX_ENTITY_LEN {
            return None;
        }
        let text = decode_html(&format!("&{}{};", marker, digits)).ok()?;
        return Some((text, 1 + marker.len() + digits.len()));
    }

    let name = leading(body, |c| c.is_ascii_alphanumeric());
    let name = &name[..name.len().min(MAX_ENTITY_LEN)];

    (2..=name.len()).rev().find_map(|len| {
        let prefix = &name[..len];
        if !LEGACY_ENTITIES.contains(&prefix) {
            return None;
        }
        let canonical = match prefix {
            "AMP" => "amp",
            "COPY" => "copy",
            "GT" => "gt",
            "LT" => "lt",
            "QUOT" => "quot",
            "REG" => "reg",
            other => other,
        };
        let terminated = body[len..].starts_with(';');
        decode_html(&format!("&{};", canonical))
            .ok()
            .map(|text| (text, 1 + len + usize::from(terminated)))
    })
}

/// Longest ASCII prefix of `s` whose characters all satisfy `pred`
fn leading(s: &str, pred: impl Fn(char) -> bool) -> &str {
    &s[..s.find(|c: char| !pred(c)).unwrap_or(s.len())]
}

/// Byte length of a character reference at the start of `s`, `&` and `;` included
fn entity_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('&')?;
    let (end, _) = body
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|(_, c)| *c == ';')?;

    let name = &body[..end];
    let valid = match name.strip_prefix('#') {
        Some(num) => match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        },
        None => !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()),
    };

    valid.then_some(end + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>A &amp;amp; B Journal</title>
    <link>https://journal.example.com/</link>
    <atom:link href="https://journal.example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <description>News &amp;amp; notes</description>
    <item>
      <title>First &amp;quot;post&amp;quot;</title>
      <link>https://journal.example.com/first</link>
      <description><![CDATA[<p>Hello &amp; welcome</p>]]></description>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://journal.example.com/second</link>
      <pubDate>not a date</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_channel_and_items() {
        let doc = parse_feed(SAMPLE).unwrap();

        assert_eq!(doc.title, "A & B Journal");
        assert_eq!(doc.link, "https://journal.example.com/");
        assert_eq!(doc.description, "News & notes");
        assert_eq!(doc.items.len(), 2);

        let first = &doc.items[0];
        assert_eq!(first.title, "First \"post\"");
        assert_eq!(first.link, "https://journal.example.com/first");
        assert_eq!(first.description, "<p>Hello & welcome</p>");
        assert_eq!(first.pub_date, "Mon, 02 Jan 2006 15:04:05 -0700");

        let second = &doc.items[1];
        assert_eq!(second.title, "Second");
        assert_eq!(second.description, "");
        assert_eq!(second.pub_date, "not a date");
    }

    #[test]
    fn test_parse_empty_channel() {
        let doc = parse_feed(r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#)
            .unwrap();
        assert_eq!(doc.title, "Quiet");
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_rss() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom</title></feed>"#;
        assert!(matches!(parse_feed(atom), Err(Error::FeedParse(_))));
        assert!(matches!(parse_feed("<html><body>nope"), Err(Error::FeedParse(_))));
        assert!(matches!(parse_feed(""), Err(Error::FeedParse(_))));
    }

    #[test]
    fn test_inline_markup_does_not_drop_siblings() {
        let content = r#"<rss version="2.0"><channel>
  <title>Mixed <i>bag</i></title>
  <item>
    <title>Plain</title>
    <link>https://journal.example.com/plain</link>
    <description>Nothing fancy</description>
  </item>
  <item>
    <title>Hello <b>world</b> again</title>
    <link>https://journal.example.com/markup</link>
    <description>Hello <b>world</b></description>
  </item>
</channel></rss>"#;

        let doc = parse_feed(content).unwrap();
        assert_eq!(doc.title, "Mixed");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].title, "Plain");
        assert_eq!(doc.items[0].description, "Nothing fancy");

        let markup = &doc.items[1];
        assert_eq!(markup.link, "https://journal.example.com/markup");
        assert_eq!(markup.title, "Hello again");
        assert_eq!(markup.description, "Hello");
    }

    #[test]
    fn test_parse_requires_rss_root() {
        let html_channel = "<html><channel><title>x</title></channel></html>";
        assert!(matches!(parse_feed(html_channel), Err(Error::FeedParse(_))));

        let with_prolog = r#"<?xml version="1.0"?>
<!-- generated -->
<rss version="2.0"><channel><title>Ok</title></channel></rss>"#;
        assert_eq!(parse_feed(with_prolog).unwrap().title, "Ok");
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("A &amp; B Journal"), "A & B Journal");
        assert_eq!(unescape_html("&lt;b&gt;bold&lt;/b&gt;"), "<b>bold</b>");
        assert_eq!(unescape_html("it&#39;s &#x2019;quoted&#8217;"), "it's ’quoted’");
        assert_eq!(unescape_html("plain text"), "plain text");
    }

    #[test]
    fn test_unescape_html_keeps_stray_ampersands() {
        assert_eq!(unescape_html("AT&T & friends"), "AT&T & friends");
        assert_eq!(unescape_html("&bogus; &amp;"), "&bogus; &");
        assert_eq!(unescape_html("trailing &"), "trailing &");
        assert_eq!(unescape_html("&#;&#x;"), "&#;&#x;");
    }

    #[test]
    fn test_unescape_html_without_semicolon() {
        assert_eq!(unescape_html("&amp B"), "& B");
        assert_eq!(unescape_html("&copy2024 &AMP;"), "©2024 &");
        assert_eq!(unescape_html("it&#39s &#x2019s"), "it's ’s");
        assert_eq!(unescape_html("&notit;"), "¬it;");
    }
}
