/// Turns comment html into plain text for terminal output.
/// Block level tags become line breaks, links keep their target in brackets.
pub fn html_to_text(html: &str) -> String {
    use html5gum::{HtmlString, Token, Tokenizer};

    let mut text = String::new();
    let mut link: Option<String> = None;
    let attr_href = HtmlString("href".as_bytes().to_owned());

    for token in Tokenizer::new(html).infallible() {
        match token {
            Token::StartTag(tag) => match std::str::from_utf8(&tag.name.0) {
                Ok("a") => {
                    link = tag
                        .attributes
                        .get(&attr_href)
                        .and_then(|e| std::str::from_utf8(&e.0).ok())
                        .map(str::to_string);
                }
                Ok("br") => text.push('\n'),
                Ok("li") => text.push_str("\n- "),
                _ => (),
            },
            Token::EndTag(tag) => match std::str::from_utf8(&tag.name.0) {
                Ok("a") => {
                    if let Some(url) = link.take() {
                        text.push_str(&format!(" [{url}]"));
                    }
                }
                Ok("p" | "div" | "ul" | "ol" | "blockquote" | "pre") => text.push('\n'),
                _ => (),
            },
            Token::String(s) => text.push_str(std::str::from_utf8(&s.0).unwrap_or_default()),
            Token::Comment(_) | Token::Doctype(_) | Token::Error(_) => (),
        }
    }

    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut output = String::new();
    let mut blank = false;
    for line in lines {
        if line.trim().is_empty() {
            blank = !output.is_empty();
            continue;
        }
        if blank {
            output.push('\n');
            blank = false;
        }
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(line);
    }
    output
}

/// Server timestamps come either as RFC 3339 or as naive ISO 8601 in UTC
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_links() {
        let text = html_to_text(
            r#"<p>Hello <a href="https://example.org">there</a></p><p>second<br>line</p>"#,
        );
        assert_eq!(text, "Hello there [https://example.org]\nsecond\nline");
    }

    #[test]
    fn lists_are_bulleted() {
        let text = html_to_text("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(text, "- one\n- two");
    }

    #[test]
    fn timestamps_with_and_without_offset() {
        let with = timestamp::parse("2022-03-01T10:00:00+00:00").unwrap();
        let naive = timestamp::parse("2022-03-01T10:00:00.000000").unwrap();
        assert_eq!(with, naive);
        assert!(timestamp::parse("yesterday").is_none());
    }
}
