//! Block markup validation and plain-text conversion for thread message text.
//!
//! Message text is plain prose with a small set of inline tags:
//!
//! - `<a href="…">…</a>` for links
//! - `<ref id="…" type="…">…</ref>` for references to entities or visits
//!
//! plus the entities `&amp;`, `&lt;`, `&gt;`, `&quot;` and `&#39;`. Tags must nest properly.
//! Anything else is rejected so that clients never render half-parsed markup.

/// Tags and the attributes each one requires.
const TAGS: &[(&str, &[&str])] = &[("a", &["href"]), ("ref", &["id", "type"])];

const ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("#39", '\''),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("unterminated tag")]
    UnterminatedTag,
    #[error("unknown tag <{0}>")]
    UnknownTag(String),
    #[error("tag <{tag}> requires attribute {attribute}")]
    MissingAttribute { tag: String, attribute: String },
    #[error("malformed attributes in <{0}>")]
    MalformedAttributes(String),
    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedTag { expected: String, found: String },
    #[error("closing tag </{0}> has no opening tag")]
    UnexpectedClose(String),
    #[error("tag <{0}> is never closed")]
    UnclosedTag(String),
    #[error("unknown or unterminated entity &{0}")]
    UnknownEntity(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Text(String),
    Open(String),
    Close(String),
}

/// Checks that `text` is well-formed block markup.
pub fn validate(text: &str) -> Result<(), MarkupError> {
    tokenize(text).map(|_| ())
}

/// Validates `text` and returns it with tags removed and entities decoded.
pub fn plain_text(text: &str) -> Result<String, MarkupError> {
    let plain = tokenize(text)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Text(t) => Some(t),
            Token::Open(_) | Token::Close(_) => None,
        })
        .collect();
    Ok(plain)
}

/// Escapes arbitrary text for inclusion in markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match ENTITIES.iter().find(|(_, decoded)| *decoded == c) {
            Some((name, _)) => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
            None => out.push(c),
        }
    }
    out
}

fn tokenize(text: &str) -> Result<Vec<Token>, MarkupError> {
    let mut tokens = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => {
                let end = rest.find('>').ok_or(MarkupError::UnterminatedTag)?;
                let tag = &rest[1..end];
                rest = &rest[end + 1..];

                if !buf.is_empty() {
                    tokens.push(Token::Text(std::mem::take(&mut buf)));
                }

                if let Some(name) = tag.strip_prefix('/') {
                    let name = name.trim();
                    match open.pop() {
                        Some(expected) if expected == name => {}
                        Some(expected) => {
                            return Err(MarkupError::MismatchedTag {
                                expected,
                                found: name.to_string(),
                            })
                        }
                        None => return Err(MarkupError::UnexpectedClose(name.to_string())),
                    }
                    tokens.push(Token::Close(name.to_string()));
                } else {
                    let name = parse_open_tag(tag)?;
                    open.push(name.clone());
                    tokens.push(Token::Open(name));
                }
            }
            '&' => {
                let end = rest.find(';').filter(|end| *end <= 6);
                let name = match end {
                    Some(end) => &rest[1..end],
                    None => {
                        let shown: String = rest[1..].chars().take(5).collect();
                        return Err(MarkupError::UnknownEntity(shown));
                    }
                };
                let decoded = ENTITIES
                    .iter()
                    .find(|(entity, _)| *entity == name)
                    .map(|(_, decoded)| *decoded)
                    .ok_or_else(|| MarkupError::UnknownEntity(name.to_string()))?;
                buf.push(decoded);
                rest = &rest[name.len() + 2..];
            }
            _ => {
                buf.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    if let Some(unclosed) = open.pop() {
        return Err(MarkupError::UnclosedTag(unclosed));
    }
    if !buf.is_empty() {
        tokens.push(Token::Text(buf));
    }
    Ok(tokens)
}

/// Parses `name attr="value" …` and checks the tag's required attributes.
fn parse_open_tag(tag: &str) -> Result<String, MarkupError> {
    let tag = tag.trim();
    let (name, mut attrs) = match tag.find(char::is_whitespace) {
        Some(i) => (&tag[..i], tag[i..].trim_start()),
        None => (tag, ""),
    };

    let required = TAGS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, required)| *required)
        .ok_or_else(|| MarkupError::UnknownTag(name.to_string()))?;

    let malformed = || MarkupError::MalformedAttributes(name.to_string());
    let mut seen = Vec::new();
    while !attrs.is_empty() {
        let eq = attrs.find('=').ok_or_else(malformed)?;
        let key = attrs[..eq].trim();
        let value = attrs[eq + 1..].trim_start();
        let value = value.strip_prefix('"').ok_or_else(malformed)?;
        let close = value.find('"').ok_or_else(malformed)?;
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(malformed());
        }
        seen.push(key);
        attrs = value[close + 1..].trim_start();
    }

    for attribute in required {
        if !seen.contains(attribute) {
            return Err(MarkupError::MissingAttribute {
                tag: name.to_string(),
                attribute: attribute.to_string(),
            });
        }
    }

    Ok(name.to_string())
}
