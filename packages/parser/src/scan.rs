use crate::error::{ParseError, ParseResult};

/// One tag delimiter found in the source, with byte offsets.
///
/// A `<` only opens a tag when followed by `/` or an uppercase letter;
/// anything else is literal text and is skipped over.
#[derive(Debug, PartialEq)]
pub struct RawTag<'src> {
    /// Offset of the opening `<`.
    pub start: usize,
    /// Offset one past the closing `>`.
    pub end: usize,
    pub name: &'src str,
    pub closing: bool,
    pub self_closing: bool,
    /// Raw attribute text between the tag name and the closing delimiter.
    pub attrs: &'src str,
    /// Offset of `attrs` within the source.
    pub attrs_start: usize,
}

/// One `name` or `name="value"` pair from a tag's attribute text.
#[derive(Debug, PartialEq)]
pub struct RawAttr<'src> {
    pub name: &'src str,
    /// `None` for a bare attribute with no `=`.
    pub value: Option<&'src str>,
    /// Offset of the attribute name within the source.
    pub offset: usize,
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_uppercase()
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_attr_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b':'
}

/// Scan forward from `from` for the next tag delimiter.
///
/// Returns `None` when no further tag exists; text in between is the
/// caller's literal run. The scan advances by position and never re-reads
/// consumed text.
pub fn find_tag(source: &str, from: usize) -> ParseResult<Option<RawTag<'_>>> {
    let bytes = source.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let start = i;
        let mut j = i + 1;
        let closing = j < bytes.len() && bytes[j] == b'/';
        if closing {
            j += 1;
        }
        if j >= bytes.len() || !is_name_start(bytes[j]) {
            // Literal '<', not a tag.
            i += 1;
            continue;
        }
        let name_start = j;
        while j < bytes.len() && is_name_char(bytes[j]) {
            j += 1;
        }
        let name = &source[name_start..j];

        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        // Attribute text runs to the closing '>', honoring quoted values.
        let attrs_start = j;
        let mut quote: Option<u8> = None;
        while j < bytes.len() {
            let c = bytes[j];
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                }
                None => {
                    if c == b'"' || c == b'\'' {
                        quote = Some(c);
                    } else if c == b'>' {
                        break;
                    }
                }
            }
            j += 1;
        }
        if j >= bytes.len() {
            return Err(ParseError::UnterminatedTag { pos: start });
        }

        let mut attrs_end = j;
        let mut self_closing = false;
        if attrs_end > attrs_start && bytes[attrs_end - 1] == b'/' {
            self_closing = true;
            attrs_end -= 1;
        }
        let attrs = source[attrs_start..attrs_end].trim_end();

        return Ok(Some(RawTag {
            start,
            end: j + 1,
            name,
            closing,
            self_closing,
            attrs,
            attrs_start,
        }));
    }

    Ok(None)
}

/// Split a tag's raw attribute text into name/value pairs.
///
/// A bare name carries no value; quoted values accept either quote style.
pub fn scan_attributes<'src>(attrs: &'src str, base: usize) -> ParseResult<Vec<RawAttr<'src>>> {
    let bytes = attrs.as_bytes();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if !is_attr_name_char(bytes[i]) {
            return Err(ParseError::MalformedAttribute {
                pos: base + i,
                found: (bytes[i] as char).to_string(),
            });
        }
        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = &attrs[name_start..i];

        let mut k = i;
        while k < bytes.len() && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if k >= bytes.len() || bytes[k] != b'=' {
            pairs.push(RawAttr {
                name,
                value: None,
                offset: base + name_start,
            });
            continue;
        }
        i = k + 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
            return Err(ParseError::MalformedAttribute {
                pos: base + i.min(bytes.len()),
                found: attrs[i.min(bytes.len())..].chars().take(1).collect(),
            });
        }
        let quote = bytes[i];
        let value_start = i + 1;
        let mut j = value_start;
        while j < bytes.len() && bytes[j] != quote {
            j += 1;
        }
        if j >= bytes.len() {
            return Err(ParseError::UnterminatedAttribute {
                pos: base + value_start - 1,
            });
        }
        pairs.push(RawAttr {
            name,
            value: Some(&attrs[value_start..j]),
            offset: base + name_start,
        });
        i = j + 1;
    }

    Ok(pairs)
}
