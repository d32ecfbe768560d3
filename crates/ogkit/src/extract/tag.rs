//! Tolerant tag boundary detection and attribute parsing
//!
//! Works on raw bytes. Nothing here fails: broken markup yields a best-effort
//! tag or is skipped as text.

/// Longest tag we are willing to wait for before giving up on finding its end
pub(crate) const MAX_TAG_LEN: usize = 8 * 1024;

/// Where a tag starting at `<` ends
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TagEnd {
    /// Tag interior is `rest[1..inner_end]`; scanning resumes at `next`
    Complete { inner_end: usize, next: usize },
    /// More input is needed to decide
    Incomplete,
    /// The `<` does not open a tag; treat it as text
    NotATag,
}

/// Find the end of the tag that starts at `rest[0] == b'<'`
///
/// Quote-aware: `>` inside an attribute value does not end the tag, except
/// when it is followed by the start of another tag, which is how an unclosed
/// quote shows up in practice. An unquoted `<` ends an unterminated tag.
pub(crate) fn find_tag_end(rest: &[u8], eof: bool) -> TagEnd {
    match rest.get(1) {
        None if eof => return TagEnd::NotATag,
        None => return TagEnd::Incomplete,
        Some(&b) if !(b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?')) => {
            return TagEnd::NotATag
        }
        Some(_) => {}
    }

    // Decisions only ever look at the first MAX_TAG_LEN bytes, so the result
    // does not depend on how much input happens to be buffered
    let window = &rest[..rest.len().min(MAX_TAG_LEN)];
    let window_full = eof || rest.len() >= MAX_TAG_LEN;
    let mut quote: Option<u8> = None;
    let mut after_eq = false;

    for (i, &b) in window.iter().enumerate().skip(1) {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            } else if b == b'>' {
                match starts_new_tag(&window[i + 1..], window_full) {
                    Some(true) => return TagEnd::Complete { inner_end: i, next: i + 1 },
                    Some(false) => {}
                    None => return TagEnd::Incomplete,
                }
            }
            continue;
        }

        match b {
            b'>' => return TagEnd::Complete { inner_end: i, next: i + 1 },
            b'<' => return TagEnd::Complete { inner_end: i, next: i },
            b'"' | b'\'' if after_eq => {
                quote = Some(b);
                after_eq = false;
            }
            b'=' => after_eq = true,
            _ if b.is_ascii_whitespace() => {}
            _ => after_eq = false,
        }
    }

    if !eof && rest.len() < MAX_TAG_LEN {
        return TagEnd::Incomplete;
    }

    // An unclosed quote swallowed the rest: fall back to the first raw '>'
    if let Some(i) = window.iter().position(|&b| b == b'>') {
        return TagEnd::Complete { inner_end: i, next: i + 1 };
    }
    if eof && rest.len() <= MAX_TAG_LEN {
        TagEnd::Complete {
            inner_end: rest.len(),
            next: rest.len(),
        }
    } else {
        TagEnd::NotATag
    }
}

/// Whether `after` (the bytes after a quoted `>`) starts a new tag
///
/// `None` means the answer depends on bytes not yet received.
fn starts_new_tag(after: &[u8], eof: bool) -> Option<bool> {
    let mut iter = after.iter().skip_while(|b| b.is_ascii_whitespace());
    match iter.next() {
        None if eof => Some(false),
        None => None,
        Some(b'<') => match iter.next() {
            None if eof => Some(false),
            None => None,
            Some(&b) => Some(b.is_ascii_alphabetic() || b == b'/'),
        },
        Some(_) => Some(false),
    }
}

/// A parsed tag
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Tag {
    /// Lowercased tag name (`meta`, `!doctype`, ...)
    pub name: String,
    /// True for `</name>`
    pub closing: bool,
    /// Lowercased attribute names with raw (undecoded) values
    pub attrs: Vec<(String, String)>,
}

impl Tag {
    /// First value of an attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse the interior of a tag (between `<` and `>`)
pub(crate) fn parse_tag(inner: &[u8]) -> Tag {
    let mut i = 0;
    let closing = inner.first() == Some(&b'/');
    if closing {
        i = 1;
    }

    let start = i;
    while i < inner.len() && !inner[i].is_ascii_whitespace() && inner[i] != b'/' {
        i += 1;
    }
    // `<br/>` and `</ head>` both still name their tag
    let name = lowercase(&inner[start..i]);

    let mut attrs = Vec::new();
    loop {
        while i < inner.len() && (inner[i].is_ascii_whitespace() || inner[i] == b'/') {
            i += 1;
        }
        if i >= inner.len() {
            break;
        }

        let name_start = i;
        while i < inner.len()
            && !inner[i].is_ascii_whitespace()
            && !matches!(inner[i], b'=' | b'/')
        {
            i += 1;
        }
        if i == name_start {
            // Stray '=' with no attribute name
            i += 1;
            continue;
        }
        let attr_name = lowercase(&inner[name_start..i]);

        while i < inner.len() && inner[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = if inner.get(i) == Some(&b'=') {
            i += 1;
            while i < inner.len() && inner[i].is_ascii_whitespace() {
                i += 1;
            }
            match inner.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let value_start = i + 1;
                    let value_end = inner[value_start..]
                        .iter()
                        .position(|&b| b == q)
                        .map_or(inner.len(), |p| value_start + p);
                    i = (value_end + 1).min(inner.len());
                    &inner[value_start..value_end]
                }
                _ => {
                    let value_start = i;
                    while i < inner.len() && !inner[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    &inner[value_start..i]
                }
            }
        } else {
            &[][..]
        };

        attrs.push((attr_name, String::from_utf8_lossy(value).into_owned()));
    }

    Tag {
        name,
        closing,
        attrs,
    }
}

fn lowercase(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(rest: &str) -> (String, usize) {
        match find_tag_end(rest.as_bytes(), false) {
            TagEnd::Complete { inner_end, next } => (rest[1..inner_end].to_string(), next),
            other => panic!("expected complete tag, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_tag_end() {
        assert_eq!(complete("<title>x"), ("title".to_string(), 7));
        assert_eq!(
            complete(r#"<meta content="a > b" name="x">"#).0,
            r#"meta content="a > b" name="x""#
        );
    }

    #[test]
    fn test_incomplete_tag_waits() {
        assert_eq!(
            find_tag_end(b"<meta property=\"og:ti", false),
            TagEnd::Incomplete
        );
        assert_eq!(find_tag_end(b"<", false), TagEnd::Incomplete);
        assert_eq!(find_tag_end(b"<", true), TagEnd::NotATag);
    }

    #[test]
    fn test_not_a_tag() {
        assert_eq!(find_tag_end(b"< 3 apples", false), TagEnd::NotATag);
        assert_eq!(find_tag_end(b"<=>", false), TagEnd::NotATag);
    }

    #[test]
    fn test_unterminated_tag_ends_at_next_tag() {
        let (inner, next) = complete(r#"<meta property="og:title" content="A"<meta name="x">"#);
        assert_eq!(inner, r#"meta property="og:title" content="A""#);
        assert_eq!(next, inner.len() + 1);
    }

    #[test]
    fn test_unclosed_quote_ends_before_next_tag() {
        let html = "<meta property=\"og:title\" content=\"Hello>\n<meta name=\"description\">";
        let (inner, _) = complete(html);
        assert_eq!(inner, "meta property=\"og:title\" content=\"Hello");

        let tag = parse_tag(inner.as_bytes());
        assert_eq!(tag.attr("content"), Some("Hello"));
    }

    #[test]
    fn test_quoted_gt_waits_for_lookahead() {
        assert_eq!(
            find_tag_end(b"<meta content=\"a>  ", false),
            TagEnd::Incomplete
        );
        assert_eq!(
            find_tag_end(b"<meta content=\"a>", true),
            TagEnd::Complete {
                inner_end: 16,
                next: 17
            }
        );
    }

    #[test]
    fn test_oversized_tag_gives_up() {
        let mut rest = b"<meta content=\"".to_vec();
        rest.extend(std::iter::repeat(b'x').take(MAX_TAG_LEN));
        assert_eq!(find_tag_end(&rest, false), TagEnd::NotATag);
    }

    #[test]
    fn test_quoted_gt_lookahead_stays_in_window() {
        let mut rest = b"<meta content=\"a>".to_vec();
        rest.extend(std::iter::repeat(b' ').take(MAX_TAG_LEN * 2));
        assert_eq!(
            find_tag_end(&rest, false),
            TagEnd::Complete {
                inner_end: 16,
                next: 17
            }
        );
    }

    #[test]
    fn test_parse_tag_attributes() {
        let tag = parse_tag(br#"META Content='Hi there' PROPERTY="og:title" data-x=unquoted async"#);
        assert_eq!(tag.name, "meta");
        assert!(!tag.closing);
        assert_eq!(tag.attr("property"), Some("og:title"));
        assert_eq!(tag.attr("content"), Some("Hi there"));
        assert_eq!(tag.attr("data-x"), Some("unquoted"));
        assert_eq!(tag.attr("async"), Some(""));
        assert_eq!(tag.attr("missing"), None);
    }

    #[test]
    fn test_parse_closing_and_self_closing() {
        let tag = parse_tag(b"/HEAD");
        assert_eq!(tag.name, "head");
        assert!(tag.closing);

        let tag = parse_tag(br#"link rel="canonical" href="/a"/"#);
        assert_eq!(tag.name, "link");
        assert_eq!(tag.attr("href"), Some("/a"));

        let tag = parse_tag(b"br/");
        assert_eq!(tag.name, "br");
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        let tag = parse_tag(br#"meta = ="x" content = "spaced"  name="unterminated"#);
        assert_eq!(tag.attr("content"), Some("spaced"));
        assert_eq!(tag.attr("name"), Some("unterminated"));

        let tag = parse_tag(b"");
        assert_eq!(tag.name, "");
        assert!(tag.attrs.is_empty());
    }
}
