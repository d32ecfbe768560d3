//! Streaming link-preview metadata extraction
//!
//! [`MetadataScanner`] is a push parser: feed it chunks as they arrive and it
//! keeps only a small rolling buffer for tags that straddle chunk edges. It
//! never fails; broken markup degrades to fewer fields.
//!
//! Fields are taken from three tiers, highest first:
//! 1. Open Graph (`og:title`, `og:image`, ...)
//! 2. Twitter cards (`twitter:title`, ...)
//! 3. Generic markup (`<title>`, `meta name="description"`, `link
//!    rel="image_src"`, the first meaningful `<img>`, `link rel="canonical"`)

mod tag;
mod text;

use crate::fetchers::BodyStream;
use crate::types::PartialMetadata;
use tag::{find_tag_end, parse_tag, Tag, TagEnd};
use text::{clean_text, clean_url};
use tracing::debug;
use url::Url;

/// Cap on collected `<title>` text
const MAX_TITLE_BYTES: usize = 4 * 1024;

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// Tags that end `<title>` text; all but the first only matter when the
/// title is never closed
const TITLE_END_MARKERS: &[&[u8]] = &[
    b"</title",
    b"</head",
    b"<meta",
    b"<link",
    b"<base",
    b"<body",
    b"<script",
    b"<style",
];

/// Whether the scanner wants more input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Keep feeding
    Continue,
    /// Nothing more of interest can follow; stop reading
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Markup,
    Comment,
    Title,
    /// Inside `<script>`/`<style>`, waiting for the closing marker
    RawText(&'static [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Head,
    Body,
}

/// Candidate values of one tier, first occurrence wins
#[derive(Debug, Default)]
struct Fields {
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    site_name: Option<String>,
    og_type: Option<String>,
    url: Option<String>,
}

fn set(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Incremental head-metadata scanner
#[derive(Debug)]
pub struct MetadataScanner {
    buf: Vec<u8>,
    mode: Mode,
    region: Region,
    done: bool,
    title: Vec<u8>,
    title_seen: bool,
    base_href: Option<String>,
    og: Fields,
    twitter: Fields,
    generic: Fields,
}

impl Default for MetadataScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataScanner {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            mode: Mode::Markup,
            region: Region::Head,
            done: false,
            title: Vec::new(),
            title_seen: false,
            base_href: None,
            og: Fields::default(),
            twitter: Fields::default(),
            generic: Fields::default(),
        }
    }

    /// Feed the next chunk of the document
    pub fn feed(&mut self, chunk: &[u8]) -> Scan {
        if !self.done {
            self.buf.extend_from_slice(chunk);
            self.process(false);
        }
        if self.done {
            Scan::Done
        } else {
            Scan::Continue
        }
    }

    /// Flush pending input and resolve the collected fields against `base_url`
    pub fn finish(mut self, base_url: &Url) -> PartialMetadata {
        if !self.done {
            self.process(true);
        }

        set(
            &mut self.generic.title,
            clean_text(&String::from_utf8_lossy(trim_partial_char(&self.title))),
        );

        let base = self
            .base_href
            .as_deref()
            .and_then(|href| base_url.join(href).ok())
            .filter(is_http)
            .unwrap_or_else(|| base_url.clone());

        let Self {
            og,
            twitter,
            generic,
            ..
        } = self;

        PartialMetadata {
            title: og.title.or(twitter.title).or(generic.title),
            description: og
                .description
                .or(twitter.description)
                .or(generic.description),
            image_url: [og.image, twitter.image, generic.image]
                .into_iter()
                .flatten()
                .find_map(|raw| resolve(&base, &raw)),
            site_name: og.site_name.or(generic.site_name),
            og_type: og.og_type,
            canonical_url: [og.url, generic.url]
                .into_iter()
                .flatten()
                .find_map(|raw| resolve(&base, &raw)),
        }
    }

    fn process(&mut self, eof: bool) {
        let mut pos = 0;

        while !self.done && pos < self.buf.len() {
            match self.mode {
                Mode::Markup => {
                    let Some(offset) = self.buf[pos..].iter().position(|&b| b == b'<') else {
                        pos = self.buf.len();
                        break;
                    };
                    pos += offset;

                    let rest = &self.buf[pos..];
                    if rest.starts_with(COMMENT_OPEN) {
                        pos += COMMENT_OPEN.len();
                        self.mode = Mode::Comment;
                        continue;
                    }
                    if !eof && rest.len() < COMMENT_OPEN.len() && COMMENT_OPEN.starts_with(rest) {
                        break;
                    }

                    match find_tag_end(rest, eof) {
                        TagEnd::Incomplete => break,
                        TagEnd::NotATag => pos += 1,
                        TagEnd::Complete { inner_end, next } => {
                            let tag = parse_tag(&rest[1..inner_end]);
                            pos += next;
                            self.handle_tag(tag);
                        }
                    }
                }
                Mode::Comment => match find_bytes(&self.buf[pos..], COMMENT_CLOSE) {
                    Some(offset) => {
                        pos += offset + COMMENT_CLOSE.len();
                        self.mode = Mode::Markup;
                    }
                    None => {
                        pos = keep_tail(pos, self.buf.len(), COMMENT_CLOSE.len(), eof);
                        break;
                    }
                },
                Mode::RawText(marker) => match find_ascii_ci(&self.buf[pos..], marker) {
                    Some(offset) => {
                        pos += offset;
                        self.mode = Mode::Markup;
                    }
                    None => {
                        pos = keep_tail(pos, self.buf.len(), marker.len(), eof);
                        break;
                    }
                },
                Mode::Title => {
                    let (text_len, closed) = title_text_len(&self.buf[pos..], eof);
                    self.push_title(pos, pos + text_len);
                    pos += text_len;
                    if closed || eof {
                        self.mode = Mode::Markup;
                    }
                    if !closed {
                        break;
                    }
                }
            }
        }

        if self.done {
            self.buf.clear();
        } else {
            self.buf.drain(..pos.min(self.buf.len()));
        }
    }

    fn push_title(&mut self, start: usize, end: usize) {
        let room = MAX_TITLE_BYTES.saturating_sub(self.title.len());
        let take = (end - start).min(room);
        self.title.extend_from_slice(&self.buf[start..start + take]);
    }

    fn handle_tag(&mut self, tag: Tag) {
        if tag.closing {
            match tag.name.as_str() {
                "head" => self.end_of_head(),
                "html" => self.done = true,
                _ => {}
            }
            return;
        }

        match (self.region, tag.name.as_str()) {
            (_, "body") => self.end_of_head(),
            (_, "script") => self.mode = Mode::RawText(b"</script"),
            (_, "style") => self.mode = Mode::RawText(b"</style"),
            (_, "img") => self.handle_img(&tag),
            (Region::Head, "meta") => self.handle_meta(&tag),
            (Region::Head, "link") => self.handle_link(&tag),
            (Region::Head, "base") => set(&mut self.base_href, tag.attr("href").and_then(clean_url)),
            (Region::Head, "title") if !self.title_seen => {
                self.title_seen = true;
                self.mode = Mode::Title;
            }
            _ => {}
        }
    }

    /// `</head>` or `<body>`: stop unless we still need an image
    fn end_of_head(&mut self) {
        if self.region == Region::Head {
            self.region = Region::Body;
            if self.has_image() {
                self.done = true;
            }
        }
    }

    fn has_image(&self) -> bool {
        self.og.image.is_some() || self.twitter.image.is_some() || self.generic.image.is_some()
    }

    fn handle_meta(&mut self, tag: &Tag) {
        let Some(content) = tag.attr("content") else {
            return;
        };

        for key_attr in ["property", "name", "itemprop"] {
            let Some(key) = tag.attr(key_attr) else {
                continue;
            };
            if self.apply_meta(&key.trim().to_ascii_lowercase(), content) {
                return;
            }
        }
    }

    /// Record a meta value; returns false if the key is not one we use
    fn apply_meta(&mut self, key: &str, content: &str) -> bool {
        match key {
            "og:title" => set(&mut self.og.title, clean_text(content)),
            "og:description" => set(&mut self.og.description, clean_text(content)),
            "og:image" | "og:image:url" | "og:image:secure_url" => {
                set(&mut self.og.image, clean_url(content))
            }
            "og:site_name" => set(&mut self.og.site_name, clean_text(content)),
            "og:type" => set(&mut self.og.og_type, clean_text(content)),
            "og:url" => set(&mut self.og.url, clean_url(content)),
            "twitter:title" => set(&mut self.twitter.title, clean_text(content)),
            "twitter:description" => set(&mut self.twitter.description, clean_text(content)),
            "twitter:image" | "twitter:image:src" => {
                set(&mut self.twitter.image, clean_url(content))
            }
            "description" => set(&mut self.generic.description, clean_text(content)),
            "application-name" => set(&mut self.generic.site_name, clean_text(content)),
            "image" => set(&mut self.generic.image, clean_url(content)),
            _ => return false,
        }
        true
    }

    fn handle_link(&mut self, tag: &Tag) {
        let (Some(rel), Some(href)) = (tag.attr("rel"), tag.attr("href")) else {
            return;
        };
        for token in rel.split_ascii_whitespace() {
            if token.eq_ignore_ascii_case("canonical") {
                set(&mut self.generic.url, clean_url(href));
            } else if token.eq_ignore_ascii_case("image_src") {
                set(&mut self.generic.image, clean_url(href));
            }
        }
    }

    fn handle_img(&mut self, tag: &Tag) {
        if self.generic.image.is_some() || !is_meaningful_img(tag) {
            return;
        }
        set(&mut self.generic.image, tag.attr("src").and_then(clean_url));
        if self.region == Region::Body && self.generic.image.is_some() {
            self.done = true;
        }
    }
}

/// Skip inline data and tracking pixels
fn is_meaningful_img(tag: &Tag) -> bool {
    let Some(src) = tag.attr("src").map(str::trim) else {
        return false;
    };
    if src.is_empty() || src.as_bytes().get(..5).is_some_and(|p| p.eq_ignore_ascii_case(b"data:")) {
        return false;
    }
    let tiny = |attr: &str| matches!(tag.attr(attr).map(str::trim), Some("0" | "1" | "0px" | "1px"));
    !tiny("width") && !tiny("height")
}

/// Resolve a possibly relative URL to an absolute http/https URL
fn resolve(base: &Url, raw: &str) -> Option<String> {
    base.join(raw)
        .ok()
        .filter(is_http)
        .map(|url| url.to_string())
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Length of title text at the start of `s` and whether a tag ended it
///
/// Title content is raw text, so markup like `<b>` is kept. It normally runs
/// to `</title`; an unterminated title also ends at the next head-level tag
/// so it cannot swallow the metadata that follows it.
fn title_text_len(s: &[u8], eof: bool) -> (usize, bool) {
    for (i, _) in s.iter().enumerate().filter(|&(_, &b)| b == b'<') {
        let rest = &s[i..];
        for marker in TITLE_END_MARKERS {
            if rest.len() >= marker.len() {
                if rest[..marker.len()].eq_ignore_ascii_case(marker) {
                    return (i, true);
                }
            } else if !eof && marker[..rest.len()].eq_ignore_ascii_case(rest) {
                return (i, false);
            }
        }
    }
    (s.len(), false)
}

/// Drop a multi-byte character left incomplete at the end of `bytes`
fn trim_partial_char(bytes: &[u8]) -> &[u8] {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let b = bytes[len - back];
        if b & 0xC0 != 0x80 {
            let need = match b {
                0xF0..=0xFF => 4,
                0xE0..=0xEF => 3,
                0xC0..=0xDF => 2,
                _ => 1,
            };
            return if need > back { &bytes[..len - back] } else { bytes };
        }
    }
    bytes
}

/// Position to resume at when a marker of `marker_len` bytes was not found:
/// everything but a possible marker prefix is consumed
fn keep_tail(pos: usize, len: usize, marker_len: usize, eof: bool) -> usize {
    if eof {
        len
    } else {
        len.saturating_sub(marker_len - 1).max(pos)
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

/// Extract metadata from a bounded body, stopping as soon as the head
/// metadata is complete
///
/// The stream is closed when the scan stops early.
pub async fn extract(body: &mut BodyStream, base_url: &Url) -> PartialMetadata {
    let mut scanner = MetadataScanner::new();

    while let Some(chunk) = body.next_chunk().await {
        if scanner.feed(&chunk) == Scan::Done {
            debug!(bytes_read = body.bytes_read(), "Metadata scan finished early");
            body.close();
            break;
        }
    }

    scanner.finish(base_url)
}

/// Extract metadata from an already-buffered document
pub fn extract_from_bytes(html: &[u8], base_url: &Url) -> PartialMetadata {
    let mut scanner = MetadataScanner::new();
    scanner.feed(html);
    scanner.finish(base_url)
}
