//! Text value cleanup: entity decoding and whitespace normalization

/// Longest entity name we try to decode (`&thetasym;` and friends fit)
const MAX_ENTITY_LEN: usize = 10;

/// Decode a text value: entities decoded, whitespace runs collapsed, trimmed
///
/// Returns `None` when nothing but whitespace is left.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw);
    let collapsed = collapse_whitespace(&decoded);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Decode a URL-like value: entities decoded and trimmed
pub(crate) fn clean_url(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Decode HTML entities
///
/// Unknown or unterminated entities are kept verbatim.
pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut output = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        rest = &rest[amp..];

        match decode_entity_at(rest) {
            Some((ch, consumed)) => {
                output.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

/// Decode the entity at the start of `s` (which begins with `&`)
///
/// Returns the character and how many bytes were consumed.
fn decode_entity_at(s: &str) -> Option<(char, usize)> {
    let body = &s[1..];
    let end = body
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|&(_, c)| c == ';')
        .map(|(i, _)| i)?;
    let entity = &body[..end];

    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "middot" => '·',
        "bull" => '•',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code).filter(|&c| c != '\0')?
        }
    };

    Some((ch, end + 2))
}

/// Collapse whitespace runs into single spaces and trim
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(decode_entities("Hello &amp; World"), "Hello & World");
        assert_eq!(
            decode_entities("&lt;b&gt; &quot;x&quot; &apos;y&apos;"),
            "<b> \"x\" 'y'"
        );
        assert_eq!(decode_entities("a&mdash;b&hellip;"), "a—b…");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entities("it&#39;s"), "it's");
        assert_eq!(decode_entities("&#x2F;path&#X41;"), "/pathA");
        assert_eq!(decode_entities("&#128512;"), "😀");
    }

    #[test]
    fn test_unknown_entities_kept() {
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("a &bogus; b"), "a &bogus; b");
        assert_eq!(decode_entities("&#xZZ;"), "&#xZZ;");
        assert_eq!(decode_entities("&#0;"), "&#0;");
        assert_eq!(decode_entities("trailing &"), "trailing &");
        assert_eq!(
            decode_entities("&averyveryverylongname;"),
            "&averyveryverylongname;"
        );
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("  Hello\n\t  &amp;   World  "),
            Some("Hello & World".to_string())
        );
        assert_eq!(clean_text("   \n "), None);
        assert_eq!(clean_text("&nbsp;"), None);
        assert_eq!(clean_text(""), None);
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(
            clean_url(" /img.png?a=1&amp;b=2 "),
            Some("/img.png?a=1&b=2".to_string())
        );
        assert_eq!(clean_url("  "), None);
    }
}
