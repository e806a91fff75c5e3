/// A link annotation over a byte range of post text.
///
/// Offsets are UTF-8 byte offsets into the text, as the richtext facet
/// lexicon requires; they are not character or grapheme indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFacet {
    pub byte_start: usize,
    pub byte_end: usize,
    pub uri: String,
}

/// Locates `url` in `text`, appending it if absent, and returns the final
/// text with a facet covering the URL.
///
/// - If `url` occurs in `text`, the facet covers its first occurrence and
///   the text is returned unchanged.
/// - Otherwise `url` is appended, preceded by a single space unless `text`
///   is empty or already ends in whitespace.
///
/// # Examples
///
/// ```
/// use feedcast::bsky::build_link_facet;
///
/// let (text, facet) = build_link_facet("Check this out", "https://x.test/a");
/// assert_eq!(text, "Check this out https://x.test/a");
/// assert_eq!(&text[facet.byte_start..facet.byte_end], "https://x.test/a");
/// ```
pub fn build_link_facet(text: &str, url: &str) -> (String, LinkFacet) {
    if let Some(byte_start) = text.find(url) {
        let facet = LinkFacet {
            byte_start,
            byte_end: byte_start + url.len(),
            uri: url.to_string(),
        };
        return (text.to_string(), facet);
    }

    let mut out = String::with_capacity(text.len() + 1 + url.len());
    out.push_str(text);
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }

    let byte_start = out.len();
    out.push_str(url);

    let facet = LinkFacet {
        byte_start,
        byte_end: out.len(),
        uri: url.to_string(),
    };
    (out, facet)
}
