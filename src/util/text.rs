use std::borrow::Cow;

/// Normalises a feed entry title into single-line post text.
///
/// Feed titles are user-controlled and frequently carry formatting noise from
/// the generator: indentation, embedded newlines, stray control characters.
/// This function:
///
/// - Drops control characters (C0, DEL and C1) other than whitespace
/// - Drops ANSI escape sequences (`\x1b[` ... final byte 0x40-0x7E)
/// - Collapses every run of whitespace (including newlines and tabs) into a
///   single ASCII space
/// - Trims leading and trailing whitespace
///
/// Returns `Cow::Borrowed` when the title is already clean (common case).
///
/// # Examples
///
/// ```
/// use feedcast::util::clean_title;
///
/// assert_eq!(clean_title("  Hello\n   world \t"), "Hello world");
/// assert_eq!(clean_title("\x1b[1mBold\x1b[0m"), "Bold");
/// ```
pub fn clean_title(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();

    let needs_rewrite = trimmed.chars().any(char::is_control)
        || trimmed.contains("  ")
        || trimmed.chars().any(|c| c.is_whitespace() && c != ' ');

    if !needs_rewrite {
        return Cow::Borrowed(trimmed);
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: skip parameter bytes through the final byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for n in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&n) {
                        break;
                    }
                }
            }
            continue;
        }

        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }

        if c.is_control() {
            continue;
        }

        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    Cow::Owned(out)
}
