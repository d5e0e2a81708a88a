//! Character classification for the YAML 1.2/1.3 character sets.

/// Check whether the character is nil (`\0`), the end-of-input padding.
#[inline]
#[must_use]
pub fn is_z(c: char) -> bool {
    c == '\0'
}

/// Check whether the character is a line break in the 1.3-draft set.
///
/// Covers `\n`, `\r`, NEL (U+0085), LS (U+2028) and PS (U+2029). CR+LF is a
/// single logical break and is handled where breaks are consumed.
#[inline]
#[must_use]
pub fn is_any_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

/// Check whether the character is a line break or nil.
#[inline]
#[must_use]
pub fn is_breakz(c: char) -> bool {
    is_any_break(c) || is_z(c)
}

/// Check whether the character is a whitespace (` ` or `\t`).
#[inline]
#[must_use]
pub fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Check whether the character is whitespace, a line break or nil.
#[inline]
#[must_use]
pub fn is_blank_or_breakz(c: char) -> bool {
    is_blank(c) || is_breakz(c)
}

/// Check whether the character is a digit, letter, `_` or `-`.
#[inline]
#[must_use]
pub fn is_alpha(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' | '-')
}

/// Check whether the character is a hexadecimal digit (case insensitive).
#[inline]
#[must_use]
pub fn is_hex(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Convert a hexadecimal digit to its value.
#[inline]
#[must_use]
pub fn as_hex(c: char) -> u32 {
    match c {
        '0'..='9' => (c as u32) - ('0' as u32),
        'a'..='f' => (c as u32) - ('a' as u32) + 10,
        'A'..='F' => (c as u32) - ('A' as u32) + 10,
        _ => unreachable!(),
    }
}

/// Check whether the character is a YAML flow indicator (one of `,[]{}`).
#[inline]
#[must_use]
pub fn is_flow(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

/// Check whether the character is the byte-order-mark code point (U+FEFF).
#[inline]
#[must_use]
pub fn is_bom(c: char) -> bool {
    c == '\u{FEFF}'
}

/// Check whether the character is printable per the YAML character set.
///
/// Printable characters are TAB, the breaks, and everything that is neither a
/// C0/C1 control, a surrogate artifact, nor U+FFFE/U+FFFF.
#[inline]
#[must_use]
pub fn is_printable(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' | '\u{0085}' => true,
        '\u{20}'..='\u{7E}' => true,
        '\u{A0}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' => true,
        '\u{10000}'..='\u{10FFFF}' => true,
        _ => false,
    }
}

/// Check whether the character may appear in an anchor or alias name.
///
/// Anchor names are non-space characters excluding the flow indicators.
#[inline]
#[must_use]
pub fn is_anchor_char(c: char) -> bool {
    is_printable(c) && !is_blank_or_breakz(c) && !is_flow(c) && !is_bom(c)
}

/// Check whether the character is a word character (alphanumeric or `-`).
#[inline]
#[must_use]
pub fn is_word_char(c: char) -> bool {
    is_alpha(c) && c != '_'
}

/// Check whether the character is a valid URI character.
#[inline]
#[must_use]
pub fn is_uri_char(c: char) -> bool {
    is_word_char(c) || "#;/?:@&=+$,_.!~*'()[]%".contains(c)
}

/// Check whether the character is valid in a tag suffix.
///
/// The suffix set is the URI set minus the flow indicators and `!`, which
/// must be `%`-escaped inside a suffix.
#[inline]
#[must_use]
pub fn is_tag_char(c: char) -> bool {
    is_uri_char(c) && !is_flow(c) && c != '!'
}
