//! Balanced Rust-expression fragment scanning.
//!
//! These scanners work on raw bytes: every delimiter they care about is
//! ASCII, and ASCII bytes never occur inside a multi-byte UTF-8 sequence, so
//! every offset they return is a char boundary.

use crate::ast::Segment;

/// Why a fragment could not be delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentError {
    /// A closer that does not match the innermost open delimiter, usually the
    /// `}` of an enclosing inner template.
    Mismatched { at: usize, found: char, open: usize },
    /// End of input before the fragment closed.
    Unterminated { open: usize },
    /// Delimiter nesting exceeded the allowed depth.
    TooDeep { at: usize },
}

/// Given the offset of an opening `(`, `[` or `{`, return the offset just
/// past its matching closer.
///
/// String literals and char literals are opaque. `limit` bounds the
/// delimiter nesting depth.
pub fn scan_balanced(source: &str, open: usize, limit: usize) -> Result<usize, FragmentError> {
    let bytes = source.as_bytes();
    debug_assert!(matches!(bytes.get(open), Some(b'(' | b'[' | b'{')));

    let mut stack: Vec<(u8, usize)> = vec![(bytes[open], open)];
    let mut i = open + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i).ok_or(FragmentError::Unterminated { open })?;
                continue;
            }
            b'\'' => {
                if let Some(end) = char_literal_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'(' | b'[' | b'{' => {
                if stack.len() >= limit.max(1) {
                    return Err(FragmentError::TooDeep { at: i });
                }
                stack.push((bytes[i], i));
            }
            b')' | b']' | b'}' => {
                let (opener, at) = stack.pop().unwrap_or((bytes[open], open));
                if closer_for(opener) != bytes[i] {
                    return Err(FragmentError::Mismatched {
                        at: i,
                        found: bytes[i] as char,
                        open: at,
                    });
                }
                if stack.is_empty() {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(FragmentError::Unterminated { open })
}

/// A `Simple` expression chain: `&`-prefixes, a leading identifier, and
/// zero or more `.ident`, `::ident`, `&ident`, `(…)` or `[…]` segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub end: usize,
    pub refs: usize,
    pub segments: Vec<Segment>,
}

/// Scan a simple expression chain starting at `start`.
///
/// Returns `Ok(None)` when no identifier follows the optional `&` prefixes.
pub fn scan_chain(source: &str, start: usize, limit: usize) -> Result<Option<Chain>, FragmentError> {
    let bytes = source.as_bytes();
    let mut i = start;

    let mut refs = 0;
    while bytes.get(i) == Some(&b'&') {
        refs += 1;
        i += 1;
    }

    let len = ident_at(bytes, i);
    if len == 0 {
        return Ok(None);
    }
    let mut segments = vec![Segment::Ident(source[i..i + len].to_string())];
    i += len;

    loop {
        match bytes.get(i) {
            Some(b'.') => {
                let len = ident_at(bytes, i + 1);
                if len == 0 {
                    break;
                }
                segments.push(Segment::Field(source[i + 1..i + 1 + len].to_string()));
                i += 1 + len;
            }
            Some(b':') if bytes.get(i + 1) == Some(&b':') => {
                let len = ident_at(bytes, i + 2);
                if len == 0 {
                    break;
                }
                segments.push(Segment::Path(source[i + 2..i + 2 + len].to_string()));
                i += 2 + len;
            }
            Some(b'&') => {
                let len = ident_at(bytes, i + 1);
                if len == 0 {
                    break;
                }
                segments.push(Segment::Borrow(source[i + 1..i + 1 + len].to_string()));
                i += 1 + len;
            }
            Some(b'(') => {
                let end = scan_balanced(source, i, limit)?;
                segments.push(Segment::Call(source[i + 1..end - 1].to_string()));
                i = end;
            }
            Some(b'[') => {
                let end = scan_balanced(source, i, limit)?;
                segments.push(Segment::Index(source[i + 1..end - 1].to_string()));
                i = end;
            }
            _ => break,
        }
    }

    Ok(Some(Chain { end: i, refs, segments }))
}

/// Where a statement head ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadEnd {
    /// Offset of the `{` opening the body
    Block(usize),
    /// Offset of the `@`, unmatched `}` or end of input that cut the head short
    Stopped(usize),
}

/// Scan a statement head (`if` condition, `for` header, `match` subject)
/// up to the `{` that opens its body.
///
/// `(…)` and `[…]` nest, so a `{` inside a closure argument does not end
/// the head; strings are opaque.
pub fn scan_head(source: &str, start: usize) -> HeadEnd {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => {
                    i = end;
                    continue;
                }
                None => return HeadEnd::Stopped(bytes.len()),
            },
            b'\'' => {
                if let Some(end) = char_literal_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'{' if depth == 0 => return HeadEnd::Block(i),
            b'{' => depth += 1,
            b'}' if depth == 0 => return HeadEnd::Stopped(i),
            b'}' => depth -= 1,
            b'@' if depth == 0 => return HeadEnd::Stopped(i),
            _ => {}
        }
        i += 1;
    }

    HeadEnd::Stopped(bytes.len())
}

/// Where a match arm pattern ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternEnd {
    /// Offset of the `=>`
    Arrow(usize),
    /// Offset of the unmatched `}` or end of input reached first
    Stopped(usize),
}

/// Scan a match arm pattern up to its top-level `=>`.
pub fn scan_pattern(source: &str, start: usize) -> PatternEnd {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => {
                    i = end;
                    continue;
                }
                None => return PatternEnd::Stopped(bytes.len()),
            },
            b'\'' => {
                if let Some(end) = char_literal_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'(' | b'[' | b'{' => depth += 1,
            b'}' if depth == 0 => return PatternEnd::Stopped(i),
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => return PatternEnd::Arrow(i),
            _ => {}
        }
        i += 1;
    }

    PatternEnd::Stopped(bytes.len())
}

/// Split `text` at top-level occurrences of `sep`, returning byte ranges
/// relative to `text`. Separators nested in brackets or literals are kept.
pub fn split_top_level(text: &str, sep: u8) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut part_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i).unwrap_or(bytes.len());
                continue;
            }
            b'\'' => {
                if let Some(end) = char_literal_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push((part_start, i));
                part_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push((part_start, bytes.len()));
    parts
}

fn closer_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

fn ident_at(bytes: &[u8], i: usize) -> usize {
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }
    bytes[i..]
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
        .unwrap_or(bytes.len() - i)
}

/// Offset just past the `"…"` literal starting at `i`.
fn string_end(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return Some(j + 1),
            _ => j += 1,
        }
    }
    None
}

/// Offset just past a char literal (`'a'`, `'\n'`, `'\u{1F600}'`, `'é'`)
/// starting at `i`, or `None` when the quote starts a lifetime.
fn char_literal_end(bytes: &[u8], i: usize) -> Option<usize> {
    match bytes.get(i + 1)? {
        b'\\' => {
            // Escapes are short; `\u{10FFFF}` is the longest.
            let window = bytes.len().min(i + 12);
            (i + 3..window).find(|&j| bytes[j] == b'\'').map(|j| j + 1)
        }
        b'\'' => None,
        &first => {
            let width = utf8_width(first);
            (bytes.get(i + 1 + width) == Some(&b'\'')).then_some(i + 2 + width)
        }
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_nested() {
        let src = "(a(b[c]{d}))tail";
        assert_eq!(scan_balanced(src, 0, 16), Ok(12));
    }

    #[test]
    fn test_delimiters_in_strings_are_opaque() {
        let src = r#"(format!(")", x), ')')tail"#;
        assert_eq!(&src[scan_balanced(src, 0, 16).unwrap()..], "tail");
    }

    #[test]
    fn test_lifetime_is_not_a_char_literal() {
        let src = "(x as &'a str)";
        assert_eq!(scan_balanced(src, 0, 16), Ok(src.len()));
    }

    #[test]
    fn test_mismatched_closer() {
        let src = "(a } b";
        assert_eq!(
            scan_balanced(src, 0, 16),
            Err(FragmentError::Mismatched { at: 3, found: '}', open: 0 })
        );
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(scan_balanced("(a (b)", 0, 16), Err(FragmentError::Unterminated { open: 0 }));
        assert_eq!(scan_balanced("(\"abc)", 0, 16), Err(FragmentError::Unterminated { open: 0 }));
    }

    #[test]
    fn test_depth_limit() {
        assert_eq!(scan_balanced("((((x))))", 0, 3), Err(FragmentError::TooDeep { at: 3 }));
        assert_eq!(scan_balanced("((((x))))", 0, 4), Ok(9));
    }

    #[test]
    fn test_chain_segments() {
        let src = "user.name::to_string(a, b)[idx.get(0)]&x rest";
        let chain = scan_chain(src, 0, 16).unwrap().unwrap();
        assert_eq!(&src[..chain.end], "user.name::to_string(a, b)[idx.get(0)]&x");
        assert_eq!(
            chain.segments,
            vec![
                Segment::Ident("user".into()),
                Segment::Field("name".into()),
                Segment::Path("to_string".into()),
                Segment::Call("a, b".into()),
                Segment::Index("idx.get(0)".into()),
                Segment::Borrow("x".into()),
            ]
        );
    }

    #[test]
    fn test_chain_stops_at_sentence_punctuation() {
        let src = "name. Next";
        let chain = scan_chain(src, 0, 16).unwrap().unwrap();
        assert_eq!(chain.end, 4);
    }

    #[test]
    fn test_chain_borrow_prefix() {
        let chain = scan_chain("&&item<", 0, 16).unwrap().unwrap();
        assert_eq!(chain.refs, 2);
        assert_eq!(chain.end, 6);
        assert_eq!(scan_chain("& x", 0, 16), Ok(None));
    }

    #[test]
    fn test_head_skips_nested_braces() {
        let src = " items.iter().any(|x| { x > 1 }) { body }";
        match scan_head(src, 0) {
            HeadEnd::Block(at) => assert_eq!(&src[at..], "{ body }"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_head_stops_at_sigil() {
        assert_eq!(scan_head(" x @y {", 0), HeadEnd::Stopped(3));
        assert_eq!(scan_head(" x", 0), HeadEnd::Stopped(2));
    }

    #[test]
    fn test_pattern_arrow() {
        assert_eq!(scan_pattern("Some(\"=>\") => x", 0), PatternEnd::Arrow(11));
        assert_eq!(scan_pattern(" A }", 0), PatternEnd::Stopped(3));
    }

    #[test]
    fn test_split_top_level() {
        let text = "a: Vec<(u8, u8)>, b: &str,";
        let parts: Vec<&str> = split_top_level(text, b',').iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(parts, vec!["a: Vec<(u8, u8)>", " b: &str", ""]);
    }
}
