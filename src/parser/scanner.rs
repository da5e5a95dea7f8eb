use serde::Serialize;

/// Span in source code: a half-open range of byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `offset`
    pub fn point(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }
}

/// How a text run is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Top level or a tag body outside any braces: `{` and `}` are plain text.
    Free,
    /// Inside `{ … }`: balanced braces stay in the text, an unmatched `}` ends the run.
    Braced,
    /// Inline match arm body: tracks `()[]{}` and ends at a top-level `,` or unmatched `}`.
    Arm,
}

/// Character cursor over template source.
///
/// The scanner only knows about positions and the lexical rules of the
/// template language (`@`, `@@`, `@*`, `*@`, component tag starts). All
/// structure is built by the tree builder on top of it.
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor back (or forward) to a known char boundary.
    pub fn reset(&mut self, pos: usize) {
        debug_assert!(self.source.is_char_boundary(pos));
        self.pos = pos;
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.source[start..end]
    }

    pub fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub fn advance_by(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.source.len());
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Unescaped `@`
    pub fn at_sigil(&self) -> bool {
        self.peek() == Some('@') && !self.at_escape()
    }

    /// `@@`, always a literal `@`
    pub fn at_escape(&self) -> bool {
        self.starts_with("@@")
    }

    pub fn at_comment_open(&self) -> bool {
        self.starts_with("@*")
    }

    pub fn at_comment_close(&self) -> bool {
        self.starts_with("*@")
    }

    /// `<` followed by an uppercase letter
    pub fn at_component_open(&self) -> bool {
        self.peek() == Some('<') && self.peek_nth(1).is_some_and(|c| c.is_ascii_uppercase())
    }

    /// `</` followed by an uppercase letter
    pub fn at_component_close(&self) -> bool {
        self.starts_with("</") && self.peek_nth(2).is_some_and(|c| c.is_ascii_uppercase())
    }

    pub fn skip_whitespace(&mut self) -> usize {
        self.consume_while(char::is_whitespace).len()
    }

    /// Skip spaces and tabs only
    pub fn skip_inline_whitespace(&mut self) {
        self.consume_while(|c| c == ' ' || c == '\t');
    }

    pub fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        let len = self
            .rest()
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest().len());
        self.pos += len;
        &self.source[start..self.pos]
    }

    /// `[A-Za-z_][A-Za-z0-9_]*` at the cursor, without consuming it.
    pub fn peek_ident(&self) -> Option<&'a str> {
        let rest = self.rest();
        let len = ident_len(rest);
        if len == 0 { None } else { Some(&rest[..len]) }
    }

    pub fn consume_ident(&mut self) -> Option<&'a str> {
        let ident = self.peek_ident()?;
        self.pos += ident.len();
        Some(ident)
    }

    /// Consume a `@* … *@` comment, returning the content range.
    ///
    /// Comments do not nest: the first `*@` closes. Returns `None` (cursor
    /// unchanged) when the comment is never closed.
    pub fn consume_comment(&mut self) -> Option<Span> {
        debug_assert!(self.at_comment_open());
        let start = self.pos;
        self.pos += 2;
        let content_start = self.pos;
        while !self.at_eof() {
            if self.at_comment_close() {
                let content = Span::new(content_start, self.pos);
                self.pos += 2;
                return Some(content);
            }
            self.advance();
        }
        self.pos = start;
        None
    }

    /// Consume a run of literal text, normalizing `@@` to `@`.
    ///
    /// `state` carries the open delimiters and quoting of the enclosing
    /// region across runs. The run stops at an unescaped `@`, a component
    /// open or close tag, and (depending on `mode`) at a `}` that closes
    /// nothing open in the text or a top-level `,`. Returns `None` when
    /// nothing was consumed.
    pub fn scan_text(&mut self, mode: TextMode, state: &mut TextState) -> Option<(String, Span)> {
        let start = self.pos;
        let mut content = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '@' if self.at_escape() => {
                    content.push('@');
                    self.pos += 2;
                    continue;
                }
                '@' => break,
                '<' if self.at_component_open() || self.at_component_close() => break,
                _ if state.in_string => match ch {
                    '"' | '\n' => state.in_string = false,
                    '\\' => {
                        if let Some(next) = self.peek_nth(1).filter(|&c| c != '@') {
                            content.push(ch);
                            content.push(next);
                            self.pos += ch.len_utf8() + next.len_utf8();
                            continue;
                        }
                    }
                    _ => {}
                },
                _ if mode == TextMode::Free => {}
                '}' if !state.closes(ch) => break,
                '{' => state.open.push('}'),
                '}' => {
                    state.open.pop();
                }
                _ if mode != TextMode::Arm => {}
                '(' => state.open.push(')'),
                '[' => state.open.push(']'),
                ')' | ']' if state.closes(ch) => {
                    state.open.pop();
                }
                ',' if state.at_top_level() => break,
                // Only a quote closed on the same line starts a string.
                '"' if quoted_run_len(self.rest()).is_some() => state.in_string = true,
                _ => {}
            }
            content.push(ch);
            self.pos += ch.len_utf8();
        }

        if self.pos == start {
            None
        } else {
            Some((content, Span::new(start, self.pos)))
        }
    }
}

/// Lexical context of literal text, carried across the runs of one region
/// so that nodes in between (expressions, tags) do not reset it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextState {
    /// Expected closers of the delimiters opened in text, innermost last
    pub open: Vec<char>,
    /// Inside a `"…"` run of an inline match arm
    pub in_string: bool,
}

impl TextState {
    /// Whether `closer` closes the innermost open delimiter
    pub fn closes(&self, closer: char) -> bool {
        self.open.last() == Some(&closer)
    }

    /// Neither inside a delimiter nor a string
    pub fn at_top_level(&self) -> bool {
        self.open.is_empty() && !self.in_string
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte length of the identifier at the start of `s` (0 if none).
pub fn ident_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => return 0,
    }
    chars
        .find(|&(_, c)| !is_ident_continue(c))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Length of a `"…"` run at the start of `s` that closes before the next
/// newline, honoring backslash escapes.
fn quoted_run_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_is_not_a_sigil() {
        let scanner = Scanner::new("@@name");
        assert!(scanner.at_escape());
        assert!(!scanner.at_sigil());
    }

    #[test]
    fn test_text_normalizes_escapes() {
        let mut scanner = Scanner::new("mail@@example.com @user");
        let mut state = TextState::default();
        let (content, span) = scanner.scan_text(TextMode::Free, &mut state).unwrap();
        assert_eq!(content, "mail@example.com ");
        assert_eq!(span, Span::new(0, 18));
        assert!(scanner.at_sigil());
    }

    #[test]
    fn test_triple_at_pairs_left_to_right() {
        let mut scanner = Scanner::new("@@@x");
        let mut state = TextState::default();
        let (content, span) = scanner.scan_text(TextMode::Free, &mut state).unwrap();
        assert_eq!(content, "@");
        assert_eq!(span, Span::new(0, 2));
        assert!(scanner.at_sigil());
    }

    #[test]
    fn test_text_stops_at_component_tags_only() {
        let mut scanner = Scanner::new("<div>a</div><Card/>");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Free, &mut state).unwrap();
        assert_eq!(content, "<div>a</div>");
        assert!(scanner.at_component_open());
    }

    #[test]
    fn test_braced_text_keeps_balanced_braces() {
        let mut scanner = Scanner::new(".a { color: red; } } tail");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Braced, &mut state).unwrap();
        assert_eq!(content, ".a { color: red; } ");
        assert_eq!(scanner.peek(), Some('}'));
        assert!(state.at_top_level());
    }

    #[test]
    fn test_free_text_ignores_braces() {
        let mut scanner = Scanner::new("} {");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Free, &mut state).unwrap();
        assert_eq!(content, "} {");
    }

    #[test]
    fn test_arm_text_stops_at_top_level_comma() {
        let mut scanner = Scanner::new("items(1, 2), B => 0");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "items(1, 2)");
        assert_eq!(scanner.peek(), Some(','));
    }

    #[test]
    fn test_arm_text_skips_quoted_commas() {
        let mut scanner = Scanner::new("\"a, b\", next");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "\"a, b\"");
    }

    #[test]
    fn test_arm_text_stops_at_sigil_inside_quotes() {
        let mut scanner = Scanner::new("<a href=\"/u/@id\">x</a>, next");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "<a href=\"/u/");
        assert!(state.in_string);

        scanner.advance_by(3);
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "\">x</a>");
        assert!(state.at_top_level());
        assert_eq!(scanner.peek(), Some(','));
    }

    #[test]
    fn test_arm_text_folds_escapes_inside_quotes() {
        let mut scanner = Scanner::new("\"mail@@x, y\", next");
        let mut state = TextState::default();
        let (content, span) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "\"mail@x, y\"");
        assert_eq!(span, Span::new(0, 12));
    }

    #[test]
    fn test_arm_text_unclosed_quote_is_plain() {
        let mut scanner = Scanner::new("\"a, b");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "\"a");
        assert!(!state.in_string);
    }

    #[test]
    fn test_arm_text_brace_does_not_close_paren() {
        let mut scanner = Scanner::new("(1, } tail");
        let mut state = TextState::default();
        let (content, _) = scanner.scan_text(TextMode::Arm, &mut state).unwrap();
        assert_eq!(content, "(1, ");
        assert_eq!(scanner.peek(), Some('}'));
        assert_eq!(state.open, [')']);
    }

    #[test]
    fn test_comment_first_close_wins() {
        let mut scanner = Scanner::new("@* a *@ b *@");
        let content = scanner.consume_comment().unwrap();
        assert_eq!(content.slice(scanner.source()), " a ");
        assert_eq!(scanner.rest(), " b *@");
    }

    #[test]
    fn test_unterminated_comment() {
        let mut scanner = Scanner::new("@* never closed");
        assert_eq!(scanner.consume_comment(), None);
        assert_eq!(scanner.pos(), 0);
    }

    #[test]
    fn test_ident() {
        assert_eq!(ident_len("user_1.name"), 6);
        assert_eq!(ident_len("1abc"), 0);
        let mut scanner = Scanner::new("_x9 rest");
        assert_eq!(scanner.consume_ident(), Some("_x9"));
    }
}
