use super::scanner::ident_len;

/// Reserved words that may follow `@`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    For,
    While,
    Match,
    Continue,
    Break,
    Extends,
    Use,
    Include,
    Render,
    RenderBody,
    ChildContent,
    Section,
    Raw,
    Fn,
}

/// What may come right after the keyword for it to count as one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Follow {
    /// Whitespace, `(` or `{`: `@if(`, `@for x`, `@raw{`
    Head,
    /// Anything: the keyword is complete on its own
    Bare,
    /// `(`, `"` or whitespace: `@include("x")`, `@use "x"`
    Argument,
}

const KEYWORDS: &[(&str, Keyword, Follow)] = &[
    ("if", Keyword::If, Follow::Head),
    ("else", Keyword::Else, Follow::Head),
    ("for", Keyword::For, Follow::Head),
    ("while", Keyword::While, Follow::Head),
    ("match", Keyword::Match, Follow::Head),
    ("continue", Keyword::Continue, Follow::Bare),
    ("break", Keyword::Break, Follow::Bare),
    ("extends", Keyword::Extends, Follow::Bare),
    ("use", Keyword::Use, Follow::Argument),
    ("include", Keyword::Include, Follow::Argument),
    ("render", Keyword::Render, Follow::Argument),
    ("render_body", Keyword::RenderBody, Follow::Bare),
    ("child_content", Keyword::ChildContent, Follow::Bare),
    ("section", Keyword::Section, Follow::Argument),
    ("raw", Keyword::Raw, Follow::Head),
    ("fn", Keyword::Fn, Follow::Head),
];

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw, _)| kw == self)
            .map(|(name, _, _)| *name)
            .unwrap_or("")
    }
}

/// Recognize a keyword at the start of `rest` (the text after `@`).
///
/// The whole identifier must equal the keyword, so `@render_body` is never
/// read as `@render` and `@iffy` stays an expression. Returns the keyword and
/// its byte length.
pub fn recognize(rest: &str) -> Option<(Keyword, usize)> {
    let len = ident_len(rest);
    if len == 0 {
        return None;
    }
    let word = &rest[..len];
    let (_, keyword, follow) = KEYWORDS.iter().find(|(name, _, _)| *name == word)?;

    let next = rest[len..].chars().next();
    let accepted = match follow {
        Follow::Bare => true,
        Follow::Head => next.is_some_and(|c| c.is_whitespace() || c == '(' || c == '{'),
        Follow::Argument => next.is_some_and(|c| c.is_whitespace() || c == '(' || c == '"'),
    };
    accepted.then_some((*keyword, len))
}
