//! Span: a non-owning tokenizer over a `&str` buffer.
//!
//! Tokens are runs of non-whitespace characters, optionally required to
//! be separated by a delimiter string (think CSV cells). The delimiter
//! may be changed between tokens. Line ends terminate a token without
//! requiring the delimiter, so delimiter-separated records can span a
//! line each.
//!
//! The span starts positioned before the first token; each [`Span::next`]
//! advances and returns the token, `None` at the end of the buffer or on
//! a malformed separator.

const INLINE_WS: &[u8] = b" \t\r";

fn is_inline_ws(b: u8) -> bool {
    INLINE_WS.contains(&b)
}

#[derive(Debug, Clone)]
pub struct Span<'a> {
    text: &'a str,
    delim: Option<&'a str>,
    // Current token is text[pos..pos + len]; skips covers the separator
    // consumed after it.
    pos: usize,
    len: usize,
    skips: usize,
}

impl<'a> Span<'a> {
    pub fn new(text: &'a str, delim: Option<&'a str>) -> Self {
        let bytes = text.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() && is_inline_ws(bytes[pos]) {
            pos += 1;
        }
        Self {
            text,
            delim,
            pos,
            len: 0,
            skips: 0,
        }
    }

    /// The current token; empty before the first [`Span::next`] and
    /// after the end of the buffer.
    pub fn token(&self) -> &'a str {
        &self.text[self.pos..self.pos + self.len]
    }

    /// Change the expected inter-token delimiter from here on.
    pub fn set_delim(&mut self, delim: Option<&'a str>) {
        self.delim = delim;
    }

    /// Advance to the next token and return it. `None` once the buffer
    /// is exhausted, or when a configured delimiter is missing between
    /// two tokens on the same line.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let start = self.pos + self.len + self.skips;
        self.pos = start;
        self.len = 0;
        self.skips = 0;
        if start >= bytes.len() {
            return None;
        }

        let delim = self.delim.map(str::as_bytes);
        let at_delim = |i: usize| delim.is_some_and(|d| bytes[i..].starts_with(d));

        let mut end = start;
        while end < bytes.len()
            && !is_inline_ws(bytes[end])
            && bytes[end] != b'\n'
            && !at_delim(end)
        {
            end += 1;
        }
        self.len = end - start;
        // Without a delimiter an empty token means end of input; with
        // one it is a legitimate empty cell.
        if self.len == 0 && delim.is_none() {
            return None;
        }

        let mut sep = end;
        while sep < bytes.len() && is_inline_ws(bytes[sep]) {
            sep += 1;
        }
        if sep < bytes.len() {
            if bytes[sep] == b'\n' {
                sep += 1;
            } else if let Some(d) = delim {
                if !bytes[sep..].starts_with(d) {
                    return None;
                }
                sep += d.len();
                while sep < bytes.len() && (is_inline_ws(bytes[sep]) || bytes[sep] == b'\n') {
                    sep += 1;
                }
            }
        }
        self.skips = sep - start - self.len;
        Some(self.token())
    }

    /// Skip every remaining token on the current line and advance to the
    /// first token of the next one.
    pub fn next_line(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let mut at = self.pos + self.len + self.skips;
        self.len = 0;
        self.skips = 0;
        while at < bytes.len() && bytes[at] != b'\n' {
            at += 1;
        }
        if at < bytes.len() {
            at += 1;
        }
        self.pos = at;
        if at >= bytes.len() {
            return None;
        }
        self.next()
    }

    /// Parse the current token without advancing.
    pub fn parse<T: std::str::FromStr>(&self) -> Option<T> {
        self.token().parse().ok()
    }

    /// Advance to the next token and parse it, for chaining field reads.
    pub fn parse_next<T: std::str::FromStr>(&mut self) -> Option<T> {
        self.next()?.parse().ok()
    }
}
