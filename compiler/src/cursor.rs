use std::ops::{Deref, DerefMut};

use crate::source::{Location, SourceInfo, SourceString};

/// Decode the character at the start of `bytes`. Returns `None` at the end of
/// input and on malformed UTF-8; both end the stream.
fn decode_char(bytes: &[u8]) -> Option<(char, usize)> {
    let width = match *bytes.first()? {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let text = std::str::from_utf8(bytes.get(..width)?).ok()?;
    text.chars().next().map(|c| (c, width))
}

/// A one-character lookahead over the bytes of a source file, with seek.
pub struct RuneStream<'a> {
    info:    &'a SourceInfo,
    input:   &'a [u8],
    current: usize,
    next:    usize,
    value:   Option<char>,
}

impl<'a> RuneStream<'a> {
    pub fn new(info: &'a SourceInfo, input: &'a [u8]) -> RuneStream<'a> {
        let mut stream = RuneStream { info, input, current: 0, next: 0, value: None };
        stream.seek(0);
        stream
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn seek(&mut self, pos: usize) {
        self.current = pos;
        match self.input.get(pos..).and_then(decode_char) {
            Some((c, width)) => {
                self.value = Some(c);
                self.next = pos + width;
            }
            None => {
                self.value = None;
                self.next = pos;
            }
        }
    }

    /// Step past the current character. Does nothing at the end of input.
    pub fn advance(&mut self) {
        self.seek(self.next);
    }

    pub fn peek(&self) -> Option<char> {
        self.value
    }

    pub fn is(&self, c: char) -> bool {
        self.value == Some(c)
    }

    /// ASCII letters only, matching the identifiers schemas accept.
    pub fn is_letter(&self) -> bool {
        self.value.is_some_and(|c| c.is_ascii_alphabetic())
    }

    pub fn is_digit(&self) -> bool {
        self.value.is_some_and(|c| c.is_ascii_digit())
    }

    pub fn is_space(&self) -> bool {
        self.value.is_some_and(char::is_whitespace)
    }

    pub fn is_end(&self) -> bool {
        self.value.is_none()
    }

    pub fn location(&self, begin: usize, end: usize) -> Location {
        self.info.location(begin, end)
    }

    /// The text from `begin` up to the current position.
    pub fn slice(&self, begin: usize) -> SourceString {
        SourceString {
            loc:  self.location(begin, self.current),
            text: String::from_utf8_lossy(&self.input[begin..self.current]).into_owned(),
        }
    }
}

/// How many lists and structs may be open at once.
pub const MAX_DEPTH: usize = 256;

/// A [RuneStream] that remembers the furthest position any alternative
/// reached, which is where a failed parse is reported.
pub struct ParserState<'a> {
    stream:   RuneStream<'a>,
    deepest:  usize,
    depth:    usize,
    too_deep: Option<usize>,
}

impl<'a> ParserState<'a> {
    pub fn new(info: &'a SourceInfo, input: &'a [u8]) -> ParserState<'a> {
        ParserState { stream: RuneStream::new(info, input), deepest: 0, depth: 0, too_deep: None }
    }

    /// Open one level of nesting. Fails at [MAX_DEPTH], remembering the
    /// first position where that happened.
    pub fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            let pos = self.stream.position();
            self.too_deep.get_or_insert(pos);
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Where nesting first went past [MAX_DEPTH], if it did.
    pub fn too_deep(&self) -> Option<Location> {
        self.too_deep.map(|pos| self.stream.location(pos, pos + 1))
    }

    /// Backtrack to `pos` after a failed alternative.
    pub fn recover(&mut self, pos: usize) {
        self.deepest = self.deepest.max(self.stream.position());
        self.stream.seek(pos);
    }

    /// A one-character location at the deepest position reached.
    pub fn deepest(&mut self) -> Location {
        self.deepest = self.deepest.max(self.stream.position());
        self.stream.location(self.deepest, self.deepest + 1)
    }
}

impl<'a> Deref for ParserState<'a> {
    type Target = RuneStream<'a>;

    fn deref(&self) -> &RuneStream<'a> {
        &self.stream
    }
}

impl<'a> DerefMut for ParserState<'a> {
    fn deref_mut(&mut self) -> &mut RuneStream<'a> {
        &mut self.stream
    }
}

/// Try `p`; on failure rewind to where it started. Always succeeds.
pub fn optional<F>(state: &mut ParserState, mut p: F) -> bool
where
    F: FnMut(&mut ParserState) -> bool,
{
    let pos = state.position();
    if !p(state) {
        state.recover(pos);
    }
    true
}

/// Apply `p` until it fails, rewinding the failed attempt. Always succeeds.
pub fn repeat<F>(state: &mut ParserState, mut p: F) -> bool
where
    F: FnMut(&mut ParserState) -> bool,
{
    loop {
        let pos = state.position();
        if !p(state) {
            state.recover(pos);
            return true;
        }
    }
}
