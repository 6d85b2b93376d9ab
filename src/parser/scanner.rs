/*!
# Scanner

Cursor over raw source bytes producing one token per call.

Valid UTF-8 runs are lexed with a `logos`-derived automaton; every run of
bytes that is not valid UTF-8 becomes a single [`TokenKind::Error`] token so
the parser can resynchronize. Trivia (spaces, tabs, carriage returns and
`;`/`#` comments) is skipped, but the cursor still advances over it, so token
spans are exact.

A comment or string literal interrupted by invalid bytes stays open across
them: the rest of the comment is still trivia, and the rest of the string up
to its closing quote or the end of the line is skipped with it.
*/

use logos::Logos;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Peekable;
use std::ops::Range;
use std::str::Utf8Chunks;

use crate::core::{Position, Span};

/// awasm token types
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[logos(skip r"([ \t\f\r]+|[;#][^\n\x00]*)")]
pub enum TokenKind {
    #[token("\n")]
    Newline,

    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,

    #[regex(r"\.[A-Za-z_][A-Za-z0-9_]*")]
    Directive,
    #[regex(r"[A-Za-z_][A-Za-z0-9_.$]*")]
    Identifier,
    #[regex(r"%[A-Za-z][A-Za-z0-9]*")]
    Register,
    #[regex(r"0[xX][0-9A-Fa-f]+|[0-9]+")]
    Number,
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    StringLiteral,

    /// NUL byte: binary input, the scanner does not resume after it
    #[token("\0")]
    Corrupt,

    /// Malformed input (invalid UTF-8 or a character outside the token set)
    Error,

    Eof,
}

impl TokenKind {
    /// Line or block boundary the parser resynchronizes on.
    pub fn is_boundary(self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::LeftBrace | TokenKind::RightBrace | TokenKind::Eof
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::LeftBracket => write!(f, "`[`"),
            TokenKind::RightBracket => write!(f, "`]`"),
            TokenKind::LeftBrace => write!(f, "`{{`"),
            TokenKind::RightBrace => write!(f, "`}}`"),
            TokenKind::Directive => write!(f, "directive"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Register => write!(f, "register"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::StringLiteral => write!(f, "string"),
            TokenKind::Corrupt => write!(f, "NUL byte"),
            TokenKind::Error => write!(f, "malformed input"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with its own span.
///
/// `text` is empty for `Eof` and for error tokens covering invalid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

impl Token<'_> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Construct left open where a valid run meets invalid bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carry {
    Code,
    Comment,
    String,
}

impl Carry {
    /// Byte length of the prefix of `text` still inside the open construct,
    /// or `None` when it runs to the end of `text`.
    fn close(self, text: &str) -> Option<usize> {
        match self {
            Carry::Code => Some(0),
            Carry::Comment => text.find(['\n', '\0']),
            Carry::String => {
                let bytes = text.as_bytes();
                let mut i = 0;
                while i < bytes.len() {
                    match bytes[i] {
                        b'"' => return Some(i + 1),
                        b'\n' => return Some(i),
                        b'\\' if bytes.get(i + 1) != Some(&b'\n') => i += 2,
                        _ => i += 1,
                    }
                }
                None
            }
        }
    }
}

pub struct Scanner<'src> {
    source: &'src [u8],
    chunks: Peekable<Utf8Chunks<'src>>,
    /// Lexer over the valid part of the current chunk
    lexer: Option<logos::Lexer<'src, TokenKind>>,
    /// Invalid bytes trailing the current chunk, not yet reported
    invalid: &'src [u8],
    carry: Carry,
    /// Absolute offset of the text the lexer runs over
    chunk_base: usize,
    cursor: Position,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            source,
            chunks: source.utf8_chunks().peekable(),
            lexer: None,
            invalid: &[],
            carry: Carry::Code,
            chunk_base: 0,
            cursor: Position::start(),
        }
    }

    /// Position just past the last consumed byte.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn source(&self) -> &'src [u8] {
        self.source
    }

    /// Next token; `Eof` forever once the input is exhausted.
    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            if let Some(lexer) = self.lexer.as_mut() {
                let text = lexer.source();
                match lexer.next() {
                    Some(Ok(kind)) => {
                        let range = lexer.span();
                        return self.lexed(kind, text, range);
                    }
                    Some(Err(())) => {
                        let mut range = lexer.span();
                        if text[range.start..].starts_with('"') {
                            // unterminated string: the error runs to the end of its line
                            let body = range.start + 1;
                            let end = match Carry::String.close(&text[body..]) {
                                Some(len) => body + len,
                                None => {
                                    if !self.invalid.is_empty() {
                                        self.carry = Carry::String;
                                    }
                                    text.len()
                                }
                            };
                            if end > range.end {
                                lexer.bump(end - range.end);
                                range.end = end;
                            }
                        }
                        return self.lexed(TokenKind::Error, text, range);
                    }
                    None => {
                        self.lexer = None;
                        self.finish_chunk(text);
                    }
                }
            }

            if !self.invalid.is_empty() {
                let mut len = std::mem::take(&mut self.invalid).len();
                while let Some(chunk) = self.chunks.next_if(|c| c.valid().is_empty()) {
                    len += chunk.invalid().len();
                }
                let start = self.cursor;
                self.cursor.advance_bytes(len);
                self.chunk_base = self.cursor.offset;
                tracing::trace!(
                    offset = start.offset,
                    len,
                    carry = ?self.carry,
                    "invalid UTF-8"
                );
                return Token {
                    kind: TokenKind::Error,
                    text: "",
                    span: Span::new(start, self.cursor),
                };
            }

            match self.chunks.next() {
                Some(chunk) => {
                    let text = self.resume(chunk.valid());
                    self.lexer = Some(TokenKind::lexer(text));
                    self.invalid = chunk.invalid();
                }
                None => {
                    return Token {
                        kind: TokenKind::Eof,
                        text: "",
                        span: Span::point(self.cursor),
                    };
                }
            }
        }
    }

    /// Builds a token from a lexer match, stepping over the trivia before it.
    fn lexed(&mut self, kind: TokenKind, text: &'src str, range: Range<usize>) -> Token<'src> {
        let consumed = self.cursor.offset - self.chunk_base;
        self.cursor.advance_str(&text[consumed..range.start]);
        let start = self.cursor;
        let lexeme = &text[range];
        self.cursor.advance_str(lexeme);
        Token {
            kind,
            text: lexeme,
            span: Span::new(start, self.cursor),
        }
    }

    /// Steps over trailing trivia of an exhausted chunk.
    ///
    /// Trailing trivia never holds a newline, so a `;` or `#` in it is a
    /// comment cut short by the end of the valid run.
    fn finish_chunk(&mut self, text: &'src str) {
        let consumed = self.cursor.offset - self.chunk_base;
        let tail = &text[consumed..];
        if !self.invalid.is_empty() && tail.contains([';', '#']) {
            self.carry = Carry::Comment;
        }
        self.cursor.advance_str(tail);
        self.chunk_base = self.cursor.offset;
    }

    /// Skips the part of a new valid run that closes a construct left open
    /// before the invalid bytes, returning the text left to lex.
    fn resume(&mut self, text: &'src str) -> &'src str {
        let len = match self.carry.close(text) {
            Some(len) => {
                self.carry = Carry::Code;
                len
            }
            None => text.len(),
        };
        let (open, rest) = text.split_at(len);
        self.cursor.advance_str(open);
        self.chunk_base = self.cursor.offset;
        rest
    }
}

impl<'src> Iterator for Scanner<'src> {
    type Item = Token<'src>;

    /// Yields every token up to, but not including, `Eof`.
    fn next(&mut self) -> Option<Token<'src>> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}
