use ghoul_ast::{span_between, Span};
use miette::Diagnostic;
use thiserror::Error;

use crate::token::{keyword_kind, Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(ghoul::lex))]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> LexError {
        LexError {
            message: message.into(),
            span,
        }
    }
}

/// Positional snapshot for speculative parsing. Restoring is a pure
/// position reset, not a transaction.
#[derive(Clone, Debug)]
pub struct LexerCheckpoint {
    offset: usize,
    line: u32,
    column: u32,
    peeked: Option<Token>,
}

/// Hand-written scanner with one token of lookahead.
///
/// The right-shift state is context the parser owns: while a template
/// argument list is being parsed the parser disables it, and `>` comes out
/// as [`TokenKind::TemplateEnd`] instead of combining into `>>`.
pub struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    line: u32,
    column: u32,
    right_shift_enabled: bool,
    peeked: Option<Token>,
    /// Leading-whitespace flag carried over when a cached token is
    /// rescanned after a right-shift toggle.
    rescan_leading_ws: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            src,
            offset: 0,
            line: 1,
            column: 1,
            right_shift_enabled: true,
            peeked: None,
            rescan_leading_ws: false,
        }
    }

    pub fn right_shift_state(&self) -> bool {
        self.right_shift_enabled
    }

    /// Toggling invalidates the peek cache: the cached token may have been
    /// scanned under the old state.
    pub fn set_right_shift_state(&mut self, enabled: bool) {
        if self.right_shift_enabled != enabled {
            self.right_shift_enabled = enabled;
            if let Some(token) = self.peeked.take() {
                self.offset = token.span.offset();
                self.line = token.line;
                // Whitespace before the token was already consumed.
                self.column = 1;
                self.rescan_leading_ws = token.leading_whitespace;
            }
        }
    }

    pub fn create_checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            offset: self.offset,
            line: self.line,
            column: self.column,
            peeked: self.peeked.clone(),
        }
    }

    pub fn return_to_checkpoint(&mut self, checkpoint: LexerCheckpoint) {
        self.offset = checkpoint.offset;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
        self.peeked = checkpoint.peeked;
    }

    pub fn peek(&mut self) -> Result<&Token, LexError> {
        if self.peeked.is_none() {
            let token = self.lex_one_token()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    pub fn peek_kind(&mut self) -> Result<TokenKind, LexError> {
        Ok(self.peek()?.kind)
    }

    pub fn peek_span(&mut self) -> Result<Span, LexError> {
        Ok(self.peek()?.span)
    }

    pub fn peek_line(&mut self) -> Result<u32, LexError> {
        Ok(self.peek()?.line)
    }

    pub fn peek_text(&mut self) -> Result<String, LexError> {
        Ok(self.peek()?.display_text().to_string())
    }

    pub fn peek_leading_whitespace(&mut self) -> Result<bool, LexError> {
        Ok(self.peek()?.leading_whitespace)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        match self.peeked.take() {
            Some(token) => {
                if token.kind == TokenKind::EndOfFile {
                    // EOF stays cached so repeated peeks keep returning it.
                    self.peeked = Some(token.clone());
                }
                Ok(token)
            }
            None => self.lex_one_token(),
        }
    }

    /// Consumes the next token if it has the given kind.
    pub fn consume(&mut self, kind: TokenKind) -> Result<bool, LexError> {
        if self.peek_kind()? == kind {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn current_char(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.src[offset..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        let current = self.current_char()?;
        self.char_at(self.offset + current.len_utf8())
    }

    /// Skips whitespace and comments. Returns whether any whitespace was
    /// consumed (comments do not count as leading whitespace).
    fn skip_trivia(&mut self) -> Result<bool, LexError> {
        let mut saw_whitespace = false;

        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => {
                    saw_whitespace = true;
                    self.advance();
                }
                Some('/') if self.peek_char() == Some('/') => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char() == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.current_char() {
                            Some('*') if self.peek_char() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => self.advance(),
                            // An unterminated block comment consumes the
                            // rest of the file.
                            None => break,
                        }
                    }
                }
                _ => break,
            }
        }

        Ok(saw_whitespace)
    }

    fn eof_token(&self, leading_whitespace: bool) -> Token {
        Token {
            kind: TokenKind::EndOfFile,
            text: String::new(),
            span: span_between(self.src.len(), self.src.len()),
            line: self.line,
            leading_whitespace,
        }
    }

    fn make_token(
        &self,
        kind: TokenKind,
        text: &str,
        start: usize,
        line: u32,
        leading_whitespace: bool,
    ) -> Token {
        Token {
            kind,
            text: text.to_string(),
            span: span_between(start, self.offset),
            line,
            leading_whitespace,
        }
    }

    fn lex_one_token(&mut self) -> Result<Token, LexError> {
        let leading_whitespace = self.skip_trivia()? || std::mem::take(&mut self.rescan_leading_ws);

        let Some(ch) = self.current_char() else {
            return Ok(self.eof_token(leading_whitespace));
        };

        let start = self.offset;
        let line = self.line;

        if ch.is_ascii_alphanumeric() || ch == '_' {
            while let Some(c) = self.current_char() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            let text = &self.src[start..self.offset];
            let kind = if text.starts_with(|c: char| c.is_ascii_digit()) {
                TokenKind::Number
            } else {
                keyword_kind(text)
            };
            return Ok(self.make_token(kind, text, start, line, leading_whitespace));
        }

        match ch {
            '"' => self.lex_string(start, line, leading_whitespace),
            '\'' => self.lex_character(start, line, leading_whitespace),
            _ => self.lex_operator(ch, start, line, leading_whitespace),
        }
    }

    fn unescape(&mut self, context: &str) -> Result<char, LexError> {
        let span = span_between(self.offset, self.offset + 1);
        let Some(escaped) = self.current_char() else {
            return Err(LexError::new("end of file reached unexpectedly", span));
        };

        let result = match escaped {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '\r' | '\n' => {
                return Err(LexError::new(
                    format!("{context} cannot span multiple lines, replace the newline with `\\n`"),
                    span,
                ));
            }
            other => {
                return Err(LexError::new(
                    format!("unknown escape character `\\{other}`"),
                    span,
                ));
            }
        };

        self.advance();
        Ok(result)
    }

    fn lex_string(
        &mut self,
        start: usize,
        line: u32,
        leading_whitespace: bool,
    ) -> Result<Token, LexError> {
        // Skip the opening quote.
        self.advance();

        let mut value = String::new();

        loop {
            match self.current_char() {
                Some('"') => {
                    self.advance();
                    return Ok(self.make_token(
                        TokenKind::StringLit,
                        &value,
                        start,
                        line,
                        leading_whitespace,
                    ));
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.unescape("strings")?);
                }
                Some('\r') | Some('\n') => {
                    return Err(LexError::new(
                        "strings cannot span multiple lines, replace the newline with `\\n`",
                        span_between(self.offset, self.offset + 1),
                    ));
                }
                Some(other) => {
                    value.push(other);
                    self.advance();
                }
                None => {
                    return Err(LexError::new(
                        "unterminated string literal",
                        span_between(start, self.offset),
                    ));
                }
            }
        }
    }

    fn lex_character(
        &mut self,
        start: usize,
        line: u32,
        leading_whitespace: bool,
    ) -> Result<Token, LexError> {
        // Skip the opening quote.
        self.advance();

        let value = match self.current_char() {
            Some('\'') => {
                return Err(LexError::new(
                    "char constants cannot be empty",
                    span_between(start, self.offset + 1),
                ));
            }
            Some('\\') => {
                self.advance();
                self.unescape("chars")?
            }
            Some('\r') | Some('\n') => {
                return Err(LexError::new(
                    "chars cannot span multiple lines, replace the newline with `\\n`",
                    span_between(self.offset, self.offset + 1),
                ));
            }
            Some(other) => {
                self.advance();
                other
            }
            None => {
                return Err(LexError::new(
                    "end of file reached unexpectedly",
                    span_between(start, self.offset),
                ));
            }
        };

        if self.current_char() != Some('\'') {
            return Err(LexError::new(
                "expected an ending single quote",
                span_between(start, self.offset),
            ));
        }
        self.advance();

        let mut buffer = [0u8; 4];
        let text = value.encode_utf8(&mut buffer);
        Ok(self.make_token(TokenKind::Character, text, start, line, leading_whitespace))
    }

    fn lex_operator(
        &mut self,
        ch: char,
        start: usize,
        line: u32,
        leading_whitespace: bool,
    ) -> Result<Token, LexError> {
        // Consumes `count` chars and produces `kind`.
        macro_rules! emit {
            ($kind:expr, $text:expr, $count:expr) => {{
                for _ in 0..$count {
                    self.advance();
                }
                Ok(self.make_token($kind, $text, start, line, leading_whitespace))
            }};
        }

        let next = self.peek_char();

        match ch {
            '{' => emit!(TokenKind::LCurly, "{", 1),
            '}' => emit!(TokenKind::RCurly, "}", 1),
            '[' => emit!(TokenKind::LSquare, "[", 1),
            ']' => emit!(TokenKind::RSquare, "]", 1),
            ';' => emit!(TokenKind::Semicolon, ";", 1),
            ',' => emit!(TokenKind::Comma, ",", 1),
            '(' => emit!(TokenKind::LParen, "(", 1),
            ')' => emit!(TokenKind::RParen, ")", 1),
            '@' => emit!(TokenKind::AtSymbol, "@", 1),
            '`' => emit!(TokenKind::Grave, "`", 1),
            '=' => match next {
                Some('=') => emit!(TokenKind::EqualEquals, "==", 2),
                _ => emit!(TokenKind::Equals, "=", 1),
            },
            '>' => match next {
                Some('=') => emit!(TokenKind::GreaterEquals, ">=", 2),
                Some('>') if self.right_shift_enabled => {
                    if self.char_at(start + 2) == Some('=') {
                        emit!(TokenKind::RightShiftEquals, ">>=", 3)
                    } else {
                        emit!(TokenKind::RightShift, ">>", 2)
                    }
                }
                _ => {
                    if self.right_shift_enabled {
                        emit!(TokenKind::Greater, ">", 1)
                    } else {
                        emit!(TokenKind::TemplateEnd, ">", 1)
                    }
                }
            },
            '<' => match next {
                Some('=') => emit!(TokenKind::LessEquals, "<=", 2),
                Some('<') => {
                    if self.char_at(start + 2) == Some('=') {
                        emit!(TokenKind::LeftShiftEquals, "<<=", 3)
                    } else {
                        emit!(TokenKind::LeftShift, "<<", 2)
                    }
                }
                _ => emit!(TokenKind::Less, "<", 1),
            },
            '!' => match next {
                Some('=') => emit!(TokenKind::NotEquals, "!=", 2),
                _ => emit!(TokenKind::Not, "!", 1),
            },
            '~' => emit!(TokenKind::Tilde, "~", 1),
            '+' => match next {
                Some('=') => emit!(TokenKind::PlusEquals, "+=", 2),
                Some('+') => emit!(TokenKind::PlusPlus, "++", 2),
                _ => emit!(TokenKind::Plus, "+", 1),
            },
            '-' => match next {
                Some('=') => emit!(TokenKind::MinusEquals, "-=", 2),
                Some('-') => emit!(TokenKind::MinusMinus, "--", 2),
                Some('>') => emit!(TokenKind::Arrow, "->", 2),
                _ => emit!(TokenKind::Minus, "-", 1),
            },
            '*' => match next {
                Some('=') => emit!(TokenKind::StarEquals, "*=", 2),
                _ => emit!(TokenKind::Star, "*", 1),
            },
            '/' => match next {
                Some('=') => emit!(TokenKind::SlashEquals, "/=", 2),
                _ => emit!(TokenKind::Slash, "/", 1),
            },
            '%' => match next {
                Some('=') => emit!(TokenKind::PercentEquals, "%=", 2),
                _ => emit!(TokenKind::Percent, "%", 1),
            },
            '&' => match next {
                Some('=') => emit!(TokenKind::AmpersandEquals, "&=", 2),
                Some('&') => emit!(TokenKind::AmpersandAmpersand, "&&", 2),
                _ => emit!(TokenKind::Ampersand, "&", 1),
            },
            '|' => match next {
                Some('=') => emit!(TokenKind::PipeEquals, "|=", 2),
                Some('|') => emit!(TokenKind::PipePipe, "||", 2),
                _ => emit!(TokenKind::Pipe, "|", 1),
            },
            '^' => match next {
                Some('=') => emit!(TokenKind::CaretEquals, "^=", 2),
                Some('^') => {
                    if self.char_at(start + 2) == Some('=') {
                        emit!(TokenKind::CaretCaretEquals, "^^=", 3)
                    } else {
                        emit!(TokenKind::CaretCaret, "^^", 2)
                    }
                }
                _ => emit!(TokenKind::Caret, "^", 1),
            },
            '.' => emit!(TokenKind::Period, ".", 1),
            ':' => match next {
                Some(':') => emit!(TokenKind::ColonColon, "::", 2),
                _ => emit!(TokenKind::Colon, ":", 1),
            },
            '?' => match next {
                Some('?') => emit!(TokenKind::QuestionQuestion, "??", 2),
                Some('.') => emit!(TokenKind::QuestionPeriod, "?.", 2),
                Some('[') => emit!(TokenKind::QuestionLSquare, "?[", 2),
                Some('-') if self.char_at(start + 2) == Some('>') => {
                    emit!(TokenKind::QuestionArrow, "?->", 3)
                }
                _ => emit!(TokenKind::Question, "?", 1),
            },
            '#' => Err(LexError::new(
                "preprocessor commands are not supported",
                span_between(start, start + 1),
            )),
            other => Err(LexError::new(
                format!("`{other}` is not a valid token character"),
                span_between(start, self.offset + other.len_utf8()),
            )),
        }
    }
}
