//! Tokenizer for generator scripts.
//!
//! Plain scripts are code from the first character.  Template text starts in
//! text mode: everything up to `<?` becomes a [`Token::Text`], `<?` switches
//! to code and `?>` switches back, yielding a `;`.  `<?=` opens an echo
//! section that is closed by the matching `?>` ([`Token::EchoOpen`] /
//! [`Token::EchoClose`]).

use super::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Template
    Text(String),
    EchoOpen,
    EchoClose,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    // Bitwise / logical
    Bang,
    Tilde,
    Amp,
    AndAnd,
    Pipe,
    OrOr,
    Caret,
    Shl,
    Shr,
    Ushr, // >>>

    // Comparison
    Assign, // =, also equality inside expressions
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Assignment
    Declare, // :=
    PlusAssign,
    MinusAssign,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,

    Unknown(char),
    Eof,
}

/// A token with the 1-based line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Code,
    Echo,
}

pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    /// Line the most recent token started on.
    token_line: usize,
    mode: Mode,
    /// `?>` only ends a section in template text.
    templated: bool,
}

impl Lexer {
    /// Lexer for a plain script.
    pub fn code(src: &str) -> Self {
        Self::with_mode(src, Mode::Code)
    }

    /// Lexer for template text with embedded `<? ?>` sections.
    pub fn template(src: &str) -> Self {
        Self::with_mode(src, Mode::Text)
    }

    fn with_mode(src: &str, mode: Mode) -> Self {
        Lexer {
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            token_line: 1,
            mode,
            templated: mode == Mode::Text,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.line;
                    self.pos += 2;
                    loop {
                        if self.starts_with("*/") {
                            self.pos += 2;
                            break;
                        }
                        if self.advance().is_none() {
                            return Err(ParseError::new(start, "unterminated comment"));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_text(&mut self) -> String {
        let mut s = String::new();
        while self.peek().is_some() && !self.starts_with("<?") {
            if let Some(c) = self.advance() {
                s.push(c);
            }
        }
        s
    }

    fn read_digits(&mut self, s: &mut String, radix: u32) {
        while let Some(c) = self.peek() {
            if c.is_digit(radix) || c == '_' {
                if c != '_' {
                    s.push(c);
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, ParseError> {
        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let mut digits = String::new();
                self.read_digits(&mut digits, radix);
                return i64::from_str_radix(&digits, radix)
                    .or_else(|_| u64::from_str_radix(&digits, radix).map(|n| n as i64))
                    .map(Token::Int)
                    .map_err(|_| self.err(format!("malformed number literal 0{digits}")));
            }
        }

        let mut s = String::new();
        s.push(first);
        self.read_digits(&mut s, 10);
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            s.push('.');
            self.advance();
            self.read_digits(&mut s, 10);
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
        {
            is_float = true;
            s.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.advance();
            }
            self.read_digits(&mut s, 10);
        }

        if is_float {
            s.parse()
                .map(Token::Float)
                .map_err(|_| self.err(format!("malformed number literal {s}")))
        } else {
            s.parse()
                .map(Token::Int)
                .map_err(|_| self.err(format!("integer literal out of range: {s}")))
        }
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let start = self.line;
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::new(start, "unterminated string")),
                Some('"') => return Ok(Token::Str(s)),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(c),
                    None => return Err(ParseError::new(start, "unterminated string")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::Ident(s)
    }

    /// Next token, or `None` when `<?` consumed input without producing one.
    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        if self.mode == Mode::Text {
            self.token_line = self.line;
            if self.peek().is_none() {
                return Ok(Some(Token::Eof));
            }
            if self.starts_with("<?=") {
                self.pos += 3;
                self.mode = Mode::Echo;
                return Ok(Some(Token::EchoOpen));
            }
            if self.starts_with("<?") {
                self.pos += 2;
                self.mode = Mode::Code;
                return Ok(None);
            }
            return Ok(Some(Token::Text(self.read_text())));
        }

        self.skip_trivia()?;
        self.token_line = self.line;
        if self.templated && self.starts_with("?>") {
            self.pos += 2;
            let was = self.mode;
            self.mode = Mode::Text;
            // A closing code section ends its last statement.
            return Ok(Some(if was == Mode::Echo {
                Token::EchoClose
            } else {
                Token::Semicolon
            }));
        }

        let Some(ch) = self.advance() else {
            return Ok(Some(Token::Eof));
        };
        let tok = match ch {
            '0'..='9' => self.read_number(ch)?,
            '"' => self.read_string()?,
            c if c.is_alphabetic() || c == '_' => self.read_ident(c),
            '+' if self.eat('+') => Token::PlusPlus,
            '+' if self.eat('=') => Token::PlusAssign,
            '+' => Token::Plus,
            '-' if self.eat('-') => Token::MinusMinus,
            '-' if self.eat('=') => Token::MinusAssign,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' if self.eat('=') => Token::Ne,
            '!' => Token::Bang,
            '~' => Token::Tilde,
            '^' => Token::Caret,
            '&' if self.eat('&') => Token::AndAnd,
            '&' => Token::Amp,
            '|' if self.eat('|') => Token::OrOr,
            '|' => Token::Pipe,
            '<' if self.eat('<') => Token::Shl,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.starts_with(">>") => {
                self.pos += 2;
                Token::Ushr
            }
            '>' if self.eat('>') => Token::Shr,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '=' if self.eat('=') => Token::EqEq,
            '=' => Token::Assign,
            ':' if self.eat('=') => Token::Declare,
            ':' => Token::Colon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            c => Token::Unknown(c),
        };
        Ok(Some(tok))
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let Some(token) = self.next_token()? else {
                continue;
            };
            let done = token == Token::Eof;
            tokens.push(Spanned {
                token,
                line: self.token_line,
            });
            if done {
                return Ok(tokens);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::code(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn lex_template(src: &str) -> Vec<Token> {
        Lexer::template(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex("42 0x1F 0b101 2.5 1e3"),
            vec![
                Token::Int(42),
                Token::Int(31),
                Token::Int(5),
                Token::Float(2.5),
                Token::Float(1000.0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn index_then_field_is_not_a_float() {
        assert_eq!(
            lex("a[1].b"),
            vec![
                Token::Ident("a".into()),
                Token::LBracket,
                Token::Int(1),
                Token::RBracket,
                Token::Dot,
                Token::Ident("b".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            lex(":= = == != >>> >> >= ++ += && ||"),
            vec![
                Token::Declare,
                Token::Assign,
                Token::EqEq,
                Token::Ne,
                Token::Ushr,
                Token::Shr,
                Token::Ge,
                Token::PlusPlus,
                Token::PlusAssign,
                Token::AndAnd,
                Token::OrOr,
                Token::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex(r#""a\n\"b\"""#),
            vec![Token::Str("a\n\"b\"".into()), Token::Eof]
        );
    }

    #[test]
    fn comments_and_lines() {
        let toks = Lexer::code("a // one\n/* two\n */ b").tokenize().unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].token, Token::Ident("b".into()));
        assert_eq!(toks[1].line, 3);
    }

    #[test]
    fn unterminated_string_reports_start_line() {
        let err = Lexer::code("\n\"abc").tokenize().unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn template_sections() {
        assert_eq!(
            lex_template("x<? a; ?>y<?= b ?>"),
            vec![
                Token::Text("x".into()),
                Token::Ident("a".into()),
                Token::Semicolon,
                Token::Semicolon,
                Token::Text("y".into()),
                Token::EchoOpen,
                Token::Ident("b".into()),
                Token::EchoClose,
                Token::Eof
            ]
        );
    }

    #[test]
    fn template_without_code_is_one_text() {
        assert_eq!(
            lex_template("plain > text"),
            vec![Token::Text("plain > text".into()), Token::Eof]
        );
    }
}
