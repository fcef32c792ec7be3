//! Recursive-descent parser: token vector → [`Stmt`] tree.
//!
//! Parsing is a pure function of the source text, which is what makes the
//! per-template statement cache sound.

use std::rc::Rc;

use super::error::ParseError;
use super::expr::{BinOp, Expr, UnaryOp};
use super::function::FunctionDef;
use super::lexer::{Lexer, Spanned, Token};
use super::reference::Reference;
use super::stmt::Stmt;
use super::value::Value;

/// Parse a script whose whole text is code.
pub fn parse(code: &str) -> Result<Stmt, ParseError> {
    Parser::new(Lexer::code(code).tokenize()?).parse_program()
}

/// Parse template text with embedded `<? ?>` and `<?= ?>` sections.
pub fn parse_template(text: &str) -> Result<Stmt, ParseError> {
    Parser::new(Lexer::template(text).tokenize()?).parse_program()
}

type Level = fn(&mut Parser) -> Result<Expr, ParseError>;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line(), message)
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        self.err(format!("expected {wanted}, found {}", describe(self.peek())))
    }

    fn expect(&mut self, expected: &Token, wanted: &str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(wanted))
        }
    }

    fn ident(&mut self, wanted: &str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(wanted)),
        }
    }

    /// Consume `kw` if it comes next, skipping `;`s in front of it.  A `?>`
    /// between `}` and `else` in template text yields such a `;`.
    fn keyword_follows(&mut self, kw: &str) -> bool {
        let mut ahead = self.pos;
        while matches!(self.tokens.get(ahead), Some(s) if s.token == Token::Semicolon) {
            ahead += 1;
        }
        match self.tokens.get(ahead) {
            Some(s) if matches!(&s.token, Token::Ident(name) if name == kw) => {
                self.pos = ahead + 1;
                true
            }
            _ => false,
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_program(mut self) -> Result<Stmt, ParseError> {
        let mut body = Vec::new();
        while self.peek() != &Token::Eof {
            body.push(self.statement()?);
        }
        Ok(Stmt::Block(body))
    }

    /// A `;` is optional right before the end of a code section, and after a
    /// function literal whose body already ended with `;` or `}`.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        let previous = self.pos.checked_sub(1).and_then(|i| self.tokens.get(i));
        if matches!(previous.map(|s| &s.token), Some(Token::Semicolon | Token::RBrace)) {
            return Ok(());
        }
        match self.peek() {
            Token::Eof | Token::Text(_) | Token::EchoOpen | Token::RBrace => Ok(()),
            _ => Err(self.unexpected("';'")),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = match self.peek() {
            Token::Ident(name) if is_keyword(name) => name.clone(),
            Token::Text(text) => {
                let text = text.clone();
                self.advance();
                return Ok(Stmt::Text(text));
            }
            Token::EchoOpen => {
                self.advance();
                let e = self.expr()?;
                self.expect(&Token::EchoClose, "'?>'")?;
                return Ok(Stmt::Print(vec![e]));
            }
            Token::LBrace => return self.block(),
            Token::Semicolon => {
                self.advance();
                return Ok(Stmt::Block(Vec::new()));
            }
            _ => {
                let stmt = self.simple_statement()?;
                self.end_statement()?;
                return Ok(stmt);
            }
        };

        self.advance();
        match keyword.as_str() {
            "if" => {
                let cond = self.paren_expr()?;
                let then = Box::new(self.statement()?);
                let els = if self.keyword_follows("else") {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then, els))
            }
            "while" => {
                let cond = self.paren_expr()?;
                Ok(Stmt::While(cond, Box::new(self.statement()?)))
            }
            "repeat" => {
                let body = Box::new(self.statement()?);
                if !self.keyword_follows("until") {
                    return Err(self.unexpected("'until'"));
                }
                let cond = self.expr()?;
                self.end_statement()?;
                Ok(Stmt::Repeat(body, cond))
            }
            "for" => {
                self.expect(&Token::LParen, "'('")?;
                let init = Box::new(self.simple_statement()?);
                self.expect(&Token::Semicolon, "';'")?;
                let cond = self.expr()?;
                self.expect(&Token::Semicolon, "';'")?;
                let step = Box::new(self.simple_statement()?);
                self.expect(&Token::RParen, "')'")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::For {
                    init,
                    cond,
                    step,
                    body,
                })
            }
            "func" => {
                let name = self.ident("function name")?;
                let def = self.function_def()?;
                Ok(Stmt::FuncDecl(name, def))
            }
            "return" => {
                let value = if matches!(self.peek(), Token::Semicolon | Token::RBrace) {
                    Expr::Literal(Value::default())
                } else {
                    self.expr()?
                };
                self.end_statement()?;
                Ok(Stmt::Return(value))
            }
            "print" | "printf" | "panic" => {
                let mut args = self.call_args()?;
                self.end_statement()?;
                match keyword.as_str() {
                    "print" => Ok(Stmt::Print(args)),
                    "printf" if !args.is_empty() => Ok(Stmt::Printf(args)),
                    "panic" if args.len() == 1 => Ok(Stmt::Panic(args.remove(0))),
                    _ => Err(self.err(format!("wrong number of arguments to {keyword}"))),
                }
            }
            other => Err(self.err(format!("unexpected '{other}'"))),
        }
    }

    fn block(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.peek() == &Token::Eof {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        Ok(Stmt::Block(body))
    }

    /// Assignment, increment or call, without its terminator.
    fn simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let target = self.postfix()?;
        let op = self.peek().clone();
        let compound = |op: BinOp, rhs: Expr, p: &Parser| -> Result<Stmt, ParseError> {
            Ok(Stmt::Compound(p.lvalue(&target)?, op, rhs))
        };
        match op {
            Token::Declare => {
                self.advance();
                let Expr::Ref(r @ Reference::Var(_)) = &target else {
                    return Err(self.err("':=' needs a plain variable name"));
                };
                Ok(Stmt::Assign(r.clone(), self.expr()?))
            }
            Token::Assign => {
                self.advance();
                let r = self.lvalue(&target)?;
                Ok(Stmt::Assign(r, self.expr()?))
            }
            Token::PlusAssign => {
                self.advance();
                let rhs = self.expr()?;
                compound(BinOp::Add, rhs, self)
            }
            Token::MinusAssign => {
                self.advance();
                let rhs = self.expr()?;
                compound(BinOp::Sub, rhs, self)
            }
            Token::PlusPlus => {
                self.advance();
                compound(BinOp::Add, Expr::Literal(Value::Int(1)), self)
            }
            Token::MinusMinus => {
                self.advance();
                compound(BinOp::Sub, Expr::Literal(Value::Int(1)), self)
            }
            _ if matches!(target, Expr::Call(..)) => Ok(Stmt::Expr(target.clone())),
            _ => Err(self.unexpected("assignment or call")),
        }
    }

    fn lvalue(&self, target: &Expr) -> Result<Reference, ParseError> {
        match target {
            Expr::Ref(r) => Ok(r.clone()),
            _ => Err(self.err("cannot assign to this expression")),
        }
    }

    fn paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let e = self.expr()?;
        self.expect(&Token::RParen, "')'")?;
        Ok(e)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "',' or ')'")?;
        }
    }

    /// `(params) body` after `func [name]`.
    fn function_def(&mut self) -> Result<Rc<FunctionDef>, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.ident("parameter name")?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }
        let body = self.statement()?;
        Ok(Rc::new(FunctionDef { params, body }))
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn binary_level(&mut self, next: Level, ops: &[(Token, BinOp)]) -> Result<Expr, ParseError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.eat(tok) {
                    let rhs = next(self)?;
                    lhs = Expr::binary(*op, lhs, rhs);
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_xor,
            &[(Token::OrOr, BinOp::Or), (Token::Pipe, BinOp::BitOr)],
        )
    }

    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Parser::parse_and, &[(Token::Caret, BinOp::BitXor)])
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_equality,
            &[(Token::AndAnd, BinOp::And), (Token::Amp, BinOp::BitAnd)],
        )
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_relational,
            &[
                (Token::Assign, BinOp::Eq),
                (Token::EqEq, BinOp::Eq),
                (Token::Ne, BinOp::Ne),
            ],
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_shift,
            &[
                (Token::Le, BinOp::Le),
                (Token::Lt, BinOp::Lt),
                (Token::Ge, BinOp::Ge),
                (Token::Gt, BinOp::Gt),
            ],
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_additive,
            &[
                (Token::Shl, BinOp::Shl),
                (Token::Shr, BinOp::Shr),
                (Token::Ushr, BinOp::Ushr),
            ],
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_multiplicative,
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Parser::parse_unary,
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::Percent, BinOp::Rem),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        // -<int literal> is itself a literal.
        if let (UnaryOp::Neg, Expr::Literal(Value::Int(n))) = (op, &operand) {
            return Ok(Expr::Literal(Value::Int(n.wrapping_neg())));
        }
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.primary()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    let args = self.call_args()?;
                    e = Expr::Call(Box::new(e), args);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    let parent = self.lvalue(&e).map_err(|_| self.err("only variables can be indexed"))?;
                    e = Expr::Ref(parent.index(index));
                }
                Token::Dot => {
                    self.advance();
                    let key = match self.advance() {
                        Token::Ident(key) => key,
                        other => {
                            return Err(self.err(format!(
                                "expected field name, found {}",
                                describe(&other)
                            )))
                        }
                    };
                    let parent = self.lvalue(&e).map_err(|_| self.err("only variables have fields"))?;
                    e = Expr::Ref(parent.field(key));
                }
                _ => return Ok(e),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "func" => Ok(Expr::Func(self.function_def()?)),
                kw if is_keyword(kw) => Err(self.err(format!("unexpected '{kw}'"))),
                _ => Ok(Expr::var(name)),
            },
            Token::LParen => {
                let e = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(e)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ']'")?;
                    }
                }
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = match self.advance() {
                            Token::Ident(k) | Token::Str(k) => k,
                            other => {
                                return Err(self.err(format!(
                                    "expected map key, found {}",
                                    describe(&other)
                                )))
                            }
                        };
                        self.expect(&Token::Colon, "':'")?;
                        entries.push((key, self.expr()?));
                        if self.eat(&Token::RBrace) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or '}'")?;
                    }
                }
                Ok(Expr::Map(entries))
            }
            other => Err(self.err(format!("expected expression, found {}", describe(&other)))),
        }
    }
}

const KEYWORDS: [&str; 13] = [
    "if", "else", "while", "repeat", "until", "for", "func", "return", "print", "printf",
    "panic", "true", "false",
];

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Int(n) => n.to_string(),
        Token::Float(x) => x.to_string(),
        Token::Str(s) => format!("\"{s}\""),
        Token::Ident(name) => format!("'{name}'"),
        Token::Text(_) => "template text".to_owned(),
        Token::EchoOpen => "'<?='".to_owned(),
        Token::EchoClose => "'?>'".to_owned(),
        Token::Unknown(c) => format!("unexpected character '{c}'"),
        Token::Eof => "end of input".to_owned(),
        other => format!("{other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
