use std::collections::HashMap;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Recursion budget shared by statements, expressions, unary chains and
/// binary operator runs. Each operator in a run deepens the tree by one.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Recursive-descent parser with one token of lookahead.
///
/// Syntax errors never abort parsing: a missing expected token is treated
/// as present, and an unrecognized primary becomes a literal zero. Every
/// statement list makes progress by at least one token per iteration, so
/// malformed input always terminates with a best-effort tree.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    symbols: Vec<String>,
    symbol_ids: HashMap<String, usize>,
    functions: Vec<String>,
    function_ids: HashMap<String, usize>,
}

impl Parser {
    /// Build a parser over already-lexed tokens. Comments and newlines are
    /// dropped here.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
        if !tokens.last().is_some_and(Token::is_eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::EndOfFile, "", line, column));
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            symbols: Vec::new(),
            symbol_ids: HashMap::new(),
            functions: Vec::new(),
            function_ids: HashMap::new(),
        }
    }

    pub fn from_source(source: &str) -> Self {
        Parser::new(Lexer::new(source).tokenize())
    }

    // ── Helpers ──────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn at_section_boundary(&self) -> bool {
        self.is_at_end() || self.peek().is_section_marker()
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.peek().is_punct(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `text` if present; otherwise carry on as if it had been.
    fn expect_punct(&mut self, text: &str) {
        if !self.eat_punct(text) {
            let found = self.peek();
            log::trace!(
                "expected '{text}' at {}:{}, found '{}'",
                found.line,
                found.column,
                found.text
            );
        }
    }

    fn skip_separators(&mut self) {
        while self.eat_punct(";") {}
    }

    /// Skip one token if the last parse step consumed nothing.
    fn ensure_progress(&mut self, start: usize) {
        if self.pos == start && !self.is_at_end() {
            let skipped = self.advance();
            log::trace!(
                "skipping unexpected '{}' at {}:{}",
                skipped.text,
                skipped.line,
                skipped.column
            );
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            let token = self.peek();
            return Err(ParseError::NestingTooDeep {
                line: token.line,
                column: token.column,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn intern_symbol(&mut self, name: &str) -> usize {
        if let Some(&id) = self.symbol_ids.get(name) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(name.to_string());
        self.symbol_ids.insert(name.to_string(), id);
        id
    }

    fn intern_function(&mut self, name: &str) -> usize {
        if let Some(&id) = self.function_ids.get(name) {
            return id;
        }
        let id = self.functions.len();
        self.functions.push(name.to_string());
        self.function_ids.insert(name.to_string(), id);
        id
    }

    // ── Program ──────────────────────────────────────────────

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() {
                break;
            }
            if self.peek().is_section_marker() {
                items.push(self.parse_section()?);
                continue;
            }
            let start = self.pos;
            items.push(self.parse_statement()?);
            self.ensure_progress(start);
        }
        Ok(Program {
            items,
            symbols: std::mem::take(&mut self.symbols),
            functions: std::mem::take(&mut self.functions),
        })
    }

    fn parse_section(&mut self) -> Result<Node, ParseError> {
        let name = self.advance().text;
        let body = self.parse_statements_until(|_| false)?;
        Ok(Node::Section { name, body })
    }

    /// Statements up to a section boundary or until `stop` matches.
    fn parse_statements_until(&mut self, stop: fn(&Token) -> bool) -> Result<Vec<Node>, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.at_section_boundary() || stop(self.peek()) {
                break;
            }
            let start = self.pos;
            body.push(self.parse_statement()?);
            self.ensure_progress(start);
        }
        Ok(body)
    }

    // ── Statements ──────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let token = self.peek();
        let node = if token.is_keyword("if") {
            self.parse_if()
        } else if token.is_keyword("while") {
            self.parse_while()
        } else if token.is_punct("{") {
            self.parse_braced_block()
        } else {
            self.parse_expression()
        };
        self.leave();
        node
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        self.advance(); // if
        self.expect_punct("(");
        let condition = self.parse_expression()?;
        self.expect_punct(")");
        let then_branch = self.parse_statement()?;
        // `if (c) a; else b;`
        if self.peek().is_punct(";") && self.peek_next().is_keyword("else") {
            self.advance();
        }
        let else_branch = if self.peek().is_keyword("else") {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Node::IfStatement {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Node, ParseError> {
        self.advance(); // while
        self.expect_punct("(");
        let condition = self.parse_expression()?;
        self.expect_punct(")");
        let body = self.parse_statement()?;
        Ok(Node::WhileLoop {
            condition: Box::new(condition),
            body: Box::new(body),
        })
    }

    fn parse_braced_block(&mut self) -> Result<Node, ParseError> {
        self.advance(); // {
        let body = self.parse_statements_until(|t| t.is_punct("}"))?;
        self.expect_punct("}");
        Ok(Node::Block(body))
    }

    // ── Expressions ─────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let node = self.parse_assignment();
        self.leave();
        node
    }

    fn parse_assignment(&mut self) -> Result<Node, ParseError> {
        let target = self.parse_conditional()?;
        let op = match self.peek().kind {
            TokenKind::Operator => AssignOp::from_symbol(&self.peek().text),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };
        self.advance();
        let value = self.parse_expression()?;
        Ok(Node::Assignment {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// `cond ? then : else`, with the else arm optional.
    fn parse_conditional(&mut self) -> Result<Node, ParseError> {
        let condition = self.parse_binary()?;
        if !self.peek().is_operator("?") {
            return Ok(condition);
        }
        self.advance();
        let then_branch = self.parse_expression()?;
        let else_branch = if self.eat_punct(":") {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Node::IfStatement {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    /// All binary operators share one left-associative level:
    /// `a + b * c` is `(a + b) * c`.
    fn parse_binary(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary()?;
        let mut levels = 0;
        let result = loop {
            let op = match self.peek().kind {
                TokenKind::Operator => BinaryOp::from_symbol(&self.peek().text),
                _ => None,
            };
            let Some(op) = op else {
                break Ok(lhs);
            };
            if let Err(e) = self.enter() {
                break Err(e);
            }
            levels += 1;
            self.advance();
            let rhs = match self.parse_unary() {
                Ok(rhs) => rhs,
                Err(e) => break Err(e),
            };
            lhs = Node::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        };
        self.depth -= levels;
        result
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Operator => UnaryOp::from_symbol(&self.peek().text),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_primary();
        };
        self.enter()?;
        self.advance();
        let operand = self.parse_unary();
        self.leave();
        Ok(Node::UnaryOp {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Node::Number(token.text.parse().unwrap_or(0.0)))
            }
            TokenKind::String => {
                self.advance();
                Ok(Node::String(token.text))
            }
            TokenKind::Identifier if !token.is_section_marker() => {
                self.advance();
                self.parse_identifier(token.text)
            }
            TokenKind::Keyword if token.text == "if" || token.text == "while" => {
                self.parse_statement()
            }
            TokenKind::Punctuation if token.text == "(" => {
                self.advance();
                self.parse_parenthesized()
            }
            _ => {
                log::trace!(
                    "no expression at {}:{} ('{}'), using 0",
                    token.line,
                    token.column,
                    token.text
                );
                Ok(Node::Number(0.0))
            }
        }
    }

    fn parse_identifier(&mut self, name: String) -> Result<Node, ParseError> {
        if self.eat_punct("(") {
            let mut args = Vec::new();
            loop {
                if self.peek().is_punct(")") || self.at_section_boundary() {
                    break;
                }
                let start = self.pos;
                args.push(self.parse_expression()?);
                self.eat_punct(",");
                self.ensure_progress(start);
            }
            self.expect_punct(")");
            let function = self.intern_function(&name);
            return Ok(Node::FunctionCall { name, function, args });
        }

        if self.eat_punct("[") {
            let index = self.parse_expression()?;
            self.expect_punct("]");
            return Ok(Node::ArrayAccess {
                name,
                index: Box::new(index),
            });
        }

        if let Some(value) = constant(&name) {
            return Ok(Node::Number(value));
        }
        Ok(Node::Variable(self.classify(name)))
    }

    /// `( expr )`, or `( stmt; stmt; ... )` which becomes a block.
    fn parse_parenthesized(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_statement()?;
        if !self.peek().is_punct(";") {
            self.expect_punct(")");
            return Ok(first);
        }
        let mut body = vec![first];
        body.extend(self.parse_statements_until(|t| t.is_punct(")"))?);
        self.expect_punct(")");
        Ok(Node::Block(body))
    }

    fn classify(&mut self, name: String) -> Var {
        match name.as_str() {
            "spl0" => return Var::Spl0,
            "spl1" => return Var::Spl1,
            "srate" => return Var::Srate,
            "tempo" => return Var::Tempo,
            "beat_position" => return Var::BeatPosition,
            "play_state" => return Var::PlayState,
            "ts_num" => return Var::TsNum,
            "ts_denom" => return Var::TsDenom,
            _ => {}
        }
        if let Some(index) = slider_index(&name) {
            return Var::Slider(index);
        }
        let symbol = self.intern_symbol(&name);
        Var::Named { name, symbol }
    }
}

/// Zero-based slot for `slider1`..`slider64`.
fn slider_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("slider")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = digits.parse().ok()?;
    (1..=crate::params::MAX_PARAMETERS)
        .contains(&number)
        .then(|| number - 1)
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "$pi" => Some(std::f64::consts::PI),
        "$e" => Some(std::f64::consts::E),
        "$phi" => Some(1.618_033_988_749_895),
        _ => None,
    }
}
