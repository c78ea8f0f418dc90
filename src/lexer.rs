use crate::token::{is_punctuation, Token, TokenKind, KEYWORDS, TWO_CHAR_OPERATORS};

/// Turns script source into tokens. Never fails: characters it does not
/// understand come back as one-character operator tokens.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Lex the whole input, including the trailing `EndOfFile` token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    /// Return the next token without consuming it.
    pub fn peek_token(&mut self) -> Token {
        let saved = (self.pos, self.line, self.column);
        let token = self.next_token();
        (self.pos, self.line, self.column) = saved;
        token
    }

    pub fn has_more_tokens(&self) -> bool {
        self.pos < self.chars.len()
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.peek_at(0) else {
            return Token::new(TokenKind::EndOfFile, "", line, column);
        };

        match ch {
            '\n' => {
                self.advance();
                Token::new(TokenKind::Newline, "\n", line, column)
            }
            '/' if self.peek_at(1) == Some('/') => self.lex_line_comment(line, column),
            '/' if self.peek_at(1) == Some('*') => self.lex_block_comment(line, column),
            '"' => self.lex_string(line, column),
            c if c.is_ascii_digit() => self.lex_number(line, column),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(line, column)
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '@' || c == '$' => {
                self.lex_ident(line, column)
            }
            _ => self.lex_operator(line, column),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r') = self.peek_at(0) {
            self.advance();
        }
    }

    fn lex_line_comment(&mut self, line: usize, column: usize) -> Token {
        self.pos += 2; // skip //
        self.column += 2;
        let mut text = String::new();
        while let Some(ch) = self.peek_at(0) {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        Token::new(TokenKind::Comment, text.trim(), line, column)
    }

    fn lex_block_comment(&mut self, line: usize, column: usize) -> Token {
        self.pos += 2; // skip /*
        self.column += 2;
        let mut text = String::new();
        while let Some(ch) = self.advance() {
            if ch == '*' && self.peek_at(0) == Some('/') {
                self.advance();
                break;
            }
            text.push(ch);
        }
        Token::new(TokenKind::Comment, text.trim(), line, column)
    }

    fn lex_string(&mut self, line: usize, column: usize) -> Token {
        self.advance(); // opening quote
        let mut s = String::new();
        while let Some(ch) = self.advance() {
            match ch {
                '"' => break,
                '\\' => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(c),
                    None => break,
                },
                c => s.push(c),
            }
        }
        Token::new(TokenKind::String, s, line, column)
    }

    /// Digits, at most one decimal point, and an exponent whose sign is only
    /// taken directly after `e`/`E`.
    fn lex_number(&mut self, line: usize, column: usize) -> Token {
        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(ch) = self.peek_at(0) {
            if ch.is_ascii_digit() {
                text.push(ch);
            } else if ch == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                text.push(ch);
            } else if (ch == 'e' || ch == 'E') && !seen_exp && self.exponent_follows() {
                seen_exp = true;
                text.push(ch);
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    self.advance();
                    text.push(sign);
                }
            } else {
                break;
            }
            self.advance();
        }
        Token::new(TokenKind::Number, text, line, column)
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_at(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn lex_ident(&mut self, line: usize, column: usize) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek_at(0) {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '@' || (ch == '$' && text.is_empty()) {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, line, column)
    }

    fn lex_operator(&mut self, line: usize, column: usize) -> Token {
        let Some(first) = self.advance() else {
            return Token::new(TokenKind::EndOfFile, "", line, column);
        };
        if let Some(second) = self.peek_at(0) {
            let pair: String = [first, second].iter().collect();
            if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                self.advance();
                return Token::new(TokenKind::Operator, pair, line, column);
            }
        }
        let kind = if is_punctuation(first) {
            TokenKind::Punctuation
        } else {
            TokenKind::Operator
        };
        Token::new(kind, first.to_string(), line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .filter(|t| !t.is_eof())
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn tok(kind: TokenKind, text: &str) -> (TokenKind, String) {
        (kind, text.to_string())
    }

    #[test]
    fn test_simple_assignment() {
        let tokens = lex("spl0 *= gain;");
        assert_eq!(
            tokens,
            vec![
                tok(TokenKind::Identifier, "spl0"),
                tok(TokenKind::Operator, "*="),
                tok(TokenKind::Identifier, "gain"),
                tok(TokenKind::Punctuation, ";"),
            ]
        );
    }

    #[test]
    fn test_section_marker_is_identifier() {
        let tokens = lex("@init\nx = 1");
        assert_eq!(tokens[0], tok(TokenKind::Identifier, "@init"));
        assert_eq!(tokens[1], tok(TokenKind::Newline, "\n"));
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("if else while loop function iffy");
        assert_eq!(
            tokens,
            vec![
                tok(TokenKind::Keyword, "if"),
                tok(TokenKind::Keyword, "else"),
                tok(TokenKind::Keyword, "while"),
                tok(TokenKind::Keyword, "loop"),
                tok(TokenKind::Keyword, "function"),
                tok(TokenKind::Identifier, "iffy"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("0.25 .5 1e3 2.5E-2 1-x");
        assert_eq!(
            tokens,
            vec![
                tok(TokenKind::Number, "0.25"),
                tok(TokenKind::Number, ".5"),
                tok(TokenKind::Number, "1e3"),
                tok(TokenKind::Number, "2.5E-2"),
                tok(TokenKind::Number, "1"),
                tok(TokenKind::Operator, "-"),
                tok(TokenKind::Identifier, "x"),
            ]
        );
    }

    #[test]
    fn test_single_decimal_point() {
        let tokens = lex("1.2.3");
        assert_eq!(tokens, vec![tok(TokenKind::Number, "1.2"), tok(TokenKind::Number, ".3")]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#""a\n\t\r\\\"\q""#);
        assert_eq!(tokens, vec![tok(TokenKind::String, "a\n\t\r\\\"q")]);
    }

    #[test]
    fn test_two_char_operators_greedy() {
        let tokens = lex("== != <= >= += -= *= /= && || < !");
        let texts: Vec<&str> = tokens.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec!["==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "&&", "||", "<", "!"]
        );
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Operator));
    }

    #[test]
    fn test_line_comment() {
        let tokens = lex("// gain stage\nx");
        assert_eq!(
            tokens,
            vec![
                tok(TokenKind::Comment, "gain stage"),
                tok(TokenKind::Newline, "\n"),
                tok(TokenKind::Identifier, "x"),
            ]
        );
    }

    #[test]
    fn test_block_comment_tracks_lines() {
        let tokens = Lexer::new("/* a\nb */ y").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].text, "y");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_unknown_char_is_not_fatal() {
        let tokens = lex("a # b");
        assert_eq!(tokens[1], tok(TokenKind::Operator, "#"));
        assert_eq!(tokens[2], tok(TokenKind::Identifier, "b"));
    }

    #[test]
    fn test_line_and_column() {
        let tokens = Lexer::new("a\n  bb = 1").tokenize();
        let bb = &tokens[2];
        assert_eq!(bb.text, "bb");
        assert_eq!((bb.line, bb.column), (2, 3));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut lexer = Lexer::new("x y");
        assert_eq!(lexer.peek_token().text, "x");
        assert_eq!(lexer.next_token().text, "x");
        assert_eq!(lexer.next_token().text, "y");
        assert!(!lexer.has_more_tokens());
        assert!(lexer.next_token().is_eof());
    }

    #[test]
    fn test_dollar_constant() {
        let tokens = lex("$pi*2");
        assert_eq!(tokens[0], tok(TokenKind::Identifier, "$pi"));
    }
}
