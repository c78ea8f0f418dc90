use serde::{Deserialize, Serialize};

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Number,
    String,
    /// Plain names, `@section` markers and `$constants`.
    Identifier,
    Keyword,
    Operator,
    Punctuation,
    Comment,
    Newline,
    EndOfFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token { kind, text: text.into(), line, column }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.is(TokenKind::Punctuation, text)
    }

    pub fn is_operator(&self, text: &str) -> bool {
        self.is(TokenKind::Operator, text)
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.is(TokenKind::Keyword, text)
    }

    /// Identifiers beginning with `@` open a new section.
    pub fn is_section_marker(&self) -> bool {
        self.kind == TokenKind::Identifier && self.text.starts_with('@')
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }

    /// Comments and newlines carry no grammar meaning.
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Comment | TokenKind::Newline)
    }
}

pub const KEYWORDS: &[&str] = &["if", "else", "while", "function", "loop"];

/// Characters that lex as `Punctuation` rather than `Operator`.
pub fn is_punctuation(ch: char) -> bool {
    matches!(ch, '(' | ')' | '{' | '}' | '[' | ']' | ';' | ',' | ':')
}

/// Two-character operators, matched greedily before single characters.
pub const TWO_CHAR_OPERATORS: &[&str] =
    &["==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "&&", "||"];
