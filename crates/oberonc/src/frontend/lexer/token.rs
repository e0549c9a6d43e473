//! Oberon token definitions using logos

use crate::common::Span;
use logos::Logos;
use std::fmt;

/// An Oberon token with its kind and source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Oberon token kinds
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum TokenKind {
    /// `(* ... *)`, possibly nested. Dropped by the scanner.
    #[token("(*", nested_comment)]
    Comment,

    // Keywords
    #[token("ARRAY")]
    Array,
    #[token("BEGIN")]
    Begin,
    #[token("BY")]
    By,
    #[token("CASE")]
    Case,
    #[token("CONST")]
    Const,
    #[token("DIV")]
    Div,
    #[token("DO")]
    Do,
    #[token("ELSE")]
    Else,
    #[token("ELSIF")]
    Elsif,
    #[token("END")]
    End,
    #[token("EXIT")]
    Exit,
    #[token("EXTERNAL")]
    External,
    #[token("FALSE")]
    False,
    #[token("FOR")]
    For,
    #[token("IF")]
    If,
    #[token("IMPORT")]
    Import,
    #[token("IN")]
    In,
    #[token("IS")]
    Is,
    #[token("LOOP")]
    Loop,
    #[token("MOD")]
    Mod,
    #[token("MODULE")]
    Module,
    #[token("NIL")]
    Nil,
    #[token("OF")]
    Of,
    #[token("OR")]
    Or,
    #[token("POINTER")]
    Pointer,
    #[token("PROCEDURE")]
    Procedure,
    #[token("RECORD")]
    Record,
    #[token("REPEAT")]
    Repeat,
    #[token("RETURN")]
    Return,
    #[token("THEN")]
    Then,
    #[token("TO")]
    To,
    #[token("TRUE")]
    True,
    #[token("TYPE")]
    Type,
    #[token("UNTIL")]
    Until,
    #[token("VAR")]
    Var,
    #[token("WHILE")]
    While,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    #[regex(r"[0-9][0-9A-F]*H", |lex| hex_value(lex.slice()).map(|value| value as i64))]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+(E[+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Real(f64),

    #[regex(r"[0-9]+\.[0-9]+D[+-]?[0-9]+", |lex| lex.slice().replace('D', "E").parse::<f64>().ok())]
    LongReal(f64),

    /// Character code, `41X`
    #[regex(r"[0-9][0-9A-F]*X", |lex| hex_value(lex.slice()).and_then(|value| u8::try_from(value).ok()))]
    CharCode(u8),

    #[regex(r#""[^"]*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'[^']*'", |lex| unquote(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token(":=")]
    Becomes,
    #[token("=")]
    Eq,
    #[token("#")]
    Neq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Leq,
    #[token(">")]
    Gt,
    #[token(">=")]
    Geq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Times,
    #[token("/")]
    Slash,
    #[token("&")]
    And,
    #[token("~")]
    Not,
    #[token("^")]
    Caret,

    // Punctuation
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("...")]
    Ellipsis,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("|")]
    Bar,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // Special
    Eof,
}

/// Consume a comment body after the opening `(*`. Fails if the input ends
/// before the matching `*)`.
fn nested_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut index = 0;
    while index + 1 < rest.len() {
        match (rest[index], rest[index + 1]) {
            (b'(', b'*') => {
                depth += 1;
                index += 2;
            }
            (b'*', b')') => {
                depth -= 1;
                index += 2;
                if depth == 0 {
                    lex.bump(index);
                    return true;
                }
            }
            _ => index += 1,
        }
    }
    lex.bump(rest.len());
    false
}

/// Value of a hex literal without its one-letter suffix.
fn hex_value(slice: &str) -> Option<u64> {
    u64::from_str_radix(&slice[..slice.len() - 1], 16).ok()
}

fn unquote(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Comment => "comment",
            TokenKind::Array => "ARRAY",
            TokenKind::Begin => "BEGIN",
            TokenKind::By => "BY",
            TokenKind::Case => "CASE",
            TokenKind::Const => "CONST",
            TokenKind::Div => "DIV",
            TokenKind::Do => "DO",
            TokenKind::Else => "ELSE",
            TokenKind::Elsif => "ELSIF",
            TokenKind::End => "END",
            TokenKind::Exit => "EXIT",
            TokenKind::External => "EXTERNAL",
            TokenKind::False => "FALSE",
            TokenKind::For => "FOR",
            TokenKind::If => "IF",
            TokenKind::Import => "IMPORT",
            TokenKind::In => "IN",
            TokenKind::Is => "IS",
            TokenKind::Loop => "LOOP",
            TokenKind::Mod => "MOD",
            TokenKind::Module => "MODULE",
            TokenKind::Nil => "NIL",
            TokenKind::Of => "OF",
            TokenKind::Or => "OR",
            TokenKind::Pointer => "POINTER",
            TokenKind::Procedure => "PROCEDURE",
            TokenKind::Record => "RECORD",
            TokenKind::Repeat => "REPEAT",
            TokenKind::Return => "RETURN",
            TokenKind::Then => "THEN",
            TokenKind::To => "TO",
            TokenKind::True => "TRUE",
            TokenKind::Type => "TYPE",
            TokenKind::Until => "UNTIL",
            TokenKind::Var => "VAR",
            TokenKind::While => "WHILE",
            TokenKind::Integer(value) => return write!(f, "{}", value),
            TokenKind::Real(value) | TokenKind::LongReal(value) => return write!(f, "{}", value),
            TokenKind::CharCode(value) => return write!(f, "{:X}X", value),
            TokenKind::Str(value) => return write!(f, "\"{}\"", value),
            TokenKind::Ident(name) => return write!(f, "{}", name),
            TokenKind::Becomes => ":=",
            TokenKind::Eq => "=",
            TokenKind::Neq => "#",
            TokenKind::Lt => "<",
            TokenKind::Leq => "<=",
            TokenKind::Gt => ">",
            TokenKind::Geq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Times => "*",
            TokenKind::Slash => "/",
            TokenKind::And => "&",
            TokenKind::Not => "~",
            TokenKind::Caret => "^",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Ellipsis => "...",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Bar => "|",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}
