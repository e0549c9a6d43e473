//! Oberon lexer implementation using logos

use super::token::{Token, TokenKind};
use crate::common::{CompileError, CompileResult, Span};
use logos::Logos;

/// Lexer for Oberon source code
pub struct OberonLexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    /// Buffer for peeked tokens
    peeked: Vec<Token>,
    at_eof: bool,
}

impl<'a> OberonLexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            peeked: Vec::new(),
            at_eof: false,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> CompileResult<Token> {
        if !self.peeked.is_empty() {
            return Ok(self.peeked.remove(0));
        }
        self.scan_token()
    }

    /// Scan a new token from source, dropping comments
    fn scan_token(&mut self) -> CompileResult<Token> {
        if self.at_eof {
            let len = self.inner.source().len();
            return Ok(Token::new(TokenKind::Eof, Span::new(len, len)));
        }

        loop {
            match self.inner.next() {
                Some(Ok(TokenKind::Comment)) => {}
                Some(Ok(kind)) => {
                    let span = self.inner.span();
                    return Ok(Token::new(kind, Span::new(span.start, span.end)));
                }
                Some(Err(())) => {
                    let span = self.inner.span();
                    return Err(CompileError::lexer(
                        Self::describe_error(self.inner.slice()),
                        Span::new(span.start, span.end),
                    ));
                }
                None => {
                    self.at_eof = true;
                    let len = self.inner.source().len();
                    return Ok(Token::new(TokenKind::Eof, Span::new(len, len)));
                }
            }
        }
    }

    fn describe_error(slice: &str) -> String {
        if slice.starts_with("(*") {
            "comment not terminated.".to_string()
        } else if slice.starts_with(|c: char| c.is_ascii_digit()) {
            format!("invalid number '{}'", slice)
        } else {
            format!("unexpected character '{}'", slice)
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek(&mut self) -> CompileResult<&Token> {
        self.peek_at(0)
    }

    /// Peek at the token at offset (0 = next, 1 = after next, etc.)
    pub fn peek_at(&mut self, offset: usize) -> CompileResult<&Token> {
        while self.peeked.len() <= offset {
            let token = self.scan_token()?;
            self.peeked.push(token);
        }
        Ok(&self.peeked[offset])
    }

    /// Check if the next token matches the expected kind
    pub fn check(&mut self, expected: &TokenKind) -> CompileResult<bool> {
        Ok(std::mem::discriminant(&self.peek()?.kind) == std::mem::discriminant(expected))
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize_all(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        OberonLexer::new(source)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let mut lexer = OberonLexer::new("MODULE BEGIN END ELSIF EXTERNAL");

        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Module));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Begin));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::End));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Elsif));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::External));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Eof));
    }

    #[test]
    fn test_identifiers_are_case_sensitive() {
        let mut lexer = OberonLexer::new("begin Begin x_1");

        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(s) if s == "begin"));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(s) if s == "Begin"));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(s) if s == "x_1"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 0FFH 41X 1.5 2.0E3 1.0D2"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(255),
                TokenKind::CharCode(0x41),
                TokenKind::Real(1.5),
                TokenKind::Real(2000.0),
                TokenKind::LongReal(100.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_real() {
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::Integer(1), TokenKind::DotDot, TokenKind::Integer(5), TokenKind::Eof]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds("\"hello\" 'a' \"\""),
            vec![
                TokenKind::Str("hello".to_string()),
                TokenKind::Str("a".to_string()),
                TokenKind::Str(String::new()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds(":= <= >= # .. ... ^ ~ &"),
            vec![
                TokenKind::Becomes,
                TokenKind::Leq,
                TokenKind::Geq,
                TokenKind::Neq,
                TokenKind::DotDot,
                TokenKind::Ellipsis,
                TokenKind::Caret,
                TokenKind::Not,
                TokenKind::And,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_comments() {
        assert_eq!(
            kinds("a (* outer (* inner *) still outer *) b"),
            vec![TokenKind::Ident("a".to_string()), TokenKind::Ident("b".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let mut lexer = OberonLexer::new("x (* (* *)");
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(_)));
        let error = lexer.next_token().unwrap_err();
        assert!(error.to_string().contains("comment not terminated."));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = OberonLexer::new("a ! b");
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(_)));
        let error = lexer.next_token().unwrap_err();
        assert!(error.to_string().contains("unexpected character '!'"));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(s) if s == "b"));
    }

    #[test]
    fn test_peek() {
        let mut lexer = OberonLexer::new("x := 1");
        assert!(lexer.check(&TokenKind::Ident(String::new())).unwrap());
        assert!(matches!(lexer.peek_at(1).unwrap().kind, TokenKind::Becomes));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Ident(_)));
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Becomes));
    }
}
