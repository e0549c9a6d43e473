//! Oberon recursive descent parser
//!
//! The parser owns the [`Analyzer`] and drives it with one hook call per
//! production. Syntax errors are logged and the parser resynchronizes on a
//! follow token, so one run reports as many problems as possible.

use std::mem::discriminant;

use super::lexer::{OberonLexer, Token, TokenKind};
use crate::ast::{
    BinaryOp, Block, DeclId, Expr, Ident, IdentDef, Import, Module, QualIdent, Selector, SelectorKind, Statement,
    UnaryOp,
};
use crate::common::{CompileError, Span};
use crate::sema::{int_type, Analyzer};
use crate::types::TypeId;

/// Tokens that may follow an expression.
const EXPRESSION_FOLLOW: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Else,
    TokenKind::Elsif,
    TokenKind::To,
    TokenKind::Then,
    TokenKind::Until,
    TokenKind::By,
    TokenKind::Do,
    TokenKind::Of,
    TokenKind::RParen,
    TokenKind::RBracket,
    TokenKind::RBrace,
    TokenKind::Comma,
    TokenKind::Colon,
    TokenKind::DotDot,
    TokenKind::Bar,
    TokenKind::Semicolon,
];

/// Tokens that close a statement sequence.
const SEQUENCE_END: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Elsif,
    TokenKind::Else,
    TokenKind::Until,
    TokenKind::Bar,
    TokenKind::Eof,
];

/// Tokens that may follow a type.
const TYPE_FOLLOW: &[TokenKind] = &[TokenKind::Semicolon, TokenKind::RParen, TokenKind::End];

pub struct Parser<'a> {
    lexer: OberonLexer<'a>,
    analyzer: Analyzer<'a>,
    /// Span of the last consumed token
    previous: Span,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, analyzer: Analyzer<'a>) -> Self {
        Self {
            lexer: OberonLexer::new(source),
            analyzer,
            previous: Span::default(),
        }
    }

    pub fn into_analyzer(self) -> Analyzer<'a> {
        self.analyzer
    }

    /// Parse a complete module. Returns `None` if not even the module
    /// header could be read.
    pub fn parse_module(&mut self) -> Option<Module> {
        let start = self.peek().span;
        if !self.expect(&TokenKind::Module) {
            self.resync(&[TokenKind::Eof]);
            return None;
        }
        let Some(ident) = self.ident() else {
            self.resync(&[TokenKind::Eof]);
            return None;
        };
        self.check_identifier(&ident.name, ident.span);
        let mut module = self.analyzer.on_module_start(ident);
        if !self.expect(&TokenKind::Semicolon) {
            self.resync(&[
                TokenKind::Import,
                TokenKind::Const,
                TokenKind::Type,
                TokenKind::Var,
                TokenKind::Procedure,
                TokenKind::Begin,
                TokenKind::End,
            ]);
        }
        if self.check(&TokenKind::Import) {
            self.import_list(&mut module.imports);
        }
        self.declarations(&mut module.block);
        if self.accept(&TokenKind::Begin) {
            module.block.body = self.statement_sequence();
        }
        if !self.expect(&TokenKind::End) {
            self.resync(&[TokenKind::Eof]);
            return Some(module);
        }
        if let Some(ident) = self.ident() {
            self.expect(&TokenKind::Dot);
            self.analyzer.on_module_end(&module, &ident);
        }
        module.span = start.merge(self.previous);
        Some(module)
    }

    // ==================== Token helpers ====================

    fn report(&mut self, error: CompileError) {
        match error {
            CompileError::Lexer { message, span } => {
                self.analyzer.logger_mut().error(span, message);
            }
            other => {
                let span = self.previous;
                self.analyzer.logger_mut().error(span, other.to_string());
            }
        }
    }

    /// Next token without consuming it. Lexer errors are logged and the
    /// offending input skipped.
    fn peek(&mut self) -> Token {
        loop {
            match self.lexer.peek().cloned() {
                Ok(token) => return token,
                Err(error) => self.report(error),
            }
        }
    }

    fn next(&mut self) -> Token {
        loop {
            match self.lexer.next_token() {
                Ok(token) => {
                    self.previous = token.span;
                    return token;
                }
                Err(error) => self.report(error),
            }
        }
    }

    fn check(&mut self, expected: &TokenKind) -> bool {
        discriminant(&self.peek().kind) == discriminant(expected)
    }

    fn check_any(&mut self, expected: &[TokenKind]) -> bool {
        let kind = self.peek().kind;
        expected.iter().any(|expected| discriminant(&kind) == discriminant(expected))
    }

    fn accept(&mut self, expected: &TokenKind) -> bool {
        if self.check(expected) {
            self.next();
            true
        } else {
            false
        }
    }

    /// Consume the expected token or log an error. The unexpected token
    /// is left in place.
    fn expect(&mut self, expected: &TokenKind) -> bool {
        if self.accept(expected) {
            return true;
        }
        let found = self.peek();
        self.error_expected(&describe(expected), &found);
        false
    }

    fn error_expected(&mut self, expected: &str, found: &Token) {
        let message = format!("{} expected, found {}.", expected, found.kind);
        self.error(found.span, message);
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.analyzer.logger_mut().error(span, message);
    }

    fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.analyzer.logger_mut().warning(span, message);
    }

    /// Skip tokens until one of `follow` or the end of input.
    fn resync(&mut self, follow: &[TokenKind]) {
        while !self.check(&TokenKind::Eof) && !self.check_any(follow) {
            self.next();
        }
    }

    /// Report an unexpected token unless the next one is in `follow`.
    fn expect_one_of(&mut self, follow: &[TokenKind]) {
        if !self.check_any(follow) {
            let token = self.peek();
            self.error(token.span, format!("unexpected token: {}.", token.kind));
            self.resync(follow);
        }
    }

    // ==================== Identifiers ====================

    fn ident(&mut self) -> Option<Ident> {
        let token = self.peek();
        if let TokenKind::Ident(name) = token.kind {
            self.next();
            return Some(Ident::new(name, token.span));
        }
        self.error_expected("identifier", &token);
        None
    }

    /// `[ident "."] ident`. The prefix is a module only if it does not name
    /// anything in scope, so `r.f` stays a field access.
    fn qualident(&mut self) -> Option<QualIdent> {
        let first = self.ident()?;
        if !self.analyzer.is_defined(&first.name) && self.accept(&TokenKind::Dot) {
            if let Some(name) = self.ident() {
                let span = first.span.merge(name.span);
                return Some(QualIdent::qualified(first.name, name.name, span));
            }
        }
        Some(QualIdent::new(first.name, first.span))
    }

    fn identdef(&mut self) -> Option<IdentDef> {
        let ident = self.ident()?;
        self.check_identifier(&ident.name, ident.span);
        let exported = self.accept(&TokenKind::Times);
        let span = if exported { ident.span.merge(self.previous) } else { ident.span };
        Some(IdentDef::new(ident.name, exported, span))
    }

    fn check_identifier(&mut self, name: &str, span: Span) {
        if name.contains('_') {
            self.error(span, format!("illegal identifier: {}.", name));
        }
    }

    /// `identdef {"," identdef}`, ended by a colon.
    fn ident_list(&mut self) -> Vec<IdentDef> {
        let mut idents = Vec::new();
        loop {
            if !self.check(&TokenKind::Ident(String::new())) {
                let token = self.peek();
                self.error(token.span, "identifier expected.");
                break;
            }
            idents.extend(self.identdef());
            let token = self.peek();
            match token.kind {
                TokenKind::Comma => {
                    self.next();
                }
                TokenKind::Ident(_) => self.error(token.span, "comma missing."),
                TokenKind::Colon => break,
                _ => {
                    self.error(token.span, format!("unexpected token: {}.", token.kind));
                    self.resync(&[TokenKind::Colon]);
                    break;
                }
            }
        }
        idents
    }

    // ==================== Imports and declarations ====================

    fn import_list(&mut self, imports: &mut Vec<Import>) {
        self.next();
        loop {
            self.import(imports);
            let token = self.peek();
            match token.kind {
                TokenKind::Comma => {
                    self.next();
                }
                TokenKind::Ident(_) => self.error(token.span, "comma missing."),
                TokenKind::Semicolon => {
                    self.next();
                    break;
                }
                _ => {
                    self.error(token.span, format!("unexpected token: {}.", token.kind));
                    self.resync(&[
                        TokenKind::Const,
                        TokenKind::Type,
                        TokenKind::Var,
                        TokenKind::Procedure,
                        TokenKind::Begin,
                    ]);
                    break;
                }
            }
        }
    }

    /// `ident [":=" ident]`, the first name being the alias.
    fn import(&mut self, imports: &mut Vec<Import>) {
        let Some(first) = self.ident() else {
            return;
        };
        let (alias, name) = if self.accept(&TokenKind::Becomes) {
            match self.ident() {
                Some(name) => (Some(first), name),
                None => return,
            }
        } else {
            (None, first)
        };
        let span = alias.as_ref().map_or(name.span, |alias| alias.span.merge(name.span));
        if let Some(import) = self.analyzer.on_import(span, alias, name, imports) {
            imports.push(import);
        }
    }

    fn declarations(&mut self, block: &mut Block) {
        if self.check(&TokenKind::Const) {
            self.const_declarations(block);
        }
        self.expect_one_of(&[TokenKind::Type, TokenKind::Var, TokenKind::Procedure, TokenKind::Begin, TokenKind::End]);
        if self.check(&TokenKind::Type) {
            self.type_declarations(block);
        }
        self.expect_one_of(&[TokenKind::Var, TokenKind::Procedure, TokenKind::Begin, TokenKind::End]);
        if self.check(&TokenKind::Var) {
            self.var_declarations(block);
        }
        self.expect_one_of(&[TokenKind::Procedure, TokenKind::Begin, TokenKind::End]);
        self.analyzer.on_declarations();
        while self.check(&TokenKind::Procedure) {
            self.procedure(block);
        }
        self.expect_one_of(&[TokenKind::Begin, TokenKind::End]);
    }

    fn const_declarations(&mut self, block: &mut Block) {
        let keyword = self.next().span;
        let count = block.constants.len();
        while self.check(&TokenKind::Ident(String::new())) {
            let Some(ident) = self.identdef() else {
                break;
            };
            if self.expect(&TokenKind::Eq) {
                let value = self.expression();
                block.constants.push(self.analyzer.on_constant(ident, value));
                self.expect(&TokenKind::Semicolon);
            }
        }
        if block.constants.len() == count {
            self.error(keyword, "empty CONST declaration.");
        }
    }

    fn type_declarations(&mut self, block: &mut Block) {
        let keyword = self.next().span;
        let count = block.types.len();
        while self.check(&TokenKind::Ident(String::new())) {
            let Some(ident) = self.identdef() else {
                break;
            };
            if !self.expect(&TokenKind::Eq) {
                continue;
            }
            // The name is declared before the pointer base is parsed, so
            // the base may refer back to it.
            if self.check(&TokenKind::Pointer) {
                let span = self.peek().span;
                let pointer = self.analyzer.on_pointer_type_start(span);
                block.types.push(self.analyzer.on_type(ident, Some(pointer)));
                self.pointer_type(pointer);
            } else {
                let ty = self.type_();
                block.types.push(self.analyzer.on_type(ident, ty));
            }
            self.expect(&TokenKind::Semicolon);
        }
        if block.types.len() == count {
            self.error(keyword, "empty TYPE declaration.");
        }
    }

    fn var_declarations(&mut self, block: &mut Block) {
        let keyword = self.next().span;
        let count = block.variables.len();
        while self.check(&TokenKind::Ident(String::new())) {
            let idents = self.ident_list();
            if self.expect(&TokenKind::Colon) {
                let ty = self.type_();
                for ident in idents {
                    let index = block.variables.len();
                    block.variables.push(self.analyzer.on_variable(ident, ty, index));
                }
                self.expect(&TokenKind::Semicolon);
            }
        }
        if block.variables.len() == count {
            self.error(keyword, "empty VAR declaration.");
        }
    }

    // ==================== Types ====================

    fn type_(&mut self) -> Option<TypeId> {
        let token = self.peek();
        match token.kind {
            TokenKind::Ident(_) => {
                let ident = self.qualident()?;
                Some(self.analyzer.on_type_reference(&ident, 0))
            }
            TokenKind::Array => self.array_type(),
            TokenKind::Record => Some(self.record_type()),
            TokenKind::Pointer => {
                let pointer = self.analyzer.on_pointer_type_start(token.span);
                self.pointer_type(pointer);
                Some(pointer)
            }
            TokenKind::Procedure => Some(self.procedure_type()),
            _ => {
                self.error(token.span, format!("unexpected token: {}.", token.kind));
                self.resync(TYPE_FOLLOW);
                None
            }
        }
    }

    fn array_type(&mut self) -> Option<TypeId> {
        let keyword = self.next().span;
        let mut dimensions = Vec::new();
        if !self.check(&TokenKind::Of) {
            dimensions.push(self.expression());
            while self.accept(&TokenKind::Comma) {
                dimensions.push(self.expression());
            }
        }
        if !self.expect(&TokenKind::Of) {
            self.resync(TYPE_FOLLOW);
            return None;
        }
        let member = self.type_();
        let span = keyword.merge(self.previous);
        Some(self.analyzer.on_array_type(span, dimensions, member))
    }

    fn record_type(&mut self) -> TypeId {
        let keyword = self.next().span;
        let mut base = None;
        if self.accept(&TokenKind::LParen) {
            base = self.qualident();
            self.expect(&TokenKind::RParen);
        }
        let mut fields = Vec::new();
        if self.check(&TokenKind::Ident(String::new())) {
            self.field_list(&mut fields);
            while self.accept(&TokenKind::Semicolon) {
                self.field_list(&mut fields);
            }
        }
        self.expect(&TokenKind::End);
        let span = keyword.merge(self.previous);
        self.analyzer.on_record_type(span, base, fields)
    }

    fn field_list(&mut self, fields: &mut Vec<DeclId>) {
        let token = self.peek();
        match token.kind {
            TokenKind::Ident(_) => {
                let idents = self.ident_list();
                if !idents.is_empty() && self.expect(&TokenKind::Colon) {
                    let ty = self.type_();
                    for ident in idents {
                        let index = fields.len();
                        fields.push(self.analyzer.on_field(ident, ty, index));
                    }
                }
            }
            TokenKind::End => {}
            _ => self.error(token.span, "identifier expected."),
        }
        self.resync(&[TokenKind::Semicolon, TokenKind::End]);
    }

    /// `POINTER TO type`. A base named before its declaration is recorded
    /// as a forward reference.
    fn pointer_type(&mut self, pointer: TypeId) {
        let keyword = self.next().span;
        if !self.expect(&TokenKind::To) {
            self.resync(TYPE_FOLLOW);
            return;
        }
        if self.check(&TokenKind::Ident(String::new())) {
            let Some(ident) = self.qualident() else {
                return;
            };
            if self.analyzer.is_declared(&ident) {
                let base = self.analyzer.on_type_reference(&ident, 0);
                let span = keyword.merge(self.previous);
                self.analyzer.on_pointer_type_end(span, pointer, Some(base));
            } else {
                self.analyzer.on_pointer_forward(pointer, ident);
            }
        } else {
            let base = self.type_();
            let span = keyword.merge(self.previous);
            self.analyzer.on_pointer_type_end(span, pointer, base);
        }
    }

    fn procedure_type(&mut self) -> TypeId {
        let keyword = self.next().span;
        self.analyzer.on_block_start();
        let (params, variadic, ret) = self.formal_parameters();
        self.analyzer.on_block_end();
        let span = keyword.merge(self.previous);
        self.analyzer.on_procedure_type(span, params, variadic, ret)
    }

    /// `"(" [fp_section {";" fp_section}] ")" [":" qualident]`. Returns the
    /// parameters, whether the last one is variadic, and the result type.
    fn formal_parameters(&mut self) -> (Vec<DeclId>, bool, Option<TypeId>) {
        let mut params = Vec::new();
        let mut variadic = false;
        let mut ret = None;
        if self.accept(&TokenKind::LParen) {
            while self.check_any(&[TokenKind::Var, TokenKind::Ident(String::new()), TokenKind::Ellipsis]) {
                self.fp_section(&mut params, &mut variadic);
                if self.check(&TokenKind::RParen) {
                    break;
                }
                if self.check(&TokenKind::Semicolon) {
                    let semicolon = self.next();
                    if variadic {
                        self.error(semicolon.span, "variadic arguments must be last formal parameter.");
                    }
                    continue;
                }
                let token = self.next();
                self.error_expected("; or )", &token);
            }
            self.expect(&TokenKind::RParen);
            if self.accept(&TokenKind::Colon) {
                ret = self.result_type();
            }
        } else if self.check(&TokenKind::Colon) {
            let colon = self.next();
            self.warning(colon.span, "function procedures without parameters must specify an empty parameter list.");
            ret = self.result_type();
        }
        (params, variadic, ret)
    }

    fn result_type(&mut self) -> Option<TypeId> {
        let ident = self.qualident()?;
        Some(self.analyzer.on_type_reference(&ident, 0))
    }

    /// `[VAR] ident {"," ident} ":" formal_type | "..."`
    fn fp_section(&mut self, params: &mut Vec<DeclId>, variadic: &mut bool) {
        if self.check(&TokenKind::Ellipsis) {
            let token = self.next();
            *variadic = true;
            if !self.analyzer.config().enable_varargs {
                self.error(token.span, "variadic arguments support disabled [--enable-varargs].");
            }
            return;
        }
        let is_var = self.accept(&TokenKind::Var);
        let mut idents = Vec::new();
        while let Some(ident) = self.ident() {
            idents.push(ident);
            let token = self.peek();
            match token.kind {
                TokenKind::Comma => {
                    self.next();
                }
                TokenKind::Ident(_) => self.error(token.span, "comma missing."),
                TokenKind::Colon => break,
                _ => {
                    self.error(token.span, format!("{} unexpected.", token.kind));
                    break;
                }
            }
        }
        self.expect(&TokenKind::Colon);
        let ty = self.formal_type();
        for ident in idents {
            let index = params.len();
            params.push(self.analyzer.on_parameter(ident, is_var, ty, index));
        }
    }

    /// `{ARRAY OF} qualident`
    fn formal_type(&mut self) -> Option<TypeId> {
        let mut dimensions = 0;
        while self.accept(&TokenKind::Array) {
            self.expect(&TokenKind::Of);
            dimensions += 1;
        }
        let token = self.peek();
        if matches!(token.kind, TokenKind::Pointer | TokenKind::Record) {
            self.error(token.span, "formal type cannot be an anonymous record or pointer type.");
        } else if let TokenKind::Ident(_) = token.kind {
            let ident = self.qualident()?;
            return Some(self.analyzer.on_type_reference(&ident, dimensions));
        } else {
            self.error_expected("identifier", &token);
        }
        self.resync(&[TokenKind::Semicolon, TokenKind::RParen]);
        None
    }

    // ==================== Procedures ====================

    fn procedure(&mut self, block: &mut Block) {
        let keyword = self.next().span;
        if self.check(&TokenKind::LBracket) {
            if !self.analyzer.config().enable_extern {
                self.error(keyword, "external procedure support disabled [--enable-extern].");
            }
            self.procedure_declaration(keyword, block);
        } else {
            self.procedure_definition(keyword, block);
        }
        self.expect(&TokenKind::Semicolon);
    }

    /// `"[" string "]" identdef [formal_parameters] ";" EXTERNAL "[" string "]"`
    fn procedure_declaration(&mut self, keyword: Span, block: &mut Block) {
        self.next();
        let convention = self.string_literal();
        self.expect(&TokenKind::RBracket);
        let Some(ident) = self.identdef() else {
            self.resync(&[TokenKind::Semicolon]);
            return;
        };
        self.analyzer.on_block_start();
        let (params, variadic, ret) = self.formal_parameters();
        self.analyzer.on_block_end();
        let span = keyword.merge(self.previous);
        let ty = self.analyzer.on_procedure_type(span, params, variadic, ret);
        self.expect(&TokenKind::Semicolon);
        self.expect(&TokenKind::External);
        self.expect(&TokenKind::LBracket);
        let name = self.string_literal().map(|(name, _)| name);
        self.expect(&TokenKind::RBracket);
        block.procedures.push(self.analyzer.on_external_procedure(ident, convention, ty, name));
    }

    /// `identdef [formal_parameters] ";" declarations [BEGIN statements] END ident`
    fn procedure_definition(&mut self, keyword: Span, block: &mut Block) {
        let Some(ident) = self.identdef() else {
            self.resync(&[TokenKind::Semicolon]);
            return;
        };
        let name = ident.name.clone();
        let procedure = self.analyzer.on_procedure_start(ident);
        let (params, variadic, ret) = self.formal_parameters();
        let span = keyword.merge(self.previous);
        let ty = self.analyzer.on_procedure_type(span, params, variadic, ret);
        self.analyzer.on_procedure_signature(procedure, ty);
        self.expect(&TokenKind::Semicolon);

        let mut body = Block::default();
        self.declarations(&mut body);
        if self.accept(&TokenKind::Begin) {
            body.body = self.statement_sequence();
        }
        if !self.expect(&TokenKind::End) {
            self.resync(&[TokenKind::End]);
            self.accept(&TokenKind::End);
        }
        let end = self.ident().unwrap_or_else(|| Ident::new(name, self.previous));
        self.analyzer.on_procedure_end(procedure, body, &end);
        block.procedures.push(procedure);
    }

    fn string_literal(&mut self) -> Option<(String, Span)> {
        let token = self.peek();
        let value = match token.kind {
            TokenKind::Str(value) => value,
            TokenKind::CharCode(0) => String::new(),
            TokenKind::CharCode(code) => char::from(code).to_string(),
            _ => {
                self.error(token.span, "string literal expected.");
                return None;
            }
        };
        self.next();
        Some((value, token.span))
    }

    // ==================== Statements ====================

    fn statement_sequence(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            if self.check_any(SEQUENCE_END) {
                break;
            }
            // Empty statement
            if self.accept(&TokenKind::Semicolon) {
                continue;
            }
            statements.extend(self.statement());
            let token = self.peek();
            match token.kind {
                TokenKind::Semicolon => {
                    self.next();
                }
                TokenKind::Ident(_)
                | TokenKind::If
                | TokenKind::Case
                | TokenKind::Loop
                | TokenKind::While
                | TokenKind::Repeat
                | TokenKind::For
                | TokenKind::Exit
                | TokenKind::Return => {
                    let end = self.previous.end;
                    self.error(Span::new(end, end), "semicolon missing.");
                }
                TokenKind::Eof => {
                    self.error(token.span, "premature end of file.");
                    break;
                }
                _ if self.check_any(SEQUENCE_END) => break,
                _ => {
                    self.error(token.span, format!("unexpected token: {}.", token.kind));
                    self.resync(&[
                        TokenKind::Semicolon,
                        TokenKind::End,
                        TokenKind::Elsif,
                        TokenKind::Else,
                        TokenKind::Until,
                        TokenKind::Bar,
                    ]);
                }
            }
        }
        self.analyzer.on_statement_sequence(&statements);
        statements
    }

    fn statement(&mut self) -> Option<Statement> {
        let token = self.peek();
        match token.kind {
            TokenKind::Ident(_) => {
                let (ident, selectors) = self.designator()?;
                let span = token.span.merge(self.previous);
                if self.check(&TokenKind::Eq) {
                    let op = self.next();
                    self.error(op.span, "unexpected operator = found, use operator := instead.");
                    return self.assignment(span, ident, selectors);
                }
                if self.accept(&TokenKind::Becomes) {
                    return self.assignment(span, ident, selectors);
                }
                self.analyzer.on_qualified_statement(span, ident, selectors)
            }
            TokenKind::If => self.if_statement(),
            TokenKind::Case => self.case_statement(),
            TokenKind::Loop => Some(self.loop_statement()),
            TokenKind::While => self.while_statement(),
            TokenKind::Repeat => self.repeat_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Exit => {
                self.next();
                Some(self.analyzer.on_exit(token.span))
            }
            TokenKind::Return => {
                self.next();
                let value = if self.check_any(&[
                    TokenKind::Semicolon,
                    TokenKind::Bar,
                    TokenKind::End,
                    TokenKind::Elsif,
                    TokenKind::Else,
                    TokenKind::Until,
                ]) {
                    None
                } else {
                    self.expression()
                };
                let span = token.span.merge(self.previous);
                Some(self.analyzer.on_return(span, value))
            }
            _ => {
                self.error(token.span, "unknown or empty statement.");
                self.next();
                None
            }
        }
    }

    /// Right-hand side of `designator := expression`, the operator already
    /// consumed.
    fn assignment(&mut self, target: Span, ident: QualIdent, selectors: Vec<Selector>) -> Option<Statement> {
        let target = self.analyzer.on_qualified_expression(target, ident, selectors);
        let value = self.expression();
        let span = target.span.merge(self.previous);
        self.analyzer.on_assignment(span, target, value)
    }

    fn if_statement(&mut self) -> Option<Statement> {
        let keyword = self.next().span;
        let cond = self.expression();
        self.expect(&TokenKind::Then);
        let then = self.statement_sequence();
        let elsifs = self.elsif_clauses(&TokenKind::Then);
        let otherwise = if self.accept(&TokenKind::Else) { Some(self.statement_sequence()) } else { None };
        self.expect(&TokenKind::End);
        let span = keyword.merge(self.previous);
        self.analyzer.on_if(span, cond, then, elsifs, otherwise)
    }

    /// `{ELSIF expression (THEN | DO) statements}`
    fn elsif_clauses(&mut self, separator: &TokenKind) -> Vec<crate::ast::ElseIf> {
        let mut elsifs = Vec::new();
        while self.check(&TokenKind::Elsif) {
            let keyword = self.next().span;
            let cond = self.expression();
            self.expect(separator);
            let body = self.statement_sequence();
            let span = keyword.merge(self.previous);
            elsifs.extend(self.analyzer.on_else_if(span, cond, body));
        }
        elsifs
    }

    fn case_statement(&mut self) -> Option<Statement> {
        let keyword = self.next().span;
        let expr = self.expression();
        if let Some(expr) = &expr {
            self.analyzer.on_case_start(expr);
        }
        let mut arms = Vec::new();
        let mut otherwise = None;
        if self.expect(&TokenKind::Of) {
            if self.check_any(&[TokenKind::Else, TokenKind::End]) {
                self.error(keyword, "empty case statement.");
            } else {
                loop {
                    if self.check(&TokenKind::Bar) {
                        let bar = self.next();
                        if arms.is_empty() {
                            self.warning(bar.span, "redundant pipe.");
                        }
                    }
                    let start = self.peek().span;
                    let labels = self.range_expression_list();
                    let span = start.merge(self.previous);
                    self.expect(&TokenKind::Colon);
                    let labels = self.analyzer.on_case_labels(span, labels);
                    let body = self.statement_sequence();
                    arms.push(self.analyzer.on_case_arm(labels, body));
                    if !self.check(&TokenKind::Bar) {
                        break;
                    }
                }
            }
            if self.accept(&TokenKind::Else) {
                otherwise = Some(self.statement_sequence());
            }
            self.expect(&TokenKind::End);
        }
        let span = keyword.merge(self.previous);
        Some(self.analyzer.on_case_end(span, expr?, arms, otherwise))
    }

    fn loop_statement(&mut self) -> Statement {
        let keyword = self.next().span;
        self.analyzer.on_loop_start();
        let body = self.statement_sequence();
        self.expect(&TokenKind::End);
        let span = keyword.merge(self.previous);
        self.analyzer.on_loop(span, body)
    }

    fn while_statement(&mut self) -> Option<Statement> {
        let keyword = self.next().span;
        self.analyzer.on_loop_start();
        let cond = self.expression();
        self.expect(&TokenKind::Do);
        let body = self.statement_sequence();
        let elsifs = self.elsif_clauses(&TokenKind::Do);
        self.expect(&TokenKind::End);
        let span = keyword.merge(self.previous);
        self.analyzer.on_while(span, cond, body, elsifs)
    }

    fn repeat_statement(&mut self) -> Option<Statement> {
        let keyword = self.next().span;
        self.analyzer.on_loop_start();
        let body = self.statement_sequence();
        let cond = if self.expect(&TokenKind::Until) { self.expression() } else { None };
        let span = keyword.merge(self.previous);
        self.analyzer.on_repeat(span, cond, body)
    }

    /// `FOR ident ":=" expression TO expression [BY expression] DO statements END`
    fn for_statement(&mut self) -> Option<Statement> {
        let keyword = self.next().span;
        self.analyzer.on_loop_start();
        let counter = self.qualident();
        let low = if self.expect(&TokenKind::Becomes) { self.expression() } else { None };
        let high = if self.expect(&TokenKind::To) { self.expression() } else { None };
        let step = if self.accept(&TokenKind::By) { self.expression() } else { None };
        self.expect(&TokenKind::Do);
        let body = self.statement_sequence();
        self.expect(&TokenKind::End);
        let span = keyword.merge(self.previous);
        let Some(counter) = counter else {
            self.analyzer.on_loop_end();
            return None;
        };
        self.analyzer.on_for(span, counter, low, high, step, body)
    }

    // ==================== Expressions ====================

    fn expression(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        let mut result = self.simple_expression();
        if let Some(op) = relation(&self.peek().kind) {
            self.next();
            let rhs = self.simple_expression();
            let span = start.merge(self.previous);
            result = self.analyzer.on_binary(span, op, result, rhs);
        }
        if result.is_none() {
            self.resync(EXPRESSION_FOLLOW);
        }
        result
    }

    /// A leading sign applies to the whole first term.
    fn simple_expression(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        let mut expr = if self.accept(&TokenKind::Plus) {
            let operand = self.term();
            self.analyzer.on_unary(start.merge(self.previous), UnaryOp::Plus, operand)
        } else if self.accept(&TokenKind::Minus) {
            let operand = self.term();
            self.analyzer.on_unary(start.merge(self.previous), UnaryOp::Neg, operand)
        } else {
            self.term()
        };
        while let Some(op) = additive(&self.peek().kind) {
            self.next();
            let rhs = self.term();
            let span = start.merge(self.previous);
            expr = self.analyzer.on_binary(span, op, expr, rhs);
        }
        expr
    }

    fn term(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        let mut expr = self.factor();
        while let Some(op) = multiplicative(&self.peek().kind) {
            self.next();
            let rhs = self.factor();
            let span = start.merge(self.previous);
            expr = self.analyzer.on_binary(span, op, expr, rhs);
        }
        expr
    }

    fn factor(&mut self) -> Option<Expr> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.basic_factor(),
        };
        self.next();
        let operand = self.basic_factor();
        let span = token.span.merge(self.previous);
        self.analyzer.on_unary(span, op, operand)
    }

    fn basic_factor(&mut self) -> Option<Expr> {
        let token = self.peek();
        let span = token.span;
        let expr = match token.kind {
            TokenKind::Ident(_) => {
                let (ident, selectors) = self.designator()?;
                let span = span.merge(self.previous);
                if self.analyzer.is_constant(&ident) {
                    return self.analyzer.on_qualified_constant(span, &ident, &selectors);
                }
                return Some(self.analyzer.on_qualified_expression(span, ident, selectors));
            }
            TokenKind::LBrace => return Some(self.set()),
            TokenKind::LParen => {
                self.next();
                let expr = self.expression();
                self.expect(&TokenKind::RParen);
                return expr;
            }
            TokenKind::Integer(value) => self.analyzer.on_integer_literal(span, value, int_type(value)),
            // Too large for REAL means LONGREAL
            #[allow(clippy::cast_possible_truncation)]
            TokenKind::Real(value) if (value as f32).is_infinite() => {
                self.analyzer.on_real_literal(span, value, TypeId::LONGREAL)
            }
            TokenKind::Real(value) => self.analyzer.on_real_literal(span, value, TypeId::REAL),
            TokenKind::LongReal(value) => self.analyzer.on_real_literal(span, value, TypeId::LONGREAL),
            TokenKind::CharCode(value) => self.analyzer.on_char_literal(span, value),
            TokenKind::Str(value) if value.len() <= 1 => {
                self.analyzer.on_char_literal(span, value.bytes().next().unwrap_or(0))
            }
            TokenKind::Str(value) => self.analyzer.on_string_literal(span, value),
            TokenKind::True => self.analyzer.on_boolean_literal(span, true),
            TokenKind::False => self.analyzer.on_boolean_literal(span, false),
            TokenKind::Nil => self.analyzer.on_nil_literal(span),
            _ => {
                self.error(span, format!("unexpected token: {}.", token.kind));
                return None;
            }
        };
        self.next();
        Some(expr)
    }

    /// `qualident {selector}`. Selectors are resolved by the analyzer.
    fn designator(&mut self) -> Option<(QualIdent, Vec<Selector>)> {
        let ident = self.qualident()?;
        let mut selectors = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Dot => {
                    self.next();
                    let Some(field) = self.ident() else {
                        break;
                    };
                    selectors.push(Selector::field(field.name, token.span.merge(field.span)));
                }
                TokenKind::LBracket => {
                    self.next();
                    let indices = self.expression_list();
                    if indices.is_empty() {
                        self.error(token.span, "expression expected.");
                    }
                    self.expect(&TokenKind::RBracket);
                    let span = token.span.merge(self.previous);
                    selectors.push(Selector::new(SelectorKind::Index(indices), span));
                }
                TokenKind::Caret => {
                    self.next();
                    selectors.push(Selector::new(SelectorKind::Deref { implicit: false }, token.span));
                }
                TokenKind::LParen => {
                    self.next();
                    let args = if self.check(&TokenKind::RParen) { Vec::new() } else { self.expression_list() };
                    self.expect(&TokenKind::RParen);
                    let span = token.span.merge(self.previous);
                    selectors.push(Selector::new(SelectorKind::Call(args), span));
                }
                _ => break,
            }
        }
        Some((ident, selectors))
    }

    fn expression_list(&mut self) -> Vec<Expr> {
        let mut expressions: Vec<Expr> = self.expression().into_iter().collect();
        while self.accept(&TokenKind::Comma) {
            expressions.extend(self.expression());
        }
        expressions
    }

    /// `"{" [range_expression {"," range_expression}] "}"`
    fn set(&mut self) -> Expr {
        let open = self.next().span;
        let elements = if self.check(&TokenKind::RBrace) { Vec::new() } else { self.range_expression_list() };
        self.expect(&TokenKind::RBrace);
        let span = open.merge(self.previous);
        self.analyzer.on_set(span, elements)
    }

    fn range_expression(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        let lower = self.expression();
        if self.accept(&TokenKind::DotDot) {
            let upper = self.expression();
            let span = start.merge(self.previous);
            return self.analyzer.on_range(span, lower, upper);
        }
        lower
    }

    fn range_expression_list(&mut self) -> Vec<Expr> {
        let mut expressions: Vec<Expr> = self.range_expression().into_iter().collect();
        while self.accept(&TokenKind::Comma) {
            expressions.extend(self.range_expression());
        }
        expressions
    }
}

/// Name of an expected token in diagnostics.
fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(_) => "identifier".to_string(),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Integer(_) => "integer literal".to_string(),
        other => other.to_string(),
    }
}

fn relation(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Eq => Some(BinaryOp::Eq),
        TokenKind::Neq => Some(BinaryOp::Neq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Leq => Some(BinaryOp::Leq),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Geq => Some(BinaryOp::Geq),
        TokenKind::In => Some(BinaryOp::In),
        TokenKind::Is => Some(BinaryOp::Is),
        _ => None,
    }
}

fn additive(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Plus),
        TokenKind::Minus => Some(BinaryOp::Minus),
        TokenKind::Or => Some(BinaryOp::Or),
        _ => None,
    }
}

fn multiplicative(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Times => Some(BinaryOp::Times),
        TokenKind::Slash => Some(BinaryOp::Divide),
        TokenKind::Div => Some(BinaryOp::Div),
        TokenKind::Mod => Some(BinaryOp::Mod),
        TokenKind::And => Some(BinaryOp::And),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ExprKind, StatementKind};
    use crate::frontend::{analyze_source, CompilerConfig};
    use crate::sema::tests::{analyze, errors, warnings};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_module() {
        let output = analyze(
            "MODULE Hello; CONST N = 10; TYPE T = ARRAY N OF INTEGER; VAR a: T; i: INTEGER; \
             PROCEDURE Sum(VAR v: T): INTEGER; VAR s, k: INTEGER; \
             BEGIN s := 0; FOR k := 0 TO N - 1 DO s := s + v[k] END; RETURN s END Sum; \
             BEGIN i := Sum(a) END Hello.",
        );
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.unwrap();
        assert_eq!(module.name, "Hello");
        assert_eq!(module.block.constants.len(), 1);
        assert_eq!(module.block.types.len(), 1);
        assert_eq!(module.block.variables.len(), 2);
        assert_eq!(module.block.procedures.len(), 1);
        assert_eq!(module.block.body.len(), 1);
    }

    #[test]
    fn test_leading_sign_applies_to_term() {
        let output = analyze("MODULE M; CONST A = -7 DIV 2; B = - 2 * 3 + 1; END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.unwrap();
        let value = |index: usize| output.arena.decl(module.block.constants[index]).constant_value().cloned();
        assert_eq!(value(0), Some(crate::ast::Literal::Integer(-3)));
        assert_eq!(value(1), Some(crate::ast::Literal::Integer(-5)));
    }

    #[test]
    fn test_semicolon_missing() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN i := 1 i := 2 END M.");
        assert_eq!(errors(&output), vec!["semicolon missing."]);
        assert_eq!(output.module.unwrap().block.body.len(), 2);
    }

    #[test]
    fn test_equals_instead_of_assignment() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN i = 1 END M.");
        assert_eq!(errors(&output), vec!["unexpected operator = found, use operator := instead."]);
    }

    #[test]
    fn test_expected_token() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN IF i > 0 i := 1 END END M.");
        assert_eq!(errors(&output), vec!["THEN expected, found i."]);
    }

    #[test]
    fn test_illegal_identifier() {
        let output = analyze("MODULE M; VAR my_var: INTEGER; END M.");
        assert_eq!(errors(&output), vec!["illegal identifier: my_var."]);
    }

    #[test]
    fn test_empty_sections() {
        let output = analyze("MODULE M; CONST TYPE VAR END M.");
        assert_eq!(
            errors(&output),
            vec!["empty CONST declaration.", "empty TYPE declaration.", "empty VAR declaration."]
        );
    }

    #[test]
    fn test_lexer_errors_are_logged() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN i := 1 ! END M.");
        assert_eq!(errors(&output), vec!["unexpected character '!'"]);
        let output = analyze("MODULE M; (* unterminated");
        assert!(errors(&output).contains(&"comment not terminated.".to_string()));
    }

    #[test]
    fn test_parameterless_function_warning() {
        let output = analyze("MODULE M; PROCEDURE F: INTEGER; BEGIN RETURN 1 END F; END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
        assert_eq!(
            warnings(&output),
            vec!["function procedures without parameters must specify an empty parameter list."]
        );
    }

    #[test]
    fn test_disabled_extensions() {
        let source = "MODULE M; PROCEDURE [\"C\"] printf(fmt: ARRAY OF CHAR; ...); EXTERNAL [\"printf\"]; END M.";
        let output = analyze_source(source, &CompilerConfig::default(), None);
        assert_eq!(
            errors(&output),
            vec![
                "external procedure support disabled [--enable-extern].",
                "variadic arguments support disabled [--enable-varargs].",
            ]
        );
        let output = analyze(source);
        assert_eq!(errors(&output), Vec::<String>::new());
    }

    #[test]
    fn test_qualident_prefers_scope() {
        let output = analyze(
            "MODULE M; TYPE R = RECORD f: INTEGER END; VAR r: R; i: INTEGER; BEGIN i := r.f END M.",
        );
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.unwrap();
        let StatementKind::Assignment { value, .. } = &module.block.body[0].kind else {
            panic!("assignment expected");
        };
        let ExprKind::Designator(designator) = &value.kind else {
            panic!("designator expected");
        };
        assert!(!designator.ident.is_qualified());
        assert_eq!(designator.selectors.len(), 1);
    }

    #[test]
    fn test_return_without_value() {
        let output = analyze("MODULE M; PROCEDURE P(x: INTEGER); BEGIN IF x > 0 THEN RETURN END END P; END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
    }
}
