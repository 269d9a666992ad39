//! Recursive-descent GLSL parser
//!
//! Tokens in, a resolved `TranslationUnit` out:
//! - the stage's hidden globals are declared first, then the builtin
//!   prototype set is parsed, then the user source
//! - every call site is queued and bound to an overload once the whole unit is known
//! - the first error aborts the parse

mod bootstrap;
mod expr;
pub mod fold;
mod resolve;
mod stmt;

use std::mem::discriminant;

use crate::ast::*;
use crate::builtins::{self, generic_instances, layout_takes_value, MAX_GENERIC_INSTANCES};
use crate::error::{GlslxError, GlslxResult};
use crate::keywords::Keyword;
use crate::lexer::{Directive, Lexer, Token, TokenKind};
use crate::span::Span;
use crate::types;

pub use expr::EndCondition;
pub use resolve::{link_prototypes, resolve_calls};

static EOF: TokenKind = TokenKind::Eof;

/// Parse one shader stage, builtin prototypes included
pub fn parse(source: &str, stage: Stage) -> GlslxResult<TranslationUnit> {
    let mut parser = Parser::new(stage);
    parser.parse_builtins()?;
    parser.parse_source(source)?;
    Ok(parser.finish())
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    tu: TranslationUnit,
    /// Innermost scope last; index 0 is the global scope
    scopes: Vec<Vec<VarId>>,
    /// Call sites waiting for overload resolution
    calls: Vec<ExprId>,
}

/// Everything collected for one top-level declarator
#[derive(Debug, Clone, Default)]
struct TopLevel {
    storage: Storage,
    aux: AuxStorage,
    interpolation: Interpolation,
    precision: Precision,
    memory: MemoryFlags,
    invariant: bool,
    precise: bool,
    layout: Vec<LayoutQualifier>,
    ty: Option<TypeRef>,
    name: Option<String>,
    array_sizes: Vec<Option<ExprId>>,
    is_array: bool,
    /// Leading dimensions written on the type; `float[2] a, b` shares them
    type_dims: usize,
    initial_value: Option<ExprId>,
}

/// Parser state to return to when a declaration attempt turns out to be an expression
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pos: usize,
    scope_len: usize,
    calls: usize,
    exprs: usize,
    vars: usize,
}

impl Parser {
    pub fn new(stage: Stage) -> Self {
        let mut parser = Self {
            tokens: Vec::new(),
            pos: 0,
            tu: TranslationUnit::new(stage),
            scopes: vec![Vec::new()],
            calls: Vec::new(),
        };
        parser.declare_hidden_globals();
        parser
    }

    /// Parse the builtin prototype set; errors are reported against its pseudo file
    pub fn parse_builtins(&mut self) -> GlslxResult<()> {
        log::debug!("parsing builtin prototypes");
        self.parse_source(builtins::PROTOTYPES).map_err(|e| match e.span() {
            Some(span) => GlslxError::parser(
                format!("{}: {}", builtins::PROTOTYPES_FILE, e.message()),
                span,
            ),
            None => e,
        })
    }

    pub fn parse_source(&mut self, source: &str) -> GlslxResult<()> {
        self.load(source)?;
        while !self.at_end() {
            self.parse_external_declaration()?;
        }
        Ok(())
    }

    /// Link definitions to their prototypes and bind every queued call
    pub fn finish(mut self) -> TranslationUnit {
        link_prototypes(&mut self.tu);
        resolve_calls(&mut self.tu, &self.calls);
        log::debug!(
            "parsed {} globals, {} functions, {} expressions",
            self.tu.globals.len(),
            self.tu.functions.len(),
            self.tu.exprs.len()
        );
        self.tu
    }

    /// Tokenize `source`, consuming directives on the way
    fn load(&mut self, source: &str) -> GlslxResult<()> {
        let tokens = Lexer::new(source).tokenize()?;
        self.tokens = Vec::with_capacity(tokens.len());
        self.pos = 0;

        for token in tokens {
            let directive = match &token.kind {
                TokenKind::Directive(directive) => directive.clone(),
                _ => {
                    self.tokens.push(token);
                    continue;
                }
            };
            match directive {
                Directive::Version { number, profile } => {
                    if self.tu.version.is_some() {
                        return Err(GlslxError::parser(
                            "multiple version directives are not allowed",
                            token.span,
                        ));
                    }
                    self.tu.version = Some(VersionDirective { number, profile });
                }
                Directive::Extension { name, behavior } => {
                    log::trace!("extension {} : {}", name, behavior);
                    self.tu.extensions.push(ExtensionDirective { name, behavior });
                }
                Directive::Line | Directive::Pragma(_) | Directive::Null => {}
            }
        }
        Ok(())
    }

    // === TOKEN HELPERS ===

    fn peek_kind(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.tokens.get(self.pos + n).map(|t| &t.kind).unwrap_or(&EOF)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek_kind() {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        discriminant(self.peek_kind()) == discriminant(kind)
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    /// `[[` opening an attribute list
    fn at_attribute(&self) -> bool {
        self.check(&TokenKind::LBracket) && matches!(self.peek_nth(1), TokenKind::LBracket)
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> GlslxResult<()> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            self.error(message)
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> GlslxResult<T> {
        if self.at_end() {
            return Err(GlslxError::parser("premature end of file", self.current_span()));
        }
        Err(GlslxError::parser(message, self.current_span()))
    }

    fn evaluate(&mut self, id: ExprId) -> GlslxResult<ExprId> {
        fold::evaluate(&mut self.tu, id).map_err(|m| GlslxError::parser(m, self.current_span()))
    }

    // === SCOPES ===

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, var: VarId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(var);
        }
    }

    /// Innermost visible variable named `name`
    fn find_variable(&self, name: &str) -> Option<VarId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .copied()
            .find(|&id| self.tu.var(id).name == name)
    }

    fn find_type(&self, name: &str) -> Option<TypeRef> {
        self.tu.find_struct(name).map(TypeRef::Struct)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            scope_len: self.scopes.last().map_or(0, Vec::len),
            calls: self.calls.len(),
            exprs: self.tu.exprs.len(),
            vars: self.tu.vars.len(),
        }
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        if let Some(scope) = self.scopes.last_mut() {
            scope.truncate(checkpoint.scope_len);
        }
        self.calls.truncate(checkpoint.calls);
        self.tu.exprs.truncate(checkpoint.exprs);
        self.tu.vars.truncate(checkpoint.vars);
    }

    // === TOP LEVEL ===

    fn parse_external_declaration(&mut self) -> GlslxResult<()> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }

        let items = self.parse_top_level()?;
        match self.peek_kind() {
            TokenKind::Semicolon => {
                self.advance();
                for item in items {
                    self.declare_global(item)?;
                }
                Ok(())
            }
            TokenKind::LParen if items.len() == 1 => {
                let func = self.parse_function(&items[0])?;
                self.register_function(func)
            }
            _ => self.error("syntax error"),
        }
    }

    /// One declaration: the first declarator plus any `, name` continuations
    fn parse_top_level(&mut self) -> GlslxResult<Vec<TopLevel>> {
        let Some(first) = self.parse_top_level_item()? else {
            return Ok(Vec::new());
        };
        let mut items = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            let mut next = items[0].clone();
            next.array_sizes.truncate(next.type_dims);
            next.is_array = next.type_dims > 0;
            next.name = None;
            next.initial_value = None;
            items.push(self.parse_declarator(next)?);
        }
        Ok(items)
    }

    /// `None` when the declaration introduced no variable: a bare struct or
    /// block, a default precision or an invariant re-declaration
    fn parse_top_level_item(&mut self) -> GlslxResult<Option<TopLevel>> {
        let mut item = TopLevel::default();
        self.parse_qualifiers(&mut item)?;
        self.check_qualifiers(&item)?;

        if let TokenKind::Keyword(kw) = self.peek_kind() {
            if kw.is_reserved() {
                return self.error("cannot use a reserved keyword");
            }
        }

        let names_type = self.peek_ident().map_or(false, |name| self.find_type(name).is_some());
        let opens_block = self.peek_ident().is_some() || self.check(&TokenKind::Semicolon);

        if item.storage.allows_block() && !names_type && opens_block {
            let block = self.parse_interface_block(&item)?;
            if self.check(&TokenKind::Semicolon) {
                return Ok(None);
            }
            item.ty = Some(TypeRef::Struct(block));
            item.layout.clear();
        } else if self.check_keyword(Keyword::Struct) {
            self.advance();
            let id = self.parse_struct()?;
            if self.check(&TokenKind::Semicolon) {
                return Ok(None);
            }
            item.ty = Some(TypeRef::Struct(id));
        } else if self.check_keyword(Keyword::Precision) {
            self.parse_default_precision()?;
            return Ok(None);
        } else if item.invariant
            && self.peek_ident().is_some()
            && !names_type
            && matches!(self.peek_nth(1), TokenKind::Semicolon)
        {
            self.parse_invariant_redeclaration()?;
            return Ok(None);
        }

        if item.ty.is_none() {
            item.ty = Some(self.parse_type_specifier()?);
            while self.check(&TokenKind::LBracket) {
                let size = self.parse_array_size()?;
                item.array_sizes.insert(0, size);
                item.type_dims += 1;
                item.is_array = true;
            }
        }
        self.parse_declarator(item).map(Some)
    }

    fn parse_qualifiers(&mut self, item: &mut TopLevel) -> GlslxResult<()> {
        loop {
            let kw = match self.peek_kind() {
                TokenKind::Keyword(kw) => *kw,
                _ => return Ok(()),
            };

            if let Some(storage) = storage_qualifier(kw) {
                if item.storage != Storage::None {
                    return self.error("multiple storage qualifiers in declaration");
                }
                item.storage = storage;
            } else if let Some(aux) = aux_qualifier(kw) {
                if item.aux != AuxStorage::None {
                    return self.error("multiple auxiliary storage qualifiers in declaration");
                }
                item.aux = aux;
            } else if let Some(interpolation) = interpolation_qualifier(kw) {
                if item.interpolation != Interpolation::None {
                    return self.error("multiple interpolation qualifiers in declaration");
                }
                item.interpolation = interpolation;
            } else if let Some(precision) = precision_qualifier(kw) {
                if item.precision != Precision::None {
                    return self.error("multiple precision qualifiers in declaration");
                }
                item.precision = precision;
            } else {
                match kw {
                    Keyword::Invariant => item.invariant = true,
                    Keyword::Precise => item.precise = true,
                    Keyword::Coherent => item.memory.coherent = true,
                    Keyword::Volatile => item.memory.volatile = true,
                    Keyword::Restrict => item.memory.restrict = true,
                    Keyword::Readonly => item.memory.readonly = true,
                    Keyword::Writeonly => item.memory.writeonly = true,
                    Keyword::Layout => {
                        self.parse_layout(&mut item.layout)?;
                        continue;
                    }
                    _ => return Ok(()),
                }
            }
            self.advance();
        }
    }

    /// Stage and combination rules for a declaration's qualifiers
    fn check_qualifiers(&self, item: &TopLevel) -> GlslxResult<()> {
        let stage = self.tu.stage();
        let has_aux = item.aux != AuxStorage::None;
        let has_interpolation = item.interpolation != Interpolation::None;

        if has_aux && !matches!(item.storage, Storage::In | Storage::Out) {
            return self.error("aux storage qualifiers can only be used with in/out storage");
        }
        let edge = match (stage, item.storage) {
            (Stage::Vertex, Storage::In) => Some("vertex shader input"),
            (Stage::Fragment, Storage::Out) => Some("fragment shader output"),
            _ => None,
        };
        if let Some(edge) = edge {
            if has_aux {
                return self.error(format!("cannot use auxiliary storage qualifier on {}", edge));
            }
            if has_interpolation {
                return self.error(format!("cannot use interpolation qualifier on {}", edge));
            }
        }
        if item.aux == AuxStorage::Patch {
            if item.storage == Storage::In && stage != Stage::TessEvaluation {
                return self.error(
                    "applying 'patch' qualifier to input can only be done in tessellation evaluation shader",
                );
            }
            if item.storage == Storage::Out && stage != Stage::TessControl {
                return self.error(
                    "applying 'patch' qualifier to output can only be done in tessellation control shader",
                );
            }
            if has_interpolation {
                return self.error(
                    "cannot use interpolation qualifier with auxiliary storage qualifier 'patch'",
                );
            }
        }
        Ok(())
    }

    /// `layout(name, name = value, ...)`; a repeated name replaces the earlier entry
    fn parse_layout(&mut self, layout: &mut Vec<LayoutQualifier>) -> GlslxResult<()> {
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'layout'")?;

        while !self.check(&TokenKind::RParen) {
            let name = match self.peek_kind() {
                TokenKind::Ident(name) => name.clone(),
                TokenKind::Keyword(Keyword::Shared) => "shared".to_string(),
                _ => return self.error("expected layout qualifier"),
            };
            let Some(takes_value) = layout_takes_value(&name) else {
                return self.error("unknown layout qualifier");
            };
            self.advance();

            let value = if self.check(&TokenKind::Eq) {
                if !takes_value {
                    return self.error("unexpected layout qualifier value");
                }
                self.advance();
                let value = self.parse_expression(EndCondition::COMMA | EndCondition::PAREN)?;
                if !fold::is_constant(&self.tu, value) {
                    return self.error(format!(
                        "value for layout qualifier `{}' is not a valid constant expression",
                        name
                    ));
                }
                Some(self.evaluate(value)?)
            } else if takes_value {
                return self.error(format!(
                    "expected layout qualifier value for `{}' layout qualifier",
                    name
                ));
            } else {
                None
            };

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RParen) {
                return self.error("expected ',' or ')' in layout qualifier list");
            }
            layout.retain(|q| q.name != name);
            layout.push(LayoutQualifier { name, value });
        }
        self.advance();
        Ok(())
    }

    fn parse_type_specifier(&mut self) -> GlslxResult<TypeRef> {
        let ty = match self.peek_kind() {
            TokenKind::Keyword(kw) if kw.is_type() || kw.is_generic() => TypeRef::Builtin(*kw),
            TokenKind::Ident(name) => match self.find_type(name) {
                Some(ty) => ty,
                None => return self.error("expected typename"),
            },
            _ => return self.error("expected typename"),
        };
        self.advance();
        Ok(ty)
    }

    /// Name, name-side array dimensions and optional initializer
    fn parse_declarator(&mut self, mut item: TopLevel) -> GlslxResult<TopLevel> {
        if let Some(name) = self.peek_ident() {
            item.name = Some(name.to_string());
            self.advance();
        }
        while self.check(&TokenKind::LBracket) {
            let size = self.parse_array_size()?;
            item.array_sizes.push(size);
            item.is_array = true;
        }

        if self.check(&TokenKind::Eq) {
            self.advance();
            let end = EndCondition::SEMICOLON | EndCondition::COMMA;
            let aggregate = item.is_array
                || matches!(item.ty, Some(TypeRef::Builtin(kw)) if types::is_vector(kw));
            let value = if aggregate {
                self.parse_array_specifier(end)?
            } else {
                self.parse_expression(end)?
            };
            if matches!(item.storage, Storage::Const | Storage::Uniform)
                && !fold::is_constant(&self.tu, value)
            {
                return self.error("not a valid constant expression");
            }
            item.initial_value = Some(value);
        } else if item.storage == Storage::Const {
            return self.error("const-qualified variable declared but not initialized");
        }

        if item.name.is_none() {
            return self.error("expected name for declaration");
        }
        Ok(item)
    }

    /// `[N]` or `[]`; a size must fold to a constant
    fn parse_array_size(&mut self) -> GlslxResult<Option<ExprId>> {
        self.expect(TokenKind::LBracket, "expected '['")?;
        if self.check(&TokenKind::RBracket) {
            self.advance();
            return Ok(None);
        }
        let size = self.parse_expression(EndCondition::BRACKET)?;
        if !fold::is_constant(&self.tu, size) {
            return self.error("array size is not a valid constant expression");
        }
        let size = self.evaluate(size)?;
        self.expect(TokenKind::RBracket, "expected ']' after array size")?;
        Ok(Some(size))
    }

    fn declare_global(&mut self, item: TopLevel) -> GlslxResult<()> {
        let (Some(ty), Some(name)) = (item.ty, item.name) else {
            return self.error("expected name for declaration");
        };
        if matches!(ty, TypeRef::Builtin(kw) if kw.is_generic()) {
            return self.error("generics are only allowed for builtin prototypes");
        }
        let initial_value = match item.initial_value {
            Some(value) if fold::is_constant(&self.tu, value) => Some(self.evaluate(value)?),
            other => other,
        };

        let var = self.tu.add_var(Variable {
            name,
            base_type: ty,
            array_sizes: item.array_sizes,
            flags: VarFlags {
                array: item.is_array,
                precise: item.precise,
                invariant: item.invariant,
                ..VarFlags::default()
            },
            precision: item.precision,
            kind: VariableKind::Global(GlobalInfo {
                storage: item.storage,
                aux: item.aux,
                memory: item.memory,
                interpolation: item.interpolation,
                initial_value,
                layout: item.layout,
            }),
        });
        self.tu.globals.push(var);
        self.declare(var);
        Ok(())
    }

    fn parse_default_precision(&mut self) -> GlslxResult<()> {
        self.advance();
        let precision = match self.peek_kind() {
            TokenKind::Keyword(kw) => precision_qualifier(*kw),
            _ => None,
        };
        if precision.is_none() {
            return self.error("expected precision qualifier");
        }
        self.advance();
        match self.peek_kind() {
            TokenKind::Keyword(kw) if kw.is_type() => {
                self.advance();
                Ok(())
            }
            _ => self.error("expected typename"),
        }
    }

    /// `invariant name;` applied to an existing global
    fn parse_invariant_redeclaration(&mut self) -> GlslxResult<()> {
        let name = self.peek_ident().unwrap_or_default().to_string();
        let Some(var) = self.find_variable(&name) else {
            return self.error(format!("'{}' was not declared in this scope", name));
        };
        if self.tu.var(var).global().is_none() {
            return self.error("expected global variable");
        }
        self.tu.var_mut(var).flags.invariant = true;
        self.advance();
        Ok(())
    }

    // === STRUCTURES AND BLOCKS ===

    fn parse_struct(&mut self) -> GlslxResult<StructId> {
        let name = self.peek_ident().map(str::to_string);
        if name.is_some() {
            self.advance();
        }
        let fields = self.parse_fields("structure")?;
        let id = self.tu.add_struct(StructDecl {
            name: name.clone(),
            fields,
            kind: StructKind::Struct,
        });
        self.tu.structures.push(id);
        if let Some(name) = name {
            self.tu.structures_by_name.insert(name, id);
        }
        Ok(id)
    }

    /// `Name { fields }` after an in/out/uniform/buffer qualifier set.
    /// A bare `layout(...) in;` produces an empty unnamed block.
    fn parse_interface_block(&mut self, item: &TopLevel) -> GlslxResult<StructId> {
        let what = match item.storage {
            Storage::In => "input block",
            Storage::Out => "output block",
            Storage::Uniform => "uniform block",
            _ => "buffer block",
        };
        let name = self.peek_ident().map(str::to_string);
        if name.is_some() {
            self.advance();
        }
        let fields = if name.is_none() && self.check(&TokenKind::Semicolon) {
            Vec::new()
        } else {
            self.parse_fields(what)?
        };

        let id = self.tu.add_struct(StructDecl {
            name,
            fields: fields.clone(),
            kind: StructKind::Block {
                storage: item.storage,
                memory: item.memory,
                layout: item.layout.clone(),
            },
        });
        self.tu.interface_blocks.push(id);

        // without an instance name the fields live in the enclosing scope
        if self.peek_ident().is_none() {
            for field in fields {
                let name = self.tu.var(field).name.clone();
                if let Some(existing) = self.find_variable(&name) {
                    if !self.tu.var(existing).flags.hidden {
                        return self.error(format!("'{}' is already declared in this scope", name));
                    }
                }
                self.declare(field);
            }
        }
        Ok(id)
    }

    fn parse_fields(&mut self, what: &str) -> GlslxResult<Vec<VarId>> {
        self.expect(TokenKind::LBrace, &format!("expected '{{' for {} definition", what))?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_end() {
                return self.error("premature end of file");
            }
            let items = self.parse_top_level()?;
            self.expect(TokenKind::Semicolon, "expected ';' after field declaration")?;
            for item in items {
                let (Some(ty), Some(name)) = (item.ty, item.name) else {
                    return self.error("expected name for declaration");
                };
                fields.push(self.tu.add_var(Variable {
                    name,
                    base_type: ty,
                    array_sizes: item.array_sizes,
                    flags: VarFlags {
                        array: item.is_array,
                        precise: item.precise,
                        ..VarFlags::default()
                    },
                    precision: item.precision,
                    kind: VariableKind::Field,
                }));
            }
        }
        self.advance();
        Ok(fields)
    }

    // === FUNCTIONS ===

    fn parse_function(&mut self, item: &TopLevel) -> GlslxResult<Function> {
        let (Some(return_type), Some(name)) = (item.ty, item.name.clone()) else {
            return self.error("expected name for declaration");
        };
        self.expect(TokenKind::LParen, "expected '('")?;

        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            params.push(self.parse_parameter()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            }
        }
        self.advance();

        let mut attributes = FunctionAttributes::default();
        if self.at_attribute() {
            self.advance();
            self.advance();
            if self.peek_ident() != Some("builtin") {
                return self.error("invalid function attribute");
            }
            attributes.builtin = true;
            self.advance();
            self.expect(TokenKind::RBracket, "expected ']]' after function attribute")?;
            self.expect(TokenKind::RBracket, "expected ']]' after function attribute")?;
        }

        let generic = std::iter::once(return_type)
            .chain(params.iter().map(|&p| self.tu.var(p).base_type))
            .any(|ty| matches!(ty, TypeRef::Builtin(kw) if kw.is_generic()));
        if generic && !(attributes.builtin && self.check(&TokenKind::Semicolon)) {
            return self.error("generics are only allowed for builtin prototypes");
        }

        if params.len() == 1 && self.tu.var(params[0]).base_type.is(Keyword::Void) {
            params.clear();
        }
        if name == "main" {
            if !params.is_empty() {
                return self.error("'main' cannot have parameters");
            }
            if !return_type.is(Keyword::Void) {
                return self.error("'main' must be declared to return void");
            }
        }

        let body = if self.check(&TokenKind::LBrace) {
            self.advance();
            self.push_scope();
            for &param in &params {
                self.declare(param);
            }
            let mut body = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                if self.at_end() {
                    return self.error("premature end of file");
                }
                body.push(self.parse_statement()?);
            }
            self.advance();
            self.pop_scope();
            Some(body)
        } else if self.check(&TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            return self.error("expected '{' or ';'");
        };

        Ok(Function {
            name,
            return_type,
            params,
            body,
            attributes,
            prototype: None,
        })
    }

    /// Qualifiers, precision, type, optional name and array dimensions of one parameter
    fn parse_parameter(&mut self) -> GlslxResult<VarId> {
        let mut qualifiers = ParamQualifiers::default();
        let mut precision = Precision::None;
        let mut base_type: Option<TypeRef> = None;
        let mut name: Option<String> = None;
        let mut array_sizes = Vec::new();

        while !self.check(&TokenKind::Comma) && !self.check(&TokenKind::RParen) {
            let kind = self.peek_kind().clone();
            match kind {
                TokenKind::Keyword(Keyword::Const) => qualifiers.constant = true,
                TokenKind::Keyword(Keyword::In) => qualifiers.input = true,
                TokenKind::Keyword(Keyword::Out) => qualifiers.output = true,
                TokenKind::Keyword(Keyword::Inout) => qualifiers.inout = true,
                TokenKind::LBracket => {
                    array_sizes.push(self.parse_array_size()?);
                    continue;
                }
                TokenKind::Keyword(kw) if precision_qualifier(kw).is_some() => {
                    precision = precision_qualifier(kw).unwrap_or_default();
                }
                TokenKind::Keyword(kw) if base_type.is_none() && (kw.is_type() || kw.is_generic()) => {
                    base_type = Some(TypeRef::Builtin(kw));
                }
                TokenKind::Ident(ident) if base_type.is_none() => match self.find_type(&ident) {
                    Some(ty) => base_type = Some(ty),
                    None => return self.error("expected type"),
                },
                TokenKind::Ident(ident) if name.is_none() => {
                    if matches!(base_type, Some(ty) if ty.is(Keyword::Void)) {
                        return self.error("'void' parameter cannot be named");
                    }
                    name = Some(ident);
                }
                _ => return self.error("syntax error in parameter list"),
            }
            self.advance();
        }

        let Some(base_type) = base_type else {
            return self.error("expected type");
        };
        Ok(self.tu.add_var(Variable {
            name: name.unwrap_or_default(),
            base_type,
            flags: VarFlags {
                array: !array_sizes.is_empty(),
                constant: qualifiers.constant,
                ..VarFlags::default()
            },
            array_sizes,
            precision,
            kind: VariableKind::Parameter { qualifiers },
        }))
    }

    /// Register a function; a generic builtin prototype becomes one function per instance
    fn register_function(&mut self, func: Function) -> GlslxResult<()> {
        let mut generics: Vec<Keyword> = Vec::new();
        let signature = std::iter::once(func.return_type)
            .chain(func.params.iter().map(|&p| self.tu.var(p).base_type));
        for ty in signature {
            if let TypeRef::Builtin(kw) = ty {
                if kw.is_generic() && !generics.contains(&kw) {
                    generics.push(kw);
                }
            }
        }

        if generics.is_empty() {
            let id = self.tu.add_func(func);
            self.tu.register_function(id);
            return Ok(());
        }
        if !(func.attributes.builtin && func.is_prototype()) {
            return self.error("generics are only allowed for builtin prototypes");
        }

        for column in 0..MAX_GENERIC_INSTANCES {
            if !generics.iter().all(|&g| generic_instances(g).len() > column) {
                continue;
            }
            let instance = self.instantiate(&func, column);
            log::trace!(
                "instantiated {}({}) as column {}",
                instance.name,
                instance
                    .params
                    .iter()
                    .map(|&p| self.tu.type_name(self.tu.var(p).base_type))
                    .collect::<Vec<_>>()
                    .join(", "),
                column
            );
            let id = self.tu.add_func(instance);
            self.tu.register_function(id);
        }
        Ok(())
    }

    fn instantiate(&mut self, func: &Function, column: usize) -> Function {
        let concrete = |ty: TypeRef| match ty {
            TypeRef::Builtin(kw) if kw.is_generic() => {
                TypeRef::Builtin(generic_instances(kw).get(column).copied().unwrap_or(kw))
            }
            other => other,
        };

        let mut instance = func.clone();
        instance.return_type = concrete(func.return_type);
        instance.params = func
            .params
            .iter()
            .map(|&param| {
                let mut var = self.tu.var(param).clone();
                var.base_type = concrete(var.base_type);
                self.tu.add_var(var)
            })
            .collect();
        instance.attributes.generic_instance = true;
        instance
    }
}

fn storage_qualifier(kw: Keyword) -> Option<Storage> {
    Some(match kw {
        Keyword::Const => Storage::Const,
        Keyword::In => Storage::In,
        Keyword::Out => Storage::Out,
        Keyword::Attribute => Storage::Attribute,
        Keyword::Uniform => Storage::Uniform,
        Keyword::Varying => Storage::Varying,
        Keyword::Buffer => Storage::Buffer,
        Keyword::Shared => Storage::Shared,
        Keyword::RayPayloadExt => Storage::RayPayload,
        Keyword::RayPayloadInExt => Storage::RayPayloadIn,
        Keyword::HitAttributeExt => Storage::HitAttribute,
        Keyword::CallableDataExt => Storage::CallableData,
        Keyword::CallableDataInExt => Storage::CallableDataIn,
        _ => return None,
    })
}

fn aux_qualifier(kw: Keyword) -> Option<AuxStorage> {
    Some(match kw {
        Keyword::Centroid => AuxStorage::Centroid,
        Keyword::Sample => AuxStorage::Sample,
        Keyword::Patch => AuxStorage::Patch,
        _ => return None,
    })
}

fn interpolation_qualifier(kw: Keyword) -> Option<Interpolation> {
    Some(match kw {
        Keyword::Smooth => Interpolation::Smooth,
        Keyword::Flat => Interpolation::Flat,
        Keyword::Noperspective => Interpolation::Noperspective,
        _ => return None,
    })
}

fn precision_qualifier(kw: Keyword) -> Option<Precision> {
    Some(match kw {
        Keyword::Lowp => Precision::Lowp,
        Keyword::Mediump => Precision::Mediump,
        Keyword::Highp => Precision::Highp,
        _ => return None,
    })
}
