//! Statement parsing, including the declaration-or-expression backtrack

use std::collections::HashSet;

use super::{fold, EndCondition, Parser};
use crate::ast::*;
use crate::error::{GlslxError, GlslxResult};
use crate::keywords::Keyword;
use crate::lexer::TokenKind;
use crate::types;

impl Parser {
    pub(super) fn parse_statement(&mut self) -> GlslxResult<StmtId> {
        let attributes = self.parse_attributes()?;
        let kind = self.peek_kind().clone();

        let stmt = match kind {
            TokenKind::LBrace => {
                self.push_scope();
                let body = self.parse_compound()?;
                self.pop_scope();
                Stmt::Compound(body)
            }
            TokenKind::Semicolon => {
                self.advance();
                Stmt::Empty
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(attributes)?,
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch(attributes)?,
            TokenKind::Keyword(Keyword::Case) | TokenKind::Keyword(Keyword::Default) => {
                self.parse_case_label()?
            }
            TokenKind::Keyword(Keyword::For) => {
                self.push_scope();
                let stmt = self.parse_for(attributes);
                self.pop_scope();
                stmt?
            }
            TokenKind::Keyword(Keyword::Do) => self.parse_do(attributes)?,
            TokenKind::Keyword(Keyword::While) => self.parse_while(attributes)?,
            TokenKind::Keyword(Keyword::Continue) => self.parse_jump(Stmt::Continue, "continue")?,
            TokenKind::Keyword(Keyword::Break) => self.parse_jump(Stmt::Break, "break")?,
            TokenKind::Keyword(Keyword::Discard) => self.parse_jump(Stmt::Discard, "discard")?,
            TokenKind::Keyword(kw @ (Keyword::IgnoreIntersectionExt | Keyword::TerminateRayExt)) => {
                self.parse_jump(Stmt::ExtJump(kw), kw.as_str())?
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression(EndCondition::SEMICOLON)?)
                };
                self.expect(TokenKind::Semicolon, "expected semicolon after return statement")?;
                Stmt::Return(value)
            }
            _ => {
                let stmt = self.parse_declaration_or_expression(EndCondition::SEMICOLON)?;
                self.expect(TokenKind::Semicolon, "expected ';' after statement")?;
                return Ok(stmt);
            }
        };
        Ok(self.tu.add_stmt(stmt))
    }

    /// `{ ... }`; the caller owns the scope
    fn parse_compound(&mut self) -> GlslxResult<Vec<StmtId>> {
        self.advance();
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_end() {
                return self.error("premature end of file");
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    /// `[[unroll, min_iterations(4), ...]]` ahead of a statement
    fn parse_attributes(&mut self) -> GlslxResult<CtrlFlowAttributes> {
        let mut attributes = CtrlFlowAttributes::default();
        if !self.at_attribute() {
            return Ok(attributes);
        }
        self.advance();
        self.advance();

        while !self.check(&TokenKind::RBracket) {
            let span = self.current_span();
            let Some(name) = self.peek_ident().map(str::to_string) else {
                return self.error("invalid attribute");
            };
            self.advance();
            match name.as_str() {
                "unroll" => attributes.unroll = true,
                "dont_unroll" => attributes.dont_unroll = true,
                "loop" => attributes.loop_ = true,
                "dependency_infinite" => attributes.dependency_infinite = true,
                "flatten" => attributes.flatten = true,
                "dont_flatten" => attributes.dont_flatten = true,
                "branch" => attributes.branch = true,
                "dependency_length" => attributes.dependency_length = Some(self.parse_attribute_value()?),
                "min_iterations" => attributes.min_iterations = Some(self.parse_attribute_value()?),
                "max_iterations" => attributes.max_iterations = Some(self.parse_attribute_value()?),
                "iteration_multiple" => {
                    attributes.iteration_multiple = Some(self.parse_attribute_value()?)
                }
                "peel_count" => attributes.peel_count = Some(self.parse_attribute_value()?),
                "partial_count" => attributes.partial_count = Some(self.parse_attribute_value()?),
                _ => return Err(GlslxError::parser("invalid attribute", span)),
            }
            if self.check(&TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RBracket, "expected ']]' after attributes")?;
        self.expect(TokenKind::RBracket, "expected ']]' after attributes")?;
        Ok(attributes)
    }

    fn parse_attribute_value(&mut self) -> GlslxResult<i32> {
        self.expect(TokenKind::LParen, "expected '('")?;
        let value = match self.peek_kind() {
            TokenKind::Number(Constant::Int(v)) => *v,
            _ => return self.error("expected const int"),
        };
        self.advance();
        self.expect(TokenKind::RParen, "expected ')'")?;
        Ok(value)
    }

    fn parse_if(&mut self, attributes: CtrlFlowAttributes) -> GlslxResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'if'")?;
        let condition = self.parse_expression(EndCondition::PAREN)?;
        self.expect(TokenKind::RParen, "expected ')' after if condition")?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(Stmt::If {
            attributes,
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_switch(&mut self, attributes: CtrlFlowAttributes) -> GlslxResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'switch'")?;
        let expression = self.parse_expression(EndCondition::PAREN)?;
        self.expect(TokenKind::RParen, "expected ')' after switch expression")?;
        if !self.check(&TokenKind::LBrace) {
            return self.error("expected '{' after ')'");
        }
        self.advance();

        let mut body = Vec::new();
        let mut labels = HashSet::new();
        let mut has_default = false;
        self.push_scope();
        while !self.check(&TokenKind::RBrace) {
            if self.at_end() {
                return self.error("premature end of file");
            }
            let span = self.current_span();
            let stmt = self.parse_statement()?;
            match self.tu.stmt(stmt).clone() {
                Stmt::CaseLabel(Some(label)) => {
                    if !fold::is_constant(&self.tu, label) {
                        return Err(GlslxError::parser(
                            "case label is not a valid constant expression",
                            span,
                        ));
                    }
                    let label = self.evaluate(label)?;
                    let value = match self.tu.constant(label) {
                        Some(Constant::Int(v)) => v as i64,
                        Some(Constant::Uint(v)) => v as i64,
                        _ => {
                            return Err(GlslxError::parser(
                                "case label must be scalar 'int' or 'uint'",
                                span,
                            ))
                        }
                    };
                    if !labels.insert(value) {
                        return Err(GlslxError::parser(
                            format!("duplicate case label '{}'", value),
                            span,
                        ));
                    }
                    self.tu.stmts[stmt.index()] = Stmt::CaseLabel(Some(label));
                }
                Stmt::CaseLabel(None) => {
                    if has_default {
                        return Err(GlslxError::parser("duplicate 'default' case label", span));
                    }
                    has_default = true;
                }
                _ => {}
            }
            body.push(stmt);
        }
        self.advance();
        self.pop_scope();

        Ok(Stmt::Switch {
            attributes,
            expression,
            body,
        })
    }

    fn parse_case_label(&mut self) -> GlslxResult<Stmt> {
        if self.check_keyword(Keyword::Default) {
            self.advance();
            self.expect(TokenKind::Colon, "expected ':' after 'default' in case label")?;
            return Ok(Stmt::CaseLabel(None));
        }
        self.advance();
        let label = self.parse_expression(EndCondition::COLON)?;
        self.expect(TokenKind::Colon, "expected ':' after case label")?;
        Ok(Stmt::CaseLabel(Some(label)))
    }

    /// `for (init; condition; step) body`; the caller owns the loop scope
    fn parse_for(&mut self, attributes: CtrlFlowAttributes) -> GlslxResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'for'")?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_declaration_or_expression(EndCondition::SEMICOLON)?)
        };
        self.expect(TokenKind::Semicolon, "expected ';' after for-loop initializer")?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(EndCondition::SEMICOLON)?)
        };
        self.expect(TokenKind::Semicolon, "expected ';' after for-loop condition")?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(EndCondition::PAREN)?)
        };
        self.expect(TokenKind::RParen, "expected ')' after for-loop step")?;

        let body = self.parse_statement()?;
        Ok(Stmt::For {
            attributes,
            init,
            condition,
            step,
            body,
        })
    }

    fn parse_do(&mut self, attributes: CtrlFlowAttributes) -> GlslxResult<Stmt> {
        self.advance();
        let body = self.parse_statement()?;
        if !self.check_keyword(Keyword::While) {
            return self.error("expected 'while' after 'do'");
        }
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'while'")?;
        let condition = self.parse_expression(EndCondition::PAREN)?;
        self.expect(TokenKind::RParen, "expected ')' after while condition")?;
        self.expect(TokenKind::Semicolon, "expected semicolon after do-while statement")?;
        Ok(Stmt::Do {
            attributes,
            body,
            condition,
        })
    }

    fn parse_while(&mut self, attributes: CtrlFlowAttributes) -> GlslxResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "expected '(' after 'while'")?;
        let condition = self.parse_declaration_or_expression(EndCondition::PAREN)?;
        self.expect(TokenKind::RParen, "expected ')' after while condition")?;
        let body = self.parse_statement()?;
        Ok(Stmt::While {
            attributes,
            condition,
            body,
        })
    }

    fn parse_jump(&mut self, stmt: Stmt, what: &str) -> GlslxResult<Stmt> {
        self.advance();
        self.expect(
            TokenKind::Semicolon,
            &format!("expected semicolon after {} statement", what),
        )?;
        Ok(stmt)
    }

    /// A local declaration if the tokens read as one, otherwise an expression statement.
    /// The terminator is left for the caller.
    pub(super) fn parse_declaration_or_expression(&mut self, end: EndCondition) -> GlslxResult<StmtId> {
        if let Some(decl) = self.parse_declaration(end)? {
            return Ok(decl);
        }
        let expr = self.parse_expression(end)?;
        Ok(self.tu.add_stmt(Stmt::Expression(expr)))
    }

    /// `[const] [precision] T[dims] name[dims] = init, ...`; rewinds and
    /// yields `None` when the first declarator does not look like a declaration
    fn parse_declaration(&mut self, end: EndCondition) -> GlslxResult<Option<StmtId>> {
        let checkpoint = self.checkpoint();

        let constant = self.check_keyword(Keyword::Const);
        if constant {
            self.advance();
        }
        let precision = match self.peek_kind() {
            TokenKind::Keyword(kw) => super::precision_qualifier(*kw),
            _ => None,
        };
        if precision.is_some() {
            self.advance();
        }
        let ty = match self.peek_kind() {
            TokenKind::Keyword(kw) if kw.is_type() => Some(TypeRef::Builtin(*kw)),
            TokenKind::Ident(name) => self.find_type(name),
            _ => None,
        };
        let Some(ty) = ty else {
            self.rewind(checkpoint);
            return Ok(None);
        };
        self.advance();

        let mut type_sizes = Vec::new();
        while self.check(&TokenKind::LBracket) {
            type_sizes.insert(0, self.parse_array_size()?);
        }

        let mut vars = Vec::new();
        loop {
            let mut parens = 0;
            while self.check(&TokenKind::LParen) {
                parens += 1;
                self.advance();
            }
            let Some(name) = self.peek_ident().map(str::to_string) else {
                self.rewind(checkpoint);
                return Ok(None);
            };
            self.advance();
            for _ in 0..parens {
                if !self.check(&TokenKind::RParen) {
                    self.rewind(checkpoint);
                    return Ok(None);
                }
                self.advance();
            }

            let mut array_sizes = type_sizes.clone();
            while self.check(&TokenKind::LBracket) {
                array_sizes.push(self.parse_array_size()?);
            }

            if vars.is_empty()
                && !self.check(&TokenKind::Eq)
                && !self.check(&TokenKind::Comma)
                && !self.at_end_condition(end)
            {
                self.rewind(checkpoint);
                return Ok(None);
            }

            let is_array = !array_sizes.is_empty();
            let initial_value = if self.check(&TokenKind::Eq) {
                self.advance();
                let end = end | EndCondition::COMMA;
                let aggregate = is_array || matches!(ty, TypeRef::Builtin(kw) if types::is_vector(kw));
                Some(if aggregate {
                    self.parse_array_specifier(end)?
                } else {
                    self.parse_expression(end)?
                })
            } else {
                None
            };
            if constant && initial_value.is_none() {
                return self.error("const-qualified variable declared but not initialized");
            }

            let var = self.tu.add_var(Variable {
                name,
                base_type: ty,
                array_sizes,
                flags: VarFlags {
                    array: is_array,
                    constant,
                    ..VarFlags::default()
                },
                precision: precision.unwrap_or_default(),
                kind: VariableKind::Local { initial_value },
            });
            self.declare(var);
            vars.push(var);

            if self.at_end_condition(end) {
                break;
            }
            if !self.check(&TokenKind::Comma) {
                return self.error("syntax error during declaration statement");
            }
            self.advance();
        }

        Ok(Some(self.tu.add_stmt(Stmt::Declaration(vars))))
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use pretty_assertions::assert_eq;

    fn main_body(source: &str) -> (TranslationUnit, Vec<StmtId>) {
        let tu = match parse(source, Stage::Fragment) {
            Ok(tu) => tu,
            Err(e) => panic!("parse failed: {}", e.message()),
        };
        let main = tu.main_function().unwrap();
        let body = tu.func(main).body.clone().unwrap();
        (tu, body)
    }

    fn error_of(body: &str) -> String {
        let source = format!("void main() {{ {} }}", body);
        match parse(&source, Stage::Fragment) {
            Ok(_) => panic!("expected an error for {:?}", body),
            Err(e) => e.message(),
        }
    }

    #[test]
    fn test_declaration_versus_expression() {
        let (tu, body) = main_body(
            "struct S { float x; };\n\
             void main() { S s; float a = 1.0, b; a * b; s.x = a; }",
        );
        assert!(matches!(tu.stmt(body[0]), Stmt::Declaration(v) if v.len() == 1));
        assert!(matches!(tu.stmt(body[1]), Stmt::Declaration(v) if v.len() == 2));
        assert!(matches!(tu.stmt(body[2]), Stmt::Expression(_)));
        assert!(matches!(tu.stmt(body[3]), Stmt::Expression(_)));
    }

    #[test]
    fn test_local_const_is_not_folded() {
        let (tu, body) = main_body("void main() { const int k = 2 + 3; }");
        let Stmt::Declaration(vars) = tu.stmt(body[0]) else {
            panic!("expected a declaration");
        };
        let var = tu.var(vars[0]);
        assert!(var.flags.constant);
        assert!(matches!(tu.expr(var.initial_value().unwrap()), Expr::Binary { .. }));
    }

    #[test]
    fn test_loops_and_attributes() {
        let (tu, body) = main_body(
            "void main() {\n\
               [[unroll, min_iterations(2)]] for (int i = 0; i < 4; ++i) { continue; }\n\
               do { break; } while (false);\n\
               while (true) discard;\n\
             }",
        );
        match tu.stmt(body[0]) {
            Stmt::For { attributes, init, condition, step, .. } => {
                assert!(attributes.unroll);
                assert_eq!(attributes.min_iterations, Some(2));
                assert!(init.is_some() && condition.is_some() && step.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(tu.stmt(body[1]), Stmt::Do { .. }));
        assert!(matches!(tu.stmt(body[2]), Stmt::While { .. }));
    }

    #[test]
    fn test_switch_labels_fold() {
        let (tu, body) = main_body(
            "const int K = 2;\n\
             void main() { int x = 0; switch (x) { case K + 1: break; default: break; } }",
        );
        let Stmt::Switch { body: cases, .. } = tu.stmt(body[1]) else {
            panic!("expected a switch");
        };
        let Stmt::CaseLabel(Some(label)) = tu.stmt(cases[0]) else {
            panic!("expected a case label");
        };
        assert_eq!(tu.constant(*label), Some(Constant::Int(3)));
    }

    #[test]
    fn test_statement_errors() {
        assert_eq!(error_of("int x; switch (x) { case 1: case 1: break; }"), "duplicate case label '1'");
        assert_eq!(
            error_of("int x; switch (x) { default: default: break; }"),
            "duplicate 'default' case label"
        );
        assert_eq!(
            error_of("int x; switch (x) { case 1.0: break; }"),
            "case label must be scalar 'int' or 'uint'"
        );
        assert_eq!(
            error_of("int x; int y; switch (x) { case y: break; }"),
            "case label is not a valid constant expression"
        );
        assert_eq!(error_of("if true) {}"), "expected '(' after 'if'");
        assert_eq!(error_of("do {} until (true);"), "expected 'while' after 'do'");
        assert_eq!(error_of("break }"), "expected semicolon after break statement");
        assert_eq!(error_of("return 1 }"), "expected semicolon after return statement");
        assert_eq!(error_of("[[bogus]] if (true) {}"), "invalid attribute");
        assert_eq!(error_of("[[max_iterations(x)]] for (;;) {}"), "expected const int");
        assert_eq!(error_of("const int k;"), "const-qualified variable declared but not initialized");
        assert_eq!(error_of("float a = 1.0 b;"), "syntax error during declaration statement");
    }
}
