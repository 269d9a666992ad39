//! Expression parsing: precedence climbing over unary/postfix operands

use std::ops::BitOr;

use super::{fold, Parser};
use crate::ast::*;
use crate::error::GlslxResult;
use crate::keywords::Keyword;
use crate::lexer::TokenKind;
use crate::types;

/// Tokens that terminate the expression being parsed, without being consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndCondition(u8);

impl EndCondition {
    pub const SEMICOLON: Self = Self(1 << 0);
    pub const PAREN: Self = Self(1 << 1);
    pub const BRACKET: Self = Self(1 << 2);
    pub const COLON: Self = Self(1 << 3);
    pub const COMMA: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for EndCondition {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Binary(BinaryOp),
    Assign(AssignOp),
    Ternary,
    Sequence,
}

/// Binary operator at `kind` and its precedence; higher binds tighter
fn operator(kind: &TokenKind) -> Option<(Operator, u8)> {
    use Operator::{Assign, Binary};
    Some(match kind {
        TokenKind::Star => (Binary(BinaryOp::Mul), 14),
        TokenKind::Slash => (Binary(BinaryOp::Div), 14),
        TokenKind::Percent => (Binary(BinaryOp::Mod), 14),
        TokenKind::Plus => (Binary(BinaryOp::Add), 13),
        TokenKind::Minus => (Binary(BinaryOp::Sub), 13),
        TokenKind::Shl => (Binary(BinaryOp::Shl), 12),
        TokenKind::Shr => (Binary(BinaryOp::Shr), 12),
        TokenKind::Lt => (Binary(BinaryOp::Lt), 11),
        TokenKind::Gt => (Binary(BinaryOp::Gt), 11),
        TokenKind::LtEq => (Binary(BinaryOp::Le), 11),
        TokenKind::GtEq => (Binary(BinaryOp::Ge), 11),
        TokenKind::EqEq => (Binary(BinaryOp::Eq), 10),
        TokenKind::BangEq => (Binary(BinaryOp::Ne), 10),
        TokenKind::Amp => (Binary(BinaryOp::BitAnd), 9),
        TokenKind::Caret => (Binary(BinaryOp::BitXor), 8),
        TokenKind::Pipe => (Binary(BinaryOp::BitOr), 7),
        TokenKind::AmpAmp => (Binary(BinaryOp::LogicalAnd), 6),
        TokenKind::CaretCaret => (Binary(BinaryOp::LogicalXor), 5),
        TokenKind::PipePipe => (Binary(BinaryOp::LogicalOr), 4),
        TokenKind::Question => (Operator::Ternary, 3),
        TokenKind::Eq => (Assign(AssignOp::Assign), 2),
        TokenKind::PlusEq => (Assign(AssignOp::Add), 2),
        TokenKind::MinusEq => (Assign(AssignOp::Sub), 2),
        TokenKind::StarEq => (Assign(AssignOp::Mul), 2),
        TokenKind::SlashEq => (Assign(AssignOp::Div), 2),
        TokenKind::PercentEq => (Assign(AssignOp::Mod), 2),
        TokenKind::ShlEq => (Assign(AssignOp::Shl), 2),
        TokenKind::ShrEq => (Assign(AssignOp::Shr), 2),
        TokenKind::AmpEq => (Assign(AssignOp::BitAnd), 2),
        TokenKind::CaretEq => (Assign(AssignOp::BitXor), 2),
        TokenKind::PipeEq => (Assign(AssignOp::BitOr), 2),
        TokenKind::Comma => (Operator::Sequence, 1),
        _ => return None,
    })
}

impl Parser {
    pub(super) fn parse_expression(&mut self, end: EndCondition) -> GlslxResult<ExprId> {
        let lhs = self.parse_unary(end)?;
        self.parse_binary(0, lhs, end)
    }

    pub(super) fn at_end_condition(&self, end: EndCondition) -> bool {
        match self.peek_kind() {
            TokenKind::Semicolon => end.contains(EndCondition::SEMICOLON),
            TokenKind::RParen => end.contains(EndCondition::PAREN),
            TokenKind::RBracket => end.contains(EndCondition::BRACKET),
            TokenKind::Colon => end.contains(EndCondition::COLON),
            TokenKind::Comma => end.contains(EndCondition::COMMA),
            _ => false,
        }
    }

    fn next_operator(&self, end: EndCondition) -> Option<(Operator, u8)> {
        if self.at_end_condition(end) {
            return None;
        }
        operator(self.peek_kind())
    }

    fn parse_binary(&mut self, min_prec: u8, mut lhs: ExprId, end: EndCondition) -> GlslxResult<ExprId> {
        while let Some((op, prec)) = self.next_operator(end) {
            if prec < min_prec {
                break;
            }
            self.advance();

            if op == Operator::Ternary {
                let on_true = self.parse_expression(EndCondition::COLON)?;
                if !self.check(&TokenKind::Colon) {
                    return self.error("expected ':' for else case in ternary statement");
                }
                self.advance();
                let on_false = self.parse_expression(end)?;
                lhs = self.tu.add_expr(Expr::Ternary {
                    condition: lhs,
                    on_true,
                    on_false,
                });
                continue;
            }

            let right_assoc = matches!(op, Operator::Assign(_));
            let mut rhs = self.parse_unary(end)?;
            while let Some((_, next_prec)) = self.next_operator(end) {
                if next_prec > prec {
                    rhs = self.parse_binary(prec + 1, rhs, end)?;
                } else if right_assoc && next_prec == prec {
                    rhs = self.parse_binary(prec, rhs, end)?;
                } else {
                    break;
                }
            }

            lhs = match op {
                Operator::Binary(op) => self.tu.add_expr(Expr::Binary { op, lhs, rhs }),
                Operator::Assign(op) => {
                    self.check_lvalue(lhs)?;
                    self.tu.add_expr(Expr::Assign { op, lhs, rhs })
                }
                _ => self.tu.add_expr(Expr::Sequence { lhs, rhs }),
            };
        }
        Ok(lhs)
    }

    /// Assignment targets must bottom out in a writable variable
    fn check_lvalue(&self, lhs: ExprId) -> GlslxResult<()> {
        let mut id = lhs;
        let var = loop {
            match self.tu.expr(id) {
                Expr::Subscript { operand, .. } | Expr::FieldOrSwizzle { operand, .. } => {
                    id = *operand
                }
                Expr::Variable(var) => break self.tu.var(*var),
                _ => return self.error("not a valid lvalue"),
            }
        };
        match var.storage() {
            Storage::In => self.error("cannot write to a variable declared as input"),
            Storage::Const => self.error("cannot write to a const variable outside of its declaration"),
            _ if var.flags.constant => {
                self.error("cannot write to a const variable outside of its declaration")
            }
            _ => Ok(()),
        }
    }

    /// A prefix expression followed by any postfix `.x`, `[i]`, `++` or `--`
    pub(super) fn parse_unary(&mut self, end: EndCondition) -> GlslxResult<ExprId> {
        let mut operand = self.parse_prefix(end)?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    operand = self.parse_field_access(operand)?;
                }
                TokenKind::LBracket => operand = self.parse_subscript(operand)?,
                TokenKind::PlusPlus => {
                    self.advance();
                    let op = UnaryOp::PostIncrement;
                    return Ok(self.tu.add_expr(Expr::Unary { op, operand }));
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    let op = UnaryOp::PostDecrement;
                    return Ok(self.tu.add_expr(Expr::Unary { op, operand }));
                }
                _ => return Ok(operand),
            }
        }
    }

    fn parse_prefix(&mut self, end: EndCondition) -> GlslxResult<ExprId> {
        let kind = self.peek_kind().clone();
        let prefix = match kind {
            TokenKind::Bang => Some(UnaryOp::LogicalNot),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::PlusPlus => Some(UnaryOp::PreIncrement),
            TokenKind::MinusMinus => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = prefix {
            self.advance();
            let operand = self.parse_unary(end)?;
            return Ok(self.tu.add_expr(Expr::Unary { op, operand }));
        }

        match kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(EndCondition::PAREN)?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            TokenKind::Keyword(Keyword::True) => self.literal(Constant::Bool(true)),
            TokenKind::Keyword(Keyword::False) => self.literal(Constant::Bool(false)),
            TokenKind::Keyword(kw) if kw.is_type() => self.parse_constructor(TypeRef::Builtin(kw)),
            TokenKind::Number(value) => self.literal(value),
            TokenKind::Ident(name) => {
                if matches!(self.peek_nth(1), TokenKind::LParen) {
                    return match self.find_type(&name) {
                        Some(ty) => self.parse_constructor(ty),
                        None => self.parse_function_call(name),
                    };
                }
                let Some(var) = self.find_variable(&name) else {
                    return self.error(format!("'{}' was not declared in this scope", name));
                };
                self.advance();
                Ok(self.tu.add_expr(Expr::Variable(var)))
            }
            _ => self.error("syntax error"),
        }
    }

    fn literal(&mut self, value: Constant) -> GlslxResult<ExprId> {
        self.advance();
        Ok(self.tu.add_expr(Expr::Constant(value)))
    }

    /// `T(args)`, or `T[](args)` / `T[N](args)` for an array
    fn parse_constructor(&mut self, ty: TypeRef) -> GlslxResult<ExprId> {
        self.advance();
        if self.check(&TokenKind::LBracket) {
            self.advance();
            if !self.check(&TokenKind::RBracket) {
                self.parse_expression(EndCondition::BRACKET)?;
            }
            self.expect(TokenKind::RBracket, "expected ']' in array constructor")?;
            let items = self.parse_arguments("expected '(' for array constructor")?;
            return Ok(self.tu.add_expr(Expr::ArraySpecifier(items)));
        }
        let args = self.parse_arguments("expected '(' for constructor call")?;
        Ok(self.tu.add_expr(Expr::Constructor { ty, args }))
    }

    fn parse_function_call(&mut self, name: String) -> GlslxResult<ExprId> {
        self.advance();
        let args = self.parse_arguments("expected '(' for function call")?;
        let id = self.tu.add_expr(Expr::Call(FunctionCall {
            name,
            args,
            func: None,
        }));
        self.calls.push(id);
        Ok(id)
    }

    fn parse_arguments(&mut self, open_message: &str) -> GlslxResult<Vec<ExprId>> {
        self.expect(TokenKind::LParen, open_message)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_expression(EndCondition::COMMA | EndCondition::PAREN)?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RParen) {
                return self.error("expected ',' or ')' in argument list");
            }
        }
        self.advance();
        Ok(args)
    }

    fn parse_field_access(&mut self, operand: ExprId) -> GlslxResult<ExprId> {
        let Some(name) = self.peek_ident().map(str::to_string) else {
            return self.error("expected field identifier or swizzle after '.'");
        };
        let field = match types::result_type(&self.tu, operand) {
            Some(TypeRef::Struct(id)) => {
                let decl = self.tu.structure(id);
                match decl.fields.iter().copied().find(|&f| self.tu.var(f).name == name) {
                    Some(field) => Some(field),
                    None => {
                        return self.error(format!(
                            "field '{}' does not exist in structure {}",
                            name,
                            self.tu.type_name(TypeRef::Struct(id))
                        ))
                    }
                }
            }
            _ => None,
        };
        self.advance();
        Ok(self.tu.add_expr(Expr::FieldOrSwizzle {
            operand,
            name,
            field,
        }))
    }

    fn parse_subscript(&mut self, operand: ExprId) -> GlslxResult<ExprId> {
        if !self.is_subscriptable(operand) {
            return self.error("cannot be subscripted");
        }
        self.advance();
        let index = self.parse_expression(EndCondition::BRACKET)?;
        let index = if fold::is_constant(&self.tu, index) {
            self.evaluate(index)?
        } else {
            index
        };
        self.expect(TokenKind::RBracket, "expected ']' after subscript")?;
        Ok(self.tu.add_expr(Expr::Subscript { operand, index }))
    }

    /// Variables, calls and structure fields, possibly behind further subscripts or swizzles
    fn is_subscriptable(&self, mut id: ExprId) -> bool {
        loop {
            match self.tu.expr(id) {
                Expr::Variable(_) | Expr::Call(_) => return true,
                Expr::FieldOrSwizzle { field: Some(_), .. } => return true,
                Expr::FieldOrSwizzle { operand, .. } | Expr::Subscript { operand, .. } => {
                    id = *operand
                }
                _ => return false,
            }
        }
    }

    /// Initializer of an array or vector: `{ ... }`, `T[](...)` or a plain expression
    pub(super) fn parse_array_specifier(&mut self, end: EndCondition) -> GlslxResult<ExprId> {
        let mut accept_paren = false;
        if matches!(self.peek_kind(), TokenKind::Keyword(kw) if kw.is_type())
            && matches!(self.peek_nth(1), TokenKind::LBracket)
        {
            self.advance();
            self.advance();
            if !self.check(&TokenKind::RBracket) {
                self.parse_expression(EndCondition::BRACKET)?;
            }
            self.expect(TokenKind::RBracket, "expected ']' in array constructor")?;
            if !self.check(&TokenKind::LParen) {
                return self.error("expected '(' for array constructor");
            }
            accept_paren = true;
        }

        if !(self.check(&TokenKind::LBrace) || (accept_paren && self.check(&TokenKind::LParen))) {
            return self.parse_expression(end);
        }

        self.advance();
        let mut items = Vec::new();
        let inner = end | EndCondition::PAREN | EndCondition::COMMA;
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::RParen) {
            items.push(self.parse_array_specifier(inner)?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::RParen) {
                return self.error("expected ',' in initializer list");
            }
        }
        self.advance();
        Ok(self.tu.add_expr(Expr::ArraySpecifier(items)))
    }
}
