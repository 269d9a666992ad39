//! Constant expression checks and folding
//!
//! `is_constant` is the structural test used wherever the language demands a
//! constant; `evaluate` replaces a provably constant expression with a literal.
//! Constructors and array specifiers are not evaluated themselves, only their
//! children are folded in place.

use crate::ast::{BinaryOp, Constant, Expr, ExprId, Storage, TranslationUnit, UnaryOp};

const NOT_CONSTANT: &str = "not a valid constant expression";
const INVALID_OPERATION: &str = "invalid operation in constant expression";
const DIVISION_BY_ZERO: &str = "division by zero in constant expression";

/// Whether `id` is built only from literals, constant variables and operators over them
pub fn is_constant(tu: &TranslationUnit, id: ExprId) -> bool {
    match tu.expr(id) {
        Expr::Constant(_) => true,
        Expr::Variable(var) => {
            let var = tu.var(*var);
            let immutable = var.storage() == Storage::Const || var.flags.constant;
            immutable && var.initial_value().map_or(false, |init| is_constant(tu, init))
        }
        Expr::Unary { op, operand } => {
            matches!(
                op,
                UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot | UnaryOp::LogicalNot
            ) && is_constant(tu, *operand)
        }
        Expr::Binary { lhs, rhs, .. } | Expr::Sequence { lhs, rhs } => {
            is_constant(tu, *lhs) && is_constant(tu, *rhs)
        }
        Expr::Ternary {
            condition,
            on_true,
            on_false,
        } => is_constant(tu, *condition) && is_constant(tu, *on_true) && is_constant(tu, *on_false),
        Expr::Constructor { args, .. } => args.iter().all(|&arg| is_constant(tu, arg)),
        Expr::ArraySpecifier(items) => items.iter().all(|&item| is_constant(tu, item)),
        Expr::FieldOrSwizzle { .. }
        | Expr::Subscript { .. }
        | Expr::Call(_)
        | Expr::Assign { .. } => false,
    }
}

/// Fold `id` to a literal node; aggregates keep their node with folded children
pub fn evaluate(tu: &mut TranslationUnit, id: ExprId) -> Result<ExprId, &'static str> {
    match tu.expr(id).clone() {
        Expr::Constant(_) | Expr::Sequence { .. } => Ok(id),
        Expr::Variable(var) => match tu.var(var).initial_value() {
            Some(init) => evaluate(tu, init),
            None => Err(NOT_CONSTANT),
        },
        Expr::Unary { op, operand } => {
            let operand = evaluate(tu, operand)?;
            let value = fold_unary(op, literal(tu, operand)?)?;
            Ok(tu.add_expr(Expr::Constant(value)))
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(tu, lhs)?;
            let rhs = evaluate(tu, rhs)?;
            let value = fold_binary(op, literal(tu, lhs)?, literal(tu, rhs)?)?;
            Ok(tu.add_expr(Expr::Constant(value)))
        }
        Expr::Ternary {
            condition,
            on_true,
            on_false,
        } => {
            let condition = evaluate(tu, condition)?;
            match literal(tu, condition)? {
                Constant::Bool(true) => evaluate(tu, on_true),
                Constant::Bool(false) => evaluate(tu, on_false),
                _ => Err(INVALID_OPERATION),
            }
        }
        Expr::Constructor { ty, args } => {
            let args = evaluate_all(tu, &args)?;
            *tu.expr_mut(id) = Expr::Constructor { ty, args };
            Ok(id)
        }
        Expr::ArraySpecifier(items) => {
            let items = evaluate_all(tu, &items)?;
            *tu.expr_mut(id) = Expr::ArraySpecifier(items);
            Ok(id)
        }
        _ => Err(NOT_CONSTANT),
    }
}

fn evaluate_all(tu: &mut TranslationUnit, ids: &[ExprId]) -> Result<Vec<ExprId>, &'static str> {
    ids.iter().map(|&id| evaluate(tu, id)).collect()
}

fn literal(tu: &TranslationUnit, id: ExprId) -> Result<Constant, &'static str> {
    tu.constant(id).ok_or(INVALID_OPERATION)
}

fn fold_unary(op: UnaryOp, value: Constant) -> Result<Constant, &'static str> {
    use Constant::*;
    Ok(match (op, value) {
        (UnaryOp::Plus, Bool(_)) => return Err(INVALID_OPERATION),
        (UnaryOp::Plus, v) => v,
        (UnaryOp::Minus, Short(v)) => Short(v.wrapping_neg()),
        (UnaryOp::Minus, Ushort(v)) => Ushort(v.wrapping_neg()),
        (UnaryOp::Minus, Int(v)) => Int(v.wrapping_neg()),
        (UnaryOp::Minus, Uint(v)) => Uint(v.wrapping_neg()),
        (UnaryOp::Minus, Long(v)) => Long(v.wrapping_neg()),
        (UnaryOp::Minus, Ulong(v)) => Ulong(v.wrapping_neg()),
        (UnaryOp::Minus, Half(v)) => Half(-v),
        (UnaryOp::Minus, Float(v)) => Float(-v),
        (UnaryOp::Minus, Double(v)) => Double(-v),
        (UnaryOp::BitNot, Short(v)) => Short(!v),
        (UnaryOp::BitNot, Ushort(v)) => Ushort(!v),
        (UnaryOp::BitNot, Int(v)) => Int(!v),
        (UnaryOp::BitNot, Uint(v)) => Uint(!v),
        (UnaryOp::BitNot, Long(v)) => Long(!v),
        (UnaryOp::BitNot, Ulong(v)) => Ulong(!v),
        (UnaryOp::LogicalNot, Bool(v)) => Bool(!v),
        _ => return Err(INVALID_OPERATION),
    })
}

/// Position in the implicit conversion order; the higher operand type wins
fn rank(value: &Constant) -> u8 {
    match value {
        Constant::Bool(_) => 0,
        Constant::Short(_) => 1,
        Constant::Ushort(_) => 2,
        Constant::Int(_) => 3,
        Constant::Uint(_) => 4,
        Constant::Long(_) => 5,
        Constant::Ulong(_) => 6,
        Constant::Half(_) => 7,
        Constant::Float(_) => 8,
        Constant::Double(_) => 9,
    }
}

fn as_f64(value: Constant) -> f64 {
    match value {
        Constant::Half(v) | Constant::Float(v) => v as f64,
        Constant::Double(v) => v,
        Constant::Bool(v) => v as u8 as f64,
        Constant::Ulong(v) => v as f64,
        other => other.as_i64().unwrap_or(0) as f64,
    }
}

fn as_i64(value: Constant) -> i64 {
    match value {
        Constant::Half(v) | Constant::Float(v) => v as i64,
        Constant::Double(v) => v as i64,
        Constant::Bool(v) => v as i64,
        other => other.as_i64().unwrap_or(0),
    }
}

/// `value` converted to the literal type of `like`
fn convert(value: Constant, like: Constant) -> Constant {
    let (i, f) = (as_i64(value), as_f64(value));
    match like {
        Constant::Short(_) => Constant::Short(i as i16),
        Constant::Ushort(_) => Constant::Ushort(i as u16),
        Constant::Int(_) => Constant::Int(i as i32),
        Constant::Uint(_) => Constant::Uint(i as u32),
        Constant::Long(_) => Constant::Long(i),
        Constant::Ulong(_) => Constant::Ulong(i as u64),
        Constant::Half(_) => Constant::Half(f as f32),
        Constant::Float(_) => Constant::Float(f as f32),
        Constant::Double(_) => Constant::Double(f),
        Constant::Bool(_) => Constant::Bool(f != 0.0),
    }
}

fn truth(value: Constant) -> Result<bool, &'static str> {
    match value {
        Constant::Bool(v) => Ok(v),
        Constant::Half(_) | Constant::Float(_) | Constant::Double(_) => Err(INVALID_OPERATION),
        other => Ok(as_i64(other) != 0),
    }
}

fn fold_binary(op: BinaryOp, lhs: Constant, rhs: Constant) -> Result<Constant, &'static str> {
    use Constant::*;

    if op.is_logical() {
        let (a, b) = (truth(lhs)?, truth(rhs)?);
        return Ok(Bool(match op {
            BinaryOp::LogicalAnd => a && b,
            BinaryOp::LogicalOr => a || b,
            _ => a != b,
        }));
    }

    // shifts keep the type of the shifted value
    if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
        let amount = match rhs {
            Half(_) | Float(_) | Double(_) | Bool(_) => return Err(INVALID_OPERATION),
            other => as_i64(other) as u32,
        };
        let shl = op == BinaryOp::Shl;
        return Ok(match lhs {
            Short(v) => Short(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            Ushort(v) => Ushort(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            Int(v) => Int(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            Uint(v) => Uint(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            Long(v) => Long(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            Ulong(v) => Ulong(if shl { v.wrapping_shl(amount) } else { v.wrapping_shr(amount) }),
            _ => return Err(INVALID_OPERATION),
        });
    }

    let common = if rank(&lhs) >= rank(&rhs) { lhs } else { rhs };
    let (lhs, rhs) = (convert(lhs, common), convert(rhs, common));

    macro_rules! integer {
        ($a:expr, $b:expr, $ctor:path) => {
            match op {
                BinaryOp::Mul => $ctor($a.wrapping_mul($b)),
                BinaryOp::Div if $b == 0 => return Err(DIVISION_BY_ZERO),
                BinaryOp::Div => $ctor($a.wrapping_div($b)),
                BinaryOp::Mod if $b == 0 => return Err(DIVISION_BY_ZERO),
                BinaryOp::Mod => $ctor($a.wrapping_rem($b)),
                BinaryOp::Add => $ctor($a.wrapping_add($b)),
                BinaryOp::Sub => $ctor($a.wrapping_sub($b)),
                BinaryOp::BitAnd => $ctor($a & $b),
                BinaryOp::BitXor => $ctor($a ^ $b),
                BinaryOp::BitOr => $ctor($a | $b),
                BinaryOp::Lt => Bool($a < $b),
                BinaryOp::Gt => Bool($a > $b),
                BinaryOp::Le => Bool($a <= $b),
                BinaryOp::Ge => Bool($a >= $b),
                BinaryOp::Eq => Bool($a == $b),
                BinaryOp::Ne => Bool($a != $b),
                _ => return Err(INVALID_OPERATION),
            }
        };
    }

    macro_rules! floating {
        ($a:expr, $b:expr, $ctor:path) => {
            match op {
                BinaryOp::Mul => $ctor($a * $b),
                BinaryOp::Div => $ctor($a / $b),
                BinaryOp::Add => $ctor($a + $b),
                BinaryOp::Sub => $ctor($a - $b),
                BinaryOp::Lt => Bool($a < $b),
                BinaryOp::Gt => Bool($a > $b),
                BinaryOp::Le => Bool($a <= $b),
                BinaryOp::Ge => Bool($a >= $b),
                BinaryOp::Eq => Bool($a == $b),
                BinaryOp::Ne => Bool($a != $b),
                _ => return Err(INVALID_OPERATION),
            }
        };
    }

    Ok(match (lhs, rhs) {
        (Short(a), Short(b)) => integer!(a, b, Short),
        (Ushort(a), Ushort(b)) => integer!(a, b, Ushort),
        (Int(a), Int(b)) => integer!(a, b, Int),
        (Uint(a), Uint(b)) => integer!(a, b, Uint),
        (Long(a), Long(b)) => integer!(a, b, Long),
        (Ulong(a), Ulong(b)) => integer!(a, b, Ulong),
        (Half(a), Half(b)) => floating!(a, b, Half),
        (Float(a), Float(b)) => floating!(a, b, Float),
        (Double(a), Double(b)) => floating!(a, b, Double),
        (Bool(a), Bool(b)) => match op {
            BinaryOp::Eq => Bool(a == b),
            BinaryOp::Ne => Bool(a != b),
            _ => return Err(INVALID_OPERATION),
        },
        _ => return Err(INVALID_OPERATION),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Stage, TypeRef};
    use crate::keywords::Keyword;

    fn lit(tu: &mut TranslationUnit, value: Constant) -> ExprId {
        tu.add_expr(Expr::Constant(value))
    }

    fn fold(tu: &mut TranslationUnit, id: ExprId) -> Constant {
        let folded = evaluate(tu, id).unwrap();
        tu.constant(folded).unwrap()
    }

    #[test]
    fn test_unsigned_shift_and_negation() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let one = lit(&mut tu, Constant::Uint(1));
        let amount = lit(&mut tu, Constant::Int(31));
        let shift = tu.add_expr(Expr::Binary {
            op: BinaryOp::Shl,
            lhs: one,
            rhs: amount,
        });
        assert!(is_constant(&tu, shift));
        assert_eq!(fold(&mut tu, shift), Constant::Uint(2147483648));

        let not = tu.add_expr(Expr::Unary {
            op: UnaryOp::BitNot,
            operand: shift,
        });
        assert_eq!(fold(&mut tu, not), Constant::Uint(2147483647));
    }

    #[test]
    fn test_signed_arithmetic() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Int(3));
        let b = lit(&mut tu, Constant::Int(5));
        let sub = tu.add_expr(Expr::Binary {
            op: BinaryOp::Sub,
            lhs: a,
            rhs: b,
        });
        assert_eq!(fold(&mut tu, sub), Constant::Int(-2));

        let neg = tu.add_expr(Expr::Unary {
            op: UnaryOp::Minus,
            operand: sub,
        });
        assert_eq!(fold(&mut tu, neg), Constant::Int(2));
    }

    #[test]
    fn test_mixed_operands_promote() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Int(2));
        let b = lit(&mut tu, Constant::Uint(3));
        let add = tu.add_expr(Expr::Binary {
            op: BinaryOp::Add,
            lhs: a,
            rhs: b,
        });
        assert_eq!(fold(&mut tu, add), Constant::Uint(5));

        let f = lit(&mut tu, Constant::Float(0.5));
        let mul = tu.add_expr(Expr::Binary {
            op: BinaryOp::Mul,
            lhs: a,
            rhs: f,
        });
        assert_eq!(fold(&mut tu, mul), Constant::Float(1.0));
    }

    #[test]
    fn test_comparisons_yield_bool() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Float(1.5));
        let b = lit(&mut tu, Constant::Float(2.5));
        let lt = tu.add_expr(Expr::Binary {
            op: BinaryOp::Lt,
            lhs: a,
            rhs: b,
        });
        assert_eq!(fold(&mut tu, lt), Constant::Bool(true));

        let x = lit(&mut tu, Constant::Int(7));
        let y = lit(&mut tu, Constant::Int(9));
        let pick = tu.add_expr(Expr::Ternary {
            condition: lt,
            on_true: x,
            on_false: y,
        });
        assert_eq!(fold(&mut tu, pick), Constant::Int(7));
    }

    #[test]
    fn test_division_by_zero() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Int(1));
        let zero = lit(&mut tu, Constant::Int(0));
        let div = tu.add_expr(Expr::Binary {
            op: BinaryOp::Div,
            lhs: a,
            rhs: zero,
        });
        assert_eq!(evaluate(&mut tu, div), Err(DIVISION_BY_ZERO));
    }

    #[test]
    fn test_float_modulus_is_rejected() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Float(1.0));
        let b = lit(&mut tu, Constant::Float(2.0));
        let rem = tu.add_expr(Expr::Binary {
            op: BinaryOp::Mod,
            lhs: a,
            rhs: b,
        });
        assert_eq!(evaluate(&mut tu, rem), Err(INVALID_OPERATION));
    }

    #[test]
    fn test_constructor_children_fold_in_place() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let a = lit(&mut tu, Constant::Float(1.0));
        let neg = tu.add_expr(Expr::Unary {
            op: UnaryOp::Minus,
            operand: a,
        });
        let ctor = tu.add_expr(Expr::Constructor {
            ty: TypeRef::Builtin(Keyword::Vec2),
            args: vec![neg, a],
        });
        assert!(is_constant(&tu, ctor));
        assert_eq!(evaluate(&mut tu, ctor), Ok(ctor));
        match tu.expr(ctor) {
            Expr::Constructor { args, .. } => {
                assert_eq!(tu.constant(args[0]), Some(Constant::Float(-1.0)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_calls_are_not_constant() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let call = tu.add_expr(Expr::Call(crate::ast::FunctionCall {
            name: "f".to_string(),
            args: Vec::new(),
            func: None,
        }));
        assert!(!is_constant(&tu, call));
        assert_eq!(evaluate(&mut tu, call), Err(NOT_CONSTANT));
    }
}
