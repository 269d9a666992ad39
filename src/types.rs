//! Static type queries over builtin keywords and expressions

use crate::ast::{BinaryOp, Expr, ExprId, TranslationUnit, TypeRef};
use crate::builtins::is_atomic_function;
use crate::keywords::Keyword;
use crate::keywords::Keyword::*;

/// Widening conversions accepted when no overload matches exactly.
/// The first entry of each row converts to any later entry.
const CONVERTIBLE: &[&[Keyword]] = &[
    &[Int16, Int, Int64],
    &[I16Vec2, IVec2, I64Vec2],
    &[I16Vec3, IVec3, I64Vec3],
    &[I16Vec4, IVec4, I64Vec4],
    &[Int, Int64],
    &[IVec2, I64Vec2],
    &[IVec3, I64Vec3],
    &[IVec4, I64Vec4],
    &[Uint16, Uint, Uint64],
    &[U16Vec2, UVec2, U64Vec2],
    &[U16Vec3, UVec3, U64Vec3],
    &[U16Vec4, UVec4, U64Vec4],
    &[Uint, Uint64],
    &[UVec2, U64Vec2],
    &[UVec3, U64Vec3],
    &[UVec4, U64Vec4],
    &[Float16, Float, Double],
    &[F16Vec2, Vec2, DVec2],
    &[F16Vec3, Vec3, DVec3],
    &[F16Vec4, Vec4, DVec4],
    &[Float, Double],
    &[Vec2, DVec2],
    &[Vec3, DVec3],
    &[Vec4, DVec4],
];

/// Scalar type and width of every builtin vector
const VECTORS: &[(Keyword, Keyword, usize)] = &[
    (Vec2, Float, 2),
    (Vec3, Float, 3),
    (Vec4, Float, 4),
    (DVec2, Double, 2),
    (DVec3, Double, 3),
    (DVec4, Double, 4),
    (BVec2, Bool, 2),
    (BVec3, Bool, 3),
    (BVec4, Bool, 4),
    (IVec2, Int, 2),
    (IVec3, Int, 3),
    (IVec4, Int, 4),
    (UVec2, Uint, 2),
    (UVec3, Uint, 3),
    (UVec4, Uint, 4),
    (I16Vec2, Int16, 2),
    (I16Vec3, Int16, 3),
    (I16Vec4, Int16, 4),
    (U16Vec2, Uint16, 2),
    (U16Vec3, Uint16, 3),
    (U16Vec4, Uint16, 4),
    (I64Vec2, Int64, 2),
    (I64Vec3, Int64, 3),
    (I64Vec4, Int64, 4),
    (U64Vec2, Uint64, 2),
    (U64Vec3, Uint64, 3),
    (U64Vec4, Uint64, 4),
    (F16Vec2, Float16, 2),
    (F16Vec3, Float16, 3),
    (F16Vec4, Float16, 4),
];

/// Columns and rows of every builtin matrix (`matCxR`)
const MATRICES: &[(Keyword, Keyword, usize, usize)] = &[
    (Mat2, Float, 2, 2),
    (Mat3, Float, 3, 3),
    (Mat4, Float, 4, 4),
    (Mat2x2, Float, 2, 2),
    (Mat2x3, Float, 2, 3),
    (Mat2x4, Float, 2, 4),
    (Mat3x2, Float, 3, 2),
    (Mat3x3, Float, 3, 3),
    (Mat3x4, Float, 3, 4),
    (Mat4x2, Float, 4, 2),
    (Mat4x3, Float, 4, 3),
    (Mat4x4, Float, 4, 4),
    (DMat2, Double, 2, 2),
    (DMat3, Double, 3, 3),
    (DMat4, Double, 4, 4),
    (DMat2x2, Double, 2, 2),
    (DMat2x3, Double, 2, 3),
    (DMat2x4, Double, 2, 4),
    (DMat3x2, Double, 3, 2),
    (DMat3x3, Double, 3, 3),
    (DMat3x4, Double, 3, 4),
    (DMat4x2, Double, 4, 2),
    (DMat4x3, Double, 4, 3),
    (DMat4x4, Double, 4, 4),
];

/// Component count; 1 for scalars and everything that is not a vector
pub fn vector_size(kw: Keyword) -> usize {
    VECTORS
        .iter()
        .find(|(v, _, _)| *v == kw)
        .map(|(_, _, n)| *n)
        .unwrap_or(1)
}

pub fn is_vector(kw: Keyword) -> bool {
    vector_size(kw) > 1
}

/// Component type of a vector, or the type itself
pub fn scalar_type(kw: Keyword) -> Keyword {
    VECTORS
        .iter()
        .find(|(v, _, _)| *v == kw)
        .map(|(_, s, _)| *s)
        .or_else(|| MATRICES.iter().find(|(m, ..)| *m == kw).map(|(_, s, ..)| *s))
        .unwrap_or(kw)
}

/// Vector of `n` components of `scalar`; `n == 1` is the scalar itself
pub fn vector_type(scalar: Keyword, n: usize) -> Option<Keyword> {
    if n == 1 {
        return Some(scalar);
    }
    VECTORS
        .iter()
        .find(|(_, s, count)| *s == scalar && *count == n)
        .map(|(v, _, _)| *v)
}

pub fn is_integer(kw: Keyword) -> bool {
    matches!(kw, Int16 | Uint16 | Int | Uint | Int64 | Uint64)
}

pub fn is_unsigned(kw: Keyword) -> bool {
    matches!(kw, Uint16 | Uint | Uint64)
}

pub fn is_float(kw: Keyword) -> bool {
    matches!(kw, Float16 | Float | Double)
}

pub fn is_scalar(kw: Keyword) -> bool {
    is_integer(kw) || is_float(kw) || kw == Bool
}

/// `(columns, rows)` of a matrix
pub fn matrix_dims(kw: Keyword) -> Option<(usize, usize)> {
    MATRICES
        .iter()
        .find(|(m, ..)| *m == kw)
        .map(|(_, _, c, r)| (*c, *r))
}

/// `cols` x `rows` matrix of `scalar`, preferring the square spelling
pub fn matrix_type(scalar: Keyword, cols: usize, rows: usize) -> Option<Keyword> {
    MATRICES
        .iter()
        .find(|(_, s, c, r)| *s == scalar && *c == cols && *r == rows)
        .map(|(m, ..)| *m)
}

pub fn is_matrix(kw: Keyword) -> bool {
    matrix_dims(kw).is_some()
}

/// Type of `m[i]`: one column of the matrix
pub fn matrix_column_type(kw: Keyword) -> Option<Keyword> {
    let (_, rows) = matrix_dims(kw)?;
    vector_type(scalar_type(kw), rows)
}

pub fn is_same(a: TypeRef, b: TypeRef) -> bool {
    a == b
}

/// `from` is `to` or widens to it implicitly
pub fn is_compatible(from: TypeRef, to: TypeRef) -> bool {
    match (from, to) {
        (TypeRef::Builtin(a), TypeRef::Builtin(b)) => {
            a == b
                || CONVERTIBLE
                    .iter()
                    .any(|row| row[0] == a && row[1..].contains(&b))
        }
        (a, b) => a == b,
    }
}

/// Statically known type of an expression plus its remaining array depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprType {
    pub ty: TypeRef,
    pub array_dims: usize,
}

impl ExprType {
    fn plain(ty: TypeRef) -> Self {
        Self { ty, array_dims: 0 }
    }

    fn builtin(kw: Keyword) -> Self {
        Self::plain(TypeRef::Builtin(kw))
    }
}

/// Result type of `id`, or `None` when it cannot be decided statically
pub fn expression_type(tu: &TranslationUnit, id: ExprId) -> Option<ExprType> {
    match tu.expr(id) {
        Expr::Constant(c) => Some(ExprType::builtin(c.type_keyword())),
        Expr::Variable(var) => {
            let var = tu.var(*var);
            Some(ExprType {
                ty: var.base_type,
                array_dims: var.array_sizes.len(),
            })
        }
        Expr::FieldOrSwizzle { operand, name, field } => match field {
            Some(field) => {
                let var = tu.var(*field);
                Some(ExprType {
                    ty: var.base_type,
                    array_dims: var.array_sizes.len(),
                })
            }
            None => {
                let operand = expression_type(tu, *operand)?.ty.builtin()?;
                vector_type(scalar_type(operand), name.len()).map(ExprType::builtin)
            }
        },
        Expr::Subscript { operand, .. } => {
            let operand = expression_type(tu, *operand)?;
            if operand.array_dims > 0 {
                return Some(ExprType {
                    ty: operand.ty,
                    array_dims: operand.array_dims - 1,
                });
            }
            match operand.ty {
                TypeRef::Builtin(kw) if is_vector(kw) => Some(ExprType::builtin(scalar_type(kw))),
                TypeRef::Builtin(kw) if is_matrix(kw) => {
                    matrix_column_type(kw).map(ExprType::builtin)
                }
                ty => Some(ExprType::plain(ty)),
            }
        }
        Expr::Call(call) => {
            let mut arg_types = Vec::with_capacity(call.args.len());
            for &arg in &call.args {
                arg_types.push(expression_type(tu, arg)?.ty);
            }
            if is_atomic_function(&call.name) {
                return arg_types.first().copied().map(ExprType::plain);
            }
            if let Some(func) = call.func {
                return Some(ExprType::plain(tu.func(func).return_type));
            }
            let overloads = tu.functions_by_name.get(&call.name)?;
            overloads
                .iter()
                .map(|&f| tu.func(f))
                .find(|f| {
                    f.params.len() == arg_types.len()
                        && f
                            .params
                            .iter()
                            .zip(&arg_types)
                            .all(|(&p, &arg)| is_same(tu.var(p).base_type, arg))
                })
                .map(|f| ExprType::plain(f.return_type))
        }
        Expr::Constructor { ty, .. } => Some(ExprType::plain(*ty)),
        Expr::Unary { operand, .. } => expression_type(tu, *operand),
        Expr::Assign { lhs, .. } => expression_type(tu, *lhs),
        Expr::Sequence { rhs, .. } => expression_type(tu, *rhs),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = expression_type(tu, *lhs)?.ty;
            let rhs = expression_type(tu, *rhs)?.ty;
            binary_result_type(*op, lhs, rhs).map(ExprType::plain)
        }
        Expr::Ternary { on_true, .. } => expression_type(tu, *on_true),
        Expr::ArraySpecifier(items) => {
            let first = expression_type(tu, *items.first()?)?;
            Some(ExprType {
                ty: first.ty,
                array_dims: first.array_dims + 1,
            })
        }
    }
}

/// Shorthand for the type alone
pub fn result_type(tu: &TranslationUnit, id: ExprId) -> Option<TypeRef> {
    expression_type(tu, id).map(|t| t.ty)
}

fn binary_result_type(op: BinaryOp, lhs: TypeRef, rhs: TypeRef) -> Option<TypeRef> {
    if op.is_comparison() || op.is_logical() {
        return Some(TypeRef::Builtin(Bool));
    }
    if lhs == rhs {
        return Some(lhs);
    }
    let (a, b) = (lhs.builtin()?, rhs.builtin()?);
    let (sa, sb) = (scalar_type(a), scalar_type(b));

    if op == BinaryOp::Mul {
        // matCxR * vecC -> vecR, vecR * matCxR -> vecC
        if let Some((_, rows)) = matrix_dims(a).filter(|_| is_vector(b)) {
            return vector_type(sa, rows).map(TypeRef::Builtin);
        }
        if let Some((cols, _)) = matrix_dims(b).filter(|_| is_vector(a)) {
            return vector_type(sb, cols).map(TypeRef::Builtin);
        }
        // matKxR * matCxK -> matCxR
        if let (Some((inner, rows)), Some((cols, inner_b))) = (matrix_dims(a), matrix_dims(b)) {
            if inner != inner_b {
                return None;
            }
            return matrix_type(sa, cols, rows).map(TypeRef::Builtin);
        }
    }
    if is_matrix(a) && is_scalar(b) {
        return Some(lhs);
    }
    if is_matrix(b) && is_scalar(a) {
        return Some(rhs);
    }

    if is_integer(sa) && is_integer(sb) {
        let (na, nb) = (vector_size(a), vector_size(b));
        if na > nb {
            Some(lhs)
        } else if nb > na {
            Some(rhs)
        } else if is_unsigned(sa) && !is_unsigned(sb) {
            Some(lhs)
        } else {
            Some(rhs)
        }
    } else if is_integer(sa) && is_float(sb) {
        Some(rhs)
    } else if is_float(sa) && is_integer(sb) {
        Some(lhs)
    } else if sa == sb {
        // scalar op vector of the same component type
        Some(if vector_size(a) >= vector_size(b) { lhs } else { rhs })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Constant, Stage};

    #[test]
    fn test_vector_queries() {
        assert_eq!(vector_size(Vec3), 3);
        assert_eq!(vector_size(Float), 1);
        assert_eq!(vector_size(Mat4), 1);
        assert_eq!(scalar_type(U16Vec4), Uint16);
        assert_eq!(scalar_type(Mat3x2), Float);
        assert_eq!(vector_type(Double, 2), Some(DVec2));
        assert_eq!(vector_type(Float, 1), Some(Float));
        assert_eq!(vector_type(Float, 5), None);
    }

    #[test]
    fn test_matrix_queries() {
        assert_eq!(matrix_dims(Mat2x3), Some((2, 3)));
        assert_eq!(matrix_column_type(Mat2x3), Some(Vec3));
        assert_eq!(matrix_column_type(Mat4x2), Some(Vec2));
        assert_eq!(matrix_column_type(DMat3), Some(DVec3));
        assert!(!is_matrix(Vec4));
    }

    #[test]
    fn test_compatibility() {
        let b = TypeRef::Builtin;
        assert!(is_compatible(b(Int16), b(Int64)));
        assert!(is_compatible(b(Float), b(Double)));
        assert!(is_compatible(b(F16Vec3), b(Vec3)));
        assert!(!is_compatible(b(Double), b(Float)));
        assert!(!is_compatible(b(Int), b(Uint)));
        assert!(!is_compatible(b(Int), b(Float)));
    }

    #[test]
    fn test_binary_result_types() {
        let b = TypeRef::Builtin;
        assert_eq!(binary_result_type(BinaryOp::Add, b(Uint), b(Int)), Some(b(Uint)));
        assert_eq!(binary_result_type(BinaryOp::Add, b(Int), b(IVec3)), Some(b(IVec3)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Int), b(Float)), Some(b(Float)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat4x3), b(Vec4)), Some(b(Vec3)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Vec3), b(Mat4x3)), Some(b(Vec4)));
        assert_eq!(binary_result_type(BinaryOp::Lt, b(Int), b(Int)), Some(b(Bool)));
    }

    #[test]
    fn test_matrix_product_types() {
        let b = TypeRef::Builtin;
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat2x3), b(Mat3x2)), Some(b(Mat3)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat3x2), b(Mat2x3)), Some(b(Mat2)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat4x3), b(Mat2x4)), Some(b(Mat2x3)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat4), b(Mat4x4)), Some(b(Mat4)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(DMat3x4), b(DMat2x3)), Some(b(DMat2x4)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat2x3), b(Mat2x3)), Some(b(Mat2x3)));
        assert_eq!(binary_result_type(BinaryOp::Mul, b(Mat2x3), b(Mat4x3)), None);
        assert_eq!(binary_result_type(BinaryOp::Add, b(Mat4), b(Mat4x4)), Some(b(Mat4)));
        assert_eq!(matrix_type(Double, 3, 3), Some(DMat3));
    }

    #[test]
    fn test_expression_type_of_swizzle() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let ctor = tu.add_expr(Expr::Constructor {
            ty: TypeRef::Builtin(Vec4),
            args: Vec::new(),
        });
        let swizzle = tu.add_expr(Expr::FieldOrSwizzle {
            operand: ctor,
            name: "xy".to_string(),
            field: None,
        });
        let index = tu.add_expr(Expr::Constant(Constant::Int(0)));
        let element = tu.add_expr(Expr::Subscript {
            operand: swizzle,
            index,
        });
        assert_eq!(result_type(&tu, swizzle), Some(TypeRef::Builtin(Vec2)));
        assert_eq!(result_type(&tu, element), Some(TypeRef::Builtin(Float)));
    }
}
