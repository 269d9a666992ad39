//! Storage buffer lowering
//!
//! `buffer` blocks become byte address buffers. Reads go through generated
//! `__load_<field>` accessors, writes through `__temp`/`__offset` pairs and
//! explicit `Store` calls, and atomics are hoisted into `Interlocked*`
//! statements whose result lands in a temporary.

use log::trace;

use super::hlsl::HlslWriter;
use crate::ast::{AssignOp, Expr, ExprId, Stmt, StmtId, StructId, TranslationUnit, TypeRef, VarId};
use crate::builtins;
use crate::keywords::Keyword;
use crate::types;

/// One field of a storage block mapped onto a byte address buffer
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    pub field: VarId,
    /// HLSL resource the field lives in
    pub resource: String,
    /// Bytes per element of the outermost array
    pub stride: usize,
    /// Byte offset of the field inside one element
    pub offset: usize,
}

/// Address of an lvalue inside a byte buffer: `index * multiplier` terms in
/// source order plus a constant byte offset
#[derive(Debug, Clone)]
pub struct BufferAccess {
    pub buffer: usize,
    pub terms: Vec<(ExprId, usize)>,
    pub offset: usize,
}

// === SIZES ===

/// Byte size of a scalar, vector or matrix; opaque types have no size
pub fn builtin_size(kw: Keyword) -> usize {
    let scalar = match types::scalar_type(kw) {
        Keyword::Int | Keyword::Uint | Keyword::Float => 4,
        Keyword::Double | Keyword::Int64 | Keyword::Uint64 => 8,
        Keyword::Int16 | Keyword::Uint16 | Keyword::Float16 => 2,
        Keyword::Bool => 1,
        _ => return 0,
    };
    match types::matrix_dims(kw) {
        Some((columns, rows)) => columns * rows * scalar,
        None => types::vector_size(kw) * scalar,
    }
}

pub fn type_size(tu: &TranslationUnit, ty: TypeRef) -> usize {
    match ty {
        TypeRef::Builtin(kw) => builtin_size(kw),
        TypeRef::Struct(id) => tu
            .structure(id)
            .fields
            .iter()
            .map(|&field| variable_size(tu, field, 0))
            .sum(),
    }
}

/// Size of a variable with its first `skip` array dimensions ignored;
/// unsized dimensions count as one element
pub fn variable_size(tu: &TranslationUnit, id: VarId, skip: usize) -> usize {
    let var = tu.var(id);
    var.array_sizes
        .iter()
        .skip(skip)
        .fold(type_size(tu, var.base_type), |size, dim| {
            size * array_length(tu, *dim).unwrap_or(1)
        })
}

fn array_length(tu: &TranslationUnit, dim: Option<ExprId>) -> Option<usize> {
    let length = tu.constant(dim?)?.as_i64()?;
    usize::try_from(length).ok()
}

fn field_offset(tu: &TranslationUnit, structure: StructId, field: VarId) -> usize {
    tu.structure(structure)
        .fields
        .iter()
        .take_while(|&&f| f != field)
        .map(|&f| variable_size(tu, f, 0))
        .sum()
}

fn component_index(c: char) -> usize {
    match c {
        'y' | 'g' | 't' => 1,
        'z' | 'b' | 'p' => 2,
        'w' | 'a' | 'q' => 3,
        _ => 0,
    }
}

// === LOADS AND STORES ===

fn load_call(resource: &str, kw: Keyword, address: &str) -> String {
    let n = types::vector_size(kw);
    let method = if n == 1 { "Load".to_string() } else { format!("Load{}", n) };
    match types::scalar_type(kw) {
        Keyword::Int | Keyword::Uint => format!("{}.{}({})", resource, method, address),
        Keyword::Float => format!("asfloat({}.{}({}))", resource, method, address),
        Keyword::Bool => format!("{}.{}({}) != 0", resource, method, address),
        _ => format!("{}.Load<{}>({})", resource, kw.hlsl_name(), address),
    }
}

fn store_call(resource: &str, kw: Keyword, address: &str, value: &str) -> String {
    let n = types::vector_size(kw);
    let method = if n == 1 { "Store".to_string() } else { format!("Store{}", n) };
    match types::scalar_type(kw) {
        Keyword::Int | Keyword::Uint => format!("{}.{}({}, {})", resource, method, address, value),
        Keyword::Float => format!("{}.{}({}, asuint({}))", resource, method, address, value),
        Keyword::Bool => {
            let uint = types::vector_type(Keyword::Uint, n).unwrap_or(Keyword::Uint);
            format!("{}.{}({}, {}({}))", resource, method, address, uint.hlsl_name(), value)
        }
        _ => format!("{}.Store<{}>({}, {})", resource, kw.hlsl_name(), address, value),
    }
}

/// Visit every scalar, vector or matrix row reachable from `prefix`,
/// handing out `(path, byte offset, type)`; returns the bytes covered
fn walk_leaves(
    tu: &TranslationUnit,
    offset: usize,
    prefix: &str,
    ty: TypeRef,
    dims: &[Option<ExprId>],
    visit: &mut dyn FnMut(&str, usize, Keyword),
) -> usize {
    if let Some((&dim, rest)) = dims.split_first() {
        let Some(count) = array_length(tu, dim) else {
            return walk_leaves(tu, offset, prefix, ty, rest, visit);
        };
        let mut size = 0;
        for i in 0..count {
            let path = format!("{}[{}]", prefix, i);
            size += walk_leaves(tu, offset + size, &path, ty, rest, visit);
        }
        return size;
    }
    match ty {
        TypeRef::Builtin(kw) => match types::matrix_dims(kw) {
            Some((columns, _)) => {
                let row = types::matrix_column_type(kw).unwrap_or(kw);
                let row_size = builtin_size(row);
                for i in 0..columns {
                    visit(&format!("{}[{}]", prefix, i), offset + i * row_size, row);
                }
                columns * row_size
            }
            None => {
                visit(prefix, offset, kw);
                builtin_size(kw)
            }
        },
        TypeRef::Struct(id) => {
            let mut size = 0;
            for &field in &tu.structure(id).fields {
                let var = tu.var(field);
                let path = format!("{}.{}", prefix, var.name);
                size += walk_leaves(tu, offset + size, &path, var.base_type, &var.array_sizes, visit);
            }
            size
        }
    }
}

impl HlslWriter<'_> {
    /// Register the fields of a `buffer` block and write the resource plus
    /// one `__load_<field>` accessor per field
    pub(super) fn write_storage_block(&mut self, block: StructId, register: &str) {
        let tu = self.tu;
        let decl = tu.structure(block);
        let readonly = match &decl.kind {
            crate::ast::StructKind::Block { memory, .. } => memory.readonly,
            crate::ast::StructKind::Struct => false,
        };
        let resource = match decl.fields.as_slice() {
            [only] => tu.var(*only).name.clone(),
            _ => decl.name.clone().unwrap_or_default(),
        };
        let stride: usize = decl
            .fields
            .iter()
            .map(|&f| variable_size(tu, f, outer_dims(tu, f)))
            .sum();

        let kind = if readonly { "ByteAddressBuffer" } else { "RWByteAddressBuffer" };
        self.out.push_str(&format!("{} {}{};\n", kind, resource, register));

        let mut offset = 0;
        for &field in &decl.fields {
            let buffer = ByteBuffer {
                field,
                resource: resource.clone(),
                stride,
                offset,
            };
            self.write_accessor(&buffer);
            offset += variable_size(tu, field, outer_dims(tu, field));
            self.buffers.push(buffer);
        }
        trace!("lowered buffer block '{}' with stride {}", resource, stride);
    }

    fn write_accessor(&mut self, buffer: &ByteBuffer) {
        let tu = self.tu;
        let var = tu.var(buffer.field);
        let ty = self.decl_type_name(var.base_type);
        self.out.push_str(&format!("{} __load_{}(int index) {{\n", ty, var.name));
        self.out.push_str(&format!("    {} ret;\n", ty));

        let dims = &var.array_sizes[outer_dims(tu, buffer.field)..];
        let mut lines = Vec::new();
        walk_leaves(tu, buffer.offset, "ret", var.base_type, dims, &mut |path, offset, kw| {
            let address = format!("index * {} + {}", buffer.stride, offset);
            lines.push(format!("    {} = {};\n", path, load_call(&buffer.resource, kw, &address)));
        });
        for line in lines {
            self.out.push_str(&line);
        }
        self.out.push_str("    return ret;\n}\n");
    }

    /// Buffer field read or written by `expr` when it names one directly
    pub(super) fn buffer_of(&self, expr: ExprId) -> Option<usize> {
        let var = match self.tu.expr(expr) {
            Expr::Variable(var) => *var,
            Expr::FieldOrSwizzle { field: Some(field), .. } => *field,
            _ => return None,
        };
        self.buffers.iter().position(|b| b.field == var)
    }

    /// Resolve an lvalue chain rooted at a buffer field
    pub(super) fn buffer_access(&self, expr: ExprId) -> Option<BufferAccess> {
        if let Some(buffer) = self.buffer_of(expr) {
            return Some(BufferAccess {
                buffer,
                terms: Vec::new(),
                offset: self.buffers[buffer].offset,
            });
        }
        let tu = self.tu;
        match tu.expr(expr) {
            Expr::Subscript { operand, index } => {
                let mut access = self.buffer_access(*operand)?;
                let multiplier = match self.buffer_of(*operand) {
                    Some(buffer) => self.buffers[buffer].stride,
                    None => self.element_size(*operand),
                };
                access.terms.push((*index, multiplier));
                Some(access)
            }
            Expr::FieldOrSwizzle {
                operand,
                name,
                field,
            } => {
                let mut access = self.buffer_access(*operand)?;
                match (field, types::result_type(tu, *operand)?) {
                    (Some(field), TypeRef::Struct(structure)) => {
                        access.offset += field_offset(tu, structure, *field);
                    }
                    (None, TypeRef::Builtin(kw)) => {
                        let first = name.chars().next().map_or(0, component_index);
                        access.offset += first * builtin_size(types::scalar_type(kw));
                    }
                    _ => return None,
                }
                Some(access)
            }
            _ => None,
        }
    }

    /// Bytes stepped over by one subscript of `operand`
    fn element_size(&self, operand: ExprId) -> usize {
        let tu = self.tu;
        let mut depth = 0;
        let mut root = operand;
        while let Expr::Subscript { operand, .. } = tu.expr(root) {
            depth += 1;
            root = *operand;
        }
        let declared = match tu.expr(root) {
            Expr::Variable(var) => Some(*var),
            Expr::FieldOrSwizzle { field: Some(field), .. } => Some(*field),
            _ => None,
        };
        if let Some(var) = declared {
            if depth < tu.var(var).array_sizes.len() {
                return variable_size(tu, var, depth + 1);
            }
        }
        match types::expression_type(tu, operand).map(|t| t.ty) {
            Some(TypeRef::Builtin(kw)) if types::is_matrix(kw) => {
                types::matrix_column_type(kw).map_or(0, builtin_size)
            }
            Some(TypeRef::Builtin(kw)) => builtin_size(types::scalar_type(kw)),
            Some(ty) => type_size(tu, ty),
            None => 0,
        }
    }

    /// `T __tempN = value;` `uint __offsetN = ...;` then one store per leaf,
    /// joined so the enclosing statement can close the last one
    pub(super) fn write_buffer_store(&mut self, access: BufferAccess, op: AssignOp, lhs: ExprId, rhs: ExprId) {
        let tu = self.tu;
        let n = self.temp_index;
        self.temp_index += 1;
        let temp = format!("__temp{}", n);
        let ty = types::result_type(tu, lhs).unwrap_or(TypeRef::Builtin(Keyword::Uint));

        let declared = format!("{} {} = ", self.decl_type_name(ty), temp);
        self.out.push_str(&declared);
        match op.binary() {
            Some(binary) => {
                self.out.push('(');
                self.write_expr(lhs, false);
                self.out.push_str(&format!(" {} ", binary.as_str()));
                self.write_expr(rhs, false);
                self.out.push(')');
            }
            None => self.write_expr(rhs, false),
        }
        self.out.push_str(";\n");
        self.indent();

        let mut address = String::new();
        for &(index, multiplier) in &access.terms {
            let index = self.expr_to_string(index);
            address.push_str(&format!("{} * {} + ", index, multiplier));
        }
        address.push_str(&access.offset.to_string());
        self.out.push_str(&format!("uint __offset{} = {};\n", n, address));
        self.indent();

        let resource = self.buffers[access.buffer].resource.clone();
        let mut stores = Vec::new();
        walk_leaves(tu, 0, &temp, ty, &[], &mut |path, offset, kw| {
            let address = format!("__offset{} + {}", n, offset);
            stores.push(store_call(&resource, kw, &address, path));
        });
        let separator = format!(";\n{}", " ".repeat(self.indent_width()));
        self.out.push_str(&stores.join(&separator));
    }

    // === ATOMICS ===

    /// Write every atomic call inside `expr` as its own statement ahead of
    /// the current one; the call sites then read the temporaries
    pub(super) fn hoist_atomics(&mut self, expr: ExprId) {
        let mut calls = Vec::new();
        collect_atomics(self.tu, expr, &mut calls);
        for call in calls {
            self.write_atomic(call);
        }
    }

    pub(super) fn has_atomics(&self, expr: ExprId) -> bool {
        let mut calls = Vec::new();
        collect_atomics(self.tu, expr, &mut calls);
        !calls.is_empty()
    }

    /// Whether writing `stmt` puts hoisted atomics on the lines before it
    pub(super) fn hoists_atomics(&self, stmt: StmtId) -> bool {
        let tu = self.tu;
        match tu.stmt(stmt) {
            Stmt::Expression(expr)
            | Stmt::Return(Some(expr))
            | Stmt::If { condition: expr, .. }
            | Stmt::Switch {
                expression: expr, ..
            } => self.has_atomics(*expr),
            Stmt::Declaration(vars) => vars
                .iter()
                .filter_map(|&var| tu.var(var).initial_value())
                .any(|init| self.has_atomics(init)),
            _ => false,
        }
    }

    fn write_atomic(&mut self, call: ExprId) {
        let tu = self.tu;
        let Expr::Call(site) = tu.expr(call) else {
            return;
        };
        let ty = site
            .args
            .first()
            .and_then(|&arg| types::result_type(tu, arg))
            .unwrap_or(TypeRef::Builtin(Keyword::Uint));
        let wide = matches!(ty, TypeRef::Builtin(Keyword::Int64 | Keyword::Uint64));
        let function = match builtins::hlsl_function_name(&site.name) {
            Some("InterlockedCompareExchange") if wide => "InterlockedCompareExchange64",
            Some(name) => name,
            None => site.name.as_str(),
        };

        let temp = format!("__temp{}", self.temp_index);
        self.temp_index += 1;
        let declared = format!("{} {};\n", self.decl_type_name(ty), temp);
        self.out.push_str(&declared);
        self.indent();

        let mut args = Vec::new();
        let target = match site.args.first().and_then(|&dest| self.buffer_access(dest)) {
            Some(access) => {
                let mut terms = Vec::new();
                for &(index, multiplier) in &access.terms {
                    terms.push(format!("{} * {}", multiplier, self.expr_to_string(index)));
                }
                if access.offset != 0 || terms.is_empty() {
                    terms.push(access.offset.to_string());
                }
                args.push(terms.join(" + "));
                for &arg in &site.args[1..] {
                    args.push(self.expr_to_string(arg));
                }
                format!("{}.{}", self.buffers[access.buffer].resource, function)
            }
            None => {
                for &arg in &site.args {
                    args.push(self.expr_to_string(arg));
                }
                function.to_string()
            }
        };
        args.push(temp.clone());
        self.out.push_str(&format!("{}({});\n", target, args.join(", ")));
        self.indent();
        self.hoisted.insert(call, temp);
    }
}

/// Number of leading dimensions dropped when a field is addressed per element
fn outer_dims(tu: &TranslationUnit, field: VarId) -> usize {
    usize::from(!tu.var(field).array_sizes.is_empty())
}

/// Atomic calls in evaluation order; atomics nested in the arguments of
/// another atomic come before it
fn collect_atomics(tu: &TranslationUnit, id: ExprId, calls: &mut Vec<ExprId>) {
    match tu.expr(id) {
        Expr::Call(site) => {
            for &arg in &site.args {
                collect_atomics(tu, arg, calls);
            }
            if builtins::is_atomic_function(&site.name) {
                calls.push(id);
            }
        }
        Expr::Constructor { args, .. } | Expr::ArraySpecifier(args) => {
            for &arg in args {
                collect_atomics(tu, arg, calls);
            }
        }
        Expr::FieldOrSwizzle { operand, .. } | Expr::Unary { operand, .. } => {
            collect_atomics(tu, *operand, calls)
        }
        Expr::Subscript { operand, index } => {
            collect_atomics(tu, *operand, calls);
            collect_atomics(tu, *index, calls);
        }
        Expr::Binary { lhs, rhs, .. } | Expr::Assign { lhs, rhs, .. } | Expr::Sequence { lhs, rhs } => {
            collect_atomics(tu, *lhs, calls);
            collect_atomics(tu, *rhs, calls);
        }
        Expr::Ternary {
            condition,
            on_true,
            on_false,
        } => {
            collect_atomics(tu, *condition, calls);
            collect_atomics(tu, *on_true, calls);
            collect_atomics(tu, *on_false, calls);
        }
        Expr::Constant(_) | Expr::Variable(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stage;
    use crate::parser::parse;

    #[test]
    fn test_builtin_sizes() {
        assert_eq!(builtin_size(Keyword::Float), 4);
        assert_eq!(builtin_size(Keyword::Vec3), 12);
        assert_eq!(builtin_size(Keyword::DVec2), 16);
        assert_eq!(builtin_size(Keyword::Mat4), 64);
        assert_eq!(builtin_size(Keyword::Mat2x3), 24);
        assert_eq!(builtin_size(Keyword::Float16), 2);
        assert_eq!(builtin_size(Keyword::Bool), 1);
        assert_eq!(builtin_size(Keyword::Sampler2D), 0);
    }

    #[test]
    fn test_struct_and_array_sizes() {
        let tu = parse(
            "struct Inner { vec4 v; uint i; };\nstruct Outer { float f[3]; Inner inner[2]; };\nOuter g;\n",
            Stage::Fragment,
        )
        .unwrap();
        let outer = tu.find_struct("Outer").unwrap();
        assert_eq!(type_size(&tu, TypeRef::Struct(outer)), 12 + 2 * 20);
        let inner = tu.find_struct("Inner").unwrap();
        let i = tu.structure(inner).fields[1];
        assert_eq!(field_offset(&tu, inner, i), 16);
    }

    #[test]
    fn test_atomics_collected_in_order() {
        let tu = parse(
            "shared uint s[4];\nvoid main() { uint v = atomicAdd(s[0], 1u) + atomicOr(s[1], atomicAdd(s[2], 1u)); }",
            Stage::Compute,
        )
        .unwrap();
        let main = tu.func(tu.main_function().unwrap());
        let crate::ast::Stmt::Declaration(vars) = tu.stmt(main.body.as_ref().unwrap()[0]) else {
            panic!("expected a declaration");
        };
        let init = tu.var(vars[0]).initial_value().unwrap();
        let mut calls = Vec::new();
        collect_atomics(&tu, init, &mut calls);
        let names: Vec<_> = calls
            .iter()
            .map(|&c| match tu.expr(c) {
                Expr::Call(site) => site.name.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, ["atomicAdd", "atomicAdd", "atomicOr"]);
        let Expr::Call(inner) = tu.expr(calls[1]) else {
            panic!("expected a call");
        };
        assert_eq!(tu.constant(inner.args[1]), Some(crate::ast::Constant::Uint(1)));
    }
}
