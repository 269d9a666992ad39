//! Dead code removal, run after overload resolution
//!
//! Marks everything reachable from `main` and from the stage interface,
//! then drops the unmarked globals, structures and user functions.
//! Interface blocks and `in`/`out`/`uniform` globals always survive; a
//! unit without `main` keeps every function.

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, ExprId, FuncId, Stmt, StmtId, Storage, StructId, StructKind, TranslationUnit, TypeRef, VarId};

#[derive(Debug, Default)]
struct Reachable {
    vars: HashSet<VarId>,
    funcs: HashSet<FuncId>,
    structs: HashSet<StructId>,
}

struct Marker<'a> {
    tu: &'a TranslationUnit,
    reachable: Reachable,
    /// Marked functions whose bodies are not walked yet
    pending: Vec<FuncId>,
    /// Prototype to the definitions linked to it
    definitions: HashMap<FuncId, Vec<FuncId>>,
}

pub fn prune_unreachable(tu: &mut TranslationUnit) {
    let main = tu.main_function();
    let reachable = {
        let mut marker = Marker::new(tu);
        for &block in &tu.interface_blocks {
            marker.mark_type(TypeRef::Struct(block));
        }
        for &global in &tu.globals {
            if matches!(tu.var(global).storage(), Storage::In | Storage::Out | Storage::Uniform) {
                marker.mark_var(global);
            }
        }
        match main {
            Some(main) => marker.mark_func(main),
            None => tu.functions.iter().for_each(|&f| marker.mark_func(f)),
        }
        marker.run()
    };

    let before = (tu.globals.len(), tu.structures.len(), tu.functions.len());
    tu.globals.retain(|g| reachable.vars.contains(g));
    tu.structures.retain(|s| reachable.structs.contains(s));
    tu.structures_by_name.retain(|_, s| reachable.structs.contains(s));

    if main.is_some() {
        let kept: HashSet<FuncId> = tu
            .functions
            .iter()
            .copied()
            .filter(|&f| tu.func(f).attributes.builtin || reachable.funcs.contains(&f))
            .collect();
        tu.functions.retain(|f| kept.contains(f));
        tu.functions_by_name.retain(|_, overloads| {
            overloads.retain(|f| kept.contains(f));
            !overloads.is_empty()
        });
    }

    debug!(
        "pruned {} globals, {} structures, {} functions",
        before.0 - tu.globals.len(),
        before.1 - tu.structures.len(),
        before.2 - tu.functions.len()
    );
}

impl<'a> Marker<'a> {
    fn new(tu: &'a TranslationUnit) -> Self {
        let mut definitions: HashMap<FuncId, Vec<FuncId>> = HashMap::new();
        for &f in &tu.functions {
            if let Some(prototype) = tu.func(f).prototype {
                definitions.entry(prototype).or_default().push(f);
            }
        }
        Self {
            tu,
            reachable: Reachable::default(),
            pending: Vec::new(),
            definitions,
        }
    }

    fn run(mut self) -> Reachable {
        let tu = self.tu;
        while let Some(id) = self.pending.pop() {
            let func = tu.func(id);
            self.mark_type(func.return_type);
            for &param in &func.params {
                self.mark_var(param);
            }
            if let Some(prototype) = func.prototype {
                self.mark_func(prototype);
            }
            if let Some(definitions) = self.definitions.get(&id).cloned() {
                definitions.into_iter().for_each(|d| self.mark_func(d));
            }
            for &stmt in func.body.iter().flatten() {
                self.mark_stmt(stmt);
            }
        }
        self.reachable
    }

    fn mark_func(&mut self, id: FuncId) {
        if self.reachable.funcs.insert(id) {
            self.pending.push(id);
        }
    }

    fn mark_type(&mut self, ty: TypeRef) {
        let TypeRef::Struct(id) = ty else {
            return;
        };
        if !self.reachable.structs.insert(id) {
            return;
        }
        let tu = self.tu;
        let decl = tu.structure(id);
        for &field in &decl.fields {
            self.mark_var(field);
        }
        if let StructKind::Block { layout, .. } = &decl.kind {
            for value in layout.iter().filter_map(|q| q.value) {
                self.mark_expr(value);
            }
        }
    }

    fn mark_var(&mut self, id: VarId) {
        if !self.reachable.vars.insert(id) {
            return;
        }
        let tu = self.tu;
        let var = tu.var(id);
        self.mark_type(var.base_type);
        for &size in var.array_sizes.iter().flatten() {
            self.mark_expr(size);
        }
        if let Some(init) = var.initial_value() {
            self.mark_expr(init);
        }
        if let Some(global) = var.global() {
            for value in global.layout.iter().filter_map(|q| q.value) {
                self.mark_expr(value);
            }
        }
    }

    fn mark_expr(&mut self, id: ExprId) {
        let tu = self.tu;
        match tu.expr(id) {
            Expr::Constant(_) => {}
            Expr::Variable(var) => self.mark_var(*var),
            Expr::FieldOrSwizzle { operand, .. } | Expr::Unary { operand, .. } => self.mark_expr(*operand),
            Expr::Subscript { operand, index } => {
                self.mark_expr(*operand);
                self.mark_expr(*index);
            }
            Expr::Call(call) => {
                match call.func {
                    Some(func) => self.mark_func(func),
                    // unbound calls keep every overload of the name alive
                    None => {
                        let overloads = tu.functions_by_name.get(&call.name);
                        overloads.into_iter().flatten().for_each(|&f| self.mark_func(f));
                    }
                }
                for &arg in &call.args {
                    self.mark_expr(arg);
                }
            }
            Expr::Constructor { ty, args } => {
                self.mark_type(*ty);
                for &arg in args {
                    self.mark_expr(arg);
                }
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Assign { lhs, rhs, .. } | Expr::Sequence { lhs, rhs } => {
                self.mark_expr(*lhs);
                self.mark_expr(*rhs);
            }
            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                self.mark_expr(*condition);
                self.mark_expr(*on_true);
                self.mark_expr(*on_false);
            }
            Expr::ArraySpecifier(items) => {
                for &item in items {
                    self.mark_expr(item);
                }
            }
        }
    }

    fn mark_stmt(&mut self, id: StmtId) {
        let tu = self.tu;
        match tu.stmt(id) {
            Stmt::Compound(stmts) => stmts.iter().for_each(|&s| self.mark_stmt(s)),
            Stmt::Declaration(vars) => vars.iter().for_each(|&v| self.mark_var(v)),
            Stmt::Expression(expr) | Stmt::Return(Some(expr)) | Stmt::CaseLabel(Some(expr)) => self.mark_expr(*expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.mark_expr(*condition);
                self.mark_stmt(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.mark_stmt(*else_branch);
                }
            }
            Stmt::Switch { expression, body, .. } => {
                self.mark_expr(*expression);
                body.iter().for_each(|&s| self.mark_stmt(s));
            }
            Stmt::While { condition, body, .. } => {
                self.mark_stmt(*condition);
                self.mark_stmt(*body);
            }
            Stmt::Do { body, condition, .. } => {
                self.mark_stmt(*body);
                self.mark_expr(*condition);
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.mark_stmt(*init);
                }
                for &expr in condition.iter().chain(step) {
                    self.mark_expr(expr);
                }
                self.mark_stmt(*body);
            }
            Stmt::Empty
            | Stmt::CaseLabel(None)
            | Stmt::Continue
            | Stmt::Break
            | Stmt::Return(None)
            | Stmt::Discard
            | Stmt::ExtJump(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stage;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn pruned(source: &str, stage: Stage) -> TranslationUnit {
        let mut tu = parse(source, stage).unwrap();
        prune_unreachable(&mut tu);
        tu
    }

    fn global_names(tu: &TranslationUnit) -> Vec<&str> {
        tu.globals
            .iter()
            .map(|&g| tu.var(g))
            .filter(|v| !v.flags.hidden)
            .map(|v| v.name.as_str())
            .collect()
    }

    fn function_names(tu: &TranslationUnit) -> Vec<&str> {
        tu.user_functions().map(|f| tu.func(f).name.as_str()).collect()
    }

    fn struct_names(tu: &TranslationUnit) -> Vec<&str> {
        tu.structures
            .iter()
            .filter_map(|&s| tu.structure(s).name.as_deref())
            .collect()
    }

    #[test]
    fn test_keeps_what_main_reaches() {
        let tu = pruned(
            "struct Used { float a; };\n\
             struct Nested { Used u; };\n\
             struct Unused { int b; };\n\
             uniform float u_time;\n\
             in vec2 v_uv;\n\
             out vec4 o_color;\n\
             const float SCALE = 2.0;\n\
             const float SPARE = 1.0;\n\
             float g_table[4];\n\
             float g_dead;\n\
             float inner(float x) { return x * SCALE; }\n\
             float helper(float x) { return inner(x) * g_table[0]; }\n\
             float dead(float x) { return x + g_dead; }\n\
             void main() {\n\
                 Nested n;\n\
                 o_color = vec4(helper(u_time), 0.0, 0.0, 1.0);\n\
             }\n",
            Stage::Fragment,
        );
        assert_eq!(global_names(&tu), vec!["u_time", "v_uv", "o_color", "SCALE", "g_table"]);
        assert_eq!(function_names(&tu), vec!["inner", "helper", "main"]);
        assert_eq!(struct_names(&tu), vec!["Used", "Nested"]);
        assert!(tu.find_struct("Unused").is_none());
        assert!(!tu.functions_by_name.contains_key("dead"));
        assert!(tu.functions_by_name.contains_key("sin"));
    }

    #[test]
    fn test_prototype_and_definition_survive_together() {
        let tu = pruned(
            "float late(float x);\n\
             void main() { float y = late(1.0); }\n\
             float late(float x) { return x; }\n\
             float spare(float x) { return x; }\n",
            Stage::Fragment,
        );
        assert_eq!(function_names(&tu), vec!["late", "main", "late"]);
        assert_eq!(tu.functions_by_name["late"].len(), 2);
        assert!(!tu.functions_by_name.contains_key("spare"));
    }

    #[test]
    fn test_without_main_functions_stay() {
        let tu = pruned(
            "float a;\nfloat b;\nfloat f() { return b; }\nfloat g() { return 1.0; }\n",
            Stage::Fragment,
        );
        assert_eq!(function_names(&tu), vec!["f", "g"]);
        assert_eq!(global_names(&tu), vec!["b"]);
    }

    #[test]
    fn test_interface_blocks_and_their_types_stay() {
        let tu = pruned(
            "struct Light { vec3 dir; };\n\
             layout(std140) uniform Lights { Light lights[4]; };\n\
             buffer Data { float values[]; } data;\n\
             float g_cache[8];\n\
             void main() {}\n",
            Stage::Fragment,
        );
        assert_eq!(tu.interface_blocks.len(), 2);
        assert_eq!(struct_names(&tu), vec!["Light"]);
        assert!(tu.find_global("g_cache").is_none());
    }
}
