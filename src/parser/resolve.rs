//! Binding passes run once the whole translation unit is parsed

use log::{debug, warn};

use crate::ast::{Expr, ExprId, FuncId, TranslationUnit, TypeRef};
use crate::types;

/// Point every definition at a prototype with the same name and parameter types
pub fn link_prototypes(tu: &mut TranslationUnit) {
    let mut links = Vec::new();
    for overloads in tu.functions_by_name.values() {
        for &definition in overloads.iter().filter(|&&f| !tu.func(f).is_prototype()) {
            let prototype = overloads
                .iter()
                .copied()
                .find(|&p| tu.func(p).is_prototype() && same_signature(tu, definition, p));
            if let Some(prototype) = prototype {
                links.push((definition, prototype));
            }
        }
    }
    for &(definition, prototype) in &links {
        tu.func_mut(definition).prototype = Some(prototype);
    }
    debug!("linked {} definitions to prototypes", links.len());
}

fn same_signature(tu: &TranslationUnit, a: FuncId, b: FuncId) -> bool {
    let (a, b) = (tu.func(a), tu.func(b));
    a.params.len() == b.params.len()
        && a
            .params
            .iter()
            .zip(&b.params)
            .all(|(&x, &y)| types::is_same(tu.var(x).base_type, tu.var(y).base_type))
}

/// Bind each queued call to an overload: exact parameter types first, then
/// implicitly convertible ones. Unresolved calls keep `func: None`.
pub fn resolve_calls(tu: &mut TranslationUnit, calls: &[ExprId]) {
    let mut unresolved = 0;
    for &call in calls {
        let Expr::Call(site) = tu.expr(call) else {
            continue;
        };
        let name = site.name.clone();
        match select_overload(tu, call) {
            Some(func) => {
                if let Expr::Call(site) = tu.expr_mut(call) {
                    site.func = Some(func);
                }
            }
            None => {
                unresolved += 1;
                warn!("no matching overload for call to '{}'", name);
            }
        }
    }
    debug!(
        "resolved {} of {} call sites",
        calls.len() - unresolved,
        calls.len()
    );
}

fn select_overload(tu: &TranslationUnit, call: ExprId) -> Option<FuncId> {
    let Expr::Call(site) = tu.expr(call) else {
        return None;
    };
    let overloads = tu.functions_by_name.get(&site.name)?;
    if let [only] = overloads.as_slice() {
        return Some(*only);
    }

    let args = site
        .args
        .iter()
        .map(|&arg| types::result_type(tu, arg))
        .collect::<Option<Vec<_>>>()?;

    best_match(tu, overloads, &args, types::is_same)
        .or_else(|| {
            let found = best_match(tu, overloads, &args, types::is_compatible);
            if found.is_some() && candidates(tu, overloads, &args, types::is_compatible).len() > 1 {
                warn!("ambiguous call to '{}', using the first matching overload", site.name);
            }
            found
        })
}

fn candidates(
    tu: &TranslationUnit,
    overloads: &[FuncId],
    args: &[TypeRef],
    accepts: fn(TypeRef, TypeRef) -> bool,
) -> Vec<FuncId> {
    overloads
        .iter()
        .copied()
        .filter(|&f| {
            let func = tu.func(f);
            func.params.len() == args.len()
                && func
                    .params
                    .iter()
                    .zip(args)
                    .all(|(&param, &arg)| accepts(arg, tu.var(param).base_type))
        })
        .collect()
}

/// First matching definition, else the first matching prototype
fn best_match(
    tu: &TranslationUnit,
    overloads: &[FuncId],
    args: &[TypeRef],
    accepts: fn(TypeRef, TypeRef) -> bool,
) -> Option<FuncId> {
    let matches = candidates(tu, overloads, args, accepts);
    matches
        .iter()
        .copied()
        .find(|&f| !tu.func(f).is_prototype())
        .or_else(|| matches.first().copied())
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use crate::ast::{Expr, Stage, Stmt, TranslationUnit, TypeRef};
    use crate::keywords::Keyword;

    fn call_in_main(source: &str) -> (TranslationUnit, Option<crate::ast::FuncId>) {
        let tu = match parse(source, Stage::Fragment) {
            Ok(tu) => tu,
            Err(e) => panic!("parse failed: {}", e.message()),
        };
        let main = tu.main_function().unwrap();
        let last = *tu.func(main).body.as_ref().unwrap().last().unwrap();
        let Stmt::Expression(e) = tu.stmt(last) else {
            panic!("expected an expression statement");
        };
        let func = match tu.expr(*e) {
            Expr::Call(call) => call.func,
            Expr::Assign { rhs, .. } => match tu.expr(*rhs) {
                Expr::Call(call) => call.func,
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        };
        (tu, func)
    }

    #[test]
    fn test_exact_generic_instance() {
        let (tu, func) = call_in_main("void main() { vec3 v; v = normalize(v); }");
        let func = tu.func(func.unwrap());
        assert_eq!(func.name, "normalize");
        assert_eq!(func.return_type, TypeRef::Builtin(Keyword::Vec3));
    }

    #[test]
    fn test_definition_preferred_over_prototype() {
        let (tu, func) = call_in_main(
            "float f(float x);\nfloat f(int x) { return 1.0; }\nfloat f(float x) { return x; }\n\
             void main() { f(1.0); }",
        );
        let func = tu.func(func.unwrap());
        assert!(!func.is_prototype());
        assert!(tu.var(func.params[0]).base_type.is(Keyword::Float));
    }

    #[test]
    fn test_compatible_overload() {
        let (tu, func) = call_in_main(
            "float g(int64_t x) { return 1.0; }\nfloat g(vec2 x) { return x.x; }\n\
             void main() { g(1); }",
        );
        let func = tu.func(func.unwrap());
        assert!(tu.var(func.params[0]).base_type.is(Keyword::Int64));
    }

    #[test]
    fn test_exact_match_beats_compatible() {
        let (tu, func) = call_in_main(
            "float f(int64_t x) { return 1.0; }\nfloat f(int x) { return 2.0; }\n\
             void main() { f(1); }",
        );
        let func = tu.func(func.unwrap());
        assert!(tu.var(func.params[0]).base_type.is(Keyword::Int));
    }

    #[test]
    fn test_no_conversion_across_families() {
        let (_, func) = call_in_main(
            "float k(float x) { return x; }\nfloat k(vec2 x) { return x.x; }\n\
             void main() { k(1); }",
        );
        assert!(func.is_none());
    }

    #[test]
    fn test_unresolved_call_stays_unbound() {
        let (_, func) = call_in_main(
            "float h(float x) { return x; }\nfloat h(vec2 x) { return x.x; }\n\
             void main() { h(true, 1); }",
        );
        assert!(func.is_none());
    }
}
