//! glslx Abstract Syntax Tree
//!
//! One `TranslationUnit` owns every node of one shader stage. Nodes live in
//! flat arenas and refer to each other through typed ids, so the tree is
//! cheap to clone and prototype/definition back links need no ownership games.
//! - Builtin types are plain `Keyword` values, compared by value
//! - User structures and interface blocks share `StructDecl`
//! - Expressions and statements are closed sum types

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

use crate::keywords::Keyword;

macro_rules! define_id {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

define_id!(ExprId, StmtId, VarId, FuncId, StructId);

// === LITERALS ===

/// Typed literal value, produced by the lexer and by constant folding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Short(i16),
    Ushort(u16),
    Int(i32),
    Uint(u32),
    Long(i64),
    Ulong(u64),
    Half(f32),
    Float(f32),
    Double(f64),
    Bool(bool),
}

impl Constant {
    /// Builtin type of the literal
    pub fn type_keyword(&self) -> Keyword {
        match self {
            Constant::Short(_) => Keyword::Int16,
            Constant::Ushort(_) => Keyword::Uint16,
            Constant::Int(_) => Keyword::Int,
            Constant::Uint(_) => Keyword::Uint,
            Constant::Long(_) => Keyword::Int64,
            Constant::Ulong(_) => Keyword::Uint64,
            Constant::Half(_) => Keyword::Float16,
            Constant::Float(_) => Keyword::Float,
            Constant::Double(_) => Keyword::Double,
            Constant::Bool(_) => Keyword::Bool,
        }
    }

    /// Integer value widened to i64, for array sizes and case labels
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Constant::Short(v) => Some(v as i64),
            Constant::Ushort(v) => Some(v as i64),
            Constant::Int(v) => Some(v as i64),
            Constant::Uint(v) => Some(v as i64),
            Constant::Long(v) => Some(v),
            Constant::Ulong(v) => Some(v as i64),
            _ => None,
        }
    }
}

// === TYPES ===

/// Reference to a type: an interned builtin or a user structure/block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Builtin(Keyword),
    Struct(StructId),
}

impl TypeRef {
    pub fn builtin(self) -> Option<Keyword> {
        match self {
            TypeRef::Builtin(kw) => Some(kw),
            TypeRef::Struct(_) => None,
        }
    }

    pub fn is(self, kw: Keyword) -> bool {
        self == TypeRef::Builtin(kw)
    }
}

/// Shader stage a translation unit is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
    RayGen,
    Intersect,
    AnyHit,
    ClosestHit,
    Miss,
    Callable,
}

const STAGE_NAMES: &[(Stage, &str, &str)] = &[
    (Stage::Vertex, "vert", "vertex"),
    (Stage::TessControl, "tesc", "tess-control"),
    (Stage::TessEvaluation, "tese", "tess-evaluation"),
    (Stage::Geometry, "geom", "geometry"),
    (Stage::Fragment, "frag", "fragment"),
    (Stage::Compute, "comp", "compute"),
    (Stage::RayGen, "rgen", "raygen"),
    (Stage::Intersect, "rint", "intersect"),
    (Stage::AnyHit, "rahit", "anyhit"),
    (Stage::ClosestHit, "rchit", "closesthit"),
    (Stage::Miss, "rmiss", "miss"),
    (Stage::Callable, "rcall", "callable"),
];

impl Stage {
    /// Stage implied by a conventional file extension (`comp`, `frag`, ...)
    pub fn from_extension(ext: &str) -> Option<Stage> {
        STAGE_NAMES
            .iter()
            .find(|(_, e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(stage, _, _)| *stage)
    }

    pub fn name(self) -> &'static str {
        STAGE_NAMES
            .iter()
            .find(|(stage, _, _)| *stage == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("unknown")
    }

    pub fn is_ray_tracing(self) -> bool {
        matches!(
            self,
            Stage::RayGen
                | Stage::Intersect
                | Stage::AnyHit
                | Stage::ClosestHit
                | Stage::Miss
                | Stage::Callable
        )
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STAGE_NAMES
            .iter()
            .find(|(_, ext, name)| *name == s || *ext == s)
            .map(|(stage, _, _)| *stage)
            .ok_or_else(|| format!("unknown shader stage '{}'", s))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// === QUALIFIERS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    None,
    Const,
    In,
    Out,
    Attribute,
    Uniform,
    Varying,
    Buffer,
    Shared,
    RayPayload,
    RayPayloadIn,
    HitAttribute,
    CallableData,
    CallableDataIn,
}

impl Storage {
    /// Storage classes that may introduce an interface block
    pub fn allows_block(self) -> bool {
        matches!(self, Storage::In | Storage::Out | Storage::Uniform | Storage::Buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxStorage {
    #[default]
    None,
    Centroid,
    Sample,
    Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    None,
    Smooth,
    Flat,
    Noperspective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    None,
    Lowp,
    Mediump,
    Highp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryFlags {
    pub coherent: bool,
    pub volatile: bool,
    pub restrict: bool,
    pub readonly: bool,
    pub writeonly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarFlags {
    pub array: bool,
    pub precise: bool,
    pub constant: bool,
    pub invariant: bool,
    /// Injected by the compiler, not written unless asked for
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamQualifiers {
    pub constant: bool,
    pub input: bool,
    pub output: bool,
    pub inout: bool,
}

/// `layout(name)` or `layout(name = value)`; the value is already folded
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutQualifier {
    pub name: String,
    pub value: Option<ExprId>,
}

/// `[[unroll, dependency_length(4)]]` style statement attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlFlowAttributes {
    pub unroll: bool,
    pub dont_unroll: bool,
    pub loop_: bool,
    pub dependency_infinite: bool,
    pub flatten: bool,
    pub dont_flatten: bool,
    pub branch: bool,
    pub dependency_length: Option<i32>,
    pub min_iterations: Option<i32>,
    pub max_iterations: Option<i32>,
    pub iteration_multiple: Option<i32>,
    pub peel_count: Option<i32>,
    pub partial_count: Option<i32>,
}

// === VARIABLES ===

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalInfo {
    pub storage: Storage,
    pub aux: AuxStorage,
    pub memory: MemoryFlags,
    pub interpolation: Interpolation,
    pub initial_value: Option<ExprId>,
    pub layout: Vec<LayoutQualifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Global(GlobalInfo),
    Parameter { qualifiers: ParamQualifiers },
    Local { initial_value: Option<ExprId> },
    Field,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub base_type: TypeRef,
    /// Outermost dimension first; `None` is an unsized `[]`
    pub array_sizes: Vec<Option<ExprId>>,
    pub flags: VarFlags,
    pub precision: Precision,
    pub kind: VariableKind,
}

impl Variable {
    pub fn global(&self) -> Option<&GlobalInfo> {
        match &self.kind {
            VariableKind::Global(info) => Some(info),
            _ => None,
        }
    }

    pub fn storage(&self) -> Storage {
        self.global().map(|g| g.storage).unwrap_or_default()
    }

    pub fn initial_value(&self) -> Option<ExprId> {
        match &self.kind {
            VariableKind::Global(info) => info.initial_value,
            VariableKind::Local { initial_value } => *initial_value,
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.flags.array || !self.array_sizes.is_empty()
    }
}

// === STRUCTURES ===

#[derive(Debug, Clone, PartialEq)]
pub enum StructKind {
    Struct,
    /// `uniform Name { ... }`, `buffer Name { ... }`, `in`/`out` blocks
    Block {
        storage: Storage,
        memory: MemoryFlags,
        layout: Vec<LayoutQualifier>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Option<String>,
    pub fields: Vec<VarId>,
    pub kind: StructKind,
}

impl StructDecl {
    pub fn is_block(&self) -> bool {
        matches!(self.kind, StructKind::Block { .. })
    }
}

// === FUNCTIONS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionAttributes {
    /// Declared by the builtin prototype set
    pub builtin: bool,
    /// Instantiated from a generic builtin prototype
    pub generic_instance: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: TypeRef,
    pub params: Vec<VarId>,
    /// `None` for a prototype-only declaration
    pub body: Option<Vec<StmtId>>,
    pub attributes: FunctionAttributes,
    /// Earlier prototype this definition matches
    pub prototype: Option<FuncId>,
}

impl Function {
    pub fn is_prototype(&self) -> bool {
        self.body.is_none()
    }
}

// === EXPRESSIONS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicalNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalXor,
    LogicalOr,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalXor => "^^",
            BinaryOp::LogicalOr => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalXor | BinaryOp::LogicalOr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitXor => "^=",
            AssignOp::BitOr => "|=",
        }
    }

    /// Plain operator a compound assignment applies
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<ExprId>,
    /// Bound by the resolution pass; `None` when nothing matched
    pub func: Option<FuncId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),
    Variable(VarId),
    /// `a.b`; `field` is set when `a` is a structure, otherwise it is a swizzle
    FieldOrSwizzle {
        operand: ExprId,
        name: String,
        field: Option<VarId>,
    },
    /// `a[i]`
    Subscript { operand: ExprId, index: ExprId },
    Call(FunctionCall),
    /// `vec3(...)`, `S(...)`
    Constructor { ty: TypeRef, args: Vec<ExprId> },
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    Assign { op: AssignOp, lhs: ExprId, rhs: ExprId },
    /// `a, b`
    Sequence { lhs: ExprId, rhs: ExprId },
    /// `c ? a : b`
    Ternary {
        condition: ExprId,
        on_true: ExprId,
        on_false: ExprId,
    },
    /// `{ a, b, c }` or `T[](a, b, c)`
    ArraySpecifier(Vec<ExprId>),
}

// === STATEMENTS ===

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `{ ... }`
    Compound(Vec<StmtId>),
    Empty,
    /// `T a = x, b;`
    Declaration(Vec<VarId>),
    Expression(ExprId),
    If {
        attributes: CtrlFlowAttributes,
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    Switch {
        attributes: CtrlFlowAttributes,
        expression: ExprId,
        body: Vec<StmtId>,
    },
    /// `case x:`; `None` is `default:`
    CaseLabel(Option<ExprId>),
    /// The condition is a declaration or expression statement
    While {
        attributes: CtrlFlowAttributes,
        condition: StmtId,
        body: StmtId,
    },
    Do {
        attributes: CtrlFlowAttributes,
        body: StmtId,
        condition: ExprId,
    },
    For {
        attributes: CtrlFlowAttributes,
        init: Option<StmtId>,
        condition: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },
    Continue,
    Break,
    Return(Option<ExprId>),
    Discard,
    /// `ignoreIntersectionEXT;` / `terminateRayEXT;`
    ExtJump(Keyword),
}

// === TRANSLATION UNIT ===

#[derive(Debug, Clone, PartialEq)]
pub struct VersionDirective {
    pub number: u32,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDirective {
    pub name: String,
    pub behavior: String,
}

/// Every node of one parsed shader stage
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    stage: Stage,
    pub version: Option<VersionDirective>,
    pub extensions: Vec<ExtensionDirective>,

    pub exprs: Vec<Expr>,
    pub stmts: Vec<Stmt>,
    pub vars: Vec<Variable>,
    pub funcs: Vec<Function>,
    pub structs: Vec<StructDecl>,

    /// Global variables in declaration order, hidden ones first
    pub globals: Vec<VarId>,
    /// User structures in declaration order
    pub structures: Vec<StructId>,
    pub structures_by_name: IndexMap<String, StructId>,
    /// Interface blocks in declaration order
    pub interface_blocks: Vec<StructId>,
    /// Functions in registration order, builtin prototypes first
    pub functions: Vec<FuncId>,
    pub functions_by_name: IndexMap<String, Vec<FuncId>>,
}

impl TranslationUnit {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            version: None,
            extensions: Vec::new(),
            exprs: Vec::new(),
            stmts: Vec::new(),
            vars: Vec::new(),
            funcs: Vec::new(),
            structs: Vec::new(),
            globals: Vec::new(),
            structures: Vec::new(),
            structures_by_name: IndexMap::new(),
            interface_blocks: Vec::new(),
            functions: Vec::new(),
            functions_by_name: IndexMap::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() as u32 - 1)
    }

    pub fn add_var(&mut self, var: Variable) -> VarId {
        self.vars.push(var);
        VarId(self.vars.len() as u32 - 1)
    }

    pub fn add_func(&mut self, func: Function) -> FuncId {
        self.funcs.push(func);
        FuncId(self.funcs.len() as u32 - 1)
    }

    pub fn add_struct(&mut self, decl: StructDecl) -> StructId {
        self.structs.push(decl);
        StructId(self.structs.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub fn structure(&self, id: StructId) -> &StructDecl {
        &self.structs[id.index()]
    }

    /// Literal value of an expression that folded to a constant
    pub fn constant(&self, id: ExprId) -> Option<Constant> {
        match self.expr(id) {
            Expr::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Register a function under its name, keeping overloads in order
    pub fn register_function(&mut self, id: FuncId) {
        let name = self.func(id).name.clone();
        self.functions.push(id);
        self.functions_by_name.entry(name).or_default().push(id);
    }

    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.structures_by_name.get(name).copied()
    }

    pub fn find_global(&self, name: &str) -> Option<VarId> {
        self.globals.iter().copied().find(|&id| self.var(id).name == name)
    }

    /// Functions written by the user, in source order
    pub fn user_functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions
            .iter()
            .copied()
            .filter(|&id| !self.func(id).attributes.builtin)
    }

    /// The single `main` definition, if any
    pub fn main_function(&self) -> Option<FuncId> {
        self.functions_by_name
            .get("main")
            .and_then(|ids| ids.iter().copied().find(|&id| !self.func(id).is_prototype()))
    }

    /// Human readable name of a type
    pub fn type_name(&self, ty: TypeRef) -> String {
        match ty {
            TypeRef::Builtin(kw) => kw.as_str().to_string(),
            TypeRef::Struct(id) => self
                .structure(id)
                .name
                .clone()
                .unwrap_or_else(|| "<anonymous>".to_string()),
        }
    }

    /// `layout(...)` value of a global, if present
    pub fn layout_value(&self, layout: &[LayoutQualifier], name: &str) -> Option<i64> {
        layout
            .iter()
            .find(|q| q.name == name)
            .and_then(|q| q.value)
            .and_then(|v| self.constant(v))
            .and_then(|c| c.as_i64())
    }
}

pub fn has_layout(layout: &[LayoutQualifier], name: &str) -> bool {
    layout.iter().any(|q| q.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!("compute".parse::<Stage>(), Ok(Stage::Compute));
        assert_eq!("frag".parse::<Stage>(), Ok(Stage::Fragment));
        assert_eq!(Stage::from_extension("rchit"), Some(Stage::ClosestHit));
        assert_eq!(Stage::from_extension("glsl"), None);
        assert!("pixel".parse::<Stage>().is_err());
        assert_eq!(Stage::TessEvaluation.to_string(), "tess-evaluation");
    }

    #[test]
    fn test_constant_types() {
        assert_eq!(Constant::Uint(3).type_keyword(), Keyword::Uint);
        assert_eq!(Constant::Half(1.0).type_keyword(), Keyword::Float16);
        assert_eq!(Constant::Ushort(7).as_i64(), Some(7));
        assert_eq!(Constant::Float(1.0).as_i64(), None);
    }

    #[test]
    fn test_register_function() {
        let mut tu = TranslationUnit::new(Stage::Fragment);
        let make = |tu: &mut TranslationUnit| {
            tu.add_func(Function {
                name: "f".to_string(),
                return_type: TypeRef::Builtin(Keyword::Void),
                params: Vec::new(),
                body: Some(Vec::new()),
                attributes: FunctionAttributes::default(),
                prototype: None,
            })
        };
        let a = make(&mut tu);
        let b = make(&mut tu);
        tu.register_function(a);
        tu.register_function(b);
        assert_eq!(tu.functions_by_name["f"], vec![a, b]);
        assert_eq!(tu.user_functions().count(), 2);
    }
}
