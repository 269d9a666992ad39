//! HLSL writer
//!
//! Prints a resolved translation unit as HLSL. The output is deterministic:
//! helper preamble, builtin typed globals, structures, compute inputs,
//! interface blocks, the remaining globals, then functions in source order.
//! Combined GLSL samplers are split into a texture and a `_sampler` state,
//! storage buffers are lowered in `hlsl_buffers`.

use log::{debug, warn};
use std::collections::HashMap;

use super::hlsl_buffers::ByteBuffer;
use super::hlsl_helpers;
use crate::ast::{
    has_layout, AuxStorage, BinaryOp, Constant, CtrlFlowAttributes, Expr, ExprId, FuncId,
    Interpolation, LayoutQualifier, Stage, Stmt, StmtId, Storage, StructId, StructKind,
    TranslationUnit, TypeRef, UnaryOp, VarId, VariableKind,
};
use crate::builtins;
use crate::config::WriterConfig;
use crate::keywords::Keyword;
use crate::types;

/// Generate HLSL for a whole translation unit
pub fn generate(tu: &TranslationUnit, config: &WriterConfig) -> String {
    let mut writer = HlslWriter::new(tu, config);
    writer.write_translation_unit();
    debug!(
        "wrote {} bytes of HLSL, {} buffer fields lowered",
        writer.out.len(),
        writer.buffers.len()
    );
    writer.out
}

pub(super) struct HlslWriter<'a> {
    pub(super) tu: &'a TranslationUnit,
    config: &'a WriterConfig,
    pub(super) out: String,
    nest: usize,
    group_size: [i64; 3],
    /// Shared by buffer stores and hoisted atomics
    pub(super) temp_index: usize,
    pub(super) buffers: Vec<ByteBuffer>,
    /// Atomic calls already written as statements, by call site
    pub(super) hoisted: HashMap<ExprId, String>,
}

const COMPUTE_STATICS: &[(&str, &str, &str)] = &[
    ("uint3", "gl_WorkGroupID", "SV_GroupID"),
    ("uint3", "gl_LocalInvocationID", "SV_GroupThreadID"),
    ("uint3", "gl_GlobalInvocationID", "SV_DispatchThreadID"),
    ("uint", "gl_LocalInvocationIndex", "SV_GroupIndex"),
];

const TEXTURE_PREFIXES: &[&str] = &["sampler", "isampler", "usampler", "texture", "itexture", "utexture"];
const IMAGE_PREFIXES: &[&str] = &["image", "iimage", "uimage"];

const IMAGE_FORMATS: &[(&[&str], &str)] = &[
    (&["rgba32f", "rgba16f"], "float4"),
    (&["rgba16", "rgb10_a2", "rgba8"], "unorm float4"),
    (&["rgba16_snorm", "rgba8_snorm"], "snorm float4"),
    (&["rgba32i", "rgba16i", "rgba8i"], "int4"),
    (&["rgba32ui", "rgba16ui", "rgb10_a2ui", "rgba8ui"], "uint4"),
    (&["r11f_g11f_b10f"], "float3"),
    (&["rg32f", "rg16f"], "float2"),
    (&["rg16", "rg8"], "unorm float2"),
    (&["rg16_snorm", "rg8_snorm"], "snorm float2"),
    (&["rg32i", "rg16i", "rg8i"], "int2"),
    (&["rg32ui", "rg16ui", "rg8ui"], "uint2"),
    (&["r32f", "r16f"], "float"),
    (&["r16", "r8"], "unorm float"),
    (&["r16_snorm", "r8_snorm"], "snorm float"),
    (&["r32i", "r16i", "r8i"], "int"),
    (&["r32ui", "r16ui", "r8ui"], "uint"),
];

// === RESOURCE TYPES ===

/// GLSL sampler type that carries its own sampler state
fn is_combined_sampler(ty: TypeRef) -> bool {
    let Some(kw) = ty.builtin() else {
        return false;
    };
    let name = kw.as_str();
    !matches!(kw, Keyword::Sampler | Keyword::SamplerShadow)
        && ["sampler", "isampler", "usampler"].iter().any(|p| name.starts_with(p))
        && !name.contains("Buffer")
}

fn is_shadow_sampler(ty: TypeRef) -> bool {
    ty.builtin().map_or(false, |kw| kw.as_str().ends_with("Shadow"))
}

fn is_texture(kw: Keyword) -> bool {
    !matches!(kw, Keyword::Sampler | Keyword::SamplerShadow)
        && TEXTURE_PREFIXES.iter().any(|p| kw.as_str().starts_with(p))
}

fn is_image(kw: Keyword) -> bool {
    IMAGE_PREFIXES.iter().any(|p| kw.as_str().starts_with(p))
}

/// Register class letter of a resource type
fn register_class(kw: Keyword) -> Option<char> {
    match kw {
        Keyword::Sampler | Keyword::SamplerShadow => Some('s'),
        Keyword::AccelerationStructureExt => Some('t'),
        kw if is_texture(kw) => Some('t'),
        kw if is_image(kw) => Some('u'),
        _ => None,
    }
}

/// `<T>` element argument of a texture or image declaration
fn template_argument(kw: Keyword, layout: &[LayoutQualifier]) -> Option<String> {
    if !is_texture(kw) && !is_image(kw) {
        return None;
    }
    let format = layout
        .iter()
        .filter(|q| q.value.is_none())
        .find_map(|q| {
            IMAGE_FORMATS
                .iter()
                .find(|(names, _)| names.contains(&q.name.as_str()))
                .map(|(_, element)| *element)
        });
    let element = format.unwrap_or_else(|| match kw.as_str().as_bytes().first() {
        Some(b'i') => "int4",
        Some(b'u') => "uint4",
        _ => "float4",
    });
    Some(format!("<{}>", element))
}

// === CONSTANTS ===

/// `%.9g`, with `.0` appended when the result reads as an integer
fn format_float(value: f64) -> String {
    let text = if value == 0.0 {
        "0".to_string()
    } else if !value.is_finite() {
        value.to_string()
    } else {
        let scientific = format!("{:.8e}", value);
        let exponent = scientific
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0);
        if exponent < -4 || exponent >= 9 {
            let mantissa = scientific.split('e').next().unwrap_or_default();
            format!(
                "{}e{}{:02}",
                trim_fraction(mantissa),
                if exponent < 0 { '-' } else { '+' },
                exponent.abs()
            )
        } else {
            let decimals = usize::try_from(8 - exponent).unwrap_or(0);
            trim_fraction(&format!("{:.*}", decimals, value)).to_string()
        }
    };
    if text.contains(['.', 'e', 'n', 'i']) {
        text
    } else {
        text + ".0"
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn format_constant(constant: Constant) -> String {
    match constant {
        Constant::Short(v) => format!("{}s", v),
        Constant::Ushort(v) => format!("{}us", v),
        Constant::Int(v) => v.to_string(),
        Constant::Uint(v) => format!("{}u", v),
        Constant::Long(v) => format!("{}l", v),
        Constant::Ulong(v) => format!("{}ul", v),
        Constant::Half(v) => format!("{}hf", format_float(f64::from(v))),
        Constant::Float(v) => format_float(f64::from(v)),
        Constant::Double(v) if f64::from(v as f32) == v => format_float(v),
        Constant::Double(v) => format!("{:?}lf", v),
        Constant::Bool(v) => v.to_string(),
    }
}

fn selection_attribute(attributes: &CtrlFlowAttributes) -> Option<&'static str> {
    if attributes.flatten {
        Some("[flatten] ")
    } else if attributes.dont_flatten || attributes.branch {
        Some("[branch] ")
    } else {
        None
    }
}

fn loop_attribute(attributes: &CtrlFlowAttributes) -> Option<&'static str> {
    if attributes.unroll {
        Some("[unroll] ")
    } else if attributes.dont_unroll || attributes.loop_ {
        Some("[loop] ")
    } else {
        None
    }
}

impl<'a> HlslWriter<'a> {
    fn new(tu: &'a TranslationUnit, config: &'a WriterConfig) -> Self {
        Self {
            tu,
            config,
            out: String::new(),
            nest: 0,
            group_size: [1; 3],
            temp_index: 0,
            buffers: Vec::new(),
            hoisted: HashMap::new(),
        }
    }

    pub(super) fn indent_width(&self) -> usize {
        self.nest * self.config.indent
    }

    pub(super) fn indent(&mut self) {
        let width = self.indent_width();
        self.out.extend(std::iter::repeat(' ').take(width));
    }

    /// Render an expression on the side, e.g. to splice it into an address
    pub(super) fn expr_to_string(&mut self, id: ExprId) -> String {
        let saved = std::mem::take(&mut self.out);
        self.write_expr(id, false);
        std::mem::replace(&mut self.out, saved)
    }

    fn is_compute(&self) -> bool {
        self.tu.stage() == Stage::Compute
    }

    fn write_translation_unit(&mut self) {
        let tu = self.tu;
        let main = tu.main_function();

        if main.is_some() && self.config.emit_helpers {
            self.out.push_str(hlsl_helpers::TEXTURE_HELPERS);
            self.out.push_str(&hlsl_helpers::image_helpers());
            if self.is_compute() {
                self.out.push_str(&hlsl_helpers::ray_query_helpers());
            }
        }

        for &global in &tu.globals {
            let var = tu.var(global);
            if matches!(var.base_type, TypeRef::Builtin(_))
                && (!var.flags.hidden || self.config.write_hidden)
            {
                self.write_global(global);
            }
        }

        for &structure in &tu.structures {
            self.write_structure(structure);
        }

        if self.is_compute() && main.is_some() {
            self.write_compute_inputs();
        }

        for &block in &tu.interface_blocks {
            self.write_interface_block(block);
        }

        for &global in &tu.globals {
            let var = tu.var(global);
            if let TypeRef::Struct(id) = var.base_type {
                if !tu.structure(id).is_block() && (!var.flags.hidden || self.config.write_hidden) {
                    self.write_global(global);
                }
            }
        }

        for &func in &tu.functions {
            self.write_function(func);
        }
    }

    fn write_compute_inputs(&mut self) {
        for (ty, name, _) in COMPUTE_STATICS {
            self.out.push_str(&format!("static {} {};\n", ty, name));
        }
        self.out.push_str("static uint gl_SubgroupSize;\n");
        self.out.push_str("static uint gl_SubgroupInvocationID;\n");
        self.out.push_str("struct GLSLX_Input {\n");
        for (ty, name, semantic) in COMPUTE_STATICS {
            self.out.push_str(&format!("    {} {} : {};\n", ty, name, semantic));
        }
        self.out.push_str("};\n");
    }

    // === TYPES ===

    fn type_name(&self, ty: TypeRef) -> String {
        match ty {
            TypeRef::Builtin(kw) => kw.hlsl_name().to_string(),
            TypeRef::Struct(id) => self.tu.structure(id).name.clone().unwrap_or_default(),
        }
    }

    /// Type as written in declarations; matrices are stored row major
    pub(super) fn decl_type_name(&self, ty: TypeRef) -> String {
        match ty {
            TypeRef::Builtin(kw) if types::is_matrix(kw) => format!("row_major {}", kw.hlsl_name()),
            ty => self.type_name(ty),
        }
    }

    fn write_array_sizes(&mut self, sizes: &[Option<ExprId>]) {
        for &size in sizes {
            self.out.push('[');
            if let Some(size) = size {
                self.write_expr(size, false);
            }
            self.out.push(']');
        }
    }

    fn register(&self, kw: Keyword, layout: &[LayoutQualifier]) -> Option<String> {
        if layout.is_empty() {
            return None;
        }
        let class = register_class(kw)?;
        let binding = self.tu.layout_value(layout, "binding").unwrap_or(-1);
        let set = self.tu.layout_value(layout, "set").unwrap_or(0);
        Some(format!(" : register({}{}, space{})", class, binding, set))
    }

    // === DECLARATIONS ===

    fn write_global(&mut self, id: VarId) {
        let tu = self.tu;
        let var = tu.var(id);
        let Some(global) = var.global() else {
            return;
        };

        match global.storage {
            Storage::Const => self.out.push_str("static const "),
            Storage::Shared => self.out.push_str("groupshared "),
            _ => {}
        }
        match global.aux {
            AuxStorage::Centroid => self.out.push_str("centroid "),
            AuxStorage::Sample => self.out.push_str("sample "),
            AuxStorage::None | AuxStorage::Patch => {}
        }
        if var.flags.precise {
            self.out.push_str("precise ");
        }
        match global.interpolation {
            Interpolation::Flat => self.out.push_str("nointerpolation "),
            Interpolation::Noperspective => self.out.push_str("noperspective "),
            Interpolation::Smooth => self.out.push_str("linear "),
            Interpolation::None => {}
        }

        let declared = self.decl_type_name(var.base_type);
        self.out.push_str(&declared);
        let builtin = var.base_type.builtin();
        if let Some(template) = builtin.and_then(|kw| template_argument(kw, &global.layout)) {
            self.out.push_str(&template);
        }
        self.out.push(' ');
        self.out.push_str(&var.name);
        self.write_array_sizes(&var.array_sizes);
        if let Some(register) = builtin.and_then(|kw| self.register(kw, &global.layout)) {
            self.out.push_str(&register);
        }
        if let Some(init) = global.initial_value {
            self.out.push_str(" = ");
            self.write_expr(init, false);
        }
        self.out.push_str(";\n");

        if is_combined_sampler(var.base_type) {
            let state = if is_shadow_sampler(var.base_type) {
                "SamplerComparisonState"
            } else {
                "SamplerState"
            };
            self.out.push_str(&format!("{} {}_sampler", state, var.name));
            self.write_array_sizes(&var.array_sizes);
            if let Some(register) = self.register(Keyword::Sampler, &global.layout) {
                self.out.push_str(&register);
            }
            self.out.push_str(";\n");
        }
    }

    fn write_fields(&mut self, fields: &[VarId], first_suffix: &str) {
        let tu = self.tu;
        for (i, &field) in fields.iter().enumerate() {
            let var = tu.var(field);
            let declared = self.decl_type_name(var.base_type);
            self.out.push_str(&format!("    {} {}", declared, var.name));
            self.write_array_sizes(&var.array_sizes);
            if i == 0 {
                self.out.push_str(first_suffix);
            }
            self.out.push_str(";\n");
        }
    }

    fn write_structure(&mut self, id: StructId) {
        let decl = self.tu.structure(id);
        let name = decl.name.clone().unwrap_or_default();
        self.out.push_str(&format!("struct {} {{\n", name));
        self.write_fields(&decl.fields, "");
        self.out.push_str("};\n");
    }

    fn write_interface_block(&mut self, id: StructId) {
        let tu = self.tu;
        let decl = tu.structure(id);
        let StructKind::Block { storage, layout, .. } = &decl.kind else {
            return;
        };

        let mut workgroup = false;
        for (axis, name) in ["local_size_x", "local_size_y", "local_size_z"].iter().enumerate() {
            if has_layout(layout, name) {
                workgroup = true;
                if let Some(size) = tu.layout_value(layout, name) {
                    self.group_size[axis] = size;
                }
            }
        }
        if workgroup {
            return;
        }
        let Some(name) = decl.name.clone() else {
            return;
        };

        let binding = tu.layout_value(layout, "binding").unwrap_or(-1);
        let set = tu.layout_value(layout, "set").unwrap_or(0);
        match storage {
            Storage::Buffer => {
                let readonly = matches!(&decl.kind, StructKind::Block { memory, .. } if memory.readonly);
                let class = if readonly { 't' } else { 'u' };
                let register = format!(" : register({}{}, space{})", class, binding, set);
                self.write_storage_block(id, &register);
            }
            Storage::Uniform => {
                self.out.push_str(&format!("cbuffer {}", name));
                if !has_layout(layout, "push_constant") {
                    self.out.push_str(&format!(" : register(b{})", binding));
                }
                self.out.push_str(" {\n");
                self.write_fields(&decl.fields, " : packoffset(c0)");
                self.out.push_str("};\n");
            }
            _ => self.write_structure(id),
        }
    }

    fn write_function(&mut self, id: FuncId) {
        let tu = self.tu;
        let func = tu.func(id);
        if func.attributes.builtin {
            return;
        }
        let entry = self.is_compute() && func.name == "main";
        if entry && func.body.is_some() {
            let [x, y, z] = self.group_size;
            self.out.push_str(&format!("[numthreads({}, {}, {})]\n", x, y, z));
        }

        let returned = self.decl_type_name(func.return_type);
        self.out.push_str(&format!("{} {}(", returned, func.name));
        if entry {
            self.out.push_str("GLSLX_Input glslx_input");
            if !func.params.is_empty() {
                self.out.push_str(", ");
            }
        }
        for (i, &param) in func.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.write_parameter(param);
        }
        self.out.push(')');

        let Some(body) = &func.body else {
            self.out.push_str(";\n");
            return;
        };
        self.out.push_str(" {\n");
        self.nest += 1;
        if entry {
            for (_, name, _) in COMPUTE_STATICS {
                self.indent();
                self.out.push_str(&format!("{0} = glslx_input.{0};\n", name));
            }
            self.indent();
            self.out.push_str("gl_SubgroupSize = WaveGetLaneCount();\n");
            self.indent();
            self.out.push_str("gl_SubgroupInvocationID = WaveGetLaneIndex();\n");
        }
        for &stmt in body {
            self.write_line(stmt);
        }
        self.nest -= 1;
        self.out.push_str("}\n");
    }

    fn write_parameter(&mut self, id: VarId) {
        let var = self.tu.var(id);
        if let VariableKind::Parameter { qualifiers } = &var.kind {
            if qualifiers.constant {
                self.out.push_str("const ");
            }
            if qualifiers.input {
                self.out.push_str("in ");
            }
            if qualifiers.output {
                self.out.push_str("out ");
            }
            if qualifiers.inout {
                self.out.push_str("inout ");
            }
        }
        let declared = self.decl_type_name(var.base_type);
        self.out.push_str(&format!("{} {}", declared, var.name));
        self.write_array_sizes(&var.array_sizes);
        if is_combined_sampler(var.base_type) {
            let state = if is_shadow_sampler(var.base_type) {
                "SamplerComparisonState"
            } else {
                "SamplerState"
            };
            self.out.push_str(&format!(", {} {}_sampler", state, var.name));
        }
    }

    // === STATEMENTS ===

    /// One statement on its own indented line
    fn write_line(&mut self, id: StmtId) {
        self.indent();
        self.write_stmt(id);
        self.out.push('\n');
    }

    /// Body of a branch or loop, continuing the current line. A body that
    /// hoists atomics gets braces so the hoisted lines stay inside it.
    fn write_body(&mut self, id: StmtId) {
        if self.hoists_atomics(id) {
            self.out.push_str(" {\n");
            self.nest += 1;
            self.write_line(id);
            self.nest -= 1;
            self.indent();
            self.out.push('}');
            return;
        }
        self.out.push(' ');
        self.write_stmt(id);
    }

    /// Loop body that evaluates an atomic `condition` at the top of every
    /// iteration, after `while (true)` or `for (init; ; step)`
    fn write_guarded_body(&mut self, condition: ExprId, body: StmtId) {
        let tu = self.tu;
        self.out.push_str(" {\n");
        self.nest += 1;
        self.indent();
        self.hoist_atomics(condition);
        self.out.push_str("if (!");
        self.write_expr(condition, true);
        self.out.push_str(") break;\n");
        match tu.stmt(body) {
            Stmt::Compound(stmts) => {
                for &stmt in stmts {
                    self.write_line(stmt);
                }
            }
            _ => self.write_line(body),
        }
        self.nest -= 1;
        self.indent();
        self.out.push('}');
    }

    fn write_stmt(&mut self, id: StmtId) {
        let tu = self.tu;
        match tu.stmt(id) {
            Stmt::Compound(body) => {
                self.out.push_str("{\n");
                self.nest += 1;
                for &stmt in body {
                    self.write_line(stmt);
                }
                self.nest -= 1;
                self.indent();
                self.out.push('}');
            }
            Stmt::Empty => self.out.push(';'),
            Stmt::Declaration(vars) => {
                for (i, &var) in vars.iter().enumerate() {
                    if i > 0 {
                        self.out.push('\n');
                        self.indent();
                    }
                    self.write_local(var);
                }
            }
            Stmt::Expression(expr) => {
                self.hoist_atomics(*expr);
                self.write_expr(*expr, false);
                self.out.push(';');
            }
            Stmt::If {
                attributes,
                condition,
                then_branch,
                else_branch,
            } => {
                self.hoist_atomics(*condition);
                if let Some(attribute) = selection_attribute(attributes) {
                    self.out.push_str(attribute);
                }
                self.out.push_str("if (");
                self.write_expr(*condition, false);
                self.out.push(')');
                self.write_body(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.out.push_str(" else");
                    self.write_body(*else_branch);
                }
            }
            Stmt::Switch {
                attributes,
                expression,
                body,
            } => {
                self.hoist_atomics(*expression);
                if let Some(attribute) = selection_attribute(attributes) {
                    self.out.push_str(attribute);
                }
                self.out.push_str("switch (");
                self.write_expr(*expression, false);
                self.out.push_str(") {\n");
                self.nest += 1;
                for &stmt in body {
                    self.write_line(stmt);
                }
                self.nest -= 1;
                self.indent();
                self.out.push('}');
            }
            Stmt::CaseLabel(Some(value)) => {
                self.out.push_str("case ");
                self.write_expr(*value, false);
                self.out.push(':');
            }
            Stmt::CaseLabel(None) => self.out.push_str("default:"),
            Stmt::While {
                attributes,
                condition,
                body,
            } => {
                if let Some(attribute) = loop_attribute(attributes) {
                    self.out.push_str(attribute);
                }
                match tu.stmt(*condition) {
                    Stmt::Expression(expr) if self.has_atomics(*expr) => {
                        self.out.push_str("while (true)");
                        self.write_guarded_body(*expr, *body);
                    }
                    _ => {
                        self.out.push_str("while (");
                        self.write_inline_stmt(*condition);
                        self.out.push(')');
                        self.write_body(*body);
                    }
                }
            }
            Stmt::Do {
                attributes,
                body,
                condition,
            } => {
                if let Some(attribute) = loop_attribute(attributes) {
                    self.out.push_str(attribute);
                }
                if self.has_atomics(*condition) {
                    warn!("atomic in a do-while condition is written in place");
                }
                self.out.push_str("do");
                self.write_body(*body);
                self.out.push('\n');
                self.indent();
                self.out.push_str("while (");
                self.write_expr(*condition, false);
                self.out.push_str(");");
            }
            Stmt::For {
                attributes,
                init,
                condition,
                step,
                body,
            } => {
                if let Some(attribute) = loop_attribute(attributes) {
                    self.out.push_str(attribute);
                }
                self.out.push_str("for (");
                if let Some(init) = init {
                    self.write_inline_stmt(*init);
                }
                self.out.push(';');
                let guard = condition.filter(|&c| self.has_atomics(c));
                if let Some(condition) = condition.filter(|_| guard.is_none()) {
                    self.out.push(' ');
                    self.write_expr(condition, false);
                }
                self.out.push(';');
                if let Some(step) = step {
                    if self.has_atomics(*step) {
                        warn!("atomic in a for-loop step is written in place");
                    }
                    self.out.push(' ');
                    self.write_expr(*step, false);
                }
                self.out.push(')');
                match guard {
                    Some(condition) => self.write_guarded_body(condition, *body),
                    None => self.write_body(*body),
                }
            }
            Stmt::Continue => self.out.push_str("continue;"),
            Stmt::Break => self.out.push_str("break;"),
            Stmt::Return(Some(value)) => {
                self.hoist_atomics(*value);
                self.out.push_str("return ");
                self.write_expr(*value, false);
                self.out.push(';');
            }
            Stmt::Return(None) => self.out.push_str("return;"),
            Stmt::Discard => self.out.push_str("discard;"),
            Stmt::ExtJump(keyword) => self.out.push_str(&format!("{}();", keyword.hlsl_name())),
        }
    }

    /// Loop headers: declarations share one type, nothing is hoisted
    fn write_inline_stmt(&mut self, id: StmtId) {
        let tu = self.tu;
        match tu.stmt(id) {
            Stmt::Declaration(vars) => {
                for (i, &id) in vars.iter().enumerate() {
                    let var = tu.var(id);
                    if i == 0 {
                        let declared = self.decl_type_name(var.base_type);
                        self.out.push_str(&declared);
                        self.out.push(' ');
                    } else {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&var.name);
                    self.write_array_sizes(&var.array_sizes);
                    if let Some(init) = var.initial_value() {
                        self.out.push_str(" = ");
                        self.write_expr(init, false);
                    }
                }
            }
            Stmt::Expression(expr) => self.write_expr(*expr, false),
            _ => {}
        }
    }

    fn write_local(&mut self, id: VarId) {
        let var = self.tu.var(id);
        let init = var.initial_value();
        if let Some(init) = init {
            self.hoist_atomics(init);
        }
        if var.flags.constant {
            self.out.push_str("const ");
        }
        let declared = self.decl_type_name(var.base_type);
        self.out.push_str(&format!("{} {}", declared, var.name));
        self.write_array_sizes(&var.array_sizes);
        if let Some(init) = init {
            self.out.push_str(" = ");
            self.write_expr(init, false);
        }
        self.out.push(';');
    }

    // === EXPRESSIONS ===

    /// `nested` parenthesizes assignments used as values
    pub(super) fn write_expr(&mut self, id: ExprId, nested: bool) {
        if let Some(temp) = self.hoisted.get(&id) {
            let temp = temp.clone();
            self.out.push_str(&temp);
            return;
        }
        let tu = self.tu;
        match tu.expr(id) {
            Expr::Constant(constant) => self.out.push_str(&format_constant(*constant)),
            Expr::Variable(var) => {
                if let Some(buffer) = self.buffer_of(id) {
                    self.write_load(buffer, None);
                } else {
                    self.out.push_str(&tu.var(*var).name);
                }
            }
            Expr::FieldOrSwizzle { operand, name, .. } => {
                if let Some(buffer) = self.buffer_of(id) {
                    self.write_load(buffer, None);
                } else {
                    self.write_expr(*operand, false);
                    self.out.push('.');
                    self.out.push_str(name);
                }
            }
            Expr::Subscript { operand, index } => {
                if let Some(buffer) = self.buffer_of(*operand) {
                    self.write_load(buffer, Some(*index));
                } else {
                    self.write_expr(*operand, false);
                    self.out.push('[');
                    self.write_expr(*index, false);
                    self.out.push(']');
                }
            }
            Expr::Call(call) => {
                let name: &str = builtins::hlsl_function_name(&call.name).unwrap_or(call.name.as_str());
                self.out.push_str(name);
                self.out.push('(');
                for (i, &arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(arg, false);
                    self.write_sampler_argument(arg);
                }
                self.out.push(')');
            }
            Expr::Constructor { ty, args } => self.write_constructor(*ty, args),
            Expr::Unary { op, operand } => {
                let (prefix, suffix) = match op {
                    UnaryOp::Plus => ("+", ""),
                    UnaryOp::Minus => ("(-", ")"),
                    UnaryOp::BitNot => ("~", ""),
                    UnaryOp::LogicalNot => ("!", ""),
                    UnaryOp::PreIncrement => ("++", ""),
                    UnaryOp::PreDecrement => ("--", ""),
                    UnaryOp::PostIncrement => ("", "++"),
                    UnaryOp::PostDecrement => ("", "--"),
                };
                self.out.push_str(prefix);
                self.write_expr(*operand, false);
                self.out.push_str(suffix);
            }
            Expr::Binary { op, lhs, rhs } => self.write_binary(*op, *lhs, *rhs),
            Expr::Assign { op, lhs, rhs } => {
                if let Some(access) = self.buffer_access(*lhs) {
                    self.write_buffer_store(access, *op, *lhs, *rhs);
                    return;
                }
                if nested {
                    self.out.push('(');
                }
                self.write_expr(*lhs, false);
                self.out.push_str(&format!(" {} ", op.as_str()));
                self.write_expr(*rhs, false);
                if nested {
                    self.out.push(')');
                }
            }
            Expr::Sequence { lhs, rhs } => {
                self.out.push('(');
                self.write_expr(*lhs, false);
                self.out.push_str(", ");
                self.write_expr(*rhs, false);
                self.out.push(')');
            }
            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                self.out.push('(');
                self.write_expr(*condition, true);
                self.out.push_str(" ? ");
                self.write_expr(*on_true, true);
                self.out.push_str(" : ");
                self.write_expr(*on_false, true);
                self.out.push(')');
            }
            Expr::ArraySpecifier(items) => {
                self.out.push_str("{ ");
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(item, false);
                }
                self.out.push_str(" }");
            }
        }
    }

    fn write_load(&mut self, buffer: usize, index: Option<ExprId>) {
        let field = self.tu.var(self.buffers[buffer].field).name.clone();
        self.out.push_str(&format!("__load_{}(", field));
        match index {
            Some(index) => self.write_expr(index, false),
            None => self.out.push('0'),
        }
        self.out.push(')');
    }

    /// Combined samplers travel as a texture plus their `_sampler` state
    fn write_sampler_argument(&mut self, arg: ExprId) {
        let tu = self.tu;
        match tu.expr(arg) {
            Expr::Variable(var) if is_combined_sampler(tu.var(*var).base_type) => {
                self.out.push_str(&format!(", {}_sampler", tu.var(*var).name));
            }
            Expr::Subscript { operand, index } => {
                if let Expr::Variable(var) = tu.expr(*operand) {
                    if is_combined_sampler(tu.var(*var).base_type) {
                        self.out.push_str(&format!(", {}_sampler[", tu.var(*var).name));
                        self.write_expr(*index, false);
                        self.out.push(']');
                    }
                }
            }
            _ => {}
        }
    }

    fn write_arguments(&mut self, args: &[ExprId]) {
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.write_expr(arg, false);
        }
    }

    fn write_constructor(&mut self, ty: TypeRef, args: &[ExprId]) {
        let tu = self.tu;
        match ty {
            TypeRef::Builtin(_) if is_combined_sampler(ty) => self.write_arguments(args),
            TypeRef::Struct(_) => {
                let name = self.type_name(ty);
                self.out.push_str(&format!("({})(", name));
                self.write_arguments(args);
                self.out.push(')');
            }
            TypeRef::Builtin(kw) => {
                self.out.push_str(kw.hlsl_name());
                self.out.push('(');
                let splat = match args {
                    [only] if types::is_vector(kw) => types::result_type(tu, *only)
                        .and_then(TypeRef::builtin)
                        .map_or(false, types::is_scalar),
                    _ => false,
                };
                if splat {
                    let constant = matches!(tu.expr(args[0]), Expr::Constant(_));
                    if constant {
                        self.out.push('(');
                    }
                    self.write_expr(args[0], false);
                    if constant {
                        self.out.push(')');
                    }
                    self.out.push('.');
                    self.out.push_str(&"x".repeat(types::vector_size(kw)));
                } else {
                    self.write_arguments(args);
                }
                self.out.push(')');
            }
        }
    }

    fn write_binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) {
        let tu = self.tu;
        let lhs_type = types::result_type(tu, lhs).and_then(TypeRef::builtin);
        let rhs_type = types::result_type(tu, rhs).and_then(TypeRef::builtin);
        if op == BinaryOp::Mul {
            if let (Some(l), Some(r)) = (lhs_type, rhs_type) {
                if types::is_matrix(l) && types::is_vector(r) {
                    self.out.push_str("mul(");
                    self.write_expr(rhs, false);
                    self.out.push_str(", ");
                    self.write_expr(lhs, false);
                    self.out.push(')');
                    return;
                }
            }
        }
        let symbol = match op {
            BinaryOp::LogicalXor => "!=",
            op => op.as_str(),
        };
        self.out.push('(');
        self.write_expr(lhs, true);
        self.out.push_str(&format!(" {} ", symbol));
        self.write_expr(rhs, true);
        self.out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn hlsl(source: &str, stage: Stage) -> String {
        let tu = match parse(source, stage) {
            Ok(tu) => tu,
            Err(e) => panic!("parse failed: {}", e.message()),
        };
        generate(&tu, &WriterConfig::default())
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(f64::from(0.212671f32)), "0.212670997");
        assert_eq!(format_float(1e-5), "1e-05");
        assert_eq!(format_float(2.5e10), "2.5e+10");
        assert_eq!(format_float(123456789.0), "123456789.0");
        assert_eq!(format_float(0.0), "0.0");
    }

    #[test]
    fn test_format_constant() {
        assert_eq!(format_constant(Constant::Int(-1)), "-1");
        assert_eq!(format_constant(Constant::Uint(2147483648)), "2147483648u");
        assert_eq!(format_constant(Constant::Short(42)), "42s");
        assert_eq!(format_constant(Constant::Ushort(42)), "42us");
        assert_eq!(format_constant(Constant::Long(42)), "42l");
        assert_eq!(format_constant(Constant::Ulong(42)), "42ul");
        assert_eq!(format_constant(Constant::Double(1.5)), "1.5");
        assert_eq!(format_constant(Constant::Double(1.3)), "1.3lf");
        assert_eq!(format_constant(Constant::Half(1.5)), "1.5hf");
        assert_eq!(format_constant(Constant::Bool(true)), "true");
    }

    #[test]
    fn test_resource_classes() {
        assert_eq!(register_class(Keyword::Sampler2D), Some('t'));
        assert_eq!(register_class(Keyword::UTexture2D), Some('t'));
        assert_eq!(register_class(Keyword::Sampler), Some('s'));
        assert_eq!(register_class(Keyword::Image2D), Some('u'));
        assert_eq!(register_class(Keyword::AccelerationStructureExt), Some('t'));
        assert_eq!(register_class(Keyword::Vec4), None);
        assert!(is_combined_sampler(TypeRef::Builtin(Keyword::USampler2D)));
        assert!(!is_combined_sampler(TypeRef::Builtin(Keyword::SamplerBuffer)));
        assert!(!is_combined_sampler(TypeRef::Builtin(Keyword::SamplerShadow)));
        assert!(is_shadow_sampler(TypeRef::Builtin(Keyword::Sampler2DShadow)));
    }

    #[test]
    fn test_template_arguments() {
        let format = |name: &str| LayoutQualifier {
            name: name.to_string(),
            value: None,
        };
        assert_eq!(
            template_argument(Keyword::Image2D, &[format("rgba8")]).as_deref(),
            Some("<unorm float4>")
        );
        assert_eq!(
            template_argument(Keyword::UImage2D, &[format("r32ui")]).as_deref(),
            Some("<uint>")
        );
        assert_eq!(template_argument(Keyword::IImage2D, &[]).as_deref(), Some("<int4>"));
        assert_eq!(template_argument(Keyword::Sampler2D, &[]).as_deref(), Some("<float4>"));
        assert_eq!(template_argument(Keyword::Sampler, &[]), None);
    }

    #[test]
    fn test_helpers_only_with_entry_point() {
        let without = hlsl("float f(float x) { return x; }\n", Stage::Fragment);
        assert!(!without.contains("texelFetch"));
        let with = hlsl("void main() {}\n", Stage::Fragment);
        assert!(with.starts_with("uint4 texelFetch(Texture2D<uint4> t, int2 P, int lod) {\n"));
        assert!(!with.contains("rayQueryProceedEXT"));
        assert!(with.ends_with("void main() {\n}\n"));
    }

    #[test]
    fn test_matrix_globals_are_row_major() {
        let out = hlsl("mat4 model, view;\n", Stage::Vertex);
        assert_eq!(out, "row_major float4x4 model;\nrow_major float4x4 view;\n");
    }

    #[test]
    fn test_constant_global() {
        let out = hlsl("const float test = 1;\n", Stage::Fragment);
        assert_eq!(out, "static const float test = 1;\n");
    }

    #[test]
    fn test_interpolation_qualifiers() {
        let out = hlsl(
            "flat in int a;\nnoperspective in vec2 b;\nsmooth in vec3 c;\ncentroid in vec4 d;\n",
            Stage::Fragment,
        );
        assert_eq!(
            out,
            "nointerpolation int a;\nnoperspective float2 b;\nlinear float3 c;\ncentroid float4 d;\n"
        );
    }

    #[test]
    fn test_statement_layout() {
        let out = hlsl(
            "void f(int a) {\n    if (a > 1) a = 2; else if (a < 0) { a = 0; }\n    \
             do a++; while (a < 4);\n    for (;;) { break; }\n}\n",
            Stage::Fragment,
        );
        assert_eq!(
            out,
            "void f(int a) {\n    if ((a > 1)) a = 2; else if ((a < 0)) {\n        a = 0;\n    }\n    \
             do a++;\n    while ((a < 4));\n    for (;;) {\n        break;\n    }\n}\n"
        );
    }

    #[test]
    fn test_switch_layout() {
        let out = hlsl(
            "void f(int a) {\n    switch (a) {\n    case 1:\n        a = 2;\n        break;\n    default:\n        break;\n    }\n}\n",
            Stage::Fragment,
        );
        assert_eq!(
            out,
            "void f(int a) {\n    switch (a) {\n        case 1:\n        a = 2;\n        break;\n        \
             default:\n        break;\n    }\n}\n"
        );
    }

    #[test]
    fn test_splat_and_xor() {
        let out = hlsl(
            "vec4 f(float x, bool a, bool b) {\n    bool c = a ^^ b;\n    return vec4(x) + vec4(0.0);\n}\n",
            Stage::Fragment,
        );
        assert_eq!(
            out,
            "float4 f(float x, bool a, bool b) {\n    bool c = (a != b);\n    \
             return (float4(x.xxxx) + float4((0.0).xxxx));\n}\n"
        );
    }

    #[test]
    fn test_indent_config() {
        let tu = parse("void f() { return; }\n", Stage::Fragment).unwrap();
        let config = WriterConfig {
            indent: 2,
            ..WriterConfig::default()
        };
        assert_eq!(generate(&tu, &config), "void f() {\n  return;\n}\n");
    }
}
