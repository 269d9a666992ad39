//! Hidden globals injected before any source is parsed
//!
//! Each stage sees its own invocation, vertex, fragment or ray tracing
//! built-ins, the subgroup variables of the rasterization and compute stages,
//! and the ray flag / hit kind / ray query constants everywhere.

use super::Parser;
use crate::ast::{
    AuxStorage, Constant, Expr, GlobalInfo, Interpolation, MemoryFlags, Precision, Stage, Storage, TypeRef, VarFlags, Variable, VariableKind,
};
use crate::keywords::Keyword;
use crate::keywords::Keyword::*;

#[derive(Debug, Clone, Copy)]
struct HiddenGlobal {
    name: &'static str,
    ty: Keyword,
    storage: Storage,
    precision: Precision,
    array: bool,
}

impl HiddenGlobal {
    const fn new(name: &'static str, ty: Keyword) -> Self {
        Self {
            name,
            ty,
            storage: Storage::None,
            precision: Precision::None,
            array: false,
        }
    }

    const fn output(self) -> Self {
        Self {
            storage: Storage::Out,
            ..self
        }
    }

    const fn array(self) -> Self {
        Self { array: true, ..self }
    }

    const fn subgroup(self, precision: Precision) -> Self {
        Self {
            storage: Storage::In,
            precision,
            ..self
        }
    }
}

const fn var(name: &'static str, ty: Keyword) -> HiddenGlobal {
    HiddenGlobal::new(name, ty)
}

const COMPUTE: &[HiddenGlobal] = &[
    var("gl_NumWorkGroups", UVec3),
    var("gl_WorkGroupSize", UVec3),
    var("gl_WorkGroupID", UVec3),
    var("gl_LocalInvocationID", UVec3),
    var("gl_GlobalInvocationID", UVec3),
    var("gl_LocalInvocationIndex", Uint),
    var("gl_NumSubgroups", Uint),
    var("gl_SubgroupID", Uint),
];

const VERTEX: &[HiddenGlobal] = &[
    var("gl_VertexID", Int),
    var("gl_InstanceID", Int),
    var("gl_VertexIndex", Int),
    var("gl_InstanceIndex", Int),
    var("gl_DrawID", Int),
    var("gl_BaseVertex", Int),
    var("gl_BaseInstance", Int),
    var("gl_Position", Vec4).output(),
    var("gl_PointSize", Float).output(),
    var("gl_ClipDistance", Float).array().output(),
    var("gl_CullDistance", Float).array().output(),
];

const TESS_CONTROL: &[HiddenGlobal] = &[
    var("gl_PatchVerticesIn", Int),
    var("gl_PrimitiveID", Int),
    var("gl_InvocationID", Int),
    var("gl_TessLevelOuter", Float).array().output(),
    var("gl_TessLevelInner", Float).array().output(),
];

const TESS_EVALUATION: &[HiddenGlobal] = &[
    var("gl_PatchVerticesIn", Int),
    var("gl_PrimitiveID", Int),
    var("gl_TessCoord", Vec3),
    var("gl_TessLevelOuter", Float).array(),
    var("gl_TessLevelInner", Float).array(),
    var("gl_Position", Vec4).output(),
    var("gl_PointSize", Float).output(),
    var("gl_ClipDistance", Float).array().output(),
    var("gl_CullDistance", Float).array().output(),
];

const GEOMETRY: &[HiddenGlobal] = &[
    var("gl_PrimitiveIDIn", Int),
    var("gl_InvocationID", Int),
    var("gl_PrimitiveID", Int),
    var("gl_Layer", Int),
    var("gl_ViewportIndex", Int),
    var("gl_Position", Vec4).output(),
    var("gl_PointSize", Float).output(),
    var("gl_ClipDistance", Float).array().output(),
    var("gl_CullDistance", Float).array().output(),
];

const FRAGMENT: &[HiddenGlobal] = &[
    var("gl_FragCoord", Vec4),
    var("gl_FrontFacing", Bool),
    var("gl_ClipDistance", Float).array(),
    var("gl_CullDistance", Float).array(),
    var("gl_PointCoord", Vec2),
    var("gl_PrimitiveID", Int),
    var("gl_SampleID", Int),
    var("gl_SamplePosition", Vec2),
    var("gl_SampleMaskIn", Int).array(),
    var("gl_Layer", Int),
    var("gl_ViewportIndex", Int),
    var("gl_HelperInvocation", Bool),
    var("gl_FragDepth", Float).output(),
];

const SUBGROUP: &[HiddenGlobal] = &[
    var("gl_SubgroupSize", Uint).subgroup(Precision::Mediump),
    var("gl_SubgroupInvocationID", Uint).subgroup(Precision::Mediump),
    var("gl_SubgroupEqMask", UVec4).subgroup(Precision::Highp),
    var("gl_SubgroupGeMask", UVec4).subgroup(Precision::Highp),
    var("gl_SubgroupGtMask", UVec4).subgroup(Precision::Highp),
    var("gl_SubgroupLeMask", UVec4).subgroup(Precision::Highp),
    var("gl_SubgroupLtMask", UVec4).subgroup(Precision::Highp),
];

/// `uint` constants shared by every stage
const RAY_CONSTANTS: &[(&str, u32)] = &[
    ("gl_RayFlagsNoneEXT", 0),
    ("gl_RayFlagsOpaqueEXT", 1),
    ("gl_RayFlagsNoOpaqueEXT", 2),
    ("gl_RayFlagsTerminateOnFirstHitEXT", 4),
    ("gl_RayFlagsSkipClosestHitShaderEXT", 8),
    ("gl_RayFlagsCullBackFacingTrianglesEXT", 16),
    ("gl_RayFlagsCullFrontFacingTrianglesEXT", 32),
    ("gl_RayFlagsCullOpaqueEXT", 64),
    ("gl_RayFlagsCullNoOpaqueEXT", 128),
    ("gl_HitKindFrontFacingTriangleEXT", 0xFE),
    ("gl_HitKindBackFacingTriangleEXT", 0xFF),
    ("gl_RayQueryCommittedIntersectionNoneEXT", 0),
    ("gl_RayQueryCommittedIntersectionTriangleEXT", 1),
    ("gl_RayQueryCommittedIntersectionGeneratedEXT", 2),
    ("gl_RayQueryCandidateIntersectionTriangleEXT", 0),
    ("gl_RayQueryCandidateIntersectionAABBEXT", 1),
];

const LAUNCH: &[HiddenGlobal] = &[var("gl_LaunchIDEXT", UVec3), var("gl_LaunchSizeEXT", UVec3)];

const HIT: &[HiddenGlobal] = &[
    var("gl_LaunchIDEXT", UVec3),
    var("gl_LaunchSizeEXT", UVec3),
    var("gl_PrimitiveID", Int),
    var("gl_InstanceID", Int),
    var("gl_InstanceCustomIndexEXT", Int),
    var("gl_GeometryIndexEXT", Int),
    var("gl_WorldRayOriginEXT", Vec3),
    var("gl_WorldRayDirectionEXT", Vec3),
    var("gl_ObjectRayOriginEXT", Vec3),
    var("gl_ObjectRayDirectionEXT", Vec3),
    var("gl_RayTminEXT", Float),
    var("gl_RayTmaxEXT", Float),
    var("gl_IncomingRayFlagsEXT", Uint),
    var("gl_HitTEXT", Float),
    var("gl_HitKindEXT", Uint),
    var("gl_ObjectToWorldEXT", Mat4x3),
    var("gl_ObjectToWorld3x4EXT", Mat3x4),
    var("gl_WorldToObjectEXT", Mat4x3),
    var("gl_WorldToObject3x4EXT", Mat3x4),
];

const MISS: &[HiddenGlobal] = &[
    var("gl_LaunchIDEXT", UVec3),
    var("gl_LaunchSizeEXT", UVec3),
    var("gl_WorldRayOriginEXT", Vec3),
    var("gl_WorldRayDirectionEXT", Vec3),
    var("gl_RayTminEXT", Float),
    var("gl_RayTmaxEXT", Float),
    var("gl_IncomingRayFlagsEXT", Uint),
];

fn stage_globals(stage: Stage) -> &'static [HiddenGlobal] {
    match stage {
        Stage::Compute => COMPUTE,
        Stage::Vertex => VERTEX,
        Stage::TessControl => TESS_CONTROL,
        Stage::TessEvaluation => TESS_EVALUATION,
        Stage::Geometry => GEOMETRY,
        Stage::Fragment => FRAGMENT,
        _ => &[],
    }
}

fn ray_tracing_globals(stage: Stage) -> &'static [HiddenGlobal] {
    match stage {
        Stage::RayGen | Stage::Callable => LAUNCH,
        Stage::AnyHit | Stage::ClosestHit | Stage::Intersect => HIT,
        Stage::Miss => MISS,
        _ => &[],
    }
}

impl Parser {
    /// Declare the stage built-ins in the global scope, flagged hidden
    pub(super) fn declare_hidden_globals(&mut self) {
        let stage = self.tu.stage();
        let subgroup: &[HiddenGlobal] = if stage.is_ray_tracing() { &[] } else { SUBGROUP };
        let before = self.tu.globals.len();

        for global in stage_globals(stage).iter().chain(subgroup) {
            self.add_hidden_global(global, None);
        }
        for &(name, value) in RAY_CONSTANTS {
            let value = self.tu.add_expr(Expr::Constant(Constant::Uint(value)));
            let global = HiddenGlobal {
                storage: Storage::Const,
                ..HiddenGlobal::new(name, Uint)
            };
            self.add_hidden_global(&global, Some(value));
        }
        for global in ray_tracing_globals(stage) {
            self.add_hidden_global(global, None);
        }

        log::debug!(
            "declared {} hidden globals for the {} stage",
            self.tu.globals.len() - before,
            stage
        );
    }

    fn add_hidden_global(&mut self, global: &HiddenGlobal, initial_value: Option<crate::ast::ExprId>) {
        let var = self.tu.add_var(Variable {
            name: global.name.to_string(),
            base_type: TypeRef::Builtin(global.ty),
            array_sizes: Vec::new(),
            flags: VarFlags {
                array: global.array,
                hidden: true,
                ..VarFlags::default()
            },
            precision: global.precision,
            kind: VariableKind::Global(GlobalInfo {
                storage: global.storage,
                aux: AuxStorage::default(),
                memory: MemoryFlags::default(),
                interpolation: Interpolation::default(),
                initial_value,
                layout: Vec::new(),
            }),
        });
        self.tu.globals.push(var);
        self.declare(var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_globals() {
        let parser = Parser::new(Stage::Compute);
        let tu = &parser.tu;
        let id = tu.find_global("gl_GlobalInvocationID").unwrap();
        assert!(tu.var(id).base_type.is(UVec3));
        assert!(tu.var(id).flags.hidden);
        assert!(tu.find_global("gl_SubgroupSize").is_some());
        assert!(tu.find_global("gl_FragCoord").is_none());
    }

    #[test]
    fn test_ray_constants_are_const() {
        let parser = Parser::new(Stage::Miss);
        let tu = &parser.tu;
        let id = tu.find_global("gl_HitKindBackFacingTriangleEXT").unwrap();
        assert_eq!(tu.var(id).storage(), Storage::Const);
        let value = tu.var(id).initial_value().unwrap();
        assert_eq!(tu.constant(value), Some(Constant::Uint(0xFF)));
        assert!(tu.find_global("gl_WorldRayOriginEXT").is_some());
        assert!(tu.find_global("gl_SubgroupSize").is_none());
    }

    #[test]
    fn test_vertex_outputs() {
        let parser = Parser::new(Stage::Vertex);
        let tu = &parser.tu;
        let id = tu.find_global("gl_ClipDistance").unwrap();
        assert_eq!(tu.var(id).storage(), Storage::Out);
        assert!(tu.var(id).is_array());
    }
}
