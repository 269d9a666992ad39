//! Builtin vocabulary shared by the parser and the HLSL writer
//!
//! - the GLSL prototype set parsed ahead of every translation unit
//! - the concrete members of every generic type family
//! - the layout qualifier table
//! - the intrinsic names that differ between GLSL and HLSL

use crate::keywords::Keyword;
use crate::keywords::Keyword::*;

/// Prototypes of every builtin function, parsed before user source
pub const PROTOTYPES: &str = include_str!("builtins.glsl");

/// File name reported for errors inside the prototype set
pub const PROTOTYPES_FILE: &str = "<builtins>";

// === GENERIC FAMILIES ===

/// Concrete instantiation columns of every generic keyword.
/// Column `i` of every generic used by one prototype forms instance `i`.
const GENERIC_INSTANCES: &[(Keyword, &[Keyword])] = &[
    (GenFType, &[Float, Vec2, Vec3, Vec4]),
    (GenDType, &[Double, DVec2, DVec3, DVec4]),
    (GenIType, &[Int, IVec2, IVec3, IVec4]),
    (GenUType, &[Uint, UVec2, UVec3, UVec4]),
    (GenBType, &[Bool, BVec2, BVec3, BVec4]),
    (GenVecType, &[Vec2, Vec3, Vec4]),
    (GenIVecType, &[IVec2, IVec3, IVec4]),
    (GenUVecType, &[UVec2, UVec3, UVec4]),
    (GenBVecType, &[BVec2, BVec3, BVec4]),
    (GVec4, &[Vec4, IVec4, UVec4]),
    (GSampler1D, &[Sampler1D, ISampler1D, USampler1D]),
    (GSampler1DArray, &[Sampler1DArray, ISampler1DArray, USampler1DArray]),
    (GSampler2D, &[Sampler2D, ISampler2D, USampler2D]),
    (GSampler2DRect, &[Sampler2DRect, ISampler2DRect, USampler2DRect]),
    (GSampler2DArray, &[Sampler2DArray, ISampler2DArray, USampler2DArray]),
    (GSampler2DMS, &[Sampler2DMS, ISampler2DMS, USampler2DMS]),
    (GSampler2DMSArray, &[Sampler2DMSArray, ISampler2DMSArray, USampler2DMSArray]),
    (GSampler3D, &[Sampler3D, ISampler3D, USampler3D]),
    (GSamplerCube, &[SamplerCube, ISamplerCube, USamplerCube]),
    (GSamplerCubeArray, &[SamplerCubeArray, ISamplerCubeArray, USamplerCubeArray]),
    (GSamplerBuffer, &[SamplerBuffer, ISamplerBuffer, USamplerBuffer]),
    (GImage1D, &[Image1D, IImage1D, UImage1D]),
    (GImage2D, &[Image2D, IImage2D, UImage2D]),
    (GImage3D, &[Image3D, IImage3D, UImage3D]),
    (GImageCube, &[ImageCube, IImageCube, UImageCube]),
    (GImageCubeArray, &[ImageCubeArray, IImageCubeArray, UImageCubeArray]),
    (GImage2DArray, &[Image2DArray, IImage2DArray, UImage2DArray]),
    (GImage2DRect, &[Image2DRect, IImage2DRect, UImage2DRect]),
    (GImage1DArray, &[Image1DArray, IImage1DArray, UImage1DArray]),
    (GImage2DMS, &[Image2DMS, IImage2DMS, UImage2DMS]),
    (GImage2DMSArray, &[Image2DMSArray, IImage2DMSArray, UImage2DMSArray]),
    (GImageBuffer, &[ImageBuffer, IImageBuffer, UImageBuffer]),
    (GSubpassInput, &[SubpassInput, ISubpassInput, USubpassInput]),
    (GSubpassInputMS, &[SubpassInputMS, ISubpassInputMS, USubpassInputMS]),
];

/// Concrete types a generic keyword expands to; empty for non-generic keywords
pub fn generic_instances(kw: Keyword) -> &'static [Keyword] {
    GENERIC_INSTANCES
        .iter()
        .find(|(generic, _)| *generic == kw)
        .map(|(_, instances)| *instances)
        .unwrap_or(&[])
}

/// Widest instance count of any generic family
pub const MAX_GENERIC_INSTANCES: usize = 4;

// === LAYOUT QUALIFIERS ===

/// `(name, takes_value)` for every accepted `layout(...)` entry
const LAYOUT_QUALIFIERS: &[(&str, bool)] = &[
    // interface matching
    ("location", true),
    ("component", true),
    ("index", true),
    ("binding", true),
    ("set", true),
    ("offset", true),
    ("align", true),
    ("input_attachment_index", true),
    ("constant_id", true),
    // block packing
    ("shared", false),
    ("packed", false),
    ("std140", false),
    ("std430", false),
    ("scalar", false),
    ("row_major", false),
    ("column_major", false),
    ("push_constant", false),
    ("shaderRecordEXT", false),
    // transform feedback
    ("xfb_buffer", true),
    ("xfb_offset", true),
    ("xfb_stride", true),
    // compute
    ("local_size_x", true),
    ("local_size_y", true),
    ("local_size_z", true),
    ("local_size_x_id", true),
    ("local_size_y_id", true),
    ("local_size_z_id", true),
    // geometry
    ("points", false),
    ("lines", false),
    ("lines_adjacency", false),
    ("triangles", false),
    ("triangles_adjacency", false),
    ("line_strip", false),
    ("triangle_strip", false),
    ("max_vertices", true),
    ("invocations", true),
    ("stream", true),
    // tessellation
    ("vertices", true),
    ("quads", false),
    ("isolines", false),
    ("equal_spacing", false),
    ("fractional_even_spacing", false),
    ("fractional_odd_spacing", false),
    ("cw", false),
    ("ccw", false),
    ("point_mode", false),
    // fragment
    ("origin_upper_left", false),
    ("pixel_center_integer", false),
    ("early_fragment_tests", false),
    ("depth_any", false),
    ("depth_greater", false),
    ("depth_less", false),
    ("depth_unchanged", false),
    // mesh
    ("max_primitives", true),
    // image formats
    ("rgba32f", false),
    ("rgba16f", false),
    ("rg32f", false),
    ("rg16f", false),
    ("r11f_g11f_b10f", false),
    ("r32f", false),
    ("r16f", false),
    ("rgba16", false),
    ("rgb10_a2", false),
    ("rgba8", false),
    ("rg16", false),
    ("rg8", false),
    ("r16", false),
    ("r8", false),
    ("rgba16_snorm", false),
    ("rgba8_snorm", false),
    ("rg16_snorm", false),
    ("rg8_snorm", false),
    ("r16_snorm", false),
    ("r8_snorm", false),
    ("rgba32i", false),
    ("rgba16i", false),
    ("rgba8i", false),
    ("rg32i", false),
    ("rg16i", false),
    ("rg8i", false),
    ("r32i", false),
    ("r16i", false),
    ("r8i", false),
    ("rgba32ui", false),
    ("rgba16ui", false),
    ("rgb10_a2ui", false),
    ("rgba8ui", false),
    ("rg32ui", false),
    ("rg16ui", false),
    ("rg8ui", false),
    ("r32ui", false),
    ("r16ui", false),
    ("r8ui", false),
    ("r64ui", false),
    ("r64i", false),
];

/// Whether a layout qualifier takes `= value`; `None` for unknown names
pub fn layout_takes_value(name: &str) -> Option<bool> {
    LAYOUT_QUALIFIERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, takes_value)| *takes_value)
}

// === INTRINSICS ===

const ATOMIC_FUNCTIONS: &[&str] = &[
    "atomicAdd",
    "atomicAnd",
    "atomicOr",
    "atomicXor",
    "atomicMin",
    "atomicMax",
    "atomicCompSwap",
    "atomicExchange",
];

/// Atomic intrinsics that HLSL only offers as statements with an out parameter
pub fn is_atomic_function(name: &str) -> bool {
    ATOMIC_FUNCTIONS.contains(&name)
}

const HLSL_FUNCTION_NAMES: &[(&str, &str)] = &[
    ("intBitsToFloat", "asfloat"),
    ("uintBitsToFloat", "asfloat"),
    ("floatBitsToInt", "asint"),
    ("floatBitsToUint", "asuint"),
    ("fract", "frac"),
    ("fma", "mad"),
    ("inversesqrt", "rsqrt"),
    ("mix", "lerp"),
    ("barrier", "GroupMemoryBarrierWithGroupSync"),
    ("groupMemoryBarrier", "AllMemoryBarrier"),
    ("atomicAdd", "InterlockedAdd"),
    ("atomicAnd", "InterlockedAnd"),
    ("atomicOr", "InterlockedOr"),
    ("atomicXor", "InterlockedXor"),
    ("atomicMin", "InterlockedMin"),
    ("atomicMax", "InterlockedMax"),
    ("atomicExchange", "InterlockedExchange"),
    ("atomicCompSwap", "InterlockedCompareExchange"),
    ("subgroupAll", "WaveActiveAllTrue"),
    ("subgroupAny", "WaveActiveAnyTrue"),
    ("subgroupAdd", "WaveActiveSum"),
    ("subgroupElect", "WaveIsFirstLane"),
    ("subgroupExclusiveAdd", "WavePrefixSum"),
    ("bitCount", "countbits"),
    ("nonuniformEXT", "NonUniformResourceIndex"),
];

/// HLSL spelling of a GLSL intrinsic, if it is renamed
pub fn hlsl_function_name(name: &str) -> Option<&'static str> {
    HLSL_FUNCTION_NAMES
        .iter()
        .find(|(glsl, _)| *glsl == name)
        .map(|(_, hlsl)| *hlsl)
}
