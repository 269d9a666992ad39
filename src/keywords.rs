//! GLSL keyword vocabulary
//!
//! Every reserved word of the source language is one `Keyword`. Builtin type
//! keywords carry their HLSL spelling; the generic family keywords only occur
//! in builtin prototypes and are expanded before any user code sees them.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordClass {
    /// Concrete builtin type
    Type,
    /// Generic type family, legal only in builtin prototypes
    Generic,
    /// Qualifier, statement or literal keyword
    Plain,
    /// Reserved for future use, never legal
    Reserved,
}

macro_rules! keywords {
    ($( $variant:ident = $text:literal, $class:ident, $hlsl:literal; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Keyword {
            $($variant,)*
        }

        static KEYWORD_TABLE: &[(Keyword, &str, KeywordClass, &str)] = &[
            $((Keyword::$variant, $text, KeywordClass::$class, $hlsl),)*
        ];
    };
}

keywords! {
    // scalars
    Void = "void", Type, "void";
    Bool = "bool", Type, "bool";
    Int = "int", Type, "int";
    Uint = "uint", Type, "uint";
    Float = "float", Type, "float";
    Double = "double", Type, "double";
    Int16 = "int16_t", Type, "short";
    Uint16 = "uint16_t", Type, "ushort";
    Int64 = "int64_t", Type, "int64_t";
    Uint64 = "uint64_t", Type, "uint64_t";
    Float16 = "float16_t", Type, "half";

    // vectors
    Vec2 = "vec2", Type, "float2";
    Vec3 = "vec3", Type, "float3";
    Vec4 = "vec4", Type, "float4";
    DVec2 = "dvec2", Type, "double2";
    DVec3 = "dvec3", Type, "double3";
    DVec4 = "dvec4", Type, "double4";
    BVec2 = "bvec2", Type, "bool2";
    BVec3 = "bvec3", Type, "bool3";
    BVec4 = "bvec4", Type, "bool4";
    IVec2 = "ivec2", Type, "int2";
    IVec3 = "ivec3", Type, "int3";
    IVec4 = "ivec4", Type, "int4";
    UVec2 = "uvec2", Type, "uint2";
    UVec3 = "uvec3", Type, "uint3";
    UVec4 = "uvec4", Type, "uint4";
    I16Vec2 = "i16vec2", Type, "int16_t2";
    I16Vec3 = "i16vec3", Type, "int16_t3";
    I16Vec4 = "i16vec4", Type, "int16_t4";
    U16Vec2 = "u16vec2", Type, "uint16_t2";
    U16Vec3 = "u16vec3", Type, "uint16_t3";
    U16Vec4 = "u16vec4", Type, "uint16_t4";
    I64Vec2 = "i64vec2", Type, "int64_t2";
    I64Vec3 = "i64vec3", Type, "int64_t3";
    I64Vec4 = "i64vec4", Type, "int64_t4";
    U64Vec2 = "u64vec2", Type, "uint64_t2";
    U64Vec3 = "u64vec3", Type, "uint64_t3";
    U64Vec4 = "u64vec4", Type, "uint64_t4";
    F16Vec2 = "f16vec2", Type, "half2";
    F16Vec3 = "f16vec3", Type, "half3";
    F16Vec4 = "f16vec4", Type, "half4";

    // matrices, GLSL column count first
    Mat2 = "mat2", Type, "float2x2";
    Mat3 = "mat3", Type, "float3x3";
    Mat4 = "mat4", Type, "float4x4";
    Mat2x2 = "mat2x2", Type, "float2x2";
    Mat2x3 = "mat2x3", Type, "float2x3";
    Mat2x4 = "mat2x4", Type, "float2x4";
    Mat3x2 = "mat3x2", Type, "float3x2";
    Mat3x3 = "mat3x3", Type, "float3x3";
    Mat3x4 = "mat3x4", Type, "float3x4";
    Mat4x2 = "mat4x2", Type, "float4x2";
    Mat4x3 = "mat4x3", Type, "float4x3";
    Mat4x4 = "mat4x4", Type, "float4x4";
    DMat2 = "dmat2", Type, "double2x2";
    DMat3 = "dmat3", Type, "double3x3";
    DMat4 = "dmat4", Type, "double4x4";
    DMat2x2 = "dmat2x2", Type, "double2x2";
    DMat2x3 = "dmat2x3", Type, "double2x3";
    DMat2x4 = "dmat2x4", Type, "double2x4";
    DMat3x2 = "dmat3x2", Type, "double3x2";
    DMat3x3 = "dmat3x3", Type, "double3x3";
    DMat3x4 = "dmat3x4", Type, "double3x4";
    DMat4x2 = "dmat4x2", Type, "double4x2";
    DMat4x3 = "dmat4x3", Type, "double4x3";
    DMat4x4 = "dmat4x4", Type, "double4x4";

    // combined texture + sampler
    Sampler1D = "sampler1D", Type, "Texture1D";
    Sampler2D = "sampler2D", Type, "Texture2D";
    Sampler3D = "sampler3D", Type, "Texture3D";
    SamplerCube = "samplerCube", Type, "TextureCube";
    Sampler1DArray = "sampler1DArray", Type, "Texture1DArray";
    Sampler2DArray = "sampler2DArray", Type, "Texture2DArray";
    SamplerCubeArray = "samplerCubeArray", Type, "TextureCubeArray";
    Sampler2DRect = "sampler2DRect", Type, "Texture2D";
    SamplerBuffer = "samplerBuffer", Type, "Buffer";
    Sampler2DMS = "sampler2DMS", Type, "Texture2DMS";
    Sampler2DMSArray = "sampler2DMSArray", Type, "Texture2DMSArray";
    Sampler1DShadow = "sampler1DShadow", Type, "Texture1D";
    Sampler2DShadow = "sampler2DShadow", Type, "Texture2D";
    SamplerCubeShadow = "samplerCubeShadow", Type, "TextureCube";
    Sampler1DArrayShadow = "sampler1DArrayShadow", Type, "Texture1DArray";
    Sampler2DArrayShadow = "sampler2DArrayShadow", Type, "Texture2DArray";
    SamplerCubeArrayShadow = "samplerCubeArrayShadow", Type, "TextureCubeArray";
    Sampler2DRectShadow = "sampler2DRectShadow", Type, "Texture2D";
    ISampler1D = "isampler1D", Type, "Texture1D";
    ISampler2D = "isampler2D", Type, "Texture2D";
    ISampler3D = "isampler3D", Type, "Texture3D";
    ISamplerCube = "isamplerCube", Type, "TextureCube";
    ISampler1DArray = "isampler1DArray", Type, "Texture1DArray";
    ISampler2DArray = "isampler2DArray", Type, "Texture2DArray";
    ISamplerCubeArray = "isamplerCubeArray", Type, "TextureCubeArray";
    ISampler2DRect = "isampler2DRect", Type, "Texture2D";
    ISamplerBuffer = "isamplerBuffer", Type, "Buffer";
    ISampler2DMS = "isampler2DMS", Type, "Texture2DMS";
    ISampler2DMSArray = "isampler2DMSArray", Type, "Texture2DMSArray";
    USampler1D = "usampler1D", Type, "Texture1D";
    USampler2D = "usampler2D", Type, "Texture2D";
    USampler3D = "usampler3D", Type, "Texture3D";
    USamplerCube = "usamplerCube", Type, "TextureCube";
    USampler1DArray = "usampler1DArray", Type, "Texture1DArray";
    USampler2DArray = "usampler2DArray", Type, "Texture2DArray";
    USamplerCubeArray = "usamplerCubeArray", Type, "TextureCubeArray";
    USampler2DRect = "usampler2DRect", Type, "Texture2D";
    USamplerBuffer = "usamplerBuffer", Type, "Buffer";
    USampler2DMS = "usampler2DMS", Type, "Texture2DMS";
    USampler2DMSArray = "usampler2DMSArray", Type, "Texture2DMSArray";

    // separate textures and samplers
    Texture1D = "texture1D", Type, "Texture1D";
    Texture2D = "texture2D", Type, "Texture2D";
    Texture3D = "texture3D", Type, "Texture3D";
    TextureCube = "textureCube", Type, "TextureCube";
    Texture1DArray = "texture1DArray", Type, "Texture1DArray";
    Texture2DArray = "texture2DArray", Type, "Texture2DArray";
    TextureCubeArray = "textureCubeArray", Type, "TextureCubeArray";
    Texture2DRect = "texture2DRect", Type, "Texture2D";
    TextureBuffer = "textureBuffer", Type, "Buffer";
    Texture2DMS = "texture2DMS", Type, "Texture2DMS";
    Texture2DMSArray = "texture2DMSArray", Type, "Texture2DMSArray";
    ITexture1D = "itexture1D", Type, "Texture1D";
    ITexture2D = "itexture2D", Type, "Texture2D";
    ITexture3D = "itexture3D", Type, "Texture3D";
    ITextureCube = "itextureCube", Type, "TextureCube";
    ITexture1DArray = "itexture1DArray", Type, "Texture1DArray";
    ITexture2DArray = "itexture2DArray", Type, "Texture2DArray";
    ITextureCubeArray = "itextureCubeArray", Type, "TextureCubeArray";
    ITexture2DRect = "itexture2DRect", Type, "Texture2D";
    ITextureBuffer = "itextureBuffer", Type, "Buffer";
    ITexture2DMS = "itexture2DMS", Type, "Texture2DMS";
    ITexture2DMSArray = "itexture2DMSArray", Type, "Texture2DMSArray";
    UTexture1D = "utexture1D", Type, "Texture1D";
    UTexture2D = "utexture2D", Type, "Texture2D";
    UTexture3D = "utexture3D", Type, "Texture3D";
    UTextureCube = "utextureCube", Type, "TextureCube";
    UTexture1DArray = "utexture1DArray", Type, "Texture1DArray";
    UTexture2DArray = "utexture2DArray", Type, "Texture2DArray";
    UTextureCubeArray = "utextureCubeArray", Type, "TextureCubeArray";
    UTexture2DRect = "utexture2DRect", Type, "Texture2D";
    UTextureBuffer = "utextureBuffer", Type, "Buffer";
    UTexture2DMS = "utexture2DMS", Type, "Texture2DMS";
    UTexture2DMSArray = "utexture2DMSArray", Type, "Texture2DMSArray";
    Sampler = "sampler", Type, "SamplerState";
    SamplerShadow = "samplerShadow", Type, "SamplerComparisonState";

    // storage images
    Image1D = "image1D", Type, "RWTexture1D";
    Image2D = "image2D", Type, "RWTexture2D";
    Image3D = "image3D", Type, "RWTexture3D";
    ImageCube = "imageCube", Type, "RWTexture2DArray";
    Image1DArray = "image1DArray", Type, "RWTexture1DArray";
    Image2DArray = "image2DArray", Type, "RWTexture2DArray";
    ImageCubeArray = "imageCubeArray", Type, "RWTexture2DArray";
    Image2DRect = "image2DRect", Type, "RWTexture2D";
    ImageBuffer = "imageBuffer", Type, "RWBuffer";
    Image2DMS = "image2DMS", Type, "RWTexture2DMS";
    Image2DMSArray = "image2DMSArray", Type, "RWTexture2DMSArray";
    IImage1D = "iimage1D", Type, "RWTexture1D";
    IImage2D = "iimage2D", Type, "RWTexture2D";
    IImage3D = "iimage3D", Type, "RWTexture3D";
    IImageCube = "iimageCube", Type, "RWTexture2DArray";
    IImage1DArray = "iimage1DArray", Type, "RWTexture1DArray";
    IImage2DArray = "iimage2DArray", Type, "RWTexture2DArray";
    IImageCubeArray = "iimageCubeArray", Type, "RWTexture2DArray";
    IImage2DRect = "iimage2DRect", Type, "RWTexture2D";
    IImageBuffer = "iimageBuffer", Type, "RWBuffer";
    IImage2DMS = "iimage2DMS", Type, "RWTexture2DMS";
    IImage2DMSArray = "iimage2DMSArray", Type, "RWTexture2DMSArray";
    UImage1D = "uimage1D", Type, "RWTexture1D";
    UImage2D = "uimage2D", Type, "RWTexture2D";
    UImage3D = "uimage3D", Type, "RWTexture3D";
    UImageCube = "uimageCube", Type, "RWTexture2DArray";
    UImage1DArray = "uimage1DArray", Type, "RWTexture1DArray";
    UImage2DArray = "uimage2DArray", Type, "RWTexture2DArray";
    UImageCubeArray = "uimageCubeArray", Type, "RWTexture2DArray";
    UImage2DRect = "uimage2DRect", Type, "RWTexture2D";
    UImageBuffer = "uimageBuffer", Type, "RWBuffer";
    UImage2DMS = "uimage2DMS", Type, "RWTexture2DMS";
    UImage2DMSArray = "uimage2DMSArray", Type, "RWTexture2DMSArray";

    // subpass inputs
    SubpassInput = "subpassInput", Type, "SubpassInput";
    SubpassInputMS = "subpassInputMS", Type, "SubpassInputMS";
    ISubpassInput = "isubpassInput", Type, "SubpassInput";
    ISubpassInputMS = "isubpassInputMS", Type, "SubpassInputMS";
    USubpassInput = "usubpassInput", Type, "SubpassInput";
    USubpassInputMS = "usubpassInputMS", Type, "SubpassInputMS";

    // ray tracing
    AccelerationStructureExt = "accelerationStructureEXT", Type, "RaytracingAccelerationStructure";
    RayQueryExt = "rayQueryEXT", Type, "RayQuery<RAY_FLAG_NONE>";

    // generic families
    GenFType = "genFType", Generic, "";
    GenDType = "genDType", Generic, "";
    GenIType = "genIType", Generic, "";
    GenUType = "genUType", Generic, "";
    GenBType = "genBType", Generic, "";
    GenVecType = "genVecType", Generic, "";
    GenIVecType = "genIVecType", Generic, "";
    GenUVecType = "genUVecType", Generic, "";
    GenBVecType = "genBVecType", Generic, "";
    GVec4 = "gvec4", Generic, "";
    GSampler1D = "gsampler1D", Generic, "";
    GSampler1DArray = "gsampler1DArray", Generic, "";
    GSampler2D = "gsampler2D", Generic, "";
    GSampler2DRect = "gsampler2DRect", Generic, "";
    GSampler2DArray = "gsampler2DArray", Generic, "";
    GSampler2DMS = "gsampler2DMS", Generic, "";
    GSampler2DMSArray = "gsampler2DMSArray", Generic, "";
    GSampler3D = "gsampler3D", Generic, "";
    GSamplerCube = "gsamplerCube", Generic, "";
    GSamplerCubeArray = "gsamplerCubeArray", Generic, "";
    GSamplerBuffer = "gsamplerBuffer", Generic, "";
    GImage1D = "gimage1D", Generic, "";
    GImage2D = "gimage2D", Generic, "";
    GImage3D = "gimage3D", Generic, "";
    GImageCube = "gimageCube", Generic, "";
    GImageCubeArray = "gimageCubeArray", Generic, "";
    GImage2DArray = "gimage2DArray", Generic, "";
    GImage2DRect = "gimage2DRect", Generic, "";
    GImage1DArray = "gimage1DArray", Generic, "";
    GImage2DMS = "gimage2DMS", Generic, "";
    GImage2DMSArray = "gimage2DMSArray", Generic, "";
    GImageBuffer = "gimageBuffer", Generic, "";
    GSubpassInput = "gsubpassInput", Generic, "";
    GSubpassInputMS = "gsubpassInputMS", Generic, "";

    // qualifiers
    Const = "const", Plain, "";
    Uniform = "uniform", Plain, "";
    Buffer = "buffer", Plain, "";
    Shared = "shared", Plain, "";
    Attribute = "attribute", Plain, "";
    Varying = "varying", Plain, "";
    Coherent = "coherent", Plain, "";
    Volatile = "volatile", Plain, "";
    Restrict = "restrict", Plain, "";
    Readonly = "readonly", Plain, "";
    Writeonly = "writeonly", Plain, "";
    Layout = "layout", Plain, "";
    Centroid = "centroid", Plain, "";
    Flat = "flat", Plain, "";
    Smooth = "smooth", Plain, "";
    Noperspective = "noperspective", Plain, "";
    Patch = "patch", Plain, "";
    Sample = "sample", Plain, "";
    Invariant = "invariant", Plain, "";
    Precise = "precise", Plain, "";
    In = "in", Plain, "";
    Out = "out", Plain, "";
    Inout = "inout", Plain, "";
    Lowp = "lowp", Plain, "";
    Mediump = "mediump", Plain, "";
    Highp = "highp", Plain, "";
    Precision = "precision", Plain, "";
    Subroutine = "subroutine", Plain, "";
    RayPayloadExt = "rayPayloadEXT", Plain, "";
    RayPayloadInExt = "rayPayloadInEXT", Plain, "";
    HitAttributeExt = "hitAttributeEXT", Plain, "";
    CallableDataExt = "callableDataEXT", Plain, "";
    CallableDataInExt = "callableDataInEXT", Plain, "";

    // statements and literals
    Struct = "struct", Plain, "";
    Break = "break", Plain, "";
    Continue = "continue", Plain, "";
    Do = "do", Plain, "";
    For = "for", Plain, "";
    While = "while", Plain, "";
    Switch = "switch", Plain, "";
    Case = "case", Plain, "";
    Default = "default", Plain, "";
    If = "if", Plain, "";
    Else = "else", Plain, "";
    Discard = "discard", Plain, "";
    Return = "return", Plain, "";
    True = "true", Plain, "";
    False = "false", Plain, "";
    IgnoreIntersectionExt = "ignoreIntersectionEXT", Plain, "IgnoreHit";
    TerminateRayExt = "terminateRayEXT", Plain, "AcceptHitAndEndSearch";

    // reserved
    Common = "common", Reserved, "";
    Partition = "partition", Reserved, "";
    Active = "active", Reserved, "";
    Asm = "asm", Reserved, "";
    Class = "class", Reserved, "";
    Union = "union", Reserved, "";
    Enum = "enum", Reserved, "";
    Typedef = "typedef", Reserved, "";
    Template = "template", Reserved, "";
    This = "this", Reserved, "";
    Resource = "resource", Reserved, "";
    Goto = "goto", Reserved, "";
    Inline = "inline", Reserved, "";
    Noinline = "noinline", Reserved, "";
    Public = "public", Reserved, "";
    Static = "static", Reserved, "";
    Extern = "extern", Reserved, "";
    External = "external", Reserved, "";
    Interface = "interface", Reserved, "";
    Long = "long", Reserved, "";
    Short = "short", Reserved, "";
    Half = "half", Reserved, "";
    Fixed = "fixed", Reserved, "";
    Unsigned = "unsigned", Reserved, "";
    Superp = "superp", Reserved, "";
    Input = "input", Reserved, "";
    Output = "output", Reserved, "";
    HVec2 = "hvec2", Reserved, "";
    HVec3 = "hvec3", Reserved, "";
    HVec4 = "hvec4", Reserved, "";
    FVec2 = "fvec2", Reserved, "";
    FVec3 = "fvec3", Reserved, "";
    FVec4 = "fvec4", Reserved, "";
    Filter = "filter", Reserved, "";
    Sizeof = "sizeof", Reserved, "";
    Cast = "cast", Reserved, "";
    Namespace = "namespace", Reserved, "";
    Using = "using", Reserved, "";
    Sampler3DRect = "sampler3DRect", Reserved, "";
}

/// Sized spellings that name an existing keyword
const ALIASES: &[(&str, Keyword)] = &[
    ("int32_t", Keyword::Int),
    ("uint32_t", Keyword::Uint),
    ("float32_t", Keyword::Float),
    ("float64_t", Keyword::Double),
];

static LOOKUP: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Keyword> =
        KEYWORD_TABLE.iter().map(|(kw, text, _, _)| (*text, *kw)).collect();
    map.extend(ALIASES.iter().copied());
    map
});

impl Keyword {
    /// Resolve an identifier-shaped word to a keyword
    pub fn lookup(word: &str) -> Option<Keyword> {
        LOOKUP.get(word).copied()
    }

    pub fn as_str(self) -> &'static str {
        KEYWORD_TABLE[self as usize].1
    }

    pub fn class(self) -> KeywordClass {
        KEYWORD_TABLE[self as usize].2
    }

    /// HLSL spelling; empty for keywords with no output counterpart
    pub fn hlsl_name(self) -> &'static str {
        KEYWORD_TABLE[self as usize].3
    }

    pub fn is_type(self) -> bool {
        self.class() == KeywordClass::Type
    }

    pub fn is_generic(self) -> bool {
        self.class() == KeywordClass::Generic
    }

    pub fn is_reserved(self) -> bool {
        self.class() == KeywordClass::Reserved
    }

    /// Every keyword in declaration order
    pub fn all() -> impl Iterator<Item = Keyword> {
        KEYWORD_TABLE.iter().map(|(kw, _, _, _)| *kw)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order() {
        for (i, kw) in Keyword::all().enumerate() {
            assert_eq!(kw as usize, i, "{} out of place", kw);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Keyword::lookup("vec3"), Some(Keyword::Vec3));
        assert_eq!(Keyword::lookup("float32_t"), Some(Keyword::Float));
        assert_eq!(Keyword::lookup("genFType"), Some(Keyword::GenFType));
        assert_eq!(Keyword::lookup("main"), None);
    }

    #[test]
    fn test_hlsl_names() {
        assert_eq!(Keyword::Mat4.hlsl_name(), "float4x4");
        assert_eq!(Keyword::Int16.hlsl_name(), "short");
        assert_eq!(Keyword::Sampler2DShadow.hlsl_name(), "Texture2D");
        assert_eq!(Keyword::Image2D.hlsl_name(), "RWTexture2D");
        assert_eq!(Keyword::TerminateRayExt.hlsl_name(), "AcceptHitAndEndSearch");
    }

    #[test]
    fn test_classes() {
        assert!(Keyword::DMat3x2.is_type());
        assert!(Keyword::GSampler2D.is_generic());
        assert!(Keyword::Goto.is_reserved());
        assert_eq!(Keyword::Layout.class(), KeywordClass::Plain);
    }
}
