//! Fixed HLSL preambles emitted ahead of an entry point
//!
//! GLSL texture and image intrinsics that HLSL spells as methods get small
//! free-function shims here, so call sites can keep their GLSL names.

/// `texelFetch`, `textureLod`, `textureSize`, `imageLoad` and `imageStore` shims
pub const TEXTURE_HELPERS: &str = "\
uint4 texelFetch(Texture2D<uint4> t, int2 P, int lod) {
    return t.Load(int3(P, lod));
}
float4 texelFetch(Texture2D<float4> t, int2 P, int lod) {
    return t.Load(int3(P, lod));
}
float4 texelFetch(Texture2D<float4> t, SamplerState s, int2 P, int lod) {
    return t.Load(int3(P, lod));
}
float4 texelFetch(Texture2DArray<float4> t, SamplerState s, int3 P, int lod) {
    return t.Load(int4(P, lod));
}
float4 texelFetch(Texture3D<float4> t, SamplerState s, int3 P, int lod) {
    return t.Load(int4(P, lod));
}
float4 textureLod(Texture2D<float4> t, SamplerState s, float2 P, float lod) {
    return t.SampleLevel(s, P, lod);
}
float4 textureLod(Texture3D<float4> t, SamplerState s, float3 P, float lod) {
    return t.SampleLevel(s, P, lod);
}
float4 textureLod(Texture2DArray<float4> t, SamplerState s, float3 P, float lod) {
    return t.SampleLevel(s, P, lod);
}
float4 textureLodOffset(Texture2D<float4> t, SamplerState s, float2 P, float lod, int2 offset) {
    return t.SampleLevel(s, P, lod, offset);
}
int2 textureSize(Texture2D<float4> t, int lod) {
    uint2 ret;
    uint NumberOfLevels;
    t.GetDimensions(lod, ret.x, ret.y, NumberOfLevels);
    return ret;
}
";

/// Channel layouts covered by the `imageLoad`/`imageStore` shims
const IMAGE_CHANNELS: &[(&str, &str)] = &[("float", "float4"), ("int", "int4"), ("uint", "uint4")];

/// Build the `imageLoad`/`imageStore` overloads for every 1, 2 and 4 channel
/// `RWTexture2D` of each scalar kind
pub fn image_helpers() -> String {
    let mut out = String::new();
    for &(scalar, wide) in IMAGE_CHANNELS {
        out.push_str(&format!(
            "{wide} imageLoad(RWTexture2D<{s}> image, int2 P) {{ return {wide}(image[P], 0, 0, 0); }}\n",
            wide = wide,
            s = scalar
        ));
        out.push_str(&format!(
            "{wide} imageLoad(RWTexture2D<{s}2> image, int2 P) {{ return {wide}(image[P], 0, 0); }}\n",
            wide = wide,
            s = scalar
        ));
        out.push_str(&format!(
            "{wide} imageLoad(RWTexture2D<{wide}> image, int2 P) {{ return image[P]; }}\n",
            wide = wide
        ));
    }
    for &(scalar, wide) in IMAGE_CHANNELS {
        for (channels, swizzle) in [("", ".x"), ("2", ".xy"), ("4", "")] {
            out.push_str(&format!(
                "void imageStore(RWTexture2D<{s}{c}> image, int2 P, {wide} data) {{ image[P] = data{sw}; }}\n",
                s = scalar,
                c = channels,
                wide = wide,
                sw = swizzle
            ));
        }
    }
    out
}

/// GLSL ray query constants mapped onto the HLSL status enums
const RAY_QUERY_CONSTANTS: &[(&str, &str)] = &[
    ("gl_RayQueryCandidateIntersectionTriangleEXT", "CANDIDATE_NON_OPAQUE_TRIANGLE"),
    ("gl_RayQueryCandidateIntersectionAABBEXT", "CANDIDATE_PROCEDURAL_PRIMITIVE"),
    ("gl_RayQueryCommittedIntersectionNoneEXT", "COMMITTED_NOTHING"),
    ("gl_RayQueryCommittedIntersectionTriangleEXT", "COMMITTED_TRIANGLE_HIT"),
    ("gl_RayQueryCommittedIntersectionGeneratedEXT", "COMMITTED_PROCEDURAL_PRIMITIVE_HIT"),
];

/// Intersection queries taking a `committed` flag: (return type, GLSL name,
/// committed method, candidate method)
const RAY_QUERY_ACCESSORS: &[(&str, &str, &str, &str)] = &[
    ("uint", "rayQueryGetIntersectionTypeEXT", "CommittedStatus", "CandidateType"),
    (
        "int",
        "rayQueryGetIntersectionInstanceCustomIndexEXT",
        "CommittedInstanceID",
        "CandidateInstanceID",
    ),
    (
        "int",
        "rayQueryGetIntersectionInstanceIdEXT",
        "CommittedInstanceIndex",
        "CandidateInstanceIndex",
    ),
    (
        "int",
        "rayQueryGetIntersectionPrimitiveIndexEXT",
        "CommittedPrimitiveIndex",
        "CandidatePrimitiveIndex",
    ),
    (
        "bool",
        "rayQueryGetIntersectionFrontFaceEXT",
        "CommittedTriangleFrontFace",
        "CandidateTriangleFrontFace",
    ),
    (
        "float2",
        "rayQueryGetIntersectionBarycentricsEXT",
        "CommittedTriangleBarycentrics",
        "CandidateTriangleBarycentrics",
    ),
    ("float", "rayQueryGetIntersectionTEXT", "CommittedRayT", "CandidateTriangleRayT"),
];

/// Ray query intrinsics lowered onto `RayQuery<RAY_FLAG_NONE>` methods
pub fn ray_query_helpers() -> String {
    let mut out = String::new();
    for (name, value) in RAY_QUERY_CONSTANTS {
        out.push_str(&format!("static const uint {} = {};\n", name, value));
    }
    out.push_str(
        "void rayQueryInitializeEXT(RayQuery<RAY_FLAG_NONE> rayQuery,\n\
         \x20                          RaytracingAccelerationStructure topLevel,\n\
         \x20                          uint rayFlags, uint cullMask, float3 origin, float tMin,\n\
         \x20                          float3 direction, float tMax) {\n\
         \x20   RayDesc desc = {origin, tMin, direction, tMax};\n\
         \x20   rayQuery.TraceRayInline(topLevel, rayFlags, cullMask, desc);\n\
         }\n",
    );
    out.push_str("bool rayQueryProceedEXT(RayQuery<RAY_FLAG_NONE> q) {\n    return q.Proceed();\n}\n");

    let (ty, name, committed, candidate) = RAY_QUERY_ACCESSORS[0];
    out.push_str(&ray_query_accessor(ty, name, committed, candidate));
    out.push_str(
        "void rayQueryConfirmIntersectionEXT(RayQuery<RAY_FLAG_NONE> q) {\n    \
         q.CommitNonOpaqueTriangleHit();\n}\n",
    );
    for &(ty, name, committed, candidate) in &RAY_QUERY_ACCESSORS[1..] {
        out.push_str(&ray_query_accessor(ty, name, committed, candidate));
    }
    out
}

fn ray_query_accessor(ty: &str, name: &str, committed: &str, candidate: &str) -> String {
    format!(
        "{} {}(RayQuery<RAY_FLAG_NONE> q, bool committed) {{\n\
         \x20   if (committed) {{\n\
         \x20       return q.{}();\n\
         \x20   }} else {{\n\
         \x20       return q.{}();\n\
         \x20   }}\n\
         }}\n",
        ty, name, committed, candidate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_helpers() {
        let text = image_helpers();
        assert_eq!(text.lines().count(), 18);
        assert!(text.starts_with(
            "float4 imageLoad(RWTexture2D<float> image, int2 P) { return float4(image[P], 0, 0, 0); }\n"
        ));
        assert!(text.contains(
            "void imageStore(RWTexture2D<uint2> image, int2 P, uint4 data) { image[P] = data.xy; }\n"
        ));
        assert!(text.ends_with(
            "void imageStore(RWTexture2D<uint4> image, int2 P, uint4 data) { image[P] = data; }\n"
        ));
    }

    #[test]
    fn test_ray_query_helpers() {
        let text = ray_query_helpers();
        assert!(text.starts_with(
            "static const uint gl_RayQueryCandidateIntersectionTriangleEXT = CANDIDATE_NON_OPAQUE_TRIANGLE;\n"
        ));
        assert!(text.contains("                           RaytracingAccelerationStructure topLevel,\n"));
        assert!(text.contains(
            "float rayQueryGetIntersectionTEXT(RayQuery<RAY_FLAG_NONE> q, bool committed) {\n    \
             if (committed) {\n        return q.CommittedRayT();\n    } else {\n        \
             return q.CandidateTriangleRayT();\n    }\n}\n"
        ));
        let confirm = text.find("rayQueryConfirmIntersectionEXT").unwrap();
        let kind = text.find("rayQueryGetIntersectionTypeEXT").unwrap();
        let custom = text.find("rayQueryGetIntersectionInstanceCustomIndexEXT").unwrap();
        assert!(kind < confirm && confirm < custom);
    }
}
