//! Whole-shader HLSL snapshots

use pretty_assertions::assert_eq;

use super::generate_hlsl;
use crate::ast::Stage;
use crate::config::WriterConfig;
use crate::parser::parse;

fn compute(source: &str) -> String {
    hlsl(source, Stage::Compute)
}

fn hlsl(source: &str, stage: Stage) -> String {
    let tu = match parse(source, stage) {
        Ok(tu) => tu,
        Err(e) => panic!("parse failed: {}", e.message()),
    };
    generate_hlsl(&tu, &WriterConfig::default())
}

#[test]
fn test_folded_constants() {
    let out = compute(
        "const float test = 1;\n\
         const float test_neg = -1;\n\
         const float test_pos_two_sub = test - test_neg;\n\
         const float test_neg_two_sub = test_neg - test;\n\
         const float test_zero_add = test_neg + test;\n\
         const uint test_uint = (1u << 31);\n\
         const uint test_bitneg = ~test_uint;\n",
    );
    assert_eq!(
        out,
        "static const float test = 1;\n\
         static const float test_neg = -1;\n\
         static const float test_pos_two_sub = 2;\n\
         static const float test_neg_two_sub = -2;\n\
         static const float test_zero_add = 0;\n\
         static const uint test_uint = 2147483648u;\n\
         static const uint test_bitneg = 2147483647u;\n"
    );
}

#[test]
fn test_comma_declarations() {
    let out = compute("mat4 model, view, projection;\nstruct foo { float x; } a, b, c, d;\n");
    assert_eq!(
        out,
        "row_major float4x4 model;\n\
         row_major float4x4 view;\n\
         row_major float4x4 projection;\n\
         struct foo {\n    float x;\n};\n\
         foo a;\nfoo b;\nfoo c;\nfoo d;\n"
    );
}

#[test]
fn test_builtin_typed_globals() {
    let out = compute(
        "bool test_bool;\n\
         dvec3 test_dvec3;\n\
         uvec4 test_uvec4;\n\
         mat2x3 test_mat2x3;\n\
         dmat4 test_dmat4;\n\
         layout(binding = 2) uniform sampler2D test_sampler2D;\n\
         layout(binding = 3, rgba16f) uniform image2D test_image2D;\n\
         layout(binding = 5, rg32f) uniform image3D test_image3D;\n\
         layout(binding = 11) uniform samplerBuffer test_samplerBuffer;\n\
         layout(binding = 14, rgba16) uniform image2DMS test_image2DMS;\n\
         layout(binding = 19) uniform sampler2DShadow test_sampler2DShadow;\n\
         layout(binding = 27) uniform iimage2D test_iimage2D;\n\
         layout(binding = 44) uniform usampler2D test_usampler2D;\n\
         layout(binding = 56, r32ui) uimage2DMS test_uimage2DMS;\n",
    );
    assert_eq!(
        out,
        "bool test_bool;\n\
         double3 test_dvec3;\n\
         uint4 test_uvec4;\n\
         row_major float2x3 test_mat2x3;\n\
         row_major double4x4 test_dmat4;\n\
         Texture2D<float4> test_sampler2D : register(t2, space0);\n\
         SamplerState test_sampler2D_sampler : register(s2, space0);\n\
         RWTexture2D<float4> test_image2D : register(u3, space0);\n\
         RWTexture3D<float2> test_image3D : register(u5, space0);\n\
         Buffer<float4> test_samplerBuffer : register(t11, space0);\n\
         RWTexture2DMS<unorm float4> test_image2DMS : register(u14, space0);\n\
         Texture2D<float4> test_sampler2DShadow : register(t19, space0);\n\
         SamplerComparisonState test_sampler2DShadow_sampler : register(s19, space0);\n\
         RWTexture2D<int4> test_iimage2D : register(u27, space0);\n\
         Texture2D<uint4> test_usampler2D : register(t44, space0);\n\
         SamplerState test_usampler2D_sampler : register(s44, space0);\n\
         RWTexture2DMS<uint> test_uimage2DMS : register(u56, space0);\n"
    );
}

#[test]
fn test_booleans_pass_through() {
    let source = "void test() {\n\
                  \x20   bool test_uninitialized;\n\
                  \x20   bool test_true_initialized = true;\n\
                  \x20   bool test_assign;\n\
                  \x20   test_assign = test_true_initialized;\n\
                  \x20   test_assign = false;\n\
                  }\n";
    assert_eq!(compute(source), source);
}

#[test]
fn test_int_literals() {
    let out = compute(
        "void test(int a, int b) {\n\
         \x20   uint test_initialized_uint_no_suffix = 42;\n\
         \x20   uint test_hex_suffix_mixed = 0xFfU;\n\
         \x20   int test_negative = -1;\n\
         \x20   uint test_octal = 0777;\n\
         \x20   int16_t test_int16 = 42s;\n\
         \x20   uint16_t test_uint16_upper = 42US;\n\
         \x20   int64_t test_int64_upper = 42L;\n\
         \x20   uint64_t test_uint64_lower = 42ul;\n\
         }\n",
    );
    assert_eq!(
        out,
        "void test(int a, int b) {\n\
         \x20   uint test_initialized_uint_no_suffix = 42;\n\
         \x20   uint test_hex_suffix_mixed = 255u;\n\
         \x20   int test_negative = (-1);\n\
         \x20   uint test_octal = 511;\n\
         \x20   short test_int16 = 42s;\n\
         \x20   ushort test_uint16_upper = 42us;\n\
         \x20   int64_t test_int64_upper = 42l;\n\
         \x20   uint64_t test_uint64_lower = 42ul;\n\
         }\n"
    );
}

#[test]
fn test_float_literals() {
    let out = compute(
        "void test() {\n\
         \x20   float test_float_f_upper = 1.5F;\n\
         \x20   double test_double_lf_lower = 1.5lf;\n\
         \x20   float test_float_f_zero = 1.0f;\n\
         \x20   float64_t test_f64_lf = 1.3lf;\n\
         \x20   float16_t test_f16_hf_upper = 1.5HF;\n\
         }\n",
    );
    assert_eq!(
        out,
        "void test() {\n\
         \x20   float test_float_f_upper = 1.5;\n\
         \x20   double test_double_lf_lower = 1.5;\n\
         \x20   float test_float_f_zero = 1.0;\n\
         \x20   double test_f64_lf = 1.3lf;\n\
         \x20   half test_f16_hf_upper = 1.5hf;\n\
         }\n"
    );
}

#[test]
fn test_structures() {
    let out = compute(
        "struct foo\n{\n    vec3 a;\n    vec2 b;\n    float c[100];\n    float d, e, f;\n};\n\n\
         struct bar\n{\n    foo a, b, c;\n} a, b, c;\n\n\
         struct ray_hash_t {\n    uint hash, index;\n};\n\n\
         void func(bar arg) {\n    ray_hash_t h = ray_hash_t(0xffffffff, 0xffffffff);\n}\n\n\
         void main_func( )\n{\n    bar a, b, c;\n    float d = c.b.a.x;\n    \
         float e = c.b.a[0];\n    e = d = 1.0;\n}\n",
    );
    assert_eq!(
        out,
        "struct foo {\n    float3 a;\n    float2 b;\n    float c[100];\n    float d;\n    \
         float e;\n    float f;\n};\n\
         struct bar {\n    foo a;\n    foo b;\n    foo c;\n};\n\
         struct ray_hash_t {\n    uint hash;\n    uint index;\n};\n\
         bar a;\nbar b;\nbar c;\n\
         void func(bar arg) {\n    ray_hash_t h = (ray_hash_t)(-1, -1);\n}\n\
         void main_func() {\n    bar a;\n    bar b;\n    bar c;\n    float d = c.b.a.x;\n    \
         float e = c.b.a[0];\n    e = d = 1.0;\n}\n"
    );
}

#[test]
fn test_array_dimensions() {
    let out = compute(
        "float a[1];\n\
         const float b[1][2] = { { 0.227027029, 0.194594592 } };\n\
         float[2] e[3];\n\
         float[3][2] f;\n\
         struct foo1 { float a; };\n\
         foo1[1] bar2[2];\n\
         foo1[1] aa[1], bb;\n\
         void func_main() {\n\
         \x20   float b[1][2] = { { 0.227027029, 0.194594592 } };\n\
         \x20   float[2] e[3];\n\
         \x20   foo1[1] aa[1], bb;\n\
         }\n",
    );
    assert_eq!(
        out,
        "float a[1];\n\
         static const float b[1][2] = { { 0.227027029, 0.194594592 } };\n\
         float e[2][3];\n\
         float f[2][3];\n\
         struct foo1 {\n    float a;\n};\n\
         foo1 bar2[1][2];\n\
         foo1 aa[1][1];\n\
         foo1 bb[1];\n\
         void func_main() {\n\
         \x20   float b[1][2] = { { 0.227027029, 0.194594592 } };\n\
         \x20   float e[2][3];\n\
         \x20   foo1 aa[1][1];\n\
         \x20   foo1 bb[1];\n\
         }\n"
    );
}

#[test]
fn test_selection_attributes() {
    let out = compute("void test() {\n    [[flatten]] if (true) {}\n    [[branch]] if (false) {}\n}\n");
    assert_eq!(
        out,
        "void test() {\n    [flatten] if (true) {\n    }\n    [branch] if (false) {\n    }\n}\n"
    );
}

#[test]
fn test_loop_attributes() {
    let out = compute(
        "void a() {}\n\
         void test() {\n\
         \x20   int i = 0;\n\
         \x20   [[unroll, dependency_infinite]] do a(); while (true);\n\
         \x20   [[dont_unroll, dependency_length(4)]] do { } while (true);\n\
         \x20   [[unroll, dependency_infinite]] while (true) { }\n\
         \x20   [[dont_unroll, dependency_length(4)]] while (i < 10) { }\n\
         }\n",
    );
    assert_eq!(
        out,
        "void a() {\n}\n\
         void test() {\n\
         \x20   int i = 0;\n\
         \x20   [unroll] do a();\n\
         \x20   while (true);\n\
         \x20   [loop] do {\n\
         \x20   }\n\
         \x20   while (true);\n\
         \x20   [unroll] while (true) {\n\
         \x20   }\n\
         \x20   [loop] while ((i < 10)) {\n\
         \x20   }\n\
         }\n"
    );
}

#[test]
fn test_for_headers() {
    let out = compute(
        "void func_main() {\n\
         \x20   int i = 0;\n\
         \x20   for(;;) { }\n\
         \x20   for(i = 0;; ) { }\n\
         \x20   [[unroll, dependency_infinite]] for(int i = 0; i < 10;) { }\n\
         \x20   [[dont_unroll, dependency_length(4)]] for(int i = 0; i < 10; i++) { }\n\
         }\n",
    );
    assert_eq!(
        out,
        "void func_main() {\n\
         \x20   int i = 0;\n\
         \x20   for (;;) {\n    }\n\
         \x20   for (i = 0;;) {\n    }\n\
         \x20   [unroll] for (int i = 0; (i < 10);) {\n    }\n\
         \x20   [loop] for (int i = 0; (i < 10); i++) {\n    }\n\
         }\n"
    );
}

#[test]
fn test_ternary_nesting() {
    let out = compute(
        "void func_main() {\n\
         \x20   float a = 0, b = 0, c = 0, d = 0;\n\
         \x20   float y = (a < b / 2 ? a - 1 : b - 2);\n\
         \x20   float w = (a ? a,b : b,c);\n\
         \x20   float z = a ? b ? c : d : w;\n\
         }\n",
    );
    assert_eq!(
        out,
        "void func_main() {\n\
         \x20   float a = 0;\n\
         \x20   float b = 0;\n\
         \x20   float c = 0;\n\
         \x20   float d = 0;\n\
         \x20   float y = ((a < (b / 2)) ? (a - 1) : (b - 2));\n\
         \x20   float w = (a ? (a, b) : (b, c));\n\
         \x20   float z = (a ? (b ? c : d) : w);\n\
         }\n"
    );
}

#[test]
fn test_nested_switch() {
    let out = compute(
        "void test() {\n\
         \x20   // simple test\n\
         \x20   int i = 10;\n\
         \x20   [[flatten]] switch (i) {\n\
         \x20   case 0: break;\n\
         \x20   default: break;\n\
         \x20   }\n\
         \x20   [[branch]] switch (i) {\n\
         \x20   case 0:\n\
         \x20       switch (1) {\n\
         \x20       case 1:\n\
         \x20           break;\n\
         \x20       default:\n\
         \x20           break;\n\
         \x20       }\n\
         \x20       break;\n\
         \x20   default:\n\
         \x20       break;\n\
         \x20   }\n\
         }\n",
    );
    assert_eq!(
        out,
        "void test() {\n\
         \x20   int i = 10;\n\
         \x20   [flatten] switch (i) {\n\
         \x20       case 0:\n\
         \x20       break;\n\
         \x20       default:\n\
         \x20       break;\n\
         \x20   }\n\
         \x20   [branch] switch (i) {\n\
         \x20       case 0:\n\
         \x20       switch (1) {\n\
         \x20           case 1:\n\
         \x20           break;\n\
         \x20           default:\n\
         \x20           break;\n\
         \x20       }\n\
         \x20       break;\n\
         \x20       default:\n\
         \x20       break;\n\
         \x20   }\n\
         }\n"
    );
}

#[test]
fn test_vector_initializers() {
    let out = compute(
        "const vec4 g = {1.0, 2.0, 3.0, 4.0};\n\
         vec4 f() { return g; }\n\
         float func(const vec3 color, float x, float y) {\n\
         \x20   vec2 s = {x, y};\n\
         \x20   float t = f()[2];\n\
         \x20   return 0.212671 * color[0] + 0.715160 * color.y + 0.072169 * color.z;\n\
         }\n",
    );
    assert_eq!(
        out,
        "static const float4 g = { 1.0, 2.0, 3.0, 4.0 };\n\
         float4 f() {\n    return g;\n}\n\
         float func(const float3 color, float x, float y) {\n\
         \x20   float2 s = { x, y };\n\
         \x20   float t = f()[2];\n\
         \x20   return (((0.212670997 * color[0]) + (0.715160012 * color.y)) + (0.0721689984 * color.z));\n\
         }\n"
    );
}

#[test]
fn test_push_constant_block() {
    let out = compute(
        "struct Params {\n    uvec4 rect;\n    float inv_gamma;\n};\n\
         layout(push_constant) uniform UniformParams {\n    Params g_params;\n};\n",
    );
    assert_eq!(
        out,
        "struct Params {\n    uint4 rect;\n    float inv_gamma;\n};\n\
         cbuffer UniformParams {\n    Params g_params : packoffset(c0);\n};\n"
    );
}

#[test]
fn test_uniform_block() {
    let out = compute(
        "struct atmosphere_params_t {\n    vec4 rayleigh_scattering;\n    vec4 mie_scattering;\n};\n\
         layout (binding = 3, std140) uniform AtmosphereParams {\n    \
         atmosphere_params_t g_atmosphere_params;\n};\n",
    );
    assert_eq!(
        out,
        "struct atmosphere_params_t {\n    float4 rayleigh_scattering;\n    float4 mie_scattering;\n};\n\
         cbuffer AtmosphereParams : register(b3) {\n    \
         atmosphere_params_t g_atmosphere_params : packoffset(c0);\n};\n"
    );
}

#[test]
fn test_compute_entry_point() {
    let out = compute("layout (local_size_x = 8, local_size_y = 8, local_size_z = 1) in;\nvoid main() {\n}\n");
    assert!(out.starts_with("uint4 texelFetch(Texture2D<uint4> t, int2 P, int lod) {\n"));
    assert!(out.contains(
        "void imageStore(RWTexture2D<uint4> image, int2 P, uint4 data) { image[P] = data; }\n\
         static const uint gl_RayQueryCandidateIntersectionTriangleEXT = CANDIDATE_NON_OPAQUE_TRIANGLE;\n"
    ));
    let tail = out
        .find("static uint3 gl_WorkGroupID;\n")
        .map(|at| &out[at..])
        .unwrap_or_default();
    assert_eq!(
        tail,
        "static uint3 gl_WorkGroupID;\n\
         static uint3 gl_LocalInvocationID;\n\
         static uint3 gl_GlobalInvocationID;\n\
         static uint gl_LocalInvocationIndex;\n\
         static uint gl_SubgroupSize;\n\
         static uint gl_SubgroupInvocationID;\n\
         struct GLSLX_Input {\n\
         \x20   uint3 gl_WorkGroupID : SV_GroupID;\n\
         \x20   uint3 gl_LocalInvocationID : SV_GroupThreadID;\n\
         \x20   uint3 gl_GlobalInvocationID : SV_DispatchThreadID;\n\
         \x20   uint gl_LocalInvocationIndex : SV_GroupIndex;\n\
         };\n\
         [numthreads(8, 8, 1)]\n\
         void main(GLSLX_Input glslx_input) {\n\
         \x20   gl_WorkGroupID = glslx_input.gl_WorkGroupID;\n\
         \x20   gl_LocalInvocationID = glslx_input.gl_LocalInvocationID;\n\
         \x20   gl_GlobalInvocationID = glslx_input.gl_GlobalInvocationID;\n\
         \x20   gl_LocalInvocationIndex = glslx_input.gl_LocalInvocationIndex;\n\
         \x20   gl_SubgroupSize = WaveGetLaneCount();\n\
         \x20   gl_SubgroupInvocationID = WaveGetLaneIndex();\n\
         }\n"
    );
}

#[test]
fn test_readonly_buffer_loads() {
    let out = compute(
        "layout(std430, binding = 0) readonly buffer Test {\n    uint g_test[];\n};\n\
         struct data_t {\n    float arr[3];\n    uint i;\n    vec4 v;\n};\n\
         struct data2_t {\n    float arr[3];\n    uint i;\n    float16_t h[8];\n    data_t s;\n};\n\
         layout(std430, binding = 1) readonly buffer Test2 {\n    data2_t g_test2[];\n};\n\
         void test() {\n    uint t = g_test[42];\n    float f = g_test2[24].s.arr[1];\n}\n",
    );
    let mut expected = String::from(
        "struct data_t {\n    float arr[3];\n    uint i;\n    float4 v;\n};\n\
         struct data2_t {\n    float arr[3];\n    uint i;\n    half h[8];\n    data_t s;\n};\n\
         ByteAddressBuffer g_test : register(t0, space0);\n\
         uint __load_g_test(int index) {\n\
         \x20   uint ret;\n\
         \x20   ret = g_test.Load(index * 4 + 0);\n\
         \x20   return ret;\n\
         }\n\
         ByteAddressBuffer g_test2 : register(t1, space0);\n\
         data2_t __load_g_test2(int index) {\n\
         \x20   data2_t ret;\n\
         \x20   ret.arr[0] = asfloat(g_test2.Load(index * 64 + 0));\n\
         \x20   ret.arr[1] = asfloat(g_test2.Load(index * 64 + 4));\n\
         \x20   ret.arr[2] = asfloat(g_test2.Load(index * 64 + 8));\n\
         \x20   ret.i = g_test2.Load(index * 64 + 12);\n",
    );
    for i in 0..8 {
        expected.push_str(&format!(
            "    ret.h[{}] = g_test2.Load<half>(index * 64 + {});\n",
            i,
            16 + 2 * i
        ));
    }
    expected.push_str(
        "    ret.s.arr[0] = asfloat(g_test2.Load(index * 64 + 32));\n\
         \x20   ret.s.arr[1] = asfloat(g_test2.Load(index * 64 + 36));\n\
         \x20   ret.s.arr[2] = asfloat(g_test2.Load(index * 64 + 40));\n\
         \x20   ret.s.i = g_test2.Load(index * 64 + 44);\n\
         \x20   ret.s.v = asfloat(g_test2.Load4(index * 64 + 48));\n\
         \x20   return ret;\n\
         }\n\
         void test() {\n\
         \x20   uint t = __load_g_test(42);\n\
         \x20   float f = __load_g_test2(24).s.arr[1];\n\
         }\n",
    );
    assert_eq!(out, expected);
}

#[test]
fn test_readwrite_buffer_stores() {
    let out = compute(
        "layout(std430, binding = 0) buffer Test {\n    uint g_test[];\n};\n\
         struct data_t {\n    float arr[3];\n    uint i;\n};\n\
         struct data2_t {\n    float arr[3];\n    uint i;\n    float16_t h[8];\n    data_t s;\n};\n\
         layout(std430, binding = 1) buffer Test2 {\n    data2_t g_test2[];\n};\n\
         void test() {\n    uint t = g_test[42];\n    g_test[42] = t + 1;\n    \
         g_test2[24].s.i = t + 1;\n}\n",
    );
    assert!(out.contains("RWByteAddressBuffer g_test : register(u0, space0);\n"));
    assert!(out.contains("RWByteAddressBuffer g_test2 : register(u1, space0);\n"));
    assert!(out.contains("    ret.s.i = g_test2.Load(index * 48 + 44);\n    return ret;\n}\n"));
    assert!(out.ends_with(
        "void test() {\n\
         \x20   uint t = __load_g_test(42);\n\
         \x20   uint __temp0 = (t + 1);\n\
         \x20   uint __offset0 = 42 * 4 + 0;\n\
         \x20   g_test.Store(__offset0 + 0, __temp0);\n\
         \x20   uint __temp1 = (t + 1);\n\
         \x20   uint __offset1 = 24 * 48 + 44;\n\
         \x20   g_test2.Store(__offset1 + 0, __temp1);\n\
         }\n"
    ));
}

#[test]
fn test_atomics_are_hoisted() {
    let out = compute(
        "layout(std430, binding = 0) buffer Test {\n    uint g_test[];\n};\n\
         shared uint g_shared[16];\n\
         void test() {\n\
         \x20   uint v = atomicAdd(g_shared[1], 1u);\n\
         \x20   v = atomicAdd(g_shared[2], 2u);\n\
         \x20   uint vv = atomicAdd(g_test[3], 1u);\n\
         \x20   vv = atomicAdd(g_test[4], 2u);\n\
         }\n",
    );
    assert_eq!(
        out,
        "groupshared uint g_shared[16];\n\
         RWByteAddressBuffer g_test : register(u0, space0);\n\
         uint __load_g_test(int index) {\n\
         \x20   uint ret;\n\
         \x20   ret = g_test.Load(index * 4 + 0);\n\
         \x20   return ret;\n\
         }\n\
         void test() {\n\
         \x20   uint __temp0;\n\
         \x20   InterlockedAdd(g_shared[1], 1u, __temp0);\n\
         \x20   uint v = __temp0;\n\
         \x20   uint __temp1;\n\
         \x20   InterlockedAdd(g_shared[2], 2u, __temp1);\n\
         \x20   v = __temp1;\n\
         \x20   uint __temp2;\n\
         \x20   g_test.InterlockedAdd(4 * 3, 1u, __temp2);\n\
         \x20   uint vv = __temp2;\n\
         \x20   uint __temp3;\n\
         \x20   g_test.InterlockedAdd(4 * 4, 2u, __temp3);\n\
         \x20   vv = __temp3;\n\
         }\n"
    );
}

#[test]
fn test_atomics_in_conditions_and_arguments() {
    let out = compute(
        "shared uint g_shared[16];\n\
         void test() {\n\
         \x20   uint v = 0u;\n\
         \x20   if (atomicAdd(g_shared[0], 1u) == 0u) v = 1u;\n\
         \x20   uint w = atomicOr(g_shared[1], atomicAdd(g_shared[2], 2u));\n\
         \x20   while (atomicAdd(g_shared[3], 1u) < 4u) {\n\
         \x20       v++;\n\
         \x20   }\n\
         \x20   if (v == 0u) w = atomicAdd(g_shared[4], 1u);\n\
         }\n",
    );
    assert_eq!(
        out,
        "groupshared uint g_shared[16];\n\
         void test() {\n\
         \x20   uint v = 0u;\n\
         \x20   uint __temp0;\n\
         \x20   InterlockedAdd(g_shared[0], 1u, __temp0);\n\
         \x20   if ((__temp0 == 0u)) v = 1u;\n\
         \x20   uint __temp1;\n\
         \x20   InterlockedAdd(g_shared[2], 2u, __temp1);\n\
         \x20   uint __temp2;\n\
         \x20   InterlockedOr(g_shared[1], __temp1, __temp2);\n\
         \x20   uint w = __temp2;\n\
         \x20   while (true) {\n\
         \x20       uint __temp3;\n\
         \x20       InterlockedAdd(g_shared[3], 1u, __temp3);\n\
         \x20       if (!(__temp3 < 4u)) break;\n\
         \x20       v++;\n\
         \x20   }\n\
         \x20   if ((v == 0u)) {\n\
         \x20       uint __temp4;\n\
         \x20       InterlockedAdd(g_shared[4], 1u, __temp4);\n\
         \x20       w = __temp4;\n\
         \x20   }\n\
         }\n"
    );
}

#[test]
fn test_atomic_for_condition_is_guarded() {
    let out = compute(
        "shared uint g_shared[4];\n\
         void test() {\n\
         \x20   for (int i = 0; atomicAdd(g_shared[0], 1u) < 8u; i++) g_shared[1] = 2u;\n\
         }\n",
    );
    assert_eq!(
        out,
        "groupshared uint g_shared[4];\n\
         void test() {\n\
         \x20   for (int i = 0;; i++) {\n\
         \x20       uint __temp0;\n\
         \x20       InterlockedAdd(g_shared[0], 1u, __temp0);\n\
         \x20       if (!(__temp0 < 8u)) break;\n\
         \x20       g_shared[1] = 2u;\n\
         \x20   }\n\
         }\n"
    );
}

#[test]
fn test_matrix_vector_multiply() {
    let out = compute("vec3 test(vec3 n, mat4 xform) {\n    return (transpose(xform) * vec4(n, 0.0)).xyz;\n}\n");
    assert_eq!(
        out,
        "float3 test(float3 n, row_major float4x4 xform) {\n    \
         return mul(float4(n, 0.0), transpose(xform)).xyz;\n}\n"
    );
}

#[test]
fn test_sampler_arguments_are_paired() {
    let out = hlsl(
        "layout(binding = 0) uniform sampler2D g_tex;\n\
         layout(binding = 1) uniform sampler2D g_texs[4];\n\
         vec4 fetch(sampler2D t, vec2 uv) { return vec4(uv, 0.0, 1.0); }\n\
         void main() {\n\
         \x20   vec2 uv;\n\
         \x20   vec4 a = fetch(g_tex, uv);\n\
         \x20   vec4 b = fetch(g_texs[1], uv);\n\
         }\n",
        Stage::Fragment,
    );
    assert!(out.contains("SamplerState g_texs_sampler[4] : register(s1, space0);\n"));
    assert!(out.contains(", SamplerState t_sampler, float2 uv) {\n"));
    assert!(out.contains("    float4 a = fetch(g_tex, g_tex_sampler, uv);\n"));
    assert!(out.contains("    float4 b = fetch(g_texs[1], g_texs_sampler[1], uv);\n"));
}

#[test]
fn test_output_is_deterministic() {
    let source = "layout(std430, binding = 0) buffer Data {\n    uint values[];\n};\n\
                  layout(local_size_x = 64) in;\n\
                  void main() {\n    values[gl_LocalInvocationIndex] = atomicAdd(values[0], 1u);\n}\n";
    let tu = match parse(source, Stage::Compute) {
        Ok(tu) => tu,
        Err(e) => panic!("parse failed: {}", e.message()),
    };
    let config = WriterConfig::default();
    assert_eq!(generate_hlsl(&tu, &config), generate_hlsl(&tu, &config));
}

#[test]
fn test_compile_reports_errors() {
    let config = WriterConfig::default();
    assert!(crate::compile("void main() { missing = 1; }\n", Stage::Fragment, &config).is_err());
    assert!(crate::compile("const float x;\n", Stage::Fragment, &config).is_err());
    assert!(crate::compile("void main() {}\n", Stage::Fragment, &config).is_ok());
}

const PRUNE_SOURCE: &str = "#ifndef LEVEL\n\
                            #define LEVEL 1\n\
                            #endif\n\
                            float unused_global;\n\
                            float unused_helper() { return unused_global; }\n\
                            float kept_helper(int x) { return float(x); }\n\
                            void main() {\n    int level = LEVEL;\n    float f = kept_helper(level);\n}\n";

#[test]
fn test_compile_with_defines_and_prune() {
    let mut config = crate::Config::default();
    config.preprocessor.defines.push("LEVEL=3".to_string());
    let out = crate::compile_with(PRUNE_SOURCE, Stage::Fragment, &config, None).unwrap();
    assert!(out.contains("int level = 3;"));
    assert!(out.contains("kept_helper"));
    assert!(!out.contains("unused"));

    config.prune = false;
    let out = crate::compile_with(PRUNE_SOURCE, Stage::Fragment, &config, None).unwrap();
    assert!(out.contains("unused_helper"));
    assert!(out.contains("unused_global"));
}

#[test]
fn test_compile_runs_the_preprocessor() {
    let out = crate::compile(PRUNE_SOURCE, Stage::Fragment, &WriterConfig::default()).unwrap();
    assert!(out.contains("int level = 1;"));
    assert!(out.contains("unused_helper"));

    let err = crate::compile("#if 1\nvoid main() {}\n", Stage::Fragment, &WriterConfig::default()).unwrap_err();
    assert_eq!(err.message(), "Unterminated conditional directive");
}
