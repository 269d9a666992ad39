//! # glslx - GLSL to HLSL shader compiler
//!
//! The preprocessor expands macros and conditionals, a recursive-descent
//! parser turns the result into a fully resolved, arena-backed AST, and the
//! writer re-emits that AST as HLSL.
//!
//! ## Example
//! ```
//! use glslx::{compile, Stage, WriterConfig};
//!
//! let hlsl = compile("mat4 model;\n", Stage::Vertex, &WriterConfig::default()).unwrap();
//! assert_eq!(hlsl, "row_major float4x4 model;\n");
//! ```

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod keywords;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod prune;
pub mod span;
pub mod types;

pub use ast::{Stage, TranslationUnit};
pub use config::{Config, PreprocessorConfig, WriterConfig};
pub use diagnostics::Diagnostics;
pub use error::{GlslxError, GlslxResult};
pub use parser::parse;
pub use preprocessor::{preprocess, FileIncludes, IncludeResolver, Preprocessor};
pub use prune::prune_unreachable;
pub use span::Span;

/// Preprocess and parse GLSL source for `stage` and write it out as HLSL.
/// Nothing is pruned.
pub fn compile(source: &str, stage: Stage, config: &WriterConfig) -> GlslxResult<String> {
    let source = preprocess(source)?;
    let tu = parse(&source, stage)?;
    Ok(codegen::generate_hlsl(&tu, config))
}

/// Full pipeline driven by a `Config`: predefined macros, optional
/// includes and dead code removal
pub fn compile_with(
    source: &str,
    stage: Stage,
    config: &Config,
    includes: Option<&dyn IncludeResolver>,
) -> GlslxResult<String> {
    let mut preprocessor = Preprocessor::new();
    if let Some(includes) = includes {
        preprocessor = preprocessor.with_includes(includes);
    }
    for define in &config.preprocessor.defines {
        preprocessor.define_str(define)?;
    }
    let source = preprocessor.process(source)?;
    let mut tu = parse(&source, stage)?;
    if config.prune {
        prune_unreachable(&mut tu);
    }
    Ok(codegen::generate_hlsl(&tu, &config.writer))
}

/// Version of the glslx compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
