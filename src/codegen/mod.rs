//! glslx code generation

pub mod hlsl;
mod hlsl_buffers;
mod hlsl_helpers;

#[cfg(test)]
mod tests;

pub use hlsl::generate as generate_hlsl;
