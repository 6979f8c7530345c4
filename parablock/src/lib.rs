#![forbid(missing_docs)]
//! Shader reflection and parameter block binding layout.
//!
//! parablock models the parameters of a compiled shader program: every
//! uniform field with its byte offset, every texture, buffer, and sampler
//! with its descriptor range, through arbitrary nesting of structs,
//! arrays, constant buffers, and parameter blocks.
//!
//! ## Usage
//! The shader compiler hands over a [`ProgramLayout`](layout::ProgramLayout)
//! describing the offsets and registers it assigned. Build a
//! [`ProgramReflection`](reflect::ProgramReflection) from it once, then
//! query by name:
//!
//! ```ignore
//! let program = ProgramReflection::reflect(&layout)?;
//! let block = program.parameter_block("material").unwrap();
//! let offset = block.element_type().zero_offset().field("params");
//! ```
//!
//! Reflection objects are immutable after construction and safe to share
//! across threads. A missing parameter is never a fault: lookups report
//! misses with `None` or an invalid offset.

/// Common scalar, vector, and matrix type vocabulary, and map types.
pub mod common {
    pub use parablock_common::*;
}

/// Error types.
pub mod error {
    pub use parablock_reflect::error::*;
}

/// The compiled-layout input produced by the shader compiler.
pub mod layout {
    pub use parablock_reflect::layout::*;
}

/// Reflection objects: offsets, types, variables, parameter blocks, and
/// whole-program reflection.
pub mod reflect {
    pub use parablock_reflect::reflect::*;
}
