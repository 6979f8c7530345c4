//! Shader type reflection and resource binding layout.
//!
//! Given the layout a shader compiler assigned to a compiled program,
//! this crate builds an immutable model of every uniform field and GPU
//! resource the program consumes: byte offsets for ordinary data,
//! descriptor ranges for resources, and name-based lookup over both, so
//! that a binder can write values and descriptors to the right places at
//! draw or dispatch time.

/// Error types.
pub mod error;

/// The compiled-layout input produced by the shader compiler.
pub mod layout;

/// Reflection objects and binding layout.
pub mod reflect;
