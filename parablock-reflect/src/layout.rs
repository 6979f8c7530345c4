//! The compiled-layout input boundary.
//!
//! An external shader compiler determines the memory layout and register
//! assignment of every shader parameter; this module is the data it hands
//! over. The reflection engine reads it once, during
//! [`ProgramReflection::reflect`](crate::reflect::ProgramReflection::reflect),
//! and never mutates or retains it.

use bitflags::bitflags;
use parablock_common::map::ShortString;
use parablock_common::BasicTypeId;

use crate::reflect::types::{
    ResourceDims, ResourceKind, ReturnKind, ShaderAccess, StructuredKind,
};

/// A shader pipeline stage.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

bitflags! {
    /// A mask of shader stages sharing a binding scope.
    pub struct StageMask: u8 {
        const NONE = 0b00000000;
        const VERTEX = 0b00000001;
        const FRAGMENT = 0b00000010;
        const COMPUTE = 0b00000100;
    }
}

impl ShaderStage {
    pub const fn mask(self) -> StageMask {
        match self {
            ShaderStage::Vertex => StageMask::VERTEX,
            ShaderStage::Fragment => StageMask::FRAGMENT,
            ShaderStage::Compute => StageMask::COMPUTE,
        }
    }
}

/// A register assignment produced by the compiler for one resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterBinding {
    /// The register index.
    pub index: u32,
    /// The register space.
    pub space: u32,
    /// Bind this resource directly as a root descriptor instead of through
    /// a descriptor set. Buffers only.
    pub root: bool,
}

impl RegisterBinding {
    pub const fn new(index: u32, space: u32) -> Self {
        RegisterBinding {
            index,
            space,
            root: false,
        }
    }

    /// A root-descriptor binding.
    pub const fn root(index: u32, space: u32) -> Self {
        RegisterBinding {
            index,
            space,
            root: true,
        }
    }
}

/// Binding for the implicit constant buffer that backs loose uniform data
/// in a scope.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DefaultBufferLayout {
    pub binding: RegisterBinding,
    /// Deliver the buffer contents as root constants rather than a
    /// buffer allocation.
    pub use_root_constants: bool,
}

impl DefaultBufferLayout {
    pub const fn new(binding: RegisterBinding) -> Self {
        DefaultBufferLayout {
            binding,
            use_root_constants: false,
        }
    }
}

/// The layout of one variable: a struct field, a global, or an entry-point
/// parameter.
#[derive(Clone, Debug)]
pub struct VariableLayout {
    pub name: ShortString,
    pub ty: TypeLayout,
    /// Byte offset of the variable's uniform data relative to its parent
    /// scope, as assigned by the compiler.
    pub byte_offset: u32,
    /// Register assignment, present when the variable contains resources.
    pub binding: Option<RegisterBinding>,
}

impl VariableLayout {
    pub fn new(name: impl Into<ShortString>, ty: TypeLayout, byte_offset: u32) -> Self {
        VariableLayout {
            name: name.into(),
            ty,
            byte_offset,
            binding: None,
        }
    }

    pub fn with_binding(mut self, binding: RegisterBinding) -> Self {
        self.binding = Some(binding);
        self
    }
}

/// The layout of a type as reported by the compiler.
///
/// Byte sizes, field offsets, and array strides are the compiler's; the
/// reflection engine composes them but never invents them.
#[derive(Clone, Debug)]
pub enum TypeLayout {
    Basic {
        id: BasicTypeId,
        /// Row-major matrix storage. Meaningful for matrices only.
        row_major: bool,
        /// Size in bytes, including any row padding for matrices.
        byte_size: u32,
    },
    Struct {
        name: ShortString,
        byte_size: u32,
        fields: Vec<VariableLayout>,
    },
    Array {
        element: Box<TypeLayout>,
        element_count: u32,
        /// Bytes between consecutive elements; may exceed the element's
        /// own size due to alignment.
        element_stride: u32,
    },
    /// A texture, sampler, or buffer resource.
    Resource {
        kind: ResourceKind,
        dims: ResourceDims,
        structured: StructuredKind,
        return_kind: ReturnKind,
        access: ShaderAccess,
        /// Element layout for structured buffers.
        element: Option<Box<TypeLayout>>,
    },
    /// A `ConstantBuffer<T>`-style parameter wrapping an element type.
    ConstantBuffer { element: Box<TypeLayout> },
    /// A `ParameterBlock<T>`-style parameter with its own binding space.
    ParameterBlock {
        element: Box<TypeLayout>,
        /// Binding for the block's implicit constant buffer, when the
        /// element carries loose uniform data.
        default_buffer: Option<DefaultBufferLayout>,
    },
    /// A polymorphic interface-type parameter, optionally specialized to
    /// a concrete type.
    Interface { specialization: Option<Box<TypeLayout>> },
}

/// A vertex input or pixel output variable.
#[derive(Clone, Debug)]
pub struct IoVariableLayout {
    pub name: ShortString,
    pub semantic: ShortString,
    pub location: u32,
    pub ty: BasicTypeId,
    /// System-value semantics are satisfied by the pipeline, not bound by
    /// the application.
    pub system_value: bool,
}

/// The layout of one compiled entry point.
#[derive(Clone, Debug)]
pub struct EntryPointLayout {
    pub name: ShortString,
    pub stage: ShaderStage,
    /// Entry points with the same group index share a binding scope.
    pub group: u32,
    pub parameters: Vec<VariableLayout>,
    pub stage_inputs: Vec<IoVariableLayout>,
    pub stage_outputs: Vec<IoVariableLayout>,
    /// Compute stage only.
    pub thread_group_size: [u32; 3],
    /// Fragment stage only: the shader must run at sample frequency.
    pub uses_sample_frequency: bool,
    pub default_buffer: Option<DefaultBufferLayout>,
}

impl EntryPointLayout {
    pub fn new(name: impl Into<ShortString>, stage: ShaderStage, group: u32) -> Self {
        EntryPointLayout {
            name: name.into(),
            stage,
            group,
            parameters: Vec::new(),
            stage_inputs: Vec::new(),
            stage_outputs: Vec::new(),
            thread_group_size: [0; 3],
            uses_sample_frequency: false,
            default_buffer: None,
        }
    }
}

/// A string hashed into the compiled program, kept for diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HashedString {
    pub hash: u32,
    pub string: String,
}

/// A globally named type exported by the compiler for ad-hoc lookup.
#[derive(Clone, Debug)]
pub struct NamedTypeLayout {
    pub name: ShortString,
    pub ty: TypeLayout,
}

/// The complete layout of one compiled program version.
#[derive(Clone, Debug, Default)]
pub struct ProgramLayout {
    /// Global-scope parameters, in declaration order.
    pub globals: Vec<VariableLayout>,
    /// Binding for the implicit buffer backing loose global uniforms.
    pub default_buffer: Option<DefaultBufferLayout>,
    pub entry_points: Vec<EntryPointLayout>,
    /// Named types exported for `find_type` lookups.
    pub types: Vec<NamedTypeLayout>,
    pub hashed_strings: Vec<HashedString>,
}
