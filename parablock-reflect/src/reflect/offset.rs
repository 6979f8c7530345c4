//! Offsets of shader variables relative to an enclosing type or block.
//!
//! Uniform data and resources live in two different addressing spaces:
//! uniform variables at byte offsets in a backing buffer, resources at
//! (range, array-index) pairs in descriptor ranges. Every offset type can
//! encode an invalid value, and addition propagates invalidity, so a
//! failed lookup turns the rest of a lookup chain into a no-op instead of
//! a crash.

use std::ops::Add;

use crate::reflect::types::ReflectionType;

/// The byte offset of a uniform shader variable.
///
/// Invalid offsets are represented by an all-ones bit pattern; the default
/// value is invalid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct UniformOffset(u32);

impl UniformOffset {
    pub const ZERO: UniformOffset = UniformOffset(0);
    pub const INVALID: UniformOffset = UniformOffset(u32::MAX);

    pub const fn new(byte_offset: u32) -> Self {
        UniformOffset(byte_offset)
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// The raw byte offset.
    pub const fn byte_offset(self) -> u32 {
        self.0
    }
}

impl Default for UniformOffset {
    fn default() -> Self {
        UniformOffset::INVALID
    }
}

impl Add for UniformOffset {
    type Output = UniformOffset;

    fn add(self, other: UniformOffset) -> UniformOffset {
        if !self.is_valid() || !other.is_valid() {
            return UniformOffset::INVALID;
        }
        UniformOffset(self.0 + other.0)
    }
}

impl Add<u32> for UniformOffset {
    type Output = UniformOffset;

    fn add(self, byte_offset: u32) -> UniformOffset {
        self + UniformOffset(byte_offset)
    }
}

/// The offset of a resource shader variable: a descriptor range index and
/// an array index within that range.
///
/// Range indices are an implementation detail of parameter blocks; they do
/// not correspond to registers or bindings.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceOffset {
    range_index: u32,
    array_index: u32,
}

impl ResourceOffset {
    pub const ZERO: ResourceOffset = ResourceOffset {
        range_index: 0,
        array_index: 0,
    };
    pub const INVALID: ResourceOffset = ResourceOffset {
        range_index: u32::MAX,
        array_index: u32::MAX,
    };

    pub const fn new(range_index: u32, array_index: u32) -> Self {
        ResourceOffset {
            range_index,
            array_index,
        }
    }

    /// An offset at the start of the given range.
    pub const fn with_range(range_index: u32) -> Self {
        ResourceOffset {
            range_index,
            array_index: 0,
        }
    }

    pub const fn is_valid(self) -> bool {
        self.range_index != u32::MAX
    }

    pub const fn range_index(self) -> u32 {
        self.range_index
    }

    pub const fn array_index(self) -> u32 {
        self.array_index
    }
}

impl Default for ResourceOffset {
    fn default() -> Self {
        ResourceOffset::INVALID
    }
}

impl Add for ResourceOffset {
    type Output = ResourceOffset;

    fn add(self, other: ResourceOffset) -> ResourceOffset {
        if !self.is_valid() || !other.is_valid() {
            return ResourceOffset::INVALID;
        }
        ResourceOffset {
            range_index: self.range_index + other.range_index,
            array_index: self.array_index + other.array_index,
        }
    }
}

/// The combined offset of a shader variable that may hold uniform data,
/// resources, or both.
///
/// Valid iff the uniform component is valid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VarOffset {
    uniform: UniformOffset,
    resource: ResourceOffset,
}

impl VarOffset {
    pub const ZERO: VarOffset = VarOffset {
        uniform: UniformOffset::ZERO,
        resource: ResourceOffset::ZERO,
    };
    pub const INVALID: VarOffset = VarOffset {
        uniform: UniformOffset::INVALID,
        resource: ResourceOffset::INVALID,
    };

    pub const fn new(uniform: UniformOffset, resource: ResourceOffset) -> Self {
        VarOffset { uniform, resource }
    }

    pub const fn is_valid(self) -> bool {
        self.uniform.is_valid()
    }

    pub const fn uniform(self) -> UniformOffset {
        self.uniform
    }

    pub const fn resource(self) -> ResourceOffset {
        self.resource
    }

    pub const fn byte_offset(self) -> u32 {
        self.uniform.byte_offset()
    }

    pub const fn range_index(self) -> u32 {
        self.resource.range_index()
    }

    pub const fn array_index(self) -> u32 {
        self.resource.array_index()
    }
}

impl Default for VarOffset {
    fn default() -> Self {
        VarOffset::INVALID
    }
}

impl From<VarOffset> for UniformOffset {
    fn from(offset: VarOffset) -> Self {
        offset.uniform
    }
}

impl From<VarOffset> for ResourceOffset {
    fn from(offset: VarOffset) -> Self {
        offset.resource
    }
}

impl Add for VarOffset {
    type Output = VarOffset;

    fn add(self, other: VarOffset) -> VarOffset {
        if !self.is_valid() || !other.is_valid() {
            return VarOffset::INVALID;
        }
        VarOffset {
            uniform: self.uniform + other.uniform,
            resource: self.resource + other.resource,
        }
    }
}

/// A [`VarOffset`] together with the type of the variable at that offset.
///
/// Obtained from [`ReflectionType::zero_offset`] or a member lookup, and
/// used to chain lookups through nested structs and arrays:
///
/// ```ignore
/// let pos = material_type.zero_offset().field("light").field("position");
/// ```
///
/// Offsets accumulate relative to the type where the chain started, not
/// the immediately enclosing field. Holds a non-owning reference to the
/// type information; invalid iff the type reference is absent.
#[derive(Copy, Clone, Debug)]
pub struct TypedVarOffset<'a> {
    offset: VarOffset,
    ty: Option<&'a ReflectionType>,
}

impl<'a> TypedVarOffset<'a> {
    /// An invalid offset with no type attached.
    pub const fn invalid() -> Self {
        TypedVarOffset {
            offset: VarOffset::INVALID,
            ty: None,
        }
    }

    /// The caller is responsible for `ty` actually describing the data at
    /// `offset`.
    pub const fn new(ty: &'a ReflectionType, offset: VarOffset) -> Self {
        TypedVarOffset {
            offset,
            ty: Some(ty),
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.ty.is_some()
    }

    pub const fn ty(&self) -> Option<&'a ReflectionType> {
        self.ty
    }

    pub const fn offset(&self) -> VarOffset {
        self.offset
    }

    pub const fn byte_offset(&self) -> u32 {
        self.offset.byte_offset()
    }

    /// Look up the type and offset of the field `name`, relative to the
    /// root of this lookup chain.
    pub fn field(&self, name: &str) -> TypedVarOffset<'a> {
        let Some(ty) = self.ty else {
            return TypedVarOffset::invalid();
        };
        let sub = ty.member_offset(name);
        if !sub.is_valid() {
            return TypedVarOffset::invalid();
        }
        TypedVarOffset {
            offset: self.offset + sub.offset,
            ty: sub.ty,
        }
    }

    /// Look up the type and offset of an array element or a struct member
    /// by index, relative to the root of this lookup chain.
    pub fn element(&self, index: u32) -> TypedVarOffset<'a> {
        let Some(ty) = self.ty else {
            return TypedVarOffset::invalid();
        };
        let sub = ty.element_offset(index);
        if !sub.is_valid() {
            return TypedVarOffset::invalid();
        }
        TypedVarOffset {
            offset: self.offset + sub.offset,
            ty: sub.ty,
        }
    }
}

impl Default for TypedVarOffset<'_> {
    fn default() -> Self {
        TypedVarOffset::invalid()
    }
}

impl From<TypedVarOffset<'_>> for VarOffset {
    fn from(offset: TypedVarOffset<'_>) -> Self {
        offset.offset
    }
}

impl From<TypedVarOffset<'_>> for UniformOffset {
    fn from(offset: TypedVarOffset<'_>) -> Self {
        offset.offset.uniform()
    }
}

impl From<TypedVarOffset<'_>> for ResourceOffset {
    fn from(offset: TypedVarOffset<'_>) -> Self {
        offset.offset.resource()
    }
}
