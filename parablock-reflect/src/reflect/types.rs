//! Reflected shader types and their descriptor-range layout.

use std::sync::Arc;

use log::{debug, error};
use parablock_common::map::{FastHashMap, ShortString};
use parablock_common::BasicTypeId;

use crate::error::ReflectError;
use crate::reflect::block::ParameterBlockReflection;
use crate::reflect::offset::{ResourceOffset, TypedVarOffset, UniformOffset, VarOffset};
use crate::reflect::variable::ReflectionVar;

/// The kind of descriptor stored in a resource range.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DescriptorKind {
    ConstantBuffer,
    TextureSrv,
    TextureUav,
    RawBufferSrv,
    RawBufferUav,
    TypedBufferSrv,
    TypedBufferUav,
    StructuredBufferSrv,
    StructuredBufferUav,
    Sampler,
    AccelerationStructure,
}

/// The register category a descriptor kind allocates from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DescriptorCategory {
    Cbv,
    Srv,
    Uav,
    Sampler,
}

impl DescriptorKind {
    pub const fn category(self) -> DescriptorCategory {
        match self {
            DescriptorKind::ConstantBuffer => DescriptorCategory::Cbv,
            DescriptorKind::TextureSrv
            | DescriptorKind::RawBufferSrv
            | DescriptorKind::TypedBufferSrv
            | DescriptorKind::StructuredBufferSrv
            | DescriptorKind::AccelerationStructure => DescriptorCategory::Srv,
            DescriptorKind::TextureUav
            | DescriptorKind::RawBufferUav
            | DescriptorKind::TypedBufferUav
            | DescriptorKind::StructuredBufferUav => DescriptorCategory::Uav,
            DescriptorKind::Sampler => DescriptorCategory::Sampler,
        }
    }
}

/// A contiguous group of descriptors contained in a type.
///
/// A basic type has no ranges; a resource has one range of count 1; an
/// array multiplies its element's range counts; a struct concatenates its
/// members' ranges in declaration order. `base_index` is where the range
/// starts if the enclosing type's descriptors of the same category are
/// stored in one flattened array.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResourceRange {
    pub kind: DescriptorKind,
    pub count: u32,
    pub base_index: u32,
}

/// How a shader accesses a resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShaderAccess {
    Undefined,
    Read,
    ReadWrite,
}

/// The value type a resource read returns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ReturnKind {
    Unknown,
    Float,
    Double,
    Int,
    Uint,
}

/// Resource dimensionality.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceDims {
    Unknown,
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
    Texture2DMs,
    Texture2DMsArray,
    TextureCubeArray,
    AccelerationStructure,
    Buffer,
}

/// The sub-kind of a structured buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StructuredKind {
    /// Not a structured buffer.
    None,
    Default,
    Counter,
    Append,
    Consume,
}

/// The category of a resource-type shader parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Texture,
    StructuredBuffer,
    RawBuffer,
    TypedBuffer,
    Sampler,
    ConstantBuffer,
    AccelerationStructure,
}

impl ResourceKind {
    /// Whether resources of this kind may be bound as root descriptors.
    pub const fn is_root_descriptor_capable(self) -> bool {
        matches!(
            self,
            ResourceKind::StructuredBuffer | ResourceKind::RawBuffer | ResourceKind::TypedBuffer
        )
    }
}

/// A scalar, vector, or matrix type.
#[derive(Clone, Debug)]
pub struct BasicType {
    id: BasicTypeId,
    row_major: bool,
}

impl BasicType {
    pub fn id(&self) -> BasicTypeId {
        self.id
    }

    /// Only meaningful for matrices.
    pub fn is_row_major(&self) -> bool {
        self.row_major
    }
}

/// A struct type with named, ordered members.
#[derive(Clone, Debug)]
pub struct StructType {
    name: ShortString,
    members: Vec<Arc<ReflectionVar>>,
    name_to_index: FastHashMap<ShortString, usize>,
}

impl StructType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[Arc<ReflectionVar>] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&Arc<ReflectionVar>> {
        self.members.get(index)
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn member_by_name(&self, name: &str) -> Option<&Arc<ReflectionVar>> {
        self.member_index(name).map(|index| &self.members[index])
    }
}

/// A fixed-size array type.
#[derive(Clone, Debug)]
pub struct ArrayType {
    element: Arc<ReflectionType>,
    element_count: u32,
    element_stride: u32,
}

impl ArrayType {
    pub fn element(&self) -> &ReflectionType {
        &self.element
    }

    pub fn element_handle(&self) -> &Arc<ReflectionType> {
        &self.element
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Bytes between consecutive elements; not necessarily the element
    /// size.
    pub fn element_stride(&self) -> u32 {
        self.element_stride
    }
}

/// A texture, sampler, or buffer resource type.
#[derive(Clone, Debug)]
pub struct ResourceType {
    kind: ResourceKind,
    dims: ResourceDims,
    structured: StructuredKind,
    return_kind: ReturnKind,
    access: ShaderAccess,
    element_type: Option<Arc<ReflectionType>>,
    sub_block: Option<Arc<ParameterBlockReflection>>,
}

impl ResourceType {
    pub fn new(
        kind: ResourceKind,
        dims: ResourceDims,
        structured: StructuredKind,
        return_kind: ReturnKind,
        access: ShaderAccess,
    ) -> Self {
        ResourceType {
            kind,
            dims,
            structured,
            return_kind,
            access,
            element_type: None,
            sub_block: None,
        }
    }

    /// Attach the element type of a constant or structured buffer. Build
    /// phase only.
    pub fn with_element_type(mut self, element_type: Arc<ReflectionType>) -> Self {
        self.element_type = Some(element_type);
        self
    }

    /// Attach the sub-object reflector of a constant buffer or parameter
    /// block. Build phase only.
    pub fn with_sub_block(mut self, sub_block: Arc<ParameterBlockReflection>) -> Self {
        self.sub_block = Some(sub_block);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn dims(&self) -> ResourceDims {
        self.dims
    }

    pub fn structured_kind(&self) -> StructuredKind {
        self.structured
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.return_kind
    }

    pub fn access(&self) -> ShaderAccess {
        self.access
    }

    pub fn element_type(&self) -> Option<&ReflectionType> {
        self.element_type.as_deref()
    }

    pub fn sub_block(&self) -> Option<&Arc<ParameterBlockReflection>> {
        self.sub_block.as_ref()
    }

    /// Size in bytes of the underlying element for constant and structured
    /// buffers; 0 otherwise.
    pub fn element_byte_size(&self) -> u32 {
        self.element_type.as_ref().map_or(0, |ty| ty.byte_size())
    }

    /// The kind of descriptor one resource of this type occupies.
    pub fn descriptor_kind(&self) -> DescriptorKind {
        let writable = self.access == ShaderAccess::ReadWrite
            || matches!(
                self.structured,
                StructuredKind::Counter | StructuredKind::Append | StructuredKind::Consume
            );
        match self.kind {
            ResourceKind::ConstantBuffer => DescriptorKind::ConstantBuffer,
            ResourceKind::Sampler => DescriptorKind::Sampler,
            ResourceKind::AccelerationStructure => DescriptorKind::AccelerationStructure,
            ResourceKind::Texture if writable => DescriptorKind::TextureUav,
            ResourceKind::Texture => DescriptorKind::TextureSrv,
            ResourceKind::StructuredBuffer if writable => DescriptorKind::StructuredBufferUav,
            ResourceKind::StructuredBuffer => DescriptorKind::StructuredBufferSrv,
            ResourceKind::RawBuffer if writable => DescriptorKind::RawBufferUav,
            ResourceKind::RawBuffer => DescriptorKind::RawBufferSrv,
            ResourceKind::TypedBuffer if writable => DescriptorKind::TypedBufferUav,
            ResourceKind::TypedBuffer => DescriptorKind::TypedBufferSrv,
        }
    }
}

/// A polymorphic interface-type parameter.
#[derive(Clone, Debug)]
pub struct InterfaceType {
    sub_block: Option<Arc<ParameterBlockReflection>>,
}

impl InterfaceType {
    /// The sub-object reflector, present once the parameter has been
    /// specialized to a concrete type.
    pub fn sub_block(&self) -> Option<&Arc<ParameterBlockReflection>> {
        self.sub_block.as_ref()
    }
}

/// The kind-specific payload of a [`ReflectionType`].
#[derive(Clone, Debug)]
pub enum TypeKind {
    Basic(BasicType),
    Struct(StructType),
    Array(ArrayType),
    Resource(ResourceType),
    Interface(InterfaceType),
}

/// Reflection and layout information for a type in shader code.
///
/// Two distinct instances may describe the same type; `==` compares
/// structure, recursively by kind, and is the basis for type
/// deduplication across compilation units.
#[derive(Clone, Debug)]
pub struct ReflectionType {
    /// Size of the type's uniform data in bytes. Resources do not count.
    byte_size: u32,
    resource_ranges: Vec<ResourceRange>,
    kind: TypeKind,
}

impl ReflectionType {
    pub fn basic(id: BasicTypeId, row_major: bool, byte_size: u32) -> Arc<ReflectionType> {
        Arc::new(ReflectionType {
            byte_size,
            resource_ranges: Vec::new(),
            kind: TypeKind::Basic(BasicType { id, row_major }),
        })
    }

    /// An array type. Its ranges are the element's with counts multiplied
    /// by the element count.
    pub fn array(
        element: Arc<ReflectionType>,
        element_count: u32,
        element_stride: u32,
    ) -> Arc<ReflectionType> {
        let resource_ranges = element
            .resource_ranges
            .iter()
            .map(|range| ResourceRange {
                kind: range.kind,
                count: range.count * element_count,
                base_index: range.base_index,
            })
            .collect();
        Arc::new(ReflectionType {
            byte_size: element_count * element_stride,
            resource_ranges,
            kind: TypeKind::Array(ArrayType {
                element,
                element_count,
                element_stride,
            }),
        })
    }

    /// A resource type. Contributes exactly one descriptor range of
    /// count 1.
    pub fn resource(resource: ResourceType) -> Arc<ReflectionType> {
        let range = ResourceRange {
            kind: resource.descriptor_kind(),
            count: 1,
            base_index: 0,
        };
        Arc::new(ReflectionType {
            byte_size: 0,
            resource_ranges: vec![range],
            kind: TypeKind::Resource(resource),
        })
    }

    /// An interface type. Contributes one constant-buffer range so that a
    /// parameter block's binding records can mirror it.
    pub fn interface(sub_block: Option<Arc<ParameterBlockReflection>>) -> Arc<ReflectionType> {
        let range = ResourceRange {
            kind: DescriptorKind::ConstantBuffer,
            count: 1,
            base_index: 0,
        };
        Arc::new(ReflectionType {
            byte_size: 0,
            resource_ranges: vec![range],
            kind: TypeKind::Interface(InterfaceType { sub_block }),
        })
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn byte_size(&self) -> u32 {
        self.byte_size
    }

    pub fn resource_ranges(&self) -> &[ResourceRange] {
        &self.resource_ranges
    }

    pub fn resource_range_count(&self) -> u32 {
        self.resource_ranges.len() as u32
    }

    pub fn resource_range(&self, index: u32) -> Option<&ResourceRange> {
        self.resource_ranges.get(index as usize)
    }

    pub fn as_basic(&self) -> Option<&BasicType> {
        match &self.kind {
            TypeKind::Basic(basic) => Some(basic),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match &self.kind {
            TypeKind::Struct(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match &self.kind {
            TypeKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceType> {
        match &self.kind {
            TypeKind::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceType> {
        match &self.kind {
            TypeKind::Interface(interface) => Some(interface),
            _ => None,
        }
    }

    /// The innermost non-array type; `self` for non-arrays.
    pub fn unwrap_array(&self) -> &ReflectionType {
        let mut ty = self;
        while let TypeKind::Array(array) = &ty.kind {
            ty = &array.element;
        }
        ty
    }

    /// The product of all nested array extents; 1 for non-arrays.
    pub fn total_array_element_count(&self) -> u32 {
        match &self.kind {
            TypeKind::Array(array) => {
                array.element_count * array.element.total_array_element_count()
            }
            _ => 1,
        }
    }

    /// Find a member with the given name. `None` for non-struct types or
    /// missing names.
    pub fn find_member(&self, name: &str) -> Option<&Arc<ReflectionVar>> {
        self.as_struct()?.member_by_name(name)
    }

    /// The type and offset of the member `name`, relative to this type.
    ///
    /// Reports an error and returns an invalid offset when this is not a
    /// struct or the name is missing.
    pub fn member_offset(&self, name: &str) -> TypedVarOffset<'_> {
        let Some(record) = self.as_struct() else {
            error!("member '{name}' looked up on a non-struct type");
            return TypedVarOffset::invalid();
        };
        match record.member_by_name(name) {
            Some(member) => TypedVarOffset::new(member.ty(), member.offset()),
            None => {
                error!("no member '{name}' in struct '{}'", record.name());
                TypedVarOffset::invalid()
            }
        }
    }

    /// The type and offset of an array element or a struct member by
    /// index, relative to this type.
    pub fn element_offset(&self, index: u32) -> TypedVarOffset<'_> {
        match &self.kind {
            TypeKind::Array(array) => {
                if index >= array.element_count {
                    error!(
                        "element index {index} out of bounds for array of {}",
                        array.element_count
                    );
                    return TypedVarOffset::invalid();
                }
                let offset = VarOffset::new(
                    UniformOffset::new(index * array.element_stride),
                    ResourceOffset::new(0, index * array.element.total_array_element_count()),
                );
                TypedVarOffset::new(&array.element, offset)
            }
            TypeKind::Struct(record) => match record.member(index as usize) {
                Some(member) => TypedVarOffset::new(member.ty(), member.offset()),
                None => {
                    error!(
                        "member index {index} out of bounds for struct '{}'",
                        record.name()
                    );
                    TypedVarOffset::invalid()
                }
            },
            _ => {
                error!("element index {index} looked up on a non-indexable type");
                TypedVarOffset::invalid()
            }
        }
    }

    /// Locate the member or element whose byte range contains
    /// `byte_offset`. Used to map a raw buffer offset back to a typed
    /// field.
    pub fn find_member_by_offset(&self, byte_offset: u32) -> TypedVarOffset<'_> {
        match &self.kind {
            TypeKind::Struct(record) => {
                for member in &record.members {
                    let size = member.ty().byte_size();
                    if size == 0 {
                        continue;
                    }
                    let start = member.byte_offset();
                    if byte_offset >= start && byte_offset < start + size {
                        return TypedVarOffset::new(member.ty(), member.offset());
                    }
                }
                debug!("no member at byte offset {byte_offset}");
                TypedVarOffset::invalid()
            }
            TypeKind::Array(array) => {
                let index = byte_offset / array.element_stride.max(1);
                self.element_offset(index)
            }
            _ => {
                debug!("byte-offset lookup on a type without members");
                TypedVarOffset::invalid()
            }
        }
    }

    /// An offset zero bytes into this type: the canonical start of a
    /// `field`/`element` lookup chain.
    pub fn zero_offset(&self) -> TypedVarOffset<'_> {
        TypedVarOffset::new(self, VarOffset::ZERO)
    }
}

impl PartialEq for ReflectionType {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Basic(a), TypeKind::Basic(b)) => {
                a.id == b.id && a.row_major == b.row_major
            }
            (TypeKind::Struct(a), TypeKind::Struct(b)) => {
                a.members.len() == b.members.len()
                    && a.members
                        .iter()
                        .zip(b.members.iter())
                        .all(|(lhs, rhs)| lhs == rhs)
            }
            (TypeKind::Array(a), TypeKind::Array(b)) => {
                a.element_count == b.element_count
                    && a.element_stride == b.element_stride
                    && *a.element == *b.element
            }
            (TypeKind::Resource(a), TypeKind::Resource(b)) => {
                a.kind == b.kind
                    && a.dims == b.dims
                    && a.structured == b.structured
                    && a.return_kind == b.return_kind
                    && a.access == b.access
                    && match (&a.element_type, &b.element_type) {
                        (None, None) => true,
                        (Some(lhs), Some(rhs)) => **lhs == **rhs,
                        _ => false,
                    }
            }
            // Specialization is not part of an interface type's identity.
            (TypeKind::Interface(_), TypeKind::Interface(_)) => true,
            _ => false,
        }
    }
}

impl Eq for ReflectionType {}

/// Running descriptor counters threaded through struct construction.
///
/// Tracks how many descriptors of each register category the struct has
/// accumulated so far, so that member range base indices come out
/// contiguous in declaration order.
#[derive(Copy, Clone, Debug, Default)]
pub struct BuildState {
    pub cbv_count: u32,
    pub srv_count: u32,
    pub uav_count: u32,
    pub sampler_count: u32,
}

impl BuildState {
    /// Reserve `count` descriptors of the given category and return the
    /// base index they start at.
    fn allocate(&mut self, category: DescriptorCategory, count: u32) -> u32 {
        let counter = match category {
            DescriptorCategory::Cbv => &mut self.cbv_count,
            DescriptorCategory::Srv => &mut self.srv_count,
            DescriptorCategory::Uav => &mut self.uav_count,
            DescriptorCategory::Sampler => &mut self.sampler_count,
        };
        let base_index = *counter;
        *counter += count;
        base_index
    }
}

/// Incremental construction of a struct [`ReflectionType`].
///
/// Members are added in declaration order; once built, the type is
/// immutable.
#[derive(Debug)]
pub struct StructBuilder {
    name: ShortString,
    byte_size: u32,
    members: Vec<Arc<ReflectionVar>>,
    name_to_index: FastHashMap<ShortString, usize>,
    resource_ranges: Vec<ResourceRange>,
}

impl StructBuilder {
    pub fn new(name: impl Into<ShortString>) -> Self {
        StructBuilder {
            name: name.into(),
            byte_size: 0,
            members: Vec::new(),
            name_to_index: FastHashMap::default(),
            resource_ranges: Vec::new(),
        }
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// The number of ranges accumulated so far; the range index the next
    /// resource-bearing member will start at.
    pub fn resource_range_count(&self) -> u32 {
        self.resource_ranges.len() as u32
    }

    /// Adopt the compiler-declared size when it exceeds the accumulated
    /// member extent (trailing padding).
    pub fn set_byte_size(&mut self, byte_size: u32) {
        self.byte_size = self.byte_size.max(byte_size);
    }

    /// Add a member, rejecting duplicate names.
    ///
    /// Returns the new member's index. The member's resource ranges are
    /// appended to the struct's with base indices allocated from `state`.
    pub fn add_member(
        &mut self,
        member: Arc<ReflectionVar>,
        state: &mut BuildState,
    ) -> Result<usize, ReflectError> {
        if self.name_to_index.contains_key(member.name()) {
            return Err(ReflectError::DuplicateMemberName {
                owner: self.name.to_string(),
                name: member.name().to_string(),
            });
        }
        Ok(self.insert(member, state))
    }

    /// Add a member, keeping the first-inserted member on a name
    /// collision and returning its index.
    pub fn add_member_ignore_conflicts(
        &mut self,
        member: Arc<ReflectionVar>,
        state: &mut BuildState,
    ) -> usize {
        if let Some(existing) = self.member_index(member.name()) {
            return existing;
        }
        self.insert(member, state)
    }

    fn insert(&mut self, member: Arc<ReflectionVar>, state: &mut BuildState) -> usize {
        let index = self.members.len();
        self.name_to_index
            .insert(ShortString::from(member.name()), index);

        for range in member.ty().resource_ranges() {
            self.resource_ranges.push(ResourceRange {
                kind: range.kind,
                count: range.count,
                base_index: state.allocate(range.kind.category(), range.count),
            });
        }

        let size = member.ty().byte_size();
        if size > 0 && member.offset().is_valid() {
            self.byte_size = self.byte_size.max(member.byte_offset() + size);
        }

        self.members.push(member);
        index
    }

    pub fn build(self) -> Arc<ReflectionType> {
        Arc::new(ReflectionType {
            byte_size: self.byte_size,
            resource_ranges: self.resource_ranges,
            kind: TypeKind::Struct(StructType {
                name: self.name,
                members: self.members,
                name_to_index: self.name_to_index,
            }),
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parablock_common::{BasicTypeId, ScalarKind};

    use crate::error::ReflectError;
    use crate::reflect::offset::{ResourceOffset, UniformOffset, VarOffset};
    use crate::reflect::types::{
        BuildState, DescriptorKind, ReflectionType, ResourceDims, ResourceKind, ResourceType,
        ReturnKind, ShaderAccess, StructBuilder, StructuredKind,
    };
    use crate::reflect::variable::ReflectionVar;

    fn float() -> Arc<ReflectionType> {
        ReflectionType::basic(BasicTypeId::Scalar(ScalarKind::Float32), false, 4)
    }

    fn float4() -> Arc<ReflectionType> {
        ReflectionType::basic(BasicTypeId::Vector(ScalarKind::Float32, 4), false, 16)
    }

    fn texture2d() -> Arc<ReflectionType> {
        ReflectionType::resource(ResourceType::new(
            ResourceKind::Texture,
            ResourceDims::Texture2D,
            StructuredKind::None,
            ReturnKind::Float,
            ShaderAccess::Read,
        ))
    }

    fn sampler() -> Arc<ReflectionType> {
        ReflectionType::resource(ResourceType::new(
            ResourceKind::Sampler,
            ResourceDims::Unknown,
            StructuredKind::None,
            ReturnKind::Unknown,
            ShaderAccess::Read,
        ))
    }

    fn member(name: &str, ty: Arc<ReflectionType>, byte_offset: u32, range: u32) -> Arc<ReflectionVar> {
        Arc::new(ReflectionVar::new(
            name,
            ty,
            VarOffset::new(
                UniformOffset::new(byte_offset),
                ResourceOffset::with_range(range),
            ),
        ))
    }

    #[test]
    pub fn struct_member_offsets() {
        // cbuffer packing: a float at 0, a float4 aligned up to 16.
        let mut builder = StructBuilder::new("Material");
        let mut state = BuildState::default();
        builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();
        builder.add_member(member("b", float4(), 16, 0), &mut state).unwrap();
        let ty = builder.build();

        assert_eq!(ty.byte_size(), 32);
        assert_eq!(ty.member_offset("a").byte_offset(), 0);
        assert_eq!(ty.member_offset("b").byte_offset(), 16);
        assert!(!ty.member_offset("z").is_valid());
        assert!(ty.find_member("z").is_none());
    }

    #[test]
    pub fn duplicate_member_policies() {
        let mut builder = StructBuilder::new("S");
        let mut state = BuildState::default();
        let first = builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();

        let rejected = builder.add_member(member("a", float4(), 16, 0), &mut state);
        assert!(matches!(
            rejected,
            Err(ReflectError::DuplicateMemberName { .. })
        ));

        let kept = builder.add_member_ignore_conflicts(member("a", float4(), 16, 0), &mut state);
        assert_eq!(kept, first);

        let ty = builder.build();
        let record = ty.as_struct().unwrap();
        assert_eq!(record.member_count(), 1);
        // The first-inserted member survives.
        assert_eq!(record.member(0).unwrap().ty().byte_size(), 4);
    }

    #[test]
    pub fn struct_range_accumulation() {
        let mut builder = StructBuilder::new("Pass");
        let mut state = BuildState::default();
        builder
            .add_member(member("albedo", texture2d(), 0, 0), &mut state)
            .unwrap();
        builder
            .add_member(
                member("normals", ReflectionType::array(texture2d(), 3, 0), 0, 1),
                &mut state,
            )
            .unwrap();
        builder
            .add_member(member("samp", sampler(), 0, 2), &mut state)
            .unwrap();
        let ty = builder.build();

        let ranges = ty.resource_ranges();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].kind, DescriptorKind::TextureSrv);
        assert_eq!(ranges[0].count, 1);
        assert_eq!(ranges[0].base_index, 0);
        // The SRV counter keeps running across members...
        assert_eq!(ranges[1].count, 3);
        assert_eq!(ranges[1].base_index, 1);
        // ...while samplers allocate from their own category.
        assert_eq!(ranges[2].kind, DescriptorKind::Sampler);
        assert_eq!(ranges[2].base_index, 0);
    }

    #[test]
    pub fn array_composition() {
        let inner = ReflectionType::array(texture2d(), 3, 0);
        let outer = ReflectionType::array(inner, 2, 0);
        assert_eq!(outer.total_array_element_count(), 6);
        assert_eq!(outer.resource_ranges()[0].count, 6);
        assert_eq!(outer.unwrap_array().resource_range_count(), 1);
        assert!(outer.unwrap_array().as_resource().is_some());

        let floats = ReflectionType::array(float4(), 4, 16);
        assert_eq!(floats.byte_size(), 64);
        assert_eq!(floats.total_array_element_count(), 4);
        assert_eq!(float4().total_array_element_count(), 1);
    }

    #[test]
    pub fn array_element_offsets() {
        let arr = ReflectionType::array(float4(), 4, 16);
        let second = arr.element_offset(2);
        assert_eq!(second.byte_offset(), 32);
        assert!(!arr.element_offset(4).is_valid());

        // Elements of an array of arrays advance the resource array index
        // by the inner extent.
        let nested = ReflectionType::array(ReflectionType::array(texture2d(), 3, 0), 2, 0);
        let offset = nested.element_offset(1);
        assert_eq!(offset.offset().array_index(), 3);
    }

    #[test]
    pub fn structural_equality() {
        let build = |size_b: u32| {
            let mut builder = StructBuilder::new("S");
            let mut state = BuildState::default();
            builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();
            let b = if size_b == 4 { float() } else { float4() };
            builder.add_member(member("b", b, 16, 0), &mut state).unwrap();
            builder.build()
        };

        let lhs = build(16);
        let rhs = build(16);
        assert!(Arc::ptr_eq(&lhs, &lhs));
        assert!(!Arc::ptr_eq(&lhs, &rhs));
        assert_eq!(*lhs, *rhs);

        // A different member type breaks equality.
        assert_ne!(*lhs, *build(4));

        // A different offset breaks equality.
        let mut builder = StructBuilder::new("S");
        let mut state = BuildState::default();
        builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();
        builder.add_member(member("b", float4(), 32, 0), &mut state).unwrap();
        assert_ne!(*lhs, *builder.build());

        // A different member name breaks equality.
        let mut builder = StructBuilder::new("S");
        let mut state = BuildState::default();
        builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();
        builder.add_member(member("c", float4(), 16, 0), &mut state).unwrap();
        assert_ne!(*lhs, *builder.build());

        // Arrays compare element, count, and stride.
        assert_eq!(
            *ReflectionType::array(float4(), 4, 16),
            *ReflectionType::array(float4(), 4, 16)
        );
        assert_ne!(
            *ReflectionType::array(float4(), 4, 16),
            *ReflectionType::array(float4(), 3, 16)
        );

        // Matrix layout is part of basic identity.
        let id = BasicTypeId::Matrix(ScalarKind::Float32, 4, 4);
        assert_ne!(
            *ReflectionType::basic(id, true, 64),
            *ReflectionType::basic(id, false, 64)
        );

        assert_eq!(*texture2d(), *texture2d());
        assert_ne!(*texture2d(), *sampler());
    }

    #[test]
    pub fn lookup_chain_round_trip() {
        // struct Inner { b: float4 } at offset 16 inside Outer { a: float, inner: Inner }
        let mut inner = StructBuilder::new("Inner");
        let mut state = BuildState::default();
        inner.add_member(member("b", float4(), 0, 0), &mut state).unwrap();
        let inner = inner.build();

        let mut outer = StructBuilder::new("Outer");
        let mut state = BuildState::default();
        outer.add_member(member("a", float(), 0, 0), &mut state).unwrap();
        outer.add_member(member("inner", inner, 16, 0), &mut state).unwrap();
        let outer = outer.build();

        let chained = outer.zero_offset().field("inner").field("b");
        assert_eq!(chained.byte_offset(), 16);
        assert!(chained.ty().unwrap().as_basic().is_some());

        // A miss anywhere in the chain degrades to invalid.
        assert!(!outer.zero_offset().field("missing").field("b").is_valid());
    }

    #[test]
    pub fn lookup_chain_through_arrays() {
        // struct { pad: float4, rows: float4[4] }
        let mut builder = StructBuilder::new("S");
        let mut state = BuildState::default();
        builder.add_member(member("pad", float4(), 0, 0), &mut state).unwrap();
        builder
            .add_member(
                member("rows", ReflectionType::array(float4(), 4, 16), 16, 0),
                &mut state,
            )
            .unwrap();
        let ty = builder.build();

        let third = ty.zero_offset().field("rows").element(2);
        assert_eq!(third.byte_offset(), 16 + 2 * 16);

        // Struct members are also addressable by index.
        let by_index = ty.zero_offset().element(1);
        assert_eq!(by_index.byte_offset(), 16);

        assert!(!ty.zero_offset().field("rows").element(4).is_valid());
    }

    #[test]
    pub fn member_by_byte_offset() {
        let mut builder = StructBuilder::new("S");
        let mut state = BuildState::default();
        builder.add_member(member("a", float(), 0, 0), &mut state).unwrap();
        builder.add_member(member("b", float4(), 16, 0), &mut state).unwrap();
        let ty = builder.build();

        assert_eq!(ty.find_member_by_offset(0).byte_offset(), 0);
        assert_eq!(ty.find_member_by_offset(20).byte_offset(), 16);
        assert!(!ty.find_member_by_offset(64).is_valid());

        let arr = ReflectionType::array(float4(), 4, 16);
        assert_eq!(arr.find_member_by_offset(35).byte_offset(), 32);
    }

    #[test]
    pub fn downcast_accessors() {
        let ty = float();
        assert!(ty.as_basic().is_some());
        assert!(ty.as_struct().is_none());
        assert!(ty.as_array().is_none());
        assert!(ty.as_resource().is_none());
        assert!(ty.as_interface().is_none());
        assert!(!ty.member_offset("x").is_valid());
    }
}
