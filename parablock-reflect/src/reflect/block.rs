//! Parameter block reflection: concrete binding information for the
//! resource ranges of an element type.

use std::sync::Arc;

use log::debug;

use crate::error::ReflectError;
use crate::reflect::align_uniform_size;
use crate::reflect::offset::TypedVarOffset;
use crate::reflect::types::{ReflectionType, ResourceDims, ResourceRange};
use crate::reflect::variable::ReflectionVar;

/// Sentinel for descriptor-set indices that do not apply.
pub const INVALID_INDEX: u32 = u32::MAX;

/// How a resource range binds to the pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RangeFlavor {
    /// A plain descriptor range (texture/sampler/buffer).
    Simple,
    /// A buffer bound directly as a root descriptor.
    RootDescriptor,
    /// A constant-buffer sub-object.
    ConstantBuffer,
    /// A parameter-block sub-object with its own binding space.
    ParameterBlock,
    /// An interface-type sub-object.
    Interface,
}

/// Binding information for one resource range.
///
/// A block's binding records mirror the element type's resource ranges
/// 1:1 and in the same order: descriptor kind and count live on the
/// element type, while the record stores where the range binds.
#[derive(Clone, Debug)]
pub struct ResourceRangeBindingInfo {
    pub flavor: RangeFlavor,
    pub dims: ResourceDims,
    /// The register index.
    pub reg_index: u32,
    /// The register space.
    pub reg_space: u32,
    /// The descriptor set the range binds into; [`INVALID_INDEX`] unless
    /// the flavor is [`RangeFlavor::Simple`] and the block has been
    /// finalized.
    pub descriptor_set_index: u32,
    /// The reflector for a sub-object range.
    pub sub_object: Option<Arc<ParameterBlockReflection>>,
}

impl ResourceRangeBindingInfo {
    pub fn simple(dims: ResourceDims, reg_index: u32, reg_space: u32) -> Self {
        ResourceRangeBindingInfo {
            flavor: RangeFlavor::Simple,
            dims,
            reg_index,
            reg_space,
            descriptor_set_index: INVALID_INDEX,
            sub_object: None,
        }
    }

    pub fn root_descriptor(dims: ResourceDims, reg_index: u32, reg_space: u32) -> Self {
        ResourceRangeBindingInfo {
            flavor: RangeFlavor::RootDescriptor,
            dims,
            reg_index,
            reg_space,
            descriptor_set_index: INVALID_INDEX,
            sub_object: None,
        }
    }

    pub fn sub_object(
        flavor: RangeFlavor,
        reg_index: u32,
        reg_space: u32,
        sub_object: Arc<ParameterBlockReflection>,
    ) -> Self {
        ResourceRangeBindingInfo {
            flavor,
            dims: ResourceDims::Buffer,
            reg_index,
            reg_space,
            descriptor_set_index: INVALID_INDEX,
            sub_object: Some(sub_object),
        }
    }

    pub fn is_descriptor_set(&self) -> bool {
        self.flavor == RangeFlavor::Simple
    }

    pub fn is_root_descriptor(&self) -> bool {
        self.flavor == RangeFlavor::RootDescriptor
    }
}

/// Binding for the implicit constant buffer backing a block's loose
/// uniform data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DefaultConstantBufferBinding {
    pub reg_index: u32,
    pub reg_space: u32,
    pub descriptor_set_index: u32,
    /// Deliver the contents as root constants instead of a buffer.
    pub use_root_constants: bool,
}

/// Builder for a [`ParameterBlockReflection`].
///
/// Binding records must be added once per element resource range, in the
/// order the element type reports them; [`finalize`](Self::finalize)
/// checks the count and seals the block.
#[derive(Debug, Default)]
pub struct ParameterBlockBuilder {
    element_type: Option<Arc<ReflectionType>>,
    ranges: Vec<ResourceRangeBindingInfo>,
    default_constant_buffer: Option<DefaultConstantBufferBinding>,
}

impl ParameterBlockBuilder {
    pub fn new(element_type: Arc<ReflectionType>) -> Self {
        ParameterBlockBuilder {
            element_type: Some(element_type),
            ranges: Vec::new(),
            default_constant_buffer: None,
        }
    }

    /// An empty builder; the element type must be set before finalize.
    pub fn empty() -> Self {
        ParameterBlockBuilder::default()
    }

    pub fn set_element_type(&mut self, element_type: Arc<ReflectionType>) {
        self.element_type = Some(element_type);
    }

    pub fn add_resource_range(&mut self, info: ResourceRangeBindingInfo) {
        self.ranges.push(info);
    }

    pub fn set_default_constant_buffer(&mut self, binding: DefaultConstantBufferBinding) {
        self.default_constant_buffer = Some(binding);
    }

    /// Seal the block: verify the 1:1 mirror with the element type's
    /// ranges, partition range indices by flavor, and assign descriptor
    /// sets to simple ranges.
    pub fn finalize(self) -> Result<ParameterBlockReflection, ReflectError> {
        let element_type = self.element_type.ok_or(ReflectError::MissingBlockElement)?;

        let expected = element_type.resource_ranges().len();
        if self.ranges.len() != expected {
            return Err(ReflectError::ResourceRangeMismatch {
                expected,
                actual: self.ranges.len(),
            });
        }

        let mut ranges = self.ranges;
        let mut root_descriptor_range_indices = Vec::new();
        let mut sub_object_range_indices = Vec::new();
        for (index, info) in ranges.iter_mut().enumerate() {
            match info.flavor {
                RangeFlavor::Simple => {
                    // Single descriptor set model: every plain range lands
                    // in set 0.
                    info.descriptor_set_index = 0;
                }
                RangeFlavor::RootDescriptor => {
                    root_descriptor_range_indices.push(index as u32);
                }
                RangeFlavor::ParameterBlock => {
                    sub_object_range_indices.push(index as u32);
                }
                // Constant-buffer and interface sub-objects maintain their
                // own binding state.
                RangeFlavor::ConstantBuffer | RangeFlavor::Interface => {}
            }
        }

        Ok(ParameterBlockReflection {
            element_type,
            ranges,
            default_constant_buffer: self.default_constant_buffer,
            root_descriptor_range_indices,
            sub_object_range_indices,
        })
    }
}

/// Reflection for one parameter block: an element type plus binding
/// information for each of its resource ranges.
///
/// Immutable once finalized.
#[derive(Clone, Debug)]
pub struct ParameterBlockReflection {
    element_type: Arc<ReflectionType>,
    ranges: Vec<ResourceRangeBindingInfo>,
    default_constant_buffer: Option<DefaultConstantBufferBinding>,
    /// Ranges that bind directly into the root signature. Does not
    /// include root descriptors owned by sub-objects.
    root_descriptor_range_indices: Vec<u32>,
    /// Ranges whose descriptor sets are owned by a parameter-block
    /// sub-object and bound alongside this block's own.
    sub_object_range_indices: Vec<u32>,
}

impl ParameterBlockReflection {
    /// The type of the block's contents. For a `ConstantBuffer<T>` or
    /// `ParameterBlock<T>`, this is `T`.
    pub fn element_type(&self) -> &Arc<ReflectionType> {
        &self.element_type
    }

    pub fn resource_range_count(&self) -> u32 {
        self.ranges.len() as u32
    }

    /// Descriptor kind and count for a range. Equal to the element
    /// type's range at the same index, always.
    pub fn resource_range(&self, index: u32) -> Option<&ResourceRange> {
        self.element_type.resource_range(index)
    }

    pub fn resource_range_binding_info(&self, index: u32) -> Option<&ResourceRangeBindingInfo> {
        self.ranges.get(index as usize)
    }

    pub fn resource_range_binding_infos(&self) -> &[ResourceRangeBindingInfo] {
        &self.ranges
    }

    pub fn root_descriptor_range_indices(&self) -> &[u32] {
        &self.root_descriptor_range_indices
    }

    pub fn parameter_block_sub_object_range_indices(&self) -> &[u32] {
        &self.sub_object_range_indices
    }

    pub fn has_default_constant_buffer(&self) -> bool {
        self.default_constant_buffer.is_some()
    }

    pub fn default_constant_buffer_binding(&self) -> Option<&DefaultConstantBufferBinding> {
        self.default_constant_buffer.as_ref()
    }

    /// Allocation size for the implicit constant buffer, aligned to a
    /// 16-byte boundary; 0 when the block has none.
    pub fn default_constant_buffer_byte_size(&self) -> u32 {
        if self.default_constant_buffer.is_some() {
            align_uniform_size(self.element_type.byte_size())
        } else {
            0
        }
    }

    /// Find a member of the block's element type.
    pub fn find_member(&self, name: &str) -> Option<&Arc<ReflectionVar>> {
        let member = self.element_type.find_member(name);
        if member.is_none() {
            debug!("no member '{name}' in parameter block");
        }
        member
    }

    /// The bind location of a member, invalid on a miss.
    pub fn resource_binding(&self, name: &str) -> TypedVarOffset<'_> {
        self.element_type.member_offset(name)
    }
}
