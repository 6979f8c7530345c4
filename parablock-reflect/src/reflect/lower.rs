//! Lowering of compiled layout into reflection objects.
//!
//! The single build pass: walk the [`ProgramLayout`] top to bottom,
//! produce the reflection type tree with its resource ranges, collect one
//! binding record per range in range order, and finalize every block.

use std::collections::BTreeMap;
use std::sync::Arc;

use parablock_common::map::{FastHashMap, ShortString};

use crate::error::ReflectError;
use crate::layout::{
    DefaultBufferLayout, EntryPointLayout, ProgramLayout, RegisterBinding, ShaderStage, StageMask,
    TypeLayout, VariableLayout,
};
use crate::reflect::block::{
    DefaultConstantBufferBinding, ParameterBlockBuilder, ParameterBlockReflection, RangeFlavor,
    ResourceRangeBindingInfo, INVALID_INDEX,
};
use crate::reflect::offset::{ResourceOffset, UniformOffset, VarOffset};
use crate::reflect::program::{EntryPointGroupReflection, ProgramReflection, ShaderVariable};
use crate::reflect::types::{
    BuildState, ReflectionType, ResourceDims, ResourceKind, ResourceType, ReturnKind, ShaderAccess,
    StructBuilder, StructuredKind,
};
use crate::reflect::variable::ReflectionVar;

fn register_coords(binding: Option<&RegisterBinding>) -> (u32, u32) {
    binding.map_or((0, 0), |binding| (binding.index, binding.space))
}

/// Lower one type layout.
///
/// Appends one binding record to `bindings` per resource range the type
/// contributes, in the same order the type reports its ranges; this is
/// what lets a parameter block mirror its element type 1:1.
fn lower_type(
    name: &str,
    layout: &TypeLayout,
    binding: Option<&RegisterBinding>,
    bindings: &mut Vec<ResourceRangeBindingInfo>,
) -> Result<Arc<ReflectionType>, ReflectError> {
    match layout {
        TypeLayout::Basic {
            id,
            row_major,
            byte_size,
        } => Ok(ReflectionType::basic(*id, *row_major, *byte_size)),

        TypeLayout::Struct {
            name: struct_name,
            byte_size,
            fields,
        } => {
            let mut builder = StructBuilder::new(struct_name.clone());
            let mut state = BuildState::default();
            for field in fields {
                let range_start = builder.resource_range_count();
                let ty = lower_type(&field.name, &field.ty, field.binding.as_ref(), bindings)?;
                let member = ReflectionVar::new(
                    field.name.clone(),
                    ty,
                    VarOffset::new(
                        UniformOffset::new(field.byte_offset),
                        ResourceOffset::with_range(range_start),
                    ),
                );
                builder.add_member(Arc::new(member), &mut state)?;
            }
            builder.set_byte_size(*byte_size);
            Ok(builder.build())
        }

        TypeLayout::Array {
            element,
            element_count,
            element_stride,
        } => {
            // The element's ranges are recorded once; the array multiplies
            // their counts, not the number of binding records.
            let element = lower_type(name, element, binding, bindings)?;
            Ok(ReflectionType::array(
                element,
                *element_count,
                *element_stride,
            ))
        }

        TypeLayout::Resource {
            kind,
            dims,
            structured,
            return_kind,
            access,
            element,
        } => {
            let root = binding.map_or(false, |binding| binding.root);
            if root && !kind.is_root_descriptor_capable() {
                return Err(ReflectError::RootDescriptorNotBuffer {
                    name: name.to_string(),
                });
            }

            let element_type = match element {
                Some(element) => {
                    // Buffer elements hold uniform data only; any binding
                    // records they would produce are not part of this
                    // block's scope.
                    let mut ignored = Vec::new();
                    Some(lower_type(name, element, None, &mut ignored)?)
                }
                None => None,
            };

            let (reg_index, reg_space) = register_coords(binding);
            bindings.push(if root {
                ResourceRangeBindingInfo::root_descriptor(*dims, reg_index, reg_space)
            } else {
                ResourceRangeBindingInfo::simple(*dims, reg_index, reg_space)
            });

            let mut resource =
                ResourceType::new(*kind, *dims, *structured, *return_kind, *access);
            if let Some(element_type) = element_type {
                resource = resource.with_element_type(element_type);
            }
            Ok(ReflectionType::resource(resource))
        }

        TypeLayout::ConstantBuffer { element } => {
            let (reg_index, reg_space) = register_coords(binding);
            let (element_type, sub_block) = lower_sub_block(
                name,
                element,
                Some(DefaultConstantBufferBinding {
                    reg_index,
                    reg_space,
                    // The enclosing block's range owns the descriptor.
                    descriptor_set_index: INVALID_INDEX,
                    use_root_constants: false,
                }),
            )?;

            bindings.push(ResourceRangeBindingInfo::sub_object(
                RangeFlavor::ConstantBuffer,
                reg_index,
                reg_space,
                sub_block.clone(),
            ));

            let resource = ResourceType::new(
                ResourceKind::ConstantBuffer,
                ResourceDims::Buffer,
                StructuredKind::None,
                ReturnKind::Unknown,
                ShaderAccess::Read,
            )
            .with_element_type(element_type)
            .with_sub_block(sub_block);
            Ok(ReflectionType::resource(resource))
        }

        TypeLayout::ParameterBlock {
            element,
            default_buffer,
        } => {
            let (reg_index, reg_space) = register_coords(binding);
            let (element_type, sub_block) = lower_sub_block(
                name,
                element,
                default_buffer.as_ref().map(default_buffer_binding),
            )?;

            bindings.push(ResourceRangeBindingInfo::sub_object(
                RangeFlavor::ParameterBlock,
                reg_index,
                reg_space,
                sub_block.clone(),
            ));

            let resource = ResourceType::new(
                ResourceKind::ConstantBuffer,
                ResourceDims::Buffer,
                StructuredKind::None,
                ReturnKind::Unknown,
                ShaderAccess::Read,
            )
            .with_element_type(element_type)
            .with_sub_block(sub_block);
            Ok(ReflectionType::resource(resource))
        }

        TypeLayout::Interface { specialization } => {
            let sub_block = match specialization {
                Some(concrete) => {
                    let (_, sub_block) = lower_sub_block(name, concrete, None)?;
                    Some(sub_block)
                }
                None => None,
            };

            let (reg_index, reg_space) = register_coords(binding);
            bindings.push(ResourceRangeBindingInfo {
                flavor: RangeFlavor::Interface,
                dims: ResourceDims::Unknown,
                reg_index,
                reg_space,
                descriptor_set_index: INVALID_INDEX,
                sub_object: sub_block.clone(),
            });

            Ok(ReflectionType::interface(sub_block))
        }
    }
}

/// Lower the element of a sub-object and wrap it in its own finalized
/// parameter block.
fn lower_sub_block(
    name: &str,
    element: &TypeLayout,
    default_constant_buffer: Option<DefaultConstantBufferBinding>,
) -> Result<(Arc<ReflectionType>, Arc<ParameterBlockReflection>), ReflectError> {
    let mut bindings = Vec::new();
    let element_type = lower_type(name, element, None, &mut bindings)?;

    let mut builder = ParameterBlockBuilder::new(element_type.clone());
    for info in bindings {
        builder.add_resource_range(info);
    }
    if element_type.byte_size() > 0 {
        if let Some(binding) = default_constant_buffer {
            builder.set_default_constant_buffer(binding);
        }
    }
    Ok((element_type, Arc::new(builder.finalize()?)))
}

fn default_buffer_binding(layout: &DefaultBufferLayout) -> DefaultConstantBufferBinding {
    DefaultConstantBufferBinding {
        reg_index: layout.binding.index,
        reg_space: layout.binding.space,
        descriptor_set_index: if layout.use_root_constants {
            INVALID_INDEX
        } else {
            0
        },
        use_root_constants: layout.use_root_constants,
    }
}

/// Lower a flat parameter scope (the global scope, or the merged
/// parameters of an entry-point group) into a finalized block.
///
/// With `merge_stages`, a name that repeats across the scope keeps its
/// first occurrence; entry points in one group redeclare shared
/// parameters per stage.
fn lower_scope<'a>(
    scope_name: &str,
    vars: impl Iterator<Item = &'a VariableLayout>,
    default_buffer: Option<&DefaultBufferLayout>,
    merge_stages: bool,
) -> Result<ParameterBlockReflection, ReflectError> {
    let mut builder = StructBuilder::new(scope_name);
    let mut state = BuildState::default();
    let mut bindings = Vec::new();

    for var in vars {
        if merge_stages && builder.member_index(&var.name).is_some() {
            continue;
        }
        let range_start = builder.resource_range_count();
        let ty = lower_type(&var.name, &var.ty, var.binding.as_ref(), &mut bindings)?;
        let member = ReflectionVar::new(
            var.name.clone(),
            ty,
            VarOffset::new(
                UniformOffset::new(var.byte_offset),
                ResourceOffset::with_range(range_start),
            ),
        );
        builder.add_member(Arc::new(member), &mut state)?;
    }

    let element_type = builder.build();
    let mut block = ParameterBlockBuilder::new(element_type.clone());
    for info in bindings {
        block.add_resource_range(info);
    }
    // Loose uniform data in the scope needs an implicit constant buffer.
    if element_type.byte_size() > 0 {
        let binding = default_buffer
            .copied()
            .unwrap_or(DefaultBufferLayout::new(RegisterBinding::new(0, 0)));
        block.set_default_constant_buffer(default_buffer_binding(&binding));
    }
    block.finalize()
}

pub(crate) fn lower_program(layout: &ProgramLayout) -> Result<ProgramReflection, ReflectError> {
    let default_block = Arc::new(lower_scope(
        "$Globals",
        layout.globals.iter(),
        layout.default_buffer.as_ref(),
        false,
    )?);

    // Globals of parameter-block type are reachable by name.
    let mut named_blocks: FastHashMap<ShortString, Arc<ParameterBlockReflection>> =
        FastHashMap::default();
    if let Some(record) = default_block.element_type().as_struct() {
        for member in record.members() {
            if member.ty().resource_ranges().is_empty() {
                continue;
            }
            let range_index = member.offset().range_index();
            let Some(info) = default_block.resource_range_binding_info(range_index) else {
                continue;
            };
            if info.flavor == RangeFlavor::ParameterBlock {
                if let Some(sub_block) = &info.sub_object {
                    named_blocks.insert(ShortString::from(member.name()), sub_block.clone());
                }
            }
        }
    }

    let mut groups: BTreeMap<u32, Vec<&EntryPointLayout>> = BTreeMap::new();
    for entry_point in &layout.entry_points {
        groups.entry(entry_point.group).or_default().push(entry_point);
    }

    let mut entry_point_groups = Vec::new();
    for (group_index, entry_points) in groups {
        let stages = entry_points
            .iter()
            .fold(StageMask::NONE, |mask, entry_point| {
                mask | entry_point.stage.mask()
            });
        let default_buffer = entry_points
            .iter()
            .find_map(|entry_point| entry_point.default_buffer.as_ref());
        let block = lower_scope(
            &entry_points[0].name,
            entry_points
                .iter()
                .flat_map(|entry_point| entry_point.parameters.iter()),
            default_buffer,
            true,
        )?;
        let names = entry_points
            .iter()
            .map(|entry_point| entry_point.name.clone())
            .collect();
        entry_point_groups.push(Arc::new(EntryPointGroupReflection::new(
            block,
            group_index,
            stages,
            names,
        )));
    }

    let mut vertex_attributes = FastHashMap::default();
    let mut vertex_attributes_by_semantic = FastHashMap::default();
    let mut pixel_shader_outputs = FastHashMap::default();
    let mut thread_group_size = [0u32; 3];
    let mut sample_frequency = false;

    for entry_point in &layout.entry_points {
        match entry_point.stage {
            ShaderStage::Vertex => {
                for input in &entry_point.stage_inputs {
                    if input.system_value {
                        continue;
                    }
                    let var = ShaderVariable {
                        bind_location: input.location,
                        semantic: input.semantic.clone(),
                        ty: input.ty,
                    };
                    vertex_attributes.insert(input.name.clone(), var.clone());
                    vertex_attributes_by_semantic.insert(input.semantic.clone(), var);
                }
            }
            ShaderStage::Fragment => {
                sample_frequency |= entry_point.uses_sample_frequency;
                for output in &entry_point.stage_outputs {
                    if output.system_value {
                        continue;
                    }
                    pixel_shader_outputs.insert(
                        output.name.clone(),
                        ShaderVariable {
                            bind_location: output.location,
                            semantic: output.semantic.clone(),
                            ty: output.ty,
                        },
                    );
                }
            }
            ShaderStage::Compute => {
                thread_group_size = entry_point.thread_group_size;
            }
        }
    }

    // Populate the name→type cache; after this pass the layout is no
    // longer needed and lookups never rebuild anything.
    let mut type_cache = FastHashMap::default();
    for named in &layout.types {
        let mut ignored = Vec::new();
        let ty = lower_type(&named.name, &named.ty, None, &mut ignored)?;
        type_cache.insert(named.name.clone(), ty);
    }

    Ok(ProgramReflection {
        default_block,
        named_blocks,
        entry_point_groups,
        vertex_attributes,
        vertex_attributes_by_semantic,
        pixel_shader_outputs,
        thread_group_size,
        sample_frequency,
        type_cache,
        hashed_strings: layout.hashed_strings.clone(),
    })
}
