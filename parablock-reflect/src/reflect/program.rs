//! Whole-program reflection: the default parameter block, named blocks,
//! entry-point groups, and stage IO registries.

use std::ops::Deref;
use std::sync::Arc;

use log::debug;
use parablock_common::map::{FastHashMap, ShortString};
use parablock_common::BasicTypeId;

use crate::error::ReflectError;
use crate::layout::{HashedString, ProgramLayout, StageMask};
use crate::reflect::block::ParameterBlockReflection;
use crate::reflect::lower;
use crate::reflect::types::ReflectionType;
use crate::reflect::variable::ReflectionVar;

/// A shader input/output variable: a vertex attribute or a pixel output.
#[derive(Clone, Debug)]
pub struct ShaderVariable {
    /// The bind location of the variable.
    pub bind_location: u32,
    /// The semantic name of the variable.
    pub semantic: ShortString,
    pub ty: BasicTypeId,
}

/// Reflection for the entry points of one group: a parameter block
/// covering the parameters of every stage that shares the group's
/// binding scope.
///
/// Dereferences to the underlying [`ParameterBlockReflection`].
#[derive(Clone, Debug)]
pub struct EntryPointGroupReflection {
    block: ParameterBlockReflection,
    group_index: u32,
    stages: StageMask,
    entry_points: Vec<ShortString>,
}

impl EntryPointGroupReflection {
    pub(crate) fn new(
        block: ParameterBlockReflection,
        group_index: u32,
        stages: StageMask,
        entry_points: Vec<ShortString>,
    ) -> Self {
        EntryPointGroupReflection {
            block,
            group_index,
            stages,
            entry_points,
        }
    }

    pub fn group_index(&self) -> u32 {
        self.group_index
    }

    /// The stages sharing this group's binding scope.
    pub fn stages(&self) -> StageMask {
        self.stages
    }

    pub fn entry_point_names(&self) -> &[ShortString] {
        &self.entry_points
    }
}

impl Deref for EntryPointGroupReflection {
    type Target = ParameterBlockReflection;

    fn deref(&self) -> &Self::Target {
        &self.block
    }
}

/// Reflection for an entire compiled program.
///
/// Built once from a [`ProgramLayout`] and immutable afterwards; safe to
/// share across threads. Every lookup reports a miss with `None` or an
/// invalid offset plus a logged diagnostic; a missing parameter is a
/// routine condition, not a fault.
#[derive(Debug)]
pub struct ProgramReflection {
    pub(crate) default_block: Arc<ParameterBlockReflection>,
    pub(crate) named_blocks: FastHashMap<ShortString, Arc<ParameterBlockReflection>>,
    pub(crate) entry_point_groups: Vec<Arc<EntryPointGroupReflection>>,
    pub(crate) vertex_attributes: FastHashMap<ShortString, ShaderVariable>,
    pub(crate) vertex_attributes_by_semantic: FastHashMap<ShortString, ShaderVariable>,
    pub(crate) pixel_shader_outputs: FastHashMap<ShortString, ShaderVariable>,
    pub(crate) thread_group_size: [u32; 3],
    pub(crate) sample_frequency: bool,
    pub(crate) type_cache: FastHashMap<ShortString, Arc<ReflectionType>>,
    pub(crate) hashed_strings: Vec<HashedString>,
}

impl ProgramReflection {
    /// Build reflection for a compiled program.
    ///
    /// This is the single build pass: the layout is walked top to bottom,
    /// every block is finalized, and the named-type cache is populated.
    /// The layout is not retained.
    pub fn reflect(layout: &ProgramLayout) -> Result<Self, ReflectError> {
        lower::lower_program(layout)
    }

    /// The default (unnamed) parameter block holding global parameters.
    pub fn default_parameter_block(&self) -> &Arc<ParameterBlockReflection> {
        &self.default_block
    }

    /// A named parameter block, or the default block for an empty name.
    pub fn parameter_block(&self, name: &str) -> Option<&Arc<ParameterBlockReflection>> {
        if name.is_empty() {
            return Some(&self.default_block);
        }
        let block = self.named_blocks.get(name);
        if block.is_none() {
            debug!("program has no parameter block '{name}'");
        }
        block
    }

    /// A resource or parameter of the default block.
    pub fn resource(&self, name: &str) -> Option<&Arc<ReflectionVar>> {
        self.default_block.find_member(name)
    }

    pub fn find_member(&self, name: &str) -> Option<&Arc<ReflectionVar>> {
        self.default_block.find_member(name)
    }

    /// Search for a vertex attribute by variable name.
    pub fn vertex_attribute(&self, name: &str) -> Option<&ShaderVariable> {
        let var = self.vertex_attributes.get(name);
        if var.is_none() {
            debug!("program has no vertex attribute '{name}'");
        }
        var
    }

    /// Search for a vertex attribute by its semantic name.
    pub fn vertex_attribute_by_semantic(&self, semantic: &str) -> Option<&ShaderVariable> {
        let var = self.vertex_attributes_by_semantic.get(semantic);
        if var.is_none() {
            debug!("program has no vertex attribute with semantic '{semantic}'");
        }
        var
    }

    /// A pixel shader output variable.
    pub fn pixel_shader_output(&self, name: &str) -> Option<&ShaderVariable> {
        let var = self.pixel_shader_outputs.get(name);
        if var.is_none() {
            debug!("program has no pixel shader output '{name}'");
        }
        var
    }

    /// Look up a named type exported by the program.
    pub fn find_type(&self, name: &str) -> Option<&Arc<ReflectionType>> {
        let ty = self.type_cache.get(name);
        if ty.is_none() {
            debug!("program exports no type '{name}'");
        }
        ty
    }

    /// The required thread-group size. Meaningful for compute programs
    /// only; the caller is responsible for checking the program's stages.
    pub fn thread_group_size(&self) -> [u32; 3] {
        self.thread_group_size
    }

    /// Whether the pixel shader must run at sample frequency.
    pub fn is_sample_frequency(&self) -> bool {
        self.sample_frequency
    }

    pub fn entry_point_groups(&self) -> &[Arc<EntryPointGroupReflection>] {
        &self.entry_point_groups
    }

    pub fn entry_point_group(&self, index: usize) -> Option<&Arc<EntryPointGroupReflection>> {
        self.entry_point_groups.get(index)
    }

    /// Hashed strings recorded in the compiled program, for diagnostics.
    pub fn hashed_strings(&self) -> &[HashedString] {
        &self.hashed_strings
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parablock_common::{BasicTypeId, ScalarKind};

    use crate::error::ReflectError;
    use crate::layout::{
        DefaultBufferLayout, EntryPointLayout, HashedString, IoVariableLayout, NamedTypeLayout,
        ProgramLayout, RegisterBinding, ShaderStage, StageMask, TypeLayout, VariableLayout,
    };
    use crate::reflect::block::{RangeFlavor, INVALID_INDEX};
    use crate::reflect::program::ProgramReflection;
    use crate::reflect::types::{
        DescriptorKind, ResourceDims, ResourceKind, ReturnKind, ShaderAccess, StructuredKind,
    };

    fn float() -> TypeLayout {
        TypeLayout::Basic {
            id: BasicTypeId::Scalar(ScalarKind::Float32),
            row_major: false,
            byte_size: 4,
        }
    }

    fn float4() -> TypeLayout {
        TypeLayout::Basic {
            id: BasicTypeId::Vector(ScalarKind::Float32, 4),
            row_major: false,
            byte_size: 16,
        }
    }

    fn float4x4() -> TypeLayout {
        TypeLayout::Basic {
            id: BasicTypeId::Matrix(ScalarKind::Float32, 4, 4),
            row_major: false,
            byte_size: 64,
        }
    }

    fn texture2d() -> TypeLayout {
        TypeLayout::Resource {
            kind: ResourceKind::Texture,
            dims: ResourceDims::Texture2D,
            structured: StructuredKind::None,
            return_kind: ReturnKind::Float,
            access: ShaderAccess::Read,
            element: None,
        }
    }

    fn per_draw_buffer() -> VariableLayout {
        let element = TypeLayout::Struct {
            name: "PerDraw".into(),
            byte_size: 64,
            fields: vec![VariableLayout::new("world", float4x4(), 0)],
        };
        VariableLayout::new(
            "perDraw",
            TypeLayout::ConstantBuffer {
                element: Box::new(element),
            },
            0,
        )
        .with_binding(RegisterBinding::new(2, 0))
    }

    fn program_layout() -> ProgramLayout {
        let frame = TypeLayout::Struct {
            name: "Frame".into(),
            byte_size: 80,
            fields: vec![
                VariableLayout::new("mvp", float4x4(), 0),
                VariableLayout::new("tint", float4(), 64),
            ],
        };

        let material = TypeLayout::Struct {
            name: "Material".into(),
            byte_size: 16,
            fields: vec![
                VariableLayout::new("params", float4(), 0),
                VariableLayout::new("bump", texture2d(), 0)
                    .with_binding(RegisterBinding::new(0, 1)),
            ],
        };

        let mut vs = EntryPointLayout::new("vs_main", ShaderStage::Vertex, 0);
        vs.parameters.push(per_draw_buffer());
        vs.stage_inputs = vec![
            IoVariableLayout {
                name: "position".into(),
                semantic: "POSITION".into(),
                location: 0,
                ty: BasicTypeId::Vector(ScalarKind::Float32, 3),
                system_value: false,
            },
            IoVariableLayout {
                name: "normal".into(),
                semantic: "NORMAL".into(),
                location: 1,
                ty: BasicTypeId::Vector(ScalarKind::Float32, 3),
                system_value: false,
            },
            IoVariableLayout {
                name: "vertex_id".into(),
                semantic: "SV_VertexID".into(),
                location: 2,
                ty: BasicTypeId::Scalar(ScalarKind::Uint32),
                system_value: true,
            },
        ];

        let mut fs = EntryPointLayout::new("fs_main", ShaderStage::Fragment, 0);
        fs.parameters.push(per_draw_buffer());
        fs.uses_sample_frequency = true;
        fs.stage_outputs = vec![IoVariableLayout {
            name: "color".into(),
            semantic: "SV_Target".into(),
            location: 0,
            ty: BasicTypeId::Vector(ScalarKind::Float32, 4),
            system_value: false,
        }];

        let mut cs = EntryPointLayout::new("cs_main", ShaderStage::Compute, 1);
        cs.thread_group_size = [8, 8, 1];

        ProgramLayout {
            globals: vec![
                VariableLayout::new(
                    "frame",
                    TypeLayout::ConstantBuffer {
                        element: Box::new(frame),
                    },
                    0,
                )
                .with_binding(RegisterBinding::new(0, 0)),
                VariableLayout::new("albedo", texture2d(), 0)
                    .with_binding(RegisterBinding::new(0, 0)),
                VariableLayout::new(
                    "readback",
                    TypeLayout::Resource {
                        kind: ResourceKind::StructuredBuffer,
                        dims: ResourceDims::Buffer,
                        structured: StructuredKind::Default,
                        return_kind: ReturnKind::Unknown,
                        access: ShaderAccess::ReadWrite,
                        element: Some(Box::new(float4())),
                    },
                    0,
                )
                .with_binding(RegisterBinding::root(0, 0)),
                VariableLayout::new(
                    "material",
                    TypeLayout::ParameterBlock {
                        element: Box::new(material),
                        default_buffer: Some(DefaultBufferLayout::new(RegisterBinding::new(
                            0, 1,
                        ))),
                    },
                    0,
                )
                .with_binding(RegisterBinding::new(0, 1)),
                VariableLayout::new("exposure", float(), 0),
            ],
            default_buffer: Some(DefaultBufferLayout::new(RegisterBinding::new(1, 0))),
            entry_points: vec![vs, fs, cs],
            types: vec![NamedTypeLayout {
                name: "Light".into(),
                ty: TypeLayout::Struct {
                    name: "Light".into(),
                    byte_size: 32,
                    fields: vec![
                        VariableLayout::new("position", float4(), 0),
                        VariableLayout::new("intensity", float4(), 16),
                    ],
                },
            }],
            hashed_strings: vec![HashedString {
                hash: 0x9e3779b9,
                string: "debug_marker".to_string(),
            }],
        }
    }

    #[test]
    pub fn default_block_ranges_and_flavors() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();
        let block = program.default_parameter_block();
        let element = block.element_type();

        assert_eq!(block.resource_range_count(), 4);
        let flavors: Vec<RangeFlavor> = block
            .resource_range_binding_infos()
            .iter()
            .map(|info| info.flavor)
            .collect();
        assert_eq!(
            flavors,
            vec![
                RangeFlavor::ConstantBuffer,
                RangeFlavor::Simple,
                RangeFlavor::RootDescriptor,
                RangeFlavor::ParameterBlock,
            ]
        );
        assert_eq!(block.root_descriptor_range_indices(), &[2]);
        assert_eq!(block.parameter_block_sub_object_range_indices(), &[3]);

        assert_eq!(
            element.resource_ranges()[2].kind,
            DescriptorKind::StructuredBufferUav
        );

        // The block's ranges mirror the element type's 1:1.
        for index in 0..block.resource_range_count() {
            assert_eq!(
                block.resource_range(index).unwrap(),
                element.resource_range(index).unwrap()
            );
        }
    }

    #[test]
    pub fn default_constant_buffer_for_loose_uniforms() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();
        let block = program.default_parameter_block();

        // "exposure" is the only loose uniform in the global scope.
        assert!(block.has_default_constant_buffer());
        let binding = block.default_constant_buffer_binding().unwrap();
        assert_eq!(binding.reg_index, 1);
        assert_eq!(binding.reg_space, 0);
        assert!(!binding.use_root_constants);
        assert_eq!(block.default_constant_buffer_byte_size(), 16);

        let offset = block.element_type().zero_offset().field("exposure");
        assert_eq!(offset.byte_offset(), 0);
    }

    #[test]
    pub fn constant_buffer_sub_object() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();
        let frame = program.resource("frame").unwrap();
        let resource = frame.ty().as_resource().unwrap();

        assert_eq!(resource.kind(), ResourceKind::ConstantBuffer);
        assert_eq!(resource.element_byte_size(), 80);

        let sub = resource.sub_block().unwrap();
        assert!(sub.has_default_constant_buffer());
        let binding = sub.default_constant_buffer_binding().unwrap();
        assert_eq!(binding.reg_index, 0);
        assert_eq!(binding.descriptor_set_index, INVALID_INDEX);

        // Member offsets inside the buffer are relative to its element.
        assert_eq!(sub.resource_binding("tint").byte_offset(), 64);
        assert!(!sub.resource_binding("missing").is_valid());
    }

    #[test]
    pub fn named_parameter_block() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();

        let material = program.parameter_block("material").unwrap();
        assert!(material.has_default_constant_buffer());
        assert_eq!(material.default_constant_buffer_byte_size(), 16);

        let bump = material.resource_binding("bump");
        assert!(bump.is_valid());
        assert_eq!(bump.offset().range_index(), 0);
        let info = material.resource_range_binding_info(0).unwrap();
        assert_eq!(info.flavor, RangeFlavor::Simple);
        assert_eq!(info.reg_space, 1);

        // The empty name resolves to the default block.
        assert!(program.parameter_block("").is_some());
    }

    #[test]
    pub fn lookup_misses_are_not_fatal() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();

        assert!(program.parameter_block("doesNotExist").is_none());
        assert!(program.resource("doesNotExist").is_none());
        assert!(program.find_member("doesNotExist").is_none());
        assert!(program.vertex_attribute("doesNotExist").is_none());
        assert!(program.pixel_shader_output("doesNotExist").is_none());
        assert!(program.find_type("DoesNotExist").is_none());
    }

    #[test]
    pub fn entry_point_groups_share_binding_scope() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();
        let groups = program.entry_point_groups();
        assert_eq!(groups.len(), 2);

        let raster = &groups[0];
        assert_eq!(raster.group_index(), 0);
        assert_eq!(raster.stages(), StageMask::VERTEX | StageMask::FRAGMENT);
        assert_eq!(raster.entry_point_names().len(), 2);

        // "perDraw" is declared by both stages but reflected once.
        let record = raster.element_type().as_struct().unwrap();
        assert_eq!(record.member_count(), 1);
        assert_eq!(raster.resource_range_count(), 1);
        assert_eq!(
            raster.resource_range_binding_info(0).unwrap().flavor,
            RangeFlavor::ConstantBuffer
        );

        let compute = &groups[1];
        assert_eq!(compute.group_index(), 1);
        assert_eq!(compute.stages(), StageMask::COMPUTE);
        assert_eq!(compute.resource_range_count(), 0);
    }

    #[test]
    pub fn stage_io_registries() {
        let program = ProgramReflection::reflect(&program_layout()).unwrap();

        let position = program.vertex_attribute("position").unwrap();
        assert_eq!(position.bind_location, 0);
        assert_eq!(position.semantic, "POSITION");

        let by_semantic = program.vertex_attribute_by_semantic("NORMAL").unwrap();
        assert_eq!(by_semantic.bind_location, 1);

        // System values are pipeline-provided, not application-bound.
        assert!(program.vertex_attribute("vertex_id").is_none());

        let color = program.pixel_shader_output("color").unwrap();
        assert_eq!(color.bind_location, 0);

        assert!(program.is_sample_frequency());
        assert_eq!(program.thread_group_size(), [8, 8, 1]);
    }

    #[test]
    pub fn named_types_deduplicate_structurally() {
        let layout = program_layout();
        let first = ProgramReflection::reflect(&layout).unwrap();
        let second = ProgramReflection::reflect(&layout).unwrap();

        let lhs = first.find_type("Light").unwrap();
        let rhs = second.find_type("Light").unwrap();
        assert!(!Arc::ptr_eq(lhs, rhs));
        assert_eq!(**lhs, **rhs);

        assert_eq!(lhs.as_struct().unwrap().name(), "Light");
        assert_eq!(lhs.byte_size(), 32);

        assert_eq!(first.hashed_strings().len(), 1);
        assert_eq!(first.hashed_strings()[0].string, "debug_marker");
    }

    #[test]
    pub fn root_descriptor_requires_a_buffer() {
        let mut layout = program_layout();
        layout.globals.push(
            VariableLayout::new("bad", texture2d(), 0).with_binding(RegisterBinding::root(1, 0)),
        );

        let result = ProgramReflection::reflect(&layout);
        assert!(matches!(
            result,
            Err(ReflectError::RootDescriptorNotBuffer { .. })
        ));
    }

    #[test]
    pub fn duplicate_globals_are_rejected() {
        let mut layout = program_layout();
        layout
            .globals
            .push(VariableLayout::new("exposure", float(), 16));

        let result = ProgramReflection::reflect(&layout);
        assert!(matches!(
            result,
            Err(ReflectError::DuplicateMemberName { .. })
        ));
    }
}
