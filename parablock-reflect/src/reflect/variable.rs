use std::sync::Arc;

use parablock_common::map::ShortString;

use crate::reflect::offset::VarOffset;
use crate::reflect::types::ReflectionType;

/// One reflected shader variable: a struct field or a block parameter.
#[derive(Clone, Debug)]
pub struct ReflectionVar {
    name: ShortString,
    ty: Arc<ReflectionType>,
    offset: VarOffset,
}

impl ReflectionVar {
    /// `offset` is relative to the variable's parent type or block.
    pub fn new(name: impl Into<ShortString>, ty: Arc<ReflectionType>, offset: VarOffset) -> Self {
        ReflectionVar {
            name: name.into(),
            ty,
            offset,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ReflectionType {
        &self.ty
    }

    /// The variable's type as a shareable handle.
    pub fn ty_handle(&self) -> &Arc<ReflectionType> {
        &self.ty
    }

    pub fn offset(&self) -> VarOffset {
        self.offset
    }

    pub fn byte_offset(&self) -> u32 {
        self.offset.byte_offset()
    }
}

impl PartialEq for ReflectionVar {
    /// Structural equality: name, type shape, and offset.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.offset == other.offset && *self.ty == *other.ty
    }
}

impl Eq for ReflectionVar {}
