pub mod map;

/// The component type of a scalar, vector, or matrix shader variable.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float16,
    Float32,
    Float64,
}

impl ScalarKind {
    /// Size in bytes of one component as stored in a shader buffer.
    ///
    /// Booleans occupy four bytes in buffer memory, following HLSL and
    /// slang buffer layout rules.
    pub const fn byte_size(self) -> u32 {
        match self {
            ScalarKind::Int8 | ScalarKind::Uint8 => 1,
            ScalarKind::Int16 | ScalarKind::Uint16 | ScalarKind::Float16 => 2,
            ScalarKind::Bool
            | ScalarKind::Int32
            | ScalarKind::Uint32
            | ScalarKind::Float32 => 4,
            ScalarKind::Int64 | ScalarKind::Uint64 | ScalarKind::Float64 => 8,
        }
    }
}

/// The type id of a basic (scalar, vector, or matrix) shader variable.
///
/// Vector widths range over 2–4 and matrix dimensions over 2×2–4×4; the
/// layout producer is responsible for staying within those bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BasicTypeId {
    Scalar(ScalarKind),
    /// A vector with the given component count.
    Vector(ScalarKind, u32),
    /// A matrix with the given row and column counts.
    Matrix(ScalarKind, u32, u32),
}

impl BasicTypeId {
    /// The component scalar type.
    pub const fn scalar_kind(self) -> ScalarKind {
        match self {
            BasicTypeId::Scalar(kind)
            | BasicTypeId::Vector(kind, _)
            | BasicTypeId::Matrix(kind, _, _) => kind,
        }
    }

    /// Total number of scalar components.
    pub const fn component_count(self) -> u32 {
        match self {
            BasicTypeId::Scalar(_) => 1,
            BasicTypeId::Vector(_, size) => size,
            BasicTypeId::Matrix(_, rows, cols) => rows * cols,
        }
    }

    pub const fn is_matrix(self) -> bool {
        matches!(self, BasicTypeId::Matrix(..))
    }

    /// The natural packed size in bytes, without any row or array padding.
    pub const fn byte_size(self) -> u32 {
        self.scalar_kind().byte_size() * self.component_count()
    }
}
