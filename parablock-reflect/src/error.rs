use thiserror::Error;

/// Error type for building reflection data from a compiled layout.
///
/// These errors only occur while walking the compiler output during the
/// single build pass. Lookups on finished reflection objects never fail
/// with an error; a missing name degrades to an invalid offset or `None`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReflectError {
    /// A struct layout declared two members with the same name.
    #[error("duplicate member '{name}' in '{owner}'")]
    DuplicateMemberName { owner: String, name: String },

    /// A root-descriptor binding was requested for a resource that is not
    /// a buffer.
    #[error("root descriptor requested for non-buffer resource '{name}'")]
    RootDescriptorNotBuffer { name: String },

    /// The number of binding records added to a parameter block did not
    /// match the element type's resource ranges.
    #[error("binding info count does not mirror element resource ranges")]
    ResourceRangeMismatch { expected: usize, actual: usize },

    /// A parameter block was finalized without an element type.
    #[error("parameter block has no element type")]
    MissingBlockElement,
}
