/// Fast hash map optimized for the small key sets typical of shader
/// parameter names.
pub type FastHashMap<K, V> =
    halfbrown::SizedHashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>, 32>;

/// A string with small string optimizations up to 23 bytes.
///
/// Shader member and semantic names almost always fit inline.
pub type ShortString = smartstring::SmartString<smartstring::LazyCompact>;
