/// Controls how a [`StaticSchema`](crate::StaticSchema) treats elements it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConfig {
    /// When true, undeclared children are accepted and mirrored without constraints.
    pub allow_unknown_children: bool,
    /// Maximum bytes allowed for a descriptor file.
    pub max_descriptor_file_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            allow_unknown_children: false,
            max_descriptor_file_size: 256 * 1024,
        }
    }
}
