/// Controls schema loading and validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// When true, object schemas reject properties they do not declare.
    pub strict_mode: bool,
    /// Maximum bytes accepted for a schema document read from disk.
    pub max_schema_file_size: usize,
    /// Additional violations appended to the first one in error messages.
    pub max_reported_violations: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            max_schema_file_size: 256 * 1024,
            max_reported_violations: 3,
        }
    }
}
