use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ValidatorConfig;
use crate::error::{Result, SchemaError};

/// File name of the producer payload schema in every search location.
pub const SCHEMA_FILE_NAME: &str = "producer_payload.schema.json";

/// The producer payload schema compiled into this crate.
pub const BUNDLED_SCHEMA: &str = include_str!("../schemas/producer_payload.schema.json");

/// Somewhere a schema document can be resolved from.
///
/// The validator only needs the raw bytes; where they live (an installed
/// package directory, a source checkout, memory) is the source's concern.
pub trait SchemaSource: Send + Sync {
    /// Resolve the schema document and return its bytes.
    fn load(&self) -> Result<Vec<u8>>;

    /// Short description of where the schema comes from, for diagnostics.
    fn describe(&self) -> String;
}

/// Schema held in memory.
#[derive(Debug, Clone)]
pub struct StaticSchemaSource {
    bytes: Vec<u8>,
    label: String,
}

impl StaticSchemaSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            label: "in-memory".to_string(),
        }
    }

    /// The schema shipped inside the crate.
    pub fn bundled() -> Self {
        Self {
            bytes: BUNDLED_SCHEMA.as_bytes().to_vec(),
            label: "bundled".to_string(),
        }
    }
}

impl SchemaSource for StaticSchemaSource {
    fn load(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Ordered list of candidate schema files; the first readable one wins.
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    candidates: Vec<PathBuf>,
    max_file_size: usize,
}

impl FileSchemaSource {
    /// Search the given paths in order.
    pub fn new(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            candidates: candidates.into_iter().collect(),
            max_file_size: ValidatorConfig::default().max_schema_file_size,
        }
    }

    /// A single explicit schema file.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new([path.into()])
    }

    /// Installed locations next to the running binary, then the crate's
    /// own `schemas/` directory for source checkouts.
    pub fn default_locations() -> Self {
        let mut candidates = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join("schemas").join(SCHEMA_FILE_NAME));
            candidates.push(
                dir.join("..")
                    .join("share")
                    .join("msgdispatch")
                    .join("schemas")
                    .join(SCHEMA_FILE_NAME),
            );
        }
        candidates.push(
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("schemas")
                .join(SCHEMA_FILE_NAME),
        );
        Self::new(candidates)
    }

    /// Override the per-file size cap.
    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Candidate paths in search order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Path of the first candidate that reads successfully.
    pub fn resolve(&self) -> Result<PathBuf> {
        self.load_with_path().map(|(path, _)| path)
    }

    fn load_with_path(&self) -> Result<(PathBuf, Vec<u8>)> {
        if self.candidates.is_empty() {
            return Err(SchemaError::LoadFailed(
                "no schema locations configured".to_string(),
            ));
        }

        let mut attempts = Vec::with_capacity(self.candidates.len());
        for path in &self.candidates {
            match read_schema_file(path, self.max_file_size) {
                Ok(bytes) => {
                    debug!(path = %path.display(), size = bytes.len(), "schema resolved");
                    return Ok((path.clone(), bytes));
                }
                Err(reason) => {
                    if !reason.starts_with("not found") {
                        warn!(path = %path.display(), %reason, "skipping schema candidate");
                    }
                    attempts.push(format!("{}: {reason}", path.display()));
                }
            }
        }

        Err(SchemaError::LoadFailed(format!(
            "no readable schema found ({})",
            attempts.join("; ")
        )))
    }
}

impl SchemaSource for FileSchemaSource {
    fn load(&self) -> Result<Vec<u8>> {
        self.load_with_path().map(|(_, bytes)| bytes)
    }

    fn describe(&self) -> String {
        let paths: Vec<String> = self
            .candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        format!("files [{}]", paths.join(", "))
    }
}

fn read_schema_file(path: &Path, max_bytes: usize) -> std::result::Result<Vec<u8>, String> {
    let path_metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err("not found".to_string())
        }
        Err(err) => return Err(err.to_string()),
    };
    let file_type = path_metadata.file_type();
    if file_type.is_symlink() {
        return Err("refusing to load schema symlink".to_string());
    }
    if !file_type.is_file() {
        return Err("not a regular file".to_string());
    }

    let file = std::fs::File::open(path).map_err(|err| format!("failed opening: {err}"))?;
    let opened_metadata = file.metadata().map_err(|err| err.to_string())?;

    #[cfg(unix)]
    {
        if !same_file_identity(&path_metadata, &opened_metadata) {
            return Err("schema file changed during load".to_string());
        }
    }

    if opened_metadata.len() > max_bytes as u64 {
        return Err(format!(
            "schema file too large ({} bytes, max {max_bytes})",
            opened_metadata.len()
        ));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = Vec::new();
    file.take(read_limit)
        .read_to_end(&mut content)
        .map_err(|err| format!("failed reading: {err}"))?;
    if content.len() > max_bytes {
        return Err("schema file too large while reading".to_string());
    }

    Ok(content)
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
