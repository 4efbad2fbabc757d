use crate::infrastructure::error::InfraError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replaces `path` with `contents` through a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), InfraError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(contents)?;
    file.sync_data()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|error| {
        let _ = fs::remove_file(&temp_path);
        InfraError::Io(error)
    })
}

pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(value)?;
    write_atomic(path, format!("{formatted}\n").as_bytes())
}
