//! SPIR-V shader bytecode loading.

use crate::error::{AssetError, Result};
use std::fs::File;
use std::path::Path;

/// SPIR-V magic number, first word of every module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read a SPIR-V file into the word buffer Vulkan expects.
///
/// Size, alignment, and the magic number are validated here; full bytecode
/// acceptance is the driver's call at shader-module creation.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let mut file = File::open(path.as_ref())?;
    let words = ash::util::read_spv(&mut file)
        .map_err(|e| AssetError::InvalidSpirv(format!("{}: {e}", path.as_ref().display())))?;
    validate_spirv(&words)?;
    tracing::debug!(
        "Loaded shader {} ({} words)",
        path.as_ref().display(),
        words.len()
    );
    Ok(words)
}

/// Check the word buffer starts with the SPIR-V magic number.
pub fn validate_spirv(words: &[u32]) -> Result<()> {
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(()),
        Some(&other) => Err(AssetError::InvalidSpirv(format!(
            "bad magic number {other:#010x}"
        ))),
        None => Err(AssetError::InvalidSpirv("empty module".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_magic_word() {
        assert!(validate_spirv(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]).is_ok());
    }

    #[test]
    fn rejects_bad_magic() {
        let err = validate_spirv(&[0xdead_beef]).unwrap_err();
        assert!(matches!(err, AssetError::InvalidSpirv(_)));
    }

    #[test]
    fn rejects_empty_module() {
        assert!(validate_spirv(&[]).is_err());
    }
}
