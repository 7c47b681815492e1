//! SPIR-V shader file loading

use crate::assets::AssetError;
use std::path::Path;

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read a compiled shader and check that it looks like SPIR-V
///
/// The bytes are returned as read; `ash::util::read_spv` handles alignment
/// when the module is created.
pub fn read_shader_file(path: impl AsRef<Path>) -> Result<Vec<u8>, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        AssetError::LoadFailed(format!("Failed to read shader {}: {}", path.display(), e))
    })?;
    check_spirv(&bytes).map_err(|reason| {
        AssetError::InvalidFormat(format!("{}: {}", path.display(), reason))
    })?;

    log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn check_spirv(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(format!("length {} is not a non-zero multiple of 4", bytes.len()));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != SPIRV_MAGIC {
        return Err(format!("bad magic number {:#010x}", magic));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn accepts_spirv_header() {
        let bytes = module_words(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        assert!(check_spirv(&bytes).is_ok());
    }

    #[test]
    fn rejects_wrong_magic_and_odd_length() {
        assert!(check_spirv(&module_words(&[0xdead_beef])).is_err());
        let mut bytes = module_words(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(check_spirv(&bytes).is_err());
        assert!(check_spirv(&[]).is_err());
    }

    #[test]
    fn missing_file_is_load_failure() {
        let err = read_shader_file("no/such/shader.spv").unwrap_err();
        assert!(matches!(err, AssetError::LoadFailed(_)));
    }

    #[test]
    fn reads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("minirender-shader-{}.spv", std::process::id()));
        let bytes = module_words(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0]);
        std::fs::write(&path, &bytes).unwrap();
        let loaded = read_shader_file(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), bytes);
    }
}
