//! SPIR-V shader modules

use super::{VulkanError, VulkanResult};
use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Load shader from a SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let words = read_spirv(path)?;
        let module = Self::from_words(device, &words)?;
        log::debug!("Loaded shader {}", path.display());
        Ok(module)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info
    pub fn create_stage_info(&self, stage: vk::ShaderStageFlags, entry_point: &CStr) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Read and validate SPIR-V words from a file
pub fn read_spirv(path: &Path) -> VulkanResult<Vec<u32>> {
    let shader_err = |reason: String| VulkanError::ShaderLoad {
        path: path.display().to_string(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| shader_err(e.to_string()))?;
    parse_spirv(&bytes).map_err(shader_err)
}

/// Turn raw bytes into SPIR-V words, checking size and magic number
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>, String> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(_) => Err("not SPIR-V (bad magic number)".to_string()),
        None => Err("file is empty".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_header() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_rejects_non_spirv() {
        assert!(parse_spirv(b"#version 450\n\0\0\0").is_err());
        assert!(parse_spirv(&[]).is_err());
        // not a whole number of words
        assert!(parse_spirv(&[0x03, 0x02, 0x23]).is_err());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_spirv(Path::new("no/such/shader.spv")).unwrap_err();
        match err {
            VulkanError::ShaderLoad { path, .. } => assert!(path.contains("shader.spv")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
