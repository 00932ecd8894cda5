//! JSON kernel profile: layout constants and struct offset overrides
use crate::core::offsets::KernelOffsets;
use crate::error::AnalysisError;
use crate::translation::MemoryLayout;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Number of `irq_desc` entries in the built-in profile.
pub const DEFAULT_NR_IRQS: u32 = 492;

#[derive(Debug, Deserialize)]
struct FieldEntry {
    offset: u32,
}

#[derive(Debug, Default, Deserialize)]
struct StructEntry {
    #[serde(default)]
    size: Option<u32>,
    #[serde(default)]
    fields: HashMap<String, FieldEntry>,
}

/// On-disk shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    layout: Option<MemoryLayout>,
    #[serde(default)]
    nr_irqs: Option<u32>,
    #[serde(default)]
    user_types: HashMap<String, StructEntry>,
}

/// Everything that varies from one kernel build to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelProfile {
    pub layout: MemoryLayout,
    pub nr_irqs: u32,
    pub offsets: KernelOffsets,
}

impl Default for KernelProfile {
    fn default() -> Self {
        KernelProfile {
            layout: MemoryLayout::default(),
            nr_irqs: DEFAULT_NR_IRQS,
            offsets: KernelOffsets::builtin(),
        }
    }
}

impl KernelProfile {
    /// Load a profile file on top of the built-in values
    pub fn load_from_file(path: &Path) -> Result<Self, AnalysisError> {
        let content = fs::read_to_string(path)?;
        let profile = Self::from_json(&content)?;
        info!("loaded kernel profile from {}", path.display());
        Ok(profile)
    }

    pub fn from_json(content: &str) -> Result<Self, AnalysisError> {
        let file: ProfileFile = serde_json::from_str(content)?;
        let mut profile = KernelProfile::default();
        profile.apply(file);
        Ok(profile)
    }

    fn apply(&mut self, file: ProfileFile) {
        if let Some(layout) = file.layout {
            self.layout = layout;
        }
        if let Some(nr_irqs) = file.nr_irqs {
            self.nr_irqs = nr_irqs;
        }
        for (name, entry) in file.user_types {
            let schema = self.offsets.schema_mut(&name);
            if entry.size.is_some() {
                schema.size = entry.size;
            }
            for (field, value) in entry.fields {
                debug!("profile override {}.{} = 0x{:x}", name, field, value.offset);
                schema.set_offset(&field, value.offset);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_profile_keeps_builtins() {
        let profile = KernelProfile::from_json("{}").unwrap();
        assert_eq!(profile, KernelProfile::default());
        assert_eq!(profile.nr_irqs, 492);
    }

    #[test]
    fn test_partial_layout_keeps_other_constants() {
        let profile = KernelProfile::from_json(r#"{"layout": {"ram_start": 2147483648}}"#).unwrap();
        assert_eq!(profile.layout.ram_start, 0x8000_0000);
        assert_eq!(profile.layout.page_offset, 0xC000_0000);
        assert_eq!(profile.layout.phys_offset, 0x8200_0000);
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut temp_file = NamedTempFile::new()?;
        let sample_content = r#"{
            "nr_irqs": 64,
            "comment": "ignored",
            "user_types": {
                "task_struct": {
                    "fields": {
                        "pid": { "offset": 512, "type": "int" }
                    }
                },
                "irq_desc": { "size": 128 }
            }
        }"#;
        temp_file.write_all(sample_content.as_bytes())?;
        temp_file.flush()?;

        let profile = KernelProfile::load_from_file(temp_file.path())?;
        assert_eq!(profile.nr_irqs, 64);
        assert_eq!(profile.offsets.offset("task_struct", "pid")?, 512);
        assert_eq!(profile.offsets.offset("task_struct", "comm")?, 0x2d4);
        assert_eq!(profile.offsets.size("irq_desc")?, 128);
        Ok(())
    }

    #[test]
    fn test_malformed_profile_is_an_error() {
        assert!(matches!(
            KernelProfile::from_json("{\"nr_irqs\": \"many\"}"),
            Err(AnalysisError::SerdeJsonError(_))
        ));
    }
}
