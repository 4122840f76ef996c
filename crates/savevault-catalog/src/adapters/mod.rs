#[cfg(target_os = "windows")]
pub mod windows;

use std::path::Path;

/// Version-resource strings read from an executable.
#[derive(Debug, Clone, Default)]
pub struct ExeMetadata {
    pub product_name: Option<String>,
    pub file_description: Option<String>,
}

/// Reads executable metadata. Absence of data (unreadable file, timeout,
/// unsupported host) is `None`, never an error.
pub trait MetadataAdapter {
    fn exe_metadata(&self, exe_path: &Path) -> Option<ExeMetadata>;
}

/// Reads string values under a registry key, querying both the 32- and
/// 64-bit views for HKLM keys. Unsupported hosts return nothing.
pub trait RegistryAdapter {
    fn read_string_values(&self, key_path: &str) -> Vec<String>;
}

pub struct Adapters {
    pub metadata: Box<dyn MetadataAdapter>,
    pub registry: Box<dyn RegistryAdapter>,
}

/// No-op adapters for hosts without the Windows shell facilities; the
/// detector still runs and terminates with the appropriate status.
pub struct NoopMetadataAdapter;

impl MetadataAdapter for NoopMetadataAdapter {
    fn exe_metadata(&self, _exe_path: &Path) -> Option<ExeMetadata> {
        None
    }
}

pub struct NoopRegistryAdapter;

impl RegistryAdapter for NoopRegistryAdapter {
    fn read_string_values(&self, _key_path: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Get the platform-appropriate adapter pair.
pub fn get_adapters() -> Adapters {
    #[cfg(target_os = "windows")]
    {
        Adapters {
            metadata: Box::new(windows::WindowsMetadataAdapter),
            registry: Box::new(windows::WindowsRegistryAdapter),
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        Adapters {
            metadata: Box::new(NoopMetadataAdapter),
            registry: Box::new(NoopRegistryAdapter),
        }
    }
}
