//! Platform context
//!
//! Describes the machine the tracker runs on using non-identifying values
//! only: operating system, kernel release, vendor and model as reported by
//! DMI, falling back to the CPU architecture. Never reads the hostname or
//! the user name.

use omnitel_core::domain::{schemas, ContextFragment, EnrichmentError, Event};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::context::ContextGenerator;

/// Non-identifying description of the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os_type: String,
    pub os_version: String,
    pub manufacturer: String,
    pub model: String,
    pub arch: String,
}

impl PlatformInfo {
    /// Collect platform information from the current system.
    pub fn collect() -> Self {
        let arch = std::env::consts::ARCH.to_string();
        Self {
            os_type: std::env::consts::OS.to_string(),
            os_version: read_kernel_release().unwrap_or_else(|| "unknown".to_string()),
            manufacturer: read_dmi("sys_vendor").unwrap_or_else(|| "unknown".to_string()),
            model: read_dmi("product_name").unwrap_or_else(|| arch.clone()),
            arch,
        }
    }

    /// The mobile/platform context fragment for this host.
    pub fn to_fragment(&self) -> ContextFragment {
        let mut data = Map::new();
        data.insert("osType".into(), json!(self.os_type));
        data.insert("osVersion".into(), json!(self.os_version));
        data.insert("deviceManufacturer".into(), json!(self.manufacturer));
        data.insert("deviceModel".into(), json!(self.model));
        ContextFragment::builtin(schemas::PLATFORM, data)
    }
}

fn read_kernel_release() -> Option<String> {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
}

fn read_dmi(field: &str) -> Option<String> {
    std::fs::read_to_string(format!("/sys/class/dmi/id/{field}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Generator attaching the platform context, collected once.
#[derive(Debug, Clone)]
pub struct PlatformContext {
    fragment: ContextFragment,
}

impl PlatformContext {
    pub fn new(info: &PlatformInfo) -> Self {
        Self {
            fragment: info.to_fragment(),
        }
    }

    pub fn collect() -> Self {
        Self::new(&PlatformInfo::collect())
    }
}

impl ContextGenerator for PlatformContext {
    fn generate(&self, _event: &Event) -> Result<Vec<ContextFragment>, EnrichmentError> {
        Ok(vec![self.fragment.clone()])
    }
}
