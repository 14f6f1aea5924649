//! Types for Python wheel WHEEL file (PEP 427)

use crate::error::WheelInfoError;
use crate::filename::CompatibilityTags;
use crate::metadata::Metadata;

/// Wheel tag representing a compatibility tag (python-abi-platform)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTag {
    pub python: String,   // e.g., "cp311", "py3"
    pub abi: String,      // e.g., "cp311", "none"
    pub platform: String, // e.g., "linux_x86_64", "manylinux_2_28_x86_64"
}

impl WheelTag {
    /// Parse a tag from string format "python-abi-platform"
    pub fn parse(s: &str) -> Result<Self, WheelInfoError> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(WheelInfoError::InvalidTag(format!(
                "Expected 3 parts (python-abi-platform), got {}: '{}'",
                parts.len(),
                s
            )));
        }
        Ok(Self {
            python: parts[0].to_string(),
            abi: parts[1].to_string(),
            platform: parts[2].to_string(),
        })
    }

    /// Whether the filename's compressed tag set expands to this tag
    pub fn is_covered_by(&self, tags: &CompatibilityTags) -> bool {
        tags.python.contains(&self.python)
            && tags.abi.contains(&self.abi)
            && tags.platform.contains(&self.platform)
    }
}

/// WHEEL file information per PEP 427.
///
/// Parsed with the same header codec as METADATA; the WHEEL file itself is
/// never rewritten, so only the typed view is kept.
#[derive(Debug, Clone, Default)]
pub struct WheelInfo {
    pub wheel_version: String,
    pub generator: Option<String>,
    pub root_is_purelib: bool,
    pub tags: Vec<WheelTag>,
    pub build: Option<String>,
}

impl WheelInfo {
    /// Parse WHEEL file content
    pub fn parse(content: &str) -> Result<Self, WheelInfoError> {
        let headers = Metadata::parse_headers(content)?;

        let wheel_version = headers
            .get("Wheel-Version")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WheelInfoError::MissingField("Wheel-Version".to_string()))?
            .to_string();

        let tags = headers
            .get_all("Tag")
            .into_iter()
            .map(WheelTag::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if tags.is_empty() {
            return Err(WheelInfoError::MissingField("Tag".to_string()));
        }

        Ok(Self {
            wheel_version,
            generator: headers.get("Generator").map(str::to_string),
            root_is_purelib: headers
                .get("Root-Is-Purelib")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            tags,
            build: headers.get("Build").map(str::to_string),
        })
    }

    /// Get the primary platform tag (first tag's platform)
    pub fn platform(&self) -> Option<&str> {
        self.tags.first().map(|t| t.platform.as_str())
    }
}
