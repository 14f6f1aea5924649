//! Wheel filename parsing (PEP 427 file name convention)
//!
//! `{distribution}-{version}(-{build tag})?-{python tag}-{abi tag}-{platform tag}.whl`

use std::fmt;
use std::str::FromStr;

use crate::error::WheelError;
use crate::name::dist_info_name;
use crate::name::normalize_dist_info_name;
use crate::name::validate_name;

/// Python/ABI/platform tags of a wheel filename.
///
/// Each field is an ordered list of dot-separated alternatives
/// (`py2.py3` becomes `["py2", "py3"]`); order is kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityTags {
    pub python: Vec<String>,
    pub abi: Vec<String>,
    pub platform: Vec<String>,
}

impl fmt::Display for CompatibilityTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.python.join("."),
            self.abi.join("."),
            self.platform.join(".")
        )
    }
}

/// Identity of a wheel as encoded in its filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelIdentity {
    /// Distribution name as it appears in the filename
    pub distribution: String,
    pub version: String,
    pub build_tag: Option<String>,
    pub tags: CompatibilityTags,
}

impl WheelIdentity {
    /// Parse a wheel filename. A leading directory component is ignored.
    pub fn parse(filename: &str) -> Result<Self, WheelError> {
        let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        let stem = base
            .strip_suffix(".whl")
            .ok_or_else(|| WheelError::invalid_name(base, "missing .whl extension"))?;

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(WheelError::invalid_name(base, "empty filename component"));
        }

        let (build_tag, tag_parts) = match parts.len() {
            5 => (None, &parts[2..]),
            6 => {
                if !parts[2].starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(WheelError::invalid_name(
                        base,
                        "build tag must start with a digit",
                    ));
                }
                (Some(parts[2].to_string()), &parts[3..])
            }
            n => {
                return Err(WheelError::invalid_name(
                    base,
                    format!("expected 5 or 6 dash-separated components, got {}", n),
                ))
            }
        };

        let split_tag = |tag: &str| -> Result<Vec<String>, WheelError> {
            let alternatives: Vec<String> = tag.split('.').map(str::to_string).collect();
            if alternatives.iter().any(String::is_empty) {
                return Err(WheelError::invalid_name(
                    base,
                    format!("empty alternative in tag '{}'", tag),
                ));
            }
            Ok(alternatives)
        };

        Ok(Self {
            distribution: parts[0].to_string(),
            version: parts[1].to_string(),
            build_tag,
            tags: CompatibilityTags {
                python: split_tag(tag_parts[0])?,
                abi: split_tag(tag_parts[1])?,
                platform: split_tag(tag_parts[2])?,
            },
        })
    }

    /// Name used for comparisons: lowercase, separators collapsed to `_`
    pub fn normalized_name(&self) -> String {
        normalize_dist_info_name(&self.distribution)
    }

    /// Expected dist-info directory name, e.g. `foo_bar-1.0.dist-info`
    pub fn dist_info_name(&self) -> String {
        dist_info_name(&self.distribution, &self.version)
    }

    /// Whether both file names describe the same wheel, comparing the
    /// distribution in normalized form and every other segment exactly.
    pub fn is_same_wheel(&self, other: &WheelIdentity) -> bool {
        self.normalized_name() == other.normalized_name()
            && self.version == other.version
            && self.build_tag == other.build_tag
            && self.tags == other.tags
    }

    /// Copy of this identity with only the distribution segment replaced.
    pub fn with_name(&self, new_name: &str) -> Result<Self, WheelError> {
        validate_name(new_name)?;
        Ok(Self {
            distribution: normalize_dist_info_name(new_name),
            ..self.clone()
        })
    }

    /// Copy of this identity with only the version segment replaced.
    pub fn with_version(&self, new_version: &str) -> Result<Self, WheelError> {
        if new_version.is_empty()
            || new_version
                .chars()
                .any(|c| c == '-' || c == '/' || c.is_whitespace())
        {
            return Err(WheelError::invalid_name(
                new_version,
                "version cannot be used in a wheel filename",
            ));
        }
        Ok(Self {
            version: new_version.to_string(),
            ..self.clone()
        })
    }
}

impl FromStr for WheelIdentity {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WheelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version)?;
        if let Some(ref build) = self.build_tag {
            write!(f, "-{}", build)?;
        }
        write!(f, "-{}.whl", self.tags)
    }
}
