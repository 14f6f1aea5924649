//! Locating the `.dist-info` directory of a wheel

use crate::error::WheelError;
use crate::filename::WheelIdentity;
use crate::name::normalize_dist_info_name;

use super::reader::ArchiveEntry;

/// The wheel's `.dist-info` directory and its key members
#[derive(Debug, Clone)]
pub struct DistInfo {
    /// Directory name without trailing slash, e.g. `foo-1.0.0.dist-info`
    pub prefix: String,
    /// Ordinal of `METADATA`
    pub metadata: usize,
    /// Ordinal of `WHEEL`
    pub wheel: usize,
    /// Ordinal of `RECORD`
    pub record: usize,
}

impl DistInfo {
    /// Whether `path` lies inside this directory
    pub fn contains(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Move `path` to `new_prefix` if it lies inside this directory.
    ///
    /// The part of the path after the directory is kept unchanged.
    pub fn relocate(&self, path: &str, new_prefix: &str) -> String {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) if rest.starts_with('/') => format!("{}{}", new_prefix, rest),
            _ => path.to_string(),
        }
    }
}

/// Top-level `*.dist-info` directories, in order of first appearance
fn dist_info_dirs(entries: &[ArchiveEntry]) -> Vec<&str> {
    let mut dirs: Vec<&str> = Vec::new();
    for entry in entries {
        if let Some((top, _)) = entry.path.split_once('/') {
            if top.ends_with(".dist-info") && !dirs.contains(&top) {
                dirs.push(top);
            }
        }
    }
    dirs
}

fn matches_identity(dir: &str, identity: &WheelIdentity) -> bool {
    let Some(stem) = dir.strip_suffix(".dist-info") else {
        return false;
    };
    let Some((name, version)) = stem.rsplit_once('-') else {
        return false;
    };
    normalize_dist_info_name(name) == identity.normalized_name()
        && version.eq_ignore_ascii_case(&identity.version)
}

/// Find the dist-info directory belonging to `identity`
pub fn locate(entries: &[ArchiveEntry], identity: &WheelIdentity) -> Result<DistInfo, WheelError> {
    let candidates: Vec<&str> = dist_info_dirs(entries)
        .into_iter()
        .filter(|dir| matches_identity(dir, identity))
        .collect();

    let prefix = match candidates.as_slice() {
        [] => {
            return Err(WheelError::DistInfoNotFound {
                expected: format!("{}/", identity.dist_info_name()),
            })
        }
        [single] => single.to_string(),
        _ => {
            return Err(WheelError::AmbiguousDistInfo {
                candidates: candidates.iter().map(|c| format!("{}/", c)).collect(),
            })
        }
    };

    let member = |name: &str| -> Result<usize, WheelError> {
        let path = format!("{}/{}", prefix, name);
        entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.ordinal)
            .ok_or(WheelError::MissingDistInfoFile { path })
    };
    let metadata = member("METADATA")?;
    let wheel = member("WHEEL")?;
    let record = member("RECORD")?;

    tracing::debug!(dist_info = %prefix, "located dist-info directory");

    Ok(DistInfo {
        prefix,
        metadata,
        wheel,
        record,
    })
}
