//! Field edits and renames applied to parsed metadata
//!
//! Everything here works on owned copies: an edit either produces a complete
//! new (identity, metadata) pair or an error, and the inputs are never
//! modified. That keeps a rename from ever updating the filename without the
//! `Name` field, or the other way around.

use crate::error::MetadataError;
use crate::error::WheelError;
use crate::filename::WheelIdentity;
use crate::metadata::Metadata;
use crate::name::canonicalize_name;
use crate::name::normalize_dist_info_name;
use crate::name::validate_name;

/// Core metadata fields that may be edited. Structural fields such as
/// `Metadata-Version` or `Dynamic` are deliberately absent.
pub const EDITABLE_FIELDS: &[&str] = &[
    "Name",
    "Version",
    "Summary",
    "Description",
    "Description-Content-Type",
    "Keywords",
    "Home-page",
    "Download-URL",
    "Author",
    "Author-email",
    "Maintainer",
    "Maintainer-email",
    "License",
    "License-Expression",
    "License-File",
    "Classifier",
    "Platform",
    "Supported-Platform",
    "Requires-Dist",
    "Requires-Python",
    "Requires-External",
    "Project-URL",
    "Provides-Extra",
    "Provides-Dist",
    "Obsoletes-Dist",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Replace every occurrence with a single value
    Set(String),
    /// Add a value after the existing occurrences
    Add(String),
    /// Remove every occurrence
    Delete,
    /// Replace or remove the message body, which holds the long description
    Body(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub field: String,
    pub op: EditOp,
}

impl FieldEdit {
    pub fn set(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: EditOp::Set(value.into()),
        }
    }

    pub fn add(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: EditOp::Add(value.into()),
        }
    }

    pub fn delete(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: EditOp::Delete,
        }
    }

    /// Edit the body rather than any `Description` header
    pub fn body(body: Option<String>) -> Self {
        Self {
            field: "Description".to_string(),
            op: EditOp::Body(body),
        }
    }
}

/// A batch of field edits, or a rename of the distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSet {
    Fields(Vec<FieldEdit>),
    Rename(String),
}

/// Whitelist spelling of `field`, or `UnknownField`
pub fn editable_field(field: &str) -> Result<&'static str, WheelError> {
    EDITABLE_FIELDS
        .iter()
        .copied()
        .find(|f| f.eq_ignore_ascii_case(field))
        .ok_or_else(|| WheelError::UnknownField(field.to_string()))
}

/// Apply field edits to a copy of `metadata`.
///
/// All field names are checked against the whitelist before anything is
/// applied.
pub fn apply_edits(metadata: &Metadata, edits: &[FieldEdit]) -> Result<Metadata, WheelError> {
    let fields = edits
        .iter()
        .map(|edit| editable_field(&edit.field))
        .collect::<Result<Vec<_>, _>>()?;

    let mut metadata = metadata.clone();
    for (field, edit) in fields.into_iter().zip(edits) {
        match (field, &edit.op) {
            ("Name" | "Version", EditOp::Delete) => {
                return Err(MetadataError::RequiredField(field.to_string()).into());
            }
            ("Name", EditOp::Set(value) | EditOp::Add(value)) => {
                validate_name(value)?;
                metadata.set(field, canonicalize_name(value));
            }
            ("Version", EditOp::Set(value) | EditOp::Add(value)) => {
                if value.trim().is_empty() {
                    return Err(MetadataError::MissingField(field.to_string()).into());
                }
                metadata.set(field, value.trim());
            }
            ("Description", EditOp::Body(body)) => metadata.set_body(body.clone()),
            (field, EditOp::Body(_)) => {
                return Err(WheelError::UnknownField(format!("{} (body)", field)));
            }
            (field, EditOp::Set(value)) => metadata.set(field, fold_value(value)),
            (field, EditOp::Add(value)) => metadata.add(field, fold_value(value)),
            (field, EditOp::Delete) => {
                metadata.remove(field);
            }
        }
    }

    Ok(metadata)
}

/// Rename the distribution, returning the new identity and metadata together
pub fn rename(
    identity: &WheelIdentity,
    metadata: &Metadata,
    new_name: &str,
) -> Result<(WheelIdentity, Metadata), WheelError> {
    let identity = identity.with_name(new_name)?;
    let mut metadata = metadata.clone();
    metadata.set("Name", canonicalize_name(new_name));
    Ok((identity, metadata))
}

/// Apply an [`EditSet`], keeping the filename identity in step with the
/// `Name` and `Version` fields.
pub fn apply(
    identity: &WheelIdentity,
    metadata: &Metadata,
    edit_set: &EditSet,
) -> Result<(WheelIdentity, Metadata), WheelError> {
    let edits = match edit_set {
        EditSet::Rename(new_name) => return rename(identity, metadata, new_name),
        EditSet::Fields(edits) => edits,
    };

    let edited = apply_edits(metadata, edits)?;
    let touches = |name: &str| edits.iter().any(|e| e.field.eq_ignore_ascii_case(name));

    let mut new_identity = identity.clone();
    if touches("Name") && normalize_dist_info_name(edited.name()) != identity.normalized_name() {
        new_identity = new_identity.with_name(edited.name())?;
    }
    if touches("Version") && edited.version() != identity.version {
        new_identity = new_identity.with_version(edited.version())?;
    }

    Ok((new_identity, edited))
}

/// Compute the edits that turn `current` into `edited`.
///
/// Used when METADATA is extracted to a file, edited by hand and applied
/// back. A difference in any non-editable field is rejected.
pub fn diff(current: &Metadata, edited: &Metadata) -> Result<Vec<FieldEdit>, WheelError> {
    let mut names: Vec<&str> = Vec::new();
    for (name, _) in current.fields().into_iter().chain(edited.fields()) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name);
        }
    }

    let mut edits = Vec::new();
    for name in names {
        let before = current.get_all(name);
        let after = edited.get_all(name);
        if before == after {
            continue;
        }

        let field = editable_field(name)?;
        match after.split_first() {
            None => edits.push(FieldEdit::delete(field)),
            Some((first, rest)) => {
                edits.push(FieldEdit::set(field, *first));
                edits.extend(rest.iter().map(|v| FieldEdit::add(field, *v)));
            }
        }
    }

    if current.body() != edited.body() {
        edits.push(FieldEdit::body(edited.body().map(str::to_string)));
    }

    Ok(edits)
}

/// Indent continuation lines so a multi-line value stays one header.
///
/// The first line is trimmed the way the decoder trims it.
fn fold_value(value: &str) -> String {
    let mut lines = value.trim_end_matches(['\n', '\r']).lines();
    let mut folded = lines.next().unwrap_or_default().trim().to_string();
    for line in lines {
        folded.push('\n');
        if !line.starts_with([' ', '\t']) {
            folded.push_str("        ");
        }
        folded.push_str(line);
    }
    folded
}
