//! wheelsmith: rename Python wheels and edit their metadata
//!
//! Only the dist-info files that actually change are rewritten. Every other
//! entry is copied as raw compressed bytes, so code and data files come out
//! bit-identical, in the same order, with the same compression method.
//! RECORD is rebuilt to match, reusing the original digests of untouched
//! entries.
//!
//! # Example
//!
//! ```no_run
//! use wheelsmith::WheelEditor;
//!
//! let mut editor = WheelEditor::open("foo-1.0.0-py3-none-any.whl").unwrap();
//! editor.set_summary("A better summary").unwrap();
//! editor.rename("bar").unwrap();
//!
//! // Writes bar-1.0.0-py3-none-any.whl next to the original
//! let output = editor.save_to_dir(".").unwrap();
//! ```

pub mod edit;
pub mod error;
pub mod filename;
pub mod metadata;
pub mod name;
pub mod record;
pub mod wheel;
pub mod wheel_info;

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use rayon::prelude::*;

pub use edit::EditOp;
pub use edit::EditSet;
pub use edit::FieldEdit;
pub use error::MetadataError;
pub use error::RecordError;
pub use error::ValidationError;
pub use error::ValidationResult;
pub use error::WheelError;
pub use error::WheelInfoError;
pub use filename::CompatibilityTags;
pub use filename::WheelIdentity;
pub use metadata::Metadata;
pub use name::canonicalize_name;
pub use name::dist_info_name;
pub use name::normalize_dist_info_name;
pub use record::HashAlgorithm;
pub use record::Record;
pub use record::RecordEntry;
pub use record::RecordHash;
pub use record::hash_content;
pub use wheel::ArchiveEntry;
pub use wheel::DistInfo;
pub use wheel::WheelReader;
pub use wheel::validate_wheel;
pub use wheel_info::WheelInfo;

/// A wheel read and located, ready for planning a repack
struct LoadedWheel<R: Read + Seek> {
    reader: WheelReader<R>,
    identity: WheelIdentity,
    dist_info: DistInfo,
    metadata: Metadata,
    record: Record,
    wheel_info: WheelInfo,
}

impl<R: Read + Seek> LoadedWheel<R> {
    fn load(source: R, filename: &str) -> Result<Self, WheelError> {
        let identity = WheelIdentity::parse(filename)?;
        let mut reader = WheelReader::new(source, filename)?;
        let dist_info = wheel::locate(reader.entries(), &identity)?;

        let metadata = Metadata::from_bytes(&reader.read(dist_info.metadata)?)?;
        let record = Record::from_bytes(&reader.read(dist_info.record)?)?;
        let wheel_bytes = reader.read(dist_info.wheel)?;
        let wheel_info = WheelInfo::parse(crate::metadata::decode_utf8(&wheel_bytes)?)?;

        if !wheel_info.tags.iter().all(|t| t.is_covered_by(&identity.tags)) {
            tracing::warn!(
                wheel = filename,
                "WHEEL tags do not match the filename's compatibility tags"
            );
        }

        Ok(Self {
            reader,
            identity,
            dist_info,
            metadata,
            record,
            wheel_info,
        })
    }

    /// Plan and write the repack for an edited identity and metadata
    fn write_edited<W: Write + Seek>(
        &mut self,
        identity: &WheelIdentity,
        metadata: &Metadata,
        output: W,
    ) -> Result<W, WheelError> {
        // The original prefix is kept as-is unless the name or version
        // changed, so a no-op edit never renames the directory.
        let new_prefix = (*identity != self.identity).then(|| identity.dist_info_name());
        let update = wheel::RepackUpdate {
            metadata: Some(metadata),
            dist_info_prefix: new_prefix.as_deref(),
        };

        let plan = wheel::plan_repack(
            &mut self.reader,
            &self.dist_info,
            &self.metadata,
            &self.record,
            &update,
        )?;
        wheel::write_plan(&mut self.reader, &plan, output)
    }
}

/// Repack a wheel held in any seekable source.
///
/// `filename` is the wheel's file name, from which its identity is parsed.
/// Returns the identity of the output, whose `to_string()` is the output
/// file name. Every check runs before the first byte is written to `output`.
pub fn repack<R: Read + Seek, W: Write + Seek>(
    source: R,
    filename: &str,
    edit_set: &EditSet,
    output: W,
) -> Result<WheelIdentity, WheelError> {
    let mut wheel = LoadedWheel::load(source, filename)?;
    let (identity, metadata) = edit::apply(&wheel.identity, &wheel.metadata, edit_set)?;
    wheel.write_edited(&identity, &metadata, output)?;
    Ok(identity)
}

fn file_name_of(path: &Path) -> Result<&str, WheelError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WheelError::invalid_name(path.display().to_string(), "not a file name"))
}

/// High-level API for editing Python wheel files
///
/// Edits are applied to in-memory copies of the identity and METADATA; the
/// wheel on disk is only read again when saving.
pub struct WheelEditor {
    path: PathBuf,
    original_identity: WheelIdentity,
    identity: WheelIdentity,
    original_metadata: Metadata,
    metadata: Metadata,
    record: Record,
    wheel_info: WheelInfo,
    dist_info: DistInfo,
}

impl WheelEditor {
    /// Open a wheel file for editing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WheelError> {
        let path = path.as_ref().to_path_buf();
        let filename = file_name_of(&path)?.to_string();
        let file = File::open(&path)?;
        let wheel = LoadedWheel::load(BufReader::new(file), &filename)?;

        Ok(Self {
            path,
            original_identity: wheel.identity.clone(),
            identity: wheel.identity,
            original_metadata: wheel.metadata.clone(),
            metadata: wheel.metadata,
            record: wheel.record,
            wheel_info: wheel.wheel_info,
            dist_info: wheel.dist_info,
        })
    }

    /// Get the path to the wheel file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current identity, reflecting any rename or version edit
    pub fn identity(&self) -> &WheelIdentity {
        &self.identity
    }

    /// File name the edited wheel will be saved under
    pub fn output_filename(&self) -> String {
        self.identity.to_string()
    }

    /// The dist-info directory as found in the original wheel
    pub fn dist_info(&self) -> &DistInfo {
        &self.dist_info
    }

    /// Parsed WHEEL file
    pub fn wheel_info(&self) -> &WheelInfo {
        &self.wheel_info
    }

    /// RECORD of the original wheel
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Get access to the full metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Whether any edit is pending
    pub fn is_modified(&self) -> bool {
        self.identity != self.original_identity || self.metadata != self.original_metadata
    }

    /// Apply a set of edits or a rename. On error nothing changes.
    pub fn apply(&mut self, edit_set: &EditSet) -> Result<(), WheelError> {
        let (identity, metadata) = edit::apply(&self.identity, &self.metadata, edit_set)?;
        self.identity = identity;
        self.metadata = metadata;
        Ok(())
    }

    /// Rename the distribution (filename, dist-info directory and `Name`)
    pub fn rename(&mut self, new_name: &str) -> Result<(), WheelError> {
        self.apply(&EditSet::Rename(new_name.to_string()))
    }

    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> Result<(), WheelError> {
        self.apply(&EditSet::Fields(vec![FieldEdit::set(field, value)]))
    }

    pub fn add_field(&mut self, field: &str, value: impl Into<String>) -> Result<(), WheelError> {
        self.apply(&EditSet::Fields(vec![FieldEdit::add(field, value)]))
    }

    pub fn remove_field(&mut self, field: &str) -> Result<(), WheelError> {
        self.apply(&EditSet::Fields(vec![FieldEdit::delete(field)]))
    }

    /// Replace all values of a multi-valued field
    pub fn set_field_values(&mut self, field: &str, values: Vec<String>) -> Result<(), WheelError> {
        let mut edits = vec![FieldEdit::delete(field)];
        edits.extend(values.into_iter().map(|v| FieldEdit::add(field, v)));
        self.apply(&EditSet::Fields(edits))
    }

    /// Get the package name
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Get the package version
    pub fn version(&self) -> &str {
        self.metadata.version()
    }

    /// Set the package version; the dist-info directory and filename follow
    pub fn set_version(&mut self, version: impl Into<String>) -> Result<(), WheelError> {
        self.set_field("Version", version)
    }

    pub fn summary(&self) -> Option<&str> {
        self.metadata.get("Summary")
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) -> Result<(), WheelError> {
        self.set_field("Summary", summary)
    }

    pub fn author(&self) -> Option<&str> {
        self.metadata.get("Author")
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> Result<(), WheelError> {
        self.set_field("Author", author)
    }

    pub fn license(&self) -> Option<&str> {
        self.metadata.get("License")
    }

    pub fn set_license(&mut self, license: impl Into<String>) -> Result<(), WheelError> {
        self.set_field("License", license)
    }

    pub fn classifiers(&self) -> Vec<&str> {
        self.metadata.get_all("Classifier")
    }

    pub fn set_classifiers(&mut self, classifiers: Vec<String>) -> Result<(), WheelError> {
        self.set_field_values("Classifier", classifiers)
    }

    pub fn add_classifier(&mut self, classifier: impl Into<String>) -> Result<(), WheelError> {
        self.add_field("Classifier", classifier)
    }

    /// Get the package dependencies
    pub fn requires_dist(&self) -> Vec<&str> {
        self.metadata.get_all("Requires-Dist")
    }

    pub fn set_requires_dist(&mut self, deps: Vec<String>) -> Result<(), WheelError> {
        self.set_field_values("Requires-Dist", deps)
    }

    /// Long description, stored as the METADATA body
    pub fn description(&self) -> Option<&str> {
        self.metadata.body()
    }

    pub fn set_description(&mut self, description: Option<String>) -> Result<(), WheelError> {
        self.apply(&EditSet::Fields(vec![FieldEdit::body(description)]))
    }

    /// Write the current METADATA to a text file for manual editing
    pub fn extract_metadata(&self, path: impl AsRef<Path>) -> Result<(), WheelError> {
        std::fs::write(path, self.metadata.serialize())?;
        Ok(())
    }

    /// Read an edited METADATA text file and apply the differences.
    ///
    /// Changes to fields that may not be edited are rejected as a whole.
    pub fn apply_metadata_file(&mut self, path: impl AsRef<Path>) -> Result<(), WheelError> {
        let content = std::fs::read(path)?;
        let edited = Metadata::from_bytes(&content)?;
        let edits = edit::diff(&self.metadata, &edited)?;
        if edits.is_empty() {
            return Ok(());
        }
        tracing::debug!(edits = edits.len(), "applying metadata file");
        self.apply(&EditSet::Fields(edits))
    }

    /// Validate all file hashes in the wheel
    ///
    /// This reads and hashes every file in the original wheel.
    /// Note: This is NOT constant-time - it's O(wheel_size).
    pub fn validate(&self) -> Result<ValidationResult, WheelError> {
        let file = File::open(&self.path)?;
        let mut reader = WheelReader::new(BufReader::new(file), file_name_of(&self.path)?)?;
        validate_wheel(&mut reader, &self.record)
    }

    /// Save the edited wheel to `output_path`.
    ///
    /// The file name of `output_path` must describe the edited wheel (see
    /// [`output_filename`](Self::output_filename)), so saving in place only
    /// works while name and version are unchanged. The wheel is written to a
    /// temporary file in the destination directory and renamed into place
    /// once complete. On error the destination is left untouched.
    pub fn save(&self, output_path: impl AsRef<Path>) -> Result<(), WheelError> {
        let output_path = output_path.as_ref();
        let output_name = file_name_of(output_path)?;
        if !WheelIdentity::parse(output_name)?.is_same_wheel(&self.identity) {
            return Err(WheelError::invalid_name(
                output_name,
                format!("does not match the edited wheel {}", self.identity),
            ));
        }

        let source_file = File::open(&self.path)?;
        let permissions = source_file.metadata()?.permissions();
        let mut wheel =
            LoadedWheel::load(BufReader::new(source_file), file_name_of(&self.path)?)?;
        if wheel.metadata != self.original_metadata || wheel.record != self.record {
            return Err(WheelError::RepackInconsistent(format!(
                "{} changed on disk since it was opened",
                self.path.display()
            )));
        }

        let dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        wheel.write_edited(&self.identity, &self.metadata, temp.as_file_mut())?;
        drop(wheel);

        temp.as_file().sync_all()?;
        std::fs::set_permissions(temp.path(), permissions)?;
        temp.persist(output_path).map_err(|e| e.error)?;

        tracing::info!(
            source = %self.path.display(),
            output = %output_path.display(),
            "wrote wheel"
        );
        Ok(())
    }

    /// Save under the derived file name inside `dir`, returning the path
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, WheelError> {
        let output_path = dir.as_ref().join(self.output_filename());
        self.save(&output_path)?;
        Ok(output_path)
    }
}

/// Edit many wheels in parallel, one task per wheel.
///
/// Each wheel is opened, passed to `edit`, and saved into `out_dir` under its
/// derived file name. Results are returned in input order; a failure affects
/// only its own wheel.
pub fn edit_wheels<P, F>(
    paths: &[P],
    out_dir: impl AsRef<Path>,
    edit: F,
) -> Vec<(PathBuf, Result<PathBuf, WheelError>)>
where
    P: AsRef<Path> + Sync,
    F: Fn(&mut WheelEditor) -> Result<(), WheelError> + Sync,
{
    let out_dir = out_dir.as_ref();
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let result = WheelEditor::open(path).and_then(|mut editor| {
                edit(&mut editor)?;
                editor.save_to_dir(out_dir)
            });
            if let Err(ref e) = result {
                tracing::warn!(wheel = %path.display(), error = %e, "failed to edit wheel");
            }
            (path.to_path_buf(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn create_test_wheel(dir: &Path) -> PathBuf {
        let wheel_path = dir.join("test_pkg-1.0.0-py3-none-any.whl");
        let file = File::create(&wheel_path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        // Package file
        let init_content = b"__version__ = '1.0.0'\n";
        zip.start_file("test_pkg/__init__.py", options).unwrap();
        zip.write_all(init_content).unwrap();
        let init_hash = hash_content(init_content);

        // METADATA
        let metadata =
            "Metadata-Version: 2.1\nName: test-pkg\nVersion: 1.0.0\nSummary: Test package\n";
        zip.start_file("test_pkg-1.0.0.dist-info/METADATA", options)
            .unwrap();
        zip.write_all(metadata.as_bytes()).unwrap();
        let metadata_hash = hash_content(metadata.as_bytes());

        // WHEEL
        let wheel_info =
            "Wheel-Version: 1.0\nGenerator: test\nRoot-Is-Purelib: true\nTag: py3-none-any\n";
        zip.start_file("test_pkg-1.0.0.dist-info/WHEEL", options)
            .unwrap();
        zip.write_all(wheel_info.as_bytes()).unwrap();
        let wheel_hash = hash_content(wheel_info.as_bytes());

        // RECORD
        let record = format!(
            "test_pkg/__init__.py,{},{}\ntest_pkg-1.0.0.dist-info/METADATA,{},{}\ntest_pkg-1.0.0.dist-info/WHEEL,{},{}\ntest_pkg-1.0.0.dist-info/RECORD,,\n",
            init_hash,
            init_content.len(),
            metadata_hash,
            metadata.len(),
            wheel_hash,
            wheel_info.len()
        );
        zip.start_file("test_pkg-1.0.0.dist-info/RECORD", options)
            .unwrap();
        zip.write_all(record.as_bytes()).unwrap();

        zip.finish().unwrap();
        wheel_path
    }

    #[test]
    fn test_open_wheel() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let editor = WheelEditor::open(&wheel_path).unwrap();
        assert_eq!(editor.name(), "test-pkg");
        assert_eq!(editor.version(), "1.0.0");
        assert_eq!(editor.summary(), Some("Test package"));
        assert_eq!(editor.dist_info().prefix, "test_pkg-1.0.0.dist-info");
        assert_eq!(editor.wheel_info().tags.len(), 1);
        assert!(!editor.is_modified());
    }

    #[test]
    fn test_modify_and_save() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let mut editor = WheelEditor::open(&wheel_path).unwrap();
        editor.set_version("1.0.1").unwrap();
        editor.set_summary("Updated summary").unwrap();
        assert_eq!(editor.output_filename(), "test_pkg-1.0.1-py3-none-any.whl");
        let output_path = editor.save_to_dir(temp_dir.path()).unwrap();

        // Verify the output
        let new_editor = WheelEditor::open(&output_path).unwrap();
        assert_eq!(new_editor.version(), "1.0.1");
        assert_eq!(new_editor.summary(), Some("Updated summary"));
        assert_eq!(new_editor.dist_info().prefix, "test_pkg-1.0.1.dist-info");
        assert!(new_editor.validate().unwrap().is_valid());
    }

    #[test]
    fn test_save_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let mut editor = WheelEditor::open(&wheel_path).unwrap();
        editor.set_author("Someone").unwrap();
        editor.save(&wheel_path).unwrap();

        let reopened = WheelEditor::open(&wheel_path).unwrap();
        assert_eq!(reopened.author(), Some("Someone"));
        assert!(reopened.validate().unwrap().is_valid());
    }

    #[test]
    fn test_save_in_place_after_rename_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());
        let original_bytes = std::fs::read(&wheel_path).unwrap();

        let mut editor = WheelEditor::open(&wheel_path).unwrap();
        editor.rename("bar").unwrap();
        assert!(matches!(
            editor.save(editor.path()),
            Err(WheelError::InvalidName { .. })
        ));
        assert_eq!(std::fs::read(&wheel_path).unwrap(), original_bytes);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);

        let output = editor.save_to_dir(temp_dir.path()).unwrap();
        assert_eq!(WheelEditor::open(&output).unwrap().name(), "bar");
    }

    #[test]
    fn test_description_edits_body() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let mut editor = WheelEditor::open(&wheel_path).unwrap();
        assert_eq!(editor.description(), None);
        editor
            .set_description(Some("# Test\n\nLonger text.\n".to_string()))
            .unwrap();
        let output_dir = TempDir::new().unwrap();
        let output = editor.save_to_dir(output_dir.path()).unwrap();

        let reopened = WheelEditor::open(&output).unwrap();
        assert_eq!(reopened.description(), Some("# Test\n\nLonger text.\n"));
        assert_eq!(reopened.metadata().get("Description"), None);
    }

    #[test]
    fn test_rejected_edit_leaves_editor_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let mut editor = WheelEditor::open(&wheel_path).unwrap();
        let result = editor.apply(&EditSet::Fields(vec![
            FieldEdit::set("Summary", "changed"),
            FieldEdit::set("Metadata-Version", "3.0"),
        ]));
        assert!(matches!(result, Err(WheelError::UnknownField(_))));
        assert_eq!(editor.summary(), Some("Test package"));
        assert!(!editor.is_modified());
    }

    #[test]
    fn test_validate() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());

        let editor = WheelEditor::open(&wheel_path).unwrap();
        let result = editor.validate().unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_repack_in_memory() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());
        let bytes = std::fs::read(&wheel_path).unwrap();

        let output = Cursor::new(Vec::new());
        let identity = repack(
            Cursor::new(bytes),
            "test_pkg-1.0.0-py3-none-any.whl",
            &EditSet::Rename("renamed".to_string()),
            output,
        )
        .unwrap();
        assert_eq!(identity.to_string(), "renamed-1.0.0-py3-none-any.whl");
    }

    #[test]
    fn test_open_rejects_bad_filename() {
        let temp_dir = TempDir::new().unwrap();
        let wheel_path = create_test_wheel(temp_dir.path());
        let bad_path = temp_dir.path().join("not-a-wheel.zip");
        std::fs::copy(&wheel_path, &bad_path).unwrap();

        assert!(matches!(
            WheelEditor::open(&bad_path),
            Err(WheelError::InvalidName { .. })
        ));
    }
}
