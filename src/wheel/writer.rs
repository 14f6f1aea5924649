//! Wheel writer - repacks a wheel, copying untouched entries verbatim
//!
//! Repacking happens in two steps. [`plan_repack`] decides the output path and
//! content of every entry, rebuilds RECORD and runs every consistency check.
//! [`write_plan`] then streams the archive. Nothing is written unless
//! planning succeeded.

use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Read;
use std::io::Seek;
use std::io::Write;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::WheelError;
use crate::metadata::Metadata;
use crate::record::Record;
use crate::record::RecordEntry;

use super::locator::DistInfo;
use super::reader::ArchiveEntry;
use super::reader::WheelReader;

/// Signature files that RECORD does not list
const SIGNATURE_FILES: &[&str] = &["RECORD.jws", "RECORD.p7s"];

/// Requested changes for a repack
#[derive(Debug, Default, Clone, Copy)]
pub struct RepackUpdate<'a> {
    /// New METADATA document; only written if it differs from the original
    pub metadata: Option<&'a Metadata>,
    /// New dist-info directory name, when the wheel is renamed or re-versioned
    pub dist_info_prefix: Option<&'a str>,
}

/// What to write for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Copy the compressed bytes from the source archive
    Raw,
    /// Compress and write new content
    Rewrite(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub ordinal: usize,
    pub source_path: String,
    pub path: String,
    pub content: EntryContent,
}

impl PlannedEntry {
    pub fn is_untouched(&self) -> bool {
        self.content == EntryContent::Raw && self.path == self.source_path
    }
}

/// Fully validated description of the output archive
#[derive(Debug, Clone)]
pub struct RepackPlan {
    /// Output entries in ordinal order
    pub entries: Vec<PlannedEntry>,
    /// RECORD as it will appear in the output
    pub record: Record,
}

fn is_signature(dist_info: &DistInfo, path: &str) -> bool {
    SIGNATURE_FILES
        .iter()
        .any(|name| path == format!("{}/{}", dist_info.prefix, name))
}

/// Decide the content of every output entry and rebuild RECORD.
///
/// Unchanged entries keep their original RECORD digest and size; only the
/// rewritten METADATA (and entries the original RECORD forgot) are hashed.
pub fn plan_repack<R: Read + Seek>(
    source: &mut WheelReader<R>,
    dist_info: &DistInfo,
    original_metadata: &Metadata,
    original_record: &Record,
    update: &RepackUpdate<'_>,
) -> Result<RepackPlan, WheelError> {
    let algorithm = original_record.hash_algorithm()?;
    let new_prefix = update
        .dist_info_prefix
        .unwrap_or(dist_info.prefix.as_str());
    let needs_rename = new_prefix != dist_info.prefix;

    let metadata_bytes = update
        .metadata
        .filter(|metadata| *metadata != original_metadata)
        .map(Metadata::to_bytes);

    // Phase 1: output paths
    let entries: Vec<ArchiveEntry> = source.entries().to_vec();
    let mut output_paths: Vec<String> = Vec::with_capacity(entries.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
    for entry in &entries {
        let path = if needs_rename {
            dist_info.relocate(&entry.path, new_prefix)
        } else {
            entry.path.clone()
        };
        if !seen.insert(path.clone()) {
            return Err(WheelError::RepackInconsistent(format!(
                "{} would be written twice",
                path
            )));
        }
        if path != entry.path {
            tracing::debug!(from = %entry.path, to = %path, "relocating entry");
        }
        output_paths.push(path);
    }

    // Phase 2: RECORD rows for every original row, in original order
    let by_source: HashMap<&str, usize> = entries
        .iter()
        .map(|e| (e.path.as_str(), e.ordinal))
        .collect();
    let record_path = &entries[dist_info.record].path;

    let mut records: Vec<RecordEntry> = Vec::with_capacity(entries.len());
    let mut covered: HashSet<usize> = HashSet::with_capacity(entries.len());
    let mut has_self_row = false;

    for row in &original_record.entries {
        let Some(&ordinal) = by_source.get(row.path.as_str()) else {
            return Err(WheelError::RepackInconsistent(format!(
                "RECORD lists {} which is not in the archive",
                row.path
            )));
        };
        if !covered.insert(ordinal) {
            return Err(WheelError::RepackInconsistent(format!(
                "RECORD lists {} more than once",
                row.path
            )));
        }

        let path = output_paths[ordinal].clone();
        if ordinal == dist_info.record {
            has_self_row = true;
            records.push(RecordEntry::new(path, None, None));
        } else if let Some(bytes) = metadata_bytes
            .as_ref()
            .filter(|_| ordinal == dist_info.metadata)
        {
            let hash = algorithm.hash(bytes);
            records.push(RecordEntry::new(path, Some(hash), Some(bytes.len() as u64)));
        } else {
            records.push(RecordEntry::new(path, row.hash.clone(), row.size));
        }
    }

    // Phase 3: entries missing from RECORD
    for entry in &entries {
        if covered.contains(&entry.ordinal)
            || entry.is_dir()
            || entry.ordinal == dist_info.record
            || is_signature(dist_info, &entry.path)
        {
            continue;
        }
        let path = output_paths[entry.ordinal].clone();
        let (hash, size) = match (&metadata_bytes, entry.ordinal == dist_info.metadata) {
            (Some(bytes), true) => (algorithm.hash(bytes), bytes.len() as u64),
            _ => {
                tracing::warn!(path = %entry.path, "entry missing from RECORD, hashing it");
                source.hash_entry(entry.ordinal, algorithm)?
            }
        };
        records.push(RecordEntry::new(path, Some(hash), Some(size)));
    }
    if !has_self_row {
        records.push(RecordEntry::new(
            output_paths[dist_info.record].clone(),
            None,
            None,
        ));
    }

    let record = Record { entries: records };
    check_consistency(&entries, &output_paths, &record, dist_info, new_prefix)?;

    // Phase 4: RECORD is only rewritten when its rows changed
    let record_bytes = if record == *original_record {
        None
    } else {
        Some(record.serialize()?.into_bytes())
    };
    tracing::debug!(
        record = %record_path,
        metadata_changed = metadata_bytes.is_some(),
        record_changed = record_bytes.is_some(),
        "planned repack"
    );

    let mut metadata_bytes = metadata_bytes;
    let mut record_bytes = record_bytes;
    let planned = entries
        .iter()
        .zip(output_paths)
        .map(|(entry, path)| {
            let rewrite = if entry.ordinal == dist_info.metadata {
                metadata_bytes.take()
            } else if entry.ordinal == dist_info.record {
                record_bytes.take()
            } else {
                None
            };
            PlannedEntry {
                ordinal: entry.ordinal,
                source_path: entry.path.clone(),
                path,
                content: rewrite.map_or(EntryContent::Raw, EntryContent::Rewrite),
            }
        })
        .collect();

    Ok(RepackPlan {
        entries: planned,
        record,
    })
}

/// Every RECORD row must name an output entry and every file entry other
/// than RECORD itself and signatures must have a row.
fn check_consistency(
    entries: &[ArchiveEntry],
    output_paths: &[String],
    record: &Record,
    dist_info: &DistInfo,
    new_prefix: &str,
) -> Result<(), WheelError> {
    let outputs: HashSet<&str> = output_paths.iter().map(String::as_str).collect();
    let listed: HashSet<&str> = record.entries.iter().map(|e| e.path.as_str()).collect();

    if let Some(row) = record
        .entries
        .iter()
        .find(|row| !outputs.contains(row.path.as_str()))
    {
        return Err(WheelError::RepackInconsistent(format!(
            "RECORD references {} which is not in the output",
            row.path
        )));
    }

    for (entry, path) in entries.iter().zip(output_paths) {
        if dist_info.contains(&entry.path) && !path.starts_with(&format!("{}/", new_prefix)) {
            return Err(WheelError::RepackInconsistent(format!(
                "{} was not moved to {}",
                entry.path, new_prefix
            )));
        }
        if !entry.is_dir()
            && !is_signature(dist_info, &entry.path)
            && !listed.contains(path.as_str())
        {
            return Err(WheelError::RepackInconsistent(format!(
                "{} is missing from RECORD",
                path
            )));
        }
    }

    Ok(())
}

/// Write a planned repack.
///
/// Raw entries are copied as compressed bytes without decompression.
/// Rewritten entries keep the compression method, timestamp and permissions
/// of the entry they replace.
pub fn write_plan<R: Read + Seek, W: Write + Seek>(
    source: &mut WheelReader<R>,
    plan: &RepackPlan,
    output: W,
) -> Result<W, WheelError> {
    let mut writer = ZipWriter::new(output);

    for planned in &plan.entries {
        let original = &source.entries()[planned.ordinal];
        let compression = original.compression;
        let last_modified = original.last_modified;
        let unix_mode = original.unix_mode;

        match &planned.content {
            EntryContent::Raw => {
                let entry = source.archive_mut().by_index_raw(planned.ordinal)?;
                if planned.path != planned.source_path {
                    writer.raw_copy_file_rename(entry, planned.path.as_str())?;
                } else {
                    writer.raw_copy_file(entry)?;
                }
            }
            EntryContent::Rewrite(content) => {
                tracing::debug!(path = %planned.path, size = content.len(), "rewriting entry");
                let mut options =
                    SimpleFileOptions::default().compression_method(compression.method());
                if let Some(time) = last_modified {
                    options = options.last_modified_time(time);
                }
                if let Some(mode) = unix_mode {
                    options = options.unix_permissions(mode);
                }
                writer.start_file(planned.path.as_str(), options)?;
                writer.write_all(content)?;
            }
        }
    }

    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zip::CompressionMethod;
    use zip::ZipArchive;

    use super::*;
    use crate::filename::WheelIdentity;
    use crate::record::hash_content;
    use crate::wheel::locate;

    const INIT: &[u8] = b"__version__ = '1.0.0'\n";
    const METADATA: &str = "Metadata-Version: 2.1\nName: test-pkg\nVersion: 1.0.0\n";
    const WHEEL: &str =
        "Wheel-Version: 1.0\nGenerator: test\nRoot-Is-Purelib: true\nTag: py3-none-any\n";

    fn create_test_wheel(record: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            let deflated =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file("test_pkg/__init__.py", deflated).unwrap();
            zip.write_all(INIT).unwrap();
            zip.start_file("test_pkg-1.0.0.dist-info/METADATA", stored)
                .unwrap();
            zip.write_all(METADATA.as_bytes()).unwrap();
            zip.start_file("test_pkg-1.0.0.dist-info/WHEEL", deflated)
                .unwrap();
            zip.write_all(WHEEL.as_bytes()).unwrap();
            zip.start_file("test_pkg-1.0.0.dist-info/RECORD", deflated)
                .unwrap();
            zip.write_all(record.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn valid_record() -> String {
        format!(
            "test_pkg/__init__.py,{},{}\ntest_pkg-1.0.0.dist-info/METADATA,{},{}\ntest_pkg-1.0.0.dist-info/WHEEL,{},{}\ntest_pkg-1.0.0.dist-info/RECORD,,\n",
            hash_content(INIT),
            INIT.len(),
            hash_content(METADATA.as_bytes()),
            METADATA.len(),
            hash_content(WHEEL.as_bytes()),
            WHEEL.len()
        )
    }

    struct Fixture {
        reader: WheelReader<Cursor<Vec<u8>>>,
        dist_info: DistInfo,
        metadata: Metadata,
        record: Record,
    }

    fn fixture(record: &str) -> Fixture {
        let mut reader =
            WheelReader::new(Cursor::new(create_test_wheel(record)), "test.whl").unwrap();
        let identity = WheelIdentity::parse("test_pkg-1.0.0-py3-none-any.whl").unwrap();
        let dist_info = locate(reader.entries(), &identity).unwrap();
        let metadata = Metadata::from_bytes(&reader.read(dist_info.metadata).unwrap()).unwrap();
        let record = Record::from_bytes(&reader.read(dist_info.record).unwrap()).unwrap();
        Fixture {
            reader,
            dist_info,
            metadata,
            record,
        }
    }

    fn write(fixture: &mut Fixture, plan: &RepackPlan) -> ZipArchive<Cursor<Vec<u8>>> {
        let output = write_plan(&mut fixture.reader, plan, Cursor::new(Vec::new())).unwrap();
        ZipArchive::new(Cursor::new(output.into_inner())).unwrap()
    }

    #[test]
    fn test_noop_plan_copies_everything() {
        let mut fixture = fixture(&valid_record());
        let plan = plan_repack(
            &mut fixture.reader,
            &fixture.dist_info,
            &fixture.metadata,
            &fixture.record,
            &RepackUpdate {
                metadata: Some(&fixture.metadata.clone()),
                dist_info_prefix: None,
            },
        )
        .unwrap();
        assert!(plan.entries.iter().all(PlannedEntry::is_untouched));
        assert_eq!(plan.record, fixture.record);
    }

    #[test]
    fn test_metadata_change_keeps_compression_and_order() {
        let mut fixture = fixture(&valid_record());
        let mut metadata = fixture.metadata.clone();
        metadata.set("Summary", "Modified summary");

        let plan = plan_repack(
            &mut fixture.reader,
            &fixture.dist_info,
            &fixture.metadata,
            &fixture.record,
            &RepackUpdate {
                metadata: Some(&metadata),
                dist_info_prefix: None,
            },
        )
        .unwrap();

        let rewritten: Vec<&str> = plan
            .entries
            .iter()
            .filter(|e| !e.is_untouched())
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(
            rewritten,
            vec![
                "test_pkg-1.0.0.dist-info/METADATA",
                "test_pkg-1.0.0.dist-info/RECORD"
            ]
        );

        let mut result = write(&mut fixture, &plan);
        let names: Vec<String> = result.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 4);
        let file = result.by_index(1).unwrap();
        assert_eq!(file.name(), "test_pkg-1.0.0.dist-info/METADATA");
        assert_eq!(file.compression(), CompressionMethod::Stored);
        drop(file);

        let mut content = String::new();
        result
            .by_name("test_pkg-1.0.0.dist-info/METADATA")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.ends_with("Summary: Modified summary\n"));

        let row = plan.record.find("test_pkg-1.0.0.dist-info/METADATA").unwrap();
        assert_eq!(row.hash.as_ref().unwrap().to_string(), hash_content(content.as_bytes()));
        assert_eq!(row.size, Some(content.len() as u64));
    }

    #[test]
    fn test_version_change_relocates_dist_info() {
        let mut fixture = fixture(&valid_record());
        let plan = plan_repack(
            &mut fixture.reader,
            &fixture.dist_info,
            &fixture.metadata,
            &fixture.record,
            &RepackUpdate {
                metadata: None,
                dist_info_prefix: Some("test_pkg-1.0.1.dist-info"),
            },
        )
        .unwrap();

        let mut result = write(&mut fixture, &plan);
        let names: Vec<String> = result.file_names().map(str::to_string).collect();
        assert!(names.contains(&"test_pkg/__init__.py".to_string()));
        assert!(names.contains(&"test_pkg-1.0.1.dist-info/METADATA".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("test_pkg-1.0.0.dist-info/")));

        let mut record = String::new();
        result
            .by_name("test_pkg-1.0.1.dist-info/RECORD")
            .unwrap()
            .read_to_string(&mut record)
            .unwrap();
        assert!(record.contains("test_pkg-1.0.1.dist-info/RECORD,,\n"));
        assert!(!record.contains("1.0.0.dist-info"));
    }

    #[test]
    fn test_record_referencing_missing_file_is_rejected() {
        let record = format!("{}test_pkg/gone.py,sha256=abc,3\n", valid_record());
        let mut fixture = fixture(&record);
        let result = plan_repack(
            &mut fixture.reader,
            &fixture.dist_info,
            &fixture.metadata,
            &fixture.record,
            &RepackUpdate::default(),
        );
        assert!(matches!(result, Err(WheelError::RepackInconsistent(_))));
    }

    #[test]
    fn test_entry_missing_from_record_is_hashed() {
        let record = format!(
            "test_pkg-1.0.0.dist-info/METADATA,{},{}\ntest_pkg-1.0.0.dist-info/WHEEL,{},{}\ntest_pkg-1.0.0.dist-info/RECORD,,\n",
            hash_content(METADATA.as_bytes()),
            METADATA.len(),
            hash_content(WHEEL.as_bytes()),
            WHEEL.len()
        );
        let mut fixture = fixture(&record);
        let plan = plan_repack(
            &mut fixture.reader,
            &fixture.dist_info,
            &fixture.metadata,
            &fixture.record,
            &RepackUpdate::default(),
        )
        .unwrap();

        let row = plan.record.find("test_pkg/__init__.py").unwrap();
        assert_eq!(row.hash.as_ref().unwrap().to_string(), hash_content(INIT));
        assert_eq!(row.size, Some(INIT.len() as u64));
        assert!(matches!(
            plan.entries[fixture.dist_info.record].content,
            EntryContent::Rewrite(_)
        ));
    }
}
