//! Wheel validation - verify all hashes in RECORD match actual contents

use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;

use crate::error::ValidationError;
use crate::error::ValidationResult;
use crate::error::WheelError;
use crate::record::HashAlgorithm;
use crate::record::Record;

use super::reader::WheelReader;

/// Validate all file hashes and sizes in a wheel against its RECORD.
///
/// This decompresses every listed entry, so it is O(wheel size).
pub fn validate_wheel<R: Read + Seek>(
    reader: &mut WheelReader<R>,
    record: &Record,
) -> Result<ValidationResult, WheelError> {
    let mut result = ValidationResult::default();

    // Files in the archive that RECORD has not accounted for yet
    let mut unlisted: HashMap<String, usize> = reader
        .entries()
        .iter()
        .filter(|e| !e.is_dir())
        .map(|e| (e.path.clone(), e.ordinal))
        .collect();

    for entry in &record.entries {
        let Some(ordinal) = unlisted.remove(&entry.path) else {
            result.errors.push(ValidationError::MissingFile {
                path: entry.path.clone(),
            });
            continue;
        };

        // RECORD itself has no hash
        let Some(expected) = &entry.hash else {
            continue;
        };

        let algorithm: HashAlgorithm = expected.algorithm.parse()?;
        let (actual, size) = reader.hash_entry(ordinal, algorithm)?;

        if actual != *expected {
            result.errors.push(ValidationError::HashMismatch {
                path: entry.path.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        if let Some(expected_size) = entry.size.filter(|&s| s != size) {
            result.errors.push(ValidationError::SizeMismatch {
                path: entry.path.clone(),
                expected: expected_size,
                actual: size,
            });
        }
    }

    // Signature files are not listed in RECORD
    for path in unlisted.into_keys() {
        if !(path.ends_with("/RECORD") || path.ends_with("/RECORD.jws") || path.ends_with("/RECORD.p7s"))
        {
            result.errors.push(ValidationError::ExtraFile { path });
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;
    use crate::record::RecordEntry;

    fn create_valid_wheel() -> (Vec<u8>, Record) {
        let mut buf = Cursor::new(Vec::new());
        let content = b"test content";

        {
            let mut zip = ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();

            zip.start_file("test.py", options).unwrap();
            zip.write_all(content).unwrap();

            zip.start_file("pkg-1.0.dist-info/RECORD", options).unwrap();
            zip.write_all(b"").unwrap();

            zip.finish().unwrap();
        }

        let record = Record {
            entries: vec![
                RecordEntry::new(
                    "test.py".to_string(),
                    Some(HashAlgorithm::Sha256.hash(content)),
                    Some(content.len() as u64),
                ),
                RecordEntry::new("pkg-1.0.dist-info/RECORD".to_string(), None, None),
            ],
        };

        (buf.into_inner(), record)
    }

    #[test]
    fn test_validate_valid_wheel() {
        let (wheel_data, record) = create_valid_wheel();
        let mut reader = WheelReader::new(Cursor::new(wheel_data), "pkg.whl").unwrap();

        let result = validate_wheel(&mut reader, &record).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_validate_hash_mismatch() {
        let (wheel_data, mut record) = create_valid_wheel();
        record.entries[0].hash.as_mut().unwrap().value = "wronghash".to_string();

        let mut reader = WheelReader::new(Cursor::new(wheel_data), "pkg.whl").unwrap();
        let result = validate_wheel(&mut reader, &record).unwrap();

        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            &result.errors[0],
            ValidationError::HashMismatch { path, .. } if path == "test.py"
        ));
    }

    #[test]
    fn test_validate_size_missing_and_extra() {
        let (wheel_data, mut record) = create_valid_wheel();
        record.entries[0].size = Some(1);
        record.entries[0].path = "other.py".to_string();

        let mut reader = WheelReader::new(Cursor::new(wheel_data), "pkg.whl").unwrap();
        let result = validate_wheel(&mut reader, &record).unwrap();

        assert_eq!(result.errors.len(), 2);
        assert!(matches!(&result.errors[0], ValidationError::MissingFile { path } if path == "other.py"));
        assert!(matches!(&result.errors[1], ValidationError::ExtraFile { path } if path == "test.py"));
    }

    #[test]
    fn test_validate_size_mismatch() {
        let (wheel_data, mut record) = create_valid_wheel();
        record.entries[0].size = Some(1);

        let mut reader = WheelReader::new(Cursor::new(wheel_data), "pkg.whl").unwrap();
        let result = validate_wheel(&mut reader, &record).unwrap();
        assert!(matches!(
            &result.errors[0],
            ValidationError::SizeMismatch { expected: 1, actual: 12, .. }
        ));
    }
}
