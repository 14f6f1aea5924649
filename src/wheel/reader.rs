//! Wheel reader - enumerates archive entries without decompressing them

use std::collections::HashSet;
use std::io::Read;
use std::io::Seek;

use zip::CompressionMethod;
use zip::DateTime;
use zip::ZipArchive;

use crate::error::WheelError;
use crate::record::HashAlgorithm;
use crate::record::RecordHash;

/// Compression methods a wheel may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflated,
}

impl Compression {
    pub fn method(&self) -> CompressionMethod {
        match self {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// One member of the archive, as found in the central directory.
///
/// The compressed payload itself stays in the source archive and is copied
/// verbatim when the entry is written unchanged.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub compression: Compression,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub last_modified: Option<DateTime>,
    pub unix_mode: Option<u32>,
    /// Position in the central directory, which is also the write order
    pub ordinal: usize,
}

impl ArchiveEntry {
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// Reader for Python wheel files
pub struct WheelReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
    source: String,
}

impl<R: Read + Seek> WheelReader<R> {
    /// Open an archive and index its entries. `source` names the archive in
    /// error messages.
    pub fn new(reader: R, source: &str) -> Result<Self, WheelError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| WheelError::corrupt(source, e))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut seen = HashSet::with_capacity(archive.len());
        for ordinal in 0..archive.len() {
            let file = archive
                .by_index_raw(ordinal)
                .map_err(|e| WheelError::corrupt(source, format!("entry {}: {}", ordinal, e)))?;

            let compression = match file.compression() {
                CompressionMethod::Stored => Compression::Stored,
                CompressionMethod::Deflated => Compression::Deflated,
                other => {
                    return Err(WheelError::corrupt(
                        source,
                        format!("{}: unsupported compression method {:?}", file.name(), other),
                    ))
                }
            };

            if !seen.insert(file.name().to_string()) {
                return Err(WheelError::corrupt(
                    source,
                    format!("duplicate entry {}", file.name()),
                ));
            }

            entries.push(ArchiveEntry {
                path: file.name().to_string(),
                compression,
                uncompressed_size: file.size(),
                compressed_size: file.compressed_size(),
                crc32: file.crc32(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                ordinal,
            });
        }

        tracing::debug!(source, entries = entries.len(), "indexed wheel archive");

        Ok(Self {
            archive,
            entries,
            source: source.to_string(),
        })
    }

    /// Entries in central directory order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Name of the archive this reader was opened from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Decompress one entry
    pub fn read(&mut self, ordinal: usize) -> Result<Vec<u8>, WheelError> {
        let source = &self.source;
        let mut file = self
            .archive
            .by_index(ordinal)
            .map_err(|e| WheelError::corrupt(source.as_str(), format!("entry {}: {}", ordinal, e)))?;
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| WheelError::corrupt(source.as_str(), format!("{}: {}", file.name(), e)))?;
        Ok(content)
    }

    /// Hash one entry's decompressed content without buffering it
    pub fn hash_entry(
        &mut self,
        ordinal: usize,
        algorithm: HashAlgorithm,
    ) -> Result<(RecordHash, u64), WheelError> {
        let source = &self.source;
        let file = self
            .archive
            .by_index(ordinal)
            .map_err(|e| WheelError::corrupt(source.as_str(), format!("entry {}: {}", ordinal, e)))?;
        let path = file.name().to_string();
        algorithm
            .hash_reader(file)
            .map_err(|e| WheelError::corrupt(source.as_str(), format!("{}: {}", path, e)))
    }

    /// Get mutable access to the underlying archive
    pub(crate) fn archive_mut(&mut self) -> &mut ZipArchive<R> {
        &mut self.archive
    }

    /// Get the number of files in the archive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
