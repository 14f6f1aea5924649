//! RECORD file types and hashing for Python wheels

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::Digest;
use sha2::Sha256;
use sha2::Sha384;
use sha2::Sha512;

use crate::error::RecordError;

/// Digest algorithms accepted in RECORD files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Hash `content` in RECORD form: `<alg>=<base64url_no_padding>`
    pub fn hash(&self, content: &[u8]) -> RecordHash {
        let digest = match self {
            HashAlgorithm::Sha256 => Sha256::digest(content).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(content).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(content).to_vec(),
        };
        self.record_hash(&digest)
    }

    /// Hash a reader's contents, returning the digest and the byte count
    pub fn hash_reader<R: Read>(&self, reader: R) -> std::io::Result<(RecordHash, u64)> {
        let (digest, size) = match self {
            HashAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader)?,
            HashAlgorithm::Sha384 => digest_reader::<Sha384, R>(reader)?,
            HashAlgorithm::Sha512 => digest_reader::<Sha512, R>(reader)?,
        };
        Ok((self.record_hash(&digest), size))
    }

    fn record_hash(&self, digest: &[u8]) -> RecordHash {
        RecordHash {
            algorithm: self.as_str().to_string(),
            value: URL_SAFE_NO_PAD.encode(digest),
        }
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<(Vec<u8>, u64)> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok((hasher.finalize().to_vec(), size))
}

impl FromStr for HashAlgorithm {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(RecordError::UnsupportedHash(other.to_string())),
        }
    }
}

/// Digest column of a RECORD row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHash {
    pub algorithm: String,
    pub value: String,
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.value)
    }
}

/// Single entry in RECORD file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub path: String,
    pub hash: Option<RecordHash>,
    pub size: Option<u64>,
}

impl RecordEntry {
    pub fn new(path: String, hash: Option<RecordHash>, size: Option<u64>) -> Self {
        Self { path, hash, size }
    }
}

/// Complete RECORD file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub entries: Vec<RecordEntry>,
}

impl Record {
    /// Parse RECORD from CSV content
    pub fn parse(content: &str) -> Result<Self, RecordError> {
        let mut entries = Vec::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        for result in reader.records() {
            let record = result.map_err(|e| RecordError::InvalidCsv(e.to_string()))?;
            let line = record.position().map_or(0, |p| p.line());

            // Blank lines
            if record.len() == 1 && record.get(0).map_or(true, str::is_empty) {
                continue;
            }

            if record.len() != 3 {
                return Err(RecordError::Malformed {
                    line,
                    reason: format!("expected 3 fields, got {}", record.len()),
                });
            }

            let path = record[0].to_string();
            if path.is_empty() {
                return Err(RecordError::Malformed {
                    line,
                    reason: "empty path".to_string(),
                });
            }

            let hash = match &record[1] {
                "" => None,
                column => match column.split_once('=') {
                    Some((algorithm, value)) if !algorithm.is_empty() && !value.is_empty() => {
                        Some(RecordHash {
                            algorithm: algorithm.to_string(),
                            value: value.to_string(),
                        })
                    }
                    _ => {
                        return Err(RecordError::Malformed {
                            line,
                            reason: format!("invalid hash '{}'", column),
                        })
                    }
                },
            };

            let size = match &record[2] {
                "" => None,
                column => Some(column.parse().map_err(|_| RecordError::Malformed {
                    line,
                    reason: format!("invalid size '{}'", column),
                })?),
            };

            entries.push(RecordEntry { path, hash, size });
        }

        Ok(Record { entries })
    }

    /// Parse raw RECORD bytes, which must be UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let content = std::str::from_utf8(bytes).map_err(|e| RecordError::Malformed {
            line: bytes[..e.valid_up_to()]
                .iter()
                .filter(|&&b| b == b'\n')
                .count() as u64
                + 1,
            reason: "invalid UTF-8".to_string(),
        })?;
        Self::parse(content)
    }

    /// Serialize RECORD to CSV format
    pub fn serialize(&self) -> Result<String, RecordError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for entry in &self.entries {
            let hash = entry.hash.as_ref().map(ToString::to_string).unwrap_or_default();
            let size = entry.size.map(|s| s.to_string()).unwrap_or_default();
            writer
                .write_record([entry.path.as_str(), hash.as_str(), size.as_str()])
                .map_err(|e| RecordError::InvalidCsv(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| RecordError::InvalidCsv(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| RecordError::InvalidCsv(e.to_string()))
    }

    /// Find entry by path
    pub fn find(&self, path: &str) -> Option<&RecordEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Algorithm used by the existing entries, falling back to sha256.
    ///
    /// Unknown algorithms are rejected since new digests could not match them.
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, RecordError> {
        match self.entries.iter().find_map(|e| e.hash.as_ref()) {
            Some(hash) => hash.algorithm.parse(),
            None => Ok(HashAlgorithm::default()),
        }
    }
}

/// Compute SHA256 hash in wheel format: sha256=<base64url_no_padding>
pub fn hash_content(content: &[u8]) -> String {
    HashAlgorithm::Sha256.hash(content).to_string()
}
