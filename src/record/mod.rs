//! RECORD file parsing and generation for Python wheels

mod types;

pub use types::HashAlgorithm;
pub use types::Record;
pub use types::RecordEntry;
pub use types::RecordHash;
pub use types::hash_content;
