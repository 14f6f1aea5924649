//! METADATA parsing and serialization

mod types;

pub(crate) use types::decode_utf8;
pub use types::Header;
pub use types::Metadata;
