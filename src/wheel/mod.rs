//! Wheel reading, locating, repacking, and validation

mod locator;
mod reader;
mod validator;
mod writer;

pub use locator::locate;
pub use locator::DistInfo;
pub use reader::ArchiveEntry;
pub use reader::Compression;
pub use reader::WheelReader;
pub use validator::validate_wheel;
pub use writer::plan_repack;
pub use writer::write_plan;
pub use writer::EntryContent;
pub use writer::PlannedEntry;
pub use writer::RepackPlan;
pub use writer::RepackUpdate;
