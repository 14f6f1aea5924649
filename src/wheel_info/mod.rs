//! WHEEL file (wheel format descriptor) parsing

mod types;

pub use types::WheelInfo;
pub use types::WheelTag;
