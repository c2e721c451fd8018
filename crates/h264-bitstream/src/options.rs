//! Parsing configuration.

use serde::{Deserialize, Serialize};

/// Size limits enforced defensively against adversarial inputs, per Annex A.
pub mod limits {
    /// Max picture width/height in macroblock units (Annex A / Level constraints
    /// leave room well below this; it exists purely to bound allocation).
    pub const MAX_MB_WIDTH: u32 = 1055;
    pub const MAX_MB_HEIGHT: u32 = 1055;
    pub const MAX_WIDTH: u32 = MAX_MB_WIDTH * 16;
    pub const MAX_HEIGHT: u32 = MAX_MB_HEIGHT * 16;
    pub const MAX_MB_PIC_SIZE: u32 = 139_264;
    pub const MAX_NUM_REF_FRAMES: u32 = 16;
}

/// Toggles for optional bookkeeping the parser attaches to each NAL unit.
/// All default to `true`; a caller that only wants payload parsing without
/// the bookkeeping can opt out selectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingOptions {
    /// Record the `offset` field of each `NalUnitState`.
    pub add_offset: bool,
    /// Record the `length` field of each `NalUnitState`.
    pub add_length: bool,
    /// Record the `parsed_length` field of each `NalUnitState`.
    pub add_parsed_length: bool,
    /// Compute and store a `NaluChecksum` per NAL unit.
    pub add_checksum: bool,
    /// Make the derived cropped resolution available on parsed SPS.
    pub add_resolution: bool,
}

impl Default for ParsingOptions {
    fn default() -> Self {
        Self {
            add_offset: true,
            add_length: true,
            add_parsed_length: true,
            add_checksum: true,
            add_resolution: true,
        }
    }
}
