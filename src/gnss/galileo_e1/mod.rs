pub const CODE_LENGTH:usize = 4092;
pub const CHIP_RATE_HZ:f64 = 1.023e6;
pub const CODE_PERIOD_MS:u32 = 4;
pub const MAX_PRN:u32 = 50;

/// Hex digits per memory code in the ICD tables
pub const HEX_DIGITS_PER_CODE:usize = CODE_LENGTH / 4;

pub mod memory_codes;
pub mod signal_modulation;
