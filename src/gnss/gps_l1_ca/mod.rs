pub const CODE_LENGTH:usize = 1023;
pub const CHIP_RATE_HZ:f64 = 1.023e6;
pub const CODE_PERIOD_MS:u32 = 1;
pub const MAX_PRN:u32 = 32;

pub mod signal_modulation;
