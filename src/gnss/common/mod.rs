pub mod acquisition;
pub mod replica;
