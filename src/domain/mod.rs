pub mod records;
pub mod sample;

pub use records::*;
pub use sample::*;
