pub mod patient;
pub mod transcript;

pub use patient::*;
pub use transcript::*;
