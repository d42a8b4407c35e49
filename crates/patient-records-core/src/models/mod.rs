//! Domain models for the patient records system.

mod page;
mod patient;

pub use page::*;
pub use patient::*;
