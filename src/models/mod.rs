pub mod drug_test;
pub mod enums;
pub mod lab;
pub mod medication;
pub mod substance;

pub use drug_test::*;
pub use enums::*;
pub use lab::*;
pub use medication::*;
pub use substance::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnum { field: String, value: String },
}
