pub mod error;
pub mod models;
pub mod validation;
pub mod ballot;

pub use error::ErrorResponse;
pub use models::*;
pub use validation::*;
pub use ballot::{Ballot, Choice, Contest, Selections};
