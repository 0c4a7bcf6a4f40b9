pub mod movie;
pub mod search;
pub mod validation;

pub use movie::*;
pub use search::*;
pub use validation::*;
