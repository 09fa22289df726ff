pub mod csv;
pub mod response;
pub mod validation;

pub use self::csv::*;
pub use response::*;
pub use validation::*;
