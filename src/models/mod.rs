pub mod user;
pub mod plan;
pub mod application;
pub mod batch;
pub mod transaction;
pub mod promo;
pub mod notification;

pub use user::*;
pub use plan::*;
pub use application::*;
pub use batch::*;
pub use transaction::*;
pub use promo::*;
pub use notification::*;
