pub mod ats;
pub mod email;
pub mod jwt;
pub mod openai;
pub mod stripe;

pub use ats::AtsService;
pub use email::EmailService;
pub use jwt::JwtService;
pub use openai::OpenAiService;
pub use stripe::StripeService;
