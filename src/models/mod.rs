pub mod otp;
pub mod placement;
pub mod user;

pub use otp::*;
pub use placement::*;
pub use user::*;
