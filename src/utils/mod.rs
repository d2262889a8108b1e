// Utility functions
pub mod error;
pub mod multipart;
pub mod otp;
pub mod response;

pub use error::*;
pub use multipart::{FormData, UploadedFile};
pub use response::*;
