use rand::Rng;
use subtle::ConstantTimeEq;

pub const OTP_LENGTH: usize = 6;

/// Six-digit numeric code, never starting with zero.
pub fn generate_otp() -> String {
    let low = 10u32.pow(OTP_LENGTH as u32 - 1);
    rand::thread_rng().gen_range(low..low * 10).to_string()
}

/// Compares two codes without short-circuiting on the first differing byte.
pub fn codes_match(given: &str, saved: &str) -> bool {
    given.trim().as_bytes().ct_eq(saved.as_bytes()).into()
}
