//! One-time-password generation

use rand::Rng;

/// OTP validity window in minutes
pub const OTP_TTL_MINUTES: i64 = 10;

/// Generate a 6-digit numeric code, each position drawn uniformly from
/// 0-9. Not cryptographically hardened; acceptable for a short-lived
/// code proving email ownership.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6).map(|_| rng.gen_range(0..10).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
