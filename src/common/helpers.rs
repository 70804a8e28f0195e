// Helper functions for safe logging

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.len() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() == 2 {
            // First char, not first byte: local parts may be multibyte
            if let Some(first) = parts[0].chars().next() {
                return format!("{}***@{}", first, parts[1]);
            }
        }
    }
    "***@***.***".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_email_log_masks_local_part() {
        assert_eq!(safe_email_log("user@example.com"), "u***@example.com");
    }

    #[test]
    fn test_safe_email_log_handles_multibyte_local_part() {
        assert_eq!(safe_email_log("émail@example.com"), "é***@example.com");
        assert_eq!(safe_email_log("日本@example.jp"), "日***@example.jp");
    }

    #[test]
    fn test_safe_email_log_handles_garbage() {
        assert_eq!(safe_email_log("ab"), "***@***.***");
        assert_eq!(safe_email_log("not-an-email"), "***@***.***");
        assert_eq!(safe_email_log("@example.com"), "***@***.***");
    }
}
