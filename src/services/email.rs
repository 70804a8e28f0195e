// src/services/email.rs
//! HTML templates for transactional auth emails

/// Email verification message carrying the OTP code
pub fn verification_email(otp: &str) -> (String, String) {
    let subject = "Your verification code".to_string();
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .code {{ font-size: 28px; letter-spacing: 6px; font-weight: bold; text-align: center;
                 background-color: #f4f4f5; padding: 16px; border-radius: 8px; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <p>Use this code to verify your email address:</p>
        <div class="code">{}</div>
        <p>The code is valid for 10 minutes. If you did not request it, you can ignore this email.</p>
        <div class="footer">
            <p>This is an automated message. Please do not reply directly to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        otp
    );
    (subject, body)
}

/// Password reset message carrying the OTP code
pub fn password_reset_email(otp: &str) -> (String, String) {
    let subject = "Your password reset code".to_string();
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .code {{ font-size: 28px; letter-spacing: 6px; font-weight: bold; text-align: center;
                 background-color: #f4f4f5; padding: 16px; border-radius: 8px; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <p>Use this code to reset your password:</p>
        <div class="code">{}</div>
        <p>The code is valid for 10 minutes. If you did not request a reset, no action is needed.</p>
        <div class="footer">
            <p>This is an automated message. Please do not reply directly to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        otp
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_the_code() {
        let (subject, body) = verification_email("123456");
        assert!(subject.contains("verification"));
        assert!(body.contains("123456"));

        let (subject, body) = password_reset_email("654321");
        assert!(subject.contains("reset"));
        assert!(body.contains("654321"));
    }
}
