/*!
 * # Password Policy Module
 *
 * Complexity requirements applied at supplier registration.
 */

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min_length} characters required")]
    TooShort { min_length: usize },

    #[error("Password too long: maximum {max_length} characters allowed")]
    TooLong { max_length: usize },

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one number")]
    MissingNumber,

    #[error("Password must contain at least one special character")]
    MissingSpecialChar,

    #[error("Password is in the list of commonly used passwords")]
    CommonPassword,

    #[error("Password is too similar to the account email")]
    SimilarToUsername,

    #[error("Password contains more than {max} repeated characters in a row")]
    RepeatedChars { max: usize },
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
    pub max_repeated_chars: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
            max_repeated_chars: 3,
        }
    }
}

lazy_static! {
    static ref SPECIAL_CHAR: Regex = Regex::new(r"[^A-Za-z0-9\s]").expect("static regex");

    static ref COMMON_PASSWORDS: HashSet<&'static str> = [
        "password1234",
        "password123!",
        "qwerty123456",
        "letmein12345",
        "welcome12345",
        "administrator",
        "changeme1234",
        "p@ssw0rd1234",
        "flexvolt1234",
    ]
    .into_iter()
    .collect();
}

impl PasswordPolicy {
    /// Validate a password. `username` is the account email, whose local part
    /// must not appear in the password.
    pub fn validate(&self, password: &str, username: Option<&str>) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if length > self.max_length {
            return Err(PasswordPolicyError::TooLong {
                max_length: self.max_length,
            });
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingNumber);
        }
        if self.require_special_chars && !SPECIAL_CHAR.is_match(password) {
            return Err(PasswordPolicyError::MissingSpecialChar);
        }

        if COMMON_PASSWORDS.contains(password.to_lowercase().as_str()) {
            return Err(PasswordPolicyError::CommonPassword);
        }

        if let Some(username) = username {
            let local = username.split('@').next().unwrap_or(username).to_lowercase();
            if local.len() >= 4 && password.to_lowercase().contains(&local) {
                return Err(PasswordPolicyError::SimilarToUsername);
            }
        }

        if self.has_repeated_chars(password) {
            return Err(PasswordPolicyError::RepeatedChars {
                max: self.max_repeated_chars,
            });
        }

        Ok(())
    }

    fn has_repeated_chars(&self, password: &str) -> bool {
        let mut count = 0;
        let mut prev = None;
        for ch in password.chars() {
            if Some(ch) == prev {
                count += 1;
                if count > self.max_repeated_chars {
                    return true;
                }
            } else {
                count = 1;
                prev = Some(ch);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Short1!", PasswordPolicyError::TooShort { min_length: 12 })]
    #[case("alllowercase1!", PasswordPolicyError::MissingUppercase)]
    #[case("ALLUPPERCASE1!", PasswordPolicyError::MissingLowercase)]
    #[case("NoDigitsHere!!", PasswordPolicyError::MissingNumber)]
    #[case("NoSpecials1234", PasswordPolicyError::MissingSpecialChar)]
    #[case("Caaaaat-battery9", PasswordPolicyError::RepeatedChars { max: 3 })]
    fn rejects_weak_passwords(#[case] password: &str, #[case] expected: PasswordPolicyError) {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.validate(password, None), Err(expected));
    }

    #[test]
    fn accepts_strong_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Volt-Cell#2048x", Some("buyer@acme.test")).is_ok());
    }

    #[test]
    fn rejects_password_containing_email_local_part() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.validate("Jsmith-Secure#99", Some("jsmith@acme.test")),
            Err(PasswordPolicyError::SimilarToUsername)
        );
    }
}
