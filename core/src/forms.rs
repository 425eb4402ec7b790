//! Client-side checks run before a request is built.
//!
//! These mirror what the forms enforce so a host can refuse obviously bad
//! input without a round-trip. The CMS still validates everything again.

use thiserror::Error;

use crate::types::TodoDraft;

/// Minimum `password_strength` accepted at registration.
pub const MIN_PASSWORD_STRENGTH: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Title is required")]
    TitleRequired,
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("All fields are required")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please use a stronger password")]
    WeakPassword,
    #[error("You must agree to the terms of service and privacy policy")]
    TermsNotAccepted,
}

impl TodoDraft {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::TitleRequired);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub identifier: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.identifier.trim().is_empty() || self.password.trim().is_empty() {
            return Err(FormError::MissingCredentials);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub agree_terms: bool,
}

impl RegistrationForm {
    /// Checks run in order; the first failure is reported.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.trim().is_empty()
        {
            return Err(FormError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if password_strength(&self.password) < MIN_PASSWORD_STRENGTH {
            return Err(FormError::WeakPassword);
        }
        if !self.agree_terms {
            return Err(FormError::TermsNotAccepted);
        }
        Ok(())
    }
}

/// Score from 0 to 4: one point each for length of at least 8, mixed case,
/// a digit, and a character outside ASCII letters and digits.
pub fn password_strength(password: &str) -> u8 {
    let mut score = 0;
    if password.chars().count() >= 8 {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
    {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        score += 1;
    }
    score
}

const STRENGTH_LABELS: [&str; 5] = ["Very Weak", "Weak", "Medium", "Good", "Strong"];

/// Label shown under the password field. Empty until something is typed.
pub fn strength_label(password: &str) -> &'static str {
    if password.is_empty() {
        return "";
    }
    let score = usize::from(password_strength(password));
    STRENGTH_LABELS[score.min(STRENGTH_LABELS.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            agree_terms: true,
        }
    }

    #[test]
    fn draft_requires_title() {
        assert_eq!(TodoDraft::new("   ").validate(), Err(FormError::TitleRequired));
        assert!(TodoDraft::new("Walk dog").validate().is_ok());
    }

    #[test]
    fn login_requires_both_fields() {
        let form = LoginForm {
            identifier: "ana".to_string(),
            password: " ".to_string(),
        };
        assert_eq!(form.validate(), Err(FormError::MissingCredentials));
    }

    #[test]
    fn registration_checks_in_order() {
        let mut form = registration("", "");
        assert_eq!(form.validate(), Err(FormError::MissingFields));

        form = registration("abcdefgh", "abcdefgx");
        assert_eq!(form.validate(), Err(FormError::PasswordMismatch));

        form = registration("abc", "abc");
        assert_eq!(form.validate(), Err(FormError::WeakPassword));

        form = registration("Abcdefgh", "Abcdefgh");
        form.agree_terms = false;
        assert_eq!(form.validate(), Err(FormError::TermsNotAccepted));

        form.agree_terms = true;
        assert!(form.validate().is_ok());
    }

    #[test]
    fn weak_password_is_reported_before_terms() {
        let form = RegistrationForm {
            agree_terms: false,
            ..registration("abc", "abc")
        };
        assert_eq!(form.validate(), Err(FormError::WeakPassword));
        assert_eq!(
            FormError::TermsNotAccepted.to_string(),
            "You must agree to the terms of service and privacy policy"
        );
    }

    #[test]
    fn strength_scores() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("abcdefgh"), 1);
        assert_eq!(password_strength("Abcdefgh"), 2);
        assert_eq!(password_strength("Abcdefg1"), 3);
        assert_eq!(password_strength("Abcdef1!"), 4);
    }

    #[test]
    fn strength_labels_follow_the_score() {
        assert_eq!(strength_label(""), "");
        assert_eq!(strength_label("abc"), "Very Weak");
        assert_eq!(strength_label("abcdefgh"), "Weak");
        assert_eq!(strength_label("Abcdefgh"), "Medium");
        assert_eq!(strength_label("Abcdefg1"), "Good");
        assert_eq!(strength_label("Abcdef1!"), "Strong");
    }
}
