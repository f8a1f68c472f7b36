use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters long"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
}

impl RegisterRequest {
    pub fn new(username: &str, password: &str, email: Option<&str>) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
            email: email
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(String::from),
        }
    }

    pub fn validated(self) -> Result<Self, AppError> {
        self.validate()?;
        Ok(self)
    }
}
