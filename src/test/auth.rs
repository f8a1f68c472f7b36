#[cfg(test)]
mod tests {
    use crate::auth::{RegisterRequest, hash_password, verify_password};
    use crate::error::AppError;

    #[test]
    fn hashes_are_salted_per_call() {
        let first = hash_password("secret1").unwrap();
        let second = hash_password("secret1").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("secret1", &first));
        assert!(verify_password("secret1", &second));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password("secret2", &hash));
    }

    #[test]
    fn garbage_hash_does_not_verify() {
        assert!(!verify_password("secret1", "not-a-bcrypt-hash"));
    }

    #[test]
    fn accepts_well_formed_input() {
        let request = RegisterRequest::new(" alice ", "hunter22", Some("alice@example.com"))
            .validated()
            .expect("request should validate");
        assert_eq!(request.username, "alice");
    }

    #[test]
    fn blank_email_is_treated_as_absent() {
        let request = RegisterRequest::new("alice", "hunter22", Some("  "));
        assert_eq!(request.email, None);
        assert!(request.validated().is_ok());
    }

    #[test]
    fn rejects_short_username_and_password() {
        let err = RegisterRequest::new("al", "123", None)
            .validated()
            .unwrap_err();

        match err {
            AppError::Validation(message) => {
                assert!(message.contains("username"));
                assert!(message.contains("password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_email() {
        let err = RegisterRequest::new("alice", "hunter22", Some("not-an-email"))
            .validated()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
