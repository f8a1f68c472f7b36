#[cfg(test)]
pub mod test_db {
    use crate::db::{connect, register_user, upsert_course};
    use crate::error::AppError;
    use crate::models::CourseDraft;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        courses: Vec<TestCourse>,
    }

    pub struct TestUser {
        pub username: String,
        pub email: Option<String>,
        pub password: String,
    }

    pub struct TestCourse {
        pub username: String,
        pub draft: CourseDraft,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: None,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(
            mut self,
            username: &str,
            email: Option<&str>,
            password: &str,
        ) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: email.map(String::from),
                password: password.to_string(),
            });
            self
        }

        /// Stores a course for `username`; the draft must validate.
        pub fn course(mut self, username: &str, draft: CourseDraft) -> Self {
            self.courses.push(TestCourse {
                username: username.to_string(),
                draft,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new("gpa_tracker=debug"))
                    .with_test_writer()
                    .try_init();
            });

            let pool = connect("sqlite::memory:").await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id =
                    register_user(&pool, &user.username, &user.password, user.email.as_deref())
                        .await?;

                user_id_map.insert(user.username.clone(), user_id);
            }

            for course in &self.courses {
                let owner_id = user_id_map.get(&course.username).copied().ok_or_else(|| {
                    AppError::NotFound(format!("test user {} not declared", course.username))
                })?;

                upsert_course(&pool, owner_id, &course.draft.validate()?).await?;
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }
    }
}
