#[cfg(test)]
mod tests {
    use crate::db::load_courses;
    use crate::error::AppError;
    use crate::models::{CourseDraft, CourseRecord, Period};
    use crate::session::{EntryState, Session};
    use crate::test::test_db::{STANDARD_PASSWORD, TestDbBuilder};
    use crate::transfer::{
        ExportDocument, export_to_file, import_from_file, read_export, write_export,
    };

    fn comparable(records: &[CourseRecord]) -> Vec<CourseDraft> {
        let mut drafts: Vec<CourseDraft> = records.iter().map(CourseRecord::to_draft).collect();
        drafts.sort_by(|a, b| a.course_name.cmp(&b.course_name));
        drafts
    }

    #[tokio::test]
    async fn test_export_then_import_reproduces_courses() {
        let fall = Period::new("2023", "Fall");
        let spring = Period::new("2024", "Spring");
        let test_db = TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .course(
                "alice",
                CourseDraft::new("Calculus", "A-", "4")
                    .with_code("MATH101")
                    .in_period(&fall),
            )
            .course("alice", CourseDraft::new("Poetry", "W", "3").in_period(&fall))
            .course("alice", CourseDraft::new("Physics", "B+", "3.5").in_period(&spring))
            .course("bob", CourseDraft::new("Leftover", "C", "3").in_period(&spring))
            .build()
            .await
            .unwrap();
        let pool = &test_db.pool;

        let alice = Session::login(pool, "alice", STANDARD_PASSWORD)
            .await
            .unwrap();
        let mut buffer = Vec::new();
        alice.export_to(&mut buffer).unwrap();

        let mut bob = Session::login(pool, "bob", STANDARD_PASSWORD)
            .await
            .unwrap();
        let imported = bob.import_from(buffer.as_slice()).unwrap();
        assert_eq!(imported, 3);
        assert!(
            bob.courses()
                .iter()
                .all(|entry| entry.state == EntryState::Unsaved)
        );

        let report = bob.save_all().await.unwrap();
        assert_eq!(report.saved, 3);
        assert_eq!(report.skipped, 0);

        let alice_rows = load_courses(pool, alice.user().id).await.unwrap();
        let bob_rows = load_courses(pool, bob.user().id).await.unwrap();
        assert_eq!(comparable(&alice_rows), comparable(&bob_rows));
    }

    #[tokio::test]
    async fn test_import_skips_malformed_rows_on_save() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        let mut session = Session::login(&test_db.pool, "alice", STANDARD_PASSWORD)
            .await
            .unwrap();

        let json = r#"{
            "user": "someone-else",
            "courses": [
                {"course": "Biology", "grade": "B", "credits": 3, "semester": "Fall", "year": 2023},
                {"course": "Chemistry", "grade": "Q", "credits": "3"},
                {"course": "Geology", "grade": "A", "credits": "lots"},
                {"grade": "A", "credits": "3"}
            ]
        }"#;

        assert_eq!(session.import_from(json.as_bytes()).unwrap(), 4);
        let report = session.save_all().await.unwrap();
        assert_eq!(report.saved, 1);
        assert_eq!(report.skipped, 3);

        let stored = load_courses(&test_db.pool, session.user().id)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].academic_year.as_deref(), Some("2023"));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let test_db = TestDbBuilder::new()
            .user("alice")
            .course(
                "alice",
                CourseDraft::new("Calculus", "A", "4").in_period(&Period::default()),
            )
            .build()
            .await
            .unwrap();
        let session = Session::login(&test_db.pool, "alice", STANDARD_PASSWORD)
            .await
            .unwrap();

        let path = std::env::temp_dir().join(format!(
            "gpa-tracker-export-{}-{}.json",
            std::process::id(),
            session.user().id
        ));
        export_to_file(&path, &session.export_document()).unwrap();
        let document = import_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(document.user, "alice");
        assert_eq!(document.courses, session.export_document().courses);
    }


    #[test]
    fn export_skips_unnamed_rows() {
        let drafts = vec![
            CourseDraft::new("Calculus", "A", "4"),
            CourseDraft::new("  ", "B", "3"),
        ];
        let document = ExportDocument::new("alice", &drafts);

        assert_eq!(document.user, "alice");
        assert_eq!(document.courses.len(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&document.export_date).is_ok());
    }

    #[test]
    fn written_document_uses_short_field_names() {
        let drafts = vec![CourseDraft::new("Calculus", "A", "4").with_code("MATH101")];
        let mut buffer = Vec::new();
        write_export(&mut buffer, &ExportDocument::new("alice", &drafts)).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let course = &value["courses"][0];
        assert_eq!(course["course"], "Calculus");
        assert_eq!(course["code"], "MATH101");
        assert_eq!(course["grade"], "A");
        assert_eq!(course["credits"], "4");
        assert_eq!(course["year"], "");
        assert!(value.get("export_date").is_some());
    }

    #[test]
    fn reads_documents_from_other_writers() {
        let json = r#"{
            "user": "bob",
            "export_date": "2024-05-01T10:00:00.123456",
            "courses": [
                {"course": "Biology", "code": "BIO1", "grade": "B+", "credits": "3",
                 "semester": "Fall", "year": "2023"},
                {"course": "Art", "grade": "W", "credits": 2.5}
            ]
        }"#;

        let document = read_export(json.as_bytes()).unwrap();
        assert_eq!(document.user, "bob");
        assert_eq!(document.courses.len(), 2);
        assert_eq!(document.courses[1].credits, "2.5");
        assert_eq!(document.courses[1].semester, "");
    }

    #[test]
    fn missing_courses_key_is_a_format_error() {
        let err = read_export(r#"{"user": "bob"}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));

        let err = read_export(r#"{"courses": {"course": "x"}}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));

        let err = read_export(r#"[1, 2, 3]"#.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        let err = read_export("{not json".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));
    }
}
