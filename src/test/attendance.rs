#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rocket::tokio;

    use crate::database::{Table, Value, try_update};
    use crate::db::{
        check_in_at, clean_duplicate_attendance, get_all_attendance, get_attendance_for_date,
        is_valid_date,
    };
    use crate::test::test_utils::{create_standard_test_db, init_test_logging, memory_pool};

    fn at(date: (i32, u32, u32), time: (u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_in_creates_record_with_snapshot() {
        let test_db = create_standard_test_db().await;

        let check_in = check_in_at(&test_db.pool, "2024-001", at((2025, 3, 10), (8, 5)))
            .await
            .unwrap()
            .expect("student exists");

        assert!(check_in.created);
        assert_eq!(check_in.student.idno, "2024-001");
        assert_eq!(check_in.record.name, "Juan Dela Cruz");
        assert_eq!(check_in.record.course_level, "BSIT 1");
        assert_eq!(check_in.record.time_in, "08:05 AM");
        assert_eq!(check_in.record.date, "2025-03-10");
    }

    #[tokio::test]
    async fn test_same_day_check_in_refreshes_single_row() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        let first = check_in_at(pool, "2024-001", at((2025, 3, 10), (8, 5)))
            .await
            .unwrap()
            .unwrap();
        let second = check_in_at(pool, "2024-001", at((2025, 3, 10), (13, 40)))
            .await
            .unwrap()
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(second.record.time_in, "01:40 PM");

        assert_eq!(test_db.attendance_count("2024-001").await, 1);
        let records = get_attendance_for_date(pool, "2025-03-10").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_in, "01:40 PM");
    }

    #[tokio::test]
    async fn test_check_in_on_new_day_adds_row() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        check_in_at(pool, "2024-001", at((2025, 3, 10), (8, 5)))
            .await
            .unwrap();
        let next_day = check_in_at(pool, "2024-001", at((2025, 3, 11), (8, 0)))
            .await
            .unwrap()
            .unwrap();

        assert!(next_day.created);
        assert_eq!(test_db.attendance_count("2024-001").await, 2);
    }

    #[tokio::test]
    async fn test_unknown_idno_writes_nothing() {
        let test_db = create_standard_test_db().await;

        let result = check_in_at(&test_db.pool, "9999-999", at((2025, 3, 10), (8, 5)))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(test_db.attendance_count("9999-999").await, 0);
        assert!(get_all_attendance(&test_db.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_in_refreshes_stale_snapshot() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        check_in_at(pool, "2024-002", at((2025, 3, 10), (7, 55)))
            .await
            .unwrap();

        // A raw edit bypasses the sync, leaving the snapshot stale until the
        // next check-in.
        try_update(
            pool,
            Table::Students,
            &[("level", Value::from("3"))],
            &[("idno", Value::from("2024-002"))],
        )
        .await
        .unwrap();

        let refreshed = check_in_at(pool, "2024-002", at((2025, 3, 10), (9, 0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.record.course_level, "BSCS 3");
    }

    #[tokio::test]
    async fn test_day_listing_orders_by_clock_time() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        check_in_at(pool, "2024-001", at((2025, 3, 10), (13, 15)))
            .await
            .unwrap();
        check_in_at(pool, "2024-002", at((2025, 3, 10), (8, 5)))
            .await
            .unwrap();

        let records = get_attendance_for_date(pool, "2025-03-10").await.unwrap();
        let idnos: Vec<_> = records.iter().map(|r| r.idno.as_str()).collect();
        assert_eq!(idnos, vec!["2024-002", "2024-001"]);

        assert!(get_attendance_for_date(pool, "2025-03-11").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_attendance_newest_first() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        check_in_at(pool, "2024-001", at((2025, 3, 9), (8, 0)))
            .await
            .unwrap();
        check_in_at(pool, "2024-001", at((2025, 3, 10), (8, 0)))
            .await
            .unwrap();
        check_in_at(pool, "2024-002", at((2025, 3, 10), (12, 30)))
            .await
            .unwrap();

        let records = get_all_attendance(pool).await.unwrap();
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.date.as_str(), r.idno.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2025-03-10", "2024-002"),
                ("2025-03-10", "2024-001"),
                ("2025-03-09", "2024-001"),
            ]
        );
    }

    #[tokio::test]
    async fn test_clean_duplicates_is_noop_under_unique_constraint() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        check_in_at(pool, "2024-001", at((2025, 3, 10), (8, 0)))
            .await
            .unwrap();
        check_in_at(pool, "2024-001", at((2025, 3, 10), (9, 0)))
            .await
            .unwrap();

        assert_eq!(clean_duplicate_attendance(pool).await.unwrap(), 0);
        assert_eq!(test_db.attendance_count("2024-001").await, 1);
    }

    #[tokio::test]
    async fn test_clean_duplicates_keeps_latest_row_per_day() {
        init_test_logging();
        // Databases created before the unique constraint can hold duplicates.
        let pool = memory_pool().await.unwrap();
        sqlx::query(
            "CREATE TABLE attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                idno TEXT NOT NULL,
                name TEXT NOT NULL,
                course_level TEXT NOT NULL,
                time_in TEXT NOT NULL,
                date TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        let rows = [
            ("2024-001", "08:00 AM", "2025-03-10"),
            ("2024-001", "08:30 AM", "2025-03-10"),
            ("2024-001", "09:00 AM", "2025-03-10"),
            ("2024-001", "08:00 AM", "2025-03-11"),
            ("2024-002", "07:45 AM", "2025-03-10"),
            ("2024-002", "07:50 AM", "2025-03-10"),
        ];
        for (idno, time_in, date) in rows {
            sqlx::query(
                "INSERT INTO attendance (idno, name, course_level, time_in, date)
                 VALUES (?, 'n', 'c', ?, ?)",
            )
            .bind(idno)
            .bind(time_in)
            .bind(date)
            .execute(&pool)
            .await
            .unwrap();
        }

        assert_eq!(clean_duplicate_attendance(&pool).await.unwrap(), 3);

        let remaining: Vec<(i64, String, String, String)> =
            sqlx::query_as("SELECT id, idno, time_in, date FROM attendance ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            remaining,
            vec![
                (3, "2024-001".to_string(), "09:00 AM".to_string(), "2025-03-10".to_string()),
                (4, "2024-001".to_string(), "08:00 AM".to_string(), "2025-03-11".to_string()),
                (6, "2024-002".to_string(), "07:50 AM".to_string(), "2025-03-10".to_string()),
            ]
        );

        assert_eq!(clean_duplicate_attendance(&pool).await.unwrap(), 0);
    }

    #[test]
    fn test_date_validation() {
        assert!(is_valid_date("2025-03-10"));
        assert!(!is_valid_date("2025-13-01"));
        assert!(!is_valid_date("03/10/2025"));
        assert!(!is_valid_date(""));
    }
}
