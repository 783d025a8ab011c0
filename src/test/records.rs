#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::database::{
        Direction, Table, Value, add_record, delete_record, get_all, get_record, try_delete,
        try_fetch_all, try_fetch_where, try_insert, try_update, update_record,
    };
    use crate::error::AppError;
    use crate::models::DbStudent;
    use crate::test::test_utils::{TestDbBuilder, create_standard_test_db};

    #[tokio::test]
    async fn test_insert_fetch_update_delete() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let pool = &test_db.pool;

        let id = try_insert(
            pool,
            Table::Students,
            &[
                ("idno", Value::from("2024-010")),
                ("lastname", Value::from("Reyes")),
                ("firstname", Value::from("Ana")),
                ("course", Value::from("BSED")),
                ("level", Value::from("3")),
            ],
        )
        .await
        .unwrap();
        assert!(id > 0);

        let rows: Vec<DbStudent> =
            try_fetch_where(pool, Table::Students, &[("idno", Value::from("2024-010"))])
                .await
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(id));
        assert_eq!(rows[0].avatar.as_deref(), Some("default_avatar.png"));

        let updated = try_update(
            pool,
            Table::Students,
            &[("level", Value::from("4"))],
            &[("id", Value::from(id))],
        )
        .await
        .unwrap();
        assert_eq!(updated, 1);

        let rows: Vec<DbStudent> =
            try_fetch_where(pool, Table::Students, &[("id", Value::from(id))])
                .await
                .unwrap();
        assert_eq!(rows[0].level.as_deref(), Some("4"));

        let deleted = try_delete(pool, Table::Students, &[("id", Value::from(id))])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(test_db.student_count().await, 0);
    }

    #[tokio::test]
    async fn test_filter_is_a_conjunction() {
        let test_db = create_standard_test_db().await;

        let rows: Vec<DbStudent> = try_fetch_where(
            &test_db.pool,
            Table::Students,
            &[("course", Value::from("BSIT")), ("level", Value::from("2"))],
        )
        .await
        .unwrap();
        assert!(rows.is_empty());

        let rows: Vec<DbStudent> = try_fetch_where(
            &test_db.pool,
            Table::Students,
            &[("course", Value::from("BSIT")), ("level", Value::from("1"))],
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].idno.as_deref(), Some("2024-001"));
    }

    #[tokio::test]
    async fn test_fetch_all_ordering() {
        let test_db = TestDbBuilder::new()
            .student("3", "Bautista", "Carlo", "BSIT", "1")
            .student("1", "Aquino", "Bea", "BSIT", "1")
            .student("2", "Aquino", "Alma", "BSIT", "1")
            .build()
            .await
            .unwrap();

        let rows: Vec<DbStudent> = try_fetch_all(
            &test_db.pool,
            Table::Students,
            &[("lastname", Direction::Asc), ("firstname", Direction::Asc)],
        )
        .await
        .unwrap();
        let idnos: Vec<_> = rows.iter().filter_map(|r| r.idno.clone()).collect();
        assert_eq!(idnos, vec!["2", "1", "3"]);

        let rows: Vec<DbStudent> =
            try_fetch_all(&test_db.pool, Table::Students, &[("idno", Direction::Desc)])
                .await
                .unwrap();
        let idnos: Vec<_> = rows.iter().filter_map(|r| r.idno.clone()).collect();
        assert_eq!(idnos, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected_before_touching_database() {
        let test_db = create_standard_test_db().await;

        let result: Result<Vec<DbStudent>, AppError> = try_fetch_where(
            &test_db.pool,
            Table::Students,
            &[("idno = idno; DROP TABLE students; --", Value::from("x"))],
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = try_update(
            &test_db.pool,
            Table::Students,
            &[("password", Value::from("x"))],
            &[("id", Value::from(1_i64))],
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result: Result<Vec<DbStudent>, AppError> =
            try_fetch_all(&test_db.pool, Table::Students, &[("random()", Direction::Asc)]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert_eq!(test_db.student_count().await, 2);
    }

    #[tokio::test]
    async fn test_empty_filter_or_values_rejected() {
        let test_db = create_standard_test_db().await;

        let result = try_delete(&test_db.pool, Table::Students, &[]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = try_update(
            &test_db.pool,
            Table::Students,
            &[("level", Value::from("9"))],
            &[],
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = try_insert(&test_db.pool, Table::Students, &[]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let rows: Vec<DbStudent> = try_fetch_where(
            &test_db.pool,
            Table::Students,
            &[("level", Value::from("9"))],
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
        assert_eq!(test_db.student_count().await, 2);
    }

    #[tokio::test]
    async fn test_values_are_bound_not_spliced() {
        let test_db = create_standard_test_db().await;

        let hostile = "x' OR '1'='1";
        let rows: Vec<DbStudent> =
            try_fetch_where(&test_db.pool, Table::Students, &[("idno", Value::from(hostile))])
                .await
                .unwrap();
        assert!(rows.is_empty());

        let removed = try_delete(&test_db.pool, Table::Students, &[("idno", Value::from(hostile))])
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(test_db.student_count().await, 2);
    }

    #[tokio::test]
    async fn test_degrading_forms() {
        let test_db = create_standard_test_db().await;
        let pool = &test_db.pool;

        let students: Vec<DbStudent> = get_all(pool, Table::Students, &[]).await;
        assert_eq!(students.len(), 2);

        let students: Vec<DbStudent> =
            get_all(pool, Table::Students, &[("nonsense", Direction::Asc)]).await;
        assert!(students.is_empty());

        let students: Vec<DbStudent> =
            get_record(pool, Table::Students, &[("idno", Value::from("2024-002"))]).await;
        assert_eq!(students.len(), 1);

        // NOT NULL on course makes the insert fail inside SQLite.
        let added = add_record(
            pool,
            Table::Students,
            &[
                ("idno", Value::from("2024-099")),
                ("lastname", Value::from("Lim")),
                ("firstname", Value::from("Jose")),
                ("course", Value::from(None::<String>)),
            ],
        )
        .await;
        assert!(!added);

        // Duplicate idno violates the unique constraint.
        let added = add_record(
            pool,
            Table::Students,
            &[
                ("idno", Value::from("2024-001")),
                ("lastname", Value::from("Lim")),
                ("firstname", Value::from("Jose")),
            ],
        )
        .await;
        assert!(!added);

        assert!(
            update_record(
                pool,
                Table::Students,
                &[("course", Value::from("BSCE"))],
                &[("idno", Value::from("2024-002"))],
            )
            .await
        );
        assert!(
            !update_record(pool, Table::Students, &[("course", Value::from("BSCE"))], &[]).await
        );

        assert!(!delete_record(pool, Table::Students, &[]).await);
        assert!(delete_record(pool, Table::Students, &[("idno", Value::from("2024-002"))]).await);
        assert_eq!(test_db.student_count().await, 1);
    }

    #[test]
    fn test_table_allow_list() {
        assert_eq!(Table::User.column("email").unwrap(), "email");
        assert!(Table::Attendance.column("avatar").is_err());
        assert!(Table::Students.column("ID").is_err());
        assert_eq!(Table::Attendance.name(), "attendance");
    }
}
