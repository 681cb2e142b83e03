#[cfg(feature = "sea-orm")]
mod tests {
    use sea_orm::entity::prelude::*;
    use sea_orm::{ActiveValue::Set, Database, DatabaseConnection, QueryTrait, Schema};

    use spec_core::{create_paged_list, evaluate, Field, Predicate, QueryExecutor, Specification};
    use spec_db::sea::{predicate_to_condition, FieldKind, FieldMap, SelectSource, SqlBuildError};
    use spec_db::SelectError;

    #[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "visits")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub tag: String,
        pub status: String,
        pub purpose: String,
        pub check_in: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    const STATUS: Field<Model, String> = Field::new("status");
    const PURPOSE: Field<Model, String> = Field::new("purpose");
    const CHECK_IN: Field<Model, i64> = Field::new("check_in");
    const HOST: Field<Model, String> = Field::new("host");
    const NOTES: Field<Model, String> = Field::new("notes");

    fn field_map() -> FieldMap<Entity> {
        FieldMap::<Entity>::new()
            .insert("id", Column::Id, FieldKind::I64)
            .insert("tag", Column::Tag, FieldKind::String)
            .insert("status", Column::Status, FieldKind::String)
            .insert("purpose", Column::Purpose, FieldKind::String)
            .insert("check_in", Column::CheckIn, FieldKind::I64)
            .relation("host")
    }

    async fn seeded() -> anyhow::Result<DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await?;
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        db.execute(backend.build(&schema.create_table_from_entity(Entity)))
            .await?;

        let rows = [
            ("t1", "checkedin", "Delivery", 1),
            ("t2", "checkedin", "Interview", 2),
            ("t3", "checkedin", "delivery run", 3),
            ("t4", "checkedout", "Audit", 4),
            ("t5", "scheduled", "Delivery", 5),
        ];
        for (tag, status, purpose, check_in) in rows {
            ActiveModel {
                tag: Set(tag.to_string()),
                status: Set(status.to_string()),
                purpose: Set(purpose.to_string()),
                check_in: Set(check_in),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }
        Ok(db)
    }

    fn tags(rows: &[Model]) -> Vec<&str> {
        rows.iter().map(|m| m.tag.as_str()).collect()
    }

    #[test]
    fn compiles_connectives_and_functions() {
        let fmap = field_map();
        let pred = STATUS
            .eq("checkedin")
            .and(&PURPOSE.to_lower().contains("deliv"))
            .or(&CHECK_IN.is_in([4, 5]).not());

        let cond = predicate_to_condition(&pred, &fmap).unwrap();
        assert!(!cond.is_empty());
    }

    #[test]
    fn rejects_unknown_field_and_bad_literal() {
        let fmap = field_map();

        let err = predicate_to_condition(&NOTES.eq("x"), &fmap).unwrap_err();
        assert_eq!(err, SqlBuildError::UnknownField("notes".into()));

        let err = predicate_to_condition(&STATUS.eq(3), &fmap).unwrap_err();
        assert!(matches!(err, SqlBuildError::TypeMismatch { got: "number", .. }));
    }

    #[test]
    fn lower_applies_to_string_columns_only() {
        let fmap = field_map();
        let like = predicate_to_condition(&PURPOSE.to_lower().starts_with("del"), &fmap);
        assert!(like.is_ok());

        let sql = Entity::find()
            .filter(like.unwrap())
            .build(sea_orm::DatabaseBackend::Sqlite)
            .to_string();
        assert!(sql.to_lowercase().contains("lower("), "{sql}");
    }

    #[tokio::test]
    async fn filter_order_take_against_sqlite() {
        let db = seeded().await.unwrap();
        let fmap = field_map();
        let spec = Specification::builder()
            .criteria(STATUS.eq("checkedin"))
            .add_order_by_descending(&CHECK_IN.nav())
            .apply_paging(0, 2)
            .as_no_tracking()
            .build()
            .unwrap();

        let source = evaluate(&spec, SelectSource::new(Entity::find(), &db, &fmap)).unwrap();
        assert!(!source.is_tracking());
        let rows = source.fetch().await.unwrap();

        assert_eq!(tags(&rows), vec!["t3", "t2"]);
    }

    #[tokio::test]
    async fn case_insensitive_search_and_paging() {
        let db = seeded().await.unwrap();
        let fmap = field_map();
        let spec = Specification::builder()
            .criteria(PURPOSE.to_lower().contains("delivery"))
            .add_order_by(&CHECK_IN.nav())
            .build()
            .unwrap();

        let source = evaluate(&spec, SelectSource::new(Entity::find(), &db, &fmap)).unwrap();
        let page = create_paged_list(source, 2, 2).await.unwrap();

        assert_eq!(page.total_count(), 3);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(tags(page.items()), vec!["t5"]);
    }

    #[tokio::test]
    async fn like_wildcards_in_needles_match_literally() {
        let db = seeded().await.unwrap();
        for (tag, purpose) in [("t6", "50% off"), ("t7", "100_Items"), ("t8", "5000 off")] {
            ActiveModel {
                tag: Set(tag.to_string()),
                status: Set("scheduled".to_string()),
                purpose: Set(purpose.to_string()),
                check_in: Set(10),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }
        let fmap = field_map();
        let matching = |criteria: Predicate<Model>| {
            let spec = Specification::builder()
                .criteria(criteria)
                .add_order_by(&CHECK_IN.nav())
                .build()
                .unwrap();
            evaluate(&spec, SelectSource::new(Entity::find(), &db, &fmap)).unwrap()
        };

        let rows = matching(PURPOSE.contains("50%")).fetch().await.unwrap();
        assert_eq!(tags(&rows), vec!["t6"]);

        let rows = matching(PURPOSE.contains("0_I")).fetch().await.unwrap();
        assert_eq!(tags(&rows), vec!["t7"]);

        let rows = matching(PURPOSE.to_lower().starts_with("100_i"))
            .fetch()
            .await
            .unwrap();
        assert_eq!(tags(&rows), vec!["t7"]);

        let rows = matching(PURPOSE.ends_with("!")).fetch().await.unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn like_patterns_carry_an_escape_clause() {
        let fmap = field_map();
        let cond = predicate_to_condition(&PURPOSE.contains("50%"), &fmap).unwrap();
        let sql = Entity::find()
            .filter(cond)
            .build(sea_orm::DatabaseBackend::Sqlite)
            .to_string();
        assert!(sql.contains("ESCAPE '!'"), "{sql}");
        assert!(sql.contains("50!%"), "{sql}");
    }

    #[tokio::test]
    async fn includes_must_be_registered() {
        let db = seeded().await.unwrap();
        let fmap = field_map();

        let ok = Specification::builder()
            .add_include(&HOST.nav())
            .build()
            .unwrap();
        let source = evaluate(&ok, SelectSource::new(Entity::find(), &db, &fmap)).unwrap();
        assert_eq!(source.included_paths(), ["host".to_string()]);

        let bad = Specification::builder()
            .add_include(&NOTES.nav())
            .build()
            .unwrap();
        let err = evaluate(&bad, SelectSource::new(Entity::find(), &db, &fmap))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SelectError::Build(SqlBuildError::UnknownRelation(p)) if p == "notes"
        ));
    }
}
