#[cfg(test)]
mod tests {
    use indoc::indoc;
    use keel::{
        DbError, Entity, GenericSqlWriter, IsolationLevel, MappingCache, MultiplePredicate,
        MySqlSqlWriter, PostgresSqlWriter, Predicate, Sort, SqlGenerator, SqlServerSqlWriter,
        SqlWriter, Value, db_error, key_predicate,
    };
    use std::sync::Arc;
    use time::PrimitiveDateTime;

    #[derive(Entity)]
    #[keel(table = "customers", schema = "sales")]
    struct Customer {
        id: i64,
        #[keel(column = "full_name")]
        name: String,
        email: Option<String>,
        #[keel(read_only)]
        created: Option<PrimitiveDateTime>,
        #[keel(ignore)]
        _cache: Option<String>,
    }

    #[derive(Entity)]
    struct OrderLine {
        #[keel(key)]
        order_id: i64,
        #[keel(key)]
        line: i32,
        product: String,
    }

    #[derive(Entity)]
    struct Odd {
        #[keel(key = "assigned")]
        #[keel(column = "my\"key`]")]
        code: String,
    }

    fn generator<W: SqlWriter>(writer: W) -> SqlGenerator<W> {
        SqlGenerator::new(writer, Arc::new(MappingCache::new()))
    }

    fn customer() -> Customer {
        Customer {
            id: 7,
            name: "Ada".into(),
            email: None,
            created: None,
            _cache: Some("never written".into()),
        }
    }

    #[test]
    fn create_and_drop() {
        let generic = generator(GenericSqlWriter::new());
        assert_eq!(
            generic.create_table::<Customer>(true).unwrap().sql,
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "sales"."customers" (
                "id" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                "full_name" VARCHAR NOT NULL,
                "email" VARCHAR,
                "created" TIMESTAMP
                );
            "#}
            .trim()
        );
        assert_eq!(
            generic.create_table::<OrderLine>(false).unwrap().sql,
            indoc! {r#"
                CREATE TABLE "order_line" (
                "order_id" BIGINT NOT NULL,
                "line" INTEGER NOT NULL,
                "product" VARCHAR NOT NULL,
                PRIMARY KEY ("order_id", "line")
                );
            "#}
            .trim()
        );
        assert_eq!(
            generic.drop_table::<Customer>(true).unwrap().sql,
            r#"DROP TABLE IF EXISTS "sales"."customers";"#
        );
        assert_eq!(
            generator(SqlServerSqlWriter)
                .create_table::<Customer>(false)
                .unwrap()
                .sql,
            indoc! {"
                CREATE TABLE [sales].[customers] (
                [id] BIGINT IDENTITY(1,1) PRIMARY KEY,
                [full_name] NVARCHAR(MAX) NOT NULL,
                [email] NVARCHAR(MAX),
                [created] DATETIME2
                );
            "}
            .trim()
        );
        assert_eq!(
            generator(MySqlSqlWriter)
                .create_table::<Customer>(false)
                .unwrap()
                .sql,
            indoc! {"
                CREATE TABLE `sales`.`customers` (
                `id` BIGINT AUTO_INCREMENT PRIMARY KEY,
                `full_name` TEXT NOT NULL,
                `email` TEXT,
                `created` DATETIME
                );
            "}
            .trim()
        );
    }

    #[test]
    fn select() {
        let statement = generator(GenericSqlWriter::new())
            .select::<Customer>(Some(&Predicate::eq("name", "Ada")), &[Sort::asc("id")])
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "id", "full_name" AS "name", "email", "created"
                FROM "sales"."customers"
                WHERE "full_name" = ?
                ORDER BY "id" ASC;
            "#}
            .trim()
        );
        assert_eq!(statement.params, [Value::Varchar(Some("Ada".into()))]);

        let statement = generator(PostgresSqlWriter)
            .select::<Customer>(None, &[Sort::desc("name"), Sort::asc("id")])
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "id", "full_name" AS "name", "email", "created"
                FROM "sales"."customers"
                ORDER BY "full_name" DESC, "id" ASC;
            "#}
            .trim()
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn select_by_key() {
        let statement = generator(GenericSqlWriter::new())
            .select_by_key::<OrderLine>((5, 2))
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "order_id", "line", "product"
                FROM "order_line"
                WHERE ("order_id" = ? AND "line" = ?);
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [Value::Int64(Some(5)), Value::Int32(Some(2))]
        );
    }

    #[test]
    fn parameters_follow_markers() {
        let predicate = Predicate::between("id", 1i64, 10i64)
            .and(Predicate::is_in("name", ["a", "b"]))
            .and(Predicate::eq("email", "x").not());
        let statement = generator(PostgresSqlWriter)
            .count::<Customer>(Some(&predicate))
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT COUNT(*)
                FROM "sales"."customers"
                WHERE ("id" BETWEEN $1 AND $2 AND "full_name" IN ($3, $4) AND "email" <> $5);
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [
                Value::Int64(Some(1)),
                Value::Int64(Some(10)),
                Value::Varchar(Some("a".into())),
                Value::Varchar(Some("b".into())),
                Value::Varchar(Some("x".into())),
            ]
        );

        let statement = generator(SqlServerSqlWriter)
            .count::<Customer>(Some(&predicate))
            .unwrap();
        assert!(statement.sql.contains(
            "WHERE ([id] BETWEEN @p1 AND @p2 AND [full_name] IN (@p3, @p4) AND [email] <> @p5);"
        ));
    }

    #[test]
    fn nulls_and_groups() {
        let generic = generator(GenericSqlWriter::new());
        let predicate = Predicate::is_null("email").or(Predicate::like("name", "A%"));
        let statement = generic.count::<Customer>(Some(&predicate)).unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT COUNT(*)
                FROM "sales"."customers"
                WHERE ("email" IS NULL OR "full_name" LIKE ?);
            "#}
            .trim()
        );
        assert_eq!(statement.params.len(), 1);

        let statement = generic
            .count::<Customer>(Some(&predicate.not()))
            .unwrap();
        assert!(
            statement
                .sql
                .ends_with(r#"WHERE ("email" IS NOT NULL AND "full_name" NOT LIKE ?);"#)
        );

        let statement = generic
            .count::<Customer>(Some(&Predicate::eq("email", Value::Varchar(None))))
            .unwrap();
        assert!(statement.sql.ends_with(r#"WHERE "email" IS NULL;"#));
        assert!(statement.params.is_empty());
    }

    #[test]
    fn values_are_never_inlined() {
        let hostile = "'; DROP TABLE customers; --";
        let statement = generator(GenericSqlWriter::new())
            .select::<Customer>(Some(&Predicate::eq("name", hostile)), &[])
            .unwrap();
        assert!(!statement.sql.contains("DROP"));
        assert_eq!(statement.params, [Value::Varchar(Some(hostile.into()))]);
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(
            generator(GenericSqlWriter::new())
                .drop_table::<Odd>(false)
                .unwrap()
                .sql,
            r#"DROP TABLE "odd";"#
        );
        let statement = generator(GenericSqlWriter::new())
            .select::<Odd>(None, &[])
            .unwrap();
        assert!(statement.sql.starts_with(r#"SELECT "my""key`]" AS "code""#));
        let statement = generator(MySqlSqlWriter).select::<Odd>(None, &[]).unwrap();
        assert!(statement.sql.starts_with(r#"SELECT `my"key``]` AS `code`"#));
        let statement = generator(SqlServerSqlWriter)
            .select::<Odd>(None, &[])
            .unwrap();
        assert!(statement.sql.starts_with(r#"SELECT [my"key`]]] AS [code]"#));
    }

    #[test]
    fn insert() {
        let entity = customer();
        let statement = generator(GenericSqlWriter::new())
            .insert(&entity)
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                INSERT INTO "sales"."customers" ("full_name", "email") VALUES
                (?, ?);
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [Value::Varchar(Some("Ada".into())), Value::Varchar(None)]
        );
        assert_eq!(
            generator(PostgresSqlWriter).insert(&entity).unwrap().sql,
            indoc! {r#"
                INSERT INTO "sales"."customers" ("full_name", "email") VALUES
                ($1, $2)
                RETURNING "id";
            "#}
            .trim()
        );
        assert_eq!(
            generator(MySqlSqlWriter).insert(&entity).unwrap().sql,
            indoc! {"
                INSERT INTO `sales`.`customers` (`full_name`, `email`) VALUES
                (?, ?);
            "}
            .trim()
        );
        assert_eq!(
            generator(SqlServerSqlWriter).insert(&entity).unwrap().sql,
            indoc! {"
                INSERT INTO [sales].[customers] ([full_name], [email]) VALUES
                (@p1, @p2);
                SELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS [id];
            "}
            .trim()
        );
    }

    #[test]
    fn insert_many() {
        let generic = generator(GenericSqlWriter::new());
        let lines = (0..700)
            .map(|i| OrderLine {
                order_id: 1,
                line: i,
                product: format!("product {}", i),
            })
            .collect::<Vec<_>>();
        let statements = generic.insert_many(&lines).unwrap();
        assert_eq!(
            statements.iter().map(|v| v.params.len()).collect::<Vec<_>>(),
            [999, 999, 102]
        );
        assert!(statements[2].sql.starts_with(indoc! {r#"
            INSERT INTO "order_line" ("order_id", "line", "product") VALUES
            (?, ?, ?),
            (?, ?, ?),
        "#}));
        assert_eq!(statements[2].params[1], Value::Int32(Some(666)));

        let customers = [customer(), customer()];
        let statements = generator(PostgresSqlWriter)
            .insert_many(&customers)
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().all(|v| v.sql.ends_with("RETURNING \"id\";")));
    }

    #[test]
    fn update_and_delete() {
        let mut entity = customer();
        entity.email = Some("ada@example.com".into());
        let statement = generator(PostgresSqlWriter).update(&entity).unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                UPDATE "sales"."customers" SET
                "full_name" = $1,
                "email" = $2
                WHERE "id" = $3;
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [
                Value::Varchar(Some("Ada".into())),
                Value::Varchar(Some("ada@example.com".into())),
                Value::Int64(Some(7)),
            ]
        );
        let statement = generator(GenericSqlWriter::new())
            .delete(&entity)
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                DELETE FROM "sales"."customers"
                WHERE "id" = ?;
            "#}
            .trim()
        );
        let statement = generator(MySqlSqlWriter)
            .delete_where::<OrderLine>(&Predicate::lt("line", 3))
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {"
                DELETE FROM `order_line`
                WHERE `line` < ?;
            "}
            .trim()
        );
    }

    #[test]
    fn paging() {
        let generic = generator(GenericSqlWriter::new());
        let statement = generic
            .select_paged::<Customer>(None, &[], 3, 20)
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "id", "full_name" AS "name", "email", "created"
                FROM "sales"."customers"
                ORDER BY "id" ASC
                LIMIT 20 OFFSET 40;
            "#}
            .trim()
        );
        assert_eq!(
            generic
                .select_paged::<Customer>(None, &[], 0, 20)
                .unwrap()
                .sql,
            generic.select::<Customer>(None, &[]).unwrap().sql
        );
        assert_eq!(
            generic
                .select_paged::<Customer>(None, &[], 1, 0)
                .unwrap()
                .sql,
            generic.select::<Customer>(None, &[]).unwrap().sql
        );
        assert!(
            generator(MySqlSqlWriter)
                .select_paged::<Customer>(None, &[Sort::desc("name")], 2, 10)
                .unwrap()
                .sql
                .ends_with("ORDER BY `full_name` DESC\nLIMIT 10, 10;")
        );
        assert!(
            generator(SqlServerSqlWriter)
                .select_paged::<OrderLine>(None, &[], 1, 5)
                .unwrap()
                .sql
                .ends_with(indoc! {"
                    ORDER BY [order_id] ASC, [line] ASC
                    OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY;"})
        );
        assert!(
            generic
                .select_set::<Customer>(None, &[Sort::asc("email")], 5, 0)
                .unwrap()
                .sql
                .ends_with(&format!("LIMIT {} OFFSET 5;", i64::MAX))
        );
        assert_eq!(
            generic
                .select_set::<Customer>(None, &[], 0, 0)
                .unwrap()
                .sql,
            generic.select::<Customer>(None, &[]).unwrap().sql
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let generic = generator(GenericSqlWriter::new());
        let predicate = Predicate::ge("id", 1).and(Predicate::is_not_null("email"));
        let first = generic
            .select_paged::<Customer>(Some(&predicate), &[Sort::asc("name")], 2, 5)
            .unwrap();
        let second = generic
            .select_paged::<Customer>(Some(&predicate), &[Sort::asc("name")], 2, 5)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn multiple_shares_the_parameters() {
        let queries = MultiplePredicate::new()
            .add::<Customer>(Some(Predicate::gt("id", 10)), vec![])
            .add::<OrderLine>(
                Some(Predicate::eq("product", "pen")),
                vec![Sort::desc("line")],
            );
        let statement = generator(SqlServerSqlWriter).multiple(&queries).unwrap();
        assert_eq!(
            statement.sql,
            indoc! {"
                SELECT [id], [full_name] AS [name], [email], [created]
                FROM [sales].[customers]
                WHERE [id] > @p1;
                SELECT [order_id], [line], [product]
                FROM [order_line]
                WHERE [product] = @p2
                ORDER BY [line] DESC;
            "}
            .trim()
        );
        assert_eq!(statement.params.len(), 2);

        let single = generator(PostgresSqlWriter)
            .multiple_query(&queries.queries()[1])
            .unwrap();
        assert!(single.sql.contains(r#"WHERE "product" = $1"#));
    }

    #[test]
    fn validation() {
        let generic = generator(GenericSqlWriter::new());
        let error = generic
            .select::<Customer>(Some(&Predicate::eq("full_name", "Ada")), &[])
            .unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Mapping { .. })));
        let error = generic
            .select::<Customer>(None, &[Sort::asc("_cache")])
            .unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Mapping { .. })));
        let error = generic
            .count::<Customer>(Some(&Predicate::field(
                "id",
                keel::Operator::Between,
                vec![1.into()],
            )))
            .unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
        let mapping = generic.mapping::<OrderLine>();
        assert!(key_predicate(&mapping, vec![Value::Int64(Some(1))]).is_err());
        let error = key_predicate(&mapping, vec![Value::Int64(Some(1)), Value::Int32(None)])
            .unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
    }

    #[test]
    fn parameter_limit() {
        let generic = generator(GenericSqlWriter::new());
        let within = Predicate::is_in("id", 0..999i64);
        assert_eq!(
            generic
                .select::<Customer>(Some(&within), &[])
                .unwrap()
                .params
                .len(),
            999
        );
        let over = Predicate::is_in("id", 0..1000i64);
        let error = generic.select::<Customer>(Some(&over), &[]).unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
        assert!(error.to_string().contains("1000 parameters, the limit is 999"));
        assert!(generic.count::<Customer>(Some(&over)).is_err());
        assert!(generic.delete_where::<Customer>(&over).is_err());
        assert!(
            generator(PostgresSqlWriter)
                .delete_where::<Customer>(&over)
                .is_ok()
        );

        // Shared by every position of a batch
        let queries = MultiplePredicate::new()
            .add::<Customer>(Some(Predicate::is_in("id", 0..600i64)), vec![])
            .add::<OrderLine>(Some(Predicate::is_in("line", 0..600)), vec![]);
        let error = generic.multiple(&queries).unwrap_err();
        assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
        assert!(generic.multiple_query(&queries.queries()[0]).is_ok());
    }

    #[test]
    fn transactions() {
        fn begin(writer: &dyn SqlWriter, isolation: IsolationLevel) -> String {
            let mut out = String::new();
            writer.write_transaction_begin(&mut out, isolation);
            out
        }
        assert_eq!(
            begin(&GenericSqlWriter::new(), IsolationLevel::Snapshot),
            "START TRANSACTION ISOLATION LEVEL REPEATABLE READ;"
        );
        assert_eq!(
            begin(&PostgresSqlWriter, IsolationLevel::Serializable),
            "BEGIN ISOLATION LEVEL SERIALIZABLE;"
        );
        assert_eq!(
            begin(&MySqlSqlWriter, IsolationLevel::ReadCommitted),
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED;\nSTART TRANSACTION;"
        );
        assert_eq!(
            begin(&SqlServerSqlWriter, IsolationLevel::Snapshot),
            "SET TRANSACTION ISOLATION LEVEL SNAPSHOT;\nBEGIN TRANSACTION;"
        );
        let mut out = String::new();
        SqlServerSqlWriter.write_transaction_rollback(&mut out);
        assert_eq!(out, "ROLLBACK TRANSACTION;");
    }
}
