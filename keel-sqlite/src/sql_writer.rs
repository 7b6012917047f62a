use keel_core::{ColumnMap, IsolationLevel, Mapping, SqlWriter, Value, writer::Context};
use std::fmt::Write;

/// SQLite dialect.
///
/// Decimals use NUMERIC affinity so they compare and sort as numbers. Uuids and
/// temporal values are stored as TEXT. The identity key is the rowid alias `INTEGER PRIMARY KEY`.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter;

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn max_parameters(&self) -> usize {
        32766
    }

    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..)
            | Value::Int8(..)
            | Value::Int16(..)
            | Value::Int32(..)
            | Value::Int64(..)
            | Value::UInt8(..)
            | Value::UInt16(..)
            | Value::UInt32(..)
            | Value::UInt64(..) => out.push_str("INTEGER"),
            Value::Float32(..) | Value::Float64(..) => out.push_str("REAL"),
            Value::Decimal(..) => out.push_str("NUMERIC"),
            Value::Blob(..) => out.push_str("BLOB"),
            Value::Varchar(..)
            | Value::Date(..)
            | Value::Time(..)
            | Value::Timestamp(..)
            | Value::TimestampWithTimezone(..)
            | Value::Uuid(..) => out.push_str("TEXT"),
            Value::Null => log::error!("Unexpected keel::Value::Null, it does not have a SQL type"),
        }
    }

    fn write_column_identity(&self, _context: &mut Context, out: &mut String, _column: &ColumnMap) {
        out.push_str("INTEGER");
    }

    fn write_insert_returning(
        &self,
        context: &mut Context,
        out: &mut String,
        _mapping: &Mapping,
        column: &ColumnMap,
    ) -> bool {
        out.push_str("\nRETURNING ");
        self.write_identifier_quoted(context, out, &column.column);
        true
    }

    fn write_transaction_begin(&self, out: &mut String, isolation: IsolationLevel) {
        let _ = write!(
            out,
            "BEGIN {};",
            match isolation {
                IsolationLevel::RepeatableRead | IsolationLevel::Serializable => "IMMEDIATE",
                _ => "DEFERRED",
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use keel_core::{EntityDescriptor, FieldDescriptor, KeyType};

    fn mapping() -> Mapping {
        let field = |property, value, nullable| FieldDescriptor {
            property,
            column: None,
            value,
            nullable,
            key: None,
            ignored: false,
            read_only: false,
        };
        Mapping::derive(&EntityDescriptor {
            type_name: "Invoice",
            table: None,
            schema: None,
            fields: vec![
                field("id", Value::Int64(None), false),
                field("total", Value::Decimal(None, 0, 0), false),
                field("issued", Value::Date(None), true),
            ],
        })
    }

    #[test]
    fn create_table() {
        let mapping = mapping();
        assert_eq!(mapping.identity().map(|c| c.key), Some(KeyType::Identity));
        let mut context = Context::default();
        let mut out = String::new();
        SqliteSqlWriter.write_create_table(&mut context, &mut out, &mapping, true);
        assert_eq!(
            out,
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "invoice" (
                "id" INTEGER PRIMARY KEY,
                "total" NUMERIC NOT NULL,
                "issued" TEXT
                );
            "#}
            .trim()
        );
    }

    #[test]
    fn insert_returns_the_rowid() {
        let mapping = mapping();
        let columns = mapping.insertable().collect::<Vec<_>>();
        let mut context = Context::default();
        let mut out = String::new();
        let returning = SqliteSqlWriter.write_insert(
            &mut context,
            &mut out,
            &mapping,
            &columns,
            vec![vec![Value::Varchar(Some("10.50".into())), Value::Date(None)]],
            mapping.identity(),
        );
        assert!(returning);
        assert_eq!(
            out,
            indoc! {r#"
                INSERT INTO "invoice" ("total", "issued") VALUES
                (?, ?)
                RETURNING "id";
            "#}
            .trim()
        );
        assert_eq!(context.params.len(), 2);
    }
}
