use crate::{
    GenericSqlWriter, IsolationLevel, SqlWriter, Value,
    writer::{Context, Window, sql_writer::write_integer},
};
use std::fmt::Write;

/// MySQL and MariaDB dialect.
///
/// The generated key is read from the affected rows metadata of the insert.
#[derive(Default, Debug, Clone, Copy)]
pub struct MySqlSqlWriter;

impl SqlWriter for MySqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn supports_multiple_statements(&self) -> bool {
        true
    }

    fn max_parameters(&self) -> usize {
        65535
    }

    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(context, out, value, '`', "``");
        out.push('`');
    }

    fn write_column_type(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Int8(..) => out.push_str("TINYINT"),
            Value::UInt8(..) => out.push_str("TINYINT UNSIGNED"),
            Value::UInt16(..) => out.push_str("SMALLINT UNSIGNED"),
            Value::UInt32(..) => out.push_str("INTEGER UNSIGNED"),
            Value::UInt64(..) => out.push_str("BIGINT UNSIGNED"),
            Value::Float32(..) => out.push_str("FLOAT"),
            Value::Float64(..) => out.push_str("DOUBLE"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Timestamp(..) | Value::TimestampWithTimezone(..) => out.push_str("DATETIME"),
            Value::Uuid(..) => out.push_str("CHAR(36)"),
            _ => GenericSqlWriter.write_column_type(context, out, value),
        }
    }

    fn write_column_identity(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &crate::ColumnMap,
    ) {
        self.write_column_type(context, out, &column.value);
        out.push_str(" AUTO_INCREMENT");
    }

    fn write_paging(&self, _context: &mut Context, out: &mut String, window: &Window) {
        out.push_str("\nLIMIT ");
        write_integer!(out, window.offset);
        out.push_str(", ");
        write_integer!(out, window.limit);
    }

    fn write_transaction_begin(&self, out: &mut String, isolation: IsolationLevel) {
        let _ = write!(
            out,
            "SET TRANSACTION ISOLATION LEVEL {};\nSTART TRANSACTION;",
            match isolation {
                IsolationLevel::Snapshot => IsolationLevel::RepeatableRead,
                v => v,
            }
            .to_sql()
        );
    }
}
