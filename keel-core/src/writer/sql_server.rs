use crate::{
    ColumnMap, GenericSqlWriter, IsolationLevel, Mapping, SqlWriter, Value,
    writer::{Context, Window, sql_writer::write_integer},
};
use std::fmt::Write;

/// Microsoft SQL Server dialect: bracketed identifiers and `@pN` markers.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqlServerSqlWriter;

impl SqlWriter for SqlServerSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn supports_multiple_statements(&self) -> bool {
        true
    }

    fn max_parameters(&self) -> usize {
        2098
    }

    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('[');
        self.write_escaped(context, out, value, ']', "]]");
        out.push(']');
    }

    fn write_parameter_marker(&self, context: &mut Context, out: &mut String) {
        out.push_str("@p");
        write_integer!(out, context.counter());
    }

    fn write_column_type(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BIT"),
            Value::Int8(..) | Value::UInt8(..) => out.push_str("TINYINT"),
            Value::Float64(..) => out.push_str("FLOAT"),
            Value::Varchar(..) => out.push_str("NVARCHAR(MAX)"),
            Value::Blob(..) => out.push_str("VARBINARY(MAX)"),
            Value::Timestamp(..) => out.push_str("DATETIME2"),
            Value::TimestampWithTimezone(..) => out.push_str("DATETIMEOFFSET"),
            Value::Uuid(..) => out.push_str("UNIQUEIDENTIFIER"),
            _ => GenericSqlWriter.write_column_type(context, out, value),
        }
    }

    fn write_column_identity(&self, context: &mut Context, out: &mut String, column: &ColumnMap) {
        self.write_column_type(context, out, &column.value);
        out.push_str(" IDENTITY(1,1)");
    }

    fn write_paging(&self, _context: &mut Context, out: &mut String, window: &Window) {
        out.push_str("\nOFFSET ");
        write_integer!(out, window.offset);
        out.push_str(" ROWS FETCH NEXT ");
        write_integer!(out, window.limit);
        out.push_str(" ROWS ONLY");
    }

    fn write_insert_returning(
        &self,
        _context: &mut Context,
        out: &mut String,
        _mapping: &Mapping,
        _column: &ColumnMap,
    ) -> bool {
        out.push_str(";\nSELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS [id];");
        true
    }

    fn write_transaction_begin(&self, out: &mut String, isolation: IsolationLevel) {
        let _ = write!(
            out,
            "SET TRANSACTION ISOLATION LEVEL {};\nBEGIN TRANSACTION;",
            isolation.to_sql()
        );
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT TRANSACTION;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK TRANSACTION;");
    }
}
