use crate::{
    ColumnMap, GenericSqlWriter, IsolationLevel, Mapping, SqlWriter, Value,
    writer::{Context, sql_writer::write_integer},
};
use std::fmt::Write;

/// PostgreSQL dialect: numbered `$n` markers and `RETURNING` for generated keys.
#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter;

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn max_parameters(&self) -> usize {
        65535
    }

    fn write_parameter_marker(&self, context: &mut Context, out: &mut String) {
        out.push('$');
        write_integer!(out, context.counter());
    }

    fn write_column_type(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Int8(..) | Value::UInt8(..) => out.push_str("SMALLINT"),
            Value::Float64(..) => out.push_str("DOUBLE PRECISION"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Blob(..) => out.push_str("BYTEA"),
            Value::TimestampWithTimezone(..) => out.push_str("TIMESTAMPTZ"),
            _ => GenericSqlWriter.write_column_type(context, out, value),
        }
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
            "BEGIN ISOLATION LEVEL {};",
            match isolation {
                IsolationLevel::Snapshot => IsolationLevel::RepeatableRead,
                v => v,
            }
            .to_sql()
        );
    }
}
