use crate::{
    ColumnMap, Direction, FieldPredicate, GroupOperator, IsolationLevel, KeyType, Mapping,
    Operator, Predicate, PredicateGroup, PropertyPredicate, Sort, TableRef, Value,
    possibly_parenthesized, separated_by,
    writer::{Context, Fragment},
};
use std::fmt::Write;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}
pub(crate) use write_integer;

/// Rows to skip and rows to return.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Dialect printer converting mappings and predicates into concrete SQL strings.
///
/// Every operand is bound through [`SqlWriter::write_parameter`], the text never
/// contains a literal value coming from the caller.
pub trait SqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Whether several statements can be sent as one command.
    fn supports_multiple_statements(&self) -> bool {
        false
    }

    /// Maximum number of parameters in one statement.
    fn max_parameters(&self) -> usize {
        999
    }

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    /// Render a table reference, schema qualified when a schema is set.
    fn write_table_ref(&self, context: &mut Context, out: &mut String, value: &TableRef) {
        if !value.schema.is_empty() {
            self.write_identifier_quoted(context, out, &value.schema);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, &value.name);
    }

    /// Render a column optionally qualifying with schema/table.
    fn write_column_ref(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        column: &ColumnMap,
    ) {
        if context.qualify_columns {
            self.write_table_ref(context, out, &mapping.table);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, &column.column);
    }

    /// Render a projected column, aliased to the property when the names differ.
    fn write_column_projection(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        column: &ColumnMap,
    ) {
        self.write_column_ref(context, out, mapping, column);
        if column.column != column.property {
            out.push_str(" AS ");
            self.write_identifier_quoted(context, out, column.property);
        }
    }

    /// Placeholder of the last bound parameter.
    fn write_parameter_marker(&self, _context: &mut Context, out: &mut String) {
        out.push('?');
    }

    /// Bind `value` and write its placeholder.
    fn write_parameter(&self, context: &mut Context, out: &mut String, value: Value) {
        context.params.push(value);
        self.write_parameter_marker(context, out);
    }

    /// Render the SQL type for a `Value` prototype.
    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int8(..) => out.push_str("SMALLINT"),
            Value::Int16(..) => out.push_str("SMALLINT"),
            Value::Int32(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::UInt8(..) => out.push_str("SMALLINT"),
            Value::UInt16(..) => out.push_str("INTEGER"),
            Value::UInt32(..) => out.push_str("BIGINT"),
            Value::UInt64(..) => out.push_str("NUMERIC(20)"),
            Value::Float32(..) => out.push_str("REAL"),
            Value::Float64(..) => out.push_str("DOUBLE PRECISION"),
            Value::Decimal(.., precision, scale) => {
                out.push_str("DECIMAL");
                if (precision, scale) != (&0, &0) {
                    let _ = write!(out, "({},{})", precision, scale);
                }
            }
            Value::Varchar(..) => out.push_str("VARCHAR"),
            Value::Blob(..) => out.push_str("BLOB"),
            Value::Date(..) => out.push_str("DATE"),
            Value::Time(..) => out.push_str("TIME"),
            Value::Timestamp(..) => out.push_str("TIMESTAMP"),
            Value::TimestampWithTimezone(..) => out.push_str("TIMESTAMP WITH TIME ZONE"),
            Value::Uuid(..) => out.push_str("UUID"),
            Value::Null => log::error!("Unexpected keel::Value::Null, it does not have a SQL type"),
        };
    }

    /// Render the definition of a database generated key column.
    fn write_column_identity(&self, context: &mut Context, out: &mut String, column: &ColumnMap) {
        self.write_column_type(context, out, &column.value);
        out.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }

    /// Render a predicate tree.
    fn write_predicate(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: &Predicate,
    ) {
        match predicate {
            Predicate::Field(v) => self.write_field_predicate(context, out, mapping, v),
            Predicate::Property(v) => self.write_property_predicate(context, out, mapping, v),
            Predicate::Group(v) => self.write_predicate_group(context, out, mapping, v),
        }
    }

    fn write_field_predicate(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: &FieldPredicate,
    ) {
        let Some(column) = mapping.column(&predicate.property) else {
            log::error!(
                "Property `{}` is not mapped by `{}`",
                predicate.property,
                mapping.entity
            );
            return;
        };
        self.write_column_ref(context, out, mapping, column);
        let operator = predicate.operator;
        let mut values = predicate.values.iter().cloned();
        match operator {
            Operator::Eq | Operator::Ne if predicate.values.first().is_some_and(Value::is_null) => {
                if (operator == Operator::Eq) != predicate.not {
                    out.push_str(" IS NULL");
                } else {
                    out.push_str(" IS NOT NULL");
                }
            }
            Operator::Between => {
                let _ = write!(out, " {} ", operator.sql(predicate.not));
                self.write_parameter(context, out, values.next().unwrap_or_default());
                out.push_str(" AND ");
                self.write_parameter(context, out, values.next().unwrap_or_default());
            }
            Operator::In => {
                let _ = write!(out, " {} (", operator.sql(predicate.not));
                separated_by(
                    out,
                    values,
                    |out, v| self.write_parameter(context, out, v),
                    ", ",
                );
                out.push(')');
            }
            _ => {
                let _ = write!(out, " {} ", operator.sql(predicate.not));
                self.write_parameter(context, out, values.next().unwrap_or_default());
            }
        }
    }

    fn write_property_predicate(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: &PropertyPredicate,
    ) {
        let (Some(left), Some(right)) = (
            mapping.column(&predicate.property),
            mapping.column(&predicate.other),
        ) else {
            log::error!(
                "Properties `{}` and `{}` must both be mapped by `{}`",
                predicate.property,
                predicate.other,
                mapping.entity
            );
            return;
        };
        self.write_column_ref(context, out, mapping, left);
        let _ = write!(out, " {} ", predicate.operator.sql(predicate.not));
        self.write_column_ref(context, out, mapping, right);
    }

    fn write_predicate_group(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        group: &PredicateGroup,
    ) {
        match group.predicates.as_slice() {
            [] => out.push_str(match group.operator {
                GroupOperator::And => "(1=1)",
                GroupOperator::Or => "(1=0)",
            }),
            [single] => self.write_predicate(context, out, mapping, single),
            predicates => {
                let separator = match group.operator {
                    GroupOperator::And => " AND ",
                    GroupOperator::Or => " OR ",
                };
                possibly_parenthesized!(
                    out,
                    true,
                    separated_by(
                        out,
                        predicates,
                        |out, v| self.write_predicate(context, out, mapping, v),
                        separator,
                    )
                );
            }
        }
    }

    /// Render the ORDER BY clause (nothing when `sorts` is empty).
    fn write_order_by(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        sorts: &[Sort],
    ) {
        let sorts = sorts
            .iter()
            .filter_map(|s| mapping.column(&s.property).map(|c| (c, s.direction)))
            .collect::<Vec<_>>();
        if sorts.is_empty() {
            return;
        }
        out.push_str("\nORDER BY ");
        context.with_fragment(Fragment::SqlSelectOrderBy, |context| {
            separated_by(
                out,
                sorts,
                |out, (column, direction)| {
                    self.write_column_ref(context, out, mapping, column);
                    out.push_str(match direction {
                        Direction::Ascending => " ASC",
                        Direction::Descending => " DESC",
                    });
                },
                ", ",
            );
        });
    }

    /// Render the paging clause, the statement is already ordered.
    fn write_paging(&self, _context: &mut Context, out: &mut String, window: &Window) {
        out.push_str("\nLIMIT ");
        write_integer!(out, window.limit);
        out.push_str(" OFFSET ");
        write_integer!(out, window.offset);
    }

    /// Render the clause returning the generated key of an insert.
    ///
    /// Returns `false` when the dialect reports the key through the affected rows metadata.
    fn write_insert_returning(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _mapping: &Mapping,
        _column: &ColumnMap,
    ) -> bool {
        false
    }

    fn write_transaction_begin(&self, out: &mut String, isolation: IsolationLevel) {
        let _ = write!(
            out,
            "START TRANSACTION ISOLATION LEVEL {};",
            match isolation {
                IsolationLevel::Snapshot => IsolationLevel::RepeatableRead,
                v => v,
            }
            .to_sql()
        );
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }

    /// Emit CREATE TABLE with columns and the primary key.
    fn write_create_table(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        if_not_exists: bool,
    ) {
        out.reserve(64 + mapping.columns.len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("CREATE TABLE ");
        if if_not_exists {
            out.push_str("IF NOT EXISTS ");
        }
        context.with_fragment(Fragment::SqlCreateTable, |context| {
            self.write_table_ref(context, out, &mapping.table);
            out.push_str(" (\n");
            let keys = mapping.keys().count();
            separated_by(
                out,
                &mapping.columns,
                |out, column| {
                    self.write_identifier_quoted(context, out, &column.column);
                    out.push(' ');
                    if column.key == KeyType::Identity {
                        self.write_column_identity(context, out, column);
                    } else {
                        self.write_column_type(context, out, &column.value);
                        if !column.nullable {
                            out.push_str(" NOT NULL");
                        }
                    }
                    if column.is_key() && keys == 1 {
                        out.push_str(" PRIMARY KEY");
                    }
                },
                ",\n",
            );
            if keys > 1 {
                out.push_str(",\nPRIMARY KEY (");
                separated_by(
                    out,
                    mapping.keys(),
                    |out, v| self.write_identifier_quoted(context, out, &v.column),
                    ", ",
                );
                out.push(')');
            }
            out.push_str("\n);");
        });
    }

    /// Emit DROP TABLE statement.
    fn write_drop_table(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        if_exists: bool,
    ) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DROP TABLE ");
        if if_exists {
            out.push_str("IF EXISTS ");
        }
        context.with_fragment(Fragment::SqlDropTable, |context| {
            self.write_table_ref(context, out, &mapping.table);
        });
        out.push(';');
    }

    /// Emit SELECT statement (projection, FROM, WHERE, ORDER, paging).
    fn write_select(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        window: Option<&Window>,
    ) {
        out.reserve(128 + mapping.columns.len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT ");
        context.with_fragment(Fragment::SqlSelect, |context| {
            separated_by(
                out,
                &mapping.columns,
                |out, column| self.write_column_projection(context, out, mapping, column),
                ", ",
            );
        });
        out.push_str("\nFROM ");
        context.with_fragment(Fragment::SqlSelectFrom, |context| {
            self.write_table_ref(context, out, &mapping.table);
        });
        if let Some(predicate) = predicate {
            out.push_str("\nWHERE ");
            context.with_fragment(Fragment::SqlSelectWhere, |context| {
                self.write_predicate(context, out, mapping, predicate);
            });
        }
        self.write_order_by(context, out, mapping, sorts);
        if let Some(window) = window {
            self.write_paging(context, out, window);
        }
        out.push(';');
    }

    /// Emit SELECT COUNT(*) statement.
    fn write_count(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: Option<&Predicate>,
    ) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT COUNT(*)\nFROM ");
        context.with_fragment(Fragment::SqlCount, |context| {
            self.write_table_ref(context, out, &mapping.table);
            if let Some(predicate) = predicate {
                out.push_str("\nWHERE ");
                self.write_predicate(context, out, mapping, predicate);
            }
        });
        out.push(';');
    }

    /// Emit INSERT statement, one VALUES tuple per row.
    ///
    /// Returns whether a returning clause for `identity` was written.
    fn write_insert(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        columns: &[&ColumnMap],
        rows: Vec<Vec<Value>>,
        identity: Option<&ColumnMap>,
    ) -> bool {
        out.reserve(128 + columns.len() * 32 * rows.len().max(1));
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("INSERT INTO ");
        context.with_fragment(Fragment::SqlInsertInto, |context| {
            self.write_table_ref(context, out, &mapping.table);
        });
        if columns.is_empty() {
            out.push_str(" DEFAULT VALUES");
        } else {
            out.push_str(" (");
            separated_by(
                out,
                columns,
                |out, v| self.write_identifier_quoted(context, out, &v.column),
                ", ",
            );
            out.push_str(") VALUES\n");
            context.with_fragment(Fragment::SqlInsertIntoValues, |context| {
                separated_by(
                    out,
                    rows,
                    |out, row| {
                        out.push('(');
                        separated_by(
                            out,
                            row,
                            |out, v| self.write_parameter(context, out, v),
                            ", ",
                        );
                        out.push(')');
                    },
                    ",\n",
                );
            });
        }
        let returning = identity.is_some_and(|column| {
            context.with_fragment(Fragment::SqlInsertIntoReturning, |context| {
                self.write_insert_returning(context, out, mapping, column)
            })
        });
        if !out.ends_with(';') {
            out.push(';');
        }
        returning
    }

    /// Emit UPDATE statement scoped by `key`.
    fn write_update(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        values: Vec<(&ColumnMap, Value)>,
        key: &Predicate,
    ) {
        out.reserve(128 + values.len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("UPDATE ");
        context.with_fragment(Fragment::SqlUpdate, |context| {
            self.write_table_ref(context, out, &mapping.table);
        });
        out.push_str(" SET\n");
        context.with_fragment(Fragment::SqlUpdateSet, |context| {
            separated_by(
                out,
                values,
                |out, (column, value)| {
                    self.write_identifier_quoted(context, out, &column.column);
                    out.push_str(" = ");
                    self.write_parameter(context, out, value);
                },
                ",\n",
            );
        });
        out.push_str("\nWHERE ");
        context.with_fragment(Fragment::SqlUpdateWhere, |context| {
            self.write_predicate(context, out, mapping, key);
        });
        out.push(';');
    }

    /// Emit DELETE statement with WHERE clause.
    fn write_delete(
        &self,
        context: &mut Context,
        out: &mut String,
        mapping: &Mapping,
        predicate: &Predicate,
    ) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DELETE FROM ");
        context.with_fragment(Fragment::SqlDeleteFrom, |context| {
            self.write_table_ref(context, out, &mapping.table);
        });
        out.push_str("\nWHERE ");
        context.with_fragment(Fragment::SqlDeleteFromWhere, |context| {
            self.write_predicate(context, out, mapping, predicate);
        });
        out.push(';');
    }
}

/// Fallback ANSI SQL writer: double quoted identifiers, `?` markers, `LIMIT .. OFFSET ..`.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub const fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
