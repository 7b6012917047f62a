use crate::{Statement, Value};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    SqlCount,
    SqlCreateTable,
    SqlDeleteFrom,
    SqlDeleteFromWhere,
    SqlDropTable,
    SqlInsertInto,
    SqlInsertIntoReturning,
    SqlInsertIntoValues,
    SqlSelect,
    SqlSelectFrom,
    SqlSelectOrderBy,
    SqlSelectWhere,
    SqlUpdate,
    SqlUpdateSet,
    SqlUpdateWhere,
}

/// State carried while writing one statement: the current fragment and the
/// parameters bound so far.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Context {
    pub fragment: Fragment,
    pub qualify_columns: bool,
    pub params: Vec<Value>,
}

impl Context {
    pub fn new(fragment: Fragment, qualify_columns: bool) -> Self {
        Self {
            fragment,
            qualify_columns,
            params: Vec::new(),
        }
    }

    /// Number of parameters bound so far, the 1-based index of the last marker.
    pub fn counter(&self) -> usize {
        self.params.len()
    }

    /// Runs `f` with `fragment` as the current fragment, restoring the previous one afterwards.
    pub fn with_fragment<R>(&mut self, fragment: Fragment, f: impl FnOnce(&mut Context) -> R) -> R {
        let previous = self.fragment;
        self.fragment = fragment;
        let result = f(self);
        self.fragment = previous;
        result
    }

    pub fn into_statement(self, sql: String) -> Statement {
        Statement::new(sql, self.params)
    }
}
