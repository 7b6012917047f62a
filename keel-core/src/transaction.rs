/// Transaction isolation level.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    /// Read committed (default)
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
    /// Row versioning, dialects without it fall back to their closest level.
    Snapshot,
}

impl IsolationLevel {
    pub fn to_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Snapshot => "SNAPSHOT",
        }
    }
}

/// Handle of a transaction started on a [`crate::Connection`].
///
/// It is consumed by `commit` or `rollback`, so a finished transaction cannot be
/// used again. The connection that created it checks the id on every use.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Transaction {
    id: u64,
    isolation: IsolationLevel,
}

impl Transaction {
    pub fn new(id: u64, isolation: IsolationLevel) -> Self {
        Self { id, isolation }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }
}
