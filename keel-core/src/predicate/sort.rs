use crate::{Mapping, Result};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One ORDER BY term. A list of sorts is applied in list order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sort {
    pub property: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    pub fn validate(&self, mapping: &Mapping) -> Result<()> {
        mapping.require(&self.property).map(|_| ())
    }
}
