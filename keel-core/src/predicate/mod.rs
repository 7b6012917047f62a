mod sort;

pub use sort::*;

use crate::{DbError, Mapping, Result, Value};
use std::fmt::{self, Display};

/// Comparison applied by a [`FieldPredicate`] or a [`PropertyPredicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    Between,
    In,
}

impl Operator {
    /// Number of operands accepted: `(min, max)`.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Operator::Between => (2, 2),
            Operator::In => (1, usize::MAX),
            _ => (1, 1),
        }
    }

    pub fn is_comparison(&self) -> bool {
        !matches!(self, Operator::Like | Operator::Between | Operator::In)
    }

    /// SQL token of the operator, `negated` selects the opposite comparison.
    pub fn sql(&self, negated: bool) -> &'static str {
        match (self, negated) {
            (Operator::Eq, false) | (Operator::Ne, true) => "=",
            (Operator::Ne, false) | (Operator::Eq, true) => "<>",
            (Operator::Gt, false) | (Operator::Le, true) => ">",
            (Operator::Ge, false) | (Operator::Lt, true) => ">=",
            (Operator::Lt, false) | (Operator::Ge, true) => "<",
            (Operator::Le, false) | (Operator::Gt, true) => "<=",
            (Operator::Like, false) => "LIKE",
            (Operator::Like, true) => "NOT LIKE",
            (Operator::Between, false) => "BETWEEN",
            (Operator::Between, true) => "NOT BETWEEN",
            (Operator::In, false) => "IN",
            (Operator::In, true) => "NOT IN",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql(false))
    }
}

/// Property compared with one or more literal operands.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub property: String,
    pub operator: Operator,
    pub values: Vec<Value>,
    pub not: bool,
}

/// Property compared with another property of the same entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPredicate {
    pub property: String,
    pub operator: Operator,
    pub other: String,
    pub not: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupOperator {
    And,
    Or,
}

/// Ordered list of predicates joined by the same operator.
///
/// An empty `And` group matches every row, an empty `Or` group matches none.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateGroup {
    pub operator: GroupOperator,
    pub predicates: Vec<Predicate>,
}

impl PredicateGroup {
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            operator: GroupOperator::And,
            predicates: predicates.into_iter().collect(),
        }
    }

    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            operator: GroupOperator::Or,
            predicates: predicates.into_iter().collect(),
        }
    }
}

/// Dialect independent filter expression over the properties of one entity.
///
/// ```
/// use keel_core::{Predicate, PredicateGroup};
/// let filter = Predicate::eq("status", "active")
///     .and(Predicate::is_in("region", ["EU", "US"]))
///     .and(Predicate::from(PredicateGroup::any([
///         Predicate::ge("age", 18),
///         Predicate::is_null("age"),
///     ])));
/// assert_eq!(filter.parameters().count(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Field(FieldPredicate),
    Property(PropertyPredicate),
    Group(PredicateGroup),
}

macro_rules! comparison {
    ($($name:ident => $operator:ident),+ $(,)?) => {
        $(
            pub fn $name(property: impl Into<String>, value: impl Into<Value>) -> Self {
                Self::field(property, Operator::$operator, vec![value.into()])
            }
        )+
    };
}

impl Predicate {
    pub fn field(property: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Predicate::Field(FieldPredicate {
            property: property.into(),
            operator,
            values,
            not: false,
        })
    }

    comparison! {
        eq => Eq,
        ne => Ne,
        gt => Gt,
        ge => Ge,
        lt => Lt,
        le => Le,
        like => Like,
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::field(property, Operator::Eq, vec![Value::Null])
    }

    pub fn is_not_null(property: impl Into<String>) -> Self {
        Self::field(property, Operator::Ne, vec![Value::Null])
    }

    pub fn between(
        property: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::field(property, Operator::Between, vec![low.into(), high.into()])
    }

    pub fn is_in<V: Into<Value>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::field(
            property,
            Operator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Compares two properties of the same entity.
    pub fn compare(
        property: impl Into<String>,
        operator: Operator,
        other: impl Into<String>,
    ) -> Self {
        Predicate::Property(PropertyPredicate {
            property: property.into(),
            operator,
            other: other.into(),
            not: false,
        })
    }

    /// Logical negation. Groups are negated by flipping the operator and negating every member.
    pub fn not(self) -> Self {
        match self {
            Predicate::Field(mut v) => {
                v.not = !v.not;
                Predicate::Field(v)
            }
            Predicate::Property(mut v) => {
                v.not = !v.not;
                Predicate::Property(v)
            }
            Predicate::Group(v) => Predicate::Group(PredicateGroup {
                operator: match v.operator {
                    GroupOperator::And => GroupOperator::Or,
                    GroupOperator::Or => GroupOperator::And,
                },
                predicates: v.predicates.into_iter().map(Predicate::not).collect(),
            }),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        self.join(GroupOperator::And, other)
    }

    pub fn or(self, other: Predicate) -> Self {
        self.join(GroupOperator::Or, other)
    }

    fn join(self, operator: GroupOperator, other: Predicate) -> Self {
        match self {
            Predicate::Group(mut group) if group.operator == operator => {
                group.predicates.push(other);
                Predicate::Group(group)
            }
            _ => Predicate::Group(PredicateGroup {
                operator,
                predicates: vec![self, other],
            }),
        }
    }

    /// Operand values that will be bound, left to right.
    pub fn parameters(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Predicate::Field(v) => Box::new(v.values.iter().filter(move |value| {
                !(value.is_null() && matches!(v.operator, Operator::Eq | Operator::Ne))
            })),
            Predicate::Property(..) => Box::new(std::iter::empty()),
            Predicate::Group(v) => Box::new(v.predicates.iter().flat_map(Predicate::parameters)),
        }
    }

    /// Checks every property against the mapping and the operand count of every operator.
    pub fn validate(&self, mapping: &Mapping) -> Result<()> {
        match self {
            Predicate::Field(v) => {
                mapping.require(&v.property)?;
                let (min, max) = v.operator.arity();
                let len = v.values.len();
                if len < min || len > max {
                    let expected = match v.operator {
                        Operator::Between => "exactly 2 values".to_string(),
                        Operator::In => "at least 1 value".to_string(),
                        _ => "exactly 1 value".to_string(),
                    };
                    return Err(DbError::validation(
                        v.property.clone(),
                        format!("operator {} expects {}, got {}", v.operator, expected, len),
                    )
                    .into());
                }
                if v.values.iter().any(Value::is_null)
                    && !matches!(v.operator, Operator::Eq | Operator::Ne)
                {
                    return Err(DbError::validation(
                        v.property.clone(),
                        format!("operator {} does not accept NULL operands", v.operator),
                    )
                    .into());
                }
                Ok(())
            }
            Predicate::Property(v) => {
                mapping.require(&v.property)?;
                mapping.require(&v.other)?;
                if !v.operator.is_comparison() {
                    return Err(DbError::validation(
                        v.property.clone(),
                        format!("operator {} cannot compare two properties", v.operator),
                    )
                    .into());
                }
                Ok(())
            }
            Predicate::Group(v) => v.predicates.iter().try_for_each(|p| p.validate(mapping)),
        }
    }
}

impl From<FieldPredicate> for Predicate {
    fn from(value: FieldPredicate) -> Self {
        Predicate::Field(value)
    }
}

impl From<PropertyPredicate> for Predicate {
    fn from(value: PropertyPredicate) -> Self {
        Predicate::Property(value)
    }
}

impl From<PredicateGroup> for Predicate {
    fn from(value: PredicateGroup) -> Self {
        Predicate::Group(value)
    }
}
