//! Attribute search criteria.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::LayerId;

/// Comparison operators allowed in a single-predicate filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<>")]
    Ne,
}

impl ComparisonOperator {
    /// Every operator, in the order offered for numeric fields.
    pub const ALL: [ComparisonOperator; 6] = [
        ComparisonOperator::Eq,
        ComparisonOperator::Gt,
        ComparisonOperator::Lt,
        ComparisonOperator::Ge,
        ComparisonOperator::Le,
        ComparisonOperator::Ne,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Ne => "<>",
        }
    }

    /// Human-readable label for search summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "equal to",
            ComparisonOperator::Gt => "greater than",
            ComparisonOperator::Lt => "less than",
            ComparisonOperator::Ge => "greater than or equal to",
            ComparisonOperator::Le => "less than or equal to",
            ComparisonOperator::Ne => "not equal to",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == s.trim())
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The criteria of the last attribute search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCriteria {
    pub layer: LayerId,
    /// Title shown in summaries
    pub layer_title: String,
    pub field: String,
    pub operator: ComparisonOperator,
    /// Raw user input, kept as typed
    pub value: String,
}

impl SearchCriteria {
    /// One-line description, e.g. "Buildings: height greater than 50".
    pub fn summary(&self) -> String {
        format!(
            "{}: {} {} {}",
            self.layer_title,
            self.field,
            self.operator.label(),
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols_roundtrip() {
        for op in ComparisonOperator::ALL {
            assert_eq!(ComparisonOperator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(ComparisonOperator::from_symbol("LIKE"), None);
        assert_eq!(ComparisonOperator::from_symbol("!="), None);
    }

    #[test]
    fn test_summary() {
        let criteria = SearchCriteria {
            layer: LayerId::new("city", "buildings"),
            layer_title: "Buildings".into(),
            field: "height".into(),
            operator: ComparisonOperator::Gt,
            value: "50".into(),
        };
        assert_eq!(criteria.summary(), "Buildings: height greater than 50");
    }
}
