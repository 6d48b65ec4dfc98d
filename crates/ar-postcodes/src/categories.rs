//! Category filters and regrouping built from structured configuration.
//!
//! A filter is a small expression tree evaluated against a record; nothing here interprets
//! strings as code.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
    error::LoadError,
    record::{FieldValue, LocationRecord},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// The column's value is one of `values`. A missing column is never a member.
    IsIn {
        column: String,
        values: Vec<FieldValue>,
    },
    Not(Box<Expr>),
    /// All of the inner expressions hold. Empty is always true.
    And(Vec<Expr>),
}

impl Expr {
    #[must_use]
    pub fn is_in<V: Into<FieldValue>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::IsIn {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        match self {
            Self::And(mut exprs) => {
                exprs.push(rhs);
                Self::And(exprs)
            }
            lhs => Self::And(vec![lhs, rhs]),
        }
    }

    #[must_use]
    pub const fn always_true() -> Self {
        Self::And(Vec::new())
    }

    pub fn evaluate(&self, record: &LocationRecord) -> bool {
        match self {
            Self::IsIn { column, values } => record
                .get(column)
                .is_some_and(|value| values.contains(value)),
            Self::Not(inner) => !inner.evaluate(record),
            Self::And(exprs) => exprs.iter().all(|expr| expr.evaluate(record)),
        }
    }
}

/// Values of `column` listed in `grouping` are renamed to `name`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Grouping {
    pub grouping: Vec<FieldValue>,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CategoryConfig {
    /// Column to the category values whose records are dropped.
    #[serde(default)]
    pub drop_categories: BTreeMap<String, Vec<FieldValue>>,
    /// Column to the low-exposure categories merged into one group.
    #[serde(default)]
    pub group_categories: BTreeMap<String, Grouping>,
}

impl CategoryConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file_contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&file_contents)?)
    }

    /// Keeps a record only if none of its columns hold a dropped category.
    pub fn drop_filter(&self) -> Expr {
        self.drop_categories
            .iter()
            .fold(Expr::always_true(), |filter, (column, values)| {
                filter.and(Expr::is_in(column, values.iter().cloned()).not())
            })
    }

    pub fn regroup(&self, record: &mut LocationRecord) {
        for (column, grouping) in &self.group_categories {
            let grouped = record
                .get(column)
                .is_some_and(|value| grouping.grouping.contains(value));
            if grouped {
                record.insert(column.as_str(), grouping.name.as_str());
            }
        }
    }

    /// Drop filtered records and regroup the rest.
    pub fn apply<I>(&self, records: I) -> Vec<LocationRecord>
    where
        I: IntoIterator<Item = LocationRecord>,
    {
        let filter = self.drop_filter();
        records
            .into_iter()
            .filter(|record| filter.evaluate(record))
            .map(|mut record| {
                self.regroup(&mut record);
                record
            })
            .collect()
    }
}
