//! Declarative filter expressions.
//!
//! A [`Filter`] is an ordered mapping of `field[__op]` keys to values. Conditions
//! on different fields are ANDed; conditions that share a base field under
//! different operators are ORed together first, so
//! `expiry_date = NULL, expiry_date__gt = now` reads as
//! `("expiry_date" IS NULL OR "expiry_date" > $n)`.
//!
//! Values are always bound as parameters. [`Filter::to_inline_sql`] exists for
//! log output and must never be executed.

use std::fmt;

use crate::error::FilterError;
use crate::value::{Record, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
}

impl Op {
    const SUFFIXES: [(&'static str, Op); 6] = [
        ("__ne", Op::Ne),
        ("__gt", Op::Gt),
        ("__ge", Op::Ge),
        ("__lt", Op::Lt),
        ("__le", Op::Le),
        ("__in", Op::In),
    ];

    fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::In => "IN",
        }
    }
}

/// Split a condition key into its base field and operator.
pub fn parse_key(key: &str) -> Result<(&str, Op), FilterError> {
    let (field, op) = Op::SUFFIXES
        .iter()
        .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|field| (field, *op)))
        .unwrap_or((key, Op::Eq));

    validate_identifier(field)?;
    Ok((field, op))
}

/// Field and table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    if valid_start && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Ok(())
    } else {
        Err(FilterError::InvalidField(name.to_owned()))
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition. Re-using a key replaces its value in place.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and group the conditions.
    pub fn predicate(&self) -> Result<Predicate, FilterError> {
        let mut groups: Vec<Group> = Vec::new();

        for (key, value) in &self.entries {
            let (field, op) = parse_key(key)?;
            let condition = Condition::new(field, op, value.clone())?;

            match groups.iter_mut().find(|group| group.field == field) {
                Some(group) => group.conditions.push(condition),
                None => groups.push(Group {
                    field: field.to_owned(),
                    conditions: vec![condition],
                }),
            }
        }

        Ok(Predicate { groups })
    }

    /// Compile to a `WHERE`-ready predicate whose placeholders start at `$first_placeholder`.
    pub fn compile(&self, first_placeholder: usize) -> Result<CompiledFilter, FilterError> {
        Ok(self.predicate()?.compile(first_placeholder))
    }

    /// Fully inlined rendering for logs.
    pub fn to_inline_sql(&self) -> Result<String, FilterError> {
        Ok(self.predicate()?.render(&mut Placeholders::Inline))
    }

    pub fn matches(&self, record: &Record) -> Result<bool, FilterError> {
        Ok(self.predicate()?.matches(record))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (key, value)| filter.with(key, value))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    field: String,
    op: Op,
    value: Value,
}

impl Condition {
    fn new(field: &str, op: Op, value: Value) -> Result<Self, FilterError> {
        match (&value, op) {
            (Value::List(items), Op::In) => {
                if items.is_empty() {
                    return Err(FilterError::EmptyIn(field.to_owned()));
                }
                if items
                    .iter()
                    .any(|item| matches!(item, Value::Null | Value::List(_)))
                {
                    return Err(FilterError::InvalidListElement(field.to_owned()));
                }
            }
            (_, Op::In) => return Err(FilterError::InRequiresList(field.to_owned())),
            (Value::List(_), _) => return Err(FilterError::UnexpectedList(field.to_owned())),
            _ => {}
        }

        Ok(Self {
            field: field.to_owned(),
            op,
            value,
        })
    }

    fn render(&self, placeholders: &mut Placeholders) -> String {
        let column = quote_identifier(&self.field);
        match (&self.value, self.op) {
            (Value::Null, Op::Ne) => format!("{column} IS NOT NULL"),
            (Value::Null, _) => format!("{column} IS NULL"),
            (Value::List(items), Op::In) => {
                let slots: Vec<String> = items.iter().map(|item| placeholders.slot(item)).collect();
                format!("{column} IN ({})", slots.join(", "))
            }
            (value, op) => format!("{column} {} {}", op.sql(), placeholders.slot(value)),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let column = record.get(&self.field).unwrap_or(&Value::Null);
        match (&self.value, self.op) {
            (Value::Null, Op::Ne) => !column.is_null(),
            (Value::Null, _) => column.is_null(),
            (Value::List(items), Op::In) => items
                .iter()
                .any(|item| column.sql_cmp(item) == Some(std::cmp::Ordering::Equal)),
            (value, op) => column.sql_cmp(value).is_some_and(|ordering| match op {
                Op::Eq => ordering.is_eq(),
                Op::Ne => ordering.is_ne(),
                Op::Gt => ordering.is_gt(),
                Op::Ge => ordering.is_ge(),
                Op::Lt => ordering.is_lt(),
                Op::Le => ordering.is_le(),
                Op::In => false,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Group {
    field: String,
    conditions: Vec<Condition>,
}

/// A validated, grouped filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    groups: Vec<Group>,
}

impl Predicate {
    pub fn compile(&self, first_placeholder: usize) -> CompiledFilter {
        let mut placeholders = Placeholders::Bind {
            next: first_placeholder,
            values: Vec::new(),
        };
        let predicate = self.render(&mut placeholders);
        let values = match placeholders {
            Placeholders::Bind { values, .. } => values,
            Placeholders::Inline => Vec::new(),
        };

        CompiledFilter { predicate, values }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.groups.iter().all(|group| {
            group
                .conditions
                .iter()
                .any(|condition| condition.matches(record))
        })
    }

    fn render(&self, placeholders: &mut Placeholders) -> String {
        if self.groups.is_empty() {
            return "TRUE".to_owned();
        }

        let clauses: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                let alternatives: Vec<String> = group
                    .conditions
                    .iter()
                    .map(|condition| condition.render(placeholders))
                    .collect();
                if alternatives.len() == 1 {
                    alternatives.into_iter().collect()
                } else {
                    format!("({})", alternatives.join(" OR "))
                }
            })
            .collect();

        clauses.join(" AND ")
    }
}

enum Placeholders {
    Bind { next: usize, values: Vec<Value> },
    Inline,
}

impl Placeholders {
    fn slot(&mut self, value: &Value) -> String {
        match self {
            Placeholders::Bind { next, values } => {
                let slot = format!("${next}");
                *next += 1;
                values.push(value.clone());
                slot
            }
            Placeholders::Inline => value.to_sql_literal(),
        }
    }
}

/// A predicate with `$n` placeholders and the values to bind, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFilter {
    pub predicate: String,
    pub values: Vec<Value>,
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate)
    }
}
