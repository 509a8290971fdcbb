//! Row queries: equality filters, sort keys and a limit.
//!
//! A [`Query`] is the only read shape the repositories need. It renders to
//! PostgREST query parameters for the HTTP store and can also be evaluated
//! directly against JSON rows, which is what the in-memory store does.
//!
//! Sorting follows Postgres defaults: `NULL` sorts after everything when
//! ascending and before everything when descending.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only rows where `column = value`.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Render as PostgREST query parameters.
    ///
    /// ```
    /// # use trilhos_admin::store::Query;
    /// let q = Query::new().eq("ativo", true).order_by("ordem", true).limit(5);
    /// assert_eq!(
    ///     q.to_params(),
    ///     vec![
    ///         ("select".to_string(), "*".to_string()),
    ///         ("ativo".to_string(), "eq.true".to_string()),
    ///         ("order".to_string(), "ordem.asc".to_string()),
    ///         ("limit".to_string(), "5".to_string()),
    ///     ]
    /// );
    /// ```
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for f in &self.filters {
            let rendered = match &f.value {
                Value::Null => "is.null".to_string(),
                other => format!("eq.{}", scalar_text(other)),
            };
            params.push((f.column.clone(), rendered));
        }
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(n) = self.limit {
            params.push(("limit".to_string(), n.to_string()));
        }
        params
    }

    /// Does a row pass every filter?
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| {
            let cell = row.get(&f.column).unwrap_or(&Value::Null);
            values_equal(cell, &f.value)
        })
    }

    /// Filter, sort (stable) and truncate a set of rows.
    pub fn apply(&self, rows: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut out: Vec<Value> = rows.into_iter().filter(|r| self.matches(r)).collect();
        out.sort_by(|a, b| self.compare_rows(a, b));
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }

    fn compare_rows(&self, a: &Value, b: &Value) -> Ordering {
        for o in &self.order {
            let left = a.get(&o.column).unwrap_or(&Value::Null);
            let right = b.get(&o.column).unwrap_or(&Value::Null);
            let ord = compare_values(left, right);
            let ord = if o.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(cell: &Value, wanted: &Value) -> bool {
    match (cell, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

/// Total order over JSON scalars, with `NULL` greatest.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}
