// Path: crates/api/src/store/query.rs
use super::{Condition, Document, Filter, FindOptions, SortOrder};
use serde_json::Value;
use std::cmp::Ordering;

/// Resolves a dotted path inside a document.
pub fn field<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    parts.try_fold(doc.get(first)?, |v, p| v.get(p))
}

/// Orders two scalar values of the same kind. Mixed kinds are incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_u64(), y.as_u64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    compare(a, b).map_or(a == b, |o| o == Ordering::Equal)
}

fn satisfies(value: Option<&Value>, condition: &Condition) -> bool {
    match (condition, value) {
        (Condition::Exists(want), v) => v.is_some() == *want,
        (Condition::Eq(Value::Null), None) => true,
        (Condition::Eq(op), Some(v)) => equal(v, op),
        (Condition::Ne(op), Some(v)) => !equal(v, op),
        (Condition::Ne(_), None) => true,
        (Condition::In(ops), Some(v)) => ops.iter().any(|op| equal(v, op)),
        (Condition::Lt(op), Some(v)) => compare(v, op) == Some(Ordering::Less),
        (Condition::Lte(op), Some(v)) => {
            matches!(compare(v, op), Some(Ordering::Less | Ordering::Equal))
        }
        (Condition::Gt(op), Some(v)) => compare(v, op) == Some(Ordering::Greater),
        (Condition::Gte(op), Some(v)) => {
            matches!(compare(v, op), Some(Ordering::Greater | Ordering::Equal))
        }
        _ => false,
    }
}

/// True if `doc` satisfies every clause of `filter`.
pub fn matches(doc: &Document, filter: &Filter) -> bool {
    filter
        .clauses()
        .iter()
        .all(|(path, condition)| satisfies(field(doc, path), condition))
}

/// Keeps only the projected top-level fields. An empty projection keeps all.
pub fn project(doc: Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return doc;
    }
    doc.into_iter()
        .filter(|(k, _)| projection.contains(&k.as_str()))
        .collect()
}

fn order_by(a: &Document, b: &Document, sort: &[(String, SortOrder)]) -> Ordering {
    for (path, order) in sort {
        let ord = match (field(a, path), field(b, path)) {
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ord = match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Sorts, limits and projects a set of matched documents.
pub fn finish(mut docs: Vec<Document>, projection: &[&str], options: &FindOptions) -> Vec<Document> {
    if !options.sort.is_empty() {
        docs.sort_by(|a, b| order_by(a, b, &options.sort));
    }
    if let Some(limit) = options.limit {
        docs.truncate(limit);
    }
    docs.into_iter().map(|d| project(d, projection)).collect()
}
