use std::cmp::Ordering;

use serde_json::Value;

/// Comparison operator of a single filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    /// Operator names accepted in `field[op]=value` query keys.
    pub fn from_query_name(name: &str) -> Option<Op> {
        match name {
            "eq" => Some(Op::Eq),
            "ne" => Some(Op::Ne),
            "gt" => Some(Op::Gt),
            "gte" => Some(Op::Gte),
            "lt" => Some(Op::Lt),
            "lte" => Some(Op::Lte),
            _ => None,
        }
    }

    pub(crate) fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "IS DISTINCT FROM",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Gte => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: String,
}

impl Condition {
    /// Range operators compare numerically when the operand is a finite number.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let field = doc.get(&self.field);
        match self.op {
            Op::Eq => field.and_then(text_of).as_deref() == Some(self.value.as_str()),
            Op::Ne => field.and_then(text_of).as_deref() != Some(self.value.as_str()),
            op => match self.numeric_value() {
                Some(operand) => match field.and_then(Value::as_f64) {
                    Some(n) => n.partial_cmp(&operand).is_some_and(|ord| op.accepts(ord)),
                    None => false,
                },
                None => match field.and_then(text_of) {
                    Some(text) => op.accepts(text.as_str().cmp(self.value.as_str())),
                    None => false,
                },
            },
        }
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, op: Op, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, Op::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, Op::Ne, value)
    }

    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parses `name` or `-name`.
    pub fn parse(raw: &str) -> SortKey {
        match raw.strip_prefix('-') {
            Some(field) => SortKey {
                field: field.to_string(),
                descending: true,
            },
            None => SortKey {
                field: raw.to_string(),
                descending: false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Text form of a scalar, the same projection Postgres' `->>` applies.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Orders two field values; missing fields sort after everything else.
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => type_rank(a)
                .cmp(&type_rank(b))
                .then_with(|| a.to_string().cmp(&b.to_string())),
        },
    }
}

pub fn sort_documents(docs: &mut [Value], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ord = compare_fields(a.get(&key.field), b.get(&key.field));
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_compares_text_form() {
        let doc = json!({ "number": "123", "seats": 4, "active": false });
        assert!(Filter::new().eq("number", "123").matches(&doc));
        assert!(Filter::new().eq("seats", "4").matches(&doc));
        assert!(Filter::new().eq("active", "false").matches(&doc));
        assert!(!Filter::new().eq("number", "124").matches(&doc));
    }

    #[test]
    fn ne_matches_missing_fields() {
        let doc = json!({ "name": "x" });
        assert!(Filter::new().ne("active", "false").matches(&doc));
        let inactive = json!({ "name": "x", "active": false });
        assert!(!Filter::new().ne("active", "false").matches(&inactive));
    }

    #[test]
    fn range_operators_are_numeric_for_numeric_operands() {
        let doc = json!({ "price": 10 });
        assert!(Filter::new().with("price", Op::Gte, "10").matches(&doc));
        assert!(!Filter::new().with("price", Op::Lt, "9.5").matches(&doc));
        assert!(Filter::new().with("price", Op::Gt, "9").matches(&doc));
        // "10" > "9" is false textually, true numerically
        let text = json!({ "price": "10" });
        assert!(!Filter::new().with("price", Op::Gt, "9").matches(&text));
    }

    #[test]
    fn range_operators_fall_back_to_text() {
        let doc = json!({ "governorate": "Giza" });
        assert!(Filter::new().with("governorate", Op::Gt, "Cairo").matches(&doc));
        assert!(!Filter::new().with("governorate", Op::Lte, "Cairo").matches(&doc));
        assert!(!Filter::new().with("missing", Op::Gt, "a").matches(&doc));
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let mut docs = vec![
            json!({ "g": "b", "n": 1 }),
            json!({ "g": "a", "n": 2 }),
            json!({ "g": "a", "n": 3 }),
            json!({ "n": 0 }),
        ];
        sort_documents(&mut docs, &[SortKey::parse("g"), SortKey::parse("-n")]);
        let ns: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 2, 1, 0]);
    }
}
