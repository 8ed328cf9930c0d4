use serde_json::{Map, Value};

/// Generic MI payload tree. Scalars are kept as strings; callers decide how
/// to interpret them (hex addresses, breakpoint numbers, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue {
    Const(String),
    /// `{key=value,...}`; order and duplicate keys are preserved.
    Tuple(Vec<(String, MiValue)>),
    /// `[value,...]`; `key=value` items are stored as single-entry tuples.
    List(Vec<MiValue>),
}

impl Default for MiValue {
    fn default() -> Self {
        Self::Tuple(Vec::new())
    }
}

impl MiValue {
    pub fn get(&self, key: &str) -> Option<&MiValue> {
        match self {
            Self::Tuple(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MiValue::as_str)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Const(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MiValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Const(s) => s.is_empty(),
            Self::Tuple(entries) => entries.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Tuples become objects (a repeated key collects its values into an
    /// array), lists become arrays, consts become strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Const(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(MiValue::to_json).collect()),
            Self::Tuple(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let value = value.to_json();
                    if occurrences(entries, key) == 1 {
                        map.insert(key.clone(), value);
                        continue;
                    }
                    if let Value::Array(group) = map
                        .entry(key.clone())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        group.push(value);
                    }
                }
                Value::Object(map)
            }
        }
    }
}

fn occurrences(entries: &[(String, MiValue)], key: &str) -> usize {
    entries.iter().filter(|(k, _)| k == key).count()
}
