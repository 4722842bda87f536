use std::collections::BTreeMap;

use serde_json::Value;

/// Typed attribute value read from the host scene graph.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Degrees.
    Angle(f64),
    String(String),
    Enum { index: i64, fields: Vec<String> },
    /// Column-major.
    Matrix([f64; 16]),
    /// Numeric compound: color, point, vector, float2.
    Tuple(Vec<f64>),
    /// Multi/array attribute.
    List(Vec<AttrValue>),
    /// Compound with named children.
    Record(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Decodes the JSON encoding used by host documents.
    ///
    /// Objects with a single `angle`, `enum` (plus `fields`) or `matrix` key map to the
    /// matching variant; arrays of numbers become tuples; other objects become records.
    pub fn from_json(v: &Value) -> Option<AttrValue> {
        match v {
            Value::Null => None,
            Value::Bool(b) => Some(AttrValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(AttrValue::Int(i))
                } else {
                    n.as_f64().map(AttrValue::Float)
                }
            }
            Value::String(s) => Some(AttrValue::String(s.clone())),
            Value::Array(items) => {
                if !items.is_empty() && items.iter().all(|x| x.is_number()) {
                    Some(AttrValue::Tuple(
                        items.iter().filter_map(|x| x.as_f64()).collect(),
                    ))
                } else {
                    Some(AttrValue::List(
                        items.iter().filter_map(AttrValue::from_json).collect(),
                    ))
                }
            }
            Value::Object(map) => {
                if let Some(deg) = map.get("angle").and_then(|a| a.as_f64()) {
                    return Some(AttrValue::Angle(deg));
                }
                if let Some(index) = map.get("enum").and_then(|e| e.as_i64()) {
                    let fields = map
                        .get("fields")
                        .and_then(|f| f.as_array())
                        .map(|f| {
                            f.iter()
                                .filter_map(|s| s.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                    return Some(AttrValue::Enum { index, fields });
                }
                if let Some(m) = map.get("matrix").and_then(|m| m.as_array()) {
                    if m.len() == 16 {
                        let mut out = [0.0; 16];
                        for (o, x) in out.iter_mut().zip(m) {
                            *o = x.as_f64()?;
                        }
                        return Some(AttrValue::Matrix(out));
                    }
                }
                Some(AttrValue::Record(
                    map.iter()
                        .filter_map(|(k, v)| AttrValue::from_json(v).map(|v| (k.clone(), v)))
                        .collect(),
                ))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Int(i) => Some(*i != 0),
            AttrValue::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Bool(b) => Some(i64::from(*b)),
            AttrValue::Enum { index, .. } => Some(*index),
            AttrValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Angles are returned in degrees.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) | AttrValue::Angle(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttrValue::Tuple(t) if t.len() == 1 => Some(t[0]),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    /// Enum attributes resolve to the current field name.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            AttrValue::Enum { index, fields } => {
                usize::try_from(*index).ok().and_then(|i| fields.get(i)).map(|s| s.as_str())
            }
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[f64]> {
        match self {
            AttrValue::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Scalars splat to all three channels.
    pub fn as_color(&self) -> Option<[f32; 3]> {
        match self {
            AttrValue::Tuple(t) if t.len() >= 3 => Some([t[0] as f32, t[1] as f32, t[2] as f32]),
            other => other.as_f32().map(|v| [v, v, v]),
        }
    }

    pub fn as_matrix(&self) -> Option<[f64; 16]> {
        match self {
            AttrValue::Matrix(m) => Some(*m),
            AttrValue::Tuple(t) if t.len() == 16 => {
                let mut out = [0.0; 16];
                out.copy_from_slice(t);
                Some(out)
            }
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn component(&self, index: usize) -> Option<AttrValue> {
        match self {
            AttrValue::Tuple(t) => t.get(index).map(|v| AttrValue::Float(*v)),
            _ => None,
        }
    }

    pub fn element(&self, index: usize) -> Option<AttrValue> {
        match self {
            AttrValue::List(items) => items.get(index).cloned(),
            AttrValue::Tuple(t) => t.get(index).map(|v| AttrValue::Float(*v)),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&AttrValue> {
        match self {
            AttrValue::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Linear blend for numeric values; anything else steps at `t >= 1`.
    pub fn lerp(&self, other: &AttrValue, t: f64) -> AttrValue {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        match (self, other) {
            (AttrValue::Float(a), AttrValue::Float(b)) => AttrValue::Float(mix(*a, *b)),
            (AttrValue::Int(a), AttrValue::Float(b)) => AttrValue::Float(mix(*a as f64, *b)),
            (AttrValue::Float(a), AttrValue::Int(b)) => AttrValue::Float(mix(*a, *b as f64)),
            (AttrValue::Int(a), AttrValue::Int(b)) => AttrValue::Float(mix(*a as f64, *b as f64)),
            (AttrValue::Angle(a), AttrValue::Angle(b)) => AttrValue::Angle(mix(*a, *b)),
            (AttrValue::Tuple(a), AttrValue::Tuple(b)) if a.len() == b.len() => {
                AttrValue::Tuple(a.iter().zip(b).map(|(x, y)| mix(*x, *y)).collect())
            }
            (AttrValue::Matrix(a), AttrValue::Matrix(b)) => {
                let mut out = [0.0; 16];
                for (i, o) in out.iter_mut().enumerate() {
                    *o = mix(a[i], b[i]);
                }
                AttrValue::Matrix(out)
            }
            _ => {
                if t >= 1.0 {
                    other.clone()
                } else {
                    self.clone()
                }
            }
        }
    }
}
