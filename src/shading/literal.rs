//! Typed literal strings for shader parameters.

use super::metadata::ParamType;
use crate::{
    host::AttrValue,
    utils::{fmt_f32, fmt_f64, fmt_floats},
};

/// Formats `value` as a literal of type `param_type`, or `None` when the value does not
/// fit the declared type.
pub fn format_literal(value: &AttrValue, param_type: &ParamType) -> Option<String> {
    let literal = match param_type {
        ParamType::Color => format!("color {}", fmt_floats(value.as_color()?)),
        ParamType::Float => format!("float {}", fmt_f64(value.as_f64()?)),
        ParamType::Int => format!("int {}", value.as_i64()?),
        ParamType::Matrix => {
            let m = value.as_matrix()?;
            let parts: Vec<String> = m.iter().copied().map(fmt_f64).collect();
            format!("matrix {}", parts.join(" "))
        }
        ParamType::Normal => format!("normal {}", triple(value)?),
        ParamType::Point => format!("point {}", triple(value)?),
        ParamType::Vector => format!("vector {}", triple(value)?),
        ParamType::String => format!("string {}", value.as_str()?),
        ParamType::Float2 => {
            let t = value.as_tuple()?;
            if t.len() < 2 {
                return None;
            }
            format!("float[] {} {}", fmt_f64(t[0]), fmt_f64(t[1]))
        }
        ParamType::FloatArray => format!("float[] {}", float_list(value)?),
        ParamType::IntArray => {
            let ints: Option<Vec<String>> = match value {
                AttrValue::List(items) => items
                    .iter()
                    .map(|v| v.as_i64().map(|i| i.to_string()))
                    .collect(),
                other => other
                    .as_tuple()
                    .map(|t| t.iter().map(|f| (f.round() as i64).to_string()).collect()),
            };
            format!("int[] {}", ints?.join(" "))
        }
        ParamType::ColorArray => {
            let items = value.as_list()?;
            let colors: Option<Vec<String>> = items
                .iter()
                .map(|c| c.as_color().map(fmt_floats))
                .collect();
            format!("color[] {}", colors?.join(" "))
        }
        ParamType::Closure | ParamType::Other(_) => return None,
    };
    Some(literal)
}

fn triple(value: &AttrValue) -> Option<String> {
    let t = value.as_tuple()?;
    if t.len() < 3 {
        return None;
    }
    Some(fmt_floats(t[..3].iter().map(|v| *v as f32)))
}

fn float_list(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::List(items) => {
            let floats: Option<Vec<String>> =
                items.iter().map(|v| v.as_f32().map(fmt_f32)).collect();
            Some(floats?.join(" "))
        }
        other => Some(fmt_floats(other.as_tuple()?.iter().map(|v| *v as f32))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_literals() {
        assert_eq!(
            format_literal(&AttrValue::Float(0.5), &ParamType::Float).as_deref(),
            Some("float 0.5")
        );
        assert_eq!(
            format_literal(&AttrValue::Angle(45.0), &ParamType::Float).as_deref(),
            Some("float 45")
        );
        assert_eq!(
            format_literal(&AttrValue::Bool(true), &ParamType::Int).as_deref(),
            Some("int 1")
        );
    }

    #[test]
    fn enum_strings_use_field_names() {
        let v = AttrValue::Enum {
            index: 1,
            fields: vec!["multiply".into(), "divide".into()],
        };
        assert_eq!(
            format_literal(&v, &ParamType::String).as_deref(),
            Some("string divide")
        );
    }

    #[test]
    fn compound_literals() {
        let c = AttrValue::Tuple(vec![1.0, 0.5, 0.25]);
        assert_eq!(
            format_literal(&c, &ParamType::Color).as_deref(),
            Some("color 1 0.5 0.25")
        );
        assert_eq!(
            format_literal(&c, &ParamType::Normal).as_deref(),
            Some("normal 1 0.5 0.25")
        );
        let uv = AttrValue::Tuple(vec![2.0, 3.0]);
        assert_eq!(
            format_literal(&uv, &ParamType::Float2).as_deref(),
            Some("float[] 2 3")
        );
        assert_eq!(format_literal(&uv, &ParamType::Vector), None);
    }

    #[test]
    fn closures_have_no_literal() {
        assert_eq!(format_literal(&AttrValue::Float(1.0), &ParamType::Closure), None);
    }
}
