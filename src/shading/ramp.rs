//! Curve/ramp attributes serialized as parallel position, value and interpolation arrays.

use crate::{
    host::{AttrValue, SceneGraph},
    utils::{fmt_f32, fmt_floats},
};

/// Minimum entry count the downstream spline evaluation expects.
pub const MIN_RAMP_ENTRIES: usize = 4;

const DEFAULT_INTERP: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct RampEntry<T> {
    pub position: f32,
    pub value: T,
    pub interp: i64,
}

/// Sorts by ascending position (stable), then pads short ramps by alternately repeating
/// the first and the last entry until `MIN_RAMP_ENTRIES` are present.
pub fn sort_and_pad<T: Clone>(mut entries: Vec<RampEntry<T>>) -> Vec<RampEntry<T>> {
    entries.sort_by(|a, b| a.position.total_cmp(&b.position));
    let mut front = true;
    while !entries.is_empty() && entries.len() < MIN_RAMP_ENTRIES {
        if front {
            let first = entries[0].clone();
            entries.insert(0, first);
        } else if let Some(last) = entries.last().cloned() {
            entries.push(last);
        }
        front = !front;
    }
    entries
}

fn entry_field<'a>(entry: &'a AttrValue, names: &[String]) -> Option<&'a AttrValue> {
    names.iter().find_map(|n| entry.field(n))
}

fn read_entries<T>(
    host: &dyn SceneGraph,
    node: &str,
    attr: &str,
    value_names: &[&str],
    decode: impl Fn(&AttrValue) -> Option<T>,
) -> Vec<RampEntry<T>> {
    let Some(list) = host.attribute(node, attr) else {
        log::warn!("[shading] {node}.{attr}: missing ramp attribute");
        return Vec::new();
    };
    let Some(items) = list.as_list() else {
        log::warn!("[shading] {node}.{attr}: ramp attribute is not a list");
        return Vec::new();
    };

    let position_names = vec!["position".to_string(), format!("{attr}_Position")];
    let interp_names = vec!["interp".to_string(), format!("{attr}_Interp")];
    let mut names: Vec<String> = value_names.iter().map(|s| s.to_string()).collect();
    names.push(format!("{attr}_{}", capitalize(value_names.first().copied().unwrap_or("value"))));

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let position = entry_field(item, &position_names).and_then(|v| v.as_f32());
        let value = entry_field(item, &names).and_then(&decode);
        match (position, value) {
            (Some(position), Some(value)) => out.push(RampEntry {
                position,
                value,
                interp: entry_field(item, &interp_names)
                    .and_then(|v| v.as_i64())
                    .unwrap_or(DEFAULT_INTERP),
            }),
            _ => log::warn!("[shading] {node}.{attr}[{i}]: skipping malformed ramp entry"),
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(f) => f.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}

pub fn read_float_ramp(host: &dyn SceneGraph, node: &str, attr: &str) -> Vec<RampEntry<f32>> {
    sort_and_pad(read_entries(
        host,
        node,
        attr,
        &["floatValue", "value"],
        AttrValue::as_f32,
    ))
}

pub fn read_color_ramp(host: &dyn SceneGraph, node: &str, attr: &str) -> Vec<RampEntry<[f32; 3]>> {
    sort_and_pad(read_entries(host, node, attr, &["color"], AttrValue::as_color))
}

pub fn positions_literal<T>(entries: &[RampEntry<T>]) -> String {
    format!("float[] {}", fmt_floats(entries.iter().map(|e| e.position)))
}

pub fn interps_literal<T>(entries: &[RampEntry<T>]) -> String {
    let values: Vec<String> = entries.iter().map(|e| e.interp.to_string()).collect();
    format!("int[] {}", values.join(" "))
}

pub fn float_values_literal(entries: &[RampEntry<f32>]) -> String {
    format!("float[] {}", fmt_floats(entries.iter().map(|e| e.value)))
}

pub fn color_values_literal(entries: &[RampEntry<[f32; 3]>]) -> String {
    let values: Vec<String> = entries
        .iter()
        .flat_map(|e| e.value)
        .map(fmt_f32)
        .collect();
    format!("color[] {}", values.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn e(position: f32, value: f32) -> RampEntry<f32> {
        RampEntry {
            position,
            value,
            interp: 1,
        }
    }

    #[test]
    fn pads_by_repeating_first_then_last() {
        let padded = sort_and_pad(vec![e(1.0, 10.0), e(0.0, 0.0)]);
        let positions: Vec<f32> = padded.iter().map(|x| x.position).collect();
        assert_eq!(positions, vec![0.0, 0.0, 1.0, 1.0]);

        let single = sort_and_pad(vec![e(0.5, 2.0)]);
        assert_eq!(single.len(), 4);
        assert!(single.iter().all(|x| x.position == 0.5));

        let three = sort_and_pad(vec![e(0.2, 1.0), e(0.9, 3.0), e(0.5, 2.0)]);
        let values: Vec<f32> = three.iter().map(|x| x.value).collect();
        assert_eq!(values, vec![1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_ramp_stays_empty() {
        assert!(sort_and_pad::<f32>(Vec::new()).is_empty());
    }

    #[test]
    fn literals_use_parallel_arrays() {
        let entries = sort_and_pad(vec![e(0.0, 0.0), e(0.5, 1.0), e(0.75, 0.5), e(1.0, 1.0)]);
        assert_eq!(positions_literal(&entries), "float[] 0 0.5 0.75 1");
        assert_eq!(float_values_literal(&entries), "float[] 0 1 0.5 1");
        assert_eq!(interps_literal(&entries), "int[] 1 1 1 1");
    }

    proptest! {
        #[test]
        fn output_is_sorted_and_at_least_four(
            positions in proptest::collection::vec(0.0f32..1.0, 1..10)
        ) {
            let entries: Vec<_> = positions.iter().map(|p| e(*p, *p)).collect();
            let out = sort_and_pad(entries);
            prop_assert!(out.len() >= MIN_RAMP_ENTRIES);
            prop_assert!(out.windows(2).all(|w| w[0].position <= w[1].position));
        }
    }
}
