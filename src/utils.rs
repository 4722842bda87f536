/// Shortest round-trip formatting; non-finite values print as `0`.
pub fn fmt_f32(v: f32) -> String {
    if v.is_finite() { format!("{v}") } else { "0".to_string() }
}

pub fn fmt_f64(v: f64) -> String {
    if v.is_finite() { format!("{v}") } else { "0".to_string() }
}

pub fn fmt_floats<I: IntoIterator<Item = f32>>(values: I) -> String {
    values.into_iter().map(fmt_f32).collect::<Vec<_>>().join(" ")
}

pub fn fmt_color(c: [f32; 3]) -> String {
    fmt_floats(c)
}

/// Replaces the run of `#` in `pattern` with `n`, zero-padded to the run's width.
pub fn numbered_string(pattern: &str, n: usize) -> String {
    let Some(start) = pattern.find('#') else {
        return format!("{pattern}{n}");
    };
    let width = pattern[start..].chars().take_while(|c| *c == '#').count();
    format!(
        "{}{:0width$}{}",
        &pattern[..start],
        n,
        &pattern[start + width..],
        width = width
    )
}

pub fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}
