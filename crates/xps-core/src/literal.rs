//! Restricted literal parser for configuration values.
//!
//! Only numbers, booleans, quoted strings, homogeneous scalar sequences and
//! the `range(..)` / `linspace(..)` generators are recognised. Every other
//! input is kept verbatim as a string, so no configuration text is ever
//! executed.

use crate::params::ParamValue;

/// Upper bound on the number of elements a generator may produce.
const MAX_GENERATED: usize = 1 << 20;

/// Parses a raw configuration value into a [`ParamValue`].
pub fn parse_literal(raw: &str) -> ParamValue {
    let text = raw.trim();
    parse_structured(text).unwrap_or_else(|| ParamValue::Str(text.to_string()))
}

/// Renders a value so that [`parse_literal`] reads it back unchanged.
pub fn render_literal(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(text) => {
            if parse_literal(text) == *value {
                text.clone()
            } else {
                quote(text)
            }
        }
        other => other.to_string(),
    }
}

fn quote(text: &str) -> String {
    if text.contains('\'') {
        format!("\"{text}\"")
    } else {
        format!("'{text}'")
    }
}

fn parse_structured(text: &str) -> Option<ParamValue> {
    if let Some(value) = parse_scalar(text) {
        return Some(value);
    }
    if let Some(inner) = delimited(text, '[', ']') {
        return parse_sequence(inner, false);
    }
    if let Some(inner) = delimited(text, '(', ')') {
        return parse_sequence(inner, true);
    }
    if let Some(args) = call_args(text, "range") {
        return parse_range(args);
    }
    if let Some(args) = call_args(text, "linspace") {
        return parse_linspace(args);
    }
    None
}

fn parse_scalar(text: &str) -> Option<ParamValue> {
    if let Some(inner) = quoted(text) {
        return Some(ParamValue::Str(inner.to_string()));
    }
    match text {
        "True" | "true" => return Some(ParamValue::Bool(true)),
        "False" | "false" => return Some(ParamValue::Bool(false)),
        _ => {}
    }
    parse_number(text)
}

/// Parses integers and plain decimal / scientific floats. `inf` and `nan`
/// spellings fall through to strings.
pub fn parse_number(text: &str) -> Option<ParamValue> {
    if text.is_empty()
        || !text.chars().any(|c| c.is_ascii_digit())
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(ParamValue::Int(value));
    }
    text.parse::<f64>().ok().map(ParamValue::Float)
}

fn quoted(text: &str) -> Option<&str> {
    for mark in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(mark) && text.ends_with(mark) {
            let inner = &text[1..text.len() - 1];
            if !inner.contains(mark) {
                return Some(inner);
            }
        }
    }
    None
}

fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    text.strip_prefix(open)?.strip_suffix(close)
}

fn call_args<'a>(text: &'a str, func: &str) -> Option<&'a str> {
    text.strip_prefix(func)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Splits on commas that are not inside quotes.
fn split_elements(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, c) in inner.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(open), _) if open == c => quote = None,
            (None, ',') => {
                parts.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

fn parse_sequence(inner: &str, tuple: bool) -> Option<ParamValue> {
    let mut parts = split_elements(inner);
    let trailing_comma = parts.len() > 1 && parts.last().is_some_and(|p| p.trim().is_empty());
    if trailing_comma || (parts.len() == 1 && parts[0].trim().is_empty()) {
        parts.pop();
    }
    // `(x)` is a parenthesised scalar, not a one-element tuple.
    if tuple && parts.len() == 1 && !trailing_comma {
        return parse_scalar(parts[0].trim());
    }
    let mut values = Vec::with_capacity(parts.len());
    for part in parts {
        values.push(parse_scalar(part.trim())?);
    }
    if !homogeneous(&values) {
        return None;
    }
    Some(ParamValue::List(values))
}

fn homogeneous(values: &[ParamValue]) -> bool {
    let Some(first) = values.first() else {
        return true;
    };
    values.iter().all(|value| match (first, value) {
        (a, b) if a.is_number() && b.is_number() => true,
        (ParamValue::Str(_), ParamValue::Str(_)) => true,
        (ParamValue::Bool(_), ParamValue::Bool(_)) => true,
        _ => false,
    })
}

fn numeric_args(args: &str) -> Option<Vec<ParamValue>> {
    split_elements(args)
        .into_iter()
        .map(|arg| parse_number(arg.trim()))
        .collect()
}

fn parse_range(args: &str) -> Option<ParamValue> {
    let ints = numeric_args(args)?
        .into_iter()
        .map(|value| match value {
            ParamValue::Int(v) => Some(v),
            _ => None,
        })
        .collect::<Option<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] if *step != 0 => (*start, *stop, *step),
        _ => return None,
    };
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if values.len() >= MAX_GENERATED {
            return None;
        }
        values.push(ParamValue::Int(current));
        current = current.checked_add(step)?;
    }
    Some(ParamValue::List(values))
}

fn parse_linspace(args: &str) -> Option<ParamValue> {
    let parsed = numeric_args(args)?;
    let (start, stop, num) = match parsed.as_slice() {
        [start, stop] => (start.as_f64()?, stop.as_f64()?, 50),
        [start, stop, ParamValue::Int(num)] if *num >= 0 => {
            (start.as_f64()?, stop.as_f64()?, *num as usize)
        }
        _ => return None,
    };
    if num > MAX_GENERATED {
        return None;
    }
    let values = match num {
        0 => Vec::new(),
        1 => vec![ParamValue::Float(start)],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|idx| {
                    if idx == num - 1 {
                        ParamValue::Float(stop)
                    } else {
                        ParamValue::Float(start + step * idx as f64)
                    }
                })
                .collect()
        }
    };
    Some(ParamValue::List(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_strings() {
        assert_eq!(parse_literal(" 42 "), ParamValue::Int(42));
        assert_eq!(parse_literal("-0.5"), ParamValue::Float(-0.5));
        assert_eq!(parse_literal("1e-3"), ParamValue::Float(1e-3));
        assert_eq!(parse_literal("results"), ParamValue::Str("results".into()));
        assert_eq!(parse_literal("'7'"), ParamValue::Str("7".into()));
        assert_eq!(parse_literal("inf"), ParamValue::Str("inf".into()));
        assert_eq!(parse_literal("grid"), ParamValue::Str("grid".into()));
    }

    #[test]
    fn sequences_must_be_homogeneous() {
        assert_eq!(
            parse_literal("[1, 2.5, 3]"),
            ParamValue::List(vec![
                ParamValue::Int(1),
                ParamValue::Float(2.5),
                ParamValue::Int(3)
            ])
        );
        assert_eq!(
            parse_literal("('a', \"b,c\",)"),
            ParamValue::List(vec!["a".into(), "b,c".into()])
        );
        assert_eq!(parse_literal("[1, 'a']"), ParamValue::Str("[1, 'a']".into()));
        assert_eq!(parse_literal("[]"), ParamValue::List(Vec::new()));
        assert_eq!(parse_literal("(5)"), ParamValue::Int(5));
        assert_eq!(
            parse_literal("[[1], [2]]"),
            ParamValue::Str("[[1], [2]]".into())
        );
    }

    #[test]
    fn generators_follow_range_and_linspace_semantics() {
        assert_eq!(parse_literal("range(3)"), ParamValue::from(vec![0i64, 1, 2]));
        assert_eq!(parse_literal("range(5, 0, -2)"), ParamValue::from(vec![5i64, 3, 1]));
        assert_eq!(parse_literal("range(1, 2, 0)"), ParamValue::Str("range(1, 2, 0)".into()));
        assert_eq!(
            parse_literal("linspace(0, 1, 3)"),
            ParamValue::from(vec![0.0, 0.5, 1.0])
        );
    }

    #[test]
    fn render_quotes_only_when_needed() {
        assert_eq!(render_literal(&ParamValue::Str("plain".into())), "plain");
        assert_eq!(render_literal(&ParamValue::Str("12".into())), "'12'");
        assert_eq!(render_literal(&ParamValue::Str(" pad".into())), "' pad'");
        assert_eq!(render_literal(&ParamValue::from(vec![1i64, 2])), "[1, 2]");
    }
}
