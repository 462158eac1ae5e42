//! JSONPath-subset projection for block outputs.
//!
//! Supported paths: `$` for the whole body, dotted key segments with an
//! optional leading `$.`, and `[n]` array indexing on a segment. No
//! filters, no wildcards. Any traversal mismatch yields `None` — absent
//! keys, nulls, indexing into non-arrays, and malformed paths all behave
//! the same way, so a bad projection never fails a block.

use serde_json::Value;

/// Project `path` against a response body.
pub fn project(body: &Value, path: &str) -> Option<Value> {
    let trimmed = path.trim();
    if trimmed == "$" {
        return Some(body.clone());
    }
    let rest = trimmed.strip_prefix("$.").unwrap_or(trimmed);

    let mut current = body;
    for segment in rest.split('.') {
        let (key, indices) = parse_segment(segment)?;
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        for idx in indices {
            current = current.as_array()?.get(idx)?;
        }
    }
    Some(current.clone())
}

/// Split a segment into its key part and any `[n]` suffixes.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    if segment.is_empty() {
        return None;
    }
    let Some(bracket) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let key = &segment[..bracket];
    let mut indices = Vec::new();
    let mut rest = &segment[bracket..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        indices.push(inner[..end].parse().ok()?);
        rest = &inner[end + 1..];
    }
    Some((key, indices))
}
