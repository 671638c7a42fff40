//! Entrypoint template expansion.

use serde::Serialize;

use super::AssemblyError;

const LOOP_START: &str = "/* loop-start */";
const LOOP_END: &str = "/* loop-end */";
const MATCHES: &str = "/* matches */";
const REQUIRE_NAME: &str = "/* require-name */";
const NAME: &str = "/* name */";
const DATE: &str = "/* date */";

/// Values substituted into one repetition of the loop region.
#[derive(Debug, Clone)]
pub struct LoopItem<'a> {
    pub name: &'a str,
    pub matches: &'a [String],
    pub require_name: String,
}

/// Expand the loop region once per item and stamp the date everywhere.
///
/// Placeholders are replaced with JSON literals, so names and patterns
/// containing quotes stay valid JavaScript.
pub fn expand(template: &str, items: &[LoopItem<'_>], date: &str) -> Result<String, AssemblyError> {
    let start = template.find(LOOP_START);
    let end = template.find(LOOP_END);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if end > start => (start + LOOP_START.len(), end),
        _ => {
            return Err(AssemblyError::Template(
                "loop markers missing or out of order".into(),
            ));
        }
    };

    let before = &template[..start];
    let body = &template[start..end];
    let after = &template[end..];

    let mut repeated = Vec::with_capacity(items.len());
    for item in items {
        repeated.push(
            body.replace(MATCHES, &json(item.matches)?)
                .replace(REQUIRE_NAME, &json(&item.require_name)?)
                .replace(NAME, &json(item.name)?),
        );
    }
    let repeated = repeated.join("\n");

    Ok([before, repeated.as_str(), after]
        .map(|part| part.replace(DATE, date))
        .join("\n\n"))
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String, AssemblyError> {
    serde_json::to_string(value).map_err(|e| AssemblyError::Template(e.to_string()))
}
