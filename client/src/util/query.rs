//! Query-string helpers for redirect targets.

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;

/// `to?from=<path>` when there is somewhere to come back to.
pub fn with_from(to: &str, from: Option<&str>) -> String {
    match from.filter(|f| !f.is_empty()) {
        Some(from) => format!("{to}?from={}", urlencoding::encode(from)),
        None => to.to_owned(),
    }
}
