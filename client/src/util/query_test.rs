use super::*;

#[test]
fn with_from_escapes_query_syntax() {
    assert_eq!(with_from("/login", Some("/reports")), "/login?from=%2Freports");
    assert_eq!(with_from("/login", Some("/search?q=a&b")), "/login?from=%2Fsearch%3Fq%3Da%26b");
    assert_eq!(with_from("/login", Some("/a b")), "/login?from=%2Fa%20b");
}

#[test]
fn with_from_appends_only_non_empty_paths() {
    assert_eq!(with_from("/login", Some("")), "/login");
    assert_eq!(with_from("/login", None), "/login");
}
