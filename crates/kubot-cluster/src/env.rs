//! Environment passthrough into pod containers.
//!
//! Every `KEY=VALUE` pair of the invoking process is forwarded when both the
//! key and the value match a strict identifier pattern. Anything else is
//! dropped silently.

use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").expect("identifier pattern is valid")
});

/// Whether a key/value pair may be forwarded.
pub fn is_forwardable(key: &str, value: &str) -> bool {
    IDENTIFIER.is_match(key) && IDENTIFIER.is_match(value)
}

/// Keep the well-formed pairs of `vars`, preserving order.
pub fn filter_env<I, K, V>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, v)| is_forwardable(k, v))
        .collect()
}

/// The forwardable subset of the current process environment. Entries that
/// are not valid UTF-8 are skipped.
pub fn from_process() -> Vec<(String, String)> {
    filter_env(
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifier_pairs() {
        assert!(is_forwardable("BROWSER", "chrome"));
        assert!(is_forwardable("robot.level", "TRACE"));
        assert!(is_forwardable("_X", "-v1.2_3"));
    }

    #[test]
    fn drops_malformed_entries() {
        assert!(!is_forwardable("PATH", "/usr/bin:/bin"));
        assert!(!is_forwardable("9LIVES", "cat"));
        assert!(!is_forwardable("TIMEOUT", "30s"));
        assert!(!is_forwardable("GREETING", "hello world"));
        assert!(!is_forwardable("EMPTY", ""));
        assert!(!is_forwardable("", "value"));
    }

    #[test]
    fn filter_preserves_order() {
        let vars = vec![
            ("A", "one"),
            ("URL", "https://example.com"),
            ("B", "two"),
            ("HOME", "/root"),
        ];
        assert_eq!(
            filter_env(vars),
            vec![
                ("A".to_string(), "one".to_string()),
                ("B".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn process_env_is_filtered() {
        for (k, v) in from_process() {
            assert!(is_forwardable(&k, &v), "{k}={v} should have been dropped");
        }
    }
}
