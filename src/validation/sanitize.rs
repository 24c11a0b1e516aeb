use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound for stored filenames
pub const MAX_FILENAME_LEN: usize = 255;

const RICH_TEXT_TAGS: &[&str] = &["a", "b", "blockquote", "br", "em", "i", "li", "ol", "p", "strong", "u", "ul"];

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").expect("static tag pattern")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static attribute pattern")
});

static EMAIL_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w@.\-]").expect("static email pattern"));
static PHONE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d+\-() ]").expect("static phone pattern"));
static FILENAME_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._\-]").expect("static filename pattern"));
static REPEATED_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("static pattern"));
static REPEATED_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("static pattern"));

/// Escape the five HTML metacharacters
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Keep a small formatting whitelist; every other tag is dropped (its text
/// content survives, escaped). Only `a` keeps attributes, and only `href`
/// with an http/https/mailto target plus `title`.
pub fn sanitize_rich_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in TAG.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_html(&input[last..whole.start()]));
        last = whole.end();

        let closing = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let name = caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
        if !RICH_TEXT_TAGS.contains(&name.as_str()) {
            continue;
        }

        if closing {
            if name != "br" {
                out.push_str(&format!("</{}>", name));
            }
            continue;
        }

        let attrs = if name == "a" {
            caps.get(3).map(|m| anchor_attributes(m.as_str())).unwrap_or_default()
        } else {
            String::new()
        };
        out.push_str(&format!("<{}{}>", name, attrs));
    }

    out.push_str(&escape_html(&input[last..]));
    out
}

fn anchor_attributes(raw: &str) -> String {
    let mut rendered = String::new();
    for caps in ATTRIBUTE.captures_iter(raw) {
        let name = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");

        match name.as_str() {
            "href" => {
                let lowered = value.trim().to_ascii_lowercase();
                if lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.starts_with("mailto:") {
                    rendered.push_str(&format!(" href=\"{}\"", escape_html(value.trim())));
                }
            }
            "title" => rendered.push_str(&format!(" title=\"{}\"", escape_html(value))),
            _ => {}
        }
    }
    rendered
}

pub fn sanitize_email(input: &str) -> String {
    EMAIL_DISALLOWED
        .replace_all(&input.trim().to_lowercase(), "")
        .into_owned()
}

pub fn sanitize_phone(input: &str) -> String {
    PHONE_DISALLOWED.replace_all(input.trim(), "").into_owned()
}

/// Parse and normalise a URL; anything that is not http/https is refused.
pub fn sanitize_url(input: &str) -> Result<String, String> {
    let parsed = url::Url::parse(input.trim()).map_err(|e| format!("Invalid URL: {}", e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(format!("URL scheme '{}' is not allowed", other)),
    }
}

pub fn sanitize_filename(input: &str) -> String {
    let replaced = FILENAME_DISALLOWED.replace_all(input, "_");
    let collapsed = REPEATED_UNDERSCORE.replace_all(&replaced, "_");
    let collapsed = REPEATED_DOT.replace_all(&collapsed, ".");
    collapsed.chars().take(MAX_FILENAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_metacharacters() {
        assert_eq!(escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;/a&gt;");
    }

    #[test]
    fn rich_text_keeps_whitelist_only() {
        let input = r#"<p>Hello <strong>there</strong><span style="color:red">!</span></p><div>x</div>"#;
        assert_eq!(sanitize_rich_text(input), "<p>Hello <strong>there</strong>!</p>x");
    }

    #[test]
    fn rich_text_filters_anchor_attributes() {
        let input = r#"<a href="https://example.com" class="btn" title="Site">go</a>"#;
        assert_eq!(
            sanitize_rich_text(input),
            r#"<a href="https://example.com" title="Site">go</a>"#
        );
        assert_eq!(sanitize_rich_text(r#"<a href="ftp://x">f</a>"#), "<a>f</a>");
    }

    #[test]
    fn email_and_phone() {
        assert_eq!(sanitize_email("  Jane.Doe+spam@Example.COM "), "jane.doespam@example.com");
        assert_eq!(sanitize_phone("+1 (555) 123-4567 ext. 9"), "+1 (555) 123-4567  9");
    }

    #[test]
    fn url_scheme_must_be_http() {
        assert_eq!(sanitize_url("https://example.com").unwrap(), "https://example.com/");
        assert!(sanitize_url("ftp://example.com").is_err());
        assert!(sanitize_url("not a url").is_err());
    }

    #[test]
    fn filename_replaced_and_collapsed() {
        assert_eq!(sanitize_filename("my résumé (final)..pdf"), "my_r_sum_final_.pdf");
        assert_eq!(sanitize_filename(&"a".repeat(400)).len(), MAX_FILENAME_LEN);
    }
}
