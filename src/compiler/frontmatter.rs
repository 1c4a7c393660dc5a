//! YAML front matter extraction.

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Known front matter fields. Anything else is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrontMatter {
    #[serde(deserialize_with = "deserialize_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "deserialize_text")]
    pub excerpt: Option<String>,
    #[serde(deserialize_with = "deserialize_text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "deserialize_text")]
    pub image: Option<String>,
    #[serde(deserialize_with = "deserialize_text")]
    pub read_time: Option<String>,
    /// A plain string, or a list joined with `", "`.
    #[serde(deserialize_with = "deserialize_text")]
    pub keywords: Option<String>,
}

/// Accept any scalar (or a list of scalars) and render it as text.
///
/// Authors write `readTime: 7` as often as `readTime: "7 min read"`; both
/// should land in the artifact rather than fail the post.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Sequence(items) => {
            let parts: Vec<_> = items.iter().filter_map(value_to_text).collect();
            Some(parts.join(", "))
        }
        Value::Tagged(tagged) => value_to_text(&tagged.value),
        Value::Mapping(_) => None,
    }
}

/// Split `content` into `(front matter, body)`.
///
/// Front matter is a leading `---` fenced block. Without one, the whole
/// content is body.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();

    if let Some(rest) = trimmed.strip_prefix("---")
        && rest.starts_with(['\n', '\r'])
        && let Some(end) = rest.find("\n---")
    {
        let fm = rest[..end].trim();
        let after = &rest[end + 4..];
        // closing fence runs to end of line
        let body = after.find('\n').map_or("", |nl| &after[nl + 1..]);
        return (Some(fm), body);
    }

    (None, content)
}

/// Parse a front matter block. An empty block yields all-default fields.
pub fn parse(fm: &str) -> Result<FrontMatter, serde_yaml::Error> {
    if fm.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str::<Option<FrontMatter>>(fm).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yaml_block() {
        let (fm, body) = split("---\ntitle: Hello\n---\n\n# Body\n");
        assert_eq!(fm, Some("title: Hello"));
        assert_eq!(body, "\n# Body\n");
    }

    #[test]
    fn test_split_without_front_matter() {
        let (fm, body) = split("# Just content");
        assert!(fm.is_none());
        assert_eq!(body, "# Just content");
    }

    #[test]
    fn test_split_unterminated_block() {
        let content = "---\ntitle: Hello\n# Body";
        let (fm, body) = split(content);
        assert!(fm.is_none());
        assert_eq!(body, content);
    }

    #[test]
    fn test_split_ignores_thematic_break_prefix() {
        // `----` is not a front matter fence
        let (fm, _) = split("----\ntext\n---\n");
        assert!(fm.is_none());
    }

    #[test]
    fn test_parse_fields() {
        let fm = parse(
            "title: Hello\nexcerpt: Short\ndate: 2024-01-15\nreadTime: 7\nkeywords:\n  - rust\n  - mdx\nauthor: ignored",
        )
        .unwrap();

        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.excerpt.as_deref(), Some("Short"));
        assert_eq!(fm.date.as_deref(), Some("2024-01-15"));
        assert_eq!(fm.read_time.as_deref(), Some("7"));
        assert_eq!(fm.keywords.as_deref(), Some("rust, mdx"));
        assert!(fm.image.is_none());
    }

    #[test]
    fn test_parse_null_and_empty() {
        let fm = parse("title: ~\nkeywords: \"a, b\"").unwrap();
        assert!(fm.title.is_none());
        assert_eq!(fm.keywords.as_deref(), Some("a, b"));

        assert!(parse("").unwrap().title.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(parse("title: [unclosed").is_err());
    }
}
