use thiserror::Error;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("No JSON object found in model output")]
    NoJsonFound,

    #[error("JSON object in model output is unbalanced or truncated: {excerpt}")]
    Unbalanced { excerpt: String },
}

/// Remove markdown code fences (```` ```json ```` and bare ```` ``` ````) and trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Isolate the first complete JSON object in free-form model output.
///
/// Fences are stripped first. Scanning starts at the first `{` and tracks
/// brace depth, skipping braces that appear inside string literals, so
/// trailing prose with stray braces does not leak into the result.
pub fn extract_json_object(text: &str) -> Result<String, ExtractError> {
    let cleaned = strip_code_fences(text);
    let start = cleaned.find('{').ok_or(ExtractError::NoJsonFound)?;
    let candidate = &cleaned[start..];

    match balanced_object_len(candidate) {
        Some(len) => Ok(candidate[..len].to_string()),
        None => Err(ExtractError::Unbalanced {
            excerpt: excerpt(candidate),
        }),
    }
}

/// Byte length of the balanced object at the start of `text`, which must begin with `{`.
fn balanced_object_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let input = r#"{"name": "Flow", "nodes": []}"#;
        assert_eq!(extract_json_object(input).unwrap(), input);
    }

    #[test]
    fn test_extract_json_fence() {
        let input = "```json\n{\"name\": \"Flow\"}\n```";
        assert_eq!(extract_json_object(input).unwrap(), r#"{"name": "Flow"}"#);
    }

    #[test]
    fn test_extract_plain_fence_with_prose() {
        let input = "Here is the updated workflow:\n```\n{\"name\": \"Flow\", \"settings\": {\"executionOrder\": \"v1\"}}\n```\nLet me know if you need more.";
        assert_eq!(
            extract_json_object(input).unwrap(),
            r#"{"name": "Flow", "settings": {"executionOrder": "v1"}}"#
        );
    }

    #[test]
    fn test_extract_ignores_trailing_stray_brace() {
        let input = "{\"a\": {\"b\": 1}} and then a stray } in prose";
        assert_eq!(extract_json_object(input).unwrap(), r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn test_extract_ignores_braces_inside_strings() {
        let input = r#"{"expr": "={{ $json.value }}", "quote": "say \"}\" loudly"} trailing"#;
        assert_eq!(
            extract_json_object(input).unwrap(),
            r#"{"expr": "={{ $json.value }}", "quote": "say \"}\" loudly"}"#
        );
    }

    #[test]
    fn test_extract_no_brace_is_no_json_found() {
        assert_eq!(
            extract_json_object("I cannot undo changes, sorry."),
            Err(ExtractError::NoJsonFound)
        );
        assert_eq!(extract_json_object(""), Err(ExtractError::NoJsonFound));
        assert_eq!(
            extract_json_object("only a closing } here"),
            Err(ExtractError::NoJsonFound)
        );
    }

    #[test]
    fn test_extract_truncated_is_unbalanced() {
        let err = extract_json_object("```json\n{\"name\": \"Flow\", \"nodes\": [{\"name\": \"A\"")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unbalanced { ref excerpt } if excerpt.starts_with("{\"name\"")));
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let long = "{".to_string() + &"é".repeat(300);
        let err = extract_json_object(&long).unwrap_err();
        let ExtractError::Unbalanced { excerpt } = err else {
            panic!("expected unbalanced");
        };
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
    }
}
