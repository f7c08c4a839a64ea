use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Loads and parses a JSON document that may contain `//` line comments,
/// the way site and descriptor files in this project are authored for
/// human editing. Mirrors the source loader's preference for a JSON5-ish
/// reader with a plain `serde_json` fallback: here we strip comments with a
/// small string-aware scanner and always parse with `serde_json`.
pub fn load_json_with_comments<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    let stripped = strip_line_comments(&raw);
    serde_json::from_str(&stripped).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes `// ...` comments that run to end-of-line, leaving string
/// contents (including `//` inside a string, e.g. a URL) untouched.
fn strip_line_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            continue;
        }

        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }

        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_comments() {
        let input = "{\n  \"a\": 1, // the answer\n  \"b\": 2\n}";
        let stripped = strip_line_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn leaves_double_slash_inside_strings_alone() {
        let input = r#"{"url": "http://example.com"}"#;
        let stripped = strip_line_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://example.com");
    }
}
