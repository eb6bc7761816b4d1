use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Parse `KEY=value` lines. `export ` prefixes, blank lines and `#` comments are allowed.
pub fn parse_env_str(content: &str) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let rest = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        if let Some((key, value)) = parse_env_line(rest) {
            if !key.is_empty() {
                variables.insert(key.to_string(), value);
            }
        }
    }

    variables
}

pub fn load_env_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_env_str(&content))
}

/// 將 env 檔案的變數套用到行程環境，不覆蓋已存在的變數
pub fn apply_env_file(path: impl AsRef<Path>) -> Result<usize> {
    let variables = load_env_file(path.as_ref())?;
    let mut applied = 0;
    for (key, value) in variables {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied += 1;
        }
    }
    tracing::debug!(
        "Applied {} variables from {}",
        applied,
        path.as_ref().display()
    );
    Ok(applied)
}

fn parse_env_line(line: &str) -> Option<(&str, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_trailing_comment(line[eq_pos + 1..].trim());
    Some((key, strip_quotes(value)))
}

/// `value  # comment` -> `value`; a `#` inside quotes or glued to the value is kept.
fn strip_trailing_comment(s: &str) -> &str {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut previous_is_space = false;

    for (i, c) in s.char_indices() {
        match c {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            '#' if !in_single_quote && !in_double_quote && (i == 0 || previous_is_space) => {
                return s[..i].trim_end();
            }
            _ => {}
        }
        previous_is_space = c.is_whitespace();
    }
    s
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_env_str() {
        let content = r#"
# database
MONGO_URI=mongodb://mongo:27017
export DB_NAME="fit-check-db"
GOOGLE_CX='abc#123'   # search engine id
GOOGLE_API_KEY=key#not-a-comment
EMPTY=
not a variable
"#;
        let vars = parse_env_str(content);

        assert_eq!(vars["MONGO_URI"], "mongodb://mongo:27017");
        assert_eq!(vars["DB_NAME"], "fit-check-db");
        assert_eq!(vars["GOOGLE_CX"], "abc#123");
        assert_eq!(vars["GOOGLE_API_KEY"], "key#not-a-comment");
        assert_eq!(vars["EMPTY"], "");
        assert_eq!(vars.len(), 5);
    }

    #[test]
    fn test_load_env_file_missing_is_error() {
        assert!(load_env_file("/nonexistent/.env").is_err());
    }

    #[test]
    fn test_apply_env_file_keeps_existing_values() {
        std::env::set_var("FIT_CHECK_ENV_TEST_KEEP", "original");
        std::env::remove_var("FIT_CHECK_ENV_TEST_NEW");

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "FIT_CHECK_ENV_TEST_KEEP=overridden").unwrap();
        writeln!(file, "FIT_CHECK_ENV_TEST_NEW=fresh").unwrap();

        let applied = apply_env_file(file.path()).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(std::env::var("FIT_CHECK_ENV_TEST_KEEP").unwrap(), "original");
        assert_eq!(std::env::var("FIT_CHECK_ENV_TEST_NEW").unwrap(), "fresh");

        std::env::remove_var("FIT_CHECK_ENV_TEST_KEEP");
        std::env::remove_var("FIT_CHECK_ENV_TEST_NEW");
    }
}
