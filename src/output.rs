//! Step outputs: flattening a run result into `key=value` lines.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

const DELIMITER: &str = "RELEASE_PILOT_EOF";

/// Flattens nested objects and arrays into `(key, value)` pairs, joining keys with `sep`.
///
/// Strings are emitted raw, `null` as an empty string.
pub fn flatten(value: &Value, sep: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    flatten_into(value, sep, "", &mut pairs);
    pairs
}

fn flatten_into(value: &Value, sep: &str, prefix: &str, pairs: &mut Vec<(String, String)>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}{sep}{k}")
        }
    };
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(v, sep, &key(k), pairs);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(v, sep, &key(&i.to_string()), pairs);
            }
        }
        Value::Null => pairs.push((prefix.to_string(), String::new())),
        Value::String(s) => pairs.push((prefix.to_string(), s.clone())),
        other => pairs.push((prefix.to_string(), other.to_string())),
    }
}

/// Renders pairs in the `$GITHUB_OUTPUT` file format.
///
/// Multi-line values use the `key<<DELIMITER` form.
pub fn format_outputs(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        if value.contains('\n') {
            let mut delimiter = DELIMITER.to_string();
            while value.contains(&delimiter) {
                delimiter.push('_');
            }
            out.push_str(&format!("{key}<<{delimiter}\n{value}\n{delimiter}\n"));
        } else {
            out.push_str(&format!("{key}={value}\n"));
        }
    }
    out
}

/// Appends the flattened form of `result` to the file at `path`.
pub fn write_outputs<T: Serialize, P: AsRef<Path>>(result: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let value = serde_json::to_value(result).context("Failed to serialize outputs")?;
    let text = format_outputs(&flatten(&value, "_"));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file: {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}

/// Writes `result` to `$GITHUB_OUTPUT` when running inside GitHub Actions.
///
/// Returns whether anything was written.
pub fn write_step_outputs<T: Serialize>(result: &T) -> Result<bool> {
    match env::var("GITHUB_OUTPUT") {
        Ok(path) if !path.is_empty() => {
            write_outputs(result, &path)?;
            tracing::debug!(path, "Wrote step outputs");
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_values() {
        let value = json!({
            "branch": "release/1.0.1",
            "isPR": false,
            "versions": { "current": "1.0.1", "nextPatch": "1.0.2" },
            "ci": { "isPushed": true, "changelog": { "sinceTag": null } },
            "files": ["package.json", "pyproject.toml"],
            "commitMsg": "Merge pull request #16\n\nRelease 1.0.1"
        });

        let mut pairs = flatten(&value, "_");
        pairs.sort();
        let text = format_outputs(&pairs);

        insta::assert_snapshot!(text.trim_end(), @r"
        branch=release/1.0.1
        ci_changelog_sinceTag=
        ci_isPushed=true
        commitMsg<<RELEASE_PILOT_EOF
        Merge pull request #16

        Release 1.0.1
        RELEASE_PILOT_EOF
        files_0=package.json
        files_1=pyproject.toml
        isPR=false
        versions_current=1.0.1
        versions_nextPatch=1.0.2
        ");
    }

    #[test]
    fn delimiter_never_appears_in_value() {
        let pairs = vec![("msg".to_string(), "a\nRELEASE_PILOT_EOF\nb".to_string())];
        let text = format_outputs(&pairs);
        assert!(text.starts_with("msg<<RELEASE_PILOT_EOF_\n"));
        assert!(text.ends_with("\nRELEASE_PILOT_EOF_\n"));
    }

    #[test]
    fn appends_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "existing=1\n").unwrap();

        write_outputs(&json!({ "decision": { "build": true, "publish": false } }), &path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "existing=1\ndecision_build=true\ndecision_publish=false\n"
        );
    }
}
