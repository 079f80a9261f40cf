//! Minimal reader for `key=value` connector property files. Lines starting with `#` or `!` are
//! comments, `:` is accepted as separator too.

use std::collections::HashMap;
use std::path::Path;

use connect_sink_core::{Error, Result};

pub(crate) fn load(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
    parse(&content)
}

pub(crate) fn parse(content: &str) -> Result<HashMap<String, String>> {
    let mut props = HashMap::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some((key, value)) = line.split_once(['=', ':']) else {
            return Err(Error::Config(format!(
                "Invalid property on line {}: {line:?}",
                line_no + 1
            )));
        };
        props.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(props)
}
