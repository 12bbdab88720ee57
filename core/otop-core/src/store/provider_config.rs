//! Tool-provider (MCP server) definitions from opencode's own `opencode.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{OtopError, Result};

/// One entry of the config's `mcp` map. Only `enabled` is interpreted; the
/// rest of the definition is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProviderEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolProviderEntry {
    /// Providers without an explicit flag are on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Reads the `mcp` map from opencode's config file.
///
/// Returns `None` when the file is missing, unreadable, not JSON, or has no
/// `mcp` object. Entries that do not look like provider definitions are
/// dropped individually.
pub fn read_tool_providers(path: &Path) -> Option<BTreeMap<String, ToolProviderEntry>> {
    match load_tool_providers(path) {
        Ok(providers) => providers,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Tool provider config unavailable");
            None
        }
    }
}

fn load_tool_providers(path: &Path) -> Result<Option<BTreeMap<String, ToolProviderEntry>>> {
    let contents = fs_err::read_to_string(path).map_err(|source| OtopError::Io {
        context: "reading opencode config".to_string(),
        source,
    })?;

    let config: Value =
        serde_json::from_str(&contents).map_err(|err| OtopError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;

    let Some(mcp) = config.get("mcp").and_then(Value::as_object) else {
        return Ok(None);
    };

    let providers = mcp
        .iter()
        .filter_map(
            |(name, raw)| match serde_json::from_value::<ToolProviderEntry>(raw.clone()) {
                Ok(entry) => Some((name.clone(), entry)),
                Err(err) => {
                    tracing::debug!(provider = %name, error = %err, "Skipping tool provider entry");
                    None
                }
            },
        )
        .collect();

    Ok(Some(providers))
}
