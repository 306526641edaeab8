//! Recovery of structured objects from free-form model output.

use std::sync::LazyLock;

use pressroom_logging::{press_debug, press_warn};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

pub const PARAMS_KEY: &str = "wordpress_params";
pub const PLACEHOLDER_TITLE: &str = "Untitled article";
const PARAM_ALIASES: &[&str] = &["wordpressParams", "wordpress_parameters", "params", "parameters"];

// Greedy on purpose: spans from the first `{` to the last `}`.
static OBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("object pattern compiles"));

/// Parsed model output. `warnings` lists every recovery step that was taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub value: Map<String, Value>,
    pub used_fallback: bool,
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.value.get(PARAMS_KEY).and_then(Value::as_object)
    }

    pub fn adapted_content(&self) -> Option<&str> {
        self.value.get("adaptedContent").and_then(Value::as_str)
    }
}

/// Never fails: missing structure is synthesized and reported in `warnings`.
#[derive(Debug, Clone)]
pub struct TolerantParser {
    required_key: String,
    aliases: Vec<String>,
    placeholder_title: String,
}

impl Default for TolerantParser {
    fn default() -> Self {
        Self {
            required_key: PARAMS_KEY.to_string(),
            aliases: PARAM_ALIASES.iter().map(|a| a.to_string()).collect(),
            placeholder_title: PLACEHOLDER_TITLE.to_string(),
        }
    }
}

impl TolerantParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder_title(mut self, title: impl Into<String>) -> Self {
        self.placeholder_title = title.into();
        self
    }

    pub fn parse(&self, text: &str, source_content: &str) -> ParseResult {
        let mut warnings = Vec::new();
        let mut value = self.recover_object(text, &mut warnings);
        self.ensure_params(&mut value, &mut warnings);
        self.fill_defaults(&mut value, source_content, &mut warnings);

        if !warnings.is_empty() {
            press_warn!("model output needed {} recovery step(s)", warnings.len());
        }
        ParseResult {
            value,
            used_fallback: !warnings.is_empty(),
            warnings,
        }
    }

    fn recover_object(&self, text: &str, warnings: &mut Vec<String>) -> Map<String, Value> {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(map)) => return map,
            Ok(_) => warnings.push("response is JSON but not an object".to_string()),
            Err(err) => warnings.push(format!("response is not valid JSON: {err}")),
        }

        let Some(found) = OBJECT_PATTERN.find(text) else {
            warnings.push("no JSON object found in response".to_string());
            return Map::new();
        };
        match serde_json::from_str::<Value>(found.as_str()) {
            Ok(Value::Object(map)) => {
                warnings.push("extracted JSON object from surrounding text".to_string());
                map
            }
            Ok(_) | Err(_) => {
                warnings.push("extracted text is not a JSON object".to_string());
                Map::new()
            }
        }
    }

    fn ensure_params(&self, value: &mut Map<String, Value>, warnings: &mut Vec<String>) {
        if value.get(&self.required_key).is_some_and(Value::is_object) {
            return;
        }
        let promoted = self
            .aliases
            .iter()
            .find_map(|alias| match value.get(alias) {
                Some(Value::Object(params)) => Some((alias.clone(), params.clone())),
                _ => None,
            });
        match promoted {
            Some((alias, params)) => {
                press_debug!("using `{alias}` as `{}`", self.required_key);
                warnings.push(format!("promoted `{alias}` to `{}`", self.required_key));
                value.insert(self.required_key.clone(), Value::Object(params));
            }
            None => {
                warnings.push(format!("synthesized empty `{}`", self.required_key));
                value.insert(self.required_key.clone(), Value::Object(Map::new()));
            }
        }
    }

    fn fill_defaults(
        &self,
        value: &mut Map<String, Value>,
        source_content: &str,
        warnings: &mut Vec<String>,
    ) {
        let Some(Value::Object(params)) = value.get_mut(&self.required_key) else {
            return;
        };
        if !has_text(params.get("content")) {
            warnings.push("missing content, using source content".to_string());
            params.insert("content".into(), Value::String(source_content.to_string()));
        }
        if !has_text(params.get("title")) {
            warnings.push("missing title, using placeholder".to_string());
            params.insert("title".into(), Value::String(self.placeholder_title.clone()));
        }
        let content = params.get("content").cloned().unwrap_or(Value::Null);

        if !has_text(value.get("adaptedContent")) {
            warnings.push("missing adaptedContent, using content".to_string());
            value.insert("adaptedContent".into(), content);
        }
    }
}

fn has_text(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_needs_no_recovery() {
        let text = json!({
            "wordpress_params": {"title": "T", "content": "C"},
            "adaptedContent": "A"
        })
        .to_string();
        let result = TolerantParser::new().parse(&text, "source");
        assert!(!result.used_fallback);
        assert!(result.warnings.is_empty());
        assert_eq!(result.adapted_content(), Some("A"));
    }

    #[test]
    fn top_level_array_is_a_parse_failure() {
        let result = TolerantParser::new().parse("[1, 2]", "source");
        assert!(result.used_fallback);
        assert_eq!(result.params().unwrap()["content"], json!("source"));
    }
}
