//! Display decoration for `resolve=true` listings.

use crate::model::block::DayBlock;
use crate::model::block_type::BlockType;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid subtitle token regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDisplay {
    pub type_name: String,
    pub icon: String,
    pub subtitle: String,
}

/// A day block plus its optional display decoration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBlock {
    #[serde(flatten)]
    pub block: DayBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<BlockDisplay>,
}

impl ResolvedBlock {
    pub fn decorate(block: DayBlock, block_type: Option<&BlockType>) -> Self {
        let display = block_type.map(|block_type| {
            let inner = block.block();
            BlockDisplay {
                type_name: block_type.name.clone(),
                icon: if inner.icon.is_empty() {
                    block_type.icon.clone()
                } else {
                    inner.icon.clone()
                },
                subtitle: if inner.subtitle.is_empty() {
                    render_subtitle(&block_type.subtitle_template, &inner.data)
                } else {
                    inner.subtitle.clone()
                },
            }
        });
        Self { block, display }
    }
}

/// Substitutes `{field}` tokens with payload values. Missing and null fields
/// render empty.
pub fn render_subtitle(template: &str, data: &Map<String, Value>) -> String {
    let rendered = TOKEN_RE.replace_all(template, |captures: &Captures<'_>| {
        match data.get(&captures[1]) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    });
    rendered.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::render_subtitle;
    use serde_json::json;

    #[test]
    fn renders_tokens_from_payload() {
        let data = json!({"hours": 7.5, "quality": "good"});
        let data = data.as_object().unwrap();
        assert_eq!(render_subtitle("{hours}h · {quality}", data), "7.5h · good");
    }

    #[test]
    fn missing_tokens_render_empty() {
        let data = json!({"rating": null});
        assert_eq!(
            render_subtitle("{rating}/10 {missing}", data.as_object().unwrap()),
            "/10"
        );
    }
}
