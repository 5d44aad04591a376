//! Intelligence (AI generation) options attached to a field.

use crate::FieldId;
use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS
// ============================================================================

/// Cell types that can be filled by generation.
///
/// Only single line and long text fields are supported for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum IntelligenceType {
    SingleLineText,
    LongText,
}

/// Generation method plugged into an intelligence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum IntelligenceMethod {
    /// Free-form text generation driven by the user prompt.
    #[default]
    TextGeneration,
}

/// Value type a generation method produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodReturnType {
    String,
    Number,
    Boolean,
}

/// Static description of a generation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelligenceMethodMeta {
    pub name: &'static str,
    pub description: &'static str,
    pub return_type: MethodReturnType,
    /// Whether the method can regenerate when dependencies change.
    pub supports_dynamic: bool,
}

impl IntelligenceMethod {
    /// Metadata shown in the field settings panel.
    pub fn meta(&self) -> IntelligenceMethodMeta {
        match self {
            Self::TextGeneration => IntelligenceMethodMeta {
                name: "自定义ai自动填充",
                description: "通过用户自定义提示词，自动填充字段内容",
                return_type: MethodReturnType::String,
                supports_dynamic: true,
            },
        }
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Intelligence configuration stored in `field.options.intelligence`.
///
/// Every member is optional on the wire; the pipeline decides what a
/// missing member means for each trigger path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Prompt template with `{fieldId}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<IntelligenceType>,
    /// Regenerate when a dependency changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<bool>,
    /// Fields whose changes retrigger generation of this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_depends: Option<Vec<FieldId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<IntelligenceMethod>,
}

impl IntelligenceOptions {
    /// True when `enabled` is set and true.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Dependencies, or an empty slice when unset.
    pub fn depends(&self) -> &[FieldId] {
        self.dynamic_depends.as_deref().unwrap_or(&[])
    }

    /// Prompt template if present and non-empty.
    pub fn prompt_template(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }

    /// Options usable for a full-table backfill: enabled, at least one
    /// dependency and a non-empty prompt.
    pub fn is_valid_for_backfill(&self) -> bool {
        self.is_enabled() && !self.depends().is_empty() && self.prompt_template().is_some()
    }

    /// Options usable for per-record regeneration: a prompt and a
    /// dependency list are present.
    pub fn is_valid_for_record(&self) -> bool {
        self.prompt_template().is_some() && self.dynamic_depends.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_wire_shape() {
        let options: IntelligenceOptions = serde_json::from_value(json!({
            "enabled": true,
            "prompt": "Write a bio for {fldName}",
            "type": "longText",
            "dynamic": true,
            "dynamicDepends": ["fldName"],
            "method": "textGeneration"
        }))
        .unwrap();

        assert!(options.is_enabled());
        assert_eq!(options.kind, Some(IntelligenceType::LongText));
        assert_eq!(options.method, Some(IntelligenceMethod::TextGeneration));
        assert_eq!(options.depends(), &[FieldId::from("fldName")]);
        assert!(options.is_valid_for_backfill());
    }

    #[test]
    fn test_missing_members_default_to_none() {
        let options: IntelligenceOptions = serde_json::from_value(json!({})).unwrap();
        assert!(!options.is_enabled());
        assert!(options.depends().is_empty());
        assert!(!options.is_valid_for_backfill());
        assert!(!options.is_valid_for_record());
    }

    #[test]
    fn test_backfill_requires_non_empty_depends_and_prompt() {
        let mut options = IntelligenceOptions {
            enabled: Some(true),
            prompt: Some("p".into()),
            dynamic_depends: Some(vec![]),
            ..Default::default()
        };
        assert!(!options.is_valid_for_backfill());
        // An empty list still counts as present on the record path.
        assert!(options.is_valid_for_record());

        options.dynamic_depends = Some(vec![FieldId::from("fld1")]);
        options.prompt = Some(String::new());
        assert!(!options.is_valid_for_backfill());
        assert!(!options.is_valid_for_record());
    }

    #[test]
    fn test_serialize_skips_unset_members() {
        let options = IntelligenceOptions {
            enabled: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({"enabled": true}));
    }

    #[test]
    fn test_text_generation_meta() {
        let meta = IntelligenceMethod::TextGeneration.meta();
        assert!(meta.supports_dynamic);
        assert_eq!(meta.return_type, MethodReturnType::String);
    }
}
