//! Deterministic template-based clarifier.
//!
//! Well-known fields have fixed question templates; anything else gets a
//! generic prompt naming the field. Exactly one question is produced per
//! turn, for the first missing field only.

use async_trait::async_trait;
use fathom_core::FathomResult;

use crate::Clarifier;

/// Question asked when the interpreter reports no missing fields at all.
const FALLBACK_QUESTION: &str =
    "Could you rephrase your question with a bit more detail about what you want to analyze?";

/// Built-in clarifier with per-field question templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateClarifier;

impl TemplateClarifier {
    pub fn new() -> Self {
        Self
    }

    /// The question template for one field.
    pub fn question_for_field(field: &str) -> String {
        match field {
            "scope" => "Please choose one scope:\n\
                 1. General summary of all clicks\n\
                 2. By media_source\n\
                 3. By app_id\n\
                 4. By partner\n\
                 5. By engagement_type\n\
                 6. By time range"
                .to_string(),
            "date_range" => "What date range would you like to use? Please provide full dates \
                 with day, month, and year (e.g., 2024-10-24 to 2024-10-25)."
                .to_string(),
            "app_id" => "Which app_id would you like to analyze?".to_string(),
            "media_source" => "Which media_source would you like to analyze?".to_string(),
            "entity_dimension" => "When you say this value, which field does it belong to?\n\
                 1. media_source\n\
                 2. app_id\n\
                 3. partner\n\
                 4. engagement_type"
                .to_string(),
            "wide_query_resolution" => "This is a very broad request. Please choose one of the following:\n\
                 1. Limit the results to 300 rows\n\
                 2. Provide a date range"
                .to_string(),
            other => format!("Could you provide a value for `{other}`?"),
        }
    }
}

#[async_trait]
impl Clarifier for TemplateClarifier {
    async fn clarify(&self, missing_fields: &[String]) -> FathomResult<String> {
        // One question per turn, for the first missing field only.
        Ok(missing_fields
            .first()
            .map(|field| Self::question_for_field(field))
            .unwrap_or_else(|| FALLBACK_QUESTION.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_asks_about_first_missing_field_only() {
        let clarifier = TemplateClarifier::new();
        let fields = vec!["date_range".to_string(), "app_id".to_string()];
        let question = clarifier.clarify(&fields).await.unwrap();
        assert!(question.contains("date range"));
        assert!(!question.contains("app_id"));
    }

    #[tokio::test]
    async fn test_scope_template_lists_options() {
        let clarifier = TemplateClarifier::new();
        let question = clarifier.clarify(&["scope".to_string()]).await.unwrap();
        for option in ["media_source", "app_id", "partner", "engagement_type"] {
            assert!(question.contains(option));
        }
    }

    #[tokio::test]
    async fn test_unknown_field_gets_generic_prompt() {
        let clarifier = TemplateClarifier::new();
        let question = clarifier.clarify(&["partner".to_string()]).await.unwrap();
        assert!(question.contains("partner"));
    }

    #[tokio::test]
    async fn test_no_fields_falls_back() {
        let clarifier = TemplateClarifier::new();
        let question = clarifier.clarify(&[]).await.unwrap();
        assert_eq!(question, FALLBACK_QUESTION);
    }
}
