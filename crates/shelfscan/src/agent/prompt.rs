//! Prompts, the `final_result` output tool, and retry feedback.

use crate::ToolDef;
use crate::agent::error::AttemptFailure;
use crate::schema::Results;
use crate::tools::FETCH_TOOL_NAME;
use crate::tools::spec::ToolSpec;
use serde_json::Value;

/// Name of the output tool the model calls with its answer.
pub const FINAL_RESULT_TOOL: &str = "final_result";

/// Builder for multi-section system prompts.
///
/// Sections are joined with blank lines; sections with empty content are
/// skipped.
///
/// ```
/// use shelfscan::agent::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("Extract products.")
///     .section("Steps", "1. Fetch the page.")
///     .section("Empty", "")
///     .build();
///
/// assert!(prompt.contains("## Steps"));
/// assert!(!prompt.contains("## Empty"));
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// The task instructions used unless the caller supplies their own.
pub fn default_system_prompt() -> String {
    SystemPromptBuilder::new(
        "Your task is to convert the text of a product listing page into a \
         list of product records.",
    )
    .section(
        "Steps",
        format!(
            "1. Fetch the text of the URL you are given with the {FETCH_TOOL_NAME} tool.\n\
             2. Take the output from step 1 and clean it up into product records: \
             brand name, product name, price as shown on the page, and rating count."
        ),
    )
    .section(
        "Output",
        format!(
            "Call the {FINAL_RESULT_TOOL} tool exactly once with every product you found. \
             Leave price or rating_count null when the page does not show them. \
             If the page lists no products, call {FINAL_RESULT_TOOL} with an empty dataset."
        ),
    )
    .build()
}

/// The user message for a run: the URL itself.
pub fn user_prompt(url: &str) -> String {
    url.trim().to_string()
}

/// Definition of the output tool whose parameters are the [`Results`] schema.
pub fn final_result_def() -> ToolDef {
    ToolSpec::builder(FINAL_RESULT_TOOL)
        .purpose("Submit the extracted products as the final result")
        .when_to_use("Once, after reading the page, with every product you found")
        .when_not_to_use(
            "Before you have fetched the page. Never answer in plain text instead of calling it",
        )
        .parameters_for::<Results>()
        .example(
            r#"final_result(dataset=[{"brand_name": "IKEA", "product_name": "BILLY", "price": "€ 59", "rating_count": 1520}])"#,
            "The result is checked against the schema",
        )
        .output_format("Confirmation, or a list of schema errors to fix")
        .to_tool_def()
}

/// Pull a candidate `Results` object out of a plain-text reply.
///
/// Accepts a bare JSON object, one wrapped in a ```json fence, one embedded
/// in prose, or a `{"name": "final_result", "arguments": {...}}` envelope.
pub fn extract_json_candidate(text: &str) -> Option<Value> {
    let trimmed = strip_code_fence(text.trim());
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(v @ Value::Object(_)) => v,
        _ => {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            if end <= start {
                return None;
            }
            match serde_json::from_str::<Value>(trimmed.get(start..=end)?) {
                Ok(v @ Value::Object(_)) => v,
                _ => return None,
            }
        }
    };
    Some(unwrap_envelope(value))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn unwrap_envelope(value: Value) -> Value {
    if value.get("dataset").is_some() {
        return value;
    }
    for key in ["arguments", "parameters"] {
        if let Some(inner) = value.get(key)
            && inner.get("dataset").is_some()
        {
            return inner.clone();
        }
    }
    value
}

/// Feedback appended to the transcript after a failed attempt.
///
/// `None` for backend failures: the request never reached the model, so
/// there is nothing in the transcript for it to correct.
pub fn retry_feedback(
    failure: &AttemptFailure,
    attempt: u32,
    max_attempts: u32,
) -> Option<String> {
    let mut feedback = format!("Attempt {attempt}/{max_attempts} failed. ");

    match failure {
        AttemptFailure::Coercion(err) => {
            feedback.push_str("Your result did not match the schema.\n\nErrors:\n");
            for error in &err.errors {
                feedback.push_str("  - ");
                feedback.push_str(error);
                feedback.push('\n');
            }
            feedback.push_str("\nExpected schema:\n");
            let schema = Results::schema();
            feedback.push_str(
                &serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string()),
            );
            feedback.push_str("\n\nYour submission:\n");
            feedback.push_str(
                &serde_json::to_string_pretty(&err.submitted)
                    .unwrap_or_else(|_| err.submitted.to_string()),
            );
            feedback.push_str(&format!(
                "\n\nFix all errors and call {FINAL_RESULT_TOOL} again."
            ));
        }
        AttemptFailure::NoAnswer(reason) => {
            feedback.push_str(&format!(
                "No structured result was produced ({reason}). \
                 Call {FINAL_RESULT_TOOL} with the products from the page."
            ));
        }
        AttemptFailure::Rejected(reason) => {
            feedback.push_str(&format!(
                "The result was rejected: {reason}. \
                 Call {FINAL_RESULT_TOOL} again with a corrected result."
            ));
        }
        AttemptFailure::ToolFailed {
            tool,
            reason,
            attempts,
        } => {
            feedback.push_str(&format!(
                "The {tool} tool failed after {attempts} attempt(s): {reason}. \
                 You may try it again, then call {FINAL_RESULT_TOOL}."
            ));
        }
        AttemptFailure::RoundLimit(rounds) => {
            feedback.push_str(&format!(
                "You used {rounds} rounds without submitting a result. \
                 Call {FINAL_RESULT_TOOL} now with what you have."
            ));
        }
        AttemptFailure::Backend(_) => return None,
    }

    Some(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CoercionError;
    use serde_json::json;

    #[test]
    fn default_prompt_names_both_tools() {
        let prompt = default_system_prompt();
        assert!(prompt.contains(FETCH_TOOL_NAME));
        assert!(prompt.contains(FINAL_RESULT_TOOL));
        assert!(prompt.contains("## Steps"));
    }

    #[test]
    fn final_result_parameters_are_results_schema() {
        let def = final_result_def();
        assert_eq!(def.function.name, FINAL_RESULT_TOOL);
        assert_eq!(def.function.parameters, Results::schema());
    }

    #[test]
    fn extracts_bare_and_fenced_json() {
        let bare = extract_json_candidate(r#"{"dataset": []}"#).unwrap();
        assert_eq!(bare, json!({"dataset": []}));

        let fenced = extract_json_candidate("```json\n{\"dataset\": []}\n```").unwrap();
        assert_eq!(fenced, json!({"dataset": []}));
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let text = r#"Here are the products: {"dataset": [{"brand_name": "IKEA", "product_name": "BILLY"}]} Hope this helps."#;
        let value = extract_json_candidate(text).unwrap();
        assert_eq!(value["dataset"][0]["product_name"], "BILLY");
    }

    #[test]
    fn unwraps_tool_call_envelope() {
        let text = r#"{"name": "final_result", "arguments": {"dataset": []}}"#;
        assert_eq!(extract_json_candidate(text).unwrap(), json!({"dataset": []}));
    }

    #[test]
    fn plain_prose_has_no_candidate() {
        assert!(extract_json_candidate("I could not find any products.").is_none());
        assert!(extract_json_candidate("} backwards {").is_none());
        assert!(extract_json_candidate("[1, 2, 3]").is_none());
    }

    #[test]
    fn coercion_feedback_lists_errors_and_submission() {
        let failure = AttemptFailure::Coercion(CoercionError {
            errors: vec!["at '/dataset/0': \"product_name\" is a required property".into()],
            submitted: json!({"dataset": [{"brand_name": "IKEA"}]}),
        });
        let feedback = retry_feedback(&failure, 1, 3).unwrap();
        assert!(feedback.starts_with("Attempt 1/3 failed."));
        assert!(feedback.contains("product_name"));
        assert!(feedback.contains("Expected schema:"));
        assert!(feedback.contains("Your submission:"));
    }

    #[test]
    fn tool_failure_feedback_names_tool() {
        let failure = AttemptFailure::ToolFailed {
            tool: FETCH_TOOL_NAME.into(),
            reason: "timed out".into(),
            attempts: 2,
        };
        let feedback = retry_feedback(&failure, 2, 3).unwrap();
        assert!(feedback.contains("fetch_html_text tool failed after 2 attempt(s)"));
    }

    #[test]
    fn backend_failure_has_no_feedback() {
        let failure = AttemptFailure::Backend("HTTP 503: overloaded".into());
        assert!(retry_feedback(&failure, 1, 3).is_none());
    }
}
