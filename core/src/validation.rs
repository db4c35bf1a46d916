//! Validation engine: pure shape checks for payloads and results.
//!
//! Two entry points, both free of side effects:
//!
//! - [`validate_payload`] at creation time, checking the action-specific
//!   payload shape
//! - [`validate_result`] at resolution time, checking the submitted result
//!   against the owning request's payload
//!
//! # Known gaps (by design)
//!
//! - The `validation` constraint object on PROVIDE payloads is stored but
//!   never enforced against submitted results.
//! - PROVIDE results are not coerced or checked against `input_type`.

use crate::error::EngineError;
use crate::request::{ActionPayload, ExecutionRequest};
use serde_json::Value;

/// Maximum length of a DECIDE context string.
pub const MAX_CONTEXT_CHARS: usize = 500;

/// Minimum number of DECIDE options.
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of DECIDE options.
pub const MAX_OPTIONS: usize = 6;

/// Check an action payload's shape at creation time.
///
/// # Errors
///
/// Returns [`EngineError::InvalidPayload`] naming the violated constraint.
pub fn validate_payload(payload: &ActionPayload) -> Result<(), EngineError> {
    match payload {
        ActionPayload::Decide {
            question,
            options,
            context,
            default_option,
        } => validate_decide(question, options, context.as_deref(), default_option.as_deref()),
        ActionPayload::Approve { item, details, .. } => {
            if item.trim().is_empty() {
                return Err(invalid_payload("APPROVE requires a non-empty item"));
            }
            if !details.is_object() {
                return Err(invalid_payload("APPROVE details must be an object"));
            }
            Ok(())
        }
        ActionPayload::Provide { prompt, .. } => {
            if prompt.trim().is_empty() {
                return Err(invalid_payload("PROVIDE requires a non-empty prompt"));
            }
            // input_type is enforced at the type level; `validation` and
            // `placeholder` are stored, not interpreted.
            Ok(())
        }
    }
}

fn validate_decide(
    question: &str,
    options: &[String],
    context: Option<&str>,
    default_option: Option<&str>,
) -> Result<(), EngineError> {
    if question.trim().is_empty() {
        return Err(invalid_payload("DECIDE requires a non-empty question"));
    }
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(invalid_payload(
            "DECIDE requires options array with 2-6 items",
        ));
    }
    if options.iter().any(|option| option.trim().is_empty()) {
        return Err(invalid_payload("DECIDE options must be non-empty strings"));
    }
    if let Some(default) = default_option {
        if !options.iter().any(|option| option == default) {
            return Err(invalid_payload(
                "DECIDE default_option must be one of the options",
            ));
        }
    }
    if let Some(context) = context {
        if context.chars().count() > MAX_CONTEXT_CHARS {
            return Err(invalid_payload("DECIDE context must be 500 characters or fewer"));
        }
    }
    Ok(())
}

/// Check a submitted result against the owning request's payload.
///
/// # Errors
///
/// - [`EngineError::MissingResult`] when the result is null
/// - [`EngineError::InvalidResult`] when the result does not fit the action
/// - [`EngineError::ReasonRequired`] for an APPROVE rejection with
///   `reject_requires_reason` set and no non-empty reason
pub fn validate_result(
    request: &ExecutionRequest,
    result: &Value,
    reason: Option<&str>,
) -> Result<(), EngineError> {
    if result.is_null() {
        return Err(EngineError::MissingResult);
    }
    match &request.payload {
        ActionPayload::Decide { options, .. } => {
            let matches_option = result
                .as_str()
                .is_some_and(|chosen| options.iter().any(|option| option == chosen));
            if matches_option {
                Ok(())
            } else {
                Err(EngineError::InvalidResult(
                    "DECIDE result must exactly match one of the options".to_string(),
                ))
            }
        }
        ActionPayload::Approve {
            reject_requires_reason,
            ..
        } => match result.as_str() {
            Some("approved") => Ok(()),
            Some("rejected") => {
                let has_reason = reason.is_some_and(|reason| !reason.trim().is_empty());
                if *reject_requires_reason && !has_reason {
                    Err(EngineError::ReasonRequired)
                } else {
                    Ok(())
                }
            }
            _ => Err(EngineError::InvalidResult(
                "APPROVE result must be \"approved\" or \"rejected\"".to_string(),
            )),
        },
        ActionPayload::Provide { .. } => {
            // Non-null and, for strings, non-empty. No coercion against
            // input_type and no enforcement of the stored constraint object.
            if result.as_str().is_some_and(|value| value.trim().is_empty()) {
                Err(EngineError::InvalidResult(
                    "PROVIDE result must be non-empty".to_string(),
                ))
            } else {
                Ok(())
            }
        }
    }
}

fn invalid_payload(message: &str) -> EngineError {
    EngineError::InvalidPayload(message.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;
    use crate::request::{
        CreateRequest, ExecutionRequest, Fallback, InputType, Priority, Role, Status,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;

    fn decide_payload(options: &[&str]) -> ActionPayload {
        ActionPayload::Decide {
            question: "Approve $99/mo?".to_string(),
            options: options.iter().map(ToString::to_string).collect(),
            context: None,
            default_option: None,
        }
    }

    fn request_with(payload: ActionPayload) -> ExecutionRequest {
        ExecutionRequest {
            id: "r-1".to_string(),
            role: Role::Owner,
            priority: Priority::Normal,
            timeout_seconds: 0,
            fallback: Fallback::Pause,
            agent_id: "agent-1".to_string(),
            project_id: None,
            metadata: HashMap::new(),
            payload,
            status: Status::Pending,
            assigned_to: None,
            created_at: Utc::now(),
            expires_at: None,
            receipt: None,
        }
    }

    // ------------------------------------------------------------------
    // Payload validation
    // ------------------------------------------------------------------

    #[test]
    fn decide_accepts_two_to_six_options() {
        assert!(validate_payload(&decide_payload(&["a", "b"])).is_ok());
        assert!(validate_payload(&decide_payload(&["a", "b", "c", "d", "e", "f"])).is_ok());
    }

    #[test]
    fn decide_rejects_out_of_range_options() {
        let err = validate_payload(&decide_payload(&["only"])).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidPayload("DECIDE requires options array with 2-6 items".to_string())
        );
        assert!(validate_payload(&decide_payload(&["a", "b", "c", "d", "e", "f", "g"])).is_err());
    }

    #[test]
    fn decide_rejects_unknown_default_option() {
        let payload = ActionPayload::Decide {
            question: "Pick one".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            context: None,
            default_option: Some("c".to_string()),
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn decide_rejects_oversized_context() {
        let payload = ActionPayload::Decide {
            question: "Pick one".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            context: Some("x".repeat(MAX_CONTEXT_CHARS + 1)),
            default_option: None,
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn approve_requires_item_and_object_details() {
        let payload = ActionPayload::Approve {
            item: "  ".to_string(),
            details: json!({}),
            context: None,
            reject_requires_reason: false,
        };
        assert!(validate_payload(&payload).is_err());

        let payload = ActionPayload::Approve {
            item: "Deploy v2.1".to_string(),
            details: json!([1, 2, 3]),
            context: None,
            reject_requires_reason: false,
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn provide_requires_prompt() {
        let payload = ActionPayload::Provide {
            prompt: String::new(),
            input_type: InputType::Text,
            context: None,
            placeholder: None,
            validation: None,
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn provide_constraint_object_is_not_interpreted() {
        let payload = ActionPayload::Provide {
            prompt: "Stripe API key".to_string(),
            input_type: InputType::Text,
            context: None,
            placeholder: None,
            validation: Some(json!({ "pattern": "^sk_live_" })),
        };
        assert!(validate_payload(&payload).is_ok());
    }

    // ------------------------------------------------------------------
    // Result validation
    // ------------------------------------------------------------------

    #[test]
    fn decide_result_must_match_an_option() {
        let request = request_with(decide_payload(&["Approve", "Deny"]));
        assert!(validate_result(&request, &json!("Approve"), None).is_ok());
        assert_eq!(
            validate_result(&request, &json!("approve"), None).unwrap_err(),
            EngineError::InvalidResult(
                "DECIDE result must exactly match one of the options".to_string()
            )
        );
    }

    #[test]
    fn approve_rejection_requires_reason_when_flagged() {
        let request = request_with(ActionPayload::Approve {
            item: "Expense #1".to_string(),
            details: json!({ "amount": 50 }),
            context: None,
            reject_requires_reason: true,
        });
        assert_eq!(
            validate_result(&request, &json!("rejected"), None).unwrap_err(),
            EngineError::ReasonRequired
        );
        assert_eq!(
            validate_result(&request, &json!("rejected"), Some("  ")).unwrap_err(),
            EngineError::ReasonRequired
        );
        assert!(validate_result(&request, &json!("rejected"), Some("over budget")).is_ok());
        assert!(validate_result(&request, &json!("approved"), None).is_ok());
    }

    #[test]
    fn approve_result_vocabulary_is_closed() {
        let request = request_with(ActionPayload::Approve {
            item: "Expense #1".to_string(),
            details: json!({}),
            context: None,
            reject_requires_reason: false,
        });
        assert!(validate_result(&request, &json!("maybe"), None).is_err());
        assert!(validate_result(&request, &json!(true), None).is_err());
    }

    #[test]
    fn provide_result_must_be_present_and_non_empty() {
        let request = request_with(ActionPayload::Provide {
            prompt: "Stripe API key".to_string(),
            input_type: InputType::Text,
            context: None,
            placeholder: None,
            validation: None,
        });
        assert_eq!(
            validate_result(&request, &Value::Null, None).unwrap_err(),
            EngineError::MissingResult
        );
        assert!(validate_result(&request, &json!(""), None).is_err());
        assert!(validate_result(&request, &json!("sk_live_123"), None).is_ok());
        // No type coercion against input_type: a number is accepted for text.
        assert!(validate_result(&request, &json!(42), None).is_ok());
    }

    #[test]
    fn create_request_round_trips_with_flattened_payload() {
        let input: CreateRequest = serde_json::from_value(json!({
            "action": "PROVIDE",
            "prompt": "Stripe API key",
            "input_type": "text",
            "agent_id": "agent-1",
            "timeout_seconds": 30,
            "fallback": "fail",
        }))
        .unwrap();
        assert_eq!(input.payload.action(), crate::request::Action::Provide);
        assert_eq!(input.timeout_seconds, 30);
        assert_eq!(input.fallback, Fallback::Fail);
        assert_eq!(input.role, Role::Owner);
    }
}
