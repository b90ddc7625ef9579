use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // First ```json fenced block only; later blocks stay in the narrative.
    static ref CALC_BLOCK_REGEX: Regex = Regex::new(r"(?s)```json(.*?)```").unwrap();
}

/// Structured calculation summary embedded in a model reply.
///
/// All fields are optional; the model is instructed to emit this object in
/// a single ```json fenced block alongside its conversational answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Result of splitting a raw model reply into narrative and structured parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// The reply with the first fenced calculation block removed, trimmed.
    pub content: String,
    /// The decoded calculation, if a well-formed block was present.
    pub calculation: Option<Calculation>,
}

/// Split a raw model reply into display text and an optional [`Calculation`].
///
/// Only the first ```json fenced block is considered. A block whose inner
/// text fails to decode degrades gracefully: the block is still removed from
/// the display text, a diagnostic is logged, and no calculation is returned.
/// Replies without a fenced block pass through trimmed and unchanged.
pub fn extract_calculation(raw: &str) -> Extracted {
    let Some(caps) = CALC_BLOCK_REGEX.captures(raw) else {
        return Extracted {
            content: raw.trim().to_string(),
            calculation: None,
        };
    };

    let block = caps.get(0).expect("capture 0 always present");
    let inner = caps.get(1).map(|g| g.as_str()).unwrap_or("");

    let calculation = match serde_json::from_str::<Calculation>(inner.trim()) {
        Ok(calc) => Some(calc),
        Err(err) => {
            log::warn!("Failed to parse calculation JSON: {}", err);
            None
        }
    };

    let mut content = String::with_capacity(raw.len());
    content.push_str(&raw[..block.start()]);
    content.push_str(&raw[block.end()..]);

    Extracted {
        content: content.trim().to_string(),
        calculation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_well_formed_block() {
        let reply = "The average is 5.\n```json\n{\"formula\": \"AVG(Amount)\", \"steps\": [\"sum\", \"divide\"], \"result\": 5}\n```\nLet me know if you need more.";
        let extracted = extract_calculation(reply);

        assert_eq!(
            extracted.content,
            "The average is 5.\n\nLet me know if you need more."
        );
        let calc = extracted.calculation.expect("calculation present");
        assert_eq!(calc.formula.as_deref(), Some("AVG(Amount)"));
        assert_eq!(
            calc.steps,
            Some(vec!["sum".to_string(), "divide".to_string()])
        );
        assert_eq!(calc.result, Some(json!(5)));
    }

    #[test]
    fn missing_fields_stay_none() {
        let reply = "```json\n{\"result\": 12.5}\n```\nDone.";
        let calc = extract_calculation(reply).calculation.unwrap();
        assert_eq!(calc.formula, None);
        assert_eq!(calc.steps, None);
        assert_eq!(calc.result, Some(json!(12.5)));
    }

    #[test]
    fn malformed_block_degrades_to_narrative_only() {
        let reply = "Here is the answer.\n```json\n{not valid json\n```";
        let extracted = extract_calculation(reply);

        assert_eq!(extracted.calculation, None);
        assert_eq!(extracted.content, "Here is the answer.");
        assert!(!extracted.content.is_empty());
    }

    #[test]
    fn reply_without_block_passes_through_trimmed() {
        let reply = "  Just a plain answer.  ";
        let extracted = extract_calculation(reply);

        assert_eq!(extracted.content, "Just a plain answer.");
        assert_eq!(extracted.calculation, None);
    }

    #[test]
    fn only_first_block_is_removed() {
        let reply = "A\n```json\n{\"result\": 1}\n```\nB\n```json\n{\"result\": 2}\n```";
        let extracted = extract_calculation(reply);

        assert_eq!(
            extracted.calculation.unwrap().result,
            Some(json!(1))
        );
        assert!(extracted.content.contains("```json"));
        assert!(extracted.content.contains("\"result\": 2"));
    }

    #[test]
    fn untagged_fence_is_left_alone() {
        let reply = "Look:\n```\n{\"result\": 3}\n```";
        let extracted = extract_calculation(reply);

        assert_eq!(extracted.calculation, None);
        assert_eq!(extracted.content, reply.trim());
    }
}
