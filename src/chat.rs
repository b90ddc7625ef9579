use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::extract::{self, Calculation};
use crate::table::DataTable;

/// Opening assistant message seeded into every new conversation.
pub const GREETING: &str = "Hello! I'm Athena, your AI audit assistant powered by Gemini. \
I can analyze your spreadsheet data, perform calculations, and explain how I arrived at \
each result. What would you like me to check?";

/// Callback invoked with the user query and the structured result whenever
/// an assistant reply carries one.
pub type AnalysisListener = Box<dyn Fn(&str, &Calculation) + Send + Sync>;

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation log. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Calculation>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String, calculation: Option<Calculation>) -> Self {
        Message {
            id: Uuid::new_v4(),
            role,
            content,
            calculation,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::new(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::new(Role::Assistant, content.into(), None)
    }

    pub fn assistant_with_calculation(
        content: impl Into<String>,
        calculation: Option<Calculation>,
    ) -> Self {
        Message::new(Role::Assistant, content.into(), calculation)
    }
}

/// Append-only ordered sequence of exchanged messages.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// A fresh log seeded with the assistant greeting.
    pub fn new() -> Self {
        ConversationLog {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        ConversationLog::new()
    }
}

/// The remote model boundary: one prompt in, one raw reply out.
pub trait AnalysisBackend {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Send one query about the table to the backend and produce the assistant
/// message for it.
///
/// On success the raw reply is split by the response extractor into display
/// text and an optional calculation. On transport or API failure the error
/// is folded into an assistant message describing it; the exchange never
/// retries and never surfaces as a server error.
pub async fn dispatch<B: AnalysisBackend>(backend: &B, table: &DataTable, query: &str) -> Message {
    let prompt = build_prompt(table, query);
    match backend.generate(&prompt).await {
        Ok(reply) => {
            let extracted = extract::extract_calculation(&reply);
            Message::assistant_with_calculation(extracted.content, extracted.calculation)
        }
        Err(err) => {
            log::error!("Analysis request failed: {}", err);
            Message::assistant(format!("Error: Failed to fetch analysis. {}", err))
        }
    }
}

/// Build the single-turn instruction prompt: role, answer format directive,
/// the full table snapshot as JSON records, and the user's query.
pub fn build_prompt(table: &DataTable, query: &str) -> String {
    let data = table.snapshot().to_string();
    format!(
        "You are Athena, an AI audit assistant. Your task is to analyze the provided JSON data based on the user's query.\n\
\n\
**Instructions:**\n\
1. Carefully analyze the data and the user's question.\n\
2. Provide a clear, concise natural language answer.\n\
3. If the query involves a calculation, you MUST also provide a JSON object detailing the steps. This JSON should be enclosed in a single markdown code block like this:\n\
```json\n\
{{\n\
  \"formula\": \"e.g., SUM(Net Amount) / COUNT(Transactions)\",\n\
  \"steps\": [\n\
    \"Step 1: Description of the first step.\",\n\
    \"Step 2: Description of the second step.\",\n\
    \"Step 3: Description of the final calculation.\"\n\
  ],\n\
  \"result\": 12345.67\n\
}}\n\
```\n\
4. The JSON block is for structured data only. Your main answer should be the friendly, conversational text.\n\
\n\
**Data:**\n\
{data}\n\
\n\
**User's Query:**\n\
\"{query}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::table::CellValue;
    use serde_json::json;

    struct CannedBackend {
        reply: std::result::Result<String, String>,
    }

    impl CannedBackend {
        fn ok(reply: &str) -> Self {
            CannedBackend {
                reply: Ok(reply.to_string()),
            }
        }

        fn err(message: &str) -> Self {
            CannedBackend {
                reply: Err(message.to_string()),
            }
        }
    }

    impl AnalysisBackend for CannedBackend {
        fn generate(&self, _prompt: &str) -> impl Future<Output = Result<String>> + Send {
            let reply = self.reply.clone();
            async move {
                reply.map_err(|message| Error::Api {
                    status: 400,
                    message,
                })
            }
        }
    }

    fn sample_table() -> DataTable {
        DataTable::new(
            vec!["A".to_string(), "B".to_string()],
            vec![vec![CellValue::Number(1.0), CellValue::Text("x".into())]],
        )
    }

    #[test]
    fn log_starts_with_greeting() {
        let log = ConversationLog::new();
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].role, Role::Assistant);
        assert!(log.messages()[0].content.contains("Athena"));
    }

    #[test]
    fn prompt_carries_data_snapshot_and_query() {
        let prompt = build_prompt(&sample_table(), "what is the total of A?");
        assert!(prompt.contains("```json"));
        assert!(prompt.contains(r#"[{"A":1,"B":"x"}]"#));
        assert!(prompt.contains("\"what is the total of A?\""));
    }

    #[tokio::test]
    async fn dispatch_extracts_calculation_from_reply() {
        let backend = CannedBackend::ok(
            "The total is 1.\n```json\n{\"formula\":\"SUM(A)\",\"steps\":[\"s1\"],\"result\":1}\n```",
        );
        let message = dispatch(&backend, &sample_table(), "total of A?").await;

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "The total is 1.");
        let calc = message.calculation.expect("calculation present");
        assert_eq!(calc.result, Some(json!(1)));
    }

    #[tokio::test]
    async fn dispatch_turns_failure_into_assistant_message() {
        let backend = CannedBackend::err("quota exceeded");
        let message = dispatch(&backend, &sample_table(), "total?").await;

        assert_eq!(message.role, Role::Assistant);
        assert!(message.content.starts_with("Error: Failed to fetch analysis."));
        assert!(message.content.contains("quota exceeded"));
        assert!(message.calculation.is_none());
    }
}
