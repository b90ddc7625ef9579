//! Upload-to-analysis flow against a mocked model backend.

use athena::chat::{self, AnalysisBackend, ConversationLog, Message, Role};
use athena::error::{Error, Result};
use athena::loader;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::json;

struct MockBackend {
    reply: String,
    fail: bool,
}

impl MockBackend {
    fn replying(reply: &str) -> Self {
        MockBackend {
            reply: reply.to_string(),
            fail: false,
        }
    }

    fn failing() -> Self {
        MockBackend {
            reply: String::new(),
            fail: true,
        }
    }
}

impl AnalysisBackend for MockBackend {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send {
        assert!(prompt.contains("**Data:**"));
        let reply = self.reply.clone();
        let fail = self.fail;
        async move {
            if fail {
                Err(Error::Api {
                    status: 503,
                    message: "model overloaded".to_string(),
                })
            } else {
                Ok(reply)
            }
        }
    }
}

fn two_row_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    worksheet.write_string(0, 0, "Account").unwrap();
    worksheet.write_string(0, 1, "Net Amount").unwrap();
    worksheet.write_string(0, 2, "Region").unwrap();

    worksheet.write_string(1, 0, "ACME Ltd").unwrap();
    worksheet.write_number(1, 1, 3.0).unwrap();
    worksheet.write_string(1, 2, "EU").unwrap();

    worksheet.write_string(2, 0, "Globex").unwrap();
    worksheet.write_number(2, 1, 2.0).unwrap();
    worksheet.write_string(2, 2, "US").unwrap();

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().unwrap()
}

#[tokio::test]
async fn upload_rename_query_appends_one_assistant_message() {
    // Upload: 2 rows, 3 columns
    let mut table = loader::from_bytes(&two_row_workbook(), "ledger.xlsx").unwrap();
    assert_eq!(table.headers().len(), 3);
    assert_eq!(table.row_count(), 2);

    // Rename a column; values stay aligned by position
    table.rename_headers(&[
        "Client".to_string(),
        "Amount".to_string(),
        "Region".to_string(),
    ]);
    assert_eq!(table.records()[0]["Client"], "ACME Ltd");
    assert_eq!(table.records()[1]["Amount"], 2);

    // Mocked model reply with an embedded calculation block
    let backend = MockBackend::replying(
        "The sum of Amount is 5.\n```json\n{\"formula\":\"SUM(A)\",\"steps\":[\"s1\"],\"result\":5}\n```",
    );

    let mut log = ConversationLog::new();
    let before = log.len();

    log.push(Message::user("What is the total amount?"));
    let assistant = chat::dispatch(&backend, &table, "What is the total amount?").await;
    log.push(assistant);

    assert_eq!(log.len(), before + 2);

    let assistant = log.messages().last().unwrap();
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.content, "The sum of Amount is 5.");

    let calculation = assistant.calculation.as_ref().expect("calculation present");
    assert_eq!(calculation.result, Some(json!(5)));
    assert_eq!(calculation.formula.as_deref(), Some("SUM(A)"));
    assert_eq!(calculation.steps, Some(vec!["s1".to_string()]));
}

#[tokio::test]
async fn backend_failure_becomes_assistant_error_message() {
    let table = loader::from_bytes(&two_row_workbook(), "ledger.xlsx").unwrap();
    let backend = MockBackend::failing();

    let assistant = chat::dispatch(&backend, &table, "total?").await;

    assert_eq!(assistant.role, Role::Assistant);
    assert!(assistant.content.contains("Failed to fetch analysis"));
    assert!(assistant.content.contains("model overloaded"));
    assert!(assistant.calculation.is_none());
}

#[test]
fn export_round_trip_keeps_renamed_headers() {
    let mut table = loader::from_bytes(&two_row_workbook(), "ledger.xlsx").unwrap();
    table.rename_headers(&["Client".to_string()]);

    let csv = athena::downloader::to_csv(&table);
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Client,Net Amount,Region"));
    assert_eq!(lines.next(), Some("\"ACME Ltd\",\"3\",\"EU\""));
    assert_eq!(lines.next(), Some("\"Globex\",\"2\",\"US\""));

    assert_eq!(
        athena::downloader::export_filename("ledger.xlsx"),
        "ledger_analysis.csv"
    );
}
