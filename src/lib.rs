/*!
# Athena

A browser-served audit assistant for spreadsheet data, built in Rust.

## Overview

Athena lets a user upload a spreadsheet, inspect its rows in a table,
rename columns, export the table as CSV, and ask questions about the data
in a chat backed by the Gemini `generateContent` API. The server owns all
state; the bundled page is a thin fetch-based view over the JSON API.

## Architecture

- **Backend**: Rust, axum. A single shared session (table + conversation
  log) guarded by a mutex; one outstanding model call at a time.
- **Model boundary**: one outbound HTTPS request per user query, carrying
  an instruction prompt, the full table snapshot as JSON records, and the
  query text. The reply is free-form text that may embed a single fenced
  `json` block with `formula`/`steps`/`result` fields.
- **Frontend**: a single embedded HTML page using `fetch`.

## Modules

- **table**: `DataTable` and `CellValue`; header sanitization and the
  positional header-rename operation
- **loader**: upload parsing for `.xlsx`/`.xls` (calamine) and `.csv`
- **extract**: splits a model reply into narrative text and an optional
  structured `Calculation`
- **chat**: conversation log, the `AnalysisBackend` boundary trait, and
  query dispatch
- **gemini**: `reqwest` client and wire types for `generateContent`
- **downloader**: CSV export and download filename derivation
- **app**: routing and request handlers
- **error**: the application error taxonomy

## REST API Endpoints

- `POST /api/upload` - Parse a multipart spreadsheet upload
- `GET /api/table` - Current table as JSON records
- `POST /api/headers` - Rename columns positionally
- `POST /api/chat` - Ask one question about the data
- `GET /api/messages` - Conversation log
- `GET /api/export` - Download the table as CSV
*/

pub mod app;
pub mod chat;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod loader;
pub mod table;

/// Re-export the core types so callers can use them without module paths
pub use chat::{AnalysisBackend, AnalysisListener, ConversationLog, Message, Role};
pub use error::{Error, Result};
pub use extract::{Calculation, Extracted, extract_calculation};
pub use gemini::{GeminiClient, GeminiConfig};
pub use table::{CellValue, DataTable};
