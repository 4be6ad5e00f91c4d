//! The LSP-facing data model this bridge speaks.
//!
//! Most of it is re-exported straight from `lsp_types` rather than
//! hand-rolled, mirroring `cangjie-mcp`'s own `lsp::types` module (`pub use
//! lsp_types::{...}`). A few outbound shapes stay hand-written because this
//! bridge needs exact control of their wire shape: `lsp_types::Diagnostic`
//! skips a `None` field instead of emitting it, which would silently drop
//! this bridge's always-present `"code": null`.

use serde::{Deserialize, Serialize};

pub use lsp_types::{
    ClientInfo, DidCloseTextDocumentParams, DidOpenTextDocumentParams, DiagnosticSeverity,
    InitializeParams, InitializeResult, MessageType, Position, Range, SaveOptions,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions,
};

/// The fixed capability set this bridge advertises on `initialize`: open/
/// close sync only, no incremental edits, no save body.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::NONE),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(false),
            })),
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// One diagnostic as this bridge publishes it. The analyzer never supplies a
/// stable per-diagnostic code, and this always reports that as an explicit
/// JSON `null` rather than omitting the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: DiagnosticSeverity,
    pub code: Option<serde_json::Value>,
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowMessageParams {
    #[serde(rename = "type")]
    pub typ: MessageType,
    pub message: String,
}
