//! Shared server state: the set of documents the editor has open, and the
//! latest workspace-wide diagnostics known from the analyzer.
//!
//! Diagnostics are workspace-wide (there is no per-client view), but only
//! published for documents the editor currently has open — an editor never
//! receives `publishDiagnostics` for a file it hasn't opened, even if the
//! analyzer has errors recorded against it. The diagnostics map is always
//! replaced as a whole value, never merged key-by-key, so a stale entry can
//! never survive an analyzer update that dropped it.

use std::collections::{HashMap, HashSet};

use crate::lsp::types::Diagnostic;

#[derive(Debug, Default)]
pub struct ServerState {
    opened_documents: HashSet<String>,
    diagnostics: HashMap<String, Vec<Diagnostic>>,
}

impl ServerState {
    pub fn new() -> ServerState {
        ServerState::default()
    }

    pub fn open_document(&mut self, uri: String) {
        self.opened_documents.insert(uri);
    }

    pub fn close_document(&mut self, uri: &str) {
        self.opened_documents.remove(uri);
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.opened_documents.contains(uri)
    }

    /// Replaces the whole diagnostics map with a fresh analyzer snapshot.
    /// Callers republish every opened document afterwards (clear, then
    /// refill) rather than diffing against the previous map themselves —
    /// that keeps `publish_all` the single place responsible for never
    /// emitting a publish for a document the editor hasn't opened.
    pub fn replace_diagnostics(&mut self, new: HashMap<String, Vec<Diagnostic>>) {
        self.diagnostics = new;
    }

    pub fn diagnostics_for(&self, uri: &str) -> Vec<Diagnostic> {
        self.diagnostics.get(uri).cloned().unwrap_or_default()
    }

    /// The `(uri, diagnostics)` pairs that should currently be visible to
    /// the editor: one entry per opened document, using an empty list for
    /// documents the analyzer has no errors recorded against.
    pub fn publish_targets(&self) -> Vec<(String, Vec<Diagnostic>)> {
        self.opened_documents
            .iter()
            .map(|uri| (uri.clone(), self.diagnostics_for(uri)))
            .collect()
    }
}
