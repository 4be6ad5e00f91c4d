//! Translates the analyzer's own error records into LSP `Diagnostic`s and
//! groups them by file.

use std::collections::HashMap;

use serde::Deserialize;

use crate::lsp::types::{Diagnostic, DiagnosticSeverity, Position, Range};

/// One error as the analyzer reports it: 1-based line numbers, columns
/// passed through exactly as received.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerError {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub stop_line: u32,
    pub stop_column: u32,
    pub description: String,
}

/// Converts an absolute filesystem path into a `file://` URI. Does not
/// handle Windows drive-letter paths or UNC paths; this bridge's external
/// collaborators only ever hand it POSIX-style absolute paths.
pub fn path_to_uri(path: &str) -> String {
    if path.starts_with("file://") {
        path.to_string()
    } else {
        format!("file://{path}")
    }
}

/// Converts one analyzer error record into an LSP diagnostic. The analyzer
/// numbers lines from 1; LSP numbers them from 0. Columns are not
/// renumbered: the analyzer already reports them 0-based.
pub fn translate(error: &AnalyzerError, analyzer_name: &str) -> Diagnostic {
    Diagnostic {
        range: Range {
            start: Position {
                line: error.line.saturating_sub(1),
                character: error.column,
            },
            end: Position {
                line: error.stop_line.saturating_sub(1),
                character: error.stop_column,
            },
        },
        severity: DiagnosticSeverity::ERROR,
        code: None,
        source: analyzer_name.to_string(),
        message: error.description.clone(),
    }
}

/// Groups a flat list of analyzer errors into a `file://` URI to
/// diagnostics map, translating each one on the way in.
pub fn group_by_path(errors: &[AnalyzerError], analyzer_name: &str) -> HashMap<String, Vec<Diagnostic>> {
    let mut grouped: HashMap<String, Vec<Diagnostic>> = HashMap::new();
    for error in errors {
        grouped
            .entry(path_to_uri(&error.path))
            .or_default()
            .push(translate(error, analyzer_name));
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translate_rebases_line_but_not_column() {
        let error: AnalyzerError = serde_json::from_value(json!({
            "path": "/repo/a.py",
            "line": 12,
            "column": 4,
            "stop_line": 12,
            "stop_column": 9,
            "description": "Incompatible type"
        }))
        .unwrap();

        let diagnostic = translate(&error, "analyzer");
        assert_eq!(diagnostic.range.start.line, 11);
        assert_eq!(diagnostic.range.start.character, 4);
        assert_eq!(diagnostic.range.end.line, 11);
        assert_eq!(diagnostic.range.end.character, 9);
        assert_eq!(diagnostic.source, "analyzer");
        assert!(diagnostic.code.is_none());
    }

    #[test]
    fn group_by_path_buckets_multiple_errors_per_file() {
        let errors: Vec<AnalyzerError> = serde_json::from_value(json!([
            {"path": "/repo/a.py", "line": 1, "column": 0, "stop_line": 1, "stop_column": 3, "description": "x"},
            {"path": "/repo/a.py", "line": 2, "column": 0, "stop_line": 2, "stop_column": 3, "description": "y"},
            {"path": "/repo/b.py", "line": 1, "column": 0, "stop_line": 1, "stop_column": 3, "description": "z"},
        ]))
        .unwrap();

        let grouped = group_by_path(&errors, "analyzer");
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["file:///repo/a.py"].len(), 2);
        assert_eq!(grouped["file:///repo/b.py"].len(), 1);
    }

    #[test]
    fn path_to_uri_is_idempotent_on_existing_uris() {
        assert_eq!(path_to_uri("file:///a.py"), "file:///a.py");
        assert_eq!(path_to_uri("/a.py"), "file:///a.py");
    }
}
