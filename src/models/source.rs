//! Source (retrieval audit) and document rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::DiscoverySource;

/// One retrieval audit row. `procedure_id` stays null when the item was
/// rejected, so the fetch remains auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub procedure_id: Option<String>,
    pub source_url: String,
    pub http_status: u16,
    pub retrieved_at: DateTime<Utc>,
    pub discovery_source: DiscoverySource,
    pub discovery_path: String,
}

impl SourceRecord {
    pub fn new(
        source_url: &str,
        http_status: u16,
        discovery_source: DiscoverySource,
        discovery_path: &str,
    ) -> Self {
        Self {
            source_id: uuid::Uuid::new_v4().to_string(),
            procedure_id: None,
            source_url: source_url.to_string(),
            http_status,
            retrieved_at: Utc::now(),
            discovery_source,
            discovery_path: discovery_path.to_string(),
        }
    }

    pub fn for_procedure(mut self, procedure_id: &str) -> Self {
        self.procedure_id = Some(procedure_id.to_string());
        self
    }
}

/// A retrieved file, content-addressed by SHA-256.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub source_id: String,
    pub doc_url: String,
    pub doc_type: String,
    /// SHA-256 of the stored bytes.
    pub sha256: String,
    /// Blob-store relative path (`docs/<xx>/<sha256>.bin`).
    pub file_path: String,
    pub text_extracted: Option<String>,
    pub ocr_used: bool,
    /// Byte offsets of page boundaries in the extracted text, when known.
    pub page_map: Option<Vec<usize>>,
}

impl DocumentRecord {
    /// Compute the SHA-256 hex digest of document content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    pub fn new(source_id: &str, doc_url: &str, doc_type: &str, content: &[u8]) -> Self {
        let sha256 = Self::compute_hash(content);
        let file_path = format!("docs/{}/{}.bin", &sha256[..2], sha256);
        Self {
            document_id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            doc_url: doc_url.to_string(),
            doc_type: doc_type.to_string(),
            sha256,
            file_path,
            text_extracted: None,
            ocr_used: false,
            page_map: None,
        }
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text_extracted = text;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_path_are_consistent() {
        let doc = DocumentRecord::new("src-1", "https://example.org/a.pdf", "pdf", b"hello");
        assert_eq!(doc.sha256, DocumentRecord::compute_hash(b"hello"));
        assert_eq!(doc.file_path, format!("docs/{}/{}.bin", &doc.sha256[..2], doc.sha256));
    }

    #[test]
    fn rejected_source_keeps_null_procedure() {
        let src = SourceRecord::new(
            "https://example.org/item",
            200,
            DiscoverySource::Ris,
            "https://example.org/list",
        );
        assert!(src.procedure_id.is_none());
        let linked = src.for_procedure("p-1");
        assert_eq!(linked.procedure_id.as_deref(), Some("p-1"));
    }
}
