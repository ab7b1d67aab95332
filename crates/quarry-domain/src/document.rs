//! Source documents handed over by the text-extraction collaborator

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Plain text of one source document, read-only to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Project the document belongs to
    pub project: String,

    /// Original file name (with extension)
    pub name: String,

    /// Structural category prefix, e.g. `ROP` for `ROP-2023-final.pdf`
    pub category_prefix: String,

    /// Extracted plain text
    pub text: String,

    /// Size of `text` in bytes
    pub size: usize,
}

impl SourceDocument {
    /// Create a document, deriving the category prefix from its name
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_domain::SourceDocument;
    ///
    /// let doc = SourceDocument::new("CFA009660", "rop-informe_final.pdf", "texto");
    /// assert_eq!(doc.category_prefix, "ROP");
    /// assert_eq!(doc.stem(), "rop-informe_final");
    /// assert_eq!(doc.size, 5);
    /// ```
    pub fn new(project: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let text = text.into();
        Self {
            project: project.into(),
            category_prefix: derive_category_prefix(&name),
            size: text.len(),
            name,
            text,
        }
    }

    /// Override the derived prefix (the collaborator may know better)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.category_prefix = prefix.into().to_uppercase();
        self
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        document_stem(&self.name)
    }
}

/// File name without its extension
pub fn document_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Derive the category prefix from a document name
///
/// Naming convention: the segment before the first `-`, or the first three
/// characters when there is no dash. Any `_chunk_` suffix is ignored.
pub fn derive_category_prefix(name: &str) -> String {
    let base = match name.find("_chunk_") {
        Some(pos) => &name[..pos],
        None => name,
    };

    match base.split_once('-') {
        Some((head, _)) => head.to_uppercase(),
        None => base.chars().take(3).collect::<String>().to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_before_dash() {
        assert_eq!(derive_category_prefix("IXP-2024-auditoria.pdf"), "IXP");
        assert_eq!(derive_category_prefix("ifs-q3.docx"), "IFS");
    }

    #[test]
    fn test_prefix_without_dash() {
        assert_eq!(derive_category_prefix("DECreto final.pdf"), "DEC");
        assert_eq!(derive_category_prefix("ab"), "AB");
    }

    #[test]
    fn test_prefix_ignores_chunk_suffix() {
        assert_eq!(derive_category_prefix("INIcial_chunk_003"), "INI");
        assert_eq!(derive_category_prefix("ROP-x_chunk_000"), "ROP");
    }

    #[test]
    fn test_stem_strips_extension_only() {
        assert_eq!(document_stem("a_b.c.pdf"), "a_b.c");
        assert_eq!(document_stem("plain"), "plain");
    }

    #[test]
    fn test_with_prefix_uppercases() {
        let doc = SourceDocument::new("P", "x.txt", "").with_prefix("rop");
        assert_eq!(doc.category_prefix, "ROP");
    }
}
