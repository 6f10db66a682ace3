// file: src/loader/pdf.rs
// description: PDF loading, one document per non-empty page
// reference: https://docs.rs/pdf-extract

use crate::error::{RagError, Result};
use crate::loader::TextNormalizer;
use crate::models::{Document, Metadata, SourceKind};
use crate::utils::Validator;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct PdfLoader {
    normalizer: TextNormalizer,
}

impl PdfLoader {
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::new(),
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<Document>> {
        Validator::validate_file_path(path)?;

        let pages = extract_pages(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let documents = self.documents_from_pages(&pages, &file_name);

        if documents.is_empty() {
            warn!("No extractable text found in {}", path.display());
        }
        info!(
            "Loaded {} of {} pages from {}",
            documents.len(),
            pages.len(),
            path.display()
        );

        Ok(documents)
    }

    pub fn page_count(&self, path: &Path) -> Result<usize> {
        Validator::validate_file_path(path)?;
        Ok(extract_pages(path)?.len())
    }

    fn documents_from_pages(&self, pages: &[String], file_name: &str) -> Vec<Document> {
        pages
            .iter()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let text = self.normalizer.normalize(raw);
                if text.is_empty() {
                    debug!("Skipping blank page {}", idx + 1);
                    return None;
                }

                let document = Document::new(SourceKind::Pdf, text, Metadata::new())
                    .with_metadata("page_label", (idx + 1).to_string())
                    .with_metadata("file_name", file_name);
                Some(document)
            })
            .collect()
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

// pdf-extract panics on some malformed content streams.
fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    match extracted {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(RagError::PdfExtract {
            file: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(RagError::PdfExtract {
            file: path.display().to_string(),
            message: "extractor panicked on malformed content".to_string(),
        }),
    }
}

/// Writes a minimal PDF with one Helvetica text line per page.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, pages: &[&str]) {
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, object));
    }

    let xref = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));

    std::fs::write(path, out).unwrap();
}
