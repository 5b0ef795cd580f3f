// src/edgar/fetcher.rs
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::edgar::client::EdgarClient;
use crate::edgar::filing::{FilingReference, FormFamily};
use crate::edgar::models::FilingManifest;
use crate::utils::error::EdgarError;

// Optional namespace prefix, then the element name and a delimiter.
static INFO_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?infoTable[\s/>]").expect("Failed to compile INFO_TABLE_RE")
});

static OWNERSHIP_DOCUMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?ownershipDocument[\s/>]").expect("Failed to compile OWNERSHIP_DOCUMENT_RE")
});

/// Schema marker that identifies the structured document of a family.
/// Ownership filings have no structured document and go straight to the
/// primary document.
pub fn schema_marker(family: FormFamily) -> Option<&'static Regex> {
    match family {
        FormFamily::Holdings => Some(&INFO_TABLE_RE),
        FormFamily::Insider => Some(&OWNERSHIP_DOCUMENT_RE),
        FormFamily::Ownership => None,
    }
}

/// A downloaded document and where it came from.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub file_name: String,
    pub url: String,
    pub content: String,
}

/// Picks and downloads the document to parse for each filing.
pub struct DocumentFetcher {
    client: Arc<EdgarClient>,
}

impl DocumentFetcher {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self { client }
    }

    pub async fn manifest(&self, filing: &FilingReference) -> Result<FilingManifest, EdgarError> {
        let url = self.client.manifest_url(filing.cik, &filing.accession_number)?;
        self.client.get_json(&url).await
    }

    /// Returns the first XML file in the manifest carrying the family's schema
    /// marker. Falls back to the primary document when the manifest lists it.
    pub async fn fetch(&self, filing: &FilingReference, family: FormFamily) -> Result<FetchedDocument, EdgarError> {
        let Some(marker) = schema_marker(family) else {
            return self.download(filing, &filing.primary_document).await;
        };

        let manifest = self.manifest(filing).await?;
        for item in manifest.directory.item.iter().filter(|item| item.is_xml()) {
            match self.download(filing, &item.name).await {
                Ok(document) if marker.is_match(&document.content) => {
                    tracing::debug!("Found {} document {} in {}", family.as_str(), item.name, filing.accession_number);
                    return Ok(document);
                }
                Ok(_) => continue,
                Err(e) if e.is_access_denied() => return Err(e),
                Err(e) => tracing::warn!("Skipping {} in {}: {}", item.name, filing.accession_number, e),
            }
        }

        if lists_primary(&manifest, &filing.primary_document) {
            tracing::debug!(
                "No {} marker in {}, using primary document {}",
                family.as_str(),
                filing.accession_number,
                filing.primary_document
            );
            return self.download(filing, &filing.primary_document).await;
        }

        Err(EdgarError::DocumentNotFound(filing.accession_number.to_string()))
    }

    async fn download(&self, filing: &FilingReference, name: &str) -> Result<FetchedDocument, EdgarError> {
        if name.trim().is_empty() {
            return Err(EdgarError::DocumentNotFound(filing.accession_number.to_string()));
        }
        let url = self.client.document_url(filing.cik, &filing.accession_number, name)?;
        let content = self.client.get_text(&url).await?;
        Ok(FetchedDocument {
            file_name: name.to_string(),
            url: url.to_string(),
            content,
        })
    }
}

/// Rendered primary documents live in a subfolder ("xslF345X05/doc.xml");
/// the manifest lists only the top-level entry.
fn lists_primary(manifest: &FilingManifest, primary: &str) -> bool {
    let top = primary.split('/').next().unwrap_or(primary);
    !top.is_empty() && manifest.directory.item.iter().any(|item| item.name == top)
}
