use std::fs;
use std::path::PathBuf;
use std::process::Command;

use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::model::{DocumentKind, DocumentState, FieldId};
use crate::money::format_eur;

// ==========================================
// Rendering Collaborator
// ==========================================

// Embed templates at compile time to ensure availability
const INVOICE_TEMPLATE: &str = include_str!("../templates/invoice.tera");
const QUOTE_TEMPLATE: &str = include_str!("../templates/quote.tera");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("could not write document: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF compilation failed for {}", .0.display())]
    Compile(PathBuf),
}

/// What the renderer produced: a compiled PDF, or the document source
/// when the PDF toolchain is unavailable and we fall back to leaving
/// the source for manual printing.
#[derive(Debug, PartialEq, Eq)]
pub enum Rendered {
    Pdf(PathBuf),
    SourceOnly(PathBuf),
}

/// Boundary to the external document renderer. Receives a resolved
/// snapshot, never live editor state.
pub trait Renderer {
    fn render(&self, kind: DocumentKind, snapshot: &DocumentState) -> Result<Rendered, RenderError>;
}

/// Production renderer: tera template → Typst source → `typst compile`.
pub struct TypstRenderer {
    root: PathBuf,
}

impl TypstRenderer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Writes the embedded templates into `<root>/templates` on first
    /// use so users can customize them, then loads the directory.
    fn load_templates(&self) -> Result<Tera, RenderError> {
        let template_dir = self.root.join("templates");
        fs::create_dir_all(&template_dir)?;
        for (name, content) in [
            ("invoice.tera", INVOICE_TEMPLATE),
            ("quote.tera", QUOTE_TEMPLATE),
        ] {
            let path = template_dir.join(name);
            if !path.exists() {
                fs::write(&path, content)?;
            }
        }
        let glob = template_dir.join("*.tera");
        Ok(Tera::new(&glob.to_string_lossy())?)
    }
}

impl Renderer for TypstRenderer {
    fn render(&self, kind: DocumentKind, snapshot: &DocumentState) -> Result<Rendered, RenderError> {
        let tera = self.load_templates()?;
        let context = Context::from_serialize(build_context(kind, snapshot))?;
        let rendered = tera.render(kind.template_name(), &context)?;

        let output_dir = self.root.join("output");
        fs::create_dir_all(&output_dir)?;
        let base = export_filename(kind, snapshot.field(FieldId::DocumentNumber));
        let source_path = output_dir.join(format!("{}.typ", base));
        fs::write(&source_path, rendered)?;

        // No typst on the PATH: leave the source in place so it can be
        // printed or compiled by hand.
        if Command::new("typst").arg("--version").output().is_err() {
            return Ok(Rendered::SourceOnly(source_path));
        }

        let pdf_path = output_dir.join(format!("{}.pdf", base));
        match Command::new("typst")
            .arg("compile")
            .arg(&source_path)
            .arg(&pdf_path)
            .status()
        {
            Ok(s) if s.success() => Ok(Rendered::Pdf(pdf_path)),
            _ => Err(RenderError::Compile(source_path)),
        }
    }
}

/// Filename base for an export: tool slug plus the document number
/// with everything outside `[A-Za-z0-9-]` replaced by `_`.
pub fn export_filename(kind: DocumentKind, document_number: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9-]").unwrap();
    let number = if document_number.trim().is_empty() {
        "concept".to_string()
    } else {
        re.replace_all(document_number.trim(), "_").to_string()
    };
    format!("{}-{}", kind.slug(), number)
}

// ==========================================
// Template Context
// ==========================================

#[derive(Debug, Serialize)]
pub struct RenderRow {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub vat_rate: String,
    pub line_total: String,
}

#[derive(Debug, Serialize)]
pub struct RenderContext {
    pub title: String,
    pub number: String,
    pub date: String,
    pub deadline_label: String,
    pub deadline: String,
    pub company_name: String,
    pub company_address: String,
    pub company_postcode_city: String,
    pub company_vat: String,
    pub company_kvk: String,
    pub company_iban: String,
    pub company_bank: String,
    pub company_account_holder: String,
    pub client_name: String,
    pub client_address: String,
    pub client_postcode_city: String,
    pub rows: Vec<RenderRow>,
    pub subtotal: String,
    pub vat_total: String,
    pub grand_total: String,
    pub has_payment_details: bool,
}

/// Resolves a snapshot into the flat context the templates consume.
/// Rows without a description are left out of the rendered document,
/// as the original tools do.
pub fn build_context(kind: DocumentKind, state: &DocumentState) -> RenderContext {
    let rows = state
        .items
        .iter()
        .filter(|item| !item.description.trim().is_empty())
        .map(|item| RenderRow {
            description: item.description.clone(),
            quantity: item.quantity.clone(),
            unit_price: format_eur(crate::money::parse_eur(&item.unit_price)),
            vat_rate: item.vat_rate.label().to_string(),
            line_total: format_eur(item.line_total()),
        })
        .collect();

    let field = |id: FieldId| state.field(id).to_string();
    let has_payment_details = !state.field_is_empty(FieldId::CompanyIban)
        || !state.field_is_empty(FieldId::CompanyBank)
        || !state.field_is_empty(FieldId::CompanyAccountHolder);

    RenderContext {
        title: kind.title().to_string(),
        number: field(FieldId::DocumentNumber),
        date: field(FieldId::DocumentDate),
        deadline_label: match kind {
            DocumentKind::Invoice => "Vervaldatum".to_string(),
            DocumentKind::Quote => "Geldig tot".to_string(),
        },
        deadline: field(kind.deadline_field()),
        company_name: field(FieldId::CompanyName),
        company_address: field(FieldId::CompanyAddress),
        company_postcode_city: field(FieldId::CompanyPostcodeCity),
        company_vat: field(FieldId::CompanyVatNumber),
        company_kvk: field(FieldId::CompanyKvkNumber),
        company_iban: field(FieldId::CompanyIban),
        company_bank: field(FieldId::CompanyBank),
        company_account_holder: field(FieldId::CompanyAccountHolder),
        client_name: field(FieldId::ClientName),
        client_address: field(FieldId::ClientAddress),
        client_postcode_city: field(FieldId::ClientPostcodeCity),
        rows,
        subtotal: format_eur(state.totals.subtotal),
        vat_total: format_eur(state.totals.vat_total),
        grand_total: format_eur(state.totals.grand_total),
        has_payment_details,
    }
}
