use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ==========================================
// Document Kinds & VAT Brackets
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Invoice,
    Quote,
}

impl DocumentKind {
    /// Title printed on the rendered document.
    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "FACTUUR",
            DocumentKind::Quote => "OFFERTE",
        }
    }

    /// Prefix for storage slot names and export filenames.
    pub fn slug(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "factuur",
            DocumentKind::Quote => "offerte",
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice.tera",
            DocumentKind::Quote => "quote.tera",
        }
    }

    /// VAT brackets offered by this tool. The invoice form only offers
    /// 0% and 21%; the quote form also offers the reduced 9% rate.
    pub fn vat_brackets(&self) -> &'static [VatRate] {
        match self {
            DocumentKind::Invoice => &[VatRate::Standard, VatRate::Zero],
            DocumentKind::Quote => &[VatRate::Standard, VatRate::Low, VatRate::Zero],
        }
    }

    /// Header fields shown in the editor, in form order.
    pub fn header_fields(&self) -> &'static [FieldId] {
        match self {
            DocumentKind::Invoice => &[
                FieldId::CompanyName,
                FieldId::CompanyAddress,
                FieldId::CompanyPostcodeCity,
                FieldId::CompanyVatNumber,
                FieldId::CompanyKvkNumber,
                FieldId::CompanyIban,
                FieldId::CompanyBank,
                FieldId::CompanyAccountHolder,
                FieldId::ClientName,
                FieldId::ClientAddress,
                FieldId::ClientPostcodeCity,
                FieldId::DocumentNumber,
                FieldId::DocumentDate,
                FieldId::DueDate,
            ],
            DocumentKind::Quote => &[
                FieldId::CompanyName,
                FieldId::CompanyAddress,
                FieldId::CompanyKvkNumber,
                FieldId::ClientName,
                FieldId::ClientAddress,
                FieldId::DocumentNumber,
                FieldId::DocumentDate,
                FieldId::ValidUntil,
            ],
        }
    }

    /// Minimum fields that must be filled before export.
    pub fn required_fields(&self) -> &'static [FieldId] {
        &[
            FieldId::CompanyName,
            FieldId::ClientName,
            FieldId::DocumentNumber,
        ]
    }

    /// The date field paired with the document date (due date on
    /// invoices, validity date on quotes).
    pub fn deadline_field(&self) -> FieldId {
        match self {
            DocumentKind::Invoice => FieldId::DueDate,
            DocumentKind::Quote => FieldId::ValidUntil,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VatRate {
    Zero,
    Low,
    #[default]
    Standard,
}

impl VatRate {
    pub fn percentage(&self) -> f64 {
        match self {
            VatRate::Zero => 0.0,
            VatRate::Low => 9.0,
            VatRate::Standard => 21.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VatRate::Zero => "0%",
            VatRate::Low => "9%",
            VatRate::Standard => "21%",
        }
    }
}

// ==========================================
// Header Fields
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldId {
    CompanyName,
    CompanyAddress,
    CompanyPostcodeCity,
    CompanyVatNumber,
    CompanyKvkNumber,
    CompanyIban,
    CompanyBank,
    CompanyAccountHolder,
    ClientName,
    ClientAddress,
    ClientPostcodeCity,
    DocumentNumber,
    DocumentDate,
    DueDate,
    ValidUntil,
}

impl FieldId {
    pub fn label(&self) -> &'static str {
        match self {
            FieldId::CompanyName => "Company Name",
            FieldId::CompanyAddress => "Company Address",
            FieldId::CompanyPostcodeCity => "Company Postcode + City",
            FieldId::CompanyVatNumber => "VAT (BTW) Number",
            FieldId::CompanyKvkNumber => "KvK Number",
            FieldId::CompanyIban => "IBAN",
            FieldId::CompanyBank => "Bank",
            FieldId::CompanyAccountHolder => "Account Holder",
            FieldId::ClientName => "Client Name",
            FieldId::ClientAddress => "Client Address",
            FieldId::ClientPostcodeCity => "Client Postcode + City",
            FieldId::DocumentNumber => "Document Number",
            FieldId::DocumentDate => "Document Date",
            FieldId::DueDate => "Due Date",
            FieldId::ValidUntil => "Valid Until",
        }
    }
}

// ==========================================
// Line Items & Totals
// ==========================================

/// One row of the document. Quantity and price are kept as the raw
/// form input; non-numeric values count as zero at calculation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub vat_rate: VatRate,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        crate::money::parse_eur(&self.quantity) * crate::money::parse_eur(&self.unit_price)
    }

    pub fn line_vat(&self) -> f64 {
        self.line_total() * (self.vat_rate.percentage() / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub vat_total: f64,
    pub grand_total: f64,
    /// Set when a line has a nonzero total but a 0% rate. A hint for
    /// the user, not a validation rule.
    pub missing_vat: bool,
}

// ==========================================
// Document State
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub header: BTreeMap<FieldId, String>,
    pub items: Vec<LineItem>,
    pub totals: Totals,
}

impl DocumentState {
    pub fn field(&self, id: FieldId) -> &str {
        self.header.get(&id).map(String::as_str).unwrap_or("")
    }

    pub fn field_is_empty(&self, id: FieldId) -> bool {
        self.field(id).trim().is_empty()
    }
}

// ==========================================
// VAT Calculator State
// ==========================================

/// The standalone VAT calculator keeps two form fields and the last
/// computed breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatState {
    pub amount: String,
    pub rate: VatRate,
    #[serde(default)]
    pub totals: VatBreakdown,
}

impl Default for VatState {
    fn default() -> Self {
        Self {
            amount: String::new(),
            rate: VatRate::Standard,
            totals: VatBreakdown::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VatBreakdown {
    pub excl: f64,
    pub vat: f64,
    pub incl: f64,
}

impl VatState {
    pub fn recompute(&mut self) -> VatBreakdown {
        let excl = crate::money::parse_eur(&self.amount);
        let vat = excl * (self.rate.percentage() / 100.0);
        self.totals = VatBreakdown {
            excl,
            vat,
            incl: excl + vat,
        };
        self.totals
    }
}

// ==========================================
// Sender Profile
// ==========================================

/// Issuing-party defaults, loaded from `sender.toml` in the data root.
/// Applied only to empty company fields during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postcode_city: String,
    #[serde(default)]
    pub vat_number: String,
    #[serde(default)]
    pub kvk_number: String,
    #[serde(default)]
    pub iban: String,
    #[serde(default)]
    pub bank: String,
    #[serde(default)]
    pub account_holder: String,
}

impl CompanyProfile {
    /// Pairs each profile value with the header field it seeds.
    pub fn field_values(&self) -> Vec<(FieldId, &str)> {
        vec![
            (FieldId::CompanyName, self.name.as_str()),
            (FieldId::CompanyAddress, self.address.as_str()),
            (FieldId::CompanyPostcodeCity, self.postcode_city.as_str()),
            (FieldId::CompanyVatNumber, self.vat_number.as_str()),
            (FieldId::CompanyKvkNumber, self.kvk_number.as_str()),
            (FieldId::CompanyIban, self.iban.as_str()),
            (FieldId::CompanyBank, self.bank.as_str()),
            (FieldId::CompanyAccountHolder, self.account_holder.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_totals_follow_quantity_times_price() {
        let item = LineItem {
            id: 1,
            description: "Onderhoud".into(),
            quantity: "2".into(),
            unit_price: "50".into(),
            vat_rate: VatRate::Standard,
        };
        assert_eq!(item.line_total(), 100.0);
        assert_eq!(item.line_vat(), 21.0);
    }

    #[test]
    fn non_numeric_line_input_counts_as_zero() {
        let item = LineItem {
            id: 1,
            description: String::new(),
            quantity: "veel".into(),
            unit_price: "50".into(),
            vat_rate: VatRate::Standard,
        };
        assert_eq!(item.line_total(), 0.0);
        assert_eq!(item.line_vat(), 0.0);
    }

    #[test]
    fn vat_state_breakdown_scenario() {
        // amount=100, rate=21 → excl 100, vat 21, incl 121
        let mut state = VatState {
            amount: "100".into(),
            rate: VatRate::Standard,
            totals: VatBreakdown::default(),
        };
        let result = state.recompute();
        assert_eq!(result.excl, 100.0);
        assert_eq!(result.vat, 21.0);
        assert_eq!(result.incl, 121.0);
    }

    #[test]
    fn brackets_differ_per_tool() {
        assert!(!DocumentKind::Invoice.vat_brackets().contains(&VatRate::Low));
        assert!(DocumentKind::Quote.vat_brackets().contains(&VatRate::Low));
        assert_eq!(VatRate::default(), VatRate::Standard);
    }
}
