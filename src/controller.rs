use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::items::{self, Prefill};
use crate::model::{CompanyProfile, DocumentKind, DocumentState, FieldId, Totals, VatRate};
use crate::render::{RenderError, Rendered, Renderer};
use crate::status::{self, Status};
use crate::store::{SlotStore, StorageKey, Tool};

// ==========================================
// Document Controller
// ==========================================

/// Edit applied to a single line. Quantity and price arrive as raw
/// input text; validation is parse-or-zero at calculation time.
#[derive(Debug, Clone)]
pub enum LineEdit {
    Description(String),
    Quantity(String),
    UnitPrice(String),
    Rate(VatRate),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("required fields missing: {}", labels(.0))]
    MissingFields(Vec<FieldId>),
    #[error(transparent)]
    Render(#[from] RenderError),
}

fn labels(fields: &[FieldId]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Owns the in-memory document for the duration of a session and
/// orchestrates persistence, totals and export. The `restoring` flag
/// suppresses live-slot writes while a snapshot is being applied, so a
/// half-applied restore can never overwrite the persisted copy.
pub struct DocumentController<'a> {
    kind: DocumentKind,
    state: DocumentState,
    store: &'a SlotStore,
    profile: CompanyProfile,
    today: NaiveDate,
    restoring: bool,
}

impl<'a> DocumentController<'a> {
    pub fn new(
        kind: DocumentKind,
        store: &'a SlotStore,
        profile: CompanyProfile,
        today: NaiveDate,
    ) -> Self {
        Self {
            kind,
            state: blank_state(kind),
            store,
            profile,
            today,
            restoring: false,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn totals(&self) -> Totals {
        self.state.totals
    }

    fn tool(&self) -> Tool {
        Tool::from(self.kind)
    }

    // ==========================================
    // Lifecycle
    // ==========================================

    /// Restores the live slot if present, then fills smart defaults
    /// (sender profile, dates, a freshly minted document number) into
    /// fields that are still empty. Restored values are never
    /// overwritten.
    pub fn initialize(&mut self) {
        if let Some(saved) = self.store.load(self.tool(), StorageKey::Live) {
            self.apply_snapshot(saved);
        }
        self.apply_smart_defaults();
        self.recompute();
        self.persist();
    }

    /// Captures the current state into the backup slot, then clears the
    /// form back to a single empty line and reapplies smart defaults.
    /// Destructive; callers must put an explicit, cancellable
    /// confirmation in front of this.
    pub fn reset(&mut self) {
        self.store
            .save(self.tool(), StorageKey::Backup, &self.state);
        self.state = blank_state(self.kind);
        self.apply_smart_defaults();
        self.recompute();
        self.persist();
    }

    /// Applies the backup snapshot if one exists; otherwise a silent
    /// no-op. The backup slot is left in place, so repeated undo keeps
    /// yielding the same snapshot until the next reset.
    pub fn undo(&mut self) -> bool {
        match self.store.load(self.tool(), StorageKey::Backup) {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                self.persist();
                true
            }
            None => false,
        }
    }

    /// Applies a persisted snapshot field by field. The restoring flag
    /// is held for the duration and dropped before returning, so no
    /// save can observe a partially applied state.
    fn apply_snapshot(&mut self, snapshot: DocumentState) {
        self.restoring = true;
        self.state.header = snapshot.header;
        self.state.items = snapshot.items;
        if self.state.items.is_empty() {
            items::add(
                &mut self.state.items,
                default_rate(self.kind),
                Prefill::default(),
            );
        }
        self.recompute();
        self.restoring = false;
    }

    fn apply_smart_defaults(&mut self) {
        let seeds: Vec<(FieldId, String)> = self
            .profile
            .field_values()
            .into_iter()
            .map(|(field, value)| (field, value.to_string()))
            .collect();
        for (field, value) in seeds {
            if self.kind.header_fields().contains(&field)
                && !value.is_empty()
                && self.state.field_is_empty(field)
            {
                self.state.header.insert(field, value);
            }
        }
        if self.state.field_is_empty(FieldId::DocumentDate) {
            self.state
                .header
                .insert(FieldId::DocumentDate, format_date(self.today));
        }
        let deadline = self.kind.deadline_field();
        if self.state.field_is_empty(deadline) {
            self.state
                .header
                .insert(deadline, format_date(self.today + Duration::days(14)));
        }
        if self.state.field_is_empty(FieldId::DocumentNumber) {
            let number = self.store.next_document_number(self.tool(), self.today);
            self.state.header.insert(FieldId::DocumentNumber, number);
        }
    }

    // ==========================================
    // Commands
    // ==========================================

    pub fn on_field_changed(&mut self, field: FieldId, value: String) -> Status {
        if field == FieldId::DocumentNumber {
            self.store
                .record_document_number(self.tool(), &value, self.today);
        }
        self.state.header.insert(field, value);
        self.recompute();
        self.persist();
        self.status()
    }

    pub fn on_line_added(&mut self, prefill: Prefill) -> u64 {
        let id = items::add(&mut self.state.items, default_rate(self.kind), prefill);
        self.recompute();
        self.persist();
        id
    }

    /// Returns false when the row does not exist.
    pub fn on_line_edited(&mut self, id: u64, edit: LineEdit) -> bool {
        let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        match edit {
            LineEdit::Description(v) => item.description = v,
            LineEdit::Quantity(v) => item.quantity = v,
            LineEdit::UnitPrice(v) => item.unit_price = v,
            LineEdit::Rate(rate) => item.vat_rate = rate,
        }
        self.recompute();
        self.persist();
        true
    }

    /// Returns false when the row is the last one (the collection
    /// never drops below one row) or the id is unknown.
    pub fn on_line_removed(&mut self, id: u64) -> bool {
        let removed = items::remove(&mut self.state.items, id);
        if removed {
            self.recompute();
            self.persist();
        }
        removed
    }

    // ==========================================
    // Derived State
    // ==========================================

    fn recompute(&mut self) -> Totals {
        self.state.totals = items::recompute(&self.state.items);
        self.state.totals
    }

    pub fn status(&self) -> Status {
        status::evaluate(self.missing_required().is_empty(), &self.state.totals)
    }

    pub fn missing_required(&self) -> Vec<FieldId> {
        self.kind
            .required_fields()
            .iter()
            .copied()
            .filter(|f| self.state.field_is_empty(*f))
            .collect()
    }

    // ==========================================
    // Export
    // ==========================================

    /// Validates the minimum header fields, then hands an immutable
    /// snapshot to the renderer. Neither validation failure nor render
    /// failure mutates or persists any state.
    pub fn export(&self, renderer: &dyn Renderer) -> Result<Rendered, ExportError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ExportError::MissingFields(missing));
        }
        let snapshot = self.state.clone();
        Ok(renderer.render(self.kind, &snapshot)?)
    }

    // ==========================================
    // Persistence
    // ==========================================

    fn persist(&self) {
        if self.restoring {
            return;
        }
        self.store.save(self.tool(), StorageKey::Live, &self.state);
    }
}

fn default_rate(kind: DocumentKind) -> VatRate {
    kind.vat_brackets()[0]
}

fn blank_state(kind: DocumentKind) -> DocumentState {
    let mut state = DocumentState {
        header: BTreeMap::new(),
        items: Vec::new(),
        totals: Totals::default(),
    };
    items::add(&mut state.items, default_rate(kind), Prefill::default());
    state
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct RecordingRenderer {
        last: RefCell<Option<DocumentState>>,
    }

    impl RecordingRenderer {
        fn new() -> Self {
            Self {
                last: RefCell::new(None),
            }
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(
            &self,
            _kind: DocumentKind,
            snapshot: &DocumentState,
        ) -> Result<Rendered, RenderError> {
            *self.last.borrow_mut() = Some(snapshot.clone());
            Ok(Rendered::SourceOnly(PathBuf::from("out.typ")))
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(
            &self,
            _kind: DocumentKind,
            _snapshot: &DocumentState,
        ) -> Result<Rendered, RenderError> {
            Err(RenderError::Compile(PathBuf::from("out.typ")))
        }
    }

    fn profile() -> CompanyProfile {
        CompanyProfile {
            name: "MHM IT".into(),
            kvk_number: "12345678".into(),
            ..CompanyProfile::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 26).unwrap()
    }

    #[test]
    fn initialize_seeds_smart_defaults_into_empty_fields() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Quote, &store, profile(), today());
        ctrl.initialize();

        let state = ctrl.state();
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.field(FieldId::CompanyName), "MHM IT");
        assert_eq!(state.field(FieldId::DocumentDate), "26-08-2026");
        assert_eq!(state.field(FieldId::ValidUntil), "09-09-2026");
        assert_eq!(state.field(FieldId::DocumentNumber), "2026-001");
    }

    #[test]
    fn restore_wins_over_smart_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        {
            let mut ctrl =
                DocumentController::new(DocumentKind::Quote, &store, profile(), today());
            ctrl.initialize();
            ctrl.on_field_changed(FieldId::ClientName, "Jansen BV".into());
            ctrl.on_field_changed(FieldId::DocumentDate, "01-08-2026".into());
            ctrl.on_line_edited(ctrl.state().items[0].id, LineEdit::UnitPrice("75".into()));
        }

        let mut ctrl = DocumentController::new(DocumentKind::Quote, &store, profile(), today());
        ctrl.initialize();
        assert_eq!(ctrl.state().field(FieldId::ClientName), "Jansen BV");
        assert_eq!(ctrl.state().field(FieldId::DocumentDate), "01-08-2026");
        assert_eq!(ctrl.state().items[0].unit_price, "75");
        // No fresh number was minted for a restored document.
        assert_eq!(ctrl.state().field(FieldId::DocumentNumber), "2026-001");
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        ctrl.initialize();
        let first = ctrl.state().clone();

        let mut again = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        again.initialize();
        assert_eq!(*again.state(), first);
    }

    #[test]
    fn reset_backs_up_and_undo_restores_exactly() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        ctrl.initialize();
        ctrl.on_field_changed(FieldId::ClientName, "Jansen BV".into());
        ctrl.on_line_edited(
            ctrl.state().items[0].id,
            LineEdit::Description("Onderhoud".into()),
        );
        ctrl.on_line_edited(ctrl.state().items[0].id, LineEdit::UnitPrice("100".into()));
        let before_reset = ctrl.state().clone();

        ctrl.reset();
        assert_eq!(ctrl.state().field(FieldId::ClientName), "");
        assert_eq!(ctrl.state().items.len(), 1);
        assert_eq!(ctrl.state().items[0].description, "");

        assert!(ctrl.undo());
        assert_eq!(*ctrl.state(), before_reset);

        // Undo does not consume the backup.
        assert!(ctrl.undo());
        assert_eq!(*ctrl.state(), before_reset);
    }

    #[test]
    fn undo_without_backup_is_a_noop() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Quote, &store, profile(), today());
        ctrl.initialize();
        let state = ctrl.state().clone();
        assert!(!ctrl.undo());
        assert_eq!(*ctrl.state(), state);
    }

    #[test]
    fn export_blocked_without_counterparty_writes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        ctrl.initialize();
        // Client name stays empty; wipe the slots initialize wrote so
        // any write by export would be visible.
        std::fs::remove_file(dir.path().join("state/factuur_state.json")).ok();
        std::fs::remove_file(dir.path().join("state/factuur_backup.json")).ok();

        let renderer = RecordingRenderer::new();
        let result = ctrl.export(&renderer);
        assert!(matches!(result, Err(ExportError::MissingFields(_))));
        assert!(renderer.last.borrow().is_none());
        assert!(store
            .load::<DocumentState>(Tool::Invoice, StorageKey::Live)
            .is_none());
        assert!(store
            .load::<DocumentState>(Tool::Invoice, StorageKey::Backup)
            .is_none());
    }

    #[test]
    fn export_hands_renderer_the_current_snapshot() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        ctrl.initialize();
        ctrl.on_field_changed(FieldId::ClientName, "Jansen BV".into());

        let renderer = RecordingRenderer::new();
        let rendered = ctrl.export(&renderer).expect("export succeeds");
        assert_eq!(rendered, Rendered::SourceOnly(PathBuf::from("out.typ")));
        assert_eq!(renderer.last.borrow().as_ref(), Some(ctrl.state()));
    }

    #[test]
    fn failed_export_leaves_state_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Invoice, &store, profile(), today());
        ctrl.initialize();
        ctrl.on_field_changed(FieldId::ClientName, "Jansen BV".into());
        let before = ctrl.state().clone();

        assert!(ctrl.export(&FailingRenderer).is_err());
        assert_eq!(*ctrl.state(), before);
        let persisted: DocumentState = store.load(Tool::Invoice, StorageKey::Live).unwrap();
        assert_eq!(persisted, before);
    }

    #[test]
    fn manual_document_numbers_keep_the_sequence_monotonic() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Quote, &store, profile(), today());
        ctrl.initialize();
        ctrl.on_field_changed(FieldId::DocumentNumber, "2026-050".into());

        assert_eq!(
            store.next_document_number(Tool::Quote, today()),
            "2026-051"
        );
    }

    #[test]
    fn line_commands_return_derived_state() {
        let dir = TempDir::new().expect("tempdir");
        let store = SlotStore::new(dir.path());
        let mut ctrl = DocumentController::new(DocumentKind::Quote, &store, profile(), today());
        ctrl.initialize();

        let first = ctrl.state().items[0].id;
        ctrl.on_line_edited(first, LineEdit::Quantity("2".into()));
        ctrl.on_line_edited(first, LineEdit::UnitPrice("50".into()));
        let second = ctrl.on_line_added(Prefill {
            quantity: Some("1".into()),
            unit_price: Some("10".into()),
            vat_rate: Some(VatRate::Zero),
            ..Prefill::default()
        });

        let totals = ctrl.totals();
        assert_eq!(totals.subtotal, 110.0);
        assert_eq!(totals.vat_total, 21.0);
        assert_eq!(totals.grand_total, 131.0);
        assert!(totals.missing_vat);

        assert!(ctrl.on_line_removed(second));
        assert!(!ctrl.on_line_removed(first));
        assert_eq!(ctrl.state().items.len(), 1);
        assert!(!ctrl.totals().missing_vat);
    }
}
