mod controller;
mod items;
mod model;
mod money;
mod render;
mod status;
mod store;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Table};
use directories::{BaseDirs, ProjectDirs};
use inquire::{Confirm, DateSelect, Select, Text};
use serde::{Deserialize, Serialize};

use crate::controller::{DocumentController, ExportError, LineEdit};
use crate::items::Prefill;
use crate::model::{CompanyProfile, DocumentKind, FieldId, VatRate, VatState};
use crate::money::format_eur;
use crate::render::{Rendered, TypstRenderer};
use crate::store::{SlotStore, StorageKey, Tool};

// ==========================================
// Constants & Embeds
// ==========================================

const DEFAULT_SENDER_TEMPLATE: &str = include_str!("../sender.toml");

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Debug, Serialize, Deserialize)]
struct AppSettings {
    data_root: String,
}

#[derive(Parser)]
#[command(name = "offerte")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit and export an invoice (factuur)
    Invoice,
    /// Edit and export a quote (offerte)
    Quote,
    /// BTW (VAT) calculator
    Vat,
    /// Configure data directory
    Config,
    /// Open output folder
    Open,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    let cli = Cli::parse();

    let settings = load_settings().unwrap_or_else(setup_config_wizard);
    let expanded_path = expand_home_dir(&settings.data_root);
    let root = PathBuf::from(expanded_path);

    if let Err(e) = fs::create_dir_all(&root) {
        eprintln!("❌ Error: Failed to create data directory: {}", e);
        return;
    }

    let store = SlotStore::new(&root);

    if cli.command.is_none() {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        return;
    }

    match cli.command.unwrap() {
        Commands::Invoice => run_document_editor(DocumentKind::Invoice, &root, &store),
        Commands::Quote => run_document_editor(DocumentKind::Quote, &root, &store),
        Commands::Vat => run_vat_tool(&store),
        Commands::Config => {
            setup_config_wizard();
        }
        Commands::Open => open_output_folder(&root),
    }
}

// ==========================================
// 1. Document Editor (Invoice & Quote)
// ==========================================

fn run_document_editor(kind: DocumentKind, root: &Path, store: &SlotStore) {
    let profile = load_sender_profile(root);
    let today = Local::now().date_naive();
    let mut ctrl = DocumentController::new(kind, store, profile, today);
    ctrl.initialize();

    println!("\n--- {} Editor ---", kind.title());
    show_document(&ctrl);

    loop {
        let options = vec![
            "📋 Show document",
            "✏️  Edit header field",
            "➕ Add line",
            "📝 Edit line",
            "🗑  Remove line",
            "📄 Export PDF",
            "♻️  Reset form",
            "↩️  Undo reset",
            "🚪 Quit",
        ];

        let choice = match Select::new("Action:", options).prompt() {
            Ok(c) => c,
            Err(_) => return,
        };

        match choice {
            "📋 Show document" => show_document(&ctrl),
            "✏️  Edit header field" => edit_header_field(&mut ctrl),
            "➕ Add line" => {
                ctrl.on_line_added(Prefill::default());
                show_document(&ctrl);
            }
            "📝 Edit line" => edit_line(&mut ctrl),
            "🗑  Remove line" => remove_line(&mut ctrl),
            "📄 Export PDF" => export_document(&ctrl, root),
            "♻️  Reset form" => reset_document(&mut ctrl),
            "↩️  Undo reset" => {
                if ctrl.undo() {
                    println!("✅ Previous state restored.");
                    show_document(&ctrl);
                } else {
                    println!("ℹ️  No backup to restore.");
                }
            }
            _ => return,
        }
    }
}

fn edit_header_field(ctrl: &mut DocumentController) {
    let fields = ctrl.kind().header_fields();
    let labels: Vec<&str> = fields.iter().map(|f| f.label()).collect();

    let Ok(label) = Select::new("Field:", labels).prompt() else {
        return;
    };
    let field = fields
        .iter()
        .copied()
        .find(|f| f.label() == label)
        .expect("selected label maps to a field");

    let current = ctrl.state().field(field).to_string();
    let is_date = matches!(
        field,
        FieldId::DocumentDate | FieldId::DueDate | FieldId::ValidUntil
    );
    let value = if is_date {
        let default = NaiveDate::parse_from_str(&current, "%d-%m-%Y")
            .unwrap_or_else(|_| Local::now().date_naive());
        match DateSelect::new(&format!("{}:", label))
            .with_default(default)
            .prompt()
        {
            Ok(date) => date.format("%d-%m-%Y").to_string(),
            Err(_) => return,
        }
    } else {
        match Text::new(&format!("{}:", label)).with_default(&current).prompt() {
            Ok(v) => v,
            Err(_) => return,
        }
    };

    let status = ctrl.on_field_changed(field, value);
    println!("{} {}", status.severity.marker(), status.message);
}

fn select_line(ctrl: &DocumentController) -> Option<u64> {
    let options: Vec<String> = ctrl
        .state()
        .items
        .iter()
        .map(|i| {
            let desc = if i.description.trim().is_empty() {
                "(empty)"
            } else {
                &i.description
            };
            format!("#{} | {} | {}", i.id, desc, format_eur(i.line_total()))
        })
        .collect();

    let choice = Select::new("Line:", options).prompt().ok()?;
    choice
        .strip_prefix('#')?
        .split(" | ")
        .next()?
        .parse()
        .ok()
}

fn edit_line(ctrl: &mut DocumentController) {
    let Some(id) = select_line(ctrl) else { return };
    let item = match ctrl.state().items.iter().find(|i| i.id == id) {
        Some(i) => i.clone(),
        None => return,
    };

    if let Ok(desc) = Text::new("Description:")
        .with_default(&item.description)
        .prompt()
    {
        ctrl.on_line_edited(id, LineEdit::Description(desc));
    }
    if let Ok(qty) = Text::new("Quantity:").with_default(&item.quantity).prompt() {
        ctrl.on_line_edited(id, LineEdit::Quantity(qty));
    }
    if let Ok(price) = Text::new("Unit Price (€):")
        .with_default(&item.unit_price)
        .prompt()
    {
        ctrl.on_line_edited(id, LineEdit::UnitPrice(price));
    }
    if let Some(rate) = select_vat_rate(ctrl.kind(), item.vat_rate) {
        ctrl.on_line_edited(id, LineEdit::Rate(rate));
    }

    show_document(ctrl);
}

fn select_vat_rate(kind: DocumentKind, current: VatRate) -> Option<VatRate> {
    let brackets = kind.vat_brackets();
    let labels: Vec<&str> = brackets.iter().map(|r| r.label()).collect();
    let start = brackets.iter().position(|r| *r == current).unwrap_or(0);
    let choice = Select::new("VAT Rate:", labels)
        .with_starting_cursor(start)
        .prompt()
        .ok()?;
    brackets.iter().copied().find(|r| r.label() == choice)
}

fn remove_line(ctrl: &mut DocumentController) {
    let Some(id) = select_line(ctrl) else { return };
    if ctrl.on_line_removed(id) {
        show_document(ctrl);
    } else {
        println!("ℹ️  A document keeps at least one line.");
    }
}

fn reset_document(ctrl: &mut DocumentController) {
    let confirmed = Confirm::new("Reset the form? Current values are backed up for undo.")
        .with_default(false)
        .prompt();

    match confirmed {
        Ok(true) => {
            ctrl.reset();
            println!("✅ Form reset. Use Undo to bring the old values back.");
            show_document(ctrl);
        }
        _ => println!("Cancelled"),
    }
}

fn export_document(ctrl: &DocumentController, root: &Path) {
    let renderer = TypstRenderer::new(root.to_path_buf());
    println!("\n🔨 Rendering {}...", ctrl.kind().title());

    match ctrl.export(&renderer) {
        Ok(Rendered::Pdf(path)) => {
            println!("✅ PDF generated: {:?}", path);
            open_and_reveal(&path);
        }
        Ok(Rendered::SourceOnly(path)) => {
            println!(
                "ℹ️  'typst' is not installed; document source saved to {:?}. \
                 Install typst to compile PDFs.",
                path
            );
            open_and_reveal(&path);
        }
        Err(ExportError::MissingFields(_)) => {
            println!("❌ Fill in at least company name, client name and document number.");
        }
        Err(ExportError::Render(e)) => {
            println!("❌ Export failed: {}. Nothing was changed, try again.", e);
        }
    }
}

fn show_document(ctrl: &DocumentController) {
    let state = ctrl.state();

    println!();
    for field in ctrl.kind().header_fields() {
        let value = state.field(*field);
        if !value.is_empty() {
            println!("  {}: {}", field.label(), value);
        }
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Description"),
        Cell::new("Qty"),
        Cell::new("Price"),
        Cell::new("VAT"),
        Cell::new("Total"),
    ]);
    for item in &state.items {
        table.add_row(vec![
            Cell::new(&item.description),
            Cell::new(&item.quantity),
            Cell::new(format_eur(money::parse_eur(&item.unit_price))),
            Cell::new(item.vat_rate.label()),
            Cell::new(format_eur(item.line_total())),
        ]);
    }
    let totals = ctrl.totals();
    table.add_row(vec![
        Cell::new("Subtotal (excl. VAT)").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_eur(totals.subtotal)),
    ]);
    table.add_row(vec![
        Cell::new("VAT").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_eur(totals.vat_total)),
    ]);
    table.add_row(vec![
        Cell::new("Total (incl. VAT)").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_eur(totals.grand_total)).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    let status = ctrl.status();
    println!("{} {}\n", status.severity.marker(), status.message);
}

// ==========================================
// 2. VAT Calculator
// ==========================================

fn run_vat_tool(store: &SlotStore) {
    println!("\n--- BTW Calculator ---");
    let mut state: VatState = store.load(Tool::Vat, StorageKey::Live).unwrap_or_default();
    state.recompute();
    show_vat(&state);

    loop {
        let options = vec!["🧮 New calculation", "♻️  Reset", "↩️  Undo reset", "🚪 Quit"];
        let choice = match Select::new("Action:", options).prompt() {
            Ok(c) => c,
            Err(_) => return,
        };

        match choice {
            "🧮 New calculation" => {
                if let Ok(amount) = Text::new("Amount excl. VAT (€):")
                    .with_default(&state.amount)
                    .prompt()
                {
                    state.amount = amount;
                }
                let brackets = [VatRate::Standard, VatRate::Low, VatRate::Zero];
                let labels: Vec<&str> = brackets.iter().map(|r| r.label()).collect();
                if let Ok(choice) = Select::new("VAT Rate:", labels).prompt() {
                    if let Some(rate) = brackets.iter().copied().find(|r| r.label() == choice) {
                        state.rate = rate;
                    }
                }
                state.recompute();
                store.save(Tool::Vat, StorageKey::Live, &state);
                show_vat(&state);
            }
            "♻️  Reset" => {
                let confirmed = Confirm::new("Reset the calculation? Current values are kept for undo.")
                    .with_default(false)
                    .prompt();
                match confirmed {
                    Ok(true) => {
                        state = reset_vat(store, &state);
                        show_vat(&state);
                    }
                    _ => println!("Cancelled"),
                }
            }
            "↩️  Undo reset" => match undo_vat(store) {
                Some(restored) => {
                    state = restored;
                    println!("✅ Previous calculation restored.");
                    show_vat(&state);
                }
                None => println!("ℹ️  No backup to restore."),
            },
            _ => return,
        }
    }
}

/// Backs up the current calculation, then clears it. Destructive; the
/// caller puts a confirmation in front of this.
fn reset_vat(store: &SlotStore, current: &VatState) -> VatState {
    store.save(Tool::Vat, StorageKey::Backup, current);
    let mut state = VatState::default();
    state.recompute();
    store.save(Tool::Vat, StorageKey::Live, &state);
    state
}

/// Restores the backed-up calculation if one exists. The backup slot
/// stays in place, so repeated undo keeps yielding the same snapshot.
fn undo_vat(store: &SlotStore) -> Option<VatState> {
    let mut backup: VatState = store.load(Tool::Vat, StorageKey::Backup)?;
    backup.recompute();
    store.save(Tool::Vat, StorageKey::Live, &backup);
    Some(backup)
}

fn show_vat(state: &VatState) {
    let breakdown = state.totals;

    let mut table = Table::new();
    table.set_header(vec![Cell::new(""), Cell::new("Amount")]);
    table.add_row(vec![
        Cell::new("Excl. VAT"),
        Cell::new(format_eur(breakdown.excl)),
    ]);
    table.add_row(vec![
        Cell::new(format!("VAT {}", state.rate.label())),
        Cell::new(format_eur(breakdown.vat)),
    ]);
    table.add_row(vec![
        Cell::new("Incl. VAT").add_attribute(Attribute::Bold),
        Cell::new(format_eur(breakdown.incl)).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    let totals = model::Totals {
        subtotal: breakdown.excl,
        vat_total: breakdown.vat,
        grand_total: breakdown.incl,
        missing_vat: state.rate == VatRate::Zero && breakdown.excl > 0.0,
    };
    let status = status::evaluate(true, &totals);
    println!("{} {}\n", status.severity.marker(), status.message);
}

// ==========================================
// 3. Open Folder Logic
// ==========================================

fn open_output_folder(root: &Path) {
    let output_dir = root.join("output");
    if !output_dir.exists() {
        println!("❌ No output directory found.");
        return;
    }
    println!("🚀 Opening: {:?}", output_dir);
    open_path(&output_dir);
}

// ==========================================
// 4. Config & Utilities
// ==========================================

fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("nl", "mhmit", "offerte") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn load_sender_profile(root: &Path) -> CompanyProfile {
    let path = root.join("sender.toml");
    if path.exists() {
        match fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|content| {
            toml::from_str::<CompanyProfile>(&content).map_err(|e| e.to_string())
        }) {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("⚠️  Could not read sender.toml ({}); using empty profile.", e);
                CompanyProfile::default()
            }
        }
    } else {
        println!("✨ Initializing default sender configuration...");
        if let Err(e) = fs::write(&path, DEFAULT_SENDER_TEMPLATE) {
            eprintln!("⚠️  Could not write sender.toml: {}", e);
        }
        toml::from_str(DEFAULT_SENDER_TEMPLATE).unwrap_or_default()
    }
}

fn setup_config_wizard() -> AppSettings {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings();
    let default_val = current
        .map(|s| s.data_root)
        .unwrap_or_else(|| "~/Documents/MHM".to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Root Data Directory")
        .pick_folder();

    let new_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Root Data Directory:")
            .with_default(&default_val)
            .prompt()
            .unwrap_or(default_val)
    };

    let settings = AppSettings {
        data_root: new_root,
    };

    let path = get_config_path();
    match toml::to_string_pretty(&settings) {
        Ok(toml_str) => {
            if let Err(e) = fs::write(&path, toml_str) {
                eprintln!("⚠️  Failed to save settings: {}", e);
            } else {
                println!("✅ Settings saved.");
            }
        }
        Err(e) => eprintln!("⚠️  Failed to encode settings: {}", e),
    }
    settings
}

fn expand_home_dir(path: &str) -> String {
    if path.starts_with("~") {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen("~", &home, 1);
        }
    }
    path.to_string()
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer")
        .arg(format!("/select,{}", path.to_string_lossy()))
        .spawn()
        .ok();

    #[cfg(target_os = "linux")]
    if let Some(parent) = path.parent() {
        Command::new("xdg-open").arg(parent).spawn().ok();
    }
}

fn open_path(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
