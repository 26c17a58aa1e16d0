use crate::model::Totals;

// ==========================================
// Status Evaluator
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Success,
}

impl Severity {
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Success => "✅",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub message: &'static str,
    pub severity: Severity,
}

/// Derives the form status line from the current totals and whether
/// every required header field is filled. Rules are evaluated in
/// order; the first match wins. Pure, no side effects.
pub fn evaluate(required_filled: bool, totals: &Totals) -> Status {
    if totals.grand_total > 100_000.0 {
        return Status {
            message: "Warning: amount is unusually high. Verify the input.",
            severity: Severity::Warning,
        };
    }
    if totals.missing_vat {
        return Status {
            message: "Note: VAT rate is not applied on all lines. Is that intended?",
            severity: Severity::Info,
        };
    }
    if required_filled && totals.grand_total > 0.0 {
        return Status {
            message: "Ready for export.",
            severity: Severity::Success,
        };
    }
    Status {
        message: "Fill the required fields to continue.",
        severity: Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(subtotal: f64, vat: f64, missing: bool) -> Totals {
        Totals {
            subtotal,
            vat_total: vat,
            grand_total: subtotal + vat,
            missing_vat: missing,
        }
    }

    #[test]
    fn high_amount_wins_over_everything() {
        let status = evaluate(true, &totals(200_000.0, 0.0, true));
        assert_eq!(status.severity, Severity::Warning);
    }

    #[test]
    fn missing_vat_hint_before_success() {
        let status = evaluate(true, &totals(100.0, 0.0, true));
        assert_eq!(status.severity, Severity::Info);
        assert!(status.message.contains("VAT"));
    }

    #[test]
    fn markers_carry_no_padding() {
        for severity in [Severity::Info, Severity::Warning, Severity::Success] {
            let marker = severity.marker();
            assert_eq!(marker, marker.trim());
        }
    }

    #[test]
    fn success_needs_required_fields_and_nonzero_total() {
        assert_eq!(
            evaluate(true, &totals(100.0, 21.0, false)).severity,
            Severity::Success
        );
        assert_eq!(
            evaluate(false, &totals(100.0, 21.0, false)).severity,
            Severity::Info
        );
        assert_eq!(
            evaluate(true, &totals(0.0, 0.0, false)).severity,
            Severity::Info
        );
    }
}
