use crate::model::{LineItem, Totals, VatRate};

// ==========================================
// Line-Item Collection
// ==========================================

/// Optional starting values for a new row. Anything left `None` takes
/// the form default (quantity 1, price 0, the tool's default bracket).
#[derive(Debug, Default, Clone)]
pub struct Prefill {
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub vat_rate: Option<VatRate>,
}

/// Appends a new row and returns its id.
pub fn add(items: &mut Vec<LineItem>, default_rate: VatRate, prefill: Prefill) -> u64 {
    let id = items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
    items.push(LineItem {
        id,
        description: prefill.description.unwrap_or_default(),
        quantity: prefill.quantity.unwrap_or_else(|| "1".to_string()),
        unit_price: prefill.unit_price.unwrap_or_else(|| "0".to_string()),
        vat_rate: prefill.vat_rate.unwrap_or(default_rate),
    });
    id
}

/// Removes the row with the given id. The collection keeps at least
/// one row at all times; removing the last remaining row is a no-op
/// and returns false. Unknown ids also return false.
pub fn remove(items: &mut Vec<LineItem>, id: u64) -> bool {
    if items.len() <= 1 {
        return false;
    }
    let before = items.len();
    items.retain(|i| i.id != id);
    items.len() < before
}

/// Recomputes aggregate totals over all rows. Non-numeric quantities
/// and prices count as zero, so this never fails.
pub fn recompute(items: &[LineItem]) -> Totals {
    let mut totals = Totals::default();
    for item in items {
        let line_total = item.line_total();
        totals.subtotal += line_total;
        totals.vat_total += item.line_vat();
        if line_total > 0.0 && item.vat_rate == VatRate::Zero {
            totals.missing_vat = true;
        }
    }
    totals.grand_total = totals.subtotal + totals.vat_total;
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::format_eur;

    fn seeded() -> Vec<LineItem> {
        let mut items = Vec::new();
        add(&mut items, VatRate::Standard, Prefill::default());
        items
    }

    #[test]
    fn add_uses_form_defaults() {
        let items = seeded();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, "1");
        assert_eq!(items[0].unit_price, "0");
        assert_eq!(items[0].vat_rate, VatRate::Standard);
    }

    #[test]
    fn add_merges_prefill() {
        let mut items = seeded();
        let id = add(
            &mut items,
            VatRate::Standard,
            Prefill {
                description: Some("Hosting".into()),
                unit_price: Some("25".into()),
                ..Prefill::default()
            },
        );
        let item = items.iter().find(|i| i.id == id).unwrap();
        assert_eq!(item.description, "Hosting");
        assert_eq!(item.quantity, "1");
        assert_eq!(item.unit_price, "25");
    }

    #[test]
    fn last_row_cannot_be_removed() {
        let mut items = seeded();
        let id = items[0].id;
        assert!(!remove(&mut items, id));
        assert_eq!(items.len(), 1);

        add(&mut items, VatRate::Standard, Prefill::default());
        assert!(remove(&mut items, id));
        assert_eq!(items.len(), 1);
        // And the survivor is again protected.
        let survivor = items[0].id;
        assert!(!remove(&mut items, survivor));
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut items = seeded();
        add(&mut items, VatRate::Standard, Prefill::default());
        assert!(!remove(&mut items, 999));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn totals_scenario_two_lines() {
        // (qty=2, price=50, 21%) + (qty=1, price=10, 0%)
        let mut items = Vec::new();
        add(
            &mut items,
            VatRate::Standard,
            Prefill {
                quantity: Some("2".into()),
                unit_price: Some("50".into()),
                ..Prefill::default()
            },
        );
        add(
            &mut items,
            VatRate::Standard,
            Prefill {
                quantity: Some("1".into()),
                unit_price: Some("10".into()),
                vat_rate: Some(VatRate::Zero),
                ..Prefill::default()
            },
        );
        let totals = recompute(&items);
        assert_eq!(format_eur(totals.subtotal), "€ 110,00");
        assert_eq!(format_eur(totals.vat_total), "€ 21,00");
        assert_eq!(format_eur(totals.grand_total), "€ 131,00");
        assert!(totals.missing_vat);
    }

    #[test]
    fn grand_total_is_subtotal_plus_vat_after_edits() {
        let mut items = seeded();
        items[0].quantity = "3".into();
        items[0].unit_price = "19.99".into();
        let second = add(&mut items, VatRate::Standard, Prefill::default());
        let totals = recompute(&items);
        assert_eq!(totals.grand_total, totals.subtotal + totals.vat_total);

        remove(&mut items, second);
        let totals = recompute(&items);
        assert_eq!(totals.grand_total, totals.subtotal + totals.vat_total);
    }

    #[test]
    fn zero_rate_on_empty_line_is_not_flagged() {
        let mut items = Vec::new();
        add(
            &mut items,
            VatRate::Standard,
            Prefill {
                vat_rate: Some(VatRate::Zero),
                ..Prefill::default()
            },
        );
        let totals = recompute(&items);
        assert!(!totals.missing_vat);
    }
}
