//! Per-line mandatory field and type checks for movement lines.
//!
//! Validation is not incremental: callers clear every line's value states
//! before a pass (see [`clear_states`]).
use super::message::{Field, ValidationMessage, ValueState};
use super::record::MovementLine;
use super::utils::parse_float_prefix;
use std::collections::HashSet;

pub const MANDATORY_MISSING: &str = "mandatoryMissingError";
pub const QUANTITY_NOT_NUMBER: &str = "quantityNotNumberError";
pub const DUPLICATE_PO_ITEM: &str = "duplicatePoItemError";

#[derive(Debug, Default, PartialEq)]
pub struct FieldReport {
    /// A reference, quantity or date is blank on at least one line.
    pub mandatory_missing: bool,
    pub messages: Vec<ValidationMessage>,
}

/// A value is numeric when it parses as a finite float. Blank is not
/// non-numeric, it is missing.
pub fn is_number(value: &str) -> bool {
    parse_quantity(value).is_some()
}

pub fn parse_quantity(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|quantity| quantity.is_finite())
}

/// Quantity text after a keystroke: numeric input stays, otherwise the
/// numeric prefix of the input, else that of the previous value, else blank.
pub fn sanitize_live_quantity(value: &str, previous: &str) -> String {
    if is_number(value) {
        return value.to_string();
    }

    parse_float_prefix(value)
        .or_else(|| parse_float_prefix(previous))
        .map(|quantity| quantity.to_string())
        .unwrap_or_default()
}

pub fn clear_states(lines: &mut [MovementLine]) {
    lines.iter_mut().for_each(MovementLine::clear_validation);
}

/// Annotates each line's value states and reports the violations.
///
/// Duplicate references are reported and flagged on every occurrence after the
/// first, but they do not count as missing mandatory fields.
pub fn validate_lines(lines: &mut [MovementLine]) -> FieldReport {
    let mut report = FieldReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, line) in lines.iter_mut().enumerate() {
        if line.po_item.is_empty() {
            line.po_item_vs = ValueState::Error;
            report.mandatory_missing = true;
        } else if seen.contains(&line.po_item) {
            line.po_item_vs = ValueState::Error;
            let message = ValidationMessage::error(DUPLICATE_PO_ITEM)
                .with_params([line.po_item.clone()])
                .with_target(index, Field::Reference);
            if !report.messages.iter().any(|m| m.same_text(&message)) {
                report.messages.push(message);
            }
        } else {
            seen.insert(line.po_item.clone());
        }

        if line.entry_qnt.is_empty() {
            line.entry_qnt_vs = ValueState::Error;
            report.mandatory_missing = true;
        } else if !is_number(&line.entry_qnt) {
            line.entry_qnt_vs = ValueState::Error;
            report.messages.push(
                ValidationMessage::error(QUANTITY_NOT_NUMBER)
                    .with_params([line.entry_qnt.clone()])
                    .with_target(index, Field::Quantity),
            );
        }

        if line.doc_date.is_none() {
            line.doc_date_vs = ValueState::Error;
            report.mandatory_missing = true;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntryDate;

    fn line(id: u32, po_item: &str, qnt: &str) -> MovementLine {
        MovementLine::new(id)
            .set_po_item(po_item)
            .set_entry_qnt(qnt)
            .set_doc_date(EntryDate::from_ymd(2024, 5, 1).unwrap())
    }

    #[test]
    fn numeric_check() {
        assert!(is_number("2"));
        assert!(is_number(" 2.5 "));
        assert!(is_number("1e3"));
        assert!(!is_number(""));
        assert!(!is_number("abc"));
        assert!(!is_number("inf"));
        assert!(!is_number("NaN"));
    }

    #[test]
    fn blank_fields_are_missing() {
        let mut lines = vec![MovementLine::new(1)];
        let report = validate_lines(&mut lines);

        assert!(report.mandatory_missing);
        assert!(report.messages.is_empty());
        assert_eq!(lines[0].po_item_vs, ValueState::Error);
        assert_eq!(lines[0].entry_qnt_vs, ValueState::Error);
        assert_eq!(lines[0].doc_date_vs, ValueState::Error);
    }

    #[test]
    fn non_numeric_quantity_is_not_missing() {
        let mut lines = vec![line(1, "00010", "ten")];
        let report = validate_lines(&mut lines);

        assert!(!report.mandatory_missing);
        assert_eq!(report.messages.len(), 1);
        assert_eq!(report.messages[0].key, QUANTITY_NOT_NUMBER);
        assert_eq!(report.messages[0].params, vec!["ten".to_string()]);
        assert_eq!(lines[0].entry_qnt_vs, ValueState::Error);
    }

    #[test]
    fn duplicate_reference_flags_later_occurrence_once() {
        let mut lines = vec![line(1, "A", "1"), line(2, "A", "1"), line(3, "B", "1")];
        let report = validate_lines(&mut lines);

        let duplicates: Vec<_> = report
            .messages
            .iter()
            .filter(|m| m.key == DUPLICATE_PO_ITEM)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(lines[0].po_item_vs, ValueState::None);
        assert_eq!(lines[1].po_item_vs, ValueState::Error);
        assert_eq!(lines[2].po_item_vs, ValueState::None);
        assert!(!report.mandatory_missing);
    }

    #[test]
    fn triple_reference_is_one_message() {
        let mut lines = vec![line(1, "A", "1"), line(2, "A", "1"), line(3, "A", "1")];
        let report = validate_lines(&mut lines);

        assert_eq!(report.messages.len(), 1);
        assert_eq!(lines[1].po_item_vs, ValueState::Error);
        assert_eq!(lines[2].po_item_vs, ValueState::Error);
    }

    #[test]
    fn clear_states_resets_everything() {
        let mut lines = vec![MovementLine::new(1)];
        validate_lines(&mut lines);
        clear_states(&mut lines);

        assert!(!lines[0].has_field_errors());
    }

    #[test]
    fn live_quantity_keeps_numeric_prefix() {
        assert_eq!(sanitize_live_quantity("12", ""), "12");
        assert_eq!(sanitize_live_quantity("12a", "1"), "12");
        assert_eq!(sanitize_live_quantity("a", "3.5"), "3.5");
        assert_eq!(sanitize_live_quantity("a", "b"), "");
    }
}
