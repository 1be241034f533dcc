//! Property-based tests for line reconciliation and message severity
//!
//! Randomly generated line books and message sets check the invariants that
//! must hold for every input: totals follow the source prices, identifiers are
//! never reused, and the severity tier does not depend on message order.

use goods_receipt::message::{Severity, ValidationMessage};
use goods_receipt::reconcile::LineBook;
use goods_receipt::record::{EntryDate, MovementLine, SourceLineItem};
use goods_receipt::severity::{SeverityTier, resolve};
use goods_receipt::validator::{QUANTITY_NOT_NUMBER, is_number, validate_lines};
use proptest::prelude::*;
use std::collections::HashSet;

// PROPERTY TEST STRATEGIES

/// Three source lines with fixed ids and random prices and tax rates
fn sources_strategy() -> impl Strategy<Value = Vec<SourceLineItem>> {
    prop::collection::vec((0u32..10_000, 0u32..=25, any::<bool>()), 3).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (cents, tax, asset))| {
                SourceLineItem::new(
                    format!("000{}0", i + 1),
                    f64::from(cents) / 100.0,
                    f64::from(tax) / 100.0,
                )
                .set_asset(asset)
            })
            .collect()
    })
}

/// A reference to one of the sources, an unknown item, or blank
fn reference_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("00010".to_string()),
        Just("00020".to_string()),
        Just("00030".to_string()),
        Just("00990".to_string()),
        Just(String::new()),
    ]
}

/// Mostly numeric quantities with some free text mixed in
fn quantity_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (0u32..500).prop_map(|q| q.to_string()),
        1 => Just("abc".to_string()),
        1 => Just("1,5".to_string()),
        1 => Just(String::new()),
    ]
}

fn lines_strategy() -> impl Strategy<Value = Vec<MovementLine>> {
    prop::collection::vec((reference_strategy(), quantity_strategy()), 0..8).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (po_item, qnt))| {
                MovementLine::new(i as u32 + 1)
                    .set_po_item(po_item)
                    .set_entry_qnt(qnt)
                    .set_doc_date(EntryDate::from_ymd(2024, 1, 15).unwrap())
            })
            .collect()
    })
}

#[derive(Debug, Clone)]
enum LineOp {
    Add,
    Copy(usize),
    Delete(usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<LineOp>> {
    prop::collection::vec(
        prop_oneof![
            Just(LineOp::Add),
            (0usize..10).prop_map(LineOp::Copy),
            (0usize..10).prop_map(LineOp::Delete),
        ],
        1..40,
    )
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Error),
        Just(Severity::Warning),
        Just(Severity::Success),
        Just(Severity::Info),
        Just(Severity::None),
    ]
}

fn expected_total(sources: &[SourceLineItem], lines: &[MovementLine]) -> (f64, f64) {
    lines.iter().fold((0.0, 0.0), |(total, inc), line| {
        let Some(source) = sources.iter().find(|s| s.po_item == line.po_item) else {
            return (total, inc);
        };
        let quantity = line.entry_qnt.trim().parse::<f64>().unwrap_or(0.0);
        let line_total = source.net_price * quantity;
        (total + line_total, inc + line_total * (1.0 + source.tax_rate))
    })
}

// PROPERTY TESTS
proptest! {
    /// Property: totals are the sum of matched lines, unmatched or
    /// non-numeric lines contribute nothing
    #[test]
    fn totals_follow_source_prices(sources in sources_strategy(), lines in lines_strategy()) {
        let book = LineBook::new(sources.clone(), lines.clone());
        let (total, inc) = expected_total(&sources, &lines);
        let aggregate = book.aggregate();

        prop_assert!((aggregate.total - total).abs() < 1e-6);
        prop_assert!((aggregate.total_inc_tax - inc).abs() < 1e-6);
        prop_assert!(aggregate.total_inc_tax >= aggregate.total - 1e-9);
        prop_assert_eq!(aggregate.line_count, lines.len());
    }

    /// Property: recomputing twice changes nothing
    #[test]
    fn recompute_is_idempotent(sources in sources_strategy(), lines in lines_strategy()) {
        let mut book = LineBook::new(sources, lines);
        let first = (book.aggregate(), book.lines().to_vec());

        book.recompute();
        prop_assert_eq!(first.0, book.aggregate());
        prop_assert_eq!(first.1, book.lines().to_vec());
    }

    /// Property: lines matched to a source carry its asset flag
    #[test]
    fn asset_flag_mirrors_source(sources in sources_strategy(), lines in lines_strategy()) {
        let book = LineBook::new(sources.clone(), lines);

        for line in book.lines() {
            if let Some(source) = sources.iter().find(|s| s.po_item == line.po_item) {
                prop_assert_eq!(line.is_asset, source.is_asset);
            }
        }
    }

    /// Property: a movement id is never issued twice, even after deletes
    #[test]
    fn movement_ids_are_never_reused(lines in lines_strategy(), ops in ops_strategy()) {
        let mut book = LineBook::new(vec![], lines.clone());
        let mut issued: HashSet<u32> = lines.iter().map(|l| l.movt_id).collect();
        let mut last = book.aggregate().max_movt_id;

        for op in ops {
            let new_id = match op {
                LineOp::Add => book.add_line().ok(),
                LineOp::Copy(i) => book.copy_line(i).ok(),
                LineOp::Delete(i) => {
                    let _ = book.delete_line(i);
                    None
                }
            };
            if let Some(id) = new_id {
                prop_assert!(id > last);
                prop_assert!(issued.insert(id));
                last = id;
            }
            prop_assert!(book.aggregate().max_movt_id >= last);
        }
    }

    /// Property: every non-numeric quantity gets exactly one message
    #[test]
    fn one_quantity_message_per_bad_line(lines in lines_strategy()) {
        let mut lines = lines;
        let expected = lines
            .iter()
            .filter(|l| !l.entry_qnt.is_empty() && !is_number(&l.entry_qnt))
            .count();

        let report = validate_lines(&mut lines);
        let reported = report
            .messages
            .iter()
            .filter(|m| m.key == QUANTITY_NOT_NUMBER)
            .count();

        prop_assert_eq!(reported, expected);
    }

    /// Property: on the wire every quantity is numeric
    #[test]
    fn submission_quantities_are_numeric(lines in lines_strategy()) {
        let book = LineBook::new(vec![], lines);
        prop_assert!(book.submission_lines().iter().all(|l| is_number(&l.entry_qnt)));
    }

    /// Property: the severity tier ignores message order and follows
    /// Error > Warning > Success > Neutral
    #[test]
    fn severity_is_order_independent(severities in prop::collection::vec(severity_strategy(), 0..12)) {
        let messages: Vec<ValidationMessage> = severities
            .iter()
            .map(|s| ValidationMessage::new(*s, "key"))
            .collect();
        let mut reversed = messages.clone();
        reversed.reverse();

        let tier = resolve(&messages);
        prop_assert_eq!(tier, resolve(&reversed));

        let expected = if severities.contains(&Severity::Error) {
            SeverityTier::Error
        } else if severities.contains(&Severity::Warning) {
            SeverityTier::Warning
        } else if severities.contains(&Severity::Success) {
            SeverityTier::Success
        } else {
            SeverityTier::Neutral
        };
        prop_assert_eq!(tier, expected);
    }
}
