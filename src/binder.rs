//! Resolves an object identifier into a bound record or a typed rejection.
use super::error::{BindError, StoreError};
use super::identifier::{parse_goods_receipt_id, parse_purchase_order_id};
use super::record::{GoodsReceipt, PurchaseOrder, Record, SourceLineItem};
use super::store::{Expand, RecordKey, RecordStore};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Marker the backend puts in `MatDoc` for receipts not posted against a
/// standard purchase order.
pub const NOT_STANDARD_MARKER: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Display,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    PurchaseOrder,
    GoodsReceipt { mode: Mode },
}

impl RecordKind {
    fn expand(&self) -> &'static [Expand] {
        match self {
            RecordKind::PurchaseOrder => &[
                Expand::Items,
                Expand::Movements,
                Expand::MaterialDocuments,
                Expand::Assets,
            ],
            RecordKind::GoodsReceipt { .. } => &[Expand::Items, Expand::MaterialDocuments],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blank,
    NotFound,
    Excluded,
    Incomplete,
    Unapproved,
    NoEligibleLines,
    AlreadyCancelled,
    NotStandard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// i18n key of the message to show before returning to selection.
    pub key: &'static str,
    pub rich_text: bool,
}

impl Rejection {
    fn plain(reason: RejectReason, key: &'static str) -> Self {
        Self {
            reason,
            key,
            rich_text: false,
        }
    }
    fn rich(reason: RejectReason, key: &'static str) -> Self {
        Self {
            reason,
            key,
            rich_text: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinderState {
    Unbound,
    Loading,
    Bound,
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundReceipt {
    /// In edit mode `items` holds only the lines that can still be cancelled.
    pub receipt: GoodsReceipt,
    pub mode: Mode,
    pub can_be_cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundRecord {
    PurchaseOrder(PurchaseOrder),
    GoodsReceipt(BoundReceipt),
}

impl BoundRecord {
    pub fn source_lines(&self) -> &[SourceLineItem] {
        match self {
            BoundRecord::PurchaseOrder(po) => &po.items,
            BoundRecord::GoodsReceipt(bound) => &bound.receipt.items,
        }
    }
    pub fn object_id(&self) -> String {
        match self {
            BoundRecord::PurchaseOrder(po) => po.po_number.clone(),
            BoundRecord::GoodsReceipt(bound) => bound.receipt.object_id(),
        }
    }
}

#[derive(Debug)]
pub struct RecordBinder {
    state: BinderState,
    posted: HashSet<String>, // purchase orders posted in this session
}

impl Default for RecordBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBinder {
    pub fn new() -> Self {
        Self {
            state: BinderState::Unbound,
            posted: HashSet::new(),
        }
    }
    pub fn state(&self) -> &BinderState {
        &self.state
    }
    pub fn reset(&mut self) {
        self.state = BinderState::Unbound;
    }
    pub fn mark_posted(&mut self, po_number: &str) {
        self.posted.insert(po_number.to_string());
    }
    pub fn is_posted(&self, po_number: &str) -> bool {
        self.posted.contains(po_number)
    }

    #[instrument(skip(self, store))]
    pub async fn bind<S: RecordStore>(
        &mut self,
        store: &S,
        kind: RecordKind,
        raw: &str,
    ) -> Result<BoundRecord, BindError> {
        if raw.trim().is_empty() {
            let key = match kind {
                RecordKind::PurchaseOrder => "poBlankErrorText",
                RecordKind::GoodsReceipt { .. } => "grBlankErrorText",
            };
            return Err(self.reject(Rejection::plain(RejectReason::Blank, key)));
        }

        let key = lookup_key(kind, raw);
        self.state = BinderState::Loading;
        debug!(%key, "reading record");

        let reply = match store.read(&key, kind.expand()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%key, error = %e, "record read failed");
                self.state = BinderState::Unbound;
                return Err(e.into());
            }
        };

        let classified = match (kind, reply.data) {
            (RecordKind::PurchaseOrder, None) => {
                classify_purchase_order(None, false).map(BoundRecord::PurchaseOrder)
            }
            (RecordKind::PurchaseOrder, Some(Record::PurchaseOrder(po))) => {
                let posted = self.is_posted(&po.po_number);
                classify_purchase_order(Some(po), posted).map(BoundRecord::PurchaseOrder)
            }
            (RecordKind::GoodsReceipt { mode }, None) => {
                classify_goods_receipt(None, mode).map(BoundRecord::GoodsReceipt)
            }
            (RecordKind::GoodsReceipt { mode }, Some(Record::GoodsReceipt(gr))) => {
                classify_goods_receipt(Some(gr), mode).map(BoundRecord::GoodsReceipt)
            }
            (_, Some(other)) => {
                self.state = BinderState::Unbound;
                return Err(StoreError::UnexpectedRecord(other.kind()).into());
            }
        };

        match classified {
            Ok(bound) => {
                self.state = BinderState::Bound;
                debug!(object_id = %bound.object_id(), "record bound");
                Ok(bound)
            }
            Err(rejection) => Err(self.reject(rejection)),
        }
    }

    fn reject(&mut self, rejection: Rejection) -> BindError {
        debug!(key = rejection.key, "record rejected");
        self.state = BinderState::Rejected(rejection.clone());
        BindError::Rejected(rejection)
    }
}

pub fn lookup_key(kind: RecordKind, raw: &str) -> RecordKey {
    match kind {
        RecordKind::PurchaseOrder => RecordKey::PurchaseOrder {
            po_number: parse_purchase_order_id(raw),
        },
        RecordKind::GoodsReceipt { .. } => {
            let id = parse_goods_receipt_id(raw);
            RecordKey::GoodsReceipt {
                mat_doc: id.mat_doc,
                doc_year: id.doc_year,
            }
        }
    }
}

/// Eligibility of a purchase order; the first failing check wins.
pub fn classify_purchase_order(
    po: Option<PurchaseOrder>,
    posted: bool,
) -> Result<PurchaseOrder, Rejection> {
    let po = match po {
        Some(po) if !po.po_number.is_empty() => po,
        _ => {
            return Err(Rejection::plain(
                RejectReason::NotFound,
                "poNotFoundErrorText",
            ));
        }
    };

    if po.excluded {
        return Err(Rejection::plain(RejectReason::Excluded, "poExcluded"));
    }
    if !po.complete {
        return Err(Rejection::plain(RejectReason::Incomplete, "poNotComplete"));
    }
    if !po.approved {
        return Err(Rejection::rich(RejectReason::Unapproved, "poNotApproved"));
    }
    if po.items.is_empty() && !posted {
        return Err(Rejection::plain(
            RejectReason::NoEligibleLines,
            "poNotValidForGRErrorText",
        ));
    }
    Ok(po)
}

/// Eligibility of a goods receipt. Edit mode keeps only the lines that can
/// still be cancelled.
pub fn classify_goods_receipt(
    gr: Option<GoodsReceipt>,
    mode: Mode,
) -> Result<BoundReceipt, Rejection> {
    let mut gr = match gr {
        Some(gr) if !gr.mat_doc.is_empty() => gr,
        _ => {
            return Err(Rejection::plain(
                RejectReason::NotFound,
                "grNotFoundErrorText",
            ));
        }
    };

    let edit = mode == Mode::Edit;
    if edit && gr.items.first().is_some_and(|item| item.entry_qnt < 0.0) {
        return Err(Rejection::rich(
            RejectReason::AlreadyCancelled,
            "grCancelCancellation",
        ));
    }
    if gr.mat_doc == NOT_STANDARD_MARKER {
        let key = if edit {
            "grNotStandardPo"
        } else {
            "grNotStandardPoDisplay"
        };
        return Err(Rejection::plain(RejectReason::NotStandard, key));
    }

    let eligible = gr.items.iter().filter(|item| item.is_cancellable()).count();
    if edit {
        gr.items.retain(SourceLineItem::is_cancellable);
        if eligible == 0 {
            return Err(Rejection::rich(RejectReason::NoEligibleLines, "grNoLines"));
        }
    }

    Ok(BoundReceipt {
        receipt: gr,
        mode,
        can_be_cancelled: eligible > 0 && !edit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> GoodsReceipt {
        GoodsReceipt::new("5000000001", "2024")
            .add_item(SourceLineItem::new("00010", 1.0, 0.0).set_entry_qnt(2.0))
            .add_item(
                SourceLineItem::new("00020", 1.0, 0.0)
                    .set_entry_qnt(1.0)
                    .set_reversed(true),
            )
    }

    #[test]
    fn purchase_order_checks_run_in_order() {
        let po = PurchaseOrder::new("4500000001")
            .set_excluded(true)
            .set_approved(false);
        assert_eq!(
            classify_purchase_order(Some(po), false).unwrap_err().key,
            "poExcluded"
        );

        let po = PurchaseOrder::new("4500000001").set_approved(false);
        let rejection = classify_purchase_order(Some(po), false).unwrap_err();
        assert_eq!(rejection.key, "poNotApproved");
        assert!(rejection.rich_text);
    }

    #[test]
    fn empty_purchase_order_is_fine_once_posted() {
        let po = PurchaseOrder::new("4500000001");
        assert_eq!(
            classify_purchase_order(Some(po.clone()), false)
                .unwrap_err()
                .reason,
            RejectReason::NoEligibleLines
        );
        assert!(classify_purchase_order(Some(po), true).is_ok());
    }

    #[test]
    fn blank_po_number_is_not_found() {
        let po = PurchaseOrder::new("");
        assert_eq!(
            classify_purchase_order(Some(po), false).unwrap_err().key,
            "poNotFoundErrorText"
        );
        assert_eq!(
            classify_purchase_order(None, false).unwrap_err().reason,
            RejectReason::NotFound
        );
    }

    #[test]
    fn edit_mode_filters_reversed_lines() {
        let bound = classify_goods_receipt(Some(receipt()), Mode::Edit).unwrap();
        assert_eq!(bound.receipt.items.len(), 1);
        assert!(!bound.can_be_cancelled);

        let bound = classify_goods_receipt(Some(receipt()), Mode::Display).unwrap();
        assert_eq!(bound.receipt.items.len(), 2);
        assert!(bound.can_be_cancelled);
    }

    #[test]
    fn cancelled_receipt_rejected_in_edit_mode_only() {
        let gr = GoodsReceipt::new("5000000002", "2024")
            .add_item(SourceLineItem::new("00010", 1.0, 0.0).set_entry_qnt(-2.0));

        let rejection = classify_goods_receipt(Some(gr.clone()), Mode::Edit).unwrap_err();
        assert_eq!(rejection.key, "grCancelCancellation");
        assert!(rejection.rich_text);
        assert!(classify_goods_receipt(Some(gr), Mode::Display).is_ok());
    }

    #[test]
    fn not_standard_key_depends_on_mode() {
        let gr = GoodsReceipt::new(NOT_STANDARD_MARKER, "");
        assert_eq!(
            classify_goods_receipt(Some(gr.clone()), Mode::Edit)
                .unwrap_err()
                .key,
            "grNotStandardPo"
        );
        assert_eq!(
            classify_goods_receipt(Some(gr), Mode::Display)
                .unwrap_err()
                .key,
            "grNotStandardPoDisplay"
        );
    }

    #[test]
    fn no_cancellable_lines_in_edit_mode() {
        let gr = GoodsReceipt::new("5000000003", "2024").add_item(
            SourceLineItem::new("00010", 1.0, 0.0)
                .set_entry_qnt(1.0)
                .set_cancellation_blocked(true),
        );
        let rejection = classify_goods_receipt(Some(gr), Mode::Edit).unwrap_err();
        assert_eq!(rejection.key, "grNoLines");
        assert!(rejection.rich_text);
    }
}
