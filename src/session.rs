//! One bound-record session: the record, its movement lines and messages.
use super::binder::{BoundReceipt, BoundRecord, Mode};
use super::error::LineError;
use super::message::MessageLog;
use super::reconcile::{LineBook, normalize_canonical};
use super::record::{PurchaseOrder, SourceLineItem};
use super::severity::{self, SeverityTier};
use super::store::RecordKey;
use super::utils::new_uuid_to_bech32;
use super::workflow::WorkflowState;

pub const SESSION_HRP: &str = "session_";

#[derive(Debug)]
pub struct Session {
    id: String, // uuid7, use bech32
    record: BoundRecord,
    book: LineBook,
    messages: MessageLog,
    state: WorkflowState,
    cancel_reason: String,
}

impl Session {
    /// A purchase order session starts with its movements, backend sentinels
    /// blanked, plus one empty line, and without unsaved changes.
    pub fn open(record: BoundRecord) -> anyhow::Result<Self> {
        let book = match &record {
            BoundRecord::PurchaseOrder(po) => {
                let movements = normalize_canonical(po.movements.clone());
                let mut book = LineBook::new(po.items.clone(), movements);
                book.add_line()?;
                book.mark_clean();
                book
            }
            BoundRecord::GoodsReceipt(bound) => LineBook::new(bound.receipt.items.clone(), vec![]),
        };

        Ok(Self {
            id: new_uuid_to_bech32(SESSION_HRP)?,
            record,
            book,
            messages: MessageLog::new(),
            state: WorkflowState::Idle,
            cancel_reason: String::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn record(&self) -> &BoundRecord {
        &self.record
    }
    pub fn object_id(&self) -> String {
        self.record.object_id()
    }
    pub fn book(&self) -> &LineBook {
        &self.book
    }
    pub fn book_mut(&mut self) -> &mut LineBook {
        &mut self.book
    }
    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }
    pub fn state(&self) -> WorkflowState {
        self.state
    }
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }
    pub fn cancel_reason(&self) -> &str {
        &self.cancel_reason
    }
    pub fn set_cancel_reason(&mut self, reason: impl Into<String>) {
        self.cancel_reason = reason.into();
    }

    /// Dominant severity of the current messages
    pub fn severity(&self) -> SeverityTier {
        severity::resolve(&self.messages)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.book.has_unsaved_changes()
    }

    pub fn purchase_order(&self) -> Option<&PurchaseOrder> {
        match &self.record {
            BoundRecord::PurchaseOrder(po) => Some(po),
            BoundRecord::GoodsReceipt(_) => None,
        }
    }

    pub fn goods_receipt(&self) -> Option<&BoundReceipt> {
        match &self.record {
            BoundRecord::GoodsReceipt(bound) => Some(bound),
            BoundRecord::PurchaseOrder(_) => None,
        }
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.goods_receipt()
            .is_some_and(|bound| bound.can_be_cancelled)
    }

    pub fn is_editing_receipt(&self) -> bool {
        self.goods_receipt()
            .is_some_and(|bound| bound.mode == Mode::Edit)
    }

    /// Key of the asset recorded for the reference of the line at `index`.
    pub fn asset_key_for_line(&self, index: usize) -> Result<RecordKey, LineError> {
        let line = self
            .book
            .lines()
            .get(index)
            .ok_or(LineError::NoSuchLine(index))?;

        let asset = self
            .purchase_order()
            .and_then(|po| po.assets.iter().find(|asset| asset.po_item == line.po_item))
            .ok_or_else(|| LineError::NoAsset(line.po_item.clone()))?;

        Ok(RecordKey::Asset {
            comp_code: asset.comp_code.clone(),
            asset_no: asset.asset_no.clone(),
            sub_number: asset.sub_number.clone(),
        })
    }

    pub(crate) fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
    }
    pub(crate) fn messages_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }

    /// Swap in the receipt lines returned by a cancellation
    pub(crate) fn replace_receipt_items(&mut self, items: Vec<SourceLineItem>) {
        if let BoundRecord::GoodsReceipt(bound) = &mut self.record {
            bound.receipt.items = items.clone();
            self.book = LineBook::new(items, vec![]);
        }
    }
}
