//! In-process record store over sled.
//!
//! Records are CBOR values keyed by their key path. Creates follow the
//! backend's posting rules closely enough for demos and end-to-end tests:
//! purchase order creates validate every movement line, detect delivery notes
//! already posted against the same order, return canonical lines and commit
//! only when `submit_flag` is set.
use super::error::StoreError;
use super::message::{Field, Severity, ValidationMessage};
use super::record::{
    Asset, FeedbackRating, GoodsReceipt, MaterialDocument, MovementLine, PurchaseOrder, Record,
    SourceLineItem,
};
use super::store::{EntitySet, Expand, RecordKey, RecordStore, Reply};
use super::validator::parse_quantity;
use chrono::{Datelike, Utc};
use sled::Batch;
use std::sync::Arc;
use tracing::{debug, info};

pub const CODE_UNKNOWN_RECORD: &str = "ZFSS_GR/001";
pub const CODE_UNKNOWN_ITEM: &str = "ZFSS_GR/002";
pub const CODE_DUPLICATE_POSTING: &str = "ZFSS_GR/003";
pub const CODE_BAD_QUANTITY: &str = "ZFSS_GR/004";
pub const CODE_MISSING_DATE: &str = "ZFSS_GR/005";
pub const CODE_POSTED: &str = "ZFSS_GR/010";
pub const CODE_NO_CANCEL_REASON: &str = "ZFSS_GR/011";
pub const CODE_NOTHING_TO_CANCEL: &str = "ZFSS_GR/012";
pub const CODE_CANCELLED: &str = "ZFSS_GR/013";
pub const CODE_ASSET_UPDATED: &str = "ZFSS_GR/020";
pub const CODE_ASSET_INVALID: &str = "ZFSS_GR/021";

/// Canonical reference of a line without one.
pub const BLANK_PO_ITEM: &str = "00000";
/// Canonical quantity of a line without a usable one.
pub const BLANK_QUANTITY: &str = "0.000";

const MAT_DOC_BASE: u64 = 5_000_000_000;

pub struct SledRecordStore {
    db: Arc<sled::Db>,
}

impl SledRecordStore {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(sled::open(path)?)))
    }

    /// Store a record as-is under its key path
    pub fn seed(&self, record: &Record) -> anyhow::Result<()> {
        let key = key_of(record)
            .ok_or_else(|| anyhow::anyhow!("{} records are not keyed", record.kind()))?;
        self.db.insert(key.path().as_bytes(), minicbor::to_vec(record)?)?;
        Ok(())
    }

    /// Fetch a stored record without any expansion filtering
    pub fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        match self.db.get(key.path().as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a feedback rating by the sha256 digest of its encoding
    pub fn feedback(&self, digest: &str) -> Result<Option<FeedbackRating>, StoreError> {
        match self.db.get(feedback_key(digest).as_bytes())? {
            Some(bytes) => match minicbor::decode(&bytes)? {
                Record::FeedbackRating(rating) => Ok(Some(rating)),
                other => Err(StoreError::UnexpectedRecord(other.kind())),
            },
            None => Ok(None),
        }
    }

    /// Material documents already posted for a delivery note
    fn prior_postings(
        &self,
        po_number: &str,
        ref_doc_no: &str,
    ) -> Result<Vec<MaterialDocument>, StoreError> {
        match self.db.get(posting_key(po_number, ref_doc_no).as_bytes())? {
            Some(bytes) => Ok(minicbor::decode(&bytes)?),
            None => Ok(vec![]),
        }
    }

    fn next_mat_doc(&self, doc_year: i32) -> Result<MaterialDocument, StoreError> {
        let id = self.db.generate_id()?;
        Ok(MaterialDocument::new(
            format!("{:010}", MAT_DOC_BASE + id),
            doc_year.to_string(),
        ))
    }

    fn post_purchase_order(&self, mut payload: PurchaseOrder) -> Result<Reply<Record>, StoreError> {
        let key = RecordKey::PurchaseOrder {
            po_number: payload.po_number.clone(),
        };
        let mut stored = match self.get(&key)? {
            Some(Record::PurchaseOrder(po)) => po,
            Some(other) => return Err(StoreError::UnexpectedRecord(other.kind())),
            None => {
                let message = ValidationMessage::error(format!(
                    "Purchase order {} does not exist",
                    payload.po_number
                ))
                .with_code(CODE_UNKNOWN_RECORD);
                return Ok(Reply::with_messages(
                    Record::PurchaseOrder(payload),
                    vec![message],
                ));
            }
        };

        let mut messages = vec![];
        for (index, line) in payload.movements.iter_mut().enumerate() {
            check_line(&stored, index, line, &mut messages);
        }

        let has_errors = messages.iter().any(|m| m.severity == Severity::Error);
        if has_errors {
            debug!(po = %payload.po_number, count = messages.len(), "dry run rejected lines");
            payload.material_documents.clear();
            return Ok(Reply::with_messages(Record::PurchaseOrder(payload), messages));
        }

        if !payload.submit_flag {
            let mut prior = vec![];
            for ref_doc_no in delivery_notes(&payload.movements) {
                let docs = self.prior_postings(&payload.po_number, ref_doc_no)?;
                if !docs.is_empty() {
                    messages.push(
                        ValidationMessage::warning(format!(
                            "Delivery note {ref_doc_no} was already posted"
                        ))
                        .with_params([ref_doc_no])
                        .with_code(CODE_DUPLICATE_POSTING),
                    );
                    prior.extend(docs);
                }
            }
            payload.material_documents = prior;
            return Ok(Reply::with_messages(Record::PurchaseOrder(payload), messages));
        }

        // commit
        let doc_year = payload
            .movements
            .iter()
            .find_map(|line| line.doc_date)
            .map(|date| date.year())
            .unwrap_or_else(|| Utc::now().year());
        let mat_doc = self.next_mat_doc(doc_year)?;

        let receipt = GoodsReceipt {
            mat_doc: mat_doc.mat_doc.clone(),
            doc_year: mat_doc.doc_year.clone(),
            po_number: payload.po_number.clone(),
            items: payload
                .movements
                .iter()
                .filter_map(|line| received_item(&stored, line))
                .collect(),
            material_documents: vec![mat_doc.clone()],
            cancel_reason: String::new(),
        };

        let mut batch = Batch::default();
        for ref_doc_no in delivery_notes(&payload.movements) {
            let mut docs = self.prior_postings(&payload.po_number, ref_doc_no)?;
            docs.push(mat_doc.clone());
            batch.insert(
                posting_key(&payload.po_number, ref_doc_no).as_bytes(),
                encode(&docs)?,
            );
        }
        batch.insert(
            key_path(&Record::GoodsReceipt(receipt.clone()))?.as_bytes(),
            encode(&Record::GoodsReceipt(receipt))?,
        );
        stored.material_documents.push(mat_doc.clone());
        stored.movements.clear();
        batch.insert(
            key.path().as_bytes(),
            encode(&Record::PurchaseOrder(stored))?,
        );
        self.db.apply_batch(batch)?;

        info!(po = %payload.po_number, mat_doc = %mat_doc.mat_doc, "goods receipt posted");
        messages.push(
            ValidationMessage::success(format!("Material document {} posted", mat_doc.mat_doc))
                .with_code(CODE_POSTED),
        );
        payload.material_documents = vec![mat_doc];
        Ok(Reply::with_messages(Record::PurchaseOrder(payload), messages))
    }

    fn cancel_goods_receipt(&self, mut payload: GoodsReceipt) -> Result<Reply<Record>, StoreError> {
        let key = RecordKey::GoodsReceipt {
            mat_doc: payload.mat_doc.clone(),
            doc_year: payload.doc_year.clone(),
        };
        let mut stored = match self.get(&key)? {
            Some(Record::GoodsReceipt(gr)) => gr,
            Some(other) => return Err(StoreError::UnexpectedRecord(other.kind())),
            None => {
                let message = ValidationMessage::error(format!(
                    "Goods receipt {} does not exist",
                    payload.object_id()
                ))
                .with_code(CODE_UNKNOWN_RECORD);
                return Ok(Reply::with_messages(Record::GoodsReceipt(payload), vec![message]));
            }
        };

        if payload.cancel_reason.trim().is_empty() {
            let message = ValidationMessage::error("A cancellation reason is required")
                .with_code(CODE_NO_CANCEL_REASON);
            return Ok(Reply::with_messages(Record::GoodsReceipt(payload), vec![message]));
        }

        let mut reversed = vec![];
        for item in stored.items.iter_mut() {
            let requested = payload.items.iter().any(|i| i.po_item == item.po_item);
            if requested && item.is_cancellable() {
                item.reversed = true;
                reversed.push(item.clone());
            }
        }
        if reversed.is_empty() {
            let message = ValidationMessage::error("No line of the goods receipt can be cancelled")
                .with_code(CODE_NOTHING_TO_CANCEL);
            return Ok(Reply::with_messages(Record::GoodsReceipt(payload), vec![message]));
        }

        let doc_year = payload.doc_year.parse().unwrap_or_else(|_| Utc::now().year());
        let reversal_doc = self.next_mat_doc(doc_year)?;
        let reversal = GoodsReceipt {
            mat_doc: reversal_doc.mat_doc.clone(),
            doc_year: reversal_doc.doc_year.clone(),
            po_number: stored.po_number.clone(),
            items: reversed
                .iter()
                .cloned()
                .map(|item| {
                    let qnt = -item.entry_qnt;
                    item.set_reversed(false).set_entry_qnt(qnt)
                })
                .collect(),
            material_documents: vec![reversal_doc.clone()],
            cancel_reason: payload.cancel_reason.clone(),
        };
        stored.material_documents.push(reversal_doc.clone());

        let mut batch = Batch::default();
        batch.insert(
            key_path(&Record::GoodsReceipt(reversal.clone()))?.as_bytes(),
            encode(&Record::GoodsReceipt(reversal))?,
        );
        batch.insert(
            key.path().as_bytes(),
            encode(&Record::GoodsReceipt(stored.clone()))?,
        );
        self.db.apply_batch(batch)?;

        info!(gr = %key, reversal = %reversal_doc.mat_doc, "goods receipt cancelled");
        payload.items = stored.items;
        payload.po_number = stored.po_number;
        payload.material_documents = vec![reversal_doc.clone()];
        let message = ValidationMessage::success(format!(
            "Material document {} reverses {}",
            reversal_doc.mat_doc, payload.mat_doc
        ))
        .with_code(CODE_CANCELLED);
        Ok(Reply::with_messages(Record::GoodsReceipt(payload), vec![message]))
    }

    fn store_asset(&self, asset: Asset) -> Result<Reply<Record>, StoreError> {
        if asset.asset_no.trim().is_empty() {
            let message =
                ValidationMessage::error("Asset number is required").with_code(CODE_ASSET_INVALID);
            return Ok(Reply::with_messages(Record::Asset(asset), vec![message]));
        }
        let message = ValidationMessage::success(format!("Asset {} updated", asset.asset_no))
            .with_code(CODE_ASSET_UPDATED);

        let record = Record::Asset(asset);
        self.db
            .insert(key_path(&record)?.as_bytes(), encode(&record)?)?;
        Ok(Reply::with_messages(record, vec![message]))
    }

    fn store_feedback(&self, rating: FeedbackRating) -> Result<Reply<Record>, StoreError> {
        let record = Record::FeedbackRating(rating);
        let cbor = encode(&record)?;
        let digest = sha256::digest(&cbor);
        self.db.insert(feedback_key(&digest).as_bytes(), cbor)?;

        debug!(%digest, "feedback stored");
        Ok(Reply::new(record))
    }
}

impl RecordStore for SledRecordStore {
    async fn read(
        &self,
        key: &RecordKey,
        expand: &[Expand],
    ) -> Result<Reply<Option<Record>>, StoreError> {
        let record = self.get(key)?.map(|record| strip_unexpanded(record, expand));
        debug!(%key, found = record.is_some(), "read");
        Ok(Reply::new(record))
    }

    async fn create(&self, set: EntitySet, payload: Record) -> Result<Reply<Record>, StoreError> {
        match (set, payload) {
            (EntitySet::PurchaseOrders, Record::PurchaseOrder(po)) => self.post_purchase_order(po),
            (EntitySet::GoodsReceipts, Record::GoodsReceipt(gr)) => self.cancel_goods_receipt(gr),
            (EntitySet::Assets, Record::Asset(asset)) => self.store_asset(asset),
            (EntitySet::FeedbackRatings, Record::FeedbackRating(rating)) => {
                self.store_feedback(rating)
            }
            (set, payload) => Err(StoreError::UnsupportedPayload {
                set,
                kind: payload.kind(),
            }),
        }
    }
}

/// Validate one movement line against the stored order and rewrite it into
/// its canonical form.
fn check_line(
    stored: &PurchaseOrder,
    index: usize,
    line: &mut MovementLine,
    messages: &mut Vec<ValidationMessage>,
) {
    let mut failed = false;

    if !stored.items.iter().any(|item| item.po_item == line.po_item) {
        messages.push(
            ValidationMessage::error(format!(
                "Item {:?} is not on purchase order {}",
                line.po_item, stored.po_number
            ))
            .with_params([line.po_item.clone()])
            .with_code(CODE_UNKNOWN_ITEM)
            .with_target(index, Field::Reference),
        );
        failed = true;
    }

    match parse_quantity(&line.entry_qnt) {
        Some(qnt) if qnt > 0.0 => line.entry_qnt = format!("{qnt:.3}"),
        _ => {
            messages.push(
                ValidationMessage::error(format!(
                    "Quantity of line {} must be greater than zero",
                    line.movt_id
                ))
                .with_code(CODE_BAD_QUANTITY)
                .with_target(index, Field::Quantity),
            );
            line.entry_qnt = BLANK_QUANTITY.to_string();
            failed = true;
        }
    }

    if line.doc_date.is_none() {
        messages.push(
            ValidationMessage::error(format!("Line {} has no entry date", line.movt_id))
                .with_code(CODE_MISSING_DATE)
                .with_target(index, Field::EntryDate),
        );
        failed = true;
    }

    if line.po_item.is_empty() {
        line.po_item = BLANK_PO_ITEM.to_string();
    }
    line.line_status = if failed {
        Severity::Error
    } else {
        Severity::None
    };
}

fn received_item(stored: &PurchaseOrder, line: &MovementLine) -> Option<SourceLineItem> {
    let source = stored.items.iter().find(|item| item.po_item == line.po_item)?;
    Some(
        source
            .clone()
            .set_entry_qnt(parse_quantity(&line.entry_qnt).unwrap_or(0.0))
            .set_entry_uom(line.entry_uom.clone()),
    )
}

/// Distinct, non-blank delivery notes in line order
fn delivery_notes(lines: &[MovementLine]) -> Vec<&str> {
    let mut notes: Vec<&str> = vec![];
    for line in lines {
        let note = line.ref_doc_no.trim();
        if !note.is_empty() && !notes.contains(&note) {
            notes.push(note);
        }
    }
    notes
}

fn strip_unexpanded(record: Record, expand: &[Expand]) -> Record {
    let keep = |e: Expand| expand.contains(&e);
    match record {
        Record::PurchaseOrder(mut po) => {
            if !keep(Expand::Items) {
                po.items.clear();
            }
            if !keep(Expand::Movements) {
                po.movements.clear();
            }
            if !keep(Expand::MaterialDocuments) {
                po.material_documents.clear();
            }
            if !keep(Expand::Assets) {
                po.assets.clear();
            }
            Record::PurchaseOrder(po)
        }
        Record::GoodsReceipt(mut gr) => {
            if !keep(Expand::Items) {
                gr.items.clear();
            }
            if !keep(Expand::MaterialDocuments) {
                gr.material_documents.clear();
            }
            Record::GoodsReceipt(gr)
        }
        other => other,
    }
}

fn key_of(record: &Record) -> Option<RecordKey> {
    match record {
        Record::PurchaseOrder(po) => Some(RecordKey::PurchaseOrder {
            po_number: po.po_number.clone(),
        }),
        Record::GoodsReceipt(gr) => Some(RecordKey::GoodsReceipt {
            mat_doc: gr.mat_doc.clone(),
            doc_year: gr.doc_year.clone(),
        }),
        Record::Asset(asset) => Some(RecordKey::Asset {
            comp_code: asset.comp_code.clone(),
            asset_no: asset.asset_no.clone(),
            sub_number: asset.sub_number.clone(),
        }),
        Record::FeedbackRating(_) => None,
    }
}

fn key_path(record: &Record) -> Result<String, StoreError> {
    key_of(record)
        .map(|key| key.path())
        .ok_or(StoreError::UnexpectedRecord(record.kind()))
}

fn posting_key(po_number: &str, ref_doc_no: &str) -> String {
    format!("/Postings(PoNumber='{po_number}',RefDocNo='{ref_doc_no}')")
}

fn feedback_key(digest: &str) -> String {
    format!("{}('{digest}')", EntitySet::FeedbackRatings.path())
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntryDate;

    fn store() -> (tempfile::TempDir, SledRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledRecordStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn order() -> PurchaseOrder {
        PurchaseOrder::new("4500000001")
            .add_item(SourceLineItem::new("00010", 100.0, 0.1))
            .add_asset(Asset {
                comp_code: "1000".into(),
                asset_no: "AS-1".into(),
                po_item: "00010".into(),
                ..Asset::default()
            })
    }

    fn line(po_item: &str, qnt: &str) -> MovementLine {
        MovementLine::new(1)
            .set_po_item(po_item)
            .set_entry_qnt(qnt)
            .set_doc_date(EntryDate::from_ymd(2024, 5, 1).unwrap())
            .set_ref_doc_no("DN-1")
    }

    #[tokio::test]
    async fn read_strips_unexpanded_collections() {
        let (_dir, store) = store();
        store.seed(&Record::PurchaseOrder(order())).unwrap();

        let key = RecordKey::PurchaseOrder {
            po_number: "4500000001".into(),
        };
        let reply = store.read(&key, &[Expand::Items]).await.unwrap();
        let Some(Record::PurchaseOrder(po)) = reply.data else {
            panic!("expected a purchase order");
        };
        assert_eq!(po.items.len(), 1);
        assert!(po.assets.is_empty());
    }

    #[tokio::test]
    async fn dry_run_canonicalizes_bad_lines() {
        let (_dir, store) = store();
        store.seed(&Record::PurchaseOrder(order())).unwrap();

        let mut payload = order();
        payload.movements = vec![line("", "0")];
        let reply = store
            .create(EntitySet::PurchaseOrders, Record::PurchaseOrder(payload))
            .await
            .unwrap();

        let Record::PurchaseOrder(po) = reply.data else {
            panic!("expected a purchase order");
        };
        assert_eq!(po.movements[0].po_item, BLANK_PO_ITEM);
        assert_eq!(po.movements[0].entry_qnt, BLANK_QUANTITY);
        assert!(reply.messages.iter().any(|m| m.code.as_deref() == Some(CODE_UNKNOWN_ITEM)));
        assert!(reply.messages.iter().any(|m| m.code.as_deref() == Some(CODE_BAD_QUANTITY)));
    }

    #[tokio::test]
    async fn second_posting_of_a_delivery_note_warns() {
        let (_dir, store) = store();
        store.seed(&Record::PurchaseOrder(order())).unwrap();

        let mut payload = order();
        payload.movements = vec![line("00010", "2")];
        payload.submit_flag = true;
        let posted = store
            .create(EntitySet::PurchaseOrders, Record::PurchaseOrder(payload.clone()))
            .await
            .unwrap();
        assert!(posted.messages.iter().any(|m| m.code.as_deref() == Some(CODE_POSTED)));

        payload.submit_flag = false;
        let dry_run = store
            .create(EntitySet::PurchaseOrders, Record::PurchaseOrder(payload))
            .await
            .unwrap();
        assert!(
            dry_run
                .messages
                .iter()
                .any(|m| m.code.as_deref() == Some(CODE_DUPLICATE_POSTING))
        );
        let Record::PurchaseOrder(po) = dry_run.data else {
            panic!("expected a purchase order");
        };
        assert_eq!(po.material_documents.len(), 1);
    }

    #[tokio::test]
    async fn feedback_is_content_addressed() {
        let (_dir, store) = store();
        let rating = FeedbackRating {
            rating: "4".into(),
            comments: "quick".into(),
            source_obj: "GR".into(),
            source_key: "5000000001".into(),
        };
        let record = Record::FeedbackRating(rating.clone());
        let digest = sha256::digest(&minicbor::to_vec(&record).unwrap());

        store.create(EntitySet::FeedbackRatings, record).await.unwrap();
        assert_eq!(store.feedback(&digest).unwrap(), Some(rating));
    }

    #[tokio::test]
    async fn mismatched_payload_is_rejected() {
        let (_dir, store) = store();
        let result = store
            .create(EntitySet::Assets, Record::PurchaseOrder(order()))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedPayload {
                set: EntitySet::Assets,
                kind: "PurchaseOrder"
            })
        ));
    }
}
