//! The record store seam: keyed reads and collection creates, each reply
//! carrying the backend messages produced for that request.
use super::error::StoreError;
use super::message::ValidationMessage;
use super::record::Record;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntitySet {
    PurchaseOrders,
    GoodsReceipts,
    Assets,
    FeedbackRatings,
}

impl EntitySet {
    pub fn path(&self) -> &'static str {
        match self {
            EntitySet::PurchaseOrders => "/PurchaseOrders",
            EntitySet::GoodsReceipts => "/GoodsReceipts",
            EntitySet::Assets => "/Assets",
            EntitySet::FeedbackRatings => "/FeedbackRatings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    PurchaseOrder {
        po_number: String,
    },
    GoodsReceipt {
        mat_doc: String,
        doc_year: String,
    },
    Asset {
        comp_code: String,
        asset_no: String,
        sub_number: String,
    },
}

impl RecordKey {
    pub fn entity_set(&self) -> EntitySet {
        match self {
            RecordKey::PurchaseOrder { .. } => EntitySet::PurchaseOrders,
            RecordKey::GoodsReceipt { .. } => EntitySet::GoodsReceipts,
            RecordKey::Asset { .. } => EntitySet::Assets,
        }
    }

    /// Key path such as `/GoodsReceipts(MatDoc='5000000001',DocYear='2024')`.
    pub fn path(&self) -> String {
        let set = self.entity_set().path();
        match self {
            RecordKey::PurchaseOrder { po_number } => format!("{set}('{po_number}')"),
            RecordKey::GoodsReceipt { mat_doc, doc_year } => {
                format!("{set}(MatDoc='{mat_doc}',DocYear='{doc_year}')")
            }
            RecordKey::Asset {
                comp_code,
                asset_no,
                sub_number,
            } => format!("{set}(CompCode='{comp_code}',AssetNo='{asset_no}',SubNumber='{sub_number}')"),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Nested collections a read may expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expand {
    Items,
    Movements,
    MaterialDocuments,
    Assets,
}

/// Response payload plus the out-of-band messages correlated to the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub data: T,
    pub messages: Vec<ValidationMessage>,
}

impl<T> Reply<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            messages: vec![],
        }
    }
    pub fn with_messages(data: T, messages: Vec<ValidationMessage>) -> Self {
        Self { data, messages }
    }
}

/// Backend of records. Each call is a single attempt with no retry; an `Err`
/// is a transport failure, business outcomes travel in `Reply::messages`.
pub trait RecordStore: Send + Sync + 'static {
    fn read(
        &self,
        key: &RecordKey,
        expand: &[Expand],
    ) -> impl Future<Output = Result<Reply<Option<Record>>, StoreError>> + Send;

    fn create(
        &self,
        set: EntitySet,
        payload: Record,
    ) -> impl Future<Output = Result<Reply<Record>, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_paths() {
        let po = RecordKey::PurchaseOrder {
            po_number: "4500000001".into(),
        };
        let gr = RecordKey::GoodsReceipt {
            mat_doc: "5000000001".into(),
            doc_year: "2024".into(),
        };

        assert_eq!(po.path(), "/PurchaseOrders('4500000001')");
        assert_eq!(
            gr.path(),
            "/GoodsReceipts(MatDoc='5000000001',DocYear='2024')"
        );
        assert_eq!(gr.entity_set(), EntitySet::GoodsReceipts);
    }
}
