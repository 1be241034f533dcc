//! Positional decomposition of external object identifiers.
//!
//! A goods receipt id is a 10 character material document number followed by
//! an optional 4 character document year. A purchase order id is a 10
//! character number, longer input is truncated. Decomposition never fails, it
//! degrades to empty parts when the input is too short.

pub const MAT_DOC_LENGTH: usize = 10;
pub const DOC_YEAR_LENGTH: usize = 4;
pub const FULL_OBJECT_ID_LENGTH: usize = MAT_DOC_LENGTH + DOC_YEAR_LENGTH;
pub const PO_NUMBER_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceiptId {
    pub mat_doc: String,
    pub doc_year: String,
}

pub fn parse_goods_receipt_id(raw: &str) -> GoodsReceiptId {
    let chars: Vec<char> = raw.chars().collect();

    let (mat_doc, doc_year) = if chars.len() >= FULL_OBJECT_ID_LENGTH {
        (
            chars[..MAT_DOC_LENGTH].iter().collect(),
            chars[MAT_DOC_LENGTH..FULL_OBJECT_ID_LENGTH].iter().collect(),
        )
    } else if chars.len() >= MAT_DOC_LENGTH {
        (chars[..MAT_DOC_LENGTH].iter().collect(), String::new())
    } else {
        (String::new(), String::new())
    };

    GoodsReceiptId { mat_doc, doc_year }
}

pub fn parse_purchase_order_id(raw: &str) -> String {
    raw.chars().take(PO_NUMBER_LENGTH).collect()
}
