//! Core record types: purchase orders, goods receipts and their lines
use super::message::{Severity, ValueState};
use chrono::{Datelike, NaiveDate};

/// Calendar date a movement is posted on.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct EntryDate(NaiveDate);

impl EntryDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl From<NaiveDate> for EntryDate {
    fn from(value: NaiveDate) -> Self {
        EntryDate(value)
    }
}

impl<C> minicbor::Encode<C> for EntryDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for EntryDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(EntryDate)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}

/// Authoritative line of the bound record. Read-only once fetched.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct SourceLineItem {
    #[n(0)]
    pub po_item: String,
    #[n(1)]
    pub short_text: String,
    #[n(2)]
    pub net_price: f64,
    #[n(3)]
    pub tax_rate: f64, // fraction, 0.1 is ten percent
    #[n(4)]
    pub is_asset: bool,
    #[n(5)]
    pub cancellation_blocked: bool,
    #[n(6)]
    pub reversed: bool,
    #[n(7)]
    pub entry_qnt: f64, // only meaningful on goods receipt items
    #[n(8)]
    pub entry_uom: String,
}

impl SourceLineItem {
    pub fn new(po_item: impl Into<String>, net_price: f64, tax_rate: f64) -> Self {
        Self {
            po_item: po_item.into(),
            net_price,
            tax_rate,
            ..Self::default()
        }
    }
    pub fn set_short_text(mut self, text: impl Into<String>) -> Self {
        self.short_text = text.into();
        self
    }
    pub fn set_asset(mut self, is_asset: bool) -> Self {
        self.is_asset = is_asset;
        self
    }
    pub fn set_cancellation_blocked(mut self, blocked: bool) -> Self {
        self.cancellation_blocked = blocked;
        self
    }
    pub fn set_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }
    pub fn set_entry_qnt(mut self, qnt: f64) -> Self {
        self.entry_qnt = qnt;
        self
    }
    pub fn set_entry_uom(mut self, uom: impl Into<String>) -> Self {
        self.entry_uom = uom.into();
        self
    }
    /// Reversed or cancellation-blocked lines cannot take part in a cancellation.
    pub fn is_cancellable(&self) -> bool {
        !self.cancellation_blocked && !self.reversed
    }
}

/// User-editable working entry against a source line.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct MovementLine {
    #[n(0)]
    pub movt_id: u32,
    #[n(1)]
    pub po_item: String, // reference to SourceLineItem::po_item, empty when unset
    #[n(2)]
    pub ref_doc_no: String, // delivery note
    #[n(3)]
    pub header_txt: String,
    #[n(4)]
    pub doc_date: Option<EntryDate>,
    #[n(5)]
    pub is_asset: bool,
    #[n(6)]
    pub entry_qnt: String, // free text until validated
    #[n(7)]
    pub entry_uom: String,
    #[n(8)]
    pub po_item_vs: ValueState,
    #[n(9)]
    pub entry_qnt_vs: ValueState,
    #[n(10)]
    pub doc_date_vs: ValueState,
    #[n(11)]
    pub line_status: Severity,
}

impl MovementLine {
    pub fn new(movt_id: u32) -> Self {
        Self {
            movt_id,
            ..Self::default()
        }
    }
    pub fn set_po_item(mut self, po_item: impl Into<String>) -> Self {
        self.po_item = po_item.into();
        self
    }
    pub fn set_entry_qnt(mut self, qnt: impl Into<String>) -> Self {
        self.entry_qnt = qnt.into();
        self
    }
    pub fn set_doc_date(mut self, date: EntryDate) -> Self {
        self.doc_date = Some(date);
        self
    }
    pub fn set_ref_doc_no(mut self, ref_doc_no: impl Into<String>) -> Self {
        self.ref_doc_no = ref_doc_no.into();
        self
    }
    pub fn set_header_txt(mut self, text: impl Into<String>) -> Self {
        self.header_txt = text.into();
        self
    }
    pub fn clear_validation(&mut self) {
        self.po_item_vs = ValueState::None;
        self.entry_qnt_vs = ValueState::None;
        self.doc_date_vs = ValueState::None;
        self.line_status = Severity::None;
    }
    pub fn has_field_errors(&self) -> bool {
        [self.po_item_vs, self.entry_qnt_vs, self.doc_date_vs].contains(&ValueState::Error)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDocument {
    #[n(0)]
    pub mat_doc: String,
    #[n(1)]
    pub doc_year: String,
}

impl MaterialDocument {
    pub fn new(mat_doc: impl Into<String>, doc_year: impl Into<String>) -> Self {
        Self {
            mat_doc: mat_doc.into(),
            doc_year: doc_year.into(),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Asset {
    #[n(0)]
    pub comp_code: String,
    #[n(1)]
    pub asset_no: String,
    #[n(2)]
    pub sub_number: String,
    #[n(3)]
    pub po_item: String,
    #[n(4)]
    pub description: String,
    #[n(5)]
    pub serial_no: String,
    #[n(6)]
    pub location: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct PurchaseOrder {
    #[n(0)]
    pub po_number: String,
    #[n(1)]
    pub excluded: bool,
    #[n(2)]
    pub complete: bool,
    #[n(3)]
    pub approved: bool,
    #[n(4)]
    pub currency: String,
    #[n(5)]
    pub comp_code: String,
    #[n(6)]
    pub vendor: String,
    #[n(7)]
    pub items: Vec<SourceLineItem>,
    #[n(8)]
    pub movements: Vec<MovementLine>,
    #[n(9)]
    pub material_documents: Vec<MaterialDocument>,
    #[n(10)]
    pub assets: Vec<Asset>,
    #[n(11)]
    pub submit_flag: bool, // false: dry run, true: commit
    #[n(12)]
    pub gr_value: String,
}

impl PurchaseOrder {
    /// Construct an eligible, empty purchase order
    pub fn new(po_number: impl Into<String>) -> Self {
        Self {
            po_number: po_number.into(),
            complete: true,
            approved: true,
            ..Self::default()
        }
    }
    pub fn set_excluded(mut self, excluded: bool) -> Self {
        self.excluded = excluded;
        self
    }
    pub fn set_complete(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }
    pub fn set_approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
    pub fn set_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
    pub fn set_comp_code(mut self, comp_code: impl Into<String>) -> Self {
        self.comp_code = comp_code.into();
        self
    }
    pub fn set_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
    pub fn add_item(mut self, item: SourceLineItem) -> Self {
        self.items.push(item);
        self
    }
    pub fn add_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct GoodsReceipt {
    #[n(0)]
    pub mat_doc: String,
    #[n(1)]
    pub doc_year: String,
    #[n(2)]
    pub po_number: String,
    #[n(3)]
    pub items: Vec<SourceLineItem>,
    #[n(4)]
    pub material_documents: Vec<MaterialDocument>,
    #[n(5)]
    pub cancel_reason: String,
}

impl GoodsReceipt {
    pub fn new(mat_doc: impl Into<String>, doc_year: impl Into<String>) -> Self {
        Self {
            mat_doc: mat_doc.into(),
            doc_year: doc_year.into(),
            ..Self::default()
        }
    }
    pub fn set_po_number(mut self, po_number: impl Into<String>) -> Self {
        self.po_number = po_number.into();
        self
    }
    pub fn add_item(mut self, item: SourceLineItem) -> Self {
        self.items.push(item);
        self
    }
    /// Document number and year as one identifier
    pub fn object_id(&self) -> String {
        format!("{}{}", self.mat_doc, self.doc_year)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackRating {
    #[n(0)]
    pub rating: String, // the backend expects the rating as text
    #[n(1)]
    pub comments: String,
    #[n(2)]
    pub source_obj: String,
    #[n(3)]
    pub source_key: String,
}

/// Any payload the record store reads or creates.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub enum Record {
    #[n(0)]
    PurchaseOrder(#[n(0)] PurchaseOrder),
    #[n(1)]
    GoodsReceipt(#[n(0)] GoodsReceipt),
    #[n(2)]
    Asset(#[n(0)] Asset),
    #[n(3)]
    FeedbackRating(#[n(0)] FeedbackRating),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::PurchaseOrder(_) => "PurchaseOrder",
            Record::GoodsReceipt(_) => "GoodsReceipt",
            Record::Asset(_) => "Asset",
            Record::FeedbackRating(_) => "FeedbackRating",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_date_encoding() {
        let original = EntryDate::from_ymd(2024, 2, 29).unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: EntryDate = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn cancellable_excludes_blocked_and_reversed() {
        assert!(SourceLineItem::new("0001", 1.0, 0.0).is_cancellable());
        assert!(
            !SourceLineItem::new("0001", 1.0, 0.0)
                .set_reversed(true)
                .is_cancellable()
        );
        assert!(
            !SourceLineItem::new("0001", 1.0, 0.0)
                .set_cancellation_blocked(true)
                .is_cancellable()
        );
    }

    #[test]
    fn record_encoding_keeps_variant() {
        let po = PurchaseOrder::new("4500000001")
            .set_currency("AUD")
            .add_item(SourceLineItem::new("00010", 100.0, 0.1));
        let original = Record::PurchaseOrder(po);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Record = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
        assert_eq!(decode.kind(), "PurchaseOrder");
    }
}
