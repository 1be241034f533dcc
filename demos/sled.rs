//! Posts a goods receipt against a purchase order held in a throwaway sled
//! database, then cancels it again.
use goods_receipt::binder::{Mode, RecordKind};
use goods_receipt::config::WorkflowConfig;
use goods_receipt::record::{EntryDate, PurchaseOrder, Record, SourceLineItem};
use goods_receipt::service::ReceiptService;
use goods_receipt::sled_store::SledRecordStore;
use goods_receipt::workflow::{
    CancelOutcome, Feedback, FeedbackPrompt, Interaction, Prompt, SubmitOutcome,
};
use std::sync::Arc;

/// Accepts every prompt and rates every posting
struct Console;

impl Interaction for Console {
    async fn confirm(&mut self, prompt: &Prompt) -> bool {
        for line in prompt.text() {
            println!("? {line}");
        }
        true
    }
    async fn collect_feedback(&mut self, prompt: &FeedbackPrompt) -> Feedback {
        for line in &prompt.summary {
            println!("  {line}");
        }
        Feedback {
            rating: prompt.max_rating,
            comments: String::new(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SledRecordStore::open(dir.path())?;

    let po = PurchaseOrder::new("4500000001")
        .set_currency("AUD")
        .add_item(SourceLineItem::new("00010", 120.0, 0.1).set_short_text("Pallet racking"))
        .add_item(SourceLineItem::new("00020", 15.5, 0.1).set_short_text("Shelf clips"));
    store.seed(&Record::PurchaseOrder(po))?;

    let mut service = ReceiptService::new(Arc::new(store), WorkflowConfig::default());
    let mut console = Console;

    service.open(RecordKind::PurchaseOrder, "4500000001").await?;
    if let Some(session) = service.session_mut() {
        let book = session.book_mut();
        book.edit_line(0, |line| {
            line.po_item = "00010".into();
            line.entry_qnt = "2".into();
            line.ref_doc_no = "DN-1001".into();
            line.doc_date = EntryDate::from_ymd(2024, 6, 3);
        })?;
        book.add_line()?;
        let index = book.lines().len() - 1;
        book.edit_line(index, |line| {
            line.po_item = "00020".into();
            line.entry_qnt = "40".into();
            line.ref_doc_no = "DN-1001".into();
            line.doc_date = EntryDate::from_ymd(2024, 6, 3);
        })?;
        println!("total incl. tax: {:.2}", book.aggregate().total_inc_tax);
    }

    let SubmitOutcome::Posted(receipt) = service.submit_movements(&mut console).await? else {
        anyhow::bail!("goods receipt was not posted");
    };
    let Some(doc) = receipt.material_documents.first() else {
        anyhow::bail!("no material document returned");
    };
    println!("posted {} ({:?})", doc.mat_doc, receipt.feedback);

    let gr_id = format!("{}{}", doc.mat_doc, doc.doc_year);
    service
        .open(RecordKind::GoodsReceipt { mode: Mode::Edit }, &gr_id)
        .await?;
    if let Some(session) = service.session_mut() {
        session.set_cancel_reason("Delivered to the wrong site");
    }
    match service.cancel_goods_receipt(&mut console).await? {
        CancelOutcome::Cancelled(reversal) => {
            println!("reversed by {:?}", reversal.material_documents)
        }
        other => println!("cancellation ended with {other:?}"),
    }

    Ok(())
}
