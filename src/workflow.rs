//! Submission and cancellation workflows of a bound-record session.
//!
//! Both run strictly in sequence: a dry run always completes before a post is
//! issued, and nothing is committed before the user accepts the last prompt.
use super::config::WorkflowConfig;
use super::error::WorkflowError;
use super::message::{Severity, ValidationMessage};
use super::reconcile::normalize_canonical;
use super::record::{FeedbackRating, MaterialDocument, Record};
use super::session::Session;
use super::store::{EntitySet, RecordStore};
use super::validator::{MANDATORY_MISSING, clear_states, validate_lines};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Validating,
    DryRunPending,
    AwaitingDuplicateConfirmation,
    AwaitingFinalConfirmation,
    Posting,
    Posted,
    RejectedWithErrors,
}

impl WorkflowState {
    /// A request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            WorkflowState::Validating | WorkflowState::DryRunPending | WorkflowState::Posting
        )
    }
}

/// Blocking yes/no decisions put to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    DuplicateWarning {
        material_documents: Vec<MaterialDocument>,
    },
    FinalConfirmation,
    CancellationConfirm,
    DiscardChanges,
}

impl Prompt {
    /// Text of the prompt as message keys, in display order.
    pub fn text(&self) -> Vec<ValidationMessage> {
        match self {
            Prompt::DuplicateWarning { material_documents } => vec![
                ValidationMessage::warning("duplicateWarningText1")
                    .with_params([material_documents.len().to_string()]),
                ValidationMessage::warning("duplicateWarningText2"),
            ],
            Prompt::FinalConfirmation => vec![ValidationMessage::warning("createConfirmText")],
            Prompt::CancellationConfirm => vec![ValidationMessage::warning("grCancelConfirmText")],
            Prompt::DiscardChanges => vec![ValidationMessage::warning("confirmExit")],
        }
    }
}

/// Success summary shown with the rating control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackPrompt {
    pub summary: Vec<ValidationMessage>,
    pub material_documents: Vec<MaterialDocument>,
    pub max_rating: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    pub rating: u8,
    pub comments: String,
}

impl Feedback {
    /// Unfilled feedback is not sent
    pub fn is_filled(&self) -> bool {
        self.rating > 0 || !self.comments.is_empty()
    }
}

/// The presentation side of the workflow. Each call suspends the workflow
/// until the user has decided.
pub trait Interaction {
    fn confirm(&mut self, prompt: &Prompt) -> impl Future<Output = bool>;
    fn collect_feedback(&mut self, prompt: &FeedbackPrompt) -> impl Future<Output = Feedback>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Skipped,
    Sent,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub material_documents: Vec<MaterialDocument>,
    pub feedback: FeedbackOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    MandatoryMissing,
    DryRunErrors,
    Declined,
    PostErrors,
    Posted(PostReceipt),
    TransportFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Declined,
    Errors,
    Cancelled(PostReceipt),
    TransportFailed,
}

/// Borrow of the session for one workflow run. A run dropped while a
/// request is in flight leaves the session `Idle` instead of busy.
struct InFlight<'a> {
    session: &'a mut Session,
}

impl Deref for InFlight<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.session.is_busy() {
            warn!(state = ?self.session.state(), "workflow abandoned mid-request");
            self.session.set_state(WorkflowState::Idle);
        }
    }
}

/// Validate, dry run, confirm and post the movement lines of a purchase order
/// session.
#[instrument(skip_all, fields(session = %session.id(), object_id = %session.object_id()))]
pub async fn submit<S, I>(
    session: &mut Session,
    store: &Arc<S>,
    config: &WorkflowConfig,
    interaction: &mut I,
) -> Result<SubmitOutcome, WorkflowError>
where
    S: RecordStore,
    I: Interaction,
{
    if session.is_busy() {
        return Err(WorkflowError::Busy);
    }
    let mut session = InFlight { session };
    let mut payload = session
        .purchase_order()
        .ok_or(WorkflowError::WrongRecordKind("purchase order"))?
        .clone();

    session.set_state(WorkflowState::Validating);
    session.messages_mut().clear();
    clear_states(session.book_mut().lines_mut());
    let report = validate_lines(session.book_mut().lines_mut());
    session.messages_mut().extend(report.messages);

    if report.mandatory_missing {
        debug!("mandatory fields missing");
        session
            .messages_mut()
            .push(ValidationMessage::error(MANDATORY_MISSING));
        session.set_state(WorkflowState::Idle);
        return Ok(SubmitOutcome::MandatoryMissing);
    }

    // dry run
    payload.movements = session.book().submission_lines();
    payload.submit_flag = false;
    payload.gr_value = session.book().aggregate().total_inc_tax.to_string();
    session.set_state(WorkflowState::DryRunPending);

    let reply = match store
        .create(EntitySet::PurchaseOrders, Record::PurchaseOrder(payload.clone()))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "dry run failed");
            session.set_state(WorkflowState::Idle);
            return Ok(SubmitOutcome::TransportFailed);
        }
    };
    let canonical = match reply.data {
        Record::PurchaseOrder(po) => po,
        other => {
            warn!(kind = other.kind(), "dry run answered with another record");
            session.set_state(WorkflowState::Idle);
            return Ok(SubmitOutcome::TransportFailed);
        }
    };

    session
        .book_mut()
        .replace_lines(normalize_canonical(canonical.movements));
    session.messages_mut().extend(reply.messages);

    if session.messages().has_errors() {
        debug!(count = session.messages().len(), "dry run reported errors");
        session.set_state(WorkflowState::RejectedWithErrors);
        return Ok(SubmitOutcome::DryRunErrors);
    }

    let prompt = if session.messages().contains_code(&config.duplicate_code) {
        session.set_state(WorkflowState::AwaitingDuplicateConfirmation);
        Prompt::DuplicateWarning {
            material_documents: canonical.material_documents,
        }
    } else {
        session.set_state(WorkflowState::AwaitingFinalConfirmation);
        Prompt::FinalConfirmation
    };
    if !interaction.confirm(&prompt).await {
        debug!(?prompt, "posting declined");
        session.set_state(WorkflowState::Idle);
        return Ok(SubmitOutcome::Declined);
    }

    // post
    session.set_state(WorkflowState::Posting);
    session.messages_mut().clear();
    payload.submit_flag = true;

    let reply = match store
        .create(EntitySet::PurchaseOrders, Record::PurchaseOrder(payload))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "post failed");
            session.set_state(WorkflowState::Idle);
            return Ok(SubmitOutcome::TransportFailed);
        }
    };
    session.messages_mut().extend(reply.messages);

    if session.messages().has_errors() {
        debug!(count = session.messages().len(), "post reported errors");
        session.set_state(WorkflowState::RejectedWithErrors);
        return Ok(SubmitOutcome::PostErrors);
    }
    session.set_state(WorkflowState::Posted);

    let (po_number, material_documents) = match reply.data {
        Record::PurchaseOrder(po) => (po.po_number, po.material_documents),
        other => {
            warn!(kind = other.kind(), "post answered with another record");
            (session.object_id(), vec![])
        }
    };
    info!(%po_number, count = material_documents.len(), "goods receipt posted");

    let summary = posting_summary(&po_number, &material_documents);
    let feedback = run_feedback(store, config, interaction, summary, &material_documents).await;

    Ok(SubmitOutcome::Posted(PostReceipt {
        material_documents,
        feedback,
    }))
}

/// Reverse the eligible lines of a goods receipt bound in edit mode.
#[instrument(skip_all, fields(session = %session.id(), object_id = %session.object_id()))]
pub async fn cancel<S, I>(
    session: &mut Session,
    store: &Arc<S>,
    config: &WorkflowConfig,
    interaction: &mut I,
) -> Result<CancelOutcome, WorkflowError>
where
    S: RecordStore,
    I: Interaction,
{
    if session.is_busy() {
        return Err(WorkflowError::Busy);
    }
    if !session.is_editing_receipt() {
        return Err(WorkflowError::WrongRecordKind("goods receipt edit"));
    }
    let mut session = InFlight { session };
    let mut payload = session
        .goods_receipt()
        .ok_or(WorkflowError::WrongRecordKind("goods receipt edit"))?
        .receipt
        .clone();

    if !interaction.confirm(&Prompt::CancellationConfirm).await {
        session.set_state(WorkflowState::Idle);
        return Ok(CancelOutcome::Declined);
    }

    session.set_state(WorkflowState::Posting);
    session.messages_mut().clear();
    payload.items = session.book().sources().to_vec();
    payload.cancel_reason = session.cancel_reason().to_string();
    let mat_doc = payload.mat_doc.clone();

    let reply = match store
        .create(EntitySet::GoodsReceipts, Record::GoodsReceipt(payload))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "cancellation failed");
            session.set_state(WorkflowState::Idle);
            return Ok(CancelOutcome::TransportFailed);
        }
    };

    let result = match reply.data {
        Record::GoodsReceipt(gr) => gr,
        other => {
            warn!(kind = other.kind(), "cancellation answered with another record");
            session.set_state(WorkflowState::Idle);
            return Ok(CancelOutcome::TransportFailed);
        }
    };
    session.replace_receipt_items(result.items);
    session.messages_mut().extend(reply.messages);

    if session.messages().has_errors() {
        session.set_state(WorkflowState::RejectedWithErrors);
        return Ok(CancelOutcome::Errors);
    }
    session.set_state(WorkflowState::Posted);
    info!(%mat_doc, count = result.material_documents.len(), "goods receipt cancelled");

    let summary = cancellation_summary(&mat_doc, &result.po_number, &result.material_documents);
    let feedback = run_feedback(
        store,
        config,
        interaction,
        summary,
        &result.material_documents,
    )
    .await;

    Ok(CancelOutcome::Cancelled(PostReceipt {
        material_documents: result.material_documents,
        feedback,
    }))
}

pub fn posting_summary(
    po_number: &str,
    material_documents: &[MaterialDocument],
) -> Vec<ValidationMessage> {
    let mut summary = vec![
        ValidationMessage::success("successText1")
            .with_params([material_documents.len().to_string(), po_number.to_string()]),
    ];
    summary.extend(
        material_documents
            .iter()
            .map(|doc| ValidationMessage::new(Severity::None, doc.mat_doc.clone())),
    );
    summary.push(ValidationMessage::success("successText2"));
    summary
}

pub fn cancellation_summary(
    mat_doc: &str,
    po_number: &str,
    material_documents: &[MaterialDocument],
) -> Vec<ValidationMessage> {
    let mut summary = vec![
        ValidationMessage::success("grCancelSuccessText1")
            .with_params([mat_doc.to_string(), po_number.to_string()]),
    ];
    summary.extend(material_documents.iter().map(|doc| {
        ValidationMessage::success("grCancelSuccessText2").with_params([doc.mat_doc.clone()])
    }));
    summary
}

async fn run_feedback<S, I>(
    store: &Arc<S>,
    config: &WorkflowConfig,
    interaction: &mut I,
    summary: Vec<ValidationMessage>,
    material_documents: &[MaterialDocument],
) -> FeedbackOutcome
where
    S: RecordStore,
    I: Interaction,
{
    let prompt = FeedbackPrompt {
        summary,
        material_documents: material_documents.to_vec(),
        max_rating: config.max_rating,
    };
    let feedback = interaction.collect_feedback(&prompt).await;
    if !feedback.is_filled() {
        return FeedbackOutcome::Skipped;
    }

    let rating = FeedbackRating {
        rating: feedback.rating.min(config.max_rating).to_string(),
        comments: feedback.comments,
        source_obj: config.source_obj.clone(),
        source_key: material_documents
            .first()
            .map(|doc| doc.mat_doc.clone())
            .unwrap_or_default(),
    };
    send_feedback(Arc::clone(store), rating, config.feedback_timeout).await
}

/// Best-effort feedback post raced against a timer. Whichever finishes first
/// decides the outcome; a request still in flight keeps running detached.
#[instrument(skip(store, rating), fields(source_key = %rating.source_key))]
pub async fn send_feedback<S: RecordStore>(
    store: Arc<S>,
    rating: FeedbackRating,
    timeout: Duration,
) -> FeedbackOutcome {
    let request = tokio::spawn(async move {
        store
            .create(EntitySet::FeedbackRatings, Record::FeedbackRating(rating))
            .await
    });

    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(Ok(_))) => FeedbackOutcome::Sent,
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "feedback rejected");
            FeedbackOutcome::Failed
        }
        Ok(Err(e)) => {
            warn!(error = %e, "feedback task failed");
            FeedbackOutcome::Failed
        }
        Err(_) => {
            debug!("feedback still in flight, moving on");
            FeedbackOutcome::TimedOut
        }
    }
}
