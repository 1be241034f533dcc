//! Service layer API for goods receipt operations
use super::binder::{RecordBinder, RecordKind};
use super::config::WorkflowConfig;
use super::error::{BindError, WorkflowError};
use super::message::{Severity, ValidationMessage};
use super::record::{Asset, Record};
use super::session::Session;
use super::store::{EntitySet, RecordStore};
use super::workflow::{self, CancelOutcome, Interaction, Prompt, SubmitOutcome};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(ValidationMessage),
    Rejected(Vec<ValidationMessage>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Stayed,
    Left,
}

pub struct ReceiptService<S> {
    store: Arc<S>,
    config: WorkflowConfig,
    binder: RecordBinder,
    session: Option<Session>,
}

impl<S: RecordStore> ReceiptService<S> {
    pub fn new(store: Arc<S>, config: WorkflowConfig) -> Self {
        Self {
            store,
            config,
            binder: RecordBinder::new(),
            session: None,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }
    pub fn binder(&self) -> &RecordBinder {
        &self.binder
    }
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Bind a record and start a fresh session for it. Any previous session is
    /// discarded first, also when the new identifier is rejected.
    pub async fn open(&mut self, kind: RecordKind, raw: &str) -> Result<&Session, BindError> {
        self.session = None;
        let record = self.binder.bind(self.store.as_ref(), kind, raw).await?;
        let session = Session::open(record)?;
        debug!(session = %session.id(), object_id = %session.object_id(), "session opened");

        Ok(self.session.insert(session))
    }

    /// Run the submission workflow of the bound purchase order. A successful
    /// post marks the order as posted and ends the session.
    pub async fn submit_movements<I: Interaction>(
        &mut self,
        interaction: &mut I,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NotBound)?;
        let po_number = session.purchase_order().map(|po| po.po_number.clone());

        let outcome = workflow::submit(session, &self.store, &self.config, interaction).await?;
        if let SubmitOutcome::Posted(_) = outcome {
            if let Some(po_number) = po_number {
                self.binder.mark_posted(&po_number);
            }
            self.reset();
        }
        Ok(outcome)
    }

    /// Cancel the bound goods receipt. A successful cancellation ends the session.
    pub async fn cancel_goods_receipt<I: Interaction>(
        &mut self,
        interaction: &mut I,
    ) -> Result<CancelOutcome, WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NotBound)?;

        let outcome = workflow::cancel(session, &self.store, &self.config, interaction).await?;
        if let CancelOutcome::Cancelled(_) = outcome {
            self.reset();
        }
        Ok(outcome)
    }

    /// Save asset details. The first message of the reply decides the outcome.
    #[instrument(skip(self, asset), fields(asset_no = %asset.asset_no))]
    pub async fn update_asset(&mut self, asset: Asset) -> Result<UpdateOutcome, WorkflowError> {
        let session = self.session.as_ref().ok_or(WorkflowError::NotBound)?;
        if session.is_busy() {
            return Err(WorkflowError::Busy);
        }

        let reply = self
            .store
            .create(EntitySet::Assets, Record::Asset(asset))
            .await?;

        match reply.messages.first() {
            Some(first) if first.severity == Severity::Success => {
                Ok(UpdateOutcome::Updated(first.clone()))
            }
            _ => Ok(UpdateOutcome::Rejected(reply.messages)),
        }
    }

    /// Navigate away from the bound record, asking first when there are
    /// unsaved changes.
    pub async fn leave<I: Interaction>(&mut self, interaction: &mut I) -> LeaveOutcome {
        let dirty = self
            .session
            .as_ref()
            .is_some_and(Session::has_unsaved_changes);

        if dirty && !interaction.confirm(&Prompt::DiscardChanges).await {
            return LeaveOutcome::Stayed;
        }
        self.reset();
        LeaveOutcome::Left
    }

    /// Drop the session and return the binder to unbound
    pub fn reset(&mut self) {
        self.session = None;
        self.binder.reset();
    }
}
