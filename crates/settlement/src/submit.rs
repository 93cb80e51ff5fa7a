//! Call-list submission
//!
//! Submission is modeled as a small explicit state machine instead of
//! status-string dispatch: `Idle → Building → Pending → Success | Failed`.
//! The submitter walks the ordered call list, stops at the first failure,
//! and surfaces the node's reason verbatim. It never retries — at-most-once
//! construction; resubmission is the caller's decision.

use tracing::{error, info};

use geomarket_chain::{ChainError, MarketClient};
use geomarket_core::{CallRequest, Hash256};

use crate::{Result, SettlementError};

/// Submission lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    /// Nothing submitted yet
    Idle,
    /// Call list accepted, submission not yet started
    Building,
    /// A call is in flight
    Pending,
    /// Every call in the list was accepted
    Success,
    /// A call was rejected; the remainder was not submitted
    Failed,
}

/// Drives an ordered call list through the chain gateway.
pub struct Submitter<'a> {
    client: &'a MarketClient,
    state: SubmitState,
}

impl<'a> Submitter<'a> {
    pub fn new(client: &'a MarketClient) -> Self {
        Self { client, state: SubmitState::Idle }
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Submit every call in order, returning the transaction hashes.
    ///
    /// On the first rejected call the state moves to `Failed` and the
    /// error reports the failing index and the node's reason; hashes of
    /// calls already accepted are lost to the caller only in the sense
    /// that the sequence did not complete — the chain keeps them.
    pub async fn submit_all(&mut self, calls: &[CallRequest]) -> Result<Vec<Hash256>> {
        self.state = SubmitState::Building;
        info!("submitting {} call(s)", calls.len());

        let mut hashes = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            self.state = SubmitState::Pending;
            match self.client.submit(call).await {
                Ok(hash) => hashes.push(hash),
                Err(err) => {
                    self.state = SubmitState::Failed;
                    let reason = submission_reason(err);
                    error!("call {} rejected: {}", index, reason);
                    return Err(SettlementError::Submission { index, reason });
                }
            }
        }

        self.state = SubmitState::Success;
        Ok(hashes)
    }
}

/// Extract a short human-readable reason from a gateway error; the node's
/// own message is passed through verbatim when there is one.
fn submission_reason(err: ChainError) -> String {
    match err {
        ChainError::Rpc { message, .. } => message,
        other => other.to_string(),
    }
}
