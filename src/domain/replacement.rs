//! Per-item replacement decision machine.
//!
//! The merchant proposes a substitute product for an out-of-stock line item;
//! the customer approves or rejects it through the tracking token. The state
//! is stored across four columns but modeled here as one tagged enum, so an
//! ambiguous row (say, `approved` with a proposal still attached) is a
//! decode error instead of a representable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Raw storage tag; see [`ReplacementDecision`] for the real state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum ReplacementStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementDecision {
    /// No replacement has ever been proposed, or the merchant reset it.
    None,
    /// Awaiting the customer's decision on the proposed product.
    Pending { product_id: i64 },
    Approved { decided_at: DateTime<Utc> },
    Rejected { reason: Option<String>, decided_at: DateTime<Utc> },
}

/// The four columns as they appear on `order_items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementColumns {
    pub status: ReplacementStatus,
    pub pending_product_id: Option<i64>,
    pub reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ReplacementDecision {
    /// Fallible mapping from storage. Combinations the schema checks should
    /// already forbid are rejected here too.
    pub fn from_columns(cols: ReplacementColumns) -> Result<Self> {
        match (cols.status, cols.pending_product_id, cols.decided_at) {
            (ReplacementStatus::None, None, None) => Ok(ReplacementDecision::None),
            (ReplacementStatus::Pending, Some(product_id), None) => {
                Ok(ReplacementDecision::Pending { product_id })
            }
            (ReplacementStatus::Approved, None, Some(decided_at)) => {
                Ok(ReplacementDecision::Approved { decided_at })
            }
            (ReplacementStatus::Rejected, None, Some(decided_at)) => {
                Ok(ReplacementDecision::Rejected { reason: cols.reason, decided_at })
            }
            (status, _, _) => Err(Error::conflict(format!(
                "order item carries an inconsistent replacement state ({status:?})"
            ))),
        }
    }

    pub fn to_columns(&self) -> ReplacementColumns {
        match self {
            ReplacementDecision::None => ReplacementColumns {
                status: ReplacementStatus::None,
                pending_product_id: None,
                reason: None,
                decided_at: None,
            },
            ReplacementDecision::Pending { product_id } => ReplacementColumns {
                status: ReplacementStatus::Pending,
                pending_product_id: Some(*product_id),
                reason: None,
                decided_at: None,
            },
            ReplacementDecision::Approved { decided_at } => ReplacementColumns {
                status: ReplacementStatus::Approved,
                pending_product_id: None,
                reason: None,
                decided_at: Some(*decided_at),
            },
            ReplacementDecision::Rejected { reason, decided_at } => ReplacementColumns {
                status: ReplacementStatus::Rejected,
                pending_product_id: None,
                reason: reason.clone(),
                decided_at: Some(*decided_at),
            },
        }
    }

    /// Merchant proposes a substitute. Only legal when nothing is proposed;
    /// a prior decision must be reset first.
    pub fn propose(&self, product_id: i64) -> Result<Self> {
        match self {
            ReplacementDecision::None => Ok(ReplacementDecision::Pending { product_id }),
            _ => Err(Error::conflict(
                "a replacement is already proposed or decided for this item",
            )),
        }
    }

    /// Customer approves the pending proposal; returns the new state and the
    /// approved product id (so the caller can re-snapshot the item).
    pub fn approve(&self, now: DateTime<Utc>) -> Result<(Self, i64)> {
        match self {
            ReplacementDecision::Pending { product_id } => {
                Ok((ReplacementDecision::Approved { decided_at: now }, *product_id))
            }
            _ => Err(Error::conflict("no pending replacement to approve")),
        }
    }

    /// Customer rejects the pending proposal. The original item stays as it
    /// was; this does not touch the parent order's status.
    pub fn reject(&self, reason: Option<String>, now: DateTime<Utc>) -> Result<Self> {
        match self {
            ReplacementDecision::Pending { .. } => {
                Ok(ReplacementDecision::Rejected { reason, decided_at: now })
            }
            _ => Err(Error::conflict("no pending replacement to reject")),
        }
    }

    /// Merchant reopens the decision from any state; the order-completion
    /// gate is the caller's concern.
    pub fn reset(&self) -> Self {
        ReplacementDecision::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn propose_only_from_none() {
        let pending = ReplacementDecision::None.propose(42).unwrap();
        assert_eq!(pending, ReplacementDecision::Pending { product_id: 42 });

        assert!(pending.propose(43).is_err());
        let approved = ReplacementDecision::Approved { decided_at: now() };
        assert!(approved.propose(43).is_err());
    }

    #[test]
    fn approve_clears_the_proposal_and_reports_product() {
        let pending = ReplacementDecision::Pending { product_id: 42 };
        let (approved, product_id) = pending.approve(now()).unwrap();
        assert_eq!(product_id, 42);
        assert_eq!(approved.to_columns().pending_product_id, None);
        assert_eq!(approved.to_columns().status, ReplacementStatus::Approved);
    }

    #[test]
    fn reject_keeps_reason_and_clears_proposal() {
        let pending = ReplacementDecision::Pending { product_id: 42 };
        let rejected = pending.reject(Some("not interested".into()), now()).unwrap();
        let cols = rejected.to_columns();
        assert_eq!(cols.status, ReplacementStatus::Rejected);
        assert_eq!(cols.pending_product_id, None);
        assert_eq!(cols.reason.as_deref(), Some("not interested"));
    }

    #[test]
    fn deciding_twice_is_a_conflict() {
        let pending = ReplacementDecision::Pending { product_id: 42 };
        let (approved, _) = pending.approve(now()).unwrap();
        assert!(approved.approve(now()).is_err());
        assert!(approved.reject(None, now()).is_err());
    }

    #[test]
    fn reset_reopens_from_any_state() {
        let rejected = ReplacementDecision::Rejected { reason: None, decided_at: now() };
        assert_eq!(rejected.reset(), ReplacementDecision::None);
        assert!(rejected.reset().propose(7).is_ok());
    }

    #[test]
    fn pending_always_names_a_product() {
        // Round-trip every state through the column form.
        let states = [
            ReplacementDecision::None,
            ReplacementDecision::Pending { product_id: 9 },
            ReplacementDecision::Approved { decided_at: now() },
            ReplacementDecision::Rejected { reason: Some("r".into()), decided_at: now() },
        ];
        for state in states {
            let cols = state.to_columns();
            if cols.status == ReplacementStatus::Pending {
                assert!(cols.pending_product_id.is_some());
            }
            assert_eq!(ReplacementDecision::from_columns(cols).unwrap(), state);
        }
    }

    #[test]
    fn ambiguous_columns_are_rejected() {
        // Approved while a proposal is still attached.
        let cols = ReplacementColumns {
            status: ReplacementStatus::Approved,
            pending_product_id: Some(42),
            reason: None,
            decided_at: Some(now()),
        };
        assert!(ReplacementDecision::from_columns(cols).is_err());

        // Pending with no proposed product.
        let cols = ReplacementColumns {
            status: ReplacementStatus::Pending,
            pending_product_id: None,
            reason: None,
            decided_at: None,
        };
        assert!(ReplacementDecision::from_columns(cols).is_err());
    }
}
