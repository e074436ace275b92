//! Latest-wins holder for the trend currently on screen.
//!
//! A UI re-aggregates every time the unit toggle changes. Calls can finish out
//! of order, so each request takes a [`Ticket`] from [`TrendBoard::begin`] and
//! hands its result to [`TrendBoard::publish`]. Only the most recently issued
//! ticket is accepted; anything older is discarded.
//!
//! Implementation notes:
//! - The board is an ordinary value owned by the caller, not a global.
//! - Readers call [`TrendBoard::current`], which is one atomic load through
//!   `arc-swap` (no RwLock).
//! - Ticket numbers come from an `AtomicU64` and strictly increase.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::{models::Aggregation, unit::TrendUnit};

/// Claim on the next publication slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    unit: TrendUnit,
}

impl Ticket {
    /// Issue order; later tickets have larger numbers.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Unit the request was started for.
    pub fn unit(&self) -> TrendUnit {
        self.unit
    }
}

/// An accepted result together with the ticket that produced it.
#[derive(Debug)]
pub struct Published {
    /// Ticket of the request.
    pub ticket: Ticket,
    /// The aggregation shown.
    pub aggregation: Aggregation,
}

/// Caller-owned slot for the latest published aggregation.
#[derive(Debug, Default)]
pub struct TrendBoard {
    issued: AtomicU64,
    current: ArcSwapOption<Published>,
}

impl TrendBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `unit`; supersedes every earlier ticket.
    pub fn begin(&self, unit: TrendUnit) -> Ticket {
        let seq = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        Ticket { seq, unit }
    }

    /// True if no newer ticket has been issued since `ticket`.
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::Acquire) == ticket.seq
    }

    /// Store `aggregation` if `ticket` is still the latest request.
    ///
    /// Returns whether the result was accepted.
    pub fn publish(&self, ticket: Ticket, aggregation: Aggregation) -> bool {
        if !self.is_latest(ticket) {
            debug!(seq = ticket.seq, unit = %ticket.unit, "discarding superseded trend");
            return false;
        }
        let candidate = Arc::new(Published {
            ticket,
            aggregation,
        });
        let mut accepted = false;
        self.current.rcu(|cur| match cur {
            Some(shown) if shown.ticket.seq >= ticket.seq => {
                accepted = false;
                Some(Arc::clone(shown))
            }
            _ => {
                accepted = true;
                Some(Arc::clone(&candidate))
            }
        });
        accepted
    }

    /// Last accepted result.
    pub fn current(&self) -> Option<Arc<Published>> {
        self.current.load_full()
    }

    /// Forget the shown result. Outstanding tickets stay valid.
    pub fn clear(&self) {
        self.current.store(None);
    }
}
