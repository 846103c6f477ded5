//! Bookkeeping for reciter hot-swaps.
//!
//! A swap is "re-resume into a freshly loaded source": the controller
//! captures the listener's place as a [`ResumeTarget`], unloads, and waits
//! for the new reciter's content. Fetches are keyed by a ticket; when a
//! newer swap (or a close) supersedes one, its result is discarded.

use crate::content::{ContentError, LoadedContent};
use crate::resume::ResumeTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapTicket {
    pub reciter_id: u32,
    generation: u64,
}

/// What a swap needs to finish or roll back.
#[derive(Debug, Clone)]
pub struct SwapContext {
    /// Content that was playing before the swap began.
    pub previous: LoadedContent,
    pub target: ResumeTarget,
}

#[derive(Debug)]
pub enum SwapOutcome {
    /// New reciter attached; playback resumes on its first metadata.
    Applied,
    /// Fetch failed; the previous reciter was re-attached at the same place.
    Reverted(ContentError),
    /// Superseded by a newer swap or a close; nothing changed.
    Stale,
}

#[derive(Debug, Default)]
pub struct SwapManager {
    generation: u64,
    in_flight: Option<(SwapTicket, SwapContext)>,
}

impl SwapManager {
    /// Start a swap, superseding any in flight.
    pub fn begin(&mut self, reciter_id: u32, context: SwapContext) -> SwapTicket {
        self.generation += 1;
        let ticket = SwapTicket {
            reciter_id,
            generation: self.generation,
        };
        if let Some((old, _)) = self.in_flight.replace((ticket, context)) {
            tracing::debug!(
                superseded = old.reciter_id,
                reciter_id,
                "Reciter swap superseded"
            );
        }
        ticket
    }

    /// Context of the swap in flight, if any.
    pub fn pending(&self) -> Option<&SwapContext> {
        self.in_flight.as_ref().map(|(_, ctx)| ctx)
    }

    /// Where the swap in flight will resume; commands issued meanwhile
    /// move it.
    pub fn pending_target_mut(&mut self) -> Option<&mut ResumeTarget> {
        self.in_flight.as_mut().map(|(_, ctx)| &mut ctx.target)
    }

        pub fn pending_reciter(&self) -> Option<u32> {
        self.in_flight.as_ref().map(|(t, _)| t.reciter_id)
    }

    /// Claim the context for a finished fetch. `None` when the ticket is
    /// not the current one.
    pub fn finish(&mut self, ticket: SwapTicket) -> Option<SwapContext> {
        match &self.in_flight {
            Some((current, _)) if *current == ticket => self.in_flight.take().map(|(_, ctx)| ctx),
            _ => None,
        }
    }

    /// Forget the swap in flight; its result will be stale.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.in_flight = None;
    }
}
