use serde::Serialize;

/// Transport state once the listener has started the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transport {
    Playing,
    Paused,
    /// Wants to play; waiting for the current track to load or for a
    /// deferred resume to fire.
    Buffering,
}

/// Lifecycle of one player session.
///
/// ```text
/// Idle ─attach─▶ Attached ─metadata─▶ Ready ─play─▶ Activated
///  ▲                                                   │
///  └──────────────────── close ◀───────────────────────┘
/// ```
///
/// Inside `Activated` the transport moves between Playing, Paused and
/// Buffering.
///
/// `Activated` is sticky: later source changes keep it until `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    /// No source.
    #[default]
    Idle,
    /// Source set, metadata not loaded yet. Controls stay hidden.
    Attached,
    /// Metadata loaded at least once, never activated. Controls hidden.
    Ready,
    /// The listener started playback at least once. Controls visible.
    Activated(Transport),
}

impl SessionPhase {
    /// New content attached. An activated session stays activated, paused
    /// until the new source is ready.
    pub fn attach(self) -> Self {
        match self {
            SessionPhase::Activated(_) => SessionPhase::Activated(Transport::Paused),
            _ => SessionPhase::Attached,
        }
    }

    pub fn metadata_loaded(self) -> Self {
        match self {
            SessionPhase::Attached => SessionPhase::Ready,
            other => other,
        }
    }

    /// Mark the session activated, keeping the transport if it already was.
    /// `None` when there is nothing to activate.
    pub fn activate(self) -> Option<Self> {
        match self {
            SessionPhase::Idle => None,
            SessionPhase::Activated(t) => Some(SessionPhase::Activated(t)),
            SessionPhase::Attached | SessionPhase::Ready => {
                Some(SessionPhase::Activated(Transport::Paused))
            }
        }
    }

    /// Change the transport of an activated session; other phases are
    /// returned unchanged.
    pub fn with_transport(self, transport: Transport) -> Self {
        match self {
            SessionPhase::Activated(_) => SessionPhase::Activated(transport),
            other => other,
        }
    }

    pub fn transport(self) -> Option<Transport> {
        match self {
            SessionPhase::Activated(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_activated(self) -> bool {
        matches!(self, SessionPhase::Activated(_))
    }

    pub fn is_playing(self) -> bool {
        matches!(self, SessionPhase::Activated(Transport::Playing))
    }

    /// Playing, or about to be.
    pub fn wants_playback(self) -> bool {
        matches!(
            self,
            SessionPhase::Activated(Transport::Playing | Transport::Buffering)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Attached => "loading",
            SessionPhase::Ready => "ready",
            SessionPhase::Activated(Transport::Playing) => "playing",
            SessionPhase::Activated(Transport::Paused) => "paused",
            SessionPhase::Activated(Transport::Buffering) => "buffering",
        }
    }
}
