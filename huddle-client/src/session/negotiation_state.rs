use std::fmt;

/// Where a peer session is in the offer/answer exchange.
///
/// Callers go `Idle -> OfferPending -> OfferSent`, callees
/// `Idle -> AnswerPending -> AnswerSent`; both then reach `Connected` and end
/// in `Disconnected` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    OfferPending,
    OfferSent,
    AnswerPending,
    AnswerSent,
    Connected,
    Disconnected,
    Closed,
}

impl NegotiationState {
    /// No further offer, answer or candidate is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Disconnected | NegotiationState::Closed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferPending => "offer pending",
            NegotiationState::OfferSent => "offer sent",
            NegotiationState::AnswerPending => "answer pending",
            NegotiationState::AnswerSent => "answer sent",
            NegotiationState::Connected => "connected",
            NegotiationState::Disconnected => "disconnected",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}
