use agendum_core::domain::action::{Action, EmailRequest, Proposal};
use agendum_core::errors::GateViolation;

pub const AFFIRMATIVE_REPLIES: [&str; 4] = ["yes", "yep", "confirm", "sure"];
pub const NEGATIVE_REPLIES: [&str; 3] = ["no", "cancel", "nope"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationReply {
    Affirmative,
    Negative,
    Other,
}

/// Matches the whole message against the fixed vocabularies, ignoring case,
/// surrounding whitespace and trailing punctuation.
pub fn classify_reply(text: &str) -> ConfirmationReply {
    let normalized = text.trim().trim_end_matches(['.', '!', '?', ',']).trim().to_lowercase();
    if AFFIRMATIVE_REPLIES.contains(&normalized.as_str()) {
        ConfirmationReply::Affirmative
    } else if NEGATIVE_REPLIES.contains(&normalized.as_str()) {
        ConfirmationReply::Negative
    } else {
        ConfirmationReply::Other
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum GateState {
    #[default]
    Idle,
    AwaitingConfirmation(Proposal),
}

/// A mutating action the executor is allowed to run.
///
/// Only the gate can mint one, either from an affirmed proposal or for the
/// automatic notification that follows a created event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedAction {
    proposal: Proposal,
    automatic: bool,
}

impl AuthorizedAction {
    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    pub fn into_proposal(self) -> Proposal {
        self.proposal
    }

    pub fn is_automatic(&self) -> bool {
        self.automatic
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateResolution {
    /// Nothing was pending; the message goes through the normal decision path.
    NotAwaiting,
    Execute(AuthorizedAction),
    /// Explicit negative reply. No further processing this turn.
    Declined { proposal: Proposal },
    /// Any other message drops the proposal and is decided afresh.
    Abandoned { proposal: Proposal },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmationGate {
    state: GateState,
}

impl ConfirmationGate {
    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, GateState::AwaitingConfirmation(_))
    }

    /// `idle -> awaitingConfirmation(proposal)`. A newer proposal replaces an older one.
    pub fn arm(&mut self, proposal: Proposal) {
        self.state = GateState::AwaitingConfirmation(proposal);
    }

    pub fn resolve(&mut self, message: &str) -> GateResolution {
        let state = std::mem::take(&mut self.state);
        let proposal = match state {
            GateState::Idle => return GateResolution::NotAwaiting,
            GateState::AwaitingConfirmation(proposal) => proposal,
        };

        match classify_reply(message) {
            ConfirmationReply::Affirmative => {
                GateResolution::Execute(AuthorizedAction { proposal, automatic: false })
            }
            ConfirmationReply::Negative => GateResolution::Declined { proposal },
            ConfirmationReply::Other => GateResolution::Abandoned { proposal },
        }
    }

    /// Verdict for a create or send emitted directly by the policy.
    ///
    /// Such an action never executes. [`resolve`](Self::resolve) runs before the
    /// policy is consulted and always leaves the gate idle, so there is no
    /// pending proposal it could match; only an affirmative reply mints an
    /// [`AuthorizedAction`].
    pub fn reject_unconfirmed(action: &Action) -> GateViolation {
        GateViolation { kind: action.kind(), reason: "no proposal awaiting confirmation" }
    }

    /// The post-create notification bypasses confirmation.
    pub fn automatic_notification(email: EmailRequest) -> AuthorizedAction {
        AuthorizedAction { proposal: Proposal::SendEmail(email), automatic: true }
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use agendum_core::domain::action::{Action, ActionKind, EmailRequest, Proposal};

    use super::{classify_reply, ConfirmationGate, ConfirmationReply, GateResolution};

    fn email() -> EmailRequest {
        EmailRequest {
            to: vec!["ada@example.com".to_string()],
            subject: "Agenda".to_string(),
            body: "Notes attached.".to_string(),
        }
    }

    #[test]
    fn reply_vocabulary_is_exact() {
        let cases = [
            ("yes", ConfirmationReply::Affirmative),
            ("  Yep! ", ConfirmationReply::Affirmative),
            ("CONFIRM.", ConfirmationReply::Affirmative),
            ("sure?", ConfirmationReply::Affirmative),
            ("no", ConfirmationReply::Negative),
            ("Cancel!", ConfirmationReply::Negative),
            ("nope", ConfirmationReply::Negative),
            ("no email", ConfirmationReply::Other),
            ("yes please move it to 3pm", ConfirmationReply::Other),
            ("yeah", ConfirmationReply::Other),
            ("", ConfirmationReply::Other),
        ];

        for (text, expected) in cases {
            assert_eq!(classify_reply(text), expected, "{text:?}");
        }
    }

    #[test]
    fn affirmative_reply_authorizes_the_pending_proposal() {
        let mut gate = ConfirmationGate::default();
        gate.arm(Proposal::SendEmail(email()));

        let authorized = match gate.resolve("yes") {
            GateResolution::Execute(authorized) => authorized,
            other => panic!("expected execution, got {other:?}"),
        };
        assert_eq!(authorized.proposal(), &Proposal::SendEmail(email()));
        assert!(!authorized.is_automatic());
        assert!(!gate.is_awaiting());
    }

    #[test]
    fn negative_and_other_replies_discard_the_proposal() {
        let mut gate = ConfirmationGate::default();
        gate.arm(Proposal::SendEmail(email()));
        assert!(matches!(gate.resolve("nope"), GateResolution::Declined { .. }));
        assert!(!gate.is_awaiting());

        gate.arm(Proposal::SendEmail(email()));
        assert!(matches!(gate.resolve("actually make it friday"), GateResolution::Abandoned { .. }));
        assert!(!gate.is_awaiting());

        assert_eq!(gate.resolve("yes"), GateResolution::NotAwaiting);
    }

    #[test]
    fn policy_emitted_mutation_is_a_violation() {
        let violation = ConfirmationGate::reject_unconfirmed(&Action::SendEmail(email()));

        assert_eq!(violation.kind, ActionKind::SendEmail);
        assert_eq!(violation.reason, "no proposal awaiting confirmation");
    }

    #[test]
    fn gate_is_idle_whenever_the_policy_runs() {
        let mut gate = ConfirmationGate::default();

        for reply in ["yes", "no", "make it 3pm instead"] {
            gate.arm(Proposal::SendEmail(email()));
            assert_ne!(gate.resolve(reply), GateResolution::NotAwaiting, "{reply}");
            assert!(!gate.is_awaiting(), "{reply}");
        }
    }

    #[test]
    fn automatic_notification_is_marked() {
        let authorized = ConfirmationGate::automatic_notification(email());
        assert!(authorized.is_automatic());
    }
}
