//! Per-identity registration state and transcript types.

use std::fmt;

// ---------------------------------------------------------------------------
// IdentityState
// ---------------------------------------------------------------------------

/// Where an identity is in the registration flow.
///
/// Identities the broker has never accepted a password from have no entry
/// at all; that absence is the `Unauthenticated` stage. Everything else is
/// one of these two variants, so an identity can never be both pending and
/// registered.
///
/// ```text
///   (absent) ──password──→ PendingName ──name chosen──→ Registered
///       └──────────────password (name known)──────────────↑
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// Password accepted, no display name yet. `awaiting_text` is set once
    /// the identity asked to type a custom name.
    PendingName { awaiting_text: bool },

    /// Fully registered. Permanent for the life of the process.
    Registered(Registration),
}

impl IdentityState {
    /// The coarse stage this state belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::PendingName { .. } => Stage::PendingName,
            Self::Registered(_) => Stage::Registered,
        }
    }
}

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The name shown to the mentor.
    pub name: String,

    /// Monotonic registration counter. Lower means registered earlier;
    /// `mentor_connect` uses it to pick someone when the waitlist is empty.
    pub order: u64,
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The three registration stages, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Unauthenticated,
    PendingName,
    Registered,
}

impl Stage {
    /// Returns `true` if moving from `self` to `target` never goes
    /// backwards. Staying put counts; so does skipping `PendingName`.
    pub fn can_advance_to(self, target: Self) -> bool {
        target >= self
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::PendingName => write!(f, "PendingName"),
            Self::Registered => write!(f, "Registered"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Participant,
    Mentor,
}

/// One line of a participant's conversation with the mentor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.speaker {
            Speaker::Participant => "👤 Participant",
            Speaker::Mentor => "👨‍🏫 Mentor",
        };
        write!(f, "{tag}: {}", self.text)
    }
}
