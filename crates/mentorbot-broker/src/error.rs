//! Rejections: every way a broker entry point can refuse a request.

use mentorbot_protocol::Button;

/// Why an entry point refused to act.
///
/// Every rejection is recoverable and leaves broker state untouched. The
/// `Display` text is exactly what the requester is shown, and
/// [`buttons`](Self::buttons) is the keyboard that goes with it, so the
/// dispatcher can turn any rejection into a notice without knowing which
/// one it got.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    // -- Registration --
    /// The submitted password doesn't match the shared secret.
    #[error("❌ Wrong password! Access denied.")]
    WrongPassword,

    /// The identity is already registered.
    #[error("✅ You are already registered. To call the mentor, press the button below.")]
    AlreadyRegistered,

    /// The identity still has to pick how to sign in (or typed text
    /// before picking "enter a name").
    #[error("Your name is not set. Choose how to sign in:")]
    NameChoicePending,

    /// The custom name was blank.
    #[error("The name can't be empty. Please enter your name:")]
    EmptyName,

    /// The identity must register before doing this.
    #[error("🔑 Please enter the access password first.")]
    NotRegistered,

    // -- Pairing & queue --
    /// The mentor tried to call themselves.
    #[error("You are the mentor. Use Join or /join to connect to a participant.")]
    MentorCannotCall,

    /// The requester is the participant already talking to the mentor.
    #[error("You are already connected to the mentor.")]
    AlreadyPaired,

    /// The requester is already on the waitlist.
    #[error("You are already in the queue for the mentor.")]
    AlreadyQueued,

    /// A mentor-only action from someone else.
    #[error("❌ You don't have mentor rights!")]
    NotMentor,

    /// `mentor_connect` while a chat is running.
    #[error("❌ End the current chat before connecting a new participant.")]
    SessionActive,

    /// `mentor_connect` with nobody to connect to.
    #[error("🟢 No participants are waiting. Wait for a request.")]
    NobodyWaiting,

    /// `mentor_end` with no chat running.
    #[error("❌ There is no active chat to end.")]
    NoActiveSession,

    /// A participant wrote while not connected to the mentor.
    #[error("❌ Please wait for the mentor to connect.")]
    NotConnected,

    /// The mentor wrote while not connected to anyone.
    #[error("❌ No active participant.")]
    NoActiveParticipant,
}

impl Rejection {
    /// The keyboard to show alongside the notice.
    pub fn buttons(&self) -> Vec<Button> {
        match self {
            Self::AlreadyRegistered | Self::NotConnected => {
                vec![Button::CallMentor]
            }
            Self::NameChoicePending => {
                vec![Button::UseAnonymous, Button::EnterCustomName]
            }
            Self::NotRegistered => vec![Button::EnterSchool],
            _ => Vec::new(),
        }
    }
}
