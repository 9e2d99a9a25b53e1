//! Domain types shared by the broker and the gateway.
//!
//! These describe *what happened* (an [`InboundEvent`]) and *what should
//! be said to whom* (an [`Outbound`] directive). They carry no transport
//! details: the same types would work behind a chat-platform bridge, a
//! WebSocket gateway, or a unit test.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An opaque identifier for anyone talking to the bot, mentor or
/// participant alike.
///
/// A newtype over `u64` so an identity can't be confused with a
/// registration order, a connection id, or any other number floating
/// around the gateway. `#[serde(transparent)]` keeps it a plain number on
/// the wire: `Identity(42)` serializes as `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Every button the bot can offer.
///
/// A closed set: the broker attaches these to directives and the client
/// sends one back when pressed. The wire form is the snake_case variant
/// name (`"call_mentor"`), which doubles as the callback id a chat-platform
/// bridge would use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Start the password flow.
    EnterSchool,
    /// A registered participant asks for the mentor.
    CallMentor,
    /// Finish registration under the anonymous label.
    UseAnonymous,
    /// Finish registration by typing a name.
    EnterCustomName,
    /// Mentor menu: connect to the next participant.
    MentorJoin,
    /// Mentor menu: end the current chat.
    MentorEnd,
}

impl Button {
    /// The caption a client should render for this button.
    pub fn label(self) -> &'static str {
        match self {
            Self::EnterSchool => "Enter",
            Self::CallMentor => "Call mentor",
            Self::UseAnonymous => "Sign in anonymously",
            Self::EnterCustomName => "Enter a name",
            Self::MentorJoin => "Join",
            Self::MentorEnd => "End chat",
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A slash command, e.g. `/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `/start` — show the welcome message and the right menu.
    Start,
    /// `/join` — mentor connects to the next participant.
    Join,
    /// `/end` — mentor ends the current chat.
    End,
    /// Anything else. Keeps the name so the reply can quote it.
    Other(String),
}

impl Command {
    /// Parses `text` as a command if it starts with `/`.
    ///
    /// Arguments after the first whitespace are ignored, and so is a
    /// `@botname` suffix (`/join@mentor_bot` is `/join`). Matching is
    /// case-insensitive.
    ///
    /// ```rust
    /// use mentorbot_protocol::Command;
    ///
    /// assert_eq!(Command::parse("/join"), Some(Command::Join));
    /// assert_eq!(Command::parse("/End@mentor_bot now"), Some(Command::End));
    /// assert_eq!(Command::parse("hello"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let word = rest.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("").to_ascii_lowercase();
        Some(match name.as_str() {
            "start" => Self::Start,
            "join" => Self::Join,
            "end" => Self::End,
            _ => Self::Other(name),
        })
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// What kind of input an event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A slash command.
    Command(Command),
    /// A button press.
    Press(Button),
    /// Free text: a password, a name, or a chat message, depending on
    /// who sent it and what state they're in.
    Text(String),
}

impl EventKind {
    /// Classifies raw text typed by a user.
    ///
    /// Anything that lexically looks like a command becomes
    /// [`EventKind::Command`]; this is what keeps `/end` from being relayed
    /// to a participant as a chat message.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match Command::parse(&text) {
            Some(command) => Self::Command(command),
            None => Self::Text(text),
        }
    }
}

/// One inbound event, tagged with who sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Who sent it.
    pub sender: Identity,

    /// The display name the transport knows for the sender, if any
    /// (a chat-platform username, say). Used when registering; `None`
    /// sends participants through the name-choice flow.
    pub display_name: Option<String>,

    /// What it carries.
    pub kind: EventKind,
}

impl InboundEvent {
    /// Creates an event with no transport-provided display name.
    pub fn new(sender: Identity, kind: EventKind) -> Self {
        Self {
            sender,
            display_name: None,
            kind,
        }
    }

    /// Attaches the transport-provided display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Outbound directives
// ---------------------------------------------------------------------------

/// A directive to deliver `text` (and optionally a button set) to
/// `recipient`.
///
/// The broker returns a list of these from every entry point; the gateway
/// delivers them in order. An empty `buttons` list means "no keyboard".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub recipient: Identity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Outbound {
    /// A plain text message with no buttons.
    pub fn notice(recipient: Identity, text: impl Into<String>) -> Self {
        Self {
            recipient,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Attaches a button set.
    pub fn with_buttons(
        mut self,
        buttons: impl IntoIterator<Item = Button>,
    ) -> Self {
        self.buttons = buttons.into_iter().collect();
        self
    }
}
