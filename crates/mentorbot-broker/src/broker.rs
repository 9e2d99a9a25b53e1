//! The broker: registry, pairing, waitlist, and transcripts.
//!
//! # Concurrency note
//!
//! `Broker` is a plain struct with `&mut self` entry points. It does no
//! I/O and never awaits, so serializing access (the gateway keeps it
//! behind one `tokio::sync::Mutex`) is enough to keep every invariant:
//! two `mentor_connect` calls can't both win because they can't overlap.

use std::collections::{HashMap, VecDeque};

use mentorbot_protocol::{Button, Identity, Outbound};
use serde::Serialize;

use crate::{
    BrokerConfig, IdentityState, Registration, Rejection, Speaker, Stage,
    TranscriptLine,
};

/// Result of a broker entry point: directives to deliver, or why nothing
/// happened.
type Reply = Result<Vec<Outbound>, Rejection>;

/// Counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Registered identities, the mentor included once registered.
    pub registered: usize,
    /// Identities that passed the password but haven't picked a name.
    pub pending: usize,
    /// Waitlist length.
    pub waiting: usize,
    /// Whether the mentor is in a chat right now.
    pub session_active: bool,
}

/// Owns all mentor/participant state.
///
/// ## Lifecycle
///
/// ```text
///                 request_mentor (busy) ──→ waitlist (FIFO)
///                                              │
///   Idle ──mentor_connect (waitlist head, or first registered)──→ Active
///    ↑                                                              │
///    └───────────────────────── mentor_end ─────────────────────────┘
/// ```
///
/// The active pairing is stored as the single paired participant; the
/// mentor side is implied. That makes "at most one pairing" and "the two
/// directions agree" true by construction instead of by bookkeeping.
#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,

    /// Everyone who got past the password. Absent means unauthenticated.
    identities: HashMap<Identity, IdentityState>,

    /// Next value for [`Registration::order`].
    next_order: u64,

    /// The participant currently talking to the mentor.
    paired: Option<Identity>,

    /// Participants who called while the mentor was busy, oldest first.
    waitlist: VecDeque<Identity>,

    /// Per-identity transcript of the current (or last) chat.
    histories: HashMap<Identity, Vec<TranscriptLine>>,
}

impl Broker {
    /// Creates an empty broker. Call [`BrokerConfig::validate`] first;
    /// the broker trusts its config.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            identities: HashMap::new(),
            next_order: 0,
            paired: None,
            waitlist: VecDeque::new(),
            histories: HashMap::new(),
        }
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn mentor(&self) -> Identity {
        self.config.mentor
    }

    pub fn is_mentor(&self, identity: Identity) -> bool {
        identity == self.config.mentor
    }

    /// The identity's registration state, `None` if unauthenticated.
    pub fn state(&self, identity: Identity) -> Option<&IdentityState> {
        self.identities.get(&identity)
    }

    /// The identity's registration stage.
    pub fn stage(&self, identity: Identity) -> Stage {
        self.identities
            .get(&identity)
            .map_or(Stage::Unauthenticated, IdentityState::stage)
    }

    pub fn is_registered(&self, identity: Identity) -> bool {
        self.stage(identity) == Stage::Registered
    }

    /// The registered display name, if any.
    pub fn display_name(&self, identity: Identity) -> Option<&str> {
        match self.identities.get(&identity) {
            Some(IdentityState::Registered(reg)) => Some(reg.name.as_str()),
            _ => None,
        }
    }

    /// The active pairing as `(mentor, participant)`.
    pub fn pairing(&self) -> Option<(Identity, Identity)> {
        self.paired.map(|p| (self.config.mentor, p))
    }

    /// Who `identity` is talking to, in either direction.
    pub fn partner_of(&self, identity: Identity) -> Option<Identity> {
        let participant = self.paired?;
        if identity == self.config.mentor {
            Some(participant)
        } else if identity == participant {
            Some(self.config.mentor)
        } else {
            None
        }
    }

    /// The waitlist, head first.
    pub fn waitlist(&self) -> &VecDeque<Identity> {
        &self.waitlist
    }

    /// The identity's transcript, `None` if it never registered.
    pub fn history(&self, identity: Identity) -> Option<&[TranscriptLine]> {
        self.histories.get(&identity).map(Vec::as_slice)
    }

    pub fn stats(&self) -> BrokerStats {
        let (registered, pending) = self.identities.values().fold(
            (0, 0),
            |(r, p), state| match state.stage() {
                Stage::Registered => (r + 1, p),
                _ => (r, p + 1),
            },
        );
        BrokerStats {
            registered,
            pending,
            waiting: self.waitlist.len(),
            session_active: self.paired.is_some(),
        }
    }

    // =====================================================================
    // Registration
    // =====================================================================

    /// Checks a password and starts (or completes) registration.
    ///
    /// `display_name` is the name the transport knows for the sender. The
    /// mentor always registers straight away (falling back to the
    /// configured mentor name); a participant without a name is moved to
    /// `PendingName` and offered the anonymous/custom choice.
    pub fn submit_password(
        &mut self,
        identity: Identity,
        display_name: Option<&str>,
        text: &str,
    ) -> Reply {
        match self.identities.get(&identity) {
            Some(IdentityState::Registered(_)) => {
                return Err(Rejection::AlreadyRegistered);
            }
            Some(IdentityState::PendingName { .. }) => {
                return Err(Rejection::NameChoicePending);
            }
            None => {}
        }

        if text != self.config.access_secret {
            tracing::debug!(%identity, "wrong password");
            return Err(Rejection::WrongPassword);
        }

        let known_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty());

        if self.is_mentor(identity) {
            let name = known_name
                .unwrap_or(&self.config.mentor_fallback_name)
                .to_string();
            self.register(identity, name);
            return Ok(vec![
                Outbound::notice(
                    identity,
                    "✅ Correct password! Welcome, mentor!",
                )
                .with_buttons([Button::MentorJoin, Button::MentorEnd]),
            ]);
        }

        match known_name {
            Some(name) => {
                let name = name.to_string();
                self.register(identity, name);
                Ok(vec![
                    Outbound::notice(
                        identity,
                        "✅ Correct password! You are registered.",
                    )
                    .with_buttons([Button::CallMentor]),
                ])
            }
            None => {
                self.identities.insert(
                    identity,
                    IdentityState::PendingName {
                        awaiting_text: false,
                    },
                );
                tracing::info!(%identity, "password accepted, name pending");
                Ok(vec![
                    Outbound::notice(
                        identity,
                        "✅ Correct password! But your name is not set. \
                         Choose how to sign in:",
                    )
                    .with_buttons([
                        Button::UseAnonymous,
                        Button::EnterCustomName,
                    ]),
                ])
            }
        }
    }

    /// Finishes registration under the anonymous label.
    pub fn choose_anonymous(&mut self, identity: Identity) -> Reply {
        self.require_pending(identity)?;
        let label = self.config.anonymous_label.clone();
        self.register(identity, label.clone());
        Ok(vec![signed_in(identity, &label)])
    }

    /// Switches a pending identity to typing its own name.
    pub fn begin_custom_name(&mut self, identity: Identity) -> Reply {
        self.require_pending(identity)?;
        self.identities.insert(
            identity,
            IdentityState::PendingName {
                awaiting_text: true,
            },
        );
        Ok(vec![Outbound::notice(identity, "Please enter your name:")])
    }

    /// Finishes registration with a typed name.
    ///
    /// Surrounding whitespace is trimmed; a blank name is refused and the
    /// identity stays where it was, still awaiting input.
    pub fn submit_custom_name(
        &mut self,
        identity: Identity,
        text: &str,
    ) -> Reply {
        match self.identities.get(&identity) {
            Some(IdentityState::PendingName {
                awaiting_text: true,
            }) => {}
            Some(IdentityState::PendingName {
                awaiting_text: false,
            }) => return Err(Rejection::NameChoicePending),
            Some(IdentityState::Registered(_)) => {
                return Err(Rejection::AlreadyRegistered);
            }
            None => return Err(Rejection::NotRegistered),
        }

        let name = text.trim();
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        let name = name.to_string();
        self.register(identity, name.clone());
        Ok(vec![signed_in(identity, &name)])
    }

    // =====================================================================
    // Pairing & queue
    // =====================================================================

    /// A registered participant asks for the mentor.
    ///
    /// Never forms a pairing. While idle the mentor is just notified; while
    /// busy the requester joins the back of the waitlist (once).
    pub fn request_mentor(&mut self, identity: Identity) -> Reply {
        if self.is_mentor(identity) {
            return Err(Rejection::MentorCannotCall);
        }
        match self.stage(identity) {
            Stage::Unauthenticated => return Err(Rejection::NotRegistered),
            Stage::PendingName => return Err(Rejection::NameChoicePending),
            Stage::Registered => {}
        }

        let mentor = self.config.mentor;
        let label = format!("{} ({identity})", self.name_of(identity));

        match self.paired {
            Some(current) if current == identity => {
                Err(Rejection::AlreadyPaired)
            }
            Some(_) => {
                if self.waitlist.contains(&identity) {
                    return Err(Rejection::AlreadyQueued);
                }
                self.waitlist.push_back(identity);
                tracing::info!(
                    %identity,
                    position = self.waitlist.len(),
                    "participant queued"
                );
                Ok(vec![
                    Outbound::notice(
                        mentor,
                        format!(
                            "⚡ Participant {label} has been added to the \
                             waitlist. Use Join or /join after ending the \
                             current chat."
                        ),
                    ),
                    Outbound::notice(
                        identity,
                        "You have been added to the queue! Wait for the \
                         mentor to connect.",
                    ),
                ])
            }
            None => {
                tracing::info!(%identity, "participant is calling the mentor");
                Ok(vec![
                    Outbound::notice(
                        mentor,
                        format!(
                            "⚡ Participant {label} is calling you! Use Join \
                             or /join."
                        ),
                    )
                    .with_buttons([Button::MentorJoin]),
                    Outbound::notice(
                        identity,
                        "Request sent! Wait for the mentor to connect.",
                    ),
                ])
            }
        }
    }

    /// The mentor connects to the next participant.
    ///
    /// Takes the waitlist head; if the waitlist is empty, the registered
    /// participant who registered first.
    pub fn mentor_connect(&mut self, caller: Identity) -> Reply {
        self.require_signed_in_mentor(caller)?;
        if self.paired.is_some() {
            return Err(Rejection::SessionActive);
        }

        let participant = match self.waitlist.pop_front() {
            Some(next) => next,
            None => self
                .first_registered_candidate()
                .ok_or(Rejection::NobodyWaiting)?,
        };

        self.paired = Some(participant);
        tracing::info!(%participant, "mentor connected");

        Ok(vec![
            Outbound::notice(
                caller,
                format!(
                    "📩 You are connected to participant {}.",
                    self.name_of(participant)
                ),
            )
            .with_buttons([Button::MentorEnd]),
            Outbound::notice(
                participant,
                "👨‍🏫 The mentor has joined the chat and is ready to help!",
            ),
        ])
    }

    /// The mentor ends the current chat.
    ///
    /// Clears the participant's transcript. If someone is waiting the
    /// mentor is told who, but the next chat only starts on the next
    /// `mentor_connect`.
    pub fn mentor_end(&mut self, caller: Identity) -> Reply {
        self.require_signed_in_mentor(caller)?;
        let participant = self.paired.take().ok_or(Rejection::NoActiveSession)?;

        if let Some(history) = self.histories.get_mut(&participant) {
            for line in history.iter() {
                tracing::debug!(%participant, %line, "transcript");
            }
            tracing::info!(%participant, lines = history.len(), "chat ended");
            history.clear();
        }

        let mut out = vec![
            Outbound::notice(
                participant,
                "📌 The mentor has ended the chat. To call the mentor \
                 again, press the button below.",
            )
            .with_buttons([Button::CallMentor]),
            Outbound::notice(caller, "✅ Chat ended."),
        ];

        if let Some(&next) = self.waitlist.front() {
            out.push(
                Outbound::notice(
                    caller,
                    format!(
                        "⚡ The next participant ({}) is waiting to connect. \
                         Use Join or /join.",
                        self.name_of(next)
                    ),
                )
                .with_buttons([Button::MentorJoin]),
            );
        }
        Ok(out)
    }

    // =====================================================================
    // Relay
    // =====================================================================

    /// Forwards a participant's message to the mentor.
    pub fn relay_to_mentor(&mut self, identity: Identity, text: &str) -> Reply {
        if self.paired != Some(identity) {
            return Err(Rejection::NotConnected);
        }
        self.histories
            .entry(identity)
            .or_default()
            .push(TranscriptLine {
                speaker: Speaker::Participant,
                text: text.to_string(),
            });
        Ok(vec![Outbound::notice(
            self.config.mentor,
            format!("📩 Message from {}:\n{text}", self.name_of(identity)),
        )])
    }

    /// Forwards the mentor's message to the paired participant.
    pub fn relay_to_participant(&mut self, caller: Identity, text: &str) -> Reply {
        self.require_signed_in_mentor(caller)?;
        let participant = self.paired.ok_or(Rejection::NoActiveParticipant)?;
        self.histories
            .entry(participant)
            .or_default()
            .push(TranscriptLine {
                speaker: Speaker::Mentor,
                text: text.to_string(),
            });
        Ok(vec![Outbound::notice(
            participant,
            format!("💬 Reply from the mentor:\n{text}"),
        )])
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Registers `identity` under `name` and starts an empty transcript.
    fn register(&mut self, identity: Identity, name: String) {
        let order = self.next_order;
        self.next_order += 1;
        tracing::info!(%identity, %name, order, "identity registered");
        self.identities
            .insert(identity, IdentityState::Registered(Registration { name, order }));
        self.histories.insert(identity, Vec::new());
    }

    fn require_pending(&self, identity: Identity) -> Result<(), Rejection> {
        match self.identities.get(&identity) {
            Some(IdentityState::PendingName { .. }) => Ok(()),
            Some(IdentityState::Registered(_)) => {
                Err(Rejection::AlreadyRegistered)
            }
            None => Err(Rejection::NotRegistered),
        }
    }

    /// Mentor-only actions need the mentor identity and a completed
    /// password step.
    fn require_signed_in_mentor(&self, caller: Identity) -> Result<(), Rejection> {
        if !self.is_mentor(caller) {
            return Err(Rejection::NotMentor);
        }
        if !self.is_registered(caller) {
            tracing::warn!(%caller, "mentor action before password");
            return Err(Rejection::NotRegistered);
        }
        Ok(())
    }

    /// The earliest-registered participant who isn't paired.
    fn first_registered_candidate(&self) -> Option<Identity> {
        self.identities
            .iter()
            .filter_map(|(&id, state)| match state {
                IdentityState::Registered(reg) => Some((id, reg.order)),
                IdentityState::PendingName { .. } => None,
            })
            .filter(|&(id, _)| {
                id != self.config.mentor && Some(id) != self.paired
            })
            .min_by_key(|&(_, order)| order)
            .map(|(id, _)| id)
    }

    fn name_of(&self, identity: Identity) -> &str {
        self.display_name(identity)
            .unwrap_or(&self.config.unknown_name)
    }
}

fn signed_in(identity: Identity, name: &str) -> Outbound {
    Outbound::notice(identity, format!("✅ You have signed in as {name}."))
        .with_buttons([Button::CallMentor])
}

// =========================================================================
// Tests
// =========================================================================
