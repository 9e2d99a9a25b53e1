//! Event dispatch: one inbound event in, one broker entry point called.

use mentorbot_protocol::{
    Button, Command, EventKind, Identity, InboundEvent, Outbound,
};

use crate::{Broker, IdentityState, Rejection};

type Reply = Result<Vec<Outbound>, Rejection>;

/// Routes `event` to the matching [`Broker`] entry point and returns what
/// to deliver.
///
/// Buttons and slash commands call the same entry points; a [`Rejection`]
/// becomes a notice (with its keyboard) for the sender. Free text means
/// different things depending on who sent it and where they are in
/// registration: a password, a name, or a chat message.
pub fn dispatch(broker: &mut Broker, event: InboundEvent) -> Vec<Outbound> {
    let sender = event.sender;
    let result = match event.kind {
        EventKind::Command(command) => on_command(broker, sender, command),
        EventKind::Press(button) => on_press(broker, sender, button),
        EventKind::Text(text) => {
            on_text(broker, sender, event.display_name.as_deref(), &text)
        }
    };

    result.unwrap_or_else(|rejection| {
        tracing::debug!(%sender, %rejection, "request rejected");
        let buttons = rejection.buttons();
        vec![Outbound::notice(sender, rejection.to_string()).with_buttons(buttons)]
    })
}

fn on_command(broker: &mut Broker, sender: Identity, command: Command) -> Reply {
    match command {
        Command::Start => Ok(vec![welcome(broker, sender)]),
        Command::Join => broker.mentor_connect(sender),
        Command::End => broker.mentor_end(sender),
        Command::Other(name) => Ok(vec![Outbound::notice(
            sender,
            format!("Unknown command /{name}."),
        )]),
    }
}

fn on_press(broker: &mut Broker, sender: Identity, button: Button) -> Reply {
    match button {
        Button::EnterSchool => Ok(vec![Outbound::notice(
            sender,
            "🔑 Please enter the access password.",
        )]),
        Button::CallMentor => broker.request_mentor(sender),
        Button::UseAnonymous => broker.choose_anonymous(sender),
        Button::EnterCustomName => broker.begin_custom_name(sender),
        Button::MentorJoin => broker.mentor_connect(sender),
        Button::MentorEnd => broker.mentor_end(sender),
    }
}

fn on_text(
    broker: &mut Broker,
    sender: Identity,
    display_name: Option<&str>,
    text: &str,
) -> Reply {
    if broker.is_mentor(sender) {
        if broker.state(sender).is_none() {
            return broker.submit_password(sender, display_name, text);
        }
        return broker.relay_to_participant(sender, text);
    }

    match broker.state(sender) {
        None => broker.submit_password(sender, display_name, text),
        Some(IdentityState::PendingName {
            awaiting_text: true,
        }) => broker.submit_custom_name(sender, text),
        Some(IdentityState::PendingName {
            awaiting_text: false,
        }) => Err(Rejection::NameChoicePending),
        Some(IdentityState::Registered(_)) => {
            broker.relay_to_mentor(sender, text)
        }
    }
}

/// The `/start` greeting, tailored to who is asking.
fn welcome(broker: &Broker, sender: Identity) -> Outbound {
    if broker.is_mentor(sender) && broker.is_registered(sender) {
        Outbound::notice(
            sender,
            "👋 Welcome, mentor! Choose an action (the /join and /end \
             commands work too):",
        )
        .with_buttons([Button::MentorJoin, Button::MentorEnd])
    } else if broker.is_registered(sender) {
        let rejection = Rejection::AlreadyRegistered;
        Outbound::notice(sender, rejection.to_string())
            .with_buttons(rejection.buttons())
    } else {
        Outbound::notice(
            sender,
            "👋 Welcome! Press “Enter” to continue and type the access \
             password.",
        )
        .with_buttons([Button::EnterSchool])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerConfig, Stage};

    const MENTOR: Identity = Identity(1);
    const SECRET: &str = "abc123";

    fn broker() -> Broker {
        Broker::new(BrokerConfig::new(MENTOR, SECRET))
    }

    fn text(sender: u64, body: &str) -> InboundEvent {
        InboundEvent::new(Identity(sender), EventKind::from_text(body))
    }

    fn press(sender: u64, button: Button) -> InboundEvent {
        InboundEvent::new(Identity(sender), EventKind::Press(button))
    }

    // =====================================================================
    // Commands
    // =====================================================================

    #[test]
    fn test_dispatch_start_for_stranger_offers_enter() {
        let mut b = broker();

        let out = dispatch(&mut b, text(2, "/start"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].buttons, vec![Button::EnterSchool]);
    }

    /// A broker whose mentor has already typed the password.
    fn broker_with_mentor() -> Broker {
        let mut b = broker();
        dispatch(&mut b, text(1, SECRET));
        b
    }

    #[test]
    fn test_dispatch_start_for_mentor_shows_menu() {
        let mut b = broker_with_mentor();

        let out = dispatch(&mut b, text(1, "/start"));

        assert_eq!(out[0].buttons, vec![Button::MentorJoin, Button::MentorEnd]);
    }

    #[test]
    fn test_dispatch_start_for_mentor_without_password_offers_enter() {
        let mut b = broker();

        let out = dispatch(&mut b, text(1, "/start"));

        assert_eq!(out[0].buttons, vec![Button::EnterSchool]);
    }

    #[test]
    fn test_dispatch_start_for_registered_offers_call() {
        let mut b = broker();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));

        let out = dispatch(&mut b, text(2, "/start"));

        assert_eq!(out[0].text, Rejection::AlreadyRegistered.to_string());
        assert_eq!(out[0].buttons, vec![Button::CallMentor]);
    }

    #[test]
    fn test_dispatch_unknown_command_is_not_relayed() {
        let mut b = broker_with_mentor();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));
        dispatch(&mut b, text(1, "/join"));

        let out = dispatch(&mut b, text(1, "/help"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, MENTOR);
        assert_eq!(out[0].text, "Unknown command /help.");
        assert_eq!(b.history(Identity(2)), Some(&[][..]));
    }

    #[test]
    fn test_dispatch_join_command_and_button_are_equivalent() {
        let mut by_command = broker_with_mentor();
        let mut by_button = broker_with_mentor();
        for b in [&mut by_command, &mut by_button] {
            dispatch(b, text(2, SECRET).with_display_name("alice"));
        }

        let a = dispatch(&mut by_command, text(1, "/join"));
        let c = dispatch(&mut by_button, press(1, Button::MentorJoin));

        assert_eq!(a, c);
        assert_eq!(by_command.pairing(), by_button.pairing());
    }

    #[test]
    fn test_dispatch_join_before_mentor_password_is_refused() {
        let mut b = broker();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));

        let out = dispatch(&mut b, text(1, "/join"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, MENTOR);
        assert_eq!(out[0].text, Rejection::NotRegistered.to_string());
        assert!(b.pairing().is_none());
    }

    #[test]
    fn test_dispatch_end_from_participant_is_rejected() {
        let mut b = broker();

        let out = dispatch(&mut b, text(2, "/end"));

        assert_eq!(out[0].text, Rejection::NotMentor.to_string());
    }

    // =====================================================================
    // Buttons
    // =====================================================================

    #[test]
    fn test_dispatch_enter_school_prompts_for_password() {
        let mut b = broker();

        let out = dispatch(&mut b, press(2, Button::EnterSchool));

        assert_eq!(out[0].text, "🔑 Please enter the access password.");
        assert_eq!(b.stage(Identity(2)), Stage::Unauthenticated);
    }

    #[test]
    fn test_dispatch_call_mentor_unregistered_offers_enter() {
        let mut b = broker();

        let out = dispatch(&mut b, press(2, Button::CallMentor));

        assert_eq!(out[0].buttons, vec![Button::EnterSchool]);
    }

    // =====================================================================
    // Participant text
    // =====================================================================

    #[test]
    fn test_dispatch_participant_name_flow() {
        let mut b = broker();

        dispatch(&mut b, text(2, SECRET));
        assert_eq!(b.stage(Identity(2)), Stage::PendingName);

        let reprompt = dispatch(&mut b, text(2, "Bob"));
        assert_eq!(reprompt[0].text, Rejection::NameChoicePending.to_string());

        dispatch(&mut b, press(2, Button::EnterCustomName));
        dispatch(&mut b, text(2, "Bob"));
        assert_eq!(b.display_name(Identity(2)), Some("Bob"));
    }

    #[test]
    fn test_dispatch_participant_wrong_password_notice() {
        let mut b = broker();

        let out = dispatch(&mut b, text(2, "letmein"));

        assert_eq!(out[0].text, Rejection::WrongPassword.to_string());
    }

    #[test]
    fn test_dispatch_registered_participant_text_relays() {
        let mut b = broker_with_mentor();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));
        dispatch(&mut b, text(1, "/join"));

        let out = dispatch(&mut b, text(2, "hello"));

        assert_eq!(out[0].recipient, MENTOR);
        assert_eq!(out[0].text, "📩 Message from alice:\nhello");
    }

    // =====================================================================
    // Mentor text
    // =====================================================================

    #[test]
    fn test_dispatch_mentor_text_unregistered_is_password() {
        let mut b = broker();

        dispatch(&mut b, text(1, SECRET));

        assert_eq!(b.stage(MENTOR), Stage::Registered);
    }

    #[test]
    fn test_dispatch_mentor_wrong_password_is_not_relayed() {
        let mut b = broker();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));

        let out = dispatch(&mut b, text(1, "let me in"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, MENTOR);
        assert_eq!(out[0].text, Rejection::WrongPassword.to_string());
        assert_eq!(b.stage(MENTOR), Stage::Unauthenticated);
    }

    #[test]
    fn test_dispatch_mentor_text_paired_relays() {
        let mut b = broker_with_mentor();
        dispatch(&mut b, text(2, SECRET).with_display_name("alice"));
        dispatch(&mut b, text(1, "/join"));

        let out = dispatch(&mut b, text(1, SECRET));

        assert_eq!(out[0].recipient, Identity(2));
        assert_eq!(out[0].text, format!("💬 Reply from the mentor:\n{SECRET}"));
    }

    #[test]
    fn test_dispatch_mentor_text_registered_unpaired_no_participant() {
        let mut b = broker_with_mentor();

        let out = dispatch(&mut b, text(1, "anyone there?"));

        assert_eq!(out[0].text, Rejection::NoActiveParticipant.to_string());
    }
}
