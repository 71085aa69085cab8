//! `huddle join`: a signaling-only participant.
//!
//! Opens the relay channel for a room without capturing media, so it can
//! watch the roster and chat alongside full clients.

use chrono::Local;
use huddle_call::{ChatLog, ChatMessage, LoginSession, RoomRoster, SignalingTransport, TransportEvent};
use huddle_common::{HuddleError, RoomId, SignalingEnvelope};
use huddle_config::HuddleConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::boot;

pub async fn run(config: &HuddleConfig, room: RoomId, name: &str) -> Result<(), HuddleError> {
    let login = LoginSession::begin(name, None);
    tracing::info!(
        participant = %login.participant_id(),
        room = %room,
        "joining room as signaling probe"
    );

    let (transport, mut events) =
        SignalingTransport::connect(boot::transport_config(config), login.identity(), room.clone());
    let mut roster = RoomRoster::new(login.participant_id().clone());
    let mut chat = ChatLog::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Opened) => {
                    println!("* connected to room {room} as {}", login.participant_id());
                }
                Some(TransportEvent::Message(envelope)) => {
                    let known = roster.members();
                    let update = roster.apply(&envelope);
                    for id in &update.added {
                        println!("* {id} joined ({} here)", roster.len());
                    }
                    for id in update.removed.iter().filter(|id| known.contains(id)) {
                        println!("* {id} left ({} here)", roster.len());
                    }
                    if let Some(message) = ChatMessage::from_envelope(&envelope) {
                        print_chat(&message);
                        chat.push(message);
                    }
                }
                Some(TransportEvent::Disconnected { reason }) => {
                    println!("* disconnected: {reason}");
                }
                Some(TransportEvent::Reconnecting { attempt, delay }) => {
                    println!("* reconnecting (attempt {attempt}) in {}ms", delay.as_millis());
                }
                Some(TransportEvent::Failed(e)) => break Err(HuddleError::from(e)),
                Some(TransportEvent::Closed) | None => break Ok(()),
            },

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "" => {}
                    "/quit" => break Ok(()),
                    "/who" => {
                        let members = roster.members();
                        if members.is_empty() {
                            println!("* nobody else is here");
                        }
                        for id in members {
                            println!("* {id}");
                        }
                    }
                    "/history" => {
                        for message in chat.recent(20) {
                            print_chat(&message);
                        }
                    }
                    text => {
                        let message = ChatMessage::outgoing(room.clone(), text);
                        if transport.send(message.to_envelope()) {
                            chat.push(message);
                        } else {
                            println!("* not connected, message dropped");
                        }
                    }
                },
                Ok(None) => stdin_open = false,
                Err(e) => break Err(HuddleError::Io(e)),
            },

            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    transport.send(SignalingEnvelope::LeaveRoom {
        room_id: room.clone(),
    });
    transport.close().await;
    login.end();
    outcome
}

fn print_chat(message: &ChatMessage) {
    let time = message
        .sent_at()
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into());
    let from = message
        .from
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "me".into());
    println!("[{time}] {from}: {}", message.text);
}
