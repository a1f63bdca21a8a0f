//! Hearth - terminal front end for the chat service
//!
//! Reads lines from stdin; slash commands manage sessions, anything else is
//! sent as a message.

use hearth_chat::model::unescape_html;
use hearth_chat::{
    ChatError, ClientConfig, ConversationController, HttpTransport, LoggingTransport, Message,
    MessageStatus, Renderer, SendOutcome, Sender, Session, SessionId,
};
use std::io::Write;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /sessions          list sessions
  /new               start a new session
  /switch <id>       switch to a session
  /delete <id>       delete a session
  /delete-all        delete every session
  /clear             clear the current session's history
  /status            check whether the model is loaded
  /quit              exit
Anything else is sent as a message.";

/// Prints the conversation incrementally to stdout
#[derive(Default)]
struct TerminalRenderer {
    shown: Mutex<Vec<Message>>,
}

impl TerminalRenderer {
    fn print_message(out: &mut impl Write, message: &Message) {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "bot",
            Sender::System => "!!",
        };
        let _ = writeln!(out, "{who}> {}", unescape_html(&message.text));
    }
}

impl Renderer for TerminalRenderer {
    fn on_sessions_changed(&self, _sessions: &[Session]) {}

    fn on_messages_changed(&self, messages: &[Message]) {
        let mut shown = self.shown.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = std::io::stdout().lock();

        let common = shown
            .iter()
            .zip(messages)
            .take_while(|(a, b)| a.local_ref == b.local_ref)
            .count();
        if common < shown.len() {
            let _ = writeln!(out, "--- conversation reloaded ---");
            for message in messages {
                Self::print_message(&mut out, message);
            }
        } else {
            for (before, now) in shown.iter().zip(messages) {
                if before.status != now.status && now.status == MessageStatus::Failed {
                    let _ = writeln!(out, "   (not delivered)");
                }
            }
            for message in &messages[common..] {
                Self::print_message(&mut out, message);
            }
        }
        *shown = messages.to_vec();
    }

    fn on_error(&self, error: &ChatError) {
        eprintln!("error: {error}");
    }
}

fn print_sessions(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("(no sessions)");
    }
    for session in sessions {
        let marker = if session.is_current { '*' } else { ' ' };
        println!(
            "{marker} {}  {}  {}",
            session.session_id, session.display_name, session.last_message_preview
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(base_url = %config.base_url, "Connecting to chat service");

    let transport = LoggingTransport::new(HttpTransport::new(&config)?);
    let controller = ConversationController::new(transport, TerminalRenderer::default());

    // Failures are already reported through the renderer
    let _ = controller.load().await;
    print_sessions(&controller.sessions());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/sessions" => print_sessions(&controller.sessions()),
            "/new" => {
                if controller.create_session().await.is_ok() {
                    print_sessions(&controller.sessions());
                }
            }
            "/switch" | "/delete" if arg.is_empty() => println!("usage: {command} <id>"),
            "/switch" => {
                let _ = controller.switch_session(SessionId::new(arg)).await;
            }
            "/delete" => {
                if controller.delete_session(SessionId::new(arg)).await.is_ok() {
                    print_sessions(&controller.sessions());
                }
            }
            "/delete-all" => {
                if controller.delete_all_sessions().await.is_ok() {
                    print_sessions(&controller.sessions());
                }
            }
            "/clear" => {
                let _ = controller.clear_history().await;
            }
            "/status" => {
                if let Ok(status) = controller.check_status().await {
                    println!(
                        "model {}",
                        if status.model_loaded { "loaded" } else { "not loaded" }
                    );
                }
            }
            _ => match controller.send_message(line).await {
                Ok(SendOutcome::Ignored) => println!("(busy, message not sent)"),
                Ok(_) => {}
                Err(e) => println!("{e}"),
            },
        }
    }

    tracing::info!("Exiting");
    Ok(())
}
