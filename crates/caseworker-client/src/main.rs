use anyhow::Result;
use caseworker_client::{
    CannedResponder, ChatBackend, ChatSession, Conversation, RelayClient, Role, TurnState,
};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "caseworker-chat")]
#[command(
    version,
    about = "Chat with the caseworker assistant from a terminal",
    after_help = "Type a message and press Enter. Ctrl-C interrupts a reply; /quit or Ctrl-D exits."
)]
struct Cli {
    /// Relay endpoint that streams replies
    #[arg(
        long,
        env = "CASEWORKER_URL",
        default_value = "http://localhost:3000/chat-stream"
    )]
    url: String,

    /// Answer with canned replies instead of calling the relay
    #[arg(long)]
    offline: bool,

    /// Simulated thinking time for offline replies, in milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging();

    let backend: Arc<dyn ChatBackend> = if cli.offline {
        Arc::new(CannedResponder::new(Duration::from_millis(cli.delay_ms)))
    } else {
        Arc::new(RelayClient::new(&cli.url)?)
    };
    tracing::info!(offline = cli.offline, url = %cli.url, "chat session started");

    let mut session = ChatSession::new(backend);
    let mut renderer = TerminalRenderer::default();
    renderer.render(session.conversation());
    prompt();

    let mut lines = spawn_line_reader();
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let text = line.trim();
        if text == "/quit" {
            break;
        }
        if text.is_empty() {
            prompt();
            continue;
        }

        let cancel = CancellationToken::new();
        let state = {
            let send = session.send(text, cancel.clone(), |conversation| {
                renderer.render(conversation)
            });
            tokio::pin!(send);
            loop {
                tokio::select! {
                    result = &mut send => break result?,
                    Some(ignored) = lines.recv() => {
                        tracing::debug!(input = %ignored, "input ignored while answering");
                    }
                    _ = tokio::signal::ctrl_c() => cancel.cancel(),
                }
            }
        };

        for notification in session.conversation_mut().take_notifications() {
            println!("\n[{}] {}", notification.title, notification.description);
        }
        if state == TurnState::Cancelled {
            println!("\n(interrupted)");
        }
        println!();
        prompt();
    }

    Ok(())
}

/// Prints each assistant message once, appending only the new text as the
/// streamed content grows.
#[derive(Default)]
struct TerminalRenderer {
    message_id: Option<String>,
    printed: String,
}

impl TerminalRenderer {
    fn render(&mut self, conversation: &Conversation) {
        let Some(message) = conversation.messages().last() else {
            return;
        };
        if message.role == Role::User {
            return;
        }

        let mut out = io::stdout().lock();
        if self.message_id.as_deref() != Some(message.id.as_str()) {
            self.message_id = Some(message.id.clone());
            self.printed.clear();
            let label = match message.role {
                Role::Thinking => "assistant (thinking...)",
                _ => "assistant:",
            };
            let _ = write!(out, "\n{} ", label);
        }

        if message.role == Role::Assistant {
            match message.content.strip_prefix(self.printed.as_str()) {
                Some(delta) => {
                    let _ = write!(out, "{}", delta);
                }
                None => {
                    let _ = write!(out, "\n{}", message.content);
                }
            }
            self.printed.clone_from(&message.content);
        }
        let _ = out.flush();
    }
}

fn prompt() {
    let mut out = io::stdout().lock();
    let _ = write!(out, "\n> ");
    let _ = out.flush();
}

/// Stdin is read on a plain thread so a pending read never holds up exit.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Log to a daily file so tracing output never interleaves with the chat.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("caseworker")
        .join("logs");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "caseworker-chat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,caseworker_client=debug".into()),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Some(guard)
}

