use clap::Parser;
use echo_chat::dispatcher::NORMAL_CLOSURE;
use echo_chat::{ChatClientConfig, ChatMessage, ChatSession, Direction, MessageHistory};
use echo_chat::{chat_error, chat_info, chat_warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

const QUIT_COMMAND: &str = "/quit";
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "echo-chat", version, about = "Line-based WebSocket chat against an echo server")]
struct Cli {
    /// WebSocket URL, overrides the config file
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Path to a JSON config file
    #[arg(long, value_name = "FILE")]
    config: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            chat_error!("Could not start the tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    runtime.block_on(chat(cli));
    // a pending stdin read must not keep the process alive
    runtime.shutdown_timeout(Duration::from_millis(100));
}

async fn chat(cli: Cli) {
    let mut cfg = match cli.config.as_deref() {
        Some(path) => match ChatClientConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                chat_warn!("{e}; using defaults");
                ChatClientConfig::default()
            }
        },
        None => ChatClientConfig::default(),
    };
    if let Some(url) = cli.url {
        cfg = cfg.with_url(url);
    }

    let (history, feed) = MessageHistory::with_feed();
    let renderer = tokio::spawn(render(feed));

    match ChatSession::connect(&cfg, history).await {
        Ok(session) => {
            run(&session).await;
            match tokio::time::timeout(CLOSE_GRACE, session.wait_terminal()).await {
                Ok(state) => chat_info!("Session ended in state {state}"),
                Err(_) => chat_warn!("Peer did not finish the close handshake in {CLOSE_GRACE:?}"),
            }
            drop(session);
        }
        Err(e) => chat_error!("Could not connect to {}: {e}", cfg.url()),
    }

    // the renderer ends once every history handle is gone
    let _ = renderer.await;
}

async fn run(session: &ChatSession<echo_chat::ChatClient>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim() == QUIT_COMMAND => break,
                Ok(Some(line)) => {
                    if let Err(e) = session.submit(&line) {
                        eprintln!("!! {e}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    chat_error!("Reading stdin failed: {e}");
                    break;
                }
            },
            _ = session.wait_terminal() => return,
        }
    }

    if let Err(e) = session.close(NORMAL_CLOSURE, "Session ended") {
        chat_warn!("Close not queued: {e}");
    }
}

async fn render(mut feed: UnboundedReceiver<ChatMessage>) {
    while let Some(message) = feed.recv().await {
        match message.direction() {
            Direction::Sent => println!(">> {}", message.text()),
            Direction::Received => println!("<< {}", message.text()),
        }
    }
}
