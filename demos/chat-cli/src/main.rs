//! Line-oriented chat client.
//!
//! Run with: `AGRICHAT_TOKEN=... cargo run -p chat-cli-demo`
//!
//! Type a question to send it. Commands start with `/`; `/help` lists them.

use std::sync::{Arc, Mutex, PoisonError};

use agrichat_core::{SessionId, TokenCell};
use agrichat_session::{ChatClient, ChatView, ClientConfig, SendState, ViewProjector};
use agrichat_transport::{GatewayConfig, HttpGateway};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOKEN_ENV: &str = "AGRICHAT_TOKEN";

const HELP: &str = "\
/list              show sessions
/select N          open session N
/new               start an empty session
/clear             deselect; the next message starts a new session
/delete N          delete session N
/rename N TITLE    rename session N
/archive N         mark session N inactive
/use N             copy suggestion N into the composer and send it
/ask TEXT          quick question outside any session
/login TOKEN       replace the bearer token
/quit";

type Client = ChatClient<HttpGateway>;

/// Prints what changed between consecutive snapshots.
#[derive(Default)]
struct TextProjector {
    last: Mutex<ChatView>,
}

impl ViewProjector for TextProjector {
    fn project(&self, view: &ChatView) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if view.selected != last.selected
            && let Some(session) = view.selected_session()
        {
            println!("== {} ==", session.display_title("Untitled"));
        }

        let shown = if view.selected == last.selected && view.messages.starts_with(&last.messages)
        {
            last.messages.len()
        } else {
            0
        };
        for message in &view.messages[shown..] {
            println!("you> {}", message.message);
            if let Some(response) = &message.response {
                println!("bot> {response}");
            }
        }

        if view.suggestions != last.suggestions && !view.suggestions.is_empty() {
            for (n, suggestion) in view.suggestions.iter().enumerate() {
                println!("  [{}] {suggestion}", n + 1);
            }
        }

        if view.send_state != last.send_state && view.send_state == SendState::Sending {
            println!("(sending...)");
        }

        if view.notice != last.notice
            && let Some(notice) = &view.notice
        {
            println!("!! {}", notice.message);
        }

        if view.login_required && !last.login_required {
            println!("!! log in again with /login TOKEN");
        }

        *last = view.clone();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    let token = std::env::var(TOKEN_ENV).ok();
    let credentials = Arc::new(token.map_or_else(TokenCell::empty, TokenCell::new));
    let gateway = HttpGateway::new(config.clone(), credentials.clone())
        .context("failed to build HTTP client")?;
    tracing::info!(base_url = %config.base_url, "connecting to chat backend");

    let client = Arc::new(ChatClient::new(
        gateway,
        credentials.clone(),
        ClientConfig::default(),
    ));
    let projector = client.spawn_projector(TextProjector::default());

    if let Err(e) = client.bootstrap().await {
        tracing::debug!("bootstrap failed: {e}");
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Some(command) = line.strip_prefix('/') {
            run_command(&client, &credentials, command).await;
        } else {
            client.set_composer(line);
            spawn_submit(&client);
        }
    }

    projector.abort();
    Ok(())
}

/// Submit without blocking the prompt, so the user can switch sessions.
fn spawn_submit(client: &Arc<Client>) {
    let client = Arc::clone(client);
    tokio::spawn(async move {
        if let Err(e) = client.submit().await {
            tracing::debug!("submit failed: {e}");
        }
    });
}

/// Session id for a 1-based position in the list.
fn session_at(client: &Client, arg: Option<&str>) -> Option<SessionId> {
    let index = arg?.trim().parse::<usize>().ok()?.checked_sub(1)?;
    client.view().sessions.get(index).map(|s| s.id)
}

async fn run_command(client: &Arc<Client>, credentials: &TokenCell, command: &str) {
    let (name, rest) = command
        .split_once(' ')
        .map_or((command, None), |(name, rest)| (name, Some(rest)));

    let result = match name {
        "help" => {
            println!("{HELP}");
            Ok(())
        }
        "list" => {
            let view = client.view();
            if view.sessions.is_empty() {
                println!("(no sessions)");
            }
            for (n, session) in view.sessions.iter().enumerate() {
                let marker = if view.selected == Some(session.id) { '*' } else { ' ' };
                let archived = if session.is_active { "" } else { " [archived]" };
                println!(
                    "{marker}{:>3}. {} ({} messages){archived}",
                    n + 1,
                    session.display_title("Untitled"),
                    session.message_count
                );
            }
            Ok(())
        }
        "select" => match session_at(client, rest) {
            Some(id) => client.select_session(id).await.map(|_| ()),
            None => {
                println!("usage: /select N");
                Ok(())
            }
        },
        "new" => client.new_chat().await.map(|_| ()),
        "clear" => {
            client.clear_selection();
            Ok(())
        }
        "delete" => match session_at(client, rest) {
            Some(id) => client.delete_session(id).await,
            None => {
                println!("usage: /delete N");
                Ok(())
            }
        },
        "rename" => {
            let (index, title) = rest
                .and_then(|r| r.split_once(' '))
                .map_or((rest, ""), |(n, t)| (Some(n), t));
            match session_at(client, index) {
                Some(id) if !title.trim().is_empty() => {
                    client.rename_session(id, title).await.map(|_| ())
                }
                _ => {
                    println!("usage: /rename N TITLE");
                    Ok(())
                }
            }
        }
        "archive" => match session_at(client, rest) {
            Some(id) => client.set_session_active(id, false).await.map(|_| ()),
            None => {
                println!("usage: /archive N");
                Ok(())
            }
        },
        "use" => {
            let index = rest.and_then(|r| r.trim().parse::<usize>().ok());
            if index.and_then(|n| n.checked_sub(1)).is_some_and(|n| client.use_suggestion(n)) {
                spawn_submit(client);
            } else {
                println!("usage: /use N (see the numbered suggestions)");
            }
            Ok(())
        }
        "ask" => client.quick_ask(rest.unwrap_or_default()).await.map(|answer| {
            if let Some(answer) = answer {
                println!("bot> {}", answer.response);
            }
        }),
        "login" => {
            match rest.map(str::trim).filter(|t| !t.is_empty()) {
                Some(token) => {
                    credentials.set(token);
                    client.login_completed();
                    if let Err(e) = client.bootstrap().await {
                        tracing::debug!("bootstrap failed: {e}");
                    }
                }
                None => println!("usage: /login TOKEN"),
            }
            Ok(())
        }
        other => {
            println!("unknown command /{other}; try /help");
            Ok(())
        }
    };

    // Failures are already shown through the view's notice.
    if let Err(e) = result {
        tracing::debug!("/{name} failed: {e}");
    }
}
