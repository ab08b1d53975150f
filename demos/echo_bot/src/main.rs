//! Echo Bot Example
//!
//! Reads updates from stdin and dispatches them through Courier. Plain lines
//! become new messages from user 42 in chat 1; lines starting with `{` are
//! taken as raw JSON updates carrying their constructor name in `"_"`.
//!
//! ```text
//! hello                -> echoed back
//! /shout hello         -> HELLO, then propagation stops
//! /fail                -> routed to the error handlers
//! {"_": "updateUserStatus", "user_id": 42}
//! {"_": "updateSomethingNew"}   -> raw handler only
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --workers 2
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Parser as _;
use courier::core::{ChatId, UserId};
use courier::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Echo bot reading updates from stdin")]
struct Cli {
    /// Number of dispatch workers (overrides configuration).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Path to a configuration file.
    #[arg(short, long)]
    config: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Prints outgoing messages instead of sending them anywhere.
struct ConsoleClient;

impl ConsoleClient {
    fn send_message(&self, chat_id: ChatId, text: &str) {
        println!("[chat {chat_id}] bot: {text}");
    }
}

impl Client for ConsoleClient {
    fn name(&self) -> &str {
        "console"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
        self
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct Message {
    chat_id: ChatId,
    from: UserId,
    #[serde(default)]
    text: String,
}

async fn parse_message(
    _client: BoxedClient,
    raw: Arc<RawEvent>,
    entities: Arc<EntityMaps>,
) -> HandlerResult<ParsedUpdate> {
    let message: Message = serde_json::from_value(raw.payload().clone())?;
    if entities.user(message.from).is_none() {
        warn!(user = message.from, "Sender missing from entity maps");
    }
    Ok(ParsedUpdate::new(message))
}

// ============================================================================
// Handlers
// ============================================================================

fn console(ctx: &UpdateContext) -> Option<Arc<ConsoleClient>> {
    downcast_client::<ConsoleClient>(ctx.client())
}

async fn log_message(ctx: Arc<UpdateContext>) -> Propagation {
    if let Some(message) = ctx.parsed_as::<Message>() {
        info!(chat = message.chat_id, user = message.from, "{}", message.text);
    }
    Propagation::Continue
}

async fn shout(ctx: Arc<UpdateContext>) -> Propagation {
    if let (Some(client), Some(message)) = (console(&ctx), ctx.parsed_as::<Message>()) {
        let text = message.text.trim_start_matches("/shout").trim();
        client.send_message(message.chat_id, &text.to_uppercase());
    }
    Propagation::Stop
}

async fn fail(_ctx: Arc<UpdateContext>) -> HandlerResult {
    Err(HandlerError::forbidden("this command is not allowed"))
}

async fn echo(ctx: Arc<UpdateContext>) {
    if let (Some(client), Some(message)) = (console(&ctx), ctx.parsed_as::<Message>()) {
        client.send_message(message.chat_id, &message.text);
    }
}

async fn user_status(ctx: Arc<UpdateContext>) {
    info!(payload = %ctx.raw().payload(), "User status changed");
}

async fn raw_update(ctx: Arc<UpdateContext>) {
    info!(update = ctx.raw().name(), category = %ctx.category(), "Raw update");
}

fn command(name: &'static str) -> impl Fn(&UpdateContext) -> bool + Send + Sync + 'static {
    move |ctx: &UpdateContext| {
        ctx.parsed_as::<Message>()
            .is_some_and(|message| message.text.split_whitespace().next() == Some(name))
    }
}

// ============================================================================
// Main
// ============================================================================

fn to_raw(line: &str) -> Result<RawEvent> {
    if line.starts_with('{') {
        let value: Value = serde_json::from_str(line)?;
        return Ok(RawEvent::from_value(value));
    }
    Ok(RawEvent::new(
        RawEventKind::NewMessage,
        json!({ "chat_id": 1, "from": 42, "text": line }),
    ))
}

async fn read_stdin(sender: UpdateSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let entities = Arc::new(EntityMaps::default().with_user(42, json!({ "first_name": "Ada" })));

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match to_raw(line.trim()) {
                Ok(raw) => {
                    if let Err(e) = sender.send(raw, Arc::clone(&entities)) {
                        error!("Failed to enqueue update: {e}");
                        break;
                    }
                }
                Err(e) => warn!("Ignoring malformed line: {e}"),
            },
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }
    info!("Input closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = UpdateDispatcher::builder()
        .parsers(ParserSet::new().with(EventCategory::NewMessage, parse_message));
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(workers) = cli.workers {
        builder = builder.workers(workers);
    }
    let dispatcher = builder.build(Arc::new(ConsoleClient))?;

    dispatcher
        .add_handler(on_message().name("log").handler(log_message), -1)
        .await?;
    dispatcher
        .add_handler(
            on_message().name("shout").filter(command("/shout")).handler(shout),
            DEFAULT_GROUP,
        )
        .await?;
    dispatcher
        .add_handler(
            on_message().name("fail").filter(command("/fail")).handler(fail),
            DEFAULT_GROUP,
        )
        .await?;
    dispatcher
        .add_handler(on_message().name("echo").handler(echo), DEFAULT_GROUP)
        .await?;
    dispatcher
        .add_handler(on_user_status().handler(user_status), DEFAULT_GROUP)
        .await?;
    dispatcher
        .add_handler(on_raw_update().name("raw").handler(raw_update), 10)
        .await?;

    dispatcher
        .add_error_handler(on_error([ErrorKind::Forbidden]).handler(|ctx, err| async move {
            warn!(update = ctx.raw().name(), "Forbidden: {}", err.message());
        }))
        .await?;
    dispatcher
        .add_error_handler(on_error([]).handler(|_, err| async move {
            error!(kind = %err.kind(), "Handler failed: {err}");
        }))
        .await?;

    dispatcher.run_until(read_stdin(dispatcher.sender())).await?;
    Ok(())
}
