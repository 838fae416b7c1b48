//! Chat command parsing and dispatch.
//!
//! Recognized commands:
//! - `!poll [--anonymous] "<prompt>" <option> [<option> ...]`
//! - `login`, only in a direct conversation with the bot.
//!
//! Malformed commands are answered in the conversation with plain corrective
//! text. Everything else is ignored.

use crate::engine::{PollEngine, PollRequest};
use crate::error::PollError;
use crate::login::LoginTokenIssuer;
use crate::render;
use crate::transport::DynTransport;
use pollbot_models::{ChatEvent, IncomingMessage, PollMode};
use pollbot_util::markup::MAX_OPTIONS;
use pollbot_util::tokens::login_link;
use std::sync::Arc;

pub const POLL_COMMAND: &str = "!poll";

const USAGE: &str = "Usage: `!poll [--anonymous] \"<prompt>\" <option> [<option> ...]`";

const WELCOME: &str = "Find out the answers to the hardest questions. \
                       Try `!poll \"Should we move the office to a beach?\" Yes No`";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCommand {
    pub mode: PollMode,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Poll(PollCommand),
    Login,
}

/// Parse a chat message. `Ok(None)` means the message is not a command.
pub fn parse_command(text: &str) -> Result<Option<Command>, PollError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("login") {
        return Ok(Some(Command::Login));
    }
    let Some(rest) = text.strip_prefix(POLL_COMMAND) else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }
    let tokens = split_tokens(rest)?;
    parse_poll_args(tokens).map(|poll| Some(Command::Poll(poll)))
}

fn parse_poll_args(tokens: Vec<String>) -> Result<PollCommand, PollError> {
    let mut mode = PollMode::Public;
    let mut args = tokens.into_iter().peekable();

    while let Some(flag) = args.next_if(|arg| arg.len() > 1 && arg.starts_with('-')) {
        match flag.as_str() {
            "--anonymous" | "-anonymous" => mode = PollMode::Anonymous,
            "--" => break,
            other => {
                return Err(PollError::InvalidCommand(format!("unknown flag `{other}`")));
            }
        }
    }

    let prompt = match args.next() {
        Some(prompt) if !prompt.trim().is_empty() => prompt.trim().to_string(),
        _ => return Err(PollError::InvalidCommand("missing poll prompt".into())),
    };
    let options: Vec<String> = args.map(|option| option.trim().to_string()).collect();
    if options.is_empty() {
        return Err(PollError::InvalidCommand(
            "a poll needs at least one option".into(),
        ));
    }
    if options.iter().any(String::is_empty) {
        return Err(PollError::InvalidCommand("poll options cannot be blank".into()));
    }
    if options.len() > MAX_OPTIONS {
        return Err(PollError::InvalidCommand(format!(
            "a poll can have at most {MAX_OPTIONS} options"
        )));
    }

    Ok(PollCommand {
        mode,
        prompt,
        options,
    })
}

/// Shell-style word splitting: single and double quotes group words, and a
/// backslash escapes the next character outside single quotes. Typographic
/// double quotes count as plain ones, since chat clients like to insert them.
pub fn split_tokens(input: &str) -> Result<Vec<String>, PollError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            other => other,
        });

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            Some(_) => current.push(c),
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => {
                    current.push(chars.next().unwrap_or('\\'));
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(PollError::InvalidCommand("unbalanced quotes".into()));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

pub struct CommandDispatcher {
    engine: Arc<PollEngine>,
    issuer: LoginTokenIssuer,
    transport: DynTransport,
    http_prefix: String,
    bot_username: String,
}

impl CommandDispatcher {
    pub fn new(
        engine: Arc<PollEngine>,
        issuer: LoginTokenIssuer,
        transport: DynTransport,
        http_prefix: impl Into<String>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            issuer,
            transport,
            http_prefix: http_prefix.into(),
            bot_username: bot_username.into(),
        }
    }

    pub async fn handle_event(&self, event: &ChatEvent) -> Result<(), PollError> {
        match event {
            ChatEvent::Message(msg) => self.handle_message(msg).await,
            ChatEvent::ConversationJoined { conversation_id } => {
                self.transport.send_message(conversation_id, WELCOME).await?;
                Ok(())
            }
        }
    }

    pub async fn handle_message(&self, msg: &IncomingMessage) -> Result<(), PollError> {
        if msg.sender == self.bot_username {
            return Ok(());
        }
        let command = match parse_command(&msg.text) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(PollError::InvalidCommand(reason)) => {
                return self.echo_usage(&msg.conversation_id, &reason).await;
            }
            Err(err) => return Err(err),
        };

        match command {
            Command::Poll(poll) => self.handle_poll(msg, poll).await,
            Command::Login => self.handle_login(msg).await,
        }
    }

    async fn handle_poll(&self, msg: &IncomingMessage, poll: PollCommand) -> Result<(), PollError> {
        let poll_mode = poll.mode;
        let request = PollRequest {
            conversation_id: msg.conversation_id.clone(),
            trigger_message_id: msg.message_id,
            prompt: poll.prompt,
            options: poll.options,
            mode: poll.mode,
        };
        match self.engine.create_poll(&request).await {
            Ok(_) => Ok(()),
            Err(PollError::InvalidCommand(reason)) => {
                self.echo_usage(&msg.conversation_id, &reason).await
            }
            Err(PollError::PersistenceFailure(err)) if poll_mode == PollMode::Public => {
                // The reaction poll is already live and counts votes without
                // the stored row, so nothing is wrong from the chat's side.
                Err(PollError::PersistenceFailure(err))
            }
            Err(err) => {
                if let Err(echo_err) = self
                    .transport
                    .send_message(
                        &msg.conversation_id,
                        "Sorry, the poll could not be created. Please try again later.",
                    )
                    .await
                {
                    tracing::warn!(conv_id = %msg.conversation_id, "failed to report poll failure: {echo_err}");
                }
                Err(err)
            }
        }
    }

    /// Login links are only ever delivered in the sender's direct
    /// conversation with the bot.
    async fn handle_login(&self, msg: &IncomingMessage) -> Result<(), PollError> {
        if !msg.direct {
            tracing::debug!(conv_id = %msg.conversation_id, "ignoring login outside a direct conversation");
            return Ok(());
        }
        let token = self.issuer.issue(&msg.sender).await?;
        let link = login_link(&self.http_prefix, &token, &msg.sender);
        self.transport
            .send_message(&msg.conversation_id, &render::login_message(&link))
            .await?;
        Ok(())
    }

    async fn echo_usage(&self, conversation_id: &str, reason: &str) -> Result<(), PollError> {
        let text = render::usage_reply(reason, USAGE);
        self.transport.send_message(conversation_id, &text).await?;
        Ok(())
    }
}
