//! Interactive chat loop.
//!
//! Plain lines are queries; lines starting with `/` are commands.

use crate::render::{render_cart, render_entry};
use dealcart::ShoppingAssistant;
use dealcart::conversation::{MessageId, Role};
use dealcart::error::DisplayError;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Type what you're looking for, or a command:
  /cart                show the cart
  /add <msg|last> <n>  add deal n of a message to the cart
  /remove <item>       remove a cart line
  /clear               empty the cart
  /toggle <msg|last>   show or hide a message's deals
  /new                 start a new conversation
  /session             show the session id
  /exit                quit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Send a query.
    Query(String),
    /// Show the cart.
    Cart,
    /// Add a deal from a message.
    Add {
        /// Message id, or `last`.
        message: String,
        /// Deal position in the message.
        index: usize,
    },
    /// Remove a cart line.
    Remove(String),
    /// Empty the cart.
    Clear,
    /// Start a new conversation.
    New,
    /// Toggle a message's deals.
    Toggle(String),
    /// Show the session id.
    Session,
    /// Show help.
    Help,
    /// Leave the loop.
    Exit,
    /// A command that could not be parsed, with a usage hint.
    Invalid(String),
}

impl ChatCommand {
    /// Parse a line. Blank lines yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Query(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        let command = match (name, args.as_slice()) {
            ("cart", []) => Self::Cart,
            ("add", [message, index]) => match index.parse() {
                Ok(index) => Self::Add {
                    message: (*message).to_string(),
                    index,
                },
                Err(_) => Self::Invalid(format!("not a deal number: {index}")),
            },
            ("add", _) => Self::Invalid("usage: /add <msg|last> <n>".into()),
            ("remove", [item]) => Self::Remove((*item).to_string()),
            ("remove", _) => Self::Invalid("usage: /remove <item>".into()),
            ("clear", []) => Self::Clear,
            ("new", []) => Self::New,
            ("toggle", [message]) => Self::Toggle((*message).to_string()),
            ("toggle", _) => Self::Invalid("usage: /toggle <msg|last>".into()),
            ("session", []) => Self::Session,
            ("help", _) => Self::Help,
            ("exit" | "quit", []) => Self::Exit,
            _ => Self::Invalid(format!("unknown command: /{name} (try /help)")),
        };
        Some(command)
    }
}

/// Whether an answer to a confirmation prompt means yes.
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question on stdin.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn confirm(prompt: &str) -> std::io::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?.is_some_and(|answer| is_yes(&answer)))
}

/// A chat loop driving one assistant.
#[derive(Debug)]
pub struct ChatSession {
    assistant: ShoppingAssistant,
}

impl ChatSession {
    /// Create a chat session.
    #[must_use]
    pub const fn new(assistant: ShoppingAssistant) -> Self {
        Self { assistant }
    }

    /// The driven assistant.
    #[must_use]
    pub const fn assistant(&self) -> &ShoppingAssistant {
        &self.assistant
    }

    /// Run the interactive loop until `/exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin or stdout fail.
    pub async fn run(&self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = std::io::stdout();

        println!("Dealcart (type /help for commands, /exit to quit)");
        println!();

        loop {
            print!("> ");
            stdout.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(command) = ChatCommand::parse(&line) else {
                continue;
            };

            match command {
                ChatCommand::Exit => break,
                ChatCommand::Clear => {
                    print!("Remove every item from your cart? [y/N] ");
                    stdout.flush()?;
                    let answer = lines.next_line().await?.unwrap_or_default();
                    if is_yes(&answer) {
                        println!("{}", self.execute(ChatCommand::Clear).await);
                    } else {
                        println!("Cancelled.");
                    }
                }
                other => println!("{}", self.execute(other).await),
            }
            println!();
        }

        Ok(())
    }

    /// Execute one command and return what to print.
    ///
    /// [`ChatCommand::Clear`] runs unconditionally here; [`run`](Self::run)
    /// asks for confirmation first.
    pub async fn execute(&self, command: ChatCommand) -> String {
        match command {
            ChatCommand::Query(text) => self.query(&text).await,
            ChatCommand::Cart => match self.assistant.refresh_cart().await {
                Ok(cart) => render_cart(&cart),
                Err(e) => format!(
                    "! {}\n{}",
                    DisplayError(&e),
                    render_cart(&self.assistant.cart())
                ),
            },
            ChatCommand::Add { message, index } => {
                let Some(id) = self.resolve_message(&message) else {
                    return format!("! no message {message}");
                };
                match self.assistant.add_from_message(&id, index).await {
                    Ok(outcome) => format!("Added. {} item(s) in cart.", outcome.badge_count),
                    Err(e) => format!("! {}", DisplayError(&e)),
                }
            }
            ChatCommand::Remove(item) => match self.assistant.remove_from_cart(&item).await {
                Ok(cart) => format!("Removed {item}.\n{}", render_cart(&cart)),
                Err(e) => format!("! {}", DisplayError(&e)),
            },
            ChatCommand::Clear => match self.assistant.clear_cart().await {
                Ok(_) => "Cart cleared.".to_string(),
                Err(e) => format!("! {}", DisplayError(&e)),
            },
            ChatCommand::New => {
                self.assistant.start_new_conversation();
                "Started a new conversation.".to_string()
            }
            ChatCommand::Toggle(message) => {
                let toggled = self
                    .resolve_message(&message)
                    .and_then(|id| self.assistant.toggle_product_expansion(&id).map(|_| id));
                toggled.map_or_else(
                    || format!("! no message {message}"),
                    |id| self.render_message(&id),
                )
            }
            ChatCommand::Session => self
                .assistant
                .session_id()
                .await
                .unwrap_or_else(|| "(no session yet)".to_string()),
            ChatCommand::Help => HELP.to_string(),
            ChatCommand::Exit => String::new(),
            ChatCommand::Invalid(hint) => format!("! {hint}"),
        }
    }

    async fn query(&self, text: &str) -> String {
        let outcome = match self.assistant.submit_query(text).await {
            Ok(outcome) => outcome,
            Err(e) => return format!("! {}", DisplayError(&e)),
        };
        let mut out = outcome
            .reply
            .map(|reply| self.render_message(reply.id()))
            .unwrap_or_default();
        if let Some(notice) = self.assistant.query_notice() {
            let _ = write!(out, "\n! {notice}");
        }
        out
    }

    fn render_message(&self, id: &MessageId) -> String {
        self.assistant
            .conversation()
            .iter()
            .find(|entry| entry.message.id() == id)
            .map(|entry| render_entry(entry, |index| self.assistant.add_state(id, index)))
            .unwrap_or_default()
    }

    /// Resolve `last` to the latest assistant message with deals, or take
    /// the token as a message id.
    fn resolve_message(&self, token: &str) -> Option<MessageId> {
        let entries = self.assistant.conversation();
        if token == "last" {
            return entries
                .iter()
                .rev()
                .find(|entry| entry.message.role() == Role::Assistant && entry.message.has_products())
                .map(|entry| entry.message.id().clone());
        }
        entries
            .iter()
            .find(|entry| entry.message.id().as_str() == token)
            .map(|entry| entry.message.id().clone())
    }
}
