//! CLI transport for direct terminal interaction

use crate::agent::ChatClient;
use crate::config::Config;
use crate::core::attachments::{
    parse_file_references, remove_file_references, resolve_file_path, Attachment,
    AttachmentConfig, AttachmentTray, IngestReport,
};
use crate::core::{Conversation, Exchange, SessionError, Speaker, Turn};
use crate::llm::prompt::{APP_NAME, TAGLINE};
use crate::llm::{GeminiConnector, SessionSettings};
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Build the session client from configuration
pub fn build_client(config: &Config, model: Option<String>) -> ChatClient {
    let connector = GeminiConnector::new(config.llm.api_key_env.clone())
        .with_base_url(config.llm.base_url.clone());

    let mut settings = SessionSettings::from(&config.llm);
    if let Some(model) = model {
        settings.model = model;
    }

    ChatClient::new(Arc::new(connector), settings, config.retry.to_policy())
}

/// Run interactive chat mode
pub async fn run_chat(
    config: &Config,
    initial_message: Option<String>,
    files: Vec<PathBuf>,
    model: Option<String>,
) -> Result<()> {
    let client = build_client(config, model);

    println!("{} {}", APP_NAME.bold().cyan(), format!("- {}", TAGLINE).as_str().dimmed());
    println!("Model: {}", client.settings().model);
    println!("Type /help for commands, /quit to exit\n");

    if let Err(e) = client.ensure_session().await {
        print_credential_hint(config, &e);
        return Err(e).context("Could not start a chat session");
    }

    let mut shell = ChatShell::new(&client, AttachmentConfig::from(&config.attachments));

    if !files.is_empty() {
        let report = shell.tray.add_paths(&files);
        print_ingest_report(report);
    }

    let first = initial_message.unwrap_or_default();
    if (!first.trim().is_empty() || !shell.tray.is_empty()) && shell.send(&first).await {
        return fatal_exit(config);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let (text, references) = match parse_input(&line) {
            ShellInput::Command(command) => match shell.command(command).await {
                ShellFlow::Continue => continue,
                ShellFlow::Quit => {
                    println!("Goodbye!");
                    break;
                }
                ShellFlow::Fatal => return fatal_exit(config),
            },
            ShellInput::Message { text, references } => (text, references),
        };

        if !references.is_empty() && !shell.attach(&resolve_all(&references)) {
            continue;
        }

        if text.trim().is_empty() && shell.tray.is_empty() {
            continue;
        }

        if shell.send(&text).await {
            return fatal_exit(config);
        }
    }

    Ok(())
}

/// Run a one-shot explanation and print the reply
pub async fn run_explain(config: &Config, text: Option<String>, files: Vec<PathBuf>) -> Result<()> {
    let mut tray = AttachmentTray::new(AttachmentConfig::from(&config.attachments));
    let report = tray.add_paths(&files)?;
    if let Some((path, e)) = report.rejected.into_iter().next() {
        return Err(e).with_context(|| format!("Cannot attach {}", path.display()));
    }

    let client = build_client(config, None);
    let mut conversation = Conversation::new();
    let exchange = conversation
        .submit(&client, text.as_deref().unwrap_or(""), tray.take_all())
        .await?;

    match exchange {
        Exchange::Answered => {
            if let Some(turn) = conversation.last() {
                println!("{}", turn.text());
            }
            Ok(())
        }
        Exchange::Failed(e) => {
            if e.is_initialization() {
                print_credential_hint(config, &e);
            }
            Err(e.into())
        }
    }
}

/// Print the effective configuration, or where it is read from
pub fn run_config(config: &Config, path: &Path, path_only: bool) -> Result<()> {
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    println!("{}", format!("# {}", path.display()).as_str().dimmed());
    print!("{}", config.to_toml()?);
    Ok(())
}

/// One line of REPL input
#[derive(Debug, PartialEq)]
enum ShellInput<'a> {
    /// A `/command`, without the slash
    Command(&'a str),
    /// Text to send, with any `@path` references pulled out
    Message {
        text: String,
        references: Vec<String>,
    },
}

fn parse_input(line: &str) -> ShellInput<'_> {
    if let Some(command) = line.trim().strip_prefix('/') {
        return ShellInput::Command(command);
    }

    let references = parse_file_references(line);
    let text = if references.is_empty() {
        line.to_string()
    } else {
        remove_file_references(line)
    };
    ShellInput::Message { text, references }
}

enum ShellFlow {
    Continue,
    Quit,
    Fatal,
}

/// REPL state: the conversation and the tray for the next turn
struct ChatShell<'a> {
    client: &'a ChatClient,
    conversation: Conversation,
    tray: AttachmentTray,
}

impl<'a> ChatShell<'a> {
    fn new(client: &'a ChatClient, config: AttachmentConfig) -> Self {
        Self {
            client,
            conversation: Conversation::new(),
            tray: AttachmentTray::new(config),
        }
    }

    /// Send one turn with the pending tray. Returns true when the session
    /// can no longer be used.
    async fn send(&mut self, text: &str) -> bool {
        println!("{}", "Thinking...".dimmed());

        let attachments = self.tray.take_all();
        match self.conversation.submit(self.client, text, attachments).await {
            Ok(exchange) => {
                if let Some(turn) = self.conversation.last() {
                    render_turn(turn);
                }
                if let Some(e) = exchange.error() {
                    eprintln!("{} {}", "Error:".red(), e);
                }
                exchange.is_fatal()
            }
            Err(e) => {
                eprintln!("{} {}", "Error:".red(), e);
                false
            }
        }
    }

    /// Attach a batch; false when the whole batch was refused
    fn attach(&mut self, paths: &[PathBuf]) -> bool {
        let result = self.tray.add_paths(paths);
        let accepted = result.is_ok();
        print_ingest_report(result);
        accepted
    }

    async fn command(&mut self, command: &str) -> ShellFlow {
        let (name, args) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));

        match name.to_lowercase().as_str() {
            "quit" | "exit" | "q" => return ShellFlow::Quit,
            "help" | "h" | "?" => print_help(),
            "attach" | "a" => {
                if args.is_empty() {
                    eprintln!("Usage: /attach <path> [path...]");
                } else {
                    let raw: Vec<String> = args.split_whitespace().map(String::from).collect();
                    self.attach(&resolve_all(&raw));
                }
            }
            "voice" => {
                if args.is_empty() {
                    eprintln!("Usage: /voice <recording>");
                    return ShellFlow::Continue;
                }
                let note = resolve_file_path(args)
                    .and_then(|path| Attachment::voice_note_from_path(&path))
                    .and_then(|note| self.tray.add(note));
                match note {
                    Ok(()) => {
                        if self.send("").await {
                            return ShellFlow::Fatal;
                        }
                    }
                    Err(e) => eprintln!("{} {}", "Error:".red(), e),
                }
            }
            "files" | "ls" => {
                if self.tray.is_empty() {
                    println!("No pending attachments");
                }
                for (i, attachment) in self.tray.pending().iter().enumerate() {
                    println!("  {}. {}", i + 1, attachment.label());
                }
            }
            "drop" => match args.parse::<usize>() {
                Ok(n) if n >= 1 => match self.tray.remove_at(n - 1) {
                    Some(removed) => println!("Removed {}", removed.filename),
                    None => eprintln!("No attachment #{}", n),
                },
                _ => eprintln!("Usage: /drop <number>"),
            },
            other => eprintln!("Unknown command: /{} (try /help)", other),
        }

        ShellFlow::Continue
    }
}

/// Resolve typed paths, keeping unresolvable ones so the tray reports them
fn resolve_all(raw: &[String]) -> Vec<PathBuf> {
    raw.iter()
        .map(|p| resolve_file_path(p).unwrap_or_else(|_| PathBuf::from(p)))
        .collect()
}

fn render_turn(turn: &Turn) {
    match turn.speaker {
        Speaker::User => println!("{} {}", "You:".bold().cyan(), turn.text()),
        Speaker::Model if turn.failed => {
            println!("\n{} {}\n", "LifeLens:".bold().red(), turn.text().red())
        }
        Speaker::Model => println!("\n{}\n{}\n", "LifeLens:".bold().green(), turn.text()),
    }
}

fn print_ingest_report(report: Result<IngestReport, crate::core::AttachmentError>) {
    match report {
        Ok(report) => {
            for label in &report.attached {
                println!("{} {}", "Attached".green(), label);
            }
            for (path, e) in &report.rejected {
                eprintln!("{} {}: {}", "Skipped".yellow(), path.display(), e);
            }
        }
        Err(e) => eprintln!("{} {}", "Error:".red(), e),
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  /attach <paths>  Attach files to the next message");
    println!("  /voice <path>    Send a recording as a voice note");
    println!("  /files           List pending attachments");
    println!("  /drop <n>        Remove pending attachment n");
    println!("  /help            Show this help");
    println!("  /quit            Exit");
    println!();
    println!("Reference files inline with @path or @\"path with spaces\".");
}

fn print_credential_hint(config: &Config, error: &SessionError) {
    let credential = error.llm_error().is_some_and(|e| e.is_credential_problem());
    if credential {
        eprintln!(
            "{}\n\n  export {}=\"your-api-key-here\"\n\nGet a key from: https://aistudio.google.com/apikey\n",
            "Gemini API key not configured.".yellow().bold(),
            config.llm.api_key_env
        );
    }
}

fn fatal_exit(config: &Config) -> Result<()> {
    anyhow::bail!(
        "Chat session could not be initialized; check {} and try again",
        config.llm.api_key_env
    )
}
