use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Password};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use verdicta::auth::{self, Credentials, UserDirectory};
use verdicta::session::{AttachError, ChatSession, SendError, SendOutcome};
use verdicta::state::SourceFile;
use verdicta::transcript::TranscriptEvent;
use verdicta::view::TranscriptView;
use verdicta::{Config, ResponseMode};

#[derive(Parser)]
#[command(name = "verdicta")]
#[command(about = "AI legal assistant: ask questions about your documents")]
struct Cli {
    /// Base URL of the query API (overrides VERDICTA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Expect a single JSON answer instead of a streamed one
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a local account
    Signup {
        email: String,
    },
    /// Sign in with an existing account
    Login {
        email: String,
    },
    /// Sign out
    Logout,
    /// Start a chat session
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    apply_flags(&mut config, &cli);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let users_path = Config::config_dir()?.join("users.json");

    match cli.command {
        None => print_landing(),
        Some(Commands::Signup { email }) => signup(&users_path, &email)?,
        Some(Commands::Login { email }) => login(&users_path, &email)?,
        Some(Commands::Logout) => {
            UserDirectory::open(&users_path)?.logout()?;
            println!("Signed out.");
        }
        Some(Commands::Chat) => {
            let users = UserDirectory::open(&users_path)?;
            if !users.is_authorized() {
                bail!("Not signed in. Run `verdicta login <email>` first.");
            }
            chat(&config).await?;
        }
    }

    Ok(())
}

/// Command-line flags win over both the config file and the environment
fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if cli.json {
        config.response_mode = ResponseMode::Json;
    }
}

fn print_landing() {
    println!("Verdicta, your AI legal assistant\n");
    println!("  verdicta signup <email>   create an account");
    println!("  verdicta login <email>    sign in");
    println!("  verdicta chat             ask questions, attach PDFs and images");
}

fn signup(users_path: &Path, email: &str) -> Result<()> {
    let theme = ColorfulTheme::default();
    let password = Password::with_theme(&theme).with_prompt("Password").interact()?;
    let confirm = Password::with_theme(&theme).with_prompt("Confirm password").interact()?;

    let mut users = UserDirectory::open(users_path)?;
    auth::signup(&mut users, email, &password, &confirm)?;
    println!("Signup successful! You can now log in.");
    Ok(())
}

fn login(users_path: &Path, email: &str) -> Result<()> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact()?;

    let mut users = UserDirectory::open(users_path)?;
    users.validate(email, &password)?;
    println!("Signed in as {}.", email);
    Ok(())
}

enum ChatCommand {
    Attach(PathBuf),
    Quit,
    Text(String),
}

fn parse_line(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    if trimmed == "/quit" || trimmed == "/exit" {
        ChatCommand::Quit
    } else if let Some(path) = trimmed.strip_prefix("/attach ") {
        ChatCommand::Attach(PathBuf::from(path.trim()))
    } else {
        ChatCommand::Text(line.to_string())
    }
}

async fn chat(config: &Config) -> Result<()> {
    let session = Arc::new(ChatSession::from_config(config));
    let mut events = session.subscribe();
    let mut view = TranscriptView::new();

    println!("AI Legal Assistant ({})", config.api_url);
    println!("Type a message, `/attach <path>` to add a PDF or image, `/quit` to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Attach(path) => {
                let file = match SourceFile::from_path(&path).await {
                    Ok(file) => file,
                    Err(e) => {
                        eprintln!("Cannot read {}: {}", path.display(), e);
                        continue;
                    }
                };
                println!("Processing...");
                match session.attach_file(file).await {
                    Ok(_) => flush_events(&mut events, &mut view),
                    Err(AttachError::Busy) => eprintln!("Still processing the previous file."),
                    Err(e) => eprintln!("{}", e),
                }
            }
            ChatCommand::Text(text) => {
                session.set_input(text);
                let send = session.submit();
                tokio::pin!(send);

                // Render chunks as they land while the send is running
                let outcome = loop {
                    tokio::select! {
                        outcome = &mut send => break outcome,
                        Some(event) = events.recv() => print_event(&mut view, &event),
                    }
                };
                flush_events(&mut events, &mut view);
                println!();

                match outcome {
                    Ok(SendOutcome::Completed { .. }) => {}
                    Ok(SendOutcome::Failed { reason }) => tracing::debug!(error = %reason, "Send failed"),
                    Err(SendError::Empty) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
        }
    }

    Ok(())
}

fn print_event(view: &mut TranscriptView, event: &TranscriptEvent) {
    print!("{}", view.render(event));
    let _ = std::io::stdout().flush();
}

fn flush_events(events: &mut mpsc::UnboundedReceiver<TranscriptEvent>, view: &mut TranscriptView) {
    while let Ok(event) = events.try_recv() {
        print_event(view, &event);
    }
}
