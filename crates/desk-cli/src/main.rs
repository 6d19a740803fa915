//! desk - support desk assistant CLI

mod commands;
mod config;
mod corpus;
mod store;
mod utils;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use desk_ai::providers::openai::ChatClient;
use desk_ai::{RetryConfig, Retrying};
use desk_flow::store::memory::MemoryEvidenceStore;
use desk_flow::{Collaborators, Engine, FlowEvent, StateStore, TurnInput};
use tracing_subscriber::EnvFilter;

const DEFAULT_THREAD: &str = "main";

/// desk - answers policy questions and files support tickets
#[derive(Parser, Debug)]
#[command(name = "desk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation thread to continue
    #[arg(short, long)]
    thread: Option<String>,

    /// User recorded on created tickets
    #[arg(short, long)]
    user: Option<String>,

    /// Run in non-interactive mode with a single utterance
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Pre-embedded JSONL evidence corpus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List saved threads
    #[arg(long)]
    threads: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("desk=debug,desk_flow=debug,desk_ai=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let data_dir = cfg.data_dir();
    let states = Arc::new(store::FileStateStore::open(&data_dir)?);

    if args.threads {
        return list_threads(states.as_ref()).await;
    }

    let api_key = match cfg.api_key() {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: No API key found");
            eprintln!();
            eprintln!("Set one with: export DESK_API_KEY=your-key");
            eprintln!("Or add it to the config file: desk --init-config");
            std::process::exit(1);
        }
    };

    let mut chat = ChatClient::new(api_key);
    if let Some(ref base_url) = cfg.base_url {
        chat = chat.with_base_url(base_url);
    }
    if let Some(ref model) = cfg.model {
        chat = chat.with_model(model);
    }
    if let Some(ref model) = cfg.embedding_model {
        chat = chat.with_embedding_model(model);
    }
    if let Some(temperature) = cfg.temperature {
        chat = chat.with_temperature(temperature);
    }
    let client = Arc::new(Retrying::new(chat, RetryConfig::from(&cfg.retry)));

    let evidence = match args.corpus.as_ref().or(cfg.corpus_path.as_ref()) {
        Some(path) => MemoryEvidenceStore::new(corpus::load_corpus(path)?),
        None => {
            tracing::warn!("No evidence corpus configured; policy questions will go unanswered");
            MemoryEvidenceStore::default()
        }
    };
    let tickets = Arc::new(store::FileTicketStore::open(&data_dir)?);
    let cache = Arc::new(store::FileCacheStore::open(&data_dir)?);

    let collaborators = Collaborators {
        classifier: client.clone(),
        decomposer: client.clone(),
        answerer: client.clone(),
        embedder: client,
        evidence: Arc::new(evidence),
        cache,
        tickets,
    };
    let engine = Engine::new(collaborators, states, cfg.workflow.clone());

    let user_id = args.user.unwrap_or_else(|| cfg.user_id());
    let thread_id = args.thread.unwrap_or_else(|| DEFAULT_THREAD.to_string());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&engine, &thread_id, &user_id, &command, args.verbose).await;
    }

    run_interactive(&engine, thread_id, &user_id, args.verbose).await
}

async fn run_command(
    engine: &Engine,
    thread_id: &str,
    user_id: &str,
    utterance: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut events = engine.subscribe();
    let input = TurnInput::new(thread_id, utterance).with_user(user_id);
    let state = engine.run_turn(input).await?;
    if verbose {
        print_trail(&mut events);
    }
    println!("{}", utils::render_turn(&state));
    Ok(())
}

async fn run_interactive(
    engine: &Engine,
    mut thread_id: String,
    user_id: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("desk ({}) thread: {}", user_id, thread_id);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    let mut events = engine.subscribe();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            let ctx = commands::CommandContext {
                tickets: engine.tickets(),
                user_id,
                thread_id: &thread_id,
            };
            if let Some(result) = commands::execute_command(input, &ctx).await {
                match result {
                    commands::CommandResult::Message(msg) => println!("{}", msg),
                    commands::CommandResult::SwitchThread(id) => {
                        println!("Switched to thread {}.", id);
                        thread_id = id;
                    }
                    commands::CommandResult::Exit => break,
                    commands::CommandResult::Unknown(cmd) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                }
                println!();
                continue;
            }
        }

        let turn = TurnInput::new(thread_id.as_str(), input).with_user(user_id);
        match engine.run_turn(turn).await {
            Ok(state) => {
                if verbose {
                    print_trail(&mut events);
                } else {
                    while events.try_recv().is_ok() {}
                }
                println!("{}", utils::render_turn(&state));
            }
            Err(e) => eprintln!("Error: {}", e),
        }
        println!();
    }

    Ok(())
}

/// Print the stages a turn went through
fn print_trail(events: &mut broadcast::Receiver<FlowEvent>) {
    let mut stages = Vec::new();
    loop {
        match events.try_recv() {
            Ok(FlowEvent::StageStart { stage, .. }) => stages.push(stage.as_str()),
            Ok(FlowEvent::CacheHit { similarity, .. }) => {
                eprintln!("[cache hit {:.2}]", similarity)
            }
            Ok(FlowEvent::Error { message, .. }) => eprintln!("[error: {}]", message),
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                eprintln!("[{} events dropped]", n)
            }
            Err(_) => break,
        }
    }
    if !stages.is_empty() {
        eprintln!("[{}]", stages.join(" > "));
    }
}

async fn list_threads(states: &dyn StateStore) -> anyhow::Result<()> {
    let threads = states.list().await?;
    if threads.is_empty() {
        println!("No saved threads found.");
        return Ok(());
    }

    println!("Saved threads:\n");
    println!("{:<28} {:<15} {:<6} Last reply", "Thread", "Status", "Msgs");
    println!("{}", "-".repeat(90));
    for id in threads {
        let Some(state) = states.load(&id).await? else {
            continue;
        };
        println!(
            "{:<28} {:<15} {:<6} {}",
            id,
            state.status.as_str(),
            state.messages.len(),
            utils::truncate_chars(&state.last_reply().unwrap_or("").replace('\n', " "), 40)
        );
    }
    println!("\nContinue with: desk --thread <id>");
    Ok(())
}
