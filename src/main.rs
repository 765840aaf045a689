//! gutenberg-reader-rs: Project Gutenberg reader with read-aloud and vocabulary lookup.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gutenberg_reader::api::{self, AppState};
use gutenberg_reader::client::ReaderClient;
use gutenberg_reader::config::Config;
use gutenberg_reader::definition::{Definition, Dictionary, GeminiDictionary};
use gutenberg_reader::gutenberg::{catalog, BookSource, GutenbergFetcher};
use gutenberg_reader::history::History;
use gutenberg_reader::notifier::Notifier;
use gutenberg_reader::offline::AssetCache;
use gutenberg_reader::reader::paced::PacedTextEngine;
use gutenberg_reader::reader::status::{reduce, Controls};
use gutenberg_reader::reader::{text_from_selection, ReadAloudController, ReaderEvent, SpeechEngine};
use gutenberg_reader::session::SessionTracker;
use gutenberg_reader::words::WordList;

#[derive(Parser, Debug)]
#[command(name = "gutenberg-reader-rs", about = "Read Project Gutenberg books aloud")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the book and definition server
    Serve {
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a book's text as the server returns it
    Show {
        /// Gutenberg book id, e.g. 11 or fr10
        book_id: String,
    },
    /// Read a book aloud
    Read {
        /// Gutenberg book id, e.g. 11 or fr10
        book_id: String,
        /// Start at the first occurrence of this phrase
        #[arg(long)]
        from: Option<String>,
    },
    /// Look up a word or phrase
    Define { text: String },
    /// Manage the "My Words" list
    Words {
        #[command(subcommand)]
        action: WordsAction,
    },
    /// List the preselected books
    Books,
    /// Show a reading report
    History {
        /// Date (YYYY-MM-DD) or "today"
        #[arg(short, long, default_value = "today")]
        date: String,
        /// List dates that have history instead
        #[arg(long)]
        list: bool,
    },
    /// Offline asset cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum WordsAction {
    List,
    Add { text: String },
    Remove { text: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Fetch every manifest asset and drop older caches
    Install,
    /// Print an asset, cache-first
    Fetch { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // Logs go to stderr so they don't mix with the text being read.
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info,ort=info")
    } else {
        EnvFilter::new("info,hyper=warn,hyper_util=warn,reqwest=warn,ort=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref());
    let notifier = Notifier::new(&config.feedback);

    match args.command {
        Command::Serve { port } => run_server(&config, port).await?,
        Command::Show { book_id } => run_show(&config, &notifier, &book_id).await?,
        Command::Read { book_id, from } => {
            run_read(&config, &notifier, &book_id, from.as_deref()).await?
        }
        Command::Define { text } => run_define(&config, &notifier, &text).await?,
        Command::Words { action } => run_words(&config, &notifier, action),
        Command::Books => {
            for book in catalog::PRESELECTED {
                println!("{:>6}  {}", book.id, book.title);
            }
        }
        Command::History { date, list } => {
            let history = History::default_location();
            if list {
                for date in history.list_dates() {
                    println!("{date}");
                }
            } else {
                println!("{}", history.generate_report(&date));
            }
        }
        Command::Cache { action } => run_cache(&config, action).await?,
    }

    Ok(())
}

async fn run_server(config: &Config, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let mut server = config.server.clone();
    if let Some(port) = port {
        server.port = port;
    }

    let books: Arc<dyn BookSource> = Arc::new(GutenbergFetcher::new(&config.gutenberg)?);
    let dictionary = GeminiDictionary::from_config(&config.gemini)?
        .map(|d| Arc::new(d) as Arc<dyn Dictionary>);
    info!(
        "Starting server (definitions {})",
        if dictionary.is_some() { "enabled" } else { "disabled" }
    );

    api::serve(AppState { books, dictionary }, &server).await?;
    Ok(())
}

fn build_engine(config: &Config) -> (Arc<dyn SpeechEngine>, &'static str) {
    match config.reader.engine.as_str() {
        "terminal" => {}
        #[cfg(feature = "kokoro")]
        "kokoro" => {
            info!("Loading Kokoro TTS model...");
            let mut engine = gutenberg_reader::reader::kokoro::KokoroEngine::new(&config.kokoro);
            match engine.load_model_sync() {
                Ok(()) => return (Arc::new(engine), "kokoro"),
                Err(e) => warn!("Failed to load Kokoro model: {e}, using terminal engine"),
            }
        }
        other => warn!("Unknown speech engine '{other}', using terminal engine"),
    }
    let engine = PacedTextEngine::new(config.reader.words_per_minute);
    (Arc::new(engine), "terminal")
}

async fn run_show(config: &Config, notifier: &Notifier, book_id: &str) -> Result<(), Box<dyn Error>> {
    let client = ReaderClient::new(&config.client)?;
    match client.fetch_book(book_id).await {
        Ok(text) => {
            let mut out = std::io::stdout().lock();
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
        Err(e) => notifier.error(&format!("Failed to load book: {e}")),
    }
    Ok(())
}

fn controls_hint(controls: &Controls) -> String {
    let mut hint = Vec::new();
    if controls.pause {
        hint.push("[p]ause");
    }
    if controls.resume {
        hint.push("[r]esume");
    }
    if controls.stop {
        hint.push("[s]top");
    }
    hint.join(" ")
}

async fn run_read(
    config: &Config,
    notifier: &Notifier,
    book_id: &str,
    from: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let client = ReaderClient::new(&config.client)?;
    let title = catalog::title_for(book_id);
    info!("Loading book {book_id} from {}", client.base_url());

    let book = match client.fetch_book(book_id).await {
        Ok(text) => text,
        Err(e) => {
            notifier.error(&format!("Failed to load book: {e}"));
            return Ok(());
        }
    };
    if let Some(title) = title {
        println!("{title}\n");
    }

    let text = match from {
        None => book.as_str(),
        Some(phrase) => text_from_selection(&book, phrase).unwrap_or_else(|| {
            notifier.error(
                "Could not determine starting point of selection accurately. Reading selected text only.",
            );
            phrase
        }),
    };

    let (engine, engine_name) = build_engine(config);
    let (reader, mut events) = ReadAloudController::spawn(engine, &config.reader);
    reader.start(text).await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut tracker = SessionTracker::new();
    let mut started = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    ReaderEvent::Started { total, voice } => {
                        started = true;
                        info!("Reading {total} chunks with voice {}", voice.as_deref().unwrap_or("default"));
                    }
                    ReaderEvent::StateChanged(state) => {
                        let view = reduce(state, true, from.is_some());
                        let hint = controls_hint(&view.controls);
                        eprintln!("-- {} {hint}", view.status);
                    }
                    ReaderEvent::ChunkStarted { index, total, .. } => {
                        tracing::debug!("Chunk {}/{total}", index + 1);
                    }
                    ReaderEvent::Finished { total } => {
                        notifier.info(&format!("Finished reading ({total} chunks)."));
                    }
                    ReaderEvent::Stopped { index, total } => {
                        info!("Stopped at chunk {}/{total}", index + 1);
                    }
                    ReaderEvent::Failed { message, .. } => notifier.error(message),
                    ReaderEvent::Notice(message) => {
                        notifier.error(message);
                        if !started {
                            break;
                        }
                    }
                }
                if tracker.observe(&event).is_some() {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" | "pause" => { reader.pause().await; }
                    "r" | "resume" => { reader.resume().await; }
                    "s" | "stop" | "q" | "quit" => { reader.stop().await; }
                    "" => {}
                    other => eprintln!("Unknown command '{other}' (p, r, s or q)"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                reader.stop().await;
            }
        }
    }

    if tracker.outcome().is_some() {
        let record = tracker.record(book_id, title, from.is_some(), engine_name);
        History::default_location().save(&record);
    }
    Ok(())
}

fn print_definition(def: &Definition) {
    let list = |items: &[String]| {
        if items.is_empty() {
            "N/A".to_string()
        } else {
            items.join(", ")
        }
    };
    println!("{}", def.selected_text);
    println!("  Definition: {}", def.definition);
    println!("  Synonyms:   {}", list(&def.synonyms));
    println!("  Antonyms:   {}", list(&def.antonyms));
    println!("  Turkish:    {}", def.turkish_meaning);
}

async fn run_define(config: &Config, notifier: &Notifier, text: &str) -> Result<(), Box<dyn Error>> {
    let client = ReaderClient::new(&config.client)?;
    match client.define(text).await {
        Ok(def) => print_definition(&def),
        Err(e) => notifier.error(&format!("Definition error for \"{text}\": {e}")),
    }
    Ok(())
}

fn run_words(config: &Config, notifier: &Notifier, action: WordsAction) {
    let mut words = WordList::load(config.words.resolved_path());
    match action {
        WordsAction::List => {
            if words.is_empty() {
                println!("Your saved words will appear here. Add one with `words add <TEXT>`.");
            }
            for word in words.words() {
                println!("{word}");
            }
        }
        WordsAction::Add { text } => match words.add(&text) {
            Ok(true) => println!("Added \"{}\"", text.trim()),
            Ok(false) => println!("\"{}\" is already in My Words", text.trim()),
            Err(e) => notifier.error(&e.to_string()),
        },
        WordsAction::Remove { text } => match words.remove(&text) {
            Ok(true) => println!("Removed \"{}\"", text.trim()),
            Ok(false) => println!("\"{}\" is not in My Words", text.trim()),
            Err(e) => notifier.error(&e.to_string()),
        },
    }
}

async fn run_cache(config: &Config, action: CacheAction) -> Result<(), Box<dyn Error>> {
    let client = ReaderClient::new(&config.client)?;
    let cache = AssetCache::from_config(&config.cache);

    match action {
        CacheAction::Install => {
            let count = cache.install(&client, &config.cache.assets).await?;
            let removed = cache.activate()?;
            println!(
                "Cached {count} assets in {} ({} old caches removed)",
                cache.dir().display(),
                removed.len()
            );
        }
        CacheAction::Fetch { path } => {
            let (status, body) = cache.fetch(&client, &path).await?;
            if !status.is_success() {
                warn!("{path} returned {status}");
            }
            std::io::stdout().write_all(&body)?;
        }
    }
    Ok(())
}
