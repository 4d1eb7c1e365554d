use std::collections::HashMap;
use std::env;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use thumbforge_contracts::answers::{Category, GuidedChoice, Style, Vibe};
use thumbforge_contracts::chat::{parse_intent, Intent, STUDIO_HELP_COMMANDS};
use thumbforge_contracts::storage::FileStore;
use thumbforge_contracts::studio::{ProxyTransport, Studio};
use thumbforge_engine::{image_model_for, DryrunModel, HttpProxyTransport, ProxyServer};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:8787";
const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const DEFAULT_STATE: &str = ".thumbforge/state.json";

#[derive(Debug, Parser)]
#[command(name = "thumbforge", version, about = "Guided video thumbnail generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the /generate and /edit proxy.
    Serve(ServeArgs),
    /// Interactive thumbnail studio.
    Studio(ClientArgs),
    /// Generate one thumbnail and write it to disk.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, env = "THUMBFORGE_BIND", default_value = DEFAULT_BIND)]
    bind: String,
    /// Gemini model name, or `dryrun` for offline solid-colour renders.
    #[arg(long, env = "THUMBFORGE_IMAGE_MODEL")]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct ClientArgs {
    #[arg(long, env = "THUMBFORGE_SERVER", default_value = DEFAULT_SERVER)]
    server: String,
    #[arg(long, env = "THUMBFORGE_STATE", default_value = DEFAULT_STATE)]
    state: PathBuf,
    /// Start an in-process dryrun proxy instead of calling `--server`.
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    client: ClientArgs,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    custom_category: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    custom_style: Option<String>,
    #[arg(long)]
    vibe: Option<String>,
    #[arg(long)]
    custom_vibe: Option<String>,
    #[arg(long)]
    overlay: Option<String>,
    /// Replaces the prompt derived from the guided answers.
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    reference: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() {
    load_dotenv(Path::new(".env"));
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("thumbforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            run_serve(args)?;
            Ok(0)
        }
        Command::Studio(args) => {
            run_studio(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let model = image_model_for(args.model.as_deref())?;
    let server = ProxyServer::bind(&args.bind, model)?;
    tracing::info!(
        addr = %args.bind,
        model = server.model_name(),
        "thumbnail proxy listening"
    );
    server.serve()
}

/// Returns the proxy base URL, starting a local dryrun proxy when offline.
fn resolve_server(args: &ClientArgs) -> Result<String> {
    if !args.offline {
        return Ok(args.server.clone());
    }
    let server = ProxyServer::bind("127.0.0.1:0", Box::new(DryrunModel))?;
    let addr = server
        .local_addr()
        .context("offline proxy has no local address")?;
    thread::spawn(move || {
        if let Err(err) = server.serve() {
            tracing::error!("offline proxy stopped: {err:#}");
        }
    });
    tracing::info!(%addr, "started offline dryrun proxy");
    Ok(format!("http://{addr}"))
}

fn open_studio(args: &ClientArgs) -> Result<Studio<FileStore, HttpProxyTransport>> {
    let base_url = resolve_server(args)?;
    let transport = HttpProxyTransport::new(&base_url)?;
    Ok(Studio::new(FileStore::new(&args.state), transport))
}

fn run_studio(args: ClientArgs) -> Result<()> {
    let mut studio = open_studio(&args)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Thumbforge studio ({} theme, {} saved). Type /help for commands.",
        studio.theme().as_str(),
        studio.history().len()
    );
    print_prompt(&studio);

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            _ => apply_intent(&mut studio, &intent),
        }
    }
    Ok(())
}

fn apply_intent<T: ProxyTransport>(studio: &mut Studio<FileStore, T>, intent: &Intent) {
    let value = intent.arg_str("value").unwrap_or_default();
    match intent.action.as_str() {
        "help" => println!("Commands: {}", STUDIO_HELP_COMMANDS.join(" ")),
        "set_category" => match parse_choice::<Category>(value) {
            Ok(choice) => {
                studio.set_category(choice);
                print_prompt(studio);
            }
            Err(err) => println!("{err}"),
        },
        "set_style" => match parse_choice::<Style>(value) {
            Ok(choice) => {
                studio.set_style(choice);
                print_prompt(studio);
            }
            Err(err) => println!("{err}"),
        },
        "set_vibe" => match parse_choice::<Vibe>(value) {
            Ok(choice) => {
                studio.set_vibe(choice);
                print_prompt(studio);
            }
            Err(err) => println!("{err}"),
        },
        "set_custom_category" => {
            studio.set_custom_category(value);
            print_prompt(studio);
        }
        "set_custom_style" => {
            studio.set_custom_style(value);
            print_prompt(studio);
        }
        "set_custom_vibe" => {
            studio.set_custom_vibe(value);
            print_prompt(studio);
        }
        "set_text_overlay" => {
            studio.set_text_overlay(value);
            print_prompt(studio);
        }
        "edit_prompt" => {
            studio.edit_prompt(value);
            println!("Prompt edited; guided answers no longer update it (/resync to undo).");
        }
        "resync_prompt" => {
            studio.resync_prompt();
            print_prompt(studio);
        }
        "attach_reference" => {
            let path = intent.arg_str("path").unwrap_or_default();
            if path.is_empty() {
                println!("/upload requires a path");
                return;
            }
            match studio.attach_reference_path(Path::new(path)) {
                Ok(()) => {
                    if let Some(upload) = studio.upload() {
                        println!(
                            "Reference attached: {} ({}, {} bytes)",
                            upload.file_name,
                            upload.mime_type,
                            upload.bytes.len()
                        );
                    }
                    print_prompt(studio);
                }
                Err(err) => println!("{err}"),
            }
        }
        "clear_reference" => {
            studio.clear_reference();
            println!("Reference cleared.");
            print_prompt(studio);
        }
        "submit" => {
            println!("Generating...");
            report_generation(studio.submit().map(str::len));
            print_latest(studio);
        }
        "regenerate" => {
            println!("Regenerating...");
            report_generation(studio.regenerate().map(str::len));
            print_latest(studio);
        }
        "list_history" => print_history(studio),
        "select_history" => {
            let Some(index) = intent
                .command_args
                .get("index")
                .and_then(|value| value.as_u64())
            else {
                println!("/select requires a history number (see /history)");
                return;
            };
            match studio.select_history(index as usize) {
                Ok(item) => println!("Loaded entry {}: {}", index + 1, item.prompt),
                Err(err) => println!("{err}"),
            }
        }
        "clear_history" => {
            studio.clear_history();
            println!("History cleared.");
        }
        "download" => {
            let dir = intent
                .arg_str("path")
                .filter(|path| !path.is_empty())
                .unwrap_or(".");
            match studio.download_current(Path::new(dir)) {
                Ok(path) => println!("Saved {}", path.display()),
                Err(err) => println!("{err}"),
            }
        }
        "toggle_theme" => {
            let theme = studio.toggle_theme();
            println!("Theme set to {}", theme.as_str());
        }
        "show" => print_state(studio),
        "unknown" => println!(
            "Unknown command /{} (try /help)",
            intent.arg_str("command").unwrap_or_default()
        ),
        other => println!("Unsupported action {other}"),
    }
}

fn parse_choice<C: GuidedChoice>(raw: &str) -> Result<C> {
    match C::parse(raw) {
        Some(choice) => Ok(choice),
        None => bail!("'{raw}' is not one of: {}", C::labels().join(", ")),
    }
}

fn report_generation(outcome: Result<usize, thumbforge_contracts::studio::StudioError>) {
    match outcome {
        Ok(len) => println!("Image ready ({len} chars of data URL). /download to save it."),
        Err(err) => println!("{err}"),
    }
}

fn print_prompt<T: ProxyTransport>(studio: &Studio<FileStore, T>) {
    println!("Prompt: {}", studio.prompt());
}

fn print_latest<T: ProxyTransport>(studio: &Studio<FileStore, T>) {
    if let Some(item) = studio.history().get(0) {
        println!("History: {} entries, newest {}", studio.history().len(), item.id);
    }
}

fn print_history<T: ProxyTransport>(studio: &Studio<FileStore, T>) {
    if studio.history().is_empty() {
        println!("History is empty.");
        return;
    }
    for (idx, item) in studio.history().items().iter().enumerate() {
        let when = item
            .created_at()
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        println!("{:>3}. [{when}] {}", idx + 1, item.prompt);
    }
}

fn print_state<T: ProxyTransport>(studio: &Studio<FileStore, T>) {
    let answers = studio.answers();
    println!("Category: {}", answers.category_value());
    println!("Style: {}", answers.style_value());
    println!("Colors/Vibe: {}", answers.vibe_value());
    println!(
        "Overlay: {}",
        answers.overlay().unwrap_or("(none)")
    );
    println!(
        "Reference: {}",
        studio
            .upload()
            .map(|upload| upload.file_name.as_str())
            .unwrap_or("(none)")
    );
    println!("Prompt ({:?}): {}", studio.prompt_mode(), studio.prompt());
    println!("Theme: {}", studio.theme().as_str());
    println!("History: {} entries", studio.history().len());
    if let Some(error) = studio.error() {
        println!("Last error: {error}");
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut studio = open_studio(&args.client)?;

    if let Some(raw) = args.category.as_deref() {
        studio.set_category(parse_choice::<Category>(raw)?);
    }
    if let Some(text) = args.custom_category {
        studio.set_custom_category(text);
    }
    if let Some(raw) = args.style.as_deref() {
        studio.set_style(parse_choice::<Style>(raw)?);
    }
    if let Some(text) = args.custom_style {
        studio.set_custom_style(text);
    }
    if let Some(raw) = args.vibe.as_deref() {
        studio.set_vibe(parse_choice::<Vibe>(raw)?);
    }
    if let Some(text) = args.custom_vibe {
        studio.set_custom_vibe(text);
    }
    if let Some(text) = args.overlay {
        studio.set_text_overlay(text);
    }
    if let Some(path) = args.reference.as_deref() {
        studio.attach_reference_path(path)?;
    }
    if let Some(prompt) = args.prompt {
        studio.edit_prompt(prompt);
    }

    tracing::info!(prompt = studio.prompt(), "submitting thumbnail request");
    if let Err(err) = studio.submit() {
        eprintln!("{err}");
        return Ok(2);
    }
    let path = studio.download_current(&args.out)?;
    println!("{}", path.display());
    Ok(0)
}

/// Loads `KEY=VALUE` lines from `path` into the environment without
/// overriding variables that are already set.
fn load_dotenv(path: &Path) {
    for (key, value) in parse_dotenv(path) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
        }
    }
}

fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}
