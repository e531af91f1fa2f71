use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dream_contracts::form::{FieldValue, FormState, INIT_IMAGE_FIELD, PROMPT_FIELD};
use dream_contracts::page::PageConfig;
use dream_contracts::results::ResultLog;
use dream_contracts::store::JsonFileStore;
use dream_contracts::translate::Translation;
use dream_engine::config::DEFAULT_STATE_DIR;
use dream_engine::{
    ClientConfig, GenerationBackend, HttpBackend, Passthrough, Session, Translator, UiEvent,
    YoudaoTranslator,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod surface;

use surface::TerminalSurface;

#[derive(Debug, Parser)]
#[command(
    name = "dream",
    version,
    about = "Terminal client for the dream image generation server"
)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory holding saved fields, results and dream.env
    #[arg(long, global = true, default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,
    /// Server base URL, overriding DREAM_SERVER_URL
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit the form and stream progress until the server finishes
    Generate(GenerateArgs),
    /// Inspect or edit the saved form fields
    #[command(subcommand)]
    Fields(FieldsCommand),
    /// Ask the server to stop the running generation
    Cancel,
    /// Browse past results
    #[command(subcommand)]
    Results(ResultsCommand),
    /// Translate text the way prompts are translated before submission
    Translate(TranslateArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: Option<String>,
    /// Field assignment applied before submitting, e.g. --set steps=30
    #[arg(long = "set", value_name = "NAME=VALUE")]
    assignments: Vec<String>,
    #[arg(long)]
    init_image: Option<PathBuf>,
    /// Send the prompt as typed
    #[arg(long)]
    no_translate: bool,
}

#[derive(Debug, Subcommand)]
enum FieldsCommand {
    Show,
    Set {
        #[arg(value_name = "NAME=VALUE", required = true)]
        assignments: Vec<String>,
    },
    /// Go back to a random seed
    ResetSeed,
    /// Forget every saved field except the prompt
    ResetAll,
}

#[derive(Debug, Subcommand)]
enum ResultsCommand {
    List,
    /// Load a result's settings back into the form
    Recall { index: usize },
}

#[derive(Debug, Parser)]
struct TranslateArgs {
    text: String,
}

type CliSession = Session<JsonFileStore, Box<dyn Translator>, HttpBackend>;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("dream error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed installing log subscriber")?;

    let mut config = ClientConfig::load(&cli.state_dir);
    if let Some(server) = cli.server {
        config.server_url = server.trim_end_matches('/').to_string();
    }
    tracing::debug!("using server {}", config.server_url);

    match cli.command {
        Command::Generate(args) => run_generate(&config, args),
        Command::Fields(command) => run_fields(&config, command),
        Command::Cancel => {
            let mut surface = TerminalSurface::new(&config);
            let mut session = open_session(
                &config,
                Box::new(Passthrough),
                PageConfig::default(),
                &mut surface,
            )?;
            session.handle(UiEvent::Cancel, &mut surface)?;
            println!("Cancel requested.");
            Ok(0)
        }
        Command::Results(command) => run_results(&config, command),
        Command::Translate(args) => run_translate(&config, args),
    }
}

fn run_generate(config: &ClientConfig, args: GenerateArgs) -> Result<i32> {
    let mut surface = TerminalSurface::new(config);
    let translator = select_translator(config, args.no_translate)?;
    let page = resolve_page_config(config)?;
    let mut session = open_session(config, translator, page, &mut surface)?;

    if let Some(prompt) = args.prompt {
        session.handle(field_event(PROMPT_FIELD, &prompt), &mut surface)?;
    }
    for assignment in &args.assignments {
        let (name, value) = parse_assignment(assignment)?;
        session.handle(field_event(name, value), &mut surface)?;
    }
    if let Some(path) = args.init_image {
        session.handle(
            field_event(INIT_IMAGE_FIELD, &path.display().to_string()),
            &mut surface,
        )?;
    }
    if session.form().prompt().trim().is_empty() {
        bail!("no prompt given; pass --prompt or save one with `dream fields set prompt=...`");
    }

    let state = session.handle(UiEvent::Submit, &mut surface)?;
    tracing::debug!("stream ended: {state:?}");
    Ok(if surface.alerted() { 2 } else { 0 })
}

fn run_fields(config: &ClientConfig, command: FieldsCommand) -> Result<i32> {
    let mut surface = TerminalSurface::new(config);
    let mut session = open_session(
        config,
        Box::new(Passthrough),
        PageConfig::default(),
        &mut surface,
    )?;
    match command {
        FieldsCommand::Show => {}
        FieldsCommand::Set { assignments } => {
            for assignment in &assignments {
                let (name, value) = parse_assignment(assignment)?;
                session.handle(field_event(name, value), &mut surface)?;
            }
        }
        FieldsCommand::ResetSeed => {
            session.handle(UiEvent::ResetSeed, &mut surface)?;
        }
        FieldsCommand::ResetAll => {
            session.handle(UiEvent::ResetAll, &mut surface)?;
        }
    }
    print_form(session.form());
    Ok(0)
}

fn run_results(config: &ClientConfig, command: ResultsCommand) -> Result<i32> {
    let mut surface = TerminalSurface::new(config);
    let mut session = open_session(
        config,
        Box::new(Passthrough),
        PageConfig::default(),
        &mut surface,
    )?;
    match command {
        ResultsCommand::List => {
            if session.gallery().is_empty() {
                println!("No results yet.");
            }
            for (index, entry) in session.gallery().entries().iter().enumerate() {
                println!("[{index}] {}  {}", config.resolve_url(&entry.src), entry.alt);
            }
        }
        ResultsCommand::Recall { index } => {
            session.handle(UiEvent::ResultClicked(index), &mut surface)?;
            print_form(session.form());
        }
    }
    Ok(0)
}

fn run_translate(config: &ClientConfig, args: TranslateArgs) -> Result<i32> {
    if !config.translate.is_configured() {
        bail!("translation needs DREAM_TRANSLATE_APP_KEY and DREAM_TRANSLATE_APP_SECRET");
    }
    let translator = YoudaoTranslator::new(&config.translate)?;
    match translator.translate_detailed(&args.text) {
        Translation::Translated(text) => {
            println!("{text}");
            Ok(0)
        }
        Translation::Fallback { text, reason } => {
            eprintln!("untranslated: {reason}");
            println!("{text}");
            Ok(2)
        }
    }
}

fn open_session(
    config: &ClientConfig,
    translator: Box<dyn Translator>,
    page: PageConfig,
    surface: &mut TerminalSurface,
) -> Result<CliSession> {
    let backend = HttpBackend::new(&config.server_url)?;
    let session = Session::start(
        FormState::dream_defaults(),
        JsonFileStore::new(config.fields_path()),
        translator,
        backend,
        page,
        surface,
    );
    session.with_journal(ResultLog::new(config.results_path()))
}

fn select_translator(config: &ClientConfig, disabled: bool) -> Result<Box<dyn Translator>> {
    if disabled {
        return Ok(Box::new(Passthrough));
    }
    if !config.translate.is_configured() {
        tracing::debug!("translation not configured; sending prompts as typed");
        return Ok(Box::new(Passthrough));
    }
    Ok(Box::new(YoudaoTranslator::new(&config.translate)?))
}

fn resolve_page_config(config: &ClientConfig) -> Result<PageConfig> {
    if let Some(available) = config.gfpgan_available {
        return Ok(PageConfig {
            gfpgan_model_exists: available,
        });
    }
    let backend = HttpBackend::new(&config.server_url)?;
    Ok(backend.page_config().unwrap_or_else(|err| {
        tracing::warn!("page config unavailable, assuming defaults: {err:#}");
        PageConfig::default()
    }))
}

fn field_event(name: &str, value: &str) -> UiEvent {
    UiEvent::FieldChanged {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_assignment(raw: &str) -> Result<(&str, &str)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("expected NAME=VALUE, got '{raw}'");
    }
    Ok((name, value))
}

fn print_form(form: &FormState) {
    let width = form
        .entries()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or_default();
    for (name, value) in form.entries() {
        let shown = match value {
            FieldValue::File(None) => "<none>".to_string(),
            other => other.display_text(),
        };
        println!("{name:<width$}  {shown}");
    }
}
