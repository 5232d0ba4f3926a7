use std::{
    fs::{self, File},
    io::{self, BufRead, Write},
    path::Path,
    process,
    sync::Arc,
};

use codebox::{
    application::{
        error::AppError,
        playground::{HostCommand, Playground},
        ports::{ConfirmGate, KeyValueStore, StorageKey},
    },
    config::{self, AssembleArgs, ClearArgs, FormatArgs},
    domain::buffers::Language,
    infra::{
        error::InfraError,
        store::{FileStore, MemoryStore},
        surface::DocumentWriter,
        telemetry,
    },
};
use tokio::sync::mpsc;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const SESSION_KEYS: [StorageKey; 4] = [
    StorageKey::Markup,
    StorageKey::Style,
    StorageKey::Script,
    StorageKey::ProjectName,
];

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Assemble(args) => run_assemble(&settings, args),
        config::Command::Clear(args) => run_clear(&settings, args).await,
        config::Command::Format(args) => run_format(&settings, args),
    }
}

fn run_assemble(settings: &config::Settings, args: AssembleArgs) -> Result<(), AppError> {
    let session = Arc::new(FileStore::open(&settings.storage.path)?);

    // Without --save the overrides only apply to a throwaway copy.
    let store: Arc<dyn KeyValueStore> = if args.save {
        session
    } else {
        let working = MemoryStore::new();
        for key in SESSION_KEYS {
            if let Some(value) = session.get(key.as_str()) {
                working.set(key.as_str(), &value);
            }
        }
        Arc::new(working)
    };

    let overrides = [
        (Language::Markup, args.markup.as_deref()),
        (Language::Style, args.style.as_deref()),
        (Language::Script, args.script.as_deref()),
    ];
    for (language, path) in overrides {
        if let Some(path) = path {
            let text = read_source(path)?;
            store.set(StorageKey::for_language(language).as_str(), &text);
        }
    }

    let sink: Box<dyn Write + Send> = match args.out.as_deref() {
        Some(path) => Box::new(File::create(path).map_err(InfraError::from)?),
        None => Box::new(io::stdout()),
    };

    let mut playground = Playground::builder(store, Box::new(DocumentWriter::new(sink)))
        .debounce(settings.preview.debounce)
        .default_project_name(settings.project.default_name.clone())
        .open();
    if args.save {
        playground.save();
    }
    info!(project = playground.project_name(), "document assembled");
    Ok(())
}

async fn run_clear(settings: &config::Settings, args: ClearArgs) -> Result<(), AppError> {
    let store = Arc::new(FileStore::open(&settings.storage.path)?);
    let confirm: Arc<dyn ConfirmGate> = if args.yes {
        Arc::new(|_: &str| true)
    } else {
        Arc::new(prompt_confirm)
    };

    let playground = Playground::builder(store, Box::new(DocumentWriter::new(io::sink())))
        .debounce(settings.preview.debounce)
        .default_project_name(settings.project.default_name.clone())
        .confirm(confirm)
        .open();

    let (commands, receiver) = mpsc::channel(1);
    commands
        .send(HostCommand::ClearCode)
        .await
        .map_err(|err| AppError::unexpected(format!("session loop closed: {err}")))?;
    drop(commands);

    let playground = playground.run(receiver).await;
    if !playground.buffers().is_empty() {
        info!("clear cancelled");
    }
    Ok(())
}

fn run_format(settings: &config::Settings, args: FormatArgs) -> Result<(), AppError> {
    let language: Language = args.language.parse()?;
    let store = Arc::new(FileStore::open(&settings.storage.path)?);

    let mut playground = Playground::builder(store, Box::new(DocumentWriter::new(io::sink())))
        .debounce(settings.preview.debounce)
        .default_project_name(settings.project.default_name.clone())
        .open();
    playground.switch_tab(language);
    if !playground.format() {
        return Err(AppError::unexpected(format!("failed to format the {language} buffer")));
    }
    info!(language = %language, "buffer formatted");
    Ok(())
}

fn read_source(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|err| InfraError::read_source(path, err).into())
}

/// Asks on stderr and reads the answer from stdin.
fn prompt_confirm(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
