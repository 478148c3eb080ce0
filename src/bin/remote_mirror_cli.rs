//! Remote Mirror CLI
//!
//! Usage:
//!   remote-mirror whoami                     Show the connected account
//!   remote-mirror ls [path]                  Browse a remote folder
//!   remote-mirror open <folder>              Mirror a folder into staging
//!   remote-mirror expand <folder>            Mirror a nested folder
//!   remote-mirror fetch <virtual>            Fetch one document on demand
//!   remote-mirror save <virtual>             Push the staged copy back
//!   remote-mirror mkdir <parent> <name>      Create a remote folder
//!   remote-mirror rm <folder>                Delete a remote folder
//!   remote-mirror local-path <virtual>       Staging path of a virtual path
//!   remote-mirror preview-url <url>          Rewrite a live-preview URL
//!   remote-mirror config [--init]            Show or write the config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::Level;

use remote_mirror::config::{self, ACCESS_TOKEN_ENV};
use remote_mirror::{
    BrowseController, DropboxConfig, DropboxStore, Materializer, MemoryStore, MirrorConfig,
    Notifier, ProjectHost, RemoteStore, SaveSync, SavedDocument, TracingNotifier, Translator,
};

#[derive(Parser)]
#[command(
    name = "remote-mirror",
    about = "Remote Mirror CLI - browse and mirror Dropbox folders",
    version,
    long_about = "Projects are addressed as remote://<folder>.\nThe access token is read from DROPBOX_ACCESS_TOKEN unless --token is given."
)]
struct Cli {
    /// Dropbox access token
    #[arg(long, global = true)]
    token: Option<String>,
    /// Use a seeded in-memory store instead of Dropbox
    #[arg(long, global = true)]
    demo: bool,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Send user messages to the log instead of the terminal
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the account the token belongs to
    Whoami,
    /// Show a remote folder the way the browser dialog does
    Ls {
        /// Remote folder (default: /)
        #[arg(default_value = "/")]
        path: String,
    },
    /// Mirror a remote folder into staging and print its project URI
    Open {
        /// Remote folder
        folder: String,
    },
    /// Mirror a nested folder of an opened project
    Expand {
        /// Remote folder
        folder: String,
    },
    /// Fetch a document into staging unless a non-empty copy exists
    Fetch {
        /// Virtual path (e.g., remote://docs/readme.txt)
        path: String,
    },
    /// Push the staged copy of a document to the remote store
    Save {
        /// Virtual path
        path: String,
    },
    /// Create a folder
    Mkdir {
        /// Parent remote folder
        parent: String,
        /// New folder name
        name: String,
    },
    /// Delete a remote folder and everything below it
    Rm {
        /// Remote folder
        folder: String,
    },
    /// Print the staging path of a virtual path
    LocalPath {
        /// Virtual path
        path: String,
    },
    /// Rewrite a file:// live-preview URL to the staged file
    PreviewUrl {
        /// Preview URL (e.g., file://remote://site/index.html)
        url: String,
    },
    /// Show the configuration
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Prints messages and project hand-offs to the terminal
struct ConsoleHost;

impl Notifier for ConsoleHost {
    fn show_message(&self, message: &str) {
        eprintln!("{}", message);
    }
}

impl ProjectHost for ConsoleHost {
    fn open_project(&self, project_uri: &str) {
        println!("Project: {}", project_uri);
    }
}

fn demo_store() -> MemoryStore {
    MemoryStore::new("Demo User")
        .with_file("/readme.txt", b"Remote mirror demo\n")
        .with_file("/site/index.html", b"<html><body>Hello</body></html>\n")
        .with_file("/site/css/style.css", b"body { margin: 0; }\n")
        .with_file("/notes/todo.md", b"- write docs\n")
        .with_folder("/archive")
}

fn build_store(cli: &Cli, config: &MirrorConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    if cli.demo {
        return Ok(Arc::new(demo_store()));
    }
    let token = match &cli.token {
        Some(token) => token.clone(),
        None => std::env::var(ACCESS_TOKEN_ENV)
            .with_context(|| format!("No access token: pass --token or set {}", ACCESS_TOKEN_ENV))?,
    };
    Ok(Arc::new(DropboxStore::new(DropboxConfig::new(
        &token,
        config.request_timeout_secs,
    ))))
}

fn notifier(cli: &Cli) -> Arc<dyn Notifier> {
    if cli.quiet {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(ConsoleHost)
    }
}

fn browser(cli: &Cli, store: Arc<dyn RemoteStore>, materializer: Materializer) -> BrowseController {
    BrowseController::new(store, materializer, Arc::new(ConsoleHost), notifier(cli))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config();
    config::validate_config(&config)?;
    let translator = Translator::from_config(&config);

    // Commands that never touch the remote store
    match &cli.command {
        Commands::LocalPath { path } => {
            println!("{}", translator.to_local_path(path)?.display());
            return Ok(());
        }
        Commands::PreviewUrl { url } => {
            println!("{}", translator.map_preview_url(url));
            return Ok(());
        }
        Commands::Config { init } => {
            let path = config::get_config_path();
            if *init {
                config::save_config(&config)?;
            }
            println!("Config file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => {}
    }

    let store = build_store(&cli, &config)?;
    let materializer = Materializer::new(store.clone(), translator.clone());

    match &cli.command {
        Commands::Whoami => {
            store.authenticate().await?;
            let user = store.user_info().await?;
            match &user.email {
                Some(email) => println!("{} <{}>", user.name, email),
                None => println!("{}", user.name),
            }
        }
        Commands::Ls { path } => {
            let browser = browser(&cli, store, materializer);
            browser.open().await?;
            browser.navigate(path).await?;
            print!("{}", browser.view());
        }
        Commands::Open { folder } => {
            let browser = browser(&cli, store, materializer);
            browser.open().await?;
            browser.navigate(folder).await?;
            let report = browser.confirm_open().await?;
            println!("Staging: {}", report.staging_dir.display());
            println!(
                "{} files, {} folders",
                report.written.len(),
                report.placeholders.len()
            );
            for failure in &report.failures {
                eprintln!("  not mirrored: {} ({})", failure.name, failure.message);
            }
        }
        Commands::Expand { folder } => {
            let report = materializer.expand_folder(folder).await?;
            println!(
                "{}: {} files, {} folders",
                report.staging_dir.display(),
                report.written.len(),
                report.placeholders.len()
            );
            if !report.is_complete() {
                bail!("{} entries could not be mirrored", report.failures.len());
            }
        }
        Commands::Fetch { path } => {
            let content = materializer.open_on_demand(path).await?;
            println!(
                "{} ({} bytes)",
                translator.to_local_path(path)?.display(),
                content.len()
            );
        }
        Commands::Save { path } => {
            let local = translator.to_local_path(path)?;
            let text = tokio::fs::read_to_string(&local)
                .await
                .with_context(|| format!("Cannot read staged copy {}", local.display()))?;
            let sync = SaveSync::new(store, materializer, notifier(&cli));
            match sync.document_saved(&SavedDocument::new(path, &text)).await? {
                Some(report) => report.wait().await?,
                None => bail!("{} is not a remote document", path),
            }
        }
        Commands::Mkdir { parent, name } => {
            let browser = browser(&cli, store, materializer);
            browser.open().await?;
            browser.navigate(parent).await?;
            browser.create_folder(name).await?;
            print!("{}", browser.view());
        }
        Commands::Rm { folder } => {
            let browser = browser(&cli, store, materializer);
            browser.open().await?;
            browser.navigate(folder).await?;
            browser.delete_current_folder().await?;
            print!("{}", browser.view());
        }
        Commands::LocalPath { .. } | Commands::PreviewUrl { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}
