use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use archivetube::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with YouTube (Google OAuth)
    Auth,

    /// Show what would be uploaded, without downloading anything
    Preview(CollectionOptions),

    /// Download, encode and upload a collection into a private playlist
    Process(ProcessOptions),

    /// Make an already processed collection public
    Publish(CollectionOptions),

    /// Run the web interface
    Serve,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct CollectionOptions {
    /// archive.org item URL or bare identifier
    pub url: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ProcessOptions {
    /// archive.org item URL or bare identifier
    pub url: String,

    /// Publish without asking once every track is uploaded
    #[clap(long, conflicts_with = "no_publish")]
    pub publish: bool,

    /// Leave everything private without asking
    #[clap(long)]
    pub no_publish: bool,
}

impl ProcessOptions {
    fn publish_choice(&self) -> Option<bool> {
        match (self.publish, self.no_publish) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command_for_update();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("{}", e.actionable()),
    };

    match cli.command {
        Command::Auth => cli::auth(settings).await,
        Command::Preview(opt) => cli::preview(settings, &opt.url).await,
        Command::Process(opt) => {
            let publish = opt.publish_choice();
            cli::process(settings, &opt.url, publish).await
        }
        Command::Publish(opt) => cli::publish(settings, &opt.url).await,
        Command::Serve => cli::serve(settings).await,
        Command::Completions(_) => {}
    }
}
