//! Command-line interface

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::archiver::{ArchiveSettings, Archiver};
use crate::auth::{
    Authenticator, ClientCredentials, OAuthAuthenticator, CLIENT_ID_ENV, CLIENT_SECRET_ENV,
};
use crate::config::{validate_batch_size, Config};
use crate::error::ArchiveError;
use crate::models::{AggregateResult, BatchOutcome, RoundResult};
use crate::observer::{ArchiveObserver, BatchPosition};

type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Parser, Debug)]
#[command(name = "gmail-archiver")]
#[command(version)]
#[command(about = "Archive all emails from your Gmail inbox using the Gmail API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "archiver.toml", global = true)]
    pub config: PathBuf,

    /// Path to token cache file (overrides auth.token_cache)
    #[arg(long, global = true)]
    pub token_cache: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// OAuth client credentials; prompted for when absent
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Google OAuth Client ID
    #[arg(long, env = CLIENT_ID_ENV)]
    pub client_id: Option<String>,

    /// Google OAuth Client Secret
    #[arg(long, env = CLIENT_SECRET_ENV, hide_env_values = true)]
    pub client_secret: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive all emails from the inbox
    Archive {
        /// Preview what would be archived without making changes
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        credentials: CredentialArgs,

        /// Number of emails to process in each batch [default: 100]
        #[arg(long)]
        batch_size: Option<usize>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check inbox status without making changes
    Status {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Write a configuration file with default settings
    InitConfig {
        /// Where to write the file
        #[arg(short, long, default_value = "archiver.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Interactive input, behind a trait so credential handling can be tested
pub trait Prompt {
    fn text(&self, message: &str) -> Result<String>;

    /// Input that must not be echoed
    fn secret(&self, message: &str) -> Result<String>;

    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Terminal prompts via inquire
#[derive(Debug, Clone, Copy, Default)]
pub struct InquirePrompt;

fn map_inquire_error(error: inquire::InquireError) -> ArchiveError {
    use inquire::InquireError;

    match error {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            ArchiveError::Cancelled("prompt interrupted".to_string())
        }
        InquireError::IO(e) => ArchiveError::Io(e),
        other => ArchiveError::Io(std::io::Error::other(other.to_string())),
    }
}

impl Prompt for InquirePrompt {
    fn text(&self, message: &str) -> Result<String> {
        inquire::Text::new(message).prompt().map_err(map_inquire_error)
    }

    fn secret(&self, message: &str) -> Result<String> {
        inquire::Password::new(message)
            .without_confirmation()
            .with_display_mode(inquire::PasswordDisplayMode::Hidden)
            .prompt()
            .map_err(map_inquire_error)
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        inquire::Confirm::new(message)
            .with_default(false)
            .prompt()
            .map_err(map_inquire_error)
    }
}

/// Fill in missing credentials interactively, then reject blanks
///
/// Runs before any network call so a missing id or secret never reaches
/// the OAuth flow.
pub fn resolve_credentials(args: &CredentialArgs, prompt: &dyn Prompt) -> Result<ClientCredentials> {
    let client_id = match args.client_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => prompt.text("Enter your Google OAuth Client ID:")?,
    };

    let client_secret = match args.client_secret.as_deref().map(str::trim) {
        Some(secret) if !secret.is_empty() => secret.to_string(),
        _ => prompt.secret("Enter your Google OAuth Client Secret:")?,
    };

    ClientCredentials::new(client_id, client_secret)
}

/// Flag wins over the config file
pub fn resolve_batch_size(flag: Option<usize>, config: &Config) -> Result<usize> {
    let batch_size = flag.unwrap_or(config.archive.batch_size);
    validate_batch_size(batch_size)?;
    Ok(batch_size)
}

/// Build the OAuth authenticator from config and flags
pub fn build_authenticator(
    cli: &Cli,
    config: &Config,
    credentials: ClientCredentials,
) -> OAuthAuthenticator {
    let token_cache = cli
        .token_cache
        .clone()
        .unwrap_or_else(|| config.auth.token_cache.clone());

    OAuthAuthenticator::new(credentials, token_cache).with_request_timeout(config.request_timeout())
}

/// Spinner and bar styles shared by the archive and status commands
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    /// Use an existing MultiProgress so log lines print above the bars
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        self.println(format!("  ✓ {}", msg));
    }

    pub fn println(&self, msg: impl AsRef<str>) {
        // Falls back to plain stdout when no terminal is attached
        if self.multi.println(msg.as_ref()).is_err() {
            println!("{}", msg.as_ref());
        }
    }
}

/// Renders archive progress as a spinner per enumeration and a bar per round
pub struct ProgressObserver {
    reporter: ProgressReporter,
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            reporter: ProgressReporter::with_multi_progress(multi),
            current: Mutex::new(None),
        }
    }

    fn replace_current(&self, pb: Option<ProgressBar>) -> Option<ProgressBar> {
        match self.current.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, pb),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), pb),
        }
    }

    fn with_current(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.current.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ArchiveObserver for ProgressObserver {
    fn round_started(&self, round: u32, inbox_estimate: u32) {
        self.reporter.println(format!("\n--- Round {} ---", round));
        let spinner = self.reporter.add_spinner(&format!(
            "Scanning inbox (~{} emails)...",
            inbox_estimate
        ));
        if let Some(old) = self.replace_current(Some(spinner)) {
            old.finish_and_clear();
        }
    }

    fn ids_fetched(&self, total_so_far: usize) {
        self.with_current(|pb| pb.set_message(format!("Found {} messages so far...", total_so_far)));
    }

    fn enumeration_finished(&self, _round: u32, count: usize) {
        if let Some(spinner) = self.replace_current(None) {
            let msg = if count == 0 {
                "No more emails found in inbox".to_string()
            } else {
                format!("Found {} emails to archive in this round", count)
            };
            self.reporter.finish_spinner(&spinner, &msg);
        }

        if count > 0 {
            let bar = self
                .reporter
                .add_progress_bar(count as u64, "Archiving emails...");
            self.replace_current(Some(bar));
        }
    }

    fn batch_finished(&self, position: BatchPosition, outcome: &BatchOutcome) {
        self.with_current(|pb| {
            pb.inc(outcome.size() as u64);
            pb.set_message(format!("batch {}/{}", position.number, position.total));
        });

        if let BatchOutcome::Failed { size, error } = outcome {
            self.reporter.println(format!(
                "  ✗ Failed to archive batch {}/{} ({} emails): {}",
                position.number, position.total, size, error
            ));
        }
    }

    fn round_finished(&self, round: u32, result: &RoundResult) {
        if let Some(bar) = self.replace_current(None) {
            bar.finish_and_clear();
        }
        self.reporter.println(format!(
            "  ✓ Round {} complete: {} archived, {} failed",
            round, result.success, result.failed
        ));
    }

    fn round_settled(&self, _round: u32, before: u32, after: u32) {
        self.reporter.println(format!(
            "  Inbox count after round: {} (was {}, change {})",
            after,
            before,
            i64::from(before) - i64::from(after)
        ));
    }
}

/// Result of a finished archive run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub result: AggregateResult,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }

    /// Human-readable summary printed at the end of `archive`
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.dry_run {
            out.push_str(&format!(
                "✅ DRY RUN: Would have archived {} emails\n",
                self.result.success
            ));
        } else {
            out.push_str("✅ Archiving complete!\n");
            out.push_str(&format!(
                "   Successfully archived: {} emails\n",
                self.result.success
            ));
            if self.result.failed > 0 {
                out.push_str(&format!(
                    "   Failed to archive: {} emails\n",
                    self.result.failed
                ));
            }
        }

        let duration = self.duration_seconds();
        out.push_str(&format!(
            "   Rounds: {}, elapsed: {}m {}s\n",
            self.result.rounds,
            duration / 60,
            duration % 60
        ));
        out
    }
}

/// How the `archive` command ended without error
#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    /// The inbox estimate was zero before starting
    NothingToArchive,
    /// The user declined the confirmation prompt
    Declined,
    Completed(RunSummary),
}

/// Resolved options of the `archive` subcommand
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    pub dry_run: bool,
    pub batch_size: usize,
    pub yes: bool,
}

/// Everything a networked command needs before it can connect
pub struct CommandContext {
    pub config: Config,
    pub authenticator: OAuthAuthenticator,
}

/// Resolve credentials, load the config file and build the OAuth authenticator
///
/// Credentials are resolved first so a missing id or secret is reported
/// before any file or network access.
pub async fn prepare(
    cli: &Cli,
    credentials: &CredentialArgs,
    prompt: &dyn Prompt,
    multi: &MultiProgress,
) -> Result<CommandContext> {
    let credentials = multi.suspend(|| resolve_credentials(credentials, prompt))?;
    let config = Config::load(&cli.config).await?;
    let authenticator = build_authenticator(cli, &config, credentials);

    Ok(CommandContext {
        config,
        authenticator,
    })
}

/// The `archive` command: connect, report the estimate, confirm, run rounds
pub async fn run_archive<A: Authenticator>(
    authenticator: &A,
    settings: ArchiveSettings,
    options: &ArchiveOptions,
    prompt: &dyn Prompt,
    multi: MultiProgress,
) -> Result<ArchiveOutcome> {
    let reporter = ProgressReporter::with_multi_progress(multi.clone());

    let auth_spinner = reporter.add_spinner("🔐 Authenticating with Google...");
    let connected = Archiver::connect(authenticator, settings).await;
    auth_spinner.finish_and_clear();
    let archiver = connected?.with_observer(ProgressObserver::new(multi.clone()));
    reporter.println("  ✓ Successfully connected to Gmail API");

    let inbox_count = archiver
        .try_inbox_count()
        .await
        .map_err(ArchiveError::Enumeration)?;
    if inbox_count == 0 {
        reporter.println("No emails found in inbox. Nothing to archive.");
        return Ok(ArchiveOutcome::NothingToArchive);
    }

    reporter.println(format!("Found approximately {} emails in inbox", inbox_count));

    if options.dry_run {
        reporter.println("\n🔍 DRY RUN MODE - No changes will be made");
    } else {
        reporter.println("\n⚠️  This will archive ALL emails from your inbox!");
        reporter.println(
            "Archived emails will remain accessible in 'All Mail' but will be removed from inbox.",
        );
    }

    if !options.yes && !options.dry_run {
        let confirmed = multi.suspend(|| prompt.confirm("Do you want to continue?"))?;
        if !confirmed {
            reporter.println("Operation cancelled.");
            return Ok(ArchiveOutcome::Declined);
        }
    }

    reporter.println("\nStarting archiving process...");
    let started_at = Utc::now();
    let result = archiver
        .archive_all_inbox(options.dry_run, options.batch_size)
        .await?;

    Ok(ArchiveOutcome::Completed(RunSummary {
        result,
        dry_run: options.dry_run,
        started_at,
        completed_at: Utc::now(),
    }))
}

/// The `status` command: connect and report the inbox estimate
pub async fn run_status<A: Authenticator>(
    authenticator: &A,
    settings: ArchiveSettings,
    multi: MultiProgress,
) -> Result<u32> {
    let reporter = ProgressReporter::with_multi_progress(multi);
    let spinner = reporter.add_spinner("Checking inbox...");

    let count = async {
        let archiver = Archiver::connect(authenticator, settings).await?;
        archiver
            .try_inbox_count()
            .await
            .map_err(ArchiveError::Enumeration)
    }
    .await;
    spinner.finish_and_clear();

    count
}

/// The `init-config` command: write a config file holding every default
pub async fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(ArchiveError::Config(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }

    Config::default().save(output).await
}
