use anyhow::Result;
use clap::Parser;
use gmail_inbox_archiver::cli::{self, ArchiveOptions, ArchiveOutcome, Cli, Commands, InquirePrompt};
use gmail_inbox_archiver::error::{ArchiveError, GmailError};
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn buffer(&self) -> std::io::Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.buffer
            .lock()
            .map_err(|_| std::io::Error::other("log buffer lock poisoned"))
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer()?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer()?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: gmail-archiver --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick the provider explicitly
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_inbox_archiver=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_inbox_archiver=info,warn"))
    };

    // Logs print above progress bars
    let multi_progress = Arc::new(MultiProgress::new());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: Arc::clone(&multi_progress),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let multi = (*multi_progress).clone();

    match &cli.command {
        Commands::Archive {
            dry_run,
            credentials,
            batch_size,
            yes,
        } => {
            println!("Gmail Email Archiver");
            println!("{}", "=".repeat(50));

            let context = cli::prepare(&cli, credentials, &InquirePrompt, &multi).await?;
            let options = ArchiveOptions {
                dry_run: *dry_run,
                batch_size: cli::resolve_batch_size(*batch_size, &context.config)?,
                yes: *yes,
            };

            let outcome = cli::run_archive(
                &context.authenticator,
                context.config.archive_settings(),
                &options,
                &InquirePrompt,
                multi,
            )
            .await?;

            if let ArchiveOutcome::Completed(summary) = outcome {
                println!("\n{}", "=".repeat(50));
                print!("{}", summary.render());
            }

            Ok(())
        }

        Commands::Status { credentials } => {
            // Status is informational; failures are reported, not fatal
            let status = async {
                let context = cli::prepare(&cli, credentials, &InquirePrompt, &multi).await?;
                cli::run_status(
                    &context.authenticator,
                    context.config.archive_settings(),
                    multi.clone(),
                )
                .await
            }
            .await;

            match status {
                Ok(count) => println!("📧 Inbox contains approximately {} emails", count),
                Err(e) => {
                    eprintln!("❌ Error checking status: {}", e);
                    print_causes(&e);
                    if e.needs_credential_help() {
                        print_credential_help();
                    }
                }
            }
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            cli::run_init_config(output, *force).await?;

            println!("Created configuration file at: {:?}", output);
            println!("Pass it with --config to change batch size, page size or delays.");
            Ok(())
        }
    }
}

fn print_causes(error: &dyn std::error::Error) {
    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }
}

fn print_credential_help() {
    eprintln!("\nTo get OAuth credentials:");
    eprintln!("  1. Go to https://console.developers.google.com/");
    eprintln!("  2. Create a new project or select an existing one");
    eprintln!("  3. Enable the Gmail API");
    eprintln!("  4. Create credentials (OAuth 2.0 client ID)");
    eprintln!("  5. Select 'Desktop Application' as the application type");
    eprintln!("  6. Pass the Client ID and Client Secret via --client-id/--client-secret");
    eprintln!("     or the GMAIL_CLIENT_ID/GMAIL_CLIENT_SECRET environment variables");
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("❌ Error: {}", error);
    print_causes(&**error);

    let Some(archive_err) = error.downcast_ref::<ArchiveError>() else {
        return;
    };

    if archive_err.needs_credential_help() {
        print_credential_help();
        return;
    }

    match archive_err {
        ArchiveError::Enumeration(GmailError::RateLimitExceeded { .. }) => {
            eprintln!("\nHint: You've hit Gmail API rate limits.");
            eprintln!("      Wait a few minutes and run the command again.");
        }
        ArchiveError::Enumeration(e) if e.is_transient() => {
            eprintln!("\nHint: This may be a temporary API error.");
            eprintln!("      Run the command again; archived messages stay archived.");
        }
        ArchiveError::Config(_) => {
            eprintln!("\nHint: Check your configuration file for errors.");
        }
        ArchiveError::Cancelled(_) => {
            eprintln!("\nOperation cancelled.");
        }
        _ => {}
    }
}
