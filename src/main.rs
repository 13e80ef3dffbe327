use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repo_upload::config::LoggingConfig;
use repo_upload::github::auth_setup;
use repo_upload::health::{CheckResult, CheckTarget};
use repo_upload::{
    scan_directory_with, Config, ContentsClient, Credentials, FileRecord, HealthCheck,
    ScanOptions, UploadReport, UploadRequest, Uploader,
};

#[derive(Parser)]
#[command(name = "repo-upload")]
#[command(about = "Upload local files to a GitHub repository through the Contents API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Repository target flags shared by the upload commands
#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Repository owner (user or organization)
    #[arg(long)]
    owner: Option<String>,

    /// Repository name
    #[arg(long)]
    repo: Option<String>,

    /// Branch to commit to
    #[arg(short, long)]
    branch: Option<String>,

    /// Commit message for every file
    #[arg(short, long)]
    message: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every file under a directory
    Upload {
        /// Local directory to upload
        dir: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Directory inside the repository to upload into
        #[arg(short, long)]
        prefix: Option<String>,

        /// Glob pattern to skip (repeatable)
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,

        /// Descend into symlinked directories
        #[arg(long)]
        follow_symlinks: bool,

        /// Only list the files that would be uploaded
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload the file records listed in a JSON manifest
    Manifest {
        /// JSON array of {"path", "content", "encoding"} records
        file: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show the records a directory scan would produce
    Scan {
        /// Local directory to scan
        dir: PathBuf,

        /// Directory inside the repository to upload into
        #[arg(short, long)]
        prefix: Option<String>,

        /// Glob pattern to skip (repeatable)
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,

        /// Descend into symlinked directories
        #[arg(long)]
        follow_symlinks: bool,
    },

    /// Write a configuration file
    Init {
        /// Default repository owner
        #[arg(long)]
        owner: Option<String>,

        /// Default repository name
        #[arg(long)]
        repo: Option<String>,

        /// Default branch
        #[arg(long)]
        branch: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Check token, repository and branch before uploading
    Doctor {
        #[command(flatten)]
        target: TargetArgs,

        /// Local directory to check
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Explain how to provide a token
    Setup,

    /// Verify the token against the API
    Status,
}

/// What `scan` and `upload --dry-run` print per file
#[derive(Serialize)]
struct ScannedFile<'a> {
    path: &'a str,
    encoding: &'a str,
    bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; GITHUB_TOKEN may come from the environment
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // init may point --config at a file that does not exist yet
    let is_init = matches!(cli.command, Commands::Init { .. });
    let config = load_config(cli.config.as_deref(), is_init)?;
    init_logging(cli.verbose, &config.logging)?;

    match dotenv {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    info!("Starting repo-upload v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Upload {
            dir,
            target,
            prefix,
            exclude,
            follow_symlinks,
            dry_run,
        } => {
            let options = scan_options(exclude, follow_symlinks, &config);
            cmd_upload(&dir, &target, prefix, &options, dry_run, &config).await
        }
        Commands::Manifest { file, target } => cmd_manifest(&file, &target, &config).await,
        Commands::Scan {
            dir,
            prefix,
            exclude,
            follow_symlinks,
        } => cmd_scan(
            &dir,
            prefix,
            &scan_options(exclude, follow_symlinks, &config),
            &config,
        ),
        Commands::Init {
            owner,
            repo,
            branch,
            force,
        } => cmd_init(cli.config.as_deref(), owner, repo, branch, force, &config),
        Commands::Auth { auth_command } => match auth_command {
            AuthCommands::Setup => auth_setup::setup_authentication(),
            AuthCommands::Status => auth_setup::test_authentication(&config).await,
        },
        Commands::Doctor { target, dir } => cmd_doctor(&target, dir.as_deref(), &config).await,
    }
}

/// Initialize logging; logs go to stderr so stdout stays parseable
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("Invalid log level: {}", default_level))?;

    let layer = fmt::layer().with_writer(std::io::stderr);

    match logging.format.as_str() {
        "pretty" => tracing_subscriber::registry()
            .with(layer.pretty())
            .with(filter)
            .init(),
        "full" => tracing_subscriber::registry().with(layer).with(filter).init(),
        _ => tracing_subscriber::registry()
            .with(layer.compact())
            .with(filter)
            .init(),
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>, allow_missing: bool) -> Result<Config> {
    match config_path {
        Some(path) if allow_missing && !path.exists() => Ok(Config::default()),
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Combine CLI flags with configuration defaults
fn resolve_request(target: &TargetArgs, config: &Config) -> Result<UploadRequest> {
    let owner = target
        .owner
        .clone()
        .or_else(|| config.github.owner.clone())
        .ok_or_else(|| anyhow!("Repository owner missing: pass --owner or set github.owner"))?;
    let repo = target
        .repo
        .clone()
        .or_else(|| config.github.repo.clone())
        .ok_or_else(|| anyhow!("Repository name missing: pass --repo or set github.repo"))?;

    Ok(UploadRequest::new(owner, repo)
        .with_branch(
            target
                .branch
                .clone()
                .unwrap_or_else(|| config.upload.branch.clone()),
        )
        .with_message(
            target
                .message
                .clone()
                .unwrap_or_else(|| config.upload.commit_message.clone()),
        ))
}

fn scan_options(exclude: Vec<String>, follow_symlinks: bool, config: &Config) -> ScanOptions {
    ScanOptions::with_excludes(config.upload.exclude_patterns.iter().cloned().chain(exclude))
        .follow_symlinks(follow_symlinks || config.upload.follow_symlinks)
}

fn uploader(config: &Config) -> Result<Uploader<ContentsClient>> {
    let credentials = Credentials::detect(config)?;
    let client = ContentsClient::with_timeout(
        &config.github.api_url,
        credentials.token,
        config.request_timeout(),
    )?;
    Ok(Uploader::new(client))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn print_records(records: &[FileRecord]) -> Result<()> {
    let listing: Vec<ScannedFile> = records
        .iter()
        .map(|record| ScannedFile {
            path: &record.path,
            encoding: &record.encoding,
            bytes: record.content.len(),
        })
        .collect();
    print_json(&listing)
}

/// Print the report and turn a failed batch into a non-zero exit
fn finish(report: &UploadReport) -> Result<()> {
    print_json(report)?;

    if !report.success {
        eprintln!(
            "❌ {} of {} file(s) failed",
            report.error_count,
            report.total()
        );
        std::process::exit(1);
    }

    eprintln!("✅ Uploaded {} file(s)", report.uploaded_count);
    Ok(())
}

/// Upload a directory
async fn cmd_upload(
    dir: &Path,
    target: &TargetArgs,
    prefix: Option<String>,
    options: &ScanOptions,
    dry_run: bool,
    config: &Config,
) -> Result<()> {
    let request = resolve_request(target, config)?;
    let prefix = prefix.unwrap_or_else(|| config.upload.remote_prefix.clone());

    let files = scan_directory_with(dir, Some(prefix.as_str()), options)
        .with_context(|| format!("Failed to scan {:?}", dir))?;

    if dry_run {
        eprintln!(
            "🔍 Dry run: {} file(s) would be uploaded to {} ({})",
            files.len(),
            request.full_name(),
            request.branch
        );
        return print_records(&files);
    }

    let report = uploader(config)?.upload_files(&request, files).await;
    finish(&report)
}

/// Upload the records of a JSON manifest
async fn cmd_manifest(file: &Path, target: &TargetArgs, config: &Config) -> Result<()> {
    let request = resolve_request(target, config)?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read manifest: {:?}", file))?;
    let files: Vec<FileRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", file))?;

    let report = uploader(config)?.upload_files(&request, files).await;
    finish(&report)
}

/// Print what a scan produces
fn cmd_scan(dir: &Path, prefix: Option<String>, options: &ScanOptions, config: &Config) -> Result<()> {
    let prefix = prefix.unwrap_or_else(|| config.upload.remote_prefix.clone());
    let files = scan_directory_with(dir, Some(prefix.as_str()), options)
        .with_context(|| format!("Failed to scan {:?}", dir))?;

    print_records(&files)
}

/// Write a configuration file seeded from the flags
fn cmd_init(
    config_path: Option<&Path>,
    owner: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    force: bool,
    config: &Config,
) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };

    if path.exists() && !force {
        return Err(anyhow!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            path
        ));
    }

    let mut new_config = config.clone();
    if owner.is_some() {
        new_config.github.owner = owner;
    }
    if repo.is_some() {
        new_config.github.repo = repo;
    }
    if let Some(branch) = branch {
        new_config.upload.branch = branch;
    }

    new_config.save(&path)?;
    info!("Configuration saved to: {:?}", path);

    println!("✅ repo-upload initialized");
    println!("   Config: {:?}", path);
    println!("   Next: set GITHUB_TOKEN and run 'repo-upload doctor'");

    Ok(())
}

/// Preflight checks
async fn cmd_doctor(target: &TargetArgs, dir: Option<&Path>, config: &Config) -> Result<()> {
    let owner = target.owner.as_deref().or(config.github.owner.as_deref());
    let repo = target.repo.as_deref().or(config.github.repo.as_deref());

    let health = HealthCheck::run(
        config,
        &CheckTarget {
            owner,
            repo,
            branch: target.branch.as_deref(),
            local_dir: dir,
        },
    )
    .await;

    print_health_report(&health);

    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 repo-upload Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings().len();
    if health.all_passed() {
        println!("✅ All checks passed ({} warning(s))", warnings);
    } else {
        println!(
            "❌ {} check(s) failed, {} warning(s)",
            health.errors().len(),
            warnings
        );
    }
}
