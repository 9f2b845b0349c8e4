//! pftoolkit CLI - command line access to PlayFab accounts and entity files.
//!
//! Account commands talk to the identity service directly. File commands
//! log in first (custom id or email), fetch the entity token and hand it to
//! the file service before running.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pftoolkit_common::Credential;
use pftoolkit_services::{
    AuthService, BackendKind, FileService, ServiceRegistry, ToolkitConfig,
};

#[derive(Parser)]
#[command(name = "pftoolkit")]
#[command(about = "PlayFab toolkit - accounts and entity file storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// PlayFab title id.
    #[arg(short, long, env = "PLAYFAB_TITLE_ID")]
    title_id: Option<String>,

    /// API endpoint override.
    #[arg(long, env = "PLAYFAB_ENDPOINT")]
    endpoint: Option<String>,

    /// JSON configuration file; flags take precedence over its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a throwaway in-memory backend instead of PlayFab.
    ///
    /// Accounts and files live only for this one command; nothing carries
    /// over to the next run.
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How file commands authenticate.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct LoginArgs {
    /// Log in with a custom id (the account is created if needed).
    #[arg(long)]
    custom_id: Option<String>,

    /// Log in with an email address (password is prompted).
    #[arg(long)]
    email: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account.
    Register {
        /// Account email address.
        #[arg(short, long)]
        email: String,

        /// Display name shown to other players.
        #[arg(short, long)]
        display_name: String,
    },

    /// Log in with email and password.
    Login {
        /// Account email address.
        #[arg(short, long)]
        email: String,
    },

    /// Send a password recovery email.
    ResetPassword {
        /// Account email address.
        #[arg(short, long)]
        email: String,
    },

    /// Check the configuration without contacting the backend.
    ValidateConfig,

    /// List entity files.
    List {
        #[command(flatten)]
        login: LoginArgs,

        /// Only list files whose name starts with this prefix.
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Upload a file.
    Upload {
        #[command(flatten)]
        login: LoginArgs,

        /// Local file to upload.
        #[arg(short, long)]
        file: PathBuf,

        /// Remote file name (default: local file name).
        #[arg(short, long)]
        name: Option<String>,

        /// Content type sent with the raw upload.
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,

        /// Retention prefix applied after the upload.
        #[arg(short, long, requires = "keep")]
        prefix: Option<String>,

        /// Number of files kept under the retention prefix.
        #[arg(short, long, requires = "prefix")]
        keep: Option<usize>,
    },

    /// Download a file.
    Download {
        #[command(flatten)]
        login: LoginArgs,

        /// Remote file name.
        #[arg(short, long)]
        name: String,

        /// Where to write the bytes.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete files by name.
    Delete {
        #[command(flatten)]
        login: LoginArgs,

        /// Remote file names.
        #[arg(short, long, required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Delete the oldest files under a prefix.
    Cleanup {
        #[command(flatten)]
        login: LoginArgs,

        /// File name prefix.
        #[arg(short, long)]
        prefix: String,

        /// Number of files to keep.
        #[arg(short, long)]
        keep: usize,
    },

    /// Delete every file under a prefix.
    Purge {
        #[command(flatten)]
        login: LoginArgs,

        /// File name prefix.
        #[arg(short, long)]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;

    if let Commands::ValidateConfig = cli.command {
        return cmd_validate_config(&config);
    }

    let mut registry = ServiceRegistry::new();
    if !registry.initialize_with(config) {
        anyhow::bail!("Failed to initialize the toolkit");
    }
    let auth = registry.auth().context("Auth service unavailable")?;
    let files = registry.files().context("File service unavailable")?;

    match cli.command {
        Commands::Register {
            email,
            display_name,
        } => cmd_register(auth.as_ref(), &email, &display_name).await,

        Commands::Login { email } => cmd_login(auth.as_ref(), &email).await,

        Commands::ResetPassword { email } => cmd_reset_password(auth.as_ref(), &email).await,

        Commands::ValidateConfig => Ok(()),

        Commands::List { login, prefix } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            cmd_list(files.as_ref(), prefix.as_deref()).await
        }

        Commands::Upload {
            login,
            file,
            name,
            content_type,
            prefix,
            keep,
        } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            let retention = prefix.zip(keep);
            cmd_upload(files.as_ref(), &file, name, &content_type, retention).await
        }

        Commands::Download {
            login,
            name,
            output,
        } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            cmd_download(files.as_ref(), &name, &output).await
        }

        Commands::Delete { login, name } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            cmd_delete(files.as_ref(), &name).await
        }

        Commands::Cleanup {
            login,
            prefix,
            keep,
        } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            cmd_cleanup(files.as_ref(), &prefix, keep).await
        }

        Commands::Purge { login, prefix } => {
            sign_in(auth.as_ref(), files.as_ref(), &login).await?;
            cmd_purge(files.as_ref(), &prefix).await
        }
    }
}

/// Merge the config file (if any) with command line flags.
fn load_config(cli: &Cli) -> Result<ToolkitConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            ToolkitConfig::from_json(&json).context("Failed to parse config file")?
        }
        None => {
            let title_id = cli
                .title_id
                .clone()
                .context("No title id given; use --title-id or PLAYFAB_TITLE_ID")?;
            ToolkitConfig::new(title_id)
        }
    };

    if let Some(title_id) = &cli.title_id {
        config.title_id = title_id.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if cli.offline {
        config.backend = BackendKind::Memory;
    }

    Ok(config)
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Credential> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Credential::new(password))
}

/// Authenticate and bind the resulting entity to the file service.
async fn sign_in(auth: &dyn AuthService, files: &dyn FileService, login: &LoginArgs) -> Result<()> {
    match (&login.custom_id, &login.email) {
        (Some(custom_id), _) => {
            let playfab_id = auth
                .login_with_custom_id(custom_id)
                .await
                .context("Custom id login failed")?;
            info!("Logged in as {}", playfab_id);
        }
        (None, Some(email)) => {
            let password = prompt_password("Password: ")?;
            let outcome = auth
                .login_with_email(email, password.expose())
                .await
                .context("Login failed")?;
            info!("{}", outcome.message);
        }
        (None, None) => anyhow::bail!("Use --custom-id or --email to log in"),
    }

    let entity = auth
        .get_entity_token()
        .await
        .context("Failed to obtain entity token")?;
    files.set_entity(entity).await;
    Ok(())
}

/// Register a new account.
async fn cmd_register(auth: &dyn AuthService, email: &str, display_name: &str) -> Result<()> {
    let password = prompt_password("Enter password: ")?;
    let confirm = prompt_password("Confirm password: ")?;

    if password.expose() != confirm.expose() {
        anyhow::bail!("Passwords do not match");
    }

    let outcome = auth
        .register_with_email(email, password.expose(), display_name)
        .await
        .context("Registration failed")?;

    println!("{}", outcome.message);
    if let Some(name) = outcome.display_name {
        println!("  Display name: {}", name);
    }

    Ok(())
}

/// Log in with email and password.
async fn cmd_login(auth: &dyn AuthService, email: &str) -> Result<()> {
    let password = prompt_password("Password: ")?;

    let outcome = auth
        .login_with_email(email, password.expose())
        .await
        .context("Login failed")?;

    println!("{}", outcome.message);
    match outcome.display_name {
        Some(name) => println!("  Welcome back, {}!", name),
        None => println!("  No display name set."),
    }

    let entity = auth
        .get_entity_token()
        .await
        .context("Failed to obtain entity token")?;
    println!("  Entity: {}", entity);

    Ok(())
}

/// Request a password recovery email.
async fn cmd_reset_password(auth: &dyn AuthService, email: &str) -> Result<()> {
    let message = auth
        .reset_password(email)
        .await
        .context("Password reset failed")?;
    println!("{}", message);
    Ok(())
}

/// Validate configuration and print warnings.
fn cmd_validate_config(config: &ToolkitConfig) -> Result<()> {
    let warnings = config.validate().context("Invalid configuration")?;

    for warning in &warnings {
        warn!("{}", warning);
    }

    println!("Configuration:");
    println!("  Title ID: {}", config.title_id);
    println!("  Endpoint: {}", config.endpoint_url()?);
    println!("  Backend: {}", serde_json::to_string(&config.backend)?);

    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration is valid with {} warning(s).", warnings.len());
    }

    Ok(())
}

/// List files, optionally filtered by prefix.
async fn cmd_list(files: &dyn FileService, prefix: Option<&str>) -> Result<()> {
    let records = match prefix {
        Some(prefix) => files.get_files_by_prefix(prefix).await,
        None => files.get_file_list().await,
    }
    .context("Failed to list files")?;

    if records.is_empty() {
        println!("No files.");
        return Ok(());
    }

    println!("{} file(s):", records.len());
    for record in records {
        println!(
            "  {:<32} {:>10} bytes  {}",
            record.name,
            record.size_bytes,
            record.last_modified.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Upload a local file, optionally applying retention.
async fn cmd_upload(
    files: &dyn FileService,
    path: &Path,
    name: Option<String>,
    content_type: &str,
    retention: Option<(String, usize)>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Cannot derive a file name; use --name")?,
    };

    info!("Uploading {} as {}", path.display(), name);
    let data = tokio::fs::read(path)
        .await
        .context("Failed to read source file")?;
    let size = data.len();

    match retention {
        Some((prefix, keep)) => files
            .upload_file_with_management(data, &name, content_type, &prefix, keep)
            .await
            .context("Failed to upload file")?,
        None => files
            .upload_file(data, &name, content_type)
            .await
            .context("Failed to upload file")?,
    }

    println!("File uploaded: {} ({} bytes)", name, size);
    Ok(())
}

/// Download a file to disk.
async fn cmd_download(files: &dyn FileService, name: &str, output: &Path) -> Result<()> {
    let data = files
        .download_file(name)
        .await
        .context("Failed to download file")?;

    tokio::fs::write(output, &data)
        .await
        .context("Failed to write output file")?;

    println!("File downloaded: {} ({} bytes)", output.display(), data.len());
    Ok(())
}

/// Delete files by name.
async fn cmd_delete(files: &dyn FileService, names: &[String]) -> Result<()> {
    files
        .delete_files(names)
        .await
        .context("Failed to delete files")?;
    println!("Deleted {} file(s).", names.len());
    Ok(())
}

/// Keep only the newest files under a prefix.
async fn cmd_cleanup(files: &dyn FileService, prefix: &str, keep: usize) -> Result<()> {
    let deleted = files
        .cleanup_files_by_prefix(prefix, keep)
        .await
        .context("Cleanup failed")?;
    println!("Deleted {} file(s) under '{}'.", deleted, prefix);
    Ok(())
}

/// Delete every file under a prefix.
async fn cmd_purge(files: &dyn FileService, prefix: &str) -> Result<()> {
    let deleted = files
        .delete_files_by_prefix(prefix)
        .await
        .context("Purge failed")?;
    println!("Deleted {} file(s) under '{}'.", deleted, prefix);
    Ok(())
}
