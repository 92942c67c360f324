use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use identity::backend::HttpBackend;
use identity::clock::{Clock, SystemClock};
use identity::config::{
    ConfigError, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATE_FILE, HttpTimeouts,
    PortalConfig,
};
use identity::debug::{DebugError, DebugOverrideStore, ExpiryTimer};
use identity::invite::{InviteError, InviteToken};
use identity::storage::{FileStore, KeyValueStore, Preferences, StorageError};
use identity::validation::SignUpForm;
use identity::{ActionError, AuthContext, AuthError, AuthSnapshot, BackendError, GoTrueStore, SignUpOutcome};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod output;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Debug(#[from] DebugError),
    #[error(transparent)]
    Invite(#[from] InviteError),
    #[error("reading input failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("timed out waiting for auth state to settle")]
    Timeout,
}

#[derive(Parser, Debug)]
#[command(name = "portal-cli", about = "Partner portal session and access CLI")]
struct Cli {
    #[arg(long, env = "PORTAL_IDENTITY_URL")]
    identity_url: Option<String>,

    #[arg(long, env = "PORTAL_IDENTITY_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    #[arg(long, env = "PORTAL_BACKEND_URL")]
    backend_url: Option<String>,

    #[arg(long, env = "PORTAL_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "PORTAL_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[arg(long, env = "PORTAL_STATE_FILE", default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// Link target for password recovery emails.
    #[arg(long, env = "PORTAL_RECOVERY_REDIRECT")]
    recovery_redirect: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn portal_config(&self) -> Result<PortalConfig, CliError> {
        let identity_url = self
            .identity_url
            .as_deref()
            .ok_or(ConfigError::Missing { var: "PORTAL_IDENTITY_URL" })?;
        let backend_url = self
            .backend_url
            .as_deref()
            .ok_or(ConfigError::Missing { var: "PORTAL_BACKEND_URL" })?;
        let anon_key = self.anon_key.as_deref().unwrap_or_default();
        let mut config = PortalConfig::from_parts(identity_url, anon_key, backend_url)?;
        config.timeouts = HttpTimeouts { request_secs: self.request_timeout_secs, connect_secs: self.connect_timeout_secs };
        config.state_file.clone_from(&self.state_file);
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the resolved state.
    Login {
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, default_value_t = false)]
        remember: bool,
    },
    /// Register a new account, optionally from an invitation token.
    Signup(SignupArgs),
    Logout,
    /// Print the current auth state and what the route guards would do.
    Status {
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Follow auth state changes until interrupted.
    Watch,
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        /// Recovery link (or just its `#access_token=...` fragment).
        #[arg(long)]
        link: Option<String>,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    UpdateProfile {
        first_name: String,
        last_name: String,
    },
    /// Show or set the preferred locale.
    Locale {
        value: Option<String>,
    },
    Debug(DebugCommand),
    Invite(InviteCommand),
}

#[derive(Args, Debug)]
struct SignupArgs {
    /// Required unless an invitation supplies it.
    #[arg(long, required_unless_present = "invite")]
    email: Option<String>,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long)]
    invite: Option<String>,
}

#[derive(Args, Debug)]
struct DebugCommand {
    #[command(subcommand)]
    command: DebugSubcommand,
}

#[derive(Subcommand, Debug)]
enum DebugSubcommand {
    Show,
    Enable,
    Disable,
    SetUrl { url: String },
    Reset,
}

#[derive(Args, Debug)]
struct InviteCommand {
    #[command(subcommand)]
    command: InviteSubcommand,
}

#[derive(Subcommand, Debug)]
enum InviteSubcommand {
    Decode {
        token: String,
    },
    Encode {
        #[arg(long)]
        organization_id: i64,
        #[arg(long, default_value = "")]
        organization_name: String,
        #[arg(long)]
        email: String,
    },
}

/// Everything a session-aware command needs, with the auth listener running.
struct Portal {
    ctx: Arc<AuthContext>,
    gotrue: Arc<GoTrueStore>,
    prefs: Preferences,
    debug: DebugOverrideStore,
}

impl Portal {
    async fn start(cli: &Cli) -> Result<Self, CliError> {
        let config = cli.portal_config()?;
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.state_file)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let debug = DebugOverrideStore::new(storage.clone());

        let mut gotrue = GoTrueStore::new(&config, storage.clone(), clock.clone())?;
        if let Some(url) = &cli.recovery_redirect {
            gotrue = gotrue.with_recovery_redirect(url.clone());
        }
        let gotrue = Arc::new(gotrue);
        let backend = Arc::new(HttpBackend::new(&config)?.with_debug_override(debug.clone()));

        match gotrue.restore().await {
            Some(session) => tracing::debug!(user_id = %session.user_id, "restored stored session"),
            None => tracing::debug!("no stored session"),
        }
        let ctx = Arc::new(AuthContext::new(gotrue.clone(), backend, clock));
        ctx.init();
        let portal = Self { ctx, gotrue, prefs: Preferences::new(storage), debug };
        portal.settled(|_| true).await?;
        Ok(portal)
    }

    /// Wait for a settled snapshot that also satisfies `pred`.
    async fn settled(&self, mut pred: impl FnMut(&AuthSnapshot) -> bool) -> Result<AuthSnapshot, CliError> {
        tokio::time::timeout(SETTLE_TIMEOUT, self.ctx.wait_until(|s| s.phase.is_settled() && pred(s)))
            .await
            .map_err(|_| CliError::Timeout)
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.ctx.teardown();
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Debug(debug) => run_debug(&cli, debug),
        Command::Invite(invite) => run_invite(invite),
        Command::Locale { value } => run_locale(&cli, value.as_deref()),
        _ => run_session(&cli).await,
    }
}

async fn run_session(cli: &Cli) -> Result<(), CliError> {
    let portal = Portal::start(cli).await?;
    match &cli.command {
        Command::Login { email, password, remember } => {
            let password = password_or_prompt(password.as_deref())?;
            portal.ctx.sign_in(email, &password).await?;
            if let Err(e) = portal.prefs.set_remembered_email(email.trim(), *remember) {
                tracing::warn!(error = %e, "could not persist remembered email");
            }
            let snapshot = portal.settled(|s| s.is_authenticated).await?;
            print_json(&output::snapshot_json(&snapshot, "/"))
        }
        Command::Signup(args) => run_signup(&portal, args).await,
        Command::Logout => {
            portal.ctx.sign_out().await?;
            let snapshot = portal.settled(|s| !s.is_authenticated).await?;
            print_json(&output::snapshot_json(&snapshot, "/"))
        }
        Command::Status { path } => print_json(&output::snapshot_json(&portal.ctx.snapshot(), path)),
        Command::Watch => run_watch(&portal).await,
        Command::ForgotPassword { email } => {
            portal.ctx.forgot_password(email).await?;
            eprintln!("If an account exists for {}, a reset link is on its way.", email.trim());
            Ok(())
        }
        Command::ResetPassword { link, password } => {
            if let Some(link) = link {
                let fragment = link.split_once('#').map_or(link.as_str(), |(_, f)| f);
                portal.gotrue.set_session_from_redirect(fragment).await?;
            }
            let password = password_or_prompt(password.as_deref())?;
            portal.ctx.reset_password(&password, &password).await?;
            eprintln!("Password updated.");
            Ok(())
        }
        Command::UpdateProfile { first_name, last_name } => {
            portal.ctx.update_profile(first_name, last_name).await?;
            let snapshot = portal.settled(|_| true).await?;
            print_json(&output::snapshot_json(&snapshot, "/"))
        }
        Command::Debug(_) | Command::Invite(_) | Command::Locale { .. } => Ok(()),
    }
}

async fn run_signup(portal: &Portal, args: &SignupArgs) -> Result<(), CliError> {
    let invite = args.invite.as_deref().map(InviteToken::decode).transpose()?;
    let email = invite
        .as_ref()
        .map(|i| i.email.clone())
        .or_else(|| args.email.clone())
        .unwrap_or_default();
    let password = password_or_prompt(args.password.as_deref())?;
    let form = SignUpForm {
        email,
        confirm_password: password.clone(),
        password,
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
    };
    match portal.ctx.sign_up(&form, invite.as_ref()).await? {
        SignUpOutcome::SignedIn => {
            let snapshot = portal.settled(|s| s.is_authenticated).await?;
            print_json(&output::snapshot_json(&snapshot, "/"))
        }
        SignUpOutcome::ConfirmationRequired => {
            eprintln!("Check {} to confirm the address, then log in.", form.email.trim());
            Ok(())
        }
    }
}

async fn run_watch(portal: &Portal) -> Result<(), CliError> {
    let refresher = portal.gotrue.spawn_auto_refresh();
    let mut expiry = ExpiryTimer::mount(portal.debug.clone());
    let mut rx = portal.ctx.subscribe();
    let result = loop {
        let snapshot = rx.borrow_and_update().clone();
        if let Err(e) = print_json_line(&output::snapshot_json(&snapshot, "/")) {
            break Err(e);
        }
        expiry.sync();
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };
    refresher.abort();
    result
}

fn run_debug(cli: &Cli, debug: &DebugCommand) -> Result<(), CliError> {
    let store = DebugOverrideStore::new(Arc::new(FileStore::open(&cli.state_file)?));
    match &debug.command {
        DebugSubcommand::Show => {}
        DebugSubcommand::Enable => store.enable()?,
        DebugSubcommand::Disable => store.disable()?,
        DebugSubcommand::SetUrl { url } => {
            store.set_backend_url(url)?;
        }
        DebugSubcommand::Reset => store.reset_backend_url()?,
    }
    print_json(&output::debug_json(&store.load()))
}

fn run_invite(invite: &InviteCommand) -> Result<(), CliError> {
    match &invite.command {
        InviteSubcommand::Decode { token } => print_json(&serde_json::to_value(InviteToken::decode(token)?)?),
        InviteSubcommand::Encode { organization_id, organization_name, email } => {
            let token = InviteToken {
                organization_id: *organization_id,
                organization_name: organization_name.clone(),
                email: email.clone(),
                timestamp: None,
            };
            // Round-trip so a bad email or id fails here, not at sign-up.
            let encoded = token.encode();
            InviteToken::decode(&encoded)?;
            println!("{encoded}");
            Ok(())
        }
    }
}

fn run_locale(cli: &Cli, value: Option<&str>) -> Result<(), CliError> {
    let prefs = Preferences::new(Arc::new(FileStore::open(&cli.state_file)?));
    if let Some(locale) = value {
        prefs.set_locale(locale)?;
    }
    println!("{}", prefs.locale());
    Ok(())
}

/// Use the given password, or read one line from stdin.
fn password_or_prompt(given: Option<&str>) -> Result<String, CliError> {
    if let Some(password) = given {
        return Ok(password.to_owned());
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_json_line(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
