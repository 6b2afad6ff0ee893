//! LearnMore CLI - Command-line interface for LearnMore access control
//!
//! Inspects the role table, manages accounts and AI token balances, and runs
//! the metered tutor against a local account database.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use learnmore_access::{
    apply_checkout, AccountRecord, AccountStore, CheckoutCompleted, EntitlementResolver,
    FeatureLevel, GeminiProvider, MemoryQuestionSource, Permission, PlanOutcome, QuestionContext,
    Role, SqliteAccountStore, TokenCheckResult, TokenMeter, TutorRequest, TutorService,
};
use learnmore_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success,
    not_found_error, validation_error, LearnMoreConfig, LearnMoreError, LearnMoreResult,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "learnmore")]
#[command(about = "Role entitlements and AI token metering for LearnMore")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the permissions granted to a role
    Permissions {
        /// STUDENT, PRO, ULTIMATE, TEACHER or ADMIN
        role: Role,
    },

    /// Check whether a role holds a permission tag
    Check {
        role: Role,

        /// Permission tag, e.g. access:knowledge_graph
        permission: Permission,
    },

    /// Check whether a role may use a feature tier
    Feature {
        role: Role,

        /// FREE, PRO or ULTIMATE
        level: FeatureLevel,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Consume one AI token for a user
    Consume {
        /// User id
        user: String,
    },

    /// Apply a completed plan checkout to a user
    Upgrade {
        /// User id
        user: String,

        /// Plan name, e.g. "Scholar"
        plan: String,
    },

    /// Ask the AI tutor to explain a wrong answer
    Tutor {
        /// User id
        user: String,

        /// JSON file describing the question
        question: PathBuf,

        /// The wrong answer as JSON, e.g. '"B"' or '["A","C"]'
        wrong_answer: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create an account with the configured starting balance
    Create {
        user: String,

        #[arg(short, long, default_value = "STUDENT")]
        role: Role,

        /// Override the starting balance
        #[arg(short, long)]
        balance: Option<i64>,
    },

    /// Show an account
    Show { user: String },

    /// Add AI tokens to an account
    Credit { user: String, amount: i64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(LearnMoreConfig::default_path);
    let mut config = load_config(&config_path)?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting LearnMore CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Permissions { role } => handle_permissions(role),
        Commands::Check { role, permission } => handle_check(role, permission),
        Commands::Feature { role, level } => handle_feature(role, level),
        Commands::Account { action } => handle_account(action, &config).await,
        Commands::Consume { user } => handle_consume(&user, &config).await,
        Commands::Upgrade { user, plan } => handle_upgrade(user, plan, &config).await,
        Commands::Tutor {
            user,
            question,
            wrong_answer,
        } => handle_tutor(&user, &question, &wrong_answer, &config).await,
        Commands::Config { action } => handle_config(action, &config_path, &config),
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<LearnMoreConfig> {
    if path.exists() {
        LearnMoreConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))
    } else {
        Ok(LearnMoreConfig::default())
    }
}

async fn open_store(config: &LearnMoreConfig) -> Result<Arc<SqliteAccountStore>> {
    debug!(url = %config.database.url, "Opening account database");
    if let Some(parent) = database_file(&config.database.url).and_then(|p| p.parent()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }
    let store =
        SqliteAccountStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to open account database")?;
    store.health_check().await?;
    Ok(Arc::new(store))
}

/// File path of a `sqlite://` URL, without query parameters
fn database_file(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

fn handle_permissions(role: Role) -> Result<()> {
    let resolver = EntitlementResolver::default();
    println!("{}:", role);
    for permission in resolver.permissions_for(role) {
        println!("  {}", permission);
    }
    Ok(())
}

fn handle_check(role: Role, permission: Permission) -> Result<()> {
    let allowed = EntitlementResolver::default().has_permission(role, permission);
    println!("{} {} {}", role, verdict(allowed), permission);
    Ok(())
}

fn handle_feature(role: Role, level: FeatureLevel) -> Result<()> {
    println!("{}", describe_feature(role, level));
    Ok(())
}

fn describe_feature(role: Role, level: FeatureLevel) -> String {
    let allowed = EntitlementResolver::default().can_access_feature(role, level);
    format!("{} {} {} features", role, verdict(allowed), level)
}

fn verdict(allowed: bool) -> &'static str {
    if allowed {
        "can use"
    } else {
        "cannot use"
    }
}

async fn handle_account(action: AccountAction, config: &LearnMoreConfig) -> Result<()> {
    let store = open_store(config).await?;

    match action {
        AccountAction::Create {
            user,
            role,
            balance,
        } => {
            let balance = starting_balance(balance, config)?;
            let account = AccountRecord::new(user, role, balance);
            store.create_account(&account).await?;
            println!("Created {}", serde_json::to_string_pretty(&account)?);
        }
        AccountAction::Show { user } => match store.find_account(&user).await? {
            Some(account) => println!("{}", serde_json::to_string_pretty(&account)?),
            None => return Err(not_found_error!(format!("account {}", user), "cli").into()),
        },
        AccountAction::Credit { user, amount } => {
            let amount = credit_amount(amount)?;
            let balance = store
                .credit_tokens(&user, amount)
                .await
                .map_err(LearnMoreError::from)?;
            println!("{} now has {} AI tokens", user, balance);
        }
    }

    Ok(())
}

/// Balance for a new account, from the flag or the configured default
fn starting_balance(requested: Option<i64>, config: &LearnMoreConfig) -> LearnMoreResult<i64> {
    let balance = requested.unwrap_or(config.metering.starting_balance);
    if balance < 0 {
        return Err(validation_error!(
            "Starting balance must not be negative",
            "balance",
            "cli"
        ));
    }
    Ok(balance)
}

fn credit_amount(amount: i64) -> LearnMoreResult<i64> {
    if amount <= 0 {
        return Err(validation_error!(
            "Credit amount must be positive",
            "amount",
            "cli"
        ));
    }
    Ok(amount)
}

async fn handle_consume(user: &str, config: &LearnMoreConfig) -> Result<()> {
    log_operation_start!("consume_token", user_id = user);
    let meter = TokenMeter::new(open_store(config).await?);

    match meter.consume_token(Some(user)).await {
        Ok(TokenCheckResult::Granted { remaining }) => {
            log_operation_success!("consume_token", user_id = user, remaining = %remaining);
            println!("Granted, remaining: {}", remaining);
            Ok(())
        }
        Ok(TokenCheckResult::Denied { reason }) => bail!("{}", reason),
        Err(e) => {
            log_operation_error!("consume_token", e, user_id = user);
            Err(e.into())
        }
    }
}

async fn handle_upgrade(user: String, plan: String, config: &LearnMoreConfig) -> Result<()> {
    let store = open_store(config).await?;
    let checkout = CheckoutCompleted {
        user_id: Some(user),
        plan_name: Some(plan),
    };

    match apply_checkout(store.as_ref(), &checkout).await? {
        PlanOutcome::Upgraded { user_id, role } => println!("{} is now {}", user_id, role),
        PlanOutcome::Ignored { plan_name } => {
            println!("Plan {:?} does not map to a role, nothing changed", plan_name)
        }
    }
    Ok(())
}

async fn handle_tutor(
    user: &str,
    question_path: &Path,
    wrong_answer: &str,
    config: &LearnMoreConfig,
) -> Result<()> {
    let content = std::fs::read_to_string(question_path)
        .with_context(|| format!("Failed to read question file {:?}", question_path))?;
    let question: QuestionContext =
        serde_json::from_str(&content).context("Question file is not a valid question")?;
    let wrong_answer: serde_json::Value =
        serde_json::from_str(wrong_answer).context("Wrong answer must be JSON")?;

    let request = TutorRequest {
        question_id: question.id.clone(),
        wrong_answer,
    };

    let service = TutorService::new(
        TokenMeter::new(open_store(config).await?),
        Arc::new(MemoryQuestionSource::with_questions([question])),
        Arc::new(GeminiProvider::from_env(config.tutor.clone())?),
    );

    let reply = service
        .explain(Some(user), &request)
        .await
        .map_err(|e| anyhow::anyhow!("Tutor request failed ({}): {}", e.status_code(), e))?;

    println!("{}", reply.explanation);
    println!();
    println!("Remaining AI tokens: {}", reply.remaining);
    Ok(())
}

fn handle_config(action: ConfigAction, path: &Path, config: &LearnMoreConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{:?} already exists, pass --force to overwrite", path);
            }
            LearnMoreConfig::default().save_to_file(path)?;
            println!("Configuration initialized at: {:?}", path);
            println!(
                "Set {} in the environment or a .env file to use the tutor.",
                config.tutor.api_key_env
            );
        }
    }
    Ok(())
}
