//! tshop CLI - a textual storefront over the tshop client library.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! tshop products
//! tshop product 7
//! tshop categories
//! tshop category 3
//!
//! # Account
//! tshop login -e shopper@example.com -p secret
//! tshop profile
//! tshop orders
//!
//! # Server-side cart and checkout
//! tshop cart add 7 --quantity 2
//! tshop cart show
//! tshop cart checkout
//!
//! # Local cart (kept on disk, never sent to the API)
//! tshop local-cart add 7 --quantity 2
//! tshop local-cart show
//! ```
//!
//! # Environment Variables
//!
//! - `TSHOP_API_BASE_URL` - API base URL
//! - `TSHOP_DATA_DIR` - Where the session and local cart are kept
//! - `SENTRY_DSN` - Optional error tracking
//! - `RUST_LOG` - Log filter (default `tshop=info`)
//! - `TSHOP_LOG_FORMAT` - `json` for structured logs

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tshop_core::{CategoryId, OrderId, ProductId};
use tshop_storefront::{Storefront, StorefrontError};
use tshop_storefront::api::PaymentMethod;
use tshop_storefront::config::StorefrontConfig;
use tshop_storefront::notify::{self, NotificationLevel, NotificationReceiver};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "tshop")]
#[command(author, version, about = "tshop storefront from the command line")]
struct Cli {
    /// Override `TSHOP_API_BASE_URL`
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog
    Products,
    /// Show one product with its reviews
    Product { id: ProductId },
    /// List active categories
    Categories,
    /// Show a category and its products
    Category { id: CategoryId },
    /// Review a product
    Review {
        product_id: ProductId,
        /// Rating from 1 to 5
        #[arg(short, long, default_value_t = 5)]
        rate: u8,
        #[arg(short, long, default_value = "")]
        comment: String,
    },

    /// Server-side cart (requires login)
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Local cart kept in the data directory
    LocalCart {
        #[command(subcommand)]
        action: LocalCartAction,
    },

    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "TSHOP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the session
    Logout,
    /// Show the session state
    Whoami,
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        user_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "TSHOP_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm_password: Option<String>,
        /// Date of birth, `YYYY-MM-DD`
        #[arg(long)]
        birth_date: NaiveDate,
    },
    /// Show the logged-in user's profile
    Profile,
    /// Change the logged-in user's password
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        /// Defaults to the new password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Request a password-reset code by e-mail
    ForgotPassword { email: String },
    /// Request a new verification code
    SendCode { email: String },
    /// Confirm an e-mailed verification code
    VerifyCode { email: String, code: String },

    /// List your orders
    Orders,
    /// Show one order
    Order { id: OrderId },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product_id: ProductId,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Add one unit of a product
    Increase { product_id: ProductId },
    /// Remove one unit of a product
    Decrease { product_id: ProductId },
    /// Remove a product
    Remove { product_id: ProductId },
    /// Empty the cart
    Clear,
    /// Pay for the cart
    Checkout {
        #[arg(short, long, value_enum, default_value_t = Method::Visa)]
        method: Method,
    },
}

#[derive(Subcommand)]
enum LocalCartAction {
    /// Show the local cart and its totals
    Show,
    /// Add a product (looked up in the catalog)
    Add {
        product_id: ProductId,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line (never below one)
    Update {
        product_id: ProductId,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { product_id: ProductId },
    /// Empty the local cart
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Visa,
    Cash,
}

impl From<Method> for PaymentMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Visa => Self::Visa,
            Method::Cash => Self::Cash,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.api.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays pipeable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tshop=info,tshop_storefront=warn".into());

    // Structured logs with TSHOP_LOG_FORMAT=json
    let json_logs = std::env::var("TSHOP_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let json_layer = json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let (storefront, mut notifications) = match Storefront::open(config) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open storefront");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli.command, &storefront).await;
    print_notifications(&mut notifications);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// Print what a failed command has not already told the user.
fn report_failure(err: &CliError) {
    let mut stderr = std::io::stderr().lock();
    match err {
        // API failures were surfaced as notifications
        CliError::Storefront(StorefrontError::Api(e)) => {
            tracing::debug!(error = %e, "Command failed");
        }
        CliError::Storefront(StorefrontError::Validation(errors)) => {
            for e in errors.iter() {
                let _ = writeln!(stderr, "✗ {}: {}", e.field, e.message);
            }
        }
        other => {
            let _ = writeln!(stderr, "error: {other}");
        }
    }
}

fn load_config(api: Option<&str>) -> Result<StorefrontConfig, CliError> {
    let config = StorefrontConfig::from_env()?;
    match api {
        Some(api) => Ok(config.with_api_base_url(api)?),
        None => Ok(config),
    }
}

async fn run(command: Commands, storefront: &Storefront) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Products => commands::catalog::products(storefront, &mut out).await,
        Commands::Product { id } => commands::catalog::product(storefront, &mut out, id).await,
        Commands::Categories => commands::catalog::categories(storefront, &mut out).await,
        Commands::Category { id } => commands::catalog::category(storefront, &mut out, id).await,
        Commands::Review {
            product_id,
            rate,
            comment,
        } => commands::catalog::review(storefront, product_id, rate, comment).await,

        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(storefront, &mut out).await,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(storefront, product_id, quantity).await,
            CartAction::Increase { product_id } => {
                commands::cart::increase(storefront, &mut out, product_id).await
            }
            CartAction::Decrease { product_id } => {
                commands::cart::decrease(storefront, &mut out, product_id).await
            }
            CartAction::Remove { product_id } => {
                commands::cart::remove(storefront, product_id).await
            }
            CartAction::Clear => commands::cart::clear(storefront).await,
            CartAction::Checkout { method } => {
                commands::cart::checkout(storefront, &mut out, method.into()).await
            }
        },

        Commands::LocalCart { action } => match action {
            LocalCartAction::Show => commands::local_cart::show(storefront, &mut out),
            LocalCartAction::Add {
                product_id,
                quantity,
            } => commands::local_cart::add(storefront, &mut out, product_id, quantity).await,
            LocalCartAction::Update {
                product_id,
                quantity,
            } => commands::local_cart::update(storefront, &mut out, product_id, quantity),
            LocalCartAction::Remove { product_id } => {
                commands::local_cart::remove(storefront, &mut out, product_id)
            }
            LocalCartAction::Clear => commands::local_cart::clear(storefront, &mut out),
        },

        Commands::Login { email, password } => {
            commands::account::login(storefront, &mut out, email, password).await
        }
        Commands::Logout => commands::account::logout(storefront, &mut out),
        Commands::Whoami => commands::account::whoami(storefront, &mut out),
        Commands::Register {
            first_name,
            last_name,
            user_name,
            email,
            password,
            confirm_password,
            birth_date,
        } => {
            let form = commands::account::register_form(
                first_name,
                last_name,
                user_name,
                email,
                password,
                confirm_password,
                birth_date,
            );
            commands::account::register(storefront, &form).await
        }
        Commands::Profile => commands::account::profile(storefront, &mut out).await,
        Commands::ChangePassword { old, new, confirm } => {
            commands::account::change_password(storefront, old, new, confirm).await
        }
        Commands::ForgotPassword { email } => {
            commands::account::forgot_password(storefront, &mut out, &email).await
        }
        Commands::SendCode { email } => commands::account::send_code(storefront, &email).await,
        Commands::VerifyCode { email, code } => {
            commands::account::verify_code(storefront, &mut out, email, code).await
        }

        Commands::Orders => commands::orders::list(storefront, &mut out).await,
        Commands::Order { id } => commands::orders::show(storefront, &mut out, id).await,
    }
}

/// Show everything the storefront wanted the user to see.
fn print_notifications(rx: &mut NotificationReceiver) {
    let mut err = std::io::stderr().lock();
    for notification in notify::drain(rx) {
        let marker = match notification.level {
            NotificationLevel::Success => "✓",
            NotificationLevel::Info => "i",
            NotificationLevel::Error => "✗",
        };
        let _ = writeln!(err, "{marker} {}", notification.message);
    }
}
