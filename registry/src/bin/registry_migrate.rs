//! Bring the registry schema and its indexes up to date, then confirm the
//! configured pool can serve registry reads.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;

use clap::Parser;
use color_eyre::eyre::{WrapErr, eyre};
use domain_registry::config::RegistrySettings;
use domain_registry::domain::{DomainFilter, Projection};
use domain_registry::outbound::persistence::{connect, ensure_indexes};
use futures_util::TryStreamExt;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `registry-migrate` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "registry-migrate",
    about = "Create the registry tables and indexes if they are missing",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `REGISTRY_DATABASE_URL`, then
    /// `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(async_main())
}

async fn async_main() -> color_eyre::Result<()> {
    let args = CliArgs::parse();
    let settings = RegistrySettings::load_from_iter([OsString::from("registry-migrate")])
        .map_err(|error| eyre!("load registry settings: {error}"))?;

    let database_url = settings
        .resolve_database_url(args.database_url)
        .ok_or_else(|| eyre!("no database URL: pass --database-url or set DATABASE_URL"))?;

    let applied = ensure_indexes(&database_url)
        .await
        .wrap_err("apply registry migrations")?;
    for version in &applied {
        info!(version = %version, "applied migration");
    }

    let registry = connect(&database_url, &settings)
        .await
        .wrap_err("connect to registry database")?;
    let domains = registry
        .get_multi(DomainFilter::all(), Projection::only([]))
        .try_fold(0_usize, |count, _| async move { Ok(count + 1) })
        .await
        .wrap_err("count persisted domains")?;
    info!(domains, batch_size = registry.batch_size(), "registry ready");
    Ok(())
}
