use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use eyre::WrapErr;
use l2scope_common::config::L2ScopeConfig;
use l2scope_profiler::ComplexityAnalyzer;
use l2scope_rpc::{EthClientConnector, Signer, SolcCompiler, StaticPriceOracle};
use l2scope_sequencer::SequencerTester;
use l2scope_storage::{EngineType, Store, StoreError};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, Registry, filter::Directive, fmt, layer::SubscriberExt};

use crate::cli::Options;

/// Database file created inside `--datadir`.
pub const DB_FILE_NAME: &str = "l2scope.db";

pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);
    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    let subscriber = Registry::default().with(log_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("setting default subscriber failed")?;
    Ok(())
}

pub fn load_config(opts: &Options) -> eyre::Result<L2ScopeConfig> {
    match &opts.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Ok(L2ScopeConfig::load(path)?)
        }
        None => Ok(L2ScopeConfig::default()),
    }
}

pub fn is_memory_datadir(datadir: &Path) -> bool {
    datadir.as_os_str() == "memory"
}

/// `--datadir` wins over `[storage] sqlite_path`; with neither, results live in memory.
pub fn database_path(opts: &Options, config: &L2ScopeConfig) -> Option<PathBuf> {
    match &opts.datadir {
        Some(datadir) if is_memory_datadir(datadir) => None,
        Some(datadir) => Some(datadir.join(DB_FILE_NAME)),
        None => config.storage.sqlite_path.clone(),
    }
}

pub fn open_store(opts: &Options, config: &L2ScopeConfig) -> eyre::Result<Store> {
    let Some(path) = database_path(opts, config) else {
        return Ok(Store::new(Path::new("memory"), EngineType::InMemory)?);
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }
    Store::new(&path, EngineType::SQL).map_err(|err: StoreError| {
        eyre::eyre!("Failed to open database {}: {err}", path.display())
    })
}

fn init_connector(opts: &Options, config: &L2ScopeConfig) -> eyre::Result<Arc<EthClientConnector>> {
    let Some(raw_key) = &opts.private_key else {
        eyre::bail!("A private key is required, pass --private-key or set L2SCOPE_PRIVATE_KEY");
    };
    let signer = Signer::from_hex(raw_key)?;
    info!(sender = ?signer.address(), "Loaded signing key");
    Ok(Arc::new(EthClientConnector::new(signer, config.rpc.clone())))
}

fn init_oracle(config: &L2ScopeConfig) -> eyre::Result<Arc<StaticPriceOracle>> {
    Ok(Arc::new(StaticPriceOracle::from_settings(&config.oracle)?))
}

pub fn init_analyzer(
    opts: &Options,
    config: &L2ScopeConfig,
    store: Store,
) -> eyre::Result<ComplexityAnalyzer> {
    let compiler = Arc::new(SolcCompiler::new(config.compiler.solc_path.clone()));
    let analyzer = ComplexityAnalyzer::new(
        config.network_registry()?,
        compiler,
        init_connector(opts, config)?,
        init_oracle(config)?,
        store,
    )
    .with_advisor_settings(config.advisor)
    .with_receipt_wait(
        Duration::from_secs(config.rpc.receipt_timeout_secs),
        Duration::from_millis(config.rpc.receipt_poll_interval_ms),
    );
    Ok(analyzer)
}

pub fn init_sequencer_tester(
    opts: &Options,
    config: &L2ScopeConfig,
    store: Store,
) -> eyre::Result<SequencerTester> {
    Ok(SequencerTester::new(
        config.network_registry()?,
        init_connector(opts, config)?,
        init_oracle(config)?,
        store,
    )
    .with_monitor_settings(config.monitor))
}
