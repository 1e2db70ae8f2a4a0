use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser as ClapParser, Subcommand as ClapSubcommand, ValueEnum};
use l2scope_common::networks::{Network, NetworkRegistry};
use l2scope_common::types::{AnalysisRequest, TestConfiguration, TestType};
use l2scope_profiler::{compare_profiles, report as profile_report};
use l2scope_sequencer::report as sequencer_report;
use tracing::{Level, info, warn};
use uuid::Uuid;

use crate::initializers::{
    init_analyzer, init_sequencer_tester, init_tracing, load_config, open_store,
};

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "l2scope",
    version,
    about = "Gas complexity profiling and sequencer benchmarking for L2 networks"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
    #[command(subcommand)]
    pub command: Subcommand,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "config",
        value_name = "CONFIG_FILE",
        help = "TOML configuration file.",
        long_help = "Every section is optional; missing values use their defaults.",
        env = "L2SCOPE_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long = "private-key",
        value_name = "HEX_KEY",
        help = "Key that signs deployments, calls and probe transactions.",
        env = "L2SCOPE_PRIVATE_KEY",
        hide_env_values = true,
        global = true
    )]
    pub private_key: Option<String>,
    #[arg(
        long = "log-level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error. RUST_LOG takes precedence.",
        env = "L2SCOPE_LOG_LEVEL",
        global = true
    )]
    pub log_level: Level,
    #[arg(
        long = "datadir",
        value_name = "DATABASE_DIRECTORY",
        help = "Directory holding the results database.",
        long_help = "If the datadir is the word `memory`, results are kept in memory. Overrides `[storage] sqlite_path`.",
        env = "L2SCOPE_DATADIR",
        global = true
    )]
    pub datadir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

#[derive(ClapSubcommand)]
pub enum Subcommand {
    #[command(name = "analyze", about = "Profile the gas complexity of a contract function")]
    Analyze {
        #[arg(long, value_name = "NETWORK_ID")]
        network: String,
        #[arg(long, value_name = "SOLIDITY_FILE")]
        source: PathBuf,
        #[arg(long, value_name = "CONTRACT_NAME")]
        contract: String,
        #[arg(long, value_name = "FUNCTION_NAME")]
        function: String,
        #[arg(
            long = "arg",
            value_name = "VALUE",
            help = "Function argument, as JSON or a bare string. Repeat for each argument."
        )]
        args: Vec<String>,
        #[arg(long = "constructor-arg", value_name = "VALUE")]
        constructor_args: Vec<String>,
        #[arg(
            long = "no-trace",
            action = ArgAction::SetTrue,
            help = "Skip debug tracing and analyze the receipt only."
        )]
        no_trace: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    #[command(name = "sequencer-test", about = "Benchmark how a sequencer orders transactions by fee")]
    SequencerTest {
        #[arg(long, value_name = "NETWORK_ID")]
        network: String,
        #[arg(long = "test-type", value_name = "TEST_TYPE", help = "low_fee, stuck_transaction or fee_market_stress")]
        test_type: TestType,
        #[arg(long = "low-fee-txs")]
        low_fee_tx_count: Option<u32>,
        #[arg(long = "normal-fee-txs")]
        normal_fee_tx_count: Option<u32>,
        #[arg(long = "min-priority-fee", value_name = "WEI")]
        min_priority_fee_wei: Option<u64>,
        #[arg(long = "normal-priority-fee", value_name = "WEI")]
        normal_priority_fee_wei: Option<u64>,
        #[arg(long = "max-priority-fee", value_name = "WEI")]
        max_priority_fee_wei: Option<u64>,
        #[arg(long = "ladder-steps")]
        fee_ladder_steps: Option<u32>,
        #[arg(long = "duration", value_name = "SECONDS")]
        duration_secs: Option<u64>,
        #[arg(long = "parallel-txs")]
        parallel_account_count: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    #[command(name = "sequencer-result", about = "Show a stored sequencer test")]
    SequencerResult {
        #[arg(value_name = "SESSION_ID")]
        id: Uuid,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    #[command(name = "compare", about = "Compare stored profiles of one function across networks")]
    Compare {
        #[arg(long, value_name = "CONTRACT_NAME")]
        contract: String,
        #[arg(long, value_name = "FUNCTION_NAME")]
        function: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    #[command(name = "networks", about = "List the supported networks")]
    Networks,
}

impl Subcommand {
    pub async fn run(self, opts: &Options) -> eyre::Result<()> {
        init_tracing(opts)?;
        let config = load_config(opts)?;

        match self {
            Subcommand::Analyze {
                network,
                source,
                contract,
                function,
                args,
                constructor_args,
                no_trace,
                format,
                output,
            } => {
                let source = std::fs::read_to_string(&source)
                    .map_err(|err| eyre::eyre!("Failed to read {}: {err}", source.display()))?;
                let request = AnalysisRequest {
                    network,
                    contract_name: contract,
                    source,
                    function_name: function,
                    function_args: args.iter().map(String::as_str).map(parse_abi_value).collect(),
                    constructor_args: constructor_args
                        .iter()
                        .map(String::as_str)
                        .map(parse_abi_value)
                        .collect(),
                    detailed_trace: !no_trace,
                };
                let store = open_store(opts, &config)?;
                let analyzer = init_analyzer(opts, &config, store)?;
                let profile = analyzer.analyze_complexity(&request).await?;
                let rendered = match format {
                    OutputFormat::Markdown => profile_report::profile_to_markdown(&profile),
                    OutputFormat::Json => profile_report::profile_to_json(&profile)?,
                };
                emit(&rendered, output.as_deref())?;
            }
            Subcommand::SequencerTest {
                network,
                test_type,
                low_fee_tx_count,
                normal_fee_tx_count,
                min_priority_fee_wei,
                normal_priority_fee_wei,
                max_priority_fee_wei,
                fee_ladder_steps,
                duration_secs,
                parallel_account_count,
                format,
                output,
            } => {
                let defaults = TestConfiguration::default();
                let test_config = TestConfiguration {
                    network,
                    test_type,
                    low_fee_tx_count: low_fee_tx_count.unwrap_or(defaults.low_fee_tx_count),
                    normal_fee_tx_count: normal_fee_tx_count
                        .unwrap_or(defaults.normal_fee_tx_count),
                    min_priority_fee_wei: min_priority_fee_wei
                        .unwrap_or(defaults.min_priority_fee_wei),
                    normal_priority_fee_wei: normal_priority_fee_wei
                        .unwrap_or(defaults.normal_priority_fee_wei),
                    max_priority_fee_wei: max_priority_fee_wei
                        .unwrap_or(defaults.max_priority_fee_wei),
                    fee_ladder_steps: fee_ladder_steps.unwrap_or(defaults.fee_ladder_steps),
                    duration_secs: duration_secs.unwrap_or(defaults.duration_secs),
                    parallel_account_count: parallel_account_count
                        .unwrap_or(defaults.parallel_account_count),
                };
                let store = open_store(opts, &config)?;
                let tester = init_sequencer_tester(opts, &config, store)?;

                let handle = tester.run_sequencer_test(test_config).await?;
                let id = handle.id();
                let mut updates = tester.subscribe(id).await?;
                info!(session_id = %id, "Watching sequencer test, press Ctrl-C to cancel");
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            warn!(session_id = %id, "Cancelling sequencer test");
                            handle.cancel();
                            break;
                        }
                        update = updates.next() => {
                            let Some(snapshot) = update else { break };
                            let counts = snapshot.status_counts();
                            info!(
                                status = %snapshot.status,
                                confirmed = counts.confirmed,
                                pending = counts.pending,
                                failed = counts.failed,
                                dropped = counts.dropped,
                                "Progress"
                            );
                        }
                    }
                }
                handle.join().await?;

                let test = tester.get_test_result(id).await?;
                let rendered = match format {
                    OutputFormat::Markdown => sequencer_report::to_markdown(&test),
                    OutputFormat::Json => sequencer_report::to_json(&test)?,
                };
                emit(&rendered, output.as_deref())?;
            }
            Subcommand::SequencerResult { id, format } => {
                let store = open_store(opts, &config)?;
                let Some(test) = store.get_sequencer_test(id).await? else {
                    eyre::bail!("Sequencer test {id} not found");
                };
                let rendered = match format {
                    OutputFormat::Markdown => sequencer_report::to_markdown(&test),
                    OutputFormat::Json => sequencer_report::to_json(&test)?,
                };
                emit(&rendered, None)?;
            }
            Subcommand::Compare {
                contract,
                function,
                format,
            } => {
                let store = open_store(opts, &config)?;
                let profiles = store.profiles_for(&contract, &function).await?;
                if profiles.is_empty() {
                    warn!(%contract, %function, "No stored profiles, run `analyze` first");
                }
                let comparison = compare_profiles(&contract, &function, &profiles);
                let rendered = match format {
                    OutputFormat::Markdown => profile_report::comparison_to_markdown(&comparison),
                    OutputFormat::Json => profile_report::comparison_to_json(&comparison)?,
                };
                emit(&rendered, None)?;
            }
            Subcommand::Networks => {
                let registry = config.network_registry()?;
                println!("{}", networks_table(&registry)?);
            }
        }
        Ok(())
    }
}

/// JSON literals are passed through; anything else becomes a string.
pub fn parse_abi_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn emit(rendered: &str, output: Option<&Path>) -> eyre::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|err| eyre::eyre!("Failed to write {}: {err}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub fn networks_table(registry: &NetworkRegistry) -> eyre::Result<String> {
    let mut table = String::from("| Id | Name | Chain id | Token | RPC |\n|----|------|----------|-------|-----|\n");
    for network in Network::all() {
        let config = registry.config_for(network)?;
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            network,
            network.display_name(),
            config.chain_id,
            network.native_token(),
            config.rpc_url
        ));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CLI::command().debug_assert();
    }

    #[test]
    fn parses_a_sequencer_test() {
        let cli = CLI::try_parse_from([
            "l2scope",
            "--log-level",
            "debug",
            "sequencer-test",
            "--network",
            "base-sepolia",
            "--test-type",
            "fee_market_stress",
            "--ladder-steps",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.opts.log_level, Level::DEBUG);
        let Subcommand::SequencerTest {
            test_type,
            fee_ladder_steps,
            format,
            ..
        } = cli.command
        else {
            panic!("expected sequencer-test");
        };
        assert_eq!(test_type, TestType::FeeMarketStress);
        assert_eq!(fee_ladder_steps, Some(4));
        assert_eq!(format, OutputFormat::Markdown);
    }

    #[test]
    fn abi_values_accept_json_or_bare_strings() {
        assert_eq!(parse_abi_value("42"), serde_json::json!(42));
        assert_eq!(parse_abi_value("[1,2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_abi_value("0xabc"), serde_json::json!("0xabc"));
    }

    #[test]
    fn lists_every_network() {
        let table = networks_table(&NetworkRegistry::new()).unwrap();
        assert_eq!(table.lines().count(), 2 + Network::all().count());
        assert!(table.contains("| arbitrum-sepolia | Arbitrum Sepolia | 421614 |"));
    }
}
