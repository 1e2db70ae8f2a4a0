use clap::Parser;
use l2scope::cli::CLI;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let CLI { opts, command } = CLI::parse();
    command.run(&opts).await
}
