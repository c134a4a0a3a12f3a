use clap::Parser;
use clap::Subcommand;
use git_testament::git_testament;
use git_testament::render_testament;

use lrsim::errors;
use lrsim::errors::ExitCode;
use lrsim::simulate;

git_testament!(TESTAMENT);

#[derive(Parser)]
#[command(author, version = render_testament!(TESTAMENT), propagate_version = true, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub subcommand: Subcommands,

    /// Only errors are printed to the stderr stream.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// All available information, including debug information, is printed
    /// to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Subcommands {
    /// Simulates long reads from a reference.
    Simulate(simulate::SimulateArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let result = match cli.subcommand {
        Subcommands::Simulate(args) => simulate::simulate(args),
    };

    if let Err(err) = result {
        errors::exit(format!("{:#}", err).as_str(), ExitCode::from(&err));
    }
}
