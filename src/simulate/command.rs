//! Functionality related to the `lrsim simulate` subcommand itself.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use noodles::fastq;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::error_model::ErrorModel;
use crate::models::identities::Identities;
use crate::models::lengths::FragmentLengths;
use crate::models::qscore_model::QScoreModel;
use crate::simulate::adapters::Adapter;
use crate::simulate::adapters::AdapterEnd;
use crate::simulate::fragments::FragmentAssembler;
use crate::simulate::glitches::Glitches;
use crate::simulate::read::ChimeraAdapterRates;
use crate::simulate::read::ReadSimulator;
use crate::simulate::references::References;
use crate::simulate::settings;
use crate::simulate::summary::SimulationSummary;
use crate::utils::args::arg_in_range;
use crate::utils::args::AdapterSequence;
use crate::utils::args::GlitchParams;
use crate::utils::args::IdentityParams;
use crate::utils::args::MeanStdev;
use crate::utils::args::Quantity;
use crate::utils::args::RateAmount;
use crate::utils::display::formatted_count;
use crate::utils::display::RecordCounter;
use crate::utils::formats;

//===============//
// Command setup //
//===============//

/// Command line arguments for `lrsim simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Reference FASTA file (can be gzipped).
    #[arg(long, value_name = "PATH")]
    reference: PathBuf,

    /// Either an absolute value (e.g. 250M) or a relative depth (e.g. 25x).
    #[arg(long, value_name = "QUANTITY")]
    quantity: Quantity,

    /// Fragment length distribution (mean and stdev).
    #[arg(long, value_name = "MEAN,STDEV", default_value = "15000,13000")]
    length: MeanStdev,

    /// Sequencing identity distribution: mean, max and stdev (percentages)
    /// for a beta distribution, or mean and stdev (qscores) for a normal
    /// distribution.
    #[arg(long, value_name = "MEAN,MAX,STDEV", default_value = "95,99,2.5")]
    identity: IdentityParams,

    /// Error model: "random", "perfect", a preset name or a model file.
    #[arg(long, value_name = "NAME|PATH", default_value = "random")]
    error_model: String,

    /// Qscore model: "random", "ideal", a preset name or a model file.
    #[arg(long, value_name = "NAME|PATH", default_value = "random")]
    qscore_model: String,

    /// Directory holding model presets (defaults to $LRSIM_MODEL_DIR).
    #[arg(long, value_name = "PATH")]
    model_dir: Option<PathBuf>,

    /// Random number generator seed, for reproducible output.
    #[arg(long, value_name = "U64")]
    seed: Option<u64>,

    /// Adapter sequence for the start of reads, or a length for a random
    /// adapter.
    #[arg(
        long,
        value_name = "SEQ|LENGTH",
        default_value = "AATGTACTTCGTTCAGTTACGTATTGCT"
    )]
    start_adapter: AdapterSequence,

    /// Adapter sequence for the end of reads, or a length for a random
    /// adapter.
    #[arg(long, value_name = "SEQ|LENGTH", default_value = "GCAATACGTAACTGAACGAAGT")]
    end_adapter: AdapterSequence,

    /// Start adapter rate and amount (percentages).
    #[arg(long, value_name = "RATE,AMOUNT", default_value = "90,60")]
    start_adapter_params: RateAmount,

    /// End adapter rate and amount (percentages).
    #[arg(long, value_name = "RATE,AMOUNT", default_value = "50,20")]
    end_adapter_params: RateAmount,

    /// Percentage of reads which are low-complexity junk.
    #[arg(long, value_name = "F64", default_value = "1")]
    junk_reads: f64,

    /// Percentage of reads which are random sequence.
    #[arg(long, value_name = "F64", default_value = "1")]
    random_reads: f64,

    /// Percentage at which separate fragments join together.
    #[arg(long, value_name = "F64", default_value = "1")]
    chimeras: f64,

    /// Read glitch parameters: mean distance between glitches, mean glitch
    /// size and mean bases skipped.
    #[arg(long, value_name = "RATE,SIZE,SKIP", default_value = "10000,25,25")]
    glitches: GlitchParams,

    /// Lose circular reference sequences which are too short for a fragment.
    #[arg(long)]
    small_plasmid_bias: bool,

    /// Chance of an end adapter at a chimeric junction.
    #[arg(long, value_name = "F64", default_value_t = settings::CHIMERA_END_ADAPTER_RATE)]
    chimera_end_adapter_rate: f64,

    /// Chance of a start adapter at a chimeric junction.
    #[arg(long, value_name = "F64", default_value_t = settings::CHIMERA_START_ADAPTER_RATE)]
    chimera_start_adapter_rate: f64,

    /// Output FASTQ (gzipped if it ends in .gz), or "-" for stdout.
    #[arg(short, long, value_name = "PATH", default_value = "-")]
    output: PathBuf,

    /// Write a JSON summary of the run to this file.
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

//===============//
// Configuration //
//===============//

/// Validated settings for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Reference FASTA.
    pub reference: PathBuf,

    /// How much sequence to generate.
    pub quantity: Quantity,

    /// Fragment length mean and stdev.
    pub length: MeanStdev,

    /// Identity distribution.
    pub identity: IdentityParams,

    /// Error model name or path.
    pub error_model: String,

    /// Qscore model name or path.
    pub qscore_model: String,

    /// Directory holding model presets.
    pub model_dir: Option<PathBuf>,

    /// Random seed.
    pub seed: Option<u64>,

    /// Start adapter.
    pub start_adapter: AdapterSequence,

    /// End adapter.
    pub end_adapter: AdapterSequence,

    /// Start adapter rate and amount (fractions).
    pub start_adapter_params: RateAmount,

    /// End adapter rate and amount (fractions).
    pub end_adapter_params: RateAmount,

    /// Fraction of junk reads.
    pub junk_rate: f64,

    /// Fraction of random reads.
    pub random_rate: f64,

    /// Chance of each chimeric join.
    pub chimera_rate: f64,

    /// Glitch parameters.
    pub glitches: GlitchParams,

    /// Whether circular contigs shorter than a fragment are lost.
    pub small_plasmid_bias: bool,

    /// Adapter chances at chimeric junctions.
    pub chimera_adapter_rates: ChimeraAdapterRates,

    /// Output FASTQ path.
    pub output: PathBuf,

    /// JSON summary path.
    pub summary: Option<PathBuf>,
}

impl TryFrom<SimulateArgs> for SimulationConfig {
    type Error = SimulationError;

    fn try_from(args: SimulateArgs) -> Result<Self, Self::Error> {
        if args.length.mean < settings::MIN_MEAN_READ_LENGTH {
            return Err(SimulationError::configuration(format!(
                "mean read length must be at least {}",
                settings::MIN_MEAN_READ_LENGTH
            )));
        }

        match args.identity {
            IdentityParams::Beta { mean, max, .. } => {
                arg_in_range(
                    "mean read identity",
                    mean,
                    settings::MIN_MEAN_READ_IDENTITY..=100.0,
                )?;
                arg_in_range(
                    "max read identity",
                    max,
                    settings::MIN_MEAN_READ_IDENTITY..=100.0,
                )?;
                if mean > max {
                    return Err(SimulationError::configuration(format!(
                        "mean identity ({}) cannot be larger than max identity ({})",
                        mean, max
                    )));
                }
            }
            IdentityParams::NormalQscore { mean, .. } => {
                if mean < settings::MIN_MEAN_READ_QSCORE {
                    return Err(SimulationError::configuration(format!(
                        "mean read qscore must be at least {}",
                        settings::MIN_MEAN_READ_QSCORE
                    )));
                }
            }
        }

        let junk_reads = arg_in_range("--junk-reads", args.junk_reads, 0.0..=100.0)?;
        let random_reads = arg_in_range("--random-reads", args.random_reads, 0.0..=100.0)?;
        if junk_reads + random_reads > 100.0 {
            return Err(SimulationError::configuration(
                "--junk-reads and --random-reads cannot sum to more than 100",
            ));
        }
        let chimeras = arg_in_range("--chimeras", args.chimeras, 0.0..=50.0)?;

        let chimera_adapter_rates = ChimeraAdapterRates {
            end: arg_in_range(
                "--chimera-end-adapter-rate",
                args.chimera_end_adapter_rate,
                0.0..=1.0,
            )?,
            start: arg_in_range(
                "--chimera-start-adapter-rate",
                args.chimera_start_adapter_rate,
                0.0..=1.0,
            )?,
        };

        Ok(SimulationConfig {
            reference: args.reference,
            quantity: args.quantity,
            length: args.length,
            identity: args.identity,
            error_model: args.error_model,
            qscore_model: args.qscore_model,
            model_dir: args.model_dir,
            seed: args.seed,
            start_adapter: args.start_adapter,
            end_adapter: args.end_adapter,
            start_adapter_params: args.start_adapter_params,
            end_adapter_params: args.end_adapter_params,
            junk_rate: junk_reads / 100.0,
            random_rate: random_reads / 100.0,
            chimera_rate: chimeras / 100.0,
            glitches: args.glitches,
            small_plasmid_bias: args.small_plasmid_bias,
            chimera_adapter_rates,
            output: args.output,
            summary: args.summary,
        })
    }
}

//==========//
// Building //
//==========//

/// Loads the models and prepares everything needed to make reads.
pub fn build_simulator<R: Rng + ?Sized>(
    config: &SimulationConfig,
    references: References,
    rng: &mut R,
) -> anyhow::Result<ReadSimulator> {
    let lengths = FragmentLengths::new(config.length.mean, config.length.stdev)?;
    lengths.log_summary()?;

    let model_dir = config.model_dir.as_deref();
    let error_model = ErrorModel::load(&config.error_model, model_dir)?;
    let qscore_model = QScoreModel::load(&config.qscore_model, model_dir)?;

    let identities = match (error_model.is_perfect(), config.identity) {
        (true, _) => {
            info!("The perfect error model adds no errors, so read identities are fixed at 100%.");
            Identities::constant(1.0)?
        }
        (false, IdentityParams::Beta { mean, max, stdev }) => {
            Identities::beta(mean / 100.0, stdev / 100.0, max / 100.0)?
        }
        (false, IdentityParams::NormalQscore { mean, stdev }) => {
            Identities::normal_qscore(mean, stdev)?
        }
    };
    identities.log_summary();

    let start_adapter = Adapter::from_args(
        AdapterEnd::Start,
        &config.start_adapter,
        config.start_adapter_params,
        rng,
    )?;
    let end_adapter = Adapter::from_args(
        AdapterEnd::End,
        &config.end_adapter,
        config.end_adapter_params,
        rng,
    )?;
    debug!(
        "Adapters: start {}, end {}.",
        String::from_utf8_lossy(start_adapter.sequence()),
        String::from_utf8_lossy(end_adapter.sequence())
    );

    let glitches = Glitches::new(config.glitches)?;

    let assembler = FragmentAssembler::new(
        references,
        lengths,
        config.junk_rate,
        config.random_rate,
        config.small_plasmid_bias,
        rng,
    )?;

    Ok(ReadSimulator {
        assembler,
        identities,
        error_model,
        qscore_model,
        start_adapter,
        end_adapter,
        glitches,
        chimera_rate: config.chimera_rate,
        chimera_adapter_rates: config.chimera_adapter_rates,
    })
}

//=========//
// Running //
//=========//

/// Writes reads as FASTQ to `output` until `target_bases` bases have been
/// written, then flushes it. Reads that lost every base are skipped.
pub fn run<W, R>(
    simulator: &ReadSimulator,
    target_bases: u64,
    output: &mut W,
    rng: &mut R,
    progress: &ProgressBar,
) -> anyhow::Result<SimulationSummary>
where
    W: Write,
    R: Rng + ?Sized,
{
    let mut summary = SimulationSummary::new(target_bases);
    let mut counter = RecordCounter::new(Some(settings::LOG_EVERY_READS));
    let mut writer = fastq::Writer::new(&mut *output);

    while summary.bases < target_bases {
        let read = simulator.next_read(rng)?;

        if read.sequence.is_empty() {
            debug!("Skipping read {}: no bases remain.", read.name);
            summary.record_empty();
            continue;
        }

        writer
            .write_record(&read.to_fastq())
            .with_context(|| "could not write record to output file")?;
        summary.record(&read);
        counter.inc();
        progress.set_position(summary.bases.min(target_bases));
    }

    drop(writer);
    output
        .flush()
        .with_context(|| "could not flush output file")?;

    summary.finish();
    Ok(summary)
}

/// Main function for the `lrsim simulate` subcommand.
pub fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    // (0) Validate the arguments.
    let config = SimulationConfig::try_from(args)?;

    info!("Starting simulate command...");
    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    info!("Using random seed {}.", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    // (1) Load the reference and the models.
    let references = References::load(&config.reference)?;
    let target_bases = config.quantity.to_bases(references.total_length());
    info!("Target size: {} bp.", formatted_count(target_bases));

    let simulator = build_simulator(&config, references, &mut rng)?;

    // (2) Set up the output writer.
    let mut output = formats::fastq::writer(&config.output)
        .with_context(|| format!("opening output file: {}", config.output.display()))?;

    // (3) Set up the progress bar.
    let pb = ProgressBar::new(target_bases);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.cyan.bold} {spinner:.green} [{elapsed_precise}] [{bar}] {pos}/{len} bp ({per_sec}, {eta})")
            .progress_chars("=> "),
    );
    pb.set_prefix("Simulating");

    // (4) Generate the reads.
    let summary = run(&simulator, target_bases, &mut output, &mut rng, &pb)?;
    output
        .finish()
        .with_context(|| format!("finishing output file: {}", config.output.display()))?;

    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.green.bold} {msg:.white.bold} [{elapsed_precise}] [{bar}] {pos}/{len} bp ({per_sec}, {eta})")
            .progress_chars("=> "),
    );
    pb.set_prefix("✓");
    pb.finish_with_message("Finished");

    // (5) Report.
    summary.log();
    if let Some(path) = &config.summary {
        summary
            .write(path)
            .with_context(|| format!("writing summary: {}", path.display()))?;
        info!("Summary written to {}.", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::BufWriter;

    use clap::Parser;

    use super::*;
    use crate::errors::ExitCode;
    use crate::simulate::references::Contig;
    use crate::utils::sequence::random_sequence;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: SimulateArgs,
    }

    fn config(extra: &[&str]) -> SimulationConfig {
        try_config(extra).unwrap()
    }

    fn try_config(extra: &[&str]) -> Result<SimulationConfig, SimulationError> {
        let mut argv = vec!["lrsim", "--reference", "ref.fasta"];
        if !extra.contains(&"--quantity") {
            argv.extend_from_slice(&["--quantity", "1x"]);
        }
        argv.extend_from_slice(extra);
        SimulationConfig::try_from(Cli::try_parse_from(argv).unwrap().args)
    }

    fn references(contigs: Vec<Contig>) -> References {
        References::from_contigs(contigs).unwrap()
    }

    /// Runs a simulation into memory, returning the FASTQ text and summary.
    fn simulate_to_string(
        config: &SimulationConfig,
        references: References,
        seed: u64,
    ) -> anyhow::Result<(String, SimulationSummary)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let target_bases = config.quantity.to_bases(references.total_length());
        let simulator = build_simulator(config, references, &mut rng)?;

        // Buffered like real output, so records only arrive if `run` flushes.
        let mut output = BufWriter::with_capacity(1 << 20, Vec::new());
        let summary = run(
            &simulator,
            target_bases,
            &mut output,
            &mut rng,
            &ProgressBar::hidden(),
        )?;
        assert!(output.buffer().is_empty());

        Ok((String::from_utf8(output.get_ref().clone())?, summary))
    }

    /// Splits FASTQ text into (header, sequence, qualities) triples.
    fn records(fastq: &str) -> Vec<(&str, &str, &str)> {
        let lines: Vec<&str> = fastq.lines().collect();
        assert_eq!(lines.len() % 4, 0);
        lines
            .chunks(4)
            .map(|chunk| {
                assert!(chunk[0].starts_with('@'));
                assert_eq!(chunk[2], "+");
                (chunk[0], chunk[1], chunk[3])
            })
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.length.mean, 15000.0);
        assert_eq!(config.length.stdev, 13000.0);
        assert_eq!(
            config.identity,
            IdentityParams::Beta {
                mean: 95.0,
                max: 99.0,
                stdev: 2.5
            }
        );
        assert_eq!(config.error_model, "random");
        assert_eq!(config.qscore_model, "random");
        assert_eq!(config.start_adapter_params.rate, 0.9);
        assert_eq!(config.end_adapter_params.amount, 0.2);
        assert_eq!(config.junk_rate, 0.01);
        assert_eq!(config.chimera_rate, 0.01);
        assert_eq!(config.chimera_adapter_rates.end, 0.25);
        assert_eq!(config.output, PathBuf::from("-"));
        assert!(!config.small_plasmid_bias);
    }

    #[test]
    fn test_invalid_configurations() {
        for extra in [
            &["--length", "50,10"][..],
            &["--identity", "40,99,2.5"],
            &["--identity", "99,95,2.5"],
            &["--identity", "95,101,2.5"],
            &["--identity", "0.5,2"],
            &["--junk-reads", "60", "--random-reads", "50"],
            &["--junk-reads", "101"],
            &["--chimeras", "51"],
            &["--chimera-end-adapter-rate", "1.5"],
        ] {
            let err = try_config(extra).unwrap_err();
            assert!(
                matches!(err, SimulationError::Configuration(_)),
                "{:?} should be a configuration error",
                extra
            );
            assert_eq!(err.exit_code(), ExitCode::InvalidConfiguration);
        }
    }

    #[test]
    fn test_unparseable_arguments_are_rejected_by_clap() {
        let argv = ["lrsim", "--reference", "r.fa", "--quantity", "lots"];
        assert!(Cli::try_parse_from(argv).is_err());
        let argv = ["lrsim", "--reference", "r.fa", "--quantity", "1x", "--length", "1"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_linear_contig_at_one_times_depth() {
        let mut rng = StdRng::seed_from_u64(100);
        let contig = Contig::new("chr", &random_sequence(10_000, &mut rng), 1.0, false).unwrap();
        let config = config(&[]);

        let (fastq, summary) = simulate_to_string(&config, references(vec![contig]), 1).unwrap();
        let records = records(&fastq);

        assert!(summary.bases >= 10_000);
        assert_eq!(summary.reads as usize, records.len());
        let total: usize = records.iter().map(|(_, seq, _)| seq.len()).sum();
        assert_eq!(total as u64, summary.bases);

        for (header, sequence, qualities) in records {
            assert_eq!(sequence.len(), qualities.len());
            assert!(header.contains(" length="));
            assert!(header.contains("read_identity="));
        }
    }

    #[test]
    fn test_circular_contig_without_bias() {
        let mut rng = StdRng::seed_from_u64(101);
        let contig = Contig::new("plasmid", &random_sequence(1000, &mut rng), 1.0, true).unwrap();
        let config = config(&[
            "--length",
            "10000,0",
            "--error-model",
            "perfect",
            "--start-adapter-params",
            "0,0",
            "--end-adapter-params",
            "0,0",
            "--glitches",
            "0,0,0",
            "--junk-reads",
            "0",
            "--random-reads",
            "0",
            "--chimeras",
            "0",
        ]);

        let simulator =
            build_simulator(&config, references(vec![contig]), &mut rng).unwrap();
        for _ in 0..100 {
            let fragment = simulator.assembler.fragment(&mut rng).unwrap();
            assert_eq!(fragment.sequence.len(), 1000);
        }

        let contig = Contig::new("plasmid", &random_sequence(1000, &mut rng), 1.0, true).unwrap();
        let (fastq, _) = simulate_to_string(&config, references(vec![contig]), 2).unwrap();
        for (header, sequence, _) in records(&fastq) {
            assert_eq!(sequence.len(), 1000);
            assert!(header.contains("read_identity=100.00%"));
        }
    }

    #[test]
    fn test_circular_contig_with_bias_fails() {
        let mut rng = StdRng::seed_from_u64(102);
        let contig = Contig::new("plasmid", &random_sequence(1000, &mut rng), 1.0, true).unwrap();
        let config = config(&["--length", "10000,0", "--small-plasmid-bias"]);

        let err = build_simulator(&config, references(vec![contig]), &mut rng).unwrap_err();
        assert_ne!(ExitCode::from(&err), ExitCode::Failure);
    }

    #[test]
    fn test_output_is_reproducible() {
        let mut rng = StdRng::seed_from_u64(103);
        let sequence = random_sequence(5000, &mut rng);
        let contig = || Contig::new("chr", &sequence, 1.0, false).unwrap();
        let config = config(&["--length", "1000,500", "--chimeras", "10"]);

        let (first, _) = simulate_to_string(&config, references(vec![contig()]), 7).unwrap();
        let (second, _) = simulate_to_string(&config, references(vec![contig()]), 7).unwrap();
        let (third, _) = simulate_to_string(&config, references(vec![contig()]), 8).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, third);
    }

    #[test]
    fn test_summary_fractions() {
        let mut rng = StdRng::seed_from_u64(104);
        let contig = Contig::new("chr", &random_sequence(5000, &mut rng), 1.0, false).unwrap();
        let config = config(&[
            "--quantity",
            "20x",
            "--length",
            "500,0",
            "--error-model",
            "perfect",
            "--junk-reads",
            "50",
            "--random-reads",
            "50",
            "--chimeras",
            "0",
        ]);

        let (_, summary) = simulate_to_string(&config, references(vec![contig]), 3).unwrap();
        assert!(summary.reads > 0);
        assert_eq!(summary.junk_reads + summary.random_reads, summary.reads);
        assert!((summary.mean_identity - 1.0).abs() < 1e-9);
    }
}
