//! Command-line interface orchestration.
//!
//! Three subcommands cover the engine's pipelines: `mds` embeds a tree
//! sample into the plane, `ccd` reports conditional-clade-distribution
//! statistics, and `mixing` runs the within-chain dissonance diagnostic.
//! Input files go through the tree-reader collaborator with format
//! auto-detection by default.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use arbora_core::{
    ArboraBuilder, ArboraError, CcdStatistics, DissonanceResult, MdsPipeline, Tree, TreeMetric,
};
use arbora_providers_newick::{read_trees, ReaderError, TreeFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

const DEFAULT_BURNIN: f64 = 0.1;
const DEFAULT_MAX_TREES: usize = 500;
const DEFAULT_SPLITS: usize = 2;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "arbora",
    about = "Analyse posterior tree samples: MDS embeddings, CCDs, and mixing diagnostics."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Embed the pairwise tree-distance matrix into two dimensions.
    Mds(MdsCommand),
    /// Build a conditional clade distribution and report its statistics.
    Ccd(CcdCommand),
    /// Run the within-chain dissonance mixing diagnostic.
    Mixing(MixingCommand),
}

/// Input options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Path to the tree sample.
    pub path: PathBuf,

    /// Input format; `auto` detects from the first marker token.
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    pub format: FormatArg,

    /// Fraction of leading trees discarded as burn-in.
    #[arg(long, default_value_t = DEFAULT_BURNIN)]
    pub burnin: f64,
}

/// Options accepted by the `mds` command.
#[derive(Debug, Args, Clone)]
pub struct MdsCommand {
    #[command(flatten)]
    pub input: InputArgs,

    /// Pairwise tree metric.
    #[arg(long, value_enum, default_value_t = MetricArg::Rf)]
    pub metric: MetricArg,

    /// Subsample bound; larger samples are thinned with the seed.
    #[arg(long = "max-trees", default_value_t = DEFAULT_MAX_TREES)]
    pub max_trees: usize,

    /// Seed for the subsampling shuffle.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Options accepted by the `ccd` command.
#[derive(Debug, Args, Clone)]
pub struct CcdCommand {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Options accepted by the `mixing` command.
#[derive(Debug, Args, Clone)]
pub struct MixingCommand {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of contiguous chains to split the sample into.
    #[arg(long, default_value_t = DEFAULT_SPLITS)]
    pub splits: usize,

    /// Seed for the probability-comparison subsample.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Input formats exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Detect from the first marker token.
    Auto,
    /// Newick statements.
    Newick,
    /// Nexus trees block.
    Nexus,
    /// PhyloXML (recognised, not supported).
    Phyloxml,
    /// NeXML (recognised, not supported).
    Nexml,
    /// PhyJSON documents.
    Phyjson,
}

impl From<FormatArg> for TreeFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Auto => TreeFormat::Auto,
            FormatArg::Newick => TreeFormat::Newick,
            FormatArg::Nexus => TreeFormat::Nexus,
            FormatArg::Phyloxml => TreeFormat::PhyloXml,
            FormatArg::Nexml => TreeFormat::NexML,
            FormatArg::Phyjson => TreeFormat::PhyJson,
        }
    }
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Newick => "newick",
            Self::Nexus => "nexus",
            Self::Phyloxml => "phyloxml",
            Self::Nexml => "nexml",
            Self::Phyjson => "phyjson",
        })
    }
}

/// Pairwise metrics exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    /// Robinson–Foulds bipartition distance.
    Rf,
    /// Approximate SPR distance, ⌈RF/2⌉.
    Spr,
    /// Mean path-length difference.
    Path,
}

impl From<MetricArg> for TreeMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Rf => TreeMetric::RobinsonFoulds,
            MetricArg::Spr => TreeMetric::Spr,
            MetricArg::Path => TreeMetric::Path,
        }
    }
}

impl std::fmt::Display for MetricArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rf => "rf",
            Self::Spr => "spr",
            Self::Path => "path",
        })
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed while loading the input.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The tree reader rejected the input.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// Core orchestration failed.
    #[error(transparent)]
    Core(#[from] ArboraError),
}

/// Outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// `mds` produced an embedding.
    Mds(MdsPipeline),
    /// `ccd` produced statistics.
    Ccd(CcdStatistics),
    /// `mixing` produced a dissonance trajectory.
    Mixing(DissonanceResult),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading, parsing, or execution fails.
pub fn run_cli(cli: Cli) -> Result<CommandOutcome, CliError> {
    match cli.command {
        Command::Mds(command) => run_mds(command),
        Command::Ccd(command) => run_ccd(command),
        Command::Mixing(command) => run_mixing(command),
    }
}

fn load_trees(input: &InputArgs) -> Result<Vec<Tree>, CliError> {
    let text = fs::read_to_string(&input.path).map_err(|source| CliError::Io {
        path: input.path.clone(),
        source,
    })?;
    Ok(read_trees(&text, input.format.into())?)
}

fn run_mds(command: MdsCommand) -> Result<CommandOutcome, CliError> {
    let trees = load_trees(&command.input)?;
    let arbora = ArboraBuilder::new()
        .with_metric(command.metric.into())
        .with_burnin_fraction(command.input.burnin)
        .with_max_trees(command.max_trees)
        .with_seed(command.seed)
        .build()?;
    Ok(CommandOutcome::Mds(arbora.mds_pipeline(&trees)?))
}

fn run_ccd(command: CcdCommand) -> Result<CommandOutcome, CliError> {
    let trees = load_trees(&command.input)?;
    let arbora = ArboraBuilder::new()
        .with_burnin_fraction(command.input.burnin)
        .build()?;
    let mut ccd = arbora.build_ccd(&trees)?;
    Ok(CommandOutcome::Ccd(arbora.ccd_statistics(&mut ccd)))
}

fn run_mixing(command: MixingCommand) -> Result<CommandOutcome, CliError> {
    let trees = load_trees(&command.input)?;
    let arbora = ArboraBuilder::new()
        .with_burnin_fraction(command.input.burnin)
        .with_splits(command.splits)
        .with_seed(command.seed)
        .build()?;
    Ok(CommandOutcome::Mixing(arbora.within_chain_dissonance(&trees)?))
}

/// Renders `outcome` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_outcome(outcome: &CommandOutcome, mut writer: impl Write) -> io::Result<()> {
    match outcome {
        CommandOutcome::Mds(result) => render_mds(result, &mut writer),
        CommandOutcome::Ccd(statistics) => render_ccd(statistics, &mut writer),
        CommandOutcome::Mixing(result) => render_mixing(result, &mut writer),
    }
}

fn render_mds(result: &MdsPipeline, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "metric: {}", result.summary.metric)?;
    writeln!(
        writer,
        "trees embedded: {} of {} ({} discarded as burn-in)",
        result.summary.embedded_trees, result.summary.input_trees, result.summary.discarded_burnin
    )?;
    for (row, label) in result.labels.iter().enumerate() {
        writeln!(
            writer,
            "{label}\t{:.6}\t{:.6}",
            result.coordinates[[row, 0]],
            result.coordinates[[row, 1]]
        )?;
    }
    Ok(())
}

fn render_ccd(statistics: &CcdStatistics, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "trees: {}", statistics.number_of_trees)?;
    writeln!(writer, "leaves: {}", statistics.number_of_leaves)?;
    writeln!(writer, "clades: {}", statistics.number_of_clades)?;
    writeln!(writer, "entropy: {:.6}", statistics.entropy)?;
    writeln!(writer, "entropy (lewis): {:.6}", statistics.entropy_lewis)?;
    writeln!(
        writer,
        "max tree probability: {:.6} (log {:.6})",
        statistics.max_tree_probability, statistics.max_log_tree_probability
    )?;
    if !statistics.top_clades.is_empty() {
        writeln!(writer, "top clades:")?;
        for clade in &statistics.top_clades {
            writeln!(
                writer,
                "  {:.4}\t{} taxa\t{}",
                clade.probability,
                clade.size,
                clade.taxa.join(",")
            )?;
        }
    }
    Ok(())
}

fn render_mixing(result: &DissonanceResult, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "chains: {}", result.chain_entropies.len())?;
    writeln!(writer, "steps: {}", result.dissonance.len())?;
    writeln!(
        writer,
        "dissonance: final {:.6}, mean {:.6}, min {:.6}, max {:.6}",
        result.summary.final_dissonance, result.summary.mean, result.summary.min, result.summary.max
    )?;
    writeln!(
        writer,
        "relative dissonance: {:.6}",
        result.relative_dissonance
    )?;
    writeln!(writer, "interpretation: {}", result.interpretation)?;
    if let Some(comparison) = &result.probability_comparison {
        writeln!(
            writer,
            "probability comparison ({} sampled per half):",
            comparison.sampled_per_half
        )?;
        writeln!(
            writer,
            "  first higher: {}, second higher: {}, in one only: {}",
            comparison.first_higher, comparison.second_higher, comparison.in_one_only
        )?;
        writeln!(
            writer,
            "  rms log difference: {:.6}, rms relative difference: {:.6}",
            comparison.rms_log_difference, comparison.rms_relative_difference
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;

    use rstest::rstest;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn temp_dir() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    fn create_tree_file(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = dir.path().join(name);
        let mut file = File::create(&path)?;
        file.write_all(contents.as_bytes())?;
        Ok(path)
    }

    fn input(path: PathBuf) -> InputArgs {
        InputArgs {
            path,
            format: FormatArg::Auto,
            burnin: 0.0,
        }
    }

    /// Run CLI and expect an error, panicking with the given message if
    /// successful.
    fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
        match run_cli(cli) {
            Ok(_) => panic!("{}", panic_msg),
            Err(err) => err,
        }
    }

    #[rstest]
    fn mds_renders_one_row_per_tree() -> TestResult {
        let dir = temp_dir();
        let path = create_tree_file(&dir, "sample.nwk", "((A,B),C);\n((A,C),B);\n((B,C),A);\n")?;
        let cli = Cli {
            command: Command::Mds(MdsCommand {
                input: input(path),
                metric: MetricArg::Rf,
                max_trees: DEFAULT_MAX_TREES,
                seed: 0,
            }),
        };
        let outcome = run_cli(cli)?;
        let mut buffer = Vec::new();
        render_outcome(&outcome, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert!(text.contains("metric: robinson-foulds"));
        assert!(text.contains("Tree 1"));
        assert!(text.contains("Tree 3"));
        Ok(())
    }

    #[rstest]
    fn ccd_reports_headline_statistics() -> TestResult {
        let dir = temp_dir();
        let path = create_tree_file(&dir, "sample.nwk", "((A,B),C);\n((A,B),C);\n((A,C),B);\n")?;
        let cli = Cli {
            command: Command::Ccd(CcdCommand { input: input(path) }),
        };
        let outcome = run_cli(cli)?;
        let mut buffer = Vec::new();
        render_outcome(&outcome, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert!(text.contains("trees: 3"));
        assert!(text.contains("leaves: 3"));
        assert!(text.contains("top clades:"));
        Ok(())
    }

    #[rstest]
    fn mixing_reports_interpretation() -> TestResult {
        let dir = temp_dir();
        let path = create_tree_file(&dir, "sample.nwk", &"((A,B),C);\n".repeat(10))?;
        let cli = Cli {
            command: Command::Mixing(MixingCommand {
                input: input(path),
                splits: 2,
                seed: 0,
            }),
        };
        let outcome = run_cli(cli)?;
        let mut buffer = Vec::new();
        render_outcome(&outcome, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert!(text.contains("interpretation: Exceptional mixing"));
        Ok(())
    }

    #[rstest]
    fn missing_files_surface_io_errors() {
        let cli = Cli {
            command: Command::Ccd(CcdCommand {
                input: input(PathBuf::from("/nonexistent/sample.nwk")),
            }),
        };
        let err = run_cli_expecting_error(cli, "missing file must fail");
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[rstest]
    fn polytomies_surface_reader_errors() -> TestResult {
        let dir = temp_dir();
        let path = create_tree_file(&dir, "bad.nwk", "(A,B,C);\n")?;
        let cli = Cli {
            command: Command::Ccd(CcdCommand { input: input(path) }),
        };
        let err = run_cli_expecting_error(cli, "polytomy must fail");
        assert!(matches!(err, CliError::Reader(ReaderError::Malformed(_))));
        Ok(())
    }

    #[rstest]
    fn single_tree_mds_is_rejected() -> TestResult {
        let dir = temp_dir();
        let path = create_tree_file(&dir, "one.nwk", "((A,B),C);\n")?;
        let cli = Cli {
            command: Command::Mds(MdsCommand {
                input: input(path),
                metric: MetricArg::Spr,
                max_trees: DEFAULT_MAX_TREES,
                seed: 0,
            }),
        };
        let err = run_cli_expecting_error(cli, "one tree cannot embed");
        assert!(matches!(
            err,
            CliError::Core(ArboraError::InsufficientTrees { .. })
        ));
        Ok(())
    }

    #[rstest]
    fn clap_rejects_unknown_metric() {
        let args = ["arbora", "mds", "sample.nwk", "--metric", "quartet"];
        let result = Cli::try_parse_from(args);
        assert!(result.is_err());
    }

    #[rstest]
    #[case(&["arbora", "ccd", "sample.nwk"], 0.1)]
    #[case(&["arbora", "ccd", "sample.nwk", "--burnin", "0.25"], 0.25)]
    fn burnin_defaults_and_overrides(#[case] args: &[&str], #[case] expected: f64) {
        let cli = Cli::try_parse_from(args.iter().copied()).expect("arguments parse");
        let Command::Ccd(command) = cli.command else {
            panic!("expected the ccd command");
        };
        assert_eq!(command.input.burnin, expected);
    }
}
