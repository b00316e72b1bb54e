//! SpecMap CLI - spectral classification of multi-band rasters

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use specmap_algorithms::classification::{
    isodata_raster, kmeans_raster, spectral_library_from_training, training_classes,
    CentroidTable, CumulativeArea, DistanceMetric, InitMethod, IsodataParams, KmeansParams,
    NearestNeighbour, SpectralAngleMapper, SpectralCorrelationMapper,
};
use specmap_core::io::{read_band_stack, read_raster_bands, write_band_stack};
use specmap_core::{ClassificationStrategy, Raster, ReferenceSpectra, SpectralLibrary};
use specmap_parallel::{ProcessingMode, TraversalEngine};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "specmap")]
#[command(author, version, about = "Spectral classification of multi-band rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (1 = sequential; default: all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Block edge length in pixels
    #[arg(long, global = true, default_value = "256")]
    block_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a band stack
    Info {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Spectral Angle Mapper
    Sam {
        #[command(subcommand)]
        mode: RuleCommands,
    },
    /// Spectral Correlation Mapper
    Scm {
        #[command(subcommand)]
        mode: RuleCommands,
    },
    /// Cumulative-area spectral matching
    CumulativeArea {
        /// First band of the integration range (0-based)
        #[arg(long, global = true)]
        band_start: Option<usize>,
        /// End of the integration range (exclusive; default: all bands)
        #[arg(long, global = true)]
        band_end: Option<usize>,
        /// Comma-separated band widths for the integration range
        #[arg(long, global = true, value_delimiter = ',')]
        band_widths: Option<Vec<f64>>,
        #[command(subcommand)]
        mode: RuleCommands,
    },
    /// Nearest-neighbour classification from training data
    Nn {
        #[command(flatten)]
        input: InputArgs,
        /// Output class image
        #[arg(short, long)]
        output: PathBuf,
        /// Single-band raster of integer training labels (0 = unlabelled)
        #[arg(short, long, conflicts_with = "library")]
        training: Option<PathBuf>,
        /// Spectral library JSON used as one sample per class
        #[arg(short, long)]
        library: Option<PathBuf>,
        /// Compare against every training sample instead of class means
        #[arg(long)]
        ungrouped: bool,
        /// Distance metric: euclidean, manhattan, chebyshev
        #[arg(short, long, default_value = "euclidean")]
        metric: String,
        /// Leave pixels farther than this from every class unclassified
        #[arg(long)]
        ceiling: Option<f64>,
    },
    /// K-means clustering
    Kmeans {
        #[command(flatten)]
        input: InputArgs,
        /// Output class image
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        cluster: ClusterArgs,
    },
    /// ISODATA clustering
    Isodata {
        #[command(flatten)]
        input: InputArgs,
        /// Output class image
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        cluster: ClusterArgs,
        /// Upper bound on clusters created by splitting
        #[arg(long, default_value = "10")]
        max_clusters: usize,
        /// Merge clusters whose centres are closer than this
        #[arg(long, default_value = "5.0")]
        min_distance: f64,
        /// Split clusters whose widest band exceeds this std dev
        #[arg(long, default_value = "10.0")]
        stddev_thres: f64,
        /// Proportion of the average intra-cluster distance required to split
        #[arg(long, default_value = "1.0")]
        prop_over_avg_dist: f64,
    },
    /// Build a spectral library from a training-label raster
    Speclib {
        #[command(flatten)]
        input: InputArgs,
        /// Single-band raster of integer class labels (0 = unlabelled)
        #[arg(short, long)]
        classes: PathBuf,
        /// Output spectral library (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input band stack, or several single-band files stacked in order
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,
    /// Value marking missing data in the input
    #[arg(long)]
    nodata: Option<f64>,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Write the rule image: one band per reference class
    Rule {
        #[command(flatten)]
        args: RuleArgs,
    },
    /// Write the class image: 1-based labels, 0 where no class passes
    Classify {
        #[command(flatten)]
        args: RuleArgs,
        /// Match threshold (radians for SAM, 0..1 for SCM, area for cumulative area)
        #[arg(short, long)]
        threshold: f64,
    },
}

#[derive(Args)]
struct RuleArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output raster
    #[arg(short, long)]
    output: PathBuf,
    /// Spectral library JSON with one reference spectrum per class
    #[arg(short, long)]
    library: PathBuf,
}

#[derive(Args)]
struct ClusterArgs {
    /// Number of clusters
    #[arg(short = 'k', long, default_value = "5")]
    num_clusters: usize,
    /// Maximum number of passes
    #[arg(long, default_value = "100")]
    max_iterations: usize,
    /// Converged when no centroid moves farther than this
    #[arg(long, default_value = "0.001")]
    move_threshold: f64,
    /// Discard clusters with fewer pixels than this
    #[arg(long, default_value = "10")]
    min_num_vals: usize,
    /// Initialisation: random or kmeans++
    #[arg(long, default_value = "kmeans++")]
    init: String,
    #[arg(long, default_value = "42")]
    seed: u64,
    /// Write the final centroids as JSON
    #[arg(long)]
    centres: Option<PathBuf>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn build_engine(threads: Option<usize>, block_size: usize) -> TraversalEngine {
    let mode = match threads {
        None => ProcessingMode::Parallel,
        Some(0) | Some(1) => ProcessingMode::Sequential,
        Some(n) => ProcessingMode::ParallelWith(n),
    };
    TraversalEngine::new(block_size).with_mode(mode)
}

fn read_input(args: &InputArgs) -> Result<Raster> {
    let pb = spinner("Reading band stack...");
    let mut raster = match args.input.as_slice() {
        [single] => read_band_stack(single),
        many => read_raster_bands(many),
    }
    .context("Failed to read input")?;
    pb.finish_and_clear();
    if args.nodata.is_some() {
        raster.set_nodata(args.nodata);
    }
    info!("Input: {} x {} x {} bands", raster.cols(), raster.rows(), raster.bands());
    Ok(raster)
}

fn read_single_band(path: &Path) -> Result<Raster> {
    let raster = read_band_stack(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raster.bands() != 1 {
        anyhow::bail!("{} must have one band, found {}", path.display(), raster.bands());
    }
    Ok(raster)
}

fn read_library(path: &Path) -> Result<ReferenceSpectra> {
    let reference = SpectralLibrary::load(path)
        .and_then(SpectralLibrary::into_reference)
        .with_context(|| format!("Failed to load spectral library {}", path.display()))?;
    info!("Library: {} classes x {} bands", reference.len(), reference.num_bands());
    Ok(reference)
}

fn write_result(raster: &Raster, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_band_stack(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn save_centres(table: &CentroidTable, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        table.save(path).context("Failed to write centroid table")?;
        info!("Centroids saved to: {}", path.display());
    }
    for row in &table.clusters {
        info!("  class {}: {} pixels", row.label, row.count);
    }
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Run a strategy over an input and write the result
fn run_strategy<S>(engine: &TraversalEngine, strategy: &S, input: &Raster, output: &Path) -> Result<()>
where
    S: ClassificationStrategy + ?Sized,
{
    let pb = spinner(&format!("Running {}...", strategy.name()));
    let start = Instant::now();
    let result = engine
        .run(strategy, input)
        .with_context(|| format!("Failed to run {}", strategy.name()))?;
    let elapsed = start.elapsed();
    pb.finish_and_clear();
    write_result(&result, output)?;
    done(strategy.name(), output, elapsed);
    Ok(())
}

/// Shared driver for the rule-image matchers
fn run_rule<S, F>(engine: &TraversalEngine, mode: RuleCommands, build: F) -> Result<()>
where
    S: ClassificationStrategy + IntoClassifier,
    F: FnOnce(ReferenceSpectra) -> Result<S>,
{
    match mode {
        RuleCommands::Rule { args } => {
            let strategy = build(read_library(&args.library)?)?;
            let input = read_input(&args.input)?;
            run_strategy(engine, &strategy, &input, &args.output)
        }
        RuleCommands::Classify { args, threshold } => {
            let strategy = build(read_library(&args.library)?)?;
            let classifier = strategy.into_classifier(threshold)?;
            let input = read_input(&args.input)?;
            run_strategy(engine, &classifier, &input, &args.output)
        }
    }
}

/// Rule strategies that can be chained into a thresholded classifier
trait IntoClassifier {
    fn into_classifier(self, threshold: f64) -> Result<Box<dyn ClassificationStrategy>>;
}

impl IntoClassifier for SpectralAngleMapper {
    fn into_classifier(self, threshold: f64) -> Result<Box<dyn ClassificationStrategy>> {
        Ok(Box::new(self.classifier(threshold)?))
    }
}

impl IntoClassifier for SpectralCorrelationMapper {
    fn into_classifier(self, threshold: f64) -> Result<Box<dyn ClassificationStrategy>> {
        Ok(Box::new(self.classifier(threshold)?))
    }
}

impl IntoClassifier for CumulativeArea {
    fn into_classifier(self, threshold: f64) -> Result<Box<dyn ClassificationStrategy>> {
        Ok(Box::new(self.classifier(threshold)?))
    }
}

fn cumulative_area(
    reference: ReferenceSpectra,
    band_start: Option<usize>,
    band_end: Option<usize>,
    band_widths: Option<Vec<f64>>,
) -> Result<CumulativeArea> {
    let range: Range<usize> = band_start.unwrap_or(0)..band_end.unwrap_or(reference.num_bands());
    let area = CumulativeArea::new(reference, range).context("Invalid band range")?;
    match band_widths {
        Some(widths) => Ok(area.with_band_widths(widths).context("Invalid band widths")?),
        None => Ok(area),
    }
}

fn kmeans_params(args: &ClusterArgs) -> Result<KmeansParams> {
    Ok(KmeansParams {
        num_clusters: args.num_clusters,
        max_num_iterations: args.max_iterations,
        cluster_move_threshold: args.move_threshold,
        min_num_vals: args.min_num_vals,
        init: args.init.parse::<InitMethod>()?,
        seed: args.seed,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let engine = build_engine(cli.threads, cli.block_size);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_input(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.transform().bounds(cols, rows);

            for path in &input.input {
                println!("File: {}", path.display());
            }
            println!("Dimensions: {} x {} ({} pixels)", cols, rows, raster.len());
            println!("Bands: {}", raster.bands());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            let valid = raster.valid_count();
            println!(
                "Valid pixels: {} ({:.1}%)",
                valid,
                100.0 * valid as f64 / raster.len().max(1) as f64
            );

            println!("\nBand statistics:");
            for b in 0..raster.bands() {
                let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
                for pixel in raster.pixels().filter(|p| raster.is_valid_pixel(p)) {
                    let v = pixel[b];
                    min = min.min(v);
                    max = max.max(v);
                    sum += v;
                    n += 1;
                }
                if n > 0 {
                    println!("  Band {}: min {:.4}  max {:.4}  mean {:.4}", b + 1, min, max, sum / n as f64);
                } else {
                    println!("  Band {}: no valid pixels", b + 1);
                }
            }
        }

        // ── Rule matchers ────────────────────────────────────────────
        Commands::Sam { mode } => {
            run_rule(&engine, mode, |reference| Ok(SpectralAngleMapper::new(reference)))?;
        }

        Commands::Scm { mode } => {
            run_rule(&engine, mode, |reference| Ok(SpectralCorrelationMapper::new(reference)))?;
        }

        Commands::CumulativeArea {
            band_start,
            band_end,
            band_widths,
            mode,
        } => {
            run_rule(&engine, mode, |reference| {
                cumulative_area(reference, band_start, band_end, band_widths)
            })?;
        }

        // ── Nearest neighbour ────────────────────────────────────────
        Commands::Nn {
            input,
            output,
            training,
            library,
            ungrouped,
            metric,
            ceiling,
        } => {
            let metric: DistanceMetric = metric.parse()?;
            let raster = read_input(&input)?;
            let classifier = match (training, library) {
                (Some(training), _) => {
                    let labels = read_single_band(&training)?;
                    let classes = training_classes(&raster, &labels)
                        .context("Failed to collect training samples")?;
                    info!("Training classes: {}", classes.len());
                    NearestNeighbour::new(classes, !ungrouped)?
                }
                (None, Some(library)) => NearestNeighbour::from_reference(&read_library(&library)?),
                (None, None) => anyhow::bail!("Either --training or --library is required"),
            };
            let classifier = classifier.with_metric(metric).with_ceiling(ceiling)?;
            run_strategy(&engine, &classifier, &raster, &output)?;
        }

        // ── Clustering ───────────────────────────────────────────────
        Commands::Kmeans {
            input,
            output,
            cluster,
        } => {
            let params = kmeans_params(&cluster)?;
            let raster = read_input(&input)?;
            let pb = spinner("Running k-means...");
            let start = Instant::now();
            let (labels, table) =
                kmeans_raster(&engine, &raster, &params).context("Failed to run k-means")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            info!("Termination: {:?}", table.termination);
            save_centres(&table, cluster.centres.as_deref())?;
            write_result(&labels, &output)?;
            done("K-means", &output, elapsed);
        }

        Commands::Isodata {
            input,
            output,
            cluster,
            max_clusters,
            min_distance,
            stddev_thres,
            prop_over_avg_dist,
        } => {
            let base = kmeans_params(&cluster)?;
            let params = IsodataParams {
                num_clusters: base.num_clusters,
                max_num_clusters: max_clusters,
                max_num_iterations: base.max_num_iterations,
                cluster_move_threshold: base.cluster_move_threshold,
                min_num_vals: base.min_num_vals,
                min_distance_between_centres: min_distance,
                stddev_thres,
                prop_over_avg_dist,
                init: base.init,
                seed: base.seed,
                ..Default::default()
            };
            let raster = read_input(&input)?;
            let pb = spinner("Running ISODATA...");
            let start = Instant::now();
            let (labels, table) =
                isodata_raster(&engine, &raster, &params).context("Failed to run ISODATA")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            info!("Termination: {:?}", table.termination);
            save_centres(&table, cluster.centres.as_deref())?;
            write_result(&labels, &output)?;
            done("ISODATA", &output, elapsed);
        }

        // ── Spectral library ─────────────────────────────────────────
        Commands::Speclib {
            input,
            classes,
            output,
        } => {
            let raster = read_input(&input)?;
            let labels = read_single_band(&classes)?;
            let start = Instant::now();
            let reference = spectral_library_from_training(&raster, &labels)
                .context("Failed to build spectral library")?;
            SpectralLibrary::from(&reference)
                .save(&output)
                .context("Failed to write spectral library")?;
            info!("Library: {} classes x {} bands", reference.len(), reference.num_bands());
            done("Spectral library", &output, start.elapsed());
        }
    }

    Ok(())
}
