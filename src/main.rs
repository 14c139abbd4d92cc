use failure::{Error, ResultExt};
use log::{debug, info};
use std::path::PathBuf;
use structopt::StructOpt;
use traces::{
    augment_dataset, config::ParamsConfig, extractor::write_params, AugmentationParameters,
    Config, Dataset,
};

#[derive(Debug, StructOpt)]
#[structopt(global_settings(&[
    structopt::clap::AppSettings::ColoredHelp,
    structopt::clap::AppSettings::VersionlessSubcommands
]))]
struct CliArgs {
    /// Config file for all advanced settings
    ///
    /// Command line options take precedence over the values in the config file.
    #[structopt(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: SubCommand,
}

#[derive(Debug, StructOpt)]
enum SubCommand {
    /// Extract segment durations and inter-packet times from a dataset of real traces
    Params {
        /// Root directory of the real traces
        #[structopt(value_name = "DATASET")]
        dataset: PathBuf,
        /// Directory for `durations.txt` and `ipts.txt`
        #[structopt(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[structopt(flatten)]
        dims: DatasetArgs,
    },
    /// Create synthetic traces from a dataset of real traces
    ///
    /// The output directory must not exist.
    /// Runs are not resumable: if the augmentation fails, the output directory only contains the items finished so far and must be removed before retrying.
    Augment {
        /// Root directory of the real traces
        #[structopt(value_name = "IN")]
        path_in: PathBuf,
        /// Root directory for the synthetic traces
        #[structopt(value_name = "OUT")]
        path_out: PathBuf,
        /// Directory containing `durations.txt` and `ipts.txt`
        #[structopt(long, value_name = "DIR")]
        params_dir: Option<PathBuf>,
        #[structopt(flatten)]
        dims: DatasetArgs,
        /// Number of synthetic traces per real trace
        #[structopt(long)]
        duplicates: Option<u32>,
        /// Base seed for all random decisions
        #[structopt(long)]
        seed: Option<u64>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Copy, Clone, Debug, Default, StructOpt)]
struct DatasetArgs {
    /// Number of items in the dataset
    #[structopt(long)]
    items: Option<u32>,
    /// Number of offsets per item
    #[structopt(long)]
    offsets: Option<u32>,
    /// Number of samples per item and offset
    #[structopt(long)]
    samples: Option<u32>,
}

impl DatasetArgs {
    /// Build the dataset description, missing values are taken from the config
    fn dataset(self, root: PathBuf, config: &Config, default_samples: u32) -> Dataset {
        Dataset::new(
            root,
            self.items.unwrap_or(config.dataset.items),
            self.offsets.unwrap_or(config.dataset.offsets),
            self.samples.unwrap_or(default_samples),
        )
    }
}

fn main() {
    use std::io::{self, Write};

    if let Err(err) = run() {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        // cannot handle a write error here, we are already in the outermost layer
        let _ = writeln!(out, "An error occured:");
        for fail in err.iter_chain() {
            let _ = writeln!(out, "  {}", fail);
        }
        let _ = writeln!(out, "{}", err.backtrace());
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    // generic setup
    env_logger::init();
    let cli_args = CliArgs::from_args();
    debug!("{:?}", cli_args);

    let config = match &cli_args.config {
        Some(path) => Config::try_load_config(path).context("Could not load config file")?,
        None => Config::default(),
    };

    match cli_args.cmd {
        SubCommand::Params {
            dataset,
            out_dir,
            dims,
        } => run_params(config, dataset, out_dir, dims),
        SubCommand::Augment {
            path_in,
            path_out,
            params_dir,
            dims,
            duplicates,
            seed,
        } => {
            let mut config = config;
            if let Some(duplicates) = duplicates {
                config.generator.duplicates = duplicates;
            }
            if let Some(seed) = seed {
                config.generator.seed = seed;
            }
            run_augment(config, path_in, path_out, params_dir, dims)
        }
        SubCommand::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn run_params(
    config: Config,
    root: PathBuf,
    out_dir: Option<PathBuf>,
    dims: DatasetArgs,
) -> Result<(), Error> {
    let default_samples = config.dataset.extract_samples;
    let dataset = dims.dataset(root, &config, default_samples);
    let params = ParamsConfig {
        dir: out_dir.unwrap_or(config.params.dir),
    };

    let extracted = write_params(&dataset, &config.extractor, &params)?;
    info!(
        "Durations: {} values, inter-packet times: {} values",
        extracted.durations.len(),
        extracted.ratios.len()
    );
    Ok(())
}

fn run_augment(
    config: Config,
    path_in: PathBuf,
    path_out: PathBuf,
    params_dir: Option<PathBuf>,
    dims: DatasetArgs,
) -> Result<(), Error> {
    let input = dims.dataset(path_in, &config, config.dataset.augment_samples);
    let params = ParamsConfig {
        dir: params_dir.unwrap_or_else(|| config.params.dir.clone()),
    };

    info!("Loading parameters from {}", params.dir.display());
    let params = AugmentationParameters::load(&params).with_context(|_| {
        format!(
            "Could not load the augmentation parameters from '{}'",
            params.dir.display()
        )
    })?;
    let output = augment_dataset(&input, &path_out, &params, &config)?;
    info!(
        "Wrote {} synthetic traces to {}",
        output.trace_ids().len(),
        output.root().display()
    );
    Ok(())
}
