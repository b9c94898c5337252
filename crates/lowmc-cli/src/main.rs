//! Command-line interface for `lowmc-gen`.

#![forbid(unsafe_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use lowmc_gen::{
    build_artifact, csource, linear_layer_name, sample_reference_instance, store, ArtifactConfig,
    Instance, InstanceParams, InstanceStore, WordWidth,
};
use tempfile::NamedTempFile;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// LowMC parameter generator CLI.
#[derive(Parser)]
#[command(
    name = "lowmc-params",
    version,
    about = "Deterministic LowMC parameter generation and emission"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. `info`, `lowmc_gen=debug`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct InstanceArgs {
    /// Named preset such as `128-128-20`.
    #[arg(long, value_parser = parse_preset, conflicts_with_all = ["block_size", "key_size", "rounds"])]
    preset: Option<InstanceParams>,
    /// Block size n in bits.
    #[arg(long, short = 'n')]
    block_size: Option<usize>,
    /// Key size k in bits.
    #[arg(long, short = 'k')]
    key_size: Option<usize>,
    /// Number of rounds.
    #[arg(long, short = 'r')]
    rounds: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// bincode snapshot of the packed artifact.
    Bincode,
    /// C header and source with `mzd_local_t` initialisers.
    C,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample an instance from the reference bit stream and store it.
    Gen {
        #[command(flatten)]
        params: InstanceArgs,
        /// Output path for the instance snapshot.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Build the packed parameter artifact and write it out.
    Emit {
        #[command(flatten)]
        params: InstanceArgs,
        /// Stored instance to reuse instead of sampling.
        #[arg(long, value_name = "FILE", conflicts_with = "store")]
        instance: Option<PathBuf>,
        /// Cache directory; the instance is sampled and saved there on first use.
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
        /// Number of 3-bit S-boxes per round.
        #[arg(long, default_value_t = InstanceParams::DEFAULT_SBOX_COUNT)]
        sbox_count: usize,
        /// Word width of the packed layout: 8, 16, 32 or 64.
        #[arg(long, default_value_t = 64, value_parser = parse_width)]
        width: usize,
        /// Leave out the reduced key schedule.
        #[arg(long = "no-reduced", action = ArgAction::SetFalse)]
        reduced: bool,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::C)]
        format: Format,
        /// Directory receiving the output files.
        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Validate a stored instance and print a fingerprint of it.
    Check {
        #[command(flatten)]
        params: InstanceArgs,
        /// Path to the instance snapshot.
        #[arg(long, value_name = "FILE")]
        instance: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    match cli.command {
        Commands::Gen { params, out } => cmd_gen(params.resolve()?, &out),
        Commands::Emit {
            params,
            instance,
            store,
            sbox_count,
            width,
            reduced,
            format,
            out_dir,
        } => {
            let width = WordWidth::from_bits(width).context("unsupported word width")?;
            let config = ArtifactConfig {
                sbox_count,
                width,
                reduced,
            };
            let source = match (instance, store) {
                (Some(path), _) => InstanceSource::File(path),
                (None, Some(dir)) => InstanceSource::Store(InstanceStore::new(dir)),
                (None, None) => InstanceSource::Sample,
            };
            cmd_emit(
                params.resolve()?,
                &source,
                &config,
                format,
                &out_dir,
            )
        }
        Commands::Check { params, instance } => cmd_check(params.resolve()?, &instance),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

impl InstanceArgs {
    fn resolve(self) -> Result<InstanceParams> {
        if let Some(params) = self.preset {
            return Ok(params);
        }
        let defaults = InstanceParams::default();
        let params = InstanceParams::new(
            self.block_size.unwrap_or(defaults.block_size),
            self.key_size.unwrap_or(defaults.key_size),
            self.rounds.unwrap_or(defaults.rounds),
        );
        if params.block_size == 0 || params.key_size == 0 {
            bail!("block and key size must be positive");
        }
        Ok(params)
    }
}

fn cmd_gen(params: InstanceParams, out: &Path) -> Result<()> {
    let instance = sample_reference_instance(params)
        .with_context(|| format!("sample instance {params}"))?;
    store::save_to(out, &instance).with_context(|| format!("write {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

enum InstanceSource {
    File(PathBuf),
    Store(InstanceStore),
    Sample,
}

fn cmd_emit(
    params: InstanceParams,
    source: &InstanceSource,
    config: &ArtifactConfig,
    format: Format,
    out_dir: &Path,
) -> Result<()> {
    let instance = match source {
        InstanceSource::File(path) => load_instance(path, params)?,
        InstanceSource::Store(store) => store
            .load_or_sample(params)
            .with_context(|| format!("load {}", store.path_for(params).display()))?,
        InstanceSource::Sample => sample_reference_instance(params)
            .with_context(|| format!("sample instance {params}"))?,
    };
    let artifact = build_artifact(&instance, config).context("build artifact")?;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let stem = csource::stem(&artifact);
    let files = match format {
        Format::Bincode => vec![(
            out_dir.join(format!("{stem}.bin")),
            artifact.to_bytes().context("serialize artifact")?,
        )],
        Format::C => vec![
            (
                out_dir.join(format!("{stem}.h")),
                csource::render_header(&artifact).into_bytes(),
            ),
            (
                out_dir.join(format!("{stem}.c")),
                csource::render_source(&artifact).into_bytes(),
            ),
        ],
    };
    write_all_or_nothing(out_dir, &files)?;
    for (path, _) in &files {
        info!(path = %path.display(), "wrote artifact file");
        println!("{}", path.display());
    }
    Ok(())
}

/// Stages every file in `dir` first, then renames them into place. On failure
/// no file of the set is left behind.
fn write_all_or_nothing(dir: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, contents) in files {
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("create temporary file in {}", dir.display()))?;
        tmp.write_all(contents).with_context(|| format!("write {}", path.display()))?;
        staged.push((tmp, path));
    }

    let mut placed: Vec<&Path> = Vec::with_capacity(staged.len());
    for (tmp, path) in staged {
        if let Err(err) = tmp.persist(path) {
            for done in placed {
                let _ = fs::remove_file(done);
            }
            return Err(anyhow::Error::new(err.error))
                .with_context(|| format!("write {}", path.display()));
        }
        placed.push(path);
    }
    Ok(())
}

fn cmd_check(params: InstanceParams, instance_path: &Path) -> Result<()> {
    let instance = load_instance(instance_path, params)?;
    instance
        .validate()
        .with_context(|| format!("validate {}", instance_path.display()))?;

    let artifact = build_artifact(
        &instance,
        &ArtifactConfig {
            sbox_count: 0,
            width: WordWidth::W64,
            reduced: false,
        },
    )
    .context("pack instance")?;
    let name = linear_layer_name(0);
    let Some(first) = artifact.object(&name) else {
        bail!("instance {params} has no linear layers");
    };
    let row: Vec<u8> = first
        .row(0)
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .collect();
    println!("instance {params}: ok");
    println!("{name}[0]: {}", hex::encode(row));
    Ok(())
}

fn load_instance(path: &Path, params: InstanceParams) -> Result<Instance> {
    store::load_from(path, params).with_context(|| format!("load {}", path.display()))
}

fn parse_preset(name: &str) -> Result<InstanceParams, String> {
    InstanceParams::preset(name).ok_or_else(|| format!("unknown preset {name:?}"))
}

fn parse_width(value: &str) -> Result<usize, String> {
    let bits: usize = value.parse().map_err(|_| format!("not a number: {value}"))?;
    WordWidth::from_bits(bits)
        .map(WordWidth::bits)
        .ok_or_else(|| format!("width must be 8, 16, 32 or 64, got {bits}"))
}
