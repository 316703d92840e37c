use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use randomart_gpu::{RunConfig, config};

#[derive(Parser, Debug)]
#[command(name = "randomart-gpu", version)]
struct Cli {
    /// Log pipeline diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an image with the given file name and dimensions.
    Render(RenderArgs),
    /// Render with the built-in file name and dimensions.
    Preset(KernelArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Output PNG file name, placed under --out-dir.
    output: PathBuf,

    /// Image width in pixels.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Image height in pixels.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    #[command(flatten)]
    opts: KernelArgs,
}

#[derive(Args, Debug)]
struct KernelArgs {
    /// Directory the output file is written into. Must already exist.
    #[arg(long, default_value = config::DEFAULT_OUTPUT_DIR)]
    out_dir: PathBuf,

    /// WGSL kernel module.
    #[arg(long, default_value = config::DEFAULT_KERNEL_PATH)]
    kernel: PathBuf,

    /// Kernel entry point.
    #[arg(long, default_value = config::DEFAULT_ENTRY_POINT)]
    entry_point: String,

    /// Preferred workgroup width (threads along x).
    #[arg(long, default_value_t = config::DEFAULT_EXECUTION_WIDTH, value_parser = clap::value_parser!(u32).range(1..))]
    execution_width: u32,
}

impl KernelArgs {
    fn apply(self, cfg: RunConfig) -> RunConfig {
        cfg.with_output_dir(self.out_dir)
            .with_kernel(self.kernel, self.entry_point)
            .with_execution_width(self.execution_width)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match cli.cmd {
        Command::Render(args) => {
            args.opts
                .apply(RunConfig::explicit(args.output, args.width, args.height))
        }
        Command::Preset(args) => args.apply(RunConfig::hardcoded()),
    };

    let report = match randomart_gpu::run(&cfg) {
        Ok(report) => report,
        Err(e) => {
            if e.is_fatal() {
                tracing::error!(error = %e, "unrecoverable gpu environment failure");
            }
            return Err(e).with_context(|| format!("render '{}'", cfg.output_path().display()));
        }
    };

    println!(
        "GPU kernel execution took {:.3} ms",
        report.stats.elapsed_ms()
    );
    tracing::info!(
        adapter = %report.adapter,
        group_w = report.geometry.width,
        group_h = report.geometry.height,
        "run complete"
    );
    println!("saved {}", report.output_path.display());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
