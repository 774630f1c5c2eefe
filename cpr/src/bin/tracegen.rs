use anyhow::{bail, Context};
use cpr::*;
use cpr::algo::generate::{generate, write_trace, ArrivalProcess, LaxityDistribution, TraceSpec};

/// Produces a synthetic client trace
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of clients
    #[arg(short = 'n', long)]
    clients:    usize,

    /// Largest laxity that may be drawn
    #[arg(short = 'w', long)]
    max_laxity: Laxity,

    /// Laxity distribution
    #[arg(value_enum)]
    laxities:   LaxityDistribution,

    /// Arrival process
    #[arg(value_enum)]
    arrivals:   ArrivalProcess,

    /// Seed of the random number generator
    #[arg(short, long, default_value_t = 0)]
    seed:       u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = TraceFormat::Xml)]
    format:     TraceFormat,

    /// Output file; named after the distributions if omitted
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output:     Option<PathBuf>,

    /// More logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose:    u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_tracing(cli.verbose);
    let spec = TraceSpec {
        clients:    cli.clients,
        max_laxity: cli.max_laxity,
        laxities:   cli.laxities,
        arrivals:   cli.arrivals,
        seed:       cli.seed,
    };
    let path = cli.output.unwrap_or_else(|| PathBuf::from(spec.file_name(cli.format)));
    if path.exists() {
        bail!("File {} already exists", path.display());
    }
    let clients = generate(&spec)?;

    let fd = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    write_trace(BufWriter::new(fd), &clients, cli.format)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), clients = clients.len(), "trace written");

    Ok(())
}
