use anyhow::{bail, Context};
use cpr::*;
use cpr::algo::run;

/// Replays a client trace through the station-assignment protocol
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to input trace
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:      PathBuf,

    /// Input format
    #[arg(value_enum)]
    format:     TraceFormat,

    /// How laxity classes grow
    #[arg(short, long, value_enum, default_value_t = GrowthPolicy::Constant)]
    policy:     GrowthPolicy,

    /// Also write every status line to this file
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output:     Option<PathBuf>,

    /// Print the final station structure
    #[arg(long)]
    dump:       bool,

    /// More logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose:    u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_tracing(cli.verbose);
    if !cli.input.is_file() {
        bail!("Invalid input path {}", cli.input.display());
    }
    let set = read_trace(cli.input.clone(), cli.format)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    info!(clients = set.len(), policy = ?cli.policy, peak_weight = peak_weight(&set), "trace loaded");
    debug!(laxities = ?laxity_histogram(&set), "laxity histogram");

    let mut results = match &cli.output {
        Some(p) => {
            let fd = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Some(BufWriter::new(fd))
        },
        None => None,
    };
    let mut write_err: Option<io::Error> = None;
    let mut co = Coordinator::new(cli.policy);
    let summary = run(&mut co, &set, |report| {
        println!("{report}");
        if write_err.is_some() { return; }
        if let Some(out) = results.as_mut() {
            if let Err(e) = writeln!(out, "{report}") {
                write_err = Some(e);
            }
        }
    })?;
    if let Some(e) = write_err {
        return Err(e).context("writing results");
    }
    if let Some(mut out) = results {
        out.flush().context("writing results")?;
    }

    println!("max alpha = {}", summary.alpha_max);
    println!("max beta = {}", summary.beta_max);
    if cli.dump {
        print!("{co}");
    }

    Ok(())
}
