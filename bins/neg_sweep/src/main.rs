use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantum::generator::{IndexMethod, RandomCircuit};
use quantum::{
    optimize_global, optimize_local, wigner_result, LocalConfig, NegativityModel,
    OptimizationMethod, OptimizeConfig,
};
use rng::ONDRng;
use simulator::output;

use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Log-negativity sweep over random circuit length")]
struct Args {
    /// Number of wires
    #[arg(long, default_value_t = 3)]
    wires: usize,

    /// Local dimension (2 or 3)
    #[arg(long, default_value_t = 2)]
    dim: usize,

    /// Comma-separated list of circuit lengths (gates)
    #[arg(long, default_value = "1,2,4,6,8")]
    lengths: String,

    /// Wires per gate
    #[arg(long, default_value_t = 2)]
    width: usize,

    /// Use the brick-wall placement instead of random wires
    #[arg(long)]
    canonical: bool,

    /// Compress into blocks of this many wires before optimising (0 = off)
    #[arg(long, default_value_t = 0)]
    compress: usize,

    /// Random circuits per length
    #[arg(long, default_value_t = 5)]
    reps: usize,

    /// Inner optimizer: gradient | B | coordinate | NG
    #[arg(long, default_value = "gradient")]
    method: String,

    /// Basin-hopping iterations
    #[arg(long, default_value_t = 2)]
    niter: usize,

    /// Iteration cap of each inner minimisation
    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// Base RNG seed (shared across lengths)
    #[arg(long, default_value = "neg-sweep")]
    seed: String,

    /// Output CSV path
    #[arg(long, default_value = "neg_sweep.csv")]
    out: String,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.reps == 0 {
        bail!("reps must be > 0");
    }
    let lengths = parse_lengths(&args.lengths);
    if lengths.is_empty() {
        bail!("lengths must contain at least one integer value");
    }

    let method: OptimizationMethod = args.method.parse()?;
    let local = LocalConfig {
        method,
        max_iter: args.max_iter,
        ..LocalConfig::default()
    };

    let mut rows = Vec::with_capacity(lengths.len());
    for &length in &lengths {
        let mut rng = ONDRng::new(format!("{}-{}", args.seed, length).as_bytes());
        let mut sums = [0.0; 3];
        let start = Instant::now();

        for rep in 0..args.reps {
            let mut shape = RandomCircuit::new(args.wires, length, args.width);
            shape.dim = args.dim;
            if args.canonical {
                shape.method = IndexMethod::Canonical;
            }
            let mut circuit = shape.generate(&mut rng)?;
            if args.compress > 0 {
                circuit = circuit.compress(args.compress)?;
            }

            let model = NegativityModel::new(circuit)?;
            let global_cfg = OptimizeConfig::default()
                .with_method(method)
                .with_niter(args.niter)
                .with_max_iter(args.max_iter)
                .with_seed(format!("{}-{}-{}", args.seed, length, rep));
            let values = [
                wigner_result(&model)?.log_neg,
                optimize_local(&model, &local)?.log_neg,
                optimize_global(&model, &global_cfg)?.log_neg,
            ];
            debug!(length, rep, ?values, "circuit optimised");
            for (s, v) in sums.iter_mut().zip(values) {
                *s += v;
            }
        }

        let reps = args.reps as f64;
        let ms_per_circuit = start.elapsed().as_secs_f64() * 1000.0 / reps;
        let [wigner, local_neg, global] = sums.map(|s| s / reps);
        println!(
            "gates={} wigner={:.4} local={:.4} global={:.4} ms/circuit={:.1}",
            length, wigner, local_neg, global, ms_per_circuit
        );
        rows.push(vec![length as f64, wigner, local_neg, global, ms_per_circuit]);
    }

    output::write_table(
        &args.out,
        &["gates", "wigner", "local", "global", "ms_per_circuit"],
        &rows,
    )
    .with_context(|| format!("writing {}", args.out))?;
    println!("wrote {}", args.out);
    Ok(())
}

fn parse_lengths(input: &str) -> Vec<usize> {
    input
        .split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                t.parse::<usize>().ok()
            }
        })
        .collect()
}
