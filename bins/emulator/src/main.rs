use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantum::generator::{bernstein_vazirani, haar_two_gate_circuit, IndexMethod, RandomCircuit};
use quantum::{Circuit, LocalConfig, OptimizationMethod, OptimizeConfig};
use rng::ONDRng;
use simulator::{output, sample_batched, Estimator, QdCircuit, Representation};

/// Quasi-probability Monte Carlo estimator for qudit circuits (OND-RNG)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Circuit to estimate
    #[arg(long, value_enum, default_value_t = CircuitKind::Magic)]
    circuit: CircuitKind,

    /// Local dimension for the magic and random circuits (2 or 3)
    #[arg(long, default_value_t = 2)]
    dim: usize,

    /// Wires of the random circuit
    #[arg(long, default_value_t = 4)]
    wires: usize,

    /// Gates of the random circuit, or blocks of the haar2 circuit
    #[arg(long, default_value_t = 6)]
    gates: usize,

    /// Wires per random gate
    #[arg(long, default_value_t = 2)]
    width: usize,

    /// Wire placement of random gates
    #[arg(long, value_enum, default_value_t = Placement::Random)]
    placement: Placement,

    /// Compress into blocks of this many wires before sampling (0 = off)
    #[arg(long, default_value_t = 0)]
    compress: usize,

    /// Frame parameters used for sampling
    #[arg(long, value_enum, default_value_t = Repr::Optimized)]
    representation: Repr,

    /// Inner optimizer: gradient | B | coordinate | NG
    #[arg(long, default_value = "gradient")]
    method: String,

    /// Basin-hopping iterations
    #[arg(long, default_value_t = 3)]
    niter: usize,

    /// Iteration cap of each inner minimisation
    #[arg(long, default_value_t = 200)]
    max_iter: usize,

    /// Per-sample estimator
    #[arg(long, value_enum, default_value_t = EstimatorKind::Product)]
    estimator: EstimatorKind,

    /// Number of Monte Carlo samples
    #[arg(long, default_value_t = 100_000)]
    samples: usize,

    /// Independent sampling batches (1 = sequential, keeps a trace)
    #[arg(long, default_value_t = 8)]
    batches: usize,

    /// RNG seed (full reproducibility)
    #[arg(long, default_value = "default-seed")]
    seed: String,

    /// Number of Rayon worker threads (0 = Rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Write the running estimate to this CSV (sequential sampling only)
    #[arg(long)]
    trace: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CircuitKind {
    /// |+0>, T H on wire 0, CNOT, T H on wire 1, project wire 0 on |0>
    Magic,
    /// Three-qubit Bernstein-Vazirani with a Clifford+T oracle
    Bv,
    /// Haar-random gates on (0,1) then (1,2), repeated
    Haar2,
    Random,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Placement {
    Random,
    Canonical,
    Chain,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Repr {
    Wigner,
    Optimized,
    Local,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EstimatorKind {
    Product,
    Ring,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("failed to build Rayon thread pool")?;
    }
    if args.samples == 0 {
        bail!("samples must be > 0");
    }
    if args.trace.is_some() && args.batches > 1 {
        bail!("--trace needs --batches 1");
    }

    let rng = ONDRng::new(args.seed.as_bytes());
    let circuit = build_circuit(&args, &mut rng.split(b"circuit"))?;
    info!(
        wires = circuit.n_wires(),
        gates = circuit.gates().len(),
        dim = circuit.dim(),
        connectivity = %circuit.connectivity(),
        "circuit ready"
    );

    let method: OptimizationMethod = args.method.parse()?;
    let optimize = OptimizeConfig::default()
        .with_method(method)
        .with_niter(args.niter)
        .with_max_iter(args.max_iter)
        .with_seed(format!("{}-opt", args.seed));
    let local = LocalConfig {
        method,
        max_iter: args.max_iter,
        ..LocalConfig::default()
    };

    let mut qd = QdCircuit::new(circuit)
        .with_optimize_config(optimize)
        .with_local_config(local);
    if args.compress > 0 {
        let blocks = qd.compress(args.compress)?.gates().len();
        println!("compressed into {} blocks of {} wires", blocks, args.compress);
    }

    let repr = match args.representation {
        Repr::Wigner => Representation::Wigner,
        Repr::Optimized => Representation::Optimized,
        Repr::Local => Representation::LocalOptimized,
    };
    let estimator = match args.estimator {
        EstimatorKind::Product => Estimator::Product,
        EstimatorKind::Ring => Estimator::RingCorrelation,
    };

    let wigner_log_neg = qd.opt_x(Representation::Wigner)?.log_neg;
    let sampler = qd.sampler(repr, estimator)?;
    println!("wigner log-negativity = {:.6}", wigner_log_neg);
    println!(
        "{} log-negativity = {:.6}",
        repr,
        sampler.total_negativity().ln()
    );

    let report = if args.batches > 1 {
        sample_batched(&sampler, args.samples, args.batches, &args.seed)
    } else {
        sampler.sample(args.samples, &mut rng.split(b"sample"), args.trace.is_some())
    };

    println!(
        "estimate = {:.6} +- {:.6} ({} samples, {:.3} s)",
        report.estimate,
        report.std_error,
        report.sample_size,
        report.elapsed.as_secs_f64()
    );
    if estimator == Estimator::Product {
        println!("exact    = {:.6}", qd.exact_probability());
    }

    if let (Some(path), Some(trace)) = (&args.trace, &report.trace) {
        output::write_trace(path, trace).with_context(|| format!("writing {}", path))?;
        println!("trace written to {}", path);
    }
    Ok(())
}

fn build_circuit(args: &Args, rng: &mut ONDRng) -> Result<Circuit> {
    let circuit = match args.circuit {
        CircuitKind::Magic => Circuit::from_labels(
            args.dim,
            "+0",
            &[(&[0], "T"), (&[0], "H"), (&[0, 1], "C+"), (&[1], "T"), (&[1], "H")],
            "0/",
        )?,
        CircuitKind::Bv => bernstein_vazirani()?,
        CircuitKind::Haar2 => haar_two_gate_circuit(args.gates, rng)?,
        CircuitKind::Random => {
            let mut shape = RandomCircuit::new(args.wires, args.gates, args.width);
            shape.dim = args.dim;
            shape.method = match args.placement {
                Placement::Random => IndexMethod::Random,
                Placement::Canonical => IndexMethod::Canonical,
                Placement::Chain => IndexMethod::Chain,
            };
            shape.generate(rng)?
        }
    };
    Ok(circuit)
}
