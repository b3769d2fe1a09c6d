//! Minimisation of the log-negativity over frame parameters.
//!
//! Two inner minimisers are available: a quasi-Newton method (L-BFGS
//! directions from central-difference gradients with Armijo backtracking)
//! and a derivative-free coordinate pattern search. Both only ever accept
//! improving steps.
//!
//! The global optimizer runs basin hopping over the whole parameter vector.
//! The local optimizer sweeps the circuit and, at each element, minimises
//! only the parameters that element opens against the elements that read
//! them.

use crate::error::{QuasiError, Result};
use crate::negativity::{Element, NegativityModel};
use rng::ONDRng;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const FD_STEP: f64 = 1e-6;
const LBFGS_MEMORY: usize = 8;
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizationMethod {
    /// Quasi-Newton (L-BFGS) with numerical gradients.
    Gradient,
    /// Derivative-free coordinate pattern search.
    Coordinate,
}

impl FromStr for OptimizationMethod {
    type Err = QuasiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gradient" | "B" | "basinhopping" | "lbfgs" => Ok(OptimizationMethod::Gradient),
            "coordinate" | "NG" | "powell" => Ok(OptimizationMethod::Coordinate),
            other => Err(QuasiError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizationMethod::Gradient => "gradient",
            OptimizationMethod::Coordinate => "coordinate",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitialPoint {
    Wigner,
    /// Uniform in [-1, 1] per parameter.
    Random,
}

#[derive(Clone, Debug)]
pub struct OptimizeConfig {
    pub method: OptimizationMethod,
    /// Basin-hopping iterations after the first local minimisation.
    pub niter: usize,
    /// Failed minimisations tolerated before giving up.
    pub max_restarts: usize,
    pub initial: InitialPoint,
    /// Half-width of the uniform basin-hopping perturbation.
    pub step: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: String,
    /// Also start from the local optimum, so global never loses to local.
    pub warm_start: bool,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            method: OptimizationMethod::Gradient,
            niter: 3,
            max_restarts: 5,
            initial: InitialPoint::Wigner,
            step: 0.5,
            max_iter: 200,
            tol: 1e-8,
            seed: "quasi-opt".to_string(),
            warm_start: true,
        }
    }
}

impl OptimizeConfig {
    pub fn with_method(mut self, method: OptimizationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_niter(mut self, niter: usize) -> Self {
        self.niter = niter;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_initial(mut self, initial: InitialPoint) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    fn local(&self) -> LocalConfig {
        LocalConfig {
            method: self.method,
            max_iter: self.max_iter,
            tol: self.tol,
            order: LocalOrder::Forward,
        }
    }
}

/// Order in which the local optimizer visits the gates. States are always
/// visited before gates for `Forward` and `Custom`, after them for `Reverse`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalOrder {
    Forward,
    Reverse,
    /// A permutation of the gate indices.
    Custom(Vec<usize>),
}

#[derive(Clone, Debug)]
pub struct LocalConfig {
    pub method: OptimizationMethod,
    pub max_iter: usize,
    pub tol: f64,
    pub order: LocalOrder,
}

impl Default for LocalConfig {
    fn default() -> Self {
        OptimizeConfig::default().local()
    }
}

#[derive(Clone, Debug)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub log_neg: f64,
    pub neg: f64,
    pub evaluations: usize,
    pub elapsed: Duration,
}

impl OptimizeResult {
    fn new(x: Vec<f64>, log_neg: f64, evaluations: usize, started: Instant) -> Self {
        Self {
            x,
            log_neg,
            neg: log_neg.exp(),
            evaluations,
            elapsed: started.elapsed(),
        }
    }
}

/// The Wigner point, evaluated, as a baseline next to optimised results.
pub fn wigner_result(model: &NegativityModel) -> Result<OptimizeResult> {
    let started = Instant::now();
    let x = model.wigner_point();
    let log_neg = model.log_negativity(&x)?;
    Ok(OptimizeResult::new(x, log_neg, 1, started))
}

/// Basin hopping over all frame parameters.
///
/// Fails with `RestartBudgetExhausted` only if no minimisation produced a
/// finite result within `max_restarts` failures.
pub fn optimize_global(model: &NegativityModel, cfg: &OptimizeConfig) -> Result<OptimizeResult> {
    let started = Instant::now();
    let mut rng = ONDRng::new(cfg.seed.as_bytes());
    let n = model.n_params();
    let cost = |x: &[f64]| finite_or_inf(model.log_negativity(x));

    let x0 = match cfg.initial {
        InitialPoint::Wigner => model.wigner_point(),
        InitialPoint::Random => (0..n).map(|_| rng.uniform(-1.0, 1.0, b"init")).collect(),
    };
    let keep = |found: Minimum, best: &mut Option<Minimum>| {
        if best.as_ref().map_or(true, |b| found.value < b.value) {
            *best = Some(found);
        }
    };

    let mut best: Option<Minimum> = None;
    let mut starts = vec![x0.clone()];
    let mut evaluations = 0;
    if cfg.warm_start {
        let local = optimize_local(model, &cfg.local())?;
        evaluations += local.evaluations;
        starts.push(local.x.clone());
        keep(
            Minimum {
                x: local.x,
                value: local.log_neg,
                evaluations: 0,
            },
            &mut best,
        );
    }

    let mut attempts = 0;
    let mut failures = 0;

    for start in starts {
        attempts += 1;
        match minimize(cfg.method, &cost, &start, cfg.max_iter, cfg.tol) {
            Ok(found) => {
                evaluations += found.evaluations;
                keep(found, &mut best);
            }
            Err(e) if e.is_retryable() => {
                failures += 1;
                warn!(attempt = attempts, error = %e, "starting point failed");
            }
            Err(e) => return Err(e),
        }
    }

    let mut hops = 0;
    while hops < cfg.niter && failures <= cfg.max_restarts {
        let base = best.as_ref().map_or(&x0, |b| &b.x);
        let candidate: Vec<f64> = base
            .iter()
            .map(|v| v + rng.uniform(-cfg.step, cfg.step, b"hop"))
            .collect();
        attempts += 1;
        match minimize(cfg.method, &cost, &candidate, cfg.max_iter, cfg.tol) {
            Ok(found) => {
                hops += 1;
                evaluations += found.evaluations;
                debug!(hop = hops, log_neg = found.value, "basin hop");
                keep(found, &mut best);
            }
            Err(e) if e.is_retryable() => {
                failures += 1;
                warn!(attempt = attempts, error = %e, "basin hop failed, restarting");
            }
            Err(e) => return Err(e),
        }
    }

    let best = best.ok_or(QuasiError::RestartBudgetExhausted { attempts })?;
    let result = OptimizeResult::new(best.x, best.value, evaluations, started);
    info!(
        method = %cfg.method,
        log_neg = result.log_neg,
        evaluations = result.evaluations,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "global optimisation finished"
    );
    Ok(result)
}

/// Block-coordinate sweep starting from the Wigner point.
///
/// Each step moves only the parameters an element opens and is scored on
/// every element reading them, so no step can raise the total.
pub fn optimize_local(model: &NegativityModel, cfg: &LocalConfig) -> Result<OptimizeResult> {
    let started = Instant::now();
    let np = model.phase_space().n_params();
    let layout = model.layout();
    let mut x = model.wigner_point();
    let mut evaluations = 0;

    for owner in visit_order(model, &cfg.order)? {
        let blocks = layout.owned_blocks(owner);
        if blocks.is_empty() {
            continue;
        }
        let touching = model.elements_touching(&blocks);
        let base = x.clone();
        let sub0: Vec<f64> = blocks
            .iter()
            .flat_map(|&b| base[b * np..(b + 1) * np].iter().copied())
            .collect();
        let cost = |sub: &[f64]| {
            let mut full = base.clone();
            scatter_blocks(&mut full, &blocks, np, sub);
            finite_or_inf(model.partial_log_negativity(&full, &touching))
        };
        match minimize(cfg.method, &cost, &sub0, cfg.max_iter, cfg.tol) {
            Ok(found) => {
                evaluations += found.evaluations;
                scatter_blocks(&mut x, &blocks, np, &found.x);
            }
            Err(e) if e.is_retryable() => {
                warn!(element = ?owner, error = %e, "local step failed, keeping frames");
            }
            Err(e) => return Err(e),
        }
    }

    let log_neg = model.log_negativity(&x)?;
    let result = OptimizeResult::new(x, log_neg, evaluations, started);
    info!(
        method = %cfg.method,
        log_neg = result.log_neg,
        evaluations = result.evaluations,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "local optimisation finished"
    );
    Ok(result)
}

fn visit_order(model: &NegativityModel, order: &LocalOrder) -> Result<Vec<Element>> {
    let n_gates = model.circuit().gates().len();
    let states = (0..model.circuit().n_wires()).map(Element::State);
    let gates: Vec<usize> = match order {
        LocalOrder::Forward | LocalOrder::Reverse => (0..n_gates).collect(),
        LocalOrder::Custom(perm) => {
            let mut seen = vec![false; n_gates];
            for &g in perm {
                if g >= n_gates || seen[g] {
                    return Err(QuasiError::InvalidOrder(perm.clone()));
                }
                seen[g] = true;
            }
            if perm.len() != n_gates {
                return Err(QuasiError::InvalidOrder(perm.clone()));
            }
            perm.clone()
        }
    };
    let mut visit: Vec<Element> = states.chain(gates.into_iter().map(Element::Gate)).collect();
    if *order == LocalOrder::Reverse {
        visit.reverse();
    }
    Ok(visit)
}

fn scatter_blocks(x: &mut [f64], blocks: &[usize], np: usize, sub: &[f64]) {
    for (chunk, &b) in sub.chunks(np).zip(blocks) {
        x[b * np..(b + 1) * np].copy_from_slice(chunk);
    }
}

fn finite_or_inf(value: Result<f64>) -> f64 {
    match value {
        Ok(v) if v.is_finite() => v,
        _ => f64::INFINITY,
    }
}

#[derive(Clone, Debug)]
struct Minimum {
    x: Vec<f64>,
    value: f64,
    evaluations: usize,
}

/// Counts evaluations of the wrapped cost.
struct Counted<'a> {
    f: &'a dyn Fn(&[f64]) -> f64,
    calls: usize,
}

impl Counted<'_> {
    fn eval(&mut self, x: &[f64]) -> f64 {
        self.calls += 1;
        (self.f)(x)
    }
}

fn minimize(
    method: OptimizationMethod,
    f: &dyn Fn(&[f64]) -> f64,
    x0: &[f64],
    max_iter: usize,
    tol: f64,
) -> Result<Minimum> {
    let mut f = Counted { f, calls: 0 };
    let (x, value) = match method {
        OptimizationMethod::Gradient => lbfgs(&mut f, x0, max_iter, tol)?,
        OptimizationMethod::Coordinate => pattern_search(&mut f, x0, max_iter, tol)?,
    };
    Ok(Minimum {
        x,
        value,
        evaluations: f.calls,
    })
}

fn gradient(f: &mut Counted<'_>, x: &[f64]) -> Result<Vec<f64>> {
    let mut probe = x.to_vec();
    let mut g = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        probe[i] = x[i] + FD_STEP;
        let up = f.eval(&probe);
        probe[i] = x[i] - FD_STEP;
        let down = f.eval(&probe);
        probe[i] = x[i];
        let gi = (up - down) / (2.0 * FD_STEP);
        if !gi.is_finite() {
            return Err(QuasiError::NonFinite("gradient"));
        }
        g.push(gi);
    }
    Ok(g)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// L-BFGS two-loop recursion: returns -H g.
fn lbfgs_direction(g: &[f64], history: &[(Vec<f64>, Vec<f64>)]) -> Vec<f64> {
    let mut q = g.to_vec();
    let mut alphas = Vec::with_capacity(history.len());
    for (s, y) in history.iter().rev() {
        let rho = 1.0 / dot(y, s);
        let alpha = rho * dot(s, &q);
        for (qi, yi) in q.iter_mut().zip(y) {
            *qi -= alpha * yi;
        }
        alphas.push((alpha, rho));
    }
    if let Some((s, y)) = history.last() {
        let gamma = dot(s, y) / dot(y, y);
        q.iter_mut().for_each(|v| *v *= gamma);
    }
    for ((s, y), (alpha, rho)) in history.iter().zip(alphas.into_iter().rev()) {
        let beta = rho * dot(y, &q);
        for (qi, si) in q.iter_mut().zip(s) {
            *qi += (alpha - beta) * si;
        }
    }
    q.iter().map(|v| -v).collect()
}

fn lbfgs(f: &mut Counted<'_>, x0: &[f64], max_iter: usize, tol: f64) -> Result<(Vec<f64>, f64)> {
    let mut x = x0.to_vec();
    let mut fx = f.eval(&x);
    if !fx.is_finite() {
        return Err(QuasiError::NonFinite("cost at starting point"));
    }
    let mut g = gradient(f, &x)?;
    let mut history: Vec<(Vec<f64>, Vec<f64>)> = Vec::with_capacity(LBFGS_MEMORY);

    for _ in 0..max_iter {
        if inf_norm(&g) < tol {
            break;
        }
        let mut dir = lbfgs_direction(&g, &history);
        let mut slope = dot(&g, &dir);
        if slope >= 0.0 {
            history.clear();
            dir = g.iter().map(|v| -v).collect();
            slope = dot(&g, &dir);
        }

        // First step without curvature information: cap the move at 0.1.
        let mut t = if history.is_empty() {
            (0.1 / inf_norm(&dir)).min(1.0)
        } else {
            1.0
        };
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let trial: Vec<f64> = x.iter().zip(&dir).map(|(xi, di)| xi + t * di).collect();
            let ft = f.eval(&trial);
            if ft.is_finite() && ft <= fx + ARMIJO_C1 * t * slope {
                accepted = Some((trial, ft));
                break;
            }
            t *= 0.5;
        }
        let Some((x_new, f_new)) = accepted else {
            break;
        };

        let g_new = gradient(f, &x_new)?;
        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        if dot(&s, &y) > 1e-12 {
            if history.len() == LBFGS_MEMORY {
                history.remove(0);
            }
            history.push((s, y));
        }

        let decrease = fx - f_new;
        x = x_new;
        fx = f_new;
        g = g_new;
        if decrease < tol * fx.abs().max(1.0) {
            break;
        }
    }
    Ok((x, fx))
}

fn pattern_search(f: &mut Counted<'_>, x0: &[f64], max_iter: usize, tol: f64) -> Result<(Vec<f64>, f64)> {
    let mut x = x0.to_vec();
    let mut fx = f.eval(&x);
    if !fx.is_finite() {
        return Err(QuasiError::NonFinite("cost at starting point"));
    }
    let mut step = 0.1;
    for _ in 0..max_iter {
        let mut improved = false;
        for i in 0..x.len() {
            for delta in [step, -step] {
                let old = x[i];
                x[i] = old + delta;
                let ft = f.eval(&x);
                if ft < fx {
                    fx = ft;
                    improved = true;
                    break;
                }
                x[i] = old;
            }
        }
        if !improved {
            step *= 0.5;
            if step < tol.max(1e-10) {
                break;
            }
        }
    }
    Ok((x, fx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("B".parse::<OptimizationMethod>().unwrap(), OptimizationMethod::Gradient);
        assert_eq!("NG".parse::<OptimizationMethod>().unwrap(), OptimizationMethod::Coordinate);
        assert!(matches!(
            "simplex".parse::<OptimizationMethod>(),
            Err(QuasiError::UnknownMethod(_))
        ));
    }

    #[test]
    fn lbfgs_finds_rosenbrock_minimum() {
        let m = minimize(OptimizationMethod::Gradient, &rosenbrock, &[-1.2, 1.0], 500, 1e-12).unwrap();
        assert!(m.value < 1e-4, "f = {}", m.value);
        assert!((m.x[0] - 1.0).abs() < 5e-2);
    }

    #[test]
    fn pattern_search_minimises_quadratic() {
        let f = |x: &[f64]| (x[0] - 0.3).powi(2) + (x[1] + 0.7).powi(2);
        let m = minimize(OptimizationMethod::Coordinate, &f, &[0.0, 0.0], 200, 1e-9).unwrap();
        assert!(m.value < 1e-8);
    }

    #[test]
    fn infinite_start_is_retryable() {
        let f = |_: &[f64]| f64::INFINITY;
        let err = minimize(OptimizationMethod::Gradient, &f, &[0.0], 10, 1e-8).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn minimisers_never_increase_cost() {
        let f = |x: &[f64]| x[0].abs() + (x[1] * 3.0).sin();
        for method in [OptimizationMethod::Gradient, OptimizationMethod::Coordinate] {
            let m = minimize(method, &f, &[0.4, 0.2], 50, 1e-8).unwrap();
            assert!(m.value <= f(&[0.4, 0.2]));
        }
    }
}
