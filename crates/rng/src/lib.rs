use sha3::{digest::{ExtendableOutput, Update, XofReader}, Shake256};

/// Deterministic SHAKE256-chained random stream.
///
/// Every draw takes a context tag that is mixed into the output, so two call
/// sites consuming the same stream position still see unrelated values.
/// Streams are cheap to [`split`](ONDRng::split) into independent children,
/// one per worker, which keeps parallel sampling reproducible.
#[derive(Clone)]
pub struct ONDRng {
    state: [u8; 32],
    step: u64,
}

impl ONDRng {
    pub fn new(seed: &[u8]) -> Self {
        let mut state = [0u8; 32];
        shake(&[seed, b"OND_INIT"], &mut state);
        Self { state, step: 0 }
    }

    /// Child stream for a worker or sub-task; does not advance `self`.
    pub fn split(&self, label: &[u8]) -> Self {
        let mut state = [0u8; 32];
        shake(&[&self.state, &self.step.to_be_bytes(), label, b"OND_SPLIT"], &mut state);
        Self { state, step: 0 }
    }

    /// Uniform draw in `[0, 1]`.
    pub fn next_f64(&mut self, ctx: &[u8]) -> f64 {
        self.step += 1;

        let state = self.state;
        let step_bytes = self.step.to_be_bytes();
        let mut next_state = self.state;
        shake(&[&state, &step_bytes, b"QSIM"], &mut next_state);
        self.state = next_state;

        let mut out = [0u8; 8];
        shake(&[&self.state, ctx], &mut out);

        if self.state[0] < 16 {
            let state = self.state;
            let mut next_state = self.state;
            shake(&[&state, b"SKIP"], &mut next_state);
            self.state = next_state;
        }

        (u64::from_be_bytes(out) as f64) / (u64::MAX as f64)
    }

    pub fn uniform(&mut self, lo: f64, hi: f64, ctx: &[u8]) -> f64 {
        lo + (hi - lo) * self.next_f64(ctx)
    }

    /// Standard normal draw (Box-Muller).
    pub fn next_gaussian(&mut self, ctx: &[u8]) -> f64 {
        let u1 = (1.0 - self.next_f64(ctx)).max(f64::MIN_POSITIVE);
        let u2 = self.next_f64(ctx);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Uniform index in `0..n`. `n` must be non-zero.
    pub fn next_below(&mut self, n: usize, ctx: &[u8]) -> usize {
        assert!(n > 0, "next_below requires a non-empty range");
        let k = (self.next_f64(ctx) * n as f64) as usize;
        k.min(n - 1)
    }

    /// Draws an index from a cumulative distribution ending at (about) 1.
    ///
    /// Picks the first entry strictly greater than the uniform draw. A draw
    /// that lands past the last entry (rounding) falls back to the last index
    /// that carries probability mass.
    pub fn sample_cdf(&mut self, cdf: &[f64], ctx: &[u8]) -> usize {
        let r = self.next_f64(ctx);
        let k = cdf.partition_point(|&c| c <= r);
        if k < cdf.len() {
            return k;
        }
        last_mass(cdf)
    }
}

fn last_mass(cdf: &[f64]) -> usize {
    let mut prev = 0.0;
    let mut last = 0;
    for (i, &c) in cdf.iter().enumerate() {
        if c > prev {
            last = i;
        }
        prev = c;
    }
    last
}

fn shake(parts: &[&[u8]], out: &mut [u8]) {
    let mut h = Shake256::default();
    for p in parts {
        h.update(p);
    }
    let mut r = h.finalize_xof();
    r.read(out);
}

#[cfg(test)]
mod tests {
    use super::ONDRng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = ONDRng::new(b"seed");
        let mut b = ONDRng::new(b"seed");
        for _ in 0..32 {
            assert_eq!(a.next_f64(b"T").to_bits(), b.next_f64(b"T").to_bits());
        }
    }

    #[test]
    fn split_streams_differ() {
        let root = ONDRng::new(b"seed");
        let mut a = root.split(b"worker-0");
        let mut b = root.split(b"worker-1");
        let same = (0..16).filter(|_| a.next_f64(b"T") == b.next_f64(b"T")).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn cdf_draw_respects_mass() {
        let mut rng = ONDRng::new(b"cdf");
        let cdf = [0.0, 0.25, 0.25, 1.0];
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[rng.sample_cdf(&cdf, b"CDF")] += 1;
        }
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        let frac = counts[1] as f64 / 4000.0;
        assert!((frac - 0.25).abs() < 0.05, "frac = {}", frac);
    }

    #[test]
    fn gaussian_moments() {
        let mut rng = ONDRng::new(b"gauss");
        let n = 20000;
        let xs: Vec<f64> = (0..n).map(|_| rng.next_gaussian(b"G")).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean = {}", mean);
        assert!((var - 1.0).abs() < 0.05, "var = {}", var);
    }
}
