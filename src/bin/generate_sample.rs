use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const N_OBJECTS: usize = 400;
const METHODS: [&str; 3] = ["linemodel", "chisquare2solve", "decisionaltree7"];
const TEMPLATES: [&str; 4] = ["Scd.txt", "Sbc.txt", "Im.txt", "ssp_5Gyr.txt"];

/// Writes a PFS-layout reference catalog, a pipeline output with decorated
/// ids, and an SNR table into the directory given as first argument
/// (default `sample/`).
fn main() -> Result<()> {
    env_logger::init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample"));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut reference = String::from("#ID\tZ\tMAG\tTYPE\tEBMV\tSFR\tSIGMA\n");
    let mut computed = String::from("#Spectrum\tRedshift\tMerit\tMethod\tTemplate\n");
    let mut snr = String::from("#ID\tSNR\n");
    let (mut n_missing, mut n_failed) = (0, 0);

    for k in 0..N_OBJECTS {
        let id = format!("{:06}", 100_000 + k * 7);
        let z = rng.uniform(0.05, 2.5);
        let mag = rng.uniform(19.0, 24.5);
        let ebmv = rng.uniform(0.0, 0.6);
        let sfr = 10f64.powf(rng.uniform(-1.0, 2.0));
        let sigma = rng.uniform(40.0, 250.0);
        writeln!(
            reference,
            "{id}\t{z:.5}\t{mag:.3}\tgal\t{ebmv:.3}\t{sfr:.3}\t{sigma:.1}"
        )?;

        let noise = rng.uniform(0.5, 30.0);
        writeln!(snr, "SPC_fits-W-TF_{id}.fits\t{noise:.3}")?;

        // A few objects never reach the pipeline output.
        if rng.next_f64() < 0.02 {
            n_missing += 1;
            continue;
        }

        // Faint, noisy spectra fail more often.
        let p_fail = 0.02 + 0.25 * ((mag - 19.0) / 5.5) / (1.0 + noise / 5.0);
        let zcalc = if rng.next_f64() < p_fail {
            n_failed += 1;
            rng.uniform(0.0, 3.0)
        } else {
            (z + rng.gauss(0.0, 2e-4) * (1.0 + z)).max(0.0)
        };
        let merit = rng.uniform(0.0, 1000.0);
        let method = METHODS[(rng.next_u64() % METHODS.len() as u64) as usize];
        let template = TEMPLATES[(rng.next_u64() % TEMPLATES.len() as u64) as usize];
        writeln!(
            computed,
            "SPC_fits-W-F_{id}\t{zcalc:.5}\t{merit:.2}\t{method}\t{template}"
        )?;
    }

    for (name, body) in [
        ("reference.txt", &reference),
        ("redshift.csv", &computed),
        ("snr2_TF_ErrF.csv", &snr),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    }

    info!("{n_missing} objects left out of the computed file, {n_failed} catastrophic");
    println!(
        "Wrote {N_OBJECTS} reference objects to {} (try: redshift-diff -r {0}/reference.txt -c {0}/redshift.csv -t pfs -l full)",
        dir.display()
    );
    Ok(())
}
