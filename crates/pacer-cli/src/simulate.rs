use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Shape of a synthetic pacemaker action potential train. Times in ms, voltages in mV.
#[derive(Debug, Clone)]
pub struct PacemakerParams {
    pub sample_rate_khz: f64,
    pub cycles: usize,
    pub diastole_ms: f64,
    pub upstroke_ms: f64,
    pub repolarization_ms: f64,
    pub max_diastolic_vm: f64,
    pub takeoff_vm: f64,
    pub peak_vm: f64,
    pub noise_sd: f64,
    pub seed: u64,
}

#[cfg(test)]
impl Default for PacemakerParams {
    fn default() -> Self {
        Self {
            sample_rate_khz: 10.0,
            cycles: 10,
            diastole_ms: 50.0,
            upstroke_ms: 2.0,
            repolarization_ms: 16.0,
            max_diastolic_vm: -60.0,
            takeoff_vm: -40.0,
            peak_vm: 20.0,
            noise_sd: 0.0,
            seed: 0,
        }
    }
}

fn phase_points(ms: f64, rate: f64, name: &str) -> Result<usize> {
    let points = (ms * rate).round();
    if !(points >= 1.0 && points.is_finite()) {
        bail!("{name} of {ms} ms is shorter than one sample at {rate} points/ms");
    }
    Ok(points as usize)
}

/// Linear diastolic ramp, linear upstroke, linear repolarization, repeated `cycles` times.
pub fn pacemaker_train(params: &PacemakerParams) -> Result<Vec<f64>> {
    let rate = params.sample_rate_khz;
    if !(rate > 0.0 && rate.is_finite()) {
        bail!("sample rate must be positive, got {rate}");
    }
    let diastole = phase_points(params.diastole_ms, rate, "diastole")?;
    let upstroke = phase_points(params.upstroke_ms, rate, "upstroke")?;
    let repol = phase_points(params.repolarization_ms, rate, "repolarization")?;
    let (mdp, takeoff, peak) = (params.max_diastolic_vm, params.takeoff_vm, params.peak_vm);

    let cycle: Vec<f64> = (0..diastole)
        .map(|j| mdp + (takeoff - mdp) * j as f64 / diastole as f64)
        .chain((0..upstroke).map(|j| takeoff + (peak - takeoff) * j as f64 / upstroke as f64))
        .chain((0..repol).map(|j| peak + (mdp - peak) * j as f64 / repol as f64))
        .collect();
    let mut out: Vec<f64> = cycle
        .iter()
        .copied()
        .cycle()
        .take(cycle.len() * params.cycles)
        .collect();

    if params.noise_sd > 0.0 {
        let normal = Normal::new(0.0, params.noise_sd)?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        for v in out.iter_mut() {
            *v += normal.sample(&mut rng);
        }
    }
    Ok(out)
}
