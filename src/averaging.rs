//! Channel averaging of amplitude/phase blocks.
//!
//! Two consumers: the averaged-data overlay on SPD panels, which reduces a
//! spectrum to groups of `delay_averaging` channels, and the VIS history,
//! which reduces each baseline to one amplitude, phase and delay taken over
//! the tvchannel range.

use crate::spectrum::{
    AmpPhaseBlock, AveragingDomain, AveragingKind, AveragingMethod, Baseline, OptionsIndex, Pol,
    WindowOptions, C32,
};
use crate::utils::{median, unwrap_phase};

fn combine(values: &mut [f32], kind: AveragingKind) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    match kind {
        AveragingKind::Mean => Some(values.iter().sum::<f32>() / values.len() as f32),
        AveragingKind::Median => median(values),
    }
}

/// Reduces a set of complex samples to one, following the averaging method.
fn average_samples(samples: &[C32], method: AveragingMethod) -> Option<C32> {
    let finite: Vec<C32> = samples
        .iter()
        .copied()
        .filter(|v| v.re.is_finite() && v.im.is_finite())
        .collect();
    if finite.is_empty() {
        return None;
    }
    match method.domain {
        AveragingDomain::Vector => {
            let mut re: Vec<f32> = finite.iter().map(|v| v.re).collect();
            let mut im: Vec<f32> = finite.iter().map(|v| v.im).collect();
            Some(C32::new(
                combine(&mut re, method.kind)?,
                combine(&mut im, method.kind)?,
            ))
        }
        AveragingDomain::Scalar => {
            let mut amp: Vec<f32> = finite.iter().map(|v| v.norm()).collect();
            let mut pha: Vec<f32> = finite.iter().map(|v| v.arg()).collect();
            Some(C32::from_polar(
                combine(&mut amp, method.kind)?,
                combine(&mut pha, method.kind)?,
            ))
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Averages every `delay_averaging` adjacent channels of the block.
pub fn average_channels(block: &AmpPhaseBlock, options: &WindowOptions) -> AmpPhaseBlock {
    let group = options.delay_averaging.max(1);
    let nchan = block.nchannels();
    let starts: Vec<usize> = (0..nchan).step_by(group).collect();

    let channel: Vec<f32> = starts
        .iter()
        .map(|&s| mean(&block.channel[s..(s + group).min(nchan)]))
        .collect();
    let frequency: Vec<f32> = starts
        .iter()
        .map(|&s| {
            let end = (s + group).min(block.frequency.len());
            mean(&block.frequency[s.min(end)..end])
        })
        .collect();

    let raw = block
        .raw
        .iter()
        .map(|bins| {
            bins.iter()
                .map(|samples| {
                    starts
                        .iter()
                        .map(|&s| {
                            let end = (s + group).min(samples.len());
                            average_samples(&samples[s.min(end)..end], options.averaging_method)
                                .unwrap_or(C32::new(f32::NAN, f32::NAN))
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    AmpPhaseBlock::from_raw(
        block.window,
        &block.window_name,
        block.pol,
        block.options,
        channel,
        frequency,
        block.baselines.clone(),
        raw,
    )
}

/// One number per baseline and bin for a window and pol of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VisQuantity {
    pub window: usize,
    pub window_name: String,
    pub pol: Pol,
    pub options: OptionsIndex,
    pub baselines: Vec<Baseline>,
    /// `[baseline][bin]`.
    pub amplitude: Vec<Vec<f32>>,
    /// Degrees.
    pub phase: Vec<Vec<f32>>,
    /// Nanoseconds.
    pub delay: Vec<Vec<f32>>,
    pub flagged_bad: Vec<bool>,
}

impl VisQuantity {
    pub fn baseline_index(&self, baseline: Baseline) -> Option<usize> {
        self.baselines.iter().position(|b| *b == baseline)
    }
}

/// Delay across the tvchannel range: complex averages of `group` channels,
/// then the combined phase slope between neighbouring groups.
fn band_delay(samples: &[C32], frequency: &[f32], group: usize, method: AveragingMethod) -> f32 {
    let n = samples.len().min(frequency.len());
    let mut points: Vec<(f32, f32)> = Vec::new();
    for s in (0..n).step_by(group.max(1)) {
        let end = (s + group.max(1)).min(n);
        if let Some(v) = average_samples(&samples[s..end], method) {
            points.push((mean(&frequency[s..end]), v.arg().to_degrees()));
        }
    }
    if points.len() < 2 {
        return 0.0;
    }
    let mut phases: Vec<f32> = points.iter().map(|p| p.1).collect();
    unwrap_phase(&mut phases);
    let mut slopes: Vec<f32> = points
        .windows(2)
        .zip(phases.windows(2))
        .filter_map(|(f, p)| {
            let df = f[1].0 - f[0].0;
            (df != 0.0).then(|| (p[1] - p[0]) / (360.0 * df) * 1000.0)
        })
        .collect();
    combine(&mut slopes, method.kind).unwrap_or(0.0)
}

/// Reduces a block to its VIS quantities over the window's tvchannel range.
pub fn vis_quantity(block: &AmpPhaseBlock, options: &WindowOptions) -> VisQuantity {
    let nchan = block.nchannels();
    let (lo, hi) = match options.tvchannel_range(nchan) {
        Some((lo, hi)) if hi > lo => (lo, hi),
        _ => (0, nchan.saturating_sub(1)),
    };
    let method = options.averaging_method;

    let mut amplitude = Vec::with_capacity(block.baselines.len());
    let mut phase = Vec::with_capacity(block.baselines.len());
    let mut delay = Vec::with_capacity(block.baselines.len());
    let mut flagged_bad = Vec::with_capacity(block.baselines.len());

    for bins in &block.raw {
        let mut amp_b = Vec::with_capacity(bins.len());
        let mut pha_b = Vec::with_capacity(bins.len());
        let mut del_b = Vec::with_capacity(bins.len());
        let mut any_good = false;
        for samples in bins {
            let end = (hi + 1).min(samples.len());
            let range = &samples[lo.min(end)..end];
            match average_samples(range, method) {
                Some(v) => {
                    any_good = true;
                    amp_b.push(v.norm());
                    pha_b.push(v.arg().to_degrees());
                }
                None => {
                    amp_b.push(f32::NAN);
                    pha_b.push(f32::NAN);
                }
            }
            let freq_end = end.min(block.frequency.len());
            del_b.push(band_delay(
                range,
                &block.frequency[lo.min(freq_end)..freq_end],
                options.delay_averaging,
                method,
            ));
        }
        amplitude.push(amp_b);
        phase.push(pha_b);
        delay.push(del_b);
        flagged_bad.push(!any_good);
    }

    VisQuantity {
        window: block.window,
        window_name: block.window_name.clone(),
        pol: block.pol,
        options: block.options,
        baselines: block.baselines.clone(),
        amplitude,
        phase,
        delay,
        flagged_bad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_from(samples: Vec<C32>) -> AmpPhaseBlock {
        let n = samples.len();
        AmpPhaseBlock::from_raw(
            1,
            "f2",
            Pol::XX,
            0,
            (0..n).map(|c| c as f32).collect(),
            (0..n).map(|c| 5000.0 + c as f32).collect(),
            vec![Baseline::new(1, 2)],
            vec![vec![samples]],
        )
    }

    #[test]
    fn groups_of_channels_are_averaged() {
        let block = block_from((1..=6).map(|a| C32::new(a as f32, 0.0)).collect());
        let options = WindowOptions {
            delay_averaging: 2,
            ..WindowOptions::default()
        };
        let avg = average_channels(&block, &options);
        assert_eq!(avg.nchannels(), 3);
        assert_eq!(avg.channel, vec![0.5, 2.5, 4.5]);
        assert_eq!(avg.amplitude[0][0], vec![1.5, 3.5, 5.5]);
        assert_eq!(avg.window_name, "f2");
    }

    #[test]
    fn short_frequency_axis_does_not_panic() {
        let mut block = block_from((1..=8).map(|a| C32::new(a as f32, 0.0)).collect());
        block.frequency.truncate(2);
        let options = WindowOptions {
            delay_averaging: 2,
            ..WindowOptions::default()
        };
        let avg = average_channels(&block, &options);
        assert_eq!(avg.nchannels(), 4);
        assert_eq!(avg.frequency.len(), 4);
        assert_eq!(avg.frequency[0], 5000.5);
        assert_eq!(avg.frequency[3], 0.0);
    }

    #[test]
    fn scalar_median_ignores_outliers() {
        let samples = vec![
            C32::new(1.0, 0.0),
            C32::new(1.0, 0.0),
            C32::new(100.0, 0.0),
        ];
        let method = AveragingMethod {
            kind: AveragingKind::Median,
            domain: AveragingDomain::Scalar,
        };
        let v = average_samples(&samples, method).unwrap();
        assert!((v.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vector_average_cancels_opposite_phases() {
        let samples = vec![C32::new(1.0, 0.0), C32::new(-1.0, 0.0)];
        let v = average_samples(&samples, AveragingMethod::default()).unwrap();
        assert!(v.norm() < 1e-6);
    }

    #[test]
    fn vis_quantity_uses_tvchannel_range_and_flags_empty_baselines() {
        let mut samples: Vec<C32> = (0..10).map(|_| C32::new(2.0, 0.0)).collect();
        samples[0] = C32::new(50.0, 0.0);
        let block = block_from(samples);
        let options = WindowOptions {
            min_tvchannel: 2,
            max_tvchannel: 8,
            ..WindowOptions::default()
        };
        let vis = vis_quantity(&block, &options);
        assert!((vis.amplitude[0][0] - 2.0).abs() < 1e-6);
        assert!(!vis.flagged_bad[0]);

        let nan_block = block_from(vec![C32::new(f32::NAN, 0.0); 4]);
        let vis = vis_quantity(&nan_block, &WindowOptions::default());
        assert!(vis.flagged_bad[0]);
    }

    #[test]
    fn band_delay_recovers_linear_phase_slope() {
        // 18 degrees per MHz -> 50 ns
        let samples: Vec<C32> = (0..16)
            .map(|c| C32::from_polar(1.0, (c as f32 * 18.0).to_radians()))
            .collect();
        let freq: Vec<f32> = (0..16).map(|c| 1000.0 + c as f32).collect();
        let d = band_delay(&samples, &freq, 2, AveragingMethod::default());
        assert!((d - 50.0).abs() < 0.5, "delay {}", d);
    }
}
