use crate::wfb::SampleOffset;

/// Target rate for everything the ICS2115 plays back.
pub const OUTPUT_RATE: u32 = 44100;

#[inline]
fn lerp(a: i16, b: i16, t: f32) -> i16 {
    (a as f32 + t * (b as f32 - a as f32)) as i16
}

/// Linear-interpolation resampler. Pure; any input accepted, identical rates
/// return a copy.
pub fn resample_linear(input: &[i16], input_rate: u32, output_rate: u32) -> Vec<i16> {
    if input_rate == output_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = input_rate as f64 / output_rate as f64;
    let output_samples = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_samples);

    for i in 0..output_samples {
        let position = i as f64 * ratio;
        let index = position as usize;
        let frac = (position - index as f64) as f32;

        if index + 1 < input.len() {
            output.push(lerp(input[index], input[index + 1], frac));
        } else {
            output.push(input[index.min(input.len() - 1)]);
        }
    }
    output
}

/// Downsample to 44.1 kHz when the source exceeds it. Returns None when no
/// resampling was needed.
pub fn resample_to_output_rate(input: &[i16], input_rate: u32) -> Option<Vec<i16>> {
    if input_rate <= OUTPUT_RATE {
        return None;
    }
    Some(resample_linear(input, input_rate, OUTPUT_RATE))
}

/// Pack a fractional PCM position into the 24.4 fixed-point offset format.
/// The fraction rounds to sixteenths; a fraction that rounds all the way up
/// carries into the integer part. The result is clamped to `max`.
pub fn set_sample_offset(position: f64, max: u32) -> SampleOffset {
    let position = position.clamp(0.0, max as f64);
    let mut integer = position as u32;
    let mut fraction = ((position - integer as f64) * 16.0).round() as u32;
    if fraction >= 16 {
        integer += 1;
        fraction = 0;
    }
    if integer > max {
        integer = max;
        fraction = 0;
    }
    SampleOffset {
        integer,
        fraction: fraction as u8,
    }
}

/// Scale loop points by the resampling ratio, preserving sub-sample precision.
pub fn scale_loop_points(
    input_rate: u32,
    output_rate: u32,
    loop_start: u32,
    loop_end: u32,
    output_samples: u32,
) -> (SampleOffset, SampleOffset) {
    let ratio = output_rate as f64 / input_rate as f64;
    (
        set_sample_offset(loop_start as f64 * ratio, output_samples),
        set_sample_offset(loop_end as f64 * ratio, output_samples),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rate_is_copied() {
        let input = [1i16, 2, 3, 4];
        assert_eq!(resample_linear(&input, 22050, 22050), input);
        assert!(resample_to_output_rate(&input, 22050).is_none());
    }

    #[test]
    fn downsample_halves_length() {
        let input: Vec<i16> = (0..1000).collect();
        let output = resample_to_output_rate(&input, 88200).unwrap();
        assert_eq!(output.len(), 500);
        // linear interpolation of a ramp stays a ramp
        assert_eq!(output[0], 0);
        assert_eq!(output[100], 200);
    }

    #[test]
    fn offset_packs_fraction() {
        let offset = set_sample_offset(1.5, 100);
        assert_eq!(offset.integer, 1);
        assert_eq!(offset.fraction, 8);
    }

    #[test]
    fn offset_carries_on_round_up() {
        let offset = set_sample_offset(0.9999, 100);
        assert_eq!(offset.integer, 1);
        assert_eq!(offset.fraction, 0);
    }

    #[test]
    fn offset_clamps_to_max() {
        let offset = set_sample_offset(150.25, 100);
        assert_eq!(offset.integer, 100);
        assert_eq!(offset.fraction, 0);
        // carry at the boundary must not exceed max either
        let offset = set_sample_offset(99.9999, 100);
        assert_eq!(offset.integer, 100);
        assert_eq!(offset.fraction, 0);
    }

    #[test]
    fn loop_points_scale_with_ratio() {
        let (start, end) = scale_loop_points(88200, 44100, 100, 900, 500);
        assert_eq!(start.integer, 50);
        assert_eq!(end.integer, 450);
    }
}
