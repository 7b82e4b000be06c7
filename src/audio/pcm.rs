// Post-decode PCM transforms: stereo-to-mono downmix and volume scaling

/// Full scale volume, no attenuation applied
pub const FULL_VOLUME: u8 = 100;

#[inline]
fn scale(sample: i32, volume: u8) -> i16 {
    if volume >= FULL_VOLUME {
        sample as i16
    } else {
        (sample * volume as i32 / FULL_VOLUME as i32) as i16
    }
}

/// Apply downmix and volume to an interleaved frame in place.
///
/// When `mono` is set and the frame is stereo, each L/R pair is averaged and
/// scaled in the same pass, and the mono samples are packed at the front of
/// `pcm`. Returns the channel count of the processed data.
pub fn process(pcm: &mut [i16], samples_per_channel: usize, channels: usize, mono: bool, volume: u8) -> usize {
    if mono && channels == 2 {
        for i in 0..samples_per_channel {
            let mean = (pcm[2 * i] as i32 + pcm[2 * i + 1] as i32) / 2;
            pcm[i] = scale(mean, volume);
        }
        return 1;
    }

    if volume < FULL_VOLUME {
        for sample in pcm[..samples_per_channel * channels].iter_mut() {
            *sample = scale(*sample as i32, volume);
        }
    }
    channels
}
