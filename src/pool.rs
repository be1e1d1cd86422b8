use crate::resample;
use crate::sf2::{SoundBank, LEFT_SAMPLE, RIGHT_SAMPLE};
use crate::wfb::{
    BankName, SampleBody, SampleData, SampleEntry, SampleOffset, CH_LEFT, CH_MONO, CH_RIGHT,
    LINEAR_16BIT, MAX_SAMPLES, NUM_MIDIKEYS,
};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over the PCM byte stream, the dedup fast path.
pub fn fnv1a_64(pcm: &[i16]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for sample in pcm {
        for byte in sample.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Accumulates WaveFront sample entries. Identical PCM collapses to an ALIAS
/// referencing the earlier SAMPLE; the 512-entry cap rejects any further
/// additions and keeps a count for the summary.
#[derive(Debug, Default)]
pub struct SamplePool {
    pub entries: Vec<SampleEntry>,
    hashes: Vec<u64>,
    pub aliases: usize,
    pub resampled: usize,
    pub rejected: usize,
}

impl SamplePool {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn full(&mut self) -> bool {
        if self.entries.len() >= MAX_SAMPLES {
            self.rejected += 1;
            return true;
        }
        false
    }

    /// Materialize one SF2 sample, resampling anything above 44.1 kHz and
    /// deduplicating byte-identical PCM. Returns the pool index, or None when
    /// the source is unusable or the pool is at capacity.
    pub fn add_sf2_sample(&mut self, bank: &SoundBank, index: usize) -> Option<u16> {
        if index >= bank.sample_count() {
            log::debug!("Sample reference {index} is out of range");
            return None;
        }
        let header = &bank.samples[index];
        if header.is_rom() {
            log::debug!("Skipping ROM sample `{}`", header.name.display());
            return None;
        }
        let start = header.start as usize;
        let end = header.end as usize;
        if start >= end || end > bank.pcm.len() {
            log::debug!(
                "Sample `{}` points outside the PCM pool ({start}..{end})",
                header.name.display()
            );
            return None;
        }
        if self.full() {
            return None;
        }

        let mut rate = header.rate;
        let mut pcm = bank.pcm[start..end].to_vec();
        if let Some(resampled) = resample::resample_to_output_rate(&pcm, rate) {
            log::debug!(
                "Resampling `{}` from {rate} Hz to {} Hz",
                header.name.display(),
                resample::OUTPUT_RATE
            );
            pcm = resampled;
            rate = resample::OUTPUT_RATE;
            self.resampled += 1;
        }
        let count = pcm.len() as u32;

        let mut data = SampleData {
            start: SampleOffset::whole(0),
            end: SampleOffset::whole(count),
            freq_bias: header.pitch_correction as i16,
            resolution: LINEAR_16BIT,
            ..Default::default()
        };
        if header.loop_start < header.loop_end
            && header.loop_start >= header.start
            && header.loop_end <= header.end
        {
            let (loop_start, loop_end) = resample::scale_loop_points(
                header.rate,
                rate,
                header.loop_start - header.start,
                header.loop_end - header.start,
                count,
            );
            data.loop_start = loop_start;
            data.loop_end = loop_end;
            data.looped = true;
        }

        let channel = match header.sample_type {
            LEFT_SAMPLE => CH_LEFT,
            RIGHT_SAMPLE => CH_RIGHT,
            _ => CH_MONO,
        };

        let hash = fnv1a_64(&pcm);
        let duplicate = self.entries.iter().enumerate().position(|(i, entry)| {
            let SampleBody::Sample {
                data: existing,
                pcm: existing_pcm,
            } = &entry.body
            else {
                return false;
            };
            self.hashes[i] == hash
                && entry.rate == rate
                && entry.channel == channel
                && *existing == data
                && *existing_pcm == pcm
        });
        if let Some(original) = duplicate {
            log::debug!(
                "Deduplicated `{}` against sample {original}",
                header.name.display()
            );
            let number = self.entries.len() as u16;
            self.entries.push(SampleEntry {
                number,
                name: BankName::new(&header.name.display()),
                rate,
                channel,
                body: SampleBody::Alias {
                    original: original as u16,
                    data,
                },
            });
            self.hashes.push(0);
            self.aliases += 1;
            return Some(number);
        }

        let number = self.entries.len() as u16;
        self.entries.push(SampleEntry {
            number,
            name: BankName::new(&header.name.display()),
            rate,
            channel,
            body: SampleBody::Sample { data, pcm },
        });
        self.hashes.push(hash);
        Some(number)
    }

    /// Emit a key-indexed lookup entry; the keys array holds pool sample
    /// numbers with -1 on unassigned keys.
    pub fn add_multisample(
        &mut self,
        name: &str,
        rate: u32,
        keys: [i16; NUM_MIDIKEYS],
    ) -> Option<u16> {
        if self.full() {
            return None;
        }
        let number = self.entries.len() as u16;
        self.entries.push(SampleEntry {
            number,
            name: BankName::new(name),
            rate,
            channel: CH_MONO,
            body: SampleBody::Multisample { keys },
        });
        self.hashes.push(0);
        Some(number)
    }
}

/// The other half of a stereo pair: opposite LEFT/RIGHT type, mutual link,
/// identical length and rate.
pub fn stereo_partner(bank: &SoundBank, index: usize) -> Option<usize> {
    let header = &bank.samples[index];
    let partner_type = match header.sample_type {
        LEFT_SAMPLE => RIGHT_SAMPLE,
        RIGHT_SAMPLE => LEFT_SAMPLE,
        _ => return None,
    };
    let link = header.link as usize;
    if link >= bank.sample_count() {
        return None;
    }
    let partner = &bank.samples[link];
    (partner.sample_type == partner_type
        && partner.rate == header.rate
        && partner.len() == header.len())
    .then_some(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sf2::{SampleHeader, Sf2Name, MONO_SAMPLE};

    fn mono_header(name: &str, start: u32, end: u32, rate: u32) -> SampleHeader {
        SampleHeader {
            name: Sf2Name::from_raw(name.as_bytes()),
            start,
            end,
            loop_start: 0,
            loop_end: 0,
            rate,
            original_pitch: 60,
            pitch_correction: 0,
            link: 0,
            sample_type: MONO_SAMPLE,
        }
    }

    fn bank_with_samples(headers: Vec<SampleHeader>, pcm: Vec<i16>) -> SoundBank {
        let mut samples = headers;
        samples.push(mono_header("EOS", 0, 0, 0));
        SoundBank {
            samples,
            pcm,
            ..Default::default()
        }
    }

    #[test]
    fn fnv_hash_is_stable() {
        // FNV-1a of the empty input is the offset basis
        assert_eq!(fnv1a_64(&[]), 0xcbf29ce484222325);
        assert_ne!(fnv1a_64(&[1, 2, 3]), fnv1a_64(&[1, 2, 4]));
    }

    #[test]
    fn identical_pcm_becomes_alias() {
        let bank = bank_with_samples(
            vec![
                mono_header("a", 0, 100, 22050),
                mono_header("b", 0, 100, 22050),
                mono_header("c", 100, 200, 22050),
            ],
            (0..200).map(|i| (i % 50) as i16).collect(),
        );
        let mut pool = SamplePool::new();
        let first = pool.add_sf2_sample(&bank, 0).unwrap();
        let second = pool.add_sf2_sample(&bank, 1).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(pool.aliases, 1);
        match &pool.entries[1].body {
            SampleBody::Alias { original, .. } => assert_eq!(*original, 0),
            other => panic!("expected alias, got {other:?}"),
        }
        // different content stays a real sample
        let third = pool.add_sf2_sample(&bank, 2).unwrap();
        assert!(matches!(
            pool.entries[third as usize].body,
            SampleBody::Sample { .. }
        ));
    }

    #[test]
    fn oversampled_input_is_resampled() {
        let bank = bank_with_samples(
            vec![mono_header("hi", 0, 882, 88200)],
            vec![0i16; 882],
        );
        let mut pool = SamplePool::new();
        let index = pool.add_sf2_sample(&bank, 0).unwrap();
        assert_eq!(pool.resampled, 1);
        assert_eq!(pool.entries[index as usize].rate, 44100);
        assert_eq!(pool.entries[index as usize].pcm_samples(), 441);
    }

    #[test]
    fn loop_points_survive_extraction() {
        let mut header = mono_header("looped", 10, 110, 22050);
        header.loop_start = 30;
        header.loop_end = 90;
        let bank = bank_with_samples(vec![header], (0..120).collect());
        let mut pool = SamplePool::new();
        let index = pool.add_sf2_sample(&bank, 0).unwrap();
        match &pool.entries[index as usize].body {
            SampleBody::Sample { data, .. } => {
                assert!(data.looped);
                assert_eq!(data.loop_start.integer, 20);
                assert_eq!(data.loop_end.integer, 80);
            }
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn pool_rejects_past_cap() {
        let bank = bank_with_samples(vec![mono_header("x", 0, 10, 22050)], (0..10).collect());
        let mut pool = SamplePool::new();
        // fill with multisample stubs, cheaper than 512 distinct PCM buffers
        for i in 0..MAX_SAMPLES {
            assert!(pool
                .add_multisample(&format!("ms{i}"), 44100, [-1; NUM_MIDIKEYS])
                .is_some());
        }
        assert!(pool.add_sf2_sample(&bank, 0).is_none());
        assert_eq!(pool.rejected, 1);
    }

    #[test]
    fn stereo_pair_detection() {
        let mut left = mono_header("left", 0, 100, 22050);
        left.sample_type = LEFT_SAMPLE;
        left.link = 1;
        let mut right = mono_header("right", 100, 200, 22050);
        right.sample_type = RIGHT_SAMPLE;
        right.link = 0;
        let bank = bank_with_samples(vec![left, right], vec![0i16; 200]);
        assert_eq!(stereo_partner(&bank, 0), Some(1));
        assert_eq!(stereo_partner(&bank, 1), Some(0));

        // a broken link is not a pair
        let mut left = mono_header("left", 0, 100, 22050);
        left.sample_type = LEFT_SAMPLE;
        left.link = 40;
        let bank = bank_with_samples(vec![left], vec![0i16; 100]);
        assert_eq!(stereo_partner(&bank, 0), None);
    }
}
