//! Minimal SoundFont builder for synthesizing test inputs in memory.

pub const GEN_PAN: u16 = 17;
pub const GEN_INSTRUMENT: u16 = 41;
pub const GEN_KEY_RANGE: u16 = 43;
pub const GEN_VEL_RANGE: u16 = 44;
pub const GEN_COARSE_TUNE: u16 = 51;
pub const GEN_FINE_TUNE: u16 = 52;
pub const GEN_SAMPLE_ID: u16 = 53;
pub const GEN_EXCLUSIVE_CLASS: u16 = 57;

pub const MONO_SAMPLE: u16 = 1;
pub const RIGHT_SAMPLE: u16 = 2;
pub const LEFT_SAMPLE: u16 = 4;

pub struct SampleDef {
    pub name: String,
    pub pcm: Vec<i16>,
    pub rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub pitch_correction: i8,
    pub sample_type: u16,
    pub link: u16,
}

#[derive(Clone, Default)]
pub struct Zone {
    pub gens: Vec<(u16, u16)>,
}

impl Zone {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn gen(mut self, oper: u16, amount: i16) -> Self {
        self.gens.push((oper, amount as u16));
        self
    }
    pub fn range(mut self, oper: u16, lo: u8, hi: u8) -> Self {
        self.gens.push((oper, u16::from_le_bytes([lo, hi])));
        self
    }
    pub fn sample(self, index: u16) -> Self {
        let mut zone = self;
        zone.gens.push((GEN_SAMPLE_ID, index));
        zone
    }
    pub fn instrument(self, index: u16) -> Self {
        let mut zone = self;
        zone.gens.push((GEN_INSTRUMENT, index));
        zone
    }
}

struct InstrumentDef {
    name: String,
    zones: Vec<Zone>,
}

struct PresetDef {
    name: String,
    bank: u16,
    preset: u16,
    zones: Vec<Zone>,
}

#[derive(Default)]
pub struct Sf2Builder {
    samples: Vec<SampleDef>,
    instruments: Vec<InstrumentDef>,
    presets: Vec<PresetDef>,
}

impl Sf2Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, name: &str, pcm: Vec<i16>, rate: u32) -> u16 {
        self.add_sample_full(SampleDef {
            name: name.into(),
            pcm,
            rate,
            loop_start: 0,
            loop_end: 0,
            pitch_correction: 0,
            sample_type: MONO_SAMPLE,
            link: 0,
        })
    }

    pub fn add_sample_full(&mut self, sample: SampleDef) -> u16 {
        self.samples.push(sample);
        (self.samples.len() - 1) as u16
    }

    pub fn add_instrument(&mut self, name: &str, zones: Vec<Zone>) -> u16 {
        self.instruments.push(InstrumentDef {
            name: name.into(),
            zones,
        });
        (self.instruments.len() - 1) as u16
    }

    pub fn add_preset(&mut self, name: &str, bank: u16, preset: u16, zones: Vec<Zone>) {
        self.presets.push(PresetDef {
            name: name.into(),
            bank,
            preset,
            zones,
        });
    }

    /// Single-sample single-instrument preset, the common case.
    pub fn add_simple_preset(&mut self, name: &str, bank: u16, preset: u16, sample: u16) {
        let instrument = self.add_instrument(name, vec![Zone::new().sample(sample)]);
        self.add_preset(name, bank, preset, vec![Zone::new().instrument(instrument)]);
    }

    pub fn build(&self) -> Vec<u8> {
        // PCM pool with the 46 zero guard points SoundFont wants after each sample
        let mut pcm = Vec::new();
        let mut sample_offsets = Vec::new();
        for sample in &self.samples {
            let start = pcm.len() as u32;
            pcm.extend_from_slice(&sample.pcm);
            pcm.extend_from_slice(&[0i16; 46]);
            sample_offsets.push((start, start + sample.pcm.len() as u32));
        }
        let mut smpl = Vec::new();
        for s in &pcm {
            smpl.extend_from_slice(&s.to_le_bytes());
        }

        let mut shdr = Vec::new();
        for (sample, (start, end)) in self.samples.iter().zip(&sample_offsets) {
            shdr.extend_from_slice(&name20(&sample.name));
            shdr.extend_from_slice(&start.to_le_bytes());
            shdr.extend_from_slice(&end.to_le_bytes());
            shdr.extend_from_slice(&(start + sample.loop_start).to_le_bytes());
            shdr.extend_from_slice(&(start + sample.loop_end).to_le_bytes());
            shdr.extend_from_slice(&sample.rate.to_le_bytes());
            shdr.push(60);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend_from_slice(&sample.link.to_le_bytes());
            shdr.extend_from_slice(&sample.sample_type.to_le_bytes());
        }
        shdr.extend_from_slice(&name20("EOS"));
        shdr.extend_from_slice(&[0u8; 26]);

        let mut phdr = Vec::new();
        let mut pbag = Vec::new();
        let mut pgen = Vec::new();
        let mut bag_index = 0u16;
        let mut gen_index = 0u16;
        for preset in &self.presets {
            phdr.extend_from_slice(&name20(&preset.name));
            phdr.extend_from_slice(&preset.preset.to_le_bytes());
            phdr.extend_from_slice(&preset.bank.to_le_bytes());
            phdr.extend_from_slice(&bag_index.to_le_bytes());
            phdr.extend_from_slice(&[0u8; 12]);
            for zone in &preset.zones {
                pbag.extend_from_slice(&gen_index.to_le_bytes());
                pbag.extend_from_slice(&0u16.to_le_bytes());
                for (oper, amount) in &zone.gens {
                    pgen.extend_from_slice(&oper.to_le_bytes());
                    pgen.extend_from_slice(&amount.to_le_bytes());
                    gen_index += 1;
                }
                bag_index += 1;
            }
        }
        phdr.extend_from_slice(&name20("EOP"));
        phdr.extend_from_slice(&0u16.to_le_bytes());
        phdr.extend_from_slice(&0u16.to_le_bytes());
        phdr.extend_from_slice(&bag_index.to_le_bytes());
        phdr.extend_from_slice(&[0u8; 12]);
        pbag.extend_from_slice(&gen_index.to_le_bytes());
        pbag.extend_from_slice(&0u16.to_le_bytes());
        pgen.extend_from_slice(&[0u8; 4]);

        let mut inst = Vec::new();
        let mut ibag = Vec::new();
        let mut igen = Vec::new();
        let mut bag_index = 0u16;
        let mut gen_index = 0u16;
        for instrument in &self.instruments {
            inst.extend_from_slice(&name20(&instrument.name));
            inst.extend_from_slice(&bag_index.to_le_bytes());
            for zone in &instrument.zones {
                ibag.extend_from_slice(&gen_index.to_le_bytes());
                ibag.extend_from_slice(&0u16.to_le_bytes());
                for (oper, amount) in &zone.gens {
                    igen.extend_from_slice(&oper.to_le_bytes());
                    igen.extend_from_slice(&amount.to_le_bytes());
                    gen_index += 1;
                }
                bag_index += 1;
            }
        }
        inst.extend_from_slice(&name20("EOI"));
        inst.extend_from_slice(&bag_index.to_le_bytes());
        ibag.extend_from_slice(&gen_index.to_le_bytes());
        ibag.extend_from_slice(&0u16.to_le_bytes());
        igen.extend_from_slice(&[0u8; 4]);

        let mut pdta = Vec::new();
        pdta.extend_from_slice(&chunk(b"phdr", &phdr));
        pdta.extend_from_slice(&chunk(b"pbag", &pbag));
        pdta.extend_from_slice(&chunk(b"pgen", &pgen));
        pdta.extend_from_slice(&chunk(b"inst", &inst));
        pdta.extend_from_slice(&chunk(b"ibag", &ibag));
        pdta.extend_from_slice(&chunk(b"igen", &igen));
        pdta.extend_from_slice(&chunk(b"shdr", &shdr));

        let sdta = chunk(b"smpl", &smpl);

        let mut body = Vec::from(*b"sfbk");
        body.extend_from_slice(&list(b"sdta", &sdta));
        body.extend_from_slice(&list(b"pdta", &pdta));

        let mut out = Vec::from(*b"RIFF");
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

fn chunk(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(name);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        out.push(0);
    }
    out
}

fn list(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut inner = Vec::from(*name);
    inner.extend_from_slice(payload);
    chunk(b"LIST", &inner)
}

fn name20(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    let len = name.len().min(19);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}
