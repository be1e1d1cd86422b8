use crate::invalid_data;
use arrayvec::ArrayVec;
use binrw::{BinRead, BinWrite};
use std::{
    borrow::Cow,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

pub const NUM_LAYERS: usize = 4;
pub const NUM_MIDIKEYS: usize = 128;
pub const NAME_LENGTH: usize = 32;
pub const MAX_COMMENT: usize = 64;
pub const MAX_PATH_LENGTH: usize = 260;

pub const WF_VERSION: u16 = 120;

pub const MAX_PROGRAMS: usize = 128;
pub const MAX_PATCHES: usize = 256;
pub const MAX_SAMPLES: usize = 512;

/// Encoded record sizes. The header is padded out to a fixed 256 bytes; the
/// rest follow from the packed field layouts below.
pub const HEADER_SIZE: u32 = 256;
pub const ENVELOPE_SIZE: u32 = 14;
pub const LFO_SIZE: u32 = 9;
pub const PATCH_SIZE: u32 = 66;
pub const PATCH_RECORD_SIZE: u32 = PATCH_SIZE + 2 + NAME_LENGTH as u32;
pub const LAYER_SIZE: u32 = 4;
pub const PROGRAM_RECORD_SIZE: u32 = LAYER_SIZE * NUM_LAYERS as u32 + 2 + NAME_LENGTH as u32;
pub const DRUMKIT_SIZE: u32 = 4 * NUM_MIDIKEYS as u32;
pub const SAMPLE_INFO_SIZE: u32 = 118;
pub const SAMPLE_BODY_SIZE: u32 = 19;
pub const MULTISAMPLE_BODY_SIZE: u32 = 2 + 2 * NUM_MIDIKEYS as u32;
pub const ALIAS_BODY_SIZE: u32 = 21;

pub const CH_MONO: u32 = 0;
pub const CH_LEFT: u32 = 1;
pub const CH_RIGHT: u32 = 2;

pub const ST_SAMPLE: i16 = 0;
pub const ST_MULTISAMPLE: i16 = 1;
pub const ST_ALIAS: i16 = 2;
pub const ST_EMPTY: i16 = 127;

pub const LINEAR_16BIT: u8 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Device {
    Maui,
    Rio,
    Tropez,
    TropezPlus,
}

static DEVICES: phf::Map<&'static str, Device> = phf::phf_map! {
    "maui" => Device::Maui,
    "rio" => Device::Rio,
    "tropez" => Device::Tropez,
    "tropezplus" => Device::TropezPlus,
    "tropez+" => Device::TropezPlus,
    "tbs-2001" => Device::TropezPlus,
};

impl Device {
    pub fn parse(name: &str) -> Option<Self> {
        DEVICES.get(name.to_ascii_lowercase().as_str()).copied()
    }
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Maui => "Maui",
            Self::Rio => "Rio",
            Self::Tropez => "Tropez",
            Self::TropezPlus => "TropezPlus",
        }
    }
    /// Onboard sample RAM ceiling in bytes.
    #[inline]
    pub fn memory_limit(self) -> u32 {
        match self {
            Self::Rio => 4 * 1024 * 1024,
            Self::Maui | Self::Tropez => 8650752,
            Self::TropezPlus => 12845056,
        }
    }
}

/// Fixed-capacity name as stored in program/patch/sample records.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BankName(pub ArrayVec<u8, NAME_LENGTH>);

impl BankName {
    pub fn new(name: &str) -> Self {
        let mut v = ArrayVec::new();
        for &b in name.as_bytes().iter().take(NAME_LENGTH - 1) {
            v.push(b);
        }
        Self(v)
    }
    pub fn from_raw(raw: &[u8]) -> Self {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let mut v = ArrayVec::new();
        for &b in raw[..end.min(NAME_LENGTH)].iter() {
            v.push(b);
        }
        Self(v)
    }
    pub fn to_raw(&self) -> [u8; NAME_LENGTH] {
        let mut out = [0u8; NAME_LENGTH];
        out[..self.0.len()].copy_from_slice(&self.0);
        out
    }
    #[inline]
    pub fn display(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

/// 5-stage envelope; time fields are 7-bit table indices, levels signed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Envelope {
    pub attack_time: u8,
    pub decay1_time: u8,
    pub decay2_time: u8,
    pub sustain_time: u8,
    pub release_time: u8,
    pub release2_time: u8,
    pub attack_level: i8,
    pub decay1_level: i8,
    pub decay2_level: i8,
    pub sustain_level: i8,
    pub release_level: i8,
    pub attack_velocity: u8,
    pub volume_velocity: u8,
    pub key_scale: u8,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack_time: 0,
            decay1_time: 40,
            decay2_time: 40,
            sustain_time: 100,
            release_time: 30,
            release2_time: 10,
            attack_level: 127,
            decay1_level: 100,
            decay2_level: 80,
            sustain_level: 64,
            release_level: 0,
            attack_velocity: 0,
            volume_velocity: 0,
            key_scale: 0,
        }
    }
}

impl Envelope {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[
            self.attack_time & 0x7f,
            self.decay1_time & 0x7f,
            self.decay2_time & 0x7f,
            self.sustain_time & 0x7f,
            self.release_time & 0x7f,
            self.release2_time & 0x7f,
            self.attack_level as u8,
            self.decay1_level as u8,
            self.decay2_level as u8,
            self.sustain_level as u8,
            self.release_level as u8,
            self.attack_velocity & 0x7f,
            self.volume_velocity & 0x7f,
            self.key_scale & 0x7f,
        ])
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut b = [0u8; ENVELOPE_SIZE as usize];
        r.read_exact(&mut b)?;
        Ok(Self {
            attack_time: b[0] & 0x7f,
            decay1_time: b[1] & 0x7f,
            decay2_time: b[2] & 0x7f,
            sustain_time: b[3] & 0x7f,
            release_time: b[4] & 0x7f,
            release2_time: b[5] & 0x7f,
            attack_level: b[6] as i8,
            decay1_level: b[7] as i8,
            decay2_level: b[8] as i8,
            sustain_level: b[9] as i8,
            release_level: b[10] as i8,
            attack_velocity: b[11] & 0x7f,
            volume_velocity: b[12] & 0x7f,
            key_scale: b[13] & 0x7f,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lfo {
    pub sample_number: u8,
    pub frequency: u8,
    pub am_source: u8,
    pub fm_source: u8,
    pub fm_amount: i8,
    pub am_amount: i8,
    pub start_level: i8,
    pub end_level: i8,
    pub delay_time: u8,
    pub wave_restart: bool,
    pub ramp_time: u8,
}

impl Default for Lfo {
    fn default() -> Self {
        Self {
            sample_number: 0,
            frequency: 20,
            am_source: 0,
            fm_source: 0,
            fm_amount: 0,
            am_amount: 0,
            start_level: 0,
            end_level: 0,
            delay_time: 0,
            wave_restart: false,
            ramp_time: 0,
        }
    }
}

impl Lfo {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[
            self.sample_number,
            self.frequency & 0x7f,
            (self.am_source & 0xf) | (self.fm_source << 4),
            self.fm_amount as u8,
            self.am_amount as u8,
            self.start_level as u8,
            self.end_level as u8,
            (self.delay_time & 0x7f) | ((self.wave_restart as u8) << 7),
            self.ramp_time & 0x7f,
        ])
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut b = [0u8; LFO_SIZE as usize];
        r.read_exact(&mut b)?;
        Ok(Self {
            sample_number: b[0],
            frequency: b[1] & 0x7f,
            am_source: b[2] & 0xf,
            fm_source: b[2] >> 4,
            fm_amount: b[3] as i8,
            am_amount: b[4] as i8,
            start_level: b[5] as i8,
            end_level: b[6] as i8,
            delay_time: b[7] & 0x7f,
            wave_restart: b[7] & 0x80 != 0,
            ramp_time: b[8] & 0x7f,
        })
    }
}

/// Synthesis descriptor. `freq_bias` is kept in host order; the encoder swaps
/// it to the Motorola byte order the ICS2115 expects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Patch {
    pub freq_bias: i16,
    pub amp_bias: u8,
    pub portamento: u8,
    pub sample_number: u16,
    pub pitch_bend: u8,
    pub mono: bool,
    pub retrigger: bool,
    pub no_hold: bool,
    pub restart: bool,
    pub filter_config: u8,
    pub reuse: bool,
    pub reset_lfo: bool,
    pub fm_source1: u8,
    pub fm_source2: u8,
    pub fm_amount1: i8,
    pub fm_amount2: i8,
    pub am_source: u8,
    pub am_amount: i8,
    pub fc1_mod_source: u8,
    pub fc2_mod_source: u8,
    pub fc1_mod_amount: i8,
    pub fc1_key_scale: i8,
    pub fc1_freq_bias: i8,
    pub fc2_mod_amount: i8,
    pub fc2_key_scale: i8,
    pub fc2_freq_bias: i8,
    pub randomizer_rate: u8,
    pub envelope1: Envelope,
    pub envelope2: Envelope,
    pub lfo1: Lfo,
    pub lfo2: Lfo,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            freq_bias: 0,
            amp_bias: 64,
            portamento: 0,
            sample_number: 0,
            pitch_bend: 2,
            mono: false,
            retrigger: false,
            no_hold: false,
            restart: false,
            filter_config: 0,
            reuse: false,
            reset_lfo: false,
            fm_source1: 0,
            fm_source2: 0,
            fm_amount1: 0,
            fm_amount2: 0,
            am_source: 0,
            am_amount: 0,
            fc1_mod_source: 0,
            fc2_mod_source: 0,
            fc1_mod_amount: 0,
            fc1_key_scale: 0,
            fc1_freq_bias: 0,
            fc2_mod_amount: 0,
            fc2_key_scale: 0,
            fc2_freq_bias: 0,
            randomizer_rate: 0,
            envelope1: Envelope::default(),
            envelope2: Envelope::default(),
            lfo1: Lfo::default(),
            lfo2: Lfo::default(),
        }
    }
}

impl Patch {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&self.freq_bias.to_be_bytes())?;
        w.write_all(&[
            self.amp_bias & 0x7f,
            self.portamento & 0x7f,
            (self.sample_number & 0xff) as u8,
            (self.pitch_bend & 0xf) | (((self.sample_number >> 8) as u8 & 1) << 4),
            self.mono as u8
                | (self.retrigger as u8) << 1
                | (self.no_hold as u8) << 2
                | (self.restart as u8) << 3
                | (self.filter_config & 3) << 4
                | (self.reuse as u8) << 6
                | (self.reset_lfo as u8) << 7,
            (self.fm_source2 & 0xf) | (self.fm_source1 << 4),
            self.fm_amount1 as u8,
            self.fm_amount2 as u8,
            self.am_source & 0xf,
            self.am_amount as u8,
            (self.fc1_mod_source & 0xf) | (self.fc2_mod_source << 4),
            self.fc1_mod_amount as u8,
            self.fc1_key_scale as u8,
            self.fc1_freq_bias as u8,
            self.fc2_mod_amount as u8,
            self.fc2_key_scale as u8,
            self.fc2_freq_bias as u8,
            self.randomizer_rate & 0x7f,
        ])?;
        self.envelope1.encode(w)?;
        self.envelope2.encode(w)?;
        self.lfo1.encode(w)?;
        self.lfo2.encode(w)
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut bias = [0u8; 2];
        r.read_exact(&mut bias)?;
        let mut b = [0u8; 18];
        r.read_exact(&mut b)?;
        Ok(Self {
            freq_bias: i16::from_be_bytes(bias),
            amp_bias: b[0] & 0x7f,
            portamento: b[1] & 0x7f,
            sample_number: b[2] as u16 | (((b[3] >> 4) & 1) as u16) << 8,
            pitch_bend: b[3] & 0xf,
            mono: b[4] & 1 != 0,
            retrigger: b[4] & 2 != 0,
            no_hold: b[4] & 4 != 0,
            restart: b[4] & 8 != 0,
            filter_config: (b[4] >> 4) & 3,
            reuse: b[4] & 0x40 != 0,
            reset_lfo: b[4] & 0x80 != 0,
            fm_source2: b[5] & 0xf,
            fm_source1: b[5] >> 4,
            fm_amount1: b[6] as i8,
            fm_amount2: b[7] as i8,
            am_source: b[8] & 0xf,
            am_amount: b[9] as i8,
            fc1_mod_source: b[10] & 0xf,
            fc2_mod_source: b[10] >> 4,
            fc1_mod_amount: b[11] as i8,
            fc1_key_scale: b[12] as i8,
            fc1_freq_bias: b[13] as i8,
            fc2_mod_amount: b[14] as i8,
            fc2_key_scale: b[15] as i8,
            fc2_freq_bias: b[16] as i8,
            randomizer_rate: b[17] & 0x7f,
            envelope1: Envelope::decode(r)?,
            envelope2: Envelope::decode(r)?,
            lfo1: Lfo::decode(r)?,
            lfo2: Lfo::decode(r)?,
        })
    }
    /// Canonical byte image used as part of the layer-grouping key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PATCH_SIZE as usize);
        self.encode(&mut out).unwrap();
        out
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PatchRecord {
    pub patch: Patch,
    pub number: i16,
    pub name: BankName,
}

impl PatchRecord {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        self.patch.encode(w)?;
        w.write_all(&self.number.to_le_bytes())?;
        w.write_all(&self.name.to_raw())
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let patch = Patch::decode(r)?;
        let mut num = [0u8; 2];
        r.read_exact(&mut num)?;
        let mut name = [0u8; NAME_LENGTH];
        r.read_exact(&mut name)?;
        Ok(Self {
            patch,
            number: i16::from_le_bytes(num),
            name: BankName::from_raw(&name),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Layer {
    pub patch_number: u8,
    pub mix_level: u8,
    pub unmute: bool,
    pub split_point: u8,
    pub split_dir: u8,
    pub pan_mod_source: u8,
    pub pan_modulated: bool,
    pub pan: u8,
    pub split_type: u8,
}

impl Layer {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[
            self.patch_number,
            (self.mix_level & 0x7f) | ((self.unmute as u8) << 7),
            (self.split_point & 0x7f) | ((self.split_dir & 1) << 7),
            (self.pan_mod_source & 3)
                | (self.pan_modulated as u8) << 2
                | (self.pan & 0xf) << 3
                | (self.split_type & 1) << 7,
        ])
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut b = [0u8; LAYER_SIZE as usize];
        r.read_exact(&mut b)?;
        Ok(Self {
            patch_number: b[0],
            mix_level: b[1] & 0x7f,
            unmute: b[1] & 0x80 != 0,
            split_point: b[2] & 0x7f,
            split_dir: b[2] >> 7,
            pan_mod_source: b[3] & 3,
            pan_modulated: b[3] & 4 != 0,
            pan: (b[3] >> 3) & 0xf,
            split_type: b[3] >> 7,
        })
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    pub layers: [Layer; NUM_LAYERS],
    pub number: i16,
    pub name: BankName,
}

impl Program {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        for layer in &self.layers {
            layer.encode(w)?;
        }
        w.write_all(&self.number.to_le_bytes())?;
        w.write_all(&self.name.to_raw())
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut layers = [Layer::default(); NUM_LAYERS];
        for layer in layers.iter_mut() {
            *layer = Layer::decode(r)?;
        }
        let mut num = [0u8; 2];
        r.read_exact(&mut num)?;
        let mut name = [0u8; NAME_LENGTH];
        r.read_exact(&mut name)?;
        Ok(Self {
            layers,
            number: i16::from_le_bytes(num),
            name: BankName::from_raw(&name),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Drum {
    pub patch_number: u8,
    pub mix_level: u8,
    pub unmute: bool,
    pub group: u8,
    pub pan_mod_source: u8,
    pub pan_modulated: bool,
    pub pan_amount: u8,
}

impl Drum {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[
            self.patch_number,
            (self.mix_level & 0x7f) | ((self.unmute as u8) << 7),
            self.group & 0xf,
            (self.pan_mod_source & 3)
                | (self.pan_modulated as u8) << 2
                | (self.pan_amount & 0xf) << 3,
        ])
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut b = [0u8; 4];
        r.read_exact(&mut b)?;
        Ok(Self {
            patch_number: b[0],
            mix_level: b[1] & 0x7f,
            unmute: b[1] & 0x80 != 0,
            group: b[2] & 0xf,
            pan_mod_source: b[3] & 3,
            pan_modulated: b[3] & 4 != 0,
            pan_amount: (b[3] >> 3) & 0xf,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Drumkit {
    pub drums: [Drum; NUM_MIDIKEYS],
}

impl Default for Drumkit {
    fn default() -> Self {
        Self {
            drums: [Drum::default(); NUM_MIDIKEYS],
        }
    }
}

impl Drumkit {
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        for drum in &self.drums {
            drum.encode(w)?;
        }
        Ok(())
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut drums = [Drum::default(); NUM_MIDIKEYS];
        for drum in drums.iter_mut() {
            *drum = Drum::decode(r)?;
        }
        Ok(Self { drums })
    }
}

/// 24.4 fixed-point position inside a sample's PCM (20-bit integer part on
/// disk, top byte unused).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SampleOffset {
    pub integer: u32,
    pub fraction: u8,
}

impl SampleOffset {
    #[inline]
    pub fn whole(integer: u32) -> Self {
        Self {
            integer,
            fraction: 0,
        }
    }
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        let packed = (self.fraction as u32 & 0xf) | (self.integer & 0xfffff) << 4;
        w.write_all(&packed.to_le_bytes())
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let mut b = [0u8; 4];
        r.read_exact(&mut b)?;
        let packed = u32::from_le_bytes(b);
        Ok(Self {
            integer: (packed >> 4) & 0xfffff,
            fraction: (packed & 0xf) as u8,
        })
    }
}

/// Playback descriptor shared by SAMPLE and ALIAS entries. `freq_bias` is in
/// host order; the encoder swaps it like the patch field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SampleData {
    pub start: SampleOffset,
    pub loop_start: SampleOffset,
    pub loop_end: SampleOffset,
    pub end: SampleOffset,
    pub freq_bias: i16,
    pub resolution: u8,
    pub looped: bool,
    pub bidirectional: bool,
    pub reverse: bool,
}

impl SampleData {
    #[inline]
    fn flags(&self) -> u8 {
        (self.resolution & 3)
            | (self.looped as u8) << 3
            | (self.bidirectional as u8) << 4
            | (self.reverse as u8) << 6
    }
    fn from_flags(self, flags: u8) -> Self {
        Self {
            resolution: flags & 3,
            looped: flags & 8 != 0,
            bidirectional: flags & 0x10 != 0,
            reverse: flags & 0x40 != 0,
            ..self
        }
    }
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        self.start.encode(w)?;
        self.loop_start.encode(w)?;
        self.loop_end.encode(w)?;
        self.end.encode(w)?;
        w.write_all(&self.freq_bias.to_be_bytes())?;
        w.write_all(&[self.flags()])
    }
    pub fn decode(r: &mut impl Read) -> io::Result<Self> {
        let start = SampleOffset::decode(r)?;
        let loop_start = SampleOffset::decode(r)?;
        let loop_end = SampleOffset::decode(r)?;
        let end = SampleOffset::decode(r)?;
        let mut bias = [0u8; 2];
        r.read_exact(&mut bias)?;
        let mut flags = [0u8];
        r.read_exact(&mut flags)?;
        Ok(Self {
            start,
            loop_start,
            loop_end,
            end,
            freq_bias: i16::from_be_bytes(bias),
            resolution: 0,
            looped: false,
            bidirectional: false,
            reverse: false,
        }
        .from_flags(flags[0]))
    }
    /// The ALIAS record stores the same fields with start/loop-start followed
    /// by end/loop-end, unlike the SAMPLE order.
    pub fn encode_alias(&self, w: &mut impl Write) -> io::Result<()> {
        self.start.encode(w)?;
        self.loop_start.encode(w)?;
        self.end.encode(w)?;
        self.loop_end.encode(w)?;
        w.write_all(&self.freq_bias.to_be_bytes())?;
        w.write_all(&[self.flags()])
    }
    pub fn decode_alias(r: &mut impl Read) -> io::Result<Self> {
        let start = SampleOffset::decode(r)?;
        let loop_start = SampleOffset::decode(r)?;
        let end = SampleOffset::decode(r)?;
        let loop_end = SampleOffset::decode(r)?;
        let mut bias = [0u8; 2];
        r.read_exact(&mut bias)?;
        let mut flags = [0u8];
        r.read_exact(&mut flags)?;
        Ok(Self {
            start,
            loop_start,
            loop_end,
            end,
            freq_bias: i16::from_be_bytes(bias),
            resolution: 0,
            looped: false,
            bidirectional: false,
            reverse: false,
        }
        .from_flags(flags[0]))
    }
}

#[derive(Clone, Debug)]
pub enum SampleBody {
    Sample {
        data: SampleData,
        pcm: Vec<i16>,
    },
    /// Key-indexed lookup; -1 marks a key with no sample assigned.
    Multisample {
        keys: [i16; NUM_MIDIKEYS],
    },
    Alias {
        original: u16,
        data: SampleData,
    },
    Empty,
}

#[derive(Clone, Debug)]
pub struct SampleEntry {
    pub number: u16,
    pub name: BankName,
    pub rate: u32,
    pub channel: u32,
    pub body: SampleBody,
}

impl SampleEntry {
    #[inline]
    pub fn sample_type(&self) -> i16 {
        match self.body {
            SampleBody::Sample { .. } => ST_SAMPLE,
            SampleBody::Multisample { .. } => ST_MULTISAMPLE,
            SampleBody::Alias { .. } => ST_ALIAS,
            SampleBody::Empty => ST_EMPTY,
        }
    }
    #[inline]
    pub fn body_size(&self) -> u32 {
        match self.body {
            SampleBody::Sample { .. } => SAMPLE_BODY_SIZE,
            SampleBody::Multisample { .. } => MULTISAMPLE_BODY_SIZE,
            SampleBody::Alias { .. } => ALIAS_BODY_SIZE,
            SampleBody::Empty => 0,
        }
    }
    #[inline]
    pub fn pcm_bytes(&self) -> u32 {
        match &self.body {
            SampleBody::Sample { pcm, .. } => pcm.len() as u32 * 2,
            _ => 0,
        }
    }
    #[inline]
    pub fn pcm_samples(&self) -> u32 {
        match &self.body {
            SampleBody::Sample { pcm, .. } => pcm.len() as u32,
            _ => 0,
        }
    }
    /// Total on-disk size of this entry, stored in its own `dwSize` field.
    #[inline]
    pub fn disk_size(&self) -> u32 {
        SAMPLE_INFO_SIZE + self.body_size() + MAX_PATH_LENGTH as u32 + self.pcm_bytes()
    }
}

#[binrw::binrw]
#[brw(little)]
struct FileHeader {
    synth_name: [u8; NAME_LENGTH],
    file_type: [u8; NAME_LENGTH],
    version: u16,
    program_count: u16,
    drumkit_count: u16,
    patch_count: u16,
    sample_count: u16,
    effects_count: u16,
    program_offset: u32,
    drumkit_offset: u32,
    patch_offset: u32,
    sample_offset: u32,
    effects_offset: u32,
    memory_required: u32,
    embedded_samples: i16,
    unused: i16,
    comment: [u8; MAX_COMMENT],
    reserved: [u8; 88],
}

#[binrw::binrw]
#[brw(little)]
struct SampleInfo {
    size: u32,
    sample_type: i16,
    number: i16,
    name: [u8; NAME_LENGTH],
    rate: u32,
    size_bytes: u32,
    size_samples: u32,
    channel: u32,
    unused: [u8; 62],
}

/// In-memory bank, fully materialized before a single-pass write.
#[derive(Clone, Debug)]
pub struct Bank {
    pub synth_name: BankName,
    pub comment: String,
    pub programs: Vec<Program>,
    pub drumkit: Option<Drumkit>,
    pub patches: Vec<PatchRecord>,
    pub samples: Vec<SampleEntry>,
}

impl Bank {
    pub fn new(device: Device) -> Self {
        Self {
            synth_name: BankName::new(device.name()),
            comment: String::new(),
            programs: Vec::new(),
            drumkit: None,
            patches: Vec::new(),
            samples: Vec::new(),
        }
    }
    /// Total embedded PCM, the `dwMemoryRequired` header field.
    pub fn memory_required(&self) -> u32 {
        self.samples.iter().map(|s| s.pcm_bytes()).sum()
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut out = io::BufWriter::new(std::fs::File::create(path)?);
        self.write(&mut out)
    }

    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        let program_offset = HEADER_SIZE;
        let drumkit_offset = program_offset + self.programs.len() as u32 * PROGRAM_RECORD_SIZE;
        let patch_offset =
            drumkit_offset + self.drumkit.as_ref().map(|_| DRUMKIT_SIZE).unwrap_or(0);
        let sample_offset = patch_offset + self.patches.len() as u32 * PATCH_RECORD_SIZE;

        let mut comment = [0u8; MAX_COMMENT];
        let trimmed = self.comment.as_bytes();
        let len = trimmed.len().min(MAX_COMMENT - 1);
        comment[..len].copy_from_slice(&trimmed[..len]);

        let header = FileHeader {
            synth_name: self.synth_name.to_raw(),
            file_type: BankName::new("Bank").to_raw(),
            version: WF_VERSION,
            program_count: self.programs.len() as u16,
            drumkit_count: self.drumkit.is_some() as u16,
            patch_count: self.patches.len() as u16,
            sample_count: self.samples.len() as u16,
            effects_count: 0,
            program_offset,
            drumkit_offset: if self.drumkit.is_some() {
                drumkit_offset
            } else {
                0
            },
            patch_offset,
            sample_offset,
            effects_offset: 0,
            memory_required: self.memory_required(),
            embedded_samples: !self.samples.is_empty() as i16,
            unused: 0,
            comment,
            reserved: [0u8; 88],
        };
        header.write_no_seek(w)?;

        for program in &self.programs {
            program.encode(w)?;
        }
        if let Some(drumkit) = &self.drumkit {
            drumkit.encode(w)?;
        }
        for patch in &self.patches {
            patch.encode(w)?;
        }
        for sample in &self.samples {
            let info = SampleInfo {
                size: sample.disk_size(),
                sample_type: sample.sample_type(),
                number: sample.number as i16,
                name: sample.name.to_raw(),
                rate: sample.rate,
                size_bytes: sample.pcm_bytes(),
                size_samples: sample.pcm_samples(),
                channel: sample.channel,
                unused: [0u8; 62],
            };
            info.write_no_seek(w)?;
            match &sample.body {
                SampleBody::Sample { data, .. } => data.encode(w)?,
                SampleBody::Multisample { keys } => {
                    w.write_all(&(NUM_MIDIKEYS as i16).to_le_bytes())?;
                    for key in keys {
                        w.write_all(&key.to_le_bytes())?;
                    }
                }
                SampleBody::Alias { original, data } => {
                    w.write_all(&(*original as i16).to_le_bytes())?;
                    data.encode_alias(w)?;
                }
                SampleBody::Empty => {}
            }
            let mut filespec = [0u8; MAX_PATH_LENGTH];
            filespec[..8].copy_from_slice(b"EMBEDDED");
            w.write_all(&filespec)?;
            if let SampleBody::Sample { pcm, .. } = &sample.body {
                for s in pcm {
                    w.write_all(&s.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    pub fn read_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut r = io::BufReader::new(std::fs::File::open(path)?);
        Self::read(&mut r)
    }

    pub fn read<R: Read + Seek>(r: &mut R) -> io::Result<Self> {
        let header = FileHeader::read(r)
            .map_err(|e| invalid_data(format!("Failed to read bank header: {e}")))?;
        if header.version != WF_VERSION {
            log::warn!(
                "Bank version is {}.{:02}, expected {}.{:02}",
                header.version / 100,
                header.version % 100,
                WF_VERSION / 100,
                WF_VERSION % 100
            );
        }

        let mut programs = Vec::with_capacity(header.program_count as usize);
        r.seek(SeekFrom::Start(header.program_offset as u64))?;
        for _ in 0..header.program_count {
            programs.push(Program::decode(r)?);
        }

        let drumkit = if header.drumkit_count > 0 {
            r.seek(SeekFrom::Start(header.drumkit_offset as u64))?;
            Some(Drumkit::decode(r)?)
        } else {
            None
        };

        let mut patches = Vec::with_capacity(header.patch_count as usize);
        r.seek(SeekFrom::Start(header.patch_offset as u64))?;
        for _ in 0..header.patch_count {
            patches.push(PatchRecord::decode(r)?);
        }

        let mut samples = Vec::with_capacity(header.sample_count as usize);
        r.seek(SeekFrom::Start(header.sample_offset as u64))?;
        for i in 0..header.sample_count {
            let start = r.stream_position()?;
            let info = SampleInfo::read(r)
                .map_err(|e| invalid_data(format!("Failed to read sample {i} info: {e}")))?;
            let body = match info.sample_type {
                ST_SAMPLE => {
                    let data = SampleData::decode(r)?;
                    r.seek(SeekFrom::Current(MAX_PATH_LENGTH as i64))?;
                    let mut pcm = vec![0i16; info.size_samples as usize];
                    let mut b = [0u8; 2];
                    for s in pcm.iter_mut() {
                        r.read_exact(&mut b)?;
                        *s = i16::from_le_bytes(b);
                    }
                    SampleBody::Sample { data, pcm }
                }
                ST_MULTISAMPLE => {
                    let mut b = [0u8; 2];
                    r.read_exact(&mut b)?;
                    let mut keys = [0i16; NUM_MIDIKEYS];
                    for key in keys.iter_mut() {
                        r.read_exact(&mut b)?;
                        *key = i16::from_le_bytes(b);
                    }
                    SampleBody::Multisample { keys }
                }
                ST_ALIAS => {
                    let mut b = [0u8; 2];
                    r.read_exact(&mut b)?;
                    let original = i16::from_le_bytes(b) as u16;
                    let data = SampleData::decode_alias(r)?;
                    SampleBody::Alias { original, data }
                }
                ST_EMPTY => SampleBody::Empty,
                other => {
                    return Err(invalid_data(format!(
                        "Sample {i} has unknown type {other}"
                    )))
                }
            };
            samples.push(SampleEntry {
                number: info.number as u16,
                name: BankName::from_raw(&info.name),
                rate: info.rate,
                channel: info.channel,
                body,
            });
            // entries are self-describing, trust dwSize for skip arithmetic
            r.seek(SeekFrom::Start(start + info.size as u64))?;
        }

        let comment_end = header
            .comment
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_COMMENT);
        Ok(Self {
            synth_name: BankName::from_raw(&header.synth_name),
            comment: String::from_utf8_lossy(&header.comment[..comment_end]).into_owned(),
            programs,
            drumkit,
            patches,
            samples,
        })
    }

    pub fn print_info(&self) {
        log::info!("Synth Name: {}", self.synth_name.display());
        log::info!(
            "Programs: {}  Patches: {}  Samples: {}  Drumkits: {}",
            self.programs.len(),
            self.patches.len(),
            self.samples.len(),
            self.drumkit.is_some() as u32
        );
        let memory = self.memory_required();
        log::info!(
            "RAM Required: {} bytes ({:.2} MB)",
            memory,
            memory as f64 / (1024.0 * 1024.0)
        );
        if !self.comment.is_empty() {
            log::info!("Comment: {}", self.comment);
        }
        if crate::is_log_level(log::LevelFilter::Debug) && !self.samples.is_empty() {
            log::debug!("  NUM   TYPE        CH RATE     SAMPLES    HASH");
            for sample in &self.samples {
                let typ = match sample.body {
                    SampleBody::Sample { .. } => "SAMPLE",
                    SampleBody::Multisample { .. } => "MULTISAMPLE",
                    SampleBody::Alias { .. } => "ALIAS",
                    SampleBody::Empty => "EMPTY",
                };
                let hash = match &sample.body {
                    SampleBody::Sample { pcm, .. } => {
                        let mut bytes = Vec::with_capacity(pcm.len() * 2);
                        for s in pcm {
                            bytes.extend_from_slice(&s.to_le_bytes());
                        }
                        format!("0x{}", blake3::hash(&bytes))
                    }
                    _ => String::new(),
                };
                log::debug!(
                    "  {: <5} {typ: <11} {: <2} {: <8} {: <10} {hash}",
                    sample.number,
                    sample.channel,
                    sample.rate,
                    sample.pcm_samples(),
                );
            }
        }
    }
}

/// Rewrite an existing bank for a different target device.
pub fn retarget(path: impl AsRef<Path>, device: Device) -> io::Result<()> {
    let path = path.as_ref();
    let mut bank = Bank::read_file(path)?;
    bank.synth_name = BankName::new(device.name());
    bank.write_file(path)?;
    log::info!(
        "Updated `{}` target device to {}",
        path.display(),
        device.name()
    );
    Ok(())
}

pub(crate) trait NoSeekWrite {
    fn write_no_seek<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

impl<T: BinWrite> NoSeekWrite for T
where
    Self: binrw::meta::WriteEndian,
    for<'a> T::Args<'a>: Default,
{
    fn write_no_seek<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.write(&mut binrw::io::NoSeek::new(writer))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
