use crate::params::{attenuation_to_mix, sf2_pan_to_wf, Stage, ZoneParams};
use crate::pool::{stereo_partner, SamplePool};
use crate::sf2::{find_gen, Gen, Generator, Modulator, SoundBank, LEFT_SAMPLE, RIGHT_SAMPLE};
use crate::wfb::{
    Bank, BankName, Device, Drum, Drumkit, Layer, Patch, PatchRecord, Program, MAX_PATCHES,
    MAX_PROGRAMS, NUM_LAYERS, NUM_MIDIKEYS,
};
use indexmap::IndexMap;
use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
};

/// GM percussion occupies keys 35..=81; their patches are budgeted up front
/// so melodic conversion cannot starve the drumkit.
pub const DRUM_KEY_LO: u8 = 35;
pub const DRUM_KEY_HI: u8 = 81;
const DRUM_PATCH_RESERVE: usize = (DRUM_KEY_HI - DRUM_KEY_LO + 1) as usize;

#[derive(Clone, Debug)]
pub struct PatchReplacement {
    pub file: PathBuf,
    pub program: u8,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub device: Device,
    pub drums: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub patches: Vec<PatchReplacement>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            device: Device::Maui,
            drums: None,
            output: None,
            patches: Vec::new(),
        }
    }
}

/// Per-file counters printed after a successful conversion.
#[derive(Debug, Default)]
pub struct Summary {
    pub programs: usize,
    pub patches: usize,
    pub samples: usize,
    pub aliases: usize,
    pub resampled: usize,
    pub dropped_zones: usize,
    pub dropped_groups: usize,
    pub discarded_samples: usize,
}

/// One instrument zone after the two-level generator stack has been resolved
/// and clipped against its preset zone.
struct Candidate {
    patch: Patch,
    sample: u16,
    pan: u8,
    key_lo: u8,
    key_hi: u8,
    vel_lo: u8,
    vel_hi: u8,
}

/// Zones that synthesize identically, keyed by the encoded patch image plus
/// pan and velocity window. Insertion order becomes layer order.
struct Group {
    patch: Patch,
    pan: u8,
    vel_lo: u8,
    vel_hi: u8,
    key_map: [Option<u16>; NUM_MIDIKEYS],
}

type GroupKey = (Vec<u8>, u8, u8, u8);

fn resolve_candidates(bank: &SoundBank, preset_idx: usize, summary: &mut Summary) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut preset_global_gens: &[Generator] = &[];
    let mut preset_global_mods: &[Modulator] = &[];

    for (pos, bag) in bank.preset_bag_range(preset_idx).enumerate() {
        let gens = bank.preset_gens(bag);
        let mods = bank.preset_mods(bag);
        let instrument = match find_gen(gens, Gen::INSTRUMENT) {
            Some(gen) => gen.amount as usize,
            None if pos == 0 => {
                preset_global_gens = gens;
                preset_global_mods = mods;
                continue;
            }
            None => {
                // only a leading bag may omit the instrument generator
                summary.dropped_zones += 1;
                continue;
            }
        };
        if instrument >= bank.instrument_count() {
            summary.dropped_zones += 1;
            continue;
        }

        let mut inst_global_gens: &[Generator] = &[];
        let mut inst_global_mods: &[Modulator] = &[];
        for (ipos, ibag) in bank.instrument_bag_range(instrument).enumerate() {
            let igens = bank.instrument_gens(ibag);
            let imods = bank.instrument_mods(ibag);
            match find_gen(igens, Gen::SAMPLE_ID) {
                Some(_) => {}
                None if ipos == 0 => {
                    inst_global_gens = igens;
                    inst_global_mods = imods;
                    continue;
                }
                None => {
                    summary.dropped_zones += 1;
                    continue;
                }
            }

            let mut params = ZoneParams::default();
            params.apply_all(inst_global_gens, Stage::Absolute);
            params.apply_all(igens, Stage::Absolute);
            params.apply_all(preset_global_gens, Stage::Additive);
            params.apply_all(gens, Stage::Additive);
            let sample = match params.sample {
                Some(sample) if (sample as usize) < bank.sample_count() => sample,
                _ => {
                    summary.dropped_zones += 1;
                    continue;
                }
            };
            if params.key_range_empty() {
                summary.dropped_zones += 1;
                continue;
            }

            let mut patch = params.project();
            crate::params::apply_modulators(&mut patch, inst_global_mods);
            crate::params::apply_modulators(&mut patch, imods);
            crate::params::apply_modulators(&mut patch, preset_global_mods);
            crate::params::apply_modulators(&mut patch, mods);

            candidates.push(Candidate {
                patch,
                sample,
                pan: sf2_pan_to_wf(params.pan),
                key_lo: params.key_lo,
                key_hi: params.key_hi.min(127),
                vel_lo: params.vel_lo,
                vel_hi: params.vel_hi.min(127),
            });
        }
    }

    // a right-channel zone whose left companion is also present would double
    // up once the left zone expands to a stereo pair, so drop it here
    let samples: HashSet<u16> = candidates.iter().map(|c| c.sample).collect();
    candidates.retain(|c| {
        if bank.samples[c.sample as usize].sample_type != RIGHT_SAMPLE {
            return true;
        }
        match stereo_partner(bank, c.sample as usize) {
            Some(partner) => !samples.contains(&(partner as u16)),
            None => true,
        }
    });
    candidates
}

fn group_candidates(candidates: Vec<Candidate>) -> IndexMap<GroupKey, Group> {
    let mut groups: IndexMap<GroupKey, Group> = IndexMap::new();
    for candidate in candidates {
        let key = (
            candidate.patch.to_bytes(),
            candidate.pan,
            candidate.vel_lo,
            candidate.vel_hi,
        );
        let group = groups.entry(key).or_insert_with(|| Group {
            patch: candidate.patch.clone(),
            pan: candidate.pan,
            vel_lo: candidate.vel_lo,
            vel_hi: candidate.vel_hi,
            key_map: [None; NUM_MIDIKEYS],
        });
        for key in candidate.key_lo..=candidate.key_hi {
            group.key_map[key as usize] = Some(candidate.sample);
        }
    }
    groups
}

/// 7-bit split point + direction. A low bound splits upward, an upper bound
/// splits downward; a range bounded on both sides keeps only the low split,
/// the lost bound being recovered from the instrument-level key range on
/// playback. Velocity windows use the same encoding with the type bit set.
fn encode_split(layer: &mut Layer, key_lo: u8, key_hi: u8, vel_lo: u8, vel_hi: u8) {
    if key_lo > 0 || key_hi < 127 {
        layer.split_type = 0;
        if key_lo > 0 {
            layer.split_dir = 0;
            layer.split_point = key_lo;
        } else {
            layer.split_dir = 1;
            layer.split_point = key_hi;
        }
    } else if vel_lo > 0 || vel_hi < 127 {
        layer.split_type = 1;
        if vel_lo > 0 {
            layer.split_dir = 0;
            layer.split_point = vel_lo;
        } else {
            layer.split_dir = 1;
            layer.split_point = vel_hi;
        }
    }
}

struct ProgramBudget {
    max_patches: usize,
}

fn convert_preset(
    bank: &SoundBank,
    preset_idx: usize,
    prog_num: i16,
    out: &mut Bank,
    pool: &mut SamplePool,
    budget: &ProgramBudget,
    summary: &mut Summary,
) -> Program {
    let preset_name = bank.presets[preset_idx].name.display().into_owned();
    let mut program = Program {
        layers: Default::default(),
        number: prog_num,
        name: BankName::new(&preset_name),
    };

    let candidates = resolve_candidates(bank, preset_idx, summary);
    let groups = group_candidates(candidates);

    let mut layer_idx = 0usize;
    let mut dropped_layer_cap = 0usize;
    let mut dropped_patch_cap = 0usize;

    for group in groups.values() {
        if layer_idx >= NUM_LAYERS {
            dropped_layer_cap += 1;
            continue;
        }

        // materialize this group's samples, first-seen key order
        let mut distinct: Vec<u16> = Vec::new();
        for sample in group.key_map.iter().flatten() {
            if !distinct.contains(sample) {
                distinct.push(*sample);
            }
        }
        if distinct.is_empty() {
            continue;
        }

        // a lone stereo half expands into a hard-panned pair of layers
        let stereo = if distinct.len() == 1 {
            stereo_partner(bank, distinct[0] as usize)
                .filter(|_| bank.samples[distinct[0] as usize].sample_type == LEFT_SAMPLE)
        } else {
            None
        };

        if let Some(partner) = stereo {
            let Some(left) = pool.add_sf2_sample(bank, distinct[0] as usize) else {
                continue;
            };
            if out.patches.len() >= budget.max_patches {
                dropped_patch_cap += 1;
                continue;
            }
            let (lo, hi) = key_bounds(&group.key_map);
            let mut patch = group.patch.clone();
            patch.sample_number = left;
            layer_idx = place_layer(
                out,
                &mut program,
                layer_idx,
                patch.clone(),
                format!("{preset_name}_L{layer_idx}"),
                0,
                lo,
                hi,
                group.vel_lo,
                group.vel_hi,
            );
            // the right half is dropped silently if no slot or budget remains
            if layer_idx < NUM_LAYERS && out.patches.len() < budget.max_patches {
                if let Some(right) = pool.add_sf2_sample(bank, partner) {
                    let mut patch = group.patch.clone();
                    patch.sample_number = right;
                    layer_idx = place_layer(
                        out,
                        &mut program,
                        layer_idx,
                        patch,
                        format!("{preset_name}_L{layer_idx}"),
                        7,
                        lo,
                        hi,
                        group.vel_lo,
                        group.vel_hi,
                    );
                }
            }
            continue;
        }

        let mut pool_map = [None; NUM_MIDIKEYS];
        let mut pool_distinct: Vec<u16> = Vec::new();
        for sample in &distinct {
            if let Some(index) = pool.add_sf2_sample(bank, *sample as usize) {
                pool_distinct.push(index);
                for (key, mapped) in group.key_map.iter().enumerate() {
                    if *mapped == Some(*sample) {
                        pool_map[key] = Some(index);
                    }
                }
            }
        }
        if pool_distinct.is_empty() {
            // every sample hit the pool cap
            continue;
        }

        let full_coverage = pool_map.iter().all(|k| k.is_some());
        let sample_number = if pool_distinct.len() == 1 && full_coverage {
            pool_distinct[0]
        } else {
            let mut keys = [-1i16; NUM_MIDIKEYS];
            for (key, mapped) in pool_map.iter().enumerate() {
                if let Some(index) = mapped {
                    keys[key] = *index as i16;
                }
            }
            let rate = pool.entries[pool_distinct[0] as usize].rate;
            match pool.add_multisample(&format!("{preset_name}_MS{layer_idx}"), rate, keys) {
                Some(index) => index,
                None => continue,
            }
        };

        if out.patches.len() >= budget.max_patches {
            dropped_patch_cap += 1;
            continue;
        }
        let (lo, hi) = key_bounds(&group.key_map);
        let mut patch = group.patch.clone();
        patch.sample_number = sample_number;
        layer_idx = place_layer(
            out,
            &mut program,
            layer_idx,
            patch,
            format!("{preset_name}_L{layer_idx}"),
            group.pan,
            lo,
            hi,
            group.vel_lo,
            group.vel_hi,
        );
    }

    if dropped_layer_cap > 0 {
        log::warn!(
            "Program {prog_num} `{preset_name}`: {dropped_layer_cap} zone group(s) \
            dropped ({NUM_LAYERS}-layer limit)"
        );
    }
    if dropped_patch_cap > 0 {
        log::warn!(
            "Program {prog_num} `{preset_name}`: {dropped_patch_cap} zone group(s) \
            dropped (patch table full)"
        );
    }
    summary.dropped_groups += dropped_layer_cap + dropped_patch_cap;
    program
}

fn key_bounds(key_map: &[Option<u16>; NUM_MIDIKEYS]) -> (u8, u8) {
    let lo = key_map.iter().position(|k| k.is_some()).unwrap_or(0);
    let hi = key_map.iter().rposition(|k| k.is_some()).unwrap_or(127);
    (lo as u8, hi as u8)
}

#[allow(clippy::too_many_arguments)]
fn place_layer(
    out: &mut Bank,
    program: &mut Program,
    layer_idx: usize,
    patch: Patch,
    patch_name: String,
    pan: u8,
    key_lo: u8,
    key_hi: u8,
    vel_lo: u8,
    vel_hi: u8,
) -> usize {
    let patch_number = out.patches.len();
    out.patches.push(PatchRecord {
        patch,
        number: patch_number as i16,
        name: BankName::new(&patch_name),
    });

    let layer = &mut program.layers[layer_idx];
    layer.patch_number = patch_number as u8;
    layer.mix_level = 127;
    layer.unmute = true;
    layer.pan = pan;
    encode_split(layer, key_lo, key_hi, vel_lo, vel_hi);
    layer_idx + 1
}

/// Per-key drum resolution: first matching preset zone, first matching
/// instrument zone with a sample, same generator stack as the melodic path.
fn build_drumkit(
    bank: &SoundBank,
    preset_idx: usize,
    out: &mut Bank,
    pool: &mut SamplePool,
    summary: &mut Summary,
) {
    let mut kit = Drumkit::default();

    let mut preset_global_gens: &[Generator] = &[];
    let mut preset_global_mods: &[Modulator] = &[];
    let mut zones = Vec::new();
    for (pos, bag) in bank.preset_bag_range(preset_idx).enumerate() {
        let gens = bank.preset_gens(bag);
        match find_gen(gens, Gen::INSTRUMENT) {
            Some(gen) => zones.push((gens, bank.preset_mods(bag), gen.amount as usize)),
            None if pos == 0 => {
                preset_global_gens = gens;
                preset_global_mods = bank.preset_mods(bag);
            }
            None => summary.dropped_zones += 1,
        }
    }

    for key in DRUM_KEY_LO..=DRUM_KEY_HI {
        let Some((gens, mods, instrument)) = zones
            .iter()
            .find(|(gens, _, _)| {
                let (lo, hi) = find_gen(gens, Gen::KEY_RANGE)
                    .map(|g| g.range())
                    .unwrap_or((0, 127));
                (lo..=hi).contains(&key)
            })
            .copied()
        else {
            continue;
        };
        if instrument >= bank.instrument_count() {
            continue;
        }

        let mut inst_global_gens: &[Generator] = &[];
        let mut inst_global_mods: &[Modulator] = &[];
        let mut hit = None;
        for (ipos, ibag) in bank.instrument_bag_range(instrument).enumerate() {
            let igens = bank.instrument_gens(ibag);
            let sample = match find_gen(igens, Gen::SAMPLE_ID) {
                Some(gen) => gen.amount,
                None if ipos == 0 => {
                    inst_global_gens = igens;
                    inst_global_mods = bank.instrument_mods(ibag);
                    continue;
                }
                None => continue,
            };
            let (lo, hi) = find_gen(igens, Gen::KEY_RANGE)
                .map(|g| g.range())
                .unwrap_or((0, 127));
            if (lo..=hi).contains(&key) && (sample as usize) < bank.sample_count() {
                hit = Some((igens, bank.instrument_mods(ibag), sample));
                break;
            }
        }
        let Some((igens, imods, sample)) = hit else {
            continue;
        };

        let mut params = ZoneParams::default();
        params.apply_all(inst_global_gens, Stage::Absolute);
        params.apply_all(igens, Stage::Absolute);
        params.apply_all(preset_global_gens, Stage::Additive);
        params.apply_all(gens, Stage::Additive);

        let Some(pool_index) = pool.add_sf2_sample(bank, sample as usize) else {
            continue;
        };
        if out.patches.len() >= MAX_PATCHES {
            summary.dropped_groups += 1;
            continue;
        }

        let mut patch = params.project();
        crate::params::apply_modulators(&mut patch, inst_global_mods);
        crate::params::apply_modulators(&mut patch, imods);
        crate::params::apply_modulators(&mut patch, preset_global_mods);
        crate::params::apply_modulators(&mut patch, mods);
        patch.sample_number = pool_index;

        let patch_number = out.patches.len();
        out.patches.push(PatchRecord {
            patch,
            number: patch_number as i16,
            name: BankName::new(&format!("Drum_{key}")),
        });

        kit.drums[key as usize] = Drum {
            patch_number: patch_number as u8,
            mix_level: attenuation_to_mix(params.attenuation),
            unmute: true,
            group: params.exclusive_class.clamp(0, 15) as u8,
            pan_mod_source: 0,
            pan_modulated: false,
            pan_amount: sf2_pan_to_wf(params.pan),
        };
    }

    out.drumkit = Some(kit);
}

/// Convert one SF2 file into a WaveFront bank on disk.
pub fn convert_file(input: &Path, output: &Path, opts: &Options) -> io::Result<Summary> {
    let bank = SoundBank::load(input)?;
    let mut out = Bank::new(opts.device);
    if let Some(name) = input.file_name() {
        out.comment = format!("Converted from {}", name.to_string_lossy());
    }
    let mut pool = SamplePool::new();
    let mut summary = Summary::default();

    let drums_bank = match &opts.drums {
        Some(path) => Some(SoundBank::load(path)?),
        None => None,
    };
    let drum_source = drums_bank.as_ref().unwrap_or(&bank);
    let drum_preset = drum_source.find_preset(128, 0).or_else(|| {
        let fallback = drum_source.find_preset(0, 128);
        if fallback.is_some() {
            log::warn!(
                "Using Bank 0 Preset 128 as drum kit; verify that key mappings \
                align with GM percussion (keys {DRUM_KEY_LO}-{DRUM_KEY_HI})"
            );
        }
        fallback
    });

    let budget = ProgramBudget {
        max_patches: match drum_preset {
            Some(_) => MAX_PATCHES - DRUM_PATCH_RESERVE,
            None => MAX_PATCHES,
        },
    };

    for prog_num in 0..MAX_PROGRAMS as u16 {
        if let Some(preset_idx) = bank.find_preset(0, prog_num) {
            let program =
                convert_preset(&bank, preset_idx, prog_num as i16, &mut out, &mut pool, &budget, &mut summary);
            out.programs.push(program);
        }
    }

    if let Some(preset_idx) = drum_preset {
        build_drumkit(drum_source, preset_idx, &mut out, &mut pool, &mut summary);
    }

    for replacement in &opts.patches {
        let other = SoundBank::load(&replacement.file)?;
        let Some(preset_idx) = other.find_preset(0, replacement.program as u16) else {
            log::warn!(
                "`{}` has no Bank 0 Preset {}, replacement skipped",
                replacement.file.display(),
                replacement.program
            );
            continue;
        };
        let budget = ProgramBudget {
            max_patches: MAX_PATCHES,
        };
        let program = convert_preset(
            &other,
            preset_idx,
            replacement.program as i16,
            &mut out,
            &mut pool,
            &budget,
            &mut summary,
        );
        match out
            .programs
            .iter_mut()
            .find(|p| p.number == replacement.program as i16)
        {
            Some(slot) => *slot = program,
            None => out.programs.push(program),
        }
    }

    if pool.rejected > 0 {
        log::warn!(
            "Source exceeded {} sample limit; {} sample(s) were discarded",
            crate::wfb::MAX_SAMPLES,
            pool.rejected
        );
    }

    out.samples = std::mem::take(&mut pool.entries);
    summary.programs = out.programs.len();
    summary.patches = out.patches.len();
    summary.samples = out.samples.len();
    summary.aliases = pool.aliases;
    summary.resampled = pool.resampled;
    summary.discarded_samples = pool.rejected;

    let memory = out.memory_required();
    let limit = opts.device.memory_limit();
    if memory > limit {
        log::warn!(
            "Total sample memory ({memory} bytes) exceeds the {} limit ({limit} bytes)",
            opts.device.name()
        );
    }

    out.write_file(output)?;

    log::info!(
        "Conversion complete: `{}` -> `{}`",
        input.display(),
        output.display()
    );
    log::info!(
        "  Programs: {}, Patches: {}, Samples: {}",
        summary.programs,
        summary.patches,
        summary.samples
    );
    if summary.aliases > 0 {
        log::info!("  Deduplicated: {} sample(s)", summary.aliases);
    }
    if summary.resampled > 0 {
        log::info!("  Resampled: {} sample(s)", summary.resampled);
    }
    if summary.dropped_zones + summary.dropped_groups > 0 {
        log::info!(
            "  Dropped: {} zone(s), {} layer group(s)",
            summary.dropped_zones,
            summary.dropped_groups
        );
    }
    Ok(summary)
}

/// Derive the output path from the input, mirroring the extension's case
/// pattern per character (`sf2` -> `wfb`, `SF2` -> `WFB`, `Sf2` -> `Wfb`).
pub fn output_filename(input: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(explicit) = explicit {
        return explicit.to_path_buf();
    }
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case("sf2") {
        let mut out = input.to_path_buf();
        out.set_extension("wfb");
        return out;
    }
    let mirrored: String = ext
        .chars()
        .zip("wfb".chars())
        .map(|(src, dst)| {
            if src.is_ascii_uppercase() {
                dst.to_ascii_uppercase()
            } else {
                dst
            }
        })
        .collect();
    input.with_extension(mirrored)
}
