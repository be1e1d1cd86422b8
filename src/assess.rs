use crate::sf2::{find_gen, Gen, SoundBank, LEFT_SAMPLE};
use crate::wfb::{MAX_SAMPLES, NUM_LAYERS, PATCH_SIZE, SAMPLE_BODY_SIZE};
use std::{
    io::{self, Write},
    path::Path,
};

const MAX_TOP_TRUNCATED: usize = 10;

#[derive(Clone, Debug)]
pub struct Truncation {
    pub program: u16,
    pub name: String,
    pub layers_before: usize,
    pub layers_after: usize,
}

impl Truncation {
    #[inline]
    pub fn layers_lost(&self) -> usize {
        self.layers_before - self.layers_after
    }
}

/// Dry-run prediction of what conversion will truncate or discard.
#[derive(Clone, Debug)]
pub struct Report {
    pub filename: String,
    pub sf2_size_bytes: u64,

    pub total_presets: usize,
    pub bank0_presets: usize,
    pub bank128_presets: usize,
    pub other_bank_presets: usize,

    pub total_samples: usize,
    pub samples_referenced: usize,
    pub samples_after_truncation: usize,
    pub samples_unused: usize,

    pub total_programs: usize,
    pub programs_with_truncation: usize,
    pub avg_layers_before: f32,
    pub avg_layers_after: f32,
    pub top_truncated: Vec<Truncation>,

    pub programs_using_filter_q: usize,
    pub stereo_pairs: usize,

    pub estimated_size: u64,
    pub size_reduction_pct: f32,

    pub grade: char,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            filename: String::new(),
            sf2_size_bytes: 0,
            total_presets: 0,
            bank0_presets: 0,
            bank128_presets: 0,
            other_bank_presets: 0,
            total_samples: 0,
            samples_referenced: 0,
            samples_after_truncation: 0,
            samples_unused: 0,
            total_programs: 0,
            programs_with_truncation: 0,
            avg_layers_before: 0.0,
            avg_layers_after: 0.0,
            top_truncated: Vec::new(),
            programs_using_filter_q: 0,
            stereo_pairs: 0,
            estimated_size: 0,
            size_reduction_pct: 0.0,
            grade: 'F',
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

fn analyze_presets(bank: &SoundBank, report: &mut Report) {
    for preset in &bank.presets[..bank.preset_count()] {
        report.total_presets += 1;
        if preset.bank == 0 && preset.preset < 128 {
            report.bank0_presets += 1;
        } else if preset.bank == 128 {
            report.bank128_presets += 1;
        } else {
            report.other_bank_presets += 1;
        }
    }
}

/// Zones of one preset in bag order: (instrument, sample) pairs.
fn preset_zone_samples(bank: &SoundBank, preset_idx: usize) -> Vec<u16> {
    let mut samples = Vec::new();
    for bag in bank.preset_bag_range(preset_idx) {
        let Some(instrument) = find_gen(bank.preset_gens(bag), Gen::INSTRUMENT) else {
            continue;
        };
        let instrument = instrument.amount as usize;
        if instrument >= bank.instrument_count() {
            continue;
        }
        for ibag in bank.instrument_bag_range(instrument) {
            if let Some(sample) = find_gen(bank.instrument_gens(ibag), Gen::SAMPLE_ID) {
                if (sample.amount as usize) < bank.sample_count() {
                    samples.push(sample.amount);
                }
            }
        }
    }
    samples
}

fn trace_sample_references(bank: &SoundBank, report: &mut Report, used: &mut [bool]) {
    for bank_num in [0u16, 128] {
        let preset_limit = if bank_num == 0 { 128 } else { 1 };
        for preset_num in 0..preset_limit {
            let Some(preset_idx) = bank.find_preset(bank_num, preset_num) else {
                continue;
            };
            for sample in preset_zone_samples(bank, preset_idx) {
                used[sample as usize] = true;
            }
        }
    }
    report.samples_referenced = used.iter().filter(|u| **u).count();
    report.samples_unused = bank.sample_count() - report.samples_referenced;
}

/// Treat every instrument zone as a prospective layer; anything past the 4th
/// is lost along with the samples only it referenced.
fn simulate_layer_truncation(bank: &SoundBank, report: &mut Report, kept: &mut [bool]) {
    let mut total_before = 0usize;
    let mut total_after = 0usize;

    for prog_num in 0..128u16 {
        let Some(preset_idx) = bank.find_preset(0, prog_num) else {
            continue;
        };
        report.total_programs += 1;

        let samples = preset_zone_samples(bank, preset_idx);
        let before = samples.len();
        let after = before.min(NUM_LAYERS);
        total_before += before;
        total_after += after;
        for sample in samples.iter().take(NUM_LAYERS) {
            kept[*sample as usize] = true;
        }

        if before > NUM_LAYERS {
            report.programs_with_truncation += 1;
            report.top_truncated.push(Truncation {
                program: prog_num,
                name: bank.presets[preset_idx].name.display().into_owned(),
                layers_before: before,
                layers_after: after,
            });
        }
    }

    // drum zones are keyed per-note, not layered, so bank 128 keeps all of
    // its samples
    if let Some(preset_idx) = bank
        .find_preset(128, 0)
        .or_else(|| bank.find_preset(0, 128))
    {
        for sample in preset_zone_samples(bank, preset_idx) {
            kept[sample as usize] = true;
        }
    }

    report.top_truncated.sort_by_key(|t| std::cmp::Reverse(t.layers_lost()));
    report.top_truncated.truncate(MAX_TOP_TRUNCATED);

    if report.total_programs > 0 {
        report.avg_layers_before = total_before as f32 / report.total_programs as f32;
        report.avg_layers_after = total_after as f32 / report.total_programs as f32;
    }
    report.samples_after_truncation = kept.iter().filter(|k| **k).count();
}

fn detect_filter_q_usage(bank: &SoundBank, report: &mut Report) {
    for prog_num in 0..128u16 {
        let Some(preset_idx) = bank.find_preset(0, prog_num) else {
            continue;
        };
        let mut uses_q = false;
        for bag in bank.preset_bag_range(preset_idx) {
            let gens = bank.preset_gens(bag);
            if find_gen(gens, Gen::INITIAL_FILTER_Q).map_or(false, |g| g.signed() > 0) {
                uses_q = true;
            }
            let Some(instrument) = find_gen(gens, Gen::INSTRUMENT) else {
                continue;
            };
            let instrument = instrument.amount as usize;
            if instrument >= bank.instrument_count() {
                continue;
            }
            for ibag in bank.instrument_bag_range(instrument) {
                if find_gen(bank.instrument_gens(ibag), Gen::INITIAL_FILTER_Q)
                    .map_or(false, |g| g.signed() > 0)
                {
                    uses_q = true;
                }
            }
        }
        if uses_q {
            report.programs_using_filter_q += 1;
        }
    }
}

fn count_stereo_pairs(bank: &SoundBank, report: &mut Report) {
    for index in 0..bank.sample_count() {
        if bank.samples[index].sample_type == LEFT_SAMPLE
            && crate::pool::stereo_partner(bank, index).is_some()
        {
            report.stereo_pairs += 1;
        }
    }
}

fn estimate_sizes(bank: &SoundBank, report: &mut Report, kept: &[bool]) {
    let pcm: u64 = kept
        .iter()
        .enumerate()
        .filter(|(_, k)| **k)
        .map(|(i, _)| bank.samples[i].len() as u64 * 2)
        .sum();
    report.estimated_size = 256
        + 256 * PATCH_SIZE as u64
        + report.samples_after_truncation as u64 * SAMPLE_BODY_SIZE as u64
        + pcm;
    if report.sf2_size_bytes > 0 {
        report.size_reduction_pct =
            100.0 * (1.0 - report.estimated_size as f32 / report.sf2_size_bytes as f32);
    }
}

fn calculate_grade(report: &Report) -> char {
    if report.samples_after_truncation > MAX_SAMPLES {
        return 'F';
    }
    if report.bank0_presets < 32 {
        return 'F';
    }

    let mut score = 0i32;

    // preset coverage, 30 points
    let preset_pct = 100.0 * report.bank0_presets as f32 / 128.0;
    score += (preset_pct * 0.3) as i32;

    // sample-budget headroom, 25 points
    let sample_pct =
        100.0 * (MAX_SAMPLES as f32 - report.samples_after_truncation as f32) / MAX_SAMPLES as f32;
    score += (sample_pct * 0.25) as i32;

    // layer retention, 30 points
    let layer_pct = if report.avg_layers_before > 0.0 {
        report.avg_layers_after / report.avg_layers_before * 100.0
    } else {
        100.0
    };
    score += (layer_pct * 0.3) as i32;

    // feature compatibility, 15 points
    score += (15 - report.programs_using_filter_q as i32 / 10).max(0);

    match score {
        90.. => 'A',
        75..=89 => 'B',
        60..=74 => 'C',
        40..=59 => 'D',
        _ => 'F',
    }
}

fn generate_suggestions(report: &mut Report) {
    if report.samples_after_truncation > MAX_SAMPLES {
        let overflow = report.samples_after_truncation - MAX_SAMPLES;
        report.suggestions.push(format!(
            "CRITICAL: Exceeds {MAX_SAMPLES} sample limit by {overflow} samples"
        ));
        report
            .suggestions
            .push("Use a smaller GM bank or drop programs to fit".into());
        let programs_to_drop = overflow / 3 + 1;
        if programs_to_drop < report.total_programs {
            report.suggestions.push(format!(
                "Estimate: Drop ~{programs_to_drop} programs to fit within limit"
            ));
        }
    }

    if report.programs_with_truncation > 10 {
        report.suggestions.push(format!(
            "{} programs will lose velocity layers (>{NUM_LAYERS} layer limit)",
            report.programs_with_truncation
        ));
        if let Some(worst) = report.top_truncated.first() {
            report.suggestions.push(format!(
                "Most affected: {} (loses {}/{} layers)",
                worst.name,
                worst.layers_lost(),
                worst.layers_before
            ));
        }
        report
            .suggestions
            .push("Pre-edit SF2 to merge layers, or accept reduced expression".into());
    }

    if report.programs_using_filter_q > 20 {
        report.suggestions.push(format!(
            "{} programs use filter resonance (unsupported on WaveFront)",
            report.programs_using_filter_q
        ));
        report
            .suggestions
            .push("Timbral character may change without resonance control".into());
    }

    match report.grade {
        'A' => {
            report.suggestions.push("Excellent conversion candidate!".into());
            report
                .suggestions
                .push("High fidelity expected with minimal quality loss".into());
        }
        'B' => report
            .suggestions
            .push("Good conversion candidate with minor compromises".into()),
        'C' | 'D' => {
            report
                .suggestions
                .push("Conversion possible but quality will be reduced".into());
            report
                .suggestions
                .push("Test critical programs on hardware before deployment".into());
        }
        _ => {}
    }

    if report.estimated_size > 8 * 1024 * 1024 {
        report
            .suggestions
            .push("WARNING: Exceeds 8MB limit (largest WaveFront card)".into());
    } else if report.estimated_size > 4 * 1024 * 1024 {
        report
            .suggestions
            .push("Requires 8MB WaveFront card (Tropez/Maui)".into());
        report.suggestions.push("Will NOT fit on 4MB cards (Rio)".into());
    } else if report.estimated_size > 3 * 1024 * 1024 {
        report
            .suggestions
            .push("Will fit on 4MB card but with little headroom".into());
    }
}

fn generate_warnings(report: &mut Report) {
    if report.samples_after_truncation > MAX_SAMPLES {
        report.warnings.push(format!(
            "Exceeds {MAX_SAMPLES} sample limit by {} samples",
            report.samples_after_truncation - MAX_SAMPLES
        ));
    }
    if report.programs_with_truncation > 5 {
        report.warnings.push(format!(
            "{} programs will have layers truncated ({NUM_LAYERS}-layer limit)",
            report.programs_with_truncation
        ));
    }
    if let Some(worst) = report.top_truncated.first() {
        report.warnings.push(format!(
            "{} loses {}/{} layers ({}% reduction)",
            worst.name,
            worst.layers_lost(),
            worst.layers_before,
            worst.layers_lost() * 100 / worst.layers_before
        ));
    }
    if report.programs_using_filter_q > 10 {
        report.warnings.push(format!(
            "{} programs use filter Q (will be ignored)",
            report.programs_using_filter_q
        ));
    }
    if report.other_bank_presets > 0 {
        report.warnings.push(format!(
            "{} presets in other banks will be skipped",
            report.other_bank_presets
        ));
    }
}

/// Assess an already-parsed bank. Exposed for synthetic inputs.
pub fn assess_bank(bank: &SoundBank, filename: &str, sf2_size_bytes: u64) -> Report {
    let mut report = Report {
        filename: filename.into(),
        sf2_size_bytes,
        total_samples: bank.sample_count(),
        grade: 'F',
        ..Default::default()
    };

    let mut used = vec![false; bank.sample_count()];
    let mut kept = vec![false; bank.sample_count()];

    analyze_presets(bank, &mut report);
    trace_sample_references(bank, &mut report, &mut used);
    simulate_layer_truncation(bank, &mut report, &mut kept);
    detect_filter_q_usage(bank, &mut report);
    count_stereo_pairs(bank, &mut report);
    estimate_sizes(bank, &mut report, &kept);

    report.grade = calculate_grade(&report);
    generate_suggestions(&mut report);
    generate_warnings(&mut report);
    report
}

pub fn assess(path: impl AsRef<Path>) -> io::Result<Report> {
    let path = path.as_ref();
    let bank = SoundBank::load(path)?;
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(assess_bank(&bank, &filename, size))
}

fn grade_description(grade: char) -> &'static str {
    match grade {
        'A' => "Excellent - minimal loss",
        'B' => "Good with minor compromises",
        'C' => "Acceptable with quality loss",
        'D' => "Poor - significant quality loss",
        _ => "Not recommended",
    }
}

pub fn print_summary(report: &Report) {
    log::info!("SF2 Conversion Assessment: {}", report.filename);
    log::info!(
        "  Overall Grade:    {}  ({})",
        report.grade,
        grade_description(report.grade)
    );
    log::info!(
        "  Bank 0 Presets:   {: <3} / 128  ({}%)",
        report.bank0_presets,
        report.bank0_presets * 100 / 128
    );
    log::info!("  Bank 128 Presets: {: <3} / 1", report.bank128_presets);
    if report.other_bank_presets > 0 {
        log::info!(
            "  Unused Presets:   {} from other banks",
            report.other_bank_presets
        );
    }
    log::info!(
        "  Sample Budget:    {: <3} / {MAX_SAMPLES}  ({}%)",
        report.samples_after_truncation,
        report.samples_after_truncation * 100 / MAX_SAMPLES
    );
    if report.programs_with_truncation > 0 {
        log::info!(
            "  Layer Truncation: {} programs affected ({:.1} -> {:.1} layers avg)",
            report.programs_with_truncation,
            report.avg_layers_before,
            report.avg_layers_after
        );
    }
    log::info!(
        "  Estimated Size:   {:.1} MB ({:.0}% smaller)",
        report.estimated_size as f64 / (1024.0 * 1024.0),
        report.size_reduction_pct
    );

    for warning in &report.warnings {
        log::warn!("{warning}");
    }
    for suggestion in &report.suggestions {
        log::info!("  * {suggestion}");
    }
}

pub fn print_verbose(report: &Report) {
    print_summary(report);

    if !report.top_truncated.is_empty() {
        log::info!("Programs losing most layers:");
        for t in &report.top_truncated {
            log::info!(
                "  {: <3} {: <20} {: >2} -> {}  (-{})",
                t.program,
                t.name,
                t.layers_before,
                t.layers_after,
                t.layers_lost()
            );
        }
        log::info!(
            "Programs unaffected: {} (already <={NUM_LAYERS} layers)",
            report.total_programs - report.programs_with_truncation
        );
    }

    if report.programs_using_filter_q > 0 {
        log::info!(
            "Filter Q: {} programs use resonance, the ICS2115 has none",
            report.programs_using_filter_q
        );
    } else {
        log::info!("Filter Q: not used");
    }
    if report.stereo_pairs > 0 {
        log::info!("Stereo pairs: {}", report.stereo_pairs);
    }

    log::info!("Samples in SF2: {}", report.total_samples);
    if report.total_samples > 0 {
        log::info!(
            "  Referenced by Bank 0/128: {} ({}%)",
            report.samples_referenced,
            report.samples_referenced * 100 / report.total_samples
        );
        log::info!(
            "  Unused/orphaned:          {} ({}%)",
            report.samples_unused,
            report.samples_unused * 100 / report.total_samples
        );
    }
    log::info!(
        "  After {NUM_LAYERS}-layer truncation: {} of {MAX_SAMPLES}",
        report.samples_after_truncation
    );
}

/// Ask before converting a bank with warnings; plain Enter means yes.
pub fn prompt_proceed(report: &Report) -> bool {
    if report.warnings.is_empty() {
        return true;
    }
    print!("Proceed with conversion? [Y/n]: ");
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return false;
    }
    !response.trim_start().starts_with(['n', 'N'])
}
