mod common;

use common::*;
use sf2wfb::assess;
use sf2wfb::convert::{convert_file, Options, Summary};
use sf2wfb::wfb::{Bank, Device, SampleBody, CH_LEFT, CH_RIGHT};
use std::fs;
use std::path::Path;

fn convert(builder: &Sf2Builder, opts: &Options) -> (Bank, Vec<u8>, Summary) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.sf2");
    let output = dir.path().join("out.wfb");
    fs::write(&input, builder.build()).unwrap();
    let summary = convert_file(&input, &output, opts).unwrap();
    let bank = Bank::read_file(&output).unwrap();
    let raw = fs::read(&output).unwrap();
    (bank, raw, summary)
}

#[test]
fn minimal_bank_roundtrips() {
    let pcm: Vec<i16> = (0..100).collect();
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample("sine", pcm.clone(), 22050);
    builder.add_simple_preset("Piano", 0, 0, sample);

    let (bank, raw, summary) = convert(&builder, &Options::default());
    assert_eq!(summary.programs, 1);
    assert_eq!(summary.patches, 1);
    assert_eq!(summary.samples, 1);

    assert_eq!(bank.programs.len(), 1);
    assert_eq!(bank.patches.len(), 1);
    assert_eq!(bank.samples.len(), 1);
    assert_eq!(bank.synth_name.display(), "Maui");
    assert_eq!(bank.programs[0].name.display(), "Piano");
    assert_eq!(bank.memory_required(), 200);

    // dwMemoryRequired on disk matches the embedded PCM byte count
    assert_eq!(&raw[96..100], &200u32.to_le_bytes());

    let layer = &bank.programs[0].layers[0];
    assert!(layer.unmute);
    assert_eq!(layer.patch_number, 0);
    assert!(!bank.programs[0].layers[1].unmute);

    match &bank.samples[0].body {
        SampleBody::Sample { pcm: stored, .. } => assert_eq!(*stored, pcm),
        other => panic!("expected sample, got {other:?}"),
    }
    assert_eq!(bank.samples[0].rate, 22050);
}

#[test]
fn freq_bias_is_byte_swapped_on_disk() {
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample_full(SampleDef {
        name: "tuned".into(),
        pcm: vec![0i16; 64],
        rate: 22050,
        loop_start: 0,
        loop_end: 0,
        pitch_correction: 10,
        sample_type: MONO_SAMPLE,
        link: 0,
    });
    let instrument = builder.add_instrument(
        "tuned",
        vec![Zone::new()
            .gen(GEN_COARSE_TUNE, 2)
            .gen(GEN_FINE_TUNE, 50)
            .sample(sample)],
    );
    builder.add_preset("Tuned", 0, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, raw, _) = convert(&builder, &Options::default());
    assert_eq!(bank.patches[0].patch.freq_bias, 250);

    // one program: patches start right after the 50-byte program record, and
    // the patch leads with its Motorola-order frequency bias (250 = 0x00FA)
    let patch_offset = 256 + 50;
    assert_eq!(&raw[patch_offset..patch_offset + 2], &[0x00, 0xfa]);

    // the sample's own bias gets the same treatment
    match &bank.samples[0].body {
        SampleBody::Sample { data, .. } => assert_eq!(data.freq_bias, 10),
        other => panic!("expected sample, got {other:?}"),
    }
    let sample_body = 256 + 50 + 100 + 118;
    assert_eq!(&raw[sample_body + 16..sample_body + 18], &[0x00, 0x0a]);
}

#[test]
fn shared_pcm_dedupes_to_aliases() {
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample("shared", (0..200).collect(), 22050);
    builder.add_simple_preset("A", 0, 0, sample);
    builder.add_simple_preset("B", 0, 1, sample);
    builder.add_simple_preset("C", 0, 2, sample);

    let (bank, _, summary) = convert(&builder, &Options::default());
    assert_eq!(summary.aliases, 2);
    assert_eq!(bank.samples.len(), 3);
    assert!(matches!(bank.samples[0].body, SampleBody::Sample { .. }));
    for entry in &bank.samples[1..] {
        match &entry.body {
            SampleBody::Alias { original, .. } => assert_eq!(*original, 0),
            other => panic!("expected alias, got {other:?}"),
        }
    }
}

#[test]
fn layer_cap_drops_extra_groups() {
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample("wave", (0..50).collect(), 22050);
    // seven zones kept apart by pan so grouping cannot merge them
    let pans = [-500i16, -360, -215, -70, 70, 215, 500];
    let zones = pans
        .iter()
        .map(|pan| Zone::new().gen(GEN_PAN, *pan).sample(sample))
        .collect();
    let instrument = builder.add_instrument("wide", zones);
    builder.add_preset("Wide", 0, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, _, summary) = convert(&builder, &Options::default());
    assert_eq!(summary.dropped_groups, 3);
    let placed = bank.programs[0].layers.iter().filter(|l| l.unmute).count();
    assert_eq!(placed, 4);
    assert_eq!(
        bank.programs[0]
            .layers
            .iter()
            .map(|l| l.pan)
            .collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
}

#[test]
fn stereo_pair_fills_two_layers() {
    let pcm: Vec<i16> = (0..300).map(|i| (i * 7 % 101) as i16).collect();
    let mut builder = Sf2Builder::new();
    let left = builder.add_sample_full(SampleDef {
        name: "piano_L".into(),
        pcm: pcm.clone(),
        rate: 22050,
        loop_start: 0,
        loop_end: 0,
        pitch_correction: 0,
        sample_type: LEFT_SAMPLE,
        link: 1,
    });
    let right = builder.add_sample_full(SampleDef {
        name: "piano_R".into(),
        pcm: pcm.iter().map(|s| -s).collect(),
        rate: 22050,
        loop_start: 0,
        loop_end: 0,
        pitch_correction: 0,
        sample_type: RIGHT_SAMPLE,
        link: 0,
    });
    let instrument = builder.add_instrument(
        "piano",
        vec![Zone::new().sample(left), Zone::new().sample(right)],
    );
    builder.add_preset("Piano", 0, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, _, _) = convert(&builder, &Options::default());
    assert_eq!(bank.samples.len(), 2);
    assert_eq!(bank.samples[0].channel, CH_LEFT);
    assert_eq!(bank.samples[1].channel, CH_RIGHT);

    let layers = &bank.programs[0].layers;
    assert!(layers[0].unmute && layers[1].unmute);
    assert_eq!(layers[0].pan, 0);
    assert_eq!(layers[1].pan, 7);
    assert!(!layers[2].unmute);
    assert_eq!(bank.patches.len(), 2);
    assert_ne!(
        bank.patches[layers[0].patch_number as usize].patch.sample_number,
        bank.patches[layers[1].patch_number as usize].patch.sample_number
    );
}

#[test]
fn sample_overflow_grades_f() {
    let mut builder = Sf2Builder::new();
    // 128 melodic presets at the full 4-layer budget plus an 88-zone drum
    // bank pushes the referenced set to 600 samples
    for program in 0..128u16 {
        let zones = (0..4)
            .map(|i| {
                let sample = builder.add_sample(
                    &format!("m{program}_{i}"),
                    vec![(program as i16) << 2 | i as i16; 8],
                    22050,
                );
                Zone::new().sample(sample)
            })
            .collect();
        let instrument = builder.add_instrument(&format!("inst{program}"), zones);
        builder.add_preset(
            &format!("prog{program}"),
            0,
            program,
            vec![Zone::new().instrument(instrument)],
        );
    }
    let drum_zones = (0..88)
        .map(|i| {
            let sample = builder.add_sample(&format!("d{i}"), vec![i as i16; 8], 22050);
            Zone::new().sample(sample)
        })
        .collect();
    let drums = builder.add_instrument("drums", drum_zones);
    builder.add_preset("Standard Kit", 128, 0, vec![Zone::new().instrument(drums)]);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("huge.sf2");
    fs::write(&input, builder.build()).unwrap();

    let report = assess::assess(&input).unwrap();
    assert_eq!(report.samples_after_truncation, 600);
    assert_eq!(report.grade, 'F');
    assert!(report
        .suggestions
        .iter()
        .any(|s| s.starts_with("CRITICAL: Exceeds 512 sample limit")));
}

#[test]
fn drumkit_maps_exclusive_class_to_mute_group() {
    let mut builder = Sf2Builder::new();
    let snare = builder.add_sample("snare", (0..80).collect(), 22050);
    let instrument = builder.add_instrument(
        "kit",
        vec![Zone::new()
            .range(GEN_KEY_RANGE, 38, 38)
            .gen(GEN_EXCLUSIVE_CLASS, 3)
            .sample(snare)],
    );
    builder.add_preset("Standard", 128, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, _, _) = convert(&builder, &Options::default());
    let kit = bank.drumkit.as_ref().expect("drumkit present");
    let drum = &kit.drums[38];
    assert!(drum.unmute);
    assert_eq!(drum.group, 3);
    assert!(!kit.drums[39].unmute);

    let patch = &bank.patches[drum.patch_number as usize];
    assert_eq!(patch.name.display(), "Drum_38");
    assert!(patch.patch.reuse);
}

#[test]
fn bank0_program_128_is_drum_fallback() {
    let mut builder = Sf2Builder::new();
    let kick = builder.add_sample("kick", (0..40).collect(), 22050);
    let instrument = builder.add_instrument(
        "kit",
        vec![Zone::new().range(GEN_KEY_RANGE, 36, 36).sample(kick)],
    );
    builder.add_preset("Fallback Kit", 0, 128, vec![Zone::new().instrument(instrument)]);

    let (bank, _, _) = convert(&builder, &Options::default());
    let kit = bank.drumkit.as_ref().expect("fallback drumkit present");
    assert!(kit.drums[36].unmute);
}

#[test]
fn velocity_layers_become_velocity_splits() {
    let mut builder = Sf2Builder::new();
    let soft = builder.add_sample("soft", (0..60).collect(), 22050);
    let hard = builder.add_sample("hard", (0..60).rev().collect(), 22050);
    let instrument = builder.add_instrument(
        "velo",
        vec![
            Zone::new().range(GEN_VEL_RANGE, 0, 63).sample(soft),
            Zone::new().range(GEN_VEL_RANGE, 64, 127).sample(hard),
        ],
    );
    builder.add_preset("Velo", 0, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, _, _) = convert(&builder, &Options::default());
    let layers = &bank.programs[0].layers;
    assert!(layers[0].unmute && layers[1].unmute);
    assert_eq!(layers[0].split_type, 1);
    assert_eq!((layers[0].split_dir, layers[0].split_point), (1, 63));
    assert_eq!((layers[1].split_dir, layers[1].split_point), (0, 64));
}

#[test]
fn retarget_rewrites_synth_name() {
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample("tone", (0..30).collect(), 22050);
    builder.add_simple_preset("Tone", 0, 0, sample);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.sf2");
    let output = dir.path().join("out.wfb");
    fs::write(&input, builder.build()).unwrap();
    convert_file(&input, &output, &Options::default()).unwrap();

    sf2wfb::wfb::retarget(&output, Device::Rio).unwrap();
    let bank = Bank::read_file(&output).unwrap();
    assert_eq!(bank.synth_name.display(), "Rio");
    assert_eq!(bank.samples.len(), 1);
}

#[test]
fn resampled_input_lands_at_44100() {
    let mut builder = Sf2Builder::new();
    let sample = builder.add_sample("hires", vec![0i16; 960], 48000);
    builder.add_simple_preset("HiRes", 0, 0, sample);

    let (bank, _, summary) = convert(&builder, &Options::default());
    assert_eq!(summary.resampled, 1);
    assert_eq!(bank.samples[0].rate, 44100);
}

#[test]
fn multi_key_zones_spill_into_multisample() {
    let mut builder = Sf2Builder::new();
    let low = builder.add_sample("low", (0..70).collect(), 22050);
    let high = builder.add_sample("high", (0..90).collect(), 22050);
    let instrument = builder.add_instrument(
        "split",
        vec![
            Zone::new().range(GEN_KEY_RANGE, 0, 63).sample(low),
            Zone::new().range(GEN_KEY_RANGE, 64, 127).sample(high),
        ],
    );
    builder.add_preset("Split", 0, 0, vec![Zone::new().instrument(instrument)]);

    let (bank, _, _) = convert(&builder, &Options::default());
    // both zones synthesize identically so they coalesce into one layer
    // backed by a key-indexed multisample
    let placed = bank.programs[0].layers.iter().filter(|l| l.unmute).count();
    assert_eq!(placed, 1);
    assert_eq!(bank.samples.len(), 3);
    let patch = &bank.patches[0].patch;
    match &bank.samples[patch.sample_number as usize].body {
        SampleBody::Multisample { keys } => {
            assert_eq!(keys[0], 0);
            assert_eq!(keys[63], 0);
            assert_eq!(keys[64], 1);
            assert_eq!(keys[127], 1);
        }
        other => panic!("expected multisample, got {other:?}"),
    }
}

#[test]
fn unknown_extension_output_falls_back() {
    assert_eq!(
        sf2wfb::convert::output_filename(Path::new("dir/bank.SF2"), None),
        Path::new("dir/bank.WFB")
    );
}
