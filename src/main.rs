use sf2wfb::convert::{self, Options, PatchReplacement};
use sf2wfb::wfb::{self, Bank, Device};
use sf2wfb::assess;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(clap::Parser)]
#[command(about = "SoundFont 2 to WaveFront Bank converter")]
struct Args {
    /// SF2 files to convert, or WFB files to verify/retarget (globs accepted)
    #[arg(required = true)]
    inputs: Vec<String>,
    /// Target device (Maui, Rio, Tropez, TropezPlus, TBS-2001)
    #[arg(short, long)]
    device: Option<String>,
    /// Use the given SF2 file for the drum kit
    #[arg(short = 'D', long)]
    drums: Option<PathBuf>,
    /// Replace program ID with the preset from FILE (format <file>:<id>)
    #[arg(short, long)]
    patch: Vec<String>,
    /// Output filename (single input only)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Show extra warnings and the detailed assessment
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    /// Skip the assessment prompt, always proceed
    #[arg(short, long, default_value_t = false)]
    yes: bool,
    /// Skip the viability assessment entirely
    #[arg(long, default_value_t = false)]
    no_assess: bool,
}

fn parse_patch_arg(arg: &str) -> Result<PatchReplacement, String> {
    let (file, id) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid patch format `{arg}` (expected file:id)"))?;
    let program: u8 = id
        .parse()
        .map_err(|_| format!("Invalid program ID `{id}` (must be 0-127)"))?;
    if program > 127 {
        return Err(format!("Program ID {program} out of range (must be 0-127)"));
    }
    Ok(PatchReplacement {
        file: PathBuf::from(file),
        program,
    })
}

#[derive(Default)]
struct Counters {
    converted: usize,
    failed: usize,
}

fn process_file(
    path: &Path,
    args: &Args,
    device: Option<Device>,
    opts: &Options,
    counters: &mut Counters,
) {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "sf2" => {
            if !args.no_assess {
                log::info!("Assessing conversion viability for: {}", path.display());
                let report = match assess::assess(path) {
                    Ok(report) => report,
                    Err(e) => {
                        log::error!("Assessment failed: {e}");
                        counters.failed += 1;
                        return;
                    }
                };
                if args.verbose {
                    assess::print_verbose(&report);
                } else {
                    assess::print_summary(&report);
                }
                if !args.yes && !assess::prompt_proceed(&report) {
                    log::info!("Conversion cancelled.");
                    return;
                }
            }

            let output = convert::output_filename(path, opts.output.as_deref());
            log::info!("Converting: {} -> {}", path.display(), output.display());
            match convert::convert_file(path, &output, opts) {
                Ok(_) => counters.converted += 1,
                Err(e) => {
                    log::error!("Failed to convert `{}`: {e}", path.display());
                    counters.failed += 1;
                }
            }
        }
        "wfb" => {
            let result = match device {
                Some(device) => wfb::retarget(path, device),
                None => Bank::read_file(path).map(|bank| bank.print_info()),
            };
            match result {
                Ok(()) => counters.converted += 1,
                Err(e) => {
                    log::error!("Failed to read `{}`: {e}", path.display());
                    counters.failed += 1;
                }
            }
        }
        _ => {
            log::error!(
                "Unknown file type `{}` (expected .sf2 or .wfb)",
                path.display()
            );
            counters.failed += 1;
        }
    }
}

fn main() -> ExitCode {
    let args: Args = clap::Parser::parse();

    let level = match args.verbose {
        true => log::LevelFilter::Debug,
        false => log::LevelFilter::Info,
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .target(pretty_env_logger::env_logger::Target::Stdout)
        .init();

    let device = match &args.device {
        Some(name) => match Device::parse(name) {
            Some(device) => Some(device),
            None => {
                log::error!(
                    "Invalid device name `{name}`; valid devices: Maui, Rio, Tropez, \
                    TropezPlus, TBS-2001"
                );
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let mut patches = Vec::new();
    for arg in &args.patch {
        match parse_patch_arg(arg) {
            Ok(replacement) => patches.push(replacement),
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    // expand glob patterns, falling back to literal paths
    let mut files = Vec::new();
    for pattern in &args.inputs {
        let mut matched = false;
        if let Ok(paths) = glob::glob(pattern) {
            for path in paths.flatten() {
                files.push(path);
                matched = true;
            }
        }
        if !matched {
            files.push(PathBuf::from(pattern));
        }
    }

    if args.output.is_some() && files.len() > 1 {
        log::error!("-o/--output can only be used with a single input file");
        return ExitCode::FAILURE;
    }

    let opts = Options {
        device: device.unwrap_or(Device::Maui),
        drums: args.drums.clone(),
        output: args.output.clone(),
        patches,
    };

    let mut counters = Counters::default();
    for file in &files {
        process_file(file, &args, device, &opts, &mut counters);
    }

    if files.len() > 1 || counters.failed > 0 {
        log::info!(
            "Processed: {} file(s), converted: {}, failed: {}",
            counters.converted + counters.failed,
            counters.converted,
            counters.failed
        );
    }

    match counters.failed {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
