use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stamp_colors::calibration::{
    analyze_deviation, measure_reference_colors, per_color_calibration, validate_calibration,
    weighted_calibration, CalibrationFile, WizardData,
};
use stamp_colors::color::delta_e_cie76;
use stamp_colors::constants::calibration::METHOD_DEVIATION;
use stamp_colors::correction::{correct_batch, CalibrationContext, CorrectionStrategy};
use stamp_colors::sampling::{load_image, sample_corrected, Anchor, SampleRegion, SampleShape};
use stamp_colors::{logger, AnalysisConfig, ColorError, ReferenceLibrary, Result, RgbColor};

#[derive(Parser)]
#[command(name = "stamp-colors")]
#[command(version, about = "Calibrated color measurement for stamp images", long_about = None)]
struct Cli {
    /// Analysis configuration file (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert RGB to CIELab
    Lab {
        /// Color as R,G,B
        #[arg(value_name = "R,G,B", value_parser = parse_rgb)]
        rgb: RgbColor,
    },

    /// Color difference between two RGB colors
    DeltaE {
        #[arg(value_name = "R,G,B", value_parser = parse_rgb)]
        first: RgbColor,

        #[arg(value_name = "R,G,B", value_parser = parse_rgb)]
        second: RgbColor,
    },

    /// Correct raw RGB samples for capture bias
    Correct {
        #[arg(value_name = "R,G,B", value_parser = parse_rgb, required = true)]
        samples: Vec<RgbColor>,

        /// universal, dynamic or per_color_dominant
        #[arg(short, long, default_value = "dynamic")]
        strategy: CorrectionStrategy,

        #[command(flatten)]
        calibration: CalibrationSource,
    },

    /// Fit a calibration from measured reference colors
    Calibrate {
        /// JSON object mapping color names to measured [r, g, b]
        #[arg(value_name = "MEASURED")]
        measured: PathBuf,

        /// Reference library (JSON); defaults to the basic six colors
        #[arg(short, long, value_name = "FILE")]
        library: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "weighted")]
        method: FitMethod,

        /// Image the measurements were taken from, recorded with the calibration
        #[arg(long, value_name = "FILE")]
        reference_image: Option<PathBuf>,

        /// Where to save the calibration
        #[arg(short, long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// Average samples with outlier rejection
    Average {
        #[arg(value_name = "R,G,B", value_parser = parse_rgb, required = true)]
        samples: Vec<RgbColor>,

        /// ΔE00 outlier threshold (overrides configuration)
        #[arg(short, long, value_name = "DELTA_E")]
        threshold: Option<f64>,
    },

    /// Sample regions of an image, correct and average them
    Sample {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Region as X,Y,W,H in Cartesian coordinates (origin bottom-left)
        #[arg(short, long, value_name = "X,Y,W,H", value_parser = parse_region, required = true)]
        region: Vec<[f64; 4]>,

        #[arg(long, value_enum, default_value = "circle")]
        shape: ShapeArg,

        #[arg(long, value_enum, default_value = "center")]
        anchor: AnchorArg,

        #[arg(short, long, default_value = "dynamic")]
        strategy: CorrectionStrategy,

        #[command(flatten)]
        calibration: CalibrationSource,
    },

    /// Find the closest library colors
    Match {
        #[arg(value_name = "R,G,B", value_parser = parse_rgb)]
        rgb: RgbColor,

        /// Reference library (JSON); defaults to the basic six colors
        #[arg(short, long, value_name = "FILE")]
        library: Option<PathBuf>,

        #[arg(long, value_name = "DELTA_E")]
        max_delta_e: Option<f64>,

        #[arg(long, value_name = "N")]
        max_results: Option<usize>,
    },
}

#[derive(clap::Args)]
struct CalibrationSource {
    /// Calibration file; otherwise the configured names are searched in --calibration-dir
    #[arg(long, value_name = "FILE")]
    calibration: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = ".")]
    calibration_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum FitMethod {
    /// Plain average deviation against same-named references
    Deviation,
    /// Category-weighted universal correction
    Weighted,
    /// Weighted correction plus per-dominant-channel corrections
    PerColor,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeArg {
    Rectangle,
    Circle,
}

#[derive(Clone, Copy, ValueEnum)]
enum AnchorArg {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Lab { rgb } => cmd_lab(&config, rgb),
        Commands::DeltaE { first, second } => cmd_delta_e(&config, first, second),
        Commands::Correct {
            samples,
            strategy,
            calibration,
        } => cmd_correct(&config, &samples, strategy, &calibration),
        Commands::Calibrate {
            measured,
            library,
            method,
            reference_image,
            save,
        } => cmd_calibrate(&config, &measured, library.as_deref(), method, reference_image, save.as_deref()),
        Commands::Average { samples, threshold } => cmd_average(&config, &samples, threshold),
        Commands::Sample {
            image,
            region,
            shape,
            anchor,
            strategy,
            calibration,
        } => cmd_sample(&config, &image, &region, shape, anchor, strategy, &calibration),
        Commands::Match {
            rgb,
            library,
            max_delta_e,
            max_results,
        } => cmd_match(&config, rgb, library.as_deref(), max_delta_e, max_results),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_json_file(path),
        None => Ok(AnalysisConfig::default()),
    }
}

fn load_library(path: Option<&Path>) -> Result<ReferenceLibrary> {
    match path {
        Some(path) => ReferenceLibrary::from_json_file(path),
        None => Ok(ReferenceLibrary::basic()),
    }
}

fn load_context(config: &AnalysisConfig, source: &CalibrationSource) -> CalibrationContext {
    let profile = config.correction.clone();
    match &source.calibration {
        Some(path) => CalibrationContext::from_file(profile, path),
        None => CalibrationContext::discover(profile, &source.calibration_dir),
    }
}

fn cmd_lab(config: &AnalysisConfig, rgb: RgbColor) -> Result<()> {
    let lab = config.converter().rgb_to_lab(rgb);
    println!("RGB {:.2}  {}", rgb, rgb.to_hex());
    println!("Lab {}", lab);
    Ok(())
}

fn cmd_delta_e(config: &AnalysisConfig, first: RgbColor, second: RgbColor) -> Result<()> {
    let converter = config.converter();
    let (a, b) = (converter.rgb_to_lab(first), converter.rgb_to_lab(second));
    println!("Lab 1: {}", a);
    println!("Lab 2: {}", b);
    println!("ΔE00:  {:.4}", stamp_colors::delta_e(a, b));
    println!("ΔE76:  {:.4}", delta_e_cie76(a, b));
    Ok(())
}

fn cmd_correct(
    config: &AnalysisConfig,
    samples: &[RgbColor],
    strategy: CorrectionStrategy,
    source: &CalibrationSource,
) -> Result<()> {
    let context = load_context(config, source);
    for corrected in correct_batch(samples, strategy, &context)? {
        println!(
            "{:.0} -> {:.0}  [{}]",
            corrected.raw,
            corrected.rgb,
            corrected.method.name()
        );
    }
    Ok(())
}

fn cmd_calibrate(
    config: &AnalysisConfig,
    measured_path: &Path,
    library_path: Option<&Path>,
    method: FitMethod,
    reference_image: Option<PathBuf>,
    save: Option<&Path>,
) -> Result<()> {
    let content =
        std::fs::read_to_string(measured_path).map_err(|e| ColorError::io(measured_path, e))?;
    let measured: BTreeMap<String, RgbColor> =
        serde_json::from_str(&content).map_err(|e| ColorError::serialization(measured_path, e))?;
    let library = load_library(library_path)?;

    let (method_name, matrix) = match method {
        FitMethod::Deviation => {
            let reference: BTreeMap<String, RgbColor> = measured
                .keys()
                .filter_map(|name| library.find(name).map(|c| (name.clone(), c.expected_rgb)))
                .collect();
            let analysis = analyze_deviation(&measured, &reference, &config.calibration)?;
            for (name, d) in &analysis.deviations {
                println!(
                    "{:<15} expected {:.0} measured {:.0} deviation ({:+.0}, {:+.0}, {:+.0})",
                    name, d.reference, d.measured, d.deviation[0], d.deviation[1], d.deviation[2]
                );
            }
            for hint in &analysis.recommendations {
                println!("  - {}", hint);
            }
            (METHOD_DEVIATION.to_string(), analysis.correction_matrix)
        }
        FitMethod::Weighted | FitMethod::PerColor => {
            let measurements = measure_reference_colors(&measured, &library)?;
            let fit = match method {
                FitMethod::PerColor => per_color_calibration(&measurements, &config.calibration),
                _ => weighted_calibration(&measurements, &config.calibration),
            };
            match fit {
                Some(fit) => {
                    println!("{}", fit.report());
                    let summary = validate_calibration(&fit.matrix, &measurements, &config.converter());
                    println!();
                    println!(
                        "Validation: RGB error {:.2} -> {:.2}, ΔE00 {:.2} -> {:.2} ({:+.1}%)",
                        summary.avg_original_error,
                        summary.avg_corrected_error,
                        summary.avg_original_delta_e,
                        summary.avg_corrected_delta_e,
                        summary.improvement_percentage
                    );
                    (fit.method, Some(fit.matrix))
                }
                None => (String::new(), None),
            }
        }
    };

    let Some(matrix) = matrix else {
        println!("Calibration unavailable: no measured color matched a reference.");
        return Ok(());
    };
    if let Some(path) = save {
        let file = CalibrationFile::new(method_name, matrix).with_wizard_data(WizardData {
            measured_colors: measured,
            reference_image: reference_image.map(|p| p.display().to_string()),
        });
        file.save(path)?;
        println!("Saved calibration to {}", path.display());
    }
    Ok(())
}

fn cmd_average(config: &AnalysisConfig, samples: &[RgbColor], threshold: Option<f64>) -> Result<()> {
    let averager = match threshold {
        Some(t) => stamp_colors::QualityAverager::with_threshold(t)?,
        None => config.averager()?,
    };
    let converter = config.converter();
    let lab: Vec<_> = samples.iter().map(|rgb| converter.rgb_to_lab(*rgb)).collect();
    let result = averager.average_with_outlier_rejection(&lab, samples)?;
    println!("RGB {:.2}  {}", result.avg_rgb, result.avg_rgb.to_hex());
    println!("Lab {}", result.avg_lab);
    println!("{}", result.quality_summary());
    Ok(())
}

fn cmd_sample(
    config: &AnalysisConfig,
    image_path: &Path,
    regions: &[[f64; 4]],
    shape: ShapeArg,
    anchor: AnchorArg,
    strategy: CorrectionStrategy,
    source: &CalibrationSource,
) -> Result<()> {
    let image = load_image(image_path)?;
    let shape = match shape {
        ShapeArg::Rectangle => SampleShape::Rectangle,
        ShapeArg::Circle => SampleShape::Circle,
    };
    let anchor = match anchor {
        AnchorArg::Center => Anchor::Center,
        AnchorArg::TopLeft => Anchor::TopLeft,
        AnchorArg::TopRight => Anchor::TopRight,
        AnchorArg::BottomLeft => Anchor::BottomLeft,
        AnchorArg::BottomRight => Anchor::BottomRight,
    };

    let regions: Vec<SampleRegion> = regions
        .iter()
        .map(|&[x, y, w, h]| SampleRegion {
            x,
            y,
            shape,
            size: (w, h),
            anchor,
        })
        .collect();

    let context = load_context(config, source);
    let mut corrected = Vec::with_capacity(regions.len());
    for (region, (sample, c)) in regions
        .iter()
        .zip(sample_corrected(&image, &regions, strategy, &context)?)
    {
        println!(
            "({}, {}): {:.2} over {} pixels -> {:.0}",
            region.x, region.y, sample.rgb, sample.pixel_count, c.rgb
        );
        corrected.push(c.rgb);
    }
    let converter = config.converter();
    let lab: Vec<_> = corrected.iter().map(|rgb| converter.rgb_to_lab(*rgb)).collect();
    let result = config.averager()?.average_with_outlier_rejection(&lab, &corrected)?;

    println!("Corrected average RGB {:.2}  {}", result.avg_rgb, result.avg_rgb.to_hex());
    println!("Lab {}", result.avg_lab);
    println!("{}", result.quality_summary());
    Ok(())
}

fn cmd_match(
    config: &AnalysisConfig,
    rgb: RgbColor,
    library_path: Option<&Path>,
    max_delta_e: Option<f64>,
    max_results: Option<usize>,
) -> Result<()> {
    let library = load_library(library_path)?;
    let lab = config.converter().rgb_to_lab(rgb);
    let matches = library.find_closest_matches(
        lab,
        max_delta_e.unwrap_or(config.library.max_delta_e),
        max_results.unwrap_or(config.library.max_results),
    );
    if matches.is_empty() {
        println!("No library color within threshold of {}", lab);
    }
    for m in matches {
        println!("{:<20} ΔE00 {:6.2}  {}", m.reference.name, m.delta_e, m.quality);
    }
    Ok(())
}

fn parse_rgb(s: &str) -> std::result::Result<RgbColor, String> {
    let values = parse_numbers(s)?;
    match values[..] {
        [r, g, b] => RgbColor::try_new(r, g, b).map_err(|e| e.to_string()),
        _ => Err(format!("expected R,G,B, got '{}'", s)),
    }
}

fn parse_region(s: &str) -> std::result::Result<[f64; 4], String> {
    let values = parse_numbers(s)?;
    match values[..] {
        [x, y, w, h] => Ok([x, y, w, h]),
        _ => Err(format!("expected X,Y,W,H, got '{}'", s)),
    }
}

fn parse_numbers(s: &str) -> std::result::Result<Vec<f64>, String> {
    s.trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect()
}
