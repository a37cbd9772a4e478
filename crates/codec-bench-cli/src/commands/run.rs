//! Benchmark run command.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use codec_bench::{
    BenchConfig, BenchmarkReport, Dataset, Harness, LossyWarning, PnmDumpViewer, SvgPlotter,
    stats,
};

use crate::dataset::{PngDirDataset, SyntheticDataset};
use crate::models;

/// Side length of synthetic images.
const SYNTHETIC_SIZE: usize = 256;

/// Options of the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub images: usize,
    pub models: Vec<String>,
    pub dataset: String,
    pub scratch_dir: Option<PathBuf>,
    pub charts: Option<PathBuf>,
    pub diagnostics: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub warn_per_model: bool,
}

pub fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let dataset = open_dataset(&args.dataset, args.images);
    let harness = build_harness(dataset.as_ref(), &args)?;

    let report = match &args.charts {
        Some(dir) => {
            let mut plotter = SvgPlotter::new(dir);
            let report = harness
                .benchmark_and_plot(args.images, &mut plotter)
                .context("benchmark failed")?;
            tracing::info!(dir = %dir.display(), "charts written");
            report
        }
        None => harness.benchmark(args.images).context("benchmark failed")?,
    };

    if verbose {
        print_spread(&report)?;
    }

    if let Some(path) = &args.json {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}

fn open_dataset(source: &str, images: usize) -> Box<dyn Dataset> {
    if source == "synthetic" {
        Box::new(SyntheticDataset::new(images, SYNTHETIC_SIZE, SYNTHETIC_SIZE))
    } else {
        Box::new(PngDirDataset::new(source, images))
    }
}

fn build_harness(dataset: &dyn Dataset, args: &RunArgs) -> Result<Harness> {
    let mut config = BenchConfig::builder().lossy_warning(if args.warn_per_model {
        LossyWarning::OncePerModel
    } else {
        LossyWarning::OncePerRun
    });
    if let Some(dir) = &args.scratch_dir {
        config = config.scratch_dir(dir);
    }
    if let Some(dir) = &args.diagnostics {
        config = config.viewer(Arc::new(PnmDumpViewer::new(dir)));
    }

    let mut harness = Harness::new(dataset, config.build()).context("loading dataset")?;
    for name in &args.models {
        models::register(&mut harness, name.trim())
            .with_context(|| format!("registering model {name}"))?;
    }
    if harness.registry().is_empty() {
        anyhow::bail!("no models selected");
    }
    Ok(harness)
}

fn print_spread(report: &BenchmarkReport) -> Result<()> {
    println!();
    for line in spread_lines(report)? {
        println!("{line}");
    }
    Ok(())
}

/// Per-model spread of bpsp plus median and 5th percentile throughput.
fn spread_lines(report: &BenchmarkReport) -> Result<Vec<String>> {
    let mut lines = vec![
        format!(
            "{:<16} {:>8} {:>8} {:>8} {:>8} {:>12} {:>12} {:>12} {:>8}",
            "Model", "Median", "StdDev", "P5", "P95", "Comp MB/s", "Decomp MB/s", "P5 Comp", "Mismatch"
        ),
        format!("{:-<103}", ""),
    ];
    for summary in report.summaries()? {
        let Some(metrics) = report.model(&summary.name) else {
            continue;
        };
        let s = &summary.bpsp;
        lines.push(format!(
            "{:<16} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>12.2} {:>12.2} {:>12.2} {:>8}",
            summary.name,
            s.median,
            s.std_dev,
            s.p5,
            s.p95,
            stats::median(&metrics.compression_mbps).unwrap_or_default(),
            stats::median(&metrics.decompression_mbps).unwrap_or_default(),
            stats::percentile(&metrics.compression_mbps, 0.05).unwrap_or_default(),
            metrics.mismatches
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(scratch: &tempfile::TempDir) -> RunArgs {
        RunArgs {
            images: 2,
            models: vec!["raw".to_string(), "png-quantized".to_string()],
            dataset: "synthetic".to_string(),
            scratch_dir: Some(scratch.path().join("scratch")),
            charts: None,
            diagnostics: None,
            json: None,
            warn_per_model: false,
        }
    }

    #[test]
    fn test_run_writes_json_charts_and_previews() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir);
        args.charts = Some(dir.path().join("charts"));
        args.diagnostics = Some(dir.path().join("diag"));
        args.json = Some(dir.path().join("report.json"));

        run(args, true).unwrap();

        let json = fs::read_to_string(dir.path().join("report.json")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["models"].as_array().unwrap().len(), 2);
        assert_eq!(report["lossy"], true);

        assert!(dir.path().join("charts/bpsp_sorted.svg").exists());
        assert!(dir.path().join("diag/png-quantized-0-original.ppm").exists());
        assert!(dir.path().join("diag/png-quantized-0-restored.ppm").exists());
    }

    #[test]
    fn test_spread_lines_report_throughput_percentiles() {
        use codec_bench::ModelMetrics;
        use codec_bench::bench::report::ModelResult;
        use codec_bench::metrics::MeasurementRow;

        let mut metrics = ModelMetrics::default();
        for (bpsp, mbps) in [(2.0, 10.0), (4.0, 30.0), (6.0, 20.0)] {
            metrics.push(MeasurementRow {
                bpsp,
                compression_mbps: mbps,
                decompression_mbps: mbps * 2.0,
            });
        }
        let mut report = BenchmarkReport::new(3);
        report.models.push(ModelResult {
            name: "m".to_string(),
            metrics,
        });

        let lines = spread_lines(&report).unwrap();
        assert_eq!(lines.len(), 3);
        let cols: Vec<_> = lines[2].split_whitespace().collect();
        // name, median, std, p5, p95, comp median, decomp median, comp p5, mismatches
        assert_eq!(cols, ["m", "4.000", "2.000", "2.200", "5.800", "20.00", "40.00", "11.00", "0"]);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir);
        args.models = vec!["bmp".to_string()];

        let err = run(args, false).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown model: bmp"));
    }

    #[test]
    fn test_no_models_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir);
        args.models.clear();
        assert!(run(args, false).is_err());
    }
}
