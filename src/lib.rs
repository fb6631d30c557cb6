pub mod combine;
pub mod error;
pub mod io;
pub mod junction;
pub mod normalize;
pub mod params;
pub mod reference;
pub mod reformat;
pub mod stats;

use std::path::PathBuf;

use anyhow::Context;
use log::{debug, info};

use crate::combine::{combine_samples, SampleInput};
use crate::normalize::{normalize_matrix, NormalizeOptions};
use crate::params::{Parameters, RunMode};
use crate::reference::ReferenceIndex;
use crate::reformat::{reformat_samples, sample_id_from_path, ReformatJob};

/// Top-level dispatcher. Called from `main()` after CLI parsing.
pub fn run(params: &Parameters) -> anyhow::Result<()> {
    params.validate()?;

    info!("sjcohort v{}", env!("CARGO_PKG_VERSION"));
    info!("runMode: {}", params.run_mode);
    info!("runThreadN: {}", params.run_thread_n);

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(params.run_thread_n)
        .build_global()
    {
        debug!("Global thread pool already configured: {}", e);
    }

    match params.run_mode {
        RunMode::Reformat => reformat(params).map(|_| ()),
        RunMode::Combine => {
            let inputs = sample_inputs(params, &params.sj_files_in);
            combine(params, &inputs).map(|_| ())
        }
        RunMode::Normalize => {
            let index = load_reference(params)?;
            let matrix = params
                .matrix_file_in
                .as_deref()
                .context("--matrixFileIn is required when --runMode normalize")?;
            normalize(params, &index, matrix.to_path_buf())
        }
        RunMode::Pipeline => pipeline(params),
    }
}

/// Pair every junction file with its sample id (given or derived).
fn sample_inputs(params: &Parameters, files: &[PathBuf]) -> Vec<SampleInput> {
    files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let sample_id = params
                .sample_ids
                .get(i)
                .cloned()
                .unwrap_or_else(|| sample_id_from_path(path));
            SampleInput::new(sample_id, path.clone())
        })
        .collect()
}

fn load_reference(params: &Parameters) -> anyhow::Result<ReferenceIndex> {
    let index = ReferenceIndex::from_params(params).with_context(|| {
        format!(
            "loading {} reference {}",
            params.reference_format,
            params
                .reference_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    info!(
        "Reference index: {} junctions on {} chromosomes",
        index.len(),
        index.n_chromosomes()
    );
    Ok(index)
}

/// Reformat every raw input; returns the canonical files as combiner inputs.
fn reformat(params: &Parameters) -> anyhow::Result<Vec<SampleInput>> {
    let jobs: Vec<ReformatJob> = sample_inputs(params, &params.sj_files_in)
        .into_iter()
        .map(|input| ReformatJob {
            output: params.canonical_output_path(&input.sample_id),
            sample_id: input.sample_id,
            input: input.path,
        })
        .collect();

    let summaries = reformat_samples(&jobs).context("reformatting raw junction files")?;
    for summary in &summaries {
        summary.print_summary();
    }

    Ok(jobs
        .into_iter()
        .map(|job| SampleInput::new(job.sample_id, job.output))
        .collect())
}

fn combine(params: &Parameters, inputs: &[SampleInput]) -> anyhow::Result<PathBuf> {
    let output = params.matrix_output_path();
    let summary = combine_samples(inputs, &output, params.count_mode)
        .with_context(|| format!("combining {} samples into {}", inputs.len(), output.display()))?;
    summary.print_summary();
    Ok(output)
}

fn normalize(params: &Parameters, index: &ReferenceIndex, matrix: PathBuf) -> anyhow::Result<()> {
    let output = params.normalized_output_path();
    let summary = normalize_matrix(&matrix, index, &output, NormalizeOptions::from_params(params))
        .with_context(|| format!("normalizing {}", matrix.display()))?;
    summary.print_summary();
    Ok(())
}

fn pipeline(params: &Parameters) -> anyhow::Result<()> {
    // Build the index first so a bad reference fails before any heavy work
    let index = load_reference(params)?;

    info!("=== Stage 1/3: reformat ===");
    let canonical = reformat(params)?;

    info!("=== Stage 2/3: combine ===");
    let matrix = combine(params, &canonical)?;

    info!("=== Stage 3/3: normalize ===");
    normalize(params, &index, matrix)?;

    info!("Pipeline complete!");
    Ok(())
}
