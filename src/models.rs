//! Statistical models that drive read simulation: fragment lengths, read
//! identities, k-mer errors and quality scores.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use crate::errors::SimulationError;

pub mod distributions;
pub mod error_model;
pub mod identities;
pub mod lengths;
pub mod qscore_model;

/// Environment variable naming the directory that holds model presets.
pub const MODEL_DIR_ENV: &str = "LRSIM_MODEL_DIR";

/// Finds a named model preset. Presets live in `<dir>/<kind>/<name>.gz` or
/// `<dir>/<kind>/<name>`, where `<dir>` is the given model directory or, when
/// none is given, the directory named by `LRSIM_MODEL_DIR`.
pub fn resolve_preset(
    kind: &str,
    name: &str,
    model_dir: Option<&Path>,
) -> Result<PathBuf, SimulationError> {
    let model_dir = model_dir
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(MODEL_DIR_ENV).map(PathBuf::from));

    let model_dir = model_dir.ok_or_else(|| {
        SimulationError::resource(format!(
            "`{}` is not a file and no model directory was given (set --model-dir or {}) \
            to look up a preset",
            name, MODEL_DIR_ENV
        ))
    })?;

    let candidates = [
        model_dir.join(kind).join(format!("{}.gz", name)),
        model_dir.join(kind).join(name),
    ];

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| {
            let searched = candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            SimulationError::resource(format!(
                "could not find model `{}` (looked for {})",
                name, searched
            ))
        })
}
