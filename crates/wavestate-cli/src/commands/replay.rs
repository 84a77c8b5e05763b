//! Replay command handler

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use wavestate_core::EngineConfig;

use crate::output::Output;
use crate::script::Script;

/// Run a replay script and print what the application observed
pub fn run(script: &Path, config: EngineConfig, output: &Output) -> Result<()> {
    let loaded = Script::load(script)?;
    debug!(
        steps = loaded.steps.len(),
        keys = loaded.initial.len(),
        "Loaded replay script"
    );

    let replay = loaded.run(config)?;
    output.print_replay(&replay);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_missing_script_is_an_error() {
        let output = Output::new(OutputFormat::Quiet);
        let err = run(
            Path::new("/nonexistent/script.json"),
            EngineConfig::default(),
            &output,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read script"));
    }

    #[test]
    fn test_runs_script_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("script.json");
        std::fs::write(
            &path,
            r#"{"initial": {"a": {"x": 1}}, "steps": [{"type": "participants"}]}"#,
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        run(&path, EngineConfig::default(), &output).unwrap();
    }
}
