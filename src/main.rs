use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use scene_translator::{
    ExportStatus, SessionManager, SessionOptions,
    host::load_host_doc_from_path,
};

#[derive(Debug, Default, Clone)]
struct Cli {
    scene: Option<PathBuf>,
    output: Option<PathBuf>,
    options: Option<PathBuf>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let slot = match flag {
            "--scene" => &mut cli.scene,
            "--output" | "-o" => &mut cli.output,
            "--options" => &mut cli.options,
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --scene <host.json>, --output <project.json>, --options <options.json>)"
                ));
            }
        };
        let Some(v) = args.get(i + 1) else {
            return Err(anyhow!("missing value for {flag}"));
        };
        *slot = Some(PathBuf::from(v));
        i += 2;
    }
    Ok(cli)
}

fn load_options(path: Option<&std::path::Path>) -> Result<SessionOptions> {
    let Some(path) = path else {
        return Ok(SessionOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read --options file {}: {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow!("invalid session options json in {}: {e}", path.display()))
}

fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;

    let scene_path = cli
        .scene
        .ok_or_else(|| anyhow!("--scene <host.json> is required"))?;
    let output = cli
        .output
        .unwrap_or_else(|| scene_path.with_extension("project.json"));
    let options = load_options(cli.options.as_deref())?;

    let mut host = load_host_doc_from_path(&scene_path)?;
    let mut manager = SessionManager::default();
    match manager.begin_project_export(&mut host, &output, options) {
        ExportStatus::Success => {
            println!("[export] saved: {}", output.display());
            Ok(())
        }
        ExportStatus::Aborted => {
            println!("[export] aborted");
            Ok(())
        }
        ExportStatus::Failed(msg) => bail!("export failed: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_scene_and_output() {
        let args = vec![
            "--scene".to_string(),
            "shot.json".to_string(),
            "-o".to_string(),
            "out/shot.project.json".to_string(),
        ];
        let cli = parse_cli(&args).unwrap();
        assert_eq!(cli.scene.as_ref().unwrap(), &PathBuf::from("shot.json"));
        assert_eq!(
            cli.output.as_ref().unwrap(),
            &PathBuf::from("out/shot.project.json")
        );
        assert!(cli.options.is_none());
    }

    #[test]
    fn parse_cli_rejects_dangling_flag() {
        let args = vec!["--scene".to_string()];
        assert!(parse_cli(&args).is_err());
    }
}
