use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use osmotest::config::{load_config, Config, Provider};
use osmotest::error::{ConfigError, PipelineError};
use osmotest::git::{resolve_base, GitCli};
use osmotest::llm::backend::LlmBackend;
use osmotest::logger::{log, LogLevel, RunLog};
use osmotest::pipeline::{Pipeline, RunOptions};
use osmotest::state::{RunReport, RunStatus};

const EXIT_CONFIG: u8 = 1;
const EXIT_BACKEND_UNREACHABLE: u8 = 2;
const EXIT_FILES_FAILED: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "osmotest",
    version,
    about = "Generate regression tests for source files changed in this revision."
)]
struct Cli {
    #[arg(long, default_value = ".", help = "Repository root")]
    repo: PathBuf,

    #[arg(long, help = "Config file (default: <repo>/osmotest.toml, then user config dir)")]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Base revision to diff against (default: origin/$GITHUB_BASE_REF, else HEAD~1)"
    )]
    base: Option<String>,

    #[arg(long, help = "Backend provider: ollama | openai | anthropic")]
    provider: Option<String>,

    #[arg(long, help = "Model identifier")]
    model: Option<String>,

    #[arg(long, help = "Backend base URL")]
    base_url: Option<String>,

    #[arg(long, default_value_t = false, help = "Report what would be written without touching files")]
    dry_run: bool,

    #[arg(long, default_value_t = false, help = "Do not update the dependency manifest")]
    no_manifest: bool,

    #[arg(long, help = "Write the run report as JSON to this file")]
    report: Option<PathBuf>,

    #[arg(long, help = "Write every prompt to this directory")]
    dump_prompts: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = false,
        help = "Exit non-zero when any changed file failed"
    )]
    strict: bool,

    #[arg(long, default_value_t = false, help = "Only print errors and the final summary")]
    quiet: bool,
}

fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = load_config(&cli.repo, cli.config.as_deref())?;

    if let Some(p) = &cli.provider {
        cfg.backend.provider = Provider::parse(p)?;
    }
    if let Some(m) = &cli.model {
        cfg.backend.model = m.clone();
    }
    if let Some(u) = &cli.base_url {
        cfg.backend.base_url = Some(u.clone());
    }

    cfg.validate()?;
    Ok(cfg)
}

fn write_report(path: &Path, report: &RunReport, run: &mut RunLog) {
    let written = serde_json::to_string_pretty(report)
        .map_err(|e| e.to_string())
        .and_then(|text| fs::write(path, text).map_err(|e| e.to_string()));

    if let Err(e) = written {
        log(run, LogLevel::Error, format!("Cannot write report {}: {e}", path.display()));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut run = RunLog::new(!cli.quiet);

    let cfg = match resolve_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("osmotest: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let backend = match LlmBackend::from_config(&cfg.backend) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("osmotest: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let git = GitCli::new(&cli.repo);
    let options = RunOptions {
        base: resolve_base(cli.base.clone()),
        dry_run: cli.dry_run,
        update_manifest: !cli.no_manifest,
        dump_prompts: cli.dump_prompts.clone(),
    };

    let pipeline = Pipeline::new(git.repo_root(), &cfg, &git, backend, options);

    let report = match pipeline.run(&mut run) {
        Ok(r) => r,
        Err(PipelineError::BackendUnreachable(label)) => {
            eprintln!("osmotest: backend {label} is unreachable");
            return ExitCode::from(EXIT_BACKEND_UNREACHABLE);
        }
        Err(e) => {
            eprintln!("osmotest: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Some(path) = &cli.report {
        write_report(path, &report, &mut run);
    }

    let status = report.status();
    if cli.quiet {
        for line in run.lines.iter().filter(|l| l.level == LogLevel::Error) {
            eprintln!("osmotest: {}", line.text);
        }
        eprintln!(
            "osmotest: {:?} ({} written, {} failed)",
            status,
            report.writes(),
            report.failures()
        );
    }

    match status {
        RunStatus::Partial | RunStatus::AllFailed if cli.strict => {
            ExitCode::from(EXIT_FILES_FAILED)
        }
        _ => ExitCode::SUCCESS,
    }
}
