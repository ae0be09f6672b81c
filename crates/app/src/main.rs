mod console;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use env_logger::Env;
use serde_json::Value;
use services::LiveSession;
use stage_core::model::SessionConfig;

use console::{ConsolePresenter, LoggingSelector};

/// The demo waits this long after launch so the player can get into position.
const DEFAULT_START_DELAY_MS: u64 = 10_000;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    ConfigFile { path: String, reason: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::ConfigFile { path, reason } => {
                write!(f, "can not read config {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_value<T: FromStr>(flag: &'static str, raw: &str) -> Result<T, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidValue {
        flag,
        raw: raw.to_string(),
    })
}

/// Every setting flag with the environment variable that backs it.
const SETTINGS: &[(&str, &str)] = &[
    ("--stages", "STAGE_COUNT"),
    ("--stage-ms", "STAGE_DURATION_MS"),
    ("--analysis-ms", "STAGE_ANALYSIS_MS"),
    ("--hit-probability", "STAGE_HIT_PROBABILITY"),
    ("--feedback-ms", "STAGE_FEEDBACK_MS"),
    ("--blink-ms", "STAGE_BLINK_MS"),
    ("--fill-steps", "STAGE_FILL_STEPS"),
    ("--start-delay-ms", "STAGE_START_DELAY_MS"),
    ("--seed", "STAGE_SEED"),
    ("--model", "STAGE_MODEL"),
    ("--outcome", "STAGE_OUTCOME"),
];

fn setting_flag(arg: &str) -> Option<&'static str> {
    SETTINGS
        .iter()
        .find(|(flag, _)| *flag == arg)
        .map(|(flag, _)| *flag)
}

fn apply_setting(
    config: &mut SessionConfig,
    flag: &'static str,
    raw: &str,
) -> Result<(), ArgsError> {
    match flag {
        "--stages" => config.stage_count = parse_value(flag, raw)?,
        "--stage-ms" => config.stage_duration_ms = parse_value(flag, raw)?,
        "--analysis-ms" => config.analysis_duration_ms = parse_value(flag, raw)?,
        "--hit-probability" => config.feedback_hit_probability = parse_value(flag, raw)?,
        "--feedback-ms" => config.feedback_period_ms = parse_value(flag, raw)?,
        "--blink-ms" => config.highlight_blink_period_ms = parse_value(flag, raw)?,
        "--fill-steps" => config.fill_steps = parse_value(flag, raw)?,
        "--start-delay-ms" => config.start_delay_ms = parse_value(flag, raw)?,
        "--seed" => config.feedback_seed = Some(parse_value(flag, raw)?),
        "--model" => config.model = parse_value(flag, raw)?,
        "--outcome" => config.outcome_text = raw.to_string(),
        _ => return Err(ArgsError::UnknownArg(flag.to_string())),
    }
    Ok(())
}

/// Lay the keys present in `json` over `base`; absent keys keep their value.
fn overlay_json(base: &SessionConfig, json: &str) -> Result<SessionConfig, String> {
    let mut merged = serde_json::to_value(base).map_err(|err| err.to_string())?;
    let overlay: Value = serde_json::from_str(json).map_err(|err| err.to_string())?;
    let Value::Object(overlay) = overlay else {
        return Err("expected a JSON object".to_string());
    };
    if let Value::Object(fields) = &mut merged {
        fields.extend(overlay);
    }
    serde_json::from_value(merged).map_err(|err| err.to_string())
}

struct Args {
    config: SessionConfig,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--config <file.json>] [options]");
    eprintln!();
    eprintln!("Options (defaults in parentheses):");
    eprintln!("  --stages <n>              (3)");
    eprintln!("  --stage-ms <ms>           (5000)");
    eprintln!("  --analysis-ms <ms>        (2000)");
    eprintln!("  --hit-probability <p>     (0.7)");
    eprintln!("  --feedback-ms <ms>        (1000)");
    eprintln!("  --blink-ms <ms>           (500)");
    eprintln!("  --fill-steps <n>          (20)");
    eprintln!("  --start-delay-ms <ms>     (10000)");
    eprintln!("  --seed <u64>              (random)");
    eprintln!("  --model <name>            (\"Pose Detection\")");
    eprintln!("  --outcome <text>          (\"Great job!\")");
    eprintln!();
    eprintln!("Environment:");
    let names: Vec<&str> = SETTINGS.iter().map(|(_, env)| *env).collect();
    eprintln!("  {}", names.join(", "));
    eprintln!("  RUST_LOG (info)");
}

impl Args {
    /// Defaults, then `--config`, then the environment, then flags.
    ///
    /// Invalid environment values are ignored with a warning; invalid flags are errors.
    fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut config_path = None;
        let mut flags = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config_path = Some(require_value(&mut args, "--config")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    let flag =
                        setting_flag(other).ok_or_else(|| ArgsError::UnknownArg(arg.clone()))?;
                    flags.push((flag, require_value(&mut args, flag)?));
                }
            }
        }

        let mut config = SessionConfig {
            start_delay_ms: DEFAULT_START_DELAY_MS,
            ..SessionConfig::default()
        };

        if let Some(path) = config_path {
            let raw = std::fs::read_to_string(&path).map_err(|err| ArgsError::ConfigFile {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            config = overlay_json(&config, &raw)
                .map_err(|reason| ArgsError::ConfigFile { path, reason })?;
        }

        for &(flag, var) in SETTINGS {
            let Some(raw) = env(var) else {
                continue;
            };
            if let Err(err) = apply_setting(&mut config, flag, &raw) {
                log::warn!("ignoring {var}: {err}");
            }
        }

        for (flag, raw) in flags {
            apply_setting(&mut config, flag, &raw)?;
        }

        Ok(Self { config })
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1), |name| std::env::var(name).ok())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    let host = LiveSession::new(
        &parsed.config,
        Arc::new(LoggingSelector),
        Arc::new(ConsolePresenter::stdout()),
    )?;
    let plan = host.config().plan;
    log::info!(
        "{} stages, session runs {:?} after a {:?} delay (press Ctrl-C to stop)",
        plan.stage_count(),
        plan.total_duration(),
        host.config().start_delay
    );

    let started = tokio::select! {
        started = host.start() => started?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("interrupted before the session started");
            host.stop().await;
            return Ok(());
        }
    };
    let Some(id) = started else {
        return Ok(());
    };

    tokio::select! {
        result = host.controller().wait() => {
            if result.is_none() {
                log::warn!("session {id} ended without a result");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("interrupted, stopping session {id}");
        }
    }

    host.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_core::model::DetectorModel;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_delay_the_session() {
        let parsed = Args::parse(args(&[]), no_env).unwrap();
        assert_eq!(parsed.config.start_delay_ms, DEFAULT_START_DELAY_MS);
        assert_eq!(parsed.config.stage_count, 3);
        assert_eq!(parsed.config.model, DetectorModel::PoseDetection);
    }

    #[test]
    fn flags_override_environment() {
        let env = |name: &str| match name {
            "STAGE_COUNT" => Some("4".to_string()),
            "STAGE_DURATION_MS" => Some("3000".to_string()),
            "STAGE_FILL_STEPS" => Some("many".to_string()),
            _ => None,
        };
        let parsed = Args::parse(
            args(&["--stages", "2", "--model", "object detection", "--seed", "9"]),
            env,
        )
        .unwrap();

        assert_eq!(parsed.config.stage_count, 2);
        assert_eq!(parsed.config.stage_duration_ms, 3000);
        assert_eq!(parsed.config.fill_steps, 20);
        assert_eq!(parsed.config.model, DetectorModel::ObjectDetection);
        assert_eq!(parsed.config.feedback_seed, Some(9));
    }

    #[test]
    fn rejects_bad_flags() {
        assert!(matches!(
            Args::parse(args(&["--stages"]), no_env),
            Err(ArgsError::MissingValue { flag: "--stages" })
        ));
        assert!(matches!(
            Args::parse(args(&["--stage-ms", "soon"]), no_env),
            Err(ArgsError::InvalidValue { flag: "--stage-ms", .. })
        ));
        assert!(matches!(
            Args::parse(args(&["--model", "Hand Tracking"]), no_env),
            Err(ArgsError::InvalidValue { flag: "--model", .. })
        ));
        assert!(matches!(
            Args::parse(args(&["--verbose"]), no_env),
            Err(ArgsError::UnknownArg(arg)) if arg == "--verbose"
        ));
    }

    #[test]
    fn config_file_keys_overlay_the_defaults() {
        let base = SessionConfig {
            start_delay_ms: DEFAULT_START_DELAY_MS,
            ..SessionConfig::default()
        };
        let merged =
            overlay_json(&base, r#"{ "analysis_duration_ms": 1500, "model": "Object Detection" }"#)
                .unwrap();

        assert_eq!(merged.analysis_duration_ms, 1500);
        assert_eq!(merged.model, DetectorModel::ObjectDetection);
        assert_eq!(merged.start_delay_ms, DEFAULT_START_DELAY_MS);
        assert!(overlay_json(&base, "[1, 2]").is_err());
        assert!(overlay_json(&base, r#"{ "model": "Hand Tracking" }"#).is_err());
    }
}
