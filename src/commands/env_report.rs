use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use chat_markets::env_keys::GENERATED_ENV_ALLOWLIST;
use chat_markets::markets::config::resolve_config_path;

fn is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|v| !v.trim().is_empty())
}

pub fn run() -> CommandReport {
    let mut report = CommandReport::new("env");
    for key in GENERATED_ENV_ALLOWLIST {
        let state = if is_set(key) { "set" } else { "unset" };
        report.detail(format!("{key}={state}"));
    }

    match resolve_config_path() {
        Some(path) if path.is_file() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (absent)", path.display())),
        None => report.detail("config_file=none"),
    }

    if !is_set("OPENROUTER_API_KEY") {
        report.issue("OPENROUTER_API_KEY is unset; only --heuristic-only and --dry-run will work");
    }
    report
}

pub fn print(report: &CommandReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
