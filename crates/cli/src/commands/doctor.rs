use agendum_core::config::{AppConfig, LlmProvider, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{CommandResult, CONFIG_FAILURE_EXIT};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["default_timezone", "google_credentials", "llm_backend"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { CONFIG_FAILURE_EXIT };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_timezone(&config));
            checks.push(check_google_credentials(&config));
            checks.push(check_llm_backend(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_timezone(config: &AppConfig) -> DoctorCheck {
    let zone = config.scheduling.default_zone();
    DoctorCheck {
        name: "default_timezone",
        status: CheckStatus::Pass,
        details: format!(
            "`{}` resolves; new events default to {} minutes",
            zone.name(),
            config.scheduling.default_duration_minutes
        ),
    }
}

fn check_google_credentials(config: &AppConfig) -> DoctorCheck {
    let token = config.google.access_token.expose_secret();
    if token.trim().is_empty() {
        return DoctorCheck {
            name: "google_credentials",
            status: CheckStatus::Fail,
            details: "google.access_token is empty".to_string(),
        };
    }

    DoctorCheck {
        name: "google_credentials",
        status: CheckStatus::Pass,
        details: format!(
            "access token present; calendar `{}`; sender `{}`",
            config.google.calendar_id, config.google.gmail_from
        ),
    }
}

fn check_llm_backend(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let has_key =
        llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());

    if llm.provider == LlmProvider::OpenAi && !has_key {
        return DoctorCheck {
            name: "llm_backend",
            status: CheckStatus::Fail,
            details: "openai provider selected without llm.api_key".to_string(),
        };
    }

    DoctorCheck {
        name: "llm_backend",
        status: CheckStatus::Pass,
        details: format!("{} model `{}` at {}", llm.provider.as_str(), llm.model, llm.base_url),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
