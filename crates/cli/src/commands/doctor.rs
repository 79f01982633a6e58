use std::path::Path;

use serde::Serialize;
use weeklybot_core::config::AppConfig;
use weeklybot_core::directory::ProjectSource;
use weeklybot_server::google_docs::load_credential;
use weeklybot_server::outbound::http_client;
use weeklybot_server::time_tracking::HarvestProjectSource;

use super::{load_options, CommandResult};

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

pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::new(exit_code, output);
    }

    CommandResult::new(exit_code, render_human(&report))
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(load_options(config_path)) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_document_credentials(&config));
            checks.push(check_time_tracking_api(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["document_credentials", "time_tracking_api"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
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

fn check_document_credentials(config: &AppConfig) -> DoctorCheck {
    let Some(path) = config.documents.credentials_path.as_deref() else {
        return DoctorCheck {
            name: "document_credentials",
            status: CheckStatus::Fail,
            details: "documents.credentials_path is unset".to_string(),
        };
    };

    match load_credential(path) {
        Ok(_) => DoctorCheck {
            name: "document_credentials",
            status: CheckStatus::Pass,
            details: format!("access token readable from `{}`", path.display()),
        },
        Err(error) => DoctorCheck {
            name: "document_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_time_tracking_api(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "time_tracking_api",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let http = http_client(config).map_err(|error| format!("http client: {error}"))?;
        let source = HarvestProjectSource::new(http, &config.time_tracking);
        source.fetch_page(None).await.map_err(|error| error.to_string())
    });

    match result {
        Ok(page) => DoctorCheck {
            name: "time_tracking_api",
            status: CheckStatus::Pass,
            details: format!(
                "first page listed {} projects{}",
                page.projects.len(),
                if page.next_page.is_some() { " (more pages available)" } else { "" }
            ),
        },
        Err(error) => {
            DoctorCheck { name: "time_tracking_api", status: CheckStatus::Fail, details: error }
        }
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

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "ok".to_string(),
                },
                DoctorCheck {
                    name: "time_tracking_api",
                    status: CheckStatus::Skipped,
                    details: "skipped".to_string(),
                },
            ],
        };

        assert_eq!(
            render_human(&report),
            "doctor: one or more readiness checks failed\n\
             - [ok] config_validation: ok\n\
             - [skip] time_tracking_api: skipped"
        );
    }
}
