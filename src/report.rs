//! Shipping the action log off the robot.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};
use crate::route::{ActionEntry, Outcome};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub room: String,
    pub run: u32,
    pub outcome: Option<Outcome>,
    pub generated_at: DateTime<Utc>,
    pub actions: Vec<ActionEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No target configured; the log stays put.
    Retained,
}

pub enum ReportTarget {
    None,
    File(PathBuf),
    Http { url: String, client: reqwest::Client },
}

impl ReportTarget {
    pub fn http(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RunnerError::Report(e.to_string()))?;
        Ok(ReportTarget::Http {
            url: url.into(),
            client,
        })
    }

    pub async fn deliver(&self, report: &RunReport) -> Result<Delivery> {
        match self {
            ReportTarget::None => Ok(Delivery::Retained),
            ReportTarget::File(path) => {
                let path = path.clone();
                let report = report.clone();
                tokio::task::spawn_blocking(move || write_report_file(&path, &report))
                    .await
                    .map_err(|e| RunnerError::Report(e.to_string()))??;
                Ok(Delivery::Delivered)
            }
            ReportTarget::Http { url, client } => {
                let response = client
                    .post(url)
                    .json(report)
                    .send()
                    .await
                    .map_err(|e| RunnerError::Report(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RunnerError::Report(format!("{} returned {}", url, status)));
                }
                log::info!(
                    "[report] Posted {} actions for room {} to {}",
                    report.actions.len(),
                    report.room,
                    url
                );
                Ok(Delivery::Delivered)
            }
        }
    }
}

/// Pretty JSON, gzipped when the file name ends in `.gz`.
pub fn write_report_file(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    let file = File::create(path)?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?;
    } else {
        let mut file = file;
        file.write_all(&json)?;
    }
    log::info!(
        "[report] Wrote {} actions to {}",
        report.actions.len(),
        path.display()
    );
    Ok(())
}
