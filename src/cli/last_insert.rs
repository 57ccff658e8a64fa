use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use std::path::PathBuf;
use tracing::info;

use crate::guard::{self, InsertReport};
use crate::schema;
use crate::util::db::ConnectSettings;
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct LastInsertConfig {
    /// Value to store; a random default is generated when absent.
    pub value: Option<String>,
    /// Optional override for the MySQL server URL.
    pub database_url: Option<String>,
    /// Optional override for the database name (default `test_forty2`).
    pub database: Option<String>,
    /// Optional override for the unix socket fallback path.
    pub socket: Option<PathBuf>,
    /// Disable the unix socket fallback entirely.
    pub no_socket_fallback: bool,
    /// Single-line JSON output.
    pub compact: bool,
}

impl LastInsertConfig {
    /// Env-derived settings with the CLI overrides applied on top.
    pub fn settings(&self) -> Result<ConnectSettings> {
        let mut settings = ConnectSettings::from_env()?;
        if let Some(url) = &self.database_url {
            settings.url = url.clone();
        }
        if let Some(db) = &self.database {
            settings.database = db.clone();
        }
        if let Some(sock) = &self.socket {
            settings.socket = Some(sock.clone());
        }
        if self.no_socket_fallback {
            settings.socket = None;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Output of one run: the optional creation notice and the report.
#[derive(Debug)]
pub struct LastInsertOutcome {
    pub message: Option<String>,
    pub report: InsertReport,
}

impl LastInsertOutcome {
    pub fn render(&self, compact: bool) -> Result<String> {
        let mut out = String::new();
        if let Some(msg) = &self.message {
            out.push_str(msg);
            out.push('\n');
        }
        let json = if compact {
            serde_json::to_string(&self.report)?
        } else {
            serde_json::to_string_pretty(&self.report)?
        };
        out.push_str(&json);
        Ok(out)
    }
}

/// Five characters of one standard-normal draw, e.g. `-0.43` or `1.210`.
pub fn default_value<R: Rng + ?Sized>(rng: &mut R) -> String {
    let sample: f64 = rng.sample(StandardNormal);
    sample.to_string().chars().take(5).collect()
}

pub async fn execute(cfg: &LastInsertConfig) -> Result<LastInsertOutcome> {
    env_util::init_env();
    let value = match &cfg.value {
        Some(v) => v.clone(),
        None => default_value(&mut rand::thread_rng()),
    };
    guard::check_value(&value)?;
    let settings = cfg.settings()?;

    let boot = schema::ensure_schema(&settings)
        .await
        .context("schema bootstrap failed")?;
    let message = boot.message(&settings);

    let (report, db) = guard::last_insert_id(boot.db, &settings, &value).await?;
    db.close().await;
    info!(
        manual_last_insert_id = report.manual_last_insert_id,
        "recovered insert id"
    );
    Ok(LastInsertOutcome { message, report })
}

pub async fn run(cfg: LastInsertConfig) -> Result<()> {
    let outcome = execute(&cfg).await?;
    println!();
    println!("{}", outcome.render(cfg.compact)?);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_value_is_short_number_prefix() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let v = default_value(&mut rng);
            assert!(!v.is_empty() && v.chars().count() <= 5, "{v}");
            let trimmed = v.trim_end_matches('.');
            assert!(trimmed.parse::<f64>().is_ok(), "{v}");
        }
    }

    #[test]
    fn render_prefixes_creation_message() {
        let outcome = LastInsertOutcome {
            message: Some("Created database test_forty2".into()),
            report: InsertReport {
                bad_last_insert_id: 0,
                last_insert_id: 3,
                manual_last_insert_id: 3,
                value_added: "x".into(),
            },
        };
        let text = outcome.render(true).unwrap();
        assert_eq!(
            text,
            "Created database test_forty2\n{\"bad_last_insert_id\":0,\"last_insert_id\":3,\"manual_last_insert_id\":3,\"value_added\":\"x\"}"
        );
        let pretty = LastInsertOutcome {
            message: None,
            ..outcome
        }
        .render(false)
        .unwrap();
        assert!(pretty.starts_with("{\n"));
    }
}
