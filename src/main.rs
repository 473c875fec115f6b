//! Agent entry point: loads the TOML config, installs tracing and runs the
//! supervised tasks until a signal or a fatal task error.
//!
//! Config path: first CLI argument, else `ENVIROVISOR_CONFIG`, else
//! `envirovisor.toml`.
//!
//! | outcome                          | status |
//! |----------------------------------|--------|
//! | clean shutdown                   | 0      |
//! | a task died                      | 1      |
//! | shutdown abandoned stuck tasks   | 2      |

use std::{env, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use envirovisor::{Agent, AgentConfig, LogWriter, RuntimeError, Subscribe};
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "envirovisor.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("ENVIROVISOR_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = AgentConfig::load(&path).with_context(|| format!("loading {path}"))?;

    info!(
        config = %path,
        location = %cfg.dispatch.location(),
        sensors = ?cfg.sensors.enabled().map(|k| k.name()).collect::<Vec<_>>(),
        "starting envirovisor"
    );

    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
    let agent = Agent::builder(cfg)
        .with_subscribers(subscribers)
        .build()
        .context("assembling agent")?;

    let res = agent.run().await;
    match &res {
        Ok(()) => info!("envirovisor stopped"),
        Err(e @ RuntimeError::GraceExceeded { .. }) => {
            error!(error = %e, label = e.as_label(), "shutdown did not complete in time")
        }
        Err(e) => error!(error = %e, label = e.as_label(), "fatal error, exiting"),
    }
    Ok(ExitCode::from(exit_status(&res)))
}

fn exit_status(res: &Result<(), RuntimeError>) -> u8 {
    match res {
        Ok(()) => 0,
        Err(RuntimeError::GraceExceeded { .. }) => 2,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn abandoned_tasks_exit_non_zero() {
        assert_eq!(exit_status(&Ok(())), 0);

        let died = RuntimeError::TaskDied {
            task: "dispatcher".into(),
            reason: "cannot open store session".into(),
        };
        assert_eq!(exit_status(&Err(died)), 1);

        let stuck = RuntimeError::GraceExceeded {
            grace: Duration::from_secs(5),
            stuck: vec!["watchdog".into()],
        };
        assert_eq!(exit_status(&Err(stuck)), 2);
    }
}
