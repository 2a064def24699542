use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};
use wit_common::{LircConfig, ModeToken};

use crate::error::ActuatorError;

/// Sends a mode token to the heating/cooling unit.
pub trait Actuator: Send + Sync + 'static {
    fn transmit(&self, token: &ModeToken) -> impl Future<Output = Result<(), ActuatorError>> + Send;

    fn diagnostics(&self) -> ActuatorDiagnostics {
        ActuatorDiagnostics::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActuatorDiagnostics {
    #[serde(rename = "sentCommands")]
    pub sent_commands: u64,
    #[serde(rename = "failedCommands")]
    pub failed_commands: u64,
    #[serde(rename = "lastCommand")]
    pub last_command: Option<String>,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

/// Transmits through lirc's `irsend SEND_ONCE`.
///
/// There is no timeout: a hung `irsend` stalls the caller.
pub struct IrSend {
    lirc: LircConfig,
    sent_commands: AtomicU64,
    failed_commands: AtomicU64,
    last: Mutex<(Option<String>, Option<String>)>,
}

impl IrSend {
    pub fn new(lirc: LircConfig) -> Self {
        Self {
            lirc,
            sent_commands: AtomicU64::new(0),
            failed_commands: AtomicU64::new(0),
            last: Mutex::new((None, None)),
        }
    }

    pub fn args(&self, token: &ModeToken) -> Vec<String> {
        vec![
            format!("--device={}", self.lirc.device),
            "SEND_ONCE".to_string(),
            self.lirc.remote.clone(),
            token.to_string(),
        ]
    }

    async fn run(&self, token: &ModeToken) -> Result<(), ActuatorError> {
        let program = self.lirc.irsend.clone();
        let status = Command::new(&program)
            .args(self.args(token))
            .status()
            .await
            .map_err(|source| ActuatorError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ActuatorError::Exit {
                program,
                status: status.to_string(),
            })
        }
    }

    fn record(&self, token: &ModeToken, result: &Result<(), ActuatorError>) {
        let error = match result {
            Ok(()) => {
                self.sent_commands.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(err) => {
                self.failed_commands.fetch_add(1, Ordering::Relaxed);
                Some(err.to_string())
            }
        };

        if let Ok(mut last) = self.last.lock() {
            last.0 = Some(token.to_string());
            if error.is_some() {
                last.1 = error;
            }
        }
    }
}

impl Actuator for IrSend {
    async fn transmit(&self, token: &ModeToken) -> Result<(), ActuatorError> {
        info!(token = %token, remote = %self.lirc.remote, "transmitting");
        let result = self.run(token).await;
        if let Err(err) = &result {
            warn!(token = %token, "transmission failed: {err}");
        }
        self.record(token, &result);
        result
    }

    fn diagnostics(&self) -> ActuatorDiagnostics {
        let (last_command, last_error) = self
            .last
            .lock()
            .map(|last| last.clone())
            .unwrap_or_default();

        ActuatorDiagnostics {
            sent_commands: self.sent_commands.load(Ordering::Relaxed),
            failed_commands: self.failed_commands.load(Ordering::Relaxed),
            last_command,
            last_error,
        }
    }
}
