//! JSON-lines protocol between the driver and the Node.js bridge.
//!
//! Requests go to the bridge's stdin, one object per line. Replies come back
//! on stdout prefixed with [`REPLY_MARKER`]; any other stdout line is noise
//! from page scripts or Playwright and is only logged.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::selectors::WidgetRef;

pub const REPLY_MARKER: &str = "__COURTSNIPE_REPLY__=";

/// Id of the unsolicited reply the bridge sends once the scheduler page is open.
pub const READY_ID: u64 = 0;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeOp {
    ReadDate,
    SetDate {
        date: NaiveDate,
    },
    Reload,
    WaitForText {
        selector: String,
        text: String,
        timeout_ms: u64,
    },
    WaitForVisible {
        selector: String,
        timeout_ms: u64,
    },
    Snapshot,
    IsVisible {
        selector: String,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
        delay_ms: u64,
    },
    ReadDataset {
        widget: WidgetRef,
    },
    SelectOption {
        widget: WidgetRef,
        index: usize,
    },
    SelectedText {
        widget: WidgetRef,
    },
    IsChecked {
        selector: String,
    },
    Screenshot {
        path: String,
    },
    Close {
        trace_path: Option<String>,
    },
}

impl BridgeOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadDate => "readDate",
            Self::SetDate { .. } => "setDate",
            Self::Reload => "reload",
            Self::WaitForText { .. } => "waitForText",
            Self::WaitForVisible { .. } => "waitForVisible",
            Self::Snapshot => "snapshot",
            Self::IsVisible { .. } => "isVisible",
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::ReadDataset { .. } => "readDataset",
            Self::SelectOption { .. } => "selectOption",
            Self::SelectedText { .. } => "selectedText",
            Self::IsChecked { .. } => "isChecked",
            Self::Screenshot { .. } => "screenshot",
            Self::Close { .. } => "close",
        }
    }

    /// How long the bridge itself may spend on this op before the driver gives up.
    pub fn budget(&self, default: Duration) -> Duration {
        match self {
            Self::WaitForText { timeout_ms, .. } | Self::WaitForVisible { timeout_ms, .. } => {
                Duration::from_millis(*timeout_ms)
            }
            _ => default,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BridgeRequest<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub op: &'a BridgeOp,
}

impl BridgeRequest<'_> {
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .with_context(|| format!("Failed to encode bridge request '{}'", self.op.name()))?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeReply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl BridgeReply {
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            return Ok(self.value);
        }
        Err(anyhow!(
            self.error
                .unwrap_or_else(|| "bridge reported an unspecified failure".to_string())
        ))
    }
}

/// Parse one stdout line. `None` when the line is not a reply.
pub fn parse_reply_line(line: &str) -> Option<Result<BridgeReply>> {
    let rest = line.trim_end().strip_prefix(REPLY_MARKER)?;
    Some(serde_json::from_str(rest.trim()).context("Malformed bridge reply"))
}
