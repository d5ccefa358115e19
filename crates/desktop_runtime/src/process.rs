//! Logical process table for hosted app instances.
//!
//! A process is the lifecycle record of one app instance. It is bound to the window that hosts
//! it; the window manager drives spawn/suspend/resume/kill through reducer lifecycle effects,
//! while app faults mark a process crashed without touching its window.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AppId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    Launching,
    Running,
    Suspended,
    Crashed,
    Killed,
}

impl ProcessState {
    /// `killed` and `crashed` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Crashed | Self::Killed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: ProcessId,
    pub app_id: AppId,
    pub window_id: Option<WindowId>,
    pub state: ProcessState,
    pub start_time_unix_ms: u64,
    pub crash_message: Option<String>,
    pub ended_at_unix_ms: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("process {0} not found")]
    NotFound(ProcessId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Process table keyed by monotonic pid. Terminal rows are kept for inspection.
pub struct ProcessTable {
    next_pid: u64,
    records: Vec<ProcessRecord>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            next_pid: 1,
            records: Vec::new(),
        }
    }
}

impl ProcessTable {
    /// Starts a process for `app_id`, bound to `window_id` when given.
    ///
    /// The record passes through `launching` and is `running` on return.
    pub fn spawn(&mut self, app_id: AppId, window_id: Option<WindowId>) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid = self.next_pid.saturating_add(1);
        let mut record = ProcessRecord {
            pid,
            app_id,
            window_id,
            state: ProcessState::Launching,
            start_time_unix_ms: platform_host::unix_time_ms_now(),
            crash_message: None,
            ended_at_unix_ms: None,
        };
        record.state = ProcessState::Running;
        self.records.push(record);
        pid
    }

    pub fn get(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.records.iter().find(|p| p.pid == pid)
    }

    fn get_mut(&mut self, pid: ProcessId) -> Result<&mut ProcessRecord, ProcessError> {
        self.records
            .iter_mut()
            .find(|p| p.pid == pid)
            .ok_or(ProcessError::NotFound(pid))
    }

    /// Running → suspended. Other states are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] for unknown pids.
    pub fn suspend(&mut self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        let record = self.get_mut(pid)?;
        if record.state == ProcessState::Running {
            record.state = ProcessState::Suspended;
        }
        Ok(record.state)
    }

    /// Suspended → running. Other states are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] for unknown pids.
    pub fn resume(&mut self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        let record = self.get_mut(pid)?;
        if record.state == ProcessState::Suspended {
            record.state = ProcessState::Running;
        }
        Ok(record.state)
    }

    /// Marks a process killed. Idempotent; a crashed process keeps its crashed state.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] for unknown pids.
    pub fn kill(&mut self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        let record = self.get_mut(pid)?;
        if !record.state.is_terminal() {
            record.state = ProcessState::Killed;
            record.ended_at_unix_ms = Some(platform_host::unix_time_ms_now());
        }
        Ok(record.state)
    }

    /// Marks a live process crashed with `message`. Terminal processes are unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] for unknown pids.
    pub fn crash(&mut self, pid: ProcessId, message: &str) -> Result<ProcessState, ProcessError> {
        let record = self.get_mut(pid)?;
        if !record.state.is_terminal() {
            record.state = ProcessState::Crashed;
            record.crash_message = Some(message.to_string());
            record.ended_at_unix_ms = Some(platform_host::unix_time_ms_now());
        }
        Ok(record.state)
    }

    /// Most recent non-killed process bound to `window_id`.
    pub fn get_by_window(&self, window_id: WindowId) -> Option<&ProcessRecord> {
        self.records
            .iter()
            .rev()
            .find(|p| p.window_id == Some(window_id) && p.state != ProcessState::Killed)
    }

    /// Window-removal hook: kills live processes bound to `window_id` and detaches the window.
    ///
    /// Returns the pids that were bound to the window.
    pub fn release_window(&mut self, window_id: WindowId) -> Vec<ProcessId> {
        let now = platform_host::unix_time_ms_now();
        let mut released = Vec::new();
        for record in self
            .records
            .iter_mut()
            .filter(|p| p.window_id == Some(window_id))
        {
            if !record.state.is_terminal() {
                record.state = ProcessState::Killed;
                record.ended_at_unix_ms = Some(now);
            }
            record.window_id = None;
            released.push(record.pid);
        }
        released
    }

    /// Full table including terminal rows, in spawn order.
    pub fn processes(&self) -> &[ProcessRecord] {
        &self.records
    }
}
