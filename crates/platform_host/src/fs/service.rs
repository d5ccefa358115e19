//! Permission-gate contracts for privileged filesystem and system operations.

use std::{cell::RefCell, collections::HashMap, future::Future, pin::Pin, rc::Rc};

use serde::{Deserialize, Serialize};

use super::types::{FsRefusal, ItemId};

/// Object-safe boxed future used by [`PermissionGate`] and [`PermissionPrompter`].
pub type PermissionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Operations that must pass the permission gate before running.
pub enum PrivilegedOperation {
    /// Reading file content on behalf of an app.
    ReadFile,
    /// Writing file content or creating items.
    WriteFile,
    /// Permanently deleting items.
    DeleteItem,
    /// Emptying a trash container.
    EmptyTrash,
    /// Replacing the filesystem from a snapshot.
    ImportSnapshot,
    /// Exporting the filesystem snapshot.
    ExportSnapshot,
    /// Changing system-level settings.
    SystemSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Answer returned by a [`PermissionGate`].
pub enum PermissionDecision {
    /// Proceed immediately.
    Granted,
    /// Abort.
    Denied,
    /// Ask the user and wait for the answer.
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A privileged operation requested by an app.
pub struct PermissionRequest {
    /// Canonical id of the requesting app.
    pub app_id: String,
    /// Operation being requested.
    pub operation: PrivilegedOperation,
    /// Item the operation targets, when there is one.
    pub target: Option<ItemId>,
}

impl PermissionRequest {
    /// Creates a request without a target item.
    pub fn new(app_id: impl Into<String>, operation: PrivilegedOperation) -> Self {
        Self {
            app_id: app_id.into(),
            operation,
            target: None,
        }
    }

    /// Attaches the targeted item.
    pub fn with_target(mut self, target: ItemId) -> Self {
        self.target = Some(target);
        self
    }

    fn label(&self) -> String {
        format!("{}:{:?}", self.app_id, self.operation)
    }
}

/// Host service answering whether an app may perform a privileged operation.
pub trait PermissionGate {
    /// Returns the current decision for `request`.
    fn check<'a>(&'a self, request: &'a PermissionRequest)
        -> PermissionFuture<'a, PermissionDecision>;
}

/// Host UI that asks the user to approve a prompted request.
pub trait PermissionPrompter {
    /// Resolves to `true` when the user approves.
    fn ask<'a>(&'a self, request: &'a PermissionRequest) -> PermissionFuture<'a, bool>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Gate that grants everything; used when no policy is installed.
pub struct AllowAllPermissionGate;

impl PermissionGate for AllowAllPermissionGate {
    fn check<'a>(
        &'a self,
        _request: &'a PermissionRequest,
    ) -> PermissionFuture<'a, PermissionDecision> {
        Box::pin(async { PermissionDecision::Granted })
    }
}

#[derive(Debug, Clone)]
/// In-memory rule table keyed by app id and operation.
pub struct MemoryPermissionGate {
    rules: Rc<RefCell<HashMap<(String, PrivilegedOperation), PermissionDecision>>>,
    fallback: PermissionDecision,
}

impl MemoryPermissionGate {
    /// Creates a gate answering `fallback` for requests without a rule.
    pub fn new(fallback: PermissionDecision) -> Self {
        Self {
            rules: Rc::new(RefCell::new(HashMap::new())),
            fallback,
        }
    }

    /// Sets the decision for one app/operation pair.
    pub fn set_rule(
        &self,
        app_id: impl Into<String>,
        operation: PrivilegedOperation,
        decision: PermissionDecision,
    ) {
        self.rules
            .borrow_mut()
            .insert((app_id.into(), operation), decision);
    }
}

impl PermissionGate for MemoryPermissionGate {
    fn check<'a>(
        &'a self,
        request: &'a PermissionRequest,
    ) -> PermissionFuture<'a, PermissionDecision> {
        Box::pin(async move {
            self.rules
                .borrow()
                .get(&(request.app_id.clone(), request.operation))
                .copied()
                .unwrap_or(self.fallback)
        })
    }
}

#[derive(Debug, Clone, Copy)]
/// Prompter that always answers the same way.
pub struct FixedPrompter(pub bool);

impl PermissionPrompter for FixedPrompter {
    fn ask<'a>(&'a self, _request: &'a PermissionRequest) -> PermissionFuture<'a, bool> {
        let answer = self.0;
        Box::pin(async move { answer })
    }
}

/// Runs `request` through the gate, awaiting the prompter when the gate asks for a prompt.
///
/// # Errors
///
/// Returns [`FsRefusal::PermissionDenied`] when the gate denies or the user declines.
pub async fn authorize(
    gate: &dyn PermissionGate,
    prompter: &dyn PermissionPrompter,
    request: &PermissionRequest,
) -> Result<(), FsRefusal> {
    let approved = match gate.check(request).await {
        PermissionDecision::Granted => true,
        PermissionDecision::Denied => false,
        PermissionDecision::Prompt => prompter.ask(request).await,
    };
    if approved {
        Ok(())
    } else {
        Err(FsRefusal::PermissionDenied(request.label()))
    }
}
