//! Executor for reducer effects that run outside the reducer.

use leptos::*;

use crate::{
    host::{self, DesktopHostContext},
    persistence,
    reducer::RuntimeEffect,
    runtime_context::DesktopServices,
};

/// Installs the executors: the effect-queue drain and filesystem autosave.
pub fn install(services: DesktopServices) {
    // Clear the queue before running so effects dispatched meanwhile start a fresh batch.
    create_effect(move |_| {
        let queued = services.effects.get();
        if queued.is_empty() {
            return;
        }

        services.effects.set(Vec::new());

        for effect in queued {
            run_runtime_effect(services, effect);
        }
    });

    create_effect(move |previous: Option<()>| {
        let fs = services.fs.get();
        if previous.is_none() {
            return;
        }
        let store = services
            .host
            .with_value(DesktopHostContext::app_state_store);
        spawn_local(async move {
            if let Err(err) = persistence::persist_filesystem(store.as_ref(), &fs).await {
                logging::warn!("persist filesystem failed: {err}");
            }
        });
    });
}

/// Executes a single queued [`RuntimeEffect`].
pub fn run_runtime_effect(services: DesktopServices, effect: RuntimeEffect) {
    match effect {
        RuntimeEffect::PersistLayout => {
            let store = services
                .host
                .with_value(DesktopHostContext::app_state_store);
            let state = services.state.get_untracked();
            spawn_local(async move {
                if let Err(err) = persistence::persist_layout(store.as_ref(), &state).await {
                    logging::warn!("persist layout failed: {err}");
                }
            });
        }
        RuntimeEffect::FocusWindowInput(window_id) => host::focus_window_input(window_id),
        // Applied to the process table at dispatch time.
        RuntimeEffect::SpawnProcess { .. }
        | RuntimeEffect::KillProcess { .. }
        | RuntimeEffect::SuspendProcess { .. }
        | RuntimeEffect::ResumeProcess { .. } => {}
    }
}
