//! Composition boundary for remote components.
//!
//! A `RemoteSlot` turns one resolution attempt into a three-state unit the
//! rendering layer can always display:
//!
//! ```text
//! Pending --> Ready(component)
//!    \------> Failed(error)
//! ```
//!
//! Failures are logged and replaced by the error fallback; they never reach
//! the surrounding page. Leaving `Ready` or `Failed` takes a fresh resolution
//! request (`retarget` to a different identity, or `reload`).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::container::Props;
use crate::resolver::{ModuleResolver, ResolveError, ResolvedComponent};

/// Why a slot ended up in the error state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Resolution of {remote}/{component} ended without a result")]
    Interrupted { remote: String, component: String },

    #[error("{remote}/{component} panicked while rendering: {message}")]
    Render {
        remote: String,
        component: String,
        message: String,
    },
}

/// Current state of a slot.
#[derive(Debug, Clone)]
pub enum SlotState {
    Pending,
    Ready(ResolvedComponent),
    Failed(BoundaryError),
}

impl SlotState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

type Outcome = Result<ResolvedComponent, ResolveError>;

/// A placeholder for one remote component inside a host page.
pub struct RemoteSlot {
    resolver: Arc<ModuleResolver>,
    remote: String,
    component: String,
    fallback: Option<String>,
    error_fallback: Option<String>,
    state: SlotState,
    pending: Option<oneshot::Receiver<Outcome>>,
}

impl RemoteSlot {
    /// Create a slot and start resolving its component.
    ///
    /// Resolution runs in the background when a tokio runtime is available;
    /// otherwise it starts on the first call to [`RemoteSlot::settled`].
    pub fn new(
        resolver: Arc<ModuleResolver>,
        remote: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        let mut slot = Self {
            resolver,
            remote: remote.into(),
            component: component.into(),
            fallback: None,
            error_fallback: None,
            state: SlotState::Pending,
            pending: None,
        };
        slot.start();
        slot
    }

    /// Markup shown while the component is loading.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Markup shown when the component is unavailable.
    pub fn with_error_fallback(mut self, error_fallback: impl Into<String>) -> Self {
        self.error_fallback = Some(error_fallback.into());
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Current state, picking up a finished resolution without waiting.
    pub fn state(&mut self) -> &SlotState {
        if let Some(rx) = self.pending.as_mut() {
            match rx.try_recv() {
                Ok(outcome) => self.finish(Some(outcome)),
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => self.finish(None),
            }
        }
        &self.state
    }

    /// Wait until the slot leaves the pending state.
    pub async fn settled(&mut self) -> &SlotState {
        if let Some(rx) = self.pending.take() {
            let outcome = rx.await.ok();
            self.finish(outcome);
        } else if self.state.is_pending() {
            let outcome = self
                .resolver
                .resolve_component(&self.remote, &self.component)
                .await;
            self.finish(Some(outcome));
        }
        &self.state
    }

    /// Point the slot at another component.
    ///
    /// Only a change of identity starts a new resolution.
    pub fn retarget(&mut self, remote: &str, component: &str) {
        if self.remote == remote && self.component == component {
            return;
        }
        self.remote = remote.to_string();
        self.component = component.to_string();
        self.start();
    }

    /// Discard the current outcome and resolve again.
    pub fn reload(&mut self) {
        self.start();
    }

    /// Render whatever the current state calls for.
    ///
    /// `props` are forwarded untouched to a ready component.
    pub fn render(&mut self, props: &Props) -> String {
        self.state();

        let failure = match &self.state {
            SlotState::Pending => return self.pending_markup(),
            SlotState::Failed(_) => return self.error_markup(),
            SlotState::Ready(resolved) => {
                let component = Arc::clone(&resolved.component);
                match catch_unwind(AssertUnwindSafe(|| component.render(props))) {
                    Ok(markup) => return markup,
                    Err(panic) => BoundaryError::Render {
                        remote: self.remote.clone(),
                        component: self.component.clone(),
                        message: panic_message(panic.as_ref()),
                    },
                }
            }
        };

        self.fail(failure);
        self.error_markup()
    }

    fn start(&mut self) {
        self.state = SlotState::Pending;
        self.pending = None;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let resolver = Arc::clone(&self.resolver);
        let remote = self.remote.clone();
        let component = self.component.clone();
        handle.spawn(async move {
            let outcome = resolver.resolve_component(&remote, &component).await;
            // The slot may have been dropped or retargeted; the caches stay warm either way.
            let _ = tx.send(outcome);
        });
        self.pending = Some(rx);
    }

    fn finish(&mut self, outcome: Option<Outcome>) {
        self.pending = None;
        match outcome {
            Some(Ok(resolved)) => self.state = SlotState::Ready(resolved),
            Some(Err(err)) => self.fail(err.into()),
            None => self.fail(BoundaryError::Interrupted {
                remote: self.remote.clone(),
                component: self.component.clone(),
            }),
        }
    }

    fn fail(&mut self, err: BoundaryError) {
        log::warn!(
            "[RemoteSlot] Failed to load {}/{}: {}",
            self.remote,
            self.component,
            err
        );
        self.state = SlotState::Failed(err);
    }

    fn pending_markup(&self) -> String {
        self.fallback
            .clone()
            .unwrap_or_else(|| default_fallback(&self.component))
    }

    fn error_markup(&self) -> String {
        self.error_fallback
            .clone()
            .unwrap_or_else(|| default_error_fallback(&self.remote, &self.component))
    }
}

/// Placeholder shown while a component loads.
pub fn default_fallback(component: &str) -> String {
    format!("Loading {}...", component)
}

/// Message shown when a component cannot be loaded.
pub fn default_error_fallback(remote: &str, component: &str) -> String {
    format!(
        "{} is currently unavailable. The {} microfrontend may be offline.",
        component, remote
    )
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
