use std::{sync::Arc, time::Duration};

use crate::delivery::{Mailer, Messenger};
use crate::directory::Directory;
use crate::guard::AccessGuard;
use crate::otp::OtpIssuer;

/// Shared collaborators handed to every handler as `Extension<Arc<AppState>>`.
pub struct AppState {
    guard: Arc<AccessGuard>,
    issuer: Arc<OtpIssuer>,
    directory: Arc<dyn Directory>,
    mailer: Arc<dyn Mailer>,
    messenger: Arc<dyn Messenger>,
}

impl AppState {
    #[must_use]
    pub fn new(
        guard: Arc<AccessGuard>,
        issuer: Arc<OtpIssuer>,
        directory: Arc<dyn Directory>,
        mailer: Arc<dyn Mailer>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            guard,
            issuer,
            directory,
            mailer,
            messenger,
        }
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }

    #[must_use]
    pub fn issuer(&self) -> &OtpIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    #[must_use]
    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    /// Deadline for direct mailer and messenger calls.
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.issuer.config().delivery_timeout()
    }
}
