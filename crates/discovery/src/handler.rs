//! Hooks invoked by the event loop on membership changes

use async_trait::async_trait;

use crate::member::Member;

/// Error returned by a member hook
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Observes membership changes.
///
/// Hooks run inline on the event loop, so a slow hook delays every event
/// behind it. Errors from `on_member_join` and `on_member_update` are
/// logged and the member is registered anyway. `on_member_leave` runs after
/// the member has already been removed.
#[async_trait]
pub trait MemberHandler: Send + Sync + 'static {
    /// Called before a joining member is registered
    async fn on_member_join(&self, _member: &Member) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called before an updated member replaces the registered one
    async fn on_member_update(&self, _member: &Member) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called after a leaving or failed member is removed
    async fn on_member_leave(&self, _member: &Member) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Handler that accepts everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl MemberHandler for NoopHandler {}
