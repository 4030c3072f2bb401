pub mod google;
pub mod mock;
pub mod notion;
pub mod oauth;
pub mod ollama;
pub mod traits;

pub use google::GoogleClient;
pub use mock::{MockCalendar, MockGenerator, MockInbox, MockTodos};
pub use notion::NotionTodos;
pub use ollama::OllamaClient;
pub use traits::{
    BusySource, Email, EventSink, MailSource, NewEvent, TextGenerator, Todo, TodoSource,
};

use crate::error::CoreError;

/// Current-thread runtime owned by an HTTP adapter.
///
/// Adapters block on their own runtime so the collaborator traits stay
/// synchronous.
pub(crate) fn adapter_runtime(service: &str) -> Result<tokio::runtime::Runtime, CoreError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CoreError::collaborator_with(service, e))
}

/// Fail on a non-2xx response, keeping the body for the message.
pub(crate) async fn check_status(
    service: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(CoreError::collaborator(service, format!("HTTP {status}: {text}")))
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::OAuthError;

    const SERVICE: &str = "focusroute";

    pub fn get(key: &str) -> Result<Option<String>, OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
