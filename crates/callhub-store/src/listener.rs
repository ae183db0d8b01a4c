//! Thin wrapper over `sqlx::postgres::PgListener` with exponential-backoff
//! reconnect, used by `ChangeNotifier` (§4.8). Kept in the store crate since
//! it is a database concern; the enrichment/fan-out logic it feeds lives in
//! the service layer.

use std::time::Duration;

use sqlx::postgres::{PgListener, PgNotification};

use callhub_core::error::AppError;

pub struct ReconnectingListener {
    database_url: String,
    channels: Vec<String>,
    listener: Option<PgListener>,
    backoff: Duration,
}

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl ReconnectingListener {
    pub fn new(database_url: String, channels: Vec<String>) -> Self {
        ReconnectingListener { database_url, channels, listener: None, backoff: BASE_BACKOFF }
    }

    async fn ensure_connected(&mut self) -> Result<(), AppError> {
        if self.listener.is_some() {
            return Ok(());
        }
        loop {
            match PgListener::connect(&self.database_url).await {
                Ok(mut listener) => {
                    let refs: Vec<&str> = self.channels.iter().map(String::as_str).collect();
                    if let Err(e) = listener.listen_all(refs).await {
                        tracing::warn!(error = %e, "failed to subscribe change channels, retrying");
                        self.sleep_backoff().await;
                        continue;
                    }
                    self.listener = Some(listener);
                    self.backoff = BASE_BACKOFF;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "change notification listener disconnected, reconnecting");
                    self.sleep_backoff().await;
                }
            }
        }
    }

    async fn sleep_backoff(&mut self) {
        tokio::time::sleep(self.backoff).await;
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
    }

    /// Waits for the next notification, transparently reconnecting and
    /// re-subscribing on any transport error.
    pub async fn recv(&mut self) -> Result<PgNotification, AppError> {
        loop {
            self.ensure_connected().await?;
            let listener = self.listener.as_mut().expect("connected above");
            match listener.recv().await {
                Ok(notification) => return Ok(notification),
                Err(e) => {
                    tracing::warn!(error = %e, "lost change notification connection");
                    self.listener = None;
                }
            }
        }
    }
}
