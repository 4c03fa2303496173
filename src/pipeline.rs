use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ScrapeError;
use crate::fetcher::{Fetcher, HttpTransport, RetryPolicy, Sleeper, TokioSleeper, Transport};
use crate::notify::{MailNotifier, Notifier};
use crate::parser;
use crate::settings::Settings;
use crate::writer::RolesWriter;

/// Fetch → parse → write, strictly in that order. Nothing touches the output
/// directory until the table is complete.
pub struct Pipeline<T, S, N> {
    fetcher: Fetcher<T, S, N>,
    writer: RolesWriter,
    base_url: String,
    resource_path: String,
}

impl Pipeline<HttpTransport, TokioSleeper, MailNotifier> {
    pub fn from_settings(settings: &Settings) -> Result<Self, ScrapeError> {
        let transport = HttpTransport::new(settings.request_timeout())?;
        let notifier = MailNotifier::new(settings.smtp.clone(), settings.recipients());
        let policy = RetryPolicy {
            retry_limit: settings.retry_limit,
            base_delay: settings.base_delay(),
        };

        Ok(Self::new(
            Fetcher::new(transport, TokioSleeper, notifier, policy),
            RolesWriter::new(&settings.default_output_directory),
            &settings.base_url,
            &settings.resource_path,
        ))
    }
}

impl<T: Transport, S: Sleeper, N: Notifier> Pipeline<T, S, N> {
    pub fn new(
        fetcher: Fetcher<T, S, N>,
        writer: RolesWriter,
        base_url: &str,
        resource_path: &str,
    ) -> Self {
        Self {
            fetcher,
            writer,
            base_url: base_url.to_string(),
            resource_path: resource_path.to_string(),
        }
    }

    /// Scrape the roles page and write it to `output_dir`, or the configured
    /// default directory. Returns the written file.
    pub async fn get_data(
        &self,
        output_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ScrapeError> {
        info!("Fetching hero roles from {}{}", self.base_url, self.resource_path);
        let markup = self
            .fetcher
            .fetch(&self.base_url, &self.resource_path, cancel)
            .await?;

        let table = parser::parse(&markup)?;

        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        self.writer.write(table, output_dir)
    }
}
