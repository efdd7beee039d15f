use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::findings::FindingService;
use crate::ledger::ResponseLedger;
use crate::notify::{DisabledNotifier, Notifier, SmtpNotifier};
use crate::report::{ChatCompletionClient, CompletionClient, ReportService};
use crate::sessions::SessionService;
use crate::templates::TemplateService;

/// Assembles every service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    templates: Arc<TemplateService>,
    sessions: Arc<SessionService>,
    findings: Arc<FindingService>,
    reports: Arc<ReportService>,
    ledger: ResponseLedger,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, with collaborators chosen
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;

        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => Arc::new(SmtpNotifier::new(email.clone())),
            None => {
                tracing::info!("SMTP_HOST not set; assignment emails disabled");
                Arc::new(DisabledNotifier)
            }
        };
        let client: Arc<dyn CompletionClient> =
            Arc::new(ChatCompletionClient::new(config.report.clone()));

        Ok(Self::from_parts(
            storage,
            clock,
            notifier,
            client,
            config.public_base_url.clone(),
        ))
    }

    /// Wire services from explicit parts.
    #[must_use]
    pub fn from_parts(
        storage: Storage,
        clock: Clock,
        notifier: Arc<dyn Notifier>,
        client: Arc<dyn CompletionClient>,
        public_base_url: url::Url,
    ) -> Self {
        let ledger = ResponseLedger::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.responses),
        );

        let templates = Arc::new(TemplateService::new(
            clock,
            Arc::clone(&storage.templates),
            Arc::clone(&storage.sessions),
        ));
        let sessions = Arc::new(SessionService::new(
            clock,
            Arc::clone(&storage.templates),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.reports),
            ledger.clone(),
            notifier,
            public_base_url,
        ));
        let findings = Arc::new(FindingService::new(
            Arc::clone(&storage.templates),
            Arc::clone(&storage.sessions),
            ledger.clone(),
        ));
        let reports = Arc::new(ReportService::new(
            clock,
            Arc::clone(&storage.templates),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.reports),
            ledger.clone(),
            client,
        ));

        Self {
            templates,
            sessions,
            findings,
            reports,
            ledger,
        }
    }

    #[must_use]
    pub fn templates(&self) -> Arc<TemplateService> {
        Arc::clone(&self.templates)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn findings(&self) -> Arc<FindingService> {
        Arc::clone(&self.findings)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }

    #[must_use]
    pub fn ledger(&self) -> &ResponseLedger {
        &self.ledger
    }
}
