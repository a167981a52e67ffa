//! Application state shared across handlers

use crate::auth::{AccountProvider, CredentialVerifier, IdentityToolkit, MemoryAuth};
use crate::catalog::Catalog;
use crate::config::{BackendKind, Settings};
use crate::metrics::Metrics;
use crate::network::HttpClient;
use crate::reviews::ReviewService;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, MeteredStore};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Product listing and lookup
    pub catalog: Arc<Catalog>,
    /// Review mutations
    pub reviews: Arc<ReviewService>,
    /// Bearer token verification
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Sign-up and sign-in
    pub accounts: Arc<dyn AccountProvider>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Build the configured backend and everything on top of it
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let (store, verifier, accounts): (
            Arc<dyn DocumentStore>,
            Arc<dyn CredentialVerifier>,
            Arc<dyn AccountProvider>,
        ) = match settings.backend.kind {
            BackendKind::Firebase => {
                let client = HttpClient::with_settings(&settings.outgoing)?;
                let store: Arc<dyn DocumentStore> =
                    Arc::new(FirestoreStore::new(client.clone(), &settings.backend)?);
                let identity = Arc::new(IdentityToolkit::new(client, &settings.backend)?);
                info!(
                    "Using Firestore project {} ({})",
                    settings.backend.project_id, settings.backend.database
                );
                let verifier: Arc<dyn CredentialVerifier> = identity.clone();
                let accounts: Arc<dyn AccountProvider> = identity;
                (store, verifier, accounts)
            }
            BackendKind::Memory => {
                let store = MemoryStore::new();
                if let Some(ref seed) = settings.backend.seed_file {
                    store
                        .load_seed_file(
                            seed,
                            &settings.catalog.products_collection,
                            &settings.catalog.categories_collection,
                            settings.catalog.id_pad_width,
                        )
                        .await?;
                }
                let auth = Arc::new(MemoryAuth::with_static_tokens(
                    &settings.backend.static_tokens,
                ));
                info!("Using in-memory backend");
                let store: Arc<dyn DocumentStore> = Arc::new(store);
                let verifier: Arc<dyn CredentialVerifier> = auth.clone();
                let accounts: Arc<dyn AccountProvider> = auth;
                (store, verifier, accounts)
            }
        };

        Ok(Self::with_parts(settings, store, verifier, accounts))
    }

    /// Assemble state around already constructed collaborators
    pub fn with_parts(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        verifier: Arc<dyn CredentialVerifier>,
        accounts: Arc<dyn AccountProvider>,
    ) -> Self {
        info!("Document store: {}", store.name());
        let metrics = Arc::new(Metrics::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MeteredStore::new(store, metrics.clone()));
        let catalog = Arc::new(Catalog::new(store.clone(), settings.catalog.clone()));
        let reviews = Arc::new(ReviewService::new(
            store,
            settings.catalog.clone(),
            metrics.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            catalog,
            reviews,
            verifier,
            accounts,
            metrics,
        }
    }
}
