//! End-to-end deployment of a collection.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    CollectionForm, CollectionMetadata, Config, ConfirmRequest, ContractConfig, DeployError,
    DeploymentResult, DeploymentState, DeploymentStep, DraftRecord, Economics, ImageFile,
    MarketplaceApi, MetadataUploader, OnchainDeployer, Progress, ProgressReporter,
    RarityAssignment, ReadinessPoller, Wallet,
    auth::Authenticator,
    chain::{Chain, ensure_sender_managed},
    metadata::pair_with_rarities,
    validate::validate,
};

/// Default lifetime of a marketplace bearer token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Everything the flow needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub chain_id: u64,
    pub economics: Economics,
    pub base_uri_template: String,
    pub uploader: MetadataUploader,
    pub readiness: ReadinessPoller,
    pub deployer: OnchainDeployer,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Result<Self, DeployError> {
        let factory = config
            .factory()
            .map_err(|e| DeployError::Config(e.to_string()))?;
        let deployment = &config.deployment;

        Ok(Self {
            chain_id: config.chain.chain_id,
            economics: config.economics,
            base_uri_template: deployment.base_uri_template.clone(),
            uploader: MetadataUploader::new(deployment.upload_batch_size, deployment.retry),
            readiness: ReadinessPoller::new(
                deployment.readiness_interval(),
                deployment.readiness_max_attempts,
            ),
            deployer: OnchainDeployer::new(factory)
                .with_fee_wrapper(config.contracts.fee_wrapper)
                .with_tx_timeout(deployment.tx_timeout())
                .with_receipt_poll_interval(deployment.receipt_poll_interval())
                .with_retry(deployment.retry),
        })
    }
}

/// User input for one deployment.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub form: CollectionForm,
    pub images: Vec<ImageFile>,
    pub rarities: Vec<RarityAssignment>,
}

/// A completed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    pub draft: DraftRecord,
    pub deployment: DeploymentResult,
    pub collection_url: Option<String>,
    /// Whether the marketplace finished indexing within the polling window.
    pub ready: bool,
}

/// Drives validate, authenticate, upload, draft, deploy, confirm and poll
/// in order, publishing progress along the way.
#[derive(Debug)]
pub struct DeploymentFlow<M, C, W> {
    api: M,
    chain: C,
    wallet: W,
    auth: Authenticator,
    settings: FlowSettings,
    progress: ProgressReporter,
}

impl<M, C, W> DeploymentFlow<M, C, W>
where
    M: MarketplaceApi,
    C: Chain,
    W: Wallet,
{
    pub fn new(api: M, chain: C, wallet: W, settings: FlowSettings) -> Self {
        Self {
            api,
            chain,
            wallet,
            auth: Authenticator::new(DEFAULT_TOKEN_TTL),
            settings,
            progress: ProgressReporter::new(),
        }
    }

    pub fn with_authenticator(mut self, auth: Authenticator) -> Self {
        self.auth = auth;
        self
    }

    pub fn api(&self) -> &M {
        &self.api
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    /// Return to `Idle` so another deployment can run.
    pub fn reset(&self) {
        tracing::debug!("Deployment flow reset");
        self.progress.reset();
    }

    /// Run a deployment from `Idle` to `Complete`.
    ///
    /// Fails with [`DeployError::State`] without touching the reporter when
    /// another deployment holds it. Any other failure moves the state to
    /// `Error` with the error's message.
    pub async fn run(&self, request: DeploymentRequest) -> Result<DeploymentOutcome, DeployError> {
        self.progress
            .begin(DeploymentStep::Validating, "Validating images and rarities")
            .map_err(|e| DeployError::state(&e))?;

        let result = self.execute(request).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, retryable = e.is_retryable(), "Deployment failed");
            self.progress.fail(e.to_string());
        }
        result
    }

    async fn execute(&self, request: DeploymentRequest) -> Result<DeploymentOutcome, DeployError> {
        let report = validate(&request.images, &request.rarities);
        if !report.valid {
            return Err(DeployError::Validation(report.errors));
        }
        let mut files = pair_with_rarities(request.images, &request.rarities)
            .map_err(|e| DeployError::Validation(vec![e.to_string()]))?;

        ensure_sender_managed(&self.chain, self.wallet.address())
            .await
            .map_err(|e| DeployError::Config(format!("{:#}", e)))?;

        self.step(DeploymentStep::Authenticating, "Authenticating wallet")?;
        let token = self
            .auth
            .authenticate(&self.api, &self.wallet)
            .await
            .map_err(|e| DeployError::network(DeploymentStep::Authenticating, &e))?;

        self.step(
            DeploymentStep::Uploading,
            format!("Uploading {} images", files.len()),
        )?;
        self.settings
            .uploader
            .upload_all(&self.api, &token, &mut files)
            .await
            .map_err(|e| DeployError::network(DeploymentStep::Uploading, &e))?;

        self.step(DeploymentStep::GeneratingSlug, "Generating collection slug")?;
        let mut form = request.form;
        form.creator = self.wallet.address();
        let slug = self.slug_for(&form.name).await;

        let metadata = CollectionMetadata::from_uploads(&form, &slug, &files)
            .map_err(|e| DeployError::Validation(vec![e.to_string()]))?;
        let contract_config = ContractConfig::for_slug(
            &self.settings.economics,
            &self.settings.base_uri_template,
            &slug,
        )
        .map_err(|e| DeployError::Config(e.to_string()))?;

        self.step(DeploymentStep::Drafting, "Creating metadata draft")?;
        let response = self
            .api
            .create_draft(&token, &metadata)
            .await
            .map_err(|e| DeployError::network(DeploymentStep::Drafting, &e))?;
        let draft = DraftRecord::from_response(response, metadata, contract_config)
            .map_err(|e| DeployError::network(DeploymentStep::Drafting, &e))?;
        tracing::info!(draft_id = %draft.draft_id, slug = %draft.slug, "Draft created");

        let deployment = self
            .settings
            .deployer
            .deploy(&self.chain, self.wallet.address(), &draft, &self.progress)
            .await?;

        self.step(DeploymentStep::ConfirmingDraft, "Confirming draft")?;
        let confirm = ConfirmRequest {
            draft_id: draft.draft_id.to_string(),
            tx_hash: deployment.tx_hash,
            drop_contract: deployment.drop_contract,
            token_contract: deployment.token_contract,
        };
        let confirmed = self
            .api
            .confirm_draft(&token, &confirm)
            .await
            .map_err(|e| DeployError::network(DeploymentStep::ConfirmingDraft, &e))?;
        if !confirmed.success {
            return Err(DeployError::Network {
                step: DeploymentStep::ConfirmingDraft,
                message: "Marketplace did not confirm the draft".to_string(),
            });
        }
        tracing::info!(draft_id = %draft.draft_id, "Draft confirmed");

        self.advance(
            DeploymentState::Ready,
            DeploymentStep::PollingReadiness,
            "Waiting for the marketplace to index the collection",
        )?;
        let ready = match deployment.drop_contract {
            Some(contract) => {
                self.settings
                    .readiness
                    .poll_until_ready(&self.api, contract, self.settings.chain_id)
                    .await
            }
            None => {
                tracing::warn!("Drop address unknown, skipping readiness polling");
                false
            }
        };

        let message = if ready {
            "Collection is live"
        } else {
            "Collection deployed, marketplace indexing still pending"
        };
        self.progress
            .advance(DeploymentState::Complete, None, message)
            .map_err(|e| DeployError::state(&e))?;

        Ok(DeploymentOutcome {
            draft,
            deployment,
            collection_url: confirmed.collection_url,
            ready,
        })
    }

    /// Marketplace slug for `name`, or a local one if the service fails.
    async fn slug_for(&self, name: &str) -> String {
        match self.api.generate_slug(name).await {
            Ok(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
            Ok(_) => {
                let slug = local_slug(name);
                tracing::warn!(%slug, "Marketplace returned an empty slug, using a local one");
                slug
            }
            Err(e) => {
                let slug = local_slug(name);
                tracing::warn!(error = %e, %slug, "Slug generation failed, using a local one");
                slug
            }
        }
    }

    fn advance(
        &self,
        state: DeploymentState,
        step: DeploymentStep,
        message: impl Into<String>,
    ) -> Result<(), DeployError> {
        self.progress
            .advance(state, Some(step), message)
            .map_err(|e| DeployError::state(&e))
    }

    fn step(&self, step: DeploymentStep, message: impl Into<String>) -> Result<(), DeployError> {
        self.progress
            .step(step, message)
            .map_err(|e| DeployError::state(&e))
    }
}

/// URL-safe slug from `name` with a random suffix.
pub fn local_slug(name: &str) -> String {
    let mut base = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    let base = base.trim_end_matches('-');
    let base = if base.is_empty() { "collection" } else { base };

    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{}-{:06x}", base, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_slug() {
        let slug = local_slug("  Geo Cards: Season #2 ");
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "geo-cards-season-2");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_local_slug_of_symbols_only() {
        assert!(local_slug("!!!").starts_with("collection-"));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        assert!(matches!(
            FlowSettings::from_config(&config),
            Err(DeployError::Config(_))
        ));

        config.contracts.factory = Some(alloy_core::primitives::Address::repeat_byte(0xfa));
        config.deployment.upload_batch_size = 4;
        let settings = FlowSettings::from_config(&config).unwrap();
        assert_eq!(settings.uploader.batch_size(), 4);
        assert_eq!(settings.readiness.max_attempts, 30);
        assert_eq!(settings.deployer.factory(), config.contracts.factory.unwrap());
    }
}
