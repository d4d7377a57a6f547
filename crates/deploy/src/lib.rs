//! geopack-deploy - Deployment library for booster pack NFT collections.
//!
//! This crate validates a set of card images and their rarities, uploads them
//! to the marketplace, registers a metadata draft, deploys the drop and token
//! contracts through the factory, confirms the draft and waits for the
//! marketplace to index the new collection.

pub mod abi;
pub mod auth;
pub mod cache;
pub mod chain;
pub mod config;
pub mod deployer;
pub mod draft;
pub mod drop_client;
pub mod economics;
pub mod error;
pub mod flow;
pub mod marketplace;
pub mod metadata;
pub mod progress;
pub mod rarity;
pub mod readiness;
pub mod retry;
pub mod rpc;
pub mod sanitize;
pub mod uploader;
pub mod validate;

pub use auth::{AuthState, Authenticator, LocalWallet, RpcWallet, Wallet};
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use chain::{Chain, ReceiptLog, RpcChain, TxReceipt, TxRequest};
pub use config::{
    ChainConfig, Config, ContractsConfig, DeploymentConfig, MarketplaceConfig, CONFIG_FILENAME,
};
pub use deployer::{CreatedDrop, DeploymentResult, OnchainDeployer};
pub use draft::{DraftId, DraftRecord};
pub use drop_client::DropClient;
pub use economics::{ContractConfig, Economics};
pub use error::DeployError;
pub use flow::{DeploymentFlow, DeploymentOutcome, DeploymentRequest, FlowSettings};
pub use marketplace::{
    AuthChallenge, CollectionSummary, ConfirmRequest, ConfirmResponse, DraftResponse,
    HttpMarketplace, MarketplaceApi, ResponseCache,
};
pub use metadata::{
    CollectionForm, CollectionMetadata, ImageFile, MetadataItem, RarityAssignment, UploadedFile,
};
pub use progress::{DeploymentState, DeploymentStep, Progress, ProgressReporter};
pub use rarity::Rarity;
pub use readiness::ReadinessPoller;
pub use retry::RetryPolicy;
pub use sanitize::ChainErrorKind;
pub use uploader::MetadataUploader;
pub use validate::ValidationReport;
