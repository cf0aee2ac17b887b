//! Link lifecycle: tokens, gating, delivery, ingestion and bundles.

pub mod broadcast;
pub mod delivery;
pub mod ingest;
pub mod membership;
pub mod model;
pub mod resolver;
pub mod session;
pub mod token;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use delivery::{DeliveryOrchestrator, DeliveryReport, RetractionKey, RetractionScheduler};
pub use ingest::{BundleStart, IngestDeps, IngestReceipt, IngestionHandler, RevokeReport};
pub use membership::{MembershipOracle, PlatformMembershipOracle};
pub use model::{
    BundleSession, ContentKind, ContentRecord, MessageRef, RecordError, UploadMode, UploadOptions, Uploader,
    UserRecord,
};
pub use resolver::{LinkResolver, Outcome};
pub use session::SessionTracker;
pub use token::{TokenGenerator, deep_link, share_link};
