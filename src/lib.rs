//! # Layer Mint
//!
//! A generative NFT collection pipeline. Your filesystem is the input: layer
//! directories become compositing slots, rarity-suffixed images become
//! weighted options, and the pipeline turns them into numbered editions with
//! metadata, published to content-addressed storage.
//!
//! # Architecture: Jobs Over a Lifecycle
//!
//! A collection moves through a fixed lifecycle, each transition driven by a
//! queued job:
//!
//! ```text
//! CREATED ──generate/upload──▶ PROCESSING ──job──▶ PROCESSED
//!                                  │ (failure)        │
//!                                  ▼                  ▼ sync
//!                               CREATED           UPLOADING ──job──▶ UPLOADED ──▶ DEPLOYED
//!                                                     │ (failure)
//!                                                     ▼
//!                                                 PROCESSED
//! ```
//!
//! All jobs run through one single-concurrency queue. This is deliberate:
//! the scratch directories are shared between runs, so serializing the jobs
//! replaces any per-directory locking, and every status write lands in a
//! total order. Each job's heavy body runs on an isolated thread — a crash
//! there is contained and rolled back, never fatal to the queue.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`service`] | Request validation and the lifecycle state machine — the front door |
//! | [`queue`] | Single-concurrency FIFO job dispatcher |
//! | [`jobs`] | The five pipeline jobs and their success/failure ledgers |
//! | [`layers`] | Layer discovery — turns layer directories into an ordered layer set |
//! | [`rarity`] | Rarity classes, weights, and the weighted option selector |
//! | [`compose`] | Edition compositing — weighted draws overlaid onto a canvas, in parallel |
//! | [`metadata`] | Per-edition metadata records: accumulation, display transforms, flush |
//! | [`staging`] | Directory roles, empty-dir preconditions, staging, edition compaction |
//! | [`publish`] | Two-phase publication: images first, rewritten metadata second |
//! | [`collection`] | Collection records, the status lifecycle, and the JSON-backed store |
//! | [`naming`] | `{label}_{rarity}.png` option filename parser and display transforms |
//! | [`config`] | `layer-mint.toml` loading, validation and directory layout |
//!
//! # Design Decisions
//!
//! ## Two-Phase Publication
//!
//! Images and metadata upload as two separate batches, in that order. The
//! metadata files reference the images by content hash (`ipfs://{hash}/{n}`),
//! so the image hash must exist before any metadata file can be finalized.
//! Rewriting happens in place in the staging directory between the phases;
//! only after every file is rewritten does the second batch go out.
//!
//! ## Storage Behind a Trait
//!
//! The pipeline never talks to a storage network directly — it talks to
//! [`publish::ContentStore`], a put-files-get-hash interface. The built-in
//! [`publish::DigestContentStore`] derives a deterministic sha256 address
//! locally, which keeps the whole pipeline runnable (and testable) offline;
//! a gateway client drops in behind the same trait in deployment.
//!
//! ## Explicit Per-Edition Accumulators
//!
//! The compositor returns one [`metadata::EditionDetails`] value per edition
//! instead of appending to a shared collector. Editions become independent
//! pure-ish functions, which is what lets the batch fan out over rayon with
//! no locks and re-sort deterministically afterwards.
//!
//! ## Compaction Re-Derives From Disk
//!
//! Removing curated editions before publication renumbers the survivors to a
//! contiguous `1..=M` range by walking the staging directory, not a journal.
//! Numbers with missing files are skipped, which makes a re-run over an
//! already-compacted range a no-op — the cheap kind of idempotence that
//! survives a crash halfway through.

pub mod collection;
pub mod compose;
pub mod config;
pub mod jobs;
pub mod layers;
pub mod metadata;
pub mod naming;
pub mod publish;
pub mod queue;
pub mod rarity;
pub mod service;
pub mod staging;
