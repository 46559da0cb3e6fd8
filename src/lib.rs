//! # Quixforge
//!
//! An interactive assistant that builds source and sink connectors for the Quix
//! streaming platform: it asks what to build, has Claude write the code, tests
//! it in a platform sandbox session and deploys it.
//!
//! ## Usage
//!
//! ```bash
//! quixforge sink --app "pg sink"
//! quixforge cache list --workflow sink
//! quixforge update-requirements requirements.txt quixstreams
//! ```
//!
//! ## Modules
//!
//! - `ai` - Code generation and debugging through the Claude CLI
//! - `cache` - Per-application artifact cache under the working directory
//! - `config` - Layered configuration (files, `.env`, environment)
//! - `context` - State carried through one wizard run
//! - `credentials` - Credential field name normalization
//! - `dependencies` - Requirement inference from Python source
//! - `env_vars` - `app.yaml` variables: detection, reconciliation and prompting
//! - `platform` - Platform REST client and sandbox session lifecycle
//! - `requirements` - Pinning packages to their latest published version
//! - `sandbox` - Run, classify and debug loop for generated code
//! - `secrets` - Workspace secret lookup and creation
//! - `subprocess` - Process abstraction used to drive the Claude CLI
//! - `workflow` - The source and sink wizards
//! - `testing` - Scripted mocks for every collaborator trait
pub mod ai;
pub mod cache;
pub mod config;
pub mod context;
pub mod credentials;
pub mod dependencies;
pub mod env_vars;
pub mod error;
pub mod interaction;
pub mod platform;
pub mod requirements;
pub mod retry;
pub mod sandbox;
pub mod secrets;
pub mod subprocess;
pub mod workflow;

pub mod testing;

pub use error::{ForgeError, ForgeResult};
