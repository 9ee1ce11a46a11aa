//! The model seam: turning note sequences into MusicVAE latent vectors.
//!
//! The model itself runs out of process. [`LatentEncoder`] is the only thing
//! the batch loop sees, so tests and alternative backends plug in there.

pub mod client;
pub mod models;

pub use client::MusicVaeClient;
pub use models::{checkpoint_path, download_checkpoint, ModelError, MODEL_NAMES};

use async_trait::async_trait;
use midi_prep::NoteSequence;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One point in a model's latent space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatentVector(pub Vec<f32>);

impl LatentVector {
    pub fn dim(&self) -> usize {
        self.0.len()
    }
}

/// Why an encode call produced nothing.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The model's data converter found no usable example in the input.
    #[error("no examples extracted from the input sequence")]
    NoExtractedExamples,

    /// The input yielded more than one example where exactly one is needed.
    #[error("multiple examples extracted from the input sequence")]
    MultipleExtractedExamples,

    #[error("{0}")]
    Other(String),
}

/// The three buckets failures are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NoExtracted,
    MultipleExtracted,
    Other,
}

impl EncodeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NoExtractedExamples => FailureKind::NoExtracted,
            Self::MultipleExtractedExamples => FailureKind::MultipleExtracted,
            Self::Other(_) => FailureKind::Other,
        }
    }
}

/// Encodes sequences into latent vectors, one vector per input sequence.
#[async_trait]
pub trait LatentEncoder: Send + Sync {
    async fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<LatentVector>, EncodeError>;
}
