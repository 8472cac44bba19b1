use log::warn;
use std::collections::HashMap;

pub mod embedder;

pub use embedder::{HuggingFaceEmbedder, TextEmbedder};

/// Precomputed record vectors aligned to the catalog. A missing or
/// malformed entry means "no embedding for this record"; the ranker
/// falls back per record rather than treating it as an error.
pub struct EmbeddingTable {
    slots: Vec<Option<Vec<f32>>>,
    id_index: HashMap<u32, usize>,
    dim: usize,
}

impl EmbeddingTable {
    /// Builds a table from vectors aligned positionally with `ids`. The
    /// vector length is fixed by the first usable entry; entries of any
    /// other length are dropped with a warning. Returns `None` when no
    /// usable vector remains.
    pub fn build(ids: &[u32], vectors: Vec<Option<Vec<f32>>>) -> Option<Self> {
        let dim = vectors
            .iter()
            .flatten()
            .map(|v| v.len())
            .find(|len| *len > 0)?;

        let mut dropped = 0usize;
        let mut slots: Vec<Option<Vec<f32>>> = Vec::with_capacity(ids.len());
        for slot in vectors.into_iter() {
            match slot {
                Some(vector) if vector.len() == dim => slots.push(Some(vector)),
                Some(_) => {
                    dropped += 1;
                    slots.push(None);
                }
                None => slots.push(None),
            }
        }
        slots.resize_with(ids.len(), || None);

        if dropped > 0 {
            warn!(
                "Dropped {} embedding rows whose length differs from {}",
                dropped, dim
            );
        }

        let id_index = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();

        Some(Self {
            slots,
            id_index,
            dim,
        })
    }

    pub fn get(&self, id: u32) -> Option<&[f32]> {
        let idx = *self.id_index.get(&id)?;
        self.slots.get(idx)?.as_deref()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of records that actually carry a vector.
    pub fn coverage(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}
