pub mod checkpoint;
pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::content::DocumentRecord;
use crate::fetch::{DataType, HitSource};
use crate::output;
use crate::qa::{self, QaPair};
use crate::structurer::Structurer;
use checkpoint::{Checkpoint, CheckpointRef, CheckpointStore};
use progress::StageProgress;

const QA_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Processing,
    GeneratingQA,
    Saving,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetching, Stage::Processing, Stage::GeneratingQA, Stage::Saving];

    pub fn weight(&self) -> u32 {
        match self {
            Stage::Fetching => 2,
            Stage::Processing => 3,
            Stage::GeneratingQA => 3,
            Stage::Saving => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetching => "Fetching data",
            Stage::Processing => "Processing documents",
            Stage::GeneratingQA => "Generating QA pairs",
            Stage::Saving => "Saving results",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Stage::Fetching => 0,
            Stage::Processing => 1,
            Stage::GeneratingQA => 2,
            Stage::Saving => 3,
        }
    }
}

/// How many hits are structured at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Every hit in flight together.
    Unbounded,
    /// Fixed-size chunks, each awaited before the next starts.
    Batched(usize),
}

impl Concurrency {
    pub fn from_batch_size(batch_size: Option<usize>) -> Self {
        match batch_size {
            Some(n) if n > 0 => Concurrency::Batched(n),
            _ => Concurrency::Unbounded,
        }
    }

    fn chunk_len(&self, total: usize) -> usize {
        match self {
            Concurrency::Unbounded => total.max(1),
            Concurrency::Batched(n) => *n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Stage whose checkpoint the run resumed after, if any.
    pub resumed_after: Option<Stage>,
    /// Structured documents held by this run: produced by Processing or loaded from
    /// its checkpoint. `None` when the run resumed past that stage.
    pub documents: Option<usize>,
    pub qa_pairs: usize,
    pub overall_progress: f64,
}

#[derive(Default)]
struct RunState {
    hits: Vec<Value>,
    documents: Vec<DocumentRecord>,
    qa_pairs: Vec<QaPair>,
    saved: usize,
    has_documents: bool,
}

/// Fetch, structure, synthesize, persist. Each completed stage is checkpointed
/// so an interrupted run picks up after the last one that finished.
pub struct Pipeline {
    source: Arc<dyn HitSource>,
    structurer: Structurer,
    checkpoints: CheckpointStore,
    output_path: PathBuf,
    data_types: Vec<DataType>,
    concurrency: Concurrency,
    progress: StageProgress,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn HitSource>,
        structurer: Structurer,
        checkpoints: CheckpointStore,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            structurer,
            checkpoints,
            output_path: output_path.into(),
            data_types: DataType::ALL.to_vec(),
            concurrency: Concurrency::Unbounded,
            progress: StageProgress::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_progress(mut self, progress: StageProgress) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let (resumed_after, mut state) = self.resume();
        let start = resumed_after.map_or(0, |s| s.index() + 1);

        for stage in Stage::ALL[start..].iter().copied() {
            self.progress.start(stage);
            match stage {
                Stage::Fetching => {
                    state.hits = self.fetch().await?;
                    println!("Fetched {} hits", state.hits.len());
                    self.checkpoints.save(&CheckpointRef::Fetching {
                        all_data: &state.hits,
                    })?;
                }
                Stage::Processing => {
                    let hits = std::mem::take(&mut state.hits);
                    state.documents = self.process(hits).await?;
                    state.has_documents = true;
                    println!("Structured {} documents", state.documents.len());
                    self.checkpoints.save(&CheckpointRef::Processing {
                        processed_documents: &state.documents,
                    })?;
                }
                Stage::GeneratingQA => {
                    let documents = std::mem::take(&mut state.documents);
                    let (documents, qa_pairs) = self.generate_qa(documents).await?;
                    state.documents = documents;
                    state.qa_pairs = qa_pairs;
                    println!("Generated {} QA pairs", state.qa_pairs.len());
                    self.checkpoints.save(&CheckpointRef::GeneratingQA {
                        qa_pairs: &state.qa_pairs,
                    })?;
                }
                Stage::Saving => {
                    let progress = &mut self.progress;
                    state.saved = output::write_jsonl(&self.output_path, &state.qa_pairs, |p| progress.update(p))?;
                    println!("Saved {} QA pairs to {}", state.saved, self.output_path.display());
                    self.checkpoints.save(&CheckpointRef::Saving { saved: state.saved })?;
                }
            }
            self.progress.finish();
        }

        self.checkpoints.clear()?;
        Ok(RunSummary {
            resumed_after,
            documents: state.has_documents.then_some(state.documents.len()),
            qa_pairs: state.saved,
            overall_progress: self.progress.overall(),
        })
    }

    fn resume(&mut self) -> (Option<Stage>, RunState) {
        let mut state = RunState::default();
        let Some(checkpoint) = self.checkpoints.load() else {
            return (None, state);
        };
        let stage = checkpoint.stage();
        match checkpoint {
            Checkpoint::Fetching { all_data } => state.hits = all_data,
            Checkpoint::Processing { processed_documents } => {
                state.documents = processed_documents;
                state.has_documents = true;
            }
            Checkpoint::GeneratingQA { qa_pairs } => state.qa_pairs = qa_pairs,
            Checkpoint::Saving { saved } => state.saved = saved,
        }
        info!("Resuming after completed stage: {}", stage.label());
        self.progress.resume_after(stage);
        (Some(stage), state)
    }

    /// Data types in order; each contributes an equal share of the stage.
    async fn fetch(&mut self) -> Result<Vec<Value>> {
        let n = self.data_types.len().max(1) as f64;
        let mut all = Vec::new();
        for (i, data_type) in self.data_types.iter().copied().enumerate() {
            let progress = &mut self.progress;
            let hits = self
                .source
                .fetch_all(data_type, &mut |p: f64| progress.update((i as f64 + p / 100.0) / n * 100.0))
                .await?;
            info!("Collected {} {} hits", hits.len(), data_type);
            all.extend(hits);
        }
        Ok(all)
    }

    /// Structures every hit, one task per hit, keeping input order in the output.
    async fn process(&mut self, hits: Vec<Value>) -> Result<Vec<DocumentRecord>> {
        let total = hits.len();
        if total == 0 {
            warn!("No hits to process");
            return Ok(Vec::new());
        }

        let chunk_len = self.concurrency.chunk_len(total);
        let mut slots: Vec<Option<Vec<DocumentRecord>>> = (0..total).map(|_| None).collect();
        let mut done = 0usize;

        for (chunk_idx, chunk) in hits.chunks(chunk_len).enumerate() {
            let offset = chunk_idx * chunk_len;
            let (tx, mut rx) = mpsc::channel::<(usize, Vec<DocumentRecord>)>(chunk.len());

            for (i, hit) in chunk.iter().enumerate() {
                let structurer = self.structurer.clone();
                let tx = tx.clone();
                let hit = hit.clone();
                tokio::spawn(async move {
                    let docs = structurer.structure(&hit).await;
                    let _ = tx.send((offset + i, docs)).await;
                });
            }
            drop(tx);

            while let Some((idx, docs)) = rx.recv().await {
                slots[idx] = Some(docs);
                done += 1;
                self.progress.update(done as f64 / total as f64 * 100.0);
            }
        }

        if done < total {
            bail!("{} of {} structuring tasks did not complete", total - done, total);
        }
        Ok(slots.into_iter().flatten().flatten().collect())
    }

    /// Synthesis runs on the blocking pool with rayon inside; progress arrives per chunk.
    /// The documents are handed back alongside the pairs.
    async fn generate_qa(&mut self, documents: Vec<DocumentRecord>) -> Result<(Vec<DocumentRecord>, Vec<QaPair>)> {
        let total = documents.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<usize>();

        let worker = tokio::task::spawn_blocking(move || {
            let mut pairs = Vec::new();
            for chunk in documents.chunks(QA_CHUNK) {
                let batch: Vec<Vec<QaPair>> = chunk.par_iter().map(qa::synthesize_document).collect();
                pairs.extend(batch.into_iter().flatten());
                let _ = tx.send(chunk.len());
            }
            (documents, pairs)
        });

        let mut done = 0usize;
        while let Some(n) = rx.recv().await {
            done += n;
            self.progress.update(done as f64 / total as f64 * 100.0);
        }
        worker.await.context("QA generation task failed")
    }
}

// ── Tests ──
