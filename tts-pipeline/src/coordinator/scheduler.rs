//! Bounded, order-preserving dispatch of chunks to a synthesizer.

use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::control::RunControl;
use crate::audio::{AudioSegment, RawAudio};
use crate::error::{PipelineError, Result, SynthesisError};
use crate::synth::{Synthesizer, VoiceReference};
use crate::text::TextChunk;

/// Progress after each chunk finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisProgress {
    /// Index of the chunk that just finished
    pub index: usize,
    /// Chunks finished so far
    pub completed: usize,
    /// Chunks in this run
    pub total: usize,
}

type TaskOutput = (usize, usize, std::result::Result<RawAudio, SynthesisError>);

/// Synthesize every chunk, at most `max_concurrency` at a time.
///
/// Segments come back in the order the chunks were given, whatever order the
/// calls finish in. The first failure aborts all outstanding calls.
pub async fn synthesize_chunks<F>(
    chunks: Vec<TextChunk>,
    synthesizer: Arc<dyn Synthesizer>,
    voice: Option<Arc<VoiceReference>>,
    max_concurrency: usize,
    control: &RunControl,
    mut on_progress: F,
) -> Result<Vec<AudioSegment>>
where
    F: FnMut(SynthesisProgress),
{
    if let Some(chunk) = chunks.iter().find(|c| c.text.trim().is_empty()) {
        return Err(PipelineError::EmptyChunk { index: chunk.index });
    }

    let total = chunks.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    if let Some(reason) = control.check() {
        return Err(reason.into_error(0, total));
    }

    let interrupted = control.interrupted();
    tokio::pin!(interrupted);

    if total == 1 {
        let chunk = &chunks[0];
        let call = synthesizer.synthesize(&chunk.text, voice.as_deref());
        let result = tokio::select! {
            biased;
            reason = &mut interrupted => return Err(reason.into_error(0, 1)),
            result = call => result,
        };

        let raw = result.map_err(|source| PipelineError::ChunkSynthesis {
            index: chunk.index,
            attempted: 1,
            succeeded: 0,
            source,
        })?;
        on_progress(SynthesisProgress {
            index: chunk.index,
            completed: 1,
            total: 1,
        });
        return Ok(vec![AudioSegment::new(chunk.index, raw)]);
    }

    let width = max_concurrency.clamp(1, total);
    debug!(
        "Synthesizing {} chunks with {} via {} workers",
        total,
        synthesizer.name(),
        width
    );

    let mut pending: VecDeque<(usize, TextChunk)> = chunks.into_iter().enumerate().collect();
    let mut slots: Vec<Option<AudioSegment>> = vec![None; total];
    let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
    let mut started = 0;
    let mut completed = 0;

    let spawn = |tasks: &mut JoinSet<TaskOutput>, slot: usize, chunk: TextChunk| {
        let synthesizer = Arc::clone(&synthesizer);
        let voice = voice.clone();
        tasks.spawn(async move {
            let result = synthesizer.synthesize(&chunk.text, voice.as_deref()).await;
            (slot, chunk.index, result)
        });
    };

    while started < width {
        let Some((slot, chunk)) = pending.pop_front() else {
            break;
        };
        spawn(&mut tasks, slot, chunk);
        started += 1;
    }

    while completed < total {
        let joined = tokio::select! {
            biased;
            reason = &mut interrupted => {
                tasks.abort_all();
                warn!("Stopping synthesis after {}/{} chunks: {:?}", completed, total, reason);
                return Err(reason.into_error(completed, total));
            }
            joined = tasks.join_next() => joined,
        };

        match joined {
            Some(Ok((slot, index, Ok(raw)))) => {
                slots[slot] = Some(AudioSegment::new(index, raw));
                completed += 1;
                debug!("Chunk {} synthesized ({}/{})", index, completed, total);
                on_progress(SynthesisProgress {
                    index,
                    completed,
                    total,
                });

                if let Some((slot, chunk)) = pending.pop_front() {
                    spawn(&mut tasks, slot, chunk);
                    started += 1;
                }
            }
            Some(Ok((_, index, Err(source)))) => {
                tasks.abort_all();
                warn!("Chunk {} failed to synthesize: {}", index, source);
                return Err(PipelineError::ChunkSynthesis {
                    index,
                    attempted: started,
                    succeeded: completed,
                    source,
                });
            }
            Some(Err(join_error)) => {
                tasks.abort_all();
                return Err(PipelineError::WorkerPanicked(join_error.to_string()));
            }
            None => break,
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
