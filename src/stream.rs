//! Response renderer.
//!
//! Turns one orchestrator run into either a single reply object or a
//! sequence of typed stream records with the fixed three-phase shape:
//! one `Meta`, zero or more `Delta`s, exactly one `Final`.
//!
//! Delta strategy: the orchestrator runs to completion first, then the
//! complete reply is split into per-character fragments. The gateway's
//! own token stream is never mixed into this path, so the record
//! sequence is fully determined by the final reply text.
//!
//! Records travel over an mpsc channel as typed values; NDJSON
//! serialization happens only in the HTTP layer. The consumer controls
//! backpressure by how fast it drains the channel, and a dropped
//! receiver simply ends the producing task.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::types::{ChatResponse, RunIds, StreamRecord};

/// Channel capacity for stream records. Small on purpose: the producer
/// suspends between records, letting a slow consumer apply backpressure.
const STREAM_BUFFER: usize = 64;

/// Run the orchestrator and assemble the non-streaming reply object.
pub async fn render_reply(
    orchestrator: Arc<Orchestrator>,
    message: String,
    conversation_id: Option<String>,
) -> ChatResponse {
    let outcome = orchestrator
        .run(&message, RunIds::generate(conversation_id))
        .await;
    ChatResponse {
        reply: outcome.reply,
        conversation_id: outcome.state.conversation_id,
        step_id: outcome.state.step_id,
        trace: outcome.trace,
    }
}

/// Run the orchestrator in a spawned task and stream the result.
///
/// The `Meta` record is emitted immediately, before any model call, so
/// the caller can correlate the stream before any content exists. The
/// `Final` record is always sent, also when the run ended in a fault
/// (the fault description is the message in that case).
pub fn render_stream(
    orchestrator: Arc<Orchestrator>,
    message: String,
    conversation_id: Option<String>,
) -> mpsc::Receiver<StreamRecord> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::spawn(async move {
        // Identifiers are generated before the run starts so the meta
        // record can be emitted before any model call.
        let ids = RunIds::generate(conversation_id);

        if tx
            .send(StreamRecord::Meta {
                conversation_id: ids.conversation_id.clone(),
                step_id: ids.step_id.clone(),
            })
            .await
            .is_err()
        {
            return;
        }

        let outcome = orchestrator.run(&message, ids).await;

        for ch in outcome.reply.chars() {
            if tx
                .send(StreamRecord::Delta {
                    content: ch.to_string(),
                })
                .await
                .is_err()
            {
                // Client went away mid-stream; abandon the producer.
                info!("stream consumer dropped, abandoning");
                return;
            }
        }

        let _ = tx
            .send(StreamRecord::Final {
                message: outcome.reply,
            })
            .await;
    });

    rx
}

/// Serialize one record as an NDJSON line (used at the HTTP boundary).
pub fn to_ndjson_line(record: &StreamRecord) -> String {
    // StreamRecord has no map keys or non-string values that can fail
    // to serialize; fall back to an empty line rather than panic.
    match serde_json::to_string(record) {
        Ok(json) => format!("{}\n", json),
        Err(_) => String::from("\n"),
    }
}
