//! Decoder-event driver.
//!
//! The decoder contract is "apply the update, then call `present`", once
//! per incoming chunk. [`drive`] implements that cadence over any
//! [`Stream`] of [`DecoderEvent`]s, for hosts that already surface their
//! model transport as a stream (and for the integration tests).

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::block::{ContentBlock, ToolParams};
use crate::dispatcher::Engine;
use crate::error::{EngineError, Result};
use crate::session::SessionHandle;

/// One update from the model-response decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderEvent {
    /// A new block began at `index` (indices are contiguous and ascending).
    BlockStart { index: usize, block: ContentBlock },
    /// More narrative text for a partial text block.
    TextDelta { index: usize, text: String },
    /// More parameters for a partial tool-use block.
    ToolParamsDelta { index: usize, params: ToolParams },
    /// The block at `index` reached its final form.
    BlockFinal { index: usize },
    /// No more blocks will arrive this turn.
    StreamComplete,
}

/// Apply a single decoder event to the session.
pub fn apply(session: &SessionHandle, event: DecoderEvent) -> Result<()> {
    match event {
        DecoderEvent::BlockStart { index, block } => {
            let appended = session.append_block(block);
            if appended != index {
                return Err(EngineError::InvalidState(format!(
                    "decoder emitted block index {index}, expected {appended}"
                )));
            }
            Ok(())
        }
        DecoderEvent::TextDelta { index, text } => session.extend_text(index, &text),
        DecoderEvent::ToolParamsDelta { index, params } => {
            session.merge_tool_params(index, params)
        }
        DecoderEvent::BlockFinal { index } => session.finalize_block(index),
        DecoderEvent::StreamComplete => {
            session.set_stream_complete();
            Ok(())
        }
    }
}

/// Feed a stream of decoder events through the session, presenting after
/// every event. Returns once the stream ends; the turn is ready when a
/// `StreamComplete` event arrived and every block was presented.
pub async fn drive<S>(engine: &Engine, session: &SessionHandle, events: S) -> Result<()>
where
    S: Stream<Item = DecoderEvent>,
{
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        apply(session, event)?;
        engine.present(session).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_block_start_is_rejected() {
        let session = SessionHandle::new(3);
        let event = DecoderEvent::BlockStart {
            index: 2,
            block: ContentBlock::text("hi", true),
        };
        assert!(matches!(
            apply(&session, event),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn events_mutate_the_session_in_order() {
        let session = SessionHandle::new(3);
        apply(
            &session,
            DecoderEvent::BlockStart {
                index: 0,
                block: ContentBlock::text("He", true),
            },
        )
        .unwrap();
        apply(
            &session,
            DecoderEvent::TextDelta {
                index: 0,
                text: "llo".into(),
            },
        )
        .unwrap();
        apply(&session, DecoderEvent::BlockFinal { index: 0 }).unwrap();
        apply(&session, DecoderEvent::StreamComplete).unwrap();

        assert_eq!(session.blocks_len(), 1);
        assert!(session.is_stream_complete());
    }
}
