//! Protocol engine - framed send/receive over one transport.
//!
//! A [`Protocol`] owns a single bidirectional byte stream and enforces
//! framing on it: every marshalled message goes out behind a 4-byte
//! big-endian length prefix, and the receive path reads exactly one
//! frame at a time.
//!
//! Concurrency model:
//! - any number of senders may call the send methods concurrently; the
//!   write-side lock keeps each frame (and each full streamed sequence)
//!   contiguous on the wire
//! - one receive loop runs in parallel with the senders; the read-side
//!   lock preserves frame order
//! - message ids come from an atomic per-connection counter starting at 1
//!
//! Payloads at or above the streaming threshold are transparently split
//! into START/CHUNK/END sub-messages on send and reassembled on receive;
//! reserved-type frames are never surfaced to callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec::payload::{marshal_payload, unmarshal_payload_with, PayloadEncode, PayloadValue};
use crate::error::{Result, WireError};
use crate::protocol::stream::{StreamAssembler, StreamChunk, StreamConfig, StreamHeader};
use crate::protocol::wire::{
    marshal_message_raw, unmarshal_message, Message, MessageOptions, MAX_FRAME_SIZE,
    TYPE_STREAM_CHUNK, TYPE_STREAM_END, TYPE_STREAM_START,
};
use crate::transport::Transport;

/// Message sending and receiving over a connection.
///
/// Safe for concurrent senders plus one receive loop. Lifetime equals
/// the lifetime of the underlying transport.
pub struct Protocol<C: Transport> {
    reader: Mutex<ReadHalf<C>>,
    writer: Mutex<WriteHalf<C>>,
    opts: MessageOptions,
    stream_config: StreamConfig,
    next_id: AtomicU32,
    assemblers: SyncMutex<HashMap<u32, StreamAssembler>>,
}

impl<C: Transport> Protocol<C> {
    /// Take ownership of a transport.
    ///
    /// The stream configuration is taken from the options, falling back
    /// to the defaults (1 MiB threshold, 64 KiB chunks, enabled).
    pub fn new(conn: C, opts: MessageOptions) -> Self {
        let stream_config = opts.stream.unwrap_or_default();
        let (reader, writer) = tokio::io::split(conn);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            opts,
            stream_config,
            next_id: AtomicU32::new(0),
            assemblers: SyncMutex::new(HashMap::new()),
        }
    }

    /// Allocate the next message id. Per-connection, starting at 1.
    pub fn next_message_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn stream_config(&self) -> StreamConfig {
        self.stream_config
    }

    pub fn options(&self) -> &MessageOptions {
        &self.opts
    }

    /// Send a payload with an auto-allocated id; returns the id.
    pub async fn send<P: PayloadEncode + ?Sized>(
        &self,
        message_type: u8,
        payload: &P,
    ) -> Result<u32> {
        let id = self.next_message_id();
        self.send_message(message_type, id, payload).await?;
        Ok(id)
    }

    /// Send pre-serialized bytes with an auto-allocated id.
    pub async fn send_raw(&self, message_type: u8, data: &[u8]) -> Result<u32> {
        let id = self.next_message_id();
        self.send_message(message_type, id, data).await?;
        Ok(id)
    }

    /// Serialize and send one logical message.
    ///
    /// Oversized payloads are split into a streamed sequence. Streamed
    /// payloads are not signed as a whole; each sub-message carries its
    /// own signature when a signer is configured.
    pub async fn send_message<P: PayloadEncode + ?Sized>(
        &self,
        message_type: u8,
        id: u32,
        payload: &P,
    ) -> Result<()> {
        let payload_bytes = marshal_payload(payload)?;

        if self.stream_config.enabled && payload_bytes.len() >= self.stream_config.threshold {
            return self.send_streamed(message_type, id, &payload_bytes).await;
        }

        let frame = marshal_message_raw(message_type, id, &payload_bytes, &self.opts)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &frame).await
    }

    /// Send a large payload as START, CHUNKs in index order, then END.
    ///
    /// The write lock is held for the whole sequence so concurrent sends
    /// cannot interleave frames into the stream.
    async fn send_streamed(&self, message_type: u8, id: u32, payload: &[u8]) -> Result<()> {
        let chunk_size = self.stream_config.chunk_size.max(1);
        let total_chunks = payload.len().div_ceil(chunk_size) as u32;

        let header = StreamHeader {
            original_type: message_type,
            total_size: payload.len() as u64,
            total_chunks,
        };

        let mut writer = self.writer.lock().await;

        let header_bytes = marshal_payload(&header)?;
        let frame = marshal_message_raw(TYPE_STREAM_START, id, &header_bytes, &self.opts)?;
        write_frame(&mut writer, &frame).await?;

        for (index, data) in payload.chunks(chunk_size).enumerate() {
            let chunk = StreamChunk {
                index: index as u32,
                data: data.to_vec(),
            };
            let chunk_bytes = marshal_payload(&chunk)?;
            let frame = marshal_message_raw(TYPE_STREAM_CHUNK, id, &chunk_bytes, &self.opts)?;
            write_frame(&mut writer, &frame).await?;
        }

        let frame = marshal_message_raw(TYPE_STREAM_END, id, &[], &self.opts)?;
        write_frame(&mut writer, &frame).await?;

        debug!(id, total_chunks, size = payload.len(), "streamed send complete");
        Ok(())
    }

    /// Receive the next logical message.
    ///
    /// Stream control frames are consumed internally: a reassembled
    /// stream is returned as a single message carrying the original
    /// type, and reserved types never reach the caller. An END frame
    /// arriving with chunks missing fails with
    /// [`WireError::StreamInterrupted`].
    pub async fn receive_message(&self) -> Result<(Message, PayloadValue)> {
        loop {
            let (msg, value) = self.receive_raw().await?;

            match msg.message_type {
                TYPE_STREAM_START => {
                    let header = value
                        .downcast::<StreamHeader>()
                        .ok_or(WireError::InvalidPayloadType(TYPE_STREAM_START))?;
                    debug!(
                        id = msg.id,
                        total_chunks = header.total_chunks,
                        "stream started"
                    );
                    // A repeated START for the same id resets the stream.
                    self.assemblers
                        .lock()
                        .insert(msg.id, StreamAssembler::new(*header));
                }

                TYPE_STREAM_CHUNK => {
                    let chunk = value
                        .downcast::<StreamChunk>()
                        .ok_or(WireError::InvalidPayloadType(TYPE_STREAM_CHUNK))?;
                    let complete = {
                        let mut assemblers = self.assemblers.lock();
                        let done = match assemblers.get_mut(&msg.id) {
                            Some(assembler) => assembler.insert(*chunk),
                            None => {
                                warn!(id = msg.id, "chunk for unknown stream, ignoring");
                                false
                            }
                        };
                        if done {
                            assemblers.remove(&msg.id)
                        } else {
                            None
                        }
                    };
                    if let Some(assembler) = complete {
                        return self.finish_stream(msg.id, assembler);
                    }
                }

                TYPE_STREAM_END => {
                    let finished = match self.assemblers.lock().remove(&msg.id) {
                        Some(assembler) if assembler.is_complete() => Some(assembler),
                        Some(_) => return Err(WireError::StreamInterrupted),
                        None => None, // spurious END, ignore
                    };
                    if let Some(assembler) = finished {
                        return self.finish_stream(msg.id, assembler);
                    }
                }

                _ => return Ok((msg, value)),
            }
        }
    }

    fn finish_stream(
        &self,
        id: u32,
        assembler: StreamAssembler,
    ) -> Result<(Message, PayloadValue)> {
        let message_type = assembler.original_type();
        let payload = Bytes::from(assembler.assemble());
        debug!(id, message_type, size = payload.len(), "stream reassembled");

        let value =
            unmarshal_payload_with(self.opts.registry(), message_type, &payload, self.opts.strict)?;

        Ok((
            Message {
                message_type,
                id,
                payload,
                signature: Bytes::new(),
            },
            value,
        ))
    }

    /// Read and parse one framed message, reserved types included.
    async fn receive_raw(&self) -> Result<(Message, PayloadValue)> {
        let data = {
            let mut reader = self.reader.lock().await;

            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    WireError::ConnectionClosed
                } else {
                    WireError::Io(e)
                }
            })?;

            let frame_len = u32::from_be_bytes(len_buf) as usize;
            if frame_len > MAX_FRAME_SIZE {
                return Err(WireError::PayloadTooLarge);
            }

            let mut data = vec![0u8; frame_len];
            reader.read_exact(&mut data).await?;
            data
        };

        unmarshal_message(&data, &self.opts)
    }

    /// Close the transport. In-flight stream assemblers are dropped.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        self.assemblers.lock().clear();
        Ok(())
    }
}

async fn write_frame<C: Transport>(writer: &mut WriteHalf<C>, frame: &[u8]) -> Result<()> {
    let len = u32::try_from(frame.len()).map_err(|_| WireError::PayloadTooLarge)?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
