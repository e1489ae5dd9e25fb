//! Messages exchanged with the simulator backend and their JSON framing.
//!
//! Every message is a JSON object `{"event": <name>, "data": <payload>}`.
//! Recorded sessions store one message per line. The live backend carries
//! the same events inside Socket.IO packets, see [`crate::socketio`].

use crate::{ProcessId, ProcessSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

/// Backend to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    UpdateProcess(ProcessSnapshot),
    FinalizeProcess(ProcessSnapshot),
    #[serde(rename = "reset_ui")]
    Reset,
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::UpdateProcess(_) => "update_process",
            PushEvent::FinalizeProcess(_) => "finalize_process",
            PushEvent::Reset => "reset_ui",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTarget {
    pub id: ProcessId,
}

/// Client to backend. Fire-and-forget: the backend never answers a command
/// directly, its effect shows up in later push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Command {
    AddProcess,
    StartProcess(ProcessTarget),
    BlockProcess(ProcessTarget),
    UnblockProcess(ProcessTarget),
    StopProcess(ProcessTarget),
    ResetAll,
    StartAll,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddProcess => "add_process",
            Command::StartProcess(_) => "start_process",
            Command::BlockProcess(_) => "block_process",
            Command::UnblockProcess(_) => "unblock_process",
            Command::StopProcess(_) => "stop_process",
            Command::ResetAll => "reset_all",
            Command::StartAll => "start_all",
        }
    }

    pub fn target(&self) -> Option<ProcessId> {
        match self {
            Command::StartProcess(target)
            | Command::BlockProcess(target)
            | Command::UnblockProcess(target)
            | Command::StopProcess(target) => Some(target.id),
            Command::AddProcess | Command::ResetAll | Command::StartAll => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame of {size} bytes exceeds limit of {max}")]
    Oversized { size: usize, max: usize },
    #[error("{size} bytes buffered without a line break (limit {max})")]
    Unterminated { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// Encodes a message as a single websocket text payload.
pub fn encode_message<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<String, FrameError> {
    let text = serde_json::to_string(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if text.len() > max_frame_bytes {
        return Err(FrameError::Oversized {
            size: text.len(),
            max: max_frame_bytes,
        });
    }
    Ok(text)
}

/// Encodes a message as one newline-terminated line.
pub fn encode_frame<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<Vec<u8>, FrameError> {
    let mut line = encode_message(value, max_frame_bytes)?.into_bytes();
    line.push(b'\n');
    Ok(line)
}

pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8], max_frame_bytes: usize) -> Result<T, FrameError> {
    let raw = trim_line_ending(bytes);
    if raw.len() > max_frame_bytes {
        return Err(FrameError::Oversized {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    serde_json::from_slice(raw).map_err(|err| FrameError::Decode(err.to_string()))
}

fn trim_line_ending(mut raw: &[u8]) -> &[u8] {
    if let Some(rest) = raw.strip_suffix(b"\n") {
        raw = rest;
    }
    if let Some(rest) = raw.strip_suffix(b"\r") {
        raw = rest;
    }
    raw
}

/// Frames and errors produced by one call into [`FrameDecoder`].
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub frames: Vec<T>,
    pub errors: Vec<FrameError>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Incremental decoder for newline-delimited JSON.
///
/// A bad line is reported in [`Decoded::errors`] and decoding continues
/// with the next one. Bytes that pile up past the size limit without a line
/// break are discarded.
pub struct FrameDecoder<T> {
    max_frame_bytes: usize,
    buffer: Vec<u8>,
    marker: PhantomData<T>,
}

impl<T> FrameDecoder<T> {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            buffer: Vec::new(),
            marker: PhantomData,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> Default for FrameDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl<T: DeserializeOwned> FrameDecoder<T> {
    pub fn feed(&mut self, chunk: &[u8]) -> Decoded<T> {
        let mut out = Decoded::default();
        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|byte| *byte == b'\n') {
            let end = consumed + offset + 1;
            let line = trim_line_ending(&self.buffer[consumed..end]);
            if !line.iter().all(u8::is_ascii_whitespace) {
                self.decode_line(line, &mut out);
            }
            consumed = end;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_frame_bytes {
            out.errors.push(FrameError::Unterminated {
                size: self.buffer.len(),
                max: self.max_frame_bytes,
            });
            self.buffer.clear();
        }
        out
    }

    /// Decodes whatever is left once the input is exhausted; a final line
    /// does not need a trailing newline.
    pub fn finish(&mut self) -> Decoded<T> {
        let mut out = Decoded::default();
        let rest = std::mem::take(&mut self.buffer);
        let line = trim_line_ending(&rest);
        if !line.iter().all(u8::is_ascii_whitespace) {
            self.decode_line(line, &mut out);
        }
        out
    }

    fn decode_line(&self, line: &[u8], out: &mut Decoded<T>) {
        match decode_frame(line, self.max_frame_bytes) {
            Ok(frame) => out.frames.push(frame),
            Err(err) => out.errors.push(err),
        }
    }
}
