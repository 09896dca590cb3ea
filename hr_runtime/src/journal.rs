//! Append-only journal of committed mutations, as a binary protobuf log.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only; no mutation, no deletion, no reordering
//!   - fsync after every write when `sync` is on
//!   - Sequence strictly increasing from 1, assigned here
//!   - Without a path, sequences are still assigned but nothing is written

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use prost::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use hr_kernel::domain::{EmployeeEventRecord, HierarchyConfig, OrgUnit};
use hr_kernel::ids::{EmployeeId, TenantId};

use crate::error::JournalError;
use crate::proto_bridge::entry_to_proto;
use crate::proto_types::ProtoJournalFrame;

const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Shared handle. The journal mutex is a leaf lock: nothing else is ever
/// acquired while it is held.
pub type SharedJournal = Arc<Mutex<Journal>>;

/// One committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    TenantRegistered {
        tenant_id: TenantId,
    },
    DraftSaved(HierarchyConfig),
    HierarchyCommitted {
        config: HierarchyConfig,
        fingerprint: String,
    },
    UnitCreated(OrgUnit),
    UnitUpdated(OrgUnit),
    EventRecorded {
        record: EmployeeEventRecord,
        idempotency_key: Option<String>,
    },
    EventCancelled {
        employee_id: EmployeeId,
        event_code: String,
        record_id: Uuid,
    },
}

pub struct Journal {
    path: Option<PathBuf>,
    sync: bool,
    last_sequence: u64,
    /// Offset of a frame that failed and could not be cut back. Appends are
    /// refused until the journal is reopened.
    torn_at: Option<u64>,
}

impl Journal {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sync: false,
            last_sequence: 0,
            torn_at: None,
        }
    }

    /// Open or create a journal at `path`. Existing frames are read once to
    /// find the last sequence; a damaged file fails here, not on first append.
    pub fn open(path: &Path, sync: bool) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            let frames = read_frames(path)?;
            frames.last().map(|f| f.sequence).unwrap_or(0)
        } else {
            0
        };
        debug!(path = %path.display(), last_sequence, "journal opened");

        Ok(Self {
            path: Some(path.to_path_buf()),
            sync,
            last_sequence,
            torn_at: None,
        })
    }

    pub fn shared(self) -> SharedJournal {
        Arc::new(Mutex::new(self))
    }

    /// Append one entry and return its sequence. On error nothing is
    /// considered written and the sequence is not consumed.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<u64, JournalError> {
        match self.path.clone() {
            Some(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
                self.append_to(Some(&mut file), entry)
            }
            None => self.append_to(None::<&mut File>, entry),
        }
    }

    fn append_to<S: FrameSink>(&mut self, sink: Option<&mut S>, entry: &JournalEntry) -> Result<u64, JournalError> {
        if let Some(offset) = self.torn_at {
            return Err(JournalError::Corrupt {
                offset,
                reason: "an earlier append left a torn frame; reopen the journal".to_string(),
            });
        }

        let sequence = self.last_sequence + 1;
        let frame = ProtoJournalFrame {
            sequence,
            entry: Some(entry_to_proto(entry)),
        };

        if let Some(sink) = sink {
            match append_frame(sink, &frame, self.sync) {
                Ok(()) => {}
                Err(FrameWriteError::RolledBack(err)) => {
                    warn!(sequence, error = %err, "journal append failed, frame rolled back");
                    return Err(err.into());
                }
                Err(FrameWriteError::Torn { offset, source }) => {
                    warn!(sequence, offset, error = %source, "journal append failed, torn frame left behind");
                    self.torn_at = Some(offset);
                    return Err(JournalError::Corrupt {
                        offset,
                        reason: format!("append failed and the partial frame could not be removed: {}", source),
                    });
                }
            }
        }

        self.last_sequence = sequence;
        Ok(sequence)
    }

    /// All frames in sequence order. Empty for an in-memory journal.
    pub fn load_frames(&self) -> Result<Vec<ProtoJournalFrame>, JournalError> {
        match &self.path {
            Some(path) if path.exists() => read_frames(path),
            _ => Ok(Vec::new()),
        }
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Where frames go. `File` outside of tests.
trait FrameSink: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl FrameSink for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

#[derive(Debug)]
enum FrameWriteError {
    /// Nothing of the frame remains on disk.
    RolledBack(io::Error),
    /// Part of the frame may remain at `offset`.
    Torn { offset: u64, source: io::Error },
}

impl From<io::Error> for FrameWriteError {
    fn from(err: io::Error) -> Self {
        FrameWriteError::RolledBack(err)
    }
}

/// Write `[len][bytes]` with a single `write_all`. On failure the sink is cut
/// back to its length before the call, so later frames never land behind a
/// partial one.
fn append_frame(sink: &mut impl FrameSink, frame: &ProtoJournalFrame, sync: bool) -> Result<(), FrameWriteError> {
    let prior_len = sink.current_len()?;

    let payload = frame.encode_to_vec();
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);

    let written = sink
        .write_all(&buf)
        .and_then(|()| sink.flush())
        .and_then(|()| if sync { sink.sync() } else { Ok(()) });

    match written {
        Ok(()) => Ok(()),
        Err(source) => match sink.truncate_to(prior_len) {
            Ok(()) => Err(FrameWriteError::RolledBack(source)),
            Err(_) => Err(FrameWriteError::Torn {
                offset: prior_len,
                source,
            }),
        },
    }
}

/// Read every frame, checking framing and sequence continuity.
fn read_frames(path: &Path) -> Result<Vec<ProtoJournalFrame>, JournalError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut frames: Vec<ProtoJournalFrame> = Vec::new();
    let mut len_buf = [0u8; 4];
    let mut offset: u64 = 0;

    loop {
        match read_len_prefix(&mut reader, &mut len_buf) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(JournalError::Corrupt {
                    offset,
                    reason: "truncated length prefix".to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(JournalError::Corrupt {
                offset,
                reason: format!("invalid frame length {}", len),
            });
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).map_err(|e| JournalError::Corrupt {
            offset,
            reason: format!("truncated frame: {}", e),
        })?;

        let frame = ProtoJournalFrame::decode(buf.as_slice())
            .map_err(|source| JournalError::Decode { offset, source })?;

        let expected = frames.last().map(|f| f.sequence).unwrap_or(0) + 1;
        if frame.sequence != expected {
            return Err(JournalError::Sequence {
                expected,
                found: frame.sequence,
            });
        }

        offset += 4 + len as u64;
        frames.push(frame);
    }

    Ok(frames)
}

/// `Ok(false)` on a clean end of file, `UnexpectedEof` on a partial prefix.
fn read_len_prefix(reader: &mut impl Read, buf: &mut [u8; 4]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
