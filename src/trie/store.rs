//! Record store over the three index regions
//!
//! - directory: `node_count + 1` little-endian u32 offsets into the node region
//! - nodes: variable-length node records (see [`super::codec`])
//! - postings: variable-length posting lists (see [`super::postings`])
//!
//! Every read is a positioned read; there is no shared cursor, so lookups may
//! run concurrently against one store.

use std::fs::File;
use std::io;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::codec::decode_vbyte;
use super::types::NodeId;
use super::writer::IndexImage;
use crate::error::TextrieError;
use crate::Result;

pub const DIRECTORY_FILE: &str = "ftx.dir";
pub const NODES_FILE: &str = "ftx.nodes";
pub const POSTINGS_FILE: &str = "ftx.postings";
pub const META_FILE: &str = "ftx.meta";

const DIRECTORY_ENTRY: u64 = 4;
const CURSOR_CHUNK: usize = 4096;

/// Random-access, read-only byte region
pub trait Region: Send + Sync {
    fn len(&self) -> u64;

    /// Fill `buf` from `offset`, failing if the region ends first
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Region held in memory
pub struct MemRegion {
    data: Vec<u8>,
}

impl MemRegion {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Region for MemRegion {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

/// Region backed by a file, read with positioned I/O
pub struct FileRegion {
    file: File,
    len: u64,
}

impl FileRegion {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl Region for FileRegion {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        file_read_at_exact(&self.file, offset, buf)
    }
}

#[cfg(unix)]
fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    if !buf.is_empty() {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

struct Regions {
    directory: Box<dyn Region>,
    nodes: Box<dyn Region>,
    postings: Box<dyn Region>,
}

/// Read-only access to node records and posting bytes
pub struct RecordStore {
    regions: RwLock<Option<Regions>>,
    node_count: u32,
    disk_size: u64,
}

impl RecordStore {
    /// Open the regions stored in `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let store = Self::from_regions(
            Box::new(FileRegion::open(dir.join(DIRECTORY_FILE))?),
            Box::new(FileRegion::open(dir.join(NODES_FILE))?),
            Box::new(FileRegion::open(dir.join(POSTINGS_FILE))?),
        )?;
        info!(
            "Opened trie regions in {:?}: {} nodes, {} bytes",
            dir, store.node_count, store.disk_size
        );
        Ok(store)
    }

    /// Build a store over in-memory region bytes
    pub fn from_bytes(directory: Vec<u8>, nodes: Vec<u8>, postings: Vec<u8>) -> Result<Self> {
        Self::from_regions(
            Box::new(MemRegion::new(directory)),
            Box::new(MemRegion::new(nodes)),
            Box::new(MemRegion::new(postings)),
        )
    }

    /// In-memory store over a freshly built image
    pub fn from_image(image: &IndexImage) -> Result<Self> {
        Self::from_bytes(
            image.directory.clone(),
            image.nodes.clone(),
            image.postings.clone(),
        )
    }

    pub fn from_regions(
        directory: Box<dyn Region>,
        nodes: Box<dyn Region>,
        postings: Box<dyn Region>,
    ) -> Result<Self> {
        let dir_len = directory.len();
        if dir_len < 2 * DIRECTORY_ENTRY || dir_len % DIRECTORY_ENTRY != 0 {
            return Err(TextrieError::corrupt(format!(
                "directory region of {} bytes is not a list of node offsets",
                dir_len
            )));
        }
        let node_count = u32::try_from(dir_len / DIRECTORY_ENTRY - 1)
            .map_err(|_| TextrieError::corrupt("directory holds more than u32::MAX nodes"))?;
        let disk_size = dir_len + nodes.len() + postings.len();

        Ok(Self {
            regions: RwLock::new(Some(Regions {
                directory,
                nodes,
                postings,
            })),
            node_count,
            disk_size,
        })
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Combined size of the three regions in bytes
    pub fn disk_size(&self) -> u64 {
        self.disk_size
    }

    pub fn is_closed(&self) -> bool {
        self.regions.read().is_none()
    }

    /// Raw record bytes of node `id`, spanning `[offset[id], offset[id + 1])`
    pub fn record_bytes(&self, id: NodeId) -> Result<Vec<u8>> {
        if id >= self.node_count {
            return Err(TextrieError::corrupt(format!(
                "node id {} out of range ({} nodes)",
                id, self.node_count
            )));
        }

        let guard = self.regions.read();
        let regions = guard.as_ref().ok_or_else(closed)?;

        let mut entry = [0u8; 8];
        regions
            .directory
            .read_exact_at(id as u64 * DIRECTORY_ENTRY, &mut entry)?;
        let start = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]) as u64;
        let end = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]) as u64;

        if start > end || end > regions.nodes.len() {
            return Err(TextrieError::corrupt(format!(
                "record of node {} spans [{}, {}) outside the {}-byte node region",
                id,
                start,
                end,
                regions.nodes.len()
            )));
        }

        let mut record = vec![0u8; (end - start) as usize];
        regions.nodes.read_exact_at(start, &mut record)?;
        Ok(record)
    }

    /// Read up to `buf.len()` posting bytes at `offset`; returns the number
    /// read, 0 at the end of the region
    fn read_postings(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let guard = self.regions.read();
        let regions = guard.as_ref().ok_or_else(closed)?;

        let len = regions.postings.len();
        if offset > len {
            return Err(TextrieError::corrupt(format!(
                "posting pointer {} beyond the {}-byte posting region",
                offset, len
            )));
        }
        let n = std::cmp::min(buf.len() as u64, len - offset) as usize;
        regions.postings.read_exact_at(offset, &mut buf[..n])?;
        Ok(n)
    }

    /// Sequential reader over the posting region starting at `pointer`
    pub fn posting_cursor(&self, pointer: u64) -> RegionCursor<'_> {
        RegionCursor {
            store: self,
            next_read: pointer,
            buf: Vec::new(),
            idx: 0,
        }
    }

    /// Release the underlying handles. Later reads fail; repeated calls are
    /// no-ops.
    pub fn close(&self) {
        if self.regions.write().take().is_some() {
            debug!("Closed trie regions");
        }
    }
}

fn closed() -> TextrieError {
    TextrieError::StorageFailure(io::Error::new(
        io::ErrorKind::NotConnected,
        "index has been closed",
    ))
}

/// Buffered forward reader over the posting region
pub struct RegionCursor<'a> {
    store: &'a RecordStore,
    next_read: u64,
    buf: Vec<u8>,
    idx: usize,
}

impl<'a> RegionCursor<'a> {
    fn next_byte(&mut self) -> Result<u8> {
        if self.idx >= self.buf.len() {
            self.buf.resize(CURSOR_CHUNK, 0);
            let n = self.store.read_postings(self.next_read, &mut self.buf)?;
            self.buf.truncate(n);
            self.next_read += n as u64;
            self.idx = 0;
            if n == 0 {
                return Err(TextrieError::corrupt("posting list runs past the posting region"));
            }
        }
        let byte = self.buf[self.idx];
        self.idx += 1;
        Ok(byte)
    }

    /// Read one variable-byte integer
    pub fn read_vbyte(&mut self) -> Result<u32> {
        decode_vbyte(|| self.next_byte())
    }
}
