/*! Shard backends behind one record/stream/index contract.

A shard is one on-disk archive of addressable records. Two backends exist:
the native container ([`eos::EosShard`], manifest type `"eosshard"`) and an
openzim-style container ([`zim::ZimShard`], manifest type `"openzim"`).
Both implement [`Shard`]; callers never dispatch on the concrete type.

Records are short-lived reference-counted handles around a backend-native
representation; the backend that minted a record is the only one that can
read it back.
!*/
pub mod eos;
pub mod zim;

use std::any::Any;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;

use crate::error::Error;
use crate::model::Model;

/// Capability set every shard backend provides.
pub trait Shard: Send + Sync {
    fn path(&self) -> &Path;

    /// Record lookup by object id, O(log n) in the shard's record table.
    fn find_by_id(self: Arc<Self>, object_id: &str) -> Option<ShardRecord>;

    /// Materializes the record's metadata into a typed model.
    fn model(&self, record: &ShardRecord) -> Result<Model, Error>;

    /// Cursor over the record payload.
    fn stream_data(&self, record: &ShardRecord) -> Result<DataStream, Error>;

    /// Uncompressed payload size, for length-prefixed reads.
    fn data_size(&self, record: &ShardRecord) -> u64;

    /// Object URI for an external link, from the shard's link table.
    /// Backends without a link table always miss.
    fn test_link(&self, link: &str) -> Option<String>;

    /// Backend-specific derivation of the full-text index offset; -1 means
    /// "no index".
    fn compute_db_offset(&self) -> i64;

    /// Effective index offset: the manifest override when present, the
    /// lazily computed backend default otherwise.
    fn db_offset(&self) -> i64;
}

/// Manifest override plus lazily computed default for the index offset.
pub(crate) struct DbOffset {
    override_offset: Option<i64>,
    computed: OnceLock<i64>,
}

impl DbOffset {
    pub fn new(override_offset: Option<i64>) -> DbOffset {
        DbOffset {
            override_offset,
            computed: OnceLock::new(),
        }
    }

    pub fn resolve<F: FnOnce() -> i64>(&self, compute: F) -> i64 {
        match self.override_offset {
            Some(offset) if offset >= 0 => offset,
            _ => *self.computed.get_or_init(compute),
        }
    }
}

struct RecordInner {
    shard: Arc<dyn Shard>,
    native: Box<dyn Any + Send + Sync>,
}

/// Handle to one record inside one shard.
///
/// Cloning bumps a reference count; the backend-native representation is
/// dropped with the last clone. A record never outlives its shard, which it
/// keeps alive through the embedded handle.
#[derive(Clone)]
pub struct ShardRecord {
    inner: Arc<RecordInner>,
}

impl ShardRecord {
    pub fn new(shard: Arc<dyn Shard>, native: Box<dyn Any + Send + Sync>) -> ShardRecord {
        ShardRecord {
            inner: Arc::new(RecordInner { shard, native }),
        }
    }

    pub fn shard(&self) -> &Arc<dyn Shard> {
        &self.inner.shard
    }

    /// The backend-native representation, if `T` is the minting backend's.
    pub fn native<T: 'static>(&self) -> Option<&T> {
        self.inner.native.downcast_ref()
    }

    pub fn model(&self) -> Result<Model, Error> {
        self.inner.shard.model(self)
    }

    pub fn stream_data(&self) -> Result<DataStream, Error> {
        self.inner.shard.stream_data(self)
    }

    pub fn data_size(&self) -> u64 {
        self.inner.shard.data_size(self)
    }
}

/// Readable cursor over one record payload inside a mapped shard file.
pub struct DataStream {
    map: Arc<Mmap>,
    pos: usize,
    end: usize,
}

impl DataStream {
    pub(crate) fn new(map: Arc<Mmap>, offset: usize, size: usize) -> DataStream {
        let end = offset.saturating_add(size).min(map.len());
        DataStream {
            map,
            pos: offset.min(end),
            end,
        }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.map[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
