//! Raw blocks and the codec-keyed decoder registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{DagError, DagResult};
use crate::id::ContentId;
use crate::node::{LinkedNode, NodeRef, RawNode};

/// Opaque bytes with no links.
pub const RAW: u64 = 0x55;
/// Payload plus link table, encoded with bincode.
pub const LINKED: u64 = 0x0300;

/// Encoded bytes paired with the identifier they hash to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    id: ContentId,
    data: Bytes,
}

impl Block {
    /// Pair `data` with `id`, checking that the hash matches.
    pub fn new(id: ContentId, data: Bytes) -> DagResult<Self> {
        if !id.verify(&data) {
            return Err(DagError::Decode {
                id,
                reason: "content hash mismatch".into(),
            });
        }
        Ok(Self { id, data })
    }

    /// Hash `data` under `codec` and wrap it.
    pub fn encode(codec: u64, data: Bytes) -> Self {
        Self {
            id: ContentId::compute(codec, &data),
            data,
        }
    }

    pub fn id(&self) -> ContentId {
        self.id
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Turns a block of one codec into a node.
pub type DecodeFn = Arc<dyn Fn(&Block) -> DagResult<NodeRef> + Send + Sync>;

/// Registry mapping codec tags to decoders.
///
/// Populate the registry up front and share it read-only afterwards;
/// `register` takes `&mut self` for that reason.
#[derive(Clone, Default)]
pub struct BlockDecoder {
    decoders: HashMap<u64, DecodeFn>,
}

impl BlockDecoder {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the raw and linked codecs registered.
    pub fn with_defaults() -> Self {
        let mut decoder = Self::new();
        decoder.register(RAW, |block| {
            Ok(Arc::new(RawNode::decode(block)?) as NodeRef)
        });
        decoder.register(LINKED, |block| {
            Ok(Arc::new(LinkedNode::decode(block)?) as NodeRef)
        });
        decoder
    }

    /// Register (or replace) the decoder for `codec`.
    pub fn register<F>(&mut self, codec: u64, decode: F)
    where
        F: Fn(&Block) -> DagResult<NodeRef> + Send + Sync + 'static,
    {
        self.decoders.insert(codec, Arc::new(decode));
    }

    /// Returns `true` if a decoder exists for `codec`.
    pub fn supports(&self, codec: u64) -> bool {
        self.decoders.contains_key(&codec)
    }

    /// Decode `block` with the decoder registered for its codec.
    pub fn decode(&self, block: &Block) -> DagResult<NodeRef> {
        let codec = block.id().codec();
        match self.decoders.get(&codec) {
            Some(decode) => decode(block),
            None => Err(DagError::UnknownCodec(codec)),
        }
    }
}

impl fmt::Debug for BlockDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codecs: Vec<_> = self.decoders.keys().copied().collect();
        codecs.sort_unstable();
        f.debug_struct("BlockDecoder").field("codecs", &codecs).finish()
    }
}
