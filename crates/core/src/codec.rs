//! Binary stub stream.
//!
//! ```text
//! [format-version: u64 LE]
//! [type-id: varint][field payload][child-count: varint][child]*   (preorder)
//! ```
//!
//! Names go through a per-stream interning table: varint `0` is an absent
//! name, `1` introduces a new string (`[len: varint][utf8]`) and `n >= 2`
//! refers back to table entry `n - 2`. The table starts empty for every
//! stream, so a blob never depends on another.

use crate::element_type::ElementTypeRegistry;
use crate::error::{Result, StubError};
use crate::stub::{StubArena, StubId, StubRef, StubTree};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const NAME_ABSENT: u64 = 0;
const NAME_NEW: u64 = 1;
const NAME_BACKREF_BASE: u64 = 2;
const VERSION_HEADER_LEN: usize = 8;

/// Deepest stub (root = 0) a tree may hold. The builder and the decoder
/// both enforce it.
pub const MAX_STUB_DEPTH: usize = 4096;

/// 書き込み側ストリーム
pub struct StubOutputStream {
    buf: Vec<u8>,
    names: HashMap<Arc<str>, u64>,
    table: Vec<Arc<str>>,
}

impl StubOutputStream {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            names: HashMap::new(),
            table: Vec::new(),
        }
    }

    /// LEB128
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Zig-zag encoded so small negatives stay short.
    pub fn write_i64(&mut self, value: i64) {
        self.write_varint(((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_flags(&mut self, flags: u32) {
        self.write_varint(flags as u64);
    }

    /// 名前をインターン化して書き込む（初出は文字列本体、以降は後方参照）
    pub fn write_name(&mut self, name: Option<&Arc<str>>) {
        let Some(name) = name else {
            self.write_varint(NAME_ABSENT);
            return;
        };
        if let Some(&index) = self.names.get(name) {
            self.write_varint(NAME_BACKREF_BASE + index);
            return;
        }
        let index = self.table.len() as u64;
        self.names.insert(Arc::clone(name), index);
        self.table.push(Arc::clone(name));

        self.write_varint(NAME_NEW);
        self.write_varint(name.len() as u64);
        self.buf.extend_from_slice(name.as_bytes());
    }

    pub fn write_names(&mut self, names: &[Arc<str>]) {
        self.write_varint(names.len() as u64);
        for name in names {
            self.write_name(Some(name));
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn into_parts(self) -> (Vec<u8>, Vec<Arc<str>>) {
        (self.buf, self.table)
    }
}

impl Default for StubOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

/// 読み込み側ストリーム
pub struct StubInputStream<'a> {
    data: &'a [u8],
    pos: usize,
    table: Vec<Arc<str>>,
}

impl<'a> StubInputStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            table: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        if self.remaining() < needed {
            return Err(StubError::TruncatedStream {
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StubError::malformed(format!("invalid bool byte {}", other))),
        }
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(StubError::malformed("varint overflow"));
            }
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(StubError::malformed("varint overflow"));
            }
        }
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let raw = self.read_varint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn read_flags(&mut self) -> Result<u32> {
        let raw = self.read_varint()?;
        u32::try_from(raw).map_err(|_| StubError::malformed("flags do not fit in 32 bits"))
    }

    /// Length prefix read from the stream, checked against what is left.
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(StubError::TruncatedStream {
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(len as usize)
    }

    pub fn read_name(&mut self) -> Result<Option<Arc<str>>> {
        match self.read_varint()? {
            NAME_ABSENT => Ok(None),
            NAME_NEW => {
                let len = self.read_len()?;
                let bytes = self.take(len)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| StubError::malformed(format!("name is not UTF-8: {}", e)))?;
                let name: Arc<str> = Arc::from(text);
                self.table.push(Arc::clone(&name));
                Ok(Some(name))
            }
            tag => {
                let index = tag - NAME_BACKREF_BASE;
                self.table
                    .get(index as usize)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| {
                        StubError::malformed(format!(
                            "name back reference {} beyond table of {}",
                            index,
                            self.table.len()
                        ))
                    })
            }
        }
    }

    /// 名前が必須のフィールド用
    pub fn read_name_string(&mut self) -> Result<Arc<str>> {
        self.read_name()?
            .ok_or_else(|| StubError::malformed("required name is absent"))
    }

    pub fn read_names(&mut self) -> Result<Vec<Arc<str>>> {
        let count = self.read_len()?;
        (0..count).map(|_| self.read_name_string()).collect()
    }
}

/// Converts stub trees to and from the binary stream of one registry.
pub struct StubSerializer<'r> {
    registry: &'r ElementTypeRegistry,
}

impl<'r> StubSerializer<'r> {
    pub fn new(registry: &'r ElementTypeRegistry) -> Self {
        Self { registry }
    }

    pub fn serialize(&self, tree: &StubTree) -> Result<Vec<u8>> {
        let mut out = StubOutputStream::new();
        out.buf
            .extend_from_slice(&self.registry.version().to_le_bytes());
        if !tree.is_empty() {
            self.write_stub(tree.root(), &mut out)?;
        }
        let (bytes, table) = out.into_parts();
        debug!(
            "serialized {} stub(s) into {} byte(s), {} interned name(s)",
            tree.len(),
            bytes.len(),
            table.len()
        );
        Ok(bytes)
    }

    /// Like [`serialize`](Self::serialize) but also hands back the tree
    /// carrying the string table of this pass.
    pub fn serialize_with_table(&self, tree: StubTree) -> Result<(Vec<u8>, StubTree)> {
        let mut out = StubOutputStream::new();
        out.buf
            .extend_from_slice(&self.registry.version().to_le_bytes());
        if !tree.is_empty() {
            self.write_stub(tree.root(), &mut out)?;
        }
        let (bytes, table) = out.into_parts();
        Ok((bytes, tree.with_string_table(table)))
    }

    fn write_stub(&self, root: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        // 前順で書き出す。子は逆順に積んで先頭から取り出す
        let mut stack = vec![root];
        while let Some(stub) = stack.pop() {
            let element_type = self.registry.resolve(stub.element_type())?;
            out.write_varint(stub.element_type().raw() as u64);
            element_type.serialize(stub, out)?;

            let start = stack.len();
            stack.extend(stub.children());
            out.write_varint((stack.len() - start) as u64);
            stack[start..].reverse();
        }
        Ok(())
    }

    /// Reads only the version header.
    pub fn peek_version(bytes: &[u8]) -> Result<u64> {
        let header = bytes
            .get(..VERSION_HEADER_LEN)
            .ok_or(StubError::TruncatedStream {
                needed: VERSION_HEADER_LEN,
                remaining: bytes.len(),
            })?;
        let mut raw = [0u8; VERSION_HEADER_LEN];
        raw.copy_from_slice(header);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn is_current(&self, bytes: &[u8]) -> bool {
        Self::peek_version(bytes)
            .map(|version| version == self.registry.version())
            .unwrap_or(false)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<StubTree> {
        let found = Self::peek_version(bytes)?;
        let expected = self.registry.version();
        if found != expected {
            return Err(StubError::VersionMismatch { expected, found });
        }

        let mut input = StubInputStream::new(&bytes[VERSION_HEADER_LEN..]);
        let mut arena = StubArena::new();
        if input.remaining() > 0 {
            self.read_stub(&mut input, &mut arena)?;
        }
        if input.remaining() > 0 {
            return Err(StubError::malformed(format!(
                "{} trailing byte(s) after root stub",
                input.remaining()
            )));
        }
        let table = std::mem::take(&mut input.table);
        Ok(arena.into_tree(expected, table))
    }

    fn read_stub(&self, input: &mut StubInputStream<'_>, arena: &mut StubArena) -> Result<()> {
        // (stub, まだ読んでいない子の数)
        let mut pending: Vec<(StubId, u64)> = Vec::new();
        let (root, count) = self.read_node(input, arena, None)?;
        if count > 0 {
            pending.push((root, count));
        }

        while let Some(top) = pending.last_mut() {
            if top.1 == 0 {
                pending.pop();
                continue;
            }
            top.1 -= 1;
            let parent = top.0;
            // 新しい子の深さ = 祖先の数
            if pending.len() > MAX_STUB_DEPTH {
                return Err(StubError::malformed("stub tree nested too deeply"));
            }
            let (stub, count) = self.read_node(input, arena, Some(parent))?;
            if count > 0 {
                pending.push((stub, count));
            }
        }
        Ok(())
    }

    /// Reads one stub and its child count.
    fn read_node(
        &self,
        input: &mut StubInputStream<'_>,
        arena: &mut StubArena,
        parent: Option<StubId>,
    ) -> Result<(StubId, u64)> {
        let raw = input.read_varint()?;
        let (id, element_type) = self.registry.resolve_raw(raw)?;
        let fields = {
            let parent_ref = parent.and_then(|p| arena.get(p));
            element_type.deserialize(input, parent_ref)?
        };
        let stub = arena.push(id, parent, fields);

        let child_count = input.read_varint()?;
        // 子は最低でも1バイトずつ必要
        if child_count > input.remaining() as u64 {
            return Err(StubError::TruncatedStream {
                needed: usize::try_from(child_count).unwrap_or(usize::MAX),
                remaining: input.remaining(),
            });
        }
        Ok((stub, child_count))
    }
}
