//! Versioned binary archive for built trees
//!
//! Layout, header fields little-endian:
//!
//! | field            | type      | notes                        |
//! |------------------|-----------|------------------------------|
//! | magic            | `b"KDOP"` |                              |
//! | version          | `u32`     | 1 or 2                       |
//! | index width      | `u32`     | version 2 only; 2 or 4 bytes |
//! | node count       | `u32`     |                              |
//! | triangle count   | `u32`     |                              |
//! | nodes            | records   | `node count` node records    |
//! | triangles        | records   | `[v1, v2, v3, material]`     |
//!
//! Version 1 always stores 32-bit indices. Node and triangle records are bulk
//! copies of `#[repr(C)]` structs in the writer's byte order, so archives only
//! move between machines of the same endianness.

use super::bounds::Kdop;
use super::index::KdopIndex;
use super::node::{KdopNode, NodeKind};
use super::tree::KdopTree;
use super::triangle::CollisionTriangle;
use crate::config::KdopConfig;
use crate::error::{KdopError, KdopResult};
use crate::foundation::math::Vec3;
use bytemuck::{Pod, Zeroable};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: [u8; 4] = *b"KDOP";

/// Archive format revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    /// All indices stored as 32 bits
    Legacy,
    /// Indices stored at the tree's own width
    #[default]
    Current,
}

impl FormatVersion {
    /// Version number written to the header
    pub const fn number(self) -> u32 {
        match self {
            Self::Legacy => 1,
            Self::Current => 2,
        }
    }

    /// Parse a header version number
    pub const fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::Legacy),
            2 => Some(Self::Current),
            _ => None,
        }
    }
}

/// Fixed-size node record of one index width
trait NodeRecord: Pod {
    type Index: KdopIndex;

    fn encode<I: KdopIndex>(node: &KdopNode<I>) -> KdopResult<Self>;

    fn decode<I: KdopIndex>(&self) -> KdopResult<KdopNode<I>>;
}

/// Re-express an index at another width
fn convert<I: KdopIndex, J: KdopIndex>(what: &'static str, value: I) -> KdopResult<J> {
    J::checked(what, value.to_usize())
}

macro_rules! node_record {
    ($name:ident, $index:ty) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
        struct $name {
            min: [f32; 3],
            max: [f32; 3],
            is_leaf: u32,
            a: $index,
            b: $index,
        }

        impl NodeRecord for $name {
            type Index = $index;

            fn encode<I: KdopIndex>(node: &KdopNode<I>) -> KdopResult<Self> {
                let (is_leaf, a, b) = match node.kind {
                    NodeKind::Leaf {
                        num_triangles,
                        start_index,
                    } => (1, convert("leaf triangle count", num_triangles)?, convert("triangle start index", start_index)?),
                    NodeKind::Internal { left, right } => {
                        (0, convert("node index", left)?, convert("node index", right)?)
                    }
                };
                let volume = &node.bounding_volume;
                Ok(Self {
                    min: [volume.min.x, volume.min.y, volume.min.z],
                    max: [volume.max.x, volume.max.y, volume.max.z],
                    is_leaf,
                    a,
                    b,
                })
            }

            fn decode<I: KdopIndex>(&self) -> KdopResult<KdopNode<I>> {
                let kind = match self.is_leaf {
                    1 => NodeKind::Leaf {
                        num_triangles: convert("leaf triangle count", self.a)?,
                        start_index: convert("triangle start index", self.b)?,
                    },
                    0 => NodeKind::Internal {
                        left: convert("node index", self.a)?,
                        right: convert("node index", self.b)?,
                    },
                    other => return Err(KdopError::Corrupt(format!("invalid leaf flag {other}"))),
                };
                Ok(KdopNode {
                    bounding_volume: Kdop::from_bounds(Vec3::from(self.min), Vec3::from(self.max)),
                    kind,
                })
            }
        }
    };
}

node_record!(NodeRecord16, u16);
node_record!(NodeRecord32, u32);

fn encode_triangle<I: KdopIndex, J: KdopIndex>(triangle: &CollisionTriangle<I>) -> KdopResult<[J; 4]> {
    Ok([
        convert("vertex index", triangle.v1)?,
        convert("vertex index", triangle.v2)?,
        convert("vertex index", triangle.v3)?,
        convert("material index", triangle.material_index)?,
    ])
}

fn decode_triangle<J: KdopIndex, I: KdopIndex>(record: &[J; 4]) -> KdopResult<CollisionTriangle<I>> {
    Ok(CollisionTriangle::new(
        convert("vertex index", record[0])?,
        convert("vertex index", record[1])?,
        convert("vertex index", record[2])?,
        convert("material index", record[3])?,
    ))
}

fn read_u32<R: Read>(reader: &mut R) -> KdopResult<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn count_to_u32(what: &'static str, count: usize) -> KdopResult<u32> {
    u32::try_from(count).map_err(|_| KdopError::IndexOverflow {
        what,
        value: count,
        max: u32::MAX as usize,
    })
}

/// Read exactly `count` records of `T`
fn read_records<T: Pod, R: Read>(reader: &mut R, count: u32, what: &str) -> KdopResult<Vec<T>> {
    let length = (count as usize)
        .checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| KdopError::Corrupt(format!("{what} count {count} is too large")))?;
    let mut bytes = Vec::new();
    reader.by_ref().take(length as u64).read_to_end(&mut bytes)?;
    if bytes.len() != length {
        return Err(KdopError::Corrupt(format!(
            "{what} section truncated: expected {length} bytes, found {}",
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

impl<I: KdopIndex> KdopTree<I> {
    /// Write the tree in the given format
    pub fn write_to<W: Write>(&self, writer: &mut W, version: FormatVersion) -> KdopResult<()> {
        let width = match version {
            FormatVersion::Legacy => u32::WIDTH,
            FormatVersion::Current => I::WIDTH,
        };

        writer.write_all(&MAGIC)?;
        writer.write_all(&version.number().to_le_bytes())?;
        if version == FormatVersion::Current {
            writer.write_all(&width.to_le_bytes())?;
        }
        writer.write_all(&count_to_u32("node count", self.nodes().len())?.to_le_bytes())?;
        writer.write_all(&count_to_u32("triangle count", self.triangles().len())?.to_le_bytes())?;

        match width {
            2 => self.write_records::<NodeRecord16, W>(writer)?,
            _ => self.write_records::<NodeRecord32, W>(writer)?,
        }

        log::debug!(
            "Saved kDOP tree: version {}, {}-byte indices, {} nodes, {} triangles",
            version.number(),
            width,
            self.nodes().len(),
            self.triangles().len()
        );
        Ok(())
    }

    fn write_records<N: NodeRecord, W: Write>(&self, writer: &mut W) -> KdopResult<()> {
        let nodes = self.nodes().iter().map(N::encode).collect::<KdopResult<Vec<N>>>()?;
        writer.write_all(bytemuck::cast_slice(&nodes))?;
        let triangles = self
            .triangles()
            .iter()
            .map(encode_triangle::<I, N::Index>)
            .collect::<KdopResult<Vec<_>>>()?;
        writer.write_all(bytemuck::cast_slice(&triangles))?;
        Ok(())
    }

    /// Read a tree written in any supported format
    ///
    /// Indices are widened or narrowed to `I`; a stored index that does not
    /// fit is an [`KdopError::IndexOverflow`]. The structure is checked before
    /// the tree is returned. `config` supplies the query tolerances, which
    /// archives do not store.
    pub fn read_from<R: Read>(reader: &mut R, config: KdopConfig) -> KdopResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(KdopError::BadMagic);
        }

        let number = read_u32(reader)?;
        let version = FormatVersion::from_number(number).ok_or(KdopError::UnsupportedVersion(number))?;
        let width = match version {
            FormatVersion::Legacy => u32::WIDTH,
            FormatVersion::Current => read_u32(reader)?,
        };
        let node_count = read_u32(reader)?;
        let triangle_count = read_u32(reader)?;

        let (nodes, triangles) = match width {
            2 => Self::read_records::<NodeRecord16, R>(reader, node_count, triangle_count)?,
            4 => Self::read_records::<NodeRecord32, R>(reader, node_count, triangle_count)?,
            other => return Err(KdopError::UnsupportedIndexWidth(other)),
        };

        if version == FormatVersion::Legacy {
            log::warn!(
                "Migrating legacy kDOP archive ({node_count} nodes) from 4-byte to {}-byte indices",
                I::WIDTH
            );
        }
        log::debug!(
            "Loaded kDOP tree: version {}, {}-byte indices, {} nodes, {} triangles",
            version.number(),
            width,
            node_count,
            triangle_count
        );

        Self::from_parts(nodes, triangles, config)
    }

    fn read_records<N: NodeRecord, R: Read>(
        reader: &mut R,
        node_count: u32,
        triangle_count: u32,
    ) -> KdopResult<(Vec<KdopNode<I>>, Vec<CollisionTriangle<I>>)> {
        let nodes = read_records::<N, R>(reader, node_count, "node")?
            .iter()
            .map(N::decode)
            .collect::<KdopResult<Vec<_>>>()?;
        let triangles = read_records::<[N::Index; 4], R>(reader, triangle_count, "triangle")?
            .iter()
            .map(decode_triangle::<N::Index, I>)
            .collect::<KdopResult<Vec<_>>>()?;
        Ok((nodes, triangles))
    }

    /// Write the tree to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>, version: FormatVersion) -> KdopResult<()> {
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        self.write_to(&mut writer, version)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a tree from a file
    pub fn load_from_file(path: impl AsRef<Path>, config: KdopConfig) -> KdopResult<Self> {
        let mut reader = BufReader::new(std::fs::File::open(path)?);
        Self::read_from(&mut reader, config)
    }
}
