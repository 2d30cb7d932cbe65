//! Bag-of-cells serialization
//!
//! Writes the `b5ee9c72` layout with a crc32c trailer and no index. Reading
//! accepts an index and a missing crc, but only ordinary cells.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use crc::{Crc, CRC_32_ISCSI};

use crate::error::{Error, Result};

use super::cell::Cell;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const FLAG_HAS_INDEX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;

/// Serialize a single-root bag of cells
pub fn serialize(root: &Cell) -> Result<Vec<u8>> {
    let mut seen = HashSet::new();
    let mut postorder = Vec::new();
    collect(root, &mut seen, &mut postorder);
    // reverse postorder puts every parent before its children
    postorder.reverse();
    let cells = postorder;

    let index: HashMap<[u8; 32], usize> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();

    let size_bytes = bytes_needed(cells.len() as u64);
    if size_bytes > 4 {
        return Err(Error::InvalidBoc(format!("too many cells: {}", cells.len())));
    }

    let mut payload = Vec::new();
    for cell in &cells {
        payload.extend_from_slice(&cell.descriptors());
        payload.extend_from_slice(&cell.padded_data());
        for reference in cell.references() {
            let idx = index.get(&reference.hash()).copied().ok_or_else(|| {
                Error::Internal("reference missing from cell index".to_string())
            })?;
            write_uint(&mut payload, idx as u64, size_bytes);
        }
    }

    let off_bytes = bytes_needed(payload.len() as u64);

    let mut out = Vec::with_capacity(payload.len() + 32);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(FLAG_HAS_CRC32C | size_bytes as u8);
    out.push(off_bytes as u8);
    write_uint(&mut out, cells.len() as u64, size_bytes);
    write_uint(&mut out, 1, size_bytes);
    write_uint(&mut out, 0, size_bytes);
    write_uint(&mut out, payload.len() as u64, off_bytes);
    write_uint(&mut out, 0, size_bytes);
    out.extend_from_slice(&payload);

    let crc = CRC32C.checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());

    Ok(out)
}

fn collect<'a>(cell: &'a Cell, seen: &mut HashSet<[u8; 32]>, postorder: &mut Vec<&'a Cell>) {
    if !seen.insert(cell.hash()) {
        return;
    }
    for reference in cell.references() {
        collect(reference.as_ref(), seen, postorder);
    }
    postorder.push(cell);
}

/// Deserialize a bag of cells and return its first root
pub fn deserialize(bytes: &[u8]) -> Result<Arc<Cell>> {
    let mut reader = ByteReader::new(bytes);

    if reader.read(4)? != BOC_MAGIC {
        return Err(Error::InvalidBoc("bad magic".to_string()));
    }

    let flags = reader.read_u8()?;
    let has_index = flags & FLAG_HAS_INDEX != 0;
    let has_crc = flags & FLAG_HAS_CRC32C != 0;
    let size_bytes = (flags & 0x07) as usize;
    if size_bytes == 0 || size_bytes > 4 {
        return Err(Error::InvalidBoc(format!("bad ref size {}", size_bytes)));
    }

    let off_bytes = reader.read_u8()? as usize;
    if off_bytes == 0 || off_bytes > 8 {
        return Err(Error::InvalidBoc(format!("bad offset size {}", off_bytes)));
    }

    let cell_count = reader.read_uint(size_bytes)? as usize;
    let root_count = reader.read_uint(size_bytes)? as usize;
    let _absent = reader.read_uint(size_bytes)?;
    let total_size = reader.read_uint(off_bytes)? as usize;

    if root_count == 0 || root_count > cell_count {
        return Err(Error::InvalidBoc(format!(
            "{} roots for {} cells",
            root_count, cell_count
        )));
    }
    if cell_count > bytes.len() {
        return Err(Error::InvalidBoc(format!("implausible cell count {}", cell_count)));
    }

    let root = reader.read_uint(size_bytes)? as usize;
    for _ in 1..root_count {
        reader.read_uint(size_bytes)?;
    }

    if has_index {
        reader.read(cell_count * off_bytes)?;
    }

    let cell_data = reader.read(total_size)?;

    if has_crc {
        let covered = reader.position();
        let expected = u32::from_le_bytes(
            reader
                .read(4)?
                .try_into()
                .map_err(|_| Error::InvalidBoc("truncated crc".to_string()))?,
        );
        if CRC32C.checksum(&bytes[..covered]) != expected {
            return Err(Error::InvalidBoc("crc32c mismatch".to_string()));
        }
    }

    let raw_cells = parse_raw_cells(cell_data, cell_count, size_bytes)?;

    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (i, raw) in raw_cells.into_iter().enumerate().rev() {
        let references = raw
            .references
            .iter()
            .map(|&idx| {
                built[idx]
                    .clone()
                    .ok_or_else(|| Error::InvalidBoc(format!("cell {} not built", idx)))
            })
            .collect::<Result<Vec<_>>>()?;
        built[i] = Some(Arc::new(Cell::new(raw.data, raw.bit_len, references)?));
    }

    built
        .get(root)
        .cloned()
        .flatten()
        .ok_or_else(|| Error::InvalidBoc(format!("root index {} out of range", root)))
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<usize>,
}

fn parse_raw_cells(data: &[u8], cell_count: usize, size_bytes: usize) -> Result<Vec<RawCell>> {
    let mut reader = ByteReader::new(data);
    let mut cells = Vec::with_capacity(cell_count);

    for i in 0..cell_count {
        let d1 = reader.read_u8()?;
        let d2 = reader.read_u8()?;

        if d1 & 0x08 != 0 {
            return Err(Error::InvalidBoc(format!("cell {} is exotic", i)));
        }
        let ref_count = (d1 & 0x07) as usize;
        if ref_count > 4 {
            return Err(Error::InvalidBoc(format!("cell {} has {} refs", i, ref_count)));
        }

        let byte_len = (d2 as usize).div_ceil(2);
        let data = reader.read(byte_len)?.to_vec();
        let bit_len = if d2 % 2 == 0 {
            byte_len * 8
        } else {
            let last = data.last().copied().unwrap_or(0);
            if last == 0 {
                return Err(Error::InvalidBoc(format!("cell {} lacks completion tag", i)));
            }
            byte_len * 8 - (last.trailing_zeros() as usize + 1)
        };

        let mut references = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let idx = reader.read_uint(size_bytes)? as usize;
            if idx <= i || idx >= cell_count {
                return Err(Error::InvalidBoc(format!(
                    "cell {} references {} out of order",
                    i, idx
                )));
            }
            references.push(idx);
        }

        cells.push(RawCell {
            data,
            bit_len,
            references,
        });
    }

    Ok(cells)
}

fn bytes_needed(value: u64) -> usize {
    (((64 - value.leading_zeros()) as usize).div_ceil(8)).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, bytes: usize) {
    for i in (0..bytes).rev() {
        out.push((value >> (8 * i)) as u8);
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::InvalidBoc("unexpected end of data".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    fn read_uint(&mut self, bytes: usize) -> Result<u64> {
        Ok(self
            .read(bytes)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}

impl Cell {
    /// Serialize this cell tree as a single-root BOC with crc32c
    pub fn to_boc(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// [`Cell::to_boc`], base64 encoded
    pub fn to_boc_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_boc()?))
    }

    /// Read the first root of a BOC
    pub fn from_boc(bytes: &[u8]) -> Result<Arc<Cell>> {
        deserialize(bytes)
    }

    /// Decode a base64 BOC, standard or url-safe alphabet
    pub fn from_boc_base64(value: &str) -> Result<Arc<Cell>> {
        let bytes = STANDARD
            .decode(value.trim())
            .or_else(|_| URL_SAFE.decode(value.trim()))
            .map_err(|e| Error::InvalidBoc(format!("base64: {}", e)))?;
        deserialize(&bytes)
    }
}
