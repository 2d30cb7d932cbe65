//! Cells, the builder that writes them and the slice that reads them back
//!
//! Only ordinary cells are modelled. A cell holds up to 1023 bits and up to
//! four references; its identity is the SHA-256 representation hash.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

use super::address::Address;
use super::coins::Coins;

/// Data bits one cell can hold
pub const MAX_CELL_BITS: usize = 1023;
/// References one cell can hold
pub const MAX_CELL_REFS: usize = 4;

/// Bytes per link of a snake-encoded string
const SNAKE_CHUNK: usize = 127;

/// Immutable ordinary cell
#[derive(Clone)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    /// Create a cell from its bits and references
    ///
    /// `data` must hold at least `bit_len` bits; anything past them is cleared.
    pub fn new(mut data: Vec<u8>, bit_len: usize, references: Vec<Arc<Cell>>) -> Result<Self> {
        if bit_len > MAX_CELL_BITS {
            return Err(Error::CellOverflow(format!(
                "{} bits exceed the {} bit limit",
                bit_len, MAX_CELL_BITS
            )));
        }
        if references.len() > MAX_CELL_REFS {
            return Err(Error::CellOverflow(format!(
                "{} references exceed the {} reference limit",
                references.len(),
                MAX_CELL_REFS
            )));
        }

        let byte_len = bit_len.div_ceil(8);
        if data.len() < byte_len {
            return Err(Error::CellUnderflow(format!(
                "{} bytes cannot hold {} bits",
                data.len(),
                bit_len
            )));
        }
        data.truncate(byte_len);
        let tail = bit_len % 8;
        if tail != 0 {
            if let Some(last) = data.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }

        Ok(Self::from_checked_parts(data, bit_len, references))
    }

    /// Cell with no bits and no references
    pub fn empty() -> Self {
        Self::from_checked_parts(Vec::new(), 0, Vec::new())
    }

    fn from_checked_parts(data: Vec<u8>, bit_len: usize, references: Vec<Arc<Cell>>) -> Self {
        let depth = references
            .iter()
            .map(|r| r.depth.saturating_add(1))
            .max()
            .unwrap_or(0);

        let mut cell = Self {
            data,
            bit_len,
            references,
            hash: [0u8; 32],
            depth,
        };
        cell.hash = Sha256::digest(cell.representation()).into();
        cell
    }

    /// Data bytes, last byte zero padded
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Reference at `index`, or an error past the end
    pub fn reference(&self, index: usize) -> Result<&Arc<Cell>> {
        self.references.get(index).ok_or_else(|| {
            Error::CellUnderflow(format!("no reference at index {}", index))
        })
    }

    /// Representation hash (SHA-256 over descriptors, data, child depths and hashes)
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    /// Longest reference chain below this cell
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Start reading this cell from the first bit
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// Descriptor bytes `d1 d2` for an ordinary level-0 cell
    pub(crate) fn descriptors(&self) -> [u8; 2] {
        let d1 = self.references.len() as u8;
        let d2 = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        [d1, d2]
    }

    /// Data with the completion tag appended when the bit length is not byte aligned
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        let tail = self.bit_len % 8;
        if tail != 0 {
            if let Some(last) = data.last_mut() {
                *last |= 0x80 >> tail;
            }
        }
        data
    }

    fn representation(&self) -> Vec<u8> {
        let mut repr = Vec::with_capacity(2 + self.data.len() + self.references.len() * 34);
        repr.extend_from_slice(&self.descriptors());
        repr.extend_from_slice(&self.padded_data());
        for reference in &self.references {
            repr.extend_from_slice(&reference.depth.to_be_bytes());
        }
        for reference in &self.references {
            repr.extend_from_slice(&reference.hash);
        }
        repr
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.references.len())
            .field("hash", &hex::encode(self.hash))
            .finish()
    }
}

/// Incremental writer for a single cell
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(Error::CellOverflow(format!(
                "cannot store {} bits, {} left",
                bits,
                self.remaining_bits()
            )));
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Store `value` as a big-endian unsigned integer of `bits` width
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        self.store_u128(value as u128, bits)
    }

    /// Store `value` big-endian in `bits` bits; fails if it does not fit
    pub fn store_u128(&mut self, value: u128, bits: usize) -> Result<&mut Self> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(Error::CellOverflow(format!(
                "{} does not fit in {} bits",
                value, bits
            )));
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store a two's complement signed integer of `bits` width
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        if bits == 0 || bits > 64 {
            return Err(Error::CellOverflow(format!("bad int width {}", bits)));
        }
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if (value as i128) < min || (value as i128) > max {
            return Err(Error::CellOverflow(format!(
                "{} does not fit in a {} bit signed integer",
                value, bits
            )));
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint(value as u64 & mask, bits)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    /// Copy the first `bit_len` bits of `data`
    pub fn store_bits(&mut self, data: &[u8], bit_len: usize) -> Result<&mut Self> {
        if data.len() * 8 < bit_len {
            return Err(Error::CellUnderflow(format!(
                "{} bytes cannot supply {} bits",
                data.len(),
                bit_len
            )));
        }
        self.ensure_bits(bit_len)?;
        for i in 0..bit_len {
            self.push_bit(data[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        Ok(self)
    }

    /// `VarUInteger 16`: a 4-bit byte length followed by the value
    pub fn store_coins(&mut self, coins: Coins) -> Result<&mut Self> {
        let value = coins.nano();
        let byte_len = (128 - value.leading_zeros() as usize).div_ceil(8);
        self.ensure_bits(4 + byte_len * 8)?;
        self.store_uint(byte_len as u64, 4)?;
        self.store_u128(value, byte_len * 8)
    }

    /// `addr_std$10 anycast:nothing workchain_id:int8 address:bits256`
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        self.ensure_bits(267)?;
        self.store_uint(0b10, 2)?;
        self.store_bit(false)?;
        self.store_int(address.workchain() as i64, 8)?;
        self.store_bytes(address.hash_part())
    }

    /// `addr_none$00`
    pub fn store_address_none(&mut self) -> Result<&mut Self> {
        self.store_uint(0, 2)
    }

    /// `addr_none` for `None`
    pub fn store_maybe_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            Some(address) => self.store_address(address),
            None => self.store_address_none(),
        }
    }

    /// Append a child; fails past four references
    pub fn store_reference(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(Error::CellOverflow("reference limit reached".to_string()));
        }
        self.references.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`
    pub fn store_maybe_reference(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self> {
        match cell {
            Some(cell) => {
                if self.references.len() >= MAX_CELL_REFS {
                    return Err(Error::CellOverflow("reference limit reached".to_string()));
                }
                self.store_bit(true)?;
                self.store_reference(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Append the bits and references of another cell
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        if self.references.len() + cell.references().len() > MAX_CELL_REFS {
            return Err(Error::CellOverflow("reference limit reached".to_string()));
        }
        self.store_bits(cell.data(), cell.bit_len())?;
        for reference in cell.references() {
            self.store_reference(reference.clone())?;
        }
        Ok(self)
    }

    /// Store bytes inline while they fit, continuing in a chain of child cells
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let inline = (self.remaining_bits() / 8).min(bytes.len());
        let (head, rest) = bytes.split_at(inline);

        let mut tail: Option<Arc<Cell>> = None;
        for chunk in rest.chunks(SNAKE_CHUNK).rev() {
            let mut link = CellBuilder::new();
            link.store_bytes(chunk)?;
            if let Some(next) = tail.take() {
                link.store_reference(next)?;
            }
            tail = Some(Arc::new(link.build()?));
        }

        if tail.is_some() && self.references.len() >= MAX_CELL_REFS {
            return Err(Error::CellOverflow("no room for snake tail".to_string()));
        }
        self.store_bytes(head)?;
        if let Some(tail) = tail {
            self.store_reference(tail)?;
        }
        Ok(self)
    }

    /// Finish the cell
    pub fn build(&self) -> Result<Cell> {
        Cell::new(self.data.clone(), self.bit_len, self.references.clone())
    }
}

/// Cursor over the bits and references of a cell
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    /// Reader positioned at the first bit and reference
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.references().len() - self.ref_pos
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(Error::CellUnderflow(format!(
                "need {} bits, {} left",
                bits,
                self.remaining_bits()
            )));
        }
        Ok(())
    }

    fn next_bit(&mut self) -> bool {
        let byte = self.cell.data()[self.bit_pos / 8];
        let bit = byte & (0x80 >> (self.bit_pos % 8)) != 0;
        self.bit_pos += 1;
        bit
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        Ok(self.next_bit())
    }

    /// Read an unsigned integer of at most 64 bits
    pub fn load_uint(&mut self, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(Error::CellUnderflow(format!("bad uint width {}", bits)));
        }
        Ok(self.load_u128(bits)? as u64)
    }

    pub fn load_u128(&mut self, bits: usize) -> Result<u128> {
        if bits > 128 {
            return Err(Error::CellUnderflow(format!("bad uint width {}", bits)));
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | self.next_bit() as u128;
        }
        Ok(value)
    }

    /// Read a two's complement integer of at most 64 bits
    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        if bits == 0 || bits > 64 {
            return Err(Error::CellUnderflow(format!("bad int width {}", bits)));
        }
        let raw = self.load_uint(bits)?;
        if bits < 64 && raw & (1u64 << (bits - 1)) != 0 {
            Ok((raw | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(raw as i64)
        }
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        (0..len).map(|_| self.load_uint(8).map(|b| b as u8)).collect()
    }

    /// Read a `VarUInteger 16` amount
    pub fn load_coins(&mut self) -> Result<Coins> {
        let byte_len = self.load_uint(4)? as usize;
        Coins::new(self.load_u128(byte_len * 8)?)
    }

    /// Read a `MsgAddress`; `addr_none` yields `None`
    pub fn load_address(&mut self) -> Result<Option<Address>> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(Error::InvalidAddress("anycast is not supported".to_string()));
                }
                let workchain = self.load_int(8)? as i32;
                let bytes = self.load_bytes(32)?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&bytes);
                Ok(Some(Address::new(workchain, hash)))
            }
            tag => Err(Error::InvalidAddress(format!(
                "unsupported address tag {:#04b}",
                tag
            ))),
        }
    }

    /// Next unread reference
    pub fn load_reference(&mut self) -> Result<&'a Arc<Cell>> {
        let cell = self.cell.reference(self.ref_pos)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    pub fn load_maybe_reference(&mut self) -> Result<Option<&'a Arc<Cell>>> {
        if self.load_bit()? {
            self.load_reference().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read the remaining bytes and follow the first reference chain
    pub fn load_snake_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut current = self.clone();
        loop {
            if current.remaining_bits() % 8 != 0 {
                return Err(Error::CellUnderflow(
                    "snake data is not byte aligned".to_string(),
                ));
            }
            bytes.extend(current.load_bytes(current.remaining_bits() / 8)?);
            if current.remaining_refs() == 0 {
                break;
            }
            current = CellSlice::new(current.load_reference()?);
        }
        self.bit_pos = self.cell.bit_len();
        self.ref_pos = self.cell.references().len();
        Ok(bytes)
    }

    /// Whatever is left of the slice as a cell of its own
    pub fn to_cell(&self) -> Result<Cell> {
        let mut rest = self.clone();
        let mut builder = CellBuilder::new();
        while rest.remaining_bits() > 0 {
            builder.store_bit(rest.next_bit())?;
        }
        while rest.remaining_refs() > 0 {
            builder.store_reference(rest.load_reference()?.clone())?;
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell_hash() {
        // Well-known hash of the empty ordinary cell
        assert_eq!(
            hex::encode(Cell::empty().hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn test_uint_roundtrip() {
        let cell = CellBuilder::new()
            .store_uint(0x0f8a7ea5, 32)
            .unwrap()
            .store_uint(5, 3)
            .unwrap()
            .store_int(-1, 8)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cell.bit_len(), 43);

        let mut slice = cell.parse();
        assert_eq!(slice.load_uint(32).unwrap(), 0x0f8a7ea5);
        assert_eq!(slice.load_uint(3).unwrap(), 5);
        assert_eq!(slice.load_int(8).unwrap(), -1);
        assert_eq!(slice.remaining_bits(), 0);
        assert!(slice.load_bit().is_err());
    }

    #[test]
    fn test_uint_overflow() {
        assert!(CellBuilder::new().store_uint(8, 3).is_err());
        assert!(CellBuilder::new().store_int(128, 8).is_err());
        assert!(CellBuilder::new().store_int(-129, 8).is_err());

        let mut builder = CellBuilder::new();
        builder.store_bytes(&[0u8; 127]).unwrap();
        assert_eq!(builder.remaining_bits(), 7);
        assert!(builder.store_uint(0, 8).is_err());
    }

    #[test]
    fn test_reference_limit() {
        let child = Arc::new(Cell::empty());
        let mut builder = CellBuilder::new();
        for _ in 0..4 {
            builder.store_reference(child.clone()).unwrap();
        }
        assert!(builder.store_reference(child).is_err());
    }

    #[test]
    fn test_coins_encoding() {
        let cell = CellBuilder::new()
            .store_coins(Coins::ZERO)
            .unwrap()
            .store_coins(Coins::from_nano(1_000_000_000))
            .unwrap()
            .build()
            .unwrap();
        // zero takes only the length nibble; 1e9 needs 4 bytes
        assert_eq!(cell.bit_len(), 4 + 4 + 32);

        let mut slice = cell.parse();
        assert_eq!(slice.load_coins().unwrap(), Coins::ZERO);
        assert_eq!(slice.load_coins().unwrap(), Coins::from_nano(1_000_000_000));
    }

    #[test]
    fn test_address_encoding() {
        let address = Address::new(-1, [7u8; 32]);
        let cell = CellBuilder::new()
            .store_address(&address)
            .unwrap()
            .store_address_none()
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cell.bit_len(), 267 + 2);

        let mut slice = cell.parse();
        assert_eq!(slice.load_address().unwrap(), Some(address));
        assert_eq!(slice.load_address().unwrap(), None);
    }

    #[test]
    fn test_snake_bytes_span_cells() {
        let text = "x".repeat(400);
        let cell = CellBuilder::new()
            .store_uint(0, 32)
            .unwrap()
            .store_snake_bytes(text.as_bytes())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cell.references().len(), 1);
        assert!(cell.depth() >= 1);

        let mut slice = cell.parse();
        slice.load_uint(32).unwrap();
        assert_eq!(slice.load_snake_bytes().unwrap(), text.as_bytes());
    }

    #[test]
    fn test_hash_depends_on_children() {
        let leaf_a = Arc::new(CellBuilder::new().store_uint(1, 8).unwrap().build().unwrap());
        let leaf_b = Arc::new(CellBuilder::new().store_uint(2, 8).unwrap().build().unwrap());

        let a = CellBuilder::new().store_reference(leaf_a).unwrap().build().unwrap();
        let b = CellBuilder::new().store_reference(leaf_b).unwrap().build().unwrap();
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.depth(), 1);
    }

    #[test]
    fn test_slice_to_cell() {
        let child = Arc::new(Cell::empty());
        let cell = CellBuilder::new()
            .store_uint(0xAB, 8)
            .unwrap()
            .store_uint(0b101, 3)
            .unwrap()
            .store_reference(child)
            .unwrap()
            .build()
            .unwrap();

        let mut slice = cell.parse();
        slice.load_uint(8).unwrap();
        let rest = slice.to_cell().unwrap();
        assert_eq!(rest.bit_len(), 3);
        assert_eq!(rest.references().len(), 1);
        assert_eq!(rest.parse().load_uint(3).unwrap(), 0b101);
    }
}
