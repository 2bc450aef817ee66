//! Variable-width integer cells.
//!
//! A non-negative value up to [`MAX_VALUE`] is stored in the smallest of four cells,
//! with width flags in the most significant bits:
//!
//! ```text
//! 1 byte   0xxxxxxx                                   value <= 0x7F
//! 2 bytes  10xxxxxx xxxxxxxx                          value <= 0x3FFF
//! 4 bytes  110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx        value <= 0x1FFF_FFFF
//! 8 bytes  111xxxxx xxxxxxxx ... (8 bytes total)      value <= 2^60 - 1
//! ```
//!
//! The decoder always pulls the flag byte first and then progressively widens to 2, 4
//! and 8 bytes. A cell written with [`write_forward`] (big-endian) is decoded from a
//! [`Forward`] source; a cell written with [`write_backward`] (little-endian, flag byte
//! last) is decoded from a [`Backward`] source starting at the end of the cell. The
//! backward form is what lets the blueprint be appended without knowing its final size
//! and then consumed from its end.
//!
//! Lists are `N` fixed-width little-endian values, one tag byte holding the width
//! (1, 2, 4 or 8), and `N` as a backward cell. Read backward, the count comes first,
//! then the tag, then the values.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use lazyjson_common::{Error, Result};

/// Largest value representable by a cell.
pub const MAX_VALUE: u64 = (1 << 60) - 1;

const MAX_1: u64 = 0x7F;
const MAX_2: u64 = 0x3FFF;
const MAX_4: u64 = 0x1FFF_FFFF;

const FLAG_2: u64 = 0x8000;
const FLAG_4: u64 = 0xC000_0000;
const FLAG_8: u64 = 0xE000_0000_0000_0000;

const MASK_2: u64 = 0xC000;
const MASK_4: u64 = 0xE000_0000;

/// Returns the cell width, in bytes, used to encode `value`.
///
/// # Panics
///
/// Panics if `value` exceeds [`MAX_VALUE`].
pub fn encoded_len(value: u64) -> usize {
    assert!(value <= MAX_VALUE, "varint value {value} exceeds {MAX_VALUE}");
    if value <= MAX_1 {
        1
    } else if value <= MAX_2 {
        2
    } else if value <= MAX_4 {
        4
    } else {
        8
    }
}

/// Returns the flagged cell for `value` together with its width.
///
/// # Panics
///
/// Panics if `value` exceeds [`MAX_VALUE`].
pub fn encode_cell(value: u64) -> (u64, usize) {
    match encoded_len(value) {
        1 => (value, 1),
        2 => (value | FLAG_2, 2),
        4 => (value | FLAG_4, 4),
        _ => (value | FLAG_8, 8),
    }
}

/// Appends `value` as a big-endian cell, decodable with a [`Forward`] source.
pub fn write_forward(value: u64, out: &mut Vec<u8>) -> usize {
    let (cell, width) = encode_cell(value);
    let mut bytes = [0u8; 8];
    match width {
        1 => bytes[0] = cell as u8,
        2 => BigEndian::write_u16(&mut bytes, cell as u16),
        4 => BigEndian::write_u32(&mut bytes, cell as u32),
        _ => BigEndian::write_u64(&mut bytes, cell),
    }
    out.extend_from_slice(&bytes[..width]);
    width
}

/// Appends `value` as a little-endian cell, decodable from its end with a [`Backward`]
/// source.
pub fn write_backward(value: u64, out: &mut Vec<u8>) -> usize {
    let (cell, width) = encode_cell(value);
    let mut bytes = [0u8; 8];
    match width {
        1 => bytes[0] = cell as u8,
        2 => LittleEndian::write_u16(&mut bytes, cell as u16),
        4 => LittleEndian::write_u32(&mut bytes, cell as u32),
        _ => LittleEndian::write_u64(&mut bytes, cell),
    }
    out.extend_from_slice(&bytes[..width]);
    width
}

/// A source of cell bytes, most significant byte first.
pub trait CellSource {
    fn pull(&mut self) -> Result<u8>;
}

/// Decodes one cell from `src`.
pub fn decode<S: CellSource + ?Sized>(src: &mut S) -> Result<u64> {
    let value = src.pull()? as u64;
    if value & 0x80 == 0 {
        return Ok(value);
    }
    let value = (value << 8) | src.pull()? as u64;
    if value & MASK_2 == FLAG_2 {
        return Ok(value & !MASK_2);
    }
    let value = (value << 16) | pull_n(src, 2)?;
    if value & MASK_4 == FLAG_4 {
        return Ok(value & !MASK_4);
    }
    let value = (value << 32) | pull_n(src, 4)?;
    let value = value & !FLAG_8;
    if value > MAX_VALUE {
        return Err(Error::invalid_format_msg(
            "varint",
            format!("cell value {value} exceeds {MAX_VALUE}"),
        ));
    }
    Ok(value)
}

fn pull_n<S: CellSource + ?Sized>(src: &mut S, n: usize) -> Result<u64> {
    let mut value = 0u64;
    for _ in 0..n {
        value = (value << 8) | src.pull()? as u64;
    }
    Ok(value)
}

/// Reads cells front to back from a slice of big-endian cells.
pub struct Forward<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Forward<'a> {
    pub fn new(data: &'a [u8]) -> Forward<'a> {
        Forward { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl CellSource for Forward<'_> {
    fn pull(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| {
            Error::out_of_bounds("varint", self.pos as u64, self.data.len() as u64)
        })?;
        self.pos += 1;
        Ok(b)
    }
}

/// Reads cells back to front from a slice of little-endian cells, starting at `end`.
pub struct Backward<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Backward<'a> {
    pub fn new(data: &'a [u8]) -> Backward<'a> {
        Backward {
            data,
            pos: data.len(),
        }
    }

    pub fn from_end(data: &'a [u8], end: usize) -> Backward<'a> {
        Backward {
            data,
            pos: end.min(data.len()),
        }
    }

    /// Offset just past the next byte to be pulled.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl CellSource for Backward<'_> {
    fn pull(&mut self) -> Result<u8> {
        if self.pos == 0 {
            return Err(Error::out_of_bounds("varint", 0, self.data.len() as u64));
        }
        self.pos -= 1;
        Ok(self.data[self.pos])
    }
}

/// Element width used by a list whose largest value is `max_value`.
pub fn list_width(max_value: u64) -> usize {
    if max_value <= u8::MAX as u64 {
        1
    } else if max_value <= u16::MAX as u64 {
        2
    } else if max_value <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Validates a list width tag.
pub fn check_list_tag(tag: u8) -> Result<usize> {
    match tag {
        1 | 2 | 4 | 8 => Ok(tag as usize),
        _ => Err(Error::invalid_format_msg(
            "varint list",
            format!("unsupported width tag {tag}"),
        )),
    }
}

/// Appends a list of values, all at most `max_value`, returning the number of bytes written.
///
/// # Panics
///
/// Panics if a value exceeds `max_value`, or if the count exceeds [`MAX_VALUE`].
pub fn write_list(values: &[u64], max_value: u64, out: &mut Vec<u8>) -> usize {
    let width = list_width(max_value);
    let start = out.len();
    let mut bytes = [0u8; 8];
    for &value in values {
        assert!(value <= max_value, "list value {value} exceeds {max_value}");
        LittleEndian::write_u64(&mut bytes, value);
        out.extend_from_slice(&bytes[..width]);
    }
    out.push(width as u8);
    write_backward(values.len() as u64, out);
    out.len() - start
}

/// Decodes one little-endian fixed-width list element.
pub fn read_list_element(bytes: &[u8], width: usize) -> u64 {
    match width {
        1 => bytes[0] as u64,
        2 => LittleEndian::read_u16(bytes) as u64,
        4 => LittleEndian::read_u32(bytes) as u64,
        _ => LittleEndian::read_u64(bytes),
    }
}

/// Decodes a list ending at `end`, returning the values and the offset where the list
/// starts.
pub fn read_list_backward(data: &[u8], end: usize) -> Result<(Vec<u64>, usize)> {
    let mut src = Backward::from_end(data, end);
    let count = decode(&mut src)?;
    let width = check_list_tag(src.pull()?)?;
    let tail = src.position();
    let len = (count as usize)
        .checked_mul(width)
        .filter(|&len| len <= tail)
        .ok_or_else(|| Error::out_of_bounds("varint list", count, tail as u64))?;
    let start = tail - len;
    let values = data[start..tail]
        .chunks_exact(width)
        .map(|chunk| read_list_element(chunk, width))
        .collect();
    Ok((values, start))
}
