use std::str;

use crate::error::CodecError;

/// Largest count (pool cardinality, list length, string length) the wire
/// format can carry.
pub const MAX_COUNT: usize = i32::MAX as usize;

/// Number of bytes used to encode a reference into a pool holding
/// `cardinality` objects. A pool of zero or one objects needs no bytes at all:
/// the only possible index is 0.
pub fn index_width(cardinality: usize) -> usize {
    if cardinality <= 1 {
        0
    } else if cardinality <= 1 << 8 {
        1
    } else if cardinality <= 1 << 16 {
        2
    } else {
        4
    }
}

/// A byte buffer meant for reading region data.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_region_schema::ByteBuffer::new(&[3, 0, 0, 0, 240, 159, 141, 149]);
/// assert!(bb.read_string().is_err());
///
/// let mut bb = brine_region_schema::ByteBuffer::new(&[2, 0, 0, 0, 104, 105, 7]);
/// assert_eq!(bb.read_string(), Ok("hi".to_string()));
/// assert_eq!(bb.read_index(200), Ok(7));
/// ```
///
pub struct ByteBuffer<'a> {
    data:  &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    /// Try to read a boolean value starting at the current index. Only the
    /// bytes 0 and 1 are valid.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        if self.index >= self.data.len() {
            Err(CodecError::EndOfData)
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            Err(CodecError::EndOfData)
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.read_bytes(N)?
            .try_into()
            .map_err(|_| CodecError::EndOfData)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.read_byte()
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_byte()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Try to read a variable-length unsigned integer: 7 bits per byte, low
    /// bits first, with the high bit set on every byte but the last.
    pub fn read_var_uint(&mut self) -> Result<u64, CodecError> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            // The tenth byte only has room for the top bit.
            if shift == 63 && byte > 1 {
                return Err(CodecError::VarIntOverflow);
            }
            result |= ((byte & 127) as u64) << shift;
            if byte & 128 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Try to read a zig-zag encoded variable-length signed integer.
    pub fn read_var_int(&mut self) -> Result<i64, CodecError> {
        let value = self.read_var_uint()?;
        Ok((value >> 1) as i64 ^ -((value & 1) as i64))
    }

    /// Try to read a 4-byte count (pool cardinality or list length).
    pub fn read_count(&mut self) -> Result<usize, CodecError> {
        let count = self.read_u32()? as usize;
        if count > MAX_COUNT {
            return Err(CodecError::CountOutOfRange(count));
        }
        Ok(count)
    }

    /// Try to read a reference into a pool of `cardinality` objects, using the
    /// width selected by [index_width](fn.index_width.html).
    pub fn read_index(&mut self, cardinality: usize) -> Result<usize, CodecError> {
        let index = match index_width(cardinality) {
            0 => 0,
            1 => self.read_u8()? as usize,
            2 => self.read_u16()? as usize,
            _ => self.read_u32()? as usize,
        };
        if index >= cardinality {
            return Err(CodecError::IndexOutOfRange { index, cardinality });
        }
        Ok(index)
    }

    /// Try to read a length-prefixed UTF-8 string starting at the current index.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_count()?;
        let bytes = self.read_bytes(len)?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

#[test]
fn read_bool() {
    let read = |bytes| ByteBuffer::new(bytes).read_bool();
    assert_eq!(read(&[]), Err(CodecError::EndOfData));
    assert_eq!(read(&[0]), Ok(false));
    assert_eq!(read(&[1]), Ok(true));
    assert_eq!(read(&[2]), Err(CodecError::InvalidBool(2)));
}

#[test]
fn read_bytes() {
    let empty: &[u8] = &[];
    assert_eq!(ByteBuffer::new(empty).read_bytes(0), Ok(empty));
    assert_eq!(ByteBuffer::new(empty).read_bytes(1), Err(CodecError::EndOfData));
    assert_eq!(ByteBuffer::new(&[0]).read_bytes(1), Ok([0u8].as_slice()));
    assert_eq!(ByteBuffer::new(&[0]).read_bytes(2), Err(CodecError::EndOfData));

    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert_eq!(bb.read_bytes(1), Err(CodecError::EndOfData));
}

#[test]
fn read_fixed_width() {
    let mut bb = ByteBuffer::new(&[
        0xff, 0x34, 0x12, 0xfe, 0xff, 0x78, 0x56, 0x34, 0x12, 0x01, 0, 0, 0, 0, 0, 0, 0x80,
    ]);
    assert_eq!(bb.read_i8(), Ok(-1));
    assert_eq!(bb.read_u16(), Ok(0x1234));
    assert_eq!(bb.read_i16(), Ok(-2));
    assert_eq!(bb.read_u32(), Ok(0x1234_5678));
    assert_eq!(bb.read_i64(), Ok(i64::MIN + 1));
    assert_eq!(bb.remaining(), 0);
    assert_eq!(bb.read_u8(), Err(CodecError::EndOfData));
}

#[test]
fn read_truncated() {
    assert_eq!(ByteBuffer::new(&[1, 2, 3]).read_u32(), Err(CodecError::EndOfData));
    assert_eq!(ByteBuffer::new(&[1, 2, 3, 4, 5, 6, 7]).read_f64(), Err(CodecError::EndOfData));
    assert_eq!(ByteBuffer::new(&[5, 0, 0, 0, 97]).read_string(), Err(CodecError::EndOfData));
}

#[test]
fn read_floats() {
    let mut bb = ByteBuffer::new(&[0, 0, 0, 0x3f, 0, 0, 0, 0, 0, 0, 0xf0, 0xbf]);
    assert_eq!(bb.read_f32(), Ok(0.5));
    assert_eq!(bb.read_f64(), Ok(-1.0));
}

#[test]
fn read_var_uint() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_uint();
    assert_eq!(read(&[]), Err(CodecError::EndOfData));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[127]), Ok(127));
    assert_eq!(read(&[0x80, 1]), Ok(128));
    assert_eq!(read(&[0xac, 0x02]), Ok(300));
    assert_eq!(read(&[0xff, 0xff, 0xff, 0xff, 0x0f]), Ok(u32::MAX as u64));
    assert_eq!(
        read(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        Ok(u64::MAX)
    );
    assert_eq!(read(&[0x80]), Err(CodecError::EndOfData));
    assert_eq!(read(&[0xff, 0xff]), Err(CodecError::EndOfData));
    assert_eq!(
        read(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02]),
        Err(CodecError::VarIntOverflow)
    );
    assert_eq!(
        read(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
        Err(CodecError::VarIntOverflow)
    );
}

#[test]
fn read_var_int() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_int();
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(-1));
    assert_eq!(read(&[2]), Ok(1));
    assert_eq!(read(&[3]), Ok(-2));
    assert_eq!(read(&[0xd7, 0x04]), Ok(-300));
    assert_eq!(
        read(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        Ok(i64::MIN)
    );
    assert_eq!(
        read(&[0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        Ok(i64::MAX)
    );
    assert_eq!(read(&[0x81]), Err(CodecError::EndOfData));
}

#[test]
fn read_count() {
    let read = |bytes| ByteBuffer::new(bytes).read_count();
    assert_eq!(read(&[3, 0, 0, 0]), Ok(3));
    assert_eq!(read(&[0xff, 0xff, 0xff, 0x7f]), Ok(MAX_COUNT));
    assert_eq!(
        read(&[0, 0, 0, 0x80]),
        Err(CodecError::CountOutOfRange(0x8000_0000))
    );
}

#[test]
fn read_index() {
    let read = |bytes, cardinality| ByteBuffer::new(bytes).read_index(cardinality);
    assert_eq!(read(&[], 1), Ok(0));
    assert_eq!(
        read(&[], 0),
        Err(CodecError::IndexOutOfRange { index: 0, cardinality: 0 })
    );
    assert_eq!(read(&[255], 256), Ok(255));
    assert_eq!(
        read(&[9], 9),
        Err(CodecError::IndexOutOfRange { index: 9, cardinality: 9 })
    );
    assert_eq!(read(&[0, 1], 257), Ok(256));
    assert_eq!(read(&[0, 0, 1, 0], 65537), Ok(65536));
}

#[test]
fn read_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_string();
    assert_eq!(read(&[]), Err(CodecError::EndOfData));
    assert_eq!(read(&[0, 0, 0, 0]), Ok(String::new()));
    assert_eq!(read(&[3, 0, 0, 0, 97, 98, 99]), Ok("abc".to_owned()));
    assert_eq!(read(&[4, 0, 0, 0, 240, 159, 141, 149]), Ok("🍕".to_owned()));
    assert_eq!(read(&[2, 0, 0, 0, 0xc3, 0x28]), Err(CodecError::InvalidUtf8));
}

/// A byte buffer meant for writing region data.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_region_schema::ByteBufferMut::new();
/// bb.write_string("hi").unwrap();
/// bb.write_index(7, 200).unwrap();
/// bb.write_index(0, 1).unwrap();
/// assert_eq!(bb.data(), [2, 0, 0, 0, 104, 105, 7]);
/// ```
///
#[derive(Debug, Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(if value { 1 } else { 0 });
    }

    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_byte(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_byte(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a variable-length unsigned integer, 7 bits per byte.
    pub fn write_var_uint(&mut self, mut value: u64) {
        while value >= 128 {
            self.write_byte(value as u8 | 128);
            value >>= 7;
        }
        self.write_byte(value as u8);
    }

    /// Write a zig-zag encoded variable-length signed integer, so small
    /// negative numbers stay short.
    pub fn write_var_int(&mut self, value: i64) {
        self.write_var_uint(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Write a 4-byte count. Fails if the count cannot be represented.
    pub fn write_count(&mut self, count: usize) -> Result<(), CodecError> {
        if count > MAX_COUNT {
            return Err(CodecError::CountOutOfRange(count));
        }
        self.write_u32(count as u32);
        Ok(())
    }

    /// Write a reference into a pool of `cardinality` objects.
    pub fn write_index(&mut self, index: usize, cardinality: usize) -> Result<(), CodecError> {
        if index >= cardinality {
            return Err(CodecError::IndexOutOfRange { index, cardinality });
        }
        match index_width(cardinality) {
            0 => {}
            1 => self.write_u8(index as u8),
            2 => self.write_u16(index as u16),
            _ => self.write_u32(index as u32),
        }
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string. The prefix counts bytes.
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_count(value.len())?;
        self.write_bytes(value.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_bool() {
    assert_eq!(write_once(|bb| bb.write_bool(false)), [0]);
    assert_eq!(write_once(|bb| bb.write_bool(true)), [1]);
}

#[test]
fn write_fixed_width() {
    assert_eq!(write_once(|bb| bb.write_i8(-1)), [0xff]);
    assert_eq!(write_once(|bb| bb.write_u16(0x1234)), [0x34, 0x12]);
    assert_eq!(write_once(|bb| bb.write_i16(-2)), [0xfe, 0xff]);
    assert_eq!(write_once(|bb| bb.write_u32(0x1234_5678)), [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(write_once(|bb| bb.write_i32(-1)), [0xff, 0xff, 0xff, 0xff]);
    assert_eq!(
        write_once(|bb| bb.write_u64(0x0102_0304_0506_0708)),
        [8, 7, 6, 5, 4, 3, 2, 1]
    );
    assert_eq!(
        write_once(|bb| bb.write_i64(i64::MIN + 1)),
        [1, 0, 0, 0, 0, 0, 0, 0x80]
    );
}

#[test]
fn write_floats() {
    assert_eq!(write_once(|bb| bb.write_f32(0.5)), [0, 0, 0, 0x3f]);
    assert_eq!(
        write_once(|bb| bb.write_f64(-1.0)),
        [0, 0, 0, 0, 0, 0, 0xf0, 0xbf]
    );
}

#[test]
fn write_string() {
    assert_eq!(write_once(|bb| bb.write_string("").unwrap()), [0, 0, 0, 0]);
    assert_eq!(
        write_once(|bb| bb.write_string("abc").unwrap()),
        [3, 0, 0, 0, 97, 98, 99]
    );
    assert_eq!(
        write_once(|bb| bb.write_string("🍕").unwrap()),
        [4, 0, 0, 0, 240, 159, 141, 149]
    );
}

#[test]
fn write_var_uint() {
    assert_eq!(write_once(|bb| bb.write_var_uint(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_var_uint(127)), [127]);
    assert_eq!(write_once(|bb| bb.write_var_uint(128)), [0x80, 1]);
    assert_eq!(write_once(|bb| bb.write_var_uint(300)), [0xac, 0x02]);
    assert_eq!(
        write_once(|bb| bb.write_var_uint(u64::MAX)),
        [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
    );
}

#[test]
fn write_var_int() {
    assert_eq!(write_once(|bb| bb.write_var_int(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_var_int(-1)), [1]);
    assert_eq!(write_once(|bb| bb.write_var_int(1)), [2]);
    assert_eq!(write_once(|bb| bb.write_var_int(-300)), [0xd7, 0x04]);
    assert_eq!(
        write_once(|bb| bb.write_var_int(i64::MIN)),
        [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
    );
}

#[test]
fn var_ints_round_trip() {
    let unsigned = [0, 1, 127, 128, 16383, 16384, u32::MAX as u64, 1 << 56, u64::MAX];
    let signed = [0, -1, 1, -64, 64, i32::MIN as i64, i32::MAX as i64, i64::MIN, i64::MAX];
    let mut bb = ByteBufferMut::new();
    for &v in &unsigned {
        bb.write_var_uint(v);
    }
    for &v in &signed {
        bb.write_var_int(v);
    }
    let data = bb.data();
    let mut bb = ByteBuffer::new(&data);
    for &v in &unsigned {
        assert_eq!(bb.read_var_uint(), Ok(v));
    }
    for &v in &signed {
        assert_eq!(bb.read_var_int(), Ok(v));
    }
    assert_eq!(bb.remaining(), 0);
}

#[test]
fn write_count() {
    let mut bb = ByteBufferMut::new();
    assert_eq!(bb.write_count(MAX_COUNT + 1), Err(CodecError::CountOutOfRange(MAX_COUNT + 1)));
    assert!(bb.is_empty());
    bb.write_count(1).unwrap();
    assert_eq!(bb.data(), [1, 0, 0, 0]);
}

#[test]
fn index_widths() {
    assert_eq!(index_width(0), 0);
    assert_eq!(index_width(1), 0);
    assert_eq!(index_width(2), 1);
    assert_eq!(index_width(256), 1);
    assert_eq!(index_width(257), 2);
    assert_eq!(index_width(65536), 2);
    assert_eq!(index_width(65537), 4);
}

#[test]
fn write_index() {
    assert!(write_once(|bb| bb.write_index(0, 1).unwrap()).is_empty());
    assert_eq!(write_once(|bb| bb.write_index(255, 256).unwrap()), [255]);
    assert_eq!(write_once(|bb| bb.write_index(256, 257).unwrap()), [0, 1]);
    assert_eq!(
        write_once(|bb| bb.write_index(65536, 65537).unwrap()),
        [0, 0, 1, 0]
    );

    let mut bb = ByteBufferMut::new();
    assert_eq!(
        bb.write_index(3, 3),
        Err(CodecError::IndexOutOfRange { index: 3, cardinality: 3 })
    );
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_count(2).unwrap();
    bb.write_string("🍕").unwrap();
    bb.write_bool(true);
    bb.write_index(1, 2).unwrap();
    let data = bb.data();
    assert_eq!(data, [2, 0, 0, 0, 4, 0, 0, 0, 240, 159, 141, 149, 1, 1]);

    let mut bb = ByteBuffer::new(&data);
    assert_eq!(bb.read_count(), Ok(2));
    assert_eq!(bb.read_string(), Ok("🍕".to_owned()));
    assert_eq!(bb.read_bool(), Ok(true));
    assert_eq!(bb.read_index(2), Ok(1));
    assert_eq!(bb.remaining(), 0);
}
