//! Primitive encode/decode operations every binary store supports.
//!
//! Integers are unsigned LEB128 ("small" ints and longs). Strings are a
//! length prefix followed by UTF-8 bytes.

use modgraph_util::errors::ModgraphError;
use std::io::{Read, Write};

pub struct Encoder<W: Write> {
    out: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), ModgraphError> {
        self.out.write_all(&[value])?;
        Ok(())
    }

    pub fn write_small_long(&mut self, mut value: u64) -> Result<(), ModgraphError> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.out.write_all(&buf[..len])?;
        Ok(())
    }

    pub fn write_small_int(&mut self, value: u32) -> Result<(), ModgraphError> {
        self.write_small_long(u64::from(value))
    }

    /// Signed values are zigzag encoded so small negatives stay short.
    pub fn write_signed_long(&mut self, value: i64) -> Result<(), ModgraphError> {
        self.write_small_long(((value << 1) ^ (value >> 63)) as u64)
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<(), ModgraphError> {
        self.write_byte(u8::from(value))
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), ModgraphError> {
        self.write_small_long(value.len() as u64)?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn write_nullable_string(&mut self, value: Option<&str>) -> Result<(), ModgraphError> {
        match value {
            Some(s) => {
                self.write_boolean(true)?;
                self.write_string(s)
            }
            None => self.write_boolean(false),
        }
    }

    pub fn flush(&mut self) -> Result<(), ModgraphError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub struct Decoder<R: Read> {
    input: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Next byte, or `None` at a clean end of stream.
    pub fn try_read_byte(&mut self) -> Result<Option<u8>, ModgraphError> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, ModgraphError> {
        self.try_read_byte()?
            .ok_or_else(|| ModgraphError::corrupt("unexpected end of data"))
    }

    pub fn read_small_long(&mut self) -> Result<u64, ModgraphError> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift > 63 || (shift == 63 && byte & 0x7e != 0) {
                return Err(ModgraphError::corrupt("LEB128 value overflows 64 bits"));
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_small_int(&mut self) -> Result<u32, ModgraphError> {
        let value = self.read_small_long()?;
        u32::try_from(value).map_err(|_| ModgraphError::corrupt(format!("integer {value} out of range")))
    }

    pub fn read_signed_long(&mut self) -> Result<i64, ModgraphError> {
        let raw = self.read_small_long()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    pub fn read_boolean(&mut self) -> Result<bool, ModgraphError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ModgraphError::corrupt(format!("invalid boolean byte {other}"))),
        }
    }

    pub fn read_string(&mut self) -> Result<String, ModgraphError> {
        let len = self.read_small_long()?;
        let len = usize::try_from(len).map_err(|_| ModgraphError::corrupt("string length out of range"))?;
        let mut bytes = Vec::new();
        let read = (&mut self.input).take(len as u64).read_to_end(&mut bytes)?;
        if read != len {
            return Err(ModgraphError::corrupt("unexpected end of data inside a string"));
        }
        String::from_utf8(bytes).map_err(|_| ModgraphError::corrupt("string is not valid UTF-8"))
    }

    pub fn read_nullable_string(&mut self) -> Result<Option<String>, ModgraphError> {
        if self.read_boolean()? {
            self.read_string().map(Some)
        } else {
            Ok(None)
        }
    }
}
