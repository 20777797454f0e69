#![forbid(unsafe_code)]

//! Minimal Binary Canonical Serialization for the value shapes the contract
//! uses: fixed-width little-endian integers, booleans, ULEB128 length
//! prefixes, byte vectors, identifiers and 32-byte addresses.

use evidence_contracts::ledger::{AccountAddress, ObjectId, ADDRESS_LENGTH};
use evidence_contracts::payload::{ParamType, PureArg};

/// BCS caps sequence lengths at 2^31 - 1.
pub const MAX_SEQUENCE_LENGTH: u64 = (1 << 31) - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BcsError {
    #[error("unexpected end of input at byte {at}")]
    UnexpectedEof { at: usize },
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("uleb128 value overflows")]
    UlebOverflow,
    #[error("uleb128 value is not canonically encoded")]
    NonCanonicalUleb,
    #[error("sequence length {0} exceeds the bcs maximum")]
    LengthTooLarge(u64),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("unknown {what} variant {tag}")]
    UnknownVariant { what: &'static str, tag: u64 },
    #[error("unsupported {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Default, Clone)]
pub struct BcsWriter {
    buf: Vec<u8>,
}

impl BcsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn write_uleb128(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_uleb128(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_fixed(&mut self, bytes: &[u8; ADDRESS_LENGTH]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct BcsReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BcsReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BcsError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(BcsError::UnexpectedEof { at: self.pos })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, BcsError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, BcsError> {
        let mut b = [0u8; 2];
        b.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(b))
    }

    pub fn read_u64(&mut self) -> Result<u64, BcsError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }

    pub fn read_bool(&mut self) -> Result<bool, BcsError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(BcsError::InvalidBool(other)),
        }
    }

    pub fn read_uleb128(&mut self) -> Result<u64, BcsError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            let low = u64::from(byte & 0x7f);
            if shift == 63 && low > 1 {
                return Err(BcsError::UlebOverflow);
            }
            value |= low << shift;
            if byte & 0x80 == 0 {
                if shift > 0 && low == 0 {
                    return Err(BcsError::NonCanonicalUleb);
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(BcsError::UlebOverflow);
            }
        }
    }

    pub fn read_len(&mut self) -> Result<usize, BcsError> {
        let len = self.read_uleb128()?;
        if len > MAX_SEQUENCE_LENGTH {
            return Err(BcsError::LengthTooLarge(len));
        }
        usize::try_from(len).map_err(|_| BcsError::LengthTooLarge(len))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, BcsError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, BcsError> {
        String::from_utf8(self.read_bytes()?).map_err(|_| BcsError::InvalidUtf8)
    }

    pub fn read_fixed(&mut self) -> Result<[u8; ADDRESS_LENGTH], BcsError> {
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(self.take(ADDRESS_LENGTH)?);
        Ok(out)
    }

    pub fn read_address(&mut self) -> Result<AccountAddress, BcsError> {
        Ok(AccountAddress::new(self.read_fixed()?))
    }

    pub fn read_object_id(&mut self) -> Result<ObjectId, BcsError> {
        Ok(ObjectId::new(self.read_fixed()?))
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn finish(self) -> Result<(), BcsError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(BcsError::TrailingBytes(n)),
        }
    }
}

pub fn encode_pure(arg: &PureArg) -> Vec<u8> {
    let mut w = BcsWriter::new();
    match arg {
        PureArg::U64(v) => w.write_u64(*v),
        PureArg::Bool(v) => w.write_bool(*v),
        PureArg::Bytes(v) => w.write_bytes(v),
        PureArg::Address(a) => w.write_fixed(a.as_bytes()),
    }
    w.into_bytes()
}

/// Decodes a pure argument against the parameter type it is bound to. The
/// whole buffer must be consumed.
pub fn decode_pure(bytes: &[u8], param: ParamType) -> Result<PureArg, BcsError> {
    let mut r = BcsReader::new(bytes);
    let arg = match param {
        ParamType::U64 => PureArg::U64(r.read_u64()?),
        ParamType::Bool => PureArg::Bool(r.read_bool()?),
        ParamType::Bytes => PureArg::Bytes(r.read_bytes()?),
        ParamType::Address => PureArg::Address(r.read_address()?),
        ParamType::SystemState { .. } => {
            return Err(BcsError::Unsupported("object parameter as pure value"))
        }
    };
    r.finish()?;
    Ok(arg)
}
