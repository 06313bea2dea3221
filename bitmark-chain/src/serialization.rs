//! Canonical wire serialization.
//!
//! This module contains two traits, `BitmarkSerialize` and
//! `BitmarkDeserialize`, analogs of the Serde `Serialize` and `Deserialize`
//! traits but intended for the consensus-critical bitmark wire formats, plus
//! impls for the primitive shapes those formats are built from.

pub mod sha256d;

use std::convert::TryFrom;
use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};

use crate::fault::Fault;
use crate::varint::Varint64;

/// Cap on the bytes blindly allocated for a length-prefixed field; prefixes
/// beyond this are treated as corruption rather than allocation requests.
const MAX_FIELD_BYTES: u64 = 65_536;

pub trait BitmarkSerialize {
    fn bitmark_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error>;

    fn bitmark_serialize_to_vec(&self) -> Result<Vec<u8>, io::Error> {
        let mut data = Vec::new();
        self.bitmark_serialize(&mut data)?;
        Ok(data)
    }
}

pub trait BitmarkDeserialize {
    fn bitmark_deserialize<R: io::Read>(reader: R) -> Result<Self, Fault>
    where
        Self: Sized;
}

impl BitmarkSerialize for u8 {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        target.write_all(&[*self])
    }
}

impl BitmarkSerialize for u32 {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl BitmarkSerialize for u64 {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl BitmarkSerialize for DateTime<Utc> {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        // u32 seconds are valid until 2106; header checks reject later times
        let seconds = u32::try_from(self.timestamp()).unwrap_or(std::u32::MAX);
        target.write_u32::<LittleEndian>(seconds)
    }
}

impl BitmarkSerialize for [u8; 32] {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        target.write_all(self)
    }
}

impl BitmarkSerialize for [u8; 64] {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        target.write_all(self)
    }
}

/// Byte strings are varint length prefixed.
impl BitmarkSerialize for Vec<u8> {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        Varint64::from(self.len() as u64).bitmark_serialize(&mut target)?;
        target.write_all(self)
    }
}

impl BitmarkSerialize for String {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        Varint64::from(self.len() as u64).bitmark_serialize(&mut target)?;
        target.write_all(self.as_bytes())
    }
}

impl BitmarkDeserialize for u8 {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<u8, Fault> {
        Ok(reader.read_u8()?)
    }
}

impl BitmarkDeserialize for u32 {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<u32, Fault> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl BitmarkDeserialize for u64 {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<u64, Fault> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl BitmarkDeserialize for DateTime<Utc> {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<DateTime<Utc>, Fault> {
        Ok(Utc.timestamp(i64::from(reader.read_u32::<LittleEndian>()?), 0))
    }
}

impl BitmarkDeserialize for [u8; 32] {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; 32], Fault> {
        let mut result = [0u8; 32];
        reader.read_exact(&mut result)?;
        Ok(result)
    }
}

impl BitmarkDeserialize for [u8; 64] {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; 64], Fault> {
        let mut result = [0u8; 64];
        reader.read_exact(&mut result)?;
        Ok(result)
    }
}

impl BitmarkDeserialize for Vec<u8> {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<Vec<u8>, Fault> {
        let len = Varint64::bitmark_deserialize(&mut reader)?.value();
        if len > MAX_FIELD_BYTES {
            return Err(Fault::InvalidLength);
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl BitmarkDeserialize for String {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<String, Fault> {
        let buf = Vec::<u8>::bitmark_deserialize(&mut reader)?;
        String::from_utf8(buf).map_err(|_| Fault::InvalidCharacter)
    }
}
