//! Bounded decompression for QR payloads.
use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{DecodeStage, Error};

/// Default upper bound on decompressed payload size.
pub const DEFAULT_MAX_LEN: usize = 1 << 20;

fn read_bounded(mut reader: impl Read, max_len: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    reader
        .by_ref()
        .take(max_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::decode(DecodeStage::Inflate, e))?;
    if out.len() > max_len {
        return Err(Error::decode(
            DecodeStage::Inflate,
            format!("decompressed payload exceeds {} bytes", max_len),
        ));
    }
    Ok(out)
}

/// Inflate a raw DEFLATE stream (RFC 1951), as used by `zip: "DEF"`.
pub fn inflate_raw(data: &[u8], max_len: usize) -> Result<Vec<u8>, Error> {
    read_bounded(DeflateDecoder::new(data), max_len)
}

/// Inflate a zlib stream (RFC 1950).
pub fn inflate_zlib(data: &[u8], max_len: usize) -> Result<Vec<u8>, Error> {
    read_bounded(ZlibDecoder::new(data), max_len)
}

/// Whether `data` starts with a zlib header (CMF 0x78 and a valid check).
pub fn is_zlib(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => *cmf == 0x78 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}
