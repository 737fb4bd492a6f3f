//! Sample codecs.
//!
//! [`compress`] / [`decompress`] operate on the bare payload and need the
//! shape and dtype from the caller. [`encode_sample`] / [`decode_sample`]
//! wrap the payload in a self-describing frame:
//!
//! ```text
//! [magic "STS1"][codec u8][dtype u8][ndim u8][dims u64 LE ...][crc32 u32 LE][payload]
//! ```
//!
//! The CRC covers the payload as stored (after compression).

use bytes::Bytes;
use strata_types::{array, Array, Compression, Dtype};

use crate::error::{CodecError, CodecResult};

const MAGIC: &[u8; 4] = b"STS1";
const ZSTD_LEVEL: i32 = 3;

/// Compress an array's element bytes with `codec`.
pub fn compress(array: &Array, codec: Compression) -> CodecResult<Bytes> {
    match codec {
        Compression::None => Ok(array.data().clone()),
        Compression::Zstd => zstd::encode_all(array.data().as_ref(), ZSTD_LEVEL)
            .map(Bytes::from)
            .map_err(|e| CodecError::Compress(e.to_string())),
    }
}

/// Rebuild an array from a payload produced by [`compress`].
pub fn decompress(
    payload: &[u8],
    shape: &[usize],
    dtype: Dtype,
    codec: Compression,
) -> CodecResult<Array> {
    let raw = match codec {
        Compression::None => payload.to_vec(),
        Compression::Zstd => zstd::decode_all(payload)
            .map_err(|e| CodecError::corrupt(format!("zstd decode failed: {e}")))?,
    };
    Array::new(dtype, shape.to_vec(), raw).map_err(|e| CodecError::corrupt(e.to_string()))
}

/// Check that `payload` is a well-formed `codec` stream.
pub fn verify(payload: &[u8], codec: Compression) -> CodecResult<()> {
    match codec {
        Compression::None => Ok(()),
        Compression::Zstd => zstd::decode_all(payload)
            .map(|_| ())
            .map_err(|e| CodecError::corrupt(format!("zstd decode failed: {e}"))),
    }
}

/// Encode an array as a framed sample.
pub fn encode_sample(array: &Array, codec: Compression) -> CodecResult<Vec<u8>> {
    let payload = compress(array, codec)?;
    let ndim = u8::try_from(array.shape().len())
        .map_err(|_| CodecError::Compress(format!("{} dimensions", array.shape().len())))?;

    let mut buf = Vec::with_capacity(4 + 3 + 8 * array.shape().len() + 4 + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.push(codec.code());
    buf.push(array.dtype().code());
    buf.push(ndim);
    for dim in array.shape() {
        buf.extend_from_slice(&(*dim as u64).to_le_bytes());
    }
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a framed sample, checking header and CRC.
pub fn decode_sample(bytes: &[u8]) -> CodecResult<Array> {
    let frame = Frame::parse(bytes)?;
    decompress(frame.payload, &frame.shape, frame.dtype, frame.codec)
}

/// Validate a framed sample without materializing the array.
///
/// Checks magic, header, CRC and, for compressed payloads, that the payload
/// decompresses to the size the header implies.
pub fn verify_sample(bytes: &[u8]) -> CodecResult<()> {
    let frame = Frame::parse(bytes)?;
    let expected = array::byte_len(&frame.shape, frame.dtype)
        .map_err(|e| CodecError::corrupt(e.to_string()))?;
    let actual = match frame.codec {
        Compression::None => frame.payload.len(),
        Compression::Zstd => zstd::decode_all(frame.payload)
            .map_err(|e| CodecError::corrupt(format!("zstd decode failed: {e}")))?
            .len(),
    };
    if actual != expected {
        return Err(CodecError::corrupt(format!(
            "size mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

struct Frame<'a> {
    codec: Compression,
    dtype: Dtype,
    shape: Vec<usize>,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    fn parse(bytes: &'a [u8]) -> CodecResult<Self> {
        if bytes.len() < 7 {
            return Err(CodecError::corrupt("frame too short"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(CodecError::corrupt(format!(
                "bad magic: {}",
                String::from_utf8_lossy(&bytes[0..4])
            )));
        }
        let codec = Compression::from_code(bytes[4])
            .ok_or_else(|| CodecError::corrupt(format!("unknown codec byte: {}", bytes[4])))?;
        let dtype = Dtype::from_code(bytes[5])
            .ok_or_else(|| CodecError::corrupt(format!("unknown dtype byte: {}", bytes[5])))?;
        let ndim = bytes[6] as usize;

        let mut pos = 7;
        let header_end = pos + ndim * 8 + 4;
        if bytes.len() < header_end {
            return Err(CodecError::corrupt("truncated header"));
        }
        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            let mut dim = [0u8; 8];
            dim.copy_from_slice(&bytes[pos..pos + 8]);
            let dim = u64::from_le_bytes(dim);
            shape.push(
                usize::try_from(dim)
                    .map_err(|_| CodecError::corrupt(format!("dimension {dim} too large")))?,
            );
            pos += 8;
        }
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[pos..pos + 4]);
        let expected_crc = u32::from_le_bytes(crc);
        let payload = &bytes[header_end..];

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(CodecError::corrupt(format!(
                "crc mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
            )));
        }

        Ok(Self {
            codec,
            dtype,
            shape,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Array {
        Array::full_f64(vec![4, 4, 3], 0.5)
    }

    #[test]
    fn framed_sample_roundtrip_both_codecs() {
        for codec in [Compression::None, Compression::Zstd] {
            let encoded = encode_sample(&image(), codec).unwrap();
            assert_eq!(&encoded[0..4], b"STS1");
            verify_sample(&encoded).unwrap();
            assert_eq!(decode_sample(&encoded).unwrap(), image());
        }
    }

    #[test]
    fn zstd_shrinks_repetitive_data() {
        let raw = compress(&image(), Compression::None).unwrap();
        let packed = compress(&image(), Compression::Zstd).unwrap();
        assert!(packed.len() < raw.len());
        let back = decompress(&packed, &[4, 4, 3], Dtype::F64, Compression::Zstd).unwrap();
        assert_eq!(back, image());
    }

    #[test]
    fn flipped_payload_byte_is_corrupt() {
        let mut encoded = encode_sample(&Array::from_i64s(&[1, 2, 3]), Compression::None).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(decode_sample(&encoded), Err(CodecError::Corrupt { .. })));
        assert!(matches!(verify_sample(&encoded), Err(CodecError::Corrupt { .. })));
    }

    #[test]
    fn bad_magic_and_truncation_are_corrupt() {
        let mut encoded = encode_sample(&Array::scalar_i64(7), Compression::None).unwrap();
        assert!(decode_sample(&encoded[..5]).is_err());
        encoded[0] = b'X';
        let err = decode_sample(&encoded).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn verify_rejects_garbage_zstd() {
        assert!(verify(b"definitely not zstd", Compression::Zstd).is_err());
        assert!(verify(b"anything", Compression::None).is_ok());
    }

    #[test]
    fn decompress_rejects_wrong_shape() {
        let payload = compress(&Array::from_i64s(&[1, 2]), Compression::None).unwrap();
        assert!(matches!(
            decompress(&payload, &[3], Dtype::I64, Compression::None),
            Err(CodecError::Corrupt { .. })
        ));
    }

    fn frame_with_dims(dims: &[u64], payload: &[u8]) -> Vec<u8> {
        let mut buf = MAGIC.to_vec();
        buf.push(Compression::None.code());
        buf.push(Dtype::I64.code());
        buf.push(dims.len() as u8);
        for dim in dims {
            buf.extend_from_slice(&dim.to_le_bytes());
        }
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn overflowing_dims_are_corrupt() {
        for dims in [[u64::MAX, 4], [1 << 62, 1 << 62]] {
            let encoded = frame_with_dims(&dims, &[]);
            assert!(matches!(verify_sample(&encoded), Err(CodecError::Corrupt { .. })));
            assert!(matches!(decode_sample(&encoded), Err(CodecError::Corrupt { .. })));
        }
        let sane = frame_with_dims(&[2], &[0u8; 16]);
        verify_sample(&sane).unwrap();
        assert_eq!(decode_sample(&sane).unwrap().to_i64_vec().unwrap(), vec![0, 0]);
    }

    #[test]
    fn scalar_has_zero_dims() {
        let encoded = encode_sample(&Array::scalar_i64(5), Compression::None).unwrap();
        assert_eq!(encoded[6], 0);
        assert_eq!(decode_sample(&encoded).unwrap().as_i64(), Some(5));
    }
}
