use crate::{Compression, CrushError, Encoding, Gid};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use libflate::{gzip, zlib};
use std::io::{self, Read, Write};

pub(crate) fn decode(
    payload: &str,
    encoding: Encoding,
    compression: Compression,
    layer: &str,
) -> Result<Vec<Gid>, CrushError> {
    match encoding {
        Encoding::Csv => decode_csv(payload, layer),
        Encoding::Base64 => {
            let packed = BASE64_STANDARD.decode(payload.trim()).map_err(|err| {
                CrushError::MalformedLayerData(layer.to_string(), format!("invalid base64: {err}"))
            })?;
            let bytes = decompress(&packed, compression, layer)?;
            decode_u32s(&bytes, layer)
        }
    }
}

pub(crate) fn encode(
    tiles: &[Gid],
    encoding: Encoding,
    compression: Compression,
    width: u32,
) -> Result<String, CrushError> {
    match encoding {
        Encoding::Csv => Ok(encode_csv(tiles, width)),
        Encoding::Base64 => {
            let mut bytes = Vec::with_capacity(tiles.len() * 4);
            for tile in tiles {
                bytes.write_u32::<LittleEndian>(tile.0)?;
            }
            Ok(BASE64_STANDARD.encode(compress(bytes, compression)?))
        }
    }
}

fn decode_csv(payload: &str, layer: &str) -> Result<Vec<Gid>, CrushError> {
    payload
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<u32>().map(Gid).map_err(|_| {
                CrushError::MalformedLayerData(
                    layer.to_string(),
                    format!("invalid tile id \"{token}\""),
                )
            })
        })
        .collect()
}

// One map row per line; rows separated by ",\n" so the stream is still
// one comma-separated list.
fn encode_csv(tiles: &[Gid], width: u32) -> String {
    tiles
        .chunks(width.max(1) as usize)
        .map(|row| {
            row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

fn decode_u32s(bytes: &[u8], layer: &str) -> Result<Vec<Gid>, CrushError> {
    if bytes.len() % 4 != 0 {
        return Err(CrushError::MalformedLayerData(
            layer.to_string(),
            format!("{} bytes is not a whole number of 32-bit tile ids", bytes.len()),
        ));
    }
    let mut ids = vec![0_u32; bytes.len() / 4];
    let mut cursor = bytes;
    cursor.read_u32_into::<LittleEndian>(&mut ids)?;
    Ok(ids.into_iter().map(Gid).collect())
}

fn decompress(bytes: &[u8], compression: Compression, layer: &str) -> Result<Vec<u8>, CrushError> {
    let corrupt = |name: &str, err: io::Error| {
        CrushError::MalformedLayerData(layer.to_string(), format!("corrupt {name} stream: {err}"))
    };
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Zlib => {
            let mut decoder = zlib::Decoder::new(bytes).map_err(|e| corrupt("zlib", e))?;
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| corrupt("zlib", e))?;
            Ok(decoded)
        }
        Compression::Gzip => {
            let mut decoder = gzip::Decoder::new(bytes).map_err(|e| corrupt("gzip", e))?;
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| corrupt("gzip", e))?;
            Ok(decoded)
        }
        Compression::Zstd => zstd::stream::decode_all(bytes).map_err(|e| corrupt("zstd", e)),
    }
}

fn compress(bytes: Vec<u8>, compression: Compression) -> Result<Vec<u8>, CrushError> {
    match compression {
        Compression::None => Ok(bytes),
        Compression::Zlib => {
            let mut encoder = zlib::Encoder::new(Vec::new())?;
            encoder.write_all(&bytes)?;
            Ok(encoder.finish().into_result()?)
        }
        Compression::Gzip => {
            let mut encoder = gzip::Encoder::new(Vec::new())?;
            encoder.write_all(&bytes)?;
            Ok(encoder.finish().into_result()?)
        }
        Compression::Zstd => {
            Ok(zstd::stream::encode_all(bytes.as_slice(), zstd::DEFAULT_COMPRESSION_LEVEL)?)
        }
    }
}
