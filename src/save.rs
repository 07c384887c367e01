//! RLE save/load codec: 8-byte header plus run-length-encoded block
//! array, exactly per the byte layout this generator's save format
//! specifies.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::block::Block;
use crate::chunk::{ChunkCoord, BLOCKS_PER_CHUNK, CHUNK_BITS_X, CHUNK_BITS_Y, CHUNK_BITS_Z};

const FOUR_CC: [u8; 4] = *b"GCHK";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error("save file too short: {0} bytes")]
    TooShort(usize),
    #[error("four-CC mismatch")]
    BadFourCc,
    #[error("unsupported version {0}")]
    BadVersion(u8),
    #[error("chunk shape mismatch: file has bits ({0},{1},{2}), runtime expects ({3},{4},{5})")]
    ShapeMismatch(u8, u8, u8, u8, u8, u8),
    #[error("decoded block count {0} does not match expected {1}")]
    BlockCountMismatch(usize, usize),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        SaveError::Io(err.to_string())
    }
}

/// `./Saves/Chunk(cx,cy).chunk`, relative to the process working
/// directory. Created on first save.
pub fn save_path(saves_dir: &Path, coord: ChunkCoord) -> PathBuf {
    saves_dir.join(format!("Chunk({},{}).chunk", coord.cx, coord.cy))
}

/// Encodes `blocks` (linear index order: x fastest, then y, then z) as
/// RLE `(type, run_length)` pairs, splitting any run longer than 255.
pub fn encode_rle(blocks: &[Block; BLOCKS_PER_CHUNK]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut iter = blocks.iter();
    let Some(&first) = iter.next() else { return body };

    let mut current_type = first.type_index;
    let mut run_length: u16 = 1;

    for block in iter {
        if block.type_index == current_type && run_length < 255 {
            run_length += 1;
        } else {
            body.push(current_type);
            body.push(run_length as u8);
            current_type = block.type_index;
            run_length = 1;
        }
    }
    body.push(current_type);
    body.push(run_length as u8);
    body
}

fn decode_rle(body: &[u8]) -> Result<Vec<Block>, SaveError> {
    let mut blocks = Vec::with_capacity(BLOCKS_PER_CHUNK);
    for entry in body.chunks_exact(ENTRY_LEN) {
        let (block_type, run_length) = (entry[0], entry[1]);
        for _ in 0..run_length {
            blocks.push(Block::new(block_type));
        }
    }
    if blocks.len() != BLOCKS_PER_CHUNK {
        return Err(SaveError::BlockCountMismatch(blocks.len(), BLOCKS_PER_CHUNK));
    }
    Ok(blocks)
}

/// Serializes `blocks` into the exact on-disk byte layout (without
/// touching the filesystem); used by both `save_chunk` and the
/// round-trip tests.
pub fn serialize(blocks: &[Block; BLOCKS_PER_CHUNK]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + BLOCKS_PER_CHUNK * ENTRY_LEN / 4);
    out.extend_from_slice(&FOUR_CC);
    out.push(VERSION);
    out.push(CHUNK_BITS_X as u8);
    out.push(CHUNK_BITS_Y as u8);
    out.push(CHUNK_BITS_Z as u8);
    out.extend_from_slice(&encode_rle(blocks));
    out
}

/// Validates and decodes the exact on-disk byte layout, rejecting per
/// the four-check contract: short file, four-CC mismatch, version
/// mismatch, bit-count mismatch, and a final decoded-count check.
pub fn deserialize(data: &[u8]) -> Result<Box<[Block; BLOCKS_PER_CHUNK]>, SaveError> {
    if data.len() < HEADER_LEN + ENTRY_LEN {
        return Err(SaveError::TooShort(data.len()));
    }
    if data[0..4] != FOUR_CC {
        return Err(SaveError::BadFourCc);
    }
    let version = data[4];
    if version != VERSION {
        return Err(SaveError::BadVersion(version));
    }
    let (bits_x, bits_y, bits_z) = (data[5], data[6], data[7]);
    if bits_x as u32 != CHUNK_BITS_X || bits_y as u32 != CHUNK_BITS_Y || bits_z as u32 != CHUNK_BITS_Z {
        return Err(SaveError::ShapeMismatch(
            bits_x,
            bits_y,
            bits_z,
            CHUNK_BITS_X as u8,
            CHUNK_BITS_Y as u8,
            CHUNK_BITS_Z as u8,
        ));
    }

    let decoded = decode_rle(&data[HEADER_LEN..])?;
    let mut blocks = Box::new([Block::AIR; BLOCKS_PER_CHUNK]);
    blocks.copy_from_slice(&decoded);
    Ok(blocks)
}

/// Writes a chunk's blocks to `Saves/Chunk(cx,cy).chunk` under
/// `saves_dir`, creating the directory on first use. I/O failure here is
/// logged by the caller (the `SaveJob`) and does not block deactivation.
pub fn save_chunk(saves_dir: &Path, coord: ChunkCoord, blocks: &[Block; BLOCKS_PER_CHUNK]) -> Result<(), SaveError> {
    fs::create_dir_all(saves_dir)?;
    let path = save_path(saves_dir, coord);
    let bytes = serialize(blocks);
    let mut file = fs::File::create(&path)?;
    file.write_all(&bytes)?;
    Ok(())
}

/// Reads and validates a chunk's save file. A missing file or any
/// validation failure is surfaced as `SaveError` so the caller (the
/// `LoadJob`) can fall back to generation.
pub fn load_chunk(saves_dir: &Path, coord: ChunkCoord) -> Result<Box<[Block; BLOCKS_PER_CHUNK]>, SaveError> {
    let path = save_path(saves_dir, coord);
    let data = fs::read(&path)?;
    deserialize(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blocks() -> Box<[Block; BLOCKS_PER_CHUNK]> {
        let mut blocks = Box::new([Block::AIR; BLOCKS_PER_CHUNK]);
        for (i, block) in blocks.iter_mut().enumerate() {
            *block = Block::new(((i / 100) % 5) as u8);
        }
        blocks
    }

    #[test]
    fn round_trip_save_load() {
        let blocks = sample_blocks();
        let bytes = serialize(&blocks);
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.as_slice(), blocks.as_slice());
    }

    #[test]
    fn rle_runs_never_exceed_255_and_adjacent_types_differ() {
        let mut blocks = Box::new([Block::AIR; BLOCKS_PER_CHUNK]);
        for block in blocks.iter_mut() {
            *block = Block::new(7);
        }
        let body = encode_rle(&blocks);
        for entry in body.chunks_exact(2) {
            assert!(entry[1] >= 1);
        }
        for pair in body.chunks_exact(2).collect::<Vec<_>>().windows(2) {
            assert_ne!(pair[0][0], pair[1][0]);
        }
    }

    #[test]
    fn file_header_is_exactly_gchk_version_1() {
        let blocks = sample_blocks();
        let bytes = serialize(&blocks);
        assert_eq!(&bytes[0..4], b"GCHK");
        assert_eq!(bytes[4], 1);
    }

    #[test]
    fn rejects_short_file() {
        assert_eq!(deserialize(&[1, 2, 3]), Err(SaveError::TooShort(3)));
    }

    #[test]
    fn rejects_bad_four_cc() {
        let mut bytes = serialize(&sample_blocks());
        bytes[0] = b'X';
        assert_eq!(deserialize(&bytes), Err(SaveError::BadFourCc));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = serialize(&sample_blocks());
        bytes[4] = 2;
        assert_eq!(deserialize(&bytes), Err(SaveError::BadVersion(2)));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let mut bytes = serialize(&sample_blocks());
        bytes[5] = 4;
        assert!(matches!(deserialize(&bytes), Err(SaveError::ShapeMismatch(4, ..))));
    }

    #[test]
    fn rejects_truncated_body_with_wrong_block_count() {
        let mut bytes = serialize(&sample_blocks());
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(deserialize(&bytes), Err(SaveError::BlockCountMismatch(..))));
    }

    #[test]
    fn save_then_load_round_trips_through_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let coord = ChunkCoord::new(2, -3);
        let blocks = sample_blocks();
        save_chunk(dir.path(), coord, &blocks).unwrap();

        let path = save_path(dir.path(), coord);
        let metadata = fs::metadata(&path).unwrap();
        let expected_len = HEADER_LEN as u64 + encode_rle(&blocks).len() as u64;
        assert_eq!(metadata.len(), expected_len);

        let loaded = load_chunk(dir.path(), coord).unwrap();
        assert_eq!(loaded.as_slice(), blocks.as_slice());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_chunk(dir.path(), ChunkCoord::new(99, 99));
        assert!(matches!(result, Err(SaveError::Io(_))));
    }
}
