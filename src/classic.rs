//! MIFARE Classic: sectors of 16-byte blocks.
//!
//! 1K cards have 16 sectors of 4 blocks. 4K cards add 8 big sectors of 16 blocks each
//! (32-39), which makes converting between block numbers and sectors slightly annoying.
//! Reading sectors needs keys we don't manage here, so cards come in as dumps.
use chrono::{DateTime, Utc};

use crate::util::ByteArray;
use crate::{Error, Result};

pub const BLOCK_SIZE: usize = 16;

/// Block count for a sector, big ones included.
pub fn blocks_in_sector(sector: usize) -> usize {
    if sector < 32 {
        4
    } else {
        16
    }
}

/// Converts an on-card byte pointer to an absolute block number.
pub fn byte_pointer_to_block(pointer: u32) -> u32 {
    pointer / BLOCK_SIZE as u32
}

pub fn block_to_sector(block: u32) -> u32 {
    if block < 128 {
        block / 4
    } else {
        32 + (block - 128) / 16
    }
}

/// First absolute block of a sector.
pub fn sector_to_block(sector: u32) -> u32 {
    if sector < 32 {
        sector * 4
    } else {
        128 + (sector - 32) * 16
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassicSector {
    Data { index: usize, blocks: Vec<ByteArray> },
    /// We didn't have a key for this one.
    Unauthorized { index: usize },
    Invalid { index: usize, error: String },
}

impl ClassicSector {
    pub fn index(&self) -> usize {
        match self {
            Self::Data { index, .. } | Self::Unauthorized { index } | Self::Invalid { index, .. } => {
                *index
            }
        }
    }

    /// Concatenates `count` blocks, counting from the start of this sector.
    pub fn read_blocks(&self, start: usize, count: usize) -> Result<Vec<u8>> {
        let blocks = match self {
            Self::Data { blocks, .. } => blocks,
            Self::Unauthorized { index } => {
                return Err(Error::Invalid(format!("Sector {} is unauthorized", index)))
            }
            Self::Invalid { index, error } => {
                return Err(Error::Invalid(format!("Sector {} is invalid: {}", index, error)))
            }
        };
        let end = start + count;
        if end > blocks.len() {
            return Err(Error::Truncated {
                what: "sector",
                need: end * BLOCK_SIZE,
                have: blocks.len() * BLOCK_SIZE,
            });
        }
        Ok(blocks[start..end].iter().flat_map(|b| b.iter().copied()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicCard {
    pub tag_id: ByteArray,
    pub scanned_at: DateTime<Utc>,
    pub sectors: Vec<ClassicSector>,
}

impl ClassicCard {
    /// Splits a flat image (as written by most Classic dumping tools) into sectors.
    pub fn from_dump(tag_id: &[u8], dump: &[u8]) -> Result<Self> {
        let mut sectors = Vec::new();
        let mut rest = dump;
        while !rest.is_empty() {
            let index = sectors.len();
            let size = blocks_in_sector(index) * BLOCK_SIZE;
            if rest.len() < size {
                return Err(Error::Truncated {
                    what: "card dump",
                    need: dump.len() - rest.len() + size,
                    have: dump.len(),
                });
            }
            let (sector, tail) = rest.split_at(size);
            sectors.push(ClassicSector::Data {
                index,
                blocks: sector.chunks_exact(BLOCK_SIZE).map(ByteArray::from).collect(),
            });
            rest = tail;
        }
        Ok(Self {
            tag_id: tag_id.into(),
            scanned_at: Utc::now(),
            sectors,
        })
    }

    pub fn sector(&self, index: usize) -> Result<&ClassicSector> {
        self.sectors
            .get(index)
            .ok_or_else(|| Error::Invalid(format!("Card has no sector {}", index)))
    }

    /// Reads `count` blocks starting at an on-card byte pointer.
    pub fn read_at_pointer(&self, pointer: u32, count: usize) -> Result<Vec<u8>> {
        let block = byte_pointer_to_block(pointer);
        let sector = block_to_sector(block);
        let start = block - sector_to_block(sector);
        self.sector(sector as usize)?
            .read_blocks(start as usize, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 4K image where every block is filled with its own block number.
    fn numbered_4k() -> Vec<u8> {
        (0..256u32)
            .flat_map(|block| std::iter::repeat(block as u8).take(BLOCK_SIZE))
            .collect()
    }

    #[test]
    fn test_addressing() {
        assert_eq!(byte_pointer_to_block(0x580), 88);
        assert_eq!(block_to_sector(88), 22);
        assert_eq!(sector_to_block(22), 88);

        assert_eq!(byte_pointer_to_block(0xF90), 249);
        assert_eq!(block_to_sector(249), 39);
        assert_eq!(sector_to_block(39), 240);

        assert_eq!(block_to_sector(127), 31);
        assert_eq!(block_to_sector(128), 32);
        assert_eq!(block_to_sector(143), 32);
        assert_eq!(block_to_sector(144), 33);
        assert_eq!(sector_to_block(32), 128);
        assert_eq!(sector_to_block(33), 144);
    }

    #[test]
    fn test_from_dump() -> Result<()> {
        let card = ClassicCard::from_dump(&[0x01, 0x02, 0x03, 0x04], &numbered_4k())?;
        assert_eq!(card.sectors.len(), 40);
        assert_eq!(card.sector(39)?.index(), 39);
        assert_eq!(card.sector(1)?.read_blocks(0, 1)?, vec![4; 16]);

        let data = card.sector(33)?.read_blocks(2, 2)?;
        assert_eq!(&data[..16], &[146; 16]);
        assert_eq!(&data[16..], &[147; 16]);
        Ok(())
    }

    #[test]
    fn test_from_dump_1k() -> Result<()> {
        let card = ClassicCard::from_dump(&[0x01], &numbered_4k()[..1024])?;
        assert_eq!(card.sectors.len(), 16);
        assert!(card.sector(16).is_err());
        Ok(())
    }

    #[test]
    fn test_from_dump_truncated() {
        assert!(matches!(
            ClassicCard::from_dump(&[0x01], &numbered_4k()[..2100]),
            Err(Error::Truncated { need: 2304, .. })
        ));
    }

    #[test]
    fn test_read_at_pointer() -> Result<()> {
        let card = ClassicCard::from_dump(&[0x01], &numbered_4k())?;
        // Info slot, 3 blocks from the start of sector 23.
        let data = card.read_at_pointer(0x5C0, 3)?;
        assert_eq!(data.len(), 48);
        assert_eq!(data[0], 92);
        assert_eq!(data[47], 94);
        // Credit slot in the middle of sector 39.
        assert_eq!(card.read_at_pointer(0xFA0, 1)?, vec![250; 16]);
        Ok(())
    }

    #[test]
    fn test_read_blocks_errors() {
        let s = ClassicSector::Data {
            index: 0,
            blocks: vec![ByteArray::from(vec![0; 16]); 4],
        };
        assert!(matches!(s.read_blocks(3, 2), Err(Error::Truncated { .. })));
        assert!(ClassicSector::Unauthorized { index: 5 }.read_blocks(0, 1).is_err());
    }
}
