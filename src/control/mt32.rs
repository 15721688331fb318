//! MT-32 family dumps (CM6 from Recomposer, MTD from MCP) to SysEx

use crate::rcm::reader::ByteReader;
use crate::sysex::{roland_dt1, MODEL_LA};

/// Number of 8-byte patch records in an MTD patch table
pub const PATCH_RECORDS: usize = 192;

struct PcmLayout {
    patch_temp_area: usize,
    patch_memory: usize,
    system_area: usize,
}

struct Layout {
    system_area: usize,
    patch_temp_area: usize,
    rhythm_setup_temp: usize,
    rhythm_setup_temp2: Option<usize>,
    timbre_temp_area: usize,
    patch_memory: usize,
    user_patch: Option<usize>,
    timbre_memory: usize,
    pcm: Option<PcmLayout>,
    total_size: usize,
}

const CM6: Layout = Layout {
    system_area: 0x0080,
    patch_temp_area: 0x00a0,
    rhythm_setup_temp: 0x0130,
    rhythm_setup_temp2: Some(0x0230),
    timbre_temp_area: 0x0284,
    patch_memory: 0x0a34,
    user_patch: None,
    timbre_memory: 0x0e34,
    pcm: Some(PcmLayout {
        patch_temp_area: 0x4e34,
        patch_memory: 0x4eb2,
        system_area: 0x5832,
    }),
    total_size: 0x5843,
};

const MTD: Layout = Layout {
    system_area: 0x0080,
    patch_temp_area: 0x00a0,
    rhythm_setup_temp: 0x0130,
    rhythm_setup_temp2: None,
    timbre_temp_area: 0x0230,
    patch_memory: 0x09e0,
    user_patch: Some(0x0de0),
    timbre_memory: 0x0fe0,
    pcm: None,
    total_size: 0x4fe0,
};

/// Convert a CM6 dump, `None` if it is not one
pub fn convert_cm6(data: &[u8]) -> Option<Vec<Vec<u8>>> {
    convert(data, &CM6)
}

/// Convert an MTD dump, `None` if it is not one
pub fn convert_mtd(data: &[u8]) -> Option<Vec<Vec<u8>>> {
    convert(data, &MTD)
}

/// Patch memory records of an MTD dump (128 patches + 64 user patches)
pub fn mtd_patch_table(data: &[u8]) -> Option<Vec<[u8; 8]>> {
    if !is_mt32_dump(data, &MTD) {
        return None;
    }
    let table = data.get(MTD.patch_memory..MTD.patch_memory + PATCH_RECORDS * 8)?;
    Some(
        table
            .chunks_exact(8)
            .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            .collect(),
    )
}

fn is_mt32_dump(data: &[u8], layout: &Layout) -> bool {
    let reader = ByteReader::new(data);
    reader.len() >= layout.total_size
        && reader.has_signature(0x0000, b"COME ON MUSIC")
        && reader.has_signature(0x0010, b"R ")
}

fn convert(data: &[u8], layout: &Layout) -> Option<Vec<Vec<u8>>> {
    if !is_mt32_dump(data, layout) {
        return None;
    }

    let mut sysexs = Vec::new();
    let mut push = |offset: usize, len: usize, address: [u8; 3]| {
        sysexs.push(roland_dt1(MODEL_LA, address, &data[offset..offset + len]));
    };

    // LA sound part
    push(layout.system_area, 0x17, [0x10, 0x00, 0x00]);

    for i in 0..64 {
        push(layout.timbre_memory + i * 0x100, 0x100, [0x08, (i * 2) as u8, 0x00]);
    }

    push(layout.rhythm_setup_temp, 0x04 * 64, [0x03, 0x01, 0x10]);
    if let Some(offset) = layout.rhythm_setup_temp2 {
        push(offset, 0x04 * 21, [0x03, 0x03, 0x10]);
    }

    push(layout.patch_temp_area, 0x10 * 9, [0x03, 0x00, 0x00]);

    for i in 0..8 {
        let addr = i * 0xf6;
        push(layout.timbre_temp_area + addr, 0xf6, [0x04, (addr >> 7) as u8, (addr & 0x7f) as u8]);
    }

    for i in 0..8 {
        push(layout.patch_memory + i * 0x80, 0x80, [0x05, i as u8, 0x00]);
    }
    if let Some(offset) = layout.user_patch {
        for i in 0..4 {
            push(offset + i * 0x80, 0x80, [0x05, i as u8, 0x00]);
        }
    }

    // PCM sound part
    if let Some(pcm) = &layout.pcm {
        push(pcm.patch_temp_area, 0x15 * 6, [0x50, 0x00, 0x00]);
        for i in 0..16 {
            let addr = i * 0x13 * 8;
            push(pcm.patch_memory + addr, 0x13 * 8, [0x51, (addr >> 7) as u8, (addr & 0x7f) as u8]);
        }
        push(pcm.system_area, 0x11, [0x52, 0x00, 0x00]);
    }

    Some(sysexs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sysex::parse_dt1;

    pub(crate) fn dump(kind: &str) -> Vec<u8> {
        let size = if kind == "CM6" { CM6.total_size } else { MTD.total_size };
        let mut data = vec![0u8; size];
        data[0x00..0x0d].copy_from_slice(b"COME ON MUSIC");
        data[0x10..0x12].copy_from_slice(b"R ");
        data[0x12..0x17].copy_from_slice(if kind == "CM6" { b"CM-64" } else { b"MT-32" });
        data
    }

    #[test]
    fn test_cm6_message_count() {
        let sysexs = convert_cm6(&dump("CM6")).unwrap();
        // system + 64 timbres + 2 rhythm + patch temp + 8 timbre temp + 8 patch
        // + pcm patch temp + 16 pcm patch + pcm system
        assert_eq!(sysexs.len(), 1 + 64 + 2 + 1 + 8 + 8 + 1 + 16 + 1);
        assert!(sysexs.iter().all(|s| s.len() <= 256 + 10));
        let first = parse_dt1(&sysexs[0]).unwrap();
        assert_eq!(first.model, MODEL_LA);
        assert_eq!(first.address, [0x10, 0x00, 0x00]);
        assert_eq!(first.data.len(), 0x17);
    }

    #[test]
    fn test_mtd_has_user_patches_and_table() {
        let mut data = dump("MTD");
        data[MTD.patch_memory + 8 * 191] = 0x3f;
        let sysexs = convert_mtd(&data).unwrap();
        assert_eq!(sysexs.len(), 1 + 64 + 1 + 1 + 8 + 8 + 4);
        let table = mtd_patch_table(&data).unwrap();
        assert_eq!(table.len(), PATCH_RECORDS);
        assert_eq!(table[191][0], 0x3f);
    }

    #[test]
    fn test_rejects_other_data() {
        assert!(convert_cm6(&dump("MTD")).is_none());
        assert!(convert_mtd(&[0u8; 16]).is_none());
        let mut data = dump("CM6");
        data[0x10..0x12].copy_from_slice(b"GS");
        assert!(convert_cm6(&data).is_none());
    }

    #[test]
    fn test_device_tag_not_required() {
        // Only the tool signature and "R " mark a dump, the device name varies
        let mut data = dump("CM6");
        data[0x12..0x17].copy_from_slice(b"LAPC1");
        assert_eq!(convert_cm6(&data).map(|s| s.len()), Some(1 + 64 + 2 + 1 + 8 + 8 + 1 + 16 + 1));
    }
}
