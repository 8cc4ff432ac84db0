//! In-memory archive builders shared by the unit tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip archive holding `entries` in the given order.
pub fn jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
            continue;
        }
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Descriptor text with the given main attributes.
pub fn manifest(attributes: &[(&str, &str)]) -> Vec<u8> {
    let mut text = String::from("Manifest-Version: 1.0\r\n");
    for (name, value) in attributes {
        text.push_str(&format!("{name}: {value}\r\n"));
    }
    text.push_str("\r\n");
    text.into_bytes()
}

const LOCAL_HEADER: u32 = 0x0403_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;
const DATA_DESCRIPTOR_FLAG: u16 = 0x0008;

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn set_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn set_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn end_of_central_directory(archive: &[u8]) -> usize {
    (0..=archive.len() - 22)
        .rev()
        .find(|&offset| u32_at(archive, offset) == END_OF_CENTRAL_DIRECTORY)
        .unwrap()
}

/// Mark `names` the way `jar` tools write deflated entries: general purpose
/// bit 3 set in both headers, sizes deferred to a trailing descriptor.
pub fn defer_sizes(mut archive: Vec<u8>, names: &[&str]) -> Vec<u8> {
    let mut offset = 0;
    while u32_at(&archive, offset) == LOCAL_HEADER {
        let compressed = u32_at(&archive, offset + 18) as usize;
        let name_len = u16_at(&archive, offset + 26) as usize;
        let extra_len = u16_at(&archive, offset + 28) as usize;
        let name = &archive[offset + 30..offset + 30 + name_len];
        if names.iter().any(|wanted| wanted.as_bytes() == name) {
            let flags = u16_at(&archive, offset + 6) | DATA_DESCRIPTOR_FLAG;
            set_u16(&mut archive, offset + 6, flags);
        }
        offset += 30 + name_len + extra_len + compressed;
    }

    let end = end_of_central_directory(&archive);
    let mut offset = u32_at(&archive, end + 16) as usize;
    while u32_at(&archive, offset) == CENTRAL_HEADER {
        let name_len = u16_at(&archive, offset + 28) as usize;
        let extra_len = u16_at(&archive, offset + 30) as usize;
        let comment_len = u16_at(&archive, offset + 32) as usize;
        let name = &archive[offset + 46..offset + 46 + name_len];
        if names.iter().any(|wanted| wanted.as_bytes() == name) {
            let flags = u16_at(&archive, offset + 8) | DATA_DESCRIPTOR_FLAG;
            set_u16(&mut archive, offset + 8, flags);
        }
        offset += 46 + name_len + extra_len + comment_len;
    }
    archive
}

/// Rewrite the central record of `name` so it declares an uncompressed size
/// of `u64::MAX` through a zip64 extra field. The stored data is untouched.
pub fn inflate_declared_size(archive: Vec<u8>, name: &str) -> Vec<u8> {
    let end = end_of_central_directory(&archive);
    let start = u32_at(&archive, end + 16) as usize;

    let mut central = Vec::new();
    let mut offset = start;
    while u32_at(&archive, offset) == CENTRAL_HEADER {
        let name_len = u16_at(&archive, offset + 28) as usize;
        let extra_len = u16_at(&archive, offset + 30) as usize;
        let comment_len = u16_at(&archive, offset + 32) as usize;
        let record_len = 46 + name_len + extra_len + comment_len;
        let mut record = archive[offset..offset + record_len].to_vec();

        if &record[46..46 + name_len] == name.as_bytes() {
            set_u32(&mut record, 24, u32::MAX);
            set_u16(&mut record, 30, (extra_len + 12) as u16);
            let mut zip64 = Vec::with_capacity(12);
            zip64.extend_from_slice(&0x0001u16.to_le_bytes());
            zip64.extend_from_slice(&8u16.to_le_bytes());
            zip64.extend_from_slice(&u64::MAX.to_le_bytes());
            let at = 46 + name_len + extra_len;
            record.splice(at..at, zip64);
        }
        central.extend_from_slice(&record);
        offset += record_len;
    }

    let mut tail = archive[end..].to_vec();
    set_u32(&mut tail, 12, central.len() as u32);

    let mut rebuilt = archive[..start].to_vec();
    rebuilt.extend_from_slice(&central);
    rebuilt.extend_from_slice(&tail);
    rebuilt
}
