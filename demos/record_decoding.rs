//! Example: decode weather-station records from a raw file
//!
//! Run with: cargo run --example record_decoding

use bytes::{BufMut, BytesMut};
use multiarray::{ArrayStructureBB, DataType, Member, StructureMembers};

const SCHEMA: &str = r#"{
    "name": "observation",
    "structure_size": 32,
    "members": [
        {"name": "station", "data_type": "Char", "shape": [6]},
        {"name": "quality", "data_type": "Short", "byte_offset": 6, "byte_order": "LittleEndian"},
        {"name": "time", "data_type": "Long", "byte_offset": 8, "units": "s"},
        {"name": "temp", "data_type": "Float", "shape": [3], "byte_offset": 16, "units": "K"},
        {"name": "note", "data_type": "String", "byte_offset": 28}
    ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("multiarray Example: Record Decoding");
    println!("===================================\n");

    let schema = StructureMembers::from_json(SCHEMA)?;
    println!("Schema '{}': {:?}", schema.name(), schema.member_names());
    println!("Record size: {} bytes\n", schema.validate()?);

    // Three records as a file reader would hand them over
    let mut buf = BytesMut::new();
    for (i, code) in [b"KSEA\0\0", b"KPDX\0\0", b"KBOI\0\0"].iter().enumerate() {
        buf.put_slice(*code);
        buf.put_i16_le(i as i16);
        buf.put_i64(1_700_000_000 + i as i64 * 3600);
        for h in 0..3 {
            buf.put_f32(280.0 + i as f32 + h as f32 * 0.25);
        }
        buf.put_i32(i as i32 % 2);
    }

    let records = ArrayStructureBB::new(schema, &[3], buf.freeze(), 0)?;
    records.add_string_to_heap("clear");
    records.add_string_to_heap("fog");

    for r in 0..records.record_count() {
        let obs = records.get_structure(r)?;
        let temps = obs.get_array("temp")?;
        println!(
            "{:<6} q={} t={} temp={} note={}",
            obs.get_scalar_string("station")?,
            obs.get_scalar_i16("quality")?,
            obs.get_scalar_i64("time")?,
            temps,
            obs.get_scalar_string("note")?
        );
    }

    // Schemas can also be built in code and packed automatically
    let mut packed = StructureMembers::new("sample")
        .with_member(Member::new("id", DataType::Int, &[]))
        .with_member(Member::new("tag", DataType::Char, &[4]))
        .with_member(Member::new("value", DataType::Double, &[]));
    let size = packed.assign_offsets()?;
    println!("\nPacked '{}' layout ({} bytes):", packed.name(), size);
    for m in packed.members() {
        println!("  {:<6} {:<7} at byte {}", m.name, m.data_type, m.byte_offset);
    }

    Ok(())
}
