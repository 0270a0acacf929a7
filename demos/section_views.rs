//! Example: zero-copy views over one temperature grid
//!
//! Run with: cargo run --example section_views

use multiarray::{Array, ByteOrder, DataSource, MemorySource, Section, VariableDescriptor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("multiarray Example: Section Views");
    println!("=================================\n");

    // time x lat x lon
    let shape = [4usize, 3, 5];
    let values: Vec<f32> = (0..60).map(|v| 270.0 + v as f32 * 0.5).collect();
    let temps = Array::from_vec(&shape, values)?;
    println!("Grid shape: {:?} ({} elements)", temps.shape(), temps.size());

    // One time step, every other longitude
    let section: Section = "2,:,0:4:2".parse()?;
    let step = temps.section(&section)?;
    println!("Section {} -> shape {:?}", section, step.shape());
    println!("  {}", step);

    // Longitude-major view for column scans
    let by_lon = temps.permute(&[2, 1, 0])?;
    println!("Permuted shape: {:?}", by_lon.shape());
    println!(
        "  fast path? dense={} permuted={}",
        temps.index_calculator().is_fast_iterator(),
        by_lon.index_calculator().is_fast_iterator()
    );

    // Writes through a view land in the shared buffer
    step.set_f32(&[0, 0], -1.0)?;
    println!("After write through view: temps[2,0,0] = {}", temps.get_f32(&[2, 0, 0])?);

    // Canonical iteration over a flipped view
    let flipped = temps.slice(0, 0)?.flip(0)?;
    let mut it = flipped.index_iterator();
    let mut first_row = Vec::new();
    while it.has_next() && first_row.len() < 5 {
        first_row.push(it.get_next::<f32>()?);
    }
    println!("Last latitude at t=0: {:?}", first_row);

    // Dense copies and ndarray interop
    let owned = step.copy()?;
    let nd = owned.to_ndarray::<f32>()?;
    println!("ndarray view of section: shape {:?}", nd.shape());

    // Round-trip the grid through an in-memory data source
    let source = MemorySource::new();
    let var: VariableDescriptor = source.insert_array("temp", &temps, ByteOrder::LittleEndian)?;
    let requests = vec![
        (var.clone(), "0,:,:".parse::<Section>()?),
        (var.clone(), "3,1,:".parse::<Section>()?),
    ];
    let parts = source.read_many(&requests).await?;
    for ((_, section), part) in requests.iter().zip(&parts) {
        println!("read {} -> shape {:?}", section, part.shape());
    }

    Ok(())
}
