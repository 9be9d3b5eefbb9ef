//! Read command implementation

use progmem_core::Progmem;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::create_progress_bar;

/// Default chunk size for reading (one S32K1xx sector)
const READ_CHUNK_SIZE: usize = 2048;

/// Read `length` bytes (or up to the end of the region) starting at `addr`
pub fn run_read<D: Progmem>(
    device: &mut D,
    addr: u32,
    length: Option<u32>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let g = *device.geometry();
    let offset = g.relative_offset(addr);
    let length = match length {
        Some(len) => len as usize,
        None => g.total_size().saturating_sub(offset) as usize,
    };
    g.check_range(offset, length)?;

    let mut data = vec![0u8; length];
    let pb = create_progress_bar(length as u64, "Reading")?;

    let mut done = 0usize;
    while done < length {
        let chunk_size = std::cmp::min(READ_CHUNK_SIZE, length - done);
        device.read(offset + done as u32, &mut data[done..done + chunk_size])?;
        done += chunk_size;
        pb.set_position(done as u64);
    }
    pb.finish_and_clear();

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
