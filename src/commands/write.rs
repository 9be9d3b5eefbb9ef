//! Write command implementation

use progmem_core::Progmem;
use std::fs;
use std::path::Path;

use super::create_progress_bar;

/// Program the contents of `input` at `addr`, one page-sized chunk at a time
pub fn run_write<D: Progmem>(
    device: &mut D,
    addr: u32,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let g = *device.geometry();
    let offset = g.relative_offset(addr);
    g.check_range(offset, data.len())?;
    if data.len() % g.write_unit_size as usize != 0 {
        return Err(format!(
            "Input length {} is not a multiple of the {}-byte write unit",
            data.len(),
            g.write_unit_size
        )
        .into());
    }

    let pb = create_progress_bar(data.len() as u64, "Writing")?;
    let mut written = 0usize;
    for chunk in data.chunks(g.page_size as usize) {
        written += device.write(offset + written as u32, chunk)?;
        pb.set_position(written as u64);
    }

    pb.finish_and_clear();
    println!(
        "Wrote {} bytes at 0x{:08X}",
        written,
        g.base_address + offset
    );
    Ok(())
}
