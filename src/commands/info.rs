//! Info and init commands

use progmem_core::{HardwarePort, Progmem};
use progmem_ftfc::FtfcProgmem;

/// Print geometry and erase status of every block
pub fn run_info<D: Progmem>(device: &mut D) -> Result<(), Box<dyn std::error::Error>> {
    let g = *device.geometry();

    println!(
        "Flash size: {} bytes ({} KiB) at 0x{:08X}",
        g.total_size(),
        g.total_size() / 1024,
        g.base_address
    );
    println!(
        "Pages: {} x {} bytes, blocks: {} x {} bytes",
        g.page_count,
        device.page_size(0),
        device.erase_block_count(),
        device.erase_size(0)
    );
    println!("Write unit: {} bytes", g.write_unit_size);
    println!("Controller offset: 0x{:06X}", g.data_flash_offset);
    println!("Erased value: 0x{:02X}", device.erase_state());
    println!();

    let mut erased_pages = 0;
    for page in 0..g.page_count {
        if device.is_page_erased(page)? == 0 {
            erased_pages += 1;
        }
    }
    println!("{} of {} pages erased", erased_pages, g.page_count);

    Ok(())
}

/// Run controller initialization
pub fn run_init<P: HardwarePort>(
    device: &mut FtfcProgmem<P>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Partitioning with {:?}", device.options().partition);
    device.initialize();
    println!("Initialization done (see log for controller status)");
    Ok(())
}
