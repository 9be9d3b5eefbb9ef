//! Erase and erased-check commands

use progmem_core::{ArgumentError, Error, Progmem};

use super::create_progress_bar;

/// Erase `count` blocks starting at `first`
pub fn run_erase<D: Progmem>(
    device: &mut D,
    first: u32,
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    // The driver takes block indices unchecked; reject bad input here
    let block_count = device.erase_block_count();
    let end = first.checked_add(count).filter(|&end| end <= block_count);
    let Some(end) = end else {
        return Err(format!(
            "Blocks {}..{} out of range (block count {})",
            first,
            first.saturating_add(count),
            block_count
        )
        .into());
    };

    let block_size = device.erase_size(first) as u64;
    let pb = create_progress_bar(count as u64 * block_size, "Erasing")?;

    let mut erased = 0usize;
    for block in first..end {
        erased += device.erase_block(block)?;
        pb.set_position(erased as u64);
    }

    pb.finish_and_clear();
    println!("Erased {} block(s), {} bytes", count, erased);
    Ok(())
}

/// Report the erase state of one page
pub fn run_check<D: Progmem>(device: &mut D, page: u32) -> Result<(), Box<dyn std::error::Error>> {
    match device.is_page_erased(page) {
        Ok(0) => println!("Page {} is erased", page),
        Ok(remaining) => println!(
            "Page {} is not erased: {} of {} bytes from offset 0x{:X}",
            page,
            remaining,
            device.page_size(page),
            device.page_size(page) as usize - remaining
        ),
        Err(Error::InvalidArgument(ArgumentError::PageOutOfRange { page_count, .. })) => {
            return Err(format!("Page {} out of range (page count {})", page, page_count).into())
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
