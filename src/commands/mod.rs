//! CLI command implementations
//!
//! Every command works on a [`Progmem`](progmem_core::Progmem) device, so the
//! same code runs against the emulator and real hardware.

mod erase;
mod info;
mod read;
mod write;

pub use erase::{run_check, run_erase};
pub use info::{run_info, run_init};
pub use read::run_read;
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar with a phase message
fn create_progress_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
