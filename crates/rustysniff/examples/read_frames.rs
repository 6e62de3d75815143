//! Example: Reading frames from a controller
//!
//! Captures ten frames from `bluetooth0` (or the device named on the
//! command line) and prints their length and direction.

use rustysniff::ReadStatus;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let device = std::env::args().nth(1).unwrap_or_else(|| "bluetooth0".to_string());

    let mut handle = rustysniff::create(&device)?;
    handle.set_snaplen(1024)?;
    if let Err(e) = handle.activate() {
        eprintln!("Failed to activate {}: {}", device, handle.geterr());
        return Err(e.into());
    }
    println!("Capturing on {} (link type {})", device, handle.datalink());

    let mut count = 0;
    while count < 10 {
        let status = handle.dispatch(1, |hdr, frame| {
            // The first four bytes are the link-layer pseudo-header
            println!("{} bytes, header {:02x?}", hdr.len, &frame[..4.min(frame.len())]);
        })?;
        match status {
            ReadStatus::Delivered => count += 1,
            ReadStatus::Filtered => continue,
            ReadStatus::Cancelled => break,
        }
    }

    let stats = handle.stats()?;
    println!("Received {} packets, dropped {}", stats.received, stats.dropped);
    Ok(())
}
