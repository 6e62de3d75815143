//! Example: Listing capture interfaces
//!
//! Prints every Bluetooth interface the library can capture on.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let devices = rustysniff::find_all_devices()?;
    if devices.is_empty() {
        println!("No Bluetooth interfaces found");
        return Ok(());
    }

    for iface in devices.iter() {
        println!(
            "{:<20} {}",
            iface.name,
            iface.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
