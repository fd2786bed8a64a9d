//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use vfsdev_registry::DeviceRegistry;

use super::with_device;

/// Bytes per hex dump line
const DUMP_WIDTH: usize = 16;

/// Run the read command
pub fn run_read(
    registry: &DeviceRegistry,
    name: &str,
    offset: usize,
    len: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut data = vec![0u8; len];
    with_device(registry, name, |dev| Ok(dev.read(offset, &mut data)?))?;

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(&data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => {
            for line in hex_dump(offset, &data) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Format `data` as hex dump lines starting at address `base`
fn hex_dump(base: usize, data: &[u8]) -> Vec<String> {
    data.chunks(DUMP_WIDTH)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            format!(
                "{:08x}  {:<width$}  |{}|",
                base + i * DUMP_WIDTH,
                hex.join(" "),
                ascii,
                width = DUMP_WIDTH * 3 - 1
            )
        })
        .collect()
}
