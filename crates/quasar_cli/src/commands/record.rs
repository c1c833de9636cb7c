//! Put and get command implementations.

use super::open_pool;
use quasar_blockstore::{Address, Config};
use std::path::Path;

/// Runs the put command.
pub fn put(
    path: &Path,
    config: Config,
    data: &str,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = if hex {
        decode_hex(data)?
    } else {
        data.as_bytes().to_vec()
    };

    let pool = open_pool(path, config);
    let mut segment = pool.lock_segment()?;
    let address = segment.write(&payload)?;
    segment.unlock()?;

    println!("{address}");
    Ok(())
}

/// Runs the get command.
pub fn get(
    path: &Path,
    config: Config,
    address: &str,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = parse_address(address)?;
    let pool = open_pool(path, config);
    let payload = pool.read_to_vec(address)?;

    if hex {
        println!("{}", encode_hex(&payload));
    } else {
        println!("{}", String::from_utf8_lossy(&payload));
    }
    Ok(())
}

/// Parses `0x`-prefixed hex or decimal.
pub fn parse_address(text: &str) -> Result<Address, std::num::ParseIntError> {
    let raw = match text.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16)?,
        None => text.parse()?,
    };
    Ok(Address::from_raw(raw))
}

fn decode_hex(text: &str) -> Result<Vec<u8>, String> {
    if !text.is_ascii() {
        return Err("hex payload must be ASCII".to_string());
    }
    if text.len() % 2 != 0 {
        return Err("hex payload must have an even number of digits".to_string());
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at position {i}: {e}"))
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_and_decimal_addresses() {
        let address = parse_address("0x0004000000000008").unwrap();
        assert_eq!(address.decode(), (1, 8));
        assert_eq!(parse_address("8").unwrap().decode(), (0, 8));
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn hex_payloads() {
        assert_eq!(decode_hex("00ff10").unwrap(), vec![0, 255, 16]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
        assert_eq!(encode_hex(&[0, 255, 16]), "00ff10");
    }
}
