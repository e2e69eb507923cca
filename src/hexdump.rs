/// Hexdump with an address column and ASCII gutter, 16 bytes per row.
pub fn hexdump(bytes: &[u8], base: u16) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row != 0 {
            out.push('\n');
        }
        let address = base.wrapping_add((row * 16) as u16);
        let hex: Vec<String> = chunk.iter().map(|byte| format!("{byte:02X}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&byte| {
                if (0x20..=0x7E).contains(&byte) {
                    byte as char
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!("{address:04X}: {:<47} {ascii}", hex.join(" ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_hexdump() {
        let bytes = vec![
            0xA9, 0x48, 0x85, 0x80, 0xA9, 0x49, 0x85, 0x81, 0x00, 0x48, 0x49, 0xFF, 0x20, 0x41,
            0x42, 0x43, 0x44,
        ];
        let dump = hexdump(&bytes, 0x8000);
        assert_eq!(
            dump,
            "8000: A9 48 85 80 A9 49 85 81 00 48 49 FF 20 41 42 43 .H...I...HI. ABC\n\
             8010: 44                                              D"
        );
    }

    #[test]
    fn test_hexdump_empty() {
        assert_eq!(hexdump(&[], 0x0000), "");
    }
}
