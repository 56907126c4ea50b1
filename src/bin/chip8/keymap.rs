use chip8_vm::{chip8::KEYPAD_LAYOUT, u4};

/// Host keys, row by row, sitting where the hex keys of `KEYPAD_LAYOUT` sit.
const HOST_ROWS: [&str; 4] = ["1234", "qwer", "asdf", "zxcv"];

/// Hex key that the host key `c` stands for. Letters match in either case.
pub fn hex_key(c: char) -> Option<u4> {
    let c = c.to_ascii_lowercase();
    HOST_ROWS
        .iter()
        .zip(KEYPAD_LAYOUT)
        .find_map(|(row, keys)| row.chars().position(|k| k == c).map(|col| u4::new(keys[col])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_of_the_block_map_to_the_keypad_corners() {
        assert_eq!(hex_key('1'), Some(u4::new(0x1)));
        assert_eq!(hex_key('4'), Some(u4::new(0xC)));
        assert_eq!(hex_key('z'), Some(u4::new(0xA)));
        assert_eq!(hex_key('V'), Some(u4::new(0xF)));
        assert_eq!(hex_key('x'), Some(u4::new(0x0)));
    }

    #[test]
    fn every_hex_key_has_exactly_one_host_key() {
        let mut hits = [0; 16];
        for c in HOST_ROWS.concat().chars() {
            hits[usize::from(hex_key(c).unwrap())] += 1;
        }
        assert_eq!(hits, [1; 16]);
        assert_eq!(hex_key('5'), None);
        assert_eq!(hex_key(' '), None);
    }
}
