const PIC_SET_COLOR: u8 = 0xf0;
const PIC_SET_PRIORITY: u8 = 0xf2;
const PIC_END: u8 = 0xff;

enum Mode {
    Aligned,
    // Colour argument in the high nibble of the next byte
    ColorHigh,
    Shifted,
    // Colour argument in the low nibble of the current byte
    ColorLow,
}

/// Expands a V3 picture stream where the argument of F0/F2 takes a single nibble.
/// Output always ends with the 0xFF terminator.
pub fn unpack_picture(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() * 2);
    let mut mode = Mode::Aligned;
    let mut iter = input.iter().copied();
    let mut current: u8 = 0;
    loop {
        if let Mode::ColorLow = mode {
            output.push(current & 0x0f);
            mode = Mode::Aligned;
            continue;
        }
        let previous = current;
        current = match iter.next() {
            Some(b) => b,
            None => break,
        };
        let value = match mode {
            Mode::Aligned => {
                if current == PIC_SET_COLOR || current == PIC_SET_PRIORITY {
                    mode = Mode::ColorHigh;
                }
                current
            },
            Mode::ColorHigh => {
                mode = Mode::Shifted;
                output.push(current >> 4);
                continue;
            },
            Mode::Shifted | Mode::ColorLow => {
                let value = (current >> 4) | ((previous & 0x0f) << 4);
                if value == PIC_SET_COLOR || value == PIC_SET_PRIORITY {
                    mode = Mode::ColorLow;
                }
                value
            },
        };
        if value == PIC_END {
            break;
        }
        output.push(value);
    }
    output.push(PIC_END);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn plain_bytes_pass_through() {
        assert_eq!(unpack_picture(&[ 0xf6, 0x10, 0x20, 0xff ]), vec![ 0xf6, 0x10, 0x20, 0xff ]);
    }

    #[test]
    fn color_nibble_then_end() {
        assert_eq!(unpack_picture(&[ 0xf0, 0x5f, 0xf0 ]), vec![ 0xf0, 0x05, 0xff ]);
    }

    #[test]
    fn realigns_after_second_color() {
        // F0 5, F6 10 20, F2 3, F8 40 50, FF
        let packed = [ 0xf0, 0x5f, 0x61, 0x02, 0x0f, 0x23, 0xf8, 0x40, 0x50, 0xff ];
        assert_eq!(unpack_picture(&packed),
            vec![ 0xf0, 0x05, 0xf6, 0x10, 0x20, 0xf2, 0x03, 0xf8, 0x40, 0x50, 0xff ]);
    }

    #[test]
    fn missing_terminator() {
        assert_eq!(unpack_picture(&[ 0xf1 ]), vec![ 0xf1, 0xff ]);
    }
}
