use std::fmt::Write;

use crate::mysql::packet::Packet;

const WIDTH: usize = 16;

/// Hex dump of a packet, one row of 16 bytes with its printable characters.
pub fn format_packet(packet: &Packet) -> String {
    let mut out = String::new();
    out.push_str("  0   1   2   3   4   5   6   7   8   9   a   b   c   d   e   f\n");

    for row in packet.body.chunks(WIDTH) {
        let mut text_buf = String::with_capacity(WIDTH);
        for byte in row {
            let _ = write!(out, " {:02x} ", byte);
            match byte.is_ascii_graphic() {
                true => text_buf.push(*byte as char),
                false => text_buf.push('.'),
            }
        }
        for _ in row.len()..WIDTH {
            out.push_str("    ");
        }
        let _ = writeln!(out, " | {}", text_buf);
    }
    out
}
