#![no_main]

use libfuzzer_sys::fuzz_target;
use pio_core::{decode, handle_line, AddressSpace, Chip, Emulator, SideSetLayout};

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    let layout = SideSetLayout::new(data[0] & 0x7, data[0] & 0x8 != 0);
    let words: Vec<u16> = data[1..]
        .chunks_exact(2)
        .take(32)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    for &word in &words {
        let _ = decode(word, layout);
    }

    let mut chip = Chip::new();
    for (address, &word) in words.iter().enumerate() {
        chip.pio[0].write_instruction(address, word);
    }
    chip.pio[0].set_enabled_mask(0xF);
    chip.gpio.set_external_inputs(u32::from(data[1]) << 8 | u32::from(data[2]));
    for _ in 0..64 {
        chip.raising_edge(false);
        chip.falling_edge();
    }

    let emulator = Emulator::default();
    let space = emulator.address_space();
    let address = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
    let _ = space.read_address(address);
    let _ = space.write_address(address, u32::from(data[1]));
    if let Ok(line) = std::str::from_utf8(data) {
        if !line.starts_with('i') {
            let _ = handle_line(line, &space);
        }
    }
});
