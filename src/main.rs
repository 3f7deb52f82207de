// SPDX-FileCopyrightText: 2021, 2023 Felix Gruber
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::ExitCode;

use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use minifb::{Key, Window, WindowOptions};

use gameboy_core::{Button, CartridgeHeader, CoreError, Machine, HEIGHT, WIDTH};

const PIXEL_SIZE: usize = 4;
const SHADE_COLORS: [u32; 4] = [0xFFFFFF, 0x808080, 0x404040, 0x000000];

fn cli() -> Command {
    Command::new("gameboy")
        .version(crate_version!())
        .about("A Game Boy emulator")
        .arg(
            Arg::new("cartridge-file")
                .help("a ROM file to load into the emulator")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::new("boot-rom")
                .help("path to a 256-byte boot ROM image; defaults to a built-in stub")
                .long("boot-rom")
                .num_args(1),
        )
        .arg(
            Arg::new("dump-header")
                .help("print the cartridge header and exit without running")
                .long("dump-header")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .help("log level filter")
                .long("log-level")
                .num_args(1)
                .default_value("warn"),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let log_level: &String = matches.get_one("log-level").unwrap();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<(), CoreError> {
    let path: &String = matches.get_one("cartridge-file").unwrap();
    let rom_bytes = std::fs::read(path).map_err(gameboy_core::CartridgeError::from)?;

    if matches.get_flag("dump-header") {
        let cartridge = gameboy_core::Cartridge::from_bytes(rom_bytes)?;
        print_cartridge_header(cartridge.header());
        return Ok(());
    }

    let boot_rom = match matches.get_one::<String>("boot-rom") {
        Some(path) => Some(Machine::load_boot_rom_from_path(path)?),
        None => None,
    };
    let mut machine = Machine::new_with_boot_rom(rom_bytes, boot_rom)?;

    let mut window = Window::new(
        "Game Boy emulator",
        WIDTH * PIXEL_SIZE,
        HEIGHT * PIXEL_SIZE,
        WindowOptions::default(),
    )
    .expect("failed to open emulator window");
    let mut display_buffer = vec![0u32; WIDTH * HEIGHT * PIXEL_SIZE * PIXEL_SIZE];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        machine.run_until_vblank()?;
        poll_buttons(&mut machine, &window);
        blit(&mut display_buffer, machine.framebuffer_indices());
        window
            .update_with_buffer(&display_buffer, WIDTH * PIXEL_SIZE, HEIGHT * PIXEL_SIZE)
            .expect("failed to present framebuffer");
    }
    Ok(())
}

/// Arrows map to the directional pad; X/Z to A/B; Q/W to Select/Start, the
/// same layout the teacher's window used.
fn poll_buttons(machine: &mut Machine, window: &Window) {
    const BINDINGS: [(Key, Button); 8] = [
        (Key::Right, Button::Right),
        (Key::Left, Button::Left),
        (Key::Up, Button::Up),
        (Key::Down, Button::Down),
        (Key::X, Button::A),
        (Key::Z, Button::B),
        (Key::Q, Button::Select),
        (Key::W, Button::Start),
    ];
    for (key, button) in BINDINGS {
        machine.set_button(button, window.is_key_down(key));
    }
}

/// Expands the 160x144 2-bit-index framebuffer into an RGB32 buffer scaled
/// up by `PIXEL_SIZE` for visibility on modern displays.
fn blit(display_buffer: &mut [u32], pixels: &[u8; WIDTH * HEIGHT]) {
    let buffer_width = WIDTH * PIXEL_SIZE;
    for line in 0..HEIGHT {
        let buffer_line_start = line * PIXEL_SIZE * buffer_width;
        let buffer_line_range = buffer_line_start..(buffer_line_start + buffer_width);
        let buffer_line = &mut display_buffer[buffer_line_range.clone()];
        for col in 0..WIDTH {
            let color = SHADE_COLORS[pixels[line * WIDTH + col] as usize];
            buffer_line[col * PIXEL_SIZE..(col + 1) * PIXEL_SIZE].fill(color);
        }
        for i in 1..PIXEL_SIZE {
            display_buffer.copy_within(buffer_line_range.clone(), buffer_line_start + i * buffer_width);
        }
    }
}

fn print_cartridge_header(header: CartridgeHeader<'_>) {
    if let Ok(title) = std::str::from_utf8(header.title()) {
        println!("Title: {}", title.trim_end_matches('\0'));
    } else {
        println!("Could not decode title: {:#X?}", header.title());
    }
    if let Some(code) = header.manufacturer_code() {
        println!("Manufacturer code: {code}");
    }
    println!("Cartridge type: {:?}", header.cartridge_type());
    println!("Memory controller: {:?}", header.cartridge_type().memory_controller());
    println!("Color compat: {:?}", header.color_compat());
    println!("Supports SGB function: {}", header.supports_sgb_function());
    println!("ROM banks: {}", header.num_rom_banks());
    println!("RAM banks: {}", header.num_ram_banks());
    println!("ROM version: {}", header.rom_version());
    print!("Licensee code: ");
    if header.uses_new_licensee_code() {
        println!("{}", header.new_licensee_code().unwrap_or("?"));
    } else {
        println!("{:0>2X}", header.old_licensee_code());
    }
    println!("is Japanese: {}", header.is_japanese());
    println!("Logo is {}.", if header.is_logo_correct() { "correct" } else { "wrong" });
    println!(
        "Header checksum is {}.",
        if header.is_header_checksum_correct() { "correct" } else { "wrong" }
    );
}
