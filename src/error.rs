// SPDX-FileCopyrightText: 2021, 2023 Felix Gruber
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io;

use thiserror::Error;

/// Errors that can occur while reading and validating a cartridge image.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("could not read cartridge file: {0}")]
    Io(#[from] io::Error),
    #[error("cartridge image is {0} bytes, smaller than the minimum 32 KiB")]
    TooSmall(usize),
    #[error("cartridge image length {0} is not a multiple of 16 KiB")]
    NotBankAligned(usize),
    #[error("cartridge type byte {0:#04X} selects an unsupported mapper")]
    UnsupportedMapper(u8),
    #[error("boot ROM image is {0} bytes, expected exactly 256")]
    BootRomSize(usize),
}

/// Errors surfaced by the core to its driver.
///
/// Internal invariant violations (a PPU mode byte drifting from the STAT
/// register, an out-of-range OAM index, …) are bugs: they `panic!` rather
/// than flow through this type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    CartridgeLoad(#[from] CartridgeError),
    #[error("illegal opcode {opcode:#04X} at PC={pc:#06X}")]
    IllegalOpcode { opcode: u8, pc: u16 },
}
