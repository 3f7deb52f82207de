// SPDX-FileCopyrightText: 2021, 2023 Felix Gruber
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The memory bus: the teacher's `MemoryBus`/`Memory` split, widened to
//! also own the PPU register block, joypad, timer, DMA engine and
//! interrupt controller, so that `Machine` can drive all of them from one
//! place in the per-cycle order the scheduler requires.
//!
//! Address layout:
//! 0x0000-0x3FFF  ROM0   Cartridge ROM bank 0 (0x0000-0x00FF boot ROM overlay)
//! 0x4000-0x7FFF  ROMX   Cartridge ROM bank X
//! 0x8000-0x9FFF  VRAM
//! 0xA000-0xBFFF  SRAM   Cartridge RAM
//! 0xC000-0xDFFF  WRAM
//! 0xE000-0xFDFF  Echo RAM, mirrors 0xC000-0xDDFF
//! 0xFE00-0xFE9F  OAM
//! 0xFEA0-0xFEFF  Unusable
//! 0xFF00-0xFF7F  I/O registers
//! 0xFF80-0xFFFE  HRAM
//! 0xFFFF         IE register

use crate::cartridge::Cartridge;
use crate::dma::Dma;
use crate::interrupts::Interrupts;
use crate::joypad::Joypad;
use crate::ppu::Ppu;
use crate::timer::Timer;

pub struct Bus {
    cartridge: Cartridge,
    boot_rom: Option<[u8; 0x100]>,
    boot_rom_mapped: bool,
    wram: [u8; 0x2000],
    hram: [u8; 0x7F],
    /// Catch-all for I/O registers this core does not implement
    /// functionally (serial, sound): round-trips writes so polling code
    /// doesn't get stuck, per the crate's Non-goals.
    io_scratch: [u8; 0x80],

    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub dma: Dma,
    pub interrupts: Interrupts,
}

impl Bus {
    pub fn new(cartridge: Cartridge, boot_rom: Option<[u8; 0x100]>) -> Self {
        let boot_rom_mapped = boot_rom.is_some();
        Self {
            cartridge,
            boot_rom,
            boot_rom_mapped,
            wram: [0; 0x2000],
            hram: [0; 0x7F],
            io_scratch: [0; 0x80],
            ppu: Ppu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            dma: Dma::new(),
            interrupts: Interrupts::new(),
        }
    }

    pub fn read8(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x00FF if self.boot_rom_mapped => self.boot_rom.unwrap()[address as usize],
            0x0000..=0x7FFF => self.cartridge.read8(address),
            0x8000..=0x9FFF => self.ppu.vram[(address - 0x8000) as usize],
            0xA000..=0xBFFF => self.cartridge.read8(address),
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(address - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read_p1(),
            0xFF04 => self.timer.read_div(),
            0xFF05 => self.timer.read_tima(),
            0xFF06 => self.timer.read_tma(),
            0xFF07 => self.timer.read_tac(),
            0xFF0F => self.interrupts.read_if(),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_register(address),
            0xFF46 => 0xFF, // DMA register is write-only in practice
            0xFF50 => if self.boot_rom_mapped { 0x00 } else { 0x01 },
            0xFF00..=0xFF7F => self.io_scratch[(address - 0xFF00) as usize],
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize],
            0xFFFF => self.interrupts.read_ie(),
        }
    }

    pub fn write8(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x7FFF => self.cartridge.write8(address, value),
            0x8000..=0x9FFF => self.ppu.vram[(address - 0x8000) as usize] = value,
            0xA000..=0xBFFF => self.cartridge.write8(address, value),
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize] = value,
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize] = value,
            0xFE00..=0xFE9F => {
                // CPU writes to OAM are dropped while a DMA transfer is in
                // progress; the DMA engine itself bypasses this via
                // `dma_write_oam`.
                if !self.dma.is_active() {
                    self.ppu.oam[(address - 0xFE00) as usize] = value;
                }
            }
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write_p1(value, &mut self.interrupts),
            0xFF04 => self.timer.write_div(),
            0xFF05 => self.timer.write_tima(value),
            0xFF06 => self.timer.write_tma(value),
            0xFF07 => self.timer.write_tac(value),
            0xFF0F => self.interrupts.write_if(value),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_register(address, value, &mut self.interrupts),
            0xFF46 => self.dma.request(value),
            0xFF50 => {
                if value & 1 != 0 {
                    self.boot_rom_mapped = false;
                }
            }
            0xFF00..=0xFF7F => self.io_scratch[(address - 0xFF00) as usize] = value,
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize] = value,
            0xFFFF => self.interrupts.write_ie(value),
        }
    }

    pub fn read16(&self, address: u16) -> u16 {
        self.read8(address) as u16 | ((self.read8(address.wrapping_add(1)) as u16) << 8)
    }

    pub fn write16(&mut self, address: u16, value: u16) {
        self.write8(address, value as u8);
        self.write8(address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Performs one byte of an active OAM DMA copy, bypassing the normal
    /// write gate (which would otherwise drop writes to OAM while a
    /// transfer is active).
    pub fn dma_write_oam(&mut self, offset: u8, value: u8) {
        self.ppu.oam[offset as usize] = value;
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> Bus {
        let rom = vec![0u8; 32 * 1024];
        let cartridge = Cartridge::from_bytes(rom).unwrap();
        Bus::new(cartridge, None)
    }

    #[test]
    fn wram_round_trips() {
        let mut bus = bus();
        bus.write8(0xC010, 0x42);
        assert_eq!(bus.read8(0xC010), 0x42);
    }

    #[test]
    fn echo_ram_mirrors_wram() {
        let mut bus = bus();
        bus.write8(0xC010, 0x42);
        assert_eq!(bus.read8(0xE010), 0x42);
    }

    #[test]
    fn unusable_region_reads_as_ff() {
        let bus = bus();
        assert_eq!(bus.read8(0xFEA0), 0xFF);
    }

    #[test]
    fn ff50_write_unmaps_boot_rom() {
        let mut bus = Bus::new(Cartridge::from_bytes(vec![0u8; 32 * 1024]).unwrap(), Some([0xAA; 0x100]));
        assert_eq!(bus.read8(0x0000), 0xAA);
        bus.write8(0xFF50, 1);
        assert_eq!(bus.read8(0x0000), 0x00);
    }

    #[test]
    fn oam_dma_drops_cpu_writes_to_oam_only() {
        let mut bus = bus();
        bus.dma.request(0xC0);
        let _ = bus.dma.tick(); // Requested -> InProgress
        // OAM writes from the CPU are dropped while a transfer is active...
        bus.write8(0xFE10, 0x99);
        assert_eq!(bus.read8(0xFE10), 0);
        // ...but everything else (WRAM, HRAM, ...) remains accessible.
        bus.write8(0xC020, 0x99);
        assert_eq!(bus.read8(0xC020), 0x99);
        bus.write8(0xFF80, 0x55);
        assert_eq!(bus.read8(0xFF80), 0x55);
    }
}
