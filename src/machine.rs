// SPDX-FileCopyrightText: 2021, 2023 Felix Gruber
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The scheduler: threads an explicit `Machine` value through the CPU,
//! PPU, timer, DMA and interrupt controller instead of the teacher's
//! `GameBoy::run`/`step` scanline-cycle budget loop, running every
//! component forward by the same span of T-cycles each step.

use crate::boot_rom;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::error::{CartridgeError, CoreError};
use crate::joypad::Button;
use crate::memory::Bus;
use crate::ppu::{HEIGHT, WIDTH};

pub struct Machine {
    cpu: Cpu,
    bus: Bus,
}

impl Machine {
    /// Boots from the cartridge's own reset vector, with the dependency-free
    /// synthesized boot ROM doing the SP setup and immediately handing off
    /// to the cartridge, matching `new_with_boot_rom(rom, None)`.
    pub fn new(rom_bytes: Vec<u8>) -> Result<Self, CoreError> {
        Self::new_with_boot_rom(rom_bytes, None)
    }

    pub fn new_with_boot_rom(rom_bytes: Vec<u8>, boot_rom_image: Option<[u8; 0x100]>) -> Result<Self, CoreError> {
        let cartridge = Cartridge::from_bytes(rom_bytes).map_err(CoreError::CartridgeLoad)?;
        let boot_rom_image = boot_rom_image.unwrap_or_else(boot_rom::fast_boot_rom);
        let mut machine = Self {
            cpu: Cpu::new(),
            bus: Bus::new(cartridge, Some(boot_rom_image)),
        };
        machine.reset();
        Ok(machine)
    }

    pub fn load_boot_rom_from_path(path: impl AsRef<std::path::Path>) -> Result<[u8; 0x100], CartridgeError> {
        boot_rom::load_from_path(path)
    }

    /// Resets the CPU, PC and IME to the documented post-boot-ROM state:
    /// PC=0x0000 (the boot ROM overlay is remapped in), SP=0xFFFE, IME
    /// enabled so the cartridge's own interrupt setup takes effect as soon
    /// as it configures IE.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        self.bus.interrupts = crate::interrupts::Interrupts::new();
        self.bus.interrupts.enable_immediately();
    }

    /// Runs one instruction's worth of machine cycles: CPU fetch/execute
    /// (or interrupt dispatch), then the timer, PPU and DMA engine catch
    /// up by the same number of T-cycles, and the DMA engine's queued byte
    /// copies (one per machine cycle) are drained against the bus.
    pub fn step_cycle(&mut self) -> Result<(), CoreError> {
        let cycles = self.cpu.step(&mut self.bus)?;
        for _ in (0..cycles).step_by(4) {
            self.bus.timer.tick(&mut self.bus.interrupts);
            for _ in 0..4 {
                self.bus.ppu.tick_dot(&mut self.bus.interrupts);
            }
            if let Some(copy) = self.bus.dma.tick() {
                let value = self.bus.read8(copy.source);
                self.bus.dma_write_oam(copy.oam_offset, value);
            }
        }
        Ok(())
    }

    /// Steps until a VBlank is entered, for the host's 60 Hz frame loop.
    pub fn run_until_vblank(&mut self) -> Result<(), CoreError> {
        loop {
            self.step_cycle()?;
            if self.bus.ppu.take_vblank_entered() {
                return Ok(());
            }
        }
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.joypad.set_button(button, pressed, &mut self.bus.interrupts);
    }

    /// The current framebuffer as 2-bit grayscale indices in {0,1,2,3},
    /// row-major, 160x144.
    pub fn framebuffer_indices(&self) -> &[u8; WIDTH * HEIGHT] {
        self.bus.ppu.framebuffer()
    }

    /// The framebuffer mapped to {0xFF,0xAA,0x55,0x00} grayscale, for a
    /// host that wants to blit directly.
    pub fn framebuffer_grayscale(&self) -> [u8; WIDTH * HEIGHT] {
        const SHADES: [u8; 4] = [0xFF, 0xAA, 0x55, 0x00];
        let mut out = [0u8; WIDTH * HEIGHT];
        for (dst, &src) in out.iter_mut().zip(self.bus.ppu.framebuffer().iter()) {
            *dst = SHADES[src as usize];
        }
        out
    }

    pub fn cartridge_header(&self) -> crate::cartridge::CartridgeHeader<'_> {
        self.bus.cartridge().header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_program(program: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 32 * 1024];
        rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
        rom
    }

    #[test]
    fn reset_enables_ime_immediately() {
        let rom = rom_with_program(&[0x00]);
        let machine = Machine::new(rom).unwrap();
        assert!(machine.bus.interrupts.ime());
    }

    #[test]
    fn fast_boot_rom_hands_off_to_cartridge_via_ff50() {
        let rom = rom_with_program(&[0x00]);
        let mut machine = Machine::new(rom).unwrap();
        // Boot ROM: LD SP,0xFFFE; JP 0x00FC; LD A,1; LD (0xFF50),A
        for _ in 0..4 {
            machine.step_cycle().unwrap();
        }
        assert_eq!(machine.cpu.pc(), 0x0100);
        assert_eq!(machine.bus.read8(0x0000), machine.bus.cartridge().read8(0x0000));
    }

    #[test]
    fn dma_copies_into_oam_over_160_machine_cycles() {
        let mut rom = vec![0u8; 32 * 1024];
        // cartridge program at 0x0100: LD A,0xC0; LDH (0x46),A — trigger
        // DMA copying from 0xC000.
        rom[0x0100] = 0x3E;
        rom[0x0101] = 0xC0;
        rom[0x0102] = 0xE0;
        rom[0x0103] = 0x46;
        let mut machine = Machine::new(rom).unwrap();
        machine.bus.write8(0xFF50, 1); // skip boot rom for this test
        machine.bus.write8(0xC000, 0x7F);
        machine.cpu.set_pc(0x0100);
        machine.step_cycle().unwrap(); // LD A,0xC0
        machine.step_cycle().unwrap(); // LDH (0x46),A: DMA requested
        for _ in 0..165 {
            machine.step_cycle().unwrap();
        }
        assert_eq!(machine.bus.read8(0xFE00), 0x7F);
    }
}
