// SPDX-FileCopyrightText: 2021, 2023 Felix Gruber
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The SM83/LR35902 CPU: opcode fetch/decode/execute and interrupt
//! dispatch. Adapted from the scanline-emulator's `game_boy::cpu`, kept as
//! a tagged-dispatch opcode table rather than a raw bitfield decoder, with
//! illegal opcodes turned into a typed error and EI's one-instruction
//! enable delay wired through `Interrupts`.

use crate::error::CoreError;
use crate::memory::Bus;
use crate::registers::{Flag, Registers, U16Register, U8Register};

/// Whether the core is fetching normally, halted waiting for an
/// interrupt, or stopped waiting for a joypad edge.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Running,
    Halted,
    Stopped,
}

pub struct Cpu {
    registers: Registers,
    sp: u16,
    pc: u16,
    state: State,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            sp: 0xFFFE,
            pc: 0,
            state: State::Running,
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn sp(&self) -> u16 {
        self.sp
    }

    /// Runs one instruction's worth of machine cycles: an interrupt-service
    /// opportunity at the boundary, then either a 5-machine-cycle interrupt
    /// dispatch or a single fetch/decode/execute, returning the T-cycles
    /// (multiple of 4) consumed so the caller can advance the timer, PPU
    /// and DMA engine by the same amount.
    pub fn step(&mut self, bus: &mut Bus) -> Result<usize, CoreError> {
        if self.state == State::Halted && bus.interrupts.pending().is_some() {
            self.state = State::Running;
        }
        if bus.interrupts.ime() {
            if let Some(interrupt) = bus.interrupts.pending() {
                bus.interrupts.disable_immediately();
                bus.interrupts.acknowledge(interrupt);
                self.push(bus, self.pc);
                self.pc = interrupt.vector();
                return Ok(5 * 4);
            }
        } else {
            bus.interrupts.step_ime_delay();
        }
        if self.state != State::Running {
            return Ok(4);
        }
        let instruction = {
            let mut instruction_byte = bus.read8(self.pc);
            let prefixed = instruction_byte == 0xCB;
            if prefixed {
                instruction_byte = bus.read8(self.pc + 1);
            }
            match Instruction::from_byte(instruction_byte, prefixed) {
                Some(instruction) => instruction,
                None => {
                    return Err(CoreError::IllegalOpcode {
                        opcode: instruction_byte,
                        pc: self.pc,
                    });
                }
            }
        };
        Ok(self.execute(bus, instruction))
    }

    fn execute(&mut self, bus: &mut Bus, instruction: Instruction) -> usize {
        use Instruction::*;
        match instruction {
            NOP => {
                self.pc += 1;
                4
            }
            ADD(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a;
                let (new_a, carry) = a.overflowing_add(operand);
                let half_carry = (a & 0xF) + (operand & 0xF) > 0xF;
                self.registers.a = new_a;
                let mut f = 0;
                if new_a == 0 {
                    f |= Flag::Zero as u8;
                }
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                cycles
            }
            ADC(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a;
                let old_carry = self.registers.f & Flag::Carry as u8 != 0;
                let (new_a, carry) = {
                    let (new_a, carry) = a.overflowing_add(operand);
                    if !old_carry {
                        (new_a, carry)
                    } else {
                        let (new_a, carry2) = new_a.overflowing_add(1);
                        (new_a, carry || carry2)
                    }
                };
                let half_carry = (a & 0xF) + (operand & 0xF) + (old_carry as u8) > 0xF;
                self.registers.a = new_a;
                let mut f = 0;
                if new_a == 0 {
                    f |= Flag::Zero as u8;
                }
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                cycles
            }
            SUB(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a;
                let (new_a, carry) = a.overflowing_sub(operand);
                let (_, half_carry) = (a & 0xF).overflowing_sub(operand & 0xF);
                self.registers.a = new_a;
                let mut f = Flag::Subtract as u8;
                if new_a == 0 {
                    f |= Flag::Zero as u8;
                }
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                cycles
            }
            SBC(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a;
                let old_carry = self.registers.f & Flag::Carry as u8 != 0;
                let (new_a, carry) = {
                    let (new_a, carry) = a.overflowing_sub(operand);
                    if !old_carry {
                        (new_a, carry)
                    } else {
                        let (new_a, carry2) = new_a.overflowing_sub(1);
                        (new_a, carry || carry2)
                    }
                };
                let half_carry = {
                    let (a2, half_carry) = (a & 0xF).overflowing_sub(operand & 0xF);
                    if !old_carry {
                        half_carry
                    } else {
                        let (_, carry2) = a2.overflowing_sub(1);
                        half_carry || carry2
                    }
                };
                self.registers.a = new_a;
                let mut f = Flag::Subtract as u8;
                if new_a == 0 {
                    f |= Flag::Zero as u8;
                }
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                cycles
            }
            AND(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a & operand;
                self.registers.a = a;
                let mut f = Flag::HalfCarry as u8;
                if a == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                cycles
            }
            XOR(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a ^ operand;
                self.registers.a = a;
                self.registers.f = if a == 0 { Flag::Zero as u8 } else { 0 };
                cycles
            }
            OR(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a | operand;
                self.registers.a = a;
                self.registers.f = if a == 0 { Flag::Zero as u8 } else { 0 };
                cycles
            }
            CP(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let operand = self.load_arithmetic_operand(bus, operand);
                let a = self.registers.a;
                let (result, carry) = a.overflowing_sub(operand);
                let (_, half_carry) = (a & 0xF).overflowing_sub(operand & 0xF);
                let mut f = Flag::Subtract as u8;
                if result == 0 {
                    f |= Flag::Zero as u8;
                }
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                cycles
            }
            INC(inc_type) => {
                self.pc += 1;
                match inc_type {
                    IncDecType::IncDec8(operand) => {
                        let value = self.load_non_direct_arithmetic_operand(bus, operand);
                        let new = value.wrapping_add(1);
                        self.write_non_direct_arithmetic_operand(bus, operand, new);
                        let mut f = self.registers.f & Flag::Carry as u8;
                        if new == 0 {
                            f |= Flag::Zero as u8;
                        }
                        if value & 0xF == 0xF {
                            f |= Flag::HalfCarry as u8;
                        }
                        self.registers.f = f;
                        match operand {
                            NonDirectArithmeticOperand::Register(_) => 4,
                            NonDirectArithmeticOperand::HLI => 12,
                        }
                    }
                    IncDecType::IncDec16(operand) => {
                        let value = self.load_inc_dec_16_operand(operand);
                        self.write_inc_dec_16_operand(operand, value.wrapping_add(1));
                        8
                    }
                }
            }
            DEC(dec_type) => {
                self.pc += 1;
                match dec_type {
                    IncDecType::IncDec8(operand) => {
                        let value = self.load_non_direct_arithmetic_operand(bus, operand);
                        let new = value.wrapping_sub(1);
                        self.write_non_direct_arithmetic_operand(bus, operand, new);
                        let mut f = (self.registers.f & Flag::Carry as u8) | Flag::Subtract as u8;
                        if new == 0 {
                            f |= Flag::Zero as u8;
                        }
                        if value & 0xF == 0 {
                            f |= Flag::HalfCarry as u8;
                        }
                        self.registers.f = f;
                        match operand {
                            NonDirectArithmeticOperand::Register(_) => 4,
                            NonDirectArithmeticOperand::HLI => 12,
                        }
                    }
                    IncDecType::IncDec16(operand) => {
                        let value = self.load_inc_dec_16_operand(operand);
                        self.write_inc_dec_16_operand(operand, value.wrapping_sub(1));
                        8
                    }
                }
            }
            ADD16(source) => {
                self.pc += 1;
                let hl = self.registers.read16(U16Register::HL);
                let operand = self.load_arithmetic_word_source(source);
                let (new_hl, carry) = hl.overflowing_add(operand);
                let half_carry = (hl & 0xFFF) + (operand & 0xFFF) > 0xFFF;
                self.registers.write16(U16Register::HL, new_hl);
                let mut f = self.registers.f & Flag::Zero as u8;
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                8
            }
            ADD16SP => {
                let e = bus.read8(self.pc + 1) as i8 as i16 as u16;
                self.pc += 2;
                let sp = self.sp;
                let half_carry = (sp & 0xF) + (e & 0xF) > 0xF;
                let carry = (sp & 0xFF) + (e & 0xFF) > 0xFF;
                self.sp = sp.wrapping_add(e);
                let mut f = 0;
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                16
            }
            ADD16SPinHL => {
                let e = bus.read8(self.pc + 1) as i8 as i16 as u16;
                self.pc += 2;
                let sp = self.sp;
                let half_carry = (sp & 0xF) + (e & 0xF) > 0xF;
                let carry = (sp & 0xFF) + (e & 0xFF) > 0xFF;
                self.registers.write16(U16Register::HL, sp.wrapping_add(e));
                let mut f = 0;
                if half_carry {
                    f |= Flag::HalfCarry as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                12
            }
            LD(load_type) => self.execute_load(bus, load_type),
            LDH(operand, direction) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let address = match operand {
                    LdhOperand::I8 => {
                        let offset = bus.read8(self.pc);
                        self.pc += 1;
                        0xFF00 + offset as u16
                    }
                    LdhOperand::Ci => 0xFF00 + self.registers.read8(U8Register::C) as u16,
                };
                match direction {
                    LdhDirection::ToA => {
                        let value = bus.read8(address);
                        self.registers.write8(U8Register::A, value);
                    }
                    LdhDirection::FromA => {
                        bus.write8(address, self.registers.read8(U8Register::A));
                    }
                }
                cycles
            }
            SWAP(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let swapped = (value << 4) | (value >> 4);
                self.write_non_direct_arithmetic_operand(bus, operand, swapped);
                self.registers.f = if swapped == 0 { Flag::Zero as u8 } else { 0 };
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            BIT(bit, operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let is_set = value & bit as u8 != 0;
                let mut f = (self.registers.f & Flag::Carry as u8) | Flag::HalfCarry as u8;
                if !is_set {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 12,
                }
            }
            RES(bit, operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                self.write_non_direct_arithmetic_operand(bus, operand, value & !(bit as u8));
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            SET(bit, operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                self.write_non_direct_arithmetic_operand(bus, operand, value | bit as u8);
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            RLCA => {
                self.pc += 1;
                let a = self.registers.a;
                let carry = a & 0x80 != 0;
                self.registers.a = a.rotate_left(1);
                self.registers.f = if carry { Flag::Carry as u8 } else { 0 };
                4
            }
            RLA => {
                self.pc += 1;
                let a = self.registers.a;
                let old_carry = (self.registers.f & Flag::Carry as u8 != 0) as u8;
                let carry = a & 0x80 != 0;
                self.registers.a = (a << 1) | old_carry;
                self.registers.f = if carry { Flag::Carry as u8 } else { 0 };
                4
            }
            RRCA => {
                self.pc += 1;
                let a = self.registers.a;
                let carry = a & 1 != 0;
                self.registers.a = a.rotate_right(1);
                self.registers.f = if carry { Flag::Carry as u8 } else { 0 };
                4
            }
            RRA => {
                self.pc += 1;
                let a = self.registers.a;
                let old_carry = (self.registers.f & Flag::Carry as u8 != 0) as u8;
                let carry = a & 1 != 0;
                self.registers.a = (a >> 1) | (old_carry << 7);
                self.registers.f = if carry { Flag::Carry as u8 } else { 0 };
                4
            }
            RL(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let old_carry = (self.registers.f & Flag::Carry as u8 != 0) as u8;
                let carry = value & 0x80 != 0;
                let new = (value << 1) | old_carry;
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            RLC(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let carry = value & 0x80 != 0;
                let new = value.rotate_left(1);
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            RR(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let old_carry = (self.registers.f & Flag::Carry as u8 != 0) as u8;
                let carry = value & 1 != 0;
                let new = (value >> 1) | (old_carry << 7);
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            RRC(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let carry = value & 1 != 0;
                let new = value.rotate_right(1);
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            SLA(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let carry = value & 0x80 != 0;
                let new = value << 1;
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            SRA(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let carry = value & 1 != 0;
                let new = (value >> 1) | (value & 0x80);
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            SRL(operand) => {
                self.pc += 2;
                let value = self.load_non_direct_arithmetic_operand(bus, operand);
                let carry = value & 1 != 0;
                let new = value >> 1;
                self.write_non_direct_arithmetic_operand(bus, operand, new);
                let mut f = if carry { Flag::Carry as u8 } else { 0 };
                if new == 0 {
                    f |= Flag::Zero as u8;
                }
                self.registers.f = f;
                match operand {
                    NonDirectArithmeticOperand::Register(_) => 8,
                    NonDirectArithmeticOperand::HLI => 16,
                }
            }
            DAA => {
                self.pc += 1;
                let mut a = self.registers.a;
                let subtract = self.registers.f & Flag::Subtract as u8 != 0;
                let half_carry = self.registers.f & Flag::HalfCarry as u8 != 0;
                let mut carry = self.registers.f & Flag::Carry as u8 != 0;
                if !subtract {
                    if carry || a > 0x99 {
                        a = a.wrapping_add(0x60);
                        carry = true;
                    }
                    if half_carry || (a & 0x0F) > 0x09 {
                        a = a.wrapping_add(0x06);
                    }
                } else {
                    if carry {
                        a = a.wrapping_sub(0x60);
                    }
                    if half_carry {
                        a = a.wrapping_sub(0x06);
                    }
                }
                self.registers.a = a;
                let mut f = self.registers.f & Flag::Subtract as u8;
                if a == 0 {
                    f |= Flag::Zero as u8;
                }
                if carry {
                    f |= Flag::Carry as u8;
                }
                self.registers.f = f;
                4
            }
            CPL => {
                self.pc += 1;
                self.registers.a = !self.registers.a;
                self.registers.f |= Flag::Subtract as u8 | Flag::HalfCarry as u8;
                4
            }
            SCF => {
                self.pc += 1;
                let zero = self.registers.f & Flag::Zero as u8;
                self.registers.f = zero | Flag::Carry as u8;
                4
            }
            CCF => {
                self.pc += 1;
                let zero = self.registers.f & Flag::Zero as u8;
                let carry = self.registers.f & Flag::Carry as u8 != 0;
                self.registers.f = zero | if carry { 0 } else { Flag::Carry as u8 };
                4
            }
            JP(condition) => {
                let nn = bus.read16(self.pc + 1);
                self.pc += 3;
                if self.test_jump_condition(condition) {
                    self.pc = nn;
                    16
                } else {
                    12
                }
            }
            JPHL => {
                self.pc = self.registers.read16(U16Register::HL);
                4
            }
            JR(condition) => {
                let e = bus.read8(self.pc + 1) as i8;
                self.pc += 2;
                if self.test_jump_condition(condition) {
                    self.pc = (self.pc as i16 + e as i16) as u16;
                    12
                } else {
                    8
                }
            }
            CALL(condition) => {
                let nn = bus.read16(self.pc + 1);
                self.pc += 3;
                if self.test_jump_condition(condition) {
                    self.push(bus, self.pc);
                    self.pc = nn;
                    24
                } else {
                    12
                }
            }
            RST(n) => {
                self.pc += 1;
                self.push(bus, self.pc);
                self.pc = n as u16;
                16
            }
            RET(condition) => {
                if self.test_jump_condition(condition) {
                    let address = self.pop(bus);
                    self.pc = address;
                    if matches!(condition, JumpCondition::Unconditional) {
                        16
                    } else {
                        20
                    }
                } else {
                    self.pc += 1;
                    8
                }
            }
            RETI => {
                let address = self.pop(bus);
                self.pc = address;
                bus.interrupts.enable_immediately();
                16
            }
            PUSH(register) => {
                self.pc += 1;
                self.push(bus, self.registers.read16(register));
                16
            }
            POP(register) => {
                self.pc += 1;
                let value = self.pop(bus);
                self.registers.write16(register, value);
                12
            }
            DI => {
                self.pc += 1;
                bus.interrupts.disable_immediately();
                4
            }
            EI => {
                self.pc += 1;
                bus.interrupts.request_enable();
                4
            }
            HALT => {
                self.pc += 1;
                self.state = State::Halted;
                4
            }
            STOP => {
                self.pc += 2;
                self.state = State::Stopped;
                4
            }
        }
    }

    fn execute_load(&mut self, bus: &mut Bus, load_type: LoadType) -> usize {
        match load_type {
            LoadType::Byte(target, source) => {
                self.pc += 1;
                let cycles = target.cycles() + source.cycles() + 4;
                let value = self.load_byte_source(bus, source);
                self.write_load_byte_target(bus, target, value);
                cycles
            }
            LoadType::Word(target, source) => {
                self.pc += 1;
                let cycles = source.cycles() + 4;
                match source {
                    LoadWordSource::D16 => {
                        let value = bus.read16(self.pc);
                        self.pc += 2;
                        self.write_load_word_target(target, value);
                    }
                    LoadWordSource::SP => {
                        self.write_load_word_target(target, self.sp);
                    }
                    LoadWordSource::HL => {
                        self.sp = self.registers.read16(U16Register::HL);
                    }
                }
                cycles
            }
            LoadType::IndirectByteFromA(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let a = self.registers.a;
                let address = self.load_indirect_byte_address(bus, operand);
                bus.write8(address, a);
                cycles
            }
            LoadType::IndirectByteToA(operand) => {
                self.pc += 1;
                let cycles = operand.cycles() + 4;
                let address = self.load_indirect_byte_address(bus, operand);
                let value = bus.read8(address);
                self.registers.a = value;
                cycles
            }
            LoadType::IndirectWordFromSP => {
                self.pc += 1;
                let address = bus.read16(self.pc);
                self.pc += 2;
                bus.write16(address, self.sp);
                20
            }
        }
    }

    fn load_indirect_byte_address(&mut self, bus: &mut Bus, operand: LoadIndirectByteOperand) -> u16 {
        use LoadIndirectByteOperand::*;
        match operand {
            Register(r) => self.registers.read16(r),
            HLIIncrementing => {
                let hl = self.registers.read16(U16Register::HL);
                self.registers.write16(U16Register::HL, hl.wrapping_add(1));
                hl
            }
            HLIDecrementing => {
                let hl = self.registers.read16(U16Register::HL);
                self.registers.write16(U16Register::HL, hl.wrapping_sub(1));
                hl
            }
            Address => {
                let address = bus.read16(self.pc);
                self.pc += 2;
                address
            }
        }
    }

    fn load_byte_source(&mut self, bus: &Bus, source: LoadByteSource) -> u8 {
        match source {
            LoadByteSource::Register(r) => self.registers.read8(r),
            LoadByteSource::D8 => {
                let value = bus.read8(self.pc);
                self.pc += 1;
                value
            }
            LoadByteSource::HLI => bus.read8(self.registers.read16(U16Register::HL)),
        }
    }

    fn write_load_byte_target(&mut self, bus: &mut Bus, target: LoadByteTarget, value: u8) {
        match target {
            LoadByteTarget::Register(r) => self.registers.write8(r, value),
            LoadByteTarget::HLI => bus.write8(self.registers.read16(U16Register::HL), value),
        }
    }

    fn write_load_word_target(&mut self, target: LoadWordTarget, value: u16) {
        match target {
            LoadWordTarget::Register(r) => self.registers.write16(r, value),
            LoadWordTarget::SP => self.sp = value,
        }
    }

    fn load_arithmetic_operand(&mut self, bus: &Bus, operand: ArithmeticOperand) -> u8 {
        match operand {
            ArithmeticOperand::Register(r) => self.registers.read8(r),
            ArithmeticOperand::HLI => bus.read8(self.registers.read16(U16Register::HL)),
            ArithmeticOperand::D8 => {
                let d8 = bus.read8(self.pc);
                self.pc += 1;
                d8
            }
        }
    }

    fn load_non_direct_arithmetic_operand(&self, bus: &Bus, operand: NonDirectArithmeticOperand) -> u8 {
        match operand {
            NonDirectArithmeticOperand::Register(r) => self.registers.read8(r),
            NonDirectArithmeticOperand::HLI => bus.read8(self.registers.read16(U16Register::HL)),
        }
    }

    fn write_non_direct_arithmetic_operand(
        &mut self,
        bus: &mut Bus,
        operand: NonDirectArithmeticOperand,
        value: u8,
    ) {
        match operand {
            NonDirectArithmeticOperand::Register(r) => self.registers.write8(r, value),
            NonDirectArithmeticOperand::HLI => bus.write8(self.registers.read16(U16Register::HL), value),
        }
    }

    fn load_arithmetic_word_source(&self, source: ArithmeticWordSource) -> u16 {
        use U16Register::*;
        match source {
            ArithmeticWordSource::BC => self.registers.read16(BC),
            ArithmeticWordSource::DE => self.registers.read16(DE),
            ArithmeticWordSource::HL => self.registers.read16(HL),
            ArithmeticWordSource::SP => self.sp,
        }
    }

    fn load_inc_dec_16_operand(&self, operand: IncDec16Operand) -> u16 {
        match operand {
            IncDec16Operand::Register(rr) => self.registers.read16(rr),
            IncDec16Operand::SP => self.sp,
        }
    }

    fn write_inc_dec_16_operand(&mut self, operand: IncDec16Operand, value: u16) {
        match operand {
            IncDec16Operand::Register(rr) => self.registers.write16(rr, value),
            IncDec16Operand::SP => self.sp = value,
        }
    }

    fn test_jump_condition(&self, condition: JumpCondition) -> bool {
        use JumpCondition::*;
        match condition {
            Unconditional => true,
            NZ => self.registers.f & (Flag::Zero as u8) == 0,
            Z => self.registers.f & (Flag::Zero as u8) != 0,
            NC => self.registers.f & (Flag::Carry as u8) == 0,
            C => self.registers.f & (Flag::Carry as u8) != 0,
        }
    }

    fn push(&mut self, bus: &mut Bus, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        bus.write16(self.sp, value);
    }

    fn pop(&mut self, bus: &Bus) -> u16 {
        let value = bus.read16(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug)]
enum ArithmeticOperand {
    Register(U8Register),
    HLI,
    D8,
}

impl From<u8> for ArithmeticOperand {
    fn from(v: u8) -> Self {
        use ArithmeticOperand::*;
        use U8Register::*;
        match v & 0b111 {
            0b000 => Register(B),
            0b001 => Register(C),
            0b010 => Register(D),
            0b011 => Register(E),
            0b100 => Register(H),
            0b101 => Register(L),
            0b110 => HLI,
            0b111 => Register(A),
            _ => unreachable!(),
        }
    }
}

impl ArithmeticOperand {
    fn cycles(&self) -> usize {
        use ArithmeticOperand::*;
        match *self {
            Register(_) => 0,
            HLI => 4,
            D8 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum ArithmeticWordSource {
    BC,
    DE,
    HL,
    SP,
}

impl From<u8> for ArithmeticWordSource {
    fn from(v: u8) -> Self {
        use ArithmeticWordSource::*;
        match v & 0b11 {
            0b00 => BC,
            0b01 => DE,
            0b10 => HL,
            0b11 => SP,
            _ => unreachable!(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum NonDirectArithmeticOperand {
    Register(U8Register),
    HLI,
}

impl From<u8> for NonDirectArithmeticOperand {
    fn from(v: u8) -> Self {
        use NonDirectArithmeticOperand::*;
        use U8Register::*;
        match v & 0b111 {
            0b000 => Register(B),
            0b001 => Register(C),
            0b010 => Register(D),
            0b011 => Register(E),
            0b100 => Register(H),
            0b101 => Register(L),
            0b110 => HLI,
            0b111 => Register(A),
            _ => unreachable!(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadByteTarget {
    Register(U8Register),
    HLI,
}

impl From<u8> for LoadByteTarget {
    fn from(v: u8) -> Self {
        use LoadByteTarget::*;
        use U8Register::*;
        match v & 0b111 {
            0b000 => Register(B),
            0b001 => Register(C),
            0b010 => Register(D),
            0b011 => Register(E),
            0b100 => Register(H),
            0b101 => Register(L),
            0b110 => HLI,
            0b111 => Register(A),
            _ => unreachable!(),
        }
    }
}

impl LoadByteTarget {
    fn cycles(&self) -> usize {
        match self {
            LoadByteTarget::Register(_) => 0,
            LoadByteTarget::HLI => 4,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadWordTarget {
    Register(U16Register),
    SP,
}

impl From<u8> for LoadWordTarget {
    fn from(v: u8) -> Self {
        use LoadWordTarget::*;
        use U16Register::*;
        match v & 0b11 {
            0b00 => Register(BC),
            0b01 => Register(DE),
            0b10 => Register(HL),
            0b11 => SP,
            _ => unreachable!(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadByteSource {
    Register(U8Register),
    D8,
    HLI,
}

impl From<u8> for LoadByteSource {
    fn from(v: u8) -> Self {
        use LoadByteSource::*;
        use U8Register::*;
        match v & 0b111 {
            0b000 => Register(B),
            0b001 => Register(C),
            0b010 => Register(D),
            0b011 => Register(E),
            0b100 => Register(H),
            0b101 => Register(L),
            0b110 => HLI,
            0b111 => Register(A),
            _ => unreachable!(),
        }
    }
}

impl LoadByteSource {
    fn cycles(&self) -> usize {
        match self {
            LoadByteSource::Register(_) => 0,
            LoadByteSource::D8 => 4,
            LoadByteSource::HLI => 4,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadWordSource {
    D16,
    SP,
    HL,
}

impl LoadWordSource {
    fn cycles(&self) -> usize {
        match self {
            LoadWordSource::D16 => 4,
            LoadWordSource::SP => 0,
            LoadWordSource::HL => 0,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadIndirectByteOperand {
    Register(U16Register),
    HLIIncrementing,
    HLIDecrementing,
    Address,
}

impl From<u8> for LoadIndirectByteOperand {
    fn from(v: u8) -> Self {
        use LoadIndirectByteOperand::*;
        use U16Register::*;
        match v & 0b11 {
            0b00 => Register(BC),
            0b01 => Register(DE),
            0b10 => HLIIncrementing,
            0b11 => HLIDecrementing,
            _ => unreachable!(),
        }
    }
}

impl LoadIndirectByteOperand {
    fn cycles(&self) -> usize {
        match self {
            LoadIndirectByteOperand::Register(_) => 0,
            LoadIndirectByteOperand::HLIIncrementing => 0,
            LoadIndirectByteOperand::HLIDecrementing => 0,
            LoadIndirectByteOperand::Address => 8,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LoadType {
    Byte(LoadByteTarget, LoadByteSource),
    Word(LoadWordTarget, LoadWordSource),
    IndirectByteFromA(LoadIndirectByteOperand),
    IndirectByteToA(LoadIndirectByteOperand),
    IndirectWordFromSP,
}

#[derive(Copy, Clone, Debug)]
enum LdhOperand {
    I8,
    Ci,
}

impl LdhOperand {
    fn cycles(&self) -> usize {
        match self {
            LdhOperand::I8 => 8,
            LdhOperand::Ci => 4,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum LdhDirection {
    ToA,
    FromA,
}

#[derive(Copy, Clone, Debug)]
enum IncDecType {
    IncDec8(NonDirectArithmeticOperand),
    IncDec16(IncDec16Operand),
}

#[derive(Copy, Clone, Debug)]
enum IncDec16Operand {
    Register(U16Register),
    SP,
}

impl From<u8> for IncDec16Operand {
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0 => IncDec16Operand::Register(U16Register::BC),
            1 => IncDec16Operand::Register(U16Register::DE),
            2 => IncDec16Operand::Register(U16Register::HL),
            3 => IncDec16Operand::SP,
            _ => unreachable!(),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
enum Bit {
    B0 = 1,
    B1 = 2,
    B2 = 4,
    B3 = 8,
    B4 = 16,
    B5 = 32,
    B6 = 64,
    B7 = 128,
}

impl From<u8> for Bit {
    fn from(v: u8) -> Self {
        use Bit::*;
        match v & 0b111 {
            0 => B0,
            1 => B1,
            2 => B2,
            3 => B3,
            4 => B4,
            5 => B5,
            6 => B6,
            7 => B7,
            _ => unreachable!(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum JumpCondition {
    Unconditional,
    NZ,
    Z,
    NC,
    C,
}

#[derive(Copy, Clone, Debug)]
enum Instruction {
    NOP,
    ADD(ArithmeticOperand),
    ADC(ArithmeticOperand),
    SUB(ArithmeticOperand),
    SBC(ArithmeticOperand),
    AND(ArithmeticOperand),
    XOR(ArithmeticOperand),
    OR(ArithmeticOperand),
    CP(ArithmeticOperand),
    INC(IncDecType),
    DEC(IncDecType),
    ADD16(ArithmeticWordSource),
    ADD16SP,
    ADD16SPinHL,
    LD(LoadType),
    LDH(LdhOperand, LdhDirection),
    SWAP(NonDirectArithmeticOperand),
    BIT(Bit, NonDirectArithmeticOperand),
    RES(Bit, NonDirectArithmeticOperand),
    SET(Bit, NonDirectArithmeticOperand),
    RLCA,
    RLA,
    RL(NonDirectArithmeticOperand),
    RLC(NonDirectArithmeticOperand),
    RRCA,
    RRA,
    RR(NonDirectArithmeticOperand),
    RRC(NonDirectArithmeticOperand),
    SLA(NonDirectArithmeticOperand),
    SRA(NonDirectArithmeticOperand),
    SRL(NonDirectArithmeticOperand),
    DAA,
    CPL,
    SCF,
    CCF,
    JP(JumpCondition),
    JPHL,
    JR(JumpCondition),
    CALL(JumpCondition),
    RST(u8),
    RET(JumpCondition),
    RETI,
    PUSH(U16Register),
    POP(U16Register),
    DI,
    EI,
    HALT,
    STOP,
}

impl Instruction {
    fn from_byte(instruction_byte: u8, prefixed: bool) -> Option<Self> {
        if prefixed {
            Self::from_byte_prefixed(instruction_byte)
        } else {
            Self::from_byte_nonprefixed(instruction_byte)
        }
    }

    fn from_byte_prefixed(instruction_byte: u8) -> Option<Self> {
        let r = instruction_byte & 0b111;
        match instruction_byte {
            0x00..=0x07 => Some(Instruction::RLC(r.into())),
            0x08..=0x0F => Some(Instruction::RRC(r.into())),
            0x10..=0x17 => Some(Instruction::RL(r.into())),
            0x18..=0x1F => Some(Instruction::RR(r.into())),
            0x20..=0x27 => Some(Instruction::SLA(r.into())),
            0x28..=0x2F => Some(Instruction::SRA(r.into())),
            0x30..=0x37 => Some(Instruction::SWAP(r.into())),
            0x38..=0x3F => Some(Instruction::SRL(r.into())),
            0x40..=0x7F => {
                let bit = (instruction_byte & 0b0011_1000) >> 3;
                Some(Instruction::BIT(bit.into(), r.into()))
            }
            0x80..=0xBF => {
                let bit = (instruction_byte & 0b0011_1000) >> 3;
                Some(Instruction::RES(bit.into(), r.into()))
            }
            0xC0..=0xFF => {
                let bit = (instruction_byte & 0b0011_1000) >> 3;
                Some(Instruction::SET(bit.into(), r.into()))
            }
        }
    }

    fn from_byte_nonprefixed(instruction_byte: u8) -> Option<Self> {
        match instruction_byte {
            0x00 => Some(Instruction::NOP),
            0x10 => Some(Instruction::STOP),
            0b0000_0001..=0b0011_1111 if instruction_byte & 0b111 == 0b110 => {
                let to = (instruction_byte & 0b11_1000) >> 3;
                Some(Instruction::LD(LoadType::Byte(to.into(), LoadByteSource::D8)))
            }
            0b0000_0001..=0b0011_1111 if instruction_byte & 0b1111 == 0b0001 => {
                let to = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::LD(LoadType::Word(to.into(), LoadWordSource::D16)))
            }
            0b0000_0011..=0b0011_0011 if instruction_byte & 0b1111 == 0b0011 => {
                let r = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::INC(IncDecType::IncDec16(r.into())))
            }
            0b0000_1011..=0b0011_1011 if instruction_byte & 0b1111 == 0b1011 => {
                let r = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::DEC(IncDecType::IncDec16(r.into())))
            }
            0b0000_0100..=0b0011_1100 if instruction_byte & 0b111 == 0b100 => {
                let r = (instruction_byte & 0b11_1000) >> 3;
                Some(Instruction::INC(IncDecType::IncDec8(r.into())))
            }
            0b0000_0101..=0b0011_1101 if instruction_byte & 0b111 == 0b101 => {
                let r = (instruction_byte & 0b11_1000) >> 3;
                Some(Instruction::DEC(IncDecType::IncDec8(r.into())))
            }
            0b0000_1001..=0b0011_1001 if instruction_byte & 0b1111 == 0b1001 => {
                let r = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::ADD16(r.into()))
            }
            0x76 => Some(Instruction::HALT),
            0b0100_0000..=0b0111_1111 if instruction_byte != 0x76 => {
                let from = instruction_byte & 0b111;
                let to = (instruction_byte & 0b11_1000) >> 3;
                Some(Instruction::LD(LoadType::Byte(to.into(), from.into())))
            }
            0x02 | 0x12 | 0x22 | 0x32 => {
                let to = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::LD(LoadType::IndirectByteFromA(to.into())))
            }
            0x08 => Some(Instruction::LD(LoadType::IndirectWordFromSP)),
            0x0A | 0x1A | 0x2A | 0x3A => {
                let from = (instruction_byte & 0b11_0000) >> 4;
                Some(Instruction::LD(LoadType::IndirectByteToA(from.into())))
            }
            0x07 => Some(Instruction::RLCA),
            0x17 => Some(Instruction::RLA),
            0x0F => Some(Instruction::RRCA),
            0x1F => Some(Instruction::RRA),
            0x18 => Some(Instruction::JR(JumpCondition::Unconditional)),
            0x20 => Some(Instruction::JR(JumpCondition::NZ)),
            0x28 => Some(Instruction::JR(JumpCondition::Z)),
            0x30 => Some(Instruction::JR(JumpCondition::NC)),
            0x38 => Some(Instruction::JR(JumpCondition::C)),
            0x27 => Some(Instruction::DAA),
            0x2F => Some(Instruction::CPL),
            0x37 => Some(Instruction::SCF),
            0x3F => Some(Instruction::CCF),
            0x80..=0x87 => Some(Instruction::ADD((instruction_byte & 0b111).into())),
            0x88..=0x8F => Some(Instruction::ADC((instruction_byte & 0b111).into())),
            0x90..=0x97 => Some(Instruction::SUB((instruction_byte & 0b111).into())),
            0x98..=0x9F => Some(Instruction::SBC((instruction_byte & 0b111).into())),
            0xA0..=0xA7 => Some(Instruction::AND((instruction_byte & 0b111).into())),
            0xA8..=0xAF => Some(Instruction::XOR((instruction_byte & 0b111).into())),
            0xB0..=0xB7 => Some(Instruction::OR((instruction_byte & 0b111).into())),
            0xB8..=0xBF => Some(Instruction::CP((instruction_byte & 0b111).into())),
            0xC1 => Some(Instruction::POP(U16Register::BC)),
            0xD1 => Some(Instruction::POP(U16Register::DE)),
            0xE1 => Some(Instruction::POP(U16Register::HL)),
            0xF1 => Some(Instruction::POP(U16Register::AF)),
            0xC5 => Some(Instruction::PUSH(U16Register::BC)),
            0xD5 => Some(Instruction::PUSH(U16Register::DE)),
            0xE5 => Some(Instruction::PUSH(U16Register::HL)),
            0xF5 => Some(Instruction::PUSH(U16Register::AF)),
            0xC2 => Some(Instruction::JP(JumpCondition::NZ)),
            0xC3 => Some(Instruction::JP(JumpCondition::Unconditional)),
            0xCA => Some(Instruction::JP(JumpCondition::Z)),
            0xD2 => Some(Instruction::JP(JumpCondition::NC)),
            0xDA => Some(Instruction::JP(JumpCondition::C)),
            0xCD => Some(Instruction::CALL(JumpCondition::Unconditional)),
            0xC4 => Some(Instruction::CALL(JumpCondition::NZ)),
            0xCC => Some(Instruction::CALL(JumpCondition::Z)),
            0xD4 => Some(Instruction::CALL(JumpCondition::NC)),
            0xDC => Some(Instruction::CALL(JumpCondition::C)),
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let n = instruction_byte & 0x38;
                Some(Instruction::RST(n))
            }
            0xC9 => Some(Instruction::RET(JumpCondition::Unconditional)),
            0xC0 => Some(Instruction::RET(JumpCondition::NZ)),
            0xC8 => Some(Instruction::RET(JumpCondition::Z)),
            0xD0 => Some(Instruction::RET(JumpCondition::NC)),
            0xD8 => Some(Instruction::RET(JumpCondition::C)),
            0xD9 => Some(Instruction::RETI),
            0xE0 => Some(Instruction::LDH(LdhOperand::I8, LdhDirection::FromA)),
            0xF0 => Some(Instruction::LDH(LdhOperand::I8, LdhDirection::ToA)),
            0xE2 => Some(Instruction::LDH(LdhOperand::Ci, LdhDirection::FromA)),
            0xF2 => Some(Instruction::LDH(LdhOperand::Ci, LdhDirection::ToA)),
            0xF3 => Some(Instruction::DI),
            0xF8 => Some(Instruction::ADD16SPinHL),
            0xF9 => Some(Instruction::LD(LoadType::Word(LoadWordTarget::SP, LoadWordSource::HL))),
            0xFB => Some(Instruction::EI),
            0xC6 => Some(Instruction::ADD(ArithmeticOperand::D8)),
            0xCE => Some(Instruction::ADC(ArithmeticOperand::D8)),
            0xD6 => Some(Instruction::SUB(ArithmeticOperand::D8)),
            0xDE => Some(Instruction::SBC(ArithmeticOperand::D8)),
            0xE6 => Some(Instruction::AND(ArithmeticOperand::D8)),
            0xEE => Some(Instruction::XOR(ArithmeticOperand::D8)),
            0xF6 => Some(Instruction::OR(ArithmeticOperand::D8)),
            0xFE => Some(Instruction::CP(ArithmeticOperand::D8)),
            0xE8 => Some(Instruction::ADD16SP),
            0xE9 => Some(Instruction::JPHL),
            0xEA => Some(Instruction::LD(LoadType::IndirectByteFromA(LoadIndirectByteOperand::Address))),
            0xFA => Some(Instruction::LD(LoadType::IndirectByteToA(LoadIndirectByteOperand::Address))),
            // D3, DB, DD, E3, E4, EB, EC, ED, F4, FC, FD: unused opcodes.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Bus;

    fn bus_with(bytes: &[u8]) -> Bus {
        let mut rom = vec![0u8; 32 * 1024];
        rom[..bytes.len()].copy_from_slice(bytes);
        let cartridge = crate::cartridge::Cartridge::from_bytes(rom).unwrap();
        Bus::new(cartridge, None)
    }

    #[test]
    fn nop_takes_one_machine_cycle() {
        let mut cpu = Cpu::new();
        let mut bus = bus_with(&[0x00]);
        bus.interrupts.enable_immediately();
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc(), 1);
    }

    #[test]
    fn ld_a_immediate_takes_two_machine_cycles() {
        let mut cpu = Cpu::new();
        let mut bus = bus_with(&[0x3E, 0x42]);
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.registers.read8(U8Register::A), 0x42);
    }

    #[test]
    fn illegal_opcode_is_a_typed_error() {
        let mut cpu = Cpu::new();
        let mut bus = bus_with(&[0xD3]);
        let err = cpu.step(&mut bus).unwrap_err();
        assert!(matches!(err, CoreError::IllegalOpcode { opcode: 0xD3, pc: 0 }));
    }

    #[test]
    fn ei_takes_effect_after_following_instruction() {
        let mut cpu = Cpu::new();
        // EI; NOP; NOP
        let mut bus = bus_with(&[0xFB, 0x00, 0x00]);
        bus.interrupts.write_ie(0xFF);
        bus.interrupts.request(crate::interrupts::Interrupt::VBlank);
        cpu.step(&mut bus).unwrap(); // EI
        assert!(!bus.interrupts.ime());
        cpu.step(&mut bus).unwrap(); // NOP immediately after EI: not interrupted
        assert_eq!(cpu.pc(), 2);
        // now IME is live; the next step services the interrupt instead of
        // fetching the NOP at pc=2
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc(), 0x40);
        assert!(!bus.interrupts.ime());
    }

    #[test]
    fn daa_after_bcd_addition() {
        let mut cpu = Cpu::new();
        let mut bus = bus_with(&[]);
        cpu.registers.a = 0x45;
        cpu.registers.b = 0x38;
        let (sum, _) = cpu.registers.a.overflowing_add(cpu.registers.b);
        let half_carry = (0x45u8 & 0xF) + (0x38u8 & 0xF) > 0xF;
        cpu.registers.a = sum;
        cpu.registers.f = if half_carry { Flag::HalfCarry as u8 } else { 0 };
        let daa = cpu.execute(&mut bus, Instruction::DAA);
        assert_eq!(daa, 4);
        assert_eq!(cpu.registers.a, 0x83);
    }
}
