//! Reference interpreter for generated images.
use std::fmt::Write;

use log::trace;

use crate::codegen::{opcode::Opcode, Image, IMAGE_SIZE};

/// Instructions executed by [`run`] before giving up.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    InvalidOpcode { opcode: u8, at: u8 },
    StepLimit(usize),
}

/// Runs `image` from address zero until it breaks, returning what it printed.
pub fn run(image: &Image) -> Result<String, Error> {
    let mut vm = Vm::new(image);
    vm.run(DEFAULT_STEP_LIMIT)?;
    Ok(vm.output)
}

pub struct Vm {
    memory: [u8; IMAGE_SIZE],
    pc: u8,
    a: u8,
    x: u8,
    y: u8,
    zero: bool,
    steps: usize,
    halted: bool,
    output: String,
}

impl Vm {
    pub fn new(image: &Image) -> Vm {
        Vm {
            memory: *image.bytes(),
            pc: 0,
            a: 0,
            x: 0,
            y: 0,
            zero: false,
            steps: 0,
            halted: false,
            output: String::new(),
        }
    }

    /// Steps until a break, or fails once `limit` instructions have run.
    pub fn run(&mut self, limit: usize) -> Result<(), Error> {
        while !self.halted {
            if self.steps >= limit {
                return Err(Error::StepLimit(limit));
            }
            self.step()?;
        }
        Ok(())
    }

    /// Executes one instruction.
    pub fn step(&mut self) -> Result<(), Error> {
        let at = self.pc;
        let byte = self.memory[usize::from(at)];
        let op = Opcode::from_byte(byte).ok_or(Error::InvalidOpcode { opcode: byte, at })?;
        let operand = self.read(at.wrapping_add(1));
        trace!(target: "blockc::vm", "{at:02X}: {op} {operand:02X}");
        self.steps += 1;
        self.pc = at.wrapping_add(op.len() as u8);

        match op {
            // A9 (LDA #)
            Opcode::LdaImm => self.a = operand,
            // AD (LDA abs)
            Opcode::LdaAbs => self.a = self.read(operand),
            // 8D (STA abs)
            Opcode::StaAbs => self.memory[usize::from(operand)] = self.a,
            // 6D (ADC abs)
            //
            // There is no carry flag; the sum wraps.
            Opcode::AdcAbs => self.a = self.a.wrapping_add(self.read(operand)),
            // A2 (LDX #)
            Opcode::LdxImm => self.x = operand,
            // AE (LDX abs)
            Opcode::LdxAbs => self.x = self.read(operand),
            // A0 (LDY #)
            Opcode::LdyImm => self.y = operand,
            // AC (LDY abs)
            Opcode::LdyAbs => self.y = self.read(operand),
            // EC (CPX abs)
            Opcode::CpxAbs => self.zero = self.x == self.read(operand),
            // D0 (BNE rel)
            //
            // Relative to the following instruction, wrapping around memory.
            Opcode::Bne => {
                if !self.zero {
                    self.pc = self.pc.wrapping_add(operand);
                }
            }
            // FF (SYS)
            Opcode::Sys => self.syscall(),
            // 00 (BRK)
            Opcode::Brk => self.halted = true,
        }
        Ok(())
    }

    fn syscall(&mut self) {
        match self.x {
            1 => {
                let _ = write!(self.output, "{}", self.y);
            }
            2 => {
                let mut at = self.y;
                for _ in 0..IMAGE_SIZE {
                    let byte = self.read(at);
                    if byte == 0 {
                        break;
                    }
                    self.output.push(char::from(byte));
                    at = at.wrapping_add(1);
                }
            }
            mode => trace!(target: "blockc::vm", "ignoring system call {mode}"),
        }
    }

    fn read(&self, address: u8) -> u8 {
        self.memory[usize::from(address)]
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn registers(&self) -> (u8, u8, u8) {
        (self.a, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diagnostic::Diagnostics, util::test_utils::analyze};
    use pretty_assertions::assert_eq;

    fn load(src: &str) -> Vm {
        let (ast, analysis, _) = analyze(src);
        let image = crate::codegen::generate(&ast, &analysis.scopes, &mut Diagnostics::new())
            .expect("program should fit");
        Vm::new(&image)
    }

    #[test]
    fn halts_on_break() {
        let mut vm = load("{}$");
        assert_eq!(vm.run(10), Ok(()));
        assert!(vm.is_halted());
        assert_eq!(vm.steps(), 1);
    }

    #[test]
    fn registers_after_print() {
        let mut vm = load("{print(7)}$");
        assert_eq!(vm.run(10), Ok(()));
        assert_eq!(vm.output(), "7");
        assert_eq!(vm.registers(), (0, 1, 7));
    }

    #[test]
    fn invalid_opcode() {
        let mut vm = load(r#"{print("h")}$"#);
        vm.pc = 6;
        assert_eq!(
            vm.run(10),
            Err(Error::InvalidOpcode {
                opcode: b'h',
                at: 6
            })
        );
    }
}
