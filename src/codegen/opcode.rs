use std::fmt;

/// The instruction set of the target machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `LDA #imm`
    LdaImm,
    /// `LDA abs`
    LdaAbs,
    /// `STA abs`
    StaAbs,
    /// `ADC abs`, without carry.
    AdcAbs,
    /// `LDX #imm`
    LdxImm,
    /// `LDX abs`
    LdxAbs,
    /// `LDY #imm`
    LdyImm,
    /// `LDY abs`
    LdyAbs,
    /// `CPX abs`, the only instruction that writes the zero flag.
    CpxAbs,
    /// `BNE rel`
    Bne,
    /// `SYS`, prints the integer in Y if X is 1 or the string at Y if X is 2.
    Sys,
    /// `BRK`
    Brk,
}

/// How many operand bytes follow an opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    None,
    Immediate,
    /// Little endian; the high byte is always zero.
    Absolute,
    Relative,
}

impl Operand {
    pub const fn len(self) -> usize {
        match self {
            Operand::None => 0,
            Operand::Immediate | Operand::Relative => 1,
            Operand::Absolute => 2,
        }
    }
}

impl Opcode {
    pub const ALL: [Opcode; 12] = [
        Opcode::LdaImm,
        Opcode::LdaAbs,
        Opcode::StaAbs,
        Opcode::AdcAbs,
        Opcode::LdxImm,
        Opcode::LdxAbs,
        Opcode::LdyImm,
        Opcode::LdyAbs,
        Opcode::CpxAbs,
        Opcode::Bne,
        Opcode::Sys,
        Opcode::Brk,
    ];

    pub const fn byte(self) -> u8 {
        match self {
            Opcode::LdaImm => 0xA9,
            Opcode::LdaAbs => 0xAD,
            Opcode::StaAbs => 0x8D,
            Opcode::AdcAbs => 0x6D,
            Opcode::LdxImm => 0xA2,
            Opcode::LdxAbs => 0xAE,
            Opcode::LdyImm => 0xA0,
            Opcode::LdyAbs => 0xAC,
            Opcode::CpxAbs => 0xEC,
            Opcode::Bne => 0xD0,
            Opcode::Sys => 0xFF,
            Opcode::Brk => 0x00,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.byte() == byte)
    }

    pub const fn operand(self) -> Operand {
        match self {
            Opcode::LdaImm | Opcode::LdxImm | Opcode::LdyImm => Operand::Immediate,
            Opcode::LdaAbs
            | Opcode::StaAbs
            | Opcode::AdcAbs
            | Opcode::LdxAbs
            | Opcode::LdyAbs
            | Opcode::CpxAbs => Operand::Absolute,
            Opcode::Bne => Operand::Relative,
            Opcode::Sys | Opcode::Brk => Operand::None,
        }
    }

    /// Opcode plus operand bytes.
    pub const fn len(self) -> usize {
        1 + self.operand().len()
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LdaImm | Opcode::LdaAbs => "LDA",
            Opcode::StaAbs => "STA",
            Opcode::AdcAbs => "ADC",
            Opcode::LdxImm | Opcode::LdxAbs => "LDX",
            Opcode::LdyImm | Opcode::LdyAbs => "LDY",
            Opcode::CpxAbs => "CPX",
            Opcode::Bne => "BNE",
            Opcode::Sys => "SYS",
            Opcode::Brk => "BRK",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_unique_and_decode() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
        }
        assert_eq!(Opcode::from_byte(0xEA), None);
    }

    #[test]
    fn lengths() {
        assert_eq!(Opcode::LdaImm.len(), 2);
        assert_eq!(Opcode::StaAbs.len(), 3);
        assert_eq!(Opcode::Bne.len(), 2);
        assert_eq!(Opcode::Sys.len(), 1);
    }
}
