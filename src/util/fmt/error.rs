use std::fmt::{self, Display, Formatter};

use crate::{codegen, lexer, parser, token::Spanned, type_checker, vm};

/// The alternate form (`{:#}`) prefixes the message with its position.
impl<T: Display> Display for Spanned<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Spanned { pos, inner } = self;
        if f.alternate() {
            write!(f, "{pos}: ")?;
        }
        write!(f, "{inner}")
    }
}

impl Display for lexer::Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use lexer::Error::*;
        match self {
            Unknown(text) => write!(f, "Unknown token [ {text} ]"),
            InvalidInString(text) => write!(
                f,
                "Invalid token [ {} ] in string, only letters and spaces are allowed",
                text.escape_debug()
            ),
        }
    }
}

impl Display for lexer::Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use lexer::Warning::*;
        match self {
            UnterminatedComment => write!(f, "Unterminated comment"),
            UnterminatedString => write!(f, "Unterminated string"),
            MissingEop => write!(f, "Missing end of program marker ($), added one"),
        }
    }
}

impl Display for parser::Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use parser::Error::*;
        match self {
            Expected { expected, found } => write!(f, "Expected {expected}, found [ {found} ]"),
            UnexpectedToken(found) => write!(f, "Unexpected token [ {found} ]"),
            UnexpectedInExpr(found) => write!(f, "Unexpected token in expression [ {found} ]"),
            UnexpectedInString(found) => write!(f, "Unexpected token in string [ {found} ]"),
            IntOutOfRange(text) => write!(f, "Integer literal {text} does not fit in one byte"),
        }
    }
}

impl Display for parser::Expected {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use parser::Expected::*;
        f.write_str(match self {
            BlockStart => "{ at start of block",
            BlockEnd => "} at end of block",
            Eop => "end of program ($)",
            PrintOpen => "( after print",
            ExprClose => ") after expression",
            Assign => "= in assignment",
            VarName => "variable name",
            BoolExprOpen => "( in boolean expression",
            BoolOp => "== or != in boolean expression",
            BoolExprClose => ") in boolean expression",
        })
    }
}

impl Display for type_checker::Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use type_checker::Error::*;
        match self {
            Redeclared { name, previous } => write!(
                f,
                "Variable '{name}' already declared in this scope at {previous}"
            ),
            UndeclaredAssignment(name) => write!(f, "Assignment to undeclared variable '{name}'"),
            Undeclared(name) => write!(f, "Variable '{name}' used but never declared"),
            AssignmentMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "Type mismatch: cannot assign {found} to '{name}' of type {expected}"
            ),
            AdditionMismatch(found) => write!(f, "Type mismatch: cannot add {found} to int"),
            ComparisonMismatch { left, right } => {
                write!(f, "Type mismatch: cannot compare {left} with {right}")
            }
        }
    }
}

impl Display for type_checker::Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use type_checker::Warning::*;
        match self {
            Unused(name) => write!(f, "Variable '{name}' declared but never used"),
            UsedBeforeInit(name) => write!(f, "Variable '{name}' used before being initialized"),
            InitializedButUnused(name) => write!(
                f,
                "Variable '{name}' declared and initialized but never used"
            ),
        }
    }
}

impl Display for codegen::Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use codegen::Error::*;
        match self {
            OutOfMemory { size } => write!(
                f,
                "Out of memory: the program needs {size} bytes but only {} are available",
                codegen::IMAGE_SIZE
            ),
            Internal(message) => write!(f, "Internal error: {message}"),
        }
    }
}

impl Display for vm::Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use vm::Error::*;
        match self {
            InvalidOpcode { opcode, at } => {
                write!(f, "invalid opcode {opcode:02X} at address {at:02X}")
            }
            StepLimit(limit) => write!(f, "step limit of {limit} instructions exceeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    #[test]
    fn alternate_prefixes_position() {
        let error = Pos::new(3, 4).wrap(lexer::Error::Unknown("#".into()));
        assert_eq!(error.to_string(), "Unknown token [ # ]");
        assert_eq!(format!("{error:#}"), "3:4: Unknown token [ # ]");
    }

    #[test]
    fn invalid_in_string_escapes_newlines() {
        let error = lexer::Error::InvalidInString("\n".into());
        assert_eq!(
            error.to_string(),
            "Invalid token [ \\n ] in string, only letters and spaces are allowed"
        );
    }
}
