//! Lowers a checked AST into a 256-byte image for the accumulator machine.
//!
//! Generation runs in two passes. The first walks the AST and emits code,
//! leaving a placeholder wherever an operand names storage or a forward
//! branch target. The second appends the break byte, lays out every storage
//! slot after the code and backpatches all placeholders.
//!
//! Expressions are evaluated into the accumulator. Comparisons load the left
//! operand into X and compare it with the right operand in memory; `CPX` is
//! the only instruction that writes the zero flag, and `BNE` is the only
//! branch, so every other control flow shape is built out of those two.

use std::{fmt, format_args as f};

use crate::{
    ast::{Ast, AstKind, Info, Type},
    diagnostic::{Diagnostics, Stage},
    scope::{ScopeId, ScopeTree},
    tree::NodeId,
};

use self::{
    opcode::Opcode,
    statics::{relative, Contents, JumpId, JumpTable, SlotId, StaticTable},
};

pub mod opcode;
pub mod statics;

pub const IMAGE_SIZE: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Code and static data do not fit in the image.
    OutOfMemory { size: usize },
    /// The AST does not look like something the type checker accepted.
    Internal(Box<str>),
}

/// A program ready to be loaded at address zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    bytes: [u8; IMAGE_SIZE],
    code_len: usize,
    static_len: usize,
}

impl Image {
    pub fn bytes(&self) -> &[u8; IMAGE_SIZE] {
        &self.bytes
    }

    /// Code bytes, including the final break.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn static_len(&self) -> usize {
        self.static_len
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.bytes.chunks(16) {
            for (i, byte) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{byte:02X}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Generates the image of a program that passed semantic analysis.
pub fn generate(
    ast: &Ast,
    scopes: &ScopeTree,
    diagnostics: &mut Diagnostics,
) -> Result<Image, Error> {
    Generator::new(scopes, diagnostics).generate(ast)
}

struct Generator<'a> {
    scopes: &'a ScopeTree,
    diagnostics: &'a mut Diagnostics,
    code: Vec<u8>,
    statics: StaticTable,
    jumps: JumpTable,
    temps: usize,
    strings: usize,
}

impl<'a> Generator<'a> {
    fn new(scopes: &'a ScopeTree, diagnostics: &'a mut Diagnostics) -> Generator<'a> {
        Generator {
            scopes,
            diagnostics,
            code: Vec::with_capacity(IMAGE_SIZE),
            statics: StaticTable::new(),
            jumps: JumpTable::new(),
            temps: 0,
            strings: 0,
        }
    }

    fn generate(mut self, ast: &Ast) -> Result<Image, Error> {
        let root = ast
            .root()
            .ok_or_else(|| Error::Internal("empty program".into()))?;
        self.g_node(ast, root)?;
        self.op(Opcode::Brk);

        let code_len = self.code.len();
        let static_len = self.statics.size();
        let size = code_len + static_len;
        if size > IMAGE_SIZE {
            return Err(Error::OutOfMemory { size });
        }

        let mut bytes = [0; IMAGE_SIZE];
        bytes[..code_len].copy_from_slice(&self.code);
        self.jumps.fill(&mut bytes)?;
        self.statics.layout(code_len, &mut bytes, self.diagnostics)?;

        self.diagnostics.success(
            Stage::CodeGen,
            format!(
                "Code generation completed: {code_len} bytes of code, \
                 {static_len} bytes of static data"
            ),
        );
        Ok(Image {
            bytes,
            code_len,
            static_len,
        })
    }
}

/// Statements.
impl Generator<'_> {
    fn g_node(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        match &ast.label(id).kind {
            AstKind::Program | AstKind::Block => {
                for child in ast.children(id) {
                    self.g_node(ast, *child)?;
                }
                Ok(())
            }
            AstKind::VariableDeclaration => self.g_declaration(ast, id),
            AstKind::AssignmentStatement => self.g_assignment(ast, id),
            AstKind::PrintStatement => self.g_print(ast, id),
            AstKind::IfStatement => self.g_if(ast, id),
            AstKind::WhileStatement => self.g_while(ast, id),
            kind => Err(unexpected(kind)),
        }
    }

    fn g_declaration(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [ty, var] = children(ast, id)?;
        let AstKind::Type(ty) = ast.label(ty).kind else {
            return Err(unexpected(&ast.label(ty).kind));
        };
        let (name, info) = ident(ast, var)?;
        match self.scopes.lookup(info.scope, name) {
            Some((scope, symbol)) if scope == info.scope && symbol.ty == ty => (),
            _ => {
                return Err(Error::Internal(
                    format!("'{name}' is not declared in scope {}", info.scope).into(),
                ))
            }
        }

        let slot = self
            .statics
            .insert(slot_name(name, info.scope), Contents::Byte);
        if ty != Type::String {
            self.imm(Opcode::LdaImm, 0);
            self.abs(Opcode::StaAbs, slot);
        }
        Ok(())
    }

    fn g_assignment(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [target, value] = children(ast, id)?;
        let (slot, ty) = self.variable(ast, target)?;
        if ty == Type::String {
            let source = self.string_source(ast, value)?;
            self.statics.set_alias(slot, source);
            self.diagnostics.debug(
                Stage::CodeGen,
                format!(
                    "Aliased {} to {}",
                    self.statics.name(slot),
                    self.statics.name(source)
                ),
            );
        } else {
            self.load_acc(ast, value)?;
            self.abs(Opcode::StaAbs, slot);
        }
        Ok(())
    }

    /// A string print reads the alias chain as it stands at this statement,
    /// so later reassignments of the variable do not change what it shows.
    fn g_print(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [value] = children(ast, id)?;
        match self.type_of(ast, value)? {
            Type::Int => {
                match &ast.label(value).kind {
                    AstKind::Int(n) => self.imm(Opcode::LdyImm, *n),
                    AstKind::Id(_) => {
                        let (slot, _) = self.variable(ast, value)?;
                        self.abs(Opcode::LdyAbs, slot);
                    }
                    _ => {
                        let temp = self.spill(ast, value)?;
                        self.abs(Opcode::LdyAbs, temp);
                    }
                }
                self.imm(Opcode::LdxImm, 1);
            }
            Type::String => {
                let source = self.string_source(ast, value)?;
                let slot = self.statics.resolve(source)?;
                self.imm_addr(Opcode::LdyImm, slot);
                self.imm(Opcode::LdxImm, 2);
            }
            Type::Boolean => {
                if let Some(known) = self.constant(ast, value)? {
                    let text = self.bool_string(known);
                    self.imm_addr(Opcode::LdyImm, text);
                } else {
                    let slot = match &ast.label(value).kind {
                        AstKind::Id(_) => self.variable(ast, value)?.0,
                        _ => self.spill(ast, value)?,
                    };
                    let (yes, no) = (self.bool_string(true), self.bool_string(false));
                    self.imm(Opcode::LdxImm, 1);
                    self.abs(Opcode::CpxAbs, slot);
                    self.imm_addr(Opcode::LdyImm, no);
                    self.bne(2);
                    self.imm_addr(Opcode::LdyImm, yes);
                }
                self.imm(Opcode::LdxImm, 2);
            }
        }
        self.op(Opcode::Sys);
        Ok(())
    }

    fn g_if(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [cond, body] = children(ast, id)?;
        match self.constant(ast, cond)? {
            Some(true) => self.g_node(ast, body),
            Some(false) => {
                let skip = self.force_forward();
                self.g_node(ast, body)?;
                self.land(skip);
                Ok(())
            }
            None => {
                self.test(ast, cond)?;
                let skip = self.bne_forward();
                self.g_node(ast, body)?;
                self.land(skip);
                Ok(())
            }
        }
    }

    fn g_while(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [cond, body] = children(ast, id)?;
        match self.constant(ast, cond)? {
            Some(true) => {
                let start = self.here();
                self.g_node(ast, body)?;
                self.force_back(start);
            }
            Some(false) => {
                let skip = self.force_forward();
                self.g_node(ast, body)?;
                self.land(skip);
            }
            // With only `BNE` available, a `!=` guard is tested at the bottom
            // of the body, which is entered by jumping straight to the test.
            None if ast.label(cond).kind == AstKind::NotEquals => {
                let enter = self.force_forward();
                let start = self.here();
                self.g_node(ast, body)?;
                self.land(enter);
                self.compare(ast, cond)?;
                self.bne_back(start);
            }
            None => {
                let start = self.here();
                self.test(ast, cond)?;
                let exit = self.bne_forward();
                self.g_node(ast, body)?;
                self.force_back(start);
                self.land(exit);
            }
        }
        Ok(())
    }
}

/// Expressions.
impl Generator<'_> {
    /// Evaluates an int or boolean expression into the accumulator.
    fn load_acc(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        match &ast.label(id).kind {
            AstKind::Int(n) => self.imm(Opcode::LdaImm, *n),
            AstKind::Bool(b) => self.imm(Opcode::LdaImm, u8::from(*b)),
            AstKind::Id(_) => {
                let (slot, _) = self.variable(ast, id)?;
                self.abs(Opcode::LdaAbs, slot);
            }
            AstKind::Addition => {
                let [left, right] = children(ast, id)?;
                let temp = self.spill(ast, right)?;
                self.load_acc(ast, left)?;
                self.abs(Opcode::AdcAbs, temp);
            }
            kind @ (AstKind::Equals | AstKind::NotEquals) => {
                if let Some(value) = self.constant(ast, id)? {
                    self.imm(Opcode::LdaImm, u8::from(value));
                } else {
                    let equals = *kind == AstKind::Equals;
                    self.compare(ast, id)?;
                    let (hit, miss) = if equals { (1, 0) } else { (0, 1) };
                    self.imm(Opcode::LdaImm, miss);
                    self.bne(2);
                    self.imm(Opcode::LdaImm, hit);
                }
            }
            kind => return Err(unexpected(kind)),
        }
        Ok(())
    }

    /// Evaluates `id` and stores it in a fresh temporary.
    fn spill(&mut self, ast: &Ast, id: NodeId) -> Result<SlotId, Error> {
        self.load_acc(ast, id)?;
        let temp = self.temp();
        self.abs(Opcode::StaAbs, temp);
        Ok(temp)
    }

    /// Compares the operands of a non-constant `==` or `!=`, leaving the zero
    /// flag set exactly when they are equal.
    fn compare(&mut self, ast: &Ast, id: NodeId) -> Result<(), Error> {
        let [left, right] = children(ast, id)?;
        let right = match &ast.label(right).kind {
            AstKind::Id(_) => self.variable(ast, right)?.0,
            _ => self.spill(ast, right)?,
        };
        match &ast.label(left).kind {
            AstKind::Int(n) => self.imm(Opcode::LdxImm, *n),
            AstKind::Bool(b) => self.imm(Opcode::LdxImm, u8::from(*b)),
            AstKind::Id(_) => {
                let (slot, _) = self.variable(ast, left)?;
                self.abs(Opcode::LdxAbs, slot);
            }
            _ => {
                let temp = self.spill(ast, left)?;
                self.abs(Opcode::LdxAbs, temp);
            }
        }
        self.abs(Opcode::CpxAbs, right);
        Ok(())
    }

    /// Leaves the zero flag set exactly when the non-constant `cond` holds.
    fn test(&mut self, ast: &Ast, cond: NodeId) -> Result<(), Error> {
        if ast.label(cond).kind == AstKind::Equals {
            return self.compare(ast, cond);
        }
        let value = self.spill(ast, cond)?;
        self.imm(Opcode::LdxImm, 1);
        self.abs(Opcode::CpxAbs, value);
        Ok(())
    }

    /// Conditions decided without running any code: boolean literals and
    /// string comparisons.
    ///
    /// Strings are compared by where they came from. Two variables are equal
    /// when one was assigned, possibly through other variables, from the
    /// other; a literal is never equal to anything.
    fn constant(&self, ast: &Ast, cond: NodeId) -> Result<Option<bool>, Error> {
        let kind = &ast.label(cond).kind;
        match kind {
            AstKind::Bool(b) => Ok(Some(*b)),
            AstKind::Equals | AstKind::NotEquals => {
                let [left, right] = children(ast, cond)?;
                if self.type_of(ast, left)? != Type::String {
                    return Ok(None);
                }
                let same = match (self.string_var(ast, left)?, self.string_var(ast, right)?) {
                    (Some(a), Some(b)) => self.statics.reaches(a, b) || self.statics.reaches(b, a),
                    _ => false,
                };
                Ok(Some(same == (*kind == AstKind::Equals)))
            }
            _ => Ok(None),
        }
    }

    fn type_of(&self, ast: &Ast, id: NodeId) -> Result<Type, Error> {
        Ok(match &ast.label(id).kind {
            AstKind::Int(_) | AstKind::Addition => Type::Int,
            AstKind::Str(_) => Type::String,
            AstKind::Bool(_) | AstKind::Equals | AstKind::NotEquals => Type::Boolean,
            AstKind::Id(_) => ident(ast, id)?.1.ty,
            kind => return Err(unexpected(kind)),
        })
    }
}

/// Storage.
impl Generator<'_> {
    /// The slot of a declared variable, along with its type.
    fn variable(&self, ast: &Ast, id: NodeId) -> Result<(SlotId, Type), Error> {
        let (name, info) = ident(ast, id)?;
        let name = slot_name(name, info.scope);
        let slot = self
            .statics
            .get(&name)
            .ok_or_else(|| Error::Internal(format!("{name} has no storage").into()))?;
        Ok((slot, info.ty))
    }

    /// The string variable named by `id`, or `None` for a literal.
    fn string_var(&self, ast: &Ast, id: NodeId) -> Result<Option<SlotId>, Error> {
        match &ast.label(id).kind {
            AstKind::Str(_) => Ok(None),
            AstKind::Id(_) => Ok(Some(self.variable(ast, id)?.0)),
            kind => Err(unexpected(kind)),
        }
    }

    /// The slot a string value is read from: a variable's own slot, or a new
    /// slot holding a literal.
    fn string_source(&mut self, ast: &Ast, id: NodeId) -> Result<SlotId, Error> {
        if let AstKind::Str(s) = &ast.label(id).kind {
            let name = format!("$s{}", self.strings);
            self.strings += 1;
            return Ok(self.statics.insert(name, Contents::Str(s.clone())));
        }
        self.string_var(ast, id)?
            .ok_or_else(|| Error::Internal("expected a string".into()))
    }

    fn bool_string(&mut self, value: bool) -> SlotId {
        let (name, text) = if value {
            ("$true", "true")
        } else {
            ("$false", "false")
        };
        self.statics.insert(name, Contents::Str(text.into()))
    }

    fn temp(&mut self) -> SlotId {
        let name = format!("$t{}", self.temps);
        self.temps += 1;
        self.statics.insert(name, Contents::Byte)
    }
}

/// Emission.
impl Generator<'_> {
    fn here(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, bytes: &[u8], text: fmt::Arguments<'_>) -> usize {
        let at = self.here();
        self.code.extend_from_slice(bytes);
        self.diagnostics
            .debug(Stage::CodeGen, format!("${at:02X}: {text}"));
        at
    }

    fn op(&mut self, op: Opcode) {
        self.emit(&[op.byte()], f!("{op}"));
    }

    fn imm(&mut self, op: Opcode, value: u8) {
        self.emit(&[op.byte(), value], f!("{op} #${value:02X}"));
    }

    /// An immediate operand holding the address of `slot`.
    fn imm_addr(&mut self, op: Opcode, slot: SlotId) {
        let name = self.statics.name(slot).to_owned();
        let at = self.emit(&[op.byte(), 0], f!("{op} #{name}"));
        self.statics.patch(slot, at + 1);
    }

    fn abs(&mut self, op: Opcode, slot: SlotId) {
        let name = self.statics.name(slot).to_owned();
        let at = self.emit(&[op.byte(), 0, 0], f!("{op} {name}"));
        self.statics.patch(slot, at + 1);
    }

    fn bne(&mut self, offset: u8) {
        self.emit(&[Opcode::Bne.byte(), offset], f!("BNE +{offset}"));
    }

    fn bne_forward(&mut self) -> JumpId {
        let at = self.emit(&[Opcode::Bne.byte(), 0], f!("BNE (forward)"));
        self.jumps.add(at + 1)
    }

    fn bne_back(&mut self, target: usize) {
        let at = self.here();
        let offset = relative(at + 1, target);
        self.emit(&[Opcode::Bne.byte(), offset], f!("BNE ${target:02X}"));
    }

    fn land(&mut self, jump: JumpId) {
        self.jumps.land(jump, self.here());
    }

    /// Clears the zero flag by comparing 1 with a zeroed byte.
    fn clear_zero(&mut self) {
        let temp = self.temp();
        self.imm(Opcode::LdaImm, 0);
        self.abs(Opcode::StaAbs, temp);
        self.imm(Opcode::LdxImm, 1);
        self.abs(Opcode::CpxAbs, temp);
    }

    fn force_forward(&mut self) -> JumpId {
        self.clear_zero();
        self.bne_forward()
    }

    fn force_back(&mut self, target: usize) {
        self.clear_zero();
        self.bne_back(target);
    }
}

fn children<const N: usize>(ast: &Ast, id: NodeId) -> Result<[NodeId; N], Error> {
    <[NodeId; N]>::try_from(ast.children(id)).map_err(|_| {
        Error::Internal(format!("{} should have {N} children", ast.label(id)).into())
    })
}

fn ident(ast: &Ast, id: NodeId) -> Result<(char, Info), Error> {
    let node = ast.label(id);
    let AstKind::Id(name) = node.kind else {
        return Err(unexpected(&node.kind));
    };
    let info = node
        .info
        .ok_or_else(|| Error::Internal(format!("'{name}' was never resolved").into()))?;
    Ok((name, info))
}

fn slot_name(name: char, scope: ScopeId) -> String {
    format!("{name}@{scope}")
}

fn unexpected(kind: &AstKind) -> Error {
    Error::Internal(format!("unexpected {kind} node").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{util::test_utils::analyze, vm};
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> (Result<Image, Error>, Diagnostics) {
        let (ast, analysis, _) = analyze(src);
        assert!(analysis.is_ok(), "{:?}", analysis.errors);
        let mut diagnostics = Diagnostics::new();
        (generate(&ast, &analysis.scopes, &mut diagnostics), diagnostics)
    }

    #[track_caller]
    fn image(src: &str) -> Image {
        compile(src).0.expect("program should fit")
    }

    #[track_caller]
    fn output(src: &str) -> String {
        vm::run(&image(src)).expect("program should halt")
    }

    #[test]
    fn declaration_assignment_and_print() {
        let image = image("{int a a = 1 print(a)}$");
        assert_eq!(
            &image.bytes()[..18],
            &[
                0xA9, 0x00, 0x8D, 0x11, 0x00, // a = 0
                0xA9, 0x01, 0x8D, 0x11, 0x00, // a = 1
                0xAC, 0x11, 0x00, 0xA2, 0x01, 0xFF, // print(a)
                0x00, // break
                0x00, // a
            ]
        );
        assert_eq!((image.code_len(), image.static_len()), (17, 1));
    }

    #[test]
    fn string_literal_after_code() {
        let image = image(r#"{print("hi")}$"#);
        assert_eq!(
            &image.bytes()[..9],
            &[0xA0, 0x06, 0xA2, 0x02, 0xFF, 0x00, b'h', b'i', 0x00]
        );
    }

    #[test]
    fn strings_are_never_stored_by_value() {
        let image = image(r#"{string s s = "ab" print(s)}$"#);
        assert_eq!(
            &image.bytes()[..9],
            &[0xA0, 0x06, 0xA2, 0x02, 0xFF, 0x00, b'a', b'b', 0x00]
        );
    }

    #[test]
    fn arithmetic() {
        assert_eq!(output("{print(1 + 2 + 3)}$"), "6");
        assert_eq!(output("{int a a = 4 a = 1 + a print(a)}$"), "5");
        assert_eq!(output("{int a a = 200 + 100 print(a)}$"), "44");
    }

    #[test]
    fn comparisons_as_values() {
        assert_eq!(output("{print((1 == 1)) print((1 == 2))}$"), "truefalse");
        assert_eq!(output("{print((1 != 1)) print((1 != 2))}$"), "falsetrue");
        assert_eq!(
            output("{boolean b b = (3 == 1 + 2) print(b) print(true)}$"),
            "truetrue"
        );
        assert_eq!(output("{print(((1 == 2) == false))}$"), "true");
    }

    #[test]
    fn if_statements() {
        assert_eq!(output("{int a a = 2 if (a == 2) {print(1)} print(2)}$"), "12");
        assert_eq!(output("{int a a = 3 if (a == 2) {print(1)} print(2)}$"), "2");
        assert_eq!(output("{int a a = 3 if (a != 2) {print(1)} print(2)}$"), "12");
        assert_eq!(output("{if true {print(1)} if false {print(2)}}$"), "1");
    }

    #[test]
    fn while_statements() {
        assert_eq!(
            output("{int i i = 0 while (i != 3) {print(i) i = 1 + i}}$"),
            "012"
        );
        assert_eq!(
            output("{int i i = 5 while (i != 5) {print(i)} print(9)}$"),
            "9"
        );
        assert_eq!(
            output("{boolean d d = false while (d == false) {print(1) d = true}}$"),
            "1"
        );
        assert_eq!(output("{while false {print(1)} print(2)}$"), "2");
    }

    #[test]
    fn infinite_loop_branches_back() {
        let image = image("{while true {print(1)}}$");
        let result = vm::Vm::new(&image).run(1000);
        assert_eq!(result, Err(vm::Error::StepLimit(1000)));
    }

    #[test]
    fn string_equality_by_provenance() {
        assert_eq!(
            output(r#"{string a a = "hi" string b b = a if (a == b) {print(a)}}$"#),
            "hi"
        );
        assert_eq!(
            output(r#"{string a a = "hi" string b b = "hi" if (a == b) {print(1)}}$"#),
            ""
        );
        assert_eq!(output(r#"{string a a = "x" print((a == "x"))}$"#), "false");
        assert_eq!(output(r#"{string a print((a != a))}$"#), "false");
    }

    #[test]
    fn reassigned_strings_print_in_order() {
        assert_eq!(
            output(r#"{string a a = "one" print(a) a = "two" print(a)}$"#),
            "onetwo"
        );
        assert_eq!(output(r#"{string a a = "q" a = a print(a)}$"#), "q");
    }

    #[test]
    fn shadowed_variables_have_separate_storage() {
        assert_eq!(
            output("{int a a = 1 {int a a = 2 print(a)} print(a)}$"),
            "21"
        );
    }

    #[test]
    fn out_of_memory() {
        let src = format!("{{print(\"{}\")}}$", "a".repeat(260));
        let (result, _) = compile(&src);
        assert_eq!(result, Err(Error::OutOfMemory { size: 267 }));
    }

    #[test]
    fn reports_sizes() {
        let (result, diagnostics) = compile(r#"{print("hi")}$"#);
        assert!(result.is_ok());
        let last = diagnostics.iter().last().map(|d| d.message.as_str());
        assert_eq!(
            last,
            Some("Code generation completed: 6 bytes of code, 3 bytes of static data")
        );
    }

    #[test]
    fn image_display() {
        let image = image("{}$");
        let text = image.to_string();
        assert_eq!(text.lines().count(), 16);
        assert!(text
            .lines()
            .all(|line| line == "00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00"));
    }
}
