use super::interpreter::{Ctx, SpecInterpreter, interpret};
use super::writer::Spec;
use crate::qualifier::Qualifier;

/// A human-readable disassembly of a spec instruction stream: one line per
/// instruction, `[index] opcode (operand, ...) @pos`, headed by an
/// instruction count. Diagnostics only — not a format anything reads back.
pub fn disassemble(spec: &Spec) -> String {
    let mut interp = Disassembler::default();
    interpret(spec, &mut interp);
    interp.result
}

#[derive(Default)]
struct Disassembler {
    result: String,
    instruction: usize,
}

impl Disassembler {
    fn line(&mut self, ctx: Ctx, body: std::fmt::Arguments) {
        self.result.push_str(&format!("\n[{}] {body} @{}", self.instruction, ctx.pos));
        self.instruction += 1;
    }
}

impl SpecInterpreter for Disassembler {
    fn shutdown(&mut self) {
        self.result = format!("spec disassembly ({} insts)", self.instruction) + &self.result;
    }

    fn on_close(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("close"));
    }
    fn on_alternative(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("alternative"));
    }
    fn on_lpr_decl(&mut self, ctx: Ctx, name: &str) {
        self.line(ctx, format_args!("lpr_decl ('{name}')"));
    }
    fn on_ppr_decl(&mut self, ctx: Ctx, name: &str) {
        self.line(ctx, format_args!("ppr_decl ('{name}')"));
    }
    fn on_lpr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {
        self.line(ctx, format_args!("lpr ('{name}', {qualifier})"));
    }
    fn on_ppr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {
        self.line(ctx, format_args!("ppr ('{name}', {qualifier})"));
    }
    fn on_end(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("end"));
    }
    fn on_any(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("any"));
    }
    fn on_string(&mut self, ctx: Ctx, text: &str) {
        self.line(ctx, format_args!("string ('{text}')"));
    }
    fn on_charset(&mut self, ctx: Ctx, text: &str) {
        self.line(ctx, format_args!("charset ('{text}')"));
    }
    fn on_token(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("token"));
    }
    fn on_failure(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("failure"));
    }
    fn on_name(&mut self, ctx: Ctx, name: &str) {
        self.line(ctx, format_args!("name ('{name}')"));
    }
    fn on_sequence(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("sequence"));
    }
    fn on_lookahead(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("lookahead"));
    }
    fn on_lookahead_not(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("lookahead_not"));
    }
    fn on_not(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("not"));
    }
    fn on_optional(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("optional"));
    }
    fn on_kleene_star(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("kleene_star"));
    }
    fn on_kleene_plus(&mut self, ctx: Ctx) {
        self.line(ctx, format_args!("kleene_plus"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecWriter;

    #[test]
    fn disassembly_counts_every_non_pos_instruction() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).string("abc").close();
        let spec = w.done();

        let out = disassemble(&spec);
        assert!(out.starts_with("spec disassembly (4 insts)"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn disassembly_snapshot() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).string("abc").close();
        let spec = w.done();

        insta::assert_snapshot!(disassemble(&spec), @r"
        spec disassembly (4 insts)
        [0] lpr_decl ('f') @0
        [1] lpr ('f', none) @0
        [2] string ('abc') @0
        [3] close @0
        ");
    }
}
