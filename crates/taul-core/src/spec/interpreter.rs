use super::opcode::{Instr, Opcode};
use super::writer::Spec;
use crate::qualifier::Qualifier;

/// Everything a hook needs besides the instruction's own operands: the
/// instruction's tagged source position and a single-token lookahead at the
/// next instruction's opcode, if any. Used by the validator and lowerer to
/// make decisions that depend on what immediately follows (e.g. whether a
/// `lookahead` scope is about to close).
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub pos: u32,
    pub next: Option<Opcode>,
}

/// One variant per instruction, used by consumers (disassemblers, tests)
/// that want to inspect a spec's event stream without implementing the
/// [`SpecInterpreter`] trait.
#[derive(Debug, Clone, Copy)]
pub enum SpecEvent<'a> {
    Startup,
    Instruction { instr: &'a Instr, ctx: Ctx },
    Shutdown,
}

/// A typed double-dispatch visitor over a spec's instruction stream. Every
/// phase that walks a spec (validator, lowerer, parse-table builder,
/// disassembler) implements this trait; adding a 22nd opcode is a
/// compile-time prompt to extend every implementor since none of the
/// methods carry a default beyond no-op.
///
/// `interpret` drives exactly one [`startup`](Self::startup)/
/// [`shutdown`](Self::shutdown) bookend pair around one call per
/// instruction.
#[allow(unused_variables)]
pub trait SpecInterpreter {
    fn startup(&mut self) {}
    fn shutdown(&mut self) {}

    fn on_close(&mut self, ctx: Ctx) {}
    fn on_alternative(&mut self, ctx: Ctx) {}
    fn on_lpr_decl(&mut self, ctx: Ctx, name: &str) {}
    fn on_ppr_decl(&mut self, ctx: Ctx, name: &str) {}
    fn on_lpr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {}
    fn on_ppr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {}
    fn on_end(&mut self, ctx: Ctx) {}
    fn on_any(&mut self, ctx: Ctx) {}
    fn on_string(&mut self, ctx: Ctx, text: &str) {}
    fn on_charset(&mut self, ctx: Ctx, text: &str) {}
    fn on_token(&mut self, ctx: Ctx) {}
    fn on_failure(&mut self, ctx: Ctx) {}
    fn on_name(&mut self, ctx: Ctx, name: &str) {}
    fn on_sequence(&mut self, ctx: Ctx) {}
    fn on_lookahead(&mut self, ctx: Ctx) {}
    fn on_lookahead_not(&mut self, ctx: Ctx) {}
    fn on_not(&mut self, ctx: Ctx) {}
    fn on_optional(&mut self, ctx: Ctx) {}
    fn on_kleene_star(&mut self, ctx: Ctx) {}
    fn on_kleene_plus(&mut self, ctx: Ctx) {}
}

/// Walks `spec` once, front to back, issuing `startup`, one hook call per
/// non-`Pos` instruction (each tagged with the most recent `pos(new_pos)`
/// value, default 0), and `shutdown`.
pub fn interpret(spec: &Spec, visitor: &mut impl SpecInterpreter) {
    visitor.startup();
    let instrs = spec.instrs();
    let mut pos: u32 = 0;
    for (i, instr) in instrs.iter().enumerate() {
        if let Instr::Pos(p) = instr {
            pos = *p;
            continue;
        }
        let next = instrs[i + 1..]
            .iter()
            .find_map(|nxt| if matches!(nxt, Instr::Pos(_)) { None } else { Some(nxt.opcode()) });
        let ctx = Ctx { pos, next };
        dispatch(visitor, instr, ctx);
    }
    visitor.shutdown();
}

fn dispatch(visitor: &mut impl SpecInterpreter, instr: &Instr, ctx: Ctx) {
    match instr {
        Instr::Pos(_) => unreachable!("Pos instructions are consumed by interpret, not dispatched"),
        Instr::Close => visitor.on_close(ctx),
        Instr::Alternative => visitor.on_alternative(ctx),
        Instr::LprDecl(name) => visitor.on_lpr_decl(ctx, name),
        Instr::PprDecl(name) => visitor.on_ppr_decl(ctx, name),
        Instr::Lpr(name, q) => visitor.on_lpr(ctx, name, *q),
        Instr::Ppr(name, q) => visitor.on_ppr(ctx, name, *q),
        Instr::End => visitor.on_end(ctx),
        Instr::Any => visitor.on_any(ctx),
        Instr::String(s) => visitor.on_string(ctx, s),
        Instr::Charset(s) => visitor.on_charset(ctx, s),
        Instr::Token => visitor.on_token(ctx),
        Instr::Failure => visitor.on_failure(ctx),
        Instr::Name(name) => visitor.on_name(ctx, name),
        Instr::Sequence => visitor.on_sequence(ctx),
        Instr::Lookahead => visitor.on_lookahead(ctx),
        Instr::LookaheadNot => visitor.on_lookahead_not(ctx),
        Instr::Not => visitor.on_not(ctx),
        Instr::Optional => visitor.on_optional(ctx),
        Instr::KleeneStar => visitor.on_kleene_star(ctx),
        Instr::KleenePlus => visitor.on_kleene_plus(ctx),
    }
}
