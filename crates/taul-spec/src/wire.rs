//! Encode/decode between a [`taul_core::Spec`] and the binary record
//! stream of spec.md §6: `opcode(u8) | operand_region`, operand regions
//! fixed per opcode, strings length-prefixed (`u32` LE length + UTF-8
//! bytes).

use taul_core::{Instr, Opcode, Qualifier, Spec, SpecWriter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of input while decoding opcode")]
    TruncatedOpcode,
    #[error("unknown opcode byte {0}")]
    UnknownOpcode(u8),
    #[error("unexpected end of input while decoding a {0}-byte operand")]
    TruncatedOperand(&'static str),
    #[error("string operand is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown qualifier byte {0}")]
    UnknownQualifier(u8),
}

fn opcode_byte(op: Opcode) -> u8 {
    match op {
        Opcode::Pos => 0,
        Opcode::Close => 1,
        Opcode::Alternative => 2,
        Opcode::LprDecl => 3,
        Opcode::PprDecl => 4,
        Opcode::Lpr => 5,
        Opcode::Ppr => 6,
        Opcode::End => 7,
        Opcode::Any => 8,
        Opcode::String => 9,
        Opcode::Charset => 10,
        Opcode::Token => 11,
        Opcode::Failure => 12,
        Opcode::Name => 13,
        Opcode::Sequence => 14,
        Opcode::Lookahead => 15,
        Opcode::LookaheadNot => 16,
        Opcode::Not => 17,
        Opcode::Optional => 18,
        Opcode::KleeneStar => 19,
        Opcode::KleenePlus => 20,
    }
}

fn byte_opcode(b: u8) -> Result<Opcode, WireError> {
    Ok(match b {
        0 => Opcode::Pos,
        1 => Opcode::Close,
        2 => Opcode::Alternative,
        3 => Opcode::LprDecl,
        4 => Opcode::PprDecl,
        5 => Opcode::Lpr,
        6 => Opcode::Ppr,
        7 => Opcode::End,
        8 => Opcode::Any,
        9 => Opcode::String,
        10 => Opcode::Charset,
        11 => Opcode::Token,
        12 => Opcode::Failure,
        13 => Opcode::Name,
        14 => Opcode::Sequence,
        15 => Opcode::Lookahead,
        16 => Opcode::LookaheadNot,
        17 => Opcode::Not,
        18 => Opcode::Optional,
        19 => Opcode::KleeneStar,
        20 => Opcode::KleenePlus,
        other => return Err(WireError::UnknownOpcode(other)),
    })
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn encode_instr(instr: &Instr, buf: &mut Vec<u8>) {
    buf.push(opcode_byte(instr.opcode()));
    match instr {
        Instr::Pos(p) => buf.extend_from_slice(&p.to_le_bytes()),
        Instr::Close
        | Instr::Alternative
        | Instr::End
        | Instr::Any
        | Instr::Token
        | Instr::Failure
        | Instr::Sequence
        | Instr::Lookahead
        | Instr::LookaheadNot
        | Instr::Not
        | Instr::Optional
        | Instr::KleeneStar
        | Instr::KleenePlus => {}
        Instr::LprDecl(name) | Instr::PprDecl(name) | Instr::Name(name) => write_str(buf, name),
        Instr::Lpr(name, q) | Instr::Ppr(name, q) => {
            write_str(buf, name);
            buf.push(q.to_byte());
        }
        Instr::String(s) | Instr::Charset(s) => write_str(buf, s),
    }
}

/// Encodes every instruction in `spec`, in order, to its wire form.
pub fn encode(spec: &Spec) -> Vec<u8> {
    let mut buf = Vec::new();
    for instr in spec.instrs() {
        encode_instr(instr, &mut buf);
    }
    buf
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8, WireError> {
        let b = *self.bytes.get(self.pos).ok_or(WireError::TruncatedOpcode)?;
        self.pos += 1;
        Ok(b)
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let end = self.pos + 4;
        let slice = self.bytes.get(self.pos..end).ok_or(WireError::TruncatedOperand("4"))?;
        self.pos = end;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, WireError> {
        let len = self.u32()? as usize;
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or(WireError::TruncatedOperand("string"))?;
        self.pos = end;
        String::from_utf8(slice.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }

    fn qualifier(&mut self) -> Result<Qualifier, WireError> {
        let b = self.u8()?;
        Qualifier::from_byte(b).ok_or(WireError::UnknownQualifier(b))
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// Decodes a wire-format byte stream back into a [`Spec`], replaying each
/// decoded instruction through a fresh [`SpecWriter`].
pub fn decode(bytes: &[u8]) -> Result<Spec, WireError> {
    let mut c = Cursor { bytes, pos: 0 };
    let mut w = SpecWriter::new();
    while !c.is_empty() {
        let op = byte_opcode(c.u8()?)?;
        match op {
            Opcode::Pos => {
                w.pos(c.u32()?);
            }
            Opcode::Close => {
                w.close();
            }
            Opcode::Alternative => {
                w.alternative();
            }
            Opcode::LprDecl => {
                let name = c.string()?;
                w.lpr_decl(name);
            }
            Opcode::PprDecl => {
                let name = c.string()?;
                w.ppr_decl(name);
            }
            Opcode::Lpr => {
                let name = c.string()?;
                let q = c.qualifier()?;
                w.lpr(name, q);
            }
            Opcode::Ppr => {
                let name = c.string()?;
                let q = c.qualifier()?;
                w.ppr(name, q);
            }
            Opcode::End => {
                w.end();
            }
            Opcode::Any => {
                w.any();
            }
            Opcode::String => {
                let s = c.string()?;
                w.string(s);
            }
            Opcode::Charset => {
                let s = c.string()?;
                w.charset(s);
            }
            Opcode::Token => {
                w.token();
            }
            Opcode::Failure => {
                w.failure();
            }
            Opcode::Name => {
                let name = c.string()?;
                w.name(name);
            }
            Opcode::Sequence => {
                w.sequence();
            }
            Opcode::Lookahead => {
                w.lookahead();
            }
            Opcode::LookaheadNot => {
                w.lookahead_not();
            }
            Opcode::Not => {
                w.not();
            }
            Opcode::Optional => {
                w.optional();
            }
            Opcode::KleeneStar => {
                w.kleene_star();
            }
            Opcode::KleenePlus => {
                w.kleene_plus();
            }
        }
    }
    Ok(w.done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taul_core::Qualifier;

    #[test]
    fn round_trips_through_bytes() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.pos(5);
        w.lpr("f", Qualifier::Skip);
        w.string("abc");
        w.close();
        let spec = w.done();

        let bytes = encode(&spec);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.instrs(), spec.instrs());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let bytes = vec![opcode_byte(Opcode::String), 5, 0, 0, 0, b'a'];
        assert!(matches!(decode(&bytes), Err(WireError::TruncatedOperand(_))));
    }

    #[test]
    fn unknown_opcode_byte_is_an_error() {
        assert!(matches!(decode(&[255]), Err(WireError::UnknownOpcode(255))));
    }
}
